use std::time::Duration;

const DEFAULT_MAX_TOKENS: usize = 100_000;
const DEFAULT_ANCHOR_TOKENS: usize = 50;
const DEFAULT_MAX_CANDIDATES: usize = 3;
const DEFAULT_SIMILARITY: f64 = 0.70;
const DEFAULT_SEARCH_SPAN: usize = 4096;
const DEFAULT_AFTER_SLACK: usize = 50;
const DEFAULT_MIN_CUT: usize = 100;
const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 90;

/// Tunables for one decomposition run.
///
/// `max_tokens` is both the chunk budget and the size of the rolling window shown to the
/// boundary oracle.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkerConfig {
    pub max_tokens: usize,
    /// Desired anchor length (tokens) requested from the oracle.
    pub anchor_tokens: usize,
    pub max_candidates: usize,
    /// Minimum normalized similarity an approximate anchor match must exceed.
    pub similarity_threshold: f64,
    /// Characters scanned per approximate-match region.
    pub anchor_search_span: usize,
    /// How far past the cut the after-anchor may start.
    pub after_anchor_slack: usize,
    /// Cuts closer than this (characters) to the window start are rejected.
    pub min_cut_position: usize,
    /// Reject cuts whose after-anchor cannot be verified.
    pub strict_after_anchor: bool,
    pub oracle_timeout: Duration,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            anchor_tokens: DEFAULT_ANCHOR_TOKENS,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            similarity_threshold: DEFAULT_SIMILARITY,
            anchor_search_span: DEFAULT_SEARCH_SPAN,
            after_anchor_slack: DEFAULT_AFTER_SLACK,
            min_cut_position: DEFAULT_MIN_CUT,
            strict_after_anchor: false,
            oracle_timeout: Duration::from_secs(DEFAULT_ORACLE_TIMEOUT_SECS),
        }
    }
}

impl ChunkerConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_parse::<usize>("MDCHUNK_MAX_TOKENS") {
            cfg.max_tokens = v;
        }
        if let Some(v) = env_parse::<usize>("MDCHUNK_ANCHOR_TOKENS") {
            cfg.anchor_tokens = v;
        }
        if let Some(v) = env_parse::<usize>("MDCHUNK_MAX_CANDIDATES") {
            cfg.max_candidates = v;
        }
        if let Some(v) = env_parse::<f64>("MDCHUNK_SIMILARITY") {
            cfg.similarity_threshold = v;
        }
        if let Some(v) = env_parse::<usize>("MDCHUNK_SEARCH_SPAN") {
            cfg.anchor_search_span = v;
        }
        if let Some(v) = env_parse::<usize>("MDCHUNK_AFTER_SLACK") {
            cfg.after_anchor_slack = v;
        }
        if let Some(v) = env_parse::<usize>("MDCHUNK_MIN_CUT") {
            cfg.min_cut_position = v;
        }
        if let Ok(v) = std::env::var("MDCHUNK_STRICT_ANCHORS") {
            cfg.strict_after_anchor = parse_flag(&v);
        }
        if let Some(v) = env_parse::<u64>("MDCHUNK_ORACLE_TIMEOUT_SECS") {
            cfg.oracle_timeout = Duration::from_secs(v);
        }
        cfg
    }

    /// Structural problems are fatal at startup, never per document.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::InvalidBudget("max_tokens must be > 0".into()));
        }
        if self.anchor_tokens == 0 {
            return Err(ConfigError::InvalidBudget("anchor_tokens must be > 0".into()));
        }
        if self.max_candidates == 0 {
            return Err(ConfigError::Invalid("max_candidates must be > 0".into()));
        }
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "similarity threshold {} is outside (0, 1)",
                self.similarity_threshold
            )));
        }
        if self.anchor_search_span == 0 {
            return Err(ConfigError::Invalid("anchor_search_span must be > 0".into()));
        }
        if self.oracle_timeout.is_zero() {
            return Err(ConfigError::Invalid("oracle timeout must be > 0".into()));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn parse_flag(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidBudget(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidBudget(msg) => write!(f, "invalid budget: {msg}"),
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
