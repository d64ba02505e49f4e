//! Boundary suggestions from an external text-understanding service.

pub mod llm;

use async_trait::async_trait;

pub use llm::LlmOracle;

/// One suggested cut, described by the text on either side of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutPoint {
    pub before_anchor: String,
    pub after_anchor: String,
    /// Title of the chunk that ends at this cut.
    pub title: String,
}

#[async_trait]
pub trait BoundaryOracle: Send + Sync {
    /// Up to a handful of candidate cuts inside `window`, best first.
    ///
    /// `anchor_tokens` is the approximate length each anchor should have.
    async fn suggest_cuts(&self, window: &str, anchor_tokens: usize) -> Result<Vec<CutPoint>, OracleError>;
}

#[derive(Debug)]
pub enum OracleError {
    /// No oracle is configured or the service could not be reached.
    Unavailable(String),
    /// The service answered but the answer could not be interpreted.
    Malformed(String),
    Timeout,
}

impl std::fmt::Display for OracleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleError::Unavailable(msg) => write!(f, "boundary oracle unavailable: {msg}"),
            OracleError::Malformed(msg) => write!(f, "malformed oracle response: {msg}"),
            OracleError::Timeout => write!(f, "boundary oracle timed out"),
        }
    }
}

impl std::error::Error for OracleError {}

/// Oracle that never answers; every oversized span goes through the deterministic fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOracle;

#[async_trait]
impl BoundaryOracle for NoOracle {
    async fn suggest_cuts(&self, _window: &str, _anchor_tokens: usize) -> Result<Vec<CutPoint>, OracleError> {
        Err(OracleError::Unavailable("no LLM endpoint configured".into()))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    /// Proposes a cut at a fixed fraction of the window, anchored on the surrounding text.
    pub struct FractionOracle {
        pub fraction: f64,
        pub anchor_chars: usize,
    }

    impl FractionOracle {
        pub fn middle() -> Self {
            Self { fraction: 0.5, anchor_chars: 60 }
        }
    }

    #[async_trait]
    impl BoundaryOracle for FractionOracle {
        async fn suggest_cuts(&self, window: &str, _k: usize) -> Result<Vec<CutPoint>, OracleError> {
            let chars: Vec<char> = window.chars().collect();
            let at = ((chars.len() as f64) * self.fraction) as usize;
            let from = at.saturating_sub(self.anchor_chars);
            let to = (at + self.anchor_chars).min(chars.len());
            Ok(vec![CutPoint {
                before_anchor: chars[from..at].iter().collect(),
                after_anchor: chars[at..to].iter().collect(),
                title: format!("Cut at {at}"),
            }])
        }
    }

    /// Always fails.
    pub struct FailingOracle;

    #[async_trait]
    impl BoundaryOracle for FailingOracle {
        async fn suggest_cuts(&self, _window: &str, _k: usize) -> Result<Vec<CutPoint>, OracleError> {
            Err(OracleError::Unavailable("offline".into()))
        }
    }

    /// Never answers within any reasonable timeout.
    pub struct StallingOracle;

    #[async_trait]
    impl BoundaryOracle for StallingOracle {
        async fn suggest_cuts(&self, _window: &str, _k: usize) -> Result<Vec<CutPoint>, OracleError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    /// Replays scripted answers in order, then returns no candidates.
    #[derive(Default)]
    pub struct ScriptedOracle {
        answers: Mutex<Vec<Vec<CutPoint>>>,
        pub windows: Mutex<Vec<usize>>,
    }

    impl ScriptedOracle {
        pub fn new(mut answers: Vec<Vec<CutPoint>>) -> Self {
            answers.reverse();
            Self { answers: Mutex::new(answers), windows: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl BoundaryOracle for ScriptedOracle {
        async fn suggest_cuts(&self, window: &str, _k: usize) -> Result<Vec<CutPoint>, OracleError> {
            self.windows.lock().unwrap().push(window.len());
            Ok(self.answers.lock().unwrap().pop().unwrap_or_default())
        }
    }

    pub fn cut(before: &str, after: &str, title: &str) -> CutPoint {
        CutPoint { before_anchor: before.into(), after_anchor: after.into(), title: title.into() }
    }
}
