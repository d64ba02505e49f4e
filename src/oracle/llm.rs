use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{BoundaryOracle, CutPoint, OracleError};
use crate::llm::{ChatCompletionRequest, ChatMessage, ChatRole, LlmClient, OpenAiError};

const SYSTEM_PROMPT: &str = "You split long documents into coherent parts. Reply with a single JSON object and nothing else.";

const MAX_ATTEMPTS: usize = 2;

static TITLE_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?s)["']?chunk_title["']?\s*:\s*["'](.+?)["']"#,
        r#".*?["']?tokens_before["']?\s*:\s*["'](.+?)["']"#,
        r#".*?["']?tokens_after["']?\s*:\s*["'](.+?)["']"#,
    ))
    .expect("title-first pattern compiles")
});

static ANCHORS_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?s)["']?tokens_before["']?\s*:\s*["'](.+?)["']"#,
        r#".*?["']?tokens_after["']?\s*:\s*["'](.+?)["']"#,
        r#".*?["']?chunk_title["']?\s*:\s*["'](.+?)["']"#,
    ))
    .expect("anchors-first pattern compiles")
});

/// Boundary oracle backed by a chat-completions model.
pub struct LlmOracle {
    client: Arc<dyn LlmClient>,
    max_candidates: usize,
}

impl LlmOracle {
    pub fn new(client: Arc<dyn LlmClient>, max_candidates: usize) -> Self {
        Self { client, max_candidates: max_candidates.max(1) }
    }

    fn request(&self, window: &str, anchor_tokens: usize) -> ChatCompletionRequest {
        ChatCompletionRequest {
            messages: vec![
                ChatMessage::new(ChatRole::System, SYSTEM_PROMPT),
                ChatMessage::new(ChatRole::User, cut_prompt(window, anchor_tokens, self.max_candidates)),
            ],
            temperature: Some(0.1),
            json_response: true,
            ..ChatCompletionRequest::default()
        }
    }
}

#[async_trait]
impl BoundaryOracle for LlmOracle {
    async fn suggest_cuts(&self, window: &str, anchor_tokens: usize) -> Result<Vec<CutPoint>, OracleError> {
        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            match self.client.chat_completion(self.request(window, anchor_tokens)).await {
                Ok(resp) => break resp,
                Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                    warn!(attempt, error = %err, "oracle call failed, retrying");
                }
                Err(OpenAiError::Timeout) => return Err(OracleError::Timeout),
                Err(err) => return Err(OracleError::Unavailable(err.to_string())),
            }
        };

        let mut cuts = parse_cut_points(&response.content)?;
        cuts.truncate(self.max_candidates);
        debug!(count = cuts.len(), "oracle returned cut points");
        Ok(cuts)
    }
}

fn cut_prompt(window: &str, anchor_tokens: usize, max_candidates: usize) -> String {
    format!(
        "Below is a slice of a longer document. Choose between 1 and {max_candidates} places where it \
can be split into self-contained parts, best place first.\n\
\n\
For every place return:\n\
- tokens_before: the roughly {anchor_tokens} tokens immediately before the split, copied verbatim\n\
- tokens_after: the roughly {anchor_tokens} tokens immediately after the split, copied verbatim\n\
- chunk_title: a short title (5 to 10 words) for the part that ends at the split\n\
\n\
Prefer paragraph boundaries and changes of topic. Keep related material together. Copy the \
anchor text exactly as it appears, including punctuation.\n\
\n\
Answer with JSON only, shaped like:\n\
{{\"cut_points\": [{{\"tokens_before\": \"...\", \"tokens_after\": \"...\", \"chunk_title\": \"...\"}}]}}\n\
\n\
DOCUMENT:\n\
{window}"
    )
}

#[derive(Debug, Deserialize)]
struct CutResponse {
    #[serde(default)]
    cut_points: Vec<RawCut>,
}

#[derive(Debug, Deserialize)]
struct RawCut {
    #[serde(default)]
    tokens_before: String,
    #[serde(default)]
    tokens_after: String,
    #[serde(default)]
    chunk_title: String,
}

impl From<RawCut> for CutPoint {
    fn from(raw: RawCut) -> Self {
        CutPoint {
            before_anchor: raw.tokens_before,
            after_anchor: raw.tokens_after,
            title: raw.chunk_title.trim().to_string(),
        }
    }
}

/// Interpret a model reply as cut points.
///
/// Accepts bare JSON, JSON wrapped in a markdown fence or surrounded by prose, and as a last
/// resort pulls `tokens_before` / `tokens_after` / `chunk_title` values out with a pattern match
/// (either key order). Candidates without a before-anchor are dropped.
pub fn parse_cut_points(reply: &str) -> Result<Vec<CutPoint>, OracleError> {
    let body = strip_code_fence(reply.trim());

    let parsed = serde_json::from_str::<CutResponse>(body).or_else(|err| match outer_object(body) {
        Some(obj) => serde_json::from_str::<CutResponse>(obj),
        None => Err(err),
    });

    let cuts: Vec<CutPoint> = match parsed {
        Ok(resp) => resp.cut_points.into_iter().map(CutPoint::from).collect(),
        Err(err) => {
            debug!(error = %err, "cut point JSON did not parse, trying pattern extraction");
            let extracted = extract_with_patterns(body);
            if extracted.is_empty() {
                return Err(OracleError::Malformed(format!("no cut points in reply: {err}")));
            }
            extracted
        }
    };

    Ok(cuts.into_iter().filter(|c| !c.before_anchor.trim().is_empty()).collect())
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else { return text };
    // drop the info string line (```json)
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn outer_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn extract_with_patterns(text: &str) -> Vec<CutPoint> {
    let unescape = |s: &str| s.replace("\\\"", "\"").replace("\\'", "'").replace("\\n", "\n");

    let anchors_first: Vec<CutPoint> = ANCHORS_FIRST
        .captures_iter(text)
        .map(|c| CutPoint {
            before_anchor: unescape(&c[1]),
            after_anchor: unescape(&c[2]),
            title: unescape(&c[3]),
        })
        .collect();
    if !anchors_first.is_empty() {
        return anchors_first;
    }

    TITLE_FIRST
        .captures_iter(text)
        .map(|c| CutPoint {
            before_anchor: unescape(&c[2]),
            after_anchor: unescape(&c[3]),
            title: unescape(&c[1]),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatCompletionResponse, MockClient};

    const GOOD: &str = r#"{"cut_points": [
        {"tokens_before": "end of the first topic.", "tokens_after": "The second topic", "chunk_title": "First topic"},
        {"tokens_before": "end of the second topic.", "tokens_after": "The third", "chunk_title": "Second topic"}
    ]}"#;

    #[test]
    fn parses_plain_json() {
        let cuts = parse_cut_points(GOOD).unwrap();
        assert_eq!(cuts.len(), 2);
        assert_eq!(cuts[0].before_anchor, "end of the first topic.");
        assert_eq!(cuts[0].after_anchor, "The second topic");
        assert_eq!(cuts[0].title, "First topic");
    }

    #[test]
    fn strips_markdown_fences_and_prose() {
        let fenced = format!("```json\n{GOOD}\n```");
        assert_eq!(parse_cut_points(&fenced).unwrap().len(), 2);

        let chatty = format!("Sure! Here are the cut points:\n{GOOD}\nLet me know if you need more.");
        assert_eq!(parse_cut_points(&chatty).unwrap().len(), 2);
    }

    #[test]
    fn falls_back_to_pattern_extraction_in_either_order() {
        let broken = r#"{cut_points: [{tokens_before: "alpha beta.", tokens_after: "gamma delta", chunk_title: "Alpha",}]"#;
        let cuts = parse_cut_points(broken).unwrap();
        assert_eq!(cuts, vec![CutPoint {
            before_anchor: "alpha beta.".into(),
            after_anchor: "gamma delta".into(),
            title: "Alpha".into(),
        }]);

        let reordered = r#"[{'chunk_title': 'Intro', 'tokens_before': 'said hi here','tokens_after': 'next'},]"#;
        let cuts = parse_cut_points(reordered).unwrap();
        assert_eq!(cuts.len(), 1);
        assert_eq!(cuts[0].title, "Intro");
        assert_eq!(cuts[0].after_anchor, "next");
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(parse_cut_points("I cannot help with that."), Err(OracleError::Malformed(_))));
    }

    #[test]
    fn empty_before_anchor_is_dropped() {
        let cuts = parse_cut_points(r#"{"cut_points":[{"tokens_before":"  ","tokens_after":"x","chunk_title":"t"}]}"#).unwrap();
        assert!(cuts.is_empty());
    }

    #[tokio::test]
    async fn retries_once_on_retryable_error() {
        let mock = Arc::new(MockClient::new());
        mock.push_response(Err(OpenAiError::Timeout));
        mock.push_response(Ok(ChatCompletionResponse::text(GOOD)));

        let oracle = LlmOracle::new(mock.clone(), 1);
        let cuts = oracle.suggest_cuts("some window text", 50).await.unwrap();

        assert_eq!(cuts.len(), 1);
        assert_eq!(mock.calls().len(), 2);
        let prompt = &mock.calls()[0].messages[1].content;
        assert!(prompt.contains("some window text"));
        assert!(prompt.contains("roughly 50 tokens"));
        assert!(mock.calls()[0].json_response);
    }

    #[tokio::test]
    async fn gives_up_after_second_failure() {
        let mock = Arc::new(MockClient::new());
        mock.push_response(Err(OpenAiError::Timeout));
        mock.push_response(Err(OpenAiError::Timeout));

        let oracle = LlmOracle::new(mock.clone(), 3);
        let err = oracle.suggest_cuts("w", 50).await.unwrap_err();
        assert!(matches!(err, OracleError::Timeout));
        assert_eq!(mock.calls().len(), 2);
    }

    #[tokio::test]
    async fn non_retryable_error_is_not_retried() {
        let mock = Arc::new(MockClient::new());
        mock.push_response(Err(OpenAiError::MissingApiKey));

        let oracle = LlmOracle::new(mock.clone(), 3);
        let err = oracle.suggest_cuts("w", 50).await.unwrap_err();
        assert!(matches!(err, OracleError::Unavailable(_)));
        assert_eq!(mock.calls().len(), 1);
    }
}
