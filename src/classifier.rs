/// Per-tab classification against the closed category set
///
/// The model's reply is untrusted text. `parse_classification` turns it into
/// a typed result and `classify` maps every error to the fallback label, so
/// callers always get a label back.
use std::sync::OnceLock;

use log::{debug, warn};
use regex::Regex;
use serde::Deserialize;

use crate::ai::ModelSession;
use crate::ai::prompts::classification_prompt;
use crate::config::{FALLBACK_LABEL, GrouperConfig};
use crate::domain::truncate_chars;
use crate::error::ClassifyError;
use crate::events::Reporter;

/// What the classifier needs to know about a tab
#[derive(Debug, Clone, Copy)]
pub struct ClassifyInput<'a> {
    pub title: &'a str,
    pub host: &'a str,
    pub body: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: String,
    pub topic: String,
}

#[derive(Deserialize)]
struct RawClassification {
    label: String,
    #[serde(default)]
    topic: Option<String>,
}

fn json_object_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("static regex"))
}

/// Remove a surrounding ``` or ```json fence
pub fn strip_code_fence(reply: &str) -> &str {
    reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```JSON")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

fn decode(reply: &str) -> Result<RawClassification, ClassifyError> {
    let cleaned = strip_code_fence(reply);
    match serde_json::from_str::<RawClassification>(cleaned) {
        Ok(raw) => Ok(raw),
        Err(first) => {
            // Models sometimes wrap the object in prose
            let embedded = json_object_pattern()
                .find(cleaned)
                .ok_or_else(|| ClassifyError::Malformed(first.to_string()))?;
            serde_json::from_str(embedded.as_str()).map_err(|e| ClassifyError::Malformed(e.to_string()))
        }
    }
}

/// Parse a model reply into a label from `config.categories` plus a topic
pub fn parse_classification(
    reply: &str,
    fallback_topic: &str,
    config: &GrouperConfig,
) -> Result<Classification, ClassifyError> {
    let raw = decode(reply)?;
    let label = config
        .categories
        .canonical(raw.label.trim())
        .ok_or_else(|| ClassifyError::UnknownLabel(raw.label.clone()))?;

    let topic = raw
        .topic
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback_topic.to_string());

    Ok(Classification {
        label: label.to_string(),
        topic: truncate_chars(&topic, config.topic_max_chars),
    })
}

/// The classification used whenever the model can't be trusted
pub fn fallback(title: &str, config: &GrouperConfig) -> Classification {
    let source = if title.trim().is_empty() { "Unknown" } else { title.trim() };
    let topic = truncate_chars(source, config.fallback_topic_chars);
    Classification {
        label: FALLBACK_LABEL.to_string(),
        topic: truncate_chars(&topic, config.topic_max_chars),
    }
}

/// Classify one tab with a single model call. Never fails; a fallback is
/// noted in the run log.
pub async fn classify(
    session: &dyn ModelSession,
    input: ClassifyInput<'_>,
    config: &GrouperConfig,
    reporter: &dyn Reporter,
) -> Classification {
    let prompt = classification_prompt(&config.categories, input.title, input.host, input.body);

    let result = match session.generate(&prompt, None).await {
        Ok(reply) => parse_classification(&reply, input.title, config),
        Err(e) => Err(ClassifyError::from(e)),
    };

    match result {
        Ok(classification) => {
            debug!("Classified {:?} as {}", input.title, classification.label);
            classification
        }
        Err(e) => {
            warn!("Classification of {:?} fell back to {}: {}", input.title, FALLBACK_LABEL, e);
            reporter.log(format!("Could not classify {:?} ({}), placed in {}", input.title, e, FALLBACK_LABEL));
            fallback(input.title, config)
        }
    }
}
