/// Runtime configuration for a grouping run
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Storage key the options live under in chrome.storage.local
pub const CONFIG_STORAGE_KEY: &str = "tab_grouper_config";

/// Label assigned whenever classification fails or is out of vocabulary
pub const FALLBACK_LABEL: &str = "Other";

/// The closed list of labels the classifier may choose from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategorySet(Vec<String>);

impl CategorySet {
    pub fn new<I, S>(labels: I) -> CategorySet
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CategorySet(labels.into_iter().map(Into::into).collect())
    }

    /// The compact 11-label vocabulary
    pub fn standard() -> CategorySet {
        CategorySet::new([
            "News",
            "Sports",
            "Shopping",
            "Travel",
            "Learning",
            "Work",
            "Development",
            "Social",
            "Finance",
            "Entertainment",
            FALLBACK_LABEL,
        ])
    }

    /// The wider 18-label vocabulary
    pub fn extended() -> CategorySet {
        CategorySet::new([
            "News",
            "Sports",
            "Shopping",
            "Travel",
            "Learning",
            "Work",
            "Development",
            "Social",
            "Finance",
            "Entertainment",
            "Health",
            "Food",
            "Music",
            "Gaming",
            "Science",
            "Technology",
            "Reference",
            FALLBACK_LABEL,
        ])
    }

    /// Exact-match lookup that returns the canonical spelling
    pub fn canonical(&self, label: &str) -> Option<&str> {
        self.0.iter().find(|l| *l == label).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.canonical(label).is_some()
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for CategorySet {
    fn default() -> Self {
        CategorySet::standard()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GrouperConfig {
    pub categories: CategorySet,
    /// Tabs beyond this many are left alone for the run
    pub max_tabs: usize,
    pub classify_batch_size: usize,
    pub topic_max_chars: usize,
    pub fallback_topic_chars: usize,
    /// Realized group size at which summaries are generated
    pub enrichment_threshold: usize,
    pub extraction_timeout_ms: u64,
    pub session_settle_delay_ms: u64,
    pub group_create_delay_ms: u64,
    pub summary_input_max_chars: usize,
}

impl Default for GrouperConfig {
    fn default() -> Self {
        GrouperConfig {
            categories: CategorySet::standard(),
            max_tabs: 100,
            classify_batch_size: 5,
            topic_max_chars: 60,
            fallback_topic_chars: 40,
            enrichment_threshold: 5,
            extraction_timeout_ms: 10_000,
            session_settle_delay_ms: 1_000,
            group_create_delay_ms: 100,
            summary_input_max_chars: 4_000,
        }
    }
}

impl GrouperConfig {
    pub fn from_json(json: &str) -> Result<GrouperConfig, ConfigError> {
        let config: GrouperConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.categories.contains(FALLBACK_LABEL) {
            return Err(ConfigError::Invalid(format!(
                "categories must include {:?}",
                FALLBACK_LABEL
            )));
        }
        let sizes = [
            ("maxTabs", self.max_tabs),
            ("classifyBatchSize", self.classify_batch_size),
            ("topicMaxChars", self.topic_max_chars),
            ("enrichmentThreshold", self.enrichment_threshold),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{} must be greater than 0", name)));
        }
        Ok(())
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_millis(self.extraction_timeout_ms)
    }

    pub fn session_settle_delay(&self) -> Duration {
        Duration::from_millis(self.session_settle_delay_ms)
    }

    pub fn group_create_delay(&self) -> Duration {
        Duration::from_millis(self.group_create_delay_ms)
    }
}
