/// Data structures for Tab Grouper
use serde::{Deserialize, Serialize};

pub type TabId = i32;
pub type GroupId = i32;
pub type WindowId = i32;

/// Information about a browser tab, as reported by chrome.tabs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: TabId,
    pub url: String,
    pub title: String,
    pub window_id: WindowId,
    #[serde(default)]
    pub group_id: Option<GroupId>,
}

impl Tab {
    pub fn new(id: TabId, url: String, title: String, window_id: WindowId) -> Tab {
        Tab {
            id,
            url,
            title,
            window_id,
            group_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub id: WindowId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabGroup {
    pub id: GroupId,
    pub window_id: WindowId,
    #[serde(default)]
    pub title: String,
    /// Assigned by the browser, never chosen here
    pub color: String,
    #[serde(default)]
    pub collapsed: bool,
}

/// Text pulled out of a live page by the content script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub title: String,
    pub host: String,
    pub body: String,
}

/// A tab with its classification attached
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedTab {
    pub tab: Tab,
    pub label: String,
    pub topic: String,
}

impl ClassifiedTab {
    pub fn id(&self) -> TabId {
        self.tab.id
    }
}

/// Tabs sharing one label, in the order they were classified
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub label: String,
    pub tab_ids: Vec<TabId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum GroupOutcome {
    Grouped {
        group_id: GroupId,
        tab_ids: Vec<TabId>,
        color: String,
    },
    Failed {
        error: String,
    },
}

/// Result of turning one partition into a browser tab group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupResult {
    pub label: String,
    pub outcome: GroupOutcome,
}

impl GroupResult {
    pub fn grouped(label: &str, group_id: GroupId, tab_ids: Vec<TabId>, color: String) -> GroupResult {
        GroupResult {
            label: label.to_string(),
            outcome: GroupOutcome::Grouped {
                group_id,
                tab_ids,
                color,
            },
        }
    }

    pub fn failed(label: &str, error: impl Into<String>) -> GroupResult {
        GroupResult {
            label: label.to_string(),
            outcome: GroupOutcome::Failed { error: error.into() },
        }
    }

    /// Number of tabs actually placed in the group (0 on failure)
    pub fn count(&self) -> usize {
        match &self.outcome {
            GroupOutcome::Grouped { tab_ids, .. } => tab_ids.len(),
            GroupOutcome::Failed { .. } => 0,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, GroupOutcome::Grouped { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            GroupOutcome::Failed { error } => Some(error),
            GroupOutcome::Grouped { .. } => None,
        }
    }
}
