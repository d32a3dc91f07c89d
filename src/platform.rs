/// Contracts for the browser-side collaborators
///
/// Calls are eventually consistent and may fail for tabs that have been
/// closed in the meantime; callers treat those failures as data.
use async_trait::async_trait;

use crate::error::{ExtractError, PlatformError};
use crate::tab_data::{GroupId, PageContent, Tab, TabGroup, TabId, Window, WindowId};

/// Which tabs or groups a query should return
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scope {
    CurrentWindow,
    Window(WindowId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupUpdate {
    pub title: String,
    pub collapsed: bool,
}

#[async_trait(?Send)]
pub trait TabPlatform {
    async fn query_tabs(&self, scope: Scope) -> Result<Vec<Tab>, PlatformError>;

    async fn close_tabs(&self, ids: &[TabId]) -> Result<(), PlatformError>;

    async fn activate_tab(&self, id: TabId) -> Result<(), PlatformError>;

    async fn group_tabs(&self, ids: &[TabId]) -> Result<GroupId, PlatformError>;

    async fn update_group(&self, id: GroupId, update: GroupUpdate) -> Result<(), PlatformError>;

    async fn get_group(&self, id: GroupId) -> Result<TabGroup, PlatformError>;

    async fn query_groups(&self, scope: Scope) -> Result<Vec<TabGroup>, PlatformError>;

    async fn ungroup_tabs(&self, ids: &[TabId]) -> Result<(), PlatformError>;

    async fn last_focused_window(&self) -> Result<Window, PlatformError>;
}

/// Reads title, host and body text out of a live page
#[async_trait(?Send)]
pub trait ContentExtractor {
    async fn extract(&self, tab_id: TabId) -> Result<PageContent, ExtractError>;
}
