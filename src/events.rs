/// Events pushed from a run to whatever is presenting it
use serde::{Deserialize, Serialize};

use crate::enrichment::EnrichmentOutcome;
use crate::tab_data::GroupResult;

/// Stages of a grouping run, in the order they happen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStage {
    Idle,
    EnsuringSessions,
    UngroupingExisting,
    Deduplicating,
    FetchingTabs,
    CappingToLimit,
    Classifying,
    Partitioning,
    MaterializingGroups,
    EnrichingAsync,
    Done,
    Failed,
}

impl RunStage {
    pub fn description(self) -> &'static str {
        match self {
            RunStage::Idle => "Ready",
            RunStage::EnsuringSessions => "Preparing AI models...",
            RunStage::UngroupingExisting => "Removing existing groups...",
            RunStage::Deduplicating => "Closing duplicate tabs...",
            RunStage::FetchingTabs => "Reading open tabs...",
            RunStage::CappingToLimit => "Selecting tabs...",
            RunStage::Classifying => "Categorizing tabs...",
            RunStage::Partitioning => "Sorting into categories...",
            RunStage::MaterializingGroups => "Creating tab groups...",
            RunStage::EnrichingAsync => "Summarizing large groups...",
            RunStage::Done => "Done",
            RunStage::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Stage(RunStage),
    ClassifyProgress { done: usize, total: usize },
    ModelProgress(u8),
    /// One line of the human-readable run log
    Log(String),
    GroupsReady(Vec<GroupResult>),
    Enriched(EnrichmentOutcome),
    Finished,
    Failed(String),
}

pub trait Reporter {
    fn report(&self, event: RunEvent);

    fn log(&self, line: String) {
        self.report(RunEvent::Log(line));
    }
}
