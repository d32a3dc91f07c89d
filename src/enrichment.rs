/// Summaries and overviews for large groups, produced after grouping
///
/// Every qualifying group is enriched as its own task. A task never fails:
/// extraction problems fall back to tab metadata and model failures become
/// `Summary::Unavailable` / `overview: None`.
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use futures::future::{LocalBoxFuture, join, join_all};
use futures::FutureExt;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::ai::prompts::{category_context, overview_prompt, summary_input};
use crate::ai::{Capability, SessionManager};
use crate::domain::hostname;
use crate::error::InferenceError;
use crate::events::{Reporter, RunEvent};
use crate::platform::ContentExtractor;
use crate::tab_data::{GroupOutcome, GroupResult, PageContent, Tab, TabId};
use crate::timing::{Sleeper, with_timeout};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "camelCase")]
pub enum Summary {
    Available(String),
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentOutcome {
    pub label: String,
    pub tab_count: usize,
    pub summary: Summary,
    pub overview: Option<String>,
}

/// A realized group large enough to be enriched
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentTarget {
    pub label: String,
    pub tabs: Vec<Tab>,
}

/// Pick groups whose realized size reaches `threshold`
pub fn select_targets(results: &[GroupResult], tabs: &HashMap<TabId, Tab>, threshold: usize) -> Vec<EnrichmentTarget> {
    results
        .iter()
        .filter_map(|result| match &result.outcome {
            GroupOutcome::Grouped { tab_ids, .. } if tab_ids.len() >= threshold => Some(EnrichmentTarget {
                label: result.label.clone(),
                tabs: tab_ids.iter().filter_map(|id| tabs.get(id).cloned()).collect(),
            }),
            _ => None,
        })
        .collect()
}

/// Detached trailing work of a run
pub struct EnrichmentJob {
    targets: Vec<EnrichmentTarget>,
    extractor: Rc<dyn ContentExtractor>,
    sessions: Rc<SessionManager>,
    sleeper: Rc<dyn Sleeper>,
    reporter: Rc<dyn Reporter>,
    extraction_timeout: Duration,
    summary_input_max_chars: usize,
}

impl EnrichmentJob {
    pub fn new(
        targets: Vec<EnrichmentTarget>,
        extractor: Rc<dyn ContentExtractor>,
        sessions: Rc<SessionManager>,
        sleeper: Rc<dyn Sleeper>,
        reporter: Rc<dyn Reporter>,
        extraction_timeout: Duration,
        summary_input_max_chars: usize,
    ) -> EnrichmentJob {
        EnrichmentJob {
            targets,
            extractor,
            sessions,
            sleeper,
            reporter,
            extraction_timeout,
            summary_input_max_chars,
        }
    }

    pub fn labels(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.label.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// One independent future per group, for spawning individually
    pub fn into_tasks(self) -> Vec<LocalBoxFuture<'static, EnrichmentOutcome>> {
        let EnrichmentJob {
            targets,
            extractor,
            sessions,
            sleeper,
            reporter,
            extraction_timeout,
            summary_input_max_chars,
        } = self;

        targets
            .into_iter()
            .map(|target| {
                let ctx = TaskContext {
                    extractor: extractor.clone(),
                    sessions: sessions.clone(),
                    sleeper: sleeper.clone(),
                    reporter: reporter.clone(),
                    extraction_timeout,
                    summary_input_max_chars,
                };
                async move { ctx.enrich(target).await }.boxed_local()
            })
            .collect()
    }

    /// Run all groups concurrently and collect their outcomes
    pub async fn run(self) -> Vec<EnrichmentOutcome> {
        join_all(self.into_tasks()).await
    }
}

struct TaskContext {
    extractor: Rc<dyn ContentExtractor>,
    sessions: Rc<SessionManager>,
    sleeper: Rc<dyn Sleeper>,
    reporter: Rc<dyn Reporter>,
    extraction_timeout: Duration,
    summary_input_max_chars: usize,
}

impl TaskContext {
    async fn enrich(&self, target: EnrichmentTarget) -> EnrichmentOutcome {
        info!("Enriching {} ({} tabs)", target.label, target.tabs.len());

        let pages = join_all(target.tabs.iter().map(|tab| self.extract(tab))).await;
        let pages: Vec<(Tab, PageContent)> = target.tabs.iter().cloned().zip(pages).collect();

        let context = category_context(&target.label);
        let titles: Vec<String> = target.tabs.iter().map(|t| t.title.clone()).collect();
        let summary_text = summary_input(&pages, self.summary_input_max_chars);
        let overview_text = overview_prompt(&target.label, &titles);

        let (summary, overview) = join(
            self.generate(Capability::Summarize, &summary_text, &context),
            self.generate(Capability::Write, &overview_text, &context),
        )
        .await;

        let summary = match summary {
            Ok(text) => Summary::Available(text),
            Err(e) => {
                warn!("Summary for {} failed: {}", target.label, e);
                self.reporter.log(format!("Summary unavailable for {}: {}", target.label, e));
                Summary::Unavailable
            }
        };
        let overview = match overview {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Overview for {} failed: {}", target.label, e);
                self.reporter.log(format!("Overview unavailable for {}: {}", target.label, e));
                None
            }
        };

        let outcome = EnrichmentOutcome {
            label: target.label,
            tab_count: target.tabs.len(),
            summary,
            overview,
        };
        self.reporter.report(RunEvent::Enriched(outcome.clone()));
        outcome
    }

    /// Page text for one tab, or its metadata with an empty body
    async fn extract(&self, tab: &Tab) -> PageContent {
        let metadata = PageContent {
            title: tab.title.clone(),
            host: hostname(&tab.url).unwrap_or_default(),
            body: String::new(),
        };

        match with_timeout(self.sleeper.as_ref(), self.extraction_timeout, self.extractor.extract(tab.id)).await {
            Some(Ok(page)) => page,
            Some(Err(e)) => {
                debug!("Using metadata for tab {}: {}", tab.id, e);
                self.reporter.log(format!("Using tab info for {}: {}", tab.title, e));
                metadata
            }
            None => {
                debug!("Extraction timed out for tab {}", tab.id);
                self.reporter
                    .log(format!("Using tab info for {}: page did not respond in time", tab.title));
                metadata
            }
        }
    }

    async fn generate(&self, capability: Capability, input: &str, context: &str) -> Result<String, InferenceError> {
        let session = self
            .sessions
            .session(capability)
            .ok_or_else(|| InferenceError::Call(format!("{} session is not initialized", capability)))?;
        let text = session.generate(input, Some(context)).await?;
        Ok(text.trim().to_string())
    }
}
