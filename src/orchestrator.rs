/// One grouping run, start to finish
///
/// Idle -> EnsuringSessions -> UngroupingExisting -> Deduplicating ->
/// FetchingTabs -> CappingToLimit -> Classifying -> Partitioning ->
/// MaterializingGroups -> EnrichingAsync (detached) -> Done | Failed
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use futures::future::join_all;
use log::{error, info, warn};
use uuid::Uuid;

use crate::ai::{Capability, ProgressFn, SessionManager};
use crate::classifier::{ClassifyInput, classify};
use crate::config::{FALLBACK_LABEL, GrouperConfig};
use crate::dedupe::dedupe;
use crate::domain::{hostname, valid_tabs};
use crate::enrichment::{EnrichmentJob, select_targets};
use crate::error::{PlatformError, RunError};
use crate::events::{Reporter, RunEvent, RunStage};
use crate::grouping::{materialize, partition};
use crate::platform::{ContentExtractor, Scope, TabPlatform};
use crate::tab_data::{ClassifiedTab, GroupResult, Tab, TabId};
use crate::timing::Sleeper;

/// Everything a successful run produced
pub struct RunReport {
    pub run_id: Uuid,
    pub closed_duplicates: usize,
    pub classified: Vec<ClassifiedTab>,
    pub results: Vec<GroupResult>,
    /// Trailing work; spawn it detached or await it
    pub enrichment: EnrichmentJob,
}

pub struct Orchestrator {
    platform: Rc<dyn TabPlatform>,
    extractor: Rc<dyn ContentExtractor>,
    sessions: Rc<SessionManager>,
    sleeper: Rc<dyn Sleeper>,
    reporter: Rc<dyn Reporter>,
    config: GrouperConfig,
}

impl Orchestrator {
    pub fn new(
        platform: Rc<dyn TabPlatform>,
        extractor: Rc<dyn ContentExtractor>,
        sessions: Rc<SessionManager>,
        sleeper: Rc<dyn Sleeper>,
        reporter: Rc<dyn Reporter>,
        config: GrouperConfig,
    ) -> Orchestrator {
        Orchestrator {
            platform,
            extractor,
            sessions,
            sleeper,
            reporter,
            config,
        }
    }

    fn stage(&self, stage: RunStage) {
        self.reporter.report(RunEvent::Stage(stage));
    }

    /// Run the pipeline once.
    ///
    /// Returns as soon as groups exist; enrichment is handed back in the
    /// report and never affects the outcome.
    pub async fn run(&self) -> Result<RunReport, RunError> {
        let run_id = Uuid::new_v4();
        info!("[{}] Grouping run started", run_id);

        match self.run_stages(run_id).await {
            Ok(report) => {
                self.reporter.report(RunEvent::GroupsReady(report.results.clone()));
                if !report.enrichment.is_empty() {
                    self.stage(RunStage::EnrichingAsync);
                    self.reporter
                        .log(format!("Summarizing: {}", report.enrichment.labels().join(", ")));
                }
                self.stage(RunStage::Done);
                self.reporter.report(RunEvent::Finished);
                info!("[{}] Grouping run finished with {} groups", run_id, report.results.len());
                Ok(report)
            }
            Err(e) => {
                error!("[{}] Grouping run failed: {}", run_id, e);
                self.stage(RunStage::Failed);
                self.reporter.log(format!("Error: {}", e));
                self.reporter.report(RunEvent::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run_stages(&self, run_id: Uuid) -> Result<RunReport, RunError> {
        self.stage(RunStage::EnsuringSessions);
        let reporter = self.reporter.clone();
        let on_progress: ProgressFn = Rc::new(move |percent| reporter.report(RunEvent::ModelProgress(percent)));
        self.sessions.ensure_ready(on_progress).await?;
        self.reporter.log("AI models ready".to_string());

        self.ungroup_existing().await?;

        self.stage(RunStage::Deduplicating);
        let before = self.platform.query_tabs(Scope::CurrentWindow).await?;
        let deduped = dedupe(self.platform.as_ref(), &before).await?;
        for (id, err) in &deduped.close_failures {
            self.reporter
                .log(format!("Could not close duplicate tab {}: {}", id, err));
        }
        self.reporter
            .log(format!("Closed {} duplicate tabs", deduped.closed_count));

        // Closing tabs changes the live set, so read it again
        self.stage(RunStage::FetchingTabs);
        let tabs = valid_tabs(&self.platform.query_tabs(Scope::CurrentWindow).await?);
        self.reporter.log(format!("Found {} tabs to organize", tabs.len()));

        self.stage(RunStage::CappingToLimit);
        let tabs = cap_tabs(tabs, self.config.max_tabs);

        self.stage(RunStage::Classifying);
        let classified = self.classify_all(&tabs).await?;

        self.stage(RunStage::Partitioning);
        let partitions = partition(&classified);
        self.reporter
            .log(format!("Sorted into {} categories", partitions.len()));

        self.stage(RunStage::MaterializingGroups);
        let results = materialize(
            self.platform.as_ref(),
            self.sleeper.as_ref(),
            &partitions,
            self.config.group_create_delay(),
        )
        .await?;
        for result in &results {
            match result.error() {
                None => self.reporter.log(format!("Grouped {} tabs as {}", result.count(), result.label)),
                Some(err) => self.reporter.log(format!("Could not group {}: {}", result.label, err)),
            }
        }

        let by_id: HashMap<TabId, Tab> = tabs.into_iter().map(|tab| (tab.id, tab)).collect();
        let enrichment = EnrichmentJob::new(
            select_targets(&results, &by_id, self.config.enrichment_threshold),
            self.extractor.clone(),
            self.sessions.clone(),
            self.sleeper.clone(),
            self.reporter.clone(),
            self.config.extraction_timeout(),
            self.config.summary_input_max_chars,
        );

        Ok(RunReport {
            run_id,
            closed_duplicates: deduped.closed_count,
            classified,
            results,
            enrichment,
        })
    }

    /// Dissolve groups left over from an earlier run
    async fn ungroup_existing(&self) -> Result<(), PlatformError> {
        let groups = self.platform.query_groups(Scope::CurrentWindow).await?;
        if groups.is_empty() {
            return Ok(());
        }

        self.stage(RunStage::UngroupingExisting);
        let grouped: Vec<TabId> = self
            .platform
            .query_tabs(Scope::CurrentWindow)
            .await?
            .into_iter()
            .filter(|tab| tab.group_id.is_some())
            .map(|tab| tab.id)
            .collect();

        if !grouped.is_empty() {
            self.platform.ungroup_tabs(&grouped).await?;
        }
        self.reporter
            .log(format!("Removed {} existing groups", groups.len()));
        Ok(())
    }

    /// Classify in fixed-size batches: concurrent within, sequential across
    async fn classify_all(&self, tabs: &[Tab]) -> Result<Vec<ClassifiedTab>, RunError> {
        let session = self.sessions.require(Capability::Classify)?;
        let total = tabs.len();
        let done = Cell::new(0usize);
        let mut classified = Vec::with_capacity(total);

        for batch in tabs.chunks(self.config.classify_batch_size) {
            let batch_results = join_all(batch.iter().map(|tab| {
                let session = session.clone();
                let done = &done;
                async move {
                    let host = hostname(&tab.url).unwrap_or_default();
                    let input = ClassifyInput {
                        title: &tab.title,
                        host: &host,
                        body: "",
                    };
                    let result = classify(session.as_ref(), input, &self.config, self.reporter.as_ref()).await;
                    done.set(done.get() + 1);
                    self.reporter.report(RunEvent::ClassifyProgress {
                        done: done.get(),
                        total,
                    });
                    ClassifiedTab {
                        tab: tab.clone(),
                        label: result.label,
                        topic: result.topic,
                    }
                }
            }))
            .await;
            classified.extend(batch_results);
        }

        let fallbacks = classified
            .iter()
            .filter(|t| t.label == FALLBACK_LABEL)
            .count();
        if fallbacks > 0 {
            warn!("{} of {} tabs classified as {}", fallbacks, total, FALLBACK_LABEL);
        }
        Ok(classified)
    }
}

/// Keep only the first `max` tabs
pub fn cap_tabs(mut tabs: Vec<Tab>, max: usize) -> Vec<Tab> {
    tabs.truncate(max);
    tabs
}
