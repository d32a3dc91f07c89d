/// Duplicate tab detection and removal
use std::collections::HashSet;

use log::{debug, warn};

use crate::domain::{dedupe_key, valid_tabs};
use crate::error::PlatformError;
use crate::platform::TabPlatform;
use crate::tab_data::{Tab, TabId};

/// Which tabs to keep and which to close
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupePlan {
    pub kept: Vec<Tab>,
    pub remove_ids: Vec<TabId>,
    /// Web tabs whose URL didn't parse; neither kept nor closed
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DedupeOutcome {
    pub kept: Vec<Tab>,
    pub closed_count: usize,
    /// Duplicates that stayed open, with the reason
    pub close_failures: Vec<(TabId, PlatformError)>,
}

/// Keep the first tab per (title, hostname) key (keep first occurrence)
pub fn plan_dedupe(tabs: &[Tab]) -> DedupePlan {
    let mut seen_keys = HashSet::new();
    let mut plan = DedupePlan::default();

    for tab in valid_tabs(tabs) {
        let Some(key) = dedupe_key(&tab) else {
            debug!("Skipping tab {} with unparseable URL {:?}", tab.id, tab.url);
            plan.skipped += 1;
            continue;
        };

        if seen_keys.insert(key) {
            plan.kept.push(tab);
        } else {
            plan.remove_ids.push(tab.id);
        }
    }

    plan
}

/// Close duplicate tabs on the platform
///
/// Stale ids don't abort the pass: if the batch close is rejected, tabs are
/// closed one at a time and only the successful closes are counted.
pub async fn dedupe(platform: &dyn TabPlatform, tabs: &[Tab]) -> Result<DedupeOutcome, PlatformError> {
    let plan = plan_dedupe(tabs);

    if plan.remove_ids.is_empty() {
        return Ok(DedupeOutcome {
            kept: plan.kept,
            closed_count: 0,
            close_failures: Vec::new(),
        });
    }

    let (closed_count, close_failures) = match platform.close_tabs(&plan.remove_ids).await {
        Ok(()) => (plan.remove_ids.len(), Vec::new()),
        Err(PlatformError::Disconnected(msg)) => return Err(PlatformError::Disconnected(msg)),
        Err(e) => {
            warn!("Batch close of {} duplicates failed ({}), closing individually", plan.remove_ids.len(), e);
            close_individually(platform, &plan.remove_ids).await?
        }
    };

    Ok(DedupeOutcome {
        kept: plan.kept,
        closed_count,
        close_failures,
    })
}

async fn close_individually(
    platform: &dyn TabPlatform,
    ids: &[TabId],
) -> Result<(usize, Vec<(TabId, PlatformError)>), PlatformError> {
    let mut closed = 0;
    let mut failures = Vec::new();
    for id in ids {
        match platform.close_tabs(&[*id]).await {
            Ok(()) => closed += 1,
            Err(PlatformError::Disconnected(msg)) => return Err(PlatformError::Disconnected(msg)),
            Err(e) => {
                debug!("Could not close tab {}: {}", id, e);
                failures.push((*id, e));
            }
        }
    }
    Ok((closed, failures))
}
