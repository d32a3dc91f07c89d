/// Partitioning classified tabs and realizing partitions as tab groups
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use log::{debug, warn};

use crate::error::PlatformError;
use crate::platform::{GroupUpdate, Scope, TabPlatform};
use crate::tab_data::{ClassifiedTab, GroupResult, Partition};
use crate::timing::Sleeper;

pub const NO_TABS_TO_GROUP: &str = "No tabs to group";
pub const NO_VALID_TABS: &str = "No valid tabs in current window";

/// Group tabs by label, keeping labels in first-seen order
pub fn partition(classified: &[ClassifiedTab]) -> Vec<Partition> {
    let mut partitions: Vec<Partition> = Vec::new();
    let mut index_by_label: HashMap<&str, usize> = HashMap::new();

    for tab in classified {
        let idx = *index_by_label.entry(tab.label.as_str()).or_insert_with(|| {
            partitions.push(Partition {
                label: tab.label.clone(),
                tab_ids: Vec::new(),
            });
            partitions.len() - 1
        });
        partitions[idx].tab_ids.push(tab.id());
    }

    partitions
}

/// Create one browser tab group per partition.
///
/// A failing partition is recorded as a failed `GroupResult` and the rest
/// carry on. Only a `Disconnected` platform is returned as an error.
pub async fn materialize(
    platform: &dyn TabPlatform,
    sleeper: &dyn Sleeper,
    partitions: &[Partition],
    create_delay: Duration,
) -> Result<Vec<GroupResult>, PlatformError> {
    let mut results = Vec::with_capacity(partitions.len());

    for partition in partitions {
        if partition.tab_ids.is_empty() {
            results.push(GroupResult::failed(&partition.label, NO_TABS_TO_GROUP));
            continue;
        }

        let result = match materialize_one(platform, sleeper, partition, create_delay).await {
            Ok(result) => result,
            Err(PlatformError::Disconnected(msg)) => return Err(PlatformError::Disconnected(msg)),
            Err(e) => {
                warn!("Grouping {} failed: {}", partition.label, e);
                GroupResult::failed(&partition.label, e.to_string())
            }
        };
        results.push(result);
    }

    Ok(results)
}

async fn materialize_one(
    platform: &dyn TabPlatform,
    sleeper: &dyn Sleeper,
    partition: &Partition,
    create_delay: Duration,
) -> Result<GroupResult, PlatformError> {
    // Tabs may have closed or moved since classification started
    let window = platform.last_focused_window().await?;
    let live_ids: HashSet<_> = platform
        .query_tabs(Scope::Window(window.id))
        .await?
        .into_iter()
        .filter(|tab| tab.window_id == window.id)
        .map(|tab| tab.id)
        .collect();

    let surviving: Vec<_> = partition
        .tab_ids
        .iter()
        .copied()
        .filter(|id| live_ids.contains(id))
        .collect();

    if surviving.is_empty() {
        return Ok(GroupResult::failed(&partition.label, NO_VALID_TABS));
    }
    if surviving.len() < partition.tab_ids.len() {
        debug!(
            "{}: {} of {} tabs gone before grouping",
            partition.label,
            partition.tab_ids.len() - surviving.len(),
            partition.tab_ids.len()
        );
    }

    sleeper.sleep(create_delay).await;
    let group_id = platform.group_tabs(&surviving).await?;
    platform
        .update_group(
            group_id,
            GroupUpdate {
                title: partition.label.clone(),
                collapsed: false,
            },
        )
        .await?;
    let group = platform.get_group(group_id).await?;

    Ok(GroupResult::grouped(&partition.label, group_id, surviving, group.color))
}
