/// Chrome-backed implementations of the platform and model traits
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::ai::{Availability, Capability, ModelBackend, ModelSession, ProgressFn};
use crate::config::{CONFIG_STORAGE_KEY, GrouperConfig};
use crate::error::{ExtractError, InferenceError, PlatformError};
use crate::platform::{ContentExtractor, GroupUpdate, Scope, TabPlatform};
use crate::tab_data::{GroupId, PageContent, Tab, TabGroup, TabId, Window};
use crate::timing::Sleeper;

// Import JS bridge functions
#[wasm_bindgen(module = "/grouper.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn queryTabs(filter: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn closeTabs(tab_ids: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn activateTab(tab_id: i32) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn groupTabs(tab_ids: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn updateGroup(group_id: i32, title: &str, collapsed: bool) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getGroup(group_id: i32) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn queryGroups(filter: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn ungroupTabs(tab_ids: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getLastFocusedWindow() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn extractContent(tab_id: i32) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn modelAvailability(capability: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn createModelSession(capability: &str, progress_callback: &js_sys::Function) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn sessionGenerate(
        session: &JsValue,
        capability: &str,
        input: &str,
        context: Option<String>,
    ) -> Result<JsValue, JsValue>;

    fn destroyModelSession(session: &JsValue);

    #[wasm_bindgen(catch)]
    async fn sleep(ms: f64) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getStorage(key: &str) -> Result<JsValue, JsValue>;
}

fn js_message(e: &JsValue) -> String {
    e.as_string()
        .or_else(|| {
            e.dyn_ref::<js_sys::Error>()
                .map(|err| String::from(err.message()))
        })
        .unwrap_or_else(|| format!("{:?}", e))
}

fn platform_error(e: JsValue) -> PlatformError {
    classify_platform_message(js_message(&e))
}

/// Lost extension contexts are transport failures, "No tab with id" means the
/// tab went away, and everything else is a rejection of that request.
pub fn classify_platform_message(message: String) -> PlatformError {
    if message.contains("Extension context invalidated") || message.contains("Could not establish connection") {
        return PlatformError::Disconnected(message);
    }
    let stale_id = message
        .strip_prefix("No tab with id: ")
        .and_then(|rest| rest.trim_end_matches('.').trim().parse::<TabId>().ok());
    match stale_id {
        Some(id) => PlatformError::StaleTab(id),
        None => PlatformError::Rejected(message),
    }
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, PlatformError> {
    serde_wasm_bindgen::to_value(value).map_err(|e| PlatformError::Rejected(format!("Failed to serialize: {:?}", e)))
}

fn from_js<T: for<'de> Deserialize<'de>>(value: JsValue) -> Result<T, PlatformError> {
    serde_wasm_bindgen::from_value(value).map_err(|e| PlatformError::Rejected(format!("Failed to parse: {:?}", e)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    current_window: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    window_id: Option<i32>,
}

impl From<Scope> for QueryFilter {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::CurrentWindow => QueryFilter {
                current_window: Some(true),
                window_id: None,
            },
            Scope::Window(id) => QueryFilter {
                current_window: None,
                window_id: Some(id),
            },
        }
    }
}

/// chrome.tabs / chrome.tabGroups / chrome.windows
pub struct ChromePlatform;

#[async_trait(?Send)]
impl TabPlatform for ChromePlatform {
    async fn query_tabs(&self, scope: Scope) -> Result<Vec<Tab>, PlatformError> {
        let filter = to_js(&QueryFilter::from(scope))?;
        from_js(queryTabs(filter).await.map_err(platform_error)?)
    }

    async fn close_tabs(&self, ids: &[TabId]) -> Result<(), PlatformError> {
        closeTabs(to_js(&ids)?).await.map_err(platform_error)?;
        Ok(())
    }

    async fn activate_tab(&self, id: TabId) -> Result<(), PlatformError> {
        activateTab(id).await.map_err(platform_error)?;
        Ok(())
    }

    async fn group_tabs(&self, ids: &[TabId]) -> Result<GroupId, PlatformError> {
        from_js(groupTabs(to_js(&ids)?).await.map_err(platform_error)?)
    }

    async fn update_group(&self, id: GroupId, update: GroupUpdate) -> Result<(), PlatformError> {
        updateGroup(id, &update.title, update.collapsed)
            .await
            .map_err(platform_error)?;
        Ok(())
    }

    async fn get_group(&self, id: GroupId) -> Result<TabGroup, PlatformError> {
        from_js(getGroup(id).await.map_err(platform_error)?)
    }

    async fn query_groups(&self, scope: Scope) -> Result<Vec<TabGroup>, PlatformError> {
        let filter = to_js(&QueryFilter::from(scope))?;
        from_js(queryGroups(filter).await.map_err(platform_error)?)
    }

    async fn ungroup_tabs(&self, ids: &[TabId]) -> Result<(), PlatformError> {
        ungroupTabs(to_js(&ids)?).await.map_err(platform_error)?;
        Ok(())
    }

    async fn last_focused_window(&self) -> Result<Window, PlatformError> {
        from_js(getLastFocusedWindow().await.map_err(platform_error)?)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExtractReply {
    Refused { refused: String },
    Page(PageContent),
}

/// Content script injection via chrome.scripting
pub struct ChromeExtractor;

#[async_trait(?Send)]
impl ContentExtractor for ChromeExtractor {
    async fn extract(&self, tab_id: TabId) -> Result<PageContent, ExtractError> {
        let reply = extractContent(tab_id)
            .await
            .map_err(|e| ExtractError::Failed(js_message(&e)))?;
        match serde_wasm_bindgen::from_value::<ExtractReply>(reply) {
            Ok(ExtractReply::Page(page)) => Ok(page),
            Ok(ExtractReply::Refused { refused }) => Err(ExtractError::Refused(refused)),
            Err(e) => Err(ExtractError::Failed(format!("Failed to parse page: {:?}", e))),
        }
    }
}

/// Built-in LanguageModel / Summarizer / Writer APIs
pub struct ChromeModelBackend;

#[async_trait(?Send)]
impl ModelBackend for ChromeModelBackend {
    async fn availability(&self, capability: Capability) -> Result<Availability, InferenceError> {
        let status = modelAvailability(capability.as_str())
            .await
            .map_err(|e| InferenceError::Call(js_message(&e)))?;
        serde_wasm_bindgen::from_value(status).map_err(|e| InferenceError::Call(format!("Failed to parse: {:?}", e)))
    }

    async fn create_session(
        &self,
        capability: Capability,
        progress: ProgressFn,
    ) -> Result<Rc<dyn ModelSession>, InferenceError> {
        let progress_callback = Closure::wrap(Box::new(move |percent: f64| {
            progress(percent.clamp(0.0, 100.0) as u8);
        }) as Box<dyn Fn(f64)>);

        let handle = createModelSession(capability.as_str(), progress_callback.as_ref().unchecked_ref())
            .await
            .map_err(|e| InferenceError::Call(js_message(&e)))?;

        Ok(Rc::new(ChromeSession {
            capability,
            handle,
            destroyed: Cell::new(false),
            _progress: progress_callback,
        }))
    }
}

pub struct ChromeSession {
    capability: Capability,
    handle: JsValue,
    destroyed: Cell<bool>,
    // The JS monitor may still fire after create resolves
    _progress: Closure<dyn Fn(f64)>,
}

#[async_trait(?Send)]
impl ModelSession for ChromeSession {
    async fn generate(&self, input: &str, context: Option<&str>) -> Result<String, InferenceError> {
        if self.destroyed.get() {
            return Err(InferenceError::Call(format!("{} session was released", self.capability)));
        }
        let reply = sessionGenerate(
            &self.handle,
            self.capability.as_str(),
            input,
            context.map(str::to_string),
        )
        .await
        .map_err(|e| InferenceError::Call(js_message(&e)))?;

        reply
            .as_string()
            .ok_or_else(|| InferenceError::Call(format!("{} returned a non-string reply", self.capability)))
    }

    fn destroy(&self) {
        if !self.destroyed.replace(true) {
            destroyModelSession(&self.handle);
        }
    }
}

/// setTimeout-based delays
pub struct BrowserSleeper;

#[async_trait(?Send)]
impl Sleeper for BrowserSleeper {
    async fn sleep(&self, duration: Duration) {
        let _ = sleep(duration.as_millis() as f64).await;
    }
}

/// Options from chrome.storage.local, or defaults if absent or invalid
pub async fn load_config() -> GrouperConfig {
    let stored = match getStorage(CONFIG_STORAGE_KEY).await {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to read config: {}", js_message(&e));
            return GrouperConfig::default();
        }
    };

    if stored.is_null() || stored.is_undefined() {
        return GrouperConfig::default();
    }

    match serde_wasm_bindgen::from_value::<GrouperConfig>(stored) {
        Ok(config) => match config.validate() {
            Ok(()) => config,
            Err(e) => {
                warn!("Ignoring stored config: {}", e);
                GrouperConfig::default()
            }
        },
        Err(e) => {
            warn!("Ignoring unparsable config: {:?}", e);
            GrouperConfig::default()
        }
    }
}
