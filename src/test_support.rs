//! In-memory stand-ins for the browser and the models, for unit tests
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::executor::block_on;
use futures::future;

use crate::ai::{Availability, Capability, ModelBackend, ModelSession, ProgressFn, SessionManager};
use crate::error::{ExtractError, InferenceError, PlatformError};
use crate::events::{Reporter, RunEvent, RunStage};
use crate::platform::{ContentExtractor, GroupUpdate, Scope, TabPlatform};
use crate::tab_data::{ClassifiedTab, GroupId, PageContent, Tab, TabGroup, TabId, Window, WindowId};
use crate::timing::Sleeper;

// ---------------------------------------------------------------- timing

/// Resolves immediately, remembering what it was asked to wait
#[derive(Default)]
pub struct InstantSleeper {
    calls: RefCell<Vec<Duration>>,
}

impl InstantSleeper {
    pub fn calls(&self) -> Vec<Duration> {
        self.calls.borrow().clone()
    }

    pub fn total(&self) -> Duration {
        self.calls.borrow().iter().sum()
    }
}

#[async_trait(?Send)]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, duration: Duration) {
        self.calls.borrow_mut().push(duration);
    }
}

/// Never wakes up
pub struct NeverSleeper;

#[async_trait(?Send)]
impl Sleeper for NeverSleeper {
    async fn sleep(&self, _duration: Duration) {
        future::pending::<()>().await
    }
}

// ---------------------------------------------------------------- models

/// Pending on the first poll, ready on the second
#[derive(Default)]
struct YieldOnce {
    yielded: bool,
}

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

type Responder = Rc<dyn Fn(&str) -> Result<String, InferenceError>>;
type CallLog = Vec<(String, Option<String>)>;

/// A single session with a fixed reply, for classifier tests
pub struct ScriptedSession {
    responder: Responder,
    calls: RefCell<CallLog>,
}

impl ScriptedSession {
    pub fn replying(reply: &str) -> ScriptedSession {
        let reply = reply.to_string();
        ScriptedSession {
            responder: Rc::new(move |_: &str| Ok(reply.clone())),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn failing(err: InferenceError) -> ScriptedSession {
        ScriptedSession {
            responder: Rc::new(move |_: &str| Err(err.clone())),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> CallLog {
        self.calls.borrow().clone()
    }
}

#[async_trait(?Send)]
impl ModelSession for ScriptedSession {
    async fn generate(&self, input: &str, context: Option<&str>) -> Result<String, InferenceError> {
        self.calls
            .borrow_mut()
            .push((input.to_string(), context.map(str::to_string)));
        (self.responder)(input)
    }

    fn destroy(&self) {}
}

struct BackendState {
    availability: HashMap<Capability, Availability>,
    failing_create: HashSet<Capability>,
    progress_script: Vec<u8>,
    responders: HashMap<Capability, Responder>,
    created: Vec<Capability>,
    calls: HashMap<Capability, CallLog>,
    destroyed: usize,
    yielding: HashSet<Capability>,
    in_flight: usize,
    max_in_flight: usize,
    finished: usize,
    finished_before_each_call: Vec<usize>,
}

/// Model backend whose clones share one recorded state
#[derive(Clone)]
pub struct FakeBackend {
    state: Rc<RefCell<BackendState>>,
}

impl FakeBackend {
    pub fn ready() -> FakeBackend {
        let mut responders: HashMap<Capability, Responder> = HashMap::new();
        responders.insert(
            Capability::Classify,
            Rc::new(|_: &str| Ok(r#"{"label": "Other", "topic": "Misc"}"#.to_string())),
        );
        responders.insert(Capability::Summarize, Rc::new(|_: &str| Ok("A summary.".to_string())));
        responders.insert(Capability::Write, Rc::new(|_: &str| Ok("An overview.".to_string())));

        FakeBackend {
            state: Rc::new(RefCell::new(BackendState {
                availability: Capability::ALL.into_iter().map(|c| (c, Availability::Ready)).collect(),
                failing_create: HashSet::new(),
                progress_script: Vec::new(),
                responders,
                created: Vec::new(),
                calls: HashMap::new(),
                destroyed: 0,
                yielding: HashSet::new(),
                in_flight: 0,
                max_in_flight: 0,
                finished: 0,
                finished_before_each_call: Vec::new(),
            })),
        }
    }

    pub fn needs_download(capability: Capability) -> FakeBackend {
        let backend = FakeBackend::ready();
        backend
            .state
            .borrow_mut()
            .availability
            .insert(capability, Availability::NeedsDownload);
        backend
    }

    pub fn unavailable(self, capability: Capability) -> FakeBackend {
        self.state
            .borrow_mut()
            .availability
            .insert(capability, Availability::Unavailable);
        self
    }

    pub fn failing_create(self, capability: Capability) -> FakeBackend {
        self.state.borrow_mut().failing_create.insert(capability);
        self
    }

    /// Progress values every session creation reports before finishing
    pub fn with_progress(self, script: Vec<u8>) -> FakeBackend {
        self.state.borrow_mut().progress_script = script;
        self
    }

    pub fn replying(self, capability: Capability, reply: &str) -> FakeBackend {
        let reply = reply.to_string();
        self.state
            .borrow_mut()
            .responders
            .insert(capability, Rc::new(move |_: &str| Ok(reply.clone())));
        self
    }

    pub fn failing_calls(self, capability: Capability) -> FakeBackend {
        self.state.borrow_mut().responders.insert(
            capability,
            Rc::new(move |_: &str| Err(InferenceError::Call(format!("{} quota exceeded", capability)))),
        );
        self
    }

    /// Classify replies are computed from the prompt text
    pub fn classifying_with(self, reply: fn(&str) -> String) -> FakeBackend {
        self.state
            .borrow_mut()
            .responders
            .insert(Capability::Classify, Rc::new(move |prompt: &str| Ok(reply(prompt))));
        self
    }

    /// Calls for `capability` suspend once before replying, so concurrent
    /// calls overlap
    pub fn yielding(self, capability: Capability) -> FakeBackend {
        self.state.borrow_mut().yielding.insert(capability);
        self
    }

    /// Most generate calls running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.state.borrow().max_in_flight
    }

    /// For each generate call in start order, how many had already finished
    pub fn finished_before_each_call(&self) -> Vec<usize> {
        self.state.borrow().finished_before_each_call.clone()
    }

    pub fn created(&self) -> Vec<Capability> {
        self.state.borrow().created.clone()
    }

    pub fn calls(&self, capability: Capability) -> CallLog {
        self.state.borrow().calls.get(&capability).cloned().unwrap_or_default()
    }

    pub fn destroyed(&self) -> usize {
        self.state.borrow().destroyed
    }
}

#[async_trait(?Send)]
impl ModelBackend for FakeBackend {
    async fn availability(&self, capability: Capability) -> Result<Availability, InferenceError> {
        Ok(self.state.borrow().availability[&capability])
    }

    async fn create_session(
        &self,
        capability: Capability,
        progress: ProgressFn,
    ) -> Result<Rc<dyn ModelSession>, InferenceError> {
        let script = self.state.borrow().progress_script.clone();
        for percent in script {
            progress(percent);
        }
        if self.state.borrow().failing_create.contains(&capability) {
            return Err(InferenceError::Call(format!("{} model download failed", capability)));
        }
        self.state.borrow_mut().created.push(capability);
        Ok(Rc::new(FakeSession {
            capability,
            state: self.state.clone(),
            destroyed: Cell::new(false),
        }))
    }
}

struct FakeSession {
    capability: Capability,
    state: Rc<RefCell<BackendState>>,
    destroyed: Cell<bool>,
}

#[async_trait(?Send)]
impl ModelSession for FakeSession {
    async fn generate(&self, input: &str, context: Option<&str>) -> Result<String, InferenceError> {
        let (responder, yielding) = {
            let mut state = self.state.borrow_mut();
            state
                .calls
                .entry(self.capability)
                .or_default()
                .push((input.to_string(), context.map(str::to_string)));
            let finished = state.finished;
            state.finished_before_each_call.push(finished);
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            (
                state.responders[&self.capability].clone(),
                state.yielding.contains(&self.capability),
            )
        };
        if yielding {
            YieldOnce::default().await;
        }
        let mut state = self.state.borrow_mut();
        state.in_flight -= 1;
        state.finished += 1;
        drop(state);
        responder(input)
    }

    fn destroy(&self) {
        if !self.destroyed.replace(true) {
            self.state.borrow_mut().destroyed += 1;
        }
    }
}

/// A session manager with all three sessions already created
pub fn ready_sessions(backend: FakeBackend) -> Rc<SessionManager> {
    let manager = SessionManager::new(Rc::new(backend), Rc::new(InstantSleeper::default()), Duration::ZERO);
    block_on(manager.ensure_ready(Rc::new(|_: u8| {}))).expect("fake sessions");
    Rc::new(manager)
}

/// Classify reply deriving the label from a "Label: rest" tab title
pub fn label_by_title_prefix(prompt: &str) -> String {
    let title = prompt
        .lines()
        .find_map(|line| line.strip_prefix("Title: "))
        .unwrap_or_default();
    let (label, topic) = title.split_once(':').unwrap_or(("Unknown", title));
    serde_json::json!({ "label": label.trim(), "topic": topic.trim() }).to_string()
}

// ---------------------------------------------------------------- browser

enum PageBehavior {
    Body(String),
    Refuse(ExtractError),
    Hang,
}

#[derive(Default)]
pub struct FakeExtractor {
    pages: HashMap<TabId, PageBehavior>,
}

impl FakeExtractor {
    pub fn with_body(mut self, tab_id: TabId, body: &str) -> FakeExtractor {
        self.pages.insert(tab_id, PageBehavior::Body(body.to_string()));
        self
    }

    pub fn refusing(mut self, tab_id: TabId, err: ExtractError) -> FakeExtractor {
        self.pages.insert(tab_id, PageBehavior::Refuse(err));
        self
    }

    pub fn hanging(mut self, tab_id: TabId) -> FakeExtractor {
        self.pages.insert(tab_id, PageBehavior::Hang);
        self
    }
}

#[async_trait(?Send)]
impl ContentExtractor for FakeExtractor {
    async fn extract(&self, tab_id: TabId) -> Result<PageContent, ExtractError> {
        match self.pages.get(&tab_id) {
            None => Ok(PageContent::default()),
            Some(PageBehavior::Body(body)) => Ok(PageContent {
                body: body.clone(),
                ..PageContent::default()
            }),
            Some(PageBehavior::Refuse(err)) => Err(err.clone()),
            Some(PageBehavior::Hang) => future::pending().await,
        }
    }
}

const COLORS: [&str; 8] = ["grey", "blue", "red", "yellow", "green", "pink", "purple", "cyan"];

struct PlatformState {
    tabs: Vec<Tab>,
    groups: Vec<TabGroup>,
    next_group: GroupId,
    focused: WindowId,
    group_rejections: VecDeque<PlatformError>,
    close_refused: HashSet<TabId>,
    close_calls: usize,
    group_calls: usize,
    ungroup_calls: usize,
}

impl PlatformState {
    fn drop_empty_groups(&mut self) {
        let tabs = &self.tabs;
        self.groups
            .retain(|group| tabs.iter().any(|tab| tab.group_id == Some(group.id)));
    }

    fn in_scope(&self, window_id: WindowId, scope: Scope) -> bool {
        match scope {
            Scope::CurrentWindow => window_id == self.focused,
            Scope::Window(id) => window_id == id,
        }
    }
}

/// Tabs, windows and groups held in memory; window 1 has focus
pub struct FakePlatform {
    state: RefCell<PlatformState>,
}

impl FakePlatform {
    pub fn with_tabs(tabs: Vec<Tab>) -> FakePlatform {
        FakePlatform {
            state: RefCell::new(PlatformState {
                tabs,
                groups: Vec::new(),
                next_group: 1,
                focused: 1,
                group_rejections: VecDeque::new(),
                close_refused: HashSet::new(),
                close_calls: 0,
                group_calls: 0,
                ungroup_calls: 0,
            }),
        }
    }

    pub fn live_ids(&self) -> Vec<TabId> {
        self.state.borrow().tabs.iter().map(|t| t.id).collect()
    }

    pub fn live_groups(&self) -> Vec<TabGroup> {
        self.state.borrow().groups.clone()
    }

    pub fn group(&self, id: GroupId) -> Option<TabGroup> {
        self.state.borrow().groups.iter().find(|g| g.id == id).cloned()
    }

    pub fn color_of(&self, id: GroupId) -> String {
        COLORS[id as usize % COLORS.len()].to_string()
    }

    /// Pre-existing group, as left behind by an earlier run
    pub fn add_group(&self, window_id: WindowId, tab_ids: &[TabId]) -> GroupId {
        let mut state = self.state.borrow_mut();
        let id = state.next_group;
        state.next_group += 1;
        for tab in state.tabs.iter_mut().filter(|t| tab_ids.contains(&t.id)) {
            tab.group_id = Some(id);
        }
        state.groups.push(TabGroup {
            id,
            window_id,
            title: "Old".to_string(),
            color: self.color_of(id),
            collapsed: true,
        });
        id
    }

    /// The next `times` group_tabs calls fail with `err`
    pub fn reject_group_calls(&self, times: usize, err: PlatformError) {
        let mut state = self.state.borrow_mut();
        for _ in 0..times {
            state.group_rejections.push_back(err.clone());
        }
    }

    /// Any close request including `id` is rejected, as for a tab being dragged
    pub fn refuse_close(&self, id: TabId) {
        self.state.borrow_mut().close_refused.insert(id);
    }

    pub fn close_calls(&self) -> usize {
        self.state.borrow().close_calls
    }

    pub fn group_calls(&self) -> usize {
        self.state.borrow().group_calls
    }

    pub fn ungroup_calls(&self) -> usize {
        self.state.borrow().ungroup_calls
    }

    fn missing(&self, ids: &[TabId]) -> Option<TabId> {
        let state = self.state.borrow();
        ids.iter().copied().find(|id| !state.tabs.iter().any(|t| t.id == *id))
    }
}

#[async_trait(?Send)]
impl TabPlatform for FakePlatform {
    async fn query_tabs(&self, scope: Scope) -> Result<Vec<Tab>, PlatformError> {
        let state = self.state.borrow();
        Ok(state
            .tabs
            .iter()
            .filter(|tab| state.in_scope(tab.window_id, scope))
            .cloned()
            .collect())
    }

    async fn close_tabs(&self, ids: &[TabId]) -> Result<(), PlatformError> {
        if let Some(id) = self.missing(ids) {
            return Err(PlatformError::StaleTab(id));
        }
        let mut state = self.state.borrow_mut();
        if let Some(id) = ids.iter().find(|id| state.close_refused.contains(*id)) {
            return Err(PlatformError::Rejected(format!("Tabs cannot be edited right now: {}", id)));
        }
        state.close_calls += 1;
        state.tabs.retain(|tab| !ids.contains(&tab.id));
        state.drop_empty_groups();
        Ok(())
    }

    async fn activate_tab(&self, id: TabId) -> Result<(), PlatformError> {
        match self.missing(&[id]) {
            Some(id) => Err(PlatformError::StaleTab(id)),
            None => Ok(()),
        }
    }

    async fn group_tabs(&self, ids: &[TabId]) -> Result<GroupId, PlatformError> {
        let rejection = {
            let mut state = self.state.borrow_mut();
            state.group_calls += 1;
            state.group_rejections.pop_front()
        };
        if let Some(err) = rejection {
            return Err(err);
        }
        if let Some(id) = self.missing(ids) {
            return Err(PlatformError::StaleTab(id));
        }

        let mut state = self.state.borrow_mut();
        let id = state.next_group;
        state.next_group += 1;
        let mut window_id = state.focused;
        for tab in state.tabs.iter_mut().filter(|t| ids.contains(&t.id)) {
            tab.group_id = Some(id);
            window_id = tab.window_id;
        }
        state.groups.push(TabGroup {
            id,
            window_id,
            title: String::new(),
            color: self.color_of(id),
            collapsed: true,
        });
        state.drop_empty_groups();
        Ok(id)
    }

    async fn update_group(&self, id: GroupId, update: GroupUpdate) -> Result<(), PlatformError> {
        let mut state = self.state.borrow_mut();
        let group = state
            .groups
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| PlatformError::Rejected(format!("No group with id: {}", id)))?;
        group.title = update.title;
        group.collapsed = update.collapsed;
        Ok(())
    }

    async fn get_group(&self, id: GroupId) -> Result<TabGroup, PlatformError> {
        self.group(id)
            .ok_or_else(|| PlatformError::Rejected(format!("No group with id: {}", id)))
    }

    async fn query_groups(&self, scope: Scope) -> Result<Vec<TabGroup>, PlatformError> {
        let state = self.state.borrow();
        Ok(state
            .groups
            .iter()
            .filter(|group| state.in_scope(group.window_id, scope))
            .cloned()
            .collect())
    }

    async fn ungroup_tabs(&self, ids: &[TabId]) -> Result<(), PlatformError> {
        let mut state = self.state.borrow_mut();
        state.ungroup_calls += 1;
        for tab in state.tabs.iter_mut().filter(|t| ids.contains(&t.id)) {
            tab.group_id = None;
        }
        state.drop_empty_groups();
        Ok(())
    }

    async fn last_focused_window(&self) -> Result<Window, PlatformError> {
        Ok(Window {
            id: self.state.borrow().focused,
        })
    }
}

// ---------------------------------------------------------------- reporting

#[derive(Default)]
pub struct RecordingReporter {
    events: RefCell<Vec<RunEvent>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.borrow().clone()
    }

    pub fn stages(&self) -> Vec<RunStage> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                RunEvent::Stage(stage) => Some(*stage),
                _ => None,
            })
            .collect()
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                RunEvent::Log(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: RunEvent) {
        self.events.borrow_mut().push(event);
    }
}

pub fn classified(id: TabId, label: &str) -> ClassifiedTab {
    ClassifiedTab {
        tab: Tab::new(id, format!("https://site{}.com", id), format!("Tab {}", id), 1),
        label: label.to_string(),
        topic: String::new(),
    }
}
