/// Popup UI for Tab Grouper extension

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use patternfly_yew::prelude::*;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::console;
use yew::prelude::*;

use crate::ai::SessionManager;
use crate::bridge::{BrowserSleeper, ChromeExtractor, ChromeModelBackend, ChromePlatform, load_config};
use crate::enrichment::EnrichmentOutcome;
use crate::events::{Reporter, RunEvent, RunStage};
use crate::orchestrator::Orchestrator;
use crate::platform::TabPlatform;
use crate::tab_data::{GroupResult, TabId};
use crate::ui::components::{GroupCard, ProgressBar, RunLog};

#[derive(Clone, PartialEq)]
pub struct PopupState {
    stage: RunStage,
    running: bool,
    model_progress: Option<u8>,
    classified: Option<(usize, usize)>,
    log: Vec<String>,
    results: Vec<GroupResult>,
    enrichments: HashMap<String, EnrichmentOutcome>,
    pending_enrichment: Vec<String>,
    error: Option<String>,
}

impl Default for PopupState {
    fn default() -> Self {
        PopupState {
            stage: RunStage::Idle,
            running: false,
            model_progress: None,
            classified: None,
            log: Vec::new(),
            results: Vec::new(),
            enrichments: HashMap::new(),
            pending_enrichment: Vec::new(),
            error: None,
        }
    }
}

pub enum PopupAction {
    Started,
    EnrichmentPending(Vec<String>),
    Event(RunEvent),
}

impl Reducible for PopupState {
    type Action = PopupAction;

    fn reduce(self: Rc<Self>, action: PopupAction) -> Rc<Self> {
        let mut next = (*self).clone();
        match action {
            PopupAction::Started => {
                next = PopupState {
                    running: true,
                    ..PopupState::default()
                };
            }
            PopupAction::EnrichmentPending(labels) => next.pending_enrichment = labels,
            PopupAction::Event(event) => match event {
                RunEvent::Stage(stage) => next.stage = stage,
                RunEvent::ClassifyProgress { done, total } => next.classified = Some((done, total)),
                RunEvent::ModelProgress(percent) => next.model_progress = Some(percent),
                RunEvent::Log(line) => next.log.push(line),
                RunEvent::GroupsReady(results) => next.results = results,
                RunEvent::Enriched(outcome) => {
                    next.pending_enrichment.retain(|label| label != &outcome.label);
                    next.enrichments.insert(outcome.label.clone(), outcome);
                }
                RunEvent::Finished => next.running = false,
                RunEvent::Failed(message) => {
                    next.running = false;
                    next.error = Some(message);
                }
            },
        }
        Rc::new(next)
    }
}

/// Shared between an effect and the futures it spawns
#[derive(Clone)]
struct MountFlag(Rc<Cell<bool>>);

impl MountFlag {
    fn new() -> MountFlag {
        MountFlag(Rc::new(Cell::new(true)))
    }

    fn is_mounted(&self) -> bool {
        self.0.get()
    }

    fn unmount(&self) {
        self.0.set(false);
    }
}

/// Pushes run events into the popup's reducer
struct DispatchReporter {
    dispatcher: UseReducerDispatcher<PopupState>,
}

impl Reporter for DispatchReporter {
    fn report(&self, event: RunEvent) {
        self.dispatcher.dispatch(PopupAction::Event(event));
    }
}

#[function_component(App)]
pub fn app() -> Html {
    let state = use_reducer(PopupState::default);
    let orchestrator = use_state(|| None::<Rc<Orchestrator>>);

    // Build the pipeline on mount; release model sessions on teardown
    {
        let orchestrator = orchestrator.clone();
        let dispatcher = state.dispatcher();
        let sessions_slot = use_mut_ref(|| None::<Rc<SessionManager>>);

        use_effect_with((), move |_| {
            let slot = sessions_slot.clone();
            let mounted = MountFlag::new();
            let still_mounted = mounted.clone();
            spawn_local(async move {
                let config = load_config().await;
                // Closed while the config was loading
                if !still_mounted.is_mounted() {
                    return;
                }
                let sessions = Rc::new(SessionManager::new(
                    Rc::new(ChromeModelBackend),
                    Rc::new(BrowserSleeper),
                    config.session_settle_delay(),
                ));
                install_unload_cleanup(sessions.clone());
                *slot.borrow_mut() = Some(sessions.clone());

                let reporter = Rc::new(DispatchReporter { dispatcher });
                orchestrator.set(Some(Rc::new(Orchestrator::new(
                    Rc::new(ChromePlatform),
                    Rc::new(ChromeExtractor),
                    sessions,
                    Rc::new(BrowserSleeper),
                    reporter,
                    config,
                ))));
            });

            move || {
                mounted.unmount();
                if let Some(sessions) = sessions_slot.borrow_mut().take() {
                    sessions.cleanup();
                }
            }
        });
    }

    let on_start = {
        let orchestrator = orchestrator.clone();
        let state = state.clone();

        Callback::from(move |_| {
            if state.running {
                return;
            }
            let Some(orchestrator) = (*orchestrator).clone() else {
                return;
            };
            let dispatcher = state.dispatcher();
            dispatcher.dispatch(PopupAction::Started);

            spawn_local(async move {
                match orchestrator.run().await {
                    Ok(report) => {
                        let labels = report.enrichment.labels().iter().map(|l| l.to_string()).collect();
                        dispatcher.dispatch(PopupAction::EnrichmentPending(labels));
                        for task in report.enrichment.into_tasks() {
                            spawn_local(async move {
                                task.await;
                            });
                        }
                    }
                    Err(e) => {
                        console::log_1(&format!("Grouping failed: {}", e).into());
                    }
                }
            });
        })
    };

    let on_focus = Callback::from(move |tab_id: TabId| {
        spawn_local(async move {
            if let Err(e) = ChromePlatform.activate_tab(tab_id).await {
                console::log_1(&format!("Failed to focus tab: {}", e).into());
            }
        });
    });

    let is_busy = state.running || orchestrator.is_none();

    html! {
        <div class="padding-20">
            <h1 class="popup-title">{"Tab Grouper"}</h1>

            <Button onclick={on_start} disabled={is_busy} variant={ButtonVariant::Primary} block={true}>
                {"Organize Tabs"}
            </Button>

            // Status display
            if state.running {
                <div class="message-top-margin">
                    <p class="message-text">{state.stage.description()}</p>
                    {match (state.stage, state.model_progress, state.classified) {
                        (RunStage::EnsuringSessions, Some(percent), _) => html! {
                            <ProgressBar progress={percent} label={format!("Downloading models {}%", percent)} />
                        },
                        (RunStage::Classifying, _, Some((done, total))) if total > 0 => html! {
                            <>
                                <Progress value={(done * 100 / total) as f64} />
                                <p class="loading-text">{format!("{}/{}", done, total)}</p>
                            </>
                        },
                        _ => html! { <Spinner /> },
                    }}
                </div>
            }

            if let Some(err) = state.error.clone() {
                <div class="message-top-margin">
                    <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                        {err}
                    </Alert>
                </div>
            }

            if !state.results.is_empty() {
                <div class="stats-container">
                    <h2 class="stats-title">{"Groups"}</h2>
                    {for state.results.iter().map(|result| html! {
                        <GroupCard
                            result={result.clone()}
                            enrichment={state.enrichments.get(&result.label).cloned()}
                            pending_enrichment={state.pending_enrichment.contains(&result.label)}
                            onfocus={on_focus.clone()}
                        />
                    })}
                </div>
            }

            <RunLog lines={state.log.clone()} />

            <p class="footer-popup">
                {"Tab Grouper v0.1.0"}
            </p>
        </div>
    }
}

/// Release sessions when the popup document goes away
fn install_unload_cleanup(sessions: Rc<SessionManager>) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let on_hide = Closure::<dyn Fn()>::new(move || sessions.cleanup());
    if window
        .add_event_listener_with_callback("pagehide", on_hide.as_ref().unchecked_ref())
        .is_ok()
    {
        on_hide.forget();
    }
}
