/// Ownership and staged start-up of the three model sessions
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, info, warn};

use super::backend::{Availability, Capability, ModelBackend, ModelSession, ProgressFn};
use crate::error::{InferenceError, SessionError};
use crate::timing::Sleeper;

/// Per-capability download percentages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressTracker {
    percent: [u8; 3],
}

impl ProgressTracker {
    /// Record a report; values are clamped to 100 and never move backwards
    pub fn record(&mut self, capability: Capability, percent: u8) {
        let slot = &mut self.percent[capability.index()];
        *slot = (*slot).max(percent.min(100));
    }

    pub fn get(&self, capability: Capability) -> u8 {
        self.percent[capability.index()]
    }

    /// Mean over all three capabilities
    pub fn overall(&self) -> u8 {
        let sum: u32 = self.percent.iter().map(|p| *p as u32).sum();
        (sum / self.percent.len() as u32) as u8
    }
}

type SessionSlots = [Option<Rc<dyn ModelSession>>; 3];

/// Sole owner of the classify, summarize and write sessions
///
/// Sessions are created lazily by `ensure_ready` and released by `cleanup`.
/// Nothing else holds a handle for longer than a single call.
pub struct SessionManager {
    backend: Rc<dyn ModelBackend>,
    sleeper: Rc<dyn Sleeper>,
    settle_delay: Duration,
    sessions: RefCell<SessionSlots>,
    progress: Rc<RefCell<ProgressTracker>>,
}

impl SessionManager {
    pub fn new(backend: Rc<dyn ModelBackend>, sleeper: Rc<dyn Sleeper>, settle_delay: Duration) -> SessionManager {
        SessionManager {
            backend,
            sleeper,
            settle_delay,
            sessions: RefCell::new([None, None, None]),
            progress: Rc::new(RefCell::new(ProgressTracker::default())),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.sessions.borrow().iter().all(Option::is_some)
    }

    pub fn session(&self, capability: Capability) -> Option<Rc<dyn ModelSession>> {
        self.sessions.borrow()[capability.index()].clone()
    }

    pub fn require(&self, capability: Capability) -> Result<Rc<dyn ModelSession>, SessionError> {
        self.session(capability).ok_or(SessionError::NotReady(capability))
    }

    /// Make every session usable, creating only the ones that are missing.
    ///
    /// When any model still has to be downloaded, sessions are created one
    /// after another with a settling pause in between, since parallel
    /// downloads throttle each other. The first failure aborts the sequence
    /// and leaves the remaining slots empty.
    pub async fn ensure_ready(&self, on_progress: ProgressFn) -> Result<(), SessionError> {
        let missing: Vec<Capability> = Capability::ALL
            .into_iter()
            .filter(|cap| self.session(*cap).is_none())
            .collect();

        if missing.is_empty() {
            debug!("All model sessions already initialized");
            return Ok(());
        }

        let mut needs_download = false;
        for capability in &missing {
            let availability = self
                .backend
                .availability(*capability)
                .await
                .map_err(|source| SessionError::Probe {
                    capability: *capability,
                    source,
                })?;
            debug!("{} model availability: {:?}", capability, availability);

            match availability {
                Availability::Ready => {}
                Availability::NeedsDownload => needs_download = true,
                Availability::Unavailable => {
                    return Err(SessionError::Create {
                        capability: *capability,
                        source: InferenceError::Unavailable(*capability),
                    });
                }
            }
        }

        if needs_download {
            info!("Downloading models sequentially: {:?}", missing);
            for (i, capability) in missing.iter().enumerate() {
                if i > 0 {
                    self.sleeper.sleep(self.settle_delay).await;
                }
                self.create(*capability, on_progress.clone()).await?;
            }
        } else {
            info!("Models ready, creating {} sessions", missing.len());
            let results = join_all(
                missing
                    .iter()
                    .map(|capability| self.create(*capability, on_progress.clone())),
            )
            .await;
            results.into_iter().collect::<Result<Vec<()>, SessionError>>()?;
        }

        Ok(())
    }

    async fn create(&self, capability: Capability, on_progress: ProgressFn) -> Result<(), SessionError> {
        let tracker = self.progress.clone();
        let listener = on_progress.clone();
        let report: ProgressFn = Rc::new(move |percent: u8| {
            let overall = {
                let mut tracker = tracker.borrow_mut();
                tracker.record(capability, percent);
                tracker.overall()
            };
            listener(overall);
        });

        let session = self
            .backend
            .create_session(capability, report.clone())
            .await
            .map_err(|source| {
                warn!("Creating {} session failed: {}", capability, source);
                SessionError::Create { capability, source }
            })?;

        report(100);
        self.sessions.borrow_mut()[capability.index()] = Some(session);
        debug!("{} session created", capability);
        Ok(())
    }

    /// Destroy every held session. Safe to call any number of times.
    pub fn cleanup(&self) {
        let released: Vec<Rc<dyn ModelSession>> = self
            .sessions
            .borrow_mut()
            .iter_mut()
            .filter_map(Option::take)
            .collect();

        for session in &released {
            session.destroy();
        }
        if !released.is_empty() {
            info!("Released {} model sessions", released.len());
        }
        *self.progress.borrow_mut() = ProgressTracker::default();
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.cleanup();
    }
}
