/// Delay and timeout primitives with an injectable clock
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{self, Either};
use futures::pin_mut;

#[async_trait(?Send)]
pub trait Sleeper {
    async fn sleep(&self, duration: Duration);
}

/// Run `fut`, giving up after `limit`; None means it timed out.
///
/// The work future is polled first, so work that is already complete wins
/// over a timer that is also ready.
pub async fn with_timeout<F, T>(sleeper: &dyn Sleeper, limit: Duration, fut: F) -> Option<T>
where
    F: Future<Output = T>,
{
    let timer = sleeper.sleep(limit);
    pin_mut!(fut);
    match future::select(fut, timer).await {
        Either::Left((value, _)) => Some(value),
        Either::Right(((), _)) => None,
    }
}
