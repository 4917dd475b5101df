//! Grounded on `bc::async::sleep::async_sleep_awaiter`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use crate::scheduler::{self, TimerToken};

/// Suspends the current task until `Instant::now() >= deadline`.
pub struct Sleep {
    deadline: Instant,
    token: Option<TimerToken>,
}

impl Sleep {
    #[must_use]
    pub fn until(deadline: Instant) -> Self {
        Self { deadline, token: None }
    }
}

/// Suspends the current task for `duration`, matching `async_sleep`.
#[must_use]
pub fn async_sleep(duration: Duration) -> Sleep {
    Sleep::until(Instant::now() + duration)
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if Instant::now() >= this.deadline {
            return Poll::Ready(());
        }
        if this.token.is_none() {
            let deadline = this.deadline;
            let waker = cx.waker().clone();
            this.token = Some(scheduler::with_default(|s| s.post_timer(deadline, waker)));
        }
        Poll::Pending
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            scheduler::with_default(|s| s.cancel_timer(&token));
        }
    }
}
