//! Quiet-period debouncing with stale-response suppression.
//!
//! One [`Debouncer`] drives each query path: keystrokes feed the forward
//! search, map pans feed the reverse lookup. Every fired query gets a
//! sequence number and a fresh [`CancellationToken`]; firing cancels the
//! previous token first. A result is delivered only while its sequence is
//! current, its token is live, and the debouncer is open.
//!
//! ```text
//! Idle --input--> Typing --quiet period--> Querying --result--> Idle
//!                   ^  |                      |
//!                   +--+ input restarts       +--input--> Typing
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Where a debouncer is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    /// Nothing pending.
    Idle,
    /// Timer armed, waiting for the quiet period.
    Typing,
    /// A query is in flight.
    Querying,
}

/// A delivered result.
#[derive(Debug, Clone, PartialEq)]
pub struct Settled<I, T> {
    /// Sequence number of the query that produced this result.
    pub seq: u64,
    /// The input that was queried.
    pub input: I,
    /// The query's output.
    pub output: T,
}

type QueryFn<I, T> = dyn Fn(I, CancellationToken) -> BoxFuture<'static, T> + Send + Sync;

struct Inner<I> {
    state: DebounceState,
    last_fired: Option<I>,
    timer: Option<CancellationToken>,
    in_flight: Option<CancellationToken>,
    seq: u64,
    closed: bool,
}

struct Shared<I, T> {
    name: &'static str,
    quiet_period: Duration,
    inner: Mutex<Inner<I>>,
    query: Box<QueryFn<I, T>>,
    results: mpsc::UnboundedSender<Settled<I, T>>,
}

impl<I, T> Shared<I, T> {
    fn lock(&self) -> MutexGuard<'_, Inner<I>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel_pending(&self) {
        let mut inner = self.lock();
        if let Some(timer) = inner.timer.take() {
            timer.cancel();
        }
        if let Some(token) = inner.in_flight.take() {
            token.cancel();
        }
        inner.last_fired = None;
        inner.state = DebounceState::Idle;
    }

    /// Marks `seq` finished. Returns `true` if it is still current.
    fn finish(&self, seq: u64, token: &CancellationToken) -> bool {
        let mut inner = self.lock();
        let current = !inner.closed && inner.seq == seq && !token.is_cancelled();
        if current {
            inner.in_flight = None;
            if inner.state == DebounceState::Querying {
                inner.state = DebounceState::Idle;
            }
        } else {
            log::debug!("{}: dropping stale result #{seq}", self.name);
        }
        current
    }
}

impl<I: Clone + PartialEq, T> Shared<I, T> {
    /// Issues a new query for `value`, superseding any in-flight one.
    ///
    /// `timer` is the timer that elapsed, if this is a debounced firing; a
    /// timer that was replaced in the meantime must not fire. `dedupe`
    /// skips the query when `value` equals the last fired input.
    fn begin(
        &self,
        value: &I,
        timer: Option<&CancellationToken>,
        dedupe: bool,
    ) -> Option<(u64, CancellationToken)> {
        let mut inner = self.lock();
        if inner.closed {
            return None;
        }

        if let Some(timer) = timer {
            if timer.is_cancelled() {
                return None;
            }
            inner.timer = None;
        } else if let Some(pending) = inner.timer.take() {
            pending.cancel();
        }

        if dedupe && inner.last_fired.as_ref() == Some(value) {
            inner.state = if inner.in_flight.is_some() {
                DebounceState::Querying
            } else {
                DebounceState::Idle
            };
            log::debug!("{}: input unchanged, not re-querying", self.name);
            return None;
        }

        if let Some(previous) = inner.in_flight.take() {
            previous.cancel();
        }
        inner.seq += 1;
        let token = CancellationToken::new();
        inner.in_flight = Some(token.clone());
        inner.last_fired = Some(value.clone());
        inner.state = DebounceState::Querying;

        Some((inner.seq, token))
    }
}

/// Debounces inputs of type `I` into queries producing `T`.
///
/// Debounced results arrive on the receiver returned by [`Debouncer::new`].
/// Dropping the debouncer closes it.
pub struct Debouncer<I, T> {
    shared: Arc<Shared<I, T>>,
}

impl<I, T> Debouncer<I, T> {
    /// Current state.
    #[must_use]
    pub fn state(&self) -> DebounceState {
        self.shared.lock().state
    }

    /// Cancels the armed timer and any in-flight query, returning to
    /// [`DebounceState::Idle`]. The next input is queried even if it
    /// equals the last one.
    pub fn cancel(&self) {
        self.shared.cancel_pending();
    }

    /// Cancels everything. Nothing is delivered afterwards.
    pub fn close(&self) {
        self.shared.cancel_pending();
        self.shared.lock().closed = true;
    }
}

impl<I, T> Debouncer<I, T>
where
    I: Clone + PartialEq + Send + 'static,
    T: Send + 'static,
{
    /// Creates a debouncer named `name` (used in logs) that runs `query`
    /// after `quiet_period` without new input.
    ///
    /// `query` receives the input and the token for that query; it should
    /// stop early when the token is cancelled.
    pub fn new<F>(
        name: &'static str,
        quiet_period: Duration,
        query: F,
    ) -> (Self, mpsc::UnboundedReceiver<Settled<I, T>>)
    where
        F: Fn(I, CancellationToken) -> BoxFuture<'static, T> + Send + Sync + 'static,
    {
        let (results, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            name,
            quiet_period,
            inner: Mutex::new(Inner {
                state: DebounceState::Idle,
                last_fired: None,
                timer: None,
                in_flight: None,
                seq: 0,
                closed: false,
            }),
            query: Box::new(query),
            results,
        });
        (Self { shared }, rx)
    }

    /// Records new input and restarts the quiet-period timer.
    ///
    /// Must be called within a Tokio runtime.
    pub fn input(&self, value: I) {
        let timer = CancellationToken::new();
        {
            let mut inner = self.shared.lock();
            if inner.closed {
                return;
            }
            if let Some(previous) = inner.timer.replace(timer.clone()) {
                previous.cancel();
            }
            inner.state = DebounceState::Typing;
        }

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            tokio::select! {
                biased;

                () = timer.cancelled() => return,

                () = tokio::time::sleep(shared.quiet_period) => {}
            }

            let Some((seq, token)) = shared.begin(&value, Some(&timer), true) else {
                return;
            };
            let output = (shared.query)(value.clone(), token.clone()).await;

            if shared.finish(seq, &token) {
                let settled = Settled {
                    seq,
                    input: value,
                    output,
                };
                if shared.results.send(settled).is_err() {
                    log::debug!("{}: result receiver dropped", shared.name);
                }
            }
        });
    }

    /// Queries `value` immediately, bypassing the timer and the unchanged
    /// input check.
    ///
    /// The result is returned to the caller instead of the channel. `None`
    /// means the query was superseded or the debouncer closed.
    pub async fn fire_now(&self, value: I) -> Option<Settled<I, T>> {
        let (seq, token) = self.shared.begin(&value, None, false)?;
        let output = (self.shared.query)(value.clone(), token.clone()).await;

        self.shared.finish(seq, &token).then(|| Settled {
            seq,
            input: value,
            output,
        })
    }
}

impl<I, T> Drop for Debouncer<I, T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt as _;

    use super::*;

    const QUIET: Duration = Duration::from_millis(300);

    /// A query that echoes its input after a per-input delay, ignoring
    /// cancellation like a provider that can't be interrupted.
    fn echo(
        delays: &'static [(&'static str, u64)],
        calls: Arc<AtomicUsize>,
    ) -> impl Fn(String, CancellationToken) -> BoxFuture<'static, String> + Send + Sync {
        move |input, _cancel| {
            calls.fetch_add(1, Ordering::SeqCst);
            let delay = delays
                .iter()
                .find(|(name, _)| *name == input)
                .map_or(0, |(_, ms)| *ms);
            async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                input
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_quiet_period() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (debouncer, mut rx) = Debouncer::new("test", QUIET, echo(&[], calls.clone()));

        debouncer.input("P".to_string());
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.input("Pr".to_string());
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.input("Pro".to_string());

        let settled = rx.recv().await.unwrap();
        assert_eq!(settled.output, "Pro");
        assert_eq!(settled.seq, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn walks_through_states() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (debouncer, mut rx) =
            Debouncer::new("test", QUIET, echo(&[("a", 100)], calls.clone()));
        assert_eq!(debouncer.state(), DebounceState::Idle);

        debouncer.input("a".to_string());
        assert_eq!(debouncer.state(), DebounceState::Typing);

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(debouncer.state(), DebounceState::Querying);

        rx.recv().await.unwrap();
        assert_eq!(debouncer.state(), DebounceState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_input_is_not_requeried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (debouncer, mut rx) = Debouncer::new("test", QUIET, echo(&[], calls.clone()));

        debouncer.input("abc".to_string());
        rx.recv().await.unwrap();

        debouncer.input("abc".to_string());
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());
        assert_eq!(debouncer.state(), DebounceState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_slow_result_is_dropped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (debouncer, mut rx) = Debouncer::new(
            "test",
            QUIET,
            echo(&[("A", 1_000), ("B", 10)], calls.clone()),
        );

        // A fires at 300ms and would answer at 1300ms.
        debouncer.input("A".to_string());
        tokio::time::sleep(Duration::from_millis(310)).await;
        assert_eq!(debouncer.state(), DebounceState::Querying);

        // B fires at 610ms and answers first.
        debouncer.input("B".to_string());

        let settled = rx.recv().await.unwrap();
        assert_eq!(settled.output, "B");
        assert_eq!(settled.seq, 2);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_result_arriving_first_is_dropped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (debouncer, mut rx) = Debouncer::new(
            "test",
            QUIET,
            echo(&[("A", 1_000), ("B", 2_000)], calls.clone()),
        );

        debouncer.input("A".to_string());
        tokio::time::sleep(Duration::from_millis(310)).await;
        debouncer.input("B".to_string());

        // A answers at 1300ms, B at 2610ms. Only B is delivered.
        let settled = rx.recv().await.unwrap();
        assert_eq!(settled.output, "B");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn fire_now_bypasses_timer_and_dedupe() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (debouncer, mut rx) = Debouncer::new("test", QUIET, echo(&[], calls.clone()));

        debouncer.input("abc".to_string());
        rx.recv().await.unwrap();

        let settled = debouncer.fire_now("abc".to_string()).await.unwrap();
        assert_eq!(settled.output, "abc");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn fire_now_cancels_pending_timer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (debouncer, mut rx) = Debouncer::new("test", QUIET, echo(&[], calls.clone()));

        debouncer.input("typed".to_string());
        let settled = debouncer.fire_now("submitted".to_string()).await.unwrap();
        assert_eq!(settled.output, "submitted");

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn close_suppresses_in_flight_results() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (debouncer, mut rx) =
            Debouncer::new("test", QUIET, echo(&[("slow", 500)], calls.clone()));

        debouncer.input("slow".to_string());
        tokio::time::sleep(Duration::from_millis(310)).await;
        debouncer.close();
        assert_eq!(debouncer.state(), DebounceState::Idle);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());

        debouncer.input("after".to_string());
        assert_eq!(debouncer.state(), DebounceState::Idle);
        assert!(debouncer.fire_now("after".to_string()).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_allows_same_input_again() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (debouncer, mut rx) = Debouncer::new("test", QUIET, echo(&[], calls.clone()));

        debouncer.input("abc".to_string());
        rx.recv().await.unwrap();
        debouncer.cancel();

        debouncer.input("abc".to_string());
        rx.recv().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
