//! Timestamp sources.
//!
//! A [`TimestampSource`] hands out the logical time stamped onto every row
//! written by an exchange. Values must be at least 1 and must never repeat;
//! [`Monotonic`] enforces both on top of any raw source.

use crate::types::Timestamp;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Supplies logical timestamps. Shared by all in-flight exchanges.
pub trait TimestampSource: Send + Sync {
    /// Returns the next timestamp.
    fn next(&self) -> Timestamp;

    /// Reports a timestamp already present in storage.
    ///
    /// Sources that can honour it never yield a value at or below `seen`
    /// afterwards. The default ignores it.
    fn observe(&self, _seen: Timestamp) {}
}

impl<S: TimestampSource + ?Sized> TimestampSource for Arc<S> {
    fn next(&self) -> Timestamp {
        (**self).next()
    }

    fn observe(&self, seen: Timestamp) {
        (**self).observe(seen);
    }
}

impl<S: TimestampSource + ?Sized> TimestampSource for Box<S> {
    fn next(&self) -> Timestamp {
        (**self).next()
    }

    fn observe(&self, seen: Timestamp) {
        (**self).observe(seen);
    }
}

/// Wall-clock UNIX seconds.
///
/// Several exchanges within one second share a raw value; wrap it in
/// [`Monotonic`] before use.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimestampSource for SystemClock {
    fn next(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| {
                i64::try_from(elapsed.as_secs()).unwrap_or(Timestamp::MAX)
            })
    }
}

/// Counter that increments by one per call.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    current: AtomicI64,
}

impl SequenceCounter {
    /// Creates a counter whose first value is `start + 1`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: AtomicI64::new(start),
        }
    }

    /// Returns the last value handed out (or the start value).
    pub fn current(&self) -> Timestamp {
        self.current.load(Ordering::SeqCst)
    }
}

impl TimestampSource for SequenceCounter {
    fn next(&self) -> Timestamp {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn observe(&self, seen: Timestamp) {
        self.current.fetch_max(seen, Ordering::SeqCst);
    }
}

/// Always returns the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl TimestampSource for FixedClock {
    fn next(&self) -> Timestamp {
        self.0
    }
}

/// Adapts a closure into a timestamp source.
///
/// ```
/// use deltasync_core::clock::{from_fn, TimestampSource};
///
/// let source = from_fn(|| 42);
/// assert_eq!(source.next(), 42);
/// ```
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: Fn() -> Timestamp + Send + Sync,
{
    FromFn(f)
}

/// Source returned by [`from_fn`].
#[derive(Clone, Copy)]
pub struct FromFn<F>(F);

impl<F> std::fmt::Debug for FromFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FromFn").finish_non_exhaustive()
    }
}

impl<F> TimestampSource for FromFn<F>
where
    F: Fn() -> Timestamp + Send + Sync,
{
    fn next(&self) -> Timestamp {
        (self.0)()
    }
}

/// Makes any source strictly increasing and positive.
///
/// Each value is `max(raw, last + 1, 1)` where `last` is the greatest value
/// yielded or observed so far. Concurrent callers never receive the same
/// value.
#[derive(Debug)]
pub struct Monotonic<S> {
    inner: S,
    last: AtomicI64,
}

impl<S: TimestampSource> Monotonic<S> {
    /// Wraps a source.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            last: AtomicI64::new(0),
        }
    }

    /// Returns the greatest value yielded or observed so far.
    pub fn last(&self) -> Timestamp {
        self.last.load(Ordering::SeqCst)
    }

    /// Returns the wrapped source.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: TimestampSource> TimestampSource for Monotonic<S> {
    fn next(&self) -> Timestamp {
        let raw = self.inner.next();
        let mut last = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = raw.max(last.saturating_add(1)).max(1);
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => {
                    if raw < 1 {
                        warn!("Timestamp source yielded {}, using {}", raw, candidate);
                    } else if candidate != raw {
                        debug!("Timestamp {} not after {}, using {}", raw, last, candidate);
                    }
                    return candidate;
                }
                Err(actual) => last = actual,
            }
        }
    }

    fn observe(&self, seen: Timestamp) {
        self.inner.observe(seen);
        self.last.fetch_max(seen, Ordering::SeqCst);
    }
}
