#![forbid(unsafe_code)]

//! Frame-synced debouncing of reflow notifications.
//!
//! A [`ReflowNotifier`] wraps a target callback. Each [`notify`] cancels the
//! previously scheduled, not-yet-fired delivery and schedules a new one at
//! the next frame boundary, so a burst of notifications within one frame
//! collapses into a single delivery carrying the latest arguments.
//!
//! The delivery runs inside [`FlushSync::flush_sync`]: any state the target
//! updates is committed by the host before the frame callback returns.
//!
//! # Failure Modes
//!
//! - **Delivery after teardown**: the scheduled callback only holds a weak
//!   reference. Once every notifier handle is dropped (or [`cancel`] ran),
//!   a late frame is a traced no-op.
//! - **Superseded delivery**: each callback knows its own request id and
//!   fires only while it is still the pending request, so a scheduler that
//!   runs a cancelled callback anyway cannot deliver stale arguments.
//!
//! [`notify`]: ReflowNotifier::notify
//! [`cancel`]: ReflowNotifier::cancel

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::frame::{FrameRequestId, FrameScheduler};

/// Host primitive that commits state changes synchronously.
pub trait FlushSync {
    /// Run `update`, then apply every state change it caused (re-render and
    /// post-render effects) before returning.
    fn flush_sync(&self, update: Box<dyn FnOnce() + '_>);
}

/// [`FlushSync`] that runs the update and commits nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateFlush;

impl FlushSync for ImmediateFlush {
    fn flush_sync(&self, update: Box<dyn FnOnce() + '_>) {
        update();
    }
}

/// Counters for a [`ReflowNotifier`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReflowStats {
    /// Calls to `notify`.
    pub notifications: u64,
    /// Target invocations.
    pub deliveries: u64,
    /// Scheduled deliveries replaced by a newer `notify`.
    pub coalesced: u64,
    /// Scheduled deliveries dropped by `cancel`.
    pub cancelled: u64,
}

struct NotifierInner<A> {
    scheduler: Rc<dyn FrameScheduler>,
    flusher: Rc<dyn FlushSync>,
    target: Box<dyn Fn(A)>,
    pending: Cell<Option<FrameRequestId>>,
    stats: Cell<ReflowStats>,
}

impl<A> NotifierInner<A> {
    fn bump(&self, f: impl FnOnce(&mut ReflowStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    /// Fire the delivery scheduled as `request`. A delivery that is no longer
    /// the pending one was superseded or cancelled and is skipped.
    fn fire(&self, request: Option<FrameRequestId>, args: A) {
        if request.is_some() && self.pending.get() != request {
            trace!(
                request = ?request.map(FrameRequestId::get),
                "superseded reflow delivery skipped"
            );
            return;
        }
        self.pending.set(None);
        self.bump(|s| s.deliveries += 1);
        self.flusher.flush_sync(Box::new(|| (self.target)(args)));
    }
}

/// Debounces calls to a target onto the next frame boundary.
///
/// Cloning creates a new handle to the same debouncer.
pub struct ReflowNotifier<A> {
    inner: Rc<NotifierInner<A>>,
}

impl<A: 'static> ReflowNotifier<A> {
    pub fn new(
        scheduler: Rc<dyn FrameScheduler>,
        flusher: Rc<dyn FlushSync>,
        target: impl Fn(A) + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(NotifierInner {
                scheduler,
                flusher,
                target: Box::new(target),
                pending: Cell::new(None),
                stats: Cell::new(ReflowStats::default()),
            }),
        }
    }

    /// Schedule delivery of `args` at the next frame, replacing any pending
    /// delivery.
    pub fn notify(&self, args: A) {
        let inner = &self.inner;
        inner.bump(|s| s.notifications += 1);
        if let Some(id) = inner.pending.take() {
            inner.scheduler.cancel_frame(id);
            inner.bump(|s| s.coalesced += 1);
            trace!(request = id.get(), "coalesced pending reflow");
        }

        let weak: Weak<NotifierInner<A>> = Rc::downgrade(inner);
        let request: Rc<Cell<Option<FrameRequestId>>> = Rc::new(Cell::new(None));
        let own = Rc::clone(&request);
        let id = inner.scheduler.request_frame(Box::new(move || match weak.upgrade() {
            Some(inner) => inner.fire(own.get(), args),
            None => trace!("reflow delivery after teardown ignored"),
        }));
        request.set(Some(id));
        inner.pending.set(Some(id));
    }

    /// Drop the pending delivery, if any.
    pub fn cancel(&self) {
        if let Some(id) = self.inner.pending.take() {
            self.inner.scheduler.cancel_frame(id);
            self.inner.bump(|s| s.cancelled += 1);
        }
    }
}

impl<A> ReflowNotifier<A> {
    /// Whether a delivery is scheduled and has not fired.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.pending.get().is_some()
    }

    #[must_use]
    pub fn stats(&self) -> ReflowStats {
        self.inner.stats.get()
    }
}

impl<A> Clone for ReflowNotifier<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A> fmt::Debug for ReflowNotifier<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflowNotifier")
            .field("pending", &self.inner.pending.get())
            .field("stats", &self.inner.stats.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameClock;
    use std::cell::RefCell;

    fn recording_notifier(clock: &FrameClock) -> (ReflowNotifier<u32>, Rc<RefCell<Vec<u32>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let notifier = ReflowNotifier::new(
            Rc::new(clock.clone()),
            Rc::new(ImmediateFlush),
            move |value| sink.borrow_mut().push(value),
        );
        (notifier, seen)
    }

    #[test]
    fn burst_collapses_to_latest() {
        let clock = FrameClock::new();
        let (notifier, seen) = recording_notifier(&clock);
        for i in 1..=5 {
            notifier.notify(i);
        }
        assert!(seen.borrow().is_empty());
        assert_eq!(clock.pending_count(), 1);

        clock.run_frame();
        assert_eq!(*seen.borrow(), vec![5]);
        let stats = notifier.stats();
        assert_eq!(stats.notifications, 5);
        assert_eq!(stats.deliveries, 1);
        assert_eq!(stats.coalesced, 4);
        assert!(!notifier.is_pending());
    }

    #[test]
    fn separate_frames_deliver_separately() {
        let clock = FrameClock::new();
        let (notifier, seen) = recording_notifier(&clock);
        notifier.notify(1);
        clock.run_frame();
        notifier.notify(2);
        clock.run_frame();
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn cancel_drops_pending_delivery() {
        let clock = FrameClock::new();
        let (notifier, seen) = recording_notifier(&clock);
        notifier.notify(1);
        notifier.cancel();
        clock.run_frame();
        assert!(seen.borrow().is_empty());
        assert_eq!(notifier.stats().cancelled, 1);
    }

    #[test]
    fn dropped_notifier_makes_late_frame_a_noop() {
        let clock = FrameClock::new();
        let (notifier, seen) = recording_notifier(&clock);
        notifier.notify(7);
        drop(notifier);
        assert_eq!(clock.run_frame(), 1);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn delivery_runs_inside_flush() {
        struct Recording(Rc<RefCell<Vec<&'static str>>>);
        impl FlushSync for Recording {
            fn flush_sync(&self, update: Box<dyn FnOnce() + '_>) {
                self.0.borrow_mut().push("begin");
                update();
                self.0.borrow_mut().push("commit");
            }
        }

        let clock = FrameClock::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let target_log = Rc::clone(&log);
        let notifier = ReflowNotifier::new(
            Rc::new(clock.clone()),
            Rc::new(Recording(Rc::clone(&log))),
            move |_: ()| target_log.borrow_mut().push("target"),
        );
        notifier.notify(());
        clock.run_frame();
        assert_eq!(*log.borrow(), vec!["begin", "target", "commit"]);
    }

    #[test]
    fn renotify_from_inside_a_frame_delivers_once() {
        let clock = FrameClock::new();
        let (notifier, seen) = recording_notifier(&clock);

        // Requested before the notifier's own frame, so it runs first.
        let early = notifier.clone();
        clock.request_frame(Box::new(move || early.notify(2)));
        notifier.notify(1);

        clock.run_frame();
        assert!(seen.borrow().is_empty());
        assert!(notifier.is_pending());

        notifier.notify(3);
        clock.run_frame();
        assert_eq!(*seen.borrow(), vec![3]);
        assert_eq!(notifier.stats().deliveries, 1);
        assert!(!notifier.is_pending());
    }

    #[test]
    fn ignored_cancel_still_delivers_latest_only() {
        struct NoCancel(FrameClock);
        impl FrameScheduler for NoCancel {
            fn request_frame(&self, callback: Box<dyn FnOnce()>) -> FrameRequestId {
                self.0.request_frame(callback)
            }
            fn cancel_frame(&self, _id: FrameRequestId) {}
        }

        let clock = FrameClock::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let notifier = ReflowNotifier::new(
            Rc::new(NoCancel(clock.clone())),
            Rc::new(ImmediateFlush),
            move |value: u32| sink.borrow_mut().push(value),
        );
        notifier.notify(1);
        notifier.notify(2);
        assert_eq!(clock.run_frame(), 2);
        assert_eq!(*seen.borrow(), vec![2]);

        notifier.notify(3);
        notifier.cancel();
        clock.run_frame();
        assert_eq!(*seen.borrow(), vec![2]);
    }

    #[test]
    fn notify_from_target_schedules_next_frame() {
        let clock = FrameClock::new();
        let slot: Rc<RefCell<Option<ReflowNotifier<u32>>>> = Rc::new(RefCell::new(None));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (slot_ref, sink) = (Rc::clone(&slot), Rc::clone(&seen));
        let notifier = ReflowNotifier::new(
            Rc::new(clock.clone()),
            Rc::new(ImmediateFlush),
            move |value: u32| {
                sink.borrow_mut().push(value);
                if value < 3 {
                    if let Some(n) = slot_ref.borrow().as_ref() {
                        n.notify(value + 1);
                    }
                }
            },
        );
        *slot.borrow_mut() = Some(notifier.clone());

        notifier.notify(1);
        assert_eq!(clock.run_until_idle(10), 3);
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
        slot.borrow_mut().take();
    }
}
