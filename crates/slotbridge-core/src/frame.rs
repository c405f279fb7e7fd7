#![forbid(unsafe_code)]

//! Frame-boundary scheduling.
//!
//! [`FrameScheduler`] is the host's "run this at the next paint" primitive
//! (a browser's `requestAnimationFrame` / `cancelAnimationFrame` pair, or a
//! native event loop's vsync hook). [`FrameClock`] is a deterministic,
//! host-driven implementation: nothing runs until the host calls
//! [`FrameClock::run_frame`] from its own loop.
//!
//! ```text
//! host loop
//!   → run_frame()   // every callback requested before this frame began
//!   → paint
//! ```
//!
//! Callbacks requested while a frame is running are deferred to the next
//! frame, matching animation-frame semantics.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

/// Handle for a pending frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameRequestId(u64);

impl FrameRequestId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Host primitive for deferring work to the next frame boundary.
pub trait FrameScheduler {
    /// Run `callback` once at the next frame boundary.
    fn request_frame(&self, callback: Box<dyn FnOnce()>) -> FrameRequestId;

    /// Drop a request that has not fired yet. Unknown or already-fired ids
    /// are ignored.
    fn cancel_frame(&self, id: FrameRequestId);
}

struct ClockInner {
    next_id: u64,
    frame_idx: u64,
    pending: BTreeMap<FrameRequestId, Box<dyn FnOnce()>>,
}

/// Deterministic frame scheduler driven by explicit [`run_frame`] calls.
///
/// Cloning creates a new handle to the same clock.
///
/// [`run_frame`]: FrameClock::run_frame
#[derive(Clone)]
pub struct FrameClock {
    inner: Rc<RefCell<ClockInner>>,
}

impl FrameClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ClockInner {
                next_id: 1,
                frame_idx: 0,
                pending: BTreeMap::new(),
            })),
        }
    }

    /// Run one frame: fire every callback requested before this call, in
    /// request order. Returns how many callbacks ran.
    ///
    /// No internal borrow is held while callbacks run, so they may request
    /// or cancel frames. New requests land in the next frame; a cancel
    /// issued by an earlier callback skips a later one due in this frame.
    pub fn run_frame(&self) -> usize {
        let (frame_idx, due) = {
            let mut inner = self.inner.borrow_mut();
            inner.frame_idx += 1;
            let due: Vec<FrameRequestId> = inner.pending.keys().copied().collect();
            (inner.frame_idx, due)
        };
        trace!(frame_idx, due = due.len(), "running frame");
        let mut count = 0;
        for id in due {
            let callback = self.inner.borrow_mut().pending.remove(&id);
            if let Some(callback) = callback {
                callback();
                count += 1;
            }
        }
        count
    }

    /// Run frames until nothing is pending, up to `max_frames`. Returns the
    /// number of frames run.
    pub fn run_until_idle(&self, max_frames: usize) -> usize {
        let mut frames = 0;
        while frames < max_frames && self.pending_count() > 0 {
            self.run_frame();
            frames += 1;
        }
        frames
    }

    /// Requests waiting for the next frame.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    /// Frames run so far.
    #[must_use]
    pub fn frame_idx(&self) -> u64 {
        self.inner.borrow().frame_idx
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrameClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("FrameClock")
            .field("frame_idx", &inner.frame_idx)
            .field("pending", &inner.pending.len())
            .finish()
    }
}

impl FrameScheduler for FrameClock {
    fn request_frame(&self, callback: Box<dyn FnOnce()>) -> FrameRequestId {
        let mut inner = self.inner.borrow_mut();
        let id = FrameRequestId(inner.next_id);
        inner.next_id += 1;
        inner.pending.insert(id, callback);
        id
    }

    fn cancel_frame(&self, id: FrameRequestId) {
        self.inner.borrow_mut().pending.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn nothing_runs_before_frame() {
        let clock = FrameClock::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        clock.request_frame(Box::new(move || h.set(h.get() + 1)));
        assert_eq!(hits.get(), 0);
        assert_eq!(clock.pending_count(), 1);

        assert_eq!(clock.run_frame(), 1);
        assert_eq!(hits.get(), 1);
        assert_eq!(clock.pending_count(), 0);
        assert_eq!(clock.frame_idx(), 1);
    }

    #[test]
    fn cancelled_request_never_fires() {
        let clock = FrameClock::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let id = clock.request_frame(Box::new(move || h.set(h.get() + 1)));
        clock.cancel_frame(id);
        assert_eq!(clock.run_frame(), 0);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn cancel_after_fire_is_ignored() {
        let clock = FrameClock::new();
        let id = clock.request_frame(Box::new(|| {}));
        clock.run_frame();
        clock.cancel_frame(id);
        assert_eq!(clock.pending_count(), 0);
    }

    #[test]
    fn callbacks_run_in_request_order() {
        let clock = FrameClock::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in ['A', 'B', 'C'] {
            let log = Rc::clone(&log);
            clock.request_frame(Box::new(move || log.borrow_mut().push(tag)));
        }
        clock.run_frame();
        assert_eq!(*log.borrow(), vec!['A', 'B', 'C']);
    }

    #[test]
    fn request_during_frame_waits_for_next_frame() {
        let clock = FrameClock::new();
        let hits = Rc::new(Cell::new(0));
        let inner_clock = clock.clone();
        let h = Rc::clone(&hits);
        clock.request_frame(Box::new(move || {
            let h = Rc::clone(&h);
            inner_clock.request_frame(Box::new(move || h.set(h.get() + 1)));
        }));

        clock.run_frame();
        assert_eq!(hits.get(), 0);
        assert_eq!(clock.pending_count(), 1);

        clock.run_frame();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn cancel_from_earlier_callback_skips_later_one() {
        let clock = FrameClock::new();
        let hits = Rc::new(Cell::new(0));
        let victim: Rc<Cell<Option<FrameRequestId>>> = Rc::new(Cell::new(None));

        let (canceller, target) = (clock.clone(), Rc::clone(&victim));
        clock.request_frame(Box::new(move || {
            if let Some(id) = target.get() {
                canceller.cancel_frame(id);
            }
        }));
        let h = Rc::clone(&hits);
        victim.set(Some(clock.request_frame(Box::new(move || h.set(h.get() + 1)))));

        assert_eq!(clock.run_frame(), 1);
        assert_eq!(hits.get(), 0);
        assert_eq!(clock.pending_count(), 0);
    }

    #[test]
    fn run_until_idle_is_bounded() {
        let clock = FrameClock::new();
        fn reschedule(clock: FrameClock) {
            let next = clock.clone();
            clock.request_frame(Box::new(move || reschedule(next)));
        }
        reschedule(clock.clone());
        assert_eq!(clock.run_until_idle(5), 5);
        assert_eq!(clock.pending_count(), 1);
    }
}
