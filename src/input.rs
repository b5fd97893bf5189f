//! Input events, key codes, and the bounded-wait event source seam.
//!
//! The input loop consumes events through [`InputSource::next_event`], a
//! blocking call with a timeout. The desktop front end feeds a [`KeyQueue`]
//! from the simulator window; a device build would wrap evdev behind the same
//! trait and log-and-skip read errors as timeouts.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

// =============================================================================
// Key Codes
// =============================================================================

/// Power button (Linux `KEY_POWER`).
pub const KEY_POWER: u16 = 116;

/// RTC wake-alarm pseudo key. The platform repurposes the `KEY_BRL_DOT8`
/// slot to signal that the wake alarm fired while powered off.
pub const KEY_WAKE_ALARM: u16 = 505;

// =============================================================================
// Events
// =============================================================================

/// One key event. `value` follows evdev conventions: nonzero is a press,
/// zero a release.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputEvent {
    pub code: u16,
    pub value: i32,
}

impl InputEvent {
    pub const fn down(code: u16) -> Self {
        Self { code, value: 1 }
    }

    pub const fn up(code: u16) -> Self {
        Self { code, value: 0 }
    }

    pub const fn pressed(&self) -> bool {
        self.value != 0
    }
}

/// Blocking "next event within timeout" source. `None` means the wait timed
/// out with no event.
pub trait InputSource {
    fn next_event(&self, timeout: Duration) -> Option<InputEvent>;
}

// =============================================================================
// Key Queue
// =============================================================================

/// Condvar-backed event queue. Producers push from the window pump (or a
/// device event reader thread); the input loop blocks on `next_event`.
pub struct KeyQueue {
    queue: Mutex<VecDeque<InputEvent>>,
    available: Condvar,
}

impl KeyQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    pub fn push(&self, event: InputEvent) {
        self.queue.lock().unwrap().push_back(event);
        self.available.notify_one();
    }

    pub fn clear(&self) {
        self.queue.lock().unwrap().clear();
    }
}

impl Default for KeyQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for KeyQueue {
    fn next_event(&self, timeout: Duration) -> Option<InputEvent> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.queue.lock().unwrap();
        loop {
            if let Some(event) = queue.pop_front() {
                return Some(event);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _timed_out) = self
                .available
                .wait_timeout(queue, deadline - now)
                .unwrap();
            queue = guard;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_event_returned_in_order() {
        let queue = KeyQueue::new();
        queue.push(InputEvent::down(KEY_POWER));
        queue.push(InputEvent::up(KEY_POWER));

        let first = queue.next_event(Duration::from_millis(10)).unwrap();
        let second = queue.next_event(Duration::from_millis(10)).unwrap();
        assert_eq!(first, InputEvent::down(KEY_POWER));
        assert_eq!(second, InputEvent::up(KEY_POWER));
        assert!(first.pressed());
        assert!(!second.pressed());
    }

    #[test]
    fn test_empty_queue_times_out() {
        let queue = KeyQueue::new();
        let start = Instant::now();
        let result = queue.next_event(Duration::from_millis(30));
        assert!(result.is_none(), "Empty queue must time out");
        assert!(
            start.elapsed() >= Duration::from_millis(30),
            "Timeout must actually elapse, not return early"
        );
    }

    #[test]
    fn test_push_wakes_blocked_waiter() {
        use std::sync::Arc;

        let queue = Arc::new(KeyQueue::new());
        let producer = queue.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.push(InputEvent::down(KEY_WAKE_ALARM));
        });

        let event = queue.next_event(Duration::from_secs(5));
        handle.join().unwrap();
        assert_eq!(
            event,
            Some(InputEvent::down(KEY_WAKE_ALARM)),
            "Waiter must wake on push well before the timeout"
        );
    }

    #[test]
    fn test_clear_discards_pending_events() {
        let queue = KeyQueue::new();
        queue.push(InputEvent::down(KEY_POWER));
        queue.clear();
        assert!(queue.next_event(Duration::from_millis(5)).is_none());
    }
}
