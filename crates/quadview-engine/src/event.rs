//! Window events as seen by the frame loop.
//!
//! The runtime translates platform events into `Event`s and queues them; the
//! frame loop drains the queue at the start of every iteration.

use std::collections::VecDeque;

/// Platform-agnostic window event.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Event {
    /// The user asked to close the window.
    Quit,
    /// The drawable size changed, in physical pixels.
    Resized { width: u32, height: u32 },
}

/// Non-blocking event source.
pub trait EventSource {
    /// Returns the next pending event, or `None` when the queue is empty.
    fn poll_event(&mut self) -> Option<Event>;
}

/// FIFO event queue filled by the runtime.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSource for EventQueue {
    fn poll_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }
}

impl FromIterator<Event> for EventQueue {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_arrival_order() {
        let mut q: EventQueue = [
            Event::Resized { width: 800, height: 600 },
            Event::Quit,
        ]
        .into_iter()
        .collect();

        assert_eq!(q.len(), 2);
        assert_eq!(q.poll_event(), Some(Event::Resized { width: 800, height: 600 }));
        assert_eq!(q.poll_event(), Some(Event::Quit));
        assert_eq!(q.poll_event(), None);
        assert!(q.is_empty());
    }
}
