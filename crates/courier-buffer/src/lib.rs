use std::sync::Mutex;
use std::time::Duration;

use courier_core::types::Event;
use tokio::sync::Notify;

/// Per-chat message buffer with trailing-edge debounce.
///
/// Events added within `debounce_delay` of each other are coalesced into a
/// single batch. A caller parked in `wait_and_drain` only returns once a
/// full debounce window has elapsed with no new arrivals.
pub struct MessageBuffer {
    events: Mutex<Vec<Event>>,
    notify: Notify,
    debounce_delay: Duration,
}

impl MessageBuffer {
    pub fn new(debounce_delay: Duration) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            notify: Notify::new(),
            debounce_delay,
        }
    }

    /// Append an event and wake any waiter.
    pub fn add(&self, event: Event) {
        self.events.lock().unwrap().push(event);
        self.notify.notify_one();
    }

    /// Re-queue events (e.g. after a failed processing attempt) and wake any waiter.
    pub fn append(&self, mut events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        self.events.lock().unwrap().append(&mut events);
        self.notify.notify_one();
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap().is_empty()
    }

    /// Block until at least one event is present, then wait for a silent
    /// `debounce_delay` window before draining and returning the full batch.
    pub async fn wait_and_drain(&self) -> Vec<Event> {
        loop {
            if !self.is_empty() {
                break;
            }
            self.notify.notified().await;
        }
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Arm the waiter before checking, to avoid losing a concurrent `add`.
            notified.as_mut().enable();
            match tokio::time::timeout(self.debounce_delay, notified).await {
                Ok(_) => continue,
                Err(_elapsed) => break,
            }
        }
        let mut guard = self.events.lock().unwrap();
        std::mem::take(&mut *guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn batches_events_added_within_the_window() {
        let buf = Arc::new(MessageBuffer::new(Duration::from_millis(50)));
        let b2 = buf.clone();
        let handle = tokio::spawn(async move { b2.wait_and_drain().await });

        tokio::time::sleep(Duration::from_millis(5)).await;
        buf.add(Event::new("one", "alice", "chat1", 1));
        tokio::time::sleep(Duration::from_millis(10)).await;
        buf.add(Event::new("two", "alice", "chat1", 2));

        let drained = handle.await.unwrap();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].text, "one");
        assert_eq!(drained[1].text, "two");
    }

    #[tokio::test]
    async fn is_empty_after_drain_until_next_add() {
        let buf = MessageBuffer::new(Duration::from_millis(20));
        buf.add(Event::new("hi", "bob", "chat1", 1));
        assert!(!buf.is_empty());
        let drained = buf.wait_and_drain().await;
        assert_eq!(drained.len(), 1);
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn silent_gap_terminates_the_wait() {
        let buf = MessageBuffer::new(Duration::from_millis(15));
        buf.add(Event::new("hi", "bob", "chat1", 1));
        let start = tokio::time::Instant::now();
        let drained = buf.wait_and_drain().await;
        assert_eq!(drained.len(), 1);
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[tokio::test]
    async fn append_requeues_and_wakes_a_waiter() {
        let buf = Arc::new(MessageBuffer::new(Duration::from_millis(20)));
        let b2 = buf.clone();
        let handle = tokio::spawn(async move { b2.wait_and_drain().await });
        tokio::time::sleep(Duration::from_millis(5)).await;
        buf.append(vec![Event::new("retry", "bob", "chat1", 9)]);
        let drained = handle.await.unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].text, "retry");
    }
}
