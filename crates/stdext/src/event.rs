//
// event.rs
//
// Copyright (C) 2023 Posit Software, PBC. All rights reserved.
//
//

use std::sync::Condvar;
use std::sync::Mutex;
use std::time::Duration;

/// A one-shot, level-triggered signal. Once set, an event stays set; every
/// current and future waiter observes it.
#[derive(Default, Debug)]
pub struct Event {
    state: Mutex<bool>,
    condvar: Condvar,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the event, waking all waiters. Returns `true` if this call was
    /// the one that set it (the event was not already set).
    pub fn set(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        let newly_set = !*state;
        *state = true;
        self.condvar.notify_all();
        newly_set
    }

    pub fn is_set(&self) -> bool {
        *self.state.lock().unwrap()
    }

    /// Blocks until the event is set.
    pub fn wait(&self) {
        let mut state = self.state.lock().unwrap();
        while !*state {
            state = self.condvar.wait(state).unwrap();
        }
    }

    /// Blocks until the event is set or the timeout elapses. Returns whether
    /// the event was set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let state = self.state.lock().unwrap();
        let (state, _) = self
            .condvar
            .wait_timeout_while(state, timeout, |set| !*set)
            .unwrap();
        *state
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_set_and_wait() {
        let event = Arc::new(Event::new());
        assert!(!event.is_set());

        let waiter = {
            let event = event.clone();
            std::thread::spawn(move || event.wait())
        };

        assert!(event.set());
        assert!(!event.set());
        waiter.join().unwrap();
        assert!(event.is_set());
    }

    #[test]
    fn test_wait_timeout() {
        let event = Event::new();
        assert!(!event.wait_timeout(Duration::from_millis(10)));
        event.set();
        assert!(event.wait_timeout(Duration::from_millis(10)));
    }
}
