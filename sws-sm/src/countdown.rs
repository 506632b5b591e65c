//! Once-per-tick countdown
//!
//! Starting at 3 the displays are `3`, `2`, `1`, then the terminal message,
//! and completion fires on the following tick.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::debug;

use crate::error::{MeterError, Result};

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);
pub const DEFAULT_ZERO_MESSAGE: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountdownEvent {
    Display(String),
    Done,
}

#[derive(Debug, Clone)]
pub struct Countdown {
    from: u32,
    zero_message: String,
    tick: Duration,
}

impl Countdown {
    pub fn new(from: u32) -> Self {
        Self {
            from,
            zero_message: DEFAULT_ZERO_MESSAGE.to_string(),
            tick: DEFAULT_TICK,
        }
    }

    /// Text shown when the count reaches zero (e.g. "GO!")
    pub fn zero_message(mut self, message: impl Into<String>) -> Self {
        self.zero_message = message.into();
        self
    }

    /// Time between displays; must be positive
    pub fn tick(mut self, tick: Duration) -> Result<Self> {
        if tick.is_zero() {
            return Err(MeterError::InvalidInput(
                "countdown tick must be positive".to_string(),
            ));
        }
        self.tick = tick;
        Ok(self)
    }

    fn display_for(&self, count: u32) -> String {
        if count > 0 {
            count.to_string()
        } else {
            self.zero_message.clone()
        }
    }

    /// Run on the current tokio runtime
    ///
    /// The first display is sent immediately. Dropping the handle stops the timer.
    pub fn spawn(self) -> CountdownHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            let mut count = self.from;
            if tx.send(CountdownEvent::Display(self.display_for(count))).is_err() {
                return;
            }

            let mut ticker = interval_at(Instant::now() + self.tick, self.tick);
            loop {
                ticker.tick().await;
                let event = match count.checked_sub(1) {
                    Some(next) => {
                        count = next;
                        CountdownEvent::Display(self.display_for(count))
                    }
                    None => CountdownEvent::Done,
                };
                let done = event == CountdownEvent::Done;
                if tx.send(event).is_err() || done {
                    break;
                }
            }
            debug!("Countdown from {} finished", self.from);
        });

        CountdownHandle { events: rx, task }
    }
}

pub struct CountdownHandle {
    events: mpsc::UnboundedReceiver<CountdownEvent>,
    task: JoinHandle<()>,
}

impl CountdownHandle {
    /// Next display or completion; `None` after completion has been delivered
    pub async fn next_event(&mut self) -> Option<CountdownEvent> {
        self.events.recv().await
    }

    /// Forward every display to `on_display` and return once the countdown completes
    pub async fn run(mut self, mut on_display: impl FnMut(&str)) {
        while let Some(event) = self.next_event().await {
            match event {
                CountdownEvent::Display(text) => on_display(&text),
                CountdownEvent::Done => return,
            }
        }
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_text() {
        let countdown = Countdown::new(3).zero_message("GO!");
        assert_eq!(countdown.display_for(2), "2");
        assert_eq!(countdown.display_for(0), "GO!");
        assert_eq!(Countdown::new(5).display_for(0), "0");
    }

    #[test]
    fn test_zero_tick_rejected() {
        let err = Countdown::new(3).tick(Duration::ZERO).unwrap_err();
        assert!(matches!(err, MeterError::InvalidInput(_)));
        assert!(Countdown::new(3).tick(Duration::from_millis(250)).is_ok());
    }
}
