//! Bounded polling of hardware state

use std::time::{Duration, Instant};

use crate::{platform::Platform, Error, Result};

/// Pause between two polls, and after every register write that needs to
/// settle
pub const SETTLE: Duration = Duration::from_micros(10);

/// Block until `ready` returns `true`
///
/// `until` checks `ready`, then sleeps for [`SETTLE`], in a loop. If `ready`
/// is still `false` after `timeout`, `until` returns [`Error::Timeout`] naming
/// `what` it was waiting for.
pub fn until<P, F>(platform: &P, timeout: Duration, what: &'static str, mut ready: F) -> Result<()>
where
    P: Platform,
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if ready() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(Error::Timeout(what));
        }
        platform.delay(SETTLE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Sim;
    use core::cell::Cell;

    #[test]
    fn returns_once_ready() {
        let sim = Sim::new();
        let polls = Cell::new(0);
        until(&sim, Duration::from_secs(1), "test", || {
            polls.set(polls.get() + 1);
            polls.get() == 3
        })
        .unwrap();
        assert_eq!(polls.get(), 3);
    }

    #[test]
    fn gives_up_after_timeout() {
        let sim = Sim::new();
        let err = until(&sim, Duration::from_millis(2), "never", || false).unwrap_err();
        assert!(matches!(err, Error::Timeout("never")));
    }
}
