use crate::driver::WaitKind;
use crate::errors::ReplayError;
use crate::runtime::Clock;
use std::time::Duration;

/// Poll `probe` until it yields a value or `timeout` elapses.
///
/// The probe runs at least once. On expiry a `Required` wait fails with
/// `Timeout`; an `Advisory` wait returns `Ok(None)`. A timeout past the
/// clock's range never expires.
pub fn poll_until<T>(
    clock: &dyn Clock,
    timeout: Duration,
    interval: Duration,
    kind: WaitKind,
    what: &str,
    mut probe: impl FnMut() -> Result<Option<T>, ReplayError>,
) -> Result<Option<T>, ReplayError> {
    let deadline = clock.now().checked_add(timeout);
    loop {
        if let Some(value) = probe()? {
            return Ok(Some(value));
        }
        let Some(deadline) = deadline else {
            clock.sleep(interval);
            continue;
        };
        let remaining = deadline.saturating_duration_since(clock.now());
        if remaining.is_zero() {
            return match kind {
                WaitKind::Required => Err(ReplayError::Timeout(format!(
                    "{what} after {}ms",
                    timeout.as_millis()
                ))),
                WaitKind::Advisory => Ok(None),
            };
        }
        clock.sleep(interval.min(remaining));
    }
}
