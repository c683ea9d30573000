//! `task`: cooperative timing and cancellation

use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;

use super::int_arg;
use crate::surface::{CallContext, NativeError, NativeFunction, NativeModule, NativeResult};

/// Granularity at which `sleep` observes cancellation
const SLEEP_SLICE: Duration = Duration::from_millis(10);

pub fn module() -> NativeModule {
    NativeModule::new("task", "Timing and cancellation for long running searches")
        .with(NativeFunction::new("sleep", "sleep(milliseconds)", "Pause, returning early with an error when cancelled", 1, 1, sleep))
        .with(NativeFunction::new("cancelled", "cancelled()", "Whether the current operation was cancelled", 0, 0, cancelled))
}

fn sleep(ctx: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let millis = int_arg("sleep", args, 0)?;
    let millis = u64::try_from(millis)
        .map_err(|_| NativeError::failure("sleep: duration must not be negative"))?;

    let deadline = Instant::now() + Duration::from_millis(millis);
    loop {
        ctx.check_cancelled()?;
        let now = Instant::now();
        if now >= deadline {
            return Ok(Value::Null);
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}

fn cancelled(ctx: &CallContext<'_>, _: &[Value]) -> NativeResult {
    Ok(Value::Bool(ctx.host.is_cancelled()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{NullHost, ScriptHost};
    use serde_json::json;

    struct Cancelled;

    impl ScriptHost for Cancelled {
        fn is_cancelled(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_sleep_waits() {
        let started = Instant::now();
        sleep(&CallContext::new(&NullHost), &[json!(20)]).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_sleep_observes_cancellation() {
        let err = sleep(&CallContext::new(&Cancelled), &[json!(60_000)]).unwrap_err();
        assert_eq!(err, NativeError::Cancelled);
        assert_eq!(cancelled(&CallContext::new(&Cancelled), &[]).unwrap(), json!(true));
    }

    #[test]
    fn test_negative_duration() {
        assert!(sleep(&CallContext::new(&NullHost), &[json!(-1)]).is_err());
    }
}
