//! Startup checks.
//!
//! # Responsibilities
//! - Refuse to start outside a Tokio runtime
//! - Warn once per process when the local clock is not on UTC

use std::sync::Once;

use chrono::Local;

use crate::error::TransomError;

static TIMEZONE_WARNING: Once = Once::new();

/// Fail unless called from within a Tokio runtime.
pub fn check_environment() -> Result<(), TransomError> {
    tokio::runtime::Handle::try_current()
        .map(|_| ())
        .map_err(|err| TransomError::Environment(format!("a Tokio runtime is required: {err}")))
}

/// Local offset from UTC in minutes, positive east of Greenwich.
pub fn local_utc_offset_minutes() -> i32 {
    Local::now().offset().local_minus_utc() / 60
}

/// Warning text for a non-UTC offset, unless suppressed.
pub fn timezone_advisory(offset_minutes: i32, suppressed: bool) -> Option<String> {
    if suppressed || offset_minutes == 0 {
        return None;
    }
    Some(format!(
        "This process is running with a timezone offset of {offset_minutes} minutes. \
         Run the service with TZ=Etc/UTC so timestamps are stored consistently."
    ))
}

/// Emit the timezone advisory at most once per process.
pub fn warn_timezone_once(suppressed: bool) {
    if suppressed {
        return;
    }
    TIMEZONE_WARNING.call_once(|| {
        let offset = local_utc_offset_minutes();
        if let Some(message) = timezone_advisory(offset, false) {
            tracing::warn!(offset_minutes = offset, "{message}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advisory_only_for_non_utc() {
        assert!(timezone_advisory(0, false).is_none());
        assert!(timezone_advisory(-300, true).is_none());

        let message = timezone_advisory(-300, false).unwrap();
        assert!(message.contains("-300 minutes"));
    }

    #[test]
    fn environment_requires_runtime() {
        assert!(matches!(check_environment(), Err(TransomError::Environment(_))));
    }

    #[tokio::test]
    async fn environment_ok_inside_runtime() {
        assert!(check_environment().is_ok());
    }
}
