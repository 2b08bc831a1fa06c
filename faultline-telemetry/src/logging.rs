//! ## faultline-telemetry::logging
//! **Structured attack event logging**
//!
//! Every lifecycle transition of an attack execution is reported through
//! [`EventLogger::log_event`] so operators can follow an execution from
//! prepare to stop, including rollbacks that need manual intervention.

use opentelemetry::KeyValue;
use tracing::info_span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber. `RUST_LOG` wins over `default_level`.
    ///
    /// Calling this twice is harmless; the first subscriber stays installed.
    pub fn init(default_level: &str) {
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(default_level)),
            )
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .try_init();
    }

    /// Emits one structured attack event.
    pub fn log_event(event_type: &str, metadata: Vec<KeyValue>) {
        let span = info_span!(
            "attack_event",
            event_type = event_type,
            otel.kind = "INTERNAL"
        );

        span.in_scope(|| {
            tracing::info!(
                metadata = ?metadata,
                "Attack event {}", event_type
            );
        });
    }

    /// Like [`EventLogger::log_event`] but at error level, for outcomes that
    /// leave cloud state behind.
    pub fn log_failure(event_type: &str, error: &str, metadata: Vec<KeyValue>) {
        let span = info_span!(
            "attack_event",
            event_type = event_type,
            otel.kind = "INTERNAL"
        );

        span.in_scope(|| {
            tracing::error!(
                metadata = ?metadata,
                error = error,
                "Attack event {} failed", event_type
            );
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn logs_attack_events() {
        EventLogger::log_event(
            "attack_started",
            vec![KeyValue::new("execution_id", "abc")],
        );
        assert!(logs_contain("Attack event attack_started"));
        assert!(logs_contain("execution_id"));
    }

    #[traced_test]
    #[test]
    fn logs_failures_with_error_text() {
        EventLogger::log_failure(
            "rollback_failed",
            "rule SteadybitBlockRule-0 could not be deleted",
            vec![],
        );
        assert!(logs_contain("Attack event rollback_failed failed"));
        assert!(logs_contain("SteadybitBlockRule-0"));
    }
}
