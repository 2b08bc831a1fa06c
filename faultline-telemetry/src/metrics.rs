//! ## faultline-telemetry::metrics
//! **Prometheus counters for attack executions**

use std::fmt;

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

/// Lifecycle phase label used by the phase counters and histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Prepare,
    Start,
    Stop,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Prepare => "prepare",
            Phase::Start => "start",
            Phase::Stop => "stop",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub phases_completed: IntCounterVec,
    pub phase_failures: IntCounterVec,
    pub settings_written: IntCounter,
    pub settings_deleted: IntCounter,
    pub rules_created: IntCounter,
    pub rules_deleted: IntCounter,
    pub rollback_failures: IntCounter,
    pub phase_duration: Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let phases_completed = IntCounterVec::new(
            Opts::new(
                "faultline_attack_phases_total",
                "Attack phases completed successfully",
            ),
            &["phase", "action"],
        )?;
        let phase_failures = IntCounterVec::new(
            Opts::new("faultline_attack_failures_total", "Attack phases that failed"),
            &["phase", "action"],
        )?;
        let settings_written = IntCounter::new(
            "faultline_settings_written_total",
            "Settings store keys written",
        )?;
        let settings_deleted = IntCounter::new(
            "faultline_settings_deleted_total",
            "Settings store keys deleted",
        )?;
        let rules_created = IntCounter::new(
            "faultline_security_rules_created_total",
            "Deny rules created by block attacks",
        )?;
        let rules_deleted = IntCounter::new(
            "faultline_security_rules_deleted_total",
            "Deny rules removed by stop or rollback",
        )?;
        let rollback_failures = IntCounter::new(
            "faultline_rollback_failures_total",
            "Rollbacks that left rules behind",
        )?;
        let phase_duration = Histogram::with_opts(
            HistogramOpts::new(
                "faultline_phase_duration_seconds",
                "Wall time of a single lifecycle phase",
            )
            .buckets(vec![0.01, 0.1, 1.0, 5.0, 30.0, 120.0, 600.0]),
        )?;

        registry.register(Box::new(phases_completed.clone()))?;
        registry.register(Box::new(phase_failures.clone()))?;
        registry.register(Box::new(settings_written.clone()))?;
        registry.register(Box::new(settings_deleted.clone()))?;
        registry.register(Box::new(rules_created.clone()))?;
        registry.register(Box::new(rules_deleted.clone()))?;
        registry.register(Box::new(rollback_failures.clone()))?;
        registry.register(Box::new(phase_duration.clone()))?;

        Ok(Self {
            registry,
            phases_completed,
            phase_failures,
            settings_written,
            settings_deleted,
            rules_created,
            rules_deleted,
            rollback_failures,
            phase_duration,
        })
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn record_phase(&self, phase: Phase, action: &str, seconds: f64, succeeded: bool) {
        let labels = [phase.as_str(), action];
        if succeeded {
            self.phases_completed.with_label_values(&labels).inc();
        } else {
            self.phase_failures.with_label_values(&labels).inc();
        }
        self.phase_duration.observe(seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_phases_per_action() {
        let metrics = MetricsRecorder::new().unwrap();
        metrics.record_phase(Phase::Start, "nsg.block", 0.5, true);
        metrics.record_phase(Phase::Stop, "nsg.block", 0.2, false);

        assert_eq!(
            metrics
                .phases_completed
                .with_label_values(&["start", "nsg.block"])
                .get(),
            1
        );
        assert_eq!(
            metrics
                .phase_failures
                .with_label_values(&["stop", "nsg.block"])
                .get(),
            1
        );
    }

    #[test]
    fn renders_text_format() {
        let metrics = MetricsRecorder::new().unwrap();
        metrics.rules_created.inc_by(2);
        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("faultline_security_rules_created_total 2"));
    }
}
