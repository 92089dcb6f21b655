//! Prometheus counters for the daemon.
//!
//! Metrics live in a dedicated `Registry` owned by the daemon, so several
//! daemons (for example in tests) never collide on the global registry.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use precog_engine::RiskDecision;

use crate::error::{DaemonError, DaemonResult};

/// Daemon metrics.
pub struct Metrics {
    registry: Registry,
    evaluations: IntCounterVec,
    gate_decisions: IntCounterVec,
    degraded: IntCounter,
    out_of_order: IntCounter,
}

impl Metrics {
    /// Create and register all counters.
    pub fn new() -> DaemonResult<Self> {
        let registry = Registry::new_custom(Some("precog".to_string()), None)?;

        let evaluations = IntCounterVec::new(
            Opts::new("evaluations_total", "Position evaluations by resulting action kind"),
            &["action"],
        )?;
        let gate_decisions = IntCounterVec::new(
            Opts::new("risk_gate_decisions_total", "Risk gate decisions by outcome and failed check"),
            &["outcome", "check"],
        )?;
        let degraded = IntCounter::new("evaluations_degraded_total", "Evaluations that degraded to hold")?;
        let out_of_order = IntCounter::new("ticks_out_of_order_total", "Market ticks dropped as out of order")?;

        registry.register(Box::new(evaluations.clone()))?;
        registry.register(Box::new(gate_decisions.clone()))?;
        registry.register(Box::new(degraded.clone()))?;
        registry.register(Box::new(out_of_order.clone()))?;

        Ok(Self {
            registry,
            evaluations,
            gate_decisions,
            degraded,
            out_of_order,
        })
    }

    pub fn record_evaluation(&self, action_kind: &str, degraded: bool) {
        self.evaluations.with_label_values(&[action_kind]).inc();
        if degraded {
            self.degraded.inc();
        }
    }

    pub fn record_gate_decision(&self, decision: &RiskDecision) {
        match decision.rejection() {
            None => self.gate_decisions.with_label_values(&["admit", "none"]).inc(),
            Some(rejection) => self
                .gate_decisions
                .with_label_values(&["reject", rejection.check.name()])
                .inc(),
        }
    }

    pub fn record_out_of_order(&self) {
        self.out_of_order.inc();
    }

    pub fn evaluations(&self, action_kind: &str) -> u64 {
        self.evaluations.with_label_values(&[action_kind]).get()
    }

    pub fn degraded(&self) -> u64 {
        self.degraded.get()
    }

    pub fn out_of_order(&self) -> u64 {
        self.out_of_order.get()
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> DaemonResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| DaemonError::Config(format!("Metrics output is not UTF-8: {}", e)))
    }
}

// =============================================================================
// Tests
// =============================================================================
