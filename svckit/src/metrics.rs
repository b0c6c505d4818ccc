use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_vec, register_int_gauge_vec, Encoder, IntCounterVec, IntGaugeVec,
    TextEncoder,
};

lazy_static! {
    pub static ref TICK_COUNTER: IntCounterVec = register_int_counter_vec!(
        "sim_ticks_total",
        "Total number of simulation ticks executed",
        &["simulation"]
    ).unwrap();

    pub static ref OBSERVER_FAULTS: IntCounterVec = register_int_counter_vec!(
        "sim_observer_faults_total",
        "Observer callbacks that panicked during delivery",
        &["simulation"]
    ).unwrap();

    pub static ref TRANSACTIONS_GENERATED: IntCounterVec = register_int_counter_vec!(
        "sim_transactions_generated_total",
        "Synthesized ledger transactions by type",
        &["kind"]
    ).unwrap();

    pub static ref ACTIVE_SUBSCRIBERS: IntGaugeVec = register_int_gauge_vec!(
        "sim_active_subscribers",
        "Number of registered observers",
        &["simulation"]
    ).unwrap();
}

pub fn record_tick(simulation: &str) {
    TICK_COUNTER.with_label_values(&[simulation]).inc();
}

pub fn record_observer_fault(simulation: &str) {
    OBSERVER_FAULTS.with_label_values(&[simulation]).inc();
}

pub fn record_transaction(kind: &str) {
    TRANSACTIONS_GENERATED.with_label_values(&[kind]).inc();
}

pub fn set_subscribers(simulation: &str, count: usize) {
    ACTIVE_SUBSCRIBERS
        .with_label_values(&[simulation])
        .set(count as i64);
}

/// Render the default registry in the prometheus text format.
pub fn gather_text() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
