/// Metrics and telemetry for the Payscope identity core
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - Identity and permission cache hit/miss/error rates
/// - Identity provider call outcomes and latencies
/// - User creation and uniqueness races
/// - Authorization decisions by source
/// - Background job execution

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // ========== Cache Metrics ==========

    /// Cache lookups by cache and outcome (hit, miss, error)
    pub static ref CACHE_LOOKUPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "payscope_cache_lookups_total",
        "Total number of cache lookups",
        &["cache", "outcome"]
    )
    .unwrap();

    /// Cache writes that failed and were dropped
    pub static ref CACHE_WRITE_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "payscope_cache_write_failures_total",
        "Total number of swallowed cache write failures",
        &["cache"]
    )
    .unwrap();

    // ========== Identity Metrics ==========

    /// Identity provider calls by outcome
    pub static ref PROVIDER_CALLS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "payscope_provider_calls_total",
        "Total number of identity provider calls",
        &["provider", "outcome"]
    )
    .unwrap();

    /// Identity provider latency in seconds
    pub static ref PROVIDER_CALL_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "payscope_provider_call_duration_seconds",
        "Identity provider call latencies in seconds",
        &["provider"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    /// Users created on first resolution
    pub static ref USERS_CREATED_TOTAL: IntCounter = register_int_counter!(
        "payscope_users_created_total",
        "Total number of users created on first resolution"
    )
    .unwrap();

    /// Inserts that lost the uniqueness race and fell back to a re-read
    pub static ref USER_CREATE_RACES_TOTAL: IntCounter = register_int_counter!(
        "payscope_user_create_races_total",
        "Total number of duplicate-key races recovered by re-read"
    )
    .unwrap();

    // ========== Permission Metrics ==========

    /// Authorization decisions by source (cache, resolver) and decision
    pub static ref AUTHORIZATION_DECISIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "payscope_authorization_decisions_total",
        "Total number of authorization decisions",
        &["source", "decision"]
    )
    .unwrap();

    /// Permission resolver latency in seconds
    pub static ref RESOLVER_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "payscope_resolver_duration_seconds",
        "Permission resolver latencies in seconds",
        &["resolver"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]
    )
    .unwrap();

    // ========== Background Job Metrics ==========

    /// Background job executions by job type and status
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "payscope_background_jobs_total",
        "Total number of background job executions",
        &["job_type", "status"]
    )
    .unwrap();
}

/// Cache lookup outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
    Error,
}

impl CacheOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            CacheOutcome::Hit => "hit",
            CacheOutcome::Miss => "miss",
            CacheOutcome::Error => "error",
        }
    }
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record a cache lookup
pub fn record_cache_lookup(cache: &str, outcome: CacheOutcome) {
    CACHE_LOOKUPS_TOTAL
        .with_label_values(&[cache, outcome.as_str()])
        .inc();
}

/// Record a swallowed cache write failure
pub fn record_cache_write_failure(cache: &str) {
    CACHE_WRITE_FAILURES_TOTAL.with_label_values(&[cache]).inc();
}

/// Record an identity provider call
pub fn record_provider_call(provider: &str, outcome: &str, duration: f64) {
    PROVIDER_CALLS_TOTAL
        .with_label_values(&[provider, outcome])
        .inc();
    PROVIDER_CALL_DURATION_SECONDS
        .with_label_values(&[provider])
        .observe(duration);
}

/// Record a user creation
pub fn record_user_created() {
    USERS_CREATED_TOTAL.inc();
}

/// Record a recovered duplicate-key race
pub fn record_user_create_race() {
    USER_CREATE_RACES_TOTAL.inc();
}

/// Record an authorization decision
pub fn record_authorization(source: &str, decision: &str) {
    AUTHORIZATION_DECISIONS_TOTAL
        .with_label_values(&[source, decision])
        .inc();
}

/// Record a permission resolver evaluation
pub fn record_resolver_duration(resolver: &str, duration: f64) {
    RESOLVER_DURATION_SECONDS
        .with_label_values(&[resolver])
        .observe(duration);
}

/// Record a background job execution
pub fn record_background_job(job_type: &str, status: &str) {
    BACKGROUND_JOBS_TOTAL
        .with_label_values(&[job_type, status])
        .inc();
}
