//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;
use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("quillpress_http_requests_total", "Total number of HTTP requests"),
        &["method", "status"]
    ).expect("metric can be created");

    // Authoring Metrics
    pub static ref VERSIONS_CREATED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("quillpress_versions_created_total", "Total number of chapter versions created"),
        &["kind"]
    ).expect("metric can be created");
    pub static ref CHAPTERS_PUBLISHED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("quillpress_chapters_published_total", "Total number of chapter publications"),
        &["mode"]
    ).expect("metric can be created");
    pub static ref CHAPTERS_UNPUBLISHED_TOTAL: IntCounter = IntCounter::new(
        "quillpress_chapters_unpublished_total",
        "Total number of chapter unpublications"
    ).expect("metric can be created");
    pub static ref ORDERING_OPERATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("quillpress_ordering_operations_total", "Total number of ordering operations"),
        &["scope", "operation"]
    ).expect("metric can be created");

    // Moderation Metrics
    pub static ref REPORTS_FILED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("quillpress_reports_filed_total", "Total number of reports filed"),
        &["origin", "target_type"]
    ).expect("metric can be created");
    pub static ref REPORT_TRANSITIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("quillpress_report_transitions_total", "Total number of ledger transitions"),
        &["status"]
    ).expect("metric can be created");
    pub static ref RESTRICTIONS_APPLIED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("quillpress_restrictions_applied_total", "Total number of restrictions applied"),
        &["kind"]
    ).expect("metric can be created");
    pub static ref RESTRICTED_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("quillpress_restricted_attempts_total", "Total number of actions rejected by an active restriction"),
        &["kind"]
    ).expect("metric can be created");

    // Content Safety Metrics
    pub static ref SAFETY_SCANS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("quillpress_safety_scans_total", "Total number of content safety scans"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref SAFETY_SCAN_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "quillpress_safety_scan_duration_seconds",
            "Content safety scan duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["outcome"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("quillpress_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; registration happens on the first call.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
            .expect("HTTP_REQUESTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(VERSIONS_CREATED_TOTAL.clone()))
            .expect("VERSIONS_CREATED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(CHAPTERS_PUBLISHED_TOTAL.clone()))
            .expect("CHAPTERS_PUBLISHED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(CHAPTERS_UNPUBLISHED_TOTAL.clone()))
            .expect("CHAPTERS_UNPUBLISHED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ORDERING_OPERATIONS_TOTAL.clone()))
            .expect("ORDERING_OPERATIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(REPORTS_FILED_TOTAL.clone()))
            .expect("REPORTS_FILED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(REPORT_TRANSITIONS_TOTAL.clone()))
            .expect("REPORT_TRANSITIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(RESTRICTIONS_APPLIED_TOTAL.clone()))
            .expect("RESTRICTIONS_APPLIED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(RESTRICTED_ATTEMPTS_TOTAL.clone()))
            .expect("RESTRICTED_ATTEMPTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(SAFETY_SCANS_TOTAL.clone()))
            .expect("SAFETY_SCANS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(SAFETY_SCAN_DURATION_SECONDS.clone()))
            .expect("SAFETY_SCAN_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}

/// Record the outcome and latency of one content safety scan.
pub fn observe_safety_scan(outcome: &str, elapsed: Duration) {
    SAFETY_SCANS_TOTAL.with_label_values(&[outcome]).inc();
    SAFETY_SCAN_DURATION_SECONDS
        .with_label_values(&[outcome])
        .observe(elapsed.as_secs_f64());
}
