//! `OpenTelemetry` export and ledger counters.
//!
//! This module is only compiled when the `metrics` Cargo feature is enabled.
//! [`init_metrics`] wires an OTLP metrics exporter;
//! [`LedgerMetrics`] holds the counters the ledger bumps on each write.

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;

/// Errors that can occur during metrics pipeline initialisation.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to build an OTLP exporter.
    #[error("failed to build OTLP exporter: {0}")]
    ExporterBuild(#[from] opentelemetry_otlp::ExporterBuildError),

    /// Failed during `OTel` SDK shutdown or flush.
    #[error("OpenTelemetry SDK error: {0}")]
    Sdk(#[from] opentelemetry_sdk::error::OTelSdkError),
}

/// Keeps the meter provider alive until [`MetricsGuard::shutdown`].
pub struct MetricsGuard {
    meter_provider: SdkMeterProvider,
}

impl MetricsGuard {
    /// Flush pending counters and shut the provider down.
    pub fn shutdown(self) -> Result<(), MetricsError> {
        self.meter_provider.shutdown()?;
        Ok(())
    }
}

/// Install an OTLP (gRPC) metrics exporter at `endpoint`.
pub fn init_metrics(endpoint: &str) -> Result<MetricsGuard, MetricsError> {
    let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;
    let meter_provider = SdkMeterProvider::builder()
        .with_periodic_exporter(metric_exporter)
        .build();
    global::set_meter_provider(meter_provider.clone());

    Ok(MetricsGuard { meter_provider })
}

/// Counters emitted by the ledger.
#[derive(Clone)]
pub struct LedgerMetrics {
    activity: Counter<u64>,
    unblocks: Counter<u64>,
    cleanup_removed: Counter<u64>,
}

impl LedgerMetrics {
    /// Register counters against the global meter provider.
    pub fn new() -> Self {
        let meter = global::meter("botledger");
        Self {
            activity: meter
                .u64_counter("botledger.activity.recorded")
                .with_description("Observations recorded, labelled by bot classification")
                .build(),
            unblocks: meter
                .u64_counter("botledger.unblocks")
                .with_description("Successful operator unblocks")
                .build(),
            cleanup_removed: meter
                .u64_counter("botledger.cleanup.removed")
                .with_description("Records deleted by retention cleanup")
                .build(),
        }
    }

    pub fn record_activity(&self, classified_as_bot: bool) {
        self.activity
            .add(1, &[KeyValue::new("bot", classified_as_bot)]);
    }

    pub fn record_unblock(&self) {
        self.unblocks.add(1, &[]);
    }

    pub fn record_cleanup(&self, removed: u64) {
        self.cleanup_removed.add(removed, &[]);
    }
}

impl Default for LedgerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
