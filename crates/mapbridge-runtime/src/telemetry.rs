//! Tracing pipeline initialisation.
//!
//! Call [`init_tracing`] once at process startup and hold the returned guard.
//!
//! | Variable | Effect |
//! |---|---|
//! | `RUST_LOG` | Filter directives, `info` when unset or invalid. |
//! | `MAPBRIDGE_LOG_FORMAT` | `json` for newline-delimited JSON, anything else is compact text. |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | Collector URL; spans are exported over OTLP/HTTP when set. |
//!
//! ```rust,no_run
//! let _guard = mapbridge_runtime::telemetry::init_tracing("mapbridge");
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

pub const LOG_FORMAT_VAR: &str = "MAPBRIDGE_LOG_FORMAT";
pub const OTLP_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const DEFAULT_FILTER: &str = "info";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Console output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }

    fn layer(self) -> BoxedLayer {
        match self {
            LogFormat::Compact => fmt::layer().compact().boxed(),
            LogFormat::Json => fmt::layer().json().boxed(),
        }
    }
}

/// Everything [`init_tracing`] reads from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetrySettings {
    pub filter: String,
    pub format: LogFormat,
    pub otlp_endpoint: Option<String>,
}

impl TelemetrySettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            filter: lookup(EnvFilter::DEFAULT_ENV)
                .filter(|f| !f.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FILTER.to_string()),
            format: LogFormat::parse(lookup(LOG_FORMAT_VAR).as_deref()),
            otlp_endpoint: lookup(OTLP_ENDPOINT_VAR).filter(|e| !e.trim().is_empty()),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|e| {
            eprintln!("[mapbridge] invalid log filter {:?}: {e}", self.filter);
            EnvFilter::new(DEFAULT_FILTER)
        })
    }
}

/// Install the global subscriber described by the environment.
///
/// Dropping the returned guard flushes exported spans.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    init_with(service_name, &TelemetrySettings::from_env())
}

pub fn init_with(service_name: &str, settings: &TelemetrySettings) -> TracerProviderGuard {
    let provider = settings
        .otlp_endpoint
        .as_deref()
        .and_then(|endpoint| build_provider(service_name, endpoint));

    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(2);
    if let Some(p) = &provider {
        layers.push(
            tracing_opentelemetry::layer()
                .with_tracer(p.tracer(service_name.to_string()))
                .boxed(),
        );
    }
    layers.push(settings.format.layer());

    tracing_subscriber::registry()
        .with(layers)
        .with(settings.env_filter())
        .init();

    TracerProviderGuard(provider)
}

/// Shuts the OTel [`SdkTracerProvider`] down on drop.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("[mapbridge] span exporter shutdown failed: {e}");
        }
    }
}

fn build_provider(service_name: &str, endpoint: &str) -> Option<SdkTracerProvider> {
    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
    {
        Ok(exporter) => exporter,
        Err(e) => {
            eprintln!("[mapbridge] OTLP exporter for {endpoint} unavailable: {e}");
            return None;
        }
    };

    // Simple exporter: the runtime is created after tracing is installed.
    Some(
        SdkTracerProvider::builder()
            .with_resource(
                Resource::builder()
                    .with_service_name(service_name.to_string())
                    .build(),
            )
            .with_simple_exporter(exporter)
            .build(),
    )
}
