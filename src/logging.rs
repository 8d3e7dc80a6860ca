use color_eyre::Result;
use color_eyre::eyre::Context;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Exporters that must be flushed before the process exits.
pub struct Telemetry {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl Telemetry {
    pub fn shutdown(self) {
        if let Some(tracer_provider) = self.tracer_provider
            && let Err(e) = tracer_provider.shutdown()
        {
            eprintln!("Failed to shut down tracer provider: {e}");
        }
        if let Some(meter_provider) = self.meter_provider
            && let Err(e) = meter_provider.shutdown()
        {
            eprintln!("Failed to shut down meter provider: {e}");
        }
    }
}

pub fn init_tracing(
    service_name: &str,
    otlp_endpoint: Option<&str>,
    tracing_level: &str,
) -> Result<Telemetry> {
    let resource = Resource::builder()
        .with_attributes(vec![KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_NAME,
            service_name.to_string(),
        )])
        .build();

    let (telemetry_layer, tracer_provider, meter_provider) = if let Some(endpoint) = otlp_endpoint
    {
        // Initialize OTLP exporters using gRPC (Tonic)
        let span_exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .wrap_err("Failed to create OTLP span exporter")?;

        let tracer_provider = SdkTracerProvider::builder()
            .with_batch_exporter(span_exporter)
            .with_resource(resource.clone())
            .build();
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());

        let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .wrap_err("Failed to create OTLP metric exporter")?;

        let meter_provider = SdkMeterProvider::builder()
            .with_periodic_exporter(metric_exporter)
            .with_resource(resource)
            .build();
        opentelemetry::global::set_meter_provider(meter_provider.clone());

        let tracer = opentelemetry::global::tracer("radio-streaming");

        (
            Some(tracing_opentelemetry::layer().with_tracer(tracer)),
            Some(tracer_provider),
            Some(meter_provider),
        )
    } else {
        (None, None, None)
    };

    let fmt_layer = tracing_subscriber::fmt::layer().pretty();
    let filter_layer =
        EnvFilter::try_new(tracing_level).wrap_err("Failed to create tracing filter")?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(telemetry_layer)
        .try_init()
        .wrap_err("Failed to install tracing subscriber")?;

    Ok(Telemetry {
        tracer_provider,
        meter_provider,
    })
}
