use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "reflex=info,reflex_services=info,reflex_dispatch=info,reflex_stream=info";

/// Initialize tracing for a Reflex process
///
/// `RUST_LOG` overrides the default filter. Fails if a global subscriber is
/// already installed.
pub fn init_telemetry(
    service_name: &str,
    environment: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(json.then(|| fmt::layer().json().with_current_span(true)))
        .with((!json).then(fmt::layer))
        .try_init()?;

    tracing::info!(
        service = %service_name,
        environment = %environment,
        json_logs = json,
        "Telemetry initialized"
    );
    Ok(())
}

pub async fn shutdown_telemetry() {
    tracing::debug!("Telemetry shutdown");
}
