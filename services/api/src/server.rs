use crate::cli::ServeArgs;
use crate::infra::{admin_access, build_service, AppState};
use crate::routes::with_quote_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use lease_quote::config::AppConfig;
use lease_quote::error::AppError;
use lease_quote::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let quote_service = Arc::new(build_service(&config.pricing)?);
    let admin = admin_access(&config.pricing);
    if !admin.is_enabled() {
        warn!("LEASE_ADMIN_TOKEN not set, settings administration routes are disabled");
    }

    let app = with_quote_routes(quote_service, admin)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "lease quote service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
