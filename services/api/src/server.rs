use crate::cli::ServeArgs;
use crate::infra::{service_collaborators, AppState, InMemorySessionRepository};
use crate::routes::with_wizard_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use profile_builder::config::AppConfig;
use profile_builder::error::AppError;
use profile_builder::telemetry;
use profile_builder::workflows::profiles::WizardCatalog;
use profile_builder::workflows::sessions::WizardSessionService;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

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

    let collaborators = service_collaborators(&config.storage).await?;
    let sessions = Arc::new(InMemorySessionRepository::default());
    let service = Arc::new(WizardSessionService::new(
        sessions,
        WizardCatalog::standard(),
        collaborators,
    ));

    let app = with_wizard_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        artifact_base_url = %config.storage.artifact_base_url,
        google_drive = config.storage.uses_drive(),
        "profile wizard service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
