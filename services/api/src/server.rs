use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryResponseRepository};
use crate::routes::with_scale_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use psychoscales::config::AppConfig;
use psychoscales::error::AppError;
use psychoscales::scales::responses::ScaleResponseService;
use psychoscales::scales::CatalogHandle;
use psychoscales::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let catalog = Arc::new(CatalogHandle::load(config.catalog.settings())?);
    if let Some(every) = config.catalog.refresh_interval {
        spawn_catalog_refresh(catalog.clone(), every);
    }

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryResponseRepository::default());
    let service = Arc::new(ScaleResponseService::new(catalog, repository));

    let app = with_scale_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "scale scoring service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Periodically re-reads the scale directory; a failed pass keeps the previous catalog.
fn spawn_catalog_refresh(catalog: Arc<CatalogHandle>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // first tick completes immediately and the catalog was just loaded
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let handle = catalog.clone();
            match tokio::task::spawn_blocking(move || handle.reload()).await {
                Ok(Ok(snapshot)) => debug!(
                    scales = snapshot.len(),
                    rejected = snapshot.rejected().len(),
                    "catalog refreshed"
                ),
                Ok(Err(err)) => warn!(error = %err, "catalog refresh failed"),
                Err(err) => warn!(error = %err, "catalog refresh task aborted"),
            }
        }
    });
}
