use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_application_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use mortgage_intake::applications::{
    ApplicationCollection, ApplicationStore, InMemoryApplicationCollection,
    MongoApplicationCollection,
};
use mortgage_intake::config::{AppConfig, StoreBackend};
use mortgage_intake::error::AppError;
use mortgage_intake::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
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
    if let Some(backend) = args.store.take() {
        config.store.backend = StoreBackend::parse(&backend)?;
    }

    telemetry::init(&config.telemetry)?;

    match config.store.backend {
        StoreBackend::Mongo => {
            let uri = config.store.uri()?;
            let collection = MongoApplicationCollection::connect(uri, &config.store).await?;
            serve(config, Arc::new(collection)).await
        }
        StoreBackend::Memory => {
            warn!("serving from the in-memory store; records are lost on shutdown");
            serve(config, Arc::new(InMemoryApplicationCollection::default())).await
        }
    }
}

async fn serve<C>(config: AppConfig, collection: Arc<C>) -> Result<(), AppError>
where
    C: ApplicationCollection + 'static,
{
    let store = ApplicationStore::new(collection);
    let store = match config.store.timeout {
        Some(limit) => store.with_timeout(limit),
        None => store,
    };

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = with_application_routes(Arc::new(store))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        backend = ?config.store.backend,
        "mortgage intake service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
