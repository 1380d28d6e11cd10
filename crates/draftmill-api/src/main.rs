//! draftmill-api — HTTP API server for the draftmill workflow engine.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::Request;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

use draftmill_api::{router, AppState};
use draftmill_core::{defaults, ArtifactStore, JobStore, SubjectStore, TemplateStore};
use draftmill_db::{
    create_pool_with_config, PgArtifactStore, PgJobStore, PgSubjectStore, PgTemplateStore,
    PoolConfig,
};
use draftmill_engine::{JobDispatcher, StageExecutor, StageWorker, WorkerConfig};
use draftmill_inference::OllamaBackend;

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so IDs sort chronologically — useful
/// for log correlation across trigger, executor, and poll requests.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "draftmill_api=info,draftmill_engine=info,draftmill_db=info,tower_http=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let pool = create_pool_with_config(&database_url, PoolConfig::from_env()).await?;

    let jobs: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool.clone()));
    let templates: Arc<dyn TemplateStore> = Arc::new(PgTemplateStore::new(pool.clone()));
    let subjects: Arc<dyn SubjectStore> = Arc::new(PgSubjectStore::new(pool.clone()));
    let artifacts: Arc<dyn ArtifactStore> = Arc::new(PgArtifactStore::new(pool));

    let backend = Arc::new(OllamaBackend::from_env());
    let executor = Arc::new(StageExecutor::new(jobs.clone(), templates, backend));
    let handle = StageWorker::new(executor, WorkerConfig::from_env()).start();
    let dispatcher = Arc::new(JobDispatcher::new(
        jobs.clone(),
        subjects,
        handle.queue(),
    ));

    let state = AppState {
        dispatcher,
        jobs,
        artifacts,
    };

    let app = router(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(RequestBodyLimitLayer::new(defaults::MAX_BODY_SIZE_BYTES));

    let port = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(defaults::SERVER_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(%addr, "draftmill-api listening");
    axum::serve(listener, app).await?;

    Ok(())
}
