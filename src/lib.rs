//! Provisioner manages institutional email accounts in a directory service
//! on behalf of a student-records system.
#![forbid(unsafe_code)]
#![deny(unused_mut)]

mod database;
pub mod directory;
pub mod error;
mod middleware;
pub mod provisioning;
mod router;
pub mod store;
pub mod telemetry;
#[cfg(test)]
mod testing;

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderName, StatusCode, header};
use axum::routing::{get, post};
use axum::{Router, middleware as AxumMiddleware};
pub use error::ServerError;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer,
};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

use directory::GoogleDirectory;
use provisioning::ProvisioningService;
use store::Store;

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: axum::http::Method,
    path: &str,
    body: String,
    api_key: Option<&str>,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = api_key {
        builder = builder.header(middleware::API_KEY_HEADER, key);
    }

    app.oneshot(builder.body(axum::body::Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub store: Arc<dyn Store>,
    pub provisioning: ProvisioningService,
    pub metrics: Option<PrometheusHandle>,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Hide secrets from traces.
        .layer(SetSensitiveHeadersLayer::new([
            header::AUTHORIZATION,
            HeaderName::from_static(middleware::API_KEY_HEADER),
        ]))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        .layer(PropagateRequestIdLayer::x_request_id());

    let timeout =
        |duration| TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, duration);

    let email_router = Router::new()
        .route("/create", post(router::create::handler))
        .route("/reset-password", post(router::password::handler))
        .route("/get-user", post(router::user::by_email))
        .route("/get-info", post(router::user::by_matricno))
        .route("/update-info", post(router::update::handler))
        .route("/delete-user", post(router::delete::handler))
        .route("/stats/total", get(router::stats::total))
        .route("/stats/session/{*session}", get(router::stats::by_session))
        .route("/stats/programme/{*programme}", get(router::stats::by_programme))
        .layer(timeout(state.config.server.request_timeout()))
        .merge(
            // The batch walks up to a thousand accounts.
            Router::new()
                .route("/updateUserinfoAll", get(router::backfill::handler))
                .layer(timeout(state.config.backfill.timeout())),
        )
        .route_layer(AxumMiddleware::from_fn_with_state(
            state.clone(),
            middleware::secure_access,
        ));

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        .route("/metrics", get(router::status::metrics))
        .nest("/email", email_router)
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state(
    config: Arc<config::Configuration>,
) -> Result<AppState, Box<dyn std::error::Error>> {
    let db = match config.postgres {
        Some(ref config) => {
            database::Database::new(
                &config.address,
                &config
                    .username
                    .clone()
                    .unwrap_or(database::DEFAULT_CREDENTIALS.into()),
                &config
                    .password
                    .clone()
                    .unwrap_or(database::DEFAULT_CREDENTIALS.into()),
                &config
                    .database
                    .clone()
                    .unwrap_or(database::DEFAULT_DATABASE_NAME.into()),
                config.pool_size.unwrap_or(database::DEFAULT_POOL_SIZE),
            )
            .await?
        },
        None => {
            tracing::error!("missing `postgres` entry on `config.yaml` file");
            std::process::exit(0);
        },
    };

    // execute migrations scripts on start.
    sqlx::migrate!().run(&db.postgres).await?;

    let Some(directory_config) = &config.directory else {
        tracing::error!("missing `directory` entry on `config.yaml` file");
        std::process::exit(0);
    };
    let directory = Arc::new(GoogleDirectory::new(directory_config)?);

    if config.security.api_key.is_none() {
        tracing::warn!(
            "no api key configured, every `/email` request will be refused"
        );
    }

    let store: Arc<dyn Store> = Arc::new(db);
    let provisioning = ProvisioningService::new(directory, Arc::clone(&store));

    Ok(AppState {
        config,
        store,
        provisioning,
        metrics: None,
    })
}
