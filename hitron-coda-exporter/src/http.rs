//! HTTP server for scrapes, self-metrics and reloads.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use hitron_coda::Connector;
use prometheus_client::registry::Registry;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info};

use crate::config::ConfigStore;
use crate::metrics::{CONTENT_TYPE, ExporterMetrics, render};
use crate::reload::ReloadHandle;
use crate::scrape::{ScrapeContext, Scraper};

const INDEX_HTML: &str = r#"<html>
<head>
	<title>Hitron CODA Cable Modem Exporter</title>
	<style>
		form label {
			margin: 10px;
		}
		form input {
			margin: 10px;
		}
	</style>
</head>
	<body>
		<h1>Hitron CODA Cable Modem Exporter</h1>
		<form action="/scrape">
			<input type="submit" value="/scrape">
		</form>
		<p><a href="/metrics">Exporter metrics</a></p>
	</body>
</html>
"#;

/// Application state shared across handlers.
pub struct AppState<C> {
    store: Arc<ConfigStore>,
    scraper: Arc<Scraper<C>>,
    reload: ReloadHandle,
    metrics: ExporterMetrics,
    self_registry: Arc<Registry>,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            scraper: Arc::clone(&self.scraper),
            reload: self.reload.clone(),
            metrics: self.metrics.clone(),
            self_registry: Arc::clone(&self.self_registry),
        }
    }
}

impl<C: Connector> AppState<C> {
    /// The scraper must have been built with the same `metrics`.
    pub fn new(
        store: Arc<ConfigStore>,
        scraper: Arc<Scraper<C>>,
        reload: ReloadHandle,
        metrics: ExporterMetrics,
    ) -> Self {
        let self_registry = Arc::new(metrics.registry());
        Self {
            store,
            scraper,
            reload,
            metrics,
            self_registry,
        }
    }
}

/// Create the HTTP router.
pub fn create_router<C: Connector>(state: AppState<C>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler::<C>))
        .route("/scrape", get(scrape_handler::<C>))
        .route(
            "/-/reload",
            post(reload_handler::<C>).fallback(method_not_allowed),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn openmetrics_response(registry: &Registry) -> Response {
    match render(registry) {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to encode metrics\n",
            )
                .into_response()
        }
    }
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// Handler for the /metrics endpoint.
async fn metrics_handler<C: Connector>(State(state): State<AppState<C>>) -> Response {
    openmetrics_response(&state.self_registry)
}

/// Handler for the /scrape endpoint.
///
/// The scrape runs on its own task so that session teardown completes even
/// when the client disconnects and this handler is dropped.
async fn scrape_handler<C: Connector>(State(state): State<AppState<C>>) -> Response {
    debug!("Starting scrape");
    let start = Instant::now();

    let config = state.store.get();
    let (guard, ctx) = ScrapeContext::new();
    let scraper = Arc::clone(&state.scraper);
    let task = tokio::spawn(async move { scraper.scrape(&config, &ctx).await });

    let registry = match task.await {
        Ok(registry) => registry,
        Err(e) => {
            error!(error = %e, "Scrape task failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "scrape failed\n").into_response();
        }
    };
    drop(guard);

    let duration = start.elapsed().as_secs_f64();
    state.metrics.collection_duration.observe(duration);
    debug!(duration_seconds = duration, "Finished scrape");

    openmetrics_response(&registry)
}

/// Handler for POST /-/reload.
async fn reload_handler<C: Connector>(State(state): State<AppState<C>>) -> Response {
    debug!("Reloading config from HTTP endpoint");

    match state.reload.reload().await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to reload config: {e}\n"),
        )
            .into_response(),
    }
}

async fn method_not_allowed() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, "POST method expected\n").into_response()
}

/// HTTP server configuration.
pub struct HttpServer<C> {
    state: AppState<C>,
    listen_addr: SocketAddr,
}

impl<C: Connector> HttpServer<C> {
    /// Create a new HTTP server.
    pub fn new(state: AppState<C>, listen_addr: SocketAddr) -> Self {
        Self { state, listen_addr }
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let router = create_router(self.state);

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        info!(addr = %self.listen_addr, "HTTP server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::reload::ReloadCoordinator;
    use axum::body::Body;
    use axum::http::Request;
    use hitron_coda::mock::{MockConnector, Query};
    use std::io::Write;
    use tower::ServiceExt;

    struct Harness {
        router: Router,
        connector: MockConnector,
        metrics: ExporterMetrics,
        store: Arc<ConfigStore>,
        file: tempfile::NamedTempFile,
        _shutdown: watch::Sender<bool>,
    }

    fn harness() -> Harness {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ host: "192.168.0.1", username: "u", password: "p" }}"#).unwrap();

        let store = Arc::new(ConfigStore::load(file.path()).unwrap());
        let connector = MockConnector::new();
        let metrics = ExporterMetrics::new();
        let scraper = Arc::new(Scraper::new(connector.clone(), metrics.clone()));

        let (coordinator, handle, _trigger) = ReloadCoordinator::new(store.clone(), file.path());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(coordinator.run(shutdown_rx));

        let state = AppState::new(store.clone(), scraper, handle, metrics.clone());
        Harness {
            router: create_router(state),
            connector,
            metrics,
            store,
            file,
            _shutdown: shutdown_tx,
        }
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let h = harness();
        let response = h
            .router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "healthy\n");
    }

    #[tokio::test]
    async fn test_index_links_to_scrape() {
        let h = harness();
        let response = h
            .router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("action=\"/scrape\""));
    }

    #[tokio::test]
    async fn test_scrape_endpoint() {
        let h = harness();
        let response = h
            .router
            .oneshot(Request::get("/scrape").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap();
        assert!(
            content_type
                .to_str()
                .unwrap()
                .starts_with("application/openmetrics-text")
        );

        let body = body_string(response).await;
        assert!(body.contains("hitron_coda_up 1"));
        let self_metrics = render(&h.metrics.registry()).unwrap();
        assert!(self_metrics.contains("hitron_coda_collection_duration_seconds_count 1"));
        assert_eq!(h.connector.closes(), 1);
    }

    #[tokio::test]
    async fn test_scrape_with_unreachable_device_is_still_ok() {
        let h = harness();
        h.connector.fail_open(true);

        let response = h
            .router
            .oneshot(Request::get("/scrape").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("hitron_coda_up 0"));
        assert_eq!(h.metrics.client_errors.get(), 1);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_serves_self_metrics() {
        let h = harness();
        h.connector.fail(Query::WifiClients);

        h.router
            .clone()
            .oneshot(Request::get("/scrape").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let response = h
            .router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_string(response).await;
        assert!(body.contains("hitron_coda_build_info{"));
        assert!(body.contains("hitron_coda_request_errors_total 1"));
        assert!(body.contains("hitron_coda_collection_duration_seconds_count 1"));
        assert!(!body.contains("hitron_coda_up"));
    }

    #[tokio::test]
    async fn test_reload_endpoint() {
        let mut h = harness();
        let file = h.file.as_file_mut();
        file.set_len(0).unwrap();
        std::io::Seek::rewind(file).unwrap();
        write!(file, r#"{{ host: "10.1.1.1" }}"#).unwrap();

        let response = h
            .router
            .oneshot(Request::post("/-/reload").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            *h.store.get(),
            DeviceConfig {
                host: "10.1.1.1".to_string(),
                ..DeviceConfig::default()
            }
        );
    }

    #[tokio::test]
    async fn test_reload_endpoint_failure() {
        let mut h = harness();
        write!(h.file.as_file_mut(), "garbage").unwrap();

        let response = h
            .router
            .oneshot(Request::post("/-/reload").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            body_string(response)
                .await
                .starts_with("failed to reload config: ")
        );
        assert_eq!(h.store.get().host, "192.168.0.1");
    }

    #[tokio::test]
    async fn test_reload_requires_post() {
        let h = harness();
        let response = h
            .router
            .oneshot(Request::get("/-/reload").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_string(response).await, "POST method expected\n");
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let h = harness();
        let response = h
            .router
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
