//! HTTP transport for sensor nodes and the dashboard
//!
//! Four JSON endpoints:
//!
//! - `POST /api/update-ph` and `POST /api/update-ec` accept a submission
//!   from a monitor node and store it
//! - `GET /api/get-data` returns the dashboard payload
//! - `GET /api/health` reports uptime and how many readings are stored
//!
//! Browsers on any origin may call them; pre-flight `OPTIONS` requests are
//! answered by the CORS layer before routing.

use crate::aggregator::{self, DashboardPayload, DashboardSettings, DeviceStatus};
use crate::config::HttpConfig;
use crate::error::{ErrorReporter, MonitorError, Result};
use crate::models::{DeviceClass, Measurements, StoreSnapshot};
use crate::storage::ReadingStore;
use crate::validation::{parse_body, EcSubmission, PhSubmission};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

/// Shared handler state
pub struct AppState {
    pub store: Arc<dyn ReadingStore>,
    pub settings: DashboardSettings,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn ReadingStore>, settings: DashboardSettings) -> Self {
        Self {
            store,
            settings,
            started_at: Instant::now(),
        }
    }
}

/// Reply to a stored submission
#[derive(Debug, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Reply to `GET /api/get-data`
#[derive(Debug, Serialize, Deserialize)]
pub struct LatestResponse {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub data: DashboardData,
    pub device_status: DeviceStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardData {
    pub plant_monitoring: Vec<aggregator::PlantMonitoring>,
    pub water_quality: Vec<aggregator::WaterQuality>,
}

impl LatestResponse {
    fn new(payload: DashboardPayload, timestamp: DateTime<Utc>) -> Self {
        Self {
            success: true,
            timestamp,
            data: DashboardData {
                plant_monitoring: payload.plant_monitoring,
                water_quality: payload.water_quality,
            },
            device_status: payload.device_status,
        }
    }
}

/// Reply to `GET /api/health`
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub success: bool,
    pub message: String,
    /// Seconds since the server started
    pub uptime: f64,
    pub devices: DeviceData,
    pub readings_stored: ReadingCounts,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeviceData {
    pub ph_monitor: String,
    pub ec_monitor: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadingCounts {
    pub ph_history_count: usize,
    pub ec_history_count: usize,
}

impl HealthResponse {
    fn new(snapshot: &StoreSnapshot, uptime: f64, timestamp: DateTime<Utc>) -> Self {
        let presence = |class: DeviceClass| {
            if snapshot.has_data(class) {
                "has data".to_string()
            } else {
                "no data yet".to_string()
            }
        };
        Self {
            success: true,
            message: "Hydroponic API is running".to_string(),
            uptime,
            devices: DeviceData {
                ph_monitor: presence(DeviceClass::Ph),
                ec_monitor: presence(DeviceClass::Ec),
            },
            readings_stored: ReadingCounts {
                ph_history_count: snapshot.history_len(DeviceClass::Ph),
                ec_history_count: snapshot.history_len(DeviceClass::Ec),
            },
            timestamp,
        }
    }
}

/// Build the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/update-ph", post(update_ph).fallback(only_post))
        .route("/api/update-ec", post(update_ec).fallback(only_post))
        .route("/api/get-data", get(get_data).fallback(only_get))
        .route("/api/health", get(health_check).fallback(only_get))
        .layer(cors)
        .with_state(state)
}

async fn update_ph(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    respond(save_ph(&state, &body).await, "update-ph")
}

async fn update_ec(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    respond(save_ec(&state, &body).await, "update-ec")
}

async fn save_ph(state: &AppState, body: &[u8]) -> Result<SaveResponse> {
    let submission: PhSubmission = parse_body(body)?;
    let measurements = submission.validate()?;
    store_submission(state, measurements.into(), submission.device_id()).await
}

async fn save_ec(state: &AppState, body: &[u8]) -> Result<SaveResponse> {
    let submission: EcSubmission = parse_body(body)?;
    let measurements = submission.validate()?;
    store_submission(state, measurements.into(), submission.device_id()).await
}

async fn store_submission(
    state: &AppState,
    measurements: Measurements,
    device_id: Option<String>,
) -> Result<SaveResponse> {
    let class = measurements.device_class();
    let device_id = device_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| class.default_device_id().to_string());

    let reading = state.store.save(measurements, Some(device_id)).await?;
    info!(
        device = reading.device_id.as_deref().unwrap_or_default(),
        "{} reading stored", class
    );

    Ok(SaveResponse {
        success: true,
        message: "Data saved successfully".to_string(),
        timestamp: reading.recorded_at,
    })
}

async fn get_data(State(state): State<Arc<AppState>>) -> Json<LatestResponse> {
    let snapshot = state.store.get_latest().await;
    let now = Utc::now();
    let payload = aggregator::compose(
        snapshot.ph_latest.as_ref(),
        snapshot.ec_latest.as_ref(),
        &state.settings,
        now,
    );
    debug!(
        ph = snapshot.has_data(DeviceClass::Ph),
        ec = snapshot.has_data(DeviceClass::Ec),
        "Dashboard data requested"
    );
    Json(LatestResponse::new(payload, now))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    debug!("Health check requested");
    let snapshot = state.store.get_latest().await;
    let uptime = state.started_at.elapsed().as_secs_f64();
    Json(HealthResponse::new(&snapshot, uptime, Utc::now()))
}

async fn only_post(method: Method) -> MonitorError {
    debug!("Rejected {} on POST-only endpoint", method);
    MonitorError::method_not_allowed("Only POST method allowed")
}

async fn only_get(method: Method) -> MonitorError {
    debug!("Rejected {} on GET-only endpoint", method);
    MonitorError::method_not_allowed("Only GET method allowed")
}

fn respond<T: Serialize>(result: Result<T>, operation: &str) -> Response {
    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => {
            ErrorReporter::log_error(&e, operation);
            e.into_response()
        }
    }
}

/// HTTP server wrapping the API router
pub struct HttpServer {
    config: HttpConfig,
    state: Arc<AppState>,
}

impl HttpServer {
    pub fn new(
        config: HttpConfig,
        store: Arc<dyn ReadingStore>,
        settings: DashboardSettings,
    ) -> Self {
        Self {
            config,
            state: Arc::new(AppState::new(store, settings)),
        }
    }

    /// Bind the configured address and serve until Ctrl-C or SIGTERM
    pub async fn start(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| MonitorError::config(format!("Failed to bind to {addr}: {e}")))?;

        info!("🌱 Hydroponic API listening on http://{}", addr);
        info!("Dashboard data: http://{}/api/get-data", addr);

        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves, then
    /// close the store
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let store = self.state.store.clone();
        let app = create_router(self.state);

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        info!("Shutting down, closing {} reading store", store.backend_name());
        if let Err(e) = store.close().await {
            warn!("Failed to close reading store: {}", e);
        }

        served.map_err(MonitorError::from)
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryReadingStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn router() -> Router {
        let store = Arc::new(MemoryReadingStore::new(100));
        create_router(Arc::new(AppState::new(store, DashboardSettings::default())))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_empty_body_reports_missing_fields() {
        let response = router()
            .oneshot(
                Request::post("/api/update-ec")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(
            body["error"],
            "Missing required fields: ec_value, voltage, temperature"
        );
    }

    #[tokio::test]
    async fn test_wrong_verb() {
        let response = router()
            .oneshot(Request::get("/api/update-ph").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_json(response).await["error"], "Only POST method allowed");

        let response = router()
            .oneshot(Request::post("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_json(response).await["error"], "Only GET method allowed");
    }

    #[tokio::test]
    async fn test_preflight_is_answered_without_body() {
        let response = router()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/update-ph")
                    .header(header::ORIGIN, "http://dashboard.local")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.is_empty());
    }
}
