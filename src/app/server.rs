use crate::core::analysis::ImpactAnalyzer;
use crate::domain::model::{AnalyzeRequest, LandUseChange, NdviRequest};
use crate::domain::ports::EarthEngine;
use crate::utils::error::{ImpactError, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

impl IntoResponse for ImpactError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(
                "❌ Request failed: {} (Category: {:?}, Severity: {:?})",
                self,
                self.category(),
                self.severity()
            );
        } else {
            tracing::warn!("⚠️ Rejected request: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router<E: EarthEngine + 'static>(
    analyzer: Arc<ImpactAnalyzer<E>>,
    cors_permissive: bool,
) -> Router {
    let router = Router::new()
        .route("/analyze", post(analyze::<E>))
        .route("/ndvi", post(ndvi::<E>))
        .route("/health", get(health))
        .with_state(analyzer)
        .layer(TraceLayer::new_for_http());

    if cors_permissive {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

pub async fn serve(router: Router, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("🚀 Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}

/// 空的 body 視為空請求，交由後續回報缺少幾何
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ImpactError::InvalidRequest {
        message: format!("malformed JSON body: {}", e),
    })
}

async fn analyze<E: EarthEngine + 'static>(
    State(analyzer): State<Arc<ImpactAnalyzer<E>>>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let request: AnalyzeRequest = parse_body(&body)?;
    let change = LandUseChange::from_label(request.land_use_type.as_deref());
    let report = analyzer.analyze(request.geometry.as_ref(), change).await?;
    Ok(Json(report))
}

async fn ndvi<E: EarthEngine + 'static>(
    State(analyzer): State<Arc<ImpactAnalyzer<E>>>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let request: NdviRequest = parse_body(&body)?;
    let report = analyzer.ndvi(request.geometry.as_ref()).await?;
    Ok(Json(report))
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
