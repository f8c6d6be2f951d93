use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use httpmock::prelude::*;
use park_impact::{app, TomlConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

const COMPUTE_PATH: &str = "/v1/projects/test-project/value:compute";

fn router_for(server: &MockServer) -> Router {
    let config = TomlConfig::from_toml_str(&format!(
        r#"
[earth_engine]
endpoint = "{}"
project = "test-project"
access_token = "test-token"
timeout_seconds = 5
retry_attempts = 0
retry_delay_seconds = 0
"#,
        server.base_url()
    ))
    .unwrap();

    let analyzer = app::build_analyzer(&config).unwrap();
    app::server::router(analyzer, true)
}

fn park_geometry() -> Value {
    json!({
        "type": "Polygon",
        "coordinates": [[
            [-73.9730, 40.7644], [-73.9580, 40.7644], [-73.9580, 40.7740],
            [-73.9730, 40.7740], [-73.9730, 40.7644]
        ]]
    })
}

async fn post_json(router: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(router, uri, Body::from(body.to_string())).await
}

async fn send(router: Router, uri: &str, body: Body) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// 平台對每個查詢回傳同一組波段讀數
fn mock_all_bands(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST).path(COMPUTE_PATH);
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({
                "result": {
                    "NDVI": 0.623456,
                    "population": 12000.9,
                    "absorbing_aerosol_index": -0.9876
                }
            }));
    })
}

#[tokio::test]
async fn test_analyze_end_to_end() -> Result<()> {
    let server = MockServer::start();
    let api_mock = mock_all_bands(&server);

    let (status, body) = post_json(
        router_for(&server),
        "/analyze",
        json!({"geometry": park_geometry(), "landUseType": "removed"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["affectedPopulation10MinWalk"], 12000);
    assert_eq!(body["ndviBefore"], 0.6235);
    assert_eq!(body["ndviAfter"], 0.6235);
    assert_eq!(body["pm25Before"], -0.99);
    assert_eq!(body["pm25After"], -0.99);
    assert!(body["walkabilityBefore"].as_f64().unwrap() > 0.0);
    assert!(body["walkabilityAfter"].as_f64().unwrap() <= 100.0);
    api_mock.assert_hits(7);
    Ok(())
}

#[tokio::test]
async fn test_analyze_defaults_to_removed() -> Result<()> {
    let server = MockServer::start();
    let api_mock = mock_all_bands(&server);

    let (status, body) =
        post_json(router_for(&server), "/analyze", json!({"geometry": park_geometry()})).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["ndviAfter"].is_number());
    api_mock.assert_hits(7);
    Ok(())
}

#[tokio::test]
async fn test_analyze_replaced_by_building_sends_blend() -> Result<()> {
    let server = MockServer::start();
    let blend_mock = server.mock(|when, then| {
        when.method(POST)
            .path(COMPUTE_PATH)
            .body_contains("ImageCollection.mosaic");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({"result": {"NDVI": 0.15}}));
    });
    let other_mock = mock_all_bands(&server);

    let (status, body) = post_json(
        router_for(&server),
        "/analyze",
        json!({"geometry": park_geometry(), "landUseType": "replaced_by_building"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ndviBefore"], 0.6235);
    assert_eq!(body["ndviAfter"], 0.15);
    blend_mock.assert_hits(1);
    other_mock.assert_hits(6);
    Ok(())
}

#[tokio::test]
async fn test_analyze_missing_geometry() -> Result<()> {
    let server = MockServer::start();
    let api_mock = mock_all_bands(&server);

    let (status, body) =
        post_json(router_for(&server), "/analyze", json!({"landUseType": "removed"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Missing geometry"}));
    api_mock.assert_hits(0);
    Ok(())
}

#[tokio::test]
async fn test_analyze_empty_geometry_values_are_missing() -> Result<()> {
    let server = MockServer::start();
    let api_mock = mock_all_bands(&server);

    for empty in [json!(""), json!([]), json!({})] {
        let (status, body) =
            post_json(router_for(&server), "/analyze", json!({"geometry": empty})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Missing geometry"}));
    }
    api_mock.assert_hits(0);
    Ok(())
}

#[tokio::test]
async fn test_analyze_clockwise_collection_with_marker() -> Result<()> {
    let server = MockServer::start();
    let api_mock = mock_all_bands(&server);

    let clockwise = json!({
        "type": "Polygon",
        "coordinates": [[
            [-73.9730, 40.7644], [-73.9730, 40.7740], [-73.9580, 40.7740],
            [-73.9580, 40.7644], [-73.9730, 40.7644]
        ]]
    });
    let collection = json!({
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"name": "entrance"},
             "geometry": {"type": "Point", "coordinates": [-73.9655, 40.7644]}},
            {"type": "Feature", "properties": {}, "geometry": clockwise}
        ]
    });

    let (status, body) =
        post_json(router_for(&server), "/analyze", json!({"geometry": collection})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["affectedPopulation10MinWalk"], 12000);
    // 面積正常時密度不會讓分數趨近 0
    assert!(body["walkabilityBefore"].as_f64().unwrap() > 4.74);
    api_mock.assert_hits(7);
    Ok(())
}

#[tokio::test]
async fn test_analyze_rejects_point_geometry() -> Result<()> {
    let server = MockServer::start();

    let (status, body) = post_json(
        router_for(&server),
        "/analyze",
        json!({"geometry": {"type": "Point", "coordinates": [-73.96, 40.77]}}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid geometry"));
    Ok(())
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() -> Result<()> {
    let server = MockServer::start();

    let (status, body) = send(router_for(&server), "/analyze", Body::from("{\"geometry\": ")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("malformed JSON"));
    Ok(())
}

#[tokio::test]
async fn test_remote_failure_is_server_error() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(COMPUTE_PATH);
        then.status(403)
            .header("Content-Type", "application/json")
            .json_body(json!({"error": {"code": 403, "message": "Permission denied"}}));
    });

    let (status, body) =
        post_json(router_for(&server), "/analyze", json!({"geometry": park_geometry()})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("Permission denied"));
    Ok(())
}

#[tokio::test]
async fn test_ndvi_endpoint() -> Result<()> {
    let server = MockServer::start();
    let api_mock = mock_all_bands(&server);

    let (status, body) =
        post_json(router_for(&server), "/ndvi", json!({"geometry": park_geometry()})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ndvi": 0.6235}));
    api_mock.assert_hits(1);
    Ok(())
}

#[tokio::test]
async fn test_ndvi_null_when_platform_has_no_value() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(COMPUTE_PATH);
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({"result": {"NDVI": null}}));
    });

    let (status, body) =
        post_json(router_for(&server), "/ndvi", json!({"geometry": park_geometry()})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ndvi": null}));
    Ok(())
}

#[tokio::test]
async fn test_ndvi_missing_geometry() -> Result<()> {
    let server = MockServer::start();

    let (status, body) = send(router_for(&server), "/ndvi", Body::empty()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Missing geometry"}));
    Ok(())
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let server = MockServer::start();
    let response = router_for(&server)
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(body["status"], "ok");
    Ok(())
}
