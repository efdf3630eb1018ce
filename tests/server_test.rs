mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use common::{
    multipart_content_type, multipart_file, multipart_text, test_config, write_file, SALES_CSV,
};
use datadash::dashboard::DashboardParams;
use datadash::server::{build_router, dashboard_url, AppState};
use datadash::upload::UploadStore;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tower::ServiceExt;

fn app(dir: &Path) -> Router {
    build_router(AppState::new(test_config(dir)))
}

/// Place a CSV in the upload directory the way a successful upload would.
fn stored(dir: &Path, name: &str, contents: &str) -> PathBuf {
    write_file(&dir.join("uploads"), name, contents)
}

async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post_upload(app: Router, body: Vec<u8>) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(header::CONTENT_TYPE, multipart_content_type())
            .body(Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn header_value(response: &Response<Body>, name: header::HeaderName) -> String {
    response
        .headers()
        .get(name)
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default()
}

fn dash_uri(path: &Path, extra: &str) -> String {
    format!("{}{}", dashboard_url(&path.to_string_lossy()), extra)
}

fn panel_uri(prefix: &str, panel: &str, path: &Path, extra: &str) -> String {
    let url = dashboard_url(&path.to_string_lossy());
    let query = url.trim_start_matches("/dash/?");
    format!("{}/{}?{}{}", prefix, panel, query, extra)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_index_shows_upload_form() {
    let dir = TempDir::new().unwrap();
    let response = get(app(dir.path()), "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("action=\"/upload\""));
    assert!(html.contains("name=\"file\""));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_healthz() {
    let dir = TempDir::new().unwrap();
    let response = get(app(dir.path()), "/healthz").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upload_stores_file_and_redirects_to_dashboard() {
    let dir = TempDir::new().unwrap();
    let response = post_upload(app(dir.path()), multipart_file("file", "sales.csv", SALES_CSV)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = header_value(&response, header::LOCATION);
    assert!(location.starts_with("/dash/?file="), "got {}", location);
    let cookie = header_value(&response, header::SET_COOKIE);
    assert!(cookie.contains("File%20successfully%20uploaded"), "got {}", cookie);

    let saved = dir.path().join("uploads").join("sales.csv");
    assert_eq!(std::fs::read_to_string(&saved).unwrap(), SALES_CSV);

    // the file parameter names exactly the stored upload
    let params = DashboardParams::from_query(location.trim_start_matches("/dash/?"));
    let reference = params.file.expect("file parameter");
    let store = UploadStore::new(dir.path().join("uploads"));
    assert_eq!(store.resolve(&reference), Some(saved.clone()));
    assert_eq!(PathBuf::from(&reference), saved);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upload_rejects_other_extensions() {
    let dir = TempDir::new().unwrap();
    let response = post_upload(app(dir.path()), multipart_file("file", "notes.txt", "hello")).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(header_value(&response, header::LOCATION), "/");
    let cookie = header_value(&response, header::SET_COOKIE);
    assert!(cookie.contains("Allowed%20file%20types%20are%20csv"), "got {}", cookie);
    assert!(!dir.path().join("uploads").join("notes.txt").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upload_without_file_part() {
    let dir = TempDir::new().unwrap();
    let response = post_upload(app(dir.path()), multipart_text("comment", "hi")).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookie = header_value(&response, header::SET_COOKIE);
    assert!(cookie.contains("No%20file%20part"), "got {}", cookie);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upload_with_empty_filename() {
    let dir = TempDir::new().unwrap();
    let response = post_upload(app(dir.path()), multipart_file("file", "", "")).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookie = header_value(&response, header::SET_COOKIE);
    assert!(cookie.contains("No%20selected%20file"), "got {}", cookie);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dashboard_without_file_redirects_home() {
    let dir = TempDir::new().unwrap();
    let response = get(app(dir.path()), "/dash/").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(header_value(&response, header::LOCATION), "/");
    assert!(header_value(&response, header::SET_COOKIE).contains("File%20not%20found"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dashboard_outside_upload_dir_is_not_found() {
    let dir = TempDir::new().unwrap();
    let outside = write_file(dir.path(), "elsewhere.csv", SALES_CSV);
    let response = get(app(dir.path()), &dash_uri(&outside, "")).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(header_value(&response, header::SET_COOKIE).contains("File%20not%20found"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dashboard_renders_overview() {
    let dir = TempDir::new().unwrap();
    let path = stored(dir.path(), "sales.csv", SALES_CSV);

    let response = get(app(dir.path()), &dash_uri(&path, "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Summarized data analysis by AnalytiCore"));
    assert!(html.contains("Number of Duplicate Rows: 1, Displaying 5 rows."));
    assert!(html.contains("Null Values"));
    assert!(html.contains("Summary Statistics"));
    assert!(html.contains("Data Observations"));
    assert!(html.contains("Select a column to display histogram"));

    let response = get(app(dir.path()), &dash_uri(&path, "&rows=3")).await;
    let html = body_text(response).await;
    assert!(html.contains("Number of Duplicate Rows: 1, Displaying 3 rows."));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_panel_fragment_prompts_then_draws() {
    let dir = TempDir::new().unwrap();
    let path = stored(dir.path(), "sales.csv", SALES_CSV);

    let response = get(app(dir.path()), &panel_uri("/dash/panel", "histogram", &path, "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response)
        .await
        .contains("Select a column to display histogram"));

    let response = get(
        app(dir.path()),
        &panel_uri("/dash/panel", "histogram", &path, "&hist=units"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("<figcaption>Histogram of units</figcaption>"), "got {}", html);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_panel_is_not_found() {
    let dir = TempDir::new().unwrap();
    let path = stored(dir.path(), "sales.csv", SALES_CSV);

    let response = get(app(dir.path()), &panel_uri("/dash/panel", "radar", &path, "")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("Unknown panel"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_chart_api_returns_chart_json() {
    let dir = TempDir::new().unwrap();
    let path = stored(dir.path(), "sales.csv", SALES_CSV);

    let response = get(
        app(dir.path()),
        &panel_uri("/api/chart", "pie", &path, "&pie=region"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["status"], "chart");
    assert_eq!(json["spec"]["chart"], "pie");
    assert_eq!(json["spec"]["slices"][0]["label"], "north");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_summary_api() {
    let dir = TempDir::new().unwrap();
    let path = stored(dir.path(), "sales.csv", SALES_CSV);
    let url = dashboard_url(&path.to_string_lossy());
    let uri = format!("/api/summary?{}", url.trim_start_matches("/dash/?"));

    let response = get(app(dir.path()), &uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["duplicate_rows"], 1);
    assert_eq!(json["rows"], 4);

    let response = get(app(dir.path()), "/api/summary").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["error"], "File not found");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_all_missing_column_is_unprocessable() {
    let dir = TempDir::new().unwrap();
    let path = stored(dir.path(), "gaps.csv", "id,note\n1,\n2,\n");

    let response = get(app(dir.path()), &dash_uri(&path, "")).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_text(response).await.contains("note"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_flash_is_shown_once() {
    let dir = TempDir::new().unwrap();
    let response = app(dir.path())
        .oneshot(
            Request::builder()
                .uri("/")
                .header(header::COOKIE, "flash=File%20not%20found")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = header_value(&response, header::SET_COOKIE);
    assert!(cookie.starts_with("flash=;"), "got {}", cookie);
    assert!(cookie.contains("Max-Age=0"));
    assert!(body_text(response).await.contains("<li>File not found</li>"));
}
