//! HTTP surface: upload form, upload endpoint, dashboard page, per-panel fragments and JSON APIs.
//!
//! Handlers share only the read-only configuration. Every dashboard request re-reads and
//! re-wrangles the referenced file on a blocking thread.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::dashboard::{Dashboard, DashboardParams, Panel};
use crate::error_display::{classify_report, ErrorClass};
use crate::render::pages::DashboardView;
use crate::render::{dashboard_page, error_page, index_page, panel_body};
use crate::upload::{validate_upload, UploadStore};

const FLASH_COOKIE: &str = "flash";
const FLASH_MAX_AGE_SECS: u32 = 60;

/// Shared, read-only request state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: UploadStore,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let store = UploadStore::new(config.server.upload_dir.clone());
        Self {
            config: Arc::new(config),
            store,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes();
    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .route("/dash", get(dashboard))
        .route("/dash/", get(dashboard))
        .route("/dash/panel/{panel}", get(panel_fragment))
        .route("/api/chart/{panel}", get(chart_json))
        .route("/api/summary", get(summary_json))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn serve(config: AppConfig) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| eyre!("Failed to bind {}: {}", addr, e))?;
    let local = listener.local_addr()?;
    info!(%local, upload_dir = %config.server.upload_dir.display(), "datadash listening");

    let app = build_router(AppState::new(config));
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("datadash shutting down");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorFormat {
    Html,
    Json,
}

/// A failed request, rendered as an error page or a JSON object.
#[derive(Debug)]
pub struct WebError {
    status: StatusCode,
    message: String,
    format: ErrorFormat,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            format: ErrorFormat::Html,
        }
    }

    fn json(mut self) -> Self {
        self.format = ErrorFormat::Json;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<color_eyre::Report> for WebError {
    fn from(report: color_eyre::Report) -> Self {
        let (class, message) = classify_report(&report);
        let status = match class {
            ErrorClass::BadData => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorClass::NotFound => StatusCode::NOT_FOUND,
            ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            warn!(error = ?report, "request failed");
        } else {
            info!(%status, %message, "request rejected");
        }
        Self::new(status, message)
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self.format {
            ErrorFormat::Json => (
                self.status,
                Json(ErrorBody {
                    error: &self.message,
                }),
            )
                .into_response(),
            ErrorFormat::Html => {
                let heading = match self.status {
                    StatusCode::UNPROCESSABLE_ENTITY => "This file could not be processed",
                    StatusCode::NOT_FOUND => "Not found",
                    _ => "Something went wrong",
                };
                (self.status, Html(error_page(heading, &self.message))).into_response()
            }
        }
    }
}

/// Run blocking work (file reads, wrangling, chart rendering) off the async executor.
async fn run_blocking<T, F>(f: F) -> Result<T, WebError>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(WebError::from),
        Err(e) => Err(WebError::from(eyre!("worker task failed: {}", e))),
    }
}

fn flash_cookie(messages: &[&str]) -> String {
    let value = utf8_percent_encode(&messages.join("\n"), NON_ALPHANUMERIC).to_string();
    format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        FLASH_COOKIE, value, FLASH_MAX_AGE_SECS
    )
}

fn clear_flash_cookie() -> String {
    format!("{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax", FLASH_COOKIE)
}

/// Messages flashed by the previous response.
fn read_flashes(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(name, _)| *name == FLASH_COOKIE)
        .flat_map(|(_, value)| {
            percent_decode_str(value)
                .decode_utf8_lossy()
                .split('\n')
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Render a page and clear any flash it displayed.
fn page_response(flashes: &[String], html: String) -> Response {
    if flashes.is_empty() {
        Html(html).into_response()
    } else {
        ([(header::SET_COOKIE, clear_flash_cookie())], Html(html)).into_response()
    }
}

fn redirect_with_flash(location: &str, message: &str) -> Response {
    (
        [(header::SET_COOKIE, flash_cookie(&[message]))],
        Redirect::to(location),
    )
        .into_response()
}

/// Where a failed upload goes back to: the Referer when it points at this site, otherwise `/`.
fn origin_page(headers: &HeaderMap) -> String {
    let Some(referer) = headers.get(header::REFERER).and_then(|v| v.to_str().ok()) else {
        return "/".to_string();
    };
    if referer.starts_with('/') && !referer.starts_with("//") {
        return referer.to_string();
    }
    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());
    let rest = referer
        .strip_prefix("http://")
        .or_else(|| referer.strip_prefix("https://"));
    match (rest, host) {
        (Some(rest), Some(host)) => {
            let (authority, path) = match rest.find('/') {
                Some(i) => (&rest[..i], &rest[i..]),
                None => (rest, "/"),
            };
            if authority.eq_ignore_ascii_case(host) {
                path.to_string()
            } else {
                "/".to_string()
            }
        }
        _ => "/".to_string(),
    }
}

/// URL of the dashboard for a stored file.
pub fn dashboard_url(file: &str) -> String {
    format!("/dash/?file={}", utf8_percent_encode(file, NON_ALPHANUMERIC))
}

async fn index(headers: HeaderMap) -> Response {
    let flashes = read_flashes(&headers);
    page_response(&flashes, index_page(&flashes))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Response, WebError> {
    let back = origin_page(&headers);
    let mut file: Option<(String, axum::body::Bytes)> = None;

    if let Ok(mut multipart) = multipart {
        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => return Err(WebError::new(e.status(), e.body_text())),
            };
            if field.name() != Some("file") {
                continue;
            }
            let name = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| WebError::new(e.status(), e.body_text()))?;
            file = Some((name, bytes));
            break;
        }
    }

    let (name, bytes) = match file {
        Some((name, bytes)) => (Some(name), bytes),
        None => (None, Default::default()),
    };
    let secured = match validate_upload(name.as_deref()) {
        Ok(secured) => secured,
        Err(e) => {
            warn!(reason = %e, filename = ?name, "upload rejected");
            return Ok(redirect_with_flash(&back, &e.to_string()));
        }
    };

    let store = state.store.clone();
    let stored = run_blocking(move || store.save(&secured, &bytes)).await?;
    let reference = stored.to_string_lossy().into_owned();
    Ok(redirect_with_flash(
        &dashboard_url(&reference),
        "File successfully uploaded",
    ))
}

fn dashboard_html(
    dash: &Dashboard,
    file: &str,
    params: &DashboardParams,
    flashes: &[String],
    config: &AppConfig,
) -> Result<String> {
    let rows = dash.rows(params);
    let overview = dash.overview(rows)?;
    let columns = dash.column_options();
    let (width, height) = (config.dashboard.chart_width, config.dashboard.chart_height);
    let panels = Panel::ALL
        .into_iter()
        .map(|p| (p, panel_body(&dash.panel(p, params), width, height)))
        .collect();
    let view = DashboardView {
        file,
        flashes,
        duplicate_text: dash.duplicate_text(rows),
        rows,
        row_choices: dash.row_choices(),
        date_index: &dash.wrangled().date_index,
        overview: overview.as_ref(),
        columns: &columns,
        params,
        panels,
    };
    Ok(dashboard_page(&view))
}

async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Response, WebError> {
    let params = DashboardParams::from_query(query.as_deref().unwrap_or_default());
    let resolved = params.file.as_deref().and_then(|f| state.store.resolve(f));
    let (Some(path), Some(file)) = (resolved, params.file.clone()) else {
        return Ok(redirect_with_flash("/", "File not found"));
    };

    let flashes = read_flashes(&headers);
    let config = state.config.clone();
    let shown = flashes.clone();
    let html = run_blocking(move || {
        let dash = Dashboard::load(&path, &config)?;
        dashboard_html(&dash, &file, &params, &shown, &config)
    })
    .await?;
    Ok(page_response(&flashes, html))
}

/// Resolve the panel name and file of a panel request.
fn panel_request(
    state: &AppState,
    panel: &str,
    query: Option<&str>,
) -> Result<(Panel, std::path::PathBuf, DashboardParams), WebError> {
    let panel: Panel = panel
        .parse()
        .map_err(|_| WebError::new(StatusCode::NOT_FOUND, format!("Unknown panel '{}'", panel)))?;
    let params = DashboardParams::from_query(query.unwrap_or_default());
    let path = params
        .file
        .as_deref()
        .and_then(|f| state.store.resolve(f))
        .ok_or_else(|| WebError::new(StatusCode::NOT_FOUND, "File not found"))?;
    Ok((panel, path, params))
}

async fn panel_fragment(
    State(state): State<AppState>,
    Path(panel): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Html<String>, WebError> {
    let (panel, path, params) = panel_request(&state, &panel, query.as_deref())?;
    let config = state.config.clone();
    let html = run_blocking(move || {
        let dash = Dashboard::load(&path, &config)?;
        Ok(panel_body(
            &dash.panel(panel, &params),
            config.dashboard.chart_width,
            config.dashboard.chart_height,
        ))
    })
    .await?;
    Ok(Html(html))
}

async fn chart_json(
    State(state): State<AppState>,
    Path(panel): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, WebError> {
    let (panel, path, params) =
        panel_request(&state, &panel, query.as_deref()).map_err(WebError::json)?;
    let config = state.config.clone();
    let outcome = run_blocking(move || Ok(Dashboard::load(&path, &config)?.panel(panel, &params)))
        .await
        .map_err(WebError::json)?;
    Ok(Json(outcome).into_response())
}

async fn summary_json(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, WebError> {
    let params = DashboardParams::from_query(query.as_deref().unwrap_or_default());
    let (Some(path), Some(file)) = (
        params.file.as_deref().and_then(|f| state.store.resolve(f)),
        params.file.clone(),
    ) else {
        return Err(WebError::new(StatusCode::NOT_FOUND, "File not found").json());
    };
    let config = state.config.clone();
    let summary = run_blocking(move || Ok(Dashboard::load(&path, &config)?.summary(&file)))
        .await
        .map_err(WebError::json)?;
    Ok(Json(summary).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn flash_cookie_round_trips_through_headers() {
        let cookie = flash_cookie(&["File successfully uploaded"]);
        let value = cookie.split(';').next().unwrap().to_string();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {}", value)).unwrap(),
        );
        assert_eq!(read_flashes(&headers), vec!["File successfully uploaded"]);
    }

    #[test]
    fn origin_page_only_follows_same_site_referers() {
        let mut headers = HeaderMap::new();
        assert_eq!(origin_page(&headers), "/");

        headers.insert(header::HOST, HeaderValue::from_static("localhost:8050"));
        headers.insert(
            header::REFERER,
            HeaderValue::from_static("http://localhost:8050/dash/?file=x"),
        );
        assert_eq!(origin_page(&headers), "/dash/?file=x");

        headers.insert(header::REFERER, HeaderValue::from_static("https://evil.example/"));
        assert_eq!(origin_page(&headers), "/");
    }

    #[test]
    fn dashboard_url_encodes_path() {
        assert_eq!(
            dashboard_url("uploads/my data.csv"),
            "/dash/?file=uploads%2Fmy%20data%2Ecsv"
        );
    }
}
