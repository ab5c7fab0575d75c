use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::destinations;
use crate::fs;
use crate::index::PathIndexStore;
use crate::library::{self, LibraryEntry};
use crate::organizer::{BatchReport, OrganizeError, Organizer, Selection};

/// Number of trailing log lines served by `/logs`.
const LOG_TAIL_LINES: usize = 100;

#[derive(Debug)]
pub struct AppState {
    pub config: Config,
    pub store: PathIndexStore,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let store = PathIndexStore::new(&config.index_file);
        Self { config, store }
    }
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "status": self.status.as_u16(),
            }
        }));
        (self.status, body).into_response()
    }
}

impl From<OrganizeError> for AppError {
    fn from(err: OrganizeError) -> Self {
        match err {
            OrganizeError::InvalidDestination(_) => Self::bad_request(err.to_string()),
            OrganizeError::Index(_) => Self::internal(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::internal(format!("background task failed: {err}"))
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(library_handler))
        .route("/move", post(move_handler))
        .route("/delete", post(delete_handler))
        .route("/logs", get(logs_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: Config) -> anyhow::Result<()> {
    let listen = config.listen;
    let state = Arc::new(AppState::new(config));
    tracing::info!(
        library = %state.config.library_dir.display(),
        index = %state.store.path().display(),
        id_pattern = state.config.id_pattern.as_str(),
        "serving library on {listen}"
    );
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(listen).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct LibraryView {
    pub entries: Vec<LibraryEntry>,
    pub destinations: Vec<String>,
    pub grouped_destinations: BTreeMap<String, Vec<String>>,
}

impl LibraryView {
    pub fn build(config: &Config) -> Self {
        let entries = library::scan(&config.library_dir).collect::<Vec<_>>();
        let destinations = destinations::destinations(entries.iter().map(|e| &e.folder));
        let grouped_destinations = destinations::group(&destinations);
        Self {
            entries,
            destinations: destinations
                .iter()
                .map(|path| path.to_string_lossy().into_owned())
                .collect(),
            grouped_destinations,
        }
    }
}

async fn library_handler(State(state): State<Arc<AppState>>) -> Result<Json<LibraryView>, AppError> {
    let view = tokio::task::spawn_blocking(move || LibraryView::build(&state.config)).await?;
    Ok(Json(view))
}

/// Fields of a move or delete form. `selected` may repeat.
#[derive(Debug, Default, PartialEq)]
struct SelectionForm {
    selected: Vec<Selection>,
    destination: Option<String>,
}

impl SelectionForm {
    fn parse(body: &[u8]) -> Self {
        let mut form = Self::default();
        for (key, value) in url::form_urlencoded::parse(body) {
            match key.as_ref() {
                "selected" => form.selected.push(Selection::parse(&value)),
                "destination" => form.destination = Some(value.into_owned()),
                _ => tracing::debug!(%key, "ignoring unknown form field"),
            }
        }
        form
    }
}

async fn move_handler(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Redirect, AppError> {
    let form = SelectionForm::parse(body.as_bytes());
    let destination = form
        .destination
        .ok_or_else(|| AppError::bad_request("missing destination"))?;
    let selected = form.selected;
    tokio::task::spawn_blocking(move || -> Result<BatchReport, OrganizeError> {
        let fs = fs::new_instance(false);
        Organizer::new(
            &state.config.library_dir,
            &state.store,
            &state.config.id_pattern,
            fs.as_ref(),
        )
        .move_selected(&selected, Path::new(&destination))
    })
    .await??;
    Ok(Redirect::to("/"))
}

async fn delete_handler(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Redirect, AppError> {
    let selected = SelectionForm::parse(body.as_bytes()).selected;
    tokio::task::spawn_blocking(move || -> Result<BatchReport, OrganizeError> {
        let fs = fs::new_instance(false);
        Organizer::new(
            &state.config.library_dir,
            &state.store,
            &state.config.id_pattern,
            fs.as_ref(),
        )
        .delete_selected(&selected)
    })
    .await??;
    Ok(Redirect::to("/"))
}

async fn logs_handler(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let contents = match tokio::fs::read(&state.config.log_file).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Html("Log is empty or has not been created yet.".to_owned()));
        }
        Err(e) => return Err(AppError::internal(format!("failed to read log: {e}"))),
    };
    let contents = String::from_utf8_lossy(&contents);
    Ok(Html(format!("<pre>{}</pre>", escape_html(&tail(&contents, LOG_TAIL_LINES)))))
}

/// Returns the last `n` lines of `text`, keeping their line endings.
fn tail(text: &str, n: usize) -> String {
    let lines = text.split_inclusive('\n').collect::<Vec<_>>();
    lines[lines.len().saturating_sub(n)..].concat()
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
