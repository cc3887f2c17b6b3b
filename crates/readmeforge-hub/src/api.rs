//! REST API server: generate READMEs for remote repositories over HTTP.
//!
//! Endpoints:
//! - GET  /health — Health check
//! - POST /api/generate-readme — Clone `githubLink` and generate its README
//! - GET  /api/check-readme?folder= — Whether a generated README exists
//! - GET  /api/get-readme?folder= — Generated README as `content`
//! - GET  /api/get-readme/{folder} — Generated README as `readme`

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    extract::{Path as UrlPath, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use readmeforge_core::error::{ForgeError, Result};
use readmeforge_core::provider::Completer;

use crate::pipeline::ReadmePipeline;

/// Fetches a remote repository into a local directory.
#[async_trait]
pub trait RepoFetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Shallow clone through the `git` executable.
pub struct GitCloner;

#[async_trait]
impl RepoFetcher for GitCloner {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let output = tokio::process::Command::new("git")
            .args(["clone", "--depth", "1", "--", url])
            .arg(dest)
            .output()
            .await
            .map_err(|e| ForgeError::Other(format!("Failed to run git: {}", e)))?;

        if !output.status.success() {
            return Err(ForgeError::Other(format!(
                "git clone exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Shared API state.
pub struct ApiState {
    pub completer: Arc<dyn Completer>,
    pub fetcher: Arc<dyn RepoFetcher>,
    pub pipeline: ReadmePipeline,
    /// Clones land in `<workdir>/<repo>-<millis>`.
    pub workdir: PathBuf,
}

type SharedState = Arc<ApiState>;
type ApiError = (StatusCode, Json<ErrorResponse>);

// ─── Request/Response types ────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub github_link: String,
}

#[derive(Serialize)]
pub struct GenerateResponse {
    pub readme: String,
    pub path: String,
    pub folder: String,
}

#[derive(Deserialize)]
pub struct FolderQuery {
    pub folder: Option<String>,
}

#[derive(Serialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

#[derive(Serialize)]
pub struct ContentResponse {
    pub content: String,
}

#[derive(Serialize)]
pub struct ReadmeResponse {
    pub readme: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Repository name from a clone URL: the last path segment without `.git`.
pub fn repo_name(url: &str) -> String {
    let last = url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default();
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        "repo".to_string()
    } else {
        name.to_string()
    }
}

/// A folder names one clone directly under the workdir, nothing else.
fn valid_folder(folder: &str) -> bool {
    !folder.is_empty() && folder != "." && !folder.contains(['/', '\\']) && !folder.contains("..")
}

impl ApiState {
    fn readme_path(&self, folder: &str) -> PathBuf {
        self.workdir
            .join(folder)
            .join(&self.pipeline.settings().output_file)
    }

    fn folder_from_query(query: FolderQuery) -> std::result::Result<String, ApiError> {
        match query.folder {
            Some(folder) if valid_folder(&folder) => Ok(folder),
            Some(_) => Err(error(StatusCode::BAD_REQUEST, "Invalid folder name")),
            None => Err(error(StatusCode::BAD_REQUEST, "Missing folder name")),
        }
    }
}

// ─── Handlers ──────────────────────────────────────────────

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "OK",
        "message": "ReadmeForge server is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn generate_readme(
    State(state): State<SharedState>,
    Json(req): Json<GenerateRequest>,
) -> std::result::Result<Json<GenerateResponse>, ApiError> {
    let link = req.github_link.trim();
    if link.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "Github link is required"));
    }
    if link.starts_with('-') {
        return Err(error(StatusCode::BAD_REQUEST, "Invalid Github link"));
    }

    let folder = format!(
        "{}-{}",
        repo_name(link),
        chrono::Utc::now().timestamp_millis()
    );
    let dest = state.workdir.join(&folder);
    info!("Cloning {} into {}", link, dest.display());

    if let Err(e) = state.fetcher.fetch(link, &dest).await {
        warn!("Clone of {} failed: {}", link, e);
        return Err(error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Cloning failed: {}", e),
        ));
    }

    match state
        .pipeline
        .run_and_write(state.completer.as_ref(), &dest)
        .await
    {
        Ok(output) => Ok(Json(GenerateResponse {
            readme: output.readme,
            path: state.readme_path(&folder).display().to_string(),
            folder,
        })),
        Err(e) => {
            warn!("README generation for {} failed: {}", link, e);
            Err(error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("README generation failed: {}", e),
            ))
        }
    }
}

async fn check_readme(
    State(state): State<SharedState>,
    Query(query): Query<FolderQuery>,
) -> std::result::Result<Json<ExistsResponse>, ApiError> {
    let folder = ApiState::folder_from_query(query)?;
    Ok(Json(ExistsResponse {
        exists: state.readme_path(&folder).is_file(),
    }))
}

async fn get_readme_by_query(
    State(state): State<SharedState>,
    Query(query): Query<FolderQuery>,
) -> std::result::Result<Json<ContentResponse>, ApiError> {
    let folder = ApiState::folder_from_query(query)?;
    match tokio::fs::read_to_string(state.readme_path(&folder)).await {
        Ok(content) => Ok(Json(ContentResponse { content })),
        Err(_) => Err(error(StatusCode::NOT_FOUND, "README not found")),
    }
}

async fn get_readme_by_path(
    State(state): State<SharedState>,
    UrlPath(folder): UrlPath<String>,
) -> std::result::Result<Json<ReadmeResponse>, ApiError> {
    if !valid_folder(&folder) {
        return Err(error(StatusCode::BAD_REQUEST, "Invalid folder name"));
    }
    match tokio::fs::read_to_string(state.readme_path(&folder)).await {
        Ok(readme) => Ok(Json(ReadmeResponse { readme })),
        Err(_) => Err(error(StatusCode::NOT_FOUND, "README not found")),
    }
}

// ─── Server builder ────────────────────────────────────────

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/generate-readme", post(generate_readme))
        .route("/api/check-readme", get(check_readme))
        .route("/api/get-readme", get(get_readme_by_query))
        .route("/api/get-readme/{folder}", get(get_readme_by_path))
        .with_state(state)
}

/// Start the API server.
pub async fn start_server(state: ApiState, host: &str, port: u16) -> Result<()> {
    std::fs::create_dir_all(&state.workdir)?;
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| ForgeError::Config(format!("Invalid listen address: {}", e)))?;
    info!("API server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use tower::ServiceExt;

    use readmeforge_core::config::PipelineSettings;
    use readmeforge_core::retry::RequestOptions;

    use crate::pipeline::testing::ScriptedCompleter;

    /// Writes a tiny crate instead of touching the network.
    struct FixtureFetcher;

    #[async_trait]
    impl RepoFetcher for FixtureFetcher {
        async fn fetch(&self, _url: &str, dest: &Path) -> Result<()> {
            std::fs::create_dir_all(dest.join("src"))?;
            std::fs::write(dest.join("src/main.rs"), "fn main() {}")?;
            std::fs::write(dest.join("Cargo.toml"), "[package]\nname = \"demo\"")?;
            Ok(())
        }
    }

    struct UnreachableFetcher;

    #[async_trait]
    impl RepoFetcher for UnreachableFetcher {
        async fn fetch(&self, url: &str, _dest: &Path) -> Result<()> {
            Err(ForgeError::Other(format!("repository {} not found", url)))
        }
    }

    fn app(
        workdir: &Path,
        completer: Arc<ScriptedCompleter>,
        fetcher: Arc<dyn RepoFetcher>,
    ) -> Router {
        build_router(Arc::new(ApiState {
            completer,
            fetcher,
            pipeline: ReadmePipeline::new(PipelineSettings::default(), RequestOptions::default()),
            workdir: workdir.to_path_buf(),
        }))
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_repo_name_from_urls() {
        assert_eq!(repo_name("https://github.com/acme/widget.git"), "widget");
        assert_eq!(repo_name("https://github.com/acme/widget/"), "widget");
        assert_eq!(repo_name("git@github.com:acme/tool.git"), "tool");
        assert_eq!(repo_name("widget"), "widget");
        assert_eq!(repo_name("https://github.com/"), "github.com");
    }

    #[test]
    fn test_folder_names_stay_inside_workdir() {
        assert!(valid_folder("widget-1700000000000"));
        assert!(!valid_folder(""));
        assert!(!valid_folder("."));
        assert!(!valid_folder(".."));
        assert!(!valid_folder("a/b"));
        assert!(!valid_folder("..\\etc"));
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let completer = Arc::new(ScriptedCompleter::new(vec![]));
        let resp = app(dir.path(), completer, Arc::new(FixtureFetcher))
            .oneshot(get("/health"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["status"], "OK");
    }

    #[tokio::test]
    async fn test_generate_then_fetch_readme() {
        let dir = tempfile::tempdir().unwrap();
        let completer = Arc::new(ScriptedCompleter::new(vec![
            Ok("OK"),
            Ok("[\"src/main.rs\", \"Cargo.toml\"]"),
            Ok("### src/main.rs\nEntry point.\n### Cargo.toml\nManifest."),
            Ok("# Widget\n\nGenerated."),
        ]));
        let app = app(dir.path(), completer.clone(), Arc::new(FixtureFetcher));

        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/generate-readme",
                serde_json::json!({ "githubLink": "https://github.com/acme/widget.git" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["readme"], "# Widget\n\nGenerated.");
        let folder = body["folder"].as_str().unwrap().to_string();
        assert!(folder.starts_with("widget-"));
        assert!(body["path"].as_str().unwrap().ends_with("readme.md"));
        assert_eq!(completer.requests().len(), 4);

        let resp = app
            .clone()
            .oneshot(get(&format!("/api/check-readme?folder={folder}")))
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["exists"], true);

        let resp = app
            .clone()
            .oneshot(get(&format!("/api/get-readme?folder={folder}")))
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["content"], "# Widget\n\nGenerated.");

        let resp = app
            .oneshot(get(&format!("/api/get-readme/{folder}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["readme"], "# Widget\n\nGenerated.");
    }

    #[tokio::test]
    async fn test_generate_requires_link() {
        let dir = tempfile::tempdir().unwrap();
        let completer = Arc::new(ScriptedCompleter::new(vec![]));
        let app = app(dir.path(), completer.clone(), Arc::new(FixtureFetcher));

        let resp = app
            .clone()
            .oneshot(post_json("/api/generate-readme", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "Github link is required");

        let resp = app
            .oneshot(post_json(
                "/api/generate-readme",
                serde_json::json!({ "githubLink": "--upload-pack=evil" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(completer.requests().is_empty());
    }

    #[tokio::test]
    async fn test_clone_failure_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let completer = Arc::new(ScriptedCompleter::new(vec![Ok("OK")]));
        let resp = app(dir.path(), completer.clone(), Arc::new(UnreachableFetcher))
            .oneshot(post_json(
                "/api/generate-readme",
                serde_json::json!({ "githubLink": "https://github.com/acme/missing" }),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert!(body["error"].as_str().unwrap().starts_with("Cloning failed"));
        assert!(completer.requests().is_empty());
    }

    #[tokio::test]
    async fn test_folder_queries_validate_and_miss() {
        let dir = tempfile::tempdir().unwrap();
        let completer = Arc::new(ScriptedCompleter::new(vec![]));
        let app = app(dir.path(), completer, Arc::new(FixtureFetcher));

        let resp = app.clone().oneshot(get("/api/check-readme")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "Missing folder name");

        let resp = app
            .clone()
            .oneshot(get("/api/check-readme?folder=..%2F..%2Fetc"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app
            .clone()
            .oneshot(get("/api/check-readme?folder=nothing-here"))
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["exists"], false);

        let resp = app
            .clone()
            .oneshot(get("/api/get-readme?folder=nothing-here"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app.oneshot(get("/api/get-readme/nothing-here")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["error"], "README not found");
    }
}
