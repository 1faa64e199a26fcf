//! Frontend serving helpers
//!
//! The built frontend itself is mounted as a fallback service in `build_router`; these
//! handlers cover the case where it is missing.

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use walkdir::WalkDir;

use crate::AppState;

/// Assets listed by the debug endpoint
const MAX_LISTED_ASSETS: usize = 20;

/// GET / when no frontend build is available
pub async fn root_banner() -> Json<Value> {
    Json(json!({
        "app": "Review Validator",
        "message": "Backend is running! Frontend build not found.",
    }))
}

#[derive(Debug, Serialize)]
pub struct FrontendStatus {
    pub build_dir: Option<String>,
    pub build_dir_exists: bool,
    pub assets: Vec<String>,
}

fn list_assets(dir: &Path) -> Vec<String> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) if e.file_type().is_file() => Some(
                e.path()
                    .strip_prefix(dir)
                    .unwrap_or(e.path())
                    .to_string_lossy()
                    .into_owned(),
            ),
            Ok(_) => None,
            Err(err) => Some(format!("Error listing files: {}", err)),
        })
        .take(MAX_LISTED_ASSETS)
        .collect()
}

/// GET /api/debug/frontend
pub async fn debug_frontend(State(state): State<AppState>) -> Json<FrontendStatus> {
    let Some(dir) = state.frontend_dir.as_deref() else {
        return Json(FrontendStatus {
            build_dir: None,
            build_dir_exists: false,
            assets: Vec::new(),
        });
    };

    let exists = dir.is_dir();
    Json(FrontendStatus {
        build_dir: Some(dir.display().to_string()),
        build_dir_exists: exists,
        assets: if exists { list_assets(dir) } else { Vec::new() },
    })
}
