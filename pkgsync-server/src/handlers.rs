use crate::AppState;
use crate::error::ApiError;
use crate::project::{guess_project, normalize_project};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse};
use pkgsync_types::ArtifactKey;
use std::collections::BTreeSet;
use tracing::info;

pub async fn health() -> &'static str {
    "ok"
}

pub async fn packages_index(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let records = state.local.list(None).await?;
    let links = records.iter().map(|r| {
        let key = r.key.as_str();
        (package_href(key), key.to_string())
    });
    Ok(Html(render_links("Packages", links)))
}

pub async fn simple_index(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let records = state.local.list(None).await?;
    let projects: BTreeSet<String> = records
        .iter()
        .filter_map(|r| guess_project(r.key.file_name()))
        .collect();
    let links = projects
        .into_iter()
        .map(|p| (format!("/simple/{}/", urlencoding::encode(&p)), p));
    Ok(Html(render_links("Simple index", links)))
}

pub async fn simple_project(
    State(state): State<AppState>,
    Path(project): Path<String>,
) -> Result<Html<String>, ApiError> {
    let wanted = normalize_project(&project);
    let records = state.local.list(None).await?;
    let files: Vec<_> = records
        .iter()
        .filter(|r| guess_project(r.key.file_name()).as_deref() == Some(wanted.as_str()))
        .map(|r| (package_href(r.key.as_str()), r.key.file_name().to_string()))
        .collect();
    if files.is_empty() {
        return Err(ApiError::UnknownProject(wanted));
    }
    Ok(Html(render_links(&format!("Links for {wanted}"), files)))
}

pub async fn get_package(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let key = ArtifactKey::parse(path)?;
    let content = state.local.read(&key).await?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], content))
}

/// Stores a new package file. Existing files are never overwritten.
pub async fn put_package(
    State(state): State<AppState>,
    Path(path): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let key = ArtifactKey::parse(path)?;
    if state.local.stat(&key).await?.is_some() {
        return Err(ApiError::AlreadyExists(key));
    }
    state
        .local
        .write(&key, &body)
        .await
        .map_err(ApiError::Local)?;
    info!(key = %key, bytes = body.len(), "stored package");
    Ok((StatusCode::CREATED, format!("stored {key}\n")))
}

pub async fn delete_package(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let key = ArtifactKey::parse(path)?;
    if state.local.stat(&key).await?.is_none() {
        return Err(ApiError::NotFound(key));
    }
    state.local.delete(&key).await.map_err(ApiError::Local)?;
    info!(key = %key, "removed package");
    Ok((StatusCode::OK, format!("removed {key}\n")))
}

fn package_href(key: &str) -> String {
    let encoded: Vec<_> = key.split('/').map(urlencoding::encode).collect();
    format!("/packages/{}", encoded.join("/"))
}

fn render_links(title: &str, links: impl IntoIterator<Item = (String, String)>) -> String {
    let title = escape_html(title);
    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head><title>{title}</title></head>\n<body>\n<h1>{title}</h1>\n"
    );
    for (href, text) in links {
        html.push_str(&format!(
            "<a href=\"{}\">{}</a><br>\n",
            escape_html(&href),
            escape_html(&text)
        ));
    }
    html.push_str("</body>\n</html>\n");
    html
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
