// src/docs/mod.rs — DocsController: blob storage on the local filesystem
//
// Stores raw content (handler output, uploaded documents) under
// <root>/<portfolio>/<org>/<ring>/<uuid>.<ext>. The ring segment may carry a
// date partition like `schd_runs/2026-01-15`.

use std::path::{Path, PathBuf};

use crate::infra::errors::RengloError;
use crate::infra::paths;

#[derive(Clone)]
pub struct DocsController {
    root: PathBuf,
}

impl DocsController {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Controller rooted at the default docs directory.
    pub fn default_root() -> Self {
        Self::new(paths::docs_dir())
    }

    /// Store content, returning the relative path of the new blob.
    pub async fn post(
        &self,
        portfolio: &str,
        org: &str,
        ring: &str,
        content: &str,
        content_type: &str,
    ) -> Result<String, RengloError> {
        let rel_dir = self.rel_dir(portfolio, org, ring)?;
        let filename = format!("{}.{}", uuid::Uuid::new_v4(), extension_for(content_type));
        let rel_path = format!("{rel_dir}/{filename}");

        let abs_dir = self.root.join(&rel_dir);
        tokio::fs::create_dir_all(&abs_dir).await?;
        tokio::fs::write(abs_dir.join(&filename), content).await?;

        tracing::debug!("Stored blob at {rel_path}");
        Ok(rel_path)
    }

    /// Read a blob back by the relative path returned from `post`.
    pub async fn get(&self, path: &str) -> Result<String, RengloError> {
        validate_rel_path(path)?;
        Ok(tokio::fs::read_to_string(self.root.join(path)).await?)
    }

    /// List the relative paths of all blobs in a ring.
    pub async fn list(
        &self,
        portfolio: &str,
        org: &str,
        ring: &str,
    ) -> Result<Vec<String>, RengloError> {
        let rel_dir = self.rel_dir(portfolio, org, ring)?;
        let abs_dir = self.root.join(&rel_dir);
        if !abs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        collect_files(&abs_dir, &rel_dir, &mut out).await?;
        out.sort();
        Ok(out)
    }

    fn rel_dir(&self, portfolio: &str, org: &str, ring: &str) -> Result<String, RengloError> {
        for part in [portfolio, org].into_iter().chain(ring.split('/')) {
            validate_component(part)?;
        }
        Ok(format!("{portfolio}/{org}/{ring}"))
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "application/json" => "json",
        "text/plain" => "txt",
        "text/html" => "html",
        "text/csv" => "csv",
        _ => "bin",
    }
}

fn validate_component(part: &str) -> Result<(), RengloError> {
    if part.is_empty() || part == "." || part == ".." || part.contains(['\\', '\0']) {
        return Err(RengloError::Config(format!(
            "invalid path component '{part}'"
        )));
    }
    Ok(())
}

fn validate_rel_path(path: &str) -> Result<(), RengloError> {
    for part in path.split('/') {
        validate_component(part)?;
    }
    Ok(())
}

/// Walk a directory tree, collecting file paths relative to the store root.
async fn collect_files(
    abs_dir: &Path,
    rel_dir: &str,
    out: &mut Vec<String>,
) -> Result<(), RengloError> {
    let mut stack = vec![(abs_dir.to_path_buf(), rel_dir.to_string())];

    while let Some((dir, rel)) = stack.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await?.is_dir() {
                stack.push((entry.path(), format!("{rel}/{name}")));
            } else {
                out.push(format!("{rel}/{name}"));
            }
        }
    }

    Ok(())
}
