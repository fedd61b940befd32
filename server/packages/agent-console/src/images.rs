//! Materialization of inline image payloads into per-invocation temp files.
//!
//! Image attachment is an enhancement, not a prerequisite for the prompt:
//! any failure here degrades to the original prompt with no paths reported.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::request::ImageAttachment;

/// Result of preprocessing the request's images.
#[derive(Debug, Default)]
pub struct MaterializedImages {
    pub prompt: String,
    pub temp_paths: Vec<PathBuf>,
    pub temp_dir: Option<PathBuf>,
}

/// Decode `data:<mime>;base64,<payload>` images into
/// `<working_dir>/.tmp/images/<millis>/image_<index>.<ext>` and append a
/// path-listing note to the prompt. Entries that do not match the data-URL
/// pattern are skipped silently.
pub fn materialize(
    prompt: &str,
    images: &[ImageAttachment],
    working_dir: &Path,
) -> MaterializedImages {
    if images.is_empty() {
        return MaterializedImages {
            prompt: prompt.to_string(),
            ..Default::default()
        };
    }

    let temp_dir = working_dir
        .join(".tmp")
        .join("images")
        .join(invocation_dir_name());

    match write_images(images, &temp_dir) {
        Ok(temp_paths) => {
            let prompt = augment_prompt(prompt, &temp_paths);
            MaterializedImages {
                prompt,
                temp_paths,
                temp_dir: Some(temp_dir),
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, dir = %temp_dir.display(), "failed to materialize images");
            MaterializedImages {
                prompt: prompt.to_string(),
                temp_paths: Vec::new(),
                temp_dir: Some(temp_dir),
            }
        }
    }
}

/// Delete every materialized file, then the owning directory.
///
/// Per-file errors are swallowed and a missing directory is not an error, so
/// the call is idempotent and safe from every exit path.
pub fn cleanup(temp_paths: &[PathBuf], temp_dir: Option<&Path>) {
    for path in temp_paths {
        let _ = fs::remove_file(path);
    }
    if let Some(dir) = temp_dir {
        let _ = fs::remove_dir_all(dir);
    }
}

fn write_images(
    images: &[ImageAttachment],
    temp_dir: &Path,
) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut temp_paths = Vec::new();
    for (index, image) in images.iter().enumerate() {
        let Some((mime, payload)) = parse_data_url(&image.data) else {
            continue;
        };
        let Ok(bytes) = BASE64.decode(payload) else {
            continue;
        };
        if temp_paths.is_empty() {
            fs::create_dir_all(temp_dir)?;
        }
        let extension = mime.split('/').nth(1).filter(|s| !s.is_empty()).unwrap_or("png");
        let path = temp_dir.join(format!("image_{index}.{extension}"));
        fs::write(&path, bytes)?;
        temp_paths.push(path);
    }
    Ok(temp_paths)
}

fn parse_data_url(data: &str) -> Option<(&str, &str)> {
    let rest = data.strip_prefix("data:")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    if mime.is_empty() || payload.is_empty() {
        return None;
    }
    Some((mime, payload))
}

fn augment_prompt(prompt: &str, temp_paths: &[PathBuf]) -> String {
    if temp_paths.is_empty() || prompt.trim().is_empty() {
        return prompt.to_string();
    }
    let listing = temp_paths
        .iter()
        .enumerate()
        .map(|(i, path)| format!("{}. {}", i + 1, path.display()))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{prompt}\n\n[Images provided at the following paths:]\n{listing}")
}

// Distinguishes invocations that start in the same millisecond, so two
// concurrent runs in one working directory never share (or delete) each
// other's files.
static INVOCATION_SEQ: AtomicU64 = AtomicU64::new(0);

fn invocation_dir_name() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let seq = INVOCATION_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{millis}-{seq}")
}
