//! Text-file adjustment store.
//!
//! One file per camera at `<directory>/<prefix><resource_id>.adjust`:
//!
//! ```text
//! # optional comment lines
//! tx ty tz
//! qw qx qy qz
//! ```
//!
//! Values must be finite and the quaternion is renormalized on read. Writes
//! go to a temporary sibling that is synced and then renamed over the target.

use super::{AdjustmentError, AdjustmentStore, PoseCorrection};
use nalgebra::{Quaternion, Vector3};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extension of adjustment resources
pub const ADJUSTMENT_EXTENSION: &str = "adjust";

/// Adjustment store backed by one text file per camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAdjustmentStore {
    directory: PathBuf,
    prefix: String,
}

impl FileAdjustmentStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            prefix: String::new(),
        }
    }

    /// Prepend `prefix` to every file name (e.g. `"run/ba-"`-style output prefixes).
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the file holding `resource_id`.
    pub fn path_for(&self, resource_id: &str) -> PathBuf {
        self.directory.join(format!(
            "{}{}.{}",
            self.prefix, resource_id, ADJUSTMENT_EXTENSION
        ))
    }
}

impl AdjustmentStore for FileAdjustmentStore {
    fn read(&self, resource_id: &str) -> Result<PoseCorrection, AdjustmentError> {
        let path = self.path_for(resource_id);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AdjustmentError::NotFound { path: path.clone() },
            _ => AdjustmentError::Io {
                path: path.clone(),
                message: e.to_string(),
            },
        })?;

        let correction = parse_adjustment(&content)?;
        debug!("Read adjustment {} from {}", correction, path.display());
        Ok(correction)
    }

    fn write(
        &self,
        resource_id: &str,
        correction: &PoseCorrection,
    ) -> Result<(), AdjustmentError> {
        let path = self.path_for(resource_id);
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

        let io_error = |e: std::io::Error| AdjustmentError::Io {
            path: path.clone(),
            message: e.to_string(),
        };

        let mut file = File::create(&tmp_path).map_err(io_error)?;
        file.write_all(format_adjustment(correction).as_bytes())
            .map_err(io_error)?;
        file.sync_all().map_err(io_error)?;
        drop(file);
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            io_error(e)
        })?;

        debug!("Wrote adjustment {} to {}", correction, path.display());
        Ok(())
    }
}

/// Serialize a correction in the two-line adjustment format.
pub fn format_adjustment(correction: &PoseCorrection) -> String {
    let t = &correction.translation;
    let q = correction.rotation.quaternion();
    format!(
        "{} {} {}\n{} {} {} {}\n",
        t.x, t.y, t.z, q.w, q.i, q.j, q.k
    )
}

/// Parse the two-line adjustment format.
pub fn parse_adjustment(content: &str) -> Result<PoseCorrection, AdjustmentError> {
    let mut data_lines = content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

    let last_line = content.lines().count();
    let (t_line, t_text) = data_lines
        .next()
        .ok_or(AdjustmentError::MissingFields {
            line: last_line + 1,
        })?;
    let (q_line, q_text) = data_lines
        .next()
        .ok_or(AdjustmentError::MissingFields {
            line: last_line + 1,
        })?;
    if let Some((line, _)) = data_lines.next() {
        return Err(AdjustmentError::Parse {
            line,
            message: "unexpected content after rotation".to_string(),
        });
    }

    let t = parse_numbers::<3>(t_text, t_line)?;
    let q = parse_numbers::<4>(q_text, q_line)?;

    PoseCorrection::from_components(
        Vector3::new(t[0], t[1], t[2]),
        Quaternion::new(q[0], q[1], q[2], q[3]),
    )
    .map_err(|e| AdjustmentError::Parse {
        line: q_line,
        message: e.to_string(),
    })
}

fn parse_numbers<const N: usize>(text: &str, line: usize) -> Result<[f64; N], AdjustmentError> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() < N {
        return Err(AdjustmentError::MissingFields { line });
    }
    if parts.len() > N {
        return Err(AdjustmentError::Parse {
            line,
            message: format!("expected {N} values, found {}", parts.len()),
        });
    }

    let mut values = [0.0; N];
    for (value, part) in values.iter_mut().zip(&parts) {
        *value = part
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| AdjustmentError::InvalidNumber {
                line,
                value: part.to_string(),
            })?;
    }
    Ok(values)
}
