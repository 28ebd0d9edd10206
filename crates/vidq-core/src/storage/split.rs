//! Part planning and part-file writing for oversized artifacts.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// How an oversized artifact is cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SplitPolicy {
    /// Every part is exactly the ceiling except the last.
    #[default]
    #[serde(rename = "fixed")]
    FixedSize,
    /// `ceil(S / C)` parts of (almost) equal size.
    #[serde(rename = "equal")]
    EqualParts,
}

/// One planned part: byte range `[offset, offset + len)` of the source, 1-based index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartPlan {
    pub index: usize,
    pub offset: u64,
    pub len: u64,
}

/// A part file written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub index: usize,
    pub path: PathBuf,
    pub size_bytes: u64,
}

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("split ceiling must be greater than zero")]
    ZeroCeiling,
    #[error("cannot read source {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("writing part {index} failed: {source}")]
    Part {
        index: usize,
        #[source]
        source: io::Error,
    },
    #[error("source changed while splitting: expected {expected} bytes, copied {copied}")]
    ShortCopy { expected: u64, copied: u64 },
}

/// Size of every part but the last under `policy`.
fn part_size(total: u64, ceiling: u64, policy: SplitPolicy) -> u64 {
    match policy {
        SplitPolicy::FixedSize => ceiling,
        SplitPolicy::EqualParts => {
            let count = total.div_ceil(ceiling);
            total.div_ceil(count.max(1))
        }
    }
}

/// Plans the parts for a `total`-byte artifact under `ceiling`.
///
/// Returns a single part covering everything when `total <= ceiling`, and an
/// empty plan for an empty artifact or a zero ceiling.
pub fn plan_parts(total: u64, ceiling: u64, policy: SplitPolicy) -> Vec<PartPlan> {
    if total == 0 || ceiling == 0 {
        return Vec::new();
    }
    let size = part_size(total, ceiling, policy);

    let mut out = Vec::with_capacity(total.div_ceil(size) as usize);
    let mut offset = 0u64;
    while offset < total {
        let len = size.min(total - offset);
        out.push(PartPlan {
            index: out.len() + 1,
            offset,
            len,
        });
        offset += len;
    }
    out
}

/// File name for part `index` of `stem` + `ext`, e.g. `Movie.part01.mp4`.
pub fn part_file_name(stem: &str, ext: &str, index: usize) -> String {
    format!("{stem}.part{index:02}{ext}")
}

/// Splits `source` into part files inside `out_dir`.
///
/// Blocking; call from `spawn_blocking` in async code. On any failure every
/// part file written so far is removed before the error is returned.
pub fn split_file(
    source: &Path,
    out_dir: &Path,
    ceiling: u64,
    policy: SplitPolicy,
) -> Result<Vec<Part>, SplitError> {
    if ceiling == 0 {
        return Err(SplitError::ZeroCeiling);
    }
    let file = File::open(source).map_err(|e| SplitError::Source {
        path: source.to_path_buf(),
        source: e,
    })?;
    let total = file
        .metadata()
        .map_err(|e| SplitError::Source {
            path: source.to_path_buf(),
            source: e,
        })?
        .len();

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let ext = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut reader = BufReader::with_capacity(1 << 20, file);
    let mut written: Vec<Part> = Vec::new();
    for plan in plan_parts(total, ceiling, policy) {
        let path = out_dir.join(part_file_name(&stem, &ext, plan.index));
        match write_part(&mut reader, &plan, &path) {
            Ok(()) => written.push(Part {
                index: plan.index,
                path,
                size_bytes: plan.len,
            }),
            Err(err) => {
                let _ = std::fs::remove_file(&path);
                for part in &written {
                    if let Err(e) = std::fs::remove_file(&part.path) {
                        tracing::warn!(path = %part.path.display(), "remove partial split output: {}", e);
                    }
                }
                return Err(err);
            }
        }
    }
    Ok(written)
}

fn write_part<R: Read + Seek>(
    reader: &mut R,
    plan: &PartPlan,
    path: &Path,
) -> Result<(), SplitError> {
    let part_err = |source| SplitError::Part {
        index: plan.index,
        source,
    };
    reader.seek(SeekFrom::Start(plan.offset)).map_err(part_err)?;
    let out = File::create(path).map_err(part_err)?;
    let mut writer = BufWriter::with_capacity(1 << 20, out);
    let copied = io::copy(&mut reader.by_ref().take(plan.len), &mut writer).map_err(part_err)?;
    writer.flush().map_err(part_err)?;
    if copied != plan.len {
        return Err(SplitError::ShortCopy {
            expected: plan.len,
            copied,
        });
    }
    Ok(())
}
