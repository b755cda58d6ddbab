//! PDF 落盘
//!
//! 同名文件已存在时追加 ` (n)` 后缀，永远不覆盖已有文件。

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::FileError;

/// 同名文件最多尝试的后缀数
const MAX_SUFFIX: u32 = 999;

#[derive(Debug, Clone)]
pub struct PdfWriter {
    output_dir: PathBuf,
}

impl PdfWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 确保输出目录存在
    pub fn ensure_output_dir(&self) -> Result<(), FileError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| FileError::OutputDir {
            path: self.output_dir.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// 写入 `{stem}.pdf`，返回最终路径
    pub fn write(&self, stem: &str, bytes: &[u8]) -> Result<PathBuf> {
        self.ensure_output_dir()?;

        let mut tmp = NamedTempFile::new_in(&self.output_dir)
            .with_context(|| format!("无法创建临时文件: {}", self.output_dir.display()))?;
        tmp.write_all(bytes)?;
        tmp.flush()?;

        let mut pending = tmp;
        for n in 0..=MAX_SUFFIX {
            let candidate = self.output_dir.join(candidate_name(stem, n));
            match pending.persist_noclobber(&candidate) {
                Ok(_) => {
                    debug!("PDF 已写入: {}", candidate.display());
                    return Ok(candidate);
                }
                Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                    pending = e.file;
                }
                Err(e) => {
                    return Err(e.error)
                        .with_context(|| format!("无法写入 PDF: {}", candidate.display()));
                }
            }
        }
        anyhow::bail!("同名文件过多: {}.pdf", stem)
    }
}

fn candidate_name(stem: &str, n: u32) -> String {
    if n == 0 {
        format!("{}.pdf", stem)
    } else {
        format!("{} ({}).pdf", stem, n)
    }
}
