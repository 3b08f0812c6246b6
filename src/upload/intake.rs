use std::path::{Path, PathBuf};
use thiserror::Error;
use crate::core::FileHandle;

pub const XLSX_MEDIA_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const XLS_MEDIA_TYPE: &str = "application/vnd.ms-excel";
pub const CSV_MEDIA_TYPE: &str = "text/csv";

pub const ACCEPTED_MEDIA_TYPES: &[&str] = &[XLSX_MEDIA_TYPE, XLS_MEDIA_TYPE, CSV_MEDIA_TYPE];

/// 单个文件上限 50 MiB
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// 用户拖入或选择的候选文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub media_type: Option<String>,
}

impl Candidate {
    /// 读取文件大小，按扩展名推断媒体类型
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let media_type = mime_guess::from_path(path).first_raw().map(String::from);

        Ok(Self {
            path: path.to_path_buf(),
            name,
            size: metadata.len(),
            media_type,
        })
    }
}

/// 候选文件被拒绝的原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("{name}: unsupported file type {}", .media_type.as_deref().unwrap_or("(unknown)"))]
    UnsupportedType {
        name: String,
        media_type: Option<String>,
    },

    #[error("{name}: file is larger than 50MB ({size} bytes)")]
    TooLarge {
        name: String,
        size: u64,
    },
}

/// 校验候选文件，只有通过的才会生成上传项
pub fn accept(candidate: Candidate) -> Result<FileHandle, Rejection> {
    let media_type = match candidate.media_type.as_deref() {
        Some(media_type) if ACCEPTED_MEDIA_TYPES.contains(&media_type) => media_type.to_string(),
        _ => {
            return Err(Rejection::UnsupportedType {
                name: candidate.name,
                media_type: candidate.media_type,
            });
        }
    };

    if candidate.size > MAX_FILE_SIZE {
        return Err(Rejection::TooLarge {
            name: candidate.name,
            size: candidate.size,
        });
    }

    Ok(FileHandle {
        path: candidate.path,
        name: candidate.name,
        size: candidate.size,
        media_type,
    })
}
