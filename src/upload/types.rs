use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::core::{FileHandle, StoredFile};
use crate::router::Route;

/// 上传项唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct UploadId(Uuid);

impl UploadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// 等待上传
    Pending,
    /// 上传中
    Uploading,
    /// 已完成
    Completed,
    /// 失败
    Error,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Completed | UploadStatus::Error)
    }

    /// 单次上传内允许的状态迁移
    pub fn can_transition(from: UploadStatus, to: UploadStatus) -> bool {
        use UploadStatus::*;

        matches!(
            (from, to),
            (Pending, Uploading) | (Uploading, Completed) | (Uploading, Error) | (Error, Uploading)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadItem {
    pub id: UploadId,
    pub file: FileHandle,
    /// 0..=100
    pub progress: u8,
    pub status: UploadStatus,
    /// 该文件最近一次失败的原因
    pub error: Option<String>,
    /// 上传成功后服务端返回的记录
    pub stored: Option<StoredFile>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl UploadItem {
    pub fn new(file: FileHandle) -> Self {
        Self {
            id: UploadId::new(),
            file,
            progress: 0,
            status: UploadStatus::Pending,
            error: None,
            stored: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// 一次批量上传的结果
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub completed: usize,
    pub failed: usize,
    /// 本次上传中最后一个失败的原因
    pub last_error: Option<String>,
    /// 全部成功时要跳转的页面
    pub navigate_to: Option<Route>,
}

#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// 新文件加入批次
    ItemAdded {
        upload_id: UploadId,
    },

    /// 状态变更
    StateChanged {
        upload_id: UploadId,
        old_state: UploadStatus,
        new_state: UploadStatus,
    },

    /// 进度更新，overall 为整个批次的平均进度
    Progress {
        upload_id: UploadId,
        percent: u8,
        overall: u8,
    },

    /// 任务失败
    Failed {
        upload_id: UploadId,
        error: String,
    },

    /// 任务完成
    Completed {
        upload_id: UploadId,
        file: StoredFile,
    },

    /// 整个批次结束
    BatchFinished(RunOutcome),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use UploadStatus::*;

        assert!(UploadStatus::can_transition(Pending, Uploading));
        assert!(UploadStatus::can_transition(Uploading, Completed));
        assert!(UploadStatus::can_transition(Uploading, Error));
        assert!(UploadStatus::can_transition(Error, Uploading));

        assert!(!UploadStatus::can_transition(Pending, Completed));
        assert!(!UploadStatus::can_transition(Pending, Error));
        assert!(!UploadStatus::can_transition(Completed, Uploading));
        assert!(!UploadStatus::can_transition(Completed, Pending));
        assert!(!UploadStatus::can_transition(Uploading, Pending));
    }

    #[test]
    fn test_upload_id_generation() {
        let id1 = UploadId::new();
        let id2 = UploadId::new();

        assert_ne!(id1, id2);
        assert!(!id1.to_string().is_empty());
    }
}
