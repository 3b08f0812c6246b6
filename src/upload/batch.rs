use chrono::Utc;
use tracing::debug;
use crate::core::{FileHandle, StoredFile};
use super::errors::{Result, UploadError};
use super::types::{UploadId, UploadItem, UploadStatus};

/// 一批上传项，顺序即加入顺序
#[derive(Debug, Clone, Default)]
pub struct UploadBatch {
    items: Vec<UploadItem>,
    last_error: Option<String>,
}

impl UploadBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, file: FileHandle) -> UploadId {
        let item = UploadItem::new(file);
        let id = item.id;
        self.items.push(item);
        id
    }

    /// 上传中的文件不能移除
    pub fn remove(&mut self, id: UploadId) -> Result<UploadItem> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or(UploadError::NotFound(id))?;

        if self.items[index].status == UploadStatus::Uploading {
            return Err(UploadError::InFlight(id));
        }

        let item = self.items.remove(index);
        if self.items.is_empty() {
            self.last_error = None;
        }

        Ok(item)
    }

    pub fn get(&self, id: UploadId) -> Option<&UploadItem> {
        self.items.iter().find(|item| item.id == id)
    }

    fn get_mut(&mut self, id: UploadId) -> Option<&mut UploadItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    pub fn items(&self) -> &[UploadItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn set_last_error(&mut self, error: Option<String>) {
        self.last_error = error;
    }

    /// 尚未完成的上传项，按批次顺序
    pub fn unfinished_ids(&self) -> Vec<UploadId> {
        self.items
            .iter()
            .filter(|item| item.status != UploadStatus::Completed)
            .map(|item| item.id)
            .collect()
    }

    pub fn all_completed(&self) -> bool {
        self.items.iter().all(|item| item.status == UploadStatus::Completed)
    }

    /// 所有上传项进度的平均值
    pub fn overall_progress(&self) -> u8 {
        if self.items.is_empty() {
            return 0;
        }

        let total: u32 = self.items.iter().map(|item| item.progress as u32).sum();
        (total / self.items.len() as u32) as u8
    }

    /// 切换到 Uploading，返回原状态；状态不允许或上传项已移除时返回 None
    pub(crate) fn start(&mut self, id: UploadId) -> Option<UploadStatus> {
        let item = self.get_mut(id)?;
        let old_state = item.status;
        if !UploadStatus::can_transition(old_state, UploadStatus::Uploading) {
            debug!(upload_id = %id, ?old_state, "Skip start");
            return None;
        }

        item.status = UploadStatus::Uploading;
        item.error = None;
        item.started_at = Some(Utc::now());
        item.completed_at = None;
        Some(old_state)
    }

    pub(crate) fn set_progress(&mut self, id: UploadId, percent: u8) -> bool {
        match self.get_mut(id) {
            Some(item) if item.status == UploadStatus::Uploading => {
                item.progress = percent.min(100);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn complete(&mut self, id: UploadId, stored: StoredFile) -> bool {
        match self.get_mut(id) {
            Some(item) if item.status == UploadStatus::Uploading => {
                item.status = UploadStatus::Completed;
                item.progress = 100;
                item.stored = Some(stored);
                item.completed_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }

    pub(crate) fn fail(&mut self, id: UploadId, error: String) -> bool {
        match self.get_mut(id) {
            Some(item) if item.status == UploadStatus::Uploading => {
                item.status = UploadStatus::Error;
                item.error = Some(error);
                item.completed_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }
}
