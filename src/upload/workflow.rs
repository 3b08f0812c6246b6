use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, mpsc, RwLock, Semaphore};
use tracing::{debug, info, warn};
use crate::core::{FileService, ProgressCallback};
use crate::router::{Navigator, Route};
use super::batch::UploadBatch;
use super::errors::{Result, UploadError};
use super::intake::{accept, Candidate, Rejection};
use super::types::{RunOutcome, UploadEvent, UploadId, UploadItem, UploadStatus};

pub const UPLOAD_FAILED_FALLBACK: &str = "Failed to upload file. Please try again.";

const EVENT_CAPACITY: usize = 256;

/// 本次加入批次的结果
#[derive(Debug, Clone, Default)]
pub struct Intake {
    pub accepted: Vec<UploadId>,
    pub rejected: Vec<Rejection>,
}

enum ItemResult {
    Skipped,
    Completed,
    Failed,
}

/// 执行单个上传项，可以在任务间克隆
#[derive(Clone)]
struct UploadRunner {
    service: Arc<dyn FileService>,
    batch: Arc<RwLock<UploadBatch>>,
    event_tx: broadcast::Sender<UploadEvent>,
}

impl UploadRunner {
    fn emit(&self, event: UploadEvent) {
        // 没有订阅者时忽略
        let _ = self.event_tx.send(event);
    }

    fn emit_state_change(&self, upload_id: UploadId, old_state: UploadStatus, new_state: UploadStatus) {
        self.emit(UploadEvent::StateChanged {
            upload_id,
            old_state,
            new_state,
        });
    }

    async fn apply_progress(&self, upload_id: UploadId, percent: u8) {
        let overall = {
            let mut batch = self.batch.write().await;
            if !batch.set_progress(upload_id, percent) {
                return;
            }
            batch.overall_progress()
        };

        debug!(upload_id = %upload_id, percent, overall, "Upload progress");
        self.emit(UploadEvent::Progress {
            upload_id,
            percent: percent.min(100),
            overall,
        });
    }

    async fn upload_one(&self, upload_id: UploadId) -> ItemResult {
        // 取文件与切换状态在同一把锁内完成，期间不会被移除
        let (file, old_state) = {
            let mut batch = self.batch.write().await;
            let Some(file) = batch.get(upload_id).map(|item| item.file.clone()) else {
                return ItemResult::Skipped;
            };
            let Some(old_state) = batch.start(upload_id) else {
                return ItemResult::Skipped;
            };
            (file, old_state)
        };
        self.emit_state_change(upload_id, old_state, UploadStatus::Uploading);
        info!(upload_id = %upload_id, name = %file.name, "Uploading file");

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<u8>();
        let callback: ProgressCallback = Arc::new(move |percent| {
            let _ = progress_tx.send(percent);
        });

        let mut transfer = std::pin::pin!(self.service.upload_file(&file, callback));
        let result = loop {
            tokio::select! {
                result = &mut transfer => break result,
                Some(percent) = progress_rx.recv() => {
                    self.apply_progress(upload_id, percent).await;
                }
            }
        };
        while let Ok(percent) = progress_rx.try_recv() {
            self.apply_progress(upload_id, percent).await;
        }

        match result {
            Ok(stored) => {
                self.batch.write().await.complete(upload_id, stored.clone());
                info!(upload_id = %upload_id, name = %file.name, "File uploaded successfully");
                self.emit_state_change(upload_id, UploadStatus::Uploading, UploadStatus::Completed);
                self.emit(UploadEvent::Completed {
                    upload_id,
                    file: stored,
                });
                ItemResult::Completed
            }
            Err(err) => {
                warn!(upload_id = %upload_id, name = %file.name, "Error uploading file: {}", err);
                let message = Some(err.user_message())
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| UPLOAD_FAILED_FALLBACK.to_string());

                {
                    let mut batch = self.batch.write().await;
                    batch.fail(upload_id, message.clone());
                    // 最后一次失败覆盖之前的
                    batch.set_last_error(Some(message.clone()));
                }
                self.emit_state_change(upload_id, UploadStatus::Uploading, UploadStatus::Error);
                self.emit(UploadEvent::Failed {
                    upload_id,
                    error: message,
                });
                ItemResult::Failed
            }
        }
    }
}

struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 批量上传流程
///
/// 默认逐个上传；`max_concurrent > 1` 时用信号量限制同时进行的上传数，
/// 启动顺序仍然是批次顺序。单个文件失败不会中断整批上传。
pub struct UploadWorkflow {
    runner: UploadRunner,
    max_concurrent: usize,
    running: Arc<AtomicBool>,
    navigator: Option<Navigator>,
}

impl UploadWorkflow {
    pub fn new(service: Arc<dyn FileService>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            runner: UploadRunner {
                service,
                batch: Arc::new(RwLock::new(UploadBatch::new())),
                event_tx,
            },
            max_concurrent: 1,
            running: Arc::new(AtomicBool::new(false)),
            navigator: None,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// 全部成功后通过 navigator 跳转
    pub fn with_navigator(mut self, navigator: Navigator) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.runner.event_tx.subscribe()
    }

    /// 过滤候选文件，通过的加入批次末尾
    pub async fn add_candidates(&self, candidates: Vec<Candidate>) -> Intake {
        let mut intake = Intake::default();
        let mut batch = self.runner.batch.write().await;
        batch.set_last_error(None);

        for candidate in candidates {
            match accept(candidate) {
                Ok(file) => {
                    let upload_id = batch.add(file);
                    intake.accepted.push(upload_id);
                }
                Err(rejection) => {
                    debug!("Rejected: {}", rejection);
                    intake.rejected.push(rejection);
                }
            }
        }
        drop(batch);

        for upload_id in &intake.accepted {
            self.runner.emit(UploadEvent::ItemAdded { upload_id: *upload_id });
        }

        intake
    }

    pub async fn remove(&self, upload_id: UploadId) -> Result<UploadItem> {
        self.runner.batch.write().await.remove(upload_id)
    }

    pub async fn snapshot(&self) -> UploadBatch {
        self.runner.batch.read().await.clone()
    }

    pub async fn item(&self, upload_id: UploadId) -> Option<UploadItem> {
        self.runner.batch.read().await.get(upload_id).cloned()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.runner.batch.read().await.last_error().map(String::from)
    }

    pub async fn overall_progress(&self) -> u8 {
        self.runner.batch.read().await.overall_progress()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 上传所有未完成的文件
    pub async fn run(&self) -> Result<RunOutcome> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(UploadError::AlreadyRunning);
        }
        let _guard = RunningGuard(self.running.clone());

        let upload_ids = {
            let mut batch = self.runner.batch.write().await;
            batch.set_last_error(None);
            batch.unfinished_ids()
        };
        info!(count = upload_ids.len(), max_concurrent = self.max_concurrent, "Batch upload started");

        let results = if self.max_concurrent <= 1 {
            let mut results = Vec::with_capacity(upload_ids.len());
            for upload_id in upload_ids {
                results.push(self.runner.upload_one(upload_id).await);
            }
            results
        } else {
            self.run_concurrent(upload_ids).await
        };

        let completed = results.iter().filter(|r| matches!(r, ItemResult::Completed)).count();
        let failed = results.iter().filter(|r| matches!(r, ItemResult::Failed)).count();

        let (last_error, all_completed) = {
            let batch = self.runner.batch.read().await;
            (
                batch.last_error().map(String::from),
                !batch.is_empty() && batch.all_completed(),
            )
        };

        let navigate_to = (failed == 0 && all_completed).then_some(Route::Dashboard);
        let outcome = RunOutcome {
            completed,
            failed,
            last_error,
            navigate_to,
        };
        info!(completed, failed, "Batch upload finished");

        if let (Some(route), Some(navigator)) = (&outcome.navigate_to, &self.navigator) {
            navigator.push(route.clone()).await;
        }
        self.runner.emit(UploadEvent::BatchFinished(outcome.clone()));

        Ok(outcome)
    }

    async fn run_concurrent(&self, upload_ids: Vec<UploadId>) -> Vec<ItemResult> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(upload_ids.len());

        for upload_id in upload_ids {
            // 按批次顺序拿许可，保证启动顺序
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let runner = self.runner.clone();
            handles.push(tokio::spawn(async move {
                let result = runner.upload_one(upload_id).await;
                drop(permit);
                result
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(err) => {
                    warn!("Upload task aborted: {}", err);
                    results.push(ItemResult::Failed);
                }
            }
        }
        results
    }
}
