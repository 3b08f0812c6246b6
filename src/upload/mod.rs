//! 文件上传：候选文件过滤、批次与上传流程

mod batch;
mod errors;
mod intake;
mod types;
mod workflow;

pub use batch::UploadBatch;
pub use errors::{Result, UploadError};
pub use intake::{
    accept,
    Candidate,
    Rejection,
    ACCEPTED_MEDIA_TYPES,
    CSV_MEDIA_TYPE,
    MAX_FILE_SIZE,
    XLSX_MEDIA_TYPE,
    XLS_MEDIA_TYPE,
};
pub use types::{RunOutcome, UploadEvent, UploadId, UploadItem, UploadStatus};
pub use workflow::{Intake, UploadWorkflow, UPLOAD_FAILED_FALLBACK};
