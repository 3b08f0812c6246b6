mod errors;
mod traits;
mod types;

pub use errors::{ApiError, ConfigError, Result, StorageError, NETWORK_FAILURE_MESSAGE};
pub use traits::{AuthService, FileService, ProgressCallback, TokenStorage};
pub use types::{
    Ack,
    ChartData,
    ColumnDescriptor,
    ColumnType,
    Credentials,
    FileHandle,
    FileStructure,
    LoginResponse,
    RegisterRequest,
    StoredFile,
    User,
};
