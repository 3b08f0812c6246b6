pub mod format;

pub use format::{format_bytes, format_duration, progress_bar};
