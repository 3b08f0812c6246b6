mod client;
mod progress_stream;

pub use client::ApiClient;
pub use progress_stream::{percent, ProgressStream};
