//! `docqa-server` serves the upload-and-ask flow over HTTP.
//!
//! Each session holds the index of its most recently uploaded Markdown
//! file; questions are answered against that index only.

pub mod error;
pub mod protocol;
pub mod server;
pub mod session;

pub use error::ApiError;
pub use server::{AppState, ServerConfig, app_router, run_server};
pub use session::{SessionStore, UploadedIndex};
