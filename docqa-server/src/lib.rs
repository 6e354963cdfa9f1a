//! `docqa-server` exposes the document Q&A pipeline over HTTP.
//! A single multipart endpoint takes a document and a `;`-separated list of questions.

pub mod server;

pub use server::{ApiError, AppState, RagOnDocsResponse, ServerConfig, app_router, run_server};
