//! Text generation trait.

use async_trait::async_trait;

use crate::error::Result;

/// A text generation service.
///
/// Used both to summarize complex blocks (tables, figures) and to synthesize
/// final answers. `context` is inserted verbatim into the prompt; `query` is
/// the instruction or question to answer from it.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Complete `query` against `context`.
    async fn complete(&self, context: &str, query: &str) -> Result<String>;

    /// A short name used in logs and errors.
    fn name(&self) -> &str;
}
