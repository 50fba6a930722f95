//! Generation provider abstraction.
//!
//! A provider turns one prompt into one raw response text. The client owns
//! everything around that call (prompt rendering, JSON interpretation,
//! failure mapping), so providers stay thin and tests can substitute a
//! fixed-response implementation.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::ProviderError;

/// An external text-generation service.
#[async_trait]
pub trait GenerationProvider: Send + Sync + Debug {
    /// Short provider name for logs (e.g. `gemini`).
    fn name(&self) -> &str;

    /// Model identifier the provider will use.
    fn model(&self) -> &str;

    /// Send `prompt` and return the response text, which the caller expects
    /// to be a JSON document.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] describing the transport, status or
    /// envelope failure.
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}
