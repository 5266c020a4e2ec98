//! Speech trait: voice in and voice out.
//!
//! Both directions are plain byte-stream conversions and take no part in
//! the directive protocol.

use async_trait::async_trait;
use crate::error::ProviderError;

#[async_trait]
pub trait SpeechBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Turn recorded audio into text.
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        mime_type: &str,
    ) -> std::result::Result<String, ProviderError>;

    /// Turn text into encoded audio (MP3).
    async fn synthesize(&self, text: &str) -> std::result::Result<Vec<u8>, ProviderError>;
}
