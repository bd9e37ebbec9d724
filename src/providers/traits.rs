use crate::error::ProviderError;
use async_trait::async_trait;

/// Uploaded image bytes together with their mime type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePart {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ImagePart {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }
}

/// A hosted multimodal model that answers free text about an image.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Sends `instruction`, the image and the user's `prompt` in that order.
    async fn analyze(
        &self,
        instruction: &str,
        image: &ImagePart,
        prompt: &str,
    ) -> Result<String, ProviderError>;

    fn get_model_info(&self) -> String;
}
