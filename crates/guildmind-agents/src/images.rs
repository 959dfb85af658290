use async_trait::async_trait;
use guildmind_common::{Error, Result};
use reqwest::Client;
use serde_json::json;

/// Aspect presets exposed to the model as size indices 0/1/2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    Square,
    Landscape,
    Portrait,
}

impl ImageSize {
    pub fn from_index(index: u64) -> Self {
        match index {
            1 => Self::Landscape,
            2 => Self::Portrait,
            _ => Self::Square,
        }
    }

    pub fn dimensions(self) -> &'static str {
        match self {
            Self::Square => "1024x1024",
            Self::Landscape => "1792x1024",
            Self::Portrait => "1024x1792",
        }
    }
}

/// Capability interface for the image-generation flow.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate an image and return its URL.
    async fn generate(&self, prompt: &str, size: ImageSize) -> Result<String>;
}

/// DALL·E 3 client against the OpenAI images API.
pub struct OpenAiImageClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiImageClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        }
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageClient {
    async fn generate(&self, prompt: &str, size: ImageSize) -> Result<String> {
        let url = format!("{}/images/generations", self.base_url);
        let body = json!({
            "model": "dall-e-3",
            "prompt": prompt,
            "n": 1,
            "size": size.dimensions(),
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("image request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!("image API error: {error_text}")));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("invalid image response: {e}")))?;

        payload["data"][0]["url"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Provider("image response carried no url".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_indices_map_to_dimensions() {
        assert_eq!(ImageSize::from_index(0).dimensions(), "1024x1024");
        assert_eq!(ImageSize::from_index(1).dimensions(), "1792x1024");
        assert_eq!(ImageSize::from_index(2).dimensions(), "1024x1792");
        // out-of-range falls back to square
        assert_eq!(ImageSize::from_index(9).dimensions(), "1024x1024");
    }
}
