//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use url::Url;

use super::{CHUNK_SIZE, SpeechBackend, SpeechProvider, SpeechStream, rechunk};
use crate::config::SpeechConfig;
use crate::providers::require_api_key;
use crate::{Error, Result};

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    voice: String,
    speed: f32,
    model: String,
    base_url: String,
    provider: SpeechBackend,
}

impl TextToSpeech {
    /// Create a new TTS instance for the configured backend
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(config: &SpeechConfig) -> Result<Self> {
        let (service, default_voice, default_model, default_base_url) = match config.provider {
            SpeechBackend::OpenAi => ("OpenAI", "onyx", "tts-1", OPENAI_BASE_URL),
            SpeechBackend::ElevenLabs => (
                "ElevenLabs",
                "21m00Tcm4TlvDq8ikWAM",
                "eleven_monolingual_v1",
                ELEVENLABS_BASE_URL,
            ),
        };
        let api_key = require_api_key(config.api_key.as_deref(), service)?;

        let tts = Self {
            client: reqwest::Client::new(),
            api_key,
            voice: config.voice.clone().unwrap_or_else(|| default_voice.to_string()),
            speed: config.speed,
            model: config.model.clone().unwrap_or_else(|| default_model.to_string()),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| default_base_url.to_string()),
            provider: config.provider,
        };

        tracing::info!(
            provider = tts.name(),
            model = %tts.model,
            voice = %tts.voice,
            "TTS provider ready"
        );
        Ok(tts)
    }

    /// Voice used for synthesis
    #[must_use]
    pub fn voice(&self) -> &str {
        &self.voice
    }

    /// Send the synthesis request, rejecting non-success responses
    async fn request(&self, text: &str) -> Result<reqwest::Response> {
        let (service, response) = match self.provider {
            SpeechBackend::OpenAi => ("openai-tts", self.request_openai(text).await?),
            SpeechBackend::ElevenLabs => ("elevenlabs", self.request_elevenlabs(text).await?),
        };

        if !response.status().is_success() {
            let err = Error::upstream(service, response).await;
            tracing::warn!(error = %err, "TTS request failed");
            return Err(err);
        }

        Ok(response)
    }

    /// Request raw PCM from `OpenAI` TTS
    async fn request_openai(&self, text: &str) -> Result<reqwest::Response> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            response_format: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            response_format: "pcm",
            speed: self.speed,
        };

        Ok(self
            .client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?)
    }

    /// Request raw PCM from `ElevenLabs` TTS
    async fn request_elevenlabs(&self, text: &str) -> Result<reqwest::Response> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = self.elevenlabs_url()?;

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        Ok(self
            .client
            .post(url)
            .query(&[("output_format", "pcm_24000")])
            .header("xi-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?)
    }

    /// Endpoint for the configured voice, with the voice id as one path segment
    fn elevenlabs_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid ElevenLabs base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| Error::Config("ElevenLabs base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["v1", "text-to-speech", self.voice.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl SpeechProvider for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let audio = self.request(text).await?.bytes().await?;
        tracing::debug!(bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }

    async fn synthesize_stream(&self, text: &str) -> Result<SpeechStream> {
        let response = self.request(text).await?;
        Ok(rechunk(response.bytes_stream(), CHUNK_SIZE))
    }

    fn name(&self) -> &'static str {
        match self.provider {
            SpeechBackend::OpenAi => "openai",
            SpeechBackend::ElevenLabs => "elevenlabs",
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use mockito::Matcher;
    use serde_json::json;

    use super::*;
    use crate::voice::collect_stream;

    fn pcm_fixture(len: usize) -> Vec<u8> {
        (0..len).map(|i| u8::try_from(i % 251).unwrap()).collect()
    }

    fn openai(base_url: String) -> TextToSpeech {
        TextToSpeech::new(&SpeechConfig {
            api_key: Some("sk-test".to_string()),
            base_url: Some(base_url),
            ..SpeechConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = TextToSpeech::new(&SpeechConfig::default()).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_default_voice_per_backend() {
        let tts = openai("http://localhost".to_string());
        assert_eq!(tts.voice(), "onyx");
        assert_eq!(tts.name(), "openai");
    }

    #[tokio::test]
    async fn test_stream_concatenation_matches_buffer() {
        let audio = pcm_fixture(40_000);
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/audio/speech")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "tts-1",
                "voice": "onyx",
                "input": "Hello there",
                "response_format": "pcm"
            })))
            .with_status(200)
            .with_body(audio.clone())
            .expect(2)
            .create_async()
            .await;

        let tts = openai(server.url());
        let whole = tts.synthesize("Hello there").await.unwrap();

        let chunks: Vec<_> = tts
            .synthesize_stream("Hello there")
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;

        assert_eq!(whole, audio);
        assert_eq!(
            chunks.iter().map(|c| c.len()).collect::<Vec<_>>(),
            vec![CHUNK_SIZE, CHUNK_SIZE, 40_000 - 2 * CHUNK_SIZE]
        );
        let joined: Vec<u8> = chunks.iter().flat_map(|c| c.to_vec()).collect();
        assert_eq!(joined, whole);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_abandoned_stream_is_released() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/audio/speech")
            .with_status(200)
            .with_body(pcm_fixture(3 * CHUNK_SIZE))
            .create_async()
            .await;

        let mut stream = openai(server.url()).synthesize_stream("hi").await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.len(), CHUNK_SIZE);
        drop(stream);
    }

    #[tokio::test]
    async fn test_non_success_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/audio/speech")
            .with_status(500)
            .with_body("server exploded")
            .expect(2)
            .create_async()
            .await;

        let tts = openai(server.url());
        let err = tts.synthesize("hi").await.unwrap_err();
        assert_eq!(err.status(), Some(500));

        let err = tts.synthesize_stream("hi").await.err().unwrap();
        assert!(matches!(err, Error::Upstream { status: 500, .. }));
    }

    #[test]
    fn test_elevenlabs_voice_is_one_path_segment() {
        let tts = TextToSpeech::new(&SpeechConfig {
            provider: SpeechBackend::ElevenLabs,
            api_key: Some("el-test".to_string()),
            voice: Some("../admin?x=1#y".to_string()),
            base_url: Some("https://proxy.local/eleven/".to_string()),
            ..SpeechConfig::default()
        })
        .unwrap();

        let url = tts.elevenlabs_url().unwrap();
        assert_eq!(url.path(), "/eleven/v1/text-to-speech/..%2Fadmin%3Fx=1%23y");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[tokio::test]
    async fn test_elevenlabs_requests_pcm() {
        let audio = pcm_fixture(1_000);
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Regex(r"^/v1/text-to-speech/voice-1".to_string()))
            .match_query(Matcher::UrlEncoded(
                "output_format".to_string(),
                "pcm_24000".to_string(),
            ))
            .match_header("xi-api-key", "el-test")
            .match_body(Matcher::PartialJson(json!({
                "text": "Hello",
                "model_id": "eleven_monolingual_v1"
            })))
            .with_status(200)
            .with_body(audio.clone())
            .create_async()
            .await;

        let tts = TextToSpeech::new(&SpeechConfig {
            provider: SpeechBackend::ElevenLabs,
            api_key: Some("el-test".to_string()),
            voice: Some("voice-1".to_string()),
            base_url: Some(server.url()),
            ..SpeechConfig::default()
        })
        .unwrap();

        let stream = tts.synthesize_stream("Hello").await.unwrap();
        assert_eq!(collect_stream(stream).await.unwrap(), audio);
        mock.assert_async().await;
    }
}
