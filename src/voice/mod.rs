//! Speech synthesis
//!
//! Backends implement [`SpeechProvider`] and produce 16-bit little-endian
//! mono PCM at [`SAMPLE_RATE`], either as one buffer or as a pull-driven
//! stream of [`AudioChunk`]s.

mod tts;

use std::ops::Deref;
use std::pin::Pin;
use std::str::FromStr;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, stream};
use serde::{Deserialize, Serialize};

pub use tts::TextToSpeech;

use crate::{Error, Result};

/// Sample rate of synthesized PCM audio
pub const SAMPLE_RATE: u32 = 24_000;

/// Size of the windows a synthesis stream is cut into
pub const CHUNK_SIZE: usize = 16_384;

/// Speech backend variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeechBackend {
    /// `OpenAI` audio speech API
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    /// `ElevenLabs` text-to-speech API
    #[serde(rename = "elevenlabs")]
    ElevenLabs,
}

impl FromStr for SpeechBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "elevenlabs" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!("unknown speech provider: {other}"))),
        }
    }
}

/// Window of a synthesized audio payload
///
/// Chunks of one stream are ordered, contiguous and non-overlapping. Their
/// boundaries carry no meaning and may split a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk(Bytes);

impl AudioChunk {
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl Deref for AudioChunk {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

/// Finite, single-pass stream of synthesized audio
///
/// Dropping the stream early releases the response body and any buffered
/// remainder.
pub type SpeechStream = Pin<Box<dyn Stream<Item = Result<AudioChunk>> + Send>>;

/// Turns reply text into audio
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Synthesize the complete payload as one buffer
    ///
    /// # Errors
    ///
    /// Returns `Error::Upstream` on a non-success backend response
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;

    /// Synthesize as a lazy stream of chunks
    ///
    /// The concatenated chunks equal what [`SpeechProvider::synthesize`]
    /// returns for the same text.
    ///
    /// # Errors
    ///
    /// Returns `Error::Upstream` on a non-success backend response; transport
    /// failures mid-stream are yielded as the stream's last item
    async fn synthesize_stream(&self, text: &str) -> Result<SpeechStream>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Re-window a byte stream into chunks of exactly `window` bytes
///
/// The final chunk holds whatever remains and is never empty. After an error
/// is yielded the stream ends.
pub fn rechunk<S, E>(inner: S, window: usize) -> SpeechStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    struct State<S> {
        inner: Pin<Box<S>>,
        buffer: BytesMut,
        window: usize,
        done: bool,
    }

    let state = State {
        inner: Box::pin(inner),
        buffer: BytesMut::new(),
        window: window.max(1),
        done: false,
    };

    Box::pin(stream::unfold(state, |mut st| async move {
        loop {
            if st.buffer.len() >= st.window {
                let chunk = st.buffer.split_to(st.window).freeze();
                return Some((Ok(AudioChunk(chunk)), st));
            }
            if st.done {
                if st.buffer.is_empty() {
                    return None;
                }
                let chunk = st.buffer.split().freeze();
                return Some((Ok(AudioChunk(chunk)), st));
            }
            match st.inner.next().await {
                Some(Ok(bytes)) => st.buffer.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    st.done = true;
                    st.buffer.clear();
                    return Some((Err(e.into()), st));
                }
                None => st.done = true,
            }
        }
    }))
}

/// Drain a speech stream into one buffer
///
/// # Errors
///
/// Returns the first error yielded by the stream
pub async fn collect_stream(mut stream: SpeechStream) -> Result<Vec<u8>> {
    let mut audio = Vec::new();
    while let Some(chunk) = stream.next().await {
        audio.extend_from_slice(&chunk?);
    }
    Ok(audio)
}

/// Wrap 16-bit little-endian mono PCM in a WAV container
///
/// # Errors
///
/// Returns error if the payload is not a whole number of samples
pub fn pcm_to_wav(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>> {
    if pcm.len() % 2 != 0 {
        return Err(Error::Audio(format!(
            "PCM payload of {} bytes is not 16-bit aligned",
            pcm.len()
        )));
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for sample in pcm.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([sample[0], sample[1]]))
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
