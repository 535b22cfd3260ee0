//! Google Translate text-to-speech
//!
//! Speaks through the same `batchexecute` RPC the Translate web UI uses. The
//! text is sent in pieces of at most 100 characters and the MP3 segments that
//! come back are concatenated.

use base64::Engine;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::text::{chunk_text, MAX_CHARS};
use super::SpeechSynthesizer;
use crate::config::SpeechConfig;
use crate::error::{Error, Result};

const TTS_RPC_ID: &str = "jQ1olc";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/47.0.2526.106 Safari/537.36";

pub struct GoogleTts {
    config: SpeechConfig,
}

impl GoogleTts {
    pub fn new(config: SpeechConfig) -> Self {
        Self { config }
    }

    fn endpoint(&self) -> String {
        format!(
            "https://translate.google.{}/_/TranslateWebserverUi/data/batchexecute",
            self.config.tld
        )
    }

    fn referer(&self) -> String {
        format!("http://translate.google.{}/", self.config.tld)
    }

    fn speak_chunk(&self, client: &reqwest::blocking::Client, text: &str) -> Result<Vec<u8>> {
        let rpc = package_rpc(text, &self.config.lang, self.config.slow);

        let response = client
            .post(self.endpoint())
            .header(reqwest::header::REFERER, self.referer())
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .form(&[("f.req", rpc.as_str())])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::SpeechError(format!(
                "Google TTS responded with {} (lang '{}', tld '{}')",
                status, self.config.lang, self.config.tld
            )));
        }

        let body = response.text()?;
        extract_audio(&body)?.ok_or_else(|| {
            Error::SpeechError(format!(
                "No audio stream in Google TTS response, language '{}' may be unsupported",
                self.config.lang
            ))
        })
    }
}

impl SpeechSynthesizer for GoogleTts {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let chunks = chunk_text(text, MAX_CHARS);
        if chunks.is_empty() {
            return Err(Error::SpeechError("No text to speak".to_string()));
        }

        // Built per call: a blocking client must not be created or dropped on
        // an async runtime thread.
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()?;

        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let segment = self.speak_chunk(&client, chunk)?;
            debug!(
                "TTS chunk {}/{}: {} chars -> {} bytes",
                idx + 1,
                chunks.len(),
                chunk.chars().count(),
                segment.len()
            );
            audio.extend_from_slice(&segment);
        }

        Ok(audio)
    }
}

/// The `f.req` form value for one piece of text
fn package_rpc(text: &str, lang: &str, slow: bool) -> String {
    let speed = if slow { Value::Bool(true) } else { Value::Null };
    let parameter = json!([text, lang, speed, "null"]).to_string();
    json!([[[TTS_RPC_ID, parameter, null, "generic"]]]).to_string()
}

/// Pull the base64 MP3 payload out of a `batchexecute` response body
fn extract_audio(body: &str) -> Result<Option<Vec<u8>>> {
    let marker = format!(r#"{}","[\""#, TTS_RPC_ID);

    for line in body.lines() {
        let Some(pos) = line.find(&marker) else {
            continue;
        };
        let start = pos + marker.len();
        let Some(end) = line.rfind(r#"\"]"#) else {
            continue;
        };
        if end <= start {
            continue;
        }

        let audio = base64::engine::general_purpose::STANDARD
            .decode(&line[start..end])
            .map_err(|e| Error::SpeechError(format!("Malformed audio payload: {}", e)))?;
        return Ok(Some(audio));
    }

    Ok(None)
}
