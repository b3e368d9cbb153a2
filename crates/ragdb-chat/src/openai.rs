use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use tracing::debug;

use ragdb_core::config::ChatSettings;
use ragdb_core::{Error, Result};

use crate::model::{ChatModel, ModelSelection, TextStream};

/// Streaming client for OpenAI-compatible chat completion APIs (OpenAI, Groq).
pub struct OpenAiChatModel {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAiChatModel {
    pub fn new(selection: ModelSelection, settings: &ChatSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: selection.base_url,
            api_key: selection.api_key,
            model: selection.model,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn stream(&self, prompt: String) -> Result<TextStream> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": true,
        });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        debug!(model = %self.model, %url, "starting chat completion stream");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::LanguageModel(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(Error::LanguageModel(format!("API error {status}: {error_body}")));
        }

        let bytes = resp.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec())).boxed();
        Ok(text_stream(bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Delta(String),
    Done,
}

/// Incremental decoder for `data:` lines of a chat completion event stream.
/// Bytes may arrive split anywhere, including inside a line.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        // A chunk may end inside a UTF-8 sequence; decode complete lines only.
        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            if let Some(event) = parse_line(String::from_utf8_lossy(&line).trim()) {
                let done = event == SseEvent::Done;
                events.push(event);
                if done {
                    break;
                }
            }
        }
        events
    }

    /// Decode a trailing line that was not newline terminated.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let line = std::mem::take(&mut self.buffer);
        parse_line(String::from_utf8_lossy(&line).trim())
    }
}

fn parse_line(line: &str) -> Option<SseEvent> {
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }
    let event: serde_json::Value = serde_json::from_str(data).ok()?;
    let choice = &event["choices"][0];
    if let Some(content) = choice["delta"]["content"].as_str() {
        if !content.is_empty() {
            return Some(SseEvent::Delta(content.to_string()));
        }
    }
    if choice["finish_reason"].as_str().is_some() {
        return Some(SseEvent::Done);
    }
    None
}

struct StreamState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

fn text_stream(bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> TextStream {
    let state = StreamState { bytes, decoder: SseDecoder::default(), pending: VecDeque::new(), finished: false };
    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(text) = st.pending.pop_front() {
                return Some((Ok(text), st));
            }
            if st.finished {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    for event in st.decoder.push(&chunk) {
                        match event {
                            SseEvent::Delta(text) => st.pending.push_back(text),
                            SseEvent::Done => st.finished = true,
                        }
                    }
                }
                Some(Err(e)) => {
                    st.finished = true;
                    st.pending.clear();
                    return Some((Err(Error::LanguageModel(format!("stream read error: {e}"))), st));
                }
                None => {
                    st.finished = true;
                    if let Some(SseEvent::Delta(text)) = st.decoder.finish() {
                        st.pending.push_back(text);
                    }
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_deltas_across_split_chunks() {
        let mut decoder = SseDecoder::default();
        let first = decoder.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel");
        assert!(first.is_empty());
        let second = decoder.push(b"lo\"}}]}\n\n: keep-alive\ndata: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n");
        assert_eq!(second, vec![SseEvent::Delta("Hello".into()), SseEvent::Delta(" there".into())]);
    }

    #[test]
    fn multibyte_character_split_between_chunks() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"Olá\"}}]}\n".as_bytes();
        let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(&line[..split]).is_empty());
        assert_eq!(decoder.push(&line[split..]), vec![SseEvent::Delta("Olá".into())]);
    }

    #[test]
    fn done_marker_and_finish_reason_end_the_stream() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"data: [DONE]\ndata: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n");
        assert_eq!(events, vec![SseEvent::Done]);

        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n");
        assert_eq!(events, vec![SseEvent::Done]);
    }

    #[test]
    fn unterminated_last_line_is_flushed() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}").is_empty());
        assert_eq!(decoder.finish(), Some(SseEvent::Delta("tail".into())));
    }

    #[tokio::test]
    async fn stream_yields_fragments_in_order_and_stops_at_done() {
        let chunks: Vec<reqwest::Result<Vec<u8>>> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n".to_vec()),
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\ndata: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n".to_vec()),
            Ok(b"data: [DONE]\n".to_vec()),
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n".to_vec()),
        ];
        let out: Vec<String> = text_stream(stream::iter(chunks).boxed())
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(out, vec!["a", "b"]);
    }
}
