//! In-memory page used by the unit tests
//!
//! Markers live in a map. Injected scripts are recognised by their header
//! line; the turn script's request is decoded back out of the script text and
//! answered by a test-supplied responder whose event stream is relayed into
//! the markers with the same record handling the page script uses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};

use crate::config::{Config, PollConfig};
use crate::marker::MarkerSlot;
use crate::page::PageController;
use crate::script::{DONE_RECORD, EVENT_PREFIX, RECORD_DELIMITER};
use crate::wire::ConversationRequest;
use crate::Result;

type Dom = Arc<Mutex<HashMap<String, String>>>;
type SessionResponder = Box<dyn Fn() -> String + Send + Sync>;
type TurnResponder = Box<dyn Fn(&ConversationRequest) -> MockStream + Send + Sync>;

/// What the mock backend streams back for one turn
pub(crate) struct MockStream {
    chunks: Vec<String>,
    delay: Option<Duration>,
    status: u16,
    finish: bool,
}

impl MockStream {
    /// Whole body delivered at once, then the request completes
    pub(crate) fn complete(body: String) -> Self {
        Self {
            chunks: vec![body],
            delay: None,
            status: 200,
            finish: true,
        }
    }

    /// Body delivered in chunks `delay` apart, then the request completes
    pub(crate) fn chunked(chunks: Vec<String>, delay: Duration) -> Self {
        Self {
            chunks,
            delay: Some(delay),
            status: 200,
            finish: true,
        }
    }

    /// Body delivered, request never completes
    pub(crate) fn incomplete(body: String) -> Self {
        Self {
            finish: false,
            ..Self::complete(body)
        }
    }

    /// No body, request completes with `status`
    pub(crate) fn failed(status: u16) -> Self {
        Self {
            chunks: Vec::new(),
            delay: None,
            status,
            finish: true,
        }
    }
}

pub(crate) struct FakePage {
    dom: Dom,
    scripts: Mutex<Vec<String>>,
    navigations: Mutex<Vec<String>>,
    session_requests: Mutex<usize>,
    turn_requests: Mutex<Vec<(String, ConversationRequest)>>,
    session_responder: Mutex<Option<SessionResponder>>,
    turn_responder: Mutex<Option<TurnResponder>>,
}

impl FakePage {
    pub(crate) fn new() -> Self {
        Self {
            dom: Arc::new(Mutex::new(HashMap::new())),
            scripts: Mutex::new(Vec::new()),
            navigations: Mutex::new(Vec::new()),
            session_requests: Mutex::new(0),
            turn_requests: Mutex::new(Vec::new()),
            session_responder: Mutex::new(None),
            turn_responder: Mutex::new(None),
        }
    }

    /// Page whose session endpoint answers with `session`
    pub(crate) fn with_session(session: Value) -> Self {
        let page = Self::new();
        page.on_session(move || session.to_string());
        page
    }

    pub(crate) fn on_session(&self, responder: impl Fn() -> String + Send + Sync + 'static) {
        *self.session_responder.lock().unwrap() = Some(Box::new(responder));
    }

    pub(crate) fn on_turn(
        &self,
        responder: impl Fn(&ConversationRequest) -> MockStream + Send + Sync + 'static,
    ) {
        *self.turn_responder.lock().unwrap() = Some(Box::new(responder));
    }

    pub(crate) fn set_marker(&self, id: &str, text: &str) {
        self.dom
            .lock()
            .unwrap()
            .insert(id.to_string(), text.to_string());
    }

    pub(crate) fn has_marker(&self, id: &str) -> bool {
        self.dom.lock().unwrap().contains_key(id)
    }

    pub(crate) fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    pub(crate) fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub(crate) fn session_requests(&self) -> usize {
        *self.session_requests.lock().unwrap()
    }

    /// Bearer token and body of every turn the page was asked to send
    pub(crate) fn turn_requests(&self) -> Vec<(String, ConversationRequest)> {
        self.turn_requests.lock().unwrap().clone()
    }

    fn run_session_script(&self) {
        *self.session_requests.lock().unwrap() += 1;
        let body = self.session_responder.lock().unwrap().as_ref().map(|r| r());
        if let Some(body) = body {
            self.set_marker(MarkerSlot::Session.id(), &body);
        }
    }

    fn run_turn_script(&self, script: &str) {
        let token = string_literal_after(script, "'Bearer ' + ");
        let body = string_literal_after(script, "xhr.send(");
        let request: ConversationRequest = serde_json::from_str(&body).unwrap();
        self.turn_requests
            .lock()
            .unwrap()
            .push((token, request.clone()));

        self.set_marker(MarkerSlot::Stream.id(), "");

        let stream = self
            .turn_responder
            .lock()
            .unwrap()
            .as_ref()
            .map(|r| r(&request));
        let Some(stream) = stream else {
            return;
        };

        let dom = Arc::clone(&self.dom);
        match stream.delay {
            None => play(&dom, stream),
            Some(_) => {
                tokio::spawn(async move { play_delayed(&dom, stream).await });
            }
        }
    }
}

fn play(dom: &Dom, stream: MockStream) {
    let mut buffer = String::new();
    let mut seen = 0;
    for chunk in &stream.chunks {
        buffer.push_str(chunk);
        if !relay(dom, &buffer, &mut seen) {
            return;
        }
    }
    if stream.finish {
        finish(dom, stream.status);
    }
}

async fn play_delayed(dom: &Dom, stream: MockStream) {
    let delay = stream.delay.unwrap_or_default();
    let mut buffer = String::new();
    let mut seen = 0;
    for chunk in &stream.chunks {
        tokio::time::sleep(delay).await;
        buffer.push_str(chunk);
        if !relay(dom, &buffer, &mut seen) {
            return;
        }
    }
    if stream.finish {
        finish(dom, stream.status);
    }
}

/// Publish the newest complete event of `buffer`. False once the stream marker is gone.
fn relay(dom: &Dom, buffer: &str, seen: &mut usize) -> bool {
    let mut dom = dom.lock().unwrap();
    let Some(marker) = dom.get_mut(MarkerSlot::Stream.id()) else {
        return false;
    };
    if let Some(payload) = latest_event(buffer, seen) {
        *marker = STANDARD.encode(payload.as_bytes());
    }
    true
}

fn finish(dom: &Dom, status: u16) {
    let mut dom = dom.lock().unwrap();
    if dom.contains_key(MarkerSlot::Stream.id()) {
        dom.insert(MarkerSlot::Eof.id().to_string(), status.to_string());
    }
}

/// Record handling of the turn script's readystatechange handler
fn latest_event(buffer: &str, seen: &mut usize) -> Option<String> {
    let pending = &buffer[*seen..];
    let end = pending.rfind(RECORD_DELIMITER)?;

    let records: Vec<&str> = pending[..end]
        .split(RECORD_DELIMITER)
        .filter(|r| r.starts_with(EVENT_PREFIX) && *r != DONE_RECORD)
        .collect();

    let mut latest = None;
    if let Some(record) = records.last() {
        let payload = &record[EVENT_PREFIX.len()..];
        serde_json::from_str::<Value>(payload).ok()?;
        latest = Some(payload.to_string());
    }

    *seen += end + RECORD_DELIMITER.len();
    latest
}

fn string_literal_after(script: &str, anchor: &str) -> String {
    let start = script.find(anchor).unwrap() + anchor.len();
    serde_json::Deserializer::from_str(&script[start..])
        .into_iter::<String>()
        .next()
        .unwrap()
        .unwrap()
}

#[async_trait]
impl PageController for FakePage {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.navigations.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        self.scripts.lock().unwrap().push(script.to_string());
        if script.contains("chatgpt-wrapper session v") {
            self.run_session_script();
        } else if script.contains("chatgpt-wrapper turn v") {
            self.run_turn_script(script);
        }
        Ok(Value::Bool(true))
    }

    async fn read_marker(&self, id: &str) -> Result<Option<String>> {
        Ok(self.dom.lock().unwrap().get(id).cloned())
    }

    async fn remove_marker(&self, id: &str) -> Result<bool> {
        Ok(self.dom.lock().unwrap().remove(id).is_some())
    }
}

/// Base64 content the page would write for `event`
pub(crate) fn encode_event(event: &str) -> String {
    STANDARD.encode(event.as_bytes())
}

/// Backend event payload carrying `parts`
pub(crate) fn event_json(message_id: &str, conversation_id: &str, parts: &[&str]) -> String {
    json!({
        "message": {
            "id": message_id,
            "author": {"role": "assistant"},
            "content": {"content_type": "text", "parts": parts},
        },
        "conversation_id": conversation_id,
        "error": null,
    })
    .to_string()
}

/// Event-stream body for `events`, optionally terminated by the done record
pub(crate) fn sse(events: &[String], done: bool) -> String {
    let mut body = String::new();
    for event in events {
        body.push_str(EVENT_PREFIX);
        body.push_str(event);
        body.push_str(RECORD_DELIMITER);
    }
    if done {
        body.push_str(DONE_RECORD);
        body.push_str(RECORD_DELIMITER);
    }
    body
}

pub(crate) fn test_poll() -> PollConfig {
    PollConfig {
        interval_ms: 5,
        session_timeout_secs: 1,
        turn_timeout_secs: 1,
    }
}

pub(crate) fn test_config() -> Config {
    Config {
        poll: test_poll(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_event_skips_done_and_partial_tail() {
        let body = sse(&[event_json("m1", "c1", &["a"]), event_json("m1", "c1", &["ab"])], true);
        let mut seen = 0;
        let latest = latest_event(&format!("{}data: {{\"partial", body), &mut seen).unwrap();

        assert!(latest.contains("\"ab\""));
        assert_eq!(seen, body.len());
    }

    #[test]
    fn test_latest_event_waits_for_delimiter() {
        let mut seen = 0;
        assert_eq!(latest_event("data: {\"message\"", &mut seen), None);
        assert_eq!(seen, 0);
    }
}
