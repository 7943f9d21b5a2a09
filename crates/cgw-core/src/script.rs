//! Injected page scripts
//!
//! Both scripts are fixed templates with `__NAME__` substitution points.
//! Every substituted value is inserted as a JavaScript string literal, so
//! prompts and tokens can never change the shape of the script.

use crate::marker::MarkerSlot;
use crate::page::js_string;
use crate::wire::ConversationRequest;
use crate::Result;

/// Bumped whenever a template's contract with the page or the backend changes
pub const SCRIPT_VERSION: u32 = 1;

/// Separator between event-stream records
pub const RECORD_DELIMITER: &str = "\n\n";

/// Prefix of every event-stream data record
pub const EVENT_PREFIX: &str = "data: ";

/// Record the backend sends once the message is complete
pub const DONE_RECORD: &str = "data: [DONE]";

const SESSION_TEMPLATE: &str = r#"// chatgpt-wrapper session v__VERSION__
(() => {
  const markerId = __SESSION_MARKER__;
  const publish = (text) => {
    const marker = document.createElement('DIV');
    marker.id = markerId;
    marker.style.display = 'none';
    marker.textContent = text;
    document.body.appendChild(marker);
  };
  const xhr = new XMLHttpRequest();
  xhr.open('GET', __SESSION_URL__);
  xhr.onload = () => {
    if (xhr.status === 200) {
      publish(xhr.responseText);
    } else {
      publish(JSON.stringify({ error: 'HTTP ' + xhr.status }));
    }
  };
  xhr.onerror = () => publish(JSON.stringify({ error: 'network error' }));
  xhr.send();
  return true;
})()
"#;

const TURN_TEMPLATE: &str = r#"// chatgpt-wrapper turn v__VERSION__
(() => {
  const delimiter = __RECORD_DELIMITER__;
  const prefix = __EVENT_PREFIX__;
  const doneRecord = __DONE_RECORD__;
  const toBase64 = (text) => {
    const bytes = new TextEncoder().encode(text);
    let binary = '';
    for (let i = 0; i < bytes.length; i++) {
      binary += String.fromCharCode(bytes[i]);
    }
    return btoa(binary);
  };

  const streamMarker = document.createElement('DIV');
  streamMarker.id = __STREAM_MARKER__;
  streamMarker.style.display = 'none';
  document.body.appendChild(streamMarker);

  let seen = 0;
  const xhr = new XMLHttpRequest();
  xhr.open('POST', __CONVERSATION_URL__);
  xhr.setRequestHeader('Accept', 'text/event-stream');
  xhr.setRequestHeader('Content-Type', 'application/json');
  xhr.setRequestHeader('Authorization', 'Bearer ' + __BEARER_TOKEN__);
  xhr.onreadystatechange = () => {
    if (!streamMarker.isConnected) {
      // host cleared the turn; stop publishing
      xhr.onreadystatechange = null;
      xhr.abort();
      return;
    }
    if (xhr.readyState === 3 || xhr.readyState === 4) {
      const pending = xhr.responseText.substring(seen);
      const end = pending.lastIndexOf(delimiter);
      if (end >= 0) {
        const records = pending
          .substring(0, end)
          .split(delimiter)
          .filter((r) => r.startsWith(prefix) && r !== doneRecord);
        let accepted = true;
        if (records.length > 0) {
          const payload = records[records.length - 1].substring(prefix.length);
          try {
            JSON.parse(payload);
            streamMarker.textContent = toBase64(payload);
          } catch (err) {
            accepted = false;
          }
        }
        if (accepted) {
          seen += end + delimiter.length;
        }
      }
    }
    if (xhr.readyState === 4) {
      const eofMarker = document.createElement('DIV');
      eofMarker.id = __EOF_MARKER__;
      eofMarker.style.display = 'none';
      eofMarker.textContent = String(xhr.status);
      document.body.appendChild(eofMarker);
    }
  };
  xhr.send(__REQUEST_BODY__);
  return true;
})()
"#;

/// Script that fetches the session endpoint and publishes the body in the session marker
pub fn session_script(session_url: &str) -> String {
    render(
        SESSION_TEMPLATE,
        &[
            ("VERSION", SCRIPT_VERSION.to_string()),
            ("SESSION_MARKER", js_string(MarkerSlot::Session.id())),
            ("SESSION_URL", js_string(session_url)),
        ],
    )
}

/// Script that posts one turn and mirrors the event stream into the turn markers
pub fn turn_script(
    conversation_url: &str,
    bearer_token: &str,
    request: &ConversationRequest,
) -> Result<String> {
    let body = serde_json::to_string(request)?;

    Ok(render(
        TURN_TEMPLATE,
        &[
            ("VERSION", SCRIPT_VERSION.to_string()),
            ("RECORD_DELIMITER", js_string(RECORD_DELIMITER)),
            ("EVENT_PREFIX", js_string(EVENT_PREFIX)),
            ("DONE_RECORD", js_string(DONE_RECORD)),
            ("STREAM_MARKER", js_string(MarkerSlot::Stream.id())),
            ("EOF_MARKER", js_string(MarkerSlot::Eof.id())),
            ("CONVERSATION_URL", js_string(conversation_url)),
            ("BEARER_TOKEN", js_string(bearer_token)),
            ("REQUEST_BODY", js_string(&body)),
        ],
    ))
}

/// Single pass substitution; inserted values are never rescanned
fn render(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;

    while let Some(start) = rest.find("__") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let substitution = after.find("__").and_then(|end| {
            let name = &after[..end];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (name.len(), value))
        });

        match substitution {
            Some((name_len, value)) => {
                out.push_str(value);
                rest = &after[name_len + 2..];
            }
            None => {
                out.push_str("__");
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
