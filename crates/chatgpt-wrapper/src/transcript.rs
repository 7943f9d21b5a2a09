//! Prompt/reply transcript file (`--log`)

use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Appends each exchange to a file; a no-op without one
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    path: Option<PathBuf>,
}

impl Transcript {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one exchange. Write failures are logged, never fatal.
    pub async fn record(&self, prompt: &str, reply: &str) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = append(path, &format_entry(prompt, reply)).await {
            warn!("Failed to write transcript {}: {}", path.display(), e);
        }
    }
}

fn format_entry(prompt: &str, reply: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{}] > {}\n{}\n\n", timestamp, prompt.trim(), reply.trim_end())
}

async fn append(path: &Path, entry: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(entry.as_bytes()).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.log");
        let transcript = Transcript::new(Some(path.clone()));

        transcript.record("Hello", "Hello there").await;
        transcript.record("Again", "Sure\n").await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("> Hello\nHello there\n\n"));
        assert!(content.contains("> Again\nSure\n\n"));
        assert!(content.find("Hello there").unwrap() < content.find("Again").unwrap());
    }

    #[tokio::test]
    async fn test_disabled_transcript_is_noop() {
        let transcript = Transcript::default();
        assert!(transcript.path().is_none());
        transcript.record("a", "b").await;
    }
}
