//! Delivery of confirmation codes.
//!
//! There is no SMTP transport: codes are either logged, appended to an
//! outbox file, or captured in memory for tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::config::MailConfig;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_confirmation_code(&self, username: &str, email: &str, code: &str) -> Result<()>;
}

/// Builds the mailer described by the `[mail]` config section.
#[must_use]
pub fn from_config(config: &MailConfig) -> Arc<dyn Mailer> {
    match &config.outbox_path {
        Some(path) => Arc::new(FileMailer::new(&config.from_address, path)),
        None => Arc::new(ConsoleMailer::new(&config.from_address)),
    }
}

fn render(from: &str, username: &str, email: &str, code: &str) -> String {
    format!(
        "From: {from}\nTo: {email}\nSubject: YaMDB confirmation code\n\nHello {username}, your confirmation code is {code}\n"
    )
}

/// Logs outgoing mail instead of sending it.
#[derive(Clone, Debug)]
pub struct ConsoleMailer {
    from: String,
}

impl ConsoleMailer {
    #[must_use]
    pub fn new(from: &str) -> Self {
        Self {
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send_confirmation_code(&self, username: &str, email: &str, code: &str) -> Result<()> {
        info!(
            from = %self.from,
            to = %email,
            username = %username,
            code = %code,
            "Confirmation code issued"
        );
        Ok(())
    }
}

/// Appends every message to a plain-text outbox file.
#[derive(Clone, Debug)]
pub struct FileMailer {
    from: String,
    path: PathBuf,
}

impl FileMailer {
    #[must_use]
    pub fn new(from: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            from: from.to_string(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl Mailer for FileMailer {
    async fn send_confirmation_code(&self, username: &str, email: &str, code: &str) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open outbox {}", self.path.display()))?;

        let message = render(&self.from, username, email, code);
        file.write_all(message.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;

        info!(to = %email, outbox = %self.path.display(), "Confirmation code written to outbox");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub username: String,
    pub email: String,
    pub code: String,
}

/// Keeps messages in memory so tests can read issued codes back.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl MemoryMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Most recent code sent to `username`.
    #[must_use]
    pub fn last_code_for(&self, username: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|mail| mail.username == username)
            .map(|mail| mail.code)
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send_confirmation_code(&self, username: &str, email: &str, code: &str) -> Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("Mailbox lock poisoned"))?
            .push(SentMail {
                username: username.to_string(),
                email: email.to_string(),
                code: code.to_string(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_mailer_returns_latest_code() {
        let mailer = MemoryMailer::new();
        mailer.send_confirmation_code("bob", "b@x.com", "first").await.unwrap();
        mailer.send_confirmation_code("amy", "a@x.com", "other").await.unwrap();
        mailer.send_confirmation_code("bob", "b@x.com", "second").await.unwrap();

        assert_eq!(mailer.sent().len(), 3);
        assert_eq!(mailer.last_code_for("bob").as_deref(), Some("second"));
        assert_eq!(mailer.last_code_for("nobody"), None);
    }

    #[tokio::test]
    async fn test_file_mailer_appends_messages() {
        let path = std::env::temp_dir()
            .join(format!("yamdb_outbox_{}", uuid::Uuid::new_v4()))
            .join("outbox.txt");
        let mailer = FileMailer::new("noreply@yamdb.local", &path);

        mailer.send_confirmation_code("bob", "b@x.com", "CODE1").await.unwrap();
        mailer.send_confirmation_code("bob", "b@x.com", "CODE2").await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("To: b@x.com"));
        assert!(content.contains("CODE1"));
        assert!(content.contains("CODE2"));

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_render_includes_code_and_recipient() {
        let text = render("noreply@yamdb.local", "bob", "b@x.com", "XYZ");
        assert!(text.starts_with("From: noreply@yamdb.local\nTo: b@x.com\n"));
        assert!(text.contains("your confirmation code is XYZ"));
    }
}
