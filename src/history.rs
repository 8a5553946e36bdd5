//! Append-only conversation log and its CSV export.

use chrono::Utc;
use std::path::Path;
use tracing::info;

use crate::models::{Message, MessageContent, Role};

/// Aggregate counters over the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatStats {
    pub total_messages: usize,
    pub user_messages: usize,
}

/// Ordered record of everything said in a session.
///
/// Append-only: entries are never edited or removed, except by clearing the
/// whole log. Iteration order is append order.
#[derive(Debug, Default)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, stamped with the current UTC time.
    pub fn add_message(&mut self, role: Role, content: MessageContent) {
        self.messages.push(Message {
            role,
            content,
            timestamp: Utc::now(),
        });
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn stats(&self) -> ChatStats {
        ChatStats {
            total_messages: self.messages.len(),
            user_messages: self
                .messages
                .iter()
                .filter(|m| m.role == Role::User)
                .count(),
        }
    }

    /// Render the full log as CSV: header `role,content,timestamp`, one row
    /// per message in append order, RFC 3339 timestamps. Chunk-list content
    /// is flattened into a single field.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("role,content,timestamp\n");
        for message in &self.messages {
            out.push_str(&csv_field(message.role.as_str()));
            out.push(',');
            out.push_str(&csv_field(&message.content.flatten()));
            out.push(',');
            out.push_str(&csv_field(&message.timestamp.to_rfc3339()));
            out.push('\n');
        }
        out
    }

    /// Write the CSV rendering to `path`.
    pub fn export_csv(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_csv())?;
        info!("exported {} messages to {}", self.messages.len(), path.display());
        Ok(())
    }
}

/// Quote a field per RFC 4180 when it contains a delimiter, quote, or
/// line break; pass it through otherwise.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn append_preserves_order() {
        let mut log = ConversationLog::new();
        log.add_message(Role::User, MessageContent::Text("q".into()));
        log.add_message(Role::Assistant, MessageContent::Text("a".into()));
        let roles: Vec<_> = log.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[test]
    fn stats_counts_user_messages_only_once() {
        let mut log = ConversationLog::new();
        log.add_message(Role::User, MessageContent::Text("q".into()));
        log.add_message(Role::Assistant, MessageContent::Text("a".into()));
        log.add_message(Role::AssistantThink, MessageContent::Text("t".into()));
        log.add_message(
            Role::RetrievedDoc,
            MessageContent::Chunks(vec!["c".into()]),
        );
        let stats = log.stats();
        assert_eq!(stats.total_messages, 4);
        assert_eq!(stats.user_messages, 1);
    }

    #[test]
    fn empty_log_exports_header_only() {
        let log = ConversationLog::new();
        assert_eq!(log.to_csv(), "role,content,timestamp\n");
    }

    #[test]
    fn csv_quotes_embedded_delimiters_and_quotes() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn chunk_list_is_one_row_one_field() {
        let mut log = ConversationLog::new();
        log.add_message(
            Role::RetrievedDoc,
            MessageContent::Chunks(vec!["first".into(), "second".into()]),
        );
        let csv = log.to_csv();
        // Header plus exactly one data row, despite the newline in the field.
        let data = csv.strip_prefix("role,content,timestamp\n").unwrap();
        assert!(data.starts_with("retrieved_doc,\"first\n\nsecond\","));
    }

    #[test]
    fn export_writes_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        let mut log = ConversationLog::new();
        log.add_message(Role::User, MessageContent::Text("q".into()));
        log.export_csv(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("role,content,timestamp\n"));
        assert!(written.contains("user,q,"));
    }

    #[test]
    fn clear_empties_the_log() {
        let mut log = ConversationLog::new();
        log.add_message(Role::User, MessageContent::Text("q".into()));
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.stats().total_messages, 0);
    }
}
