use chrono::{DateTime, Local};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Message,
    /// Announces a command about to run; rendered highlighted.
    Announce,
    Error,
}

#[derive(Debug, Clone)]
pub struct LogLine {
    pub time: DateTime<Local>,
    pub kind: LineKind,
    pub text: String,
}

/// Append-only log shown to the user. Lines are never dropped.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    lines: Vec<LogLine>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, kind: LineKind, text: impl Into<String>) {
        let text = text.into();
        info!(target: "rcomposer::log", ?kind, "{}", text);
        self.lines.push(LogLine {
            time: Local::now(),
            kind,
            text,
        });
    }

    pub fn message(&mut self, text: impl Into<String>) {
        self.append(LineKind::Message, text);
    }

    pub fn announce(&mut self, text: impl Into<String>) {
        self.append(LineKind::Announce, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.append(LineKind::Error, text);
    }

    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    #[cfg(test)]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.text.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_order_and_kind() {
        let mut log = LogSink::new();
        assert!(log.lines().is_empty());

        log.message("first");
        log.announce("Running composer install in /proj/");
        log.error("boom");

        let kinds: Vec<_> = log.lines().iter().map(|l| l.kind).collect();
        assert_eq!(kinds, [LineKind::Message, LineKind::Announce, LineKind::Error]);
        assert_eq!(log.lines().last().unwrap().text, "boom");
        assert!(log.contains("composer install"));
        assert!(!log.contains("update"));
    }

    #[test]
    fn test_empty_lines_are_kept() {
        let mut log = LogSink::new();
        for _ in 0..1000 {
            log.message("");
        }
        assert_eq!(log.lines().len(), 1000);
    }
}
