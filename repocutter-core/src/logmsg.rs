//! Log-message display format
//!
//! The textual form `svn log` prints: entries delimited by a 72-dash
//! separator, each headed by `rN | author | date | N lines`, a blank
//! line, then the message body. The `log` command emits this form and
//! `setlog` parses it back, so both sides live here.

use chrono::DateTime;

use crate::error::{DumpError, Result};

/// Entry delimiter used by `svn log`
pub const SEPARATOR: &str =
    "------------------------------------------------------------------------";

/// One parsed log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub revision: u64,
    pub author: String,
    pub date: String,
    pub text: String,
}

/// RFC-3339 `svn:date` to the human form `svn log` shows. Unparsable
/// dates are passed through untouched.
pub fn human_date(date: &str) -> String {
    match DateTime::parse_from_rfc3339(date) {
        Ok(dt) => dt.format("%Y-%m-%d %H:%M:%S %z (%a, %d %b %Y)").to_string(),
        Err(_) => date.to_string(),
    }
}

/// Render one entry, separator not included.
pub fn format_entry(revision: u64, author: &str, date: &str, text: &str) -> String {
    let lines = text.lines().count();
    let plural = if lines == 1 { "line" } else { "lines" };
    let mut out = format!(
        "r{} | {} | {} | {} {}\n\n",
        revision,
        author,
        human_date(date),
        lines,
        plural
    );
    out.push_str(text);
    if !text.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Parse a whole log file back into entries.
pub fn parse(text: &str) -> Result<Vec<LogEntry>> {
    let mut entries = Vec::new();
    let mut lines = text.lines().peekable();

    while let Some(line) = lines.next() {
        if line.trim_end().chars().all(|c| c == '-') {
            continue;
        }
        let bad = || DumpError::argument(format!("malformed log entry header: {line:?}"));
        let fields: Vec<&str> = line.split(" | ").collect();
        if fields.len() < 3 || !fields[0].starts_with('r') {
            return Err(bad());
        }
        let revision = fields[0][1..].parse().map_err(|_| bad())?;
        let author = fields[1].to_string();
        let date = fields[2].to_string();

        // Header is followed by one blank line, then the body up to the
        // next separator.
        match lines.next() {
            Some("") => {}
            _ => return Err(bad()),
        }
        let mut body = Vec::new();
        for line in lines.by_ref() {
            if line.trim_end().chars().all(|c| c == '-') && line.len() >= 8 {
                break;
            }
            body.push(line);
        }
        entries.push(LogEntry {
            revision,
            author,
            date,
            text: body.join("\n"),
        });
    }
    Ok(entries)
}
