//! Plain-text history export.

use chrono::{DateTime, TimeZone, Utc};
use staffrep_core::models::user::UserRecord;

const SEPARATOR: &str = "--------------------------------------------------";

/// A generated report, ready to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub content: String,
}

/// Render `record` as a human-readable report, newest entry first.
pub fn generate_export(
    record: &UserRecord,
    username: &str,
    generated_at: DateTime<Utc>,
) -> ExportArtifact {
    let mut content = format!(
        "STAFF REPUTATION HISTORY FOR: {username} ({})\n",
        record.user_id
    );
    content.push_str(&format!(
        "CURRENT STANDING: ✅ {} | ❌ {}\n",
        record.positive_rep, record.negative_rep
    ));
    content.push_str(&format!("GENERATED: {}\n", generated_at.to_rfc3339()));
    content.push_str(SEPARATOR);
    content.push_str("\n\n");

    if record.reputation_history.is_empty() {
        content.push_str("No history recorded.");
    } else {
        for entry in record.history_newest_first() {
            let date = Utc
                .timestamp_millis_opt(entry.timestamp)
                .single()
                .map(|d| d.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| entry.timestamp.to_string());
            content.push_str(&format!("[{date}] ACTION: {}\n", entry.action));
            content.push_str(&format!("  > Amount: {}\n", entry.amount));
            content.push_str(&format!("  > Mod ID: {}\n", entry.moderator_id));
            content.push_str(&format!("  > Reason: {}\n\n", entry.reason));
        }
    }

    ExportArtifact {
        file_name: format!(
            "history_{}_{}.txt",
            sanitize(username),
            generated_at.timestamp_millis()
        ),
        content,
    }
}

/// Keep file names portable.
fn sanitize(username: &str) -> String {
    let cleaned: String = username
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".into()
    } else {
        cleaned
    }
}
