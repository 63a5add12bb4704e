//! Terminal rendering of the chat history.

use crossterm::style::Stylize;
use postflow_workflow::{Author, ChatEntry, Cursor, EntryKind, RunStatus};

/// Render `history` as plain text, one block per entry.
///
/// Assistant entries with a category get a bracketed badge line; user
/// entries are prefixed with `> `.
#[must_use]
pub fn render_history(history: &[ChatEntry], color: bool) -> String {
    let mut out = String::new();
    for (i, entry) in history.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&render_entry(entry, color));
        out.push('\n');
    }
    out
}

fn render_entry(entry: &ChatEntry, color: bool) -> String {
    match entry.author {
        Author::User => {
            if color {
                format!("{} {}", ">".dark_grey(), entry.text.as_str().bold())
            } else {
                format!("> {}", entry.text)
            }
        }
        Author::Assistant => match entry.kind.badge() {
            Some(badge) => format!("{}\n{}", badge_label(entry.kind, badge, color), entry.text),
            None => entry.text.clone(),
        },
    }
}

fn badge_label(kind: EntryKind, badge: &str, color: bool) -> String {
    let label = format!("[{badge}]");
    if !color {
        return label;
    }
    let styled = match kind {
        EntryKind::OriginalPost => label.as_str().cyan(),
        EntryKind::FeedbackRevision => label.as_str().green(),
        EntryKind::Validation => label.as_str().yellow(),
        EntryKind::UserFeedbackEcho => label.as_str().magenta(),
        EntryKind::Plain => label.as_str().stylize(),
    };
    styled.bold().to_string()
}

/// One-line hint for what the session needs next.
#[must_use]
pub fn next_action(session: &str, cursor: &Cursor) -> String {
    let flag = if session == postflow_config::DEFAULT_SESSION {
        String::new()
    } else {
        format!(" --session {session}")
    };
    match cursor.status {
        RunStatus::AwaitingFeedback => format!(
            "Waiting for your feedback: postflow feedback{flag} \"<what to change, or that it looks good>\""
        ),
        RunStatus::Running => format!("Run interrupted: postflow resume{flag}"),
        RunStatus::Completed => "Run complete.".to_string(),
    }
}
