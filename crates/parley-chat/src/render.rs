//! Plain-text transcript rendering.

use parley_core::types::Message;

/// Render a thread as one `"{Role}: {content}"` line per message.
///
/// Messages with attachments get an ` [attached: a, b]` suffix. An empty
/// history renders as an empty string.
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(render_message)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_message(message: &Message) -> String {
    let mut line = format!("{}: {}", message.role.label(), message.content);
    if !message.attachments.is_empty() {
        let names: Vec<&str> = message
            .attachments
            .iter()
            .map(|a| a.filename.as_str())
            .collect();
        line.push_str(&format!(" [attached: {}]", names.join(", ")));
    }
    line
}
