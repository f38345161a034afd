use crate::common::Message;
use crate::sync::Viewport;

/// `[HH:MM] sender: content`, with the local user shown as "You".
pub fn format_message(message: &Message, identity: &str) -> String {
    let who = if message.sender == identity {
        "You"
    } else {
        message.sender.as_str()
    };
    format!(
        "[{}] {who}: {}",
        message.timestamp.format("%H:%M"),
        message.content
    )
}

/// The rows of `messages` currently inside `viewport`, one per message.
pub fn visible_window<'a>(
    messages: &'a [Message],
    viewport: &Viewport,
) -> impl Iterator<Item = &'a Message> + 'a {
    let start = (viewport.offset.max(0.0) as usize).min(messages.len());
    let rows = viewport.visible_extent.max(0.0) as usize;
    messages[start..].iter().take(rows)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn message(sender: &str, n: u32) -> Message {
        Message {
            id: Some(format!("m{n}")),
            room_id: "abc123".to_string(),
            sender: sender.to_string(),
            content: format!("line {n}"),
            timestamp: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(9, 5, 0)
                .unwrap(),
        }
    }

    #[test]
    fn own_messages_render_as_you() {
        assert_eq!(format_message(&message("ana", 1), "ana"), "[09:05] You: line 1");
        assert_eq!(format_message(&message("bo", 2), "ana"), "[09:05] bo: line 2");
    }

    #[test]
    fn window_follows_offset() {
        let messages: Vec<_> = (0..10).map(|n| message("ana", n)).collect();
        let viewport = Viewport {
            offset: 7.0,
            content_extent: 10.0,
            visible_extent: 5.0,
        };
        let shown: Vec<_> = visible_window(&messages, &viewport)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(shown, vec!["line 7", "line 8", "line 9"]);
    }
}
