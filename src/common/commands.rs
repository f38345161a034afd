/// Commands the chat view hands to the live session task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkCommand {
    /// Fire-and-forget publish to `/app/sendMessage/{room_id}`.
    Send {
        room_id: String,
        sender: String,
        content: String,
    },
}
