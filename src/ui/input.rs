/// One line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    Say(String),
    Create(String),
    Join(String),
    /// The top sentinel was brought into view.
    Older,
    Up(u32),
    Down(u32),
    Leave,
    Quit,
    Help,
    Unknown(String),
    Empty,
}

const DEFAULT_SCROLL_STEP: u32 = 10;

pub fn parse(line: &str) -> UserInput {
    let line = line.trim();
    if line.is_empty() {
        return UserInput::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return UserInput::Say(line.to_string());
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    let step = || arg.parse().unwrap_or(DEFAULT_SCROLL_STEP);

    match (name, arg.is_empty()) {
        ("create", false) => UserInput::Create(arg.to_string()),
        ("join" | "switch", false) => UserInput::Join(arg.to_string()),
        ("older", _) => UserInput::Older,
        ("up", _) => UserInput::Up(step()),
        ("down", _) => UserInput::Down(step()),
        ("leave", _) => UserInput::Leave,
        ("quit" | "exit", _) => UserInput::Quit,
        ("help", _) => UserInput::Help,
        _ => UserInput::Unknown(line.to_string()),
    }
}

pub const HELP: &str = "\
/create NAME     create a room and enter it
/join CODE       enter a room by its code (alias: /switch)
/older           load older messages
/up [N]          scroll up N rows (loads history at the top)
/down [N]        scroll down N rows
/leave           leave the current room
/quit            exit
anything else    send it to the room";
