use std::time::Duration;

use crate::error::ParseError;

pub const ACCEPT_VERSION: &str = "1.2,1.1,1.0";

/// A STOMP frame as carried in one WebSocket text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Repeated headers: the first one wins.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn connect(heartbeat: Heartbeat) -> Self {
        Self::new("CONNECT")
            .header("accept-version", ACCEPT_VERSION)
            .header("heart-beat", heartbeat.header_value())
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new("SUBSCRIBE")
            .header("id", id)
            .header("destination", destination)
    }

    pub fn send(destination: &str, json_body: String) -> Self {
        Self::new("SEND")
            .header("destination", destination)
            .header("content-type", "application/json")
            .body(json_body)
    }

    pub fn disconnect() -> Self {
        Self::new("DISCONNECT")
    }

    pub fn encode(&self) -> String {
        let escape = escapes_headers(&self.command);
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(&self.command);
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

/// Heart-beat line payload: a bare EOL.
pub const HEARTBEAT: &str = "\n";

/// Splits a text message into frames. Bare EOLs (heart-beats) yield nothing.
pub fn decode(text: &str) -> Result<Vec<Frame>, ParseError> {
    let mut frames = Vec::new();
    let mut rest = text;
    loop {
        rest = rest.trim_start_matches(['\r', '\n']);
        if rest.is_empty() {
            return Ok(frames);
        }
        let Some(end) = rest.find('\0') else {
            return Err(ParseError::Frame("missing NUL terminator".to_string()));
        };
        frames.push(parse_frame(&rest[..end])?);
        rest = &rest[end + 1..];
    }
}

/// Headers end at the first blank line, whichever EOL style it uses.
fn split_head(raw: &str) -> (&str, &str) {
    let mut start = 0;
    for line in raw.split_inclusive('\n') {
        let end = start + line.len();
        if start > 0 && line.trim_end_matches(['\r', '\n']).is_empty() {
            return (&raw[..start], &raw[end..]);
        }
        start = end;
    }
    (raw, "")
}

fn parse_frame(raw: &str) -> Result<Frame, ParseError> {
    let (head, body) = split_head(raw);

    let mut lines = head.lines();
    let command = lines
        .next()
        .map(str::trim_end)
        .filter(|command| !command.is_empty())
        .ok_or_else(|| ParseError::Frame("empty command".to_string()))?;
    let unescape = escapes_headers(command);

    let mut frame = Frame::new(command);
    for line in lines {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ParseError::Frame(format!("header without colon: {line}")))?;
        if unescape {
            frame
                .headers
                .push((unescape_header(name)?, unescape_header(value)?));
        } else {
            frame.headers.push((name.to_string(), value.to_string()));
        }
    }
    frame.body = body.to_string();
    Ok(frame)
}

fn escapes_headers(command: &str) -> bool {
    !matches!(command, "CONNECT" | "CONNECTED")
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String, ParseError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(ParseError::Frame(format!(
                    "invalid header escape \\{}",
                    other.map(String::from).unwrap_or_default()
                )));
            }
        }
    }
    Ok(out)
}

/// `heart-beat` header pair. A zero duration means "not offered".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub outgoing: Duration,
    pub incoming: Duration,
}

/// Intervals both sides agreed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedHeartbeat {
    pub send_every: Option<Duration>,
    pub expect_within: Option<Duration>,
}

impl Heartbeat {
    pub const DISABLED: Heartbeat = Heartbeat {
        outgoing: Duration::ZERO,
        incoming: Duration::ZERO,
    };

    pub fn header_value(&self) -> String {
        format!("{},{}", self.outgoing.as_millis(), self.incoming.as_millis())
    }

    pub fn parse(value: &str) -> Option<Self> {
        let (outgoing, incoming) = value.split_once(',')?;
        Some(Self {
            outgoing: Duration::from_millis(outgoing.trim().parse().ok()?),
            incoming: Duration::from_millis(incoming.trim().parse().ok()?),
        })
    }

    /// `self` is what the client offered, `server` what CONNECTED answered.
    pub fn negotiate(&self, server: Heartbeat) -> NegotiatedHeartbeat {
        let agree = |ours: Duration, theirs: Duration| {
            (!ours.is_zero() && !theirs.is_zero()).then(|| ours.max(theirs))
        };
        NegotiatedHeartbeat {
            send_every: agree(self.outgoing, server.incoming),
            expect_within: agree(self.incoming, server.outgoing),
        }
    }
}
