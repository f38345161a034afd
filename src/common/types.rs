use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A chat message as persisted and fanned out by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server-assigned id; absent until the backend has acknowledged the send.
    #[serde(default, deserialize_with = "non_empty_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub room_id: String,
    pub sender: String,
    pub content: String,
    #[serde(with = "timestamp")]
    pub timestamp: NaiveDateTime,
}

impl Message {
    /// Id usable for de-duplication (present and non-empty).
    pub fn identity(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

/// A room, addressed by its short shareable join code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub room_name: String,
}

/// Body published on the room command channel; the server fills in the rest.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMessage<'a> {
    pub sender: &'a str,
    pub content: &'a str,
}

/// One page of history, already reversed into chronological order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePage {
    pub room_id: String,
    /// 0 = newest page; larger indices are older.
    pub page_index: u32,
    pub messages: Vec<Message>,
    /// No older page exists.
    pub is_last_page: bool,
}

fn non_empty_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let id = Option::<String>::deserialize(deserializer)?;
    Ok(id.filter(|id| !id.is_empty()))
}

/// Backend timestamps are zone-less local date-times; offsets are folded to UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
        match NaiveDateTime::parse_from_str(raw, FORMAT) {
            Ok(value) => Ok(value),
            Err(err) => DateTime::parse_from_rfc3339(raw)
                .map(|value| value.naive_utc())
                .map_err(|_| err),
        }
    }
}
