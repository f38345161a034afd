use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::json;

use crate::common::{Message, Room};
use crate::error::FetchError;

/// Create/lookup of rooms by their join code.
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    async fn create_room(&self, room_name: &str) -> Result<Room, FetchError>;

    /// `Ok(None)` when no room has that code.
    async fn find_room(&self, room_id: &str) -> Result<Option<Room>, FetchError>;
}

/// Paginated history, newest page first and newest message first within a page.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn fetch_page(
        &self,
        room_id: &str,
        page_no: u32,
        page_size: u32,
    ) -> Result<PageResponse, FetchError>;
}

/// Page body as served by the backend. Both the flat and the DTO
/// (`content` + nested `page`) layouts decode into this.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse {
    #[serde(default)]
    pub content: Vec<Message>,
    pub number: Option<u32>,
    pub size: Option<u32>,
    pub last: Option<bool>,
    pub total_pages: Option<u32>,
    pub total_elements: Option<u64>,
    pub page: Option<PageMetadata>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub size: u32,
    pub number: u32,
    pub total_elements: u64,
    pub total_pages: u32,
}

impl PageResponse {
    /// Whether no older page exists after this one.
    pub fn is_last(&self, requested_page: u32) -> bool {
        if let Some(last) = self.last {
            return last;
        }
        let number = self
            .number
            .or(self.page.map(|page| page.number))
            .unwrap_or(requested_page);
        match self.total_pages.or(self.page.map(|page| page.total_pages)) {
            Some(total_pages) => number + 1 >= total_pages,
            None => self.content.is_empty(),
        }
    }
}

/// REST client for the room and history endpoints under `/api/v1/rooms`.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
}

impl RestClient {
    pub fn new(api_base_url: &str) -> Result<Self, FetchError> {
        let base = Url::parse(api_base_url)
            .map_err(|err| FetchError::InvalidUrl(format!("{api_base_url}: {err}")))?;
        if base.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl(api_base_url.to_string()));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base,
        })
    }

    /// `{base}/api/v1/rooms/{segments..}` with each segment percent-encoded.
    pub fn rooms_url(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(["api", "v1", "rooms"])
            .extend(segments);
        Ok(url)
    }
}

fn status_error(status: StatusCode, url: &Url) -> FetchError {
    FetchError::Status {
        status: status.as_u16(),
        url: url.to_string(),
    }
}

#[async_trait]
impl RoomDirectory for RestClient {
    async fn create_room(&self, room_name: &str) -> Result<Room, FetchError> {
        let url = self.rooms_url(&[])?;
        let response = self
            .http
            .post(url.clone())
            .json(&json!({ "roomName": room_name }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(status_error(response.status(), &url));
        }
        Ok(response.json().await?)
    }

    async fn find_room(&self, room_id: &str) -> Result<Option<Room>, FetchError> {
        let url = self.rooms_url(&[room_id])?;
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        // The backend answers 400 rather than 404 for unknown codes.
        if status.is_client_error() {
            log::debug!("Room {room_id} not found ({status})");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(status, &url));
        }
        Ok(Some(response.json().await?))
    }
}

#[async_trait]
impl HistoryStore for RestClient {
    async fn fetch_page(
        &self,
        room_id: &str,
        page_no: u32,
        page_size: u32,
    ) -> Result<PageResponse, FetchError> {
        let url = self.rooms_url(&[room_id, "messages"])?;
        let response = self
            .http
            .get(url.clone())
            .query(&[("pageNo", page_no), ("pageSize", page_size)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(status_error(response.status(), &url));
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &str = r#"{"id":"m1","roomId":"abc123","sender":"ana","content":"hi","timestamp":"2024-05-01T10:00:00"}"#;

    #[test]
    fn flat_page_uses_last_flag() {
        let json = format!(
            r#"{{"content":[{MESSAGE}],"number":0,"size":50,"last":false,"first":true,"totalPages":3,"totalElements":120}}"#
        );
        let page: PageResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(page.content.len(), 1);
        assert!(!page.is_last(0));
    }

    #[test]
    fn dto_page_derives_last_from_totals() {
        let json = format!(
            r#"{{"content":[{MESSAGE}],"page":{{"size":50,"number":2,"totalElements":120,"totalPages":3}}}}"#
        );
        let page: PageResponse = serde_json::from_str(&json).unwrap();
        assert!(page.is_last(2));

        let middle = r#"{"content":[],"page":{"size":50,"number":1,"totalElements":120,"totalPages":3}}"#;
        let page: PageResponse = serde_json::from_str(middle).unwrap();
        assert!(!page.is_last(1));
    }

    #[test]
    fn empty_room_is_last_page() {
        let page: PageResponse = serde_json::from_str(
            r#"{"content":[],"page":{"size":50,"number":0,"totalElements":0,"totalPages":0}}"#,
        )
        .unwrap();
        assert!(page.is_last(0));
        assert!(PageResponse::default().is_last(4));
    }

    #[test]
    fn builds_encoded_room_urls() {
        let client = RestClient::new("http://localhost:8080/").unwrap();
        assert_eq!(
            client.rooms_url(&[]).unwrap().as_str(),
            "http://localhost:8080/api/v1/rooms"
        );
        assert_eq!(
            client.rooms_url(&["a b/c", "messages"]).unwrap().as_str(),
            "http://localhost:8080/api/v1/rooms/a%20b%2Fc/messages"
        );
        assert!(matches!(
            RestClient::new("mailto:someone@example.com"),
            Err(FetchError::InvalidUrl(_))
        ));
    }
}
