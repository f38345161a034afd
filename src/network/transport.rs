use std::time::Duration;

use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::TransportError;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials the broker's raw WebSocket endpoint.
pub async fn build_transport(url: &str, connect_timeout: Duration) -> Result<WsStream, TransportError> {
    match tokio::time::timeout(connect_timeout, connect_async(url)).await {
        Ok(Ok((stream, response))) => {
            log::debug!("WebSocket upgraded ({}) for {url}", response.status());
            Ok(stream)
        }
        Ok(Err(err)) => Err(err.into()),
        Err(_) => Err(TransportError::ConnectTimeout(connect_timeout)),
    }
}
