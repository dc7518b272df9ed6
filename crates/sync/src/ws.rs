use futures_util::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::channel::{ChannelConnector, ChannelError, ChannelFrame, FrameStream};

/// WebSocket connector for the realtime endpoint (`ws://` only).
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ChannelConnector for WsConnector {
    async fn open(&self) -> Result<FrameStream, ChannelError> {
        let (socket, response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ChannelError::Connect(format!("{}: {e}", self.url)))?;
        debug!("websocket handshake with {} returned {}", self.url, response.status());

        // Outbound half is unused; pings are answered by tungstenite on read.
        let frames = socket.map(|message| match message {
            Ok(Message::Text(text)) => Ok(ChannelFrame::Text(text)),
            Ok(_) => Ok(ChannelFrame::Other),
            Err(e) => Err(ChannelError::Transport(e.to_string())),
        });
        Ok(frames.boxed())
    }
}
