//! WebSocket push transport.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

use vguard_models::{ClientMessage, OrgId};

use crate::config::ConsumerConfig;
use crate::error::ClientResult;
use crate::transport::{PushConnection, PushTransport};
use crate::wire::IncomingMessage;

/// Connects to the progress WebSocket, carrying the organization as `orgId`.
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: Url,
}

impl WsTransport {
    pub fn new(ws_url: &str, org_id: &OrgId) -> ClientResult<Self> {
        let mut url = Url::parse(ws_url)?;
        url.query_pairs_mut().append_pair("orgId", org_id.as_str());
        Ok(Self { url })
    }

    pub fn from_config(config: &ConsumerConfig) -> ClientResult<Self> {
        Self::new(&config.ws_url, &config.org_id)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl PushTransport for WsTransport {
    async fn connect(&self) -> ClientResult<Box<dyn PushConnection>> {
        let (stream, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        debug!(url = %self.url, "Progress socket connected");
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl PushConnection for WsConnection {
    async fn send(&mut self, message: &ClientMessage) -> ClientResult<()> {
        let text = serde_json::to_string(message)?;
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<ClientResult<IncomingMessage>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => match serde_json::from_str(&text) {
                    Ok(message) => return Some(Ok(message)),
                    Err(e) => {
                        debug!("Skipping undecodable server message: {}", e);
                    }
                },
                Ok(Message::Close(_)) => return None,
                // Pings are answered by tungstenite itself
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}
