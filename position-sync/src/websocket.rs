use async_trait::async_trait;
use fleet_core::{BoxedError, CoreResult, FeedStream, FeedTransport, core_error::TransportSnafu};
use futures::{SinkExt, StreamExt, future};
use snafu::{IntoError, ResultExt};
use tokio_tungstenite::{
    connect_async_with_config,
    tungstenite::{Message, protocol::WebSocketConfig},
};
use tracing::debug;

use crate::settings::StreamSettings;

/// Live feed over a WebSocket, one connection per [FeedTransport::connect] call.
#[derive(Debug, Clone)]
pub struct WebSocketFeed {
    url: String,
    subscription: Option<String>,
    max_message_length: Option<usize>,
}

impl WebSocketFeed {
    pub fn new(settings: &StreamSettings) -> Self {
        Self {
            url: settings.url.clone(),
            subscription: settings.subscription.clone(),
            max_message_length: settings.max_message_length,
        }
    }
}

#[async_trait]
impl FeedTransport for WebSocketFeed {
    async fn connect(&self) -> CoreResult<FeedStream> {
        let config = WebSocketConfig::default().max_message_size(self.max_message_length);

        let (mut socket, _) = connect_async_with_config(self.url.as_str(), Some(config), false)
            .await
            .map_err(BoxedError::from)
            .context(TransportSnafu {
                target: self.url.clone(),
            })?;

        if let Some(subscription) = &self.subscription {
            socket
                .send(Message::text(subscription.as_str()))
                .await
                .map_err(BoxedError::from)
                .context(TransportSnafu {
                    target: self.url.clone(),
                })?;
        }

        let target = self.url.clone();

        // Control frames are answered by tungstenite itself, only data frames
        // are passed on.
        let stream = socket.filter_map(move |message| {
            let out = match message {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => Some(Ok(text)),
                    Err(e) => {
                        debug!("discarding non utf-8 binary frame: {e}");
                        None
                    }
                },
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
                Ok(Message::Close(frame)) => {
                    debug!("live feed sent close frame: {frame:?}");
                    None
                }
                Err(e) => Some(Err(TransportSnafu {
                    target: target.clone(),
                }
                .into_error(BoxedError::from(e)))),
            };
            future::ready(out)
        });

        Ok(stream.boxed())
    }
}
