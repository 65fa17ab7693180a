// Copyright 2025-Present Lumbertrace contributors
// SPDX-License-Identifier: Apache-2.0

//! Persistent stream transport.
//!
//! [`Connector`] opens connections and [`Transport`] is one open connection.
//! The supervisor only ever sees these traits, so the websocket implementation
//! below can be swapped for an in-memory one in tests.

use async_trait::async_trait;
use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async_with_config,
    tungstenite::{protocol::WebSocketConfig, Message as WsMessage},
    MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

use crate::error::TransportError;

const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024; // 16 MiB

/// One open, text-framed connection.
///
/// Dropping a transport releases the underlying resource whether or not
/// [`Transport::close`] completed.
#[async_trait]
pub trait Transport: Send {
    async fn send_text(&mut self, payload: String) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, uri: &str) -> Result<Box<dyn Transport>, TransportError>;
}

/// Opens websocket connections with tokio-tungstenite.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, uri: &str) -> Result<Box<dyn Transport>, TransportError> {
        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(MAX_FRAME_SIZE);
        config.max_frame_size = Some(MAX_FRAME_SIZE);

        let (stream, response) = connect_async_with_config(uri, Some(config), false).await?;
        debug!("STREAM | Handshake completed with status {}", response.status());
        Ok(Box::new(WebSocketTransport { stream }))
    }
}

pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send_text(&mut self, payload: String) -> Result<(), TransportError> {
        self.stream.send(WsMessage::text(payload)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream.close(None).await?;
        Ok(())
    }
}
