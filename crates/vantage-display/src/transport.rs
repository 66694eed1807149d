//! Framebuffer stream transport
//!
//! The stream itself is opaque: bytes from the remote-desktop proxy are
//! relayed untouched. Only the way a connection ends is interpreted.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::error::{Error as WsError, UrlError};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::{DisplayError, StreamFailure};
use crate::Result;

/// Opens framebuffer streams scoped to one session.
#[async_trait]
pub trait FramebufferConnector: Send + Sync {
    async fn connect(
        &self,
        session_id: &str,
    ) -> std::result::Result<Box<dyn FramebufferStream>, StreamFailure>;
}

#[async_trait]
pub trait FramebufferStream: Send {
    /// Next chunk of framebuffer data. Any end of the stream that the client
    /// did not ask for is a failure.
    async fn next_chunk(&mut self) -> std::result::Result<Bytes, StreamFailure>;

    /// Locally initiated teardown.
    async fn close(&mut self);
}

/// Connects to a WebSocket proxy in front of the remote-desktop server.
pub struct WsFramebufferConnector {
    template: String,
    quality: u8,
    compression: u8,
}

impl WsFramebufferConnector {
    /// `template` is a `ws://` or `wss://` URL in which `{session}` is
    /// replaced by the session id.
    pub fn new(template: impl Into<String>, quality: u8, compression: u8) -> Result<Self> {
        let connector = Self {
            template: template.into(),
            quality,
            compression,
        };
        connector.endpoint("check")?;
        Ok(connector)
    }

    /// Endpoint for one connection, with the quality knobs applied.
    pub fn endpoint(&self, session_id: &str) -> Result<Url> {
        let encoded: String =
            url::form_urlencoded::byte_serialize(session_id.as_bytes()).collect();
        let raw = self.template.replace("{session}", &encoded);

        let mut url =
            Url::parse(&raw).map_err(|e| DisplayError::InvalidUrl(format!("{}: {}", raw, e)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(DisplayError::InvalidUrl(raw));
        }

        url.query_pairs_mut()
            .append_pair("quality", &self.quality.to_string())
            .append_pair("compression", &self.compression.to_string());

        Ok(url)
    }
}

#[async_trait]
impl FramebufferConnector for WsFramebufferConnector {
    async fn connect(
        &self,
        session_id: &str,
    ) -> std::result::Result<Box<dyn FramebufferStream>, StreamFailure> {
        let url = self.endpoint(session_id).map_err(|e| {
            tracing::warn!(session_id, error = %e, "Cannot build stream endpoint");
            StreamFailure::Unclean
        })?;

        tracing::debug!(session_id, url = %url, "Opening framebuffer stream");

        let (ws, _) = connect_async(url.as_str()).await.map_err(|e| {
            let failure = classify(&e);
            tracing::warn!(session_id, error = %e, failure = %failure, "Stream connect failed");
            failure
        })?;

        Ok(Box::new(WsFramebufferStream { ws }))
    }
}

struct WsFramebufferStream {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FramebufferStream for WsFramebufferStream {
    async fn next_chunk(&mut self) -> std::result::Result<Bytes, StreamFailure> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Bytes::from(data)),
                Some(Ok(Message::Text(text))) => return Ok(Bytes::from(text.into_bytes())),
                Some(Ok(Message::Close(frame))) => {
                    let policy = frame.is_some_and(|f| f.code == CloseCode::Policy);
                    return Err(if policy {
                        StreamFailure::AuthFailed
                    } else {
                        StreamFailure::Unclean
                    });
                }
                // Pings are answered by the protocol layer
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(classify(&e)),
                None => return Err(StreamFailure::Unclean),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            tracing::debug!(error = %e, "Stream close handshake failed");
        }
    }
}

fn classify(error: &WsError) -> StreamFailure {
    match error {
        WsError::Http(response) if matches!(response.status().as_u16(), 401 | 403) => {
            StreamFailure::AuthFailed
        }
        WsError::Tls(_) | WsError::Url(UrlError::TlsFeatureNotEnabled) => {
            StreamFailure::SecurityNegotiation
        }
        _ => StreamFailure::Unclean,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::SinkExt;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
    use tokio_tungstenite::tungstenite::http;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::{accept_async, accept_hdr_async};

    #[test]
    fn test_endpoint_applies_session_and_quality() {
        let connector =
            WsFramebufferConnector::new("ws://localhost:6080/websockify?session={session}", 6, 2)
                .unwrap();
        assert_eq!(
            connector.endpoint("t 1").unwrap().as_str(),
            "ws://localhost:6080/websockify?session=t+1&quality=6&compression=2"
        );
    }

    #[test]
    fn test_rejects_non_websocket_template() {
        assert!(WsFramebufferConnector::new("http://localhost:6080/{session}", 6, 2).is_err());
        assert!(WsFramebufferConnector::new("not a url", 6, 2).is_err());
    }

    #[tokio::test]
    async fn test_relays_binary_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
            ws.send(Message::Binary(vec![4])).await.unwrap();
            while ws.next().await.is_some() {}
        });

        let connector = WsFramebufferConnector::new(format!("ws://{}/{{session}}", addr), 6, 2)
            .unwrap();
        let mut stream = connector.connect("t1").await.unwrap();
        assert_eq!(stream.next_chunk().await.unwrap(), Bytes::from_static(&[1, 2, 3]));
        assert_eq!(stream.next_chunk().await.unwrap(), Bytes::from_static(&[4]));
        stream.close().await;
    }

    #[tokio::test]
    async fn test_rejected_upgrade_is_auth_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let reject = |_: &Request, _: Response| -> std::result::Result<Response, ErrorResponse> {
                Err(http::Response::builder().status(401).body(None).unwrap())
            };
            let _ = accept_hdr_async(stream, reject).await;
        });

        let connector = WsFramebufferConnector::new(format!("ws://{}/{{session}}", addr), 6, 2)
            .unwrap();
        let failure = connector.connect("t1").await.err().unwrap();
        assert_eq!(failure, StreamFailure::AuthFailed);
    }

    #[tokio::test]
    async fn test_close_codes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            for code in [CloseCode::Policy, CloseCode::Away] {
                let (stream, _) = listener.accept().await.unwrap();
                let mut ws = accept_async(stream).await.unwrap();
                ws.close(Some(CloseFrame {
                    code,
                    reason: "bye".into(),
                }))
                .await
                .unwrap();
                while ws.next().await.is_some() {}
            }
        });

        let connector = WsFramebufferConnector::new(format!("ws://{}/{{session}}", addr), 6, 2)
            .unwrap();

        let mut stream = connector.connect("t1").await.unwrap();
        assert_eq!(stream.next_chunk().await.unwrap_err(), StreamFailure::AuthFailed);

        let mut stream = connector.connect("t1").await.unwrap();
        assert_eq!(stream.next_chunk().await.unwrap_err(), StreamFailure::Unclean);
    }
}
