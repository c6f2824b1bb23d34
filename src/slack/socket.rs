//! Slack Socket Mode connection.
//!
//! Socket Mode delivers events over a websocket instead of HTTP callbacks.
//! Every envelope carrying an `envelope_id` must be acknowledged quickly,
//! so acknowledgements are sent before the event is handed to the caller.

use std::future::poll_fn;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use super::events::{Acknowledgement, EnvelopeKind, SlackEvent, parse_envelope};
use super::{SlackClient, SlackError};

/// What the caller should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// An Events API event, already acknowledged.
    Event(SlackEvent),

    /// Slack asked us to reconnect (with the reason it gave).
    Disconnect(String),
}

/// Opens Socket Mode connections.
#[derive(Debug, Clone)]
pub struct SocketModeClient {
    slack: Arc<SlackClient>,
}

impl SocketModeClient {
    /// Creates a Socket Mode client on top of a Web API client.
    #[must_use]
    pub const fn new(slack: Arc<SlackClient>) -> Self {
        Self { slack }
    }

    /// Opens a new connection, retrying with the client's retry policy.
    pub async fn connect(&self) -> Result<SocketConnection, SlackError> {
        let slack = &self.slack;

        let stream = slack
            .retry_policy()
            .run("socket mode connect", move || async move {
                let url = slack.open_connection().await?;
                let (stream, _response) = connect_async(url.as_str()).await?;
                Ok::<_, SlackError>(stream)
            })
            .await?;

        info!("Socket Mode websocket connected");
        Ok(SocketConnection::new(stream))
    }
}

/// An open Socket Mode websocket.
pub struct SocketConnection<S = MaybeTlsStream<TcpStream>> {
    stream: WebSocketStream<S>,

    /// Acknowledgement not yet handed to the websocket.
    ack: Option<Message>,

    /// Decoded event waiting for its acknowledgement to be flushed.
    ready: Option<SocketEvent>,
}

impl<S> SocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an already established websocket.
    pub const fn new(stream: WebSocketStream<S>) -> Self {
        Self {
            stream,
            ack: None,
            ready: None,
        }
    }

    /// Waits for the next event worth handling.
    ///
    /// Returns `Ok(None)` when the websocket is closed.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. A frame that has been read is kept on the
    /// connection together with its pending acknowledgement, and the next
    /// call finishes the acknowledgement and returns it.
    pub async fn next_event(&mut self) -> Result<Option<SocketEvent>, SlackError> {
        loop {
            if self.ack.is_some() || self.ready.is_some() {
                self.flush_ack().await?;
                if let Some(event) = self.ready.take() {
                    return Ok(Some(event));
                }
            }

            let Some(frame) = self.stream.next().await else {
                return Ok(None);
            };

            let text = match frame? {
                Message::Text(text) => text,
                Message::Close(close) => {
                    debug!(?close, "Websocket closed by Slack");
                    return Ok(None);
                }
                // Pings are answered by tungstenite itself
                Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_) => {
                    continue;
                }
            };

            self.accept_frame(&text)?;
        }
    }

    /// Sends a close frame. Errors are ignored since the connection is going away.
    pub async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "Error while closing websocket");
        }
    }

    /// Decodes a frame, queueing its acknowledgement and the event to return.
    fn accept_frame(&mut self, text: &str) -> Result<(), SlackError> {
        let envelope = match parse_envelope(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Ignoring undecodable Socket Mode frame");
                return Ok(());
            }
        };

        if let Some(envelope_id) = envelope.envelope_id.as_deref() {
            let ack = serde_json::to_string(&Acknowledgement { envelope_id })?;
            self.ack = Some(Message::Text(ack));
        }

        match envelope.kind {
            EnvelopeKind::Hello => info!("Socket Mode session ready"),
            EnvelopeKind::Disconnect => {
                let reason = envelope.reason.unwrap_or_default();
                info!(reason = %reason, "Slack requested disconnect");
                self.ready = Some(SocketEvent::Disconnect(reason));
            }
            EnvelopeKind::EventsApi => match envelope.event() {
                Some(event) => self.ready = Some(SocketEvent::Event(event)),
                None => debug!("events_api envelope without a usable event"),
            },
            other => debug!(kind = ?other, "Ignoring envelope"),
        }
        Ok(())
    }

    /// Writes out the queued acknowledgement, if any.
    ///
    /// The message is only taken from `self.ack` once the sink has accepted it,
    /// and flushing can be resumed, so this is cancel safe.
    async fn flush_ack(&mut self) -> Result<(), SlackError> {
        if self.ack.is_some() {
            poll_fn(|cx| self.stream.poll_ready_unpin(cx)).await?;
            if let Some(ack) = self.ack.take() {
                self.stream.start_send_unpin(ack)?;
                debug!("Envelope acknowledgement queued");
            }
        }
        self.stream.flush().await?;
        Ok(())
    }
}

impl<S> std::fmt::Debug for SocketConnection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketConnection")
            .field("ack_pending", &self.ack.is_some())
            .field("ready", &self.ready)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::DuplexStream;
    use tokio_tungstenite::tungstenite::protocol::Role;

    use super::*;
    use crate::slack::MessageEvent;

    const EVENT_FRAME: &str = r#"{"type":"events_api","envelope_id":"env-1","payload":{"event":{
        "type":"message","user":"U1","text":"<@U2> ++","channel":"C1","ts":"1.0"}}}"#;

    async fn socket_pair() -> (SocketConnection<DuplexStream>, WebSocketStream<DuplexStream>) {
        socket_pair_with_buffer(64 * 1024).await
    }

    async fn socket_pair_with_buffer(
        max_buf_size: usize,
    ) -> (SocketConnection<DuplexStream>, WebSocketStream<DuplexStream>) {
        let (client_io, server_io) = tokio::io::duplex(max_buf_size);
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        (SocketConnection::new(client), server)
    }

    async fn send_text(server: &mut WebSocketStream<DuplexStream>, text: &str) {
        server.send(Message::Text(text.to_owned())).await.unwrap();
    }

    #[tokio::test]
    async fn test_event_is_acknowledged_and_returned() {
        let (mut conn, mut server) = socket_pair().await;

        send_text(&mut server, r#"{"type":"hello"}"#).await;
        send_text(&mut server, EVENT_FRAME).await;

        let event = conn.next_event().await.unwrap();
        assert_eq!(
            event,
            Some(SocketEvent::Event(SlackEvent::Message(MessageEvent {
                user: Some("U1".to_owned()),
                text: Some("<@U2> ++".to_owned()),
                channel: "C1".to_owned(),
                ts: "1.0".to_owned(),
                ..MessageEvent::default()
            })))
        );

        let ack = server.next().await.unwrap().unwrap();
        assert_eq!(ack, Message::Text(r#"{"envelope_id":"env-1"}"#.to_owned()));
    }

    #[tokio::test]
    async fn test_disconnect_envelope() {
        let (mut conn, mut server) = socket_pair().await;

        send_text(&mut server, r#"{"type":"disconnect","reason":"warning"}"#).await;

        assert_eq!(
            conn.next_event().await.unwrap(),
            Some(SocketEvent::Disconnect("warning".to_owned()))
        );
    }

    #[tokio::test]
    async fn test_garbage_frames_are_skipped() {
        let (mut conn, mut server) = socket_pair().await;

        send_text(&mut server, "not json").await;
        send_text(&mut server, r#"{"type":"disconnect"}"#).await;

        assert_eq!(
            conn.next_event().await.unwrap(),
            Some(SocketEvent::Disconnect(String::new()))
        );
    }

    #[tokio::test]
    async fn test_close_ends_stream() {
        let (mut conn, mut server) = socket_pair().await;

        server.close(None).await.unwrap();

        assert_eq!(conn.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_event_survives_cancelled_acknowledgement() {
        // The pipe is too small for the ack, so writing it stalls until the
        // server starts reading.
        let (mut conn, server) = socket_pair_with_buffer(16).await;
        let (mut sink, mut stream) = server.split();

        let sender = tokio::spawn(async move {
            sink.send(Message::Text(EVENT_FRAME.to_owned())).await.unwrap();
            sink.send(Message::Text(r#"{"type":"disconnect","reason":"after"}"#.to_owned()))
                .await
                .unwrap();
        });

        let first = tokio::select! {
            event = conn.next_event() => Some(event),
            () = tokio::time::sleep(Duration::from_millis(200)) => None,
        };
        assert!(first.is_none(), "ack write should still be pending");

        let reader = tokio::spawn(async move { stream.next().await.unwrap().unwrap() });

        match conn.next_event().await.unwrap() {
            Some(SocketEvent::Event(SlackEvent::Message(message))) => {
                assert_eq!(message.text.as_deref(), Some("<@U2> ++"));
            }
            other => panic!("expected the kudos message, got {other:?}"),
        }
        assert_eq!(
            reader.await.unwrap(),
            Message::Text(r#"{"envelope_id":"env-1"}"#.to_owned())
        );

        assert_eq!(
            conn.next_event().await.unwrap(),
            Some(SocketEvent::Disconnect("after".to_owned()))
        );
        sender.await.unwrap();
    }
}
