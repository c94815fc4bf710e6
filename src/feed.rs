//! Realtime block feed
//!
//! Blocks are pushed over a Phoenix-style channel: the client joins a topic
//! on a websocket and receives `new_block` events with a snake_case payload.
//! The feed decodes each payload into a [`BlockMessage`] before it reaches
//! the page, and reports a disconnect exactly once when the channel fails.
//! There is no reconnect: once disconnected the list is marked stale.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::blocks::{BlockMessage, Item};
use crate::error::{ExplorerError, Result};

pub const NEW_BLOCK_EVENT: &str = "new_block";

const PHX_JOIN: &str = "phx_join";
const PHX_REPLY: &str = "phx_reply";
const PHX_ERROR: &str = "phx_error";
const PHX_CLOSE: &str = "phx_close";
const HEARTBEAT_TOPIC: &str = "phoenix";

/// What the feed tells the page.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    NewBlock(Item),
    Disconnected,
}

/// One channel frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

/// Transport behind the feed.
#[async_trait]
pub trait RealtimeChannel: Send {
    /// Subscribe to `topic`. Fails when the server rejects the join.
    async fn join(&mut self, topic: &str) -> Result<()>;

    /// Next server push. `None` once the transport has closed.
    async fn next_message(&mut self) -> Option<Result<ChannelMessage>>;
}

/// Join `topic` and forward its blocks to `events` until the channel fails
/// or the receiving side goes away.
pub async fn run_block_feed<C, E>(mut channel: C, topic: String, events: UnboundedSender<E>)
where
    C: RealtimeChannel,
    E: From<FeedEvent>,
{
    if let Err(e) = channel.join(&topic).await {
        warn!(topic = %topic, error = %e, "feed.join_failed");
        let _ = events.send(FeedEvent::Disconnected.into());
        return;
    }
    info!(topic = %topic, "feed.joined");

    loop {
        let event = match channel.next_message().await {
            Some(Ok(msg)) if msg.topic != topic => continue,
            Some(Ok(msg)) if msg.event == NEW_BLOCK_EVENT => {
                match serde_json::from_value::<BlockMessage>(msg.payload) {
                    Ok(block) => {
                        debug!(block = block.block_number, "feed.new_block");
                        FeedEvent::NewBlock(block.into())
                    }
                    Err(e) => {
                        warn!(error = %e, "feed.bad_payload");
                        continue;
                    }
                }
            }
            Some(Ok(msg)) if msg.event == PHX_ERROR || msg.event == PHX_CLOSE => {
                warn!(topic = %topic, event = %msg.event, "feed.channel_failed");
                FeedEvent::Disconnected
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!(topic = %topic, error = %e, "feed.transport_failed");
                FeedEvent::Disconnected
            }
            None => {
                warn!(topic = %topic, "feed.closed");
                FeedEvent::Disconnected
            }
        };

        let disconnected = event == FeedEvent::Disconnected;
        if events.send(event.into()).is_err() || disconnected {
            return;
        }
    }
}

pub fn spawn_block_feed<C, E>(channel: C, topic: String, events: UnboundedSender<E>) -> JoinHandle<()>
where
    C: RealtimeChannel + 'static,
    E: From<FeedEvent> + Send + 'static,
{
    tokio::spawn(run_block_feed(channel, topic, events))
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Phoenix channel client over a websocket (JSON v1 frames).
pub struct PhoenixSocket {
    stream: WsStream,
    heartbeat: Interval,
    next_ref: u64,
}

impl PhoenixSocket {
    pub async fn connect(url: &str, heartbeat: Duration) -> Result<Self> {
        let (stream, _) = connect_async(url).await?;
        info!(url = %url, "feed.socket_connected");

        let mut heartbeat = tokio::time::interval(heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        heartbeat.reset();

        Ok(Self {
            stream,
            heartbeat,
            next_ref: 0,
        })
    }

    async fn push(&mut self, topic: &str, event: &str, payload: Value) -> Result<String> {
        self.next_ref += 1;
        let reference = self.next_ref.to_string();
        let frame = ChannelMessage {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
            reference: Some(reference.clone()),
        };
        self.stream
            .send(Message::Text(serde_json::to_string(&frame)?))
            .await?;
        Ok(reference)
    }

    /// Push `event` and wait for its reply. Resolves to the reply's
    /// `response` when the server answers `ok`. Pushes that arrive while
    /// waiting are dropped.
    pub async fn call(&mut self, topic: &str, event: &str, payload: Value) -> Result<Value> {
        let reference = self.push(topic, event, payload).await?;
        loop {
            let msg = match self.read_frame().await {
                None => {
                    return Err(ExplorerError::ChannelError(format!(
                        "socket closed before {} reply",
                        event
                    )))
                }
                Some(frame) => frame?,
            };
            if msg.event != PHX_REPLY || msg.reference.as_deref() != Some(reference.as_str()) {
                continue;
            }
            return match msg.payload.get("status").and_then(Value::as_str) {
                Some("ok") => Ok(msg.payload.get("response").cloned().unwrap_or(Value::Null)),
                _ => Err(ExplorerError::ChannelError(format!(
                    "{} on {} rejected: {}",
                    event, topic, msg.payload
                ))),
            };
        }
    }

    /// Next decoded frame, sending heartbeats while waiting.
    async fn read_frame(&mut self) -> Option<Result<ChannelMessage>> {
        loop {
            tokio::select! {
                _ = self.heartbeat.tick() => {
                    if let Err(e) = self.push(HEARTBEAT_TOPIC, "heartbeat", json!({})).await {
                        return Some(Err(e));
                    }
                }
                frame = self.stream.next() => match frame {
                    None | Some(Ok(Message::Close(_))) => return None,
                    Some(Err(e)) => return Some(Err(e.into())),
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ChannelMessage>(&text) {
                        Ok(msg) => return Some(Ok(msg)),
                        Err(e) => warn!(error = %e, "feed.bad_frame"),
                    },
                    Some(Ok(_)) => {}
                },
            }
        }
    }
}

#[async_trait]
impl RealtimeChannel for PhoenixSocket {
    async fn join(&mut self, topic: &str) -> Result<()> {
        self.call(topic, PHX_JOIN, json!({})).await.map(|_| ())
    }

    async fn next_message(&mut self) -> Option<Result<ChannelMessage>> {
        loop {
            match self.read_frame().await {
                Some(Ok(msg)) if msg.event == PHX_REPLY => continue,
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tokio::sync::mpsc;

    /// Replays a fixed script of frames.
    struct ScriptedChannel {
        join: Result<()>,
        frames: VecDeque<Result<ChannelMessage>>,
    }

    #[async_trait]
    impl RealtimeChannel for ScriptedChannel {
        async fn join(&mut self, _topic: &str) -> Result<()> {
            self.join.clone()
        }

        async fn next_message(&mut self) -> Option<Result<ChannelMessage>> {
            self.frames.pop_front()
        }
    }

    fn frame(topic: &str, event: &str, payload: Value) -> Result<ChannelMessage> {
        Ok(ChannelMessage {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
            reference: None,
        })
    }

    async fn collect(channel: ScriptedChannel) -> Vec<FeedEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel::<FeedEvent>();
        tokio::time::timeout(
            Duration::from_secs(5),
            run_block_feed(channel, "blocks:new_block".to_string(), tx),
        )
        .await
        .expect("feed timed out");

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_blocks_forwarded_then_disconnect_on_close() {
        let channel = ScriptedChannel {
            join: Ok(()),
            frames: VecDeque::from(vec![
                frame(
                    "blocks:new_block",
                    NEW_BLOCK_EVENT,
                    json!({"block_number": 11, "block_html": "<div>11</div>"}),
                ),
                frame("blocks:new_block", "presence_diff", json!({})),
                frame(
                    "transactions:new_transaction",
                    NEW_BLOCK_EVENT,
                    json!({"block_number": 99, "block_html": ""}),
                ),
                frame("blocks:new_block", NEW_BLOCK_EVENT, json!({"blockNumber": 12})),
                frame(
                    "blocks:new_block",
                    NEW_BLOCK_EVENT,
                    json!({"block_number": 12, "block_html": "<div>12</div>"}),
                ),
            ]),
        };

        let events = collect(channel).await;
        assert_eq!(
            events,
            vec![
                FeedEvent::NewBlock(Item::new(11, "<div>11</div>")),
                FeedEvent::NewBlock(Item::new(12, "<div>12</div>")),
                FeedEvent::Disconnected,
            ]
        );
    }

    #[tokio::test]
    async fn test_channel_error_stops_feed() {
        let channel = ScriptedChannel {
            join: Ok(()),
            frames: VecDeque::from(vec![
                frame("blocks:new_block", PHX_ERROR, json!({})),
                frame(
                    "blocks:new_block",
                    NEW_BLOCK_EVENT,
                    json!({"block_number": 1, "block_html": ""}),
                ),
            ]),
        };

        assert_eq!(collect(channel).await, vec![FeedEvent::Disconnected]);
    }

    #[tokio::test]
    async fn test_rejected_join_disconnects() {
        let channel = ScriptedChannel {
            join: Err(ExplorerError::ChannelError("unauthorized".to_string())),
            frames: VecDeque::new(),
        };

        assert_eq!(collect(channel).await, vec![FeedEvent::Disconnected]);
    }

    #[test]
    fn test_channel_message_wire_format() {
        let msg: ChannelMessage = serde_json::from_str(
            r#"{"topic":"blocks:new_block","event":"new_block","payload":{"block_number":3},"ref":null}"#,
        )
        .unwrap();
        assert_eq!(msg.reference, None);
        assert_eq!(msg.payload["block_number"], 3);

        let encoded = serde_json::to_value(ChannelMessage {
            topic: "phoenix".to_string(),
            event: "heartbeat".to_string(),
            payload: json!({}),
            reference: Some("4".to_string()),
        })
        .unwrap();
        assert_eq!(encoded["ref"], "4");
    }
}
