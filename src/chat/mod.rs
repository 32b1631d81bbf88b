//! The chat-facing edge: what the bot needs from a transport, and what a
//! transport needs from the bot.

pub mod irc;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::MonitorError;

/// Outbound capability handed to the poll cycle.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), MonitorError>;
}

/// Callbacks a transport drives. Replies returned from
/// `on_inbound_message` go back to wherever the message came from.
#[async_trait]
pub trait ChatHandler: Send + Sync {
    async fn on_connected(&self);
    async fn on_disconnected(&self);
    async fn on_inbound_message(&self, user: &str, channel: &str, text: &str) -> Option<String>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outbound {
    pub target: String,
    pub text: String,
}

/// Queues notifications for the configured channel. Sending never waits on
/// the connection: the text is queued, or refused when the link is down or
/// the queue is full.
#[derive(Clone)]
pub struct ChannelNotifier {
    channel: String,
    tx: mpsc::Sender<Outbound>,
    connected: Arc<AtomicBool>,
}

impl ChannelNotifier {
    pub fn new(channel: impl Into<String>, tx: mpsc::Sender<Outbound>, connected: Arc<AtomicBool>) -> Self {
        Self { channel: channel.into(), tx, connected }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn send(&self, text: &str) -> Result<(), MonitorError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(MonitorError::Send("not connected".into()));
        }
        let msg = Outbound { target: self.channel.clone(), text: text.to_string() };
        self.tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => MonitorError::Send("outbound queue full".into()),
            TrySendError::Closed(_) => MonitorError::Send("transport gone".into()),
        })
    }
}

#[cfg(test)]
pub use recording::RecordingNotifier;
