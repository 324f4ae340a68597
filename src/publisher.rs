//! Publishing sink and the grip force topic.
//!
//! [`PublishSink`] is the only thing the controller knows about output. The
//! shipped implementation, [`TopicPublisher`], is a named topic over a
//! `tokio::sync::broadcast` channel whose capacity is the configured
//! `queue_size`:
//!
//! - publishing never blocks the acquisition loop
//! - publishing with no subscriber drops the message silently
//! - a subscriber that falls more than `queue_size` messages behind loses the
//!   oldest ones and is told how many it missed
//!
//! [`echo`] is a subscriber that writes every message as a JSON line, the
//! equivalent of echoing the topic from a shell.

use crate::data::GripForce;
use crate::error::PublishError;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;

/// Destination for force samples.
pub trait PublishSink: Send + Sync {
    /// Topic name messages are delivered on.
    fn topic(&self) -> &str;

    /// Hand one message to the sink. Must not block on slow subscribers.
    fn publish(&self, message: GripForce) -> Result<(), PublishError>;
}

/// Named topic with bounded, oldest-drop delivery.
#[derive(Debug)]
pub struct TopicPublisher {
    topic: String,
    queue_size: usize,
    sender: broadcast::Sender<GripForce>,
}

impl TopicPublisher {
    /// Create a topic buffering at most `queue_size` messages per subscriber.
    pub fn new(topic: impl Into<String>, queue_size: usize) -> Result<Self, PublishError> {
        if queue_size == 0 {
            return Err(PublishError::InvalidQueueSize(queue_size));
        }
        let (sender, _) = broadcast::channel(queue_size);
        Ok(Self {
            topic: topic.into(),
            queue_size,
            sender,
        })
    }

    /// Attach a new subscriber. It sees messages published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<GripForce> {
        self.sender.subscribe()
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Backpressure bound.
    pub fn queue_size(&self) -> usize {
        self.queue_size
    }
}

impl PublishSink for TopicPublisher {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn publish(&self, message: GripForce) -> Result<(), PublishError> {
        let seq = message.seq;
        if self.sender.send(message).is_err() {
            tracing::trace!(topic = %self.topic, seq, "No subscribers; message dropped");
        }
        Ok(())
    }
}

/// Write every message of `receiver` to `out` as one JSON object per line.
///
/// Returns the number of messages written once the topic closes. Messages
/// lost to lag are reported with a warning and skipped.
pub async fn echo<W>(
    mut receiver: broadcast::Receiver<GripForce>,
    mut out: W,
) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    loop {
        match receiver.recv().await {
            Ok(message) => {
                let mut line = serde_json::to_vec(&message)?;
                line.push(b'\n');
                out.write_all(&line).await?;
                out.flush().await?;
                written += 1;
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Echo subscriber fell behind; oldest messages dropped");
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(written),
        }
    }
}
