use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, RwLock};
use wassist_schema::BusMessage;

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum Topic {
    MessageAccepted,
    ReplyReady,
    DeliveryDeferred,
    TaskFailed,
    MemoryWriteRequested,
}

impl Topic {
    pub fn from_message(msg: &BusMessage) -> Self {
        match msg {
            BusMessage::MessageAccepted { .. } => Topic::MessageAccepted,
            BusMessage::ReplyReady { .. } => Topic::ReplyReady,
            BusMessage::DeliveryDeferred { .. } => Topic::DeliveryDeferred,
            BusMessage::TaskFailed { .. } => Topic::TaskFailed,
            BusMessage::MemoryWriteRequested { .. } => Topic::MemoryWriteRequested,
        }
    }
}

type Subscriber = mpsc::Sender<BusMessage>;
type SubscriberMap = Arc<RwLock<HashMap<Topic, Vec<Subscriber>>>>;

pub struct EventBus {
    subscribers: SubscriberMap,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    pub async fn subscribe(&self, topic: Topic) -> mpsc::Receiver<BusMessage> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut subs = self.subscribers.write().await;
        subs.entry(topic).or_default().push(tx);
        rx
    }

    pub async fn publish(&self, msg: BusMessage) -> Result<()> {
        fan_out(&self.subscribers, msg).await
    }

    pub fn publisher(&self) -> BusPublisher {
        BusPublisher {
            subscribers: self.subscribers.clone(),
        }
    }
}

/// Cloneable publish-only handle to an [`EventBus`].
#[derive(Clone)]
pub struct BusPublisher {
    subscribers: SubscriberMap,
}

impl BusPublisher {
    pub async fn publish(&self, msg: BusMessage) -> Result<()> {
        fan_out(&self.subscribers, msg).await
    }
}

// Never blocks the publisher: a full or closed subscriber loses the message.
async fn fan_out(subscribers: &SubscriberMap, msg: BusMessage) -> Result<()> {
    let topic = Topic::from_message(&msg);
    let subs = subscribers.read().await;
    if let Some(subscribers) = subs.get(&topic) {
        for tx in subscribers {
            if let Err(err) = tx.try_send(msg.clone()) {
                tracing::warn!(topic = ?topic, "bus message dropped: {err}");
            }
        }
    }
    Ok(())
}
