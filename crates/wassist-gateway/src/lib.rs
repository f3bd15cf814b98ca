use std::sync::Arc;

use wassist_bus::BusPublisher;
use wassist_core::connectors::Messenger;
use wassist_core::{replies, DeliveryError, Dispatcher};
use wassist_schema::*;

/// Hands webhook messages to the dispatcher and delivers the replies.
///
/// The webhook is answered before any work happens. A reply that could not
/// be delivered because of provider throttling is kept and returned as the
/// body of the sender's next webhook call instead.
pub struct Gateway {
    dispatcher: Arc<Dispatcher>,
    messenger: Arc<dyn Messenger>,
    bus: BusPublisher,
}

impl Gateway {
    pub fn new(dispatcher: Arc<Dispatcher>, messenger: Arc<dyn Messenger>, bus: BusPublisher) -> Self {
        Self {
            dispatcher,
            messenger,
            bus,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Returns the immediate webhook response body: a delayed reply for the
    /// sender if one is waiting, otherwise empty while the message is
    /// processed in the background.
    pub async fn accept(self: &Arc<Self>, inbound: InboundMessage) -> String {
        if let Some(delayed) = self
            .dispatcher
            .state()
            .take_delayed(&inbound.sender)
            .await
        {
            tracing::info!(sender = %inbound.sender, "returning delayed reply in webhook response");
            return delayed;
        }

        let _ = self
            .bus
            .publish(BusMessage::MessageAccepted {
                trace_id: inbound.trace_id,
                sender: inbound.sender.clone(),
            })
            .await;

        let gateway = Arc::clone(self);
        tokio::spawn(async move {
            let _ = gateway.process(inbound).await;
        });
        String::new()
    }

    /// Dispatches one message and delivers the reply.
    pub async fn process(&self, inbound: InboundMessage) -> Result<(), DeliveryError> {
        let dispatcher = Arc::clone(&self.dispatcher);
        let message = inbound.clone();
        let outbound =
            match tokio::spawn(async move { dispatcher.handle_inbound(&message).await }).await {
                Ok(outbound) => outbound,
                Err(err) => {
                    tracing::error!(trace_id = %inbound.trace_id, error = %err, "dispatch aborted");
                    let _ = self
                        .bus
                        .publish(BusMessage::TaskFailed {
                            trace_id: inbound.trace_id,
                            error: err.to_string(),
                        })
                        .await;
                    OutboundMessage::reply_to(&inbound, replies::CATCH_ALL)
                }
            };
        self.deliver(outbound).await
    }

    pub async fn deliver(&self, outbound: OutboundMessage) -> Result<(), DeliveryError> {
        match self
            .messenger
            .send(&outbound.recipient, &outbound.text)
            .await
        {
            Ok(()) => {
                let _ = self.bus.publish(BusMessage::ReplyReady { outbound }).await;
                Ok(())
            }
            Err(err @ DeliveryError::Throttled(_)) => {
                tracing::warn!(
                    recipient = %outbound.recipient,
                    error = %err,
                    "delivery throttled; reply kept for the next webhook call"
                );
                self.dispatcher
                    .state()
                    .set_delayed(&outbound.recipient, outbound.text.clone())
                    .await;
                let _ = self
                    .bus
                    .publish(BusMessage::DeliveryDeferred {
                        trace_id: outbound.trace_id,
                        sender: outbound.recipient,
                        text: outbound.text,
                    })
                    .await;
                Err(err)
            }
            Err(err) => {
                tracing::error!(recipient = %outbound.recipient, error = %err, "delivery failed");
                let _ = self
                    .bus
                    .publish(BusMessage::TaskFailed {
                        trace_id: outbound.trace_id,
                        error: err.to_string(),
                    })
                    .await;
                Err(err)
            }
        }
    }
}
