//! AMQP RPC surface
//!
//! The service consumes two durable request queues. Each request message
//! carries `reply_to` and `correlation_id`; the response body is published
//! to `reply_to` on the default exchange with the same correlation id.
//! Messages without `reply_to` or with malformed bodies are logged and
//! dropped without a reply. Channel prefetch bounds how many requests are
//! in flight at once; a delivery is acknowledged only after its task
//! finished with it.

use std::sync::Arc;

use anyhow::Context;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use citypulse_core::config::BusConfig;

use crate::service::RecommendationService;

/// Queue for "recommend events for this user" requests
pub const RECOMMENDATIONS_BY_USER_QUEUE: &str = "recommendations.requests.by_user";

/// Queue for "store this user's description" requests
pub const SET_USER_DESCRIPTION_QUEUE: &str = "resonanse_api.requests.set_user_description";

#[derive(Debug, Deserialize)]
struct RecommendByUserRequest {
    user_id: i64,
}

#[derive(Debug, Deserialize)]
struct SetUserDescriptionRequest {
    user_id: i64,
    description: String,
}

#[derive(Debug, Serialize)]
struct SetUserDescriptionResponse {
    status: bool,
}

#[derive(Debug, Clone, Copy)]
enum RpcQueue {
    RecommendByUser,
    SetUserDescription,
}

impl RpcQueue {
    fn name(&self) -> &'static str {
        match self {
            Self::RecommendByUser => RECOMMENDATIONS_BY_USER_QUEUE,
            Self::SetUserDescription => SET_USER_DESCRIPTION_QUEUE,
        }
    }
}

/// AMQP consumer serving the two RPC queues
pub struct RpcServer {
    connection: Connection,
    channel: Channel,
    service: Arc<RecommendationService>,
}

impl RpcServer {
    /// Connect, set QoS and declare the request queues.
    pub async fn connect(
        config: &BusConfig,
        service: Arc<RecommendationService>,
    ) -> anyhow::Result<Self> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default())
            .await
            .context("amqp connect failed")?;
        let channel = connection
            .create_channel()
            .await
            .context("amqp channel failed")?;

        // Prefetch bounds how many unacknowledged requests one worker
        // holds; too large a window depletes the store connection pools.
        channel
            .basic_qos(config.prefetch_count, BasicQosOptions::default())
            .await?;

        for queue in [RpcQueue::RecommendByUser, RpcQueue::SetUserDescription] {
            channel
                .queue_declare(
                    queue.name(),
                    QueueDeclareOptions {
                        durable: true,
                        ..QueueDeclareOptions::default()
                    },
                    FieldTable::default(),
                )
                .await
                .with_context(|| format!("declare {} failed", queue.name()))?;
        }

        info!("RPC queues declared, prefetch {}", config.prefetch_count);
        Ok(Self {
            connection,
            channel,
            service,
        })
    }

    /// Consume both queues until the connection dies.
    pub async fn run(&self) -> anyhow::Result<()> {
        let recommend = tokio::spawn(Self::consume_queue(
            self.channel.clone(),
            Arc::clone(&self.service),
            RpcQueue::RecommendByUser,
        ));
        let set_description = tokio::spawn(Self::consume_queue(
            self.channel.clone(),
            Arc::clone(&self.service),
            RpcQueue::SetUserDescription,
        ));

        let (a, b) = tokio::try_join!(recommend, set_description)?;
        a?;
        b?;
        Ok(())
    }

    /// Close the bus connection.
    pub async fn shutdown(&self) {
        if let Err(e) = self.connection.close(0, "shutdown").await {
            warn!(error = %e, "Error closing bus connection");
        }
    }

    async fn consume_queue(
        channel: Channel,
        service: Arc<RecommendationService>,
        queue: RpcQueue,
    ) -> anyhow::Result<()> {
        let mut consumer = channel
            .basic_consume(
                queue.name(),
                &format!("recsys-{}", queue.name()),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .with_context(|| format!("consume {} failed", queue.name()))?;

        info!(queue = queue.name(), "Consuming");

        while let Some(delivery) = consumer.next().await {
            match delivery {
                Ok(delivery) => {
                    let channel = channel.clone();
                    let service = Arc::clone(&service);
                    tokio::spawn(async move {
                        handle_delivery(channel, service, queue, delivery).await;
                    });
                }
                Err(e) => {
                    error!(queue = queue.name(), error = %e, "Consumer error");
                }
            }
        }

        warn!(queue = queue.name(), "Consumer stream ended");
        Ok(())
    }
}

/// Process one request message to completion, then acknowledge it.
///
/// Per-message errors never escape: a broken request is dropped after a
/// warning, and the message is acknowledged either way so it is not
/// redelivered forever.
async fn handle_delivery(
    channel: Channel,
    service: Arc<RecommendationService>,
    queue: RpcQueue,
    delivery: Delivery,
) {
    let reply_to = delivery.properties.reply_to().clone();
    let correlation_id = delivery.properties.correlation_id().clone();

    match reply_to {
        Some(reply_to) => {
            let response = match queue {
                RpcQueue::RecommendByUser => answer_recommend(&service, &delivery.data).await,
                RpcQueue::SetUserDescription => {
                    answer_set_description(&service, &delivery.data).await
                }
            };

            if let Some(payload) = response {
                let mut properties = BasicProperties::default();
                if let Some(correlation_id) = correlation_id {
                    properties = properties.with_correlation_id(correlation_id);
                }

                let published = channel
                    .basic_publish(
                        "",
                        reply_to.as_str(),
                        BasicPublishOptions::default(),
                        &payload,
                        properties,
                    )
                    .await;
                match published {
                    Ok(confirm) => {
                        if let Err(e) = confirm.await {
                            warn!(queue = queue.name(), error = %e, "Reply publish unconfirmed");
                        } else {
                            debug!(queue = queue.name(), reply_to = %reply_to, "Reply sent");
                        }
                    }
                    Err(e) => {
                        warn!(queue = queue.name(), error = %e, "Reply publish failed");
                    }
                }
            }
        }
        None => {
            warn!(queue = queue.name(), "Message without reply_to, dropping");
        }
    }

    if let Err(e) = delivery.acker.ack(BasicAckOptions::default()).await {
        warn!(queue = queue.name(), error = %e, "Ack failed");
    }
}

async fn answer_recommend(service: &RecommendationService, body: &[u8]) -> Option<Vec<u8>> {
    let request: RecommendByUserRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Malformed recommendation request, dropping");
            return None;
        }
    };

    let recommendation = service.recommend_for_user(request.user_id).await;
    match serde_json::to_vec(&recommendation) {
        Ok(payload) => Some(payload),
        Err(e) => {
            error!(error = %e, "Failed to serialize recommendation response");
            None
        }
    }
}

async fn answer_set_description(service: &RecommendationService, body: &[u8]) -> Option<Vec<u8>> {
    let request: SetUserDescriptionRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Malformed set-description request, dropping");
            return None;
        }
    };

    let status = service
        .set_user_description(request.user_id, &request.description)
        .await;
    match serde_json::to_vec(&SetUserDescriptionResponse { status }) {
        Ok(payload) => Some(payload),
        Err(e) => {
            error!(error = %e, "Failed to serialize set-description response");
            None
        }
    }
}
