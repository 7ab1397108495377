//! Provider-queue consumer
//!
//! One durable queue per upstream provider. Message bodies are event JSON
//! documents; a body that does not match the event schema is logged and
//! dropped rather than redelivered, and a store failure drops the message
//! too. Delivery is at-most-once.

use std::sync::Arc;

use anyhow::Context;
use citypulse_core::config::BusConfig;
use citypulse_core::models::event::EventData;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicQosOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties};
use tracing::{error, info, warn};

use crate::pipeline::EventPipeline;

/// Queues the provider parsers publish into
pub const EVENTS_QUEUES: [&str; 4] = [
    "events.kudago",
    "events.timepad",
    "events.resonanse",
    "events.networkly",
];

/// Consumes every provider queue and feeds the pipeline
pub struct EventConsumer {
    connection: Connection,
    channel: Channel,
    pipeline: Arc<EventPipeline>,
}

impl EventConsumer {
    /// Connect, set QoS and declare the provider queues.
    pub async fn connect(config: &BusConfig, pipeline: Arc<EventPipeline>) -> anyhow::Result<Self> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default())
            .await
            .context("amqp connect failed")?;
        let channel = connection
            .create_channel()
            .await
            .context("amqp channel failed")?;

        channel
            .basic_qos(config.prefetch_count, BasicQosOptions::default())
            .await?;

        for queue in EVENTS_QUEUES {
            channel
                .queue_declare(
                    queue,
                    QueueDeclareOptions {
                        durable: true,
                        ..QueueDeclareOptions::default()
                    },
                    FieldTable::default(),
                )
                .await
                .with_context(|| format!("declare {} failed", queue))?;
        }

        info!("Provider queues declared, prefetch {}", config.prefetch_count);
        Ok(Self {
            connection,
            channel,
            pipeline,
        })
    }

    /// Consume all provider queues until the connection dies.
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut workers = Vec::new();
        for queue in EVENTS_QUEUES {
            workers.push(tokio::spawn(Self::consume_queue(
                self.channel.clone(),
                Arc::clone(&self.pipeline),
                queue,
            )));
        }

        for worker in workers {
            worker.await??;
        }
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
        pipeline: Arc<EventPipeline>,
        queue: &'static str,
    ) -> anyhow::Result<()> {
        let mut consumer = channel
            .basic_consume(
                queue,
                &format!("ingestion-{}", queue),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .with_context(|| format!("consume {} failed", queue))?;

        info!(queue, "Consuming");

        while let Some(delivery) = consumer.next().await {
            match delivery {
                Ok(delivery) => {
                    let pipeline = Arc::clone(&pipeline);
                    tokio::spawn(async move {
                        handle_delivery(pipeline, queue, delivery).await;
                    });
                }
                Err(e) => {
                    error!(queue, error = %e, "Consumer error");
                }
            }
        }

        warn!(queue, "Consumer stream ended");
        Ok(())
    }
}

/// Process one event message to completion, then acknowledge it.
async fn handle_delivery(pipeline: Arc<EventPipeline>, queue: &'static str, delivery: Delivery) {
    match serde_json::from_slice::<EventData>(&delivery.data) {
        Ok(event) => match pipeline.ingest(&event).await {
            Ok(outcome) => {
                tracing::debug!(queue, service_id = %event.service_id, ?outcome, "Event handled");
            }
            Err(e) => {
                error!(queue, service_id = %event.service_id, error = %e, "Ingest failed, dropping event");
            }
        },
        Err(e) => {
            warn!(queue, error = %e, "Malformed event payload, dropping");
        }
    }

    if let Err(e) = delivery.acker.ack(BasicAckOptions::default()).await {
        warn!(queue, error = %e, "Ack failed");
    }
}
