//! RabbitMQ sessions over `lapin`.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use muninn_shared::{BrokerSettings, MuninnError, Result};

use crate::{BrokerConnector, ErrandSession, InboundDelivery, QueueTopology};

fn broker_err(context: &str, e: lapin::Error) -> MuninnError {
    MuninnError::Broker(format!("{context}: {e}"))
}

/// Consumer tag unique to this session.
fn consumer_tag() -> String {
    format!("muninn-{}", Uuid::now_v7())
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Opens AMQP sessions against a single broker.
pub struct AmqpConnector {
    settings: BrokerSettings,
    topology: QueueTopology,
}

impl AmqpConnector {
    pub fn new(settings: BrokerSettings, topology: QueueTopology) -> Self {
        Self { settings, topology }
    }
}

#[async_trait]
impl BrokerConnector for AmqpConnector {
    #[instrument(skip_all, fields(host = %self.settings.host, port = self.settings.port))]
    async fn connect(&self) -> Result<Box<dyn ErrandSession>> {
        let uri = self.settings.amqp_uri()?;
        let connection = Connection::connect(&uri, ConnectionProperties::default())
            .await
            .map_err(|e| broker_err("connect", e))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| broker_err("create channel", e))?;

        channel
            .basic_qos(self.topology.prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| broker_err("basic_qos", e))?;

        for queue in [&self.topology.reply_queue, &self.topology.inbound_queue] {
            channel
                .queue_declare(queue, QueueDeclareOptions::default(), FieldTable::default())
                .await
                .map_err(|e| broker_err(&format!("declare {queue}"), e))?;
        }

        let tag = consumer_tag();
        let consumer = channel
            .basic_consume(
                &self.topology.inbound_queue,
                &tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| broker_err("basic_consume", e))?;

        info!(
            inbound = %self.topology.inbound_queue,
            reply = %self.topology.reply_queue,
            prefetch = self.topology.prefetch,
            consumer_tag = %tag,
            "broker session established"
        );

        Ok(Box::new(AmqpSession {
            connection,
            channel,
            consumer,
            reply_queue: self.topology.reply_queue.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

struct AmqpSession {
    connection: Connection,
    channel: Channel,
    consumer: Consumer,
    reply_queue: String,
}

#[async_trait]
impl ErrandSession for AmqpSession {
    async fn next_delivery(&mut self) -> Result<Option<InboundDelivery>> {
        match self.consumer.next().await {
            Some(Ok(delivery)) => Ok(Some(InboundDelivery {
                delivery_tag: delivery.delivery_tag,
                body: delivery.data,
            })),
            Some(Err(e)) => Err(broker_err("consume", e)),
            None => Ok(None),
        }
    }

    async fn publish(&mut self, body: &[u8]) -> Result<()> {
        self.channel
            .basic_publish(
                "",
                &self.reply_queue,
                BasicPublishOptions::default(),
                body,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await
            .map_err(|e| broker_err("publish", e))?
            .await
            .map_err(|e| broker_err("publish confirm", e))?;
        Ok(())
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<()> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| broker_err("ack", e))
    }

    async fn close(&mut self) {
        if let Err(e) = self.connection.close(200, "muninn reconnecting").await {
            debug!(error = %e, "connection close failed");
        }
    }
}
