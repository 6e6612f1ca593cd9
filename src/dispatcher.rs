// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Dispatcher
//!
//! This module turns broker deliveries into typed handler invocations.
//! Every [`RabbitMQDispatcher::subscribe`] call declares and binds its queue on
//! a dedicated channel, limits that channel's unacknowledged deliveries to the
//! configured prefetch count, opens a manual-ack consumer and spawns one
//! background task running the consumption loop.
//!
//! Subscriptions are independent: a slow handler only delays its own queue.

use crate::{
    codec::{BincodeCodec, Decoder, JsonCodec},
    configs::ConsumerConfigs,
    consumer::{consume_loop, ConsumerExit, InboundMessage},
    errors::AmqpError,
    handler::ConsumerHandler,
    queue::QueueType,
    topology::declare_and_bind,
};
use futures_util::StreamExt;
use lapin::{
    options::{BasicConsumeOptions, BasicQosOptions},
    types::FieldTable,
    Connection,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Reply code used when a consumer closes its own channel.
const CHANNEL_CLOSE_REPLY_CODE: u16 = 200;

/// Subscribes typed handlers to queues on a shared connection.
pub struct RabbitMQDispatcher {
    conn: Arc<Connection>,
    cfg: ConsumerConfigs,
}

impl RabbitMQDispatcher {
    /// Creates a new RabbitMQ dispatcher.
    ///
    /// # Parameters
    /// * `conn` - The connection every subscription opens its channel on
    /// * `cfg` - Prefetch count and ack failure threshold for every subscription
    pub fn new(conn: Arc<Connection>, cfg: ConsumerConfigs) -> Self {
        RabbitMQDispatcher { conn, cfg }
    }

    /// Subscribes `handler` to `queue_name`, bound to `exchange` with `key`.
    ///
    /// Setup runs before this returns: declare and bind, QoS, consumer
    /// creation. Any failure there is returned unchanged and no task is
    /// started. On success the consumption loop runs in the background until
    /// the channel or connection closes; the returned handle resolves with the
    /// reason it stopped, and dropping it detaches the loop.
    ///
    /// # Returns
    /// * `AmqpError::TopologyConflict` when the queue exists with other properties
    /// * `AmqpError::QoSDeclarationError` when the prefetch limit cannot be set
    /// * `AmqpError::ConsumerDeclarationError` when the consumer cannot be created
    /// * any other broker error raised while declaring or binding
    pub async fn subscribe<T, D, H>(
        &self,
        exchange: &str,
        queue_name: &str,
        key: &str,
        queue_type: QueueType,
        codec: D,
        handler: H,
    ) -> Result<JoinHandle<ConsumerExit>, AmqpError>
    where
        T: Send + 'static,
        D: Decoder<T> + 'static,
        H: ConsumerHandler<T> + 'static,
    {
        let (channel, queue) =
            declare_and_bind(&self.conn, exchange, queue_name, key, queue_type).await?;

        if let Err(err) = channel
            .basic_qos(self.cfg.prefetch_count, BasicQosOptions { global: false })
            .await
        {
            error!(error = err.to_string(), queue = queue_name, "error to configure qos");
            return Err(AmqpError::QoSDeclarationError(queue_name.to_owned()));
        }

        let consumer_tag = format!("{}.{}", queue.name().as_str(), Uuid::new_v4());
        let consumer = match channel
            .basic_consume(
                queue.name().as_str(),
                &consumer_tag,
                BasicConsumeOptions {
                    no_local: false,
                    no_ack: false,
                    exclusive: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), queue = queue_name, "error to create the consumer");
                Err(AmqpError::ConsumerDeclarationError(queue_name.to_owned()))
            }
            Ok(c) => Ok(c),
        }?;

        info!(
            exchange,
            queue = queue_name,
            key,
            prefetch = self.cfg.prefetch_count,
            "subscribed"
        );

        let deliveries = Box::pin(consumer.map(|result| {
            result
                .map(InboundMessage::from)
                .map_err(|err| AmqpError::ConsumerError(err.to_string()))
        }));
        let queue_name = queue_name.to_owned();
        let max_ack_failures = self.cfg.max_consecutive_ack_failures;

        Ok(tokio::spawn(async move {
            let exit =
                consume_loop::<_, _, T, D, H>(&queue_name, deliveries, &codec, &handler, max_ack_failures)
                    .await;

            if let ConsumerExit::AckFailuresExceeded(_) = exit {
                // unresolved deliveries go back to the queue once the channel is gone
                if let Err(err) = channel
                    .close(CHANNEL_CLOSE_REPLY_CODE, "too many ack failures")
                    .await
                {
                    error!(error = err.to_string(), queue = queue_name.as_str(), "error closing channel");
                }
            }

            debug!(queue = queue_name.as_str(), ?exit, "consumer stopped");
            exit
        }))
    }

    /// Subscribes a handler to JSON encoded messages.
    pub async fn subscribe_json<T, H>(
        &self,
        exchange: &str,
        queue_name: &str,
        key: &str,
        queue_type: QueueType,
        handler: H,
    ) -> Result<JoinHandle<ConsumerExit>, AmqpError>
    where
        T: DeserializeOwned + Send + 'static,
        H: ConsumerHandler<T> + 'static,
    {
        self.subscribe::<T, JsonCodec, H>(exchange, queue_name, key, queue_type, JsonCodec, handler)
            .await
    }

    /// Subscribes a handler to messages in the compact binary encoding.
    pub async fn subscribe_bincode<T, H>(
        &self,
        exchange: &str,
        queue_name: &str,
        key: &str,
        queue_type: QueueType,
        handler: H,
    ) -> Result<JoinHandle<ConsumerExit>, AmqpError>
    where
        T: DeserializeOwned + Send + 'static,
        H: ConsumerHandler<T> + 'static,
    {
        self.subscribe::<T, BincodeCodec, H>(exchange, queue_name, key, queue_type, BincodeCodec, handler)
            .await
    }
}
