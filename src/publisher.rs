// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Publisher
//!
//! This module provides functionality for publishing typed values to RabbitMQ
//! exchanges. Values are encoded with a caller-chosen [`Encoder`], tagged with
//! the encoder's content type and sent without waiting for a broker
//! confirmation. The current OpenTelemetry context travels in the message
//! headers.

use crate::{
    codec::{BincodeCodec, Encoder, JsonCodec},
    errors::AmqpError,
    otel,
};
use chrono::Utc;
use lapin::{
    options::BasicPublishOptions,
    types::{AMQPValue, FieldTable, ShortString},
    BasicProperties, Channel,
};
use opentelemetry::Context;
use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, error};
use uuid::Uuid;

/// Publishes encoded messages on a single channel.
///
/// The channel should have one logical owner at a time; share the publisher
/// through its `Arc` rather than opening competing publishers on the same channel.
pub struct RabbitMQPublisher {
    channel: Arc<Channel>,
}

impl RabbitMQPublisher {
    /// Creates a new RabbitMQ publisher.
    ///
    /// # Parameters
    /// * `channel` - A channel to the RabbitMQ server
    ///
    /// # Returns
    /// An Arc-wrapped RabbitMQPublisher instance for thread-safe sharing
    pub fn new(channel: Arc<Channel>) -> Arc<RabbitMQPublisher> {
        Arc::new(RabbitMQPublisher { channel })
    }

    /// Encodes `value` with `codec` and publishes it to `exchange` with `key`.
    ///
    /// The message is neither mandatory nor immediate: when no queue matches,
    /// the broker drops it silently. Nothing is retried here.
    ///
    /// # Returns
    /// * `AmqpError::EncodingError` when `value` cannot be encoded; the broker is not contacted
    /// * `AmqpError::PublishingError` when the publish call fails, e.g. on a closed channel
    pub async fn publish<T, E>(
        &self,
        exchange: &str,
        key: &str,
        value: &T,
        codec: &E,
    ) -> Result<(), AmqpError>
    where
        T: ?Sized,
        E: Encoder<T>,
    {
        let (payload, properties) = build_message(value, codec, &Context::current())?;

        match self
            .channel
            .basic_publish(
                exchange,
                key,
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                &payload,
                properties,
            )
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    exchange = exchange,
                    key = key,
                    "error publishing message"
                );
                Err(AmqpError::PublishingError(format!("{exchange}/{key}")))
            }
            _ => {
                debug!(exchange = exchange, key = key, "message published");
                Ok(())
            }
        }
    }

    /// Publishes `value` as JSON.
    pub async fn publish_json<T>(&self, exchange: &str, key: &str, value: &T) -> Result<(), AmqpError>
    where
        T: Serialize + ?Sized,
    {
        self.publish(exchange, key, value, &JsonCodec).await
    }

    /// Publishes `value` with the compact binary codec.
    pub async fn publish_bincode<T>(
        &self,
        exchange: &str,
        key: &str,
        value: &T,
    ) -> Result<(), AmqpError>
    where
        T: Serialize + ?Sized,
    {
        self.publish(exchange, key, value, &BincodeCodec).await
    }
}

/// Encodes `value` and builds the properties it is published with.
pub(crate) fn build_message<T, E>(
    value: &T,
    codec: &E,
    ctx: &Context,
) -> Result<(Vec<u8>, BasicProperties), AmqpError>
where
    T: ?Sized,
    E: Encoder<T>,
{
    let payload = codec.encode(value).map_err(|err| {
        error!(error = err.to_string(), "error encoding message");
        err
    })?;

    let mut headers = BTreeMap::<ShortString, AMQPValue>::default();
    otel::inject_context(ctx, &mut headers);

    let properties = BasicProperties::default()
        .with_content_type(ShortString::from(codec.content_type()))
        .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
        .with_timestamp(Utc::now().timestamp().max(0) as u64)
        .with_headers(FieldTable::from(headers));

    Ok((payload, properties))
}
