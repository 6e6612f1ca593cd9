// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the Peril Pub/Sub Layer
//!
//! This module provides the error type shared by every operation of the crate.
//! Most variants describe a broker (transport/protocol) failure at a specific
//! step; the remaining ones cover payload encoding, payload decoding and
//! conflicting queue declarations.

use thiserror::Error;

/// Represents errors that can occur while declaring topology, publishing or
/// consuming messages.
///
/// Every variant except [`AmqpError::EncodingError`], [`AmqpError::MalformedPayload`],
/// [`AmqpError::TopologyConflict`] and [`AmqpError::ConfigError`] is a broker error,
/// see [`AmqpError::is_broker_error`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmqpError {
    /// Error establishing a connection to the RabbitMQ server
    #[error("failure to connect")]
    ConnectionError,

    /// Error creating a channel from an established connection
    #[error("failure to create a channel")]
    ChannelError,

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueueError(String),

    /// Error binding an exchange to a queue
    #[error("failure to binding exchange `{0}` to queue `{1}`")]
    BindingExchangeToQueueError(String, String),

    /// Error publishing a message
    #[error("failure to publish to `{0}`")]
    PublishingError(String),

    /// Error acknowledging a message
    #[error("failure to ack message")]
    AckMessageError,

    /// Error negative-acknowledging a message
    #[error("failure to nack message (requeue: {0})")]
    NackMessageError(bool),

    /// Error configuring Quality of Service parameters
    #[error("failure to configure qos `{0}`")]
    QoSDeclarationError(String),

    /// Error declaring a consumer
    #[error("failure to declare consumer on queue `{0}`")]
    ConsumerDeclarationError(String),

    /// Error reported by the delivery stream of a consumer
    #[error("failure to consume message `{0}`")]
    ConsumerError(String),

    /// The value could not be serialized; nothing was sent to the broker
    #[error("failure to encode payload: {0}")]
    EncodingError(String),

    /// The delivery bytes could not be decoded into the expected type
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A queue with the same name already exists with different properties
    #[error("queue `{0}` already exists with incompatible properties")]
    TopologyConflict(String),

    /// Configuration could not be loaded
    #[error("failure to load configs: {0}")]
    ConfigError(String),
}

impl AmqpError {
    /// Returns true when the error comes from the broker transport or protocol.
    pub fn is_broker_error(&self) -> bool {
        !matches!(
            self,
            AmqpError::EncodingError(_)
                | AmqpError::MalformedPayload(_)
                | AmqpError::TopologyConflict(_)
                | AmqpError::ConfigError(_)
        )
    }
}
