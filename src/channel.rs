// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Channel Management
//!
//! This module handles the creation of AMQP connections and channels.
//! The connection is an explicit resource: callers create it at startup, hand
//! it to the topology manager and dispatcher, and close it at shutdown.

use crate::{configs::Configs, errors::AmqpError};
use lapin::{types::LongString, Channel, Connection, ConnectionProperties};
use std::sync::Arc;
use tracing::{debug, error};

/// Opens a connection to the broker described by `cfg`.
///
/// The connection is named after the application so it can be told apart in
/// the broker's management UI.
///
/// # Parameters
/// * `cfg` - Configuration containing RabbitMQ connection details
///
/// # Returns
/// The shared connection, or `AmqpError::ConnectionError` on failure.
pub async fn new_amqp_connection(cfg: &Configs) -> Result<Arc<Connection>, AmqpError> {
    debug!("creating amqp connection...");
    let options = ConnectionProperties::default()
        .with_connection_name(LongString::from(cfg.app.name.clone()));

    match Connection::connect(&cfg.rabbitmq.uri(), options).await {
        Ok(conn) => {
            debug!("amqp connected");
            Ok(Arc::new(conn))
        }
        Err(err) => {
            error!(error = err.to_string(), "failure to connect");
            Err(AmqpError::ConnectionError)
        }
    }
}

/// Opens a fresh channel on an existing connection.
pub async fn open_channel(conn: &Connection) -> Result<Arc<Channel>, AmqpError> {
    debug!("creating amqp channel...");
    match conn.create_channel().await {
        Ok(c) => {
            debug!(channel_id = c.id(), "channel created");
            Ok(Arc::new(c))
        }
        Err(err) => {
            error!(error = err.to_string(), "error to create the channel");
            Err(AmqpError::ChannelError)
        }
    }
}

/// Creates a connection and one channel on it.
///
/// The returned channel is meant for publishing by a single logical owner.
///
/// # Example
/// ```no_run
/// # async fn run(cfg: peril_pubsub::configs::Configs) -> Result<(), peril_pubsub::errors::AmqpError> {
/// let (conn, channel) = peril_pubsub::channel::new_amqp_channel(&cfg).await?;
/// # Ok(())
/// # }
/// ```
pub async fn new_amqp_channel(
    cfg: &Configs,
) -> Result<(Arc<Connection>, Arc<Channel>), AmqpError> {
    let conn = new_amqp_connection(cfg).await?;
    let channel = open_channel(&conn).await?;
    Ok((conn, channel))
}

/// Closes the connection with a normal reply code, logging any failure.
pub async fn close_connection(conn: &Connection) {
    if let Err(err) = conn.close(200, "bye").await {
        error!(error = err.to_string(), "error closing the connection");
    }
}
