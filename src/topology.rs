// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Topology Management
//!
//! This module provides functionality for declaring RabbitMQ topology components.
//! The topology includes exchanges, queues, and the bindings between them.
//!
//! The main components are:
//! - `Topology` trait: Interface for installing a whole topology at once
//! - `AmqpTopology`: Implementation of the Topology trait for RabbitMQ
//! - `declare_and_bind`: Per-subscription declaration on a fresh channel
//! - `AMQP_HEADERS_DEAD_LETTER_EXCHANGE`: the queue argument naming the dead-letter exchange

use crate::{
    channel::open_channel,
    errors::AmqpError,
    exchange::ExchangeDefinition,
    queue::{QueueBinding, QueueDefinition, QueueType},
    routing::{
        EXCHANGE_PERIL_DEAD_LETTER, EXCHANGE_PERIL_DIRECT, EXCHANGE_PERIL_TOPIC, GAME_LOG_SLUG,
        QUEUE_PERIL_DEAD_LETTER,
    },
};
use async_trait::async_trait;
use lapin::{
    options::QueueBindOptions,
    protocol::{AMQPErrorKind, AMQPSoftError},
    types::{AMQPValue, FieldTable, LongString, ShortString},
    Channel, Connection, Queue,
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tracing::{debug, error};

/// Constant for the argument used to specify a dead letter exchange
pub const AMQP_HEADERS_DEAD_LETTER_EXCHANGE: &str = "x-dead-letter-exchange";

/// Trait defining the interface for topology management.
///
/// This trait provides methods for registering exchanges, queues, and bindings,
/// as well as installing the topology to the RabbitMQ server.
#[async_trait]
pub trait Topology<'tp> {
    /// Adds an exchange definition to the topology.
    fn exchange(self, def: &'tp ExchangeDefinition<'tp>) -> Self;

    /// Adds a queue definition to the topology.
    fn queue(self, def: &'tp QueueDefinition) -> Self;

    /// Adds a queue-to-exchange binding to the topology.
    fn queue_binding(self, binding: &'tp QueueBinding<'tp>) -> Self;

    /// Installs the topology to the RabbitMQ server.
    ///
    /// This creates all the exchanges and queues, and sets up all the bindings.
    async fn install(&self) -> Result<(), AmqpError>;
}

/// RabbitMQ implementation of the Topology trait.
///
/// This struct maintains collections of exchanges, queues, and bindings,
/// and provides methods to install them to a RabbitMQ server.
pub struct AmqpTopology<'tp> {
    channel: Arc<Channel>,
    pub(crate) queues: HashMap<&'tp str, &'tp QueueDefinition>,
    pub(crate) queues_binding: Vec<&'tp QueueBinding<'tp>>,
    pub(crate) exchanges: Vec<&'tp ExchangeDefinition<'tp>>,
}

impl<'tp> AmqpTopology<'tp> {
    /// Creates a new AmqpTopology instance.
    ///
    /// # Parameters
    /// * `channel` - A channel to the RabbitMQ server
    pub fn new(channel: Arc<Channel>) -> AmqpTopology<'tp> {
        AmqpTopology {
            channel,
            queues: HashMap::default(),
            queues_binding: vec![],
            exchanges: vec![],
        }
    }
}

#[async_trait]
impl<'tp> Topology<'tp> for AmqpTopology<'tp> {
    fn exchange(mut self, def: &'tp ExchangeDefinition<'tp>) -> Self {
        self.exchanges.push(def);
        self
    }

    fn queue(mut self, def: &'tp QueueDefinition) -> Self {
        self.queues.insert(&def.name, def);
        self
    }

    fn queue_binding(mut self, binding: &'tp QueueBinding<'tp>) -> Self {
        self.queues_binding.push(binding);
        self
    }

    /// Installs the topology to the RabbitMQ server.
    ///
    /// This method performs the following operations in order:
    /// 1. Creates all exchanges
    /// 2. Creates all queues
    /// 3. Sets up queue-to-exchange bindings
    ///
    /// # Returns
    /// Ok(()) on success or AmqpError on the first failing step
    async fn install(&self) -> Result<(), AmqpError> {
        for exch in &self.exchanges {
            declare_exchange(&self.channel, exch).await?;
        }

        for def in self.queues.values() {
            declare_queue(&self.channel, def).await?;
        }

        for binding in &self.queues_binding {
            bind_queue(&self.channel, binding).await?;
        }

        Ok(())
    }
}

/// Declares the fixed Peril topology.
///
/// - `peril_direct`: durable direct exchange
/// - `peril_topic`: durable topic exchange
/// - `peril_dlx`: durable fanout dead-letter exchange, feeding the durable `peril_dlq` queue
/// - `game_logs`: shared durable queue bound to `peril_topic` with `game_logs.*`
pub async fn install_peril_topology(channel: Arc<Channel>) -> Result<(), AmqpError> {
    let direct = ExchangeDefinition::new(EXCHANGE_PERIL_DIRECT).direct().durable();
    let topic = ExchangeDefinition::new(EXCHANGE_PERIL_TOPIC).topic().durable();
    let dead_letter = ExchangeDefinition::new(EXCHANGE_PERIL_DEAD_LETTER)
        .fanout()
        .durable();

    let dlq = QueueDefinition::new(QUEUE_PERIL_DEAD_LETTER).durable();
    let dlq_binding = QueueBinding::new(QUEUE_PERIL_DEAD_LETTER).exchange(EXCHANGE_PERIL_DEAD_LETTER);

    let game_logs = QueueDefinition::for_subscription(GAME_LOG_SLUG, QueueType::Durable);
    let game_logs_pattern = crate::routing::any_user_pattern(GAME_LOG_SLUG);
    let game_logs_binding = QueueBinding::new(GAME_LOG_SLUG)
        .exchange(EXCHANGE_PERIL_TOPIC)
        .routing_key(&game_logs_pattern);

    AmqpTopology::new(channel)
        .exchange(&direct)
        .exchange(&topic)
        .exchange(&dead_letter)
        .queue(&dlq)
        .queue(&game_logs)
        .queue_binding(&dlq_binding)
        .queue_binding(&game_logs_binding)
        .install()
        .await
}

/// Declares `queue_name` under `queue_type` on a new channel and binds it to
/// `exchange` with `key`.
///
/// Each call opens its own channel, which is returned together with the
/// broker's queue metadata. Re-declaring an existing queue with the same
/// properties succeeds; different properties fail with
/// `AmqpError::TopologyConflict`. Nothing is cleaned up on failure, the caller
/// is expected to drop the connection.
pub async fn declare_and_bind(
    conn: &Connection,
    exchange: &str,
    queue_name: &str,
    key: &str,
    queue_type: QueueType,
) -> Result<(Arc<Channel>, Queue), AmqpError> {
    let channel = open_channel(conn).await?;

    let def = QueueDefinition::for_subscription(queue_name, queue_type);
    let queue = declare_queue(&channel, &def).await?;

    let binding = QueueBinding::new(queue_name)
        .exchange(exchange)
        .routing_key(key);
    bind_queue(&channel, &binding).await?;

    Ok((channel, queue))
}

/// Declares one exchange.
pub(crate) async fn declare_exchange(
    channel: &Channel,
    exch: &ExchangeDefinition<'_>,
) -> Result<(), AmqpError> {
    debug!("creating exchange: {}", exch.name);

    match channel
        .exchange_declare(
            exch.name,
            exch.kind.into(),
            exch.declare_options(),
            FieldTable::default(),
        )
        .await
    {
        Err(err) => {
            error!(
                error = err.to_string(),
                name = exch.name,
                "error to declare the exchange"
            );
            Err(AmqpError::DeclareExchangeError(exch.name.to_owned()))
        }
        _ => {
            debug!("exchange: {} was created", exch.name);
            Ok(())
        }
    }
}

/// Declares one queue with its arguments.
pub(crate) async fn declare_queue(
    channel: &Channel,
    def: &QueueDefinition,
) -> Result<Queue, AmqpError> {
    debug!("creating queue: {}", def.name);

    match channel
        .queue_declare(&def.name, def.declare_options(), queue_arguments(def))
        .await
    {
        Err(err) => {
            error!(
                error = err.to_string(),
                name = def.name.as_str(),
                "error to declare the queue"
            );
            Err(declare_error(&err, &def.name))
        }
        Ok(queue) => {
            debug!(
                messages = queue.message_count(),
                consumers = queue.consumer_count(),
                "queue: {} was created",
                def.name
            );
            Ok(queue)
        }
    }
}

/// Binds a queue to an exchange.
pub(crate) async fn bind_queue(channel: &Channel, binding: &QueueBinding<'_>) -> Result<(), AmqpError> {
    debug!(
        "binding queue: {} to the exchange: {} with the key: {}",
        binding.queue_name, binding.exchange_name, binding.routing_key
    );

    match channel
        .queue_bind(
            binding.queue_name,
            binding.exchange_name,
            binding.routing_key,
            QueueBindOptions { nowait: false },
            FieldTable::default(),
        )
        .await
    {
        Err(err) => {
            error!(error = err.to_string(), "error to bind queue to exchange");

            Err(AmqpError::BindingExchangeToQueueError(
                binding.exchange_name.to_owned(),
                binding.queue_name.to_owned(),
            ))
        }
        _ => Ok(()),
    }
}

/// Builds the `x-` arguments of a queue declaration.
pub(crate) fn queue_arguments(def: &QueueDefinition) -> FieldTable {
    let mut queue_args = BTreeMap::new();

    if let Some(exchange) = &def.dead_letter_exchange {
        queue_args.insert(
            ShortString::from(AMQP_HEADERS_DEAD_LETTER_EXCHANGE),
            AMQPValue::LongString(LongString::from(exchange.clone())),
        );
    }

    FieldTable::from(queue_args)
}

/// Maps a failed queue declaration to an `AmqpError`.
///
/// Only `PRECONDITION_FAILED`, the broker's answer to a queue that exists with
/// other properties, is a conflict. `RESOURCE_LOCKED` means another connection
/// owns an exclusive queue of that name and stays a plain declare error.
pub(crate) fn declare_error(err: &lapin::Error, queue: &str) -> AmqpError {
    if let lapin::Error::ProtocolError(amqp_err) = err {
        if matches!(
            amqp_err.kind(),
            AMQPErrorKind::Soft(AMQPSoftError::PRECONDITIONFAILED)
        ) {
            return AmqpError::TopologyConflict(queue.to_owned());
        }
    }

    AmqpError::DeclareQueueError(queue.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapin::protocol::{AMQPError, AMQPHardError};

    fn protocol_error(kind: AMQPErrorKind) -> lapin::Error {
        lapin::Error::ProtocolError(AMQPError::new(kind, ShortString::from("refused")))
    }

    #[test]
    fn subscription_queues_dead_letter_into_peril_dlx() {
        let def = QueueDefinition::for_subscription("army_moves.alice", QueueType::Transient);
        let args = queue_arguments(&def);

        assert_eq!(
            args.inner().get(AMQP_HEADERS_DEAD_LETTER_EXCHANGE),
            Some(&AMQPValue::LongString(LongString::from("peril_dlx")))
        );
    }

    #[test]
    fn game_log_queue_is_declared_without_arguments() {
        let def = QueueDefinition::for_subscription(GAME_LOG_SLUG, QueueType::Durable);

        assert!(queue_arguments(&def).inner().is_empty());
    }

    #[test]
    fn explicit_dead_letter_exchange_overrides_default() {
        let def = QueueDefinition::new("parking").dead_letter_exchange("elsewhere");
        let args = queue_arguments(&def);

        assert_eq!(
            args.inner().get(AMQP_HEADERS_DEAD_LETTER_EXCHANGE),
            Some(&AMQPValue::LongString(LongString::from("elsewhere")))
        );
        assert_eq!(args.inner().len(), 1);
    }

    #[test]
    fn precondition_failed_is_a_topology_conflict() {
        let err = protocol_error(AMQPErrorKind::Soft(AMQPSoftError::PRECONDITIONFAILED));
        assert_eq!(
            declare_error(&err, "war"),
            AmqpError::TopologyConflict("war".to_owned())
        );
    }

    #[test]
    fn exclusive_queue_owned_elsewhere_is_not_a_conflict() {
        let err = protocol_error(AMQPErrorKind::Soft(AMQPSoftError::RESOURCELOCKED));
        let mapped = declare_error(&err, "pause.alice");

        assert_eq!(mapped, AmqpError::DeclareQueueError("pause.alice".to_owned()));
        assert!(mapped.is_broker_error());
    }

    #[test]
    fn other_failures_are_broker_errors() {
        let err = protocol_error(AMQPErrorKind::Soft(AMQPSoftError::ACCESSREFUSED));
        assert_eq!(
            declare_error(&err, "war"),
            AmqpError::DeclareQueueError("war".to_owned())
        );

        let err = protocol_error(AMQPErrorKind::Hard(AMQPHardError::CHANNELERROR));
        assert!(declare_error(&err, "war").is_broker_error());

        assert!(declare_error(&lapin::Error::ChannelsLimitReached, "war").is_broker_error());
    }
}
