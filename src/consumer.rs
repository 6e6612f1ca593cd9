// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Consumer
//!
//! This module implements the consumption loop behind every subscription:
//! each delivery is decoded, handed to the subscription's handler exactly once,
//! and resolved with the ack or nack the handler's [`AckDecision`] calls for.
//! Deliveries are processed strictly in the order the stream yields them.
//!
//! Per-delivery failures never escape the loop. Payloads that fail to decode
//! are discarded without requeue. Ack/nack call failures are logged; when
//! `max_ack_failures` of them happen in a row the loop gives up, because the
//! channel is most likely gone.

use crate::{
    codec::Decoder,
    errors::AmqpError,
    handler::{AckDecision, ConsumerHandler},
    otel,
};
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use lapin::{
    acker::Acker,
    message::Delivery,
    options::{BasicAckOptions, BasicNackOptions},
    types::FieldTable,
};
use opentelemetry::{
    global::{self, BoxedTracer},
    trace::{FutureExt, Status, TraceContextExt},
};
use std::borrow::Cow;
use tracing::{debug, error, warn};

/// Resolves a single delivery on the broker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Removes the delivery from its queue.
    async fn ack(&self) -> Result<(), AmqpError>;

    /// Rejects the delivery, returning it to its queue when `requeue` is set.
    async fn nack(&self, requeue: bool) -> Result<(), AmqpError>;
}

#[async_trait]
impl Acknowledger for Acker {
    async fn ack(&self) -> Result<(), AmqpError> {
        Acker::ack(self, BasicAckOptions { multiple: false })
            .await
            .map_err(|err| {
                error!(error = err.to_string(), "error whiling ack msg");
                AmqpError::AckMessageError
            })
    }

    async fn nack(&self, requeue: bool) -> Result<(), AmqpError> {
        Acker::nack(
            self,
            BasicNackOptions {
                multiple: false,
                requeue,
            },
        )
        .await
        .map_err(|err| {
            error!(error = err.to_string(), requeue, "error whiling nack msg");
            AmqpError::NackMessageError(requeue)
        })
    }
}

/// A delivery as seen by the consumption loop.
pub struct InboundMessage<A> {
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub data: Vec<u8>,
    pub headers: FieldTable,
    pub acker: A,
}

impl From<Delivery> for InboundMessage<Acker> {
    fn from(delivery: Delivery) -> Self {
        InboundMessage {
            delivery_tag: delivery.delivery_tag,
            redelivered: delivery.redelivered,
            headers: delivery.properties.headers().clone().unwrap_or_default(),
            data: delivery.data,
            acker: delivery.acker,
        }
    }
}

/// Why a consumption loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerExit {
    /// The delivery stream ended, e.g. the channel or connection was closed.
    StreamClosed,
    /// That many ack/nack calls failed in a row.
    AckFailuresExceeded(u32),
}

/// Drives `deliveries` until the stream ends or acknowledgments keep failing.
///
/// A `max_ack_failures` of zero never gives up.
pub(crate) async fn consume_loop<S, A, T, D, H>(
    queue: &str,
    mut deliveries: S,
    codec: &D,
    handler: &H,
    max_ack_failures: u32,
) -> ConsumerExit
where
    S: Stream<Item = Result<InboundMessage<A>, AmqpError>> + Unpin,
    A: Acknowledger,
    T: Send,
    D: Decoder<T> + ?Sized,
    H: ConsumerHandler<T> + ?Sized,
{
    let tracer = global::tracer("amqp consumer");
    let mut ack_failures = 0u32;

    while let Some(result) = deliveries.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(err) => {
                error!(error = err.to_string(), queue, "errors consume msg");
                continue;
            }
        };

        match consume(&tracer, queue, &msg, codec, handler).await {
            Ok(_) => ack_failures = 0,
            Err(err) => {
                ack_failures += 1;
                error!(
                    error = err.to_string(),
                    queue,
                    ack_failures,
                    "error resolving msg"
                );

                if max_ack_failures > 0 && ack_failures >= max_ack_failures {
                    error!(queue, "too many consecutive ack failures, stopping consumer");
                    return ConsumerExit::AckFailuresExceeded(ack_failures);
                }
            }
        }
    }

    debug!(queue, "delivery stream closed");
    ConsumerExit::StreamClosed
}

/// Decodes, handles and resolves one delivery.
///
/// # Returns
/// The decision applied to the delivery, or the error of the ack/nack call
/// that failed to apply it.
pub(crate) async fn consume<A, T, D, H>(
    tracer: &BoxedTracer,
    queue: &str,
    msg: &InboundMessage<A>,
    codec: &D,
    handler: &H,
) -> Result<AckDecision, AmqpError>
where
    A: Acknowledger,
    T: Send,
    D: Decoder<T> + ?Sized,
    H: ConsumerHandler<T> + ?Sized,
{
    let (ctx, span) = otel::new_span(&msg.headers, tracer, queue);
    let ctx = ctx.with_span(span);
    let span = ctx.span();

    debug!(
        queue,
        delivery_tag = msg.delivery_tag,
        redelivered = msg.redelivered,
        "received"
    );

    let decision = match codec.decode(&msg.data) {
        // publishes made by the handler continue the delivery's trace
        Ok(value) => handler.exec(value).with_context(ctx.clone()).await,
        Err(err) => {
            warn!(
                error = err.to_string(),
                queue, "removing message from queue - reason: malformed payload"
            );
            span.record_error(&err);
            span.set_status(Status::Error {
                description: Cow::from("malformed payload"),
            });
            AckDecision::NackDiscard
        }
    };

    match decision {
        AckDecision::Ack => debug!(queue, "message successfully processed"),
        AckDecision::NackRequeue => warn!(queue, "requeuing message for redelivery"),
        AckDecision::NackDiscard => warn!(queue, "discarding message"),
    }

    let resolved = match decision.requeue() {
        None => msg.acker.ack().await,
        Some(requeue) => msg.acker.nack(requeue).await,
    };

    match resolved {
        Err(err) => {
            span.record_error(&err);
            span.set_status(Status::Error {
                description: Cow::from(err.to_string()),
            });
            Err(err)
        }
        Ok(()) => {
            if decision == AckDecision::Ack {
                span.set_status(Status::Ok);
            }
            Ok(decision)
        }
    }
}
