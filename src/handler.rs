// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Consumer Handlers
//!
//! A handler receives one decoded message and answers with an [`AckDecision`]
//! telling the dispatcher how to resolve the delivery it came from.

use async_trait::async_trait;
use std::fmt;

/// The outcome a handler returns for a delivery.
///
/// `NackRequeue` and `NackDiscard` are both negative acknowledgments at the
/// protocol level, they differ only in the requeue flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckDecision {
    /// Remove the message permanently.
    Ack,
    /// Return the message to its queue for redelivery.
    NackRequeue,
    /// Drop the message, or route it to the queue's dead-letter exchange.
    NackDiscard,
}

impl AckDecision {
    /// Requeue flag to send with a negative acknowledgment, `None` for `Ack`.
    pub fn requeue(&self) -> Option<bool> {
        match self {
            AckDecision::Ack => None,
            AckDecision::NackRequeue => Some(true),
            AckDecision::NackDiscard => Some(false),
        }
    }
}

impl fmt::Display for AckDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckDecision::Ack => write!(f, "ack"),
            AckDecision::NackRequeue => write!(f, "nack-requeue"),
            AckDecision::NackDiscard => write!(f, "nack-discard"),
        }
    }
}

/// Business logic invoked once per decoded delivery.
///
/// Plain closures `Fn(T) -> AckDecision` are handlers too; implement the trait
/// directly when the handler needs to await (for example to publish).
#[async_trait]
pub trait ConsumerHandler<T>: Send + Sync {
    async fn exec(&self, msg: T) -> AckDecision;
}

#[async_trait]
impl<T, F> ConsumerHandler<T> for F
where
    T: Send + 'static,
    F: Fn(T) -> AckDecision + Send + Sync,
{
    async fn exec(&self, msg: T) -> AckDecision {
        (self)(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_decisions_to_requeue_flags() {
        assert_eq!(AckDecision::Ack.requeue(), None);
        assert_eq!(AckDecision::NackRequeue.requeue(), Some(true));
        assert_eq!(AckDecision::NackDiscard.requeue(), Some(false));
    }

    #[tokio::test]
    async fn closures_are_handlers() {
        let handler = |n: u32| {
            if n % 2 == 0 {
                AckDecision::Ack
            } else {
                AckDecision::NackDiscard
            }
        };

        assert_eq!(handler.exec(2).await, AckDecision::Ack);
        assert_eq!(handler.exec(3).await, AckDecision::NackDiscard);
    }
}
