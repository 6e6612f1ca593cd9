// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Game Log Persistence
//!
//! The server keeps every game log it receives in a flat append-only text
//! file, one `<RFC3339 timestamp> <username>: <message>` line per record.

use crate::{
    errors::AmqpError,
    handler::{AckDecision, ConsumerHandler},
    publisher::RabbitMQPublisher,
    routing::{user_key, GameLog, EXCHANGE_PERIL_TOPIC, GAME_LOG_SLUG},
};
use async_trait::async_trait;
use chrono::SecondsFormat;
use rand::seq::SliceRandom;
use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{fs::OpenOptions, io::AsyncWriteExt};
use tracing::{debug, error};

const MALICIOUS_LOGS: [&str; 8] = [
    "Never interrupt your enemy when he is making a mistake.",
    "The hardest thing of all for a soldier is to retreat.",
    "A soldier will fight long and hard for a bit of colored ribbon.",
    "It is well that war is so terrible, otherwise we should grow too fond of it.",
    "The art of war is simple enough. Find out where your enemy is. Get at him as soon as you can.",
    "All warfare is based on deception.",
    "Victorious warriors win first and then go to war.",
    "In war, there are no unwounded soldiers.",
];

/// Formats one line of the game log file, newline included.
pub fn format_line(log: &GameLog) -> String {
    format!(
        "{} {}: {}\n",
        log.current_time.to_rfc3339_opts(SecondsFormat::Secs, true),
        log.username,
        log.message
    )
}

/// Appends `log` to the file at `path`, creating it when missing.
pub async fn write_log(path: &Path, log: &GameLog) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;

    file.write_all(format_line(log).as_bytes()).await?;
    file.flush().await
}

/// A random taunt, used to flood the log queue.
pub fn malicious_log() -> &'static str {
    MALICIOUS_LOGS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(MALICIOUS_LOGS[0])
}

/// Sends game logs to the server's log queue.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameLogPublisher: Send + Sync {
    /// Publishes `log` under `game_logs.<username>`.
    async fn publish_game_log(&self, log: GameLog) -> Result<(), AmqpError>;
}

#[async_trait]
impl GameLogPublisher for RabbitMQPublisher {
    async fn publish_game_log(&self, log: GameLog) -> Result<(), AmqpError> {
        let key = user_key(GAME_LOG_SLUG, &log.username);
        self.publish_bincode(EXCHANGE_PERIL_TOPIC, &key, &log).await
    }
}

/// Handler persisting every received game log.
///
/// The optional delay emulates slow storage; with it, the prefetch limit of
/// the game log subscription becomes visible as queued messages.
pub struct GameLogWriter {
    path: PathBuf,
    delay: Duration,
}

impl GameLogWriter {
    pub fn new(path: impl Into<PathBuf>, delay: Duration) -> Self {
        GameLogWriter {
            path: path.into(),
            delay,
        }
    }
}

#[async_trait]
impl ConsumerHandler<GameLog> for GameLogWriter {
    async fn exec(&self, log: GameLog) -> AckDecision {
        debug!(username = log.username.as_str(), "received game log...");

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match write_log(&self.path, &log).await {
            Ok(()) => AckDecision::Ack,
            Err(err) => {
                error!(
                    error = err.to_string(),
                    path = %self.path.display(),
                    "could not write to logs file"
                );
                AckDecision::NackRequeue
            }
        }
    }
}
