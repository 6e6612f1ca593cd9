// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Peril Routing
//!
//! Fixed exchange, queue and routing key names shared by the server and the
//! clients, plus the payload types that travel under them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const EXCHANGE_PERIL_DIRECT: &str = "peril_direct";
pub const EXCHANGE_PERIL_TOPIC: &str = "peril_topic";
pub const EXCHANGE_PERIL_DEAD_LETTER: &str = "peril_dlx";

/// Queue bound to the dead-letter exchange, collecting every discarded message.
pub const QUEUE_PERIL_DEAD_LETTER: &str = "peril_dlq";
/// Durable queue shared by every client for war recognitions.
pub const QUEUE_WAR: &str = "war";

pub const PAUSE_KEY: &str = "pause";
pub const ARMY_MOVES_PREFIX: &str = "army_moves";
pub const WAR_RECOGNITIONS_PREFIX: &str = "war_recognitions";
/// Routing key prefix and name of the shared durable game log queue.
pub const GAME_LOG_SLUG: &str = "game_logs";

/// Publish key `<prefix>.<username>`.
pub fn user_key(prefix: &str, username: &str) -> String {
    format!("{prefix}.{username}")
}

/// Subscribe pattern `<prefix>.*`, matching every user's key.
pub fn any_user_pattern(prefix: &str) -> String {
    format!("{prefix}.*")
}

/// Broadcast by the server to pause or resume every client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayingState {
    pub is_paused: bool,
}

/// A player moving some of their units to a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmyMove {
    pub player: String,
    pub units: Vec<String>,
    pub to_location: String,
}

/// A player and the ranks of the units they brought to a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub username: String,
    pub units: Vec<String>,
}

/// Published when an army move lands on another player's units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionOfWar {
    pub attacker: Player,
    pub defender: Player,
}

/// A line of the persisted game log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameLog {
    pub current_time: DateTime<Utc>,
    pub username: String,
    pub message: String,
}
