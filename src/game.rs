// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Client Game State
//!
//! State shared by a client's prompt and its subscription handlers. Handlers
//! run on separate tasks, so every mutation goes through [`GameState`]'s
//! methods, which serialize access internally.

use crate::{
    gamelog::GameLogPublisher,
    handler::{AckDecision, ConsumerHandler},
    routing::{ArmyMove, GameLog, Player, PlayingState, RecognitionOfWar},
};
use async_trait::async_trait;
use chrono::Utc;
use std::{cmp::Ordering, sync::Arc};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// A player's view of the running game.
pub struct GameState {
    username: String,
    paused: RwLock<bool>,
}

impl GameState {
    pub fn new(username: &str) -> Arc<GameState> {
        Arc::new(GameState {
            username: username.to_owned(),
            paused: RwLock::new(false),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub async fn is_paused(&self) -> bool {
        *self.paused.read().await
    }

    /// Applies a pause/resume broadcast.
    pub async fn handle_pause(&self, state: PlayingState) {
        let mut paused = self.paused.write().await;
        *paused = state.is_paused;

        if state.is_paused {
            info!("==== Pause Detected ====");
        } else {
            info!("==== Resume Detected ====");
        }
    }
}

/// Applies pause broadcasts to the game state.
pub struct PauseHandler {
    state: Arc<GameState>,
}

impl PauseHandler {
    pub fn new(state: Arc<GameState>) -> Self {
        PauseHandler { state }
    }
}

#[async_trait]
impl ConsumerHandler<PlayingState> for PauseHandler {
    async fn exec(&self, msg: PlayingState) -> AckDecision {
        self.state.handle_pause(msg).await;
        AckDecision::Ack
    }
}

/// Reacts to other players' army moves.
///
/// Own moves are discarded, moves seen while paused are requeued for later.
pub struct MoveHandler {
    state: Arc<GameState>,
}

impl MoveHandler {
    pub fn new(state: Arc<GameState>) -> Self {
        MoveHandler { state }
    }
}

#[async_trait]
impl ConsumerHandler<ArmyMove> for MoveHandler {
    async fn exec(&self, mv: ArmyMove) -> AckDecision {
        if mv.player == self.state.username() {
            debug!("ignoring own move");
            return AckDecision::NackDiscard;
        }

        if self.state.is_paused().await {
            return AckDecision::NackRequeue;
        }

        info!(
            player = mv.player.as_str(),
            units = mv.units.len(),
            location = mv.to_location.as_str(),
            "army moved"
        );
        AckDecision::Ack
    }
}

/// Combat strength of a unit rank, unknown ranks count for nothing.
fn unit_power(rank: &str) -> u32 {
    match rank {
        "infantry" => 1,
        "cavalry" => 5,
        "artillery" => 10,
        _ => 0,
    }
}

fn army_power(player: &Player) -> u32 {
    player.units.iter().map(|rank| unit_power(rank)).sum()
}

/// Settles a war and describes the result, `None` when neither side has units.
fn war_message(rw: &RecognitionOfWar) -> Option<String> {
    if rw.attacker.units.is_empty() || rw.defender.units.is_empty() {
        return None;
    }

    let (attacker, defender) = (&rw.attacker.username, &rw.defender.username);
    let message = match army_power(&rw.attacker).cmp(&army_power(&rw.defender)) {
        Ordering::Greater => format!("{attacker} won a war against {defender}"),
        Ordering::Less => format!("{defender} won a war against {attacker}"),
        Ordering::Equal => format!("A war between {attacker} and {defender} resulted in a draw"),
    };
    Some(message)
}

/// Settles wars declared against this player and reports them to the game log.
///
/// Every client consumes the shared `war` queue, so recognitions aimed at
/// somebody else are requeued for the defender's client to pick up.
pub struct WarHandler<P: ?Sized> {
    state: Arc<GameState>,
    publisher: Arc<P>,
}

impl<P: ?Sized> WarHandler<P> {
    pub fn new(state: Arc<GameState>, publisher: Arc<P>) -> Self {
        WarHandler { state, publisher }
    }
}

#[async_trait]
impl<P> ConsumerHandler<RecognitionOfWar> for WarHandler<P>
where
    P: GameLogPublisher + ?Sized,
{
    async fn exec(&self, rw: RecognitionOfWar) -> AckDecision {
        if rw.defender.username != self.state.username() {
            return AckDecision::NackRequeue;
        }

        let Some(message) = war_message(&rw) else {
            debug!(attacker = rw.attacker.username.as_str(), "war without units");
            return AckDecision::NackDiscard;
        };
        info!("{message}");

        let log = GameLog {
            current_time: Utc::now(),
            username: rw.attacker.username,
            message,
        };

        match self.publisher.publish_game_log(log).await {
            Ok(()) => AckDecision::Ack,
            Err(err) => {
                error!(error = err.to_string(), "failed to publish war log");
                AckDecision::NackRequeue
            }
        }
    }
}
