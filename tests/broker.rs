// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Tests against a live RabbitMQ, configured through the usual `PERIL__RABBITMQ__*`
//! variables. Run with `cargo test -- --ignored`.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use lapin::{options::QueueDeclareOptions, types::FieldTable, Connection};
use peril_pubsub::{
    channel::{new_amqp_connection, open_channel},
    codec::Decoder,
    configs::{self, ConsumerConfigs},
    dispatcher::RabbitMQDispatcher,
    errors::AmqpError,
    gamelog::GameLogWriter,
    handler::{AckDecision, ConsumerHandler},
    publisher::RabbitMQPublisher,
    queue::QueueType,
    routing::{
        user_key, ArmyMove, GameLog, PlayingState, ARMY_MOVES_PREFIX, EXCHANGE_PERIL_DEAD_LETTER,
        EXCHANGE_PERIL_DIRECT, EXCHANGE_PERIL_TOPIC, GAME_LOG_SLUG, PAUSE_KEY,
    },
    topology::{declare_and_bind, install_peril_topology},
};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::{mpsc, Semaphore},
    time::{sleep, timeout},
};
use uuid::Uuid;

async fn connect() -> Arc<Connection> {
    let cfg = configs::load().unwrap();
    let conn = new_amqp_connection(&cfg).await.unwrap();
    install_peril_topology(open_channel(&conn).await.unwrap())
        .await
        .unwrap();
    conn
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

fn army_move(player: &str) -> ArmyMove {
    ArmyMove {
        player: player.to_owned(),
        units: vec!["artillery".to_owned()],
        to_location: "asia".to_owned(),
    }
}

struct RawBytes;

impl Decoder<Vec<u8>> for RawBytes {
    fn decode(&self, payload: &[u8]) -> Result<Vec<u8>, AmqpError> {
        Ok(payload.to_vec())
    }
}

async fn ready_messages(conn: &Connection, queue: &str) -> u32 {
    let channel = open_channel(conn).await.unwrap();
    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                passive: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .unwrap()
        .message_count()
}

#[tokio::test]
#[ignore = "requires a running RabbitMQ"]
async fn redeclaring_with_same_policy_is_idempotent() {
    let conn = connect().await;
    let queue = unique("peril-test-idempotent");

    declare_and_bind(&conn, EXCHANGE_PERIL_TOPIC, &queue, "idempotent.*", QueueType::Transient)
        .await
        .unwrap();
    declare_and_bind(&conn, EXCHANGE_PERIL_TOPIC, &queue, "idempotent.*", QueueType::Transient)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires a running RabbitMQ"]
async fn redeclaring_with_other_policy_conflicts() {
    let conn = connect().await;
    let queue = unique("peril-test-conflict");

    declare_and_bind(&conn, EXCHANGE_PERIL_TOPIC, &queue, "conflict.*", QueueType::Transient)
        .await
        .unwrap();

    let result =
        declare_and_bind(&conn, EXCHANGE_PERIL_TOPIC, &queue, "conflict.*", QueueType::Durable)
            .await;
    assert_eq!(result.err(), Some(AmqpError::TopologyConflict(queue)));
}

#[tokio::test]
#[ignore = "requires a running RabbitMQ"]
async fn pause_broadcast_reaches_subscriber_once() {
    let conn = connect().await;
    let dispatcher = RabbitMQDispatcher::new(conn.clone(), ConsumerConfigs::default());
    let publisher = RabbitMQPublisher::new(open_channel(&conn).await.unwrap());

    let (tx, mut rx) = mpsc::unbounded_channel();
    dispatcher
        .subscribe_json(
            EXCHANGE_PERIL_DIRECT,
            &user_key(PAUSE_KEY, &unique("player")),
            PAUSE_KEY,
            QueueType::Transient,
            move |state: PlayingState| {
                let _ = tx.send(state);
                AckDecision::Ack
            },
        )
        .await
        .unwrap();

    publisher
        .publish_json(EXCHANGE_PERIL_DIRECT, PAUSE_KEY, &PlayingState { is_paused: true })
        .await
        .unwrap();

    let received = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
    assert_eq!(received, Some(PlayingState { is_paused: true }));

    let again = timeout(Duration::from_secs(1), rx.recv()).await;
    assert!(again.is_err());
}

#[tokio::test]
#[ignore = "requires a running RabbitMQ"]
async fn game_log_lands_in_the_log_file() {
    let conn = connect().await;
    let dispatcher = RabbitMQDispatcher::new(conn.clone(), ConsumerConfigs::default());
    let publisher = RabbitMQPublisher::new(open_channel(&conn).await.unwrap());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("game.log");
    let username = unique("alice");

    dispatcher
        .subscribe_bincode(
            EXCHANGE_PERIL_TOPIC,
            &unique("peril-test-logs"),
            &user_key(GAME_LOG_SLUG, &username),
            QueueType::Transient,
            GameLogWriter::new(&path, Duration::ZERO),
        )
        .await
        .unwrap();

    let log = GameLog {
        current_time: Utc.with_ymd_and_hms(2024, 5, 17, 12, 30, 5).unwrap(),
        username: username.clone(),
        message: "hello".to_owned(),
    };
    publisher
        .publish_bincode(EXCHANGE_PERIL_TOPIC, &user_key(GAME_LOG_SLUG, &username), &log)
        .await
        .unwrap();

    let expected = format!("2024-05-17T12:30:05Z {username}: hello\n");
    for _ in 0..50 {
        if let Ok(content) = tokio::fs::read_to_string(&path).await {
            assert_eq!(content, expected);
            return;
        }
        sleep(Duration::from_millis(100)).await;
    }
    panic!("game log was never written");
}

#[tokio::test]
#[ignore = "requires a running RabbitMQ"]
async fn discarded_moves_are_dead_lettered_once() {
    let conn = connect().await;
    let dispatcher = RabbitMQDispatcher::new(conn.clone(), ConsumerConfigs::default());
    let publisher = RabbitMQPublisher::new(open_channel(&conn).await.unwrap());
    let player = unique("player");

    let discarded = Arc::new(AtomicUsize::new(0));
    let counter = discarded.clone();
    dispatcher
        .subscribe_json(
            EXCHANGE_PERIL_TOPIC,
            &unique("peril-test-moves"),
            &user_key(ARMY_MOVES_PREFIX, &player),
            QueueType::Transient,
            move |_: ArmyMove| {
                counter.fetch_add(1, Ordering::SeqCst);
                AckDecision::NackDiscard
            },
        )
        .await
        .unwrap();

    // the watcher queue dead-letters into peril_dlx too, so it must never discard
    let (tx, mut rx) = mpsc::unbounded_channel();
    let watched = player.clone();
    dispatcher
        .subscribe::<Vec<u8>, _, _>(
            EXCHANGE_PERIL_DEAD_LETTER,
            &unique("peril-test-dlx"),
            "",
            QueueType::Transient,
            RawBytes,
            move |payload: Vec<u8>| {
                if let Ok(mv) = serde_json::from_slice::<ArmyMove>(&payload) {
                    if mv.player == watched {
                        let _ = tx.send(mv);
                    }
                }
                AckDecision::Ack
            },
        )
        .await
        .unwrap();

    let moves = 3;
    for _ in 0..moves {
        publisher
            .publish_json(
                EXCHANGE_PERIL_TOPIC,
                &user_key(ARMY_MOVES_PREFIX, &player),
                &army_move(&player),
            )
            .await
            .unwrap();
    }

    for _ in 0..moves {
        let dead = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(dead, Some(army_move(&player)));
    }
    assert!(timeout(Duration::from_secs(1), rx.recv()).await.is_err());
    assert_eq!(discarded.load(Ordering::SeqCst), moves);
}

#[tokio::test]
#[ignore = "requires a running RabbitMQ"]
async fn requeued_moves_are_redelivered_not_dead_lettered() {
    let conn = connect().await;
    let dispatcher = RabbitMQDispatcher::new(conn.clone(), ConsumerConfigs::default());
    let publisher = RabbitMQPublisher::new(open_channel(&conn).await.unwrap());
    let player = unique("player");

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let deliveries = Arc::new(AtomicUsize::new(0));
    let counter = deliveries.clone();
    dispatcher
        .subscribe_json(
            EXCHANGE_PERIL_TOPIC,
            &unique("peril-test-requeue"),
            &user_key(ARMY_MOVES_PREFIX, &player),
            QueueType::Transient,
            move |mv: ArmyMove| {
                let _ = seen_tx.send(mv);
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    AckDecision::NackRequeue
                } else {
                    AckDecision::Ack
                }
            },
        )
        .await
        .unwrap();

    let (dead_tx, mut dead_rx) = mpsc::unbounded_channel();
    let watched = player.clone();
    dispatcher
        .subscribe::<Vec<u8>, _, _>(
            EXCHANGE_PERIL_DEAD_LETTER,
            &unique("peril-test-dlx"),
            "",
            QueueType::Transient,
            RawBytes,
            move |payload: Vec<u8>| {
                if let Ok(mv) = serde_json::from_slice::<ArmyMove>(&payload) {
                    if mv.player == watched {
                        let _ = dead_tx.send(mv);
                    }
                }
                AckDecision::Ack
            },
        )
        .await
        .unwrap();

    publisher
        .publish_json(
            EXCHANGE_PERIL_TOPIC,
            &user_key(ARMY_MOVES_PREFIX, &player),
            &army_move(&player),
        )
        .await
        .unwrap();

    for _ in 0..2 {
        let seen = timeout(Duration::from_secs(5), seen_rx.recv()).await.unwrap();
        assert_eq!(seen, Some(army_move(&player)));
    }
    assert!(timeout(Duration::from_secs(1), seen_rx.recv()).await.is_err());
    assert_eq!(deliveries.load(Ordering::SeqCst), 2);
    assert!(dead_rx.try_recv().is_err());
}

struct Gate {
    permits: Arc<Semaphore>,
    started: Arc<AtomicUsize>,
}

#[async_trait]
impl ConsumerHandler<ArmyMove> for Gate {
    async fn exec(&self, _: ArmyMove) -> AckDecision {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
        AckDecision::Ack
    }
}

#[tokio::test]
#[ignore = "requires a running RabbitMQ"]
async fn prefetch_limits_unacknowledged_deliveries() {
    let conn = connect().await;
    let cfg = ConsumerConfigs::default();
    let dispatcher = RabbitMQDispatcher::new(conn.clone(), cfg.clone());
    let publisher = RabbitMQPublisher::new(open_channel(&conn).await.unwrap());
    let player = unique("player");
    let queue = unique("peril-test-prefetch");

    let permits = Arc::new(Semaphore::new(0));
    let started = Arc::new(AtomicUsize::new(0));
    dispatcher
        .subscribe_json(
            EXCHANGE_PERIL_TOPIC,
            &queue,
            &user_key(ARMY_MOVES_PREFIX, &player),
            QueueType::Transient,
            Gate {
                permits: permits.clone(),
                started: started.clone(),
            },
        )
        .await
        .unwrap();

    let published = 15;
    for _ in 0..published {
        publisher
            .publish_json(
                EXCHANGE_PERIL_TOPIC,
                &user_key(ARMY_MOVES_PREFIX, &player),
                &army_move(&player),
            )
            .await
            .unwrap();
    }
    sleep(Duration::from_millis(500)).await;

    let held_back = published - cfg.prefetch_count as u32;
    assert_eq!(ready_messages(&conn, &queue).await, held_back);
    assert_eq!(started.load(Ordering::SeqCst), 1);

    permits.add_permits(published as usize);
    for _ in 0..50 {
        if started.load(Ordering::SeqCst) == published as usize {
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(started.load(Ordering::SeqCst), published as usize);
    assert_eq!(ready_messages(&conn, &queue).await, 0);
}
