// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use peril_pubsub::{
    channel::{close_connection, new_amqp_channel},
    configs,
    dispatcher::RabbitMQDispatcher,
    errors::AmqpError,
    gamelog::GameLogWriter,
    logging,
    publisher::RabbitMQPublisher,
    queue::QueueType,
    routing::{
        any_user_pattern, PlayingState, EXCHANGE_PERIL_DIRECT, EXCHANGE_PERIL_TOPIC,
        GAME_LOG_SLUG, PAUSE_KEY,
    },
    topology::install_peril_topology,
};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(error = err.to_string(), "peril server failed");
        eprintln!("fatal: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AmqpError> {
    let cfg = configs::load()?;
    logging::init(&cfg.app.log_level);

    println!("Starting Peril server...");
    let (conn, channel) = new_amqp_channel(&cfg).await?;
    info!("connection to rabbitmq successful");

    install_peril_topology(channel.clone()).await?;

    let publisher = RabbitMQPublisher::new(channel);
    let dispatcher = RabbitMQDispatcher::new(conn.clone(), cfg.consumer.clone());

    dispatcher
        .subscribe_bincode(
            EXCHANGE_PERIL_TOPIC,
            GAME_LOG_SLUG,
            &any_user_pattern(GAME_LOG_SLUG),
            QueueType::Durable,
            GameLogWriter::new(&cfg.game_log.path, cfg.game_log.write_delay()),
        )
        .await?;

    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();

        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                error!(error = err.to_string(), "error reading input");
                break;
            }
        };

        let Some(command) = line.split_whitespace().next() else {
            continue;
        };

        match command.to_lowercase().as_str() {
            "pause" => {
                println!("Sending pause message...");
                broadcast(&publisher, true).await;
            }
            "resume" => {
                println!("Sending resume message...");
                broadcast(&publisher, false).await;
            }
            "help" => print_help(),
            "quit" => {
                println!("Exiting...");
                break;
            }
            other => println!("Unknown command: {other}"),
        }
    }

    close_connection(&conn).await;
    Ok(())
}

async fn broadcast(publisher: &RabbitMQPublisher, is_paused: bool) {
    let state = PlayingState { is_paused };
    if let Err(err) = publisher
        .publish_json(EXCHANGE_PERIL_DIRECT, PAUSE_KEY, &state)
        .await
    {
        println!("Failed to publish: {err}");
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn print_help() {
    println!("Possible commands:");
    println!("* pause");
    println!("* resume");
    println!("* quit");
    println!("* help");
}
