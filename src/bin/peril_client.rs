// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use chrono::Utc;
use peril_pubsub::{
    channel::{close_connection, new_amqp_channel},
    configs,
    dispatcher::RabbitMQDispatcher,
    errors::AmqpError,
    game::{GameState, MoveHandler, PauseHandler, WarHandler},
    gamelog::malicious_log,
    logging,
    publisher::RabbitMQPublisher,
    queue::QueueType,
    routing::{
        any_user_pattern, user_key, ArmyMove, GameLog, ARMY_MOVES_PREFIX, EXCHANGE_PERIL_DIRECT,
        EXCHANGE_PERIL_TOPIC, GAME_LOG_SLUG, PAUSE_KEY, QUEUE_WAR, WAR_RECOGNITIONS_PREFIX,
    },
};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(error = err.to_string(), "peril client failed");
        eprintln!("fatal: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AmqpError> {
    let cfg = configs::load()?;
    logging::init(&cfg.app.log_level);

    println!("Starting Peril client...");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let username = match std::env::args().nth(1) {
        Some(name) => name,
        None => {
            println!("Please enter your username:");
            prompt();
            match lines.next_line().await {
                Ok(Some(line)) => line.trim().to_owned(),
                _ => String::new(),
            }
        }
    };

    if !valid_username(&username) {
        eprintln!("usernames must be a single word without dots");
        std::process::exit(2);
    }
    println!("Welcome, {username}!");

    let (conn, channel) = new_amqp_channel(&cfg).await?;
    let publisher = RabbitMQPublisher::new(channel);
    let dispatcher = RabbitMQDispatcher::new(conn.clone(), cfg.consumer.clone());
    let state = GameState::new(&username);

    dispatcher
        .subscribe_json(
            EXCHANGE_PERIL_DIRECT,
            &user_key(PAUSE_KEY, &username),
            PAUSE_KEY,
            QueueType::Transient,
            PauseHandler::new(state.clone()),
        )
        .await?;

    dispatcher
        .subscribe_json(
            EXCHANGE_PERIL_TOPIC,
            &user_key(ARMY_MOVES_PREFIX, &username),
            &any_user_pattern(ARMY_MOVES_PREFIX),
            QueueType::Transient,
            MoveHandler::new(state.clone()),
        )
        .await?;

    dispatcher
        .subscribe_json(
            EXCHANGE_PERIL_TOPIC,
            QUEUE_WAR,
            &any_user_pattern(WAR_RECOGNITIONS_PREFIX),
            QueueType::Durable,
            WarHandler::new(state.clone(), publisher.clone()),
        )
        .await?;

    print_help();
    repl(&mut lines, &publisher, &state).await;

    close_connection(&conn).await;
    Ok(())
}

async fn repl(lines: &mut Lines<BufReader<Stdin>>, publisher: &RabbitMQPublisher, state: &GameState) {
    loop {
        prompt();

        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                println!();
                return;
            }
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(err) => {
                error!(error = err.to_string(), "error reading input");
                return;
            }
        };

        let words: Vec<&str> = line.split_whitespace().collect();
        let Some(command) = parse_command(&words) else {
            continue;
        };

        match command {
            Command::Move(args) => move_units(publisher, state, args).await,
            Command::Status => {
                let paused = if state.is_paused().await { "paused" } else { "running" };
                println!("You are {}, the game is {paused}.", state.username());
            }
            Command::Spam(count) => spam(publisher, state.username(), count).await,
            Command::Help => print_help(),
            Command::Quit => {
                println!("I hate this game! (╯°□°)╯︵ ┻━┻");
                return;
            }
            Command::Unsupported(name) => {
                println!("'{name}' is not available in this client, armies are managed by the game engine.")
            }
            Command::Unknown => println!("Unknown command. Type 'help' for available commands."),
        }
    }
}

async fn move_units(publisher: &RabbitMQPublisher, state: &GameState, args: &[&str]) {
    if state.is_paused().await {
        println!("The game is paused, you can not move.");
        return;
    }

    let [location, units @ ..] = args else {
        println!("Usage: move <location> <unit> [unit...]");
        return;
    };
    if units.is_empty() {
        println!("Usage: move <location> <unit> [unit...]");
        return;
    }

    let mv = ArmyMove {
        player: state.username().to_owned(),
        units: units.iter().map(|u| u.to_string()).collect(),
        to_location: location.to_string(),
    };

    let key = user_key(ARMY_MOVES_PREFIX, state.username());
    match publisher.publish_json(EXCHANGE_PERIL_TOPIC, &key, &mv).await {
        Ok(()) => println!("Moved {} unit(s) to {}.", mv.units.len(), mv.to_location),
        Err(err) => println!("Failed to publish move: {err}"),
    }
}

async fn spam(publisher: &RabbitMQPublisher, username: &str, count: Option<&str>) {
    let Some(count) = count.and_then(|c| c.parse::<usize>().ok()).filter(|c| *c > 0) else {
        println!("Usage: spam <count>");
        return;
    };

    let key = user_key(GAME_LOG_SLUG, username);
    for i in 0..count {
        let log = GameLog {
            current_time: Utc::now(),
            username: username.to_owned(),
            message: malicious_log().to_owned(),
        };

        if let Err(err) = publisher.publish_bincode(EXCHANGE_PERIL_TOPIC, &key, &log).await {
            println!("Failed to publish log #{}: {err}", i + 1);
            return;
        }
    }
    println!("Published {count} malicious logs.");
}

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Move(&'a [&'a str]),
    Status,
    Spam(Option<&'a str>),
    Help,
    Quit,
    Unsupported(&'static str),
    Unknown,
}

fn parse_command<'a>(words: &'a [&'a str]) -> Option<Command<'a>> {
    let (first, rest) = words.split_first()?;

    let command = match first.to_lowercase().as_str() {
        "move" => Command::Move(rest),
        "status" => Command::Status,
        "spam" => Command::Spam(rest.first().copied()),
        "help" => Command::Help,
        "quit" => Command::Quit,
        "spawn" => Command::Unsupported("spawn"),
        _ => Command::Unknown,
    };
    Some(command)
}

fn valid_username(username: &str) -> bool {
    !username.is_empty() && !username.contains('.') && !username.contains(char::is_whitespace)
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn print_help() {
    println!("Possible commands:");
    println!("* move <location> <unit> [unit...]");
    println!("* status");
    println!("* spam <count>");
    println!("* quit");
    println!("* help");
    println!("Spawning units and settling wars happen in the game engine, not here.");
}
