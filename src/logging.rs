// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Installs the process-wide `tracing` subscriber.

use tracing_subscriber::EnvFilter;

/// Initializes structured logging at `default_level`.
///
/// `RUST_LOG` takes precedence when set. Calling this more than once is a no-op,
/// so tests and binaries can both call it.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
