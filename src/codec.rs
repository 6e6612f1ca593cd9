// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Payload Codecs
//!
//! Typed values travel over the broker as raw bytes plus a content-type tag.
//! An [`Encoder`] turns a value into bytes and names the tag, a [`Decoder`]
//! turns bytes back into a value. Codecs are picked per publish/subscribe call,
//! so adding a payload type never touches the transport.
//!
//! Two codecs are provided:
//! - [`JsonCodec`]: self-describing text, tagged `application/json`
//! - [`BincodeCodec`]: compact binary, tagged `application/bincode`

use crate::errors::AmqpError;
use bincode::Options;
use serde::{de::DeserializeOwned, Serialize};

/// Content type of messages produced by [`JsonCodec`]
pub const JSON_CONTENT_TYPE: &str = "application/json";
/// Content type of messages produced by [`BincodeCodec`]
pub const BINCODE_CONTENT_TYPE: &str = "application/bincode";

/// Serializes values of type `T` into message payloads.
pub trait Encoder<T: ?Sized>: Send + Sync {
    /// Advisory tag stored in the message's content-type property.
    fn content_type(&self) -> &'static str;

    /// Encodes `value`, failing with `AmqpError::EncodingError`.
    fn encode(&self, value: &T) -> Result<Vec<u8>, AmqpError>;
}

/// Deserializes message payloads into values of type `T`.
pub trait Decoder<T>: Send + Sync {
    /// Decodes `payload`, failing with `AmqpError::MalformedPayload`.
    fn decode(&self, payload: &[u8]) -> Result<T, AmqpError>;
}

/// Human readable JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T: Serialize + ?Sized> Encoder<T> for JsonCodec {
    fn content_type(&self) -> &'static str {
        JSON_CONTENT_TYPE
    }

    fn encode(&self, value: &T) -> Result<Vec<u8>, AmqpError> {
        serde_json::to_vec(value).map_err(|err| AmqpError::EncodingError(err.to_string()))
    }
}

impl<T: DeserializeOwned> Decoder<T> for JsonCodec {
    fn decode(&self, payload: &[u8]) -> Result<T, AmqpError> {
        serde_json::from_slice(payload).map_err(|err| AmqpError::MalformedPayload(err.to_string()))
    }
}

/// Compact binary codec backed by `bincode`.
///
/// Integers use fixed-width encoding and trailing bytes are rejected, so a
/// payload either decodes completely or not at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl BincodeCodec {
    fn options() -> impl Options {
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .reject_trailing_bytes()
    }
}

impl<T: Serialize + ?Sized> Encoder<T> for BincodeCodec {
    fn content_type(&self) -> &'static str {
        BINCODE_CONTENT_TYPE
    }

    fn encode(&self, value: &T) -> Result<Vec<u8>, AmqpError> {
        Self::options()
            .serialize(value)
            .map_err(|err| AmqpError::EncodingError(err.to_string()))
    }
}

impl<T: DeserializeOwned> Decoder<T> for BincodeCodec {
    fn decode(&self, payload: &[u8]) -> Result<T, AmqpError> {
        Self::options()
            .deserialize(payload)
            .map_err(|err| AmqpError::MalformedPayload(err.to_string()))
    }
}
