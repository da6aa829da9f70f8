/*
 * error.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use std::fmt;

use crate::socket::channel::Channel;

#[derive(Debug)]
pub enum Error {
    CreateSocketFailed(String, zmq::Error),
    SocketConnectError(String, String, zmq::Error),
    SocketBindError(String, String, zmq::Error),
    SocketMonitorError(String, zmq::Error),
    UnsupportedSocketType(zmq::SocketType),
    ZmqError(String, zmq::Error),
    MissingDelimiter,
    InsufficientParts(usize, usize),
    InvalidHmac(Vec<u8>, hex::FromHexError),
    BadSignature(Vec<u8>, hmac::digest::MacError),
    HmacKeyInvalid(String, crypto_common::InvalidLength),
    Utf8Error(String, Vec<u8>, std::str::Utf8Error),
    JsonParseError(String, String, serde_json::Error),
    InvalidPart(String, serde_json::Value, serde_json::Error),
    InvalidMessage(String, serde_json::Value, serde_json::Error),
    CannotSerialize(serde_json::Error),
    UnknownMessageType(String),
    AlreadyRunning(String),
    ChannelClosed(Channel),
    CommTargetNotFound(String),
    ReadConnectionFile(std::io::Error),
    ParseConnectionFile(serde_json::Error),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::CreateSocketFailed(name, err) => {
                write!(f, "Could not create ZeroMQ socket '{}': {}", name, err)
            },
            Error::SocketConnectError(name, endpoint, err) => {
                write!(
                    f,
                    "Could not connect ZeroMQ socket '{}' to {}: {}",
                    name, endpoint, err
                )
            },
            Error::SocketBindError(name, endpoint, err) => {
                write!(
                    f,
                    "Could not bind ZeroMQ socket '{}' to {}: {}",
                    name, endpoint, err
                )
            },
            Error::SocketMonitorError(name, err) => {
                write!(f, "Could not monitor ZeroMQ socket '{}': {}", name, err)
            },
            Error::UnsupportedSocketType(kind) => {
                write!(f, "Unsupported ZeroMQ socket type: {:?}", kind)
            },
            Error::ZmqError(name, err) => {
                write!(f, "ZeroMQ error on socket '{}': {}", name, err)
            },
            Error::MissingDelimiter => {
                write!(
                    f,
                    "ZeroMQ message did not include expected <IDS|MSG> delimiter"
                )
            },
            Error::InsufficientParts(found, expected) => {
                write!(
                    f,
                    "ZeroMQ message did not contain sufficient parts (found {}, expected {})",
                    found, expected
                )
            },
            Error::InvalidHmac(data, err) => {
                write!(
                    f,
                    "Message HMAC signature {:?} is not a valid hexadecimal value: {}",
                    data, err
                )
            },
            Error::BadSignature(sig, err) => {
                write!(f, "Message HMAC signature {:?} is incorrect: {}", sig, err)
            },
            Error::HmacKeyInvalid(key, err) => {
                write!(
                    f,
                    "The supplied HMAC signing key '{}' ({} bytes) cannot be used: {}",
                    key,
                    key.len(),
                    err
                )
            },
            Error::Utf8Error(part, data, err) => {
                write!(
                    f,
                    "Message part '{}' was not valid UTF-8: {} (raw: {:?})",
                    part, err, data
                )
            },
            Error::JsonParseError(part, str, err) => {
                write!(
                    f,
                    "Message part '{}' is invalid JSON: {} (raw: {})",
                    part, err, str
                )
            },
            Error::InvalidPart(part, json, err) => {
                write!(
                    f,
                    "Message part '{}' does not match schema: {} (raw: {})",
                    part, err, json
                )
            },
            Error::InvalidMessage(kind, json, err) => {
                write!(f, "Invalid '{}' message: {} (raw: {})", kind, err, json)
            },
            Error::CannotSerialize(err) => {
                write!(f, "Cannot serialize message: {}", err)
            },
            Error::UnknownMessageType(kind) => {
                write!(f, "Unknown message type '{}'", kind)
            },
            Error::AlreadyRunning(msg_id) => {
                write!(
                    f,
                    "A request with message ID {} is already registered",
                    msg_id
                )
            },
            Error::ChannelClosed(channel) => {
                write!(f, "The {} channel is shut down", channel)
            },
            Error::CommTargetNotFound(stderr) => {
                write!(f, "The kernel rejected the comm open request: {}", stderr)
            },
            Error::ReadConnectionFile(err) => {
                write!(f, "Could not read connection file: {}", err)
            },
            Error::ParseConnectionFile(err) => {
                write!(f, "Could not parse connection file: {}", err)
            },
        }
    }
}
