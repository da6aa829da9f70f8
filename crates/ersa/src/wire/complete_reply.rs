/*
 * complete_reply.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::wire::jupyter_message::MessageType;
use crate::wire::jupyter_message::Status;

/// Represents a reply to a `complete_request`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CompleteReply {
    /// The status of the request (usually "ok")
    pub status: Status,

    /// The candidate completions
    #[serde(default)]
    pub matches: Vec<String>,

    /// The starting position of the text to replace with a completion
    pub cursor_start: u32,

    /// The ending position of the text to replace with a completion
    pub cursor_end: u32,

    /// Optional additional metadata
    #[serde(default)]
    pub metadata: Value,
}

impl MessageType for CompleteReply {
    fn message_type() -> String {
        String::from("complete_reply")
    }
}
