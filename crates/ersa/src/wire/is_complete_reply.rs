/*
 * is_complete_reply.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

use crate::wire::jupyter_message::MessageType;

/// Represents a reply to an `is_complete_request`; states whether a code
/// fragment forms a complete expression.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IsCompleteReply {
    /// The completeness of the code: "complete", "incomplete", "invalid" or
    /// "unknown"
    pub status: String,

    /// If the code is incomplete, the characters to use to indent the next
    /// line
    pub indent: Option<String>,
}

impl MessageType for IsCompleteReply {
    fn message_type() -> String {
        String::from("is_complete_reply")
    }
}
