/*
 * history_reply.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::wire::jupyter_message::MessageType;
use crate::wire::jupyter_message::Status;

/// Represents a reply to a `history_request`. Each history entry is a
/// `(session, line_number, input_or_output)` tuple.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HistoryReply {
    /// The status of the request (usually "ok")
    pub status: Status,

    /// The requested history entries
    #[serde(default)]
    pub history: Vec<Value>,
}

impl MessageType for HistoryReply {
    fn message_type() -> String {
        String::from("history_reply")
    }
}
