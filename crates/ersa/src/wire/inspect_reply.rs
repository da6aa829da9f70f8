/*
 * inspect_reply.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::wire::jupyter_message::MessageType;
use crate::wire::jupyter_message::Status;

/// Represents a reply to an `inspect_request`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InspectReply {
    /// The status of the request (usually "ok")
    pub status: Status,

    /// Whether the kernel found anything to inspect at the cursor
    pub found: bool,

    /// The inspection result, as a MIME bundle
    #[serde(default)]
    pub data: Value,

    /// Optional additional metadata
    #[serde(default)]
    pub metadata: Value,
}

impl MessageType for InspectReply {
    fn message_type() -> String {
        String::from("inspect_reply")
    }
}
