/*
 * shutdown_reply.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

use crate::wire::jupyter_message::MessageType;
use crate::wire::jupyter_message::Status;

/// Represents a reply to a `shutdown_request`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ShutdownReply {
    /// The status of the request (usually "ok")
    pub status: Status,

    /// Echoes the `restart` flag from the request
    pub restart: bool,
}

impl MessageType for ShutdownReply {
    fn message_type() -> String {
        String::from("shutdown_reply")
    }
}
