/*
 * header.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Represents a Jupyter message header; used for both `header` and
/// `parent_header` on every message.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JupyterHeader {
    /// The unique identifier of the message
    pub msg_id: String,

    /// The session that emitted the message
    pub session: String,

    /// The username of the user who, conceptually, sent the message
    pub username: String,

    /// ISO 8601 timestamp for when the message was created
    pub date: String,

    /// The type of the message; the discriminator for the content payload
    pub msg_type: String,

    /// The version of the Jupyter wire protocol in use
    pub version: String,
}

impl JupyterHeader {
    /// Creates a new header with a freshly generated message ID.
    pub fn create(msg_type: String, session: String, username: String) -> Self {
        Self {
            msg_id: Uuid::new_v4().to_string(),
            session,
            username,
            date: chrono::Utc::now().to_rfc3339(),
            msg_type,
            version: String::from("5.3"),
        }
    }
}
