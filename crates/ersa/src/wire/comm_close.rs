/*
 * comm_close.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

use crate::wire::jupyter_message::MessageType;

/// Represents a request to tear down a custom comm.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CommClose {
    pub comm_id: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl MessageType for CommClose {
    fn message_type() -> String {
        String::from("comm_close")
    }
}
