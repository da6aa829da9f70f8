/*
 * comm_info_request.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

use crate::wire::jupyter_message::MessageType;

/// Represents a request to list the kernel's open comms, optionally
/// filtered by target name.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CommInfoRequest {
    #[serde(default)]
    pub target_name: String,
}

impl MessageType for CommInfoRequest {
    fn message_type() -> String {
        String::from("comm_info_request")
    }
}
