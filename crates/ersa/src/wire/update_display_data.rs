/*
 * update_display_data.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::wire::jupyter_message::MessageType;

/// Replaces the content of a previously emitted display with a matching
/// `display_id`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UpdateDisplayData {
    /// The data giving the MIME key/value pairs to display
    pub data: Value,

    /// Optional additional metadata
    #[serde(default)]
    pub metadata: Value,

    /// Transient data; carries the `display_id` being updated
    #[serde(default)]
    pub transient: Value,
}

impl MessageType for UpdateDisplayData {
    fn message_type() -> String {
        String::from("update_display_data")
    }
}
