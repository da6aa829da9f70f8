/*
 * history_request.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

use crate::wire::jupyter_message::MessageType;

/// Represents a request for the kernel's execution history.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HistoryRequest {
    /// Whether to include outputs with the history entries
    pub output: bool,

    /// Whether to return the raw input history
    pub raw: bool,

    /// How history is accessed: "range", "tail" or "search"
    pub hist_access_type: String,

    /// For "range": the session to fetch from (0 is the current session)
    pub session: i64,

    /// For "range": the first line to fetch
    pub start: i64,

    /// For "range": the last line to fetch
    pub stop: i64,

    /// For "tail" and "search": the number of entries to fetch
    pub n: i64,

    /// For "search": the glob pattern to match against
    pub pattern: String,

    /// For "search": whether to omit duplicate entries
    pub unique: bool,
}

impl Default for HistoryRequest {
    fn default() -> Self {
        Self {
            output: false,
            raw: false,
            hist_access_type: String::from("range"),
            session: 0,
            start: 0,
            stop: 0,
            n: 0,
            pattern: String::new(),
            unique: false,
        }
    }
}

impl MessageType for HistoryRequest {
    fn message_type() -> String {
        String::from("history_request")
    }
}
