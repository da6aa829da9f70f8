/*
 * execute_reply.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::wire::jupyter_message::MessageType;

/// Represents a reply to an `execute_request`. The wire content is further
/// discriminated on its `status` field: the ok/error/aborted cases carry
/// different field sets, so the content is modeled as a nested tagged union
/// rather than one struct of options.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecuteReply {
    Ok {
        /// Monotonically increasing execution counter
        execution_count: u32,

        /// Deprecated but still widely used payloads (pagers, set_next_input)
        #[serde(default)]
        payload: Vec<Value>,

        /// Results for user expressions
        #[serde(default)]
        user_expressions: Value,
    },

    Error {
        execution_count: u32,

        /// The name of the exception that aborted execution
        ename: String,

        /// The value/description of the exception
        evalue: String,

        /// List of traceback frames, as strings
        #[serde(default)]
        traceback: Vec<String>,

        /// Information about the engine that raised, if any
        #[serde(default)]
        engine_info: Value,

        #[serde(default)]
        payload: Vec<Value>,

        #[serde(default)]
        user_expressions: Value,
    },

    /// The request was thrown away without executing, typically because an
    /// earlier request in the queue failed with `stop_on_error` set.
    Aborted {},
}

impl ExecuteReply {
    /// The `status` discriminator as it appears on the wire.
    pub fn status(&self) -> &'static str {
        match self {
            ExecuteReply::Ok { .. } => "ok",
            ExecuteReply::Error { .. } => "error",
            ExecuteReply::Aborted {} => "aborted",
        }
    }
}

impl MessageType for ExecuteReply {
    fn message_type() -> String {
        String::from("execute_reply")
    }
}
