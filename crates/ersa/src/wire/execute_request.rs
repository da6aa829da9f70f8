/*
 * execute_request.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::wire::jupyter_message::MessageType;

/// Represents a request to execute code on the kernel.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExecuteRequest {
    /// The code to be executed
    pub code: String,

    /// Whether the code should be executed silently (not shown to the user)
    pub silent: bool,

    /// Whether the code should be stored in history
    pub store_history: bool,

    /// Mapping of user expressions to be evaluated after code is executed
    #[serde(default)]
    pub user_expressions: Value,

    /// Whether to allow the kernel to send stdin requests
    pub allow_stdin: bool,

    /// Whether the kernel should discard the execution queue if evaluating
    /// the code results in an error
    pub stop_on_error: bool,
}

impl ExecuteRequest {
    /// An execute request with the usual interactive defaults.
    pub fn interactive(code: &str) -> Self {
        Self {
            code: code.to_string(),
            silent: false,
            store_history: true,
            user_expressions: Value::Object(serde_json::Map::new()),
            allow_stdin: true,
            stop_on_error: true,
        }
    }
}

impl MessageType for ExecuteRequest {
    fn message_type() -> String {
        String::from("execute_request")
    }
}
