/*
 * execute_input.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

use crate::wire::jupyter_message::MessageType;

/// Broadcast of the code the kernel is about to execute, so all connected
/// clients can see what was submitted.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExecuteInput {
    /// The code being executed
    pub code: String,

    /// Monotonically increasing execution counter
    pub execution_count: u32,
}

impl MessageType for ExecuteInput {
    fn message_type() -> String {
        String::from("execute_input")
    }
}
