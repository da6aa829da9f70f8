/*
 * debug_reply.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::wire::jupyter_message::MessageType;

/// Represents a reply to a `debug_request`. The content follows the Debug
/// Adapter Protocol response shape and is further discriminated on its
/// `command` field.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "command")]
pub enum DebugReply {
    #[serde(rename = "dumpCell")]
    DumpCell {
        #[serde(rename = "type")]
        kind: String,
        success: bool,
        body: DumpCellBody,
    },

    #[serde(rename = "debugInfo")]
    DebugInfo {
        #[serde(rename = "type")]
        kind: String,
        success: bool,
        body: DebugInfoBody,
    },

    #[serde(rename = "inspectVariables")]
    InspectVariables {
        #[serde(rename = "type")]
        kind: String,
        success: bool,
        #[serde(default)]
        body: Value,
    },

    #[serde(rename = "richInspectVariables")]
    RichInspectVariables {
        #[serde(rename = "type")]
        kind: String,
        success: bool,
        #[serde(default)]
        body: Value,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DumpCellBody {
    /// The path of the temporary file the cell source was dumped to
    pub source_path: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfoBody {
    pub is_started: bool,
    pub hash_method: String,
    pub hash_seed: Value,
    pub tmp_file_prefix: String,
    pub tmp_file_suffix: String,
    #[serde(default)]
    pub breakpoints: Vec<Value>,
    #[serde(default)]
    pub stopped_threads: Vec<i64>,
    pub rich_rendering: bool,
    #[serde(default)]
    pub exception_paths: Vec<String>,
}

impl MessageType for DebugReply {
    fn message_type() -> String {
        String::from("debug_reply")
    }
}
