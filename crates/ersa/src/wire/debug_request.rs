/*
 * debug_request.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

use crate::wire::jupyter_message::MessageType;

/// Represents a debug request to the kernel, following the Debug Adapter
/// Protocol request shape; discriminated on the `command` field.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "command")]
pub enum DebugRequest {
    #[serde(rename = "dumpCell")]
    DumpCell {
        #[serde(rename = "type")]
        kind: String,
        arguments: DumpCellArguments,
    },

    #[serde(rename = "debugInfo")]
    DebugInfo {
        #[serde(rename = "type")]
        kind: String,
    },

    #[serde(rename = "inspectVariables")]
    InspectVariables {
        #[serde(rename = "type")]
        kind: String,
    },

    #[serde(rename = "richInspectVariables")]
    RichInspectVariables {
        #[serde(rename = "type")]
        kind: String,
        arguments: RichInspectVariablesArguments,
    },
}

impl DebugRequest {
    /// A `dumpCell` request for the given cell source.
    pub fn dump_cell(code: &str) -> Self {
        DebugRequest::DumpCell {
            kind: String::from("request"),
            arguments: DumpCellArguments {
                code: code.to_string(),
            },
        }
    }

    /// A `debugInfo` request.
    pub fn debug_info() -> Self {
        DebugRequest::DebugInfo {
            kind: String::from("request"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DumpCellArguments {
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RichInspectVariablesArguments {
    pub variable_name: String,
    pub frame_id: i64,
}

impl MessageType for DebugRequest {
    fn message_type() -> String {
        String::from("debug_request")
    }
}
