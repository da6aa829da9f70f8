/*
 * kernel_info_reply.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

use crate::wire::help_link::HelpLink;
use crate::wire::jupyter_message::MessageType;
use crate::wire::jupyter_message::Status;
use crate::wire::language_info::LanguageInfo;

/// Represents a reply to a `kernel_info_request`.
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KernelInfoReply {
    /// The execution status ("ok" or "error")
    pub status: Status,

    /// Version of the messaging protocol
    pub protocol_version: String,

    /// The kernel implementation name (e.g. "ipython")
    pub implementation: Option<String>,

    /// The kernel implementation version
    pub implementation_version: Option<String>,

    /// Information about the language the kernel supports
    pub language_info: LanguageInfo,

    /// A startup banner
    #[serde(default)]
    pub banner: String,

    /// Whether the kernel supports debugging
    pub debugger: Option<bool>,

    /// A list of help links
    #[serde(default)]
    pub help_links: Vec<HelpLink>,
}

impl MessageType for KernelInfoReply {
    fn message_type() -> String {
        String::from("kernel_info_reply")
    }
}
