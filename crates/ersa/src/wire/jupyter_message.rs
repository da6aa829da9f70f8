/*
 * jupyter_message.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::session::Session;
use crate::wire::comm_close::CommClose;
use crate::wire::comm_info_reply::CommInfoReply;
use crate::wire::comm_msg::CommWireMsg;
use crate::wire::comm_open::CommOpen;
use crate::wire::complete_reply::CompleteReply;
use crate::wire::debug_reply::DebugReply;
use crate::wire::display_data::DisplayData;
use crate::wire::execute_error::ExecuteError;
use crate::wire::execute_input::ExecuteInput;
use crate::wire::execute_reply::ExecuteReply;
use crate::wire::execute_result::ExecuteResult;
use crate::wire::header::JupyterHeader;
use crate::wire::history_reply::HistoryReply;
use crate::wire::input_request::InputRequest;
use crate::wire::inspect_reply::InspectReply;
use crate::wire::interrupt_reply::InterruptReply;
use crate::wire::is_complete_reply::IsCompleteReply;
use crate::wire::kernel_info_reply::KernelInfoReply;
use crate::wire::shutdown_reply::ShutdownReply;
use crate::wire::status::KernelStatus;
use crate::wire::stream::StreamOutput;
use crate::wire::update_display_data::UpdateDisplayData;
use crate::wire::wire_message::WireMessage;

/// Represents a Jupyter message with typed content
#[derive(Debug, Clone)]
pub struct JupyterMessage<T> {
    /// The ZeroMQ identities (for ROUTER sockets)
    pub zmq_identities: Vec<Vec<u8>>,

    /// The header for this message
    pub header: JupyterHeader,

    /// The header of the message from which this message originated.
    /// Optional; not all messages have a parent.
    pub parent_header: Option<JupyterHeader>,

    /// The body (payload) of the message
    pub content: T,
}

/// Trait used to extract the wire message type from a Jupyter message
pub trait MessageType {
    fn message_type() -> String;
}

/// Convenience trait for grouping traits that must be present on all
/// Jupyter protocol messages
pub trait ProtocolMessage: MessageType + Serialize + std::fmt::Debug + Clone {}
impl<T> ProtocolMessage for T where T: MessageType + Serialize + std::fmt::Debug + Clone {}

/// List of all inbound messages the kernel can deliver to the sidecar. The
/// discriminator is the outer `msg_type`; anything else fails parsing with
/// `Error::UnknownMessageType`.
#[derive(Debug, Clone)]
pub enum Message {
    // IOPub
    Status(JupyterMessage<KernelStatus>),
    ExecuteInput(JupyterMessage<ExecuteInput>),
    ExecuteResult(JupyterMessage<ExecuteResult>),
    Stream(JupyterMessage<StreamOutput>),
    DisplayData(JupyterMessage<DisplayData>),
    UpdateDisplayData(JupyterMessage<UpdateDisplayData>),
    ExecuteError(JupyterMessage<ExecuteError>),
    // Shell replies
    ExecuteReply(JupyterMessage<ExecuteReply>),
    KernelInfoReply(JupyterMessage<KernelInfoReply>),
    InspectReply(JupyterMessage<InspectReply>),
    CompleteReply(JupyterMessage<CompleteReply>),
    HistoryReply(JupyterMessage<HistoryReply>),
    IsCompleteReply(JupyterMessage<IsCompleteReply>),
    CommInfoReply(JupyterMessage<CommInfoReply>),
    // Control replies
    InterruptReply(JupyterMessage<InterruptReply>),
    ShutdownReply(JupyterMessage<ShutdownReply>),
    DebugReply(JupyterMessage<DebugReply>),
    // IOPub/Shell
    CommOpen(JupyterMessage<CommOpen>),
    CommMsg(JupyterMessage<CommWireMsg>),
    CommClose(JupyterMessage<CommClose>),
    // Stdin
    InputRequest(JupyterMessage<InputRequest>),
}

/// Represents a status returned inside reply messages.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Error,
}

impl TryFrom<&WireMessage> for Message {
    type Error = crate::error::Error;

    /// Converts from a wire message to a typed message by examining the
    /// message type and attempting to coerce the content into the
    /// appropriate structure.
    ///
    /// Only messages received *from* the kernel are convertible here;
    /// request types never appear on the inbound path.
    fn try_from(msg: &WireMessage) -> Result<Self, Error> {
        let kind = msg.header.msg_type.clone();

        if kind == KernelStatus::message_type() {
            return Ok(Message::Status(JupyterMessage::try_from(msg)?));
        }
        if kind == ExecuteInput::message_type() {
            return Ok(Message::ExecuteInput(JupyterMessage::try_from(msg)?));
        }
        if kind == ExecuteResult::message_type() {
            return Ok(Message::ExecuteResult(JupyterMessage::try_from(msg)?));
        }
        if kind == StreamOutput::message_type() {
            return Ok(Message::Stream(JupyterMessage::try_from(msg)?));
        }
        if kind == DisplayData::message_type() {
            return Ok(Message::DisplayData(JupyterMessage::try_from(msg)?));
        }
        if kind == UpdateDisplayData::message_type() {
            return Ok(Message::UpdateDisplayData(JupyterMessage::try_from(msg)?));
        }
        if kind == ExecuteError::message_type() {
            return Ok(Message::ExecuteError(JupyterMessage::try_from(msg)?));
        }
        if kind == ExecuteReply::message_type() {
            return Ok(Message::ExecuteReply(JupyterMessage::try_from(msg)?));
        }
        if kind == KernelInfoReply::message_type() {
            return Ok(Message::KernelInfoReply(JupyterMessage::try_from(msg)?));
        }
        if kind == InspectReply::message_type() {
            return Ok(Message::InspectReply(JupyterMessage::try_from(msg)?));
        }
        if kind == CompleteReply::message_type() {
            return Ok(Message::CompleteReply(JupyterMessage::try_from(msg)?));
        }
        if kind == HistoryReply::message_type() {
            return Ok(Message::HistoryReply(JupyterMessage::try_from(msg)?));
        }
        if kind == IsCompleteReply::message_type() {
            return Ok(Message::IsCompleteReply(JupyterMessage::try_from(msg)?));
        }
        if kind == CommInfoReply::message_type() {
            return Ok(Message::CommInfoReply(JupyterMessage::try_from(msg)?));
        }
        if kind == InterruptReply::message_type() {
            return Ok(Message::InterruptReply(JupyterMessage::try_from(msg)?));
        }
        if kind == ShutdownReply::message_type() {
            return Ok(Message::ShutdownReply(JupyterMessage::try_from(msg)?));
        }
        if kind == DebugReply::message_type() {
            return Ok(Message::DebugReply(JupyterMessage::try_from(msg)?));
        }
        if kind == CommOpen::message_type() {
            return Ok(Message::CommOpen(JupyterMessage::try_from(msg)?));
        }
        if kind == CommWireMsg::message_type() {
            return Ok(Message::CommMsg(JupyterMessage::try_from(msg)?));
        }
        if kind == CommClose::message_type() {
            return Ok(Message::CommClose(JupyterMessage::try_from(msg)?));
        }
        if kind == InputRequest::message_type() {
            return Ok(Message::InputRequest(JupyterMessage::try_from(msg)?));
        }
        Err(Error::UnknownMessageType(kind))
    }
}

impl Message {
    /// The header of the message, regardless of variant.
    pub fn header(&self) -> &JupyterHeader {
        match self {
            Message::Status(msg) => &msg.header,
            Message::ExecuteInput(msg) => &msg.header,
            Message::ExecuteResult(msg) => &msg.header,
            Message::Stream(msg) => &msg.header,
            Message::DisplayData(msg) => &msg.header,
            Message::UpdateDisplayData(msg) => &msg.header,
            Message::ExecuteError(msg) => &msg.header,
            Message::ExecuteReply(msg) => &msg.header,
            Message::KernelInfoReply(msg) => &msg.header,
            Message::InspectReply(msg) => &msg.header,
            Message::CompleteReply(msg) => &msg.header,
            Message::HistoryReply(msg) => &msg.header,
            Message::IsCompleteReply(msg) => &msg.header,
            Message::CommInfoReply(msg) => &msg.header,
            Message::InterruptReply(msg) => &msg.header,
            Message::ShutdownReply(msg) => &msg.header,
            Message::DebugReply(msg) => &msg.header,
            Message::CommOpen(msg) => &msg.header,
            Message::CommMsg(msg) => &msg.header,
            Message::CommClose(msg) => &msg.header,
            Message::InputRequest(msg) => &msg.header,
        }
    }

    /// The parent header of the message, if any.
    pub fn parent_header(&self) -> Option<&JupyterHeader> {
        match self {
            Message::Status(msg) => msg.parent_header.as_ref(),
            Message::ExecuteInput(msg) => msg.parent_header.as_ref(),
            Message::ExecuteResult(msg) => msg.parent_header.as_ref(),
            Message::Stream(msg) => msg.parent_header.as_ref(),
            Message::DisplayData(msg) => msg.parent_header.as_ref(),
            Message::UpdateDisplayData(msg) => msg.parent_header.as_ref(),
            Message::ExecuteError(msg) => msg.parent_header.as_ref(),
            Message::ExecuteReply(msg) => msg.parent_header.as_ref(),
            Message::KernelInfoReply(msg) => msg.parent_header.as_ref(),
            Message::InspectReply(msg) => msg.parent_header.as_ref(),
            Message::CompleteReply(msg) => msg.parent_header.as_ref(),
            Message::HistoryReply(msg) => msg.parent_header.as_ref(),
            Message::IsCompleteReply(msg) => msg.parent_header.as_ref(),
            Message::CommInfoReply(msg) => msg.parent_header.as_ref(),
            Message::InterruptReply(msg) => msg.parent_header.as_ref(),
            Message::ShutdownReply(msg) => msg.parent_header.as_ref(),
            Message::DebugReply(msg) => msg.parent_header.as_ref(),
            Message::CommOpen(msg) => msg.parent_header.as_ref(),
            Message::CommMsg(msg) => msg.parent_header.as_ref(),
            Message::CommClose(msg) => msg.parent_header.as_ref(),
            Message::InputRequest(msg) => msg.parent_header.as_ref(),
        }
    }

    /// The `msg_type` discriminator of the message.
    pub fn msg_type(&self) -> String {
        self.header().msg_type.clone()
    }

    /// Whether this is one of the comm sub-protocol messages; these are
    /// still delivered to the comm manager after an action completes.
    pub fn is_comm(&self) -> bool {
        matches!(
            self,
            Message::CommOpen(_) | Message::CommMsg(_) | Message::CommClose(_)
        )
    }
}

impl<T> JupyterMessage<T>
where
    T: ProtocolMessage,
{
    /// Create a new Jupyter message, optionally as a child (reply) to an
    /// existing message.
    pub fn create(
        content: T,
        parent: Option<JupyterHeader>,
        session: &Session,
    ) -> JupyterMessage<T> {
        JupyterMessage::<T> {
            zmq_identities: Vec::new(),
            header: JupyterHeader::create(
                T::message_type(),
                session.session_id.clone(),
                session.username.clone(),
            ),
            parent_header: parent,
            content,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::wire::execute_reply::ExecuteReply;
    use crate::wire::status::ExecutionState;

    fn wire_from_parts(msg_type: &str, content: serde_json::Value) -> WireMessage {
        let session = Session::create("").unwrap();
        let header = JupyterHeader::create(
            msg_type.to_string(),
            session.session_id.clone(),
            session.username.clone(),
        );
        let parent = JupyterHeader::create(
            String::from("execute_request"),
            session.session_id.clone(),
            session.username,
        );
        WireMessage {
            zmq_identities: Vec::new(),
            header,
            parent_header: Some(parent),
            metadata: json!({}),
            content,
            buffers: Vec::new(),
        }
    }

    #[test]
    fn test_parse_status() {
        let wire = wire_from_parts("status", json!({ "execution_state": "busy" }));
        assert_matches!(Message::try_from(&wire), Ok(Message::Status(msg)) => {
            assert_eq!(msg.content.execution_state, ExecutionState::Busy);
        });
    }

    #[test]
    fn test_parse_unknown_type() {
        let wire = wire_from_parts("flimflam_request", json!({}));
        assert_matches!(
            Message::try_from(&wire),
            Err(Error::UnknownMessageType(kind)) => {
                assert_eq!(kind, "flimflam_request");
            }
        );
    }

    #[test]
    fn test_execute_reply_discriminators() {
        let wire = wire_from_parts(
            "execute_reply",
            json!({ "status": "ok", "execution_count": 4 }),
        );
        assert_matches!(Message::try_from(&wire), Ok(Message::ExecuteReply(msg)) => {
            assert_matches!(msg.content, ExecuteReply::Ok { execution_count, .. } => {
                assert_eq!(execution_count, 4);
            });
        });

        let wire = wire_from_parts(
            "execute_reply",
            json!({
                "status": "error",
                "execution_count": 5,
                "ename": "ZeroDivisionError",
                "evalue": "division by zero",
                "traceback": ["..."],
                "engine_info": {}
            }),
        );
        assert_matches!(Message::try_from(&wire), Ok(Message::ExecuteReply(msg)) => {
            assert_matches!(msg.content, ExecuteReply::Error { ref ename, .. } => {
                assert_eq!(ename, "ZeroDivisionError");
            });
        });

        let wire = wire_from_parts("execute_reply", json!({ "status": "aborted" }));
        assert_matches!(Message::try_from(&wire), Ok(Message::ExecuteReply(msg)) => {
            assert_matches!(msg.content, ExecuteReply::Aborted {});
        });
    }

    #[test]
    fn test_debug_reply_discriminator() {
        let wire = wire_from_parts(
            "debug_reply",
            json!({
                "type": "response",
                "command": "dumpCell",
                "success": true,
                "body": { "sourcePath": "/tmp/cell.py" }
            }),
        );
        assert_matches!(Message::try_from(&wire), Ok(Message::DebugReply(msg)) => {
            assert_matches!(msg.content, crate::wire::debug_reply::DebugReply::DumpCell { ref body, .. } => {
                assert_eq!(body.source_path, "/tmp/cell.py");
            });
        });
    }

    #[test]
    fn test_content_round_trip() {
        // Serializing a parsed message and reparsing must yield the same
        // message, with defaults normalized on both sides.
        let original = json!({
            "status": "ok",
            "execution_count": 7,
        });
        let reply: ExecuteReply = serde_json::from_value(original).unwrap();
        let serialized = serde_json::to_value(reply.clone()).unwrap();
        assert_eq!(serialized["status"], "ok");
        let reparsed: ExecuteReply = serde_json::from_value(serialized).unwrap();
        assert_matches!(reparsed, ExecuteReply::Ok { execution_count, ref payload, .. } => {
            assert_eq!(execution_count, 7);
            assert!(payload.is_empty());
        });
    }
}
