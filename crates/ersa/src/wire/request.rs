/*
 * request.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use crate::error::Error;
use crate::session::Session;
use crate::socket::channel::Channel;
use crate::wire::comm_close::CommClose;
use crate::wire::comm_info_request::CommInfoRequest;
use crate::wire::comm_msg::CommWireMsg;
use crate::wire::comm_open::CommOpen;
use crate::wire::complete_request::CompleteRequest;
use crate::wire::debug_request::DebugRequest;
use crate::wire::execute_request::ExecuteRequest;
use crate::wire::header::JupyterHeader;
use crate::wire::history_request::HistoryRequest;
use crate::wire::input_reply::InputReply;
use crate::wire::inspect_request::InspectRequest;
use crate::wire::interrupt_request::InterruptRequest;
use crate::wire::is_complete_request::IsCompleteRequest;
use crate::wire::jupyter_message::JupyterMessage;
use crate::wire::kernel_info_request::KernelInfoRequest;
use crate::wire::shutdown_request::ShutdownRequest;
use crate::wire::wire_message::WireMessage;

/// List of all requests the sidecar can submit to the kernel. Each request
/// is routed to a fixed channel and, except for the comm messages, expects
/// a fixed reply type whose arrival (together with an idle status) finishes
/// the request/reply cycle.
#[derive(Debug, Clone)]
pub enum Request {
    // Shell
    KernelInfo(JupyterMessage<KernelInfoRequest>),
    Execute(JupyterMessage<ExecuteRequest>),
    Inspect(JupyterMessage<InspectRequest>),
    Complete(JupyterMessage<CompleteRequest>),
    History(JupyterMessage<HistoryRequest>),
    IsComplete(JupyterMessage<IsCompleteRequest>),
    CommInfo(JupyterMessage<CommInfoRequest>),
    CommOpen(JupyterMessage<CommOpen>),
    CommMsg(JupyterMessage<CommWireMsg>),
    CommClose(JupyterMessage<CommClose>),
    // Control
    Interrupt(JupyterMessage<InterruptRequest>),
    Shutdown(JupyterMessage<ShutdownRequest>),
    Debug(JupyterMessage<DebugRequest>),
    // Stdin
    InputReply(JupyterMessage<InputReply>),
}

impl Request {
    pub fn kernel_info(session: &Session) -> Self {
        Request::KernelInfo(JupyterMessage::create(KernelInfoRequest {}, None, session))
    }

    pub fn execute(content: ExecuteRequest, session: &Session) -> Self {
        Request::Execute(JupyterMessage::create(content, None, session))
    }

    pub fn inspect(content: InspectRequest, session: &Session) -> Self {
        Request::Inspect(JupyterMessage::create(content, None, session))
    }

    pub fn complete(content: CompleteRequest, session: &Session) -> Self {
        Request::Complete(JupyterMessage::create(content, None, session))
    }

    pub fn history(content: HistoryRequest, session: &Session) -> Self {
        Request::History(JupyterMessage::create(content, None, session))
    }

    pub fn is_complete(content: IsCompleteRequest, session: &Session) -> Self {
        Request::IsComplete(JupyterMessage::create(content, None, session))
    }

    pub fn comm_info(content: CommInfoRequest, session: &Session) -> Self {
        Request::CommInfo(JupyterMessage::create(content, None, session))
    }

    pub fn comm_open(content: CommOpen, session: &Session) -> Self {
        Request::CommOpen(JupyterMessage::create(content, None, session))
    }

    pub fn comm_msg(content: CommWireMsg, session: &Session) -> Self {
        Request::CommMsg(JupyterMessage::create(content, None, session))
    }

    pub fn comm_close(content: CommClose, session: &Session) -> Self {
        Request::CommClose(JupyterMessage::create(content, None, session))
    }

    pub fn interrupt(session: &Session) -> Self {
        Request::Interrupt(JupyterMessage::create(InterruptRequest {}, None, session))
    }

    pub fn shutdown(content: ShutdownRequest, session: &Session) -> Self {
        Request::Shutdown(JupyterMessage::create(content, None, session))
    }

    pub fn debug(content: DebugRequest, session: &Session) -> Self {
        Request::Debug(JupyterMessage::create(content, None, session))
    }

    pub fn input_reply(content: InputReply, session: &Session) -> Self {
        Request::InputReply(JupyterMessage::create(content, None, session))
    }

    /// The header of the request, regardless of variant.
    pub fn header(&self) -> &JupyterHeader {
        match self {
            Request::KernelInfo(msg) => &msg.header,
            Request::Execute(msg) => &msg.header,
            Request::Inspect(msg) => &msg.header,
            Request::Complete(msg) => &msg.header,
            Request::History(msg) => &msg.header,
            Request::IsComplete(msg) => &msg.header,
            Request::CommInfo(msg) => &msg.header,
            Request::CommOpen(msg) => &msg.header,
            Request::CommMsg(msg) => &msg.header,
            Request::CommClose(msg) => &msg.header,
            Request::Interrupt(msg) => &msg.header,
            Request::Shutdown(msg) => &msg.header,
            Request::Debug(msg) => &msg.header,
            Request::InputReply(msg) => &msg.header,
        }
    }

    pub fn msg_id(&self) -> &str {
        &self.header().msg_id
    }

    pub fn msg_type(&self) -> &str {
        &self.header().msg_type
    }

    /// The channel this request must be submitted on.
    pub fn channel(&self) -> Channel {
        match self {
            Request::Interrupt(_) | Request::Shutdown(_) | Request::Debug(_) => Channel::Control,
            Request::InputReply(_) => Channel::Stdin,
            _ => Channel::Shell,
        }
    }

    /// The reply type whose arrival finishes this request's cycle, or None
    /// for the comm messages (and input replies), which have no reply.
    pub fn expected_reply(&self) -> Option<&'static str> {
        match self {
            Request::KernelInfo(_) => Some("kernel_info_reply"),
            Request::Execute(_) => Some("execute_reply"),
            Request::Inspect(_) => Some("inspect_reply"),
            Request::Complete(_) => Some("complete_reply"),
            Request::History(_) => Some("history_reply"),
            Request::IsComplete(_) => Some("is_complete_reply"),
            Request::CommInfo(_) => Some("comm_info_reply"),
            Request::Interrupt(_) => Some("interrupt_reply"),
            Request::Shutdown(_) => Some("shutdown_reply"),
            Request::Debug(_) => Some("debug_reply"),
            Request::CommOpen(_) | Request::CommMsg(_) | Request::CommClose(_) => None,
            Request::InputReply(_) => None,
        }
    }
}

/// Conversion from a `Request` to a `WireMessage`; used to send requests
/// over a socket.
impl TryFrom<&Request> for WireMessage {
    type Error = crate::error::Error;

    fn try_from(req: &Request) -> Result<Self, Error> {
        match req {
            Request::KernelInfo(msg) => WireMessage::try_from(msg),
            Request::Execute(msg) => WireMessage::try_from(msg),
            Request::Inspect(msg) => WireMessage::try_from(msg),
            Request::Complete(msg) => WireMessage::try_from(msg),
            Request::History(msg) => WireMessage::try_from(msg),
            Request::IsComplete(msg) => WireMessage::try_from(msg),
            Request::CommInfo(msg) => WireMessage::try_from(msg),
            Request::CommOpen(msg) => WireMessage::try_from(msg),
            Request::CommMsg(msg) => WireMessage::try_from(msg),
            Request::CommClose(msg) => WireMessage::try_from(msg),
            Request::Interrupt(msg) => WireMessage::try_from(msg),
            Request::Shutdown(msg) => WireMessage::try_from(msg),
            Request::Debug(msg) => WireMessage::try_from(msg),
            Request::InputReply(msg) => WireMessage::try_from(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_routing() {
        let session = Session::create("").unwrap();
        assert_eq!(Request::kernel_info(&session).channel(), Channel::Shell);
        assert_eq!(Request::interrupt(&session).channel(), Channel::Control);
        assert_eq!(
            Request::input_reply(
                InputReply {
                    value: String::new()
                },
                &session
            )
            .channel(),
            Channel::Stdin
        );
    }

    #[test]
    fn test_expected_replies() {
        let session = Session::create("").unwrap();
        let req = Request::execute(ExecuteRequest::interactive("1+1"), &session);
        assert_eq!(req.expected_reply(), Some("execute_reply"));

        let req = Request::comm_open(
            CommOpen {
                comm_id: String::from("c1"),
                target_name: String::from("test"),
                data: serde_json::Value::Null,
            },
            &session,
        );
        assert_eq!(req.expected_reply(), None);
    }

    #[test]
    fn test_request_header_round_trip() {
        // Parsing the frame we would put on the wire must yield the header
        // the client recorded on the request.
        let session = Session::create("").unwrap();
        let req = Request::kernel_info(&session);
        let wire = WireMessage::try_from(&req).unwrap();
        assert_eq!(wire.header.msg_id, req.msg_id());
        assert_eq!(wire.header.msg_type, "kernel_info_request");
        assert_eq!(wire.header.session, session.session_id);
    }
}
