/*
 * handler.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;

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
use crate::wire::history_reply::HistoryReply;
use crate::wire::input_request::InputRequest;
use crate::wire::inspect_reply::InspectReply;
use crate::wire::interrupt_reply::InterruptReply;
use crate::wire::is_complete_reply::IsCompleteReply;
use crate::wire::jupyter_message::JupyterMessage;
use crate::wire::jupyter_message::Message;
use crate::wire::kernel_info_reply::KernelInfoReply;
use crate::wire::shutdown_reply::ShutdownReply;
use crate::wire::status::KernelStatus;
use crate::wire::stream::StreamOutput;
use crate::wire::update_display_data::UpdateDisplayData;

/// A handler shared between the submitting caller and the dispatch loop.
pub type SharedHandler = Arc<Mutex<dyn Handler>>;

/// Whether a per-type handler method consumed the message. Methods that
/// keep the default implementation report `No`, which routes the message
/// to the `unhandled` fallback.
pub enum Handled {
    Yes,
    No,
}

/// Policy object invoked for each inbound message belonging to an action.
///
/// The provided `handle` method dispatches on the message variant to a
/// per-type method; per-type methods not overridden fall through to the
/// single `unhandled` arm. Implement only the methods you care about:
///
/// ```ignore
/// struct StatusHandler;
///
/// #[async_trait(?Send)]
/// impl Handler for StatusHandler {
///     async fn handle_status(&mut self, msg: &JupyterMessage<KernelStatus>) -> Result<Handled> {
///         println!("kernel is {:?}", msg.content.execution_state);
///         Ok(Handled::Yes)
///     }
/// }
/// ```
#[async_trait(?Send)]
pub trait Handler: Send {
    async fn handle(&mut self, msg: &Message) -> crate::Result<()> {
        let handled = match msg {
            Message::Status(data) => self.handle_status(data).await?,
            Message::ExecuteInput(data) => self.handle_execute_input(data).await?,
            Message::ExecuteResult(data) => self.handle_execute_result(data).await?,
            Message::Stream(data) => self.handle_stream(data).await?,
            Message::DisplayData(data) => self.handle_display_data(data).await?,
            Message::UpdateDisplayData(data) => self.handle_update_display_data(data).await?,
            Message::ExecuteError(data) => self.handle_error(data).await?,
            Message::ExecuteReply(data) => self.handle_execute_reply(data).await?,
            Message::KernelInfoReply(data) => self.handle_kernel_info_reply(data).await?,
            Message::InspectReply(data) => self.handle_inspect_reply(data).await?,
            Message::CompleteReply(data) => self.handle_complete_reply(data).await?,
            Message::HistoryReply(data) => self.handle_history_reply(data).await?,
            Message::IsCompleteReply(data) => self.handle_is_complete_reply(data).await?,
            Message::CommInfoReply(data) => self.handle_comm_info_reply(data).await?,
            Message::InterruptReply(data) => self.handle_interrupt_reply(data).await?,
            Message::ShutdownReply(data) => self.handle_shutdown_reply(data).await?,
            Message::DebugReply(data) => self.handle_debug_reply(data).await?,
            Message::CommOpen(data) => self.handle_comm_open(data).await?,
            Message::CommMsg(data) => self.handle_comm_msg(data).await?,
            Message::CommClose(data) => self.handle_comm_close(data).await?,
            Message::InputRequest(data) => self.handle_input_request(data).await?,
        };
        if let Handled::No = handled {
            self.unhandled(msg).await?;
        }
        Ok(())
    }

    async fn handle_status(
        &mut self,
        _msg: &JupyterMessage<KernelStatus>,
    ) -> crate::Result<Handled> {
        Ok(Handled::No)
    }

    async fn handle_execute_input(
        &mut self,
        _msg: &JupyterMessage<ExecuteInput>,
    ) -> crate::Result<Handled> {
        Ok(Handled::No)
    }

    async fn handle_execute_result(
        &mut self,
        _msg: &JupyterMessage<ExecuteResult>,
    ) -> crate::Result<Handled> {
        Ok(Handled::No)
    }

    async fn handle_stream(
        &mut self,
        _msg: &JupyterMessage<StreamOutput>,
    ) -> crate::Result<Handled> {
        Ok(Handled::No)
    }

    async fn handle_display_data(
        &mut self,
        _msg: &JupyterMessage<DisplayData>,
    ) -> crate::Result<Handled> {
        Ok(Handled::No)
    }

    async fn handle_update_display_data(
        &mut self,
        _msg: &JupyterMessage<UpdateDisplayData>,
    ) -> crate::Result<Handled> {
        Ok(Handled::No)
    }

    async fn handle_error(
        &mut self,
        _msg: &JupyterMessage<ExecuteError>,
    ) -> crate::Result<Handled> {
        Ok(Handled::No)
    }

    async fn handle_execute_reply(
        &mut self,
        _msg: &JupyterMessage<ExecuteReply>,
    ) -> crate::Result<Handled> {
        Ok(Handled::No)
    }

    async fn handle_kernel_info_reply(
        &mut self,
        _msg: &JupyterMessage<KernelInfoReply>,
    ) -> crate::Result<Handled> {
        Ok(Handled::No)
    }

    async fn handle_inspect_reply(
        &mut self,
        _msg: &JupyterMessage<InspectReply>,
    ) -> crate::Result<Handled> {
        Ok(Handled::No)
    }

    async fn handle_complete_reply(
        &mut self,
        _msg: &JupyterMessage<CompleteReply>,
    ) -> crate::Result<Handled> {
        Ok(Handled::No)
    }

    async fn handle_history_reply(
        &mut self,
        _msg: &JupyterMessage<HistoryReply>,
    ) -> crate::Result<Handled> {
        Ok(Handled::No)
    }

    async fn handle_is_complete_reply(
        &mut self,
        _msg: &JupyterMessage<IsCompleteReply>,
    ) -> crate::Result<Handled> {
        Ok(Handled::No)
    }

    async fn handle_comm_info_reply(
        &mut self,
        _msg: &JupyterMessage<CommInfoReply>,
    ) -> crate::Result<Handled> {
        Ok(Handled::No)
    }

    async fn handle_interrupt_reply(
        &mut self,
        _msg: &JupyterMessage<InterruptReply>,
    ) -> crate::Result<Handled> {
        Ok(Handled::No)
    }

    async fn handle_shutdown_reply(
        &mut self,
        _msg: &JupyterMessage<ShutdownReply>,
    ) -> crate::Result<Handled> {
        Ok(Handled::No)
    }

    async fn handle_debug_reply(
        &mut self,
        _msg: &JupyterMessage<DebugReply>,
    ) -> crate::Result<Handled> {
        Ok(Handled::No)
    }

    async fn handle_comm_open(&mut self, _msg: &JupyterMessage<CommOpen>) -> crate::Result<Handled> {
        Ok(Handled::No)
    }

    async fn handle_comm_msg(
        &mut self,
        _msg: &JupyterMessage<CommWireMsg>,
    ) -> crate::Result<Handled> {
        Ok(Handled::No)
    }

    async fn handle_comm_close(
        &mut self,
        _msg: &JupyterMessage<CommClose>,
    ) -> crate::Result<Handled> {
        Ok(Handled::No)
    }

    async fn handle_input_request(
        &mut self,
        _msg: &JupyterMessage<InputRequest>,
    ) -> crate::Result<Handled> {
        Ok(Handled::No)
    }

    /// Called for messages whose per-type method kept its default
    /// implementation.
    async fn unhandled(&mut self, _msg: &Message) -> crate::Result<()> {
        Ok(())
    }

    /// Called exactly once when the action this handler is attached to has
    /// finished its request/reply cycle.
    async fn on_action_complete(&mut self) -> crate::Result<()> {
        Ok(())
    }
}

/// Records every message delivered to it, keyed by message type. Useful
/// for tests and for debugging a kernel conversation:
///
/// ```ignore
/// let handler = DebugHandler::shared();
/// let action = client.kernel_info_request(vec![handler.clone()])?;
/// action.wait();
/// assert_eq!(handler.lock().unwrap().count("status"), 2);
/// ```
#[derive(Default, Debug)]
pub struct DebugHandler {
    counts: HashMap<String, usize>,
    last_msg_by_type: HashMap<String, Message>,
}

impl DebugHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Mutex<DebugHandler>> {
        Arc::new(Mutex::new(Self::new()))
    }

    /// The number of messages of the given type delivered so far.
    pub fn count(&self, msg_type: &str) -> usize {
        self.counts.get(msg_type).copied().unwrap_or(0)
    }

    /// All counts, keyed by message type.
    pub fn counts(&self) -> &HashMap<String, usize> {
        &self.counts
    }

    /// The most recent message of the given type, if one arrived.
    pub fn last_msg(&self, msg_type: &str) -> Option<&Message> {
        self.last_msg_by_type.get(msg_type)
    }
}

#[async_trait(?Send)]
impl Handler for DebugHandler {
    // A catch-all: no per-type methods are overridden, so every message
    // lands here.
    async fn unhandled(&mut self, msg: &Message) -> crate::Result<()> {
        let msg_type = msg.msg_type();
        *self.counts.entry(msg_type.clone()).or_insert(0) += 1;
        self.last_msg_by_type.insert(msg_type, msg.clone());
        Ok(())
    }
}
