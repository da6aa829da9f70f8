/*
 * hooks.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use async_trait::async_trait;

use crate::error::Error;
use crate::socket::channel::Channel;
use crate::wire::comm_open::CommOpen;
use crate::wire::jupyter_message::JupyterMessage;
use crate::wire::jupyter_message::Message;
use crate::wire::wire_message::WireMessage;

/// Extension points for the cases the dispatch loop cannot route to an
/// action. All hooks are overridable; the defaults log where silence would
/// be unsafe and are otherwise no-ops.
#[async_trait(?Send)]
pub trait SidecarHooks: Send + Sync {
    /// An inbound message with no parent header. The kernel's `starting`
    /// status is the canonical example; hosts tracking kernel state should
    /// observe it here.
    async fn on_orphan(&self, msg: &WireMessage) {
        log::trace!("Ignoring message '{}' with no parent", msg.message_type());
    }

    /// An inbound message whose parent `msg_id` is not in the registry.
    /// Usually means another client is talking to the same kernel.
    async fn on_untracked(&self, msg: &Message) {
        log::debug!(
            "Ignoring '{}' reply to untracked request {:?}",
            msg.msg_type(),
            msg.parent_header().map(|h| h.msg_id.as_str())
        );
    }

    /// An inbound frame that does not parse into any known message type.
    /// Deliberately loud: an unparsed reply can strand the action waiting
    /// for it.
    async fn on_unparseable(&self, msg: &WireMessage, error: &Error) {
        log::warn!(
            "Failed to parse '{}' message from kernel: {}",
            msg.message_type(),
            error
        );
    }

    /// A channel was disconnected; a replacement connection is being
    /// established.
    async fn on_disconnect(&self, channel: Channel) {
        log::warn!("The {} channel disconnected; reconnecting", channel);
    }

    /// A `comm_open` arrived for a target name with no registered handler.
    async fn on_unrecognized_comm_target(&self, msg: &JupyterMessage<CommOpen>) {
        log::debug!(
            "Ignoring comm_open for unrecognized target '{}' (comm_id {})",
            msg.content.target_name,
            msg.content.comm_id
        );
    }

    /// A `comm_msg` or `comm_close` arrived for an unknown comm id.
    async fn on_unrecognized_comm_id(&self, comm_id: &str) {
        log::debug!("Ignoring comm message for unrecognized comm_id {}", comm_id);
    }
}

/// The hooks used when a host does not supply its own.
pub struct DefaultHooks;

#[async_trait(?Send)]
impl SidecarHooks for DefaultHooks {}
