/*
 * comm.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use stdext::result::ResultOrLog;

use crate::handler::Handled;
use crate::handler::Handler;
use crate::handler::SharedHandler;
use crate::hooks::SidecarHooks;
use crate::wire::comm_close::CommClose;
use crate::wire::comm_msg::CommWireMsg;
use crate::wire::comm_open::CommOpen;
use crate::wire::jupyter_message::JupyterMessage;
use crate::wire::jupyter_message::Message;

/// Creates a comm handler instance for a freshly opened comm; receives the
/// comm id the handler is bound to.
pub type CommHandlerFactory = Box<dyn Fn(String) -> SharedHandler + Send>;

/// Routes the comm sub-protocol. Comms don't fit the request/reply
/// paradigm: an execute request might cause comm messages to be emitted,
/// and a comm request might see comm replies under any parent. The comm
/// manager is therefore attached as the terminal handler of every action,
/// and owns the lifetime of the per-comm handlers, keyed by comm id.
pub struct CommManager {
    /// Handler factories, keyed by comm target name; populated by the host
    targets: HashMap<String, CommHandlerFactory>,

    /// Live comm handlers, keyed by comm id
    comms: HashMap<String, SharedHandler>,

    hooks: Arc<dyn SidecarHooks>,
}

impl CommManager {
    pub fn new(hooks: Arc<dyn SidecarHooks>) -> Self {
        Self {
            targets: HashMap::new(),
            comms: HashMap::new(),
            hooks,
        }
    }

    /// Registers a handler factory for a comm target. Any `comm_open` seen
    /// for this target name instantiates a handler bound to the new comm id.
    pub fn register_target(&mut self, target_name: &str, factory: CommHandlerFactory) {
        self.targets.insert(target_name.to_string(), factory);
    }

    /// Registers a live handler for a known comm id. Used when the sidecar
    /// itself initiates a comm and already knows the id.
    pub fn register_comm(&mut self, comm_id: &str, handler: SharedHandler) {
        log::debug!("Registered comm {}", comm_id);
        self.comms.insert(comm_id.to_string(), handler);
    }

    /// The handler for a comm id, if the comm is open.
    pub fn comm(&self, comm_id: &str) -> Option<SharedHandler> {
        self.comms.get(comm_id).cloned()
    }

    pub fn is_open(&self, comm_id: &str) -> bool {
        self.comms.contains_key(comm_id)
    }

    /// The number of live comms.
    pub fn len(&self) -> usize {
        self.comms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comms.is_empty()
    }

    async fn deliver(&self, handler: &SharedHandler, msg: Message) {
        let mut handler = handler.lock().unwrap();
        handler
            .handle(&msg)
            .await
            .or_log_warning("Comm handler failed");
    }
}

#[async_trait(?Send)]
impl Handler for CommManager {
    async fn handle_comm_open(&mut self, msg: &JupyterMessage<CommOpen>) -> crate::Result<Handled> {
        let comm_id = msg.content.comm_id.clone();
        let handler = match self.comms.get(&comm_id) {
            // A second comm_open for a known id is tolerated; deliver to
            // the existing handler.
            Some(handler) => handler.clone(),
            None => {
                let factory = match self.targets.get(&msg.content.target_name) {
                    Some(factory) => factory,
                    None => {
                        self.hooks.on_unrecognized_comm_target(msg).await;
                        return Ok(Handled::Yes);
                    },
                };
                let handler = factory(comm_id.clone());
                self.comms.insert(comm_id.clone(), handler.clone());
                log::debug!(
                    "Registered comm {} for target '{}'; {} comms open",
                    comm_id,
                    msg.content.target_name,
                    self.comms.len()
                );
                handler
            },
        };
        self.deliver(&handler, Message::CommOpen(msg.clone())).await;
        Ok(Handled::Yes)
    }

    async fn handle_comm_msg(&mut self, msg: &JupyterMessage<CommWireMsg>) -> crate::Result<Handled> {
        let handler = match self.comms.get(&msg.content.comm_id) {
            Some(handler) => handler.clone(),
            None => {
                self.hooks.on_unrecognized_comm_id(&msg.content.comm_id).await;
                return Ok(Handled::Yes);
            },
        };
        self.deliver(&handler, Message::CommMsg(msg.clone())).await;
        Ok(Handled::Yes)
    }

    async fn handle_comm_close(&mut self, msg: &JupyterMessage<CommClose>) -> crate::Result<Handled> {
        let comm_id = msg.content.comm_id.clone();
        let handler = match self.comms.get(&comm_id) {
            Some(handler) => handler.clone(),
            None => {
                self.hooks.on_unrecognized_comm_id(&comm_id).await;
                return Ok(Handled::Yes);
            },
        };
        // Deliver the close to the handler, then destroy it.
        self.deliver(&handler, Message::CommClose(msg.clone())).await;
        self.comms.remove(&comm_id);
        log::debug!("Closed comm {}; {} comms open", comm_id, self.comms.len());
        Ok(Handled::Yes)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::executor::block_on;
    use serde_json::json;

    use super::*;
    use crate::hooks::DefaultHooks;
    use crate::session::Session;

    struct Recorder {
        comm_id: String,
        delivered: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait(?Send)]
    impl Handler for Recorder {
        async fn unhandled(&mut self, msg: &Message) -> crate::Result<()> {
            self.delivered
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.comm_id, msg.msg_type()));
            Ok(())
        }
    }

    fn manager_with_target(target: &str) -> (CommManager, Arc<Mutex<Vec<String>>>) {
        let mut manager = CommManager::new(Arc::new(DefaultHooks));
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let delivered_ref = delivered.clone();
        manager.register_target(
            target,
            Box::new(move |comm_id| {
                Arc::new(Mutex::new(Recorder {
                    comm_id,
                    delivered: delivered_ref.clone(),
                })) as SharedHandler
            }),
        );
        (manager, delivered)
    }

    fn comm_open_msg(comm_id: &str, target: &str) -> JupyterMessage<CommOpen> {
        let session = Session::create("").unwrap();
        JupyterMessage::create(
            CommOpen {
                comm_id: comm_id.to_string(),
                target_name: target.to_string(),
                data: json!({}),
            },
            None,
            &session,
        )
    }

    fn comm_close_msg(comm_id: &str) -> JupyterMessage<CommClose> {
        let session = Session::create("").unwrap();
        JupyterMessage::create(
            CommClose {
                comm_id: comm_id.to_string(),
                data: json!({}),
            },
            None,
            &session,
        )
    }

    #[test]
    fn test_open_instantiates_handler() {
        let (mut manager, delivered) = manager_with_target("test_comm");
        block_on(manager.handle_comm_open(&comm_open_msg("c1", "test_comm"))).unwrap();
        assert!(manager.is_open("c1"));
        assert_eq!(*delivered.lock().unwrap(), vec![String::from("c1:comm_open")]);
    }

    #[test]
    fn test_duplicate_open_is_idempotent() {
        let (mut manager, delivered) = manager_with_target("test_comm");
        block_on(manager.handle_comm_open(&comm_open_msg("c1", "test_comm"))).unwrap();
        block_on(manager.handle_comm_open(&comm_open_msg("c1", "test_comm"))).unwrap();
        // Still one handler; the second open was delivered to it, not to a
        // fresh instance.
        assert_eq!(manager.len(), 1);
        assert_eq!(delivered.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_target_is_ignored() {
        let (mut manager, delivered) = manager_with_target("test_comm");
        block_on(manager.handle_comm_open(&comm_open_msg("c1", "widget"))).unwrap();
        assert!(!manager.is_open("c1"));
        assert!(delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_comm_id_does_not_panic() {
        let session = Session::create("").unwrap();
        let mut manager = CommManager::new(Arc::new(DefaultHooks));
        let msg = JupyterMessage::create(
            CommWireMsg {
                comm_id: String::from("nope"),
                data: json!({}),
            },
            None,
            &session,
        );
        block_on(manager.handle_comm_msg(&msg)).unwrap();
    }

    #[test]
    fn test_close_delivers_then_removes() {
        let (mut manager, delivered) = manager_with_target("test_comm");
        block_on(manager.handle_comm_open(&comm_open_msg("c1", "test_comm"))).unwrap();
        block_on(manager.handle_comm_close(&comm_close_msg("c1"))).unwrap();

        assert!(!manager.is_open("c1"));
        assert_eq!(
            *delivered.lock().unwrap(),
            vec![String::from("c1:comm_open"), String::from("c1:comm_close")]
        );
    }
}
