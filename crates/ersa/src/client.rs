/*
 * client.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use crossbeam::channel::bounded;
use crossbeam::channel::unbounded;
use crossbeam::channel::Receiver;
use crossbeam::channel::Sender;
use crossbeam::select;
use futures::executor::block_on;
use indexmap::IndexMap;
use serde_json::json;
use serde_json::Value;
use stdext::result::ResultOrLog;
use stdext::spawn;
use uuid::Uuid;

use crate::action::Action;
use crate::action::DEFAULT_SAFETY_NET_WINDOW;
use crate::comm::CommHandlerFactory;
use crate::comm::CommManager;
use crate::connection_file::ConnectionFile;
use crate::error::Error;
use crate::handler::Handled;
use crate::handler::Handler;
use crate::handler::SharedHandler;
use crate::hooks::DefaultHooks;
use crate::hooks::SidecarHooks;
use crate::session::Session;
use crate::socket::channel::Channel;
use crate::socket::watcher::spawn_watcher;
use crate::socket::watcher::WatcherConfig;
use crate::wire::comm_close::CommClose;
use crate::wire::comm_info_request::CommInfoRequest;
use crate::wire::comm_msg::CommWireMsg;
use crate::wire::comm_open::CommOpen;
use crate::wire::complete_request::CompleteRequest;
use crate::wire::debug_request::DebugRequest;
use crate::wire::execute_request::ExecuteRequest;
use crate::wire::history_request::HistoryRequest;
use crate::wire::input_reply::InputReply;
use crate::wire::inspect_request::InspectRequest;
use crate::wire::is_complete_request::IsCompleteRequest;
use crate::wire::jupyter_message::JupyterMessage;
use crate::wire::jupyter_message::Message;
use crate::wire::request::Request;
use crate::wire::shutdown_request::ShutdownRequest;
use crate::wire::stream::Stream;
use crate::wire::stream::StreamOutput;
use crate::wire::wire_message::WireMessage;

/// Counts for the events the dispatch loop cannot route to an action.
pub struct Counters {
    disconnects: [AtomicUsize; 4],
    orphans: AtomicUsize,
    untracked: AtomicUsize,
    unparseable: AtomicUsize,
    late_dropped: AtomicUsize,
}

impl Counters {
    fn new() -> Self {
        Self {
            disconnects: Default::default(),
            orphans: AtomicUsize::new(0),
            untracked: AtomicUsize::new(0),
            unparseable: AtomicUsize::new(0),
            late_dropped: AtomicUsize::new(0),
        }
    }

    pub(crate) fn record_disconnect(&self, channel: Channel) {
        self.disconnects[channel.index()].fetch_add(1, Ordering::SeqCst);
    }

    /// How many times the given channel has disconnected (and been cycled).
    pub fn disconnects(&self, channel: Channel) -> usize {
        self.disconnects[channel.index()].load(Ordering::SeqCst)
    }

    /// Messages that arrived with no parent header.
    pub fn orphans(&self) -> usize {
        self.orphans.load(Ordering::SeqCst)
    }

    /// Messages whose parent request is not in the registry.
    pub fn untracked(&self) -> usize {
        self.untracked.load(Ordering::SeqCst)
    }

    /// Frames that did not parse into any known message type.
    pub fn unparseable(&self) -> usize {
        self.unparseable.load(Ordering::SeqCst)
    }

    /// Non-comm messages dropped because their action had already finished.
    pub fn late_dropped(&self) -> usize {
        self.late_dropped.load(Ordering::SeqCst)
    }
}

/// Construction-time configuration for [`SidecarClient`]. No other runtime
/// configuration exists; the client never reads process-global state.
pub struct ClientOptions {
    /// Close a channel's connection when an inbound frame exceeds this
    /// size. Useful when the sidecar has less memory than the kernel and
    /// must not OOM on giant outputs; the disconnect is observed by the
    /// channel watcher, which cycles the connection.
    pub max_message_size: Option<i64>,

    /// Bounds the total time spent in handlers for a single message.
    pub handler_timeout: Option<Duration>,

    /// How long to wait for a missing reply after idle before finishing an
    /// action anyway.
    pub safety_net_window: Duration,

    /// Handlers appended to every action's handler list (after the
    /// action's own handlers, before the comm manager).
    pub default_handlers: Vec<SharedHandler>,

    /// Overrides for the dispatch-loop hooks.
    pub hooks: Option<Arc<dyn SidecarHooks>>,

    /// Pretty-print message bodies into debug logs. Off by default: large
    /// outputs make formatted logging surprisingly expensive.
    pub pretty_logs: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            max_message_size: None,
            handler_timeout: None,
            safety_net_window: DEFAULT_SAFETY_NET_WINDOW,
            default_handlers: Vec::new(),
            hooks: None,
            pretty_logs: false,
        }
    }
}

/// Primary interface between a host application and a kernel.
///
/// - Owns the ZeroMQ connections to the kernel's four channels
/// - Builds typed requests and submits them as waitable [`Action`]s
/// - Watches the channels, parses inbound frames into typed messages, and
///   delegates each to the action that started its request/reply cycle
/// - Carries the comm manager as the terminal handler of every action, so
///   comm traffic is routed no matter which request caused it
pub struct SidecarClient {
    session: Session,

    /// Insertion-ordered registry of in-flight (and finished) actions,
    /// keyed by request msg_id. Inbound messages are routed by looking up
    /// their parent header msg_id here.
    actions: Arc<Mutex<IndexMap<String, Arc<Action>>>>,

    comm_manager: Arc<Mutex<CommManager>>,
    default_handlers: Vec<SharedHandler>,
    counters: Arc<Counters>,
    connected: Arc<Mutex<HashMap<Channel, bool>>>,

    /// Outbound frame queues, drained by the channel reader that owns the
    /// socket; iopub is receive-only and has none
    outbound: HashMap<Channel, Sender<WireMessage>>,

    watchers: Vec<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,

    /// Dropping this closes every watcher and the dispatcher
    shutdown_tx: Option<Sender<()>>,

    safety_net_window: Duration,
    pretty_logs: bool,
}

impl SidecarClient {
    /// Connects to the kernel described by the connection file and starts
    /// the channel watchers and the dispatch loop.
    pub fn connect(connection: &ConnectionFile, options: ClientOptions) -> crate::Result<Self> {
        let session = Session::create(&connection.key)?;
        let ctx = zmq::Context::new();
        let hooks = options
            .hooks
            .unwrap_or_else(|| Arc::new(DefaultHooks) as Arc<dyn SidecarHooks>);

        let counters = Arc::new(Counters::new());
        let comm_manager = Arc::new(Mutex::new(CommManager::new(hooks.clone())));
        let actions: Arc<Mutex<IndexMap<String, Arc<Action>>>> =
            Arc::new(Mutex::new(IndexMap::new()));
        let connected: Arc<Mutex<HashMap<Channel, bool>>> = Arc::new(Mutex::new(
            Channel::ALL.iter().map(|c| (*c, false)).collect(),
        ));

        let (ingress_tx, ingress_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        // The shell and stdin sockets must share a ZeroMQ identity so the
        // kernel can route input requests back to us.
        let identity = session.session_id.as_bytes().to_vec();

        let mut outbound = HashMap::new();
        let mut watchers = Vec::new();
        for channel in Channel::ALL {
            let outbound_rx = match channel {
                Channel::IOPub => None,
                _ => {
                    let (tx, rx) = unbounded();
                    outbound.insert(channel, tx);
                    Some(rx)
                },
            };
            let identity = match channel {
                Channel::Shell | Channel::Stdin => Some(identity.clone()),
                _ => None,
            };
            watchers.push(spawn_watcher(WatcherConfig {
                channel,
                endpoint: connection.endpoint(channel),
                session: session.clone(),
                ctx: ctx.clone(),
                identity,
                ingress_tx: ingress_tx.clone(),
                outbound_rx,
                shutdown_rx: shutdown_rx.clone(),
                connected: connected.clone(),
                counters: counters.clone(),
                hooks: hooks.clone(),
                max_message_size: options.max_message_size,
            }));
        }

        let dispatcher = {
            let actions = actions.clone();
            let comm_manager = comm_manager.clone();
            let counters = counters.clone();
            let handler_timeout = options.handler_timeout;
            let pretty_logs = options.pretty_logs;
            spawn!("dispatcher", move || {
                dispatch(
                    ingress_rx,
                    shutdown_rx,
                    actions,
                    comm_manager,
                    hooks,
                    counters,
                    handler_timeout,
                    pretty_logs,
                )
            })
        };

        Ok(Self {
            session,
            actions,
            comm_manager,
            default_handlers: options.default_handlers,
            counters,
            connected,
            outbound,
            watchers,
            dispatcher: Some(dispatcher),
            shutdown_tx: Some(shutdown_tx),
            safety_net_window: options.safety_net_window,
            pretty_logs: options.pretty_logs,
        })
    }

    /// Submits an action's request to the kernel and registers the action
    /// for reply routing. Handler order on the action becomes: the
    /// action's own handlers, then the client's default handlers, then the
    /// comm manager — so domain handlers always observe a message before
    /// the comm manager mutates comm state.
    pub fn send(&self, action: Action) -> crate::Result<Arc<Action>> {
        if action.sent() {
            return Err(Error::AlreadyRunning(action.msg_id().to_string()));
        }

        let msg_id = action.msg_id().to_string();
        let mut actions = self.actions.lock().unwrap();
        if actions.contains_key(&msg_id) {
            return Err(Error::AlreadyRunning(msg_id));
        }

        for handler in &self.default_handlers {
            action.add_handler(handler.clone());
        }
        let comm_manager: SharedHandler = self.comm_manager.clone();
        action.add_handler(comm_manager);

        let frame = WireMessage::try_from(action.request())?;
        let channel = action.request().channel();
        let sender = self
            .outbound
            .get(&channel)
            .ok_or(Error::ChannelClosed(channel))?;
        sender
            .send(frame)
            .map_err(|_| Error::ChannelClosed(channel))?;

        if self.pretty_logs {
            log::debug!(
                "Sent {} to kernel: {}",
                action.msg_type(),
                pretty_content(action.request())
            );
        } else {
            log::debug!("Sent {} to kernel", action.msg_type());
        }

        action.mark_sent();
        let action = Arc::new(action);
        actions.insert(msg_id, action.clone());
        Ok(action)
    }

    fn new_action(&self, request: Request, handlers: Vec<SharedHandler>) -> Action {
        Action::new(request, handlers).with_safety_net_window(self.safety_net_window)
    }

    pub fn kernel_info_request(&self, handlers: Vec<SharedHandler>) -> crate::Result<Arc<Action>> {
        self.send(self.new_action(Request::kernel_info(&self.session), handlers))
    }

    pub fn execute_request(
        &self,
        code: &str,
        handlers: Vec<SharedHandler>,
    ) -> crate::Result<Arc<Action>> {
        let content = ExecuteRequest::interactive(code);
        self.send(self.new_action(Request::execute(content, &self.session), handlers))
    }

    /// Like [`SidecarClient::execute_request`], with full control over the
    /// request content.
    pub fn execute_request_with(
        &self,
        content: ExecuteRequest,
        handlers: Vec<SharedHandler>,
    ) -> crate::Result<Arc<Action>> {
        self.send(self.new_action(Request::execute(content, &self.session), handlers))
    }

    pub fn complete_request(
        &self,
        code: &str,
        cursor_pos: Option<u32>,
        handlers: Vec<SharedHandler>,
    ) -> crate::Result<Arc<Action>> {
        let content = CompleteRequest {
            code: code.to_string(),
            cursor_pos: cursor_pos.unwrap_or(code.len() as u32),
        };
        self.send(self.new_action(Request::complete(content, &self.session), handlers))
    }

    pub fn inspect_request(
        &self,
        code: &str,
        cursor_pos: Option<u32>,
        detail_level: u32,
        handlers: Vec<SharedHandler>,
    ) -> crate::Result<Arc<Action>> {
        let content = InspectRequest {
            code: code.to_string(),
            cursor_pos: cursor_pos.unwrap_or(code.len() as u32),
            detail_level,
        };
        self.send(self.new_action(Request::inspect(content, &self.session), handlers))
    }

    pub fn history_request(
        &self,
        content: HistoryRequest,
        handlers: Vec<SharedHandler>,
    ) -> crate::Result<Arc<Action>> {
        self.send(self.new_action(Request::history(content, &self.session), handlers))
    }

    pub fn is_complete_request(
        &self,
        code: &str,
        handlers: Vec<SharedHandler>,
    ) -> crate::Result<Arc<Action>> {
        let content = IsCompleteRequest {
            code: code.to_string(),
        };
        self.send(self.new_action(Request::is_complete(content, &self.session), handlers))
    }

    pub fn comm_info_request(
        &self,
        target_name: Option<&str>,
        handlers: Vec<SharedHandler>,
    ) -> crate::Result<Arc<Action>> {
        let content = CommInfoRequest {
            target_name: target_name.unwrap_or("").to_string(),
        };
        self.send(self.new_action(Request::comm_info(content, &self.session), handlers))
    }

    pub fn interrupt_request(&self, handlers: Vec<SharedHandler>) -> crate::Result<Arc<Action>> {
        self.send(self.new_action(Request::interrupt(&self.session), handlers))
    }

    pub fn shutdown_request(
        &self,
        restart: bool,
        handlers: Vec<SharedHandler>,
    ) -> crate::Result<Arc<Action>> {
        let content = ShutdownRequest { restart };
        self.send(self.new_action(Request::shutdown(content, &self.session), handlers))
    }

    pub fn debug_request(
        &self,
        content: DebugRequest,
        handlers: Vec<SharedHandler>,
    ) -> crate::Result<Arc<Action>> {
        self.send(self.new_action(Request::debug(content, &self.session), handlers))
    }

    pub fn comm_open_request(
        &self,
        target_name: &str,
        data: Option<Value>,
        handlers: Vec<SharedHandler>,
    ) -> crate::Result<Arc<Action>> {
        let content = CommOpen {
            comm_id: Uuid::new_v4().to_string(),
            target_name: target_name.to_string(),
            data: data.unwrap_or_else(|| json!({})),
        };
        self.send(self.new_action(Request::comm_open(content, &self.session), handlers))
    }

    pub fn comm_msg_request(
        &self,
        comm_id: &str,
        data: Option<Value>,
        handlers: Vec<SharedHandler>,
    ) -> crate::Result<Arc<Action>> {
        let content = CommWireMsg {
            comm_id: comm_id.to_string(),
            data: data.unwrap_or_else(|| json!({})),
        };
        self.send(self.new_action(Request::comm_msg(content, &self.session), handlers))
    }

    pub fn comm_close_request(
        &self,
        comm_id: &str,
        handlers: Vec<SharedHandler>,
    ) -> crate::Result<Arc<Action>> {
        let content = CommClose {
            comm_id: comm_id.to_string(),
            data: json!({}),
        };
        self.send(self.new_action(Request::comm_close(content, &self.session), handlers))
    }

    /// Opens a comm from the sidecar side and waits for the open cycle to
    /// finish. The handler produced by `factory` is registered with the
    /// comm manager *before* the request is sent, so comm messages emitted
    /// during the open are already delivered to it.
    ///
    /// If the kernel has no comm target registered under `target_name`, it
    /// reports as much in a stderr stream and closes the comm; that is
    /// surfaced here as [`Error::CommTargetNotFound`].
    pub fn comm_open<H, F>(
        &self,
        target_name: &str,
        factory: F,
        data: Option<Value>,
    ) -> crate::Result<Arc<Mutex<H>>>
    where
        H: Handler + 'static,
        F: FnOnce(String) -> H,
    {
        let comm_id = Uuid::new_v4().to_string();
        let content = CommOpen {
            comm_id: comm_id.clone(),
            target_name: target_name.to_string(),
            data: data.unwrap_or_else(|| json!({})),
        };

        let handler = Arc::new(Mutex::new(factory(comm_id.clone())));
        self.comm_manager
            .lock()
            .unwrap()
            .register_comm(&comm_id, handler.clone());

        // An ephemeral handler that notices the kernel rejecting the open.
        let probe = Arc::new(Mutex::new(CommOpenProbe::default()));
        let probe_handler: SharedHandler = probe.clone();
        let action = self.send(self.new_action(
            Request::comm_open(content, &self.session),
            vec![probe_handler],
        ))?;
        action.wait();

        let probe = probe.lock().unwrap();
        if probe.closed_comm_id.as_deref() == Some(comm_id.as_str()) {
            return Err(Error::CommTargetNotFound(
                probe.stderr_text.clone().unwrap_or_default(),
            ));
        }
        Ok(handler)
    }

    /// Sends an `input_reply` over the stdin channel. Fire-and-forget:
    /// there is no reply to an input reply, so no action is created.
    pub fn send_stdin(&self, value: &str) {
        let request = Request::input_reply(
            InputReply {
                value: value.to_string(),
            },
            &self.session,
        );
        let frame = match WireMessage::try_from(&request) {
            Ok(frame) => frame,
            Err(err) => {
                log::error!("Error building input_reply: {}", err);
                return;
            },
        };
        match self.outbound.get(&Channel::Stdin) {
            Some(sender) => sender
                .send(frame)
                .map_err(|_| Error::ChannelClosed(Channel::Stdin))
                .or_log_error("Error sending input_reply to stdin"),
            None => log::error!("No stdin channel to send input_reply on"),
        }
    }

    /// Registers a comm handler factory for a target name; `comm_open`
    /// messages for that target instantiate a handler bound to the new
    /// comm id.
    pub fn register_comm_target(&self, target_name: &str, factory: CommHandlerFactory) {
        self.comm_manager
            .lock()
            .unwrap()
            .register_target(target_name, factory);
    }

    /// A best guess at the action the kernel is handling right now: the
    /// first action, in submission order, that has seen a busy status and
    /// has not finished.
    pub fn running_action(&self) -> Option<Arc<Action>> {
        running_action(&self.actions.lock().unwrap())
    }

    /// Looks up a registered action by its request msg_id.
    pub fn action(&self, msg_id: &str) -> Option<Arc<Action>> {
        self.actions.lock().unwrap().get(msg_id).cloned()
    }

    pub fn comm_manager(&self) -> Arc<Mutex<CommManager>> {
        self.comm_manager.clone()
    }

    pub fn counters(&self) -> Arc<Counters> {
        self.counters.clone()
    }

    /// Whether the given channel currently has an established connection.
    pub fn is_connected(&self, channel: Channel) -> bool {
        self.connected
            .lock()
            .unwrap()
            .get(&channel)
            .copied()
            .unwrap_or(false)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Stops the watchers and the dispatch loop and joins their threads.
    /// Also called on drop; never panics.
    pub fn shutdown(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            drop(shutdown_tx);
        }
        for watcher in self.watchers.drain(..) {
            let _ = watcher.join();
        }
        if let Some(dispatcher) = self.dispatcher.take() {
            let _ = dispatcher.join();
        }
    }
}

impl Drop for SidecarClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Notices the kernel rejecting a sidecar-initiated comm open: the kernel
/// reports the unknown target on stderr and closes the comm.
#[derive(Default)]
struct CommOpenProbe {
    stderr_text: Option<String>,
    closed_comm_id: Option<String>,
}

#[async_trait(?Send)]
impl Handler for CommOpenProbe {
    async fn handle_stream(
        &mut self,
        msg: &JupyterMessage<StreamOutput>,
    ) -> crate::Result<Handled> {
        if msg.content.name == Stream::Stderr {
            self.stderr_text = Some(msg.content.text.clone());
        }
        Ok(Handled::Yes)
    }

    async fn handle_comm_close(
        &mut self,
        msg: &JupyterMessage<CommClose>,
    ) -> crate::Result<Handled> {
        self.closed_comm_id = Some(msg.content.comm_id.clone());
        Ok(Handled::Yes)
    }
}

fn running_action(actions: &IndexMap<String, Arc<Action>>) -> Option<Arc<Action>> {
    actions.values().find(|action| action.is_running()).cloned()
}

/// The single consumer of the ingress queue: parses raw frames into typed
/// messages and routes each to the action that owns its parent request.
/// Content errors never terminate the loop; only client shutdown does.
fn dispatch(
    ingress_rx: Receiver<(Channel, WireMessage)>,
    shutdown_rx: Receiver<()>,
    actions: Arc<Mutex<IndexMap<String, Arc<Action>>>>,
    comm_manager: Arc<Mutex<CommManager>>,
    hooks: Arc<dyn SidecarHooks>,
    counters: Arc<Counters>,
    handler_timeout: Option<Duration>,
    pretty_logs: bool,
) {
    loop {
        let (channel, frame) = select! {
            recv(ingress_rx) -> frame => match frame {
                Ok(frame) => frame,
                Err(_) => break,
            },
            recv(shutdown_rx) -> _ => break,
        };

        if pretty_logs {
            log::debug!(
                "Message {} on {}: {}",
                frame.message_type(),
                channel,
                serde_json::to_string_pretty(&frame.content).unwrap_or_default()
            );
        } else {
            log::debug!("Message {} on {}", frame.message_type(), channel);
        }

        // Kernel status "starting" is the usual example of a message with
        // no parent header; hosts observe those through the orphan hook.
        if frame.parent_header.is_none() {
            counters.orphans.fetch_add(1, Ordering::SeqCst);
            block_on(hooks.on_orphan(&frame));
            continue;
        }

        // A parse failure here usually means the kernel speaks a message
        // type we don't model. It must not poison the stream.
        let msg = match Message::try_from(&frame) {
            Ok(msg) => msg,
            Err(err) => {
                counters.unparseable.fetch_add(1, Ordering::SeqCst);
                block_on(hooks.on_unparseable(&frame, &err));
                continue;
            },
        };

        // An untracked parent usually means another client is talking to
        // the kernel over the same connection file.
        let parent_id = match msg.parent_header() {
            Some(parent) => parent.msg_id.clone(),
            None => continue,
        };
        let action = { actions.lock().unwrap().get(&parent_id).cloned() };
        let action = match action {
            Some(action) => action,
            None => {
                counters.untracked.fetch_add(1, Ordering::SeqCst);
                block_on(hooks.on_untracked(&msg));
                continue;
            },
        };

        // Late messages for a finished action are dropped, except comm
        // traffic, which is still relevant to the comm manager.
        if action.is_done() {
            if msg.is_comm() {
                let mut comm_manager = comm_manager.lock().unwrap();
                block_on(comm_manager.handle(&msg))
                    .or_log_warning("Comm manager failed on late message");
            } else {
                counters.late_dropped.fetch_add(1, Ordering::SeqCst);
                log::warn!(
                    "Dropping {} message for finished action {}",
                    msg.msg_type(),
                    action
                );
            }
            continue;
        }

        // Seeing traffic for a new action while an earlier one has not
        // finished is worth a warning; callers decide what to do about it.
        if let Some(running) = running_action(&actions.lock().unwrap()) {
            if !Arc::ptr_eq(&running, &action) {
                log::warn!(
                    "Observed message for {} while {} has not finished",
                    action,
                    running
                );
            }
        }

        action.handle_message(&msg, handler_timeout);
    }

    log::debug!("Dispatcher shut down");
}

fn pretty_content(request: &Request) -> String {
    match WireMessage::try_from(request) {
        Ok(frame) => serde_json::to_string_pretty(&frame.content).unwrap_or_default(),
        Err(_) => String::new(),
    }
}
