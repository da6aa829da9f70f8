/*
 * action.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use crossbeam::channel::after;
use crossbeam::channel::bounded;
use crossbeam::channel::Sender;
use crossbeam::select;
use futures::executor::block_on;
use stdext::event::Event;
use stdext::result::ResultOrLog;
use stdext::spawn;

use crate::handler::SharedHandler;
use crate::wire::jupyter_message::Message;
use crate::wire::request::Request;
use crate::wire::status::ExecutionState;

/// How long to wait for a missing reply after the kernel reports idle
/// before finishing the action anyway.
pub const DEFAULT_SAFETY_NET_WINDOW: Duration = Duration::from_secs(3);

/// One outstanding request/reply cycle with the kernel.
///
/// An action is finished when the kernel has cycled back to idle for the
/// request AND the expected reply type has been seen (requests without a
/// reply, i.e. the comm messages, finish on idle alone). The two events
/// arrive on different channels and may be observed in either order.
/// Callers block on [`Action::wait`]; handlers attached to the action run
/// for every inbound message belonging to it.
pub struct Action {
    request: Request,

    /// The reply type whose arrival (together with idle) finishes this
    /// action; None for requests with no reply
    expected_reply: Option<&'static str>,

    /// Handlers invoked, in order, for every message belonging to this
    /// action
    handlers: Mutex<Vec<SharedHandler>>,

    /// Set when the request has been handed to a channel; an action is
    /// only present in the client registry once sent
    sent: AtomicBool,

    /// Set when a busy status for this action is observed, cleared on
    /// completion
    running: AtomicBool,

    /// Guards the completion sequence so it runs at most once
    finishing: AtomicBool,

    idle_seen: Event,
    reply_seen: Event,
    done: Event,

    /// Cancellation handle for the safety-net timer, if one was started
    safety_net: Mutex<Option<Sender<()>>>,
    safety_net_window: Duration,
}

impl Action {
    pub fn new(request: Request, handlers: Vec<SharedHandler>) -> Self {
        let expected_reply = request.expected_reply();
        Self {
            request,
            expected_reply,
            handlers: Mutex::new(handlers),
            sent: AtomicBool::new(false),
            running: AtomicBool::new(false),
            finishing: AtomicBool::new(false),
            idle_seen: Event::new(),
            reply_seen: Event::new(),
            done: Event::new(),
            safety_net: Mutex::new(None),
            safety_net_window: DEFAULT_SAFETY_NET_WINDOW,
        }
    }

    /// Overrides the safety-net window; mostly useful to tighten it in
    /// tests and latency-sensitive hosts.
    pub fn with_safety_net_window(mut self, window: Duration) -> Self {
        self.safety_net_window = window;
        self
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn msg_id(&self) -> &str {
        self.request.msg_id()
    }

    pub fn msg_type(&self) -> &str {
        self.request.msg_type()
    }

    pub fn expected_reply(&self) -> Option<&'static str> {
        self.expected_reply
    }

    pub fn is_done(&self) -> bool {
        self.done.is_set()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> bool {
        self.sent.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_sent(&self) {
        self.sent.store(true, Ordering::SeqCst);
    }

    pub(crate) fn add_handler(&self, handler: SharedHandler) {
        self.handlers.lock().unwrap().push(handler);
    }

    /// Blocks until the action has finished its request/reply cycle.
    pub fn wait(&self) {
        self.done.wait()
    }

    /// Blocks until the action has finished or the timeout elapses;
    /// returns whether it finished.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.done.wait_timeout(timeout)
    }

    /// Delivers one inbound message to this action: runs every handler in
    /// registration order, then updates the completion state machine.
    ///
    /// The optional `handler_timeout` bounds the total time spent in
    /// handlers for this message. A running handler cannot be preempted,
    /// so the budget is checked between handlers; once exceeded, the
    /// remaining handlers for this message are skipped.
    pub(crate) fn handle_message(self: &Arc<Self>, msg: &Message, handler_timeout: Option<Duration>) {
        if self.done.is_set() {
            return;
        }

        let started = Instant::now();
        let handlers = self.handlers.lock().unwrap().clone();
        for handler in &handlers {
            if let Some(limit) = handler_timeout {
                if started.elapsed() >= limit {
                    log::warn!(
                        "Timeout handling {} message for {}; skipping remaining handlers",
                        msg.msg_type(),
                        self
                    );
                    break;
                }
            }
            let mut handler = handler.lock().unwrap();
            if let Err(err) = block_on(handler.handle(msg)) {
                // One failing handler must not starve the others.
                log::warn!("Handler failed on {} message for {}: {}", msg.msg_type(), self, err);
            }
        }

        match msg {
            Message::Status(status) => match status.content.execution_state {
                ExecutionState::Busy => {
                    self.running.store(true, Ordering::SeqCst);
                },
                ExecutionState::Idle => {
                    self.idle_seen.set();
                    self.maybe_finish();
                    // Normally the reply is seen before the kernel goes
                    // idle; some kernels occasionally drop it, so arm the
                    // safety net rather than blocking forever.
                    if !self.done.is_set() && self.expected_reply.is_some() {
                        self.spawn_safety_net();
                    }
                },
                ExecutionState::Starting => (),
            },
            _ => {
                if Some(msg.msg_type().as_str()) == self.expected_reply {
                    self.reply_seen.set();
                    self.maybe_finish();
                }
            },
        }
    }

    /// Finishes the action if both completion conditions hold. Runs each
    /// handler's completion hook (in registration order) before signalling
    /// done; the whole sequence runs at most once.
    fn maybe_finish(&self) {
        if !self.idle_seen.is_set() {
            return;
        }
        if self.expected_reply.is_some() && !self.reply_seen.is_set() {
            return;
        }
        if self.finishing.swap(true, Ordering::SeqCst) {
            return;
        }

        let handlers = self.handlers.lock().unwrap().clone();
        for handler in &handlers {
            let mut handler = handler.lock().unwrap();
            block_on(handler.on_action_complete())
                .or_log_warning("Action completion hook failed");
        }

        self.running.store(false, Ordering::SeqCst);
        if let Some(cancel) = self.safety_net.lock().unwrap().take() {
            drop(cancel);
        }
        self.done.set();
    }

    /// Arms the safety-net timer: if the expected reply still has not
    /// arrived when the window elapses, the action is finished anyway. The
    /// timer is cancelled if the action finishes first.
    fn spawn_safety_net(self: &Arc<Self>) {
        let mut slot = self.safety_net.lock().unwrap();
        if slot.is_some() {
            return;
        }
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        *slot = Some(cancel_tx);
        drop(slot);

        log::debug!("Arming safety net for {}", self);
        let action = Arc::clone(self);
        let timer = after(self.safety_net_window);
        spawn!(format!("safety-net-{}", self.msg_id()), move || {
            select! {
                // Dropping the sender counts as cancellation too
                recv(cancel_rx) -> _ => return,
                recv(timer) -> _ => {},
            }
            if action.done.is_set() {
                return;
            }
            log::warn!(
                "{} still unfinished {:?} after kernel went idle; expected {} never arrived, finishing anyway",
                action,
                action.safety_net_window,
                action.expected_reply.unwrap_or("reply"),
            );
            action.reply_seen.set();
            action.maybe_finish();
        });
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{} {}>", self.msg_type(), self.msg_id())
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Action")
            .field("request", &self.request)
            .field("expected_reply", &self.expected_reply)
            .field("sent", &self.sent)
            .field("running", &self.running)
            .field("finishing", &self.finishing)
            .field("idle_seen", &self.idle_seen)
            .field("reply_seen", &self.reply_seen)
            .field("done", &self.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::handler::Handler;
    use crate::session::Session;
    use crate::wire::comm_msg::CommWireMsg;
    use crate::wire::execute_request::ExecuteRequest;
    use crate::wire::execute_reply::ExecuteReply;
    use crate::wire::jupyter_message::JupyterMessage;
    use crate::wire::status::KernelStatus;

    fn session() -> Session {
        Session::create("").unwrap()
    }

    fn status(session: &Session, state: ExecutionState) -> Message {
        Message::Status(JupyterMessage::create(
            KernelStatus {
                execution_state: state,
            },
            None,
            session,
        ))
    }

    fn execute_reply(session: &Session) -> Message {
        Message::ExecuteReply(JupyterMessage::create(
            ExecuteReply::Ok {
                execution_count: 1,
                payload: Vec::new(),
                user_expressions: json!({}),
            },
            None,
            session,
        ))
    }

    fn execute_action(session: &Session, handlers: Vec<SharedHandler>) -> Arc<Action> {
        Arc::new(Action::new(
            Request::execute(ExecuteRequest::interactive("1+1"), session),
            handlers,
        ))
    }

    struct CompletionCounter {
        completions: Arc<AtomicUsize>,
    }

    #[async_trait(?Send)]
    impl Handler for CompletionCounter {
        async fn on_action_complete(&mut self) -> crate::Result<()> {
            self.completions.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct SequenceRecorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait(?Send)]
    impl Handler for SequenceRecorder {
        async fn unhandled(&mut self, msg: &Message) -> crate::Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.name, msg.msg_type()));
            Ok(())
        }
    }

    #[test]
    fn test_reply_then_idle_finishes() {
        let session = session();
        let action = execute_action(&session, Vec::new());

        action.handle_message(&status(&session, ExecutionState::Busy), None);
        assert!(action.is_running());
        assert!(!action.is_done());

        action.handle_message(&execute_reply(&session), None);
        assert!(!action.is_done());

        action.handle_message(&status(&session, ExecutionState::Idle), None);
        assert!(action.is_done());
        assert!(!action.is_running());
    }

    #[test]
    fn test_idle_then_reply_finishes() {
        // The iopub idle may surface before the shell reply; completion is
        // order-independent.
        let session = session();
        let action = execute_action(&session, Vec::new());

        action.handle_message(&status(&session, ExecutionState::Busy), None);
        action.handle_message(&status(&session, ExecutionState::Idle), None);
        assert!(!action.is_done());

        action.handle_message(&execute_reply(&session), None);
        assert!(action.is_done());
    }

    #[test]
    fn test_comm_request_finishes_on_idle_alone() {
        let session = session();
        let request = Request::comm_msg(
            CommWireMsg {
                comm_id: String::from("c1"),
                data: json!({}),
            },
            &session,
        );
        let action = Arc::new(Action::new(request, Vec::new()));
        assert_eq!(action.expected_reply(), None);

        action.handle_message(&status(&session, ExecutionState::Busy), None);
        action.handle_message(&status(&session, ExecutionState::Idle), None);
        assert!(action.is_done());
    }

    #[test]
    fn test_completion_hook_runs_once() {
        let session = session();
        let completions = Arc::new(AtomicUsize::new(0));
        let handler: SharedHandler = Arc::new(Mutex::new(CompletionCounter {
            completions: completions.clone(),
        }));
        let action = execute_action(&session, vec![handler]);

        action.handle_message(&status(&session, ExecutionState::Busy), None);
        action.handle_message(&execute_reply(&session), None);
        action.handle_message(&status(&session, ExecutionState::Idle), None);
        assert!(action.is_done());

        // Duplicate terminal events must not re-run completion.
        action.handle_message(&status(&session, ExecutionState::Idle), None);
        action.handle_message(&execute_reply(&session), None);
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let session = session();
        let log = Arc::new(Mutex::new(Vec::new()));
        let first: SharedHandler = Arc::new(Mutex::new(SequenceRecorder {
            name: "first",
            log: log.clone(),
        }));
        let second: SharedHandler = Arc::new(Mutex::new(SequenceRecorder {
            name: "second",
            log: log.clone(),
        }));
        let action = execute_action(&session, vec![first, second]);

        action.handle_message(&status(&session, ExecutionState::Busy), None);
        assert_eq!(
            *log.lock().unwrap(),
            vec![String::from("first:status"), String::from("second:status")]
        );
    }

    #[test]
    fn test_messages_after_done_are_ignored() {
        let session = session();
        let log = Arc::new(Mutex::new(Vec::new()));
        let recorder: SharedHandler = Arc::new(Mutex::new(SequenceRecorder {
            name: "r",
            log: log.clone(),
        }));
        let action = execute_action(&session, vec![recorder]);

        action.handle_message(&status(&session, ExecutionState::Busy), None);
        action.handle_message(&execute_reply(&session), None);
        action.handle_message(&status(&session, ExecutionState::Idle), None);
        let seen = log.lock().unwrap().len();

        action.handle_message(&status(&session, ExecutionState::Busy), None);
        assert_eq!(log.lock().unwrap().len(), seen);
    }

    #[test]
    fn test_safety_net_finishes_action() {
        let session = session();
        let action = Arc::new(
            Action::new(
                Request::execute(ExecuteRequest::interactive("1+1"), &session),
                Vec::new(),
            )
            .with_safety_net_window(Duration::from_millis(50)),
        );

        action.handle_message(&status(&session, ExecutionState::Busy), None);
        action.handle_message(&status(&session, ExecutionState::Idle), None);
        assert!(!action.is_done());

        // The reply never arrives; the safety net must finish the action.
        assert!(action.wait_timeout(Duration::from_secs(2)));
    }

    #[test]
    fn test_safety_net_cancelled_on_completion() {
        let session = session();
        let completions = Arc::new(AtomicUsize::new(0));
        let handler: SharedHandler = Arc::new(Mutex::new(CompletionCounter {
            completions: completions.clone(),
        }));
        let action = Arc::new(
            Action::new(
                Request::execute(ExecuteRequest::interactive("1+1"), &session),
                vec![handler],
            )
            .with_safety_net_window(Duration::from_millis(50)),
        );

        action.handle_message(&status(&session, ExecutionState::Busy), None);
        action.handle_message(&status(&session, ExecutionState::Idle), None);
        action.handle_message(&execute_reply(&session), None);
        assert!(action.is_done());

        // Give a stale timer a chance to misfire; completion must not
        // happen twice.
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_timeout_skips_remaining_handlers() {
        let session = session();
        let log = Arc::new(Mutex::new(Vec::new()));
        let slow: SharedHandler = Arc::new(Mutex::new(SlowHandler {
            log: log.clone(),
            delay: Duration::from_millis(50),
        }));
        let after_slow: SharedHandler = Arc::new(Mutex::new(SequenceRecorder {
            name: "after",
            log: log.clone(),
        }));
        let action = execute_action(&session, vec![slow, after_slow]);

        action.handle_message(
            &status(&session, ExecutionState::Busy),
            Some(Duration::from_millis(10)),
        );
        // The slow handler ran and exhausted the budget; the second
        // handler was skipped for this message.
        assert_eq!(*log.lock().unwrap(), vec![String::from("slow:status")]);
    }

    struct SlowHandler {
        log: Arc<Mutex<Vec<String>>>,
        delay: Duration,
    }

    #[async_trait(?Send)]
    impl Handler for SlowHandler {
        async fn unhandled(&mut self, msg: &Message) -> crate::Result<()> {
            std::thread::sleep(self.delay);
            self.log
                .lock()
                .unwrap()
                .push(format!("slow:{}", msg.msg_type()));
            Ok(())
        }
    }
}
