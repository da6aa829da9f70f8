/*
 * client.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use ersa::action::Action;
use ersa::client::ClientOptions;
use ersa::client::SidecarClient;
use ersa::error::Error;
use ersa::fixtures::dummy_kernel::DummyKernel;
use ersa::handler::DebugHandler;
use ersa::handler::Handled;
use ersa::handler::Handler;
use ersa::handler::SharedHandler;
use ersa::socket::channel::Channel;
use ersa::wire::comm_close::CommClose;
use ersa::wire::comm_msg::CommWireMsg;
use ersa::wire::exception::Exception;
use ersa::wire::execute_error::ExecuteError;
use ersa::wire::execute_input::ExecuteInput;
use ersa::wire::execute_reply::ExecuteReply;
use ersa::wire::execute_result::ExecuteResult;
use ersa::wire::interrupt_reply::InterruptReply;
use ersa::wire::jupyter_message::JupyterMessage;
use ersa::wire::jupyter_message::Message;
use ersa::wire::jupyter_message::Status;
use ersa::wire::kernel_info_reply::KernelInfoReply;
use ersa::wire::language_info::LanguageInfo;
use ersa::wire::request::Request;
use ersa::wire::status::ExecutionState;
use ersa::wire::stream::Stream;
use ersa::wire::stream::StreamOutput;
use ersa::wire::wire_message::WireMessage;
use serde_json::json;

const WAIT: Duration = Duration::from_secs(10);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn start() -> (DummyKernel, SidecarClient) {
    start_with_options(ClientOptions::default())
}

fn start_with_options(options: ClientOptions) -> (DummyKernel, SidecarClient) {
    init_logging();
    let kernel = DummyKernel::start();
    let client = SidecarClient::connect(&kernel.connection_file(), options).unwrap();
    kernel.wait_for_subscriber();
    (kernel, client)
}

fn as_handlers(handler: &Arc<Mutex<DebugHandler>>) -> Vec<SharedHandler> {
    let handler: SharedHandler = handler.clone();
    vec![handler]
}

fn kernel_info_reply() -> KernelInfoReply {
    KernelInfoReply {
        status: Status::Ok,
        protocol_version: String::from("5.3"),
        implementation: Some(String::from("test")),
        implementation_version: Some(String::from("0.1.0")),
        language_info: LanguageInfo::new("python", "3.12"),
        banner: String::from("Test Kernel"),
        debugger: Some(false),
        help_links: Vec::new(),
    }
}

fn ok_reply(execution_count: u32) -> ExecuteReply {
    ExecuteReply::Ok {
        execution_count,
        payload: Vec::new(),
        user_expressions: json!({}),
    }
}

#[test]
fn test_kernel_info() {
    let (kernel, client) = start();

    let handler = DebugHandler::shared();
    let action = client.kernel_info_request(as_handlers(&handler)).unwrap();

    let req = kernel.recv_shell();
    assert_eq!(req.header.msg_type, "kernel_info_request");
    kernel.send_status(&req, ExecutionState::Busy);
    kernel.reply_shell(&req, kernel_info_reply());
    kernel.send_status(&req, ExecutionState::Idle);

    assert!(action.wait_timeout(WAIT));

    let handler = handler.lock().unwrap();
    assert_eq!(handler.count("status"), 2);
    assert_eq!(handler.count("kernel_info_reply"), 1);
    assert_matches!(
        handler.last_msg("kernel_info_reply"),
        Some(Message::KernelInfoReply(msg)) => {
            assert_eq!(msg.content.status, Status::Ok);
        }
    );
}

#[test]
fn test_execute_statement() {
    let (kernel, client) = start();

    let handler = DebugHandler::shared();
    let action = client
        .execute_request("1+1", as_handlers(&handler))
        .unwrap();

    let req = kernel.recv_shell();
    assert_eq!(req.header.msg_type, "execute_request");
    assert_eq!(req.content["code"], "1+1");
    assert_eq!(req.content["silent"], false);
    assert_eq!(req.content["store_history"], true);
    assert_eq!(req.content["allow_stdin"], true);
    assert_eq!(req.content["stop_on_error"], true);

    kernel.send_status(&req, ExecutionState::Busy);
    kernel.send_iopub(
        &req,
        ExecuteInput {
            code: String::from("1+1"),
            execution_count: 1,
        },
    );
    kernel.send_iopub(
        &req,
        ExecuteResult {
            data: json!({ "text/plain": "2" }),
            execution_count: 1,
            metadata: json!({}),
        },
    );
    kernel.reply_shell(&req, ok_reply(1));
    kernel.send_status(&req, ExecutionState::Idle);

    assert!(action.wait_timeout(WAIT));

    let handler = handler.lock().unwrap();
    assert_eq!(handler.count("status"), 2);
    assert_eq!(handler.count("execute_input"), 1);
    assert_eq!(handler.count("execute_result"), 1);
    assert_eq!(handler.count("execute_reply"), 1);
    assert_matches!(
        handler.last_msg("execute_result"),
        Some(Message::ExecuteResult(msg)) => {
            assert_eq!(msg.content.data, json!({ "text/plain": "2" }));
        }
    );
}

#[test]
fn test_interrupt_aborts_queued_execution() {
    let (kernel, client) = start();

    let handler1 = DebugHandler::shared();
    let handler2 = DebugHandler::shared();
    let handler3 = DebugHandler::shared();

    let action1 = client
        .execute_request("import time; time.sleep(60)", as_handlers(&handler1))
        .unwrap();
    let action2 = client
        .execute_request("1 + 1", as_handlers(&handler2))
        .unwrap();
    let action3 = client.interrupt_request(as_handlers(&handler3)).unwrap();

    let req1 = kernel.recv_shell();
    let req2 = kernel.recv_shell();
    let req3 = kernel.recv_control();
    assert_eq!(req3.header.msg_type, "interrupt_request");

    // First execution dies with KeyboardInterrupt
    kernel.send_status(&req1, ExecutionState::Busy);
    kernel.send_iopub(
        &req1,
        ExecuteInput {
            code: String::from("import time; time.sleep(60)"),
            execution_count: 1,
        },
    );
    kernel.send_iopub(
        &req1,
        ExecuteError {
            exception: Exception {
                ename: String::from("KeyboardInterrupt"),
                evalue: String::new(),
                traceback: Vec::new(),
            },
        },
    );
    kernel.reply_shell(
        &req1,
        ExecuteReply::Error {
            execution_count: 1,
            ename: String::from("KeyboardInterrupt"),
            evalue: String::new(),
            traceback: Vec::new(),
            engine_info: json!({}),
            payload: Vec::new(),
            user_expressions: json!({}),
        },
    );
    kernel.send_status(&req1, ExecutionState::Idle);

    // Queued execution is thrown away
    kernel.send_status(&req2, ExecutionState::Busy);
    kernel.reply_shell(&req2, ExecuteReply::Aborted {});
    kernel.send_status(&req2, ExecutionState::Idle);

    // The interrupt itself succeeds
    kernel.send_status(&req3, ExecutionState::Busy);
    kernel.reply_control(&req3, InterruptReply { status: Status::Ok });
    kernel.send_status(&req3, ExecutionState::Idle);

    assert!(action1.wait_timeout(WAIT));
    assert!(action2.wait_timeout(WAIT));
    assert!(action3.wait_timeout(WAIT));

    let handler1 = handler1.lock().unwrap();
    assert_eq!(handler1.count("status"), 2);
    assert_eq!(handler1.count("execute_input"), 1);
    assert_eq!(handler1.count("error"), 1);
    assert_eq!(handler1.count("execute_reply"), 1);
    assert_matches!(handler1.last_msg("error"), Some(Message::ExecuteError(msg)) => {
        assert_eq!(msg.content.exception.ename, "KeyboardInterrupt");
    });
    assert_matches!(handler1.last_msg("execute_reply"), Some(Message::ExecuteReply(msg)) => {
        assert_eq!(msg.content.status(), "error");
    });

    let handler2 = handler2.lock().unwrap();
    assert_eq!(handler2.count("status"), 2);
    assert_eq!(handler2.count("execute_reply"), 1);
    assert_matches!(handler2.last_msg("execute_reply"), Some(Message::ExecuteReply(msg)) => {
        assert_eq!(msg.content.status(), "aborted");
    });

    let handler3 = handler3.lock().unwrap();
    assert_eq!(handler3.count("status"), 2);
    assert_eq!(handler3.count("interrupt_reply"), 1);
}

#[test]
fn test_comm_target_not_found() {
    let (kernel, client) = start();

    let kernel_thread = std::thread::spawn(move || {
        let req = kernel.recv_shell();
        assert_eq!(req.header.msg_type, "comm_open");
        let comm_id = req.content["comm_id"].as_str().unwrap().to_string();

        kernel.send_status(&req, ExecutionState::Busy);
        kernel.send_iopub(
            &req,
            StreamOutput {
                name: Stream::Stderr,
                text: String::from("No such comm target registered: foo"),
            },
        );
        kernel.send_iopub(
            &req,
            CommClose {
                comm_id,
                data: json!({}),
            },
        );
        kernel.send_status(&req, ExecutionState::Idle);
        kernel
    });

    let result = client.comm_open("foo", |_comm_id| DebugHandler::new(), None);
    assert_matches!(result, Err(Error::CommTargetNotFound(text)) => {
        assert_eq!(text, "No such comm target registered: foo");
    });

    // The rejected comm is no longer tracked.
    assert!(client.comm_manager().lock().unwrap().is_empty());

    kernel_thread.join().unwrap();
}

struct CommRecorder {
    comm_id: String,
    messages: Vec<serde_json::Value>,
}

#[async_trait(?Send)]
impl Handler for CommRecorder {
    async fn handle_comm_msg(
        &mut self,
        msg: &JupyterMessage<CommWireMsg>,
    ) -> ersa::Result<Handled> {
        self.messages.push(msg.content.data.clone());
        Ok(Handled::Yes)
    }
}

#[test]
fn test_comm_echo() {
    let (kernel, client) = start();

    let kernel_thread = std::thread::spawn(move || {
        // The open: acknowledge with a greeting on the new comm
        let req = kernel.recv_shell();
        assert_eq!(req.header.msg_type, "comm_open");
        assert_eq!(req.content["target_name"], "test_comm");
        let comm_id = req.content["comm_id"].as_str().unwrap().to_string();

        kernel.send_status(&req, ExecutionState::Busy);
        kernel.send_iopub(
            &req,
            CommWireMsg {
                comm_id: comm_id.clone(),
                data: json!("connected"),
            },
        );
        kernel.send_status(&req, ExecutionState::Idle);

        // The message: echo its data back
        let req = kernel.recv_shell();
        assert_eq!(req.header.msg_type, "comm_msg");
        kernel.send_status(&req, ExecutionState::Busy);
        kernel.send_iopub(
            &req,
            CommWireMsg {
                comm_id,
                data: json!({ "echo": { "k": 1 } }),
            },
        );
        kernel.send_status(&req, ExecutionState::Idle);
        kernel
    });

    let recorder = client
        .comm_open(
            "test_comm",
            |comm_id| CommRecorder {
                comm_id,
                messages: Vec::new(),
            },
            None,
        )
        .unwrap();

    let comm_id = recorder.lock().unwrap().comm_id.clone();
    let action = client
        .comm_msg_request(&comm_id, Some(json!({ "k": 1 })), Vec::new())
        .unwrap();
    assert!(action.wait_timeout(WAIT));

    let recorder = recorder.lock().unwrap();
    assert_eq!(
        recorder.messages,
        vec![json!("connected"), json!({ "echo": { "k": 1 } })]
    );

    kernel_thread.join().unwrap();
}

#[test]
fn test_oversize_frame_cycles_iopub() {
    let (kernel, client) = start_with_options(ClientOptions {
        max_message_size: Some(1024),
        ..Default::default()
    });

    let handler = DebugHandler::shared();
    let action = client
        .execute_request("print('x' * 2048)", as_handlers(&handler))
        .unwrap();

    let req = kernel.recv_shell();
    kernel.send_status(&req, ExecutionState::Busy);

    // This frame exceeds the client's message size limit; ZeroMQ closes
    // the connection instead of delivering it.
    kernel.send_iopub(
        &req,
        StreamOutput {
            name: Stream::Stdout,
            text: "x".repeat(2048),
        },
    );
    kernel.reply_shell(&req, ok_reply(1));

    // The watcher cycles the connection; the replacement socket
    // re-subscribes.
    kernel.wait_for_subscriber();

    // Idle may race the reconnect; repeat until the action observes it.
    for _ in 0..50 {
        kernel.send_status(&req, ExecutionState::Idle);
        if action.wait_timeout(Duration::from_millis(200)) {
            break;
        }
    }
    assert!(action.is_done());

    assert_eq!(client.counters().disconnects(Channel::IOPub), 1);

    // The oversized stream never arrived.
    let handler = handler.lock().unwrap();
    assert_eq!(handler.count("stream"), 0);
    assert_eq!(handler.count("execute_reply"), 1);
}

#[test]
fn test_input_request_round_trip() {
    let (kernel, client) = start();

    let handler = DebugHandler::shared();
    let action = client
        .execute_request("input('Enter: ')", as_handlers(&handler))
        .unwrap();

    let req = kernel.recv_shell();
    kernel.send_status(&req, ExecutionState::Busy);
    kernel.send_input_request(&req, "Enter: ");

    // The host notices the input request and answers over stdin.
    wait_for(|| handler.lock().unwrap().count("input_request") == 1);
    client.send_stdin("test input");

    let reply = kernel.recv_stdin();
    assert_eq!(reply.header.msg_type, "input_reply");
    assert_eq!(reply.content["value"], "test input");

    kernel.send_iopub(
        &req,
        ExecuteResult {
            data: json!({ "text/plain": "'test input'" }),
            execution_count: 1,
            metadata: json!({}),
        },
    );
    kernel.reply_shell(&req, ok_reply(1));
    kernel.send_status(&req, ExecutionState::Idle);

    assert!(action.wait_timeout(WAIT));
    let handler = handler.lock().unwrap();
    assert_eq!(handler.count("input_request"), 1);
    assert_eq!(handler.count("execute_result"), 1);
}

#[test]
fn test_duplicate_msg_id_is_rejected() {
    let (kernel, client) = start();

    let request = Request::kernel_info(client.session());
    let _first = client.send(Action::new(request.clone(), Vec::new())).unwrap();

    let err = client.send(Action::new(request, Vec::new())).unwrap_err();
    assert_matches!(err, Error::AlreadyRunning(_));

    // The kernel only ever saw one request.
    let _req = kernel.recv_shell();
    assert!(!kernel.shell_socket.has_incoming_data().unwrap());
}

#[test]
fn test_starting_status_is_an_orphan() {
    let (kernel, client) = start();

    kernel.send_starting_status();
    wait_for(|| client.counters().orphans() == 1);
}

#[test]
fn test_untracked_reply_is_counted() {
    let (kernel, client) = start();

    // A reply to a request this client never made (e.g. another client is
    // talking to the same kernel).
    let foreign = foreign_request(&kernel);
    kernel.send_status(&foreign, ExecutionState::Busy);
    wait_for(|| client.counters().untracked() == 1);
}

/// Builds a request frame that did not originate from the client under
/// test, to exercise the untracked-message path.
fn foreign_request(kernel: &DummyKernel) -> WireMessage {
    let request = Request::kernel_info(&kernel.session);
    WireMessage::try_from(&request).unwrap()
}

fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    panic!("Timed out waiting for condition");
}
