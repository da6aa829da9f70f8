/*
 * dummy_kernel.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use rand::Rng;
use serde_json::json;

use crate::connection_file::ConnectionFile;
use crate::session::Session;
use crate::socket::socket::Socket;
use crate::wire::header::JupyterHeader;
use crate::wire::input_request::InputRequest;
use crate::wire::jupyter_message::ProtocolMessage;
use crate::wire::status::ExecutionState;
use crate::wire::status::KernelStatus;
use crate::wire::wire_message::WireMessage;

/// A scripted, in-process stand-in for a kernel. It binds the four kernel
/// sockets on random ports and replies with exactly the frames a test
/// tells it to, so the request/reply choreography is fully deterministic.
pub struct DummyKernel {
    pub session: Session,
    pub shell_socket: Socket,
    pub iopub_socket: Socket,
    pub control_socket: Socket,
    pub stdin_socket: Socket,
    pub heartbeat_socket: Socket,
    key: String,
}

impl DummyKernel {
    pub fn start() -> Self {
        // A random HMAC key, as a kernel launcher would generate
        let key_bytes = rand::thread_rng().gen::<[u8; 16]>();
        let key = hex::encode(key_bytes);
        let session = Session::create(&key).unwrap();

        let ctx = zmq::Context::new();
        let bind = |name: &str, kind| {
            Socket::new(
                session.clone(),
                ctx.clone(),
                String::from(name),
                kind,
                None,
                String::from("tcp://127.0.0.1:0"),
                None,
            )
            .unwrap()
        };

        Self {
            shell_socket: bind("shell", zmq::ROUTER),
            iopub_socket: bind("iopub", zmq::XPUB),
            control_socket: bind("control", zmq::ROUTER),
            stdin_socket: bind("stdin", zmq::ROUTER),
            heartbeat_socket: bind("heartbeat", zmq::REP),
            session,
            key,
        }
    }

    /// The connection descriptor a client needs to reach this kernel.
    pub fn connection_file(&self) -> ConnectionFile {
        ConnectionFile {
            shell_port: self.shell_socket.port().unwrap(),
            iopub_port: self.iopub_socket.port().unwrap(),
            control_port: self.control_socket.port().unwrap(),
            stdin_port: self.stdin_socket.port().unwrap(),
            hb_port: self.heartbeat_socket.port().unwrap(),
            transport: String::from("tcp"),
            signature_scheme: String::from("hmac-sha256"),
            ip: String::from("127.0.0.1"),
            key: self.key.clone(),
        }
    }

    /// Blocks until a subscriber joins (or rejoins) the IOPub socket.
    /// Publishing before this returns would drop messages on the floor.
    pub fn wait_for_subscriber(&self) {
        if !self.iopub_socket.poll_incoming(10000).unwrap() {
            panic!("Timed out waiting for an IOPub subscriber");
        }
        let frames = self.iopub_socket.recv_multipart().unwrap();
        // XPUB subscription frames start with 0x01; unsubscriptions with
        // 0x00 (seen when a subscriber's connection is cycled).
        assert!(!frames.is_empty());
        if frames[0].first() != Some(&1) {
            // An unsubscribe from a dying connection; keep waiting.
            self.wait_for_subscriber();
        }
    }

    pub fn recv_shell(&self) -> WireMessage {
        Self::recv(&self.shell_socket)
    }

    pub fn recv_control(&self) -> WireMessage {
        Self::recv(&self.control_socket)
    }

    pub fn recv_stdin(&self) -> WireMessage {
        Self::recv(&self.stdin_socket)
    }

    /// Receives with a timeout: if the client under test wedges, the test
    /// fails with a panic instead of hanging forever.
    fn recv(socket: &Socket) -> WireMessage {
        if socket.poll_incoming(10000).unwrap() {
            return WireMessage::read_from_socket(socket).unwrap();
        }
        panic!("Timeout while expecting message on socket {}", socket.name);
    }

    /// Publishes a kernel status transition for the given parent request.
    pub fn send_status(&self, parent: &WireMessage, state: ExecutionState) {
        self.send_iopub(
            parent,
            KernelStatus {
                execution_state: state,
            },
        );
    }

    /// Publishes a busy/idle pair around nothing; the minimal kernel-side
    /// bracket for a request that produces no output.
    pub fn send_busy_idle(&self, parent: &WireMessage) {
        self.send_status(parent, ExecutionState::Busy);
        self.send_status(parent, ExecutionState::Idle);
    }

    /// Publishes a message on IOPub as a child of the given request.
    pub fn send_iopub<T: ProtocolMessage>(&self, parent: &WireMessage, content: T) {
        self.send_child(&self.iopub_socket, parent, content, Vec::new());
    }

    /// Publishes the parentless `starting` status a kernel emits once on
    /// boot.
    pub fn send_starting_status(&self) {
        let header = JupyterHeader::create(
            String::from("status"),
            self.session.session_id.clone(),
            self.session.username.clone(),
        );
        let wire = WireMessage {
            zmq_identities: Vec::new(),
            header,
            parent_header: None,
            metadata: json!({}),
            content: serde_json::to_value(KernelStatus {
                execution_state: ExecutionState::Starting,
            })
            .unwrap(),
            buffers: Vec::new(),
        };
        wire.send(&self.iopub_socket).unwrap();
    }

    /// Sends a reply on the shell socket, routed back to the requester.
    pub fn reply_shell<T: ProtocolMessage>(&self, parent: &WireMessage, content: T) {
        self.send_child(
            &self.shell_socket,
            parent,
            content,
            parent.zmq_identities.clone(),
        );
    }

    /// Sends a reply on the control socket, routed back to the requester.
    pub fn reply_control<T: ProtocolMessage>(&self, parent: &WireMessage, content: T) {
        self.send_child(
            &self.control_socket,
            parent,
            content,
            parent.zmq_identities.clone(),
        );
    }

    /// Sends an `input_request` over stdin. Routing uses the identities
    /// captured from the parent shell request; the client's shell and
    /// stdin sockets share an identity, as the protocol requires.
    pub fn send_input_request(&self, parent: &WireMessage, prompt: &str) {
        self.send_child(
            &self.stdin_socket,
            parent,
            InputRequest {
                prompt: prompt.to_string(),
                password: false,
            },
            parent.zmq_identities.clone(),
        );
    }

    fn send_child<T: ProtocolMessage>(
        &self,
        socket: &Socket,
        parent: &WireMessage,
        content: T,
        zmq_identities: Vec<Vec<u8>>,
    ) {
        let header = JupyterHeader::create(
            T::message_type(),
            self.session.session_id.clone(),
            self.session.username.clone(),
        );
        let wire = WireMessage {
            zmq_identities,
            header,
            parent_header: Some(parent.header.clone()),
            metadata: json!({}),
            content: serde_json::to_value(content).unwrap(),
            buffers: Vec::new(),
        };
        wire.send(socket).unwrap();
    }
}
