/*
 * watcher.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::unbounded;
use crossbeam::channel::Receiver;
use crossbeam::channel::Sender;
use crossbeam::channel::TryRecvError;
use crossbeam::select;
use futures::executor::block_on;
use stdext::result::ResultOrLog;
use stdext::spawn;

use crate::client::Counters;
use crate::hooks::SidecarHooks;
use crate::session::Session;
use crate::socket::channel::Channel;
use crate::socket::socket::Socket;
use crate::wire::wire_message::WireMessage;

/// Everything a channel watcher needs to run one kernel channel.
pub(crate) struct WatcherConfig {
    pub channel: Channel,
    pub endpoint: String,
    pub session: Session,
    pub ctx: zmq::Context,

    /// ZeroMQ identity for the socket. The shell and stdin sockets must
    /// share one so the kernel can route stdin requests to the peer whose
    /// shell request caused them.
    pub identity: Option<Vec<u8>>,

    /// Where inbound frames are delivered (shared by all four channels)
    pub ingress_tx: Sender<(Channel, WireMessage)>,

    /// Outbound frames to put on the socket; None for iopub, which is
    /// receive-only
    pub outbound_rx: Option<Receiver<WireMessage>>,

    /// Closed (by dropping the sender) when the client shuts down
    pub shutdown_rx: Receiver<()>,

    pub connected: Arc<Mutex<HashMap<Channel, bool>>>,
    pub counters: Arc<Counters>,
    pub hooks: Arc<dyn SidecarHooks>,
    pub max_message_size: Option<i64>,
}

/// Connection events surfaced by the monitor task.
enum MonitorEvent {
    Connected,
    Disconnected,
}

/// Spawns the supervisor for one channel. The supervisor owns a reader
/// (socket to ingress queue) and a monitor (connection events); when the
/// connection drops, it tears both down, discards the socket, and starts a
/// fresh generation — exactly one replacement per disconnect.
pub(crate) fn spawn_watcher(config: WatcherConfig) -> JoinHandle<()> {
    spawn!(format!("{}-supervisor", config.channel), move || {
        supervise(config)
    })
}

fn supervise(config: WatcherConfig) {
    let channel = config.channel;
    log::debug!("Channel watcher started for {}", channel);

    loop {
        let kind = match channel {
            Channel::IOPub => zmq::SUB,
            _ => zmq::DEALER,
        };
        let socket = match Socket::new(
            config.session.clone(),
            config.ctx.clone(),
            channel.to_string(),
            kind,
            config.identity.as_deref(),
            config.endpoint.clone(),
            config.max_message_size,
        ) {
            Ok(socket) => socket,
            Err(err) => {
                log::error!("Could not create {} socket: {}", channel, err);
                if shutdown_requested(&config.shutdown_rx) {
                    return;
                }
                std::thread::sleep(Duration::from_millis(100));
                continue;
            },
        };

        // The monitor must be attached before the socket starts exchanging
        // messages, or early events are lost.
        let monitor = match socket.monitor(&config.ctx) {
            Ok(monitor) => monitor,
            Err(err) => {
                log::error!("Could not monitor {} socket: {}", channel, err);
                if shutdown_requested(&config.shutdown_rx) {
                    return;
                }
                std::thread::sleep(Duration::from_millis(100));
                continue;
            },
        };

        let stop = Arc::new(AtomicBool::new(false));
        let (event_tx, event_rx) = unbounded();

        let reader = {
            let outbound_rx = config.outbound_rx.clone();
            let ingress_tx = config.ingress_tx.clone();
            let stop = stop.clone();
            spawn!(format!("{}-reader", channel), move || {
                read_messages(channel, socket, outbound_rx, ingress_tx, stop)
            })
        };
        let monitor_task = {
            let stop = stop.clone();
            spawn!(format!("{}-monitor", channel), move || {
                watch_connection(channel, monitor, event_tx, stop)
            })
        };

        // Wait for whichever comes first: a disconnect event or client
        // shutdown.
        let disconnected = loop {
            select! {
                recv(event_rx) -> event => match event {
                    Ok(MonitorEvent::Connected) => {
                        log::debug!("{} channel connected", channel);
                        config.connected.lock().unwrap().insert(channel, true);
                    },
                    Ok(MonitorEvent::Disconnected) => break true,
                    // The monitor died without reporting a disconnect;
                    // treat it as one so the channel gets a fresh socket.
                    Err(_) => break true,
                },
                recv(config.shutdown_rx) -> _ => break false,
            }
        };

        // Cancel both sub-tasks; the reader drops the socket on exit,
        // discarding its cached connection state.
        stop.store(true, Ordering::SeqCst);
        let _ = reader.join();
        let _ = monitor_task.join();

        if !disconnected {
            log::debug!("Channel watcher for {} shut down", channel);
            return;
        }

        config.connected.lock().unwrap().insert(channel, false);
        config.counters.record_disconnect(channel);
        log::debug!("Cycling {} channel after disconnect", channel);
        block_on(config.hooks.on_disconnect(channel));
        // Loop around to spawn the replacement generation
    }
}

/// Reads frames off the socket and enqueues them into the ingress queue;
/// between polls, drains the channel's outbound queue. The socket is owned
/// by this task and dropped when it returns.
fn read_messages(
    channel: Channel,
    socket: Socket,
    outbound_rx: Option<Receiver<WireMessage>>,
    ingress_tx: Sender<(Channel, WireMessage)>,
    stop: Arc<AtomicBool>,
) {
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }

        if let Some(outbound_rx) = &outbound_rx {
            while let Ok(frame) = outbound_rx.try_recv() {
                frame
                    .send(&socket)
                    .or_log_error(&format!("Failed to send request on {}", channel));
            }
        }

        match socket.poll_incoming(10) {
            Ok(true) => match WireMessage::read_from_socket(&socket) {
                Ok(frame) => {
                    log::trace!("Message {} on {}", frame.message_type(), channel);
                    if ingress_tx.send((channel, frame)).is_err() {
                        // Dispatcher is gone; the client is shutting down
                        return;
                    }
                },
                Err(err) => {
                    log::warn!("Could not read message from {} socket: {}", channel, err);
                },
            },
            Ok(false) => (),
            Err(err) => {
                // Channel-dead condition; back off briefly so a wedged
                // socket cannot busy-loop this thread.
                log::warn!("Error polling {} socket: {}", channel, err);
                std::thread::sleep(Duration::from_millis(10));
            },
        }
    }
}

/// Consumes low-level connection events from the socket monitor and
/// surfaces the ones the supervisor cares about. Returns when the
/// connection drops or the generation is cancelled.
fn watch_connection(
    channel: Channel,
    monitor: zmq::Socket,
    event_tx: Sender<MonitorEvent>,
    stop: Arc<AtomicBool>,
) {
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }

        match monitor.poll(zmq::PollEvents::POLLIN, 100) {
            Ok(0) => continue,
            Ok(_) => (),
            Err(err) => {
                log::warn!("Error polling {} monitor socket: {}", channel, err);
                return;
            },
        }

        let frames = match monitor.recv_multipart(0) {
            Ok(frames) => frames,
            Err(err) => {
                log::warn!("Error reading {} monitor event: {}", channel, err);
                return;
            },
        };

        // Event frames carry the event id in the first two bytes,
        // little-endian, followed by an event value.
        if frames.is_empty() || frames[0].len() < 2 {
            continue;
        }
        let id = u16::from_le_bytes([frames[0][0], frames[0][1]]);

        match zmq::SocketEvent::from_raw(id) {
            zmq::SocketEvent::HANDSHAKE_SUCCEEDED => {
                if event_tx.send(MonitorEvent::Connected).is_err() {
                    return;
                }
            },
            zmq::SocketEvent::DISCONNECTED => {
                let _ = event_tx.send(MonitorEvent::Disconnected);
                return;
            },
            zmq::SocketEvent::MONITOR_STOPPED => return,
            _ => (),
        }
    }
}

fn shutdown_requested(shutdown_rx: &Receiver<()>) -> bool {
    matches!(
        shutdown_rx.try_recv(),
        Ok(()) | Err(TryRecvError::Disconnected)
    )
}
