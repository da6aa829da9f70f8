/*
 * connection_file.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::socket::channel::Channel;

/// Connection descriptor for a running kernel: the ZeroMQ endpoints of its
/// sockets and the key used to sign messages.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConnectionFile {
    // ZeroMQ ports
    pub control_port: u16,
    pub shell_port: u16,
    pub stdin_port: u16,
    pub iopub_port: u16,
    pub hb_port: u16,

    /// The transport type, usually "tcp"
    pub transport: String,

    /// The signature scheme, usually "hmac-sha256"
    pub signature_scheme: String,

    pub ip: String,
    pub key: String,
}

impl ConnectionFile {
    /// Create a ConnectionFile by parsing the contents of a connection file
    /// on disk, as written by `jupyter_client` and friends.
    pub fn from_file<P: AsRef<Path>>(connection_file: P) -> Result<ConnectionFile, Error> {
        let file = File::open(connection_file).map_err(Error::ReadConnectionFile)?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(Error::ParseConnectionFile)
    }

    /// The endpoint for one of the four kernel channels.
    pub fn endpoint(&self, channel: Channel) -> String {
        let port = match channel {
            Channel::Shell => self.shell_port,
            Channel::IOPub => self.iopub_port,
            Channel::Control => self.control_port,
            Channel::Stdin => self.stdin_port,
        };
        format!("{}://{}:{}", self.transport, self.ip, port)
    }
}
