/*
 * lib.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

pub mod action;
pub mod client;
pub mod comm;
pub mod connection_file;
pub mod error;
pub mod fixtures;
pub mod handler;
pub mod hooks;
pub mod session;
pub mod socket;
pub mod wire;

pub use error::Error;
pub type Result<T> = std::result::Result<T, error::Error>;
