/*
 * exception.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

/// Represents a runtime exception reported by the kernel.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Exception {
    /// The name of the exception
    pub ename: String,

    /// The value/description of the exception
    pub evalue: String,

    /// List of traceback frames, as strings
    #[serde(default)]
    pub traceback: Vec<String>,
}
