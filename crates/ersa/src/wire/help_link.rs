/*
 * help_link.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

/// An entry in the kernel's list of help links.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HelpLink {
    pub text: String,
    pub url: String,
}
