/*
 * channel.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use strum_macros::Display;
use strum_macros::EnumString;

/// The four named message channels between the sidecar and the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    /// Request/reply channel for most requests (execute, completion, etc.)
    Shell,

    /// Broadcast channel on which the kernel publishes side effects
    /// (status transitions, outputs, comm traffic)
    IOPub,

    /// Request/reply channel for out-of-band requests (interrupt,
    /// shutdown, debug)
    Control,

    /// Channel on which the kernel requests input from the client
    Stdin,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Shell,
        Channel::IOPub,
        Channel::Control,
        Channel::Stdin,
    ];

    /// Stable index for per-channel counters.
    pub(crate) fn index(&self) -> usize {
        match self {
            Channel::Shell => 0,
            Channel::IOPub => 1,
            Channel::Control => 2,
            Channel::Stdin => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_channel_names() {
        assert_eq!(Channel::IOPub.to_string(), "iopub");
        assert_eq!(Channel::from_str("shell").unwrap(), Channel::Shell);
    }
}
