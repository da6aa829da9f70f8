//
// spawn.rs
//
// Copyright (C) 2023 Posit Software, PBC. All rights reserved.
//
//

/// Spawns a named thread. Threads should always be named so that they can be
/// identified in debuggers and crash dumps.
#[macro_export]
macro_rules! spawn {
    ($name:expr, $body:expr) => {{
        std::thread::Builder::new()
            .name($name.into())
            .spawn($body)
            .expect("failed to spawn thread")
    }};
}
