//
// result.rs
//
// Copyright (C) 2023 Posit Software, PBC. All rights reserved.
//
//

/// Adaptors for `Result` values whose errors are logged and swallowed rather
/// than propagated, for paths where failure must not take down a worker loop.
pub trait ResultOrLog<E> {
    fn or_log_error(self, prefix: &str);
    fn or_log_warning(self, prefix: &str);
    fn or_log_info(self, prefix: &str);
}

impl<T, E> ResultOrLog<E> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn or_log_error(self, prefix: &str) {
        match self {
            Ok(_) => (),
            Err(err) => log::error!("{}: {}", prefix, err),
        }
    }

    fn or_log_warning(self, prefix: &str) {
        match self {
            Ok(_) => (),
            Err(err) => log::warn!("{}: {}", prefix, err),
        }
    }

    fn or_log_info(self, prefix: &str) {
        match self {
            Ok(_) => (),
            Err(err) => log::info!("{}: {}", prefix, err),
        }
    }
}
