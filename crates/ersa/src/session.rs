/*
 * session.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;
use uuid::Uuid;

use crate::error::Error;

/// A session represents the unique identity of the sidecar process and the
/// HMAC key used to sign messages exchanged with the kernel.
#[derive(Clone)]
pub struct Session {
    /// The HMAC signing key, if any. It is acceptable per the Jupyter wire
    /// protocol for the connection key to be empty, in which case no
    /// signatures are computed or validated.
    pub hmac: Option<Hmac<Sha256>>,

    /// The username included in message headers.
    pub username: String,

    /// The unique session identifier included in message headers.
    pub session_id: String,
}

impl Session {
    /// Create a new session from a signing key (may be empty).
    pub fn create(key: &str) -> Result<Self, Error> {
        let hmac = match key.len() {
            0 => None,
            _ => match Hmac::<Sha256>::new_from_slice(key.as_bytes()) {
                Ok(hmac) => Some(hmac),
                Err(err) => return Err(Error::HmacKeyInvalid(key.to_string(), err)),
            },
        };
        Ok(Self {
            hmac,
            username: String::from("sidecar"),
            session_id: Uuid::new_v4().to_string(),
        })
    }
}
