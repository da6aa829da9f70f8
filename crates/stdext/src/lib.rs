//
// lib.rs
//
// Copyright (C) 2023 Posit Software, PBC. All rights reserved.
//
//

pub mod event;
pub mod result;
pub mod spawn;

pub use crate::event::Event;
