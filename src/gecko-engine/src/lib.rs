// Copyright 2024 The Gecko Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Selection-scoped copy and paste for hierarchical contract-automata
//! models.

#![forbid(unsafe_code)]

pub mod clipboard;
pub mod common;
pub mod config;
pub mod datamodel;
pub mod geometry;
pub mod paste;
pub mod project;
pub mod selection;
pub mod session;
pub mod uid;
pub mod validate;

#[cfg(test)]
mod copy_proptest;
#[cfg(test)]
mod testutils;

pub use self::clipboard::{Clipboard, GraphCloner};
pub use self::common::{Error, ErrorCode, ErrorKind, Result};
pub use self::config::EngineConfig;
pub use self::datamodel::{ElementRef, Kind, Visibility};
pub use self::geometry::{Geometry, Point};
pub use self::paste::{GraphGrafter, PasteOutcome};
pub use self::project::Project;
pub use self::selection::{EditorContext, EditorMode};
pub use self::session::Session;
pub use self::uid::{Uid, UidManager};
