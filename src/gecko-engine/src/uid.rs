// Copyright 2024 The Gecko Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Process-unique identity of a model element.  Never reused within a
/// project, even after the element is removed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Uid(pub u32);

impl Uid {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues element ids for one open project.
///
/// UIDs start at 1 so that 0 can serve as a sentinel for uninitialized
/// values, and every allocation is strictly greater than the previous one.
/// The manager is shared between ordinary element creation and the
/// copy/paste engine, so ids handed out by a copy never collide with ids
/// handed out by the factory.
#[derive(Clone, Debug)]
pub struct UidManager {
    next: u32,
}

impl UidManager {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocate a fresh UID.
    pub fn alloc(&mut self) -> Uid {
        let uid = Uid(self.next);
        self.next += 1;
        uid
    }

    /// Seed the manager with an existing UID.  Typically used when loading
    /// models that already have UIDs assigned.  Advances `next` past the
    /// registered UID to prevent collisions.  UID 0 is silently ignored.
    pub fn add(&mut self, uid: Uid) {
        if uid.0 == 0 {
            return;
        }

        if uid.0 >= self.next {
            self.next = uid.0 + 1;
        }
    }

    /// The UID the next `alloc` call will return.
    pub fn peek(&self) -> Uid {
        Uid(self.next)
    }
}

impl Default for UidManager {
    fn default() -> Self {
        Self::new()
    }
}
