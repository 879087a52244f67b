// Copyright 2024 The Gecko Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::HashSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::common::Result;
use crate::datamodel::{ElementRef, Store};
use crate::uid::Uid;

/// Which canvas of a system the user is editing.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EditorMode {
    /// Child systems, ports and connections.
    System,
    /// States, edges and regions of the system's automaton.
    Automaton,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct EditorContext {
    pub system: Uid,
    pub mode: EditorMode,
}

impl EditorContext {
    pub fn system(system: Uid) -> Self {
        EditorContext {
            system,
            mode: EditorMode::System,
        }
    }

    pub fn automaton(system: Uid) -> Self {
        EditorContext {
            system,
            mode: EditorMode::Automaton,
        }
    }
}

/// Expands a user selection into the copy closure: the selection itself
/// (first occurrence wins, unknown and non-positionable elements skipped)
/// followed by every edge of the context automaton whose endpoints are both
/// selected and every connection of the context system whose endpoints are
/// both selected.  A variable counts as selected when it or the system
/// owning it is part of the selection.
pub fn collect(
    store: &Store,
    selection: &[ElementRef],
    ctx: &EditorContext,
) -> Result<Vec<ElementRef>> {
    let system = store.get_system(ctx.system)?;

    let mut seen: HashSet<ElementRef> = HashSet::with_capacity(selection.len());
    let mut closure = Vec::with_capacity(selection.len());
    for element in selection.iter().copied() {
        if element.is_positionable() && store.contains(element) && seen.insert(element) {
            closure.push(element);
        }
    }

    for edge in system.automaton.edges.iter().filter_map(|e| store.edges.get(e)) {
        let both = seen.contains(&ElementRef::State(edge.source))
            && seen.contains(&ElementRef::State(edge.destination));
        let element = ElementRef::Edge(edge.uid);
        if both && seen.insert(element) {
            closure.push(element);
        }
    }

    let variable_selected = |variable: Uid| {
        seen.contains(&ElementRef::Variable(variable))
            || store
                .system_with_variable(variable)
                .is_some_and(|owner| seen.contains(&ElementRef::System(owner)))
    };
    let connections: Vec<ElementRef> = system
        .connections
        .iter()
        .filter_map(|c| store.connections.get(c))
        .filter(|c| variable_selected(c.source) && variable_selected(c.destination))
        .map(|c| ElementRef::Connection(c.uid))
        .collect();
    for element in connections {
        if seen.insert(element) {
            closure.push(element);
        }
    }

    Ok(closure)
}
