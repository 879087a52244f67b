// Copyright 2024 The Gecko Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Domain graph of a contract-automata project.
//!
//! Every element lives in an id-indexed table of a [`Store`].  Ownership is
//! expressed by the owning collections (a system's `children`, `variables`
//! and `connections`, an automaton's `states`, `edges` and `regions`, a
//! state's `contracts`, a region's `contract`); every other reference is a
//! plain [`Uid`] that must be resolved through the store.  The same store type
//! backs both the live project and the detached clipboard graph.

use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::common::Result;
use crate::model_err;
use crate::uid::Uid;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Visibility {
    Input,
    Output,
    State,
}

/// How an edge treats its contract when taken.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Kind {
    Hit,
    Miss,
    Fail,
}

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Condition {
    pub value: String,
}

impl Condition {
    pub fn new(value: &str) -> Self {
        Condition {
            value: value.to_string(),
        }
    }

    pub fn true_condition() -> Self {
        Condition::new("true")
    }

}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// A reference to any element of the domain graph, tagged with its kind so
/// kind-specific handling is an exhaustive `match`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ElementRef {
    System(Uid),
    State(Uid),
    Contract(Uid),
    Edge(Uid),
    Region(Uid),
    Variable(Uid),
    Connection(Uid),
}

impl ElementRef {
    pub fn uid(self) -> Uid {
        match self {
            ElementRef::System(uid)
            | ElementRef::State(uid)
            | ElementRef::Contract(uid)
            | ElementRef::Edge(uid)
            | ElementRef::Region(uid)
            | ElementRef::Variable(uid)
            | ElementRef::Connection(uid) => uid,
        }
    }

    pub fn kind_name(self) -> &'static str {
        match self {
            ElementRef::System(_) => "system",
            ElementRef::State(_) => "state",
            ElementRef::Contract(_) => "contract",
            ElementRef::Edge(_) => "edge",
            ElementRef::Region(_) => "region",
            ElementRef::Variable(_) => "variable",
            ElementRef::Connection(_) => "connection",
        }
    }

    /// Same kind, different id.
    pub fn with_uid(self, uid: Uid) -> ElementRef {
        match self {
            ElementRef::System(_) => ElementRef::System(uid),
            ElementRef::State(_) => ElementRef::State(uid),
            ElementRef::Contract(_) => ElementRef::Contract(uid),
            ElementRef::Edge(_) => ElementRef::Edge(uid),
            ElementRef::Region(_) => ElementRef::Region(uid),
            ElementRef::Variable(_) => ElementRef::Variable(uid),
            ElementRef::Connection(_) => ElementRef::Connection(uid),
        }
    }

    /// Elements that are drawn on a canvas and can be selected directly.
    pub fn is_positionable(self) -> bool {
        !matches!(self, ElementRef::Contract(_))
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind_name(), self.uid())
    }
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct Automaton {
    pub states: Vec<Uid>,
    pub edges: Vec<Uid>,
    pub regions: Vec<Uid>,
    pub start_state: Option<Uid>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct System {
    pub uid: Uid,
    pub name: String,
    pub code: String,
    pub parent: Option<Uid>,
    pub children: Vec<Uid>,
    pub variables: Vec<Uid>,
    pub connections: Vec<Uid>,
    pub automaton: Automaton,
}

#[derive(Clone, PartialEq, Debug)]
pub struct State {
    pub uid: Uid,
    pub name: String,
    pub contracts: Vec<Uid>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Contract {
    pub uid: Uid,
    pub name: String,
    pub pre_condition: Condition,
    pub post_condition: Condition,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Edge {
    pub uid: Uid,
    pub source: Uid,
    pub destination: Uid,
    /// One of the source state's contracts.
    pub contract: Option<Uid>,
    pub kind: Kind,
    pub priority: u32,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Region {
    pub uid: Uid,
    pub name: String,
    pub invariant: Condition,
    pub contract: Uid,
    /// Member states of the owning automaton (non-owning).
    pub states: Vec<Uid>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Variable {
    pub uid: Uid,
    pub name: String,
    pub var_type: String,
    pub value: String,
    pub visibility: Visibility,
    pub has_incoming_connection: bool,
}

#[derive(Clone, PartialEq, Debug)]
pub struct SystemConnection {
    pub uid: Uid,
    pub source: Uid,
    pub destination: Uid,
}

/// Owning tables for every element kind.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Store {
    pub systems: BTreeMap<Uid, System>,
    pub states: BTreeMap<Uid, State>,
    pub contracts: BTreeMap<Uid, Contract>,
    pub edges: BTreeMap<Uid, Edge>,
    pub regions: BTreeMap<Uid, Region>,
    pub variables: BTreeMap<Uid, Variable>,
    pub connections: BTreeMap<Uid, SystemConnection>,
}

macro_rules! store_accessors {
    ($get:ident, $get_mut:ident, $table:ident, $ty:ty, $label:expr) => {
        pub fn $get(&self, uid: Uid) -> Result<&$ty> {
            match self.$table.get(&uid) {
                Some(element) => Ok(element),
                None => model_err!(DoesNotExist, format!("{} {}", $label, uid)),
            }
        }

        pub fn $get_mut(&mut self, uid: Uid) -> Result<&mut $ty> {
            match self.$table.get_mut(&uid) {
                Some(element) => Ok(element),
                None => model_err!(DoesNotExist, format!("{} {}", $label, uid)),
            }
        }
    };
}

impl Store {
    pub fn new() -> Self {
        Default::default()
    }

    store_accessors!(get_system, get_system_mut, systems, System, "system");
    store_accessors!(get_state, get_state_mut, states, State, "state");
    store_accessors!(get_contract, get_contract_mut, contracts, Contract, "contract");
    store_accessors!(get_edge, get_edge_mut, edges, Edge, "edge");
    store_accessors!(get_region, get_region_mut, regions, Region, "region");
    store_accessors!(get_variable, get_variable_mut, variables, Variable, "variable");
    store_accessors!(
        get_connection,
        get_connection_mut,
        connections,
        SystemConnection,
        "connection"
    );

    pub fn contains(&self, element: ElementRef) -> bool {
        match element {
            ElementRef::System(uid) => self.systems.contains_key(&uid),
            ElementRef::State(uid) => self.states.contains_key(&uid),
            ElementRef::Contract(uid) => self.contracts.contains_key(&uid),
            ElementRef::Edge(uid) => self.edges.contains_key(&uid),
            ElementRef::Region(uid) => self.regions.contains_key(&uid),
            ElementRef::Variable(uid) => self.variables.contains_key(&uid),
            ElementRef::Connection(uid) => self.connections.contains_key(&uid),
        }
    }

    /// Display name of a renamable element.
    pub fn name_of(&self, element: ElementRef) -> Option<&str> {
        match element {
            ElementRef::System(uid) => self.systems.get(&uid).map(|s| s.name.as_str()),
            ElementRef::State(uid) => self.states.get(&uid).map(|s| s.name.as_str()),
            ElementRef::Contract(uid) => self.contracts.get(&uid).map(|c| c.name.as_str()),
            ElementRef::Region(uid) => self.regions.get(&uid).map(|r| r.name.as_str()),
            ElementRef::Variable(uid) => self.variables.get(&uid).map(|v| v.name.as_str()),
            ElementRef::Edge(_) | ElementRef::Connection(_) => None,
        }
    }

    pub fn is_name_used(&self, name: &str) -> bool {
        self.systems.values().any(|s| s.name == name)
            || self.variables.values().any(|v| v.name == name)
            || self.regions.values().any(|r| r.name == name)
            || self.contracts.values().any(|c| c.name == name)
            || self.states.values().any(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.systems.len()
            + self.states.len()
            + self.contracts.len()
            + self.edges.len()
            + self.regions.len()
            + self.variables.len()
            + self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn system_with_variable(&self, variable: Uid) -> Option<Uid> {
        self.systems
            .values()
            .find(|s| s.variables.contains(&variable))
            .map(|s| s.uid)
    }

    /// The system whose automaton owns `state`.
    pub fn system_with_state(&self, state: Uid) -> Option<Uid> {
        self.systems
            .values()
            .find(|s| s.automaton.states.contains(&state))
            .map(|s| s.uid)
    }

    pub fn system_with_edge(&self, edge: Uid) -> Option<Uid> {
        self.systems
            .values()
            .find(|s| s.automaton.edges.contains(&edge))
            .map(|s| s.uid)
    }

    pub fn system_with_region(&self, region: Uid) -> Option<Uid> {
        self.systems
            .values()
            .find(|s| s.automaton.regions.contains(&region))
            .map(|s| s.uid)
    }

    pub fn system_with_connection(&self, connection: Uid) -> Option<Uid> {
        self.systems
            .values()
            .find(|s| s.connections.contains(&connection))
            .map(|s| s.uid)
    }

    pub fn state_with_contract(&self, contract: Uid) -> Option<Uid> {
        self.states
            .values()
            .find(|s| s.contracts.contains(&contract))
            .map(|s| s.uid)
    }

    /// The system (through its automaton) or state/region an element hangs
    /// off.  `None` for the root system and for detached elements.
    pub fn owner_of(&self, element: ElementRef) -> Option<ElementRef> {
        match element {
            ElementRef::System(uid) => self
                .systems
                .get(&uid)
                .and_then(|s| s.parent)
                .map(ElementRef::System),
            ElementRef::State(uid) => self.system_with_state(uid).map(ElementRef::System),
            ElementRef::Edge(uid) => self.system_with_edge(uid).map(ElementRef::System),
            ElementRef::Region(uid) => self.system_with_region(uid).map(ElementRef::System),
            ElementRef::Variable(uid) => self.system_with_variable(uid).map(ElementRef::System),
            ElementRef::Connection(uid) => {
                self.system_with_connection(uid).map(ElementRef::System)
            }
            ElementRef::Contract(uid) => self
                .state_with_contract(uid)
                .map(ElementRef::State)
                .or_else(|| {
                    self.regions
                        .values()
                        .find(|r| r.contract == uid)
                        .map(|r| ElementRef::Region(r.uid))
                }),
        }
    }

    /// Whether `ancestor` is `system` or one of its transitive parents.
    pub fn is_ancestor_or_self(&self, ancestor: Uid, system: Uid) -> bool {
        let mut current = Some(system);
        // parent chains are acyclic, but bound the walk by the table size so
        // a corrupted store can't spin forever
        for _ in 0..=self.systems.len() {
            match current {
                Some(uid) if uid == ancestor => return true,
                Some(uid) => current = self.systems.get(&uid).and_then(|s| s.parent),
                None => return false,
            }
        }
        false
    }

    /// `system` and every system below it, parents before children.
    pub fn subtree(&self, system: Uid) -> Vec<Uid> {
        let mut out = Vec::new();
        let mut stack = vec![system];
        while let Some(uid) = stack.pop() {
            if let Some(s) = self.systems.get(&uid) {
                out.push(uid);
                stack.extend(s.children.iter().rev().copied());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system(uid: u32, parent: Option<u32>, children: &[u32]) -> System {
        System {
            uid: Uid(uid),
            name: format!("sys_{uid}"),
            code: String::new(),
            parent: parent.map(Uid),
            children: children.iter().copied().map(Uid).collect(),
            variables: vec![],
            connections: vec![],
            automaton: Automaton::default(),
        }
    }

    #[test]
    fn test_condition_display() {
        assert_eq!(Condition::new("x > 0").to_string(), "x > 0");
        assert_eq!(Condition::true_condition().to_string(), "true");
    }

    #[test]
    fn test_element_ref_dispatch() {
        let e = ElementRef::Edge(Uid(4));
        assert_eq!(e.uid(), Uid(4));
        assert_eq!(e.with_uid(Uid(9)), ElementRef::Edge(Uid(9)));
        assert_eq!(e.to_string(), "edge#4");
        assert!(e.is_positionable());
        assert!(!ElementRef::Contract(Uid(1)).is_positionable());
    }

    #[test]
    fn test_store_lookup_missing() {
        let store = Store::new();
        let err = store.get_state(Uid(3)).unwrap_err();
        assert_eq!(err.code, crate::common::ErrorCode::DoesNotExist);
        assert!(!store.contains(ElementRef::State(Uid(3))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_subtree_and_ancestors() {
        let mut store = Store::new();
        store.systems.insert(Uid(1), system(1, None, &[2, 3]));
        store.systems.insert(Uid(2), system(2, Some(1), &[4]));
        store.systems.insert(Uid(3), system(3, Some(1), &[]));
        store.systems.insert(Uid(4), system(4, Some(2), &[]));

        assert_eq!(store.subtree(Uid(1)), vec![Uid(1), Uid(2), Uid(4), Uid(3)]);
        assert_eq!(store.subtree(Uid(2)), vec![Uid(2), Uid(4)]);
        assert!(store.is_ancestor_or_self(Uid(1), Uid(4)));
        assert!(store.is_ancestor_or_self(Uid(4), Uid(4)));
        assert!(!store.is_ancestor_or_self(Uid(3), Uid(4)));
        assert_eq!(
            store.owner_of(ElementRef::System(Uid(4))),
            Some(ElementRef::System(Uid(2)))
        );
        assert_eq!(store.owner_of(ElementRef::System(Uid(1))), None);
    }

    #[test]
    fn test_name_lookup() {
        let mut store = Store::new();
        store.systems.insert(Uid(1), system(1, None, &[]));
        store.states.insert(
            Uid(2),
            State {
                uid: Uid(2),
                name: "idle".to_string(),
                contracts: vec![],
            },
        );
        assert!(store.is_name_used("idle"));
        assert!(store.is_name_used("sys_1"));
        assert!(!store.is_name_used("busy"));
        assert_eq!(store.name_of(ElementRef::State(Uid(2))), Some("idle"));
        assert_eq!(store.name_of(ElementRef::Edge(Uid(2))), None);
    }
}
