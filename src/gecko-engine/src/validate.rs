// Copyright 2024 The Gecko Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Structural rules checked before every mutation of the domain graph.
//!
//! Each check returns an `ErrorKind::Invariant` error describing the first
//! rule the mutation would break.  A failed check aborts only the mutation
//! that asked for it; batch operations (paste, cut) record the failure and
//! carry on with the next element.

use crate::common::Result;
use crate::datamodel::{Edge, Store, Visibility};
use crate::uid::Uid;
use crate::{invariant_err, model_err};

pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return invariant_err!(EmptyName, "names must not be empty".to_string());
    }
    Ok(())
}

/// The start state of `system`'s automaton, if set, must be one of its states.
pub fn validate_start_state(store: &Store, system: Uid) -> Result<()> {
    let automaton = &store.get_system(system)?.automaton;
    match automaton.start_state {
        Some(start) if !automaton.states.contains(&start) => invariant_err!(
            InvalidStartState,
            format!("state {start} cannot be the start state of system {system}")
        ),
        _ => Ok(()),
    }
}

/// An edge must connect two states of the automaton it is added to, and its
/// contract (if any) must belong to its source state.
pub fn validate_edge(store: &Store, system: Uid, edge: &Edge) -> Result<()> {
    let automaton = &store.get_system(system)?.automaton;
    for endpoint in [edge.source, edge.destination] {
        if !automaton.states.contains(&endpoint) {
            return invariant_err!(
                StateNotInAutomaton,
                format!("state {endpoint} is not part of system {system}")
            );
        }
    }
    if let Some(contract) = edge.contract {
        let source = store.get_state(edge.source)?;
        if !source.contracts.contains(&contract) {
            return invariant_err!(
                ContractNotOnSource,
                format!("contract {contract} does not belong to state {}", edge.source)
            );
        }
    }
    Ok(())
}

/// Region members must be states of the owning automaton.
pub fn validate_region(store: &Store, system: Uid, name: &str, members: &[Uid]) -> Result<()> {
    validate_name(name)?;
    let automaton = &store.get_system(system)?.automaton;
    if let Some(stray) = members.iter().find(|m| !automaton.states.contains(m)) {
        return invariant_err!(
            StateNotInAutomaton,
            format!("region member {stray} is not part of system {system}")
        );
    }
    Ok(())
}

/// Attaching `child` below `parent` must not create a cycle.
pub fn validate_system_parent(store: &Store, parent: Uid, child: Uid) -> Result<()> {
    store.get_system(parent)?;
    if store.is_ancestor_or_self(child, parent) {
        return invariant_err!(
            CyclicSystem,
            format!("system {child} cannot be placed below {parent}")
        );
    }
    Ok(())
}

/// The visibility/nesting table for a connection owned by system `owner`.
///
/// `source_owner` and `destination_owner` are the systems holding the two
/// variables; `*_parent` are their parents.
pub fn is_connecting_allowed(
    owner: Uid,
    source_owner: Uid,
    source_parent: Option<Uid>,
    source_visibility: Visibility,
    destination_owner: Uid,
    destination_parent: Option<Uid>,
    destination_visibility: Visibility,
) -> bool {
    if source_owner == destination_owner {
        return false;
    }

    if source_owner != owner && destination_owner != owner {
        source_parent == Some(owner)
            && destination_parent == Some(owner)
            && source_visibility == Visibility::Output
            && destination_visibility == Visibility::Input
    } else if source_owner == owner {
        source_visibility != Visibility::Output && destination_visibility != Visibility::Output
    } else {
        source_visibility != Visibility::Input && destination_visibility != Visibility::Input
    }
}

/// Full legality check for a connection `source -> destination` owned by
/// `owner`.
pub fn validate_connection(
    store: &Store,
    owner: Uid,
    source: Uid,
    destination: Uid,
) -> Result<()> {
    store.get_system(owner)?;
    if source == destination {
        return invariant_err!(
            SelfConnection,
            format!("variable {source} cannot be connected to itself")
        );
    }

    let src = store.get_variable(source)?;
    let dst = store.get_variable(destination)?;
    let Some(source_owner) = store.system_with_variable(source) else {
        return model_err!(DoesNotExist, format!("variable {source} has no system"));
    };
    let Some(destination_owner) = store.system_with_variable(destination) else {
        return model_err!(DoesNotExist, format!("variable {destination} has no system"));
    };

    if store.connections.values().any(|c| c.destination == destination) {
        return invariant_err!(
            DestinationConnected,
            format!("variable {destination} already has an incoming connection")
        );
    }

    if source_owner == destination_owner {
        return invariant_err!(
            SameLevelConnection,
            format!("variables {source} and {destination} live on the same system")
        );
    }

    let allowed = is_connecting_allowed(
        owner,
        source_owner,
        store.get_system(source_owner)?.parent,
        src.visibility,
        destination_owner,
        store.get_system(destination_owner)?.parent,
        dst.visibility,
    );
    if !allowed {
        return invariant_err!(
            IllegalConnection,
            format!("{} cannot be connected to {}", src.name, dst.name)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;
    use crate::datamodel::Visibility::{Input, Output, State};

    const S: Uid = Uid(1);
    const CHILD_A: Uid = Uid(2);
    const CHILD_B: Uid = Uid(3);
    const STRANGER: Uid = Uid(4);

    fn allowed(p1: Uid, v1: Visibility, p2: Uid, v2: Visibility) -> bool {
        let parent = |p: Uid| {
            if p == S {
                None
            } else if p == STRANGER {
                Some(CHILD_A)
            } else {
                Some(S)
            }
        };
        is_connecting_allowed(S, p1, parent(p1), v1, p2, parent(p2), v2)
    }

    #[test]
    fn test_between_two_children() {
        // child output -> other child input is the only legal combination
        assert!(allowed(CHILD_A, Output, CHILD_B, Input));
        assert!(!allowed(CHILD_A, Input, CHILD_B, Input));
        assert!(!allowed(CHILD_A, Output, CHILD_B, Output));
        assert!(!allowed(CHILD_A, State, CHILD_B, Input));
        // a grandchild is not a child of S
        assert!(!allowed(STRANGER, Output, CHILD_B, Input));
    }

    #[test]
    fn test_from_own_port() {
        assert!(allowed(S, Input, CHILD_A, Input));
        assert!(allowed(S, State, CHILD_A, State));
        assert!(!allowed(S, Output, CHILD_A, Input));
        assert!(!allowed(S, Input, CHILD_A, Output));
    }

    #[test]
    fn test_into_own_port() {
        assert!(allowed(CHILD_A, Output, S, Output));
        assert!(allowed(CHILD_A, State, S, Output));
        assert!(!allowed(CHILD_A, Input, S, Output));
        assert!(!allowed(CHILD_A, Output, S, Input));
    }

    #[test]
    fn test_same_level_always_illegal() {
        for v1 in [Input, Output, State] {
            for v2 in [Input, Output, State] {
                assert!(!allowed(S, v1, S, v2));
                assert!(!allowed(CHILD_A, v1, CHILD_A, v2));
            }
        }
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Element_1").is_ok());
        let err = validate_name("  ").unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyName);
    }
}
