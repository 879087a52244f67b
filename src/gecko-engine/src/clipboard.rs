// Copyright 2024 The Gecko Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Copy: cloning a selection into a detached clipboard graph.
//!
//! The selection closure is a worklist.  Every pass walks the whole
//! worklist (systems, then leaves, then edges and connections) and tries a
//! kind-specific clone of each element; an element whose cross-references
//! have no clone yet fails with `MissingDependency` and stays for the next
//! pass.  The loop ends when the
//! worklist is empty or a pass resolves nothing, and whatever is left is
//! dropped.  Clone dependencies are only ever added, so every pass but the
//! last makes progress.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::common::{ErrorCode, Result};
use crate::datamodel::{
    Contract, Edge, ElementRef, Region, State, Store, System, SystemConnection, Variable,
};
use crate::geometry::Geometry;
use crate::model_err;
use crate::project::{Project, probe_name};
use crate::selection::{self, EditorContext, EditorMode};
use crate::uid::{Uid, UidManager};

/// The result of a copy: a clone subgraph that is not attached to any
/// project, plus what paste needs to re-resolve and place it.
#[derive(Clone, Debug)]
pub struct Clipboard {
    /// Clone elements.  Subtree clones keep their owning links; standalone
    /// clones (see `roots`) have no owner.
    pub store: Store,
    /// Clones that paste attaches to the target directly, in clone order.
    pub roots: Vec<ElementRef>,
    /// Lookup from every resolved original to its clone.
    pub original_to_clone: HashMap<ElementRef, ElementRef>,
    /// Geometry of each original at copy time, keyed by clone.
    pub geometry: HashMap<ElementRef, Geometry>,
    /// Original member states of each standalone region clone.
    pub region_members: HashMap<Uid, Vec<Uid>>,
    /// Original owning system of each standalone variable clone.
    pub variable_owners: HashMap<Uid, Uid>,
    /// Worklist elements that never resolved.
    pub dropped: Vec<ElementRef>,
    pub source_system: Uid,
    pub mode: EditorMode,
    /// Worklist passes run before the fixpoint was reached.
    pub passes: usize,
}

impl Clipboard {
    fn new(ctx: &EditorContext) -> Self {
        Clipboard {
            store: Store::new(),
            roots: vec![],
            original_to_clone: HashMap::new(),
            geometry: HashMap::new(),
            region_members: HashMap::new(),
            variable_owners: HashMap::new(),
            dropped: vec![],
            source_system: ctx.system,
            mode: ctx.mode,
            passes: 0,
        }
    }

    pub fn clone_of(&self, original: ElementRef) -> Option<ElementRef> {
        self.original_to_clone.get(&original).copied()
    }

    pub fn geometry_of(&self, clone: ElementRef) -> Geometry {
        self.geometry.get(&clone).copied().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

pub struct GraphCloner<'a> {
    project: &'a Project,
    uids: &'a mut UidManager,
    out: Clipboard,
}

impl<'a> GraphCloner<'a> {
    /// Ids are drawn from `uids`, which the caller commits back to the
    /// project once the copy is done.
    pub fn new(project: &'a Project, uids: &'a mut UidManager, ctx: &EditorContext) -> Self {
        GraphCloner {
            project,
            uids,
            out: Clipboard::new(ctx),
        }
    }

    pub fn copy(mut self, selection: &[ElementRef]) -> Result<Clipboard> {
        let ctx = EditorContext {
            system: self.out.source_system,
            mode: self.out.mode,
        };
        let worklist = selection::collect(&self.project.store, selection, &ctx)?;
        let selected_systems: HashSet<Uid> = worklist
            .iter()
            .filter_map(|e| match e {
                ElementRef::System(uid) => Some(*uid),
                _ => None,
            })
            .collect();

        // retries keep their relative order, so one sort holds for every pass
        let mut pending = worklist;
        pending.sort_by_key(|e| clone_rank(*e));

        while !pending.is_empty() {
            self.out.passes += 1;
            let before = pending.len();
            let mut retry = Vec::with_capacity(before);
            for element in pending {
                match self.attempt(element, &selected_systems) {
                    Ok(()) => {}
                    Err(err) if err.code == ErrorCode::MissingDependency => retry.push(element),
                    Err(err) => {
                        debug!(%element, error = %err, "dropping element from copy");
                        self.out.dropped.push(element);
                    }
                }
            }
            trace!(
                pass = self.out.passes,
                resolved = before - retry.len(),
                remaining = retry.len(),
                "copy pass"
            );
            if retry.len() == before {
                for element in retry.iter() {
                    debug!(%element, "dropping unresolved element from copy");
                }
                self.out.dropped.extend(retry);
                break;
            }
            pending = retry;
        }

        debug!(
            copied = self.out.roots.len(),
            mapped = self.out.original_to_clone.len(),
            dropped = self.out.dropped.len(),
            passes = self.out.passes,
            "copy finished"
        );
        Ok(self.out)
    }

    fn attempt(&mut self, element: ElementRef, selected_systems: &HashSet<Uid>) -> Result<()> {
        if self.out.original_to_clone.contains_key(&element) {
            // already produced by a subtree clone
            return Ok(());
        }
        match element {
            ElementRef::System(uid) => {
                let has_selected_ancestor = self
                    .project
                    .ancestors(uid)
                    .iter()
                    .skip(1)
                    .any(|a| selected_systems.contains(a));
                if has_selected_ancestor {
                    return model_err!(
                        MissingDependency,
                        format!("system {uid} waits for its selected ancestor")
                    );
                }
                let clone = self.clone_subtree(uid)?;
                self.out.roots.push(ElementRef::System(clone));
            }
            ElementRef::State(uid) => {
                let clone = self.clone_state(uid)?;
                self.out.roots.push(ElementRef::State(clone));
            }
            ElementRef::Region(uid) => {
                let original = self.project.store.get_region(uid)?;
                let members = original.states.clone();
                let clone = self.clone_region(uid, vec![])?;
                self.out.region_members.insert(clone, members);
                self.out.roots.push(ElementRef::Region(clone));
            }
            ElementRef::Variable(uid) => {
                let clone = self.clone_variable(uid)?;
                if let Some(owner) = self.project.store.system_with_variable(uid) {
                    self.out.variable_owners.insert(clone, owner);
                }
                self.out.roots.push(ElementRef::Variable(clone));
            }
            ElementRef::Edge(uid) => {
                let clone = self.clone_edge(uid)?;
                self.out.roots.push(ElementRef::Edge(clone));
            }
            ElementRef::Connection(uid) => {
                let clone = self.clone_connection(uid)?;
                self.out.roots.push(ElementRef::Connection(clone));
            }
            ElementRef::Contract(uid) => {
                return model_err!(Generic, format!("contract {uid} is copied with its owner"));
            }
        }
        Ok(())
    }

    fn fresh(&mut self) -> (Uid, String) {
        let uid = self.uids.alloc();
        let store = &self.out.store;
        let project = self.project;
        let name = probe_name(&project.config.default_name_prefix, uid, |name| {
            project.store.is_name_used(name) || store.is_name_used(name)
        });
        (uid, name)
    }

    fn record(&mut self, original: ElementRef, clone: Uid) {
        let clone = original.with_uid(clone);
        self.out.original_to_clone.insert(original, clone);
        if original.is_positionable() {
            self.out
                .geometry
                .insert(clone, self.project.geometry_of(original));
        }
    }

    fn mapped(&self, original: ElementRef) -> Result<Uid> {
        match self.out.original_to_clone.get(&original) {
            Some(clone) => Ok(clone.uid()),
            None => model_err!(MissingDependency, format!("{original} has not been copied")),
        }
    }

    fn clone_contract(&mut self, uid: Uid) -> Result<Uid> {
        let original = self.project.store.get_contract(uid)?;
        let (pre_condition, post_condition) =
            (original.pre_condition.clone(), original.post_condition.clone());
        let (clone, name) = self.fresh();
        self.out.store.contracts.insert(
            clone,
            Contract {
                uid: clone,
                name,
                pre_condition,
                post_condition,
            },
        );
        self.record(ElementRef::Contract(uid), clone);
        Ok(clone)
    }

    fn clone_state(&mut self, uid: Uid) -> Result<Uid> {
        let contracts = self.project.store.get_state(uid)?.contracts.clone();
        let (clone, name) = self.fresh();
        let mut cloned_contracts = Vec::with_capacity(contracts.len());
        for contract in contracts {
            cloned_contracts.push(self.clone_contract(contract)?);
        }
        self.out.store.states.insert(
            clone,
            State {
                uid: clone,
                name,
                contracts: cloned_contracts,
            },
        );
        self.record(ElementRef::State(uid), clone);
        Ok(clone)
    }

    /// Clones `uid` with `members` (already clone ids) as its states.
    fn clone_region(&mut self, uid: Uid, members: Vec<Uid>) -> Result<Uid> {
        let original = self.project.store.get_region(uid)?;
        let (invariant, contract) = (original.invariant.clone(), original.contract);
        let (clone, name) = self.fresh();
        let contract = self.clone_contract(contract)?;
        self.out.store.regions.insert(
            clone,
            Region {
                uid: clone,
                name,
                invariant,
                contract,
                states: members,
            },
        );
        self.record(ElementRef::Region(uid), clone);
        Ok(clone)
    }

    fn clone_variable(&mut self, uid: Uid) -> Result<Uid> {
        let original = self.project.store.get_variable(uid)?.clone();
        let (clone, name) = self.fresh();
        self.out.store.variables.insert(
            clone,
            Variable {
                uid: clone,
                name,
                has_incoming_connection: false,
                ..original
            },
        );
        self.record(ElementRef::Variable(uid), clone);
        Ok(clone)
    }

    fn clone_edge(&mut self, uid: Uid) -> Result<Uid> {
        let original = self.project.store.get_edge(uid)?.clone();
        let source = self.mapped(ElementRef::State(original.source))?;
        let destination = self.mapped(ElementRef::State(original.destination))?;
        let contract = match original.contract {
            Some(contract) => Some(self.mapped(ElementRef::Contract(contract))?),
            None => None,
        };
        let clone = self.uids.alloc();
        self.out.store.edges.insert(
            clone,
            Edge {
                uid: clone,
                source,
                destination,
                contract,
                ..original
            },
        );
        self.record(ElementRef::Edge(uid), clone);
        Ok(clone)
    }

    fn clone_connection(&mut self, uid: Uid) -> Result<Uid> {
        let original = self.project.store.get_connection(uid)?;
        let source = self.mapped(ElementRef::Variable(original.source))?;
        let destination = self.mapped(ElementRef::Variable(original.destination))?;
        let clone = self.uids.alloc();
        self.out.store.connections.insert(
            clone,
            SystemConnection {
                uid: clone,
                source,
                destination,
            },
        );
        self.record(ElementRef::Connection(uid), clone);
        Ok(clone)
    }

    /// Clones `root` and everything below it in one go, so every element of
    /// the subtree is mapped once this returns.
    fn clone_subtree(&mut self, root: Uid) -> Result<Uid> {
        let originals = self.project.store.subtree(root);

        // ids first, so parents can point at children cloned after them
        for uid in originals.iter().copied() {
            let (clone, name) = self.fresh();
            let original = self.project.store.get_system(uid)?;
            let parent = match original.parent {
                Some(parent) if uid != root => Some(self.mapped(ElementRef::System(parent))?),
                _ => None,
            };
            let mut system = crate::project::empty_system(clone, name, parent);
            system.code = original.code.clone();
            self.out.store.systems.insert(clone, system);
            self.record(ElementRef::System(uid), clone);
        }

        // owned elements that nothing else depends on
        for uid in originals.iter().copied() {
            let original = self.project.store.get_system(uid)?;
            let states = original.automaton.states.clone();
            let variables = original.variables.clone();
            let mut cloned_states = Vec::with_capacity(states.len());
            for state in states {
                cloned_states.push(self.clone_state(state)?);
            }
            let mut cloned_variables = Vec::with_capacity(variables.len());
            for variable in variables {
                cloned_variables.push(self.clone_variable(variable)?);
            }
            let clone = self.mapped(ElementRef::System(uid))?;
            let system = self.out.store.get_system_mut(clone)?;
            system.automaton.states = cloned_states;
            system.variables = cloned_variables;
        }

        // everything holding cross-references
        for uid in originals.iter().copied() {
            let original: System = self.project.store.get_system(uid)?.clone();

            let mut edges = Vec::with_capacity(original.automaton.edges.len());
            for edge in original.automaton.edges.iter().copied() {
                edges.push(self.clone_edge(edge)?);
            }
            let mut regions = Vec::with_capacity(original.automaton.regions.len());
            for region in original.automaton.regions.iter().copied() {
                let members = self
                    .project
                    .store
                    .get_region(region)?
                    .states
                    .iter()
                    .map(|s| self.mapped(ElementRef::State(*s)))
                    .collect::<Result<Vec<_>>>()?;
                regions.push(self.clone_region(region, members)?);
            }
            let mut connections = Vec::with_capacity(original.connections.len());
            for connection in original.connections.iter().copied() {
                connections.push(self.clone_connection(connection)?);
            }
            let children = original
                .children
                .iter()
                .map(|c| self.mapped(ElementRef::System(*c)))
                .collect::<Result<Vec<_>>>()?;
            let start_state = match original.automaton.start_state {
                Some(start) => Some(self.mapped(ElementRef::State(start))?),
                None => None,
            };

            let clone = self.mapped(ElementRef::System(uid))?;
            let system = self.out.store.get_system_mut(clone)?;
            system.automaton.edges = edges;
            system.automaton.regions = regions;
            system.automaton.start_state = start_state;
            system.connections = connections;
            system.children = children;
        }

        self.mapped(ElementRef::System(root))
    }
}

/// Subtrees first, then elements that reference nothing else in the
/// selection, then edges and connections.
fn clone_rank(element: ElementRef) -> u8 {
    match element {
        ElementRef::System(_) => 0,
        ElementRef::State(_)
        | ElementRef::Region(_)
        | ElementRef::Variable(_)
        | ElementRef::Contract(_) => 1,
        ElementRef::Edge(_) | ElementRef::Connection(_) => 2,
    }
}

/// Copies `selection`, drawing ids from the project's allocator.
pub fn copy(
    project: &mut Project,
    selection: &[ElementRef],
    ctx: &EditorContext,
) -> Result<Clipboard> {
    let mut uids = project.uids.clone();
    let clipboard = GraphCloner::new(project, &mut uids, ctx).copy(selection)?;
    project.uids = uids;
    Ok(clipboard)
}
