// Copyright 2024 The Gecko Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Paste: grafting a clipboard graph into a target system.
//!
//! Clipboard roots are attached one kind at a time (systems, states,
//! variables, regions, edges, connections) so every kind finds the live
//! copies of what it references already in `clone_to_live`.  There is no
//! second pass: an element whose references did not make it is recorded as
//! unresolved and skipped.

use std::collections::{HashMap, HashSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clipboard::Clipboard;
use crate::common::Result;
use crate::datamodel::{Contract, Edge, ElementRef, Region, State, SystemConnection, Variable};
use crate::geometry::{Geometry, Point, sized_bounds};
use crate::model_err;
use crate::project::{Project, empty_system, probe_name};
use crate::uid::Uid;

/// What a paste added to the project.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PasteOutcome {
    /// Live elements attached directly to the target, in graft order.
    pub pasted: Vec<ElementRef>,
    /// Recentred geometry of each pasted element, followed for a pasted
    /// system by that of every system nested in it.
    pub geometry: Vec<(ElementRef, Geometry)>,
    /// Pasted variables that came from another system and should show up
    /// as ports of the target block.
    pub ports: Vec<Uid>,
    /// Clipboard elements that could not be attached.
    pub unresolved: Vec<ElementRef>,
}

pub struct GraphGrafter<'a> {
    project: &'a mut Project,
    clipboard: &'a Clipboard,
    target: Uid,
    clone_to_live: HashMap<ElementRef, ElementRef>,
    // names handed out for elements not yet inserted
    reserved: HashSet<String>,
    outcome: PasteOutcome,
}

impl<'a> GraphGrafter<'a> {
    pub fn new(project: &'a mut Project, clipboard: &'a Clipboard, target: Uid) -> Self {
        GraphGrafter {
            project,
            clipboard,
            target,
            clone_to_live: HashMap::new(),
            reserved: HashSet::new(),
            outcome: PasteOutcome::default(),
        }
    }

    pub fn graft(mut self, paste_offset: Point) -> Result<PasteOutcome> {
        self.project.store.get_system(self.target)?;

        let mut order = self.clipboard.roots.clone();
        order.sort_by_key(|e| graft_rank(*e));

        for element in order {
            let grafted = match element {
                ElementRef::System(uid) => self.graft_system(uid).map(ElementRef::System),
                ElementRef::State(uid) => self.graft_state(uid).map(ElementRef::State),
                ElementRef::Variable(uid) => self.graft_variable(uid).map(ElementRef::Variable),
                ElementRef::Region(uid) => self.graft_region(uid).map(ElementRef::Region),
                ElementRef::Edge(uid) => self.graft_edge(uid).map(ElementRef::Edge),
                ElementRef::Connection(uid) => {
                    self.graft_connection(uid).map(ElementRef::Connection)
                }
                ElementRef::Contract(uid) => {
                    model_err!(Generic, format!("contract {uid} is pasted with its owner"))
                }
            };
            match grafted {
                Ok(live) => {
                    self.outcome.pasted.push(live);
                    let geometry = self.clipboard.geometry_of(element);
                    self.outcome.geometry.push((live, geometry));
                    if let ElementRef::System(uid) = element {
                        self.track_nested_systems(uid);
                    }
                }
                Err(err) => {
                    debug!(%element, error = %err, "skipping unresolved clipboard element");
                    self.outcome.unresolved.push(element);
                }
            }
        }

        self.recenter(paste_offset);
        for (live, geometry) in self.outcome.geometry.iter() {
            self.project.set_geometry(*live, *geometry);
        }

        debug!(
            system = %self.target,
            pasted = self.outcome.pasted.len(),
            unresolved = self.outcome.unresolved.len(),
            "paste finished"
        );
        Ok(self.outcome)
    }

    /// Nested systems of a pasted subtree are recentred along with it.
    fn track_nested_systems(&mut self, root: Uid) {
        for nested in self.clipboard.store.subtree(root).into_iter().skip(1) {
            let nested = ElementRef::System(nested);
            if let Some(live) = self.clone_to_live.get(&nested).copied() {
                let geometry = self.clipboard.geometry_of(nested);
                self.outcome.geometry.push((live, geometry));
            }
        }
    }

    /// Moves the pasted elements so the centre of the bounding box of the
    /// sized ones lands on `paste_offset`.
    fn recenter(&mut self, paste_offset: Point) {
        let bounds = sized_bounds(self.outcome.geometry.iter().map(|(_, g)| g));
        let Some((min_pos, max_pos)) = bounds else {
            return;
        };
        let shift = paste_offset - min_pos.midpoint(max_pos);
        for (_, geometry) in self.outcome.geometry.iter_mut() {
            *geometry = geometry.translated(shift);
        }
    }

    fn fresh(&mut self) -> (Uid, String) {
        let uid = self.project.new_uid();
        let project = &*self.project;
        let reserved = &self.reserved;
        let name = probe_name(&project.config.default_name_prefix, uid, |name| {
            reserved.contains(name) || !project.is_name_unique(name)
        });
        self.reserved.insert(name.clone());
        (uid, name)
    }

    fn map(&mut self, clone: ElementRef, live: Uid) {
        self.clone_to_live.insert(clone, clone.with_uid(live));
    }

    fn live(&self, clone: ElementRef) -> Result<Uid> {
        match self.clone_to_live.get(&clone) {
            Some(live) => Ok(live.uid()),
            None => model_err!(MissingDependency, format!("{clone} was not pasted")),
        }
    }

    fn contract(&mut self, clone: Uid) -> Result<Contract> {
        let original = self.clipboard.store.get_contract(clone)?;
        let (pre_condition, post_condition) =
            (original.pre_condition.clone(), original.post_condition.clone());
        let (uid, name) = self.fresh();
        self.map(ElementRef::Contract(clone), uid);
        Ok(Contract {
            uid,
            name,
            pre_condition,
            post_condition,
        })
    }

    fn attach_state(&mut self, system: Uid, clone: Uid) -> Result<Uid> {
        let contracts = self.clipboard.store.get_state(clone)?.contracts.clone();
        let (uid, name) = self.fresh();
        let contracts = contracts
            .into_iter()
            .map(|c| self.contract(c))
            .collect::<Result<Vec<_>>>()?;
        let state = State {
            uid,
            name,
            contracts: contracts.iter().map(|c| c.uid).collect(),
        };
        self.project.insert_state(system, state, contracts)?;
        self.map(ElementRef::State(clone), uid);
        Ok(uid)
    }

    fn attach_variable(&mut self, system: Uid, clone: Uid) -> Result<Uid> {
        let original = self.clipboard.store.get_variable(clone)?.clone();
        let (uid, name) = self.fresh();
        let variable = Variable {
            uid,
            name,
            has_incoming_connection: false,
            ..original
        };
        self.project.insert_variable(system, variable)?;
        self.map(ElementRef::Variable(clone), uid);
        Ok(uid)
    }

    /// `members` are clipboard state ids.
    fn attach_region(&mut self, system: Uid, clone: Uid, members: &[Uid]) -> Result<Uid> {
        let original = self.clipboard.store.get_region(clone)?;
        let (invariant, contract) = (original.invariant.clone(), original.contract);
        let states: Vec<Uid> = members
            .iter()
            .filter_map(|m| self.live(ElementRef::State(*m)).ok())
            .collect();
        let contract = self.contract(contract)?;
        let (uid, name) = self.fresh();
        let region = Region {
            uid,
            name,
            invariant,
            contract: contract.uid,
            states,
        };
        self.project.insert_region(system, region, contract)?;
        self.map(ElementRef::Region(clone), uid);
        Ok(uid)
    }

    fn attach_edge(&mut self, system: Uid, clone: Uid) -> Result<Uid> {
        let original = self.clipboard.store.get_edge(clone)?.clone();
        let source = self.live(ElementRef::State(original.source))?;
        let destination = self.live(ElementRef::State(original.destination))?;
        let contract = match original.contract {
            Some(contract) => Some(self.live(ElementRef::Contract(contract))?),
            None => None,
        };
        let uid = self.project.new_uid();
        let edge = Edge {
            uid,
            source,
            destination,
            contract,
            ..original
        };
        self.project.insert_edge(system, edge)?;
        self.map(ElementRef::Edge(clone), uid);
        Ok(uid)
    }

    fn attach_connection(&mut self, system: Uid, clone: Uid) -> Result<Uid> {
        let original = self.clipboard.store.get_connection(clone)?;
        let source = self.live(ElementRef::Variable(original.source))?;
        let destination = self.live(ElementRef::Variable(original.destination))?;
        let uid = self.project.new_uid();
        let connection = SystemConnection {
            uid,
            source,
            destination,
        };
        if let Err(err) = self.project.insert_connection(system, connection) {
            warn!(connection = %clone, error = %err, "pasted connection rejected");
            return Err(err);
        }
        self.map(ElementRef::Connection(clone), uid);
        Ok(uid)
    }

    fn graft_state(&mut self, clone: Uid) -> Result<Uid> {
        let live = self.attach_state(self.target, clone)?;
        let automaton = &self.project.store.get_system(self.target)?.automaton;
        if automaton.start_state.is_none() {
            self.project.set_start_state(self.target, Some(live))?;
        }
        Ok(live)
    }

    fn graft_variable(&mut self, clone: Uid) -> Result<Uid> {
        let live = self.attach_variable(self.target, clone)?;
        let owner = self.clipboard.variable_owners.get(&clone).copied();
        if owner.is_some_and(|owner| owner != self.target) {
            self.outcome.ports.push(live);
        }
        Ok(live)
    }

    fn graft_region(&mut self, clone: Uid) -> Result<Uid> {
        // members are recorded as originals; only those pasted alongside
        // the region stay members
        let members: Vec<Uid> = self
            .clipboard
            .region_members
            .get(&clone)
            .map(|originals| {
                originals
                    .iter()
                    .filter_map(|s| self.clipboard.clone_of(ElementRef::State(*s)))
                    .map(|c| c.uid())
                    .collect()
            })
            .unwrap_or_default();
        self.attach_region(self.target, clone, &members)
    }

    fn graft_edge(&mut self, clone: Uid) -> Result<Uid> {
        self.attach_edge(self.target, clone)
    }

    fn graft_connection(&mut self, clone: Uid) -> Result<Uid> {
        self.attach_connection(self.target, clone)
    }

    /// Materialises the clipboard subtree rooted at `clone` below the
    /// target.  A subtree that fails part way is taken out again.
    fn graft_system(&mut self, clone: Uid) -> Result<Uid> {
        let grafted = self.materialise(clone);
        if grafted.is_err() {
            self.discard(clone);
        }
        grafted
    }

    fn discard(&mut self, clone: Uid) {
        let Some(live) = self.clone_to_live.get(&ElementRef::System(clone)).copied() else {
            return;
        };
        if let Err(err) = self.project.remove_system(live.uid()) {
            warn!(system = %live, error = %err, "partial subtree left in place");
        }
        let store = &self.project.store;
        self.clone_to_live.retain(|_, live| store.contains(*live));
    }

    fn materialise(&mut self, clone: Uid) -> Result<Uid> {
        let clones = self.clipboard.store.subtree(clone);

        for uid in clones.iter().copied() {
            let original = self.clipboard.store.get_system(uid)?;
            let parent = match original.parent {
                Some(parent) if uid != clone => self.live(ElementRef::System(parent))?,
                _ => self.target,
            };
            let code = original.code.clone();
            let (live, name) = self.fresh();
            let mut system = empty_system(live, name, Some(parent));
            system.code = code;
            self.project.insert_system(parent, system)?;
            self.map(ElementRef::System(uid), live);
        }

        for uid in clones.iter().copied() {
            let original = self.clipboard.store.get_system(uid)?;
            let states = original.automaton.states.clone();
            let variables = original.variables.clone();
            let live = self.live(ElementRef::System(uid))?;
            for state in states {
                self.attach_state(live, state)?;
            }
            for variable in variables {
                self.attach_variable(live, variable)?;
            }
        }

        for uid in clones.iter().copied() {
            let original = self.clipboard.store.get_system(uid)?.clone();
            let live = self.live(ElementRef::System(uid))?;
            if let Some(start) = original.automaton.start_state {
                let start = self.live(ElementRef::State(start))?;
                self.project.set_start_state(live, Some(start))?;
            }
            for edge in original.automaton.edges.iter().copied() {
                if let Err(err) = self.attach_edge(live, edge) {
                    debug!(edge = %edge, error = %err, "skipping edge of pasted system");
                    self.outcome.unresolved.push(ElementRef::Edge(edge));
                }
            }
            for region in original.automaton.regions.iter().copied() {
                let members = self.clipboard.store.get_region(region)?.states.clone();
                self.attach_region(live, region, &members)?;
            }
            for connection in original.connections.iter().copied() {
                if let Err(err) = self.attach_connection(live, connection) {
                    debug!(
                        connection = %connection,
                        error = %err,
                        "skipping connection of pasted system"
                    );
                    self.outcome.unresolved.push(ElementRef::Connection(connection));
                }
            }
        }

        self.restore_geometry(clone)?;
        self.live(ElementRef::System(clone))
    }

    /// Gives the contents of every system of the pasted subtree `root` the
    /// geometry captured for their clones.  The systems themselves are
    /// placed by recentring.
    fn restore_geometry(&mut self, root: Uid) -> Result<()> {
        for uid in self.clipboard.store.subtree(root) {
            let system = self.clipboard.store.get_system(uid)?;
            let owned = system
                .automaton
                .states
                .iter()
                .copied()
                .map(ElementRef::State)
                .chain(system.automaton.edges.iter().copied().map(ElementRef::Edge))
                .chain(system.automaton.regions.iter().copied().map(ElementRef::Region))
                .chain(system.variables.iter().copied().map(ElementRef::Variable))
                .chain(system.connections.iter().copied().map(ElementRef::Connection));
            for clone in owned {
                if let Some(live) = self.clone_to_live.get(&clone).copied() {
                    self.project
                        .set_geometry(live, self.clipboard.geometry_of(clone));
                }
            }
        }
        Ok(())
    }
}

/// Kinds are grafted in dependency order: containers first, then the
/// elements referencing them.
fn graft_rank(element: ElementRef) -> u8 {
    match element {
        ElementRef::System(_) => 0,
        ElementRef::State(_) | ElementRef::Contract(_) => 1,
        ElementRef::Variable(_) => 2,
        ElementRef::Region(_) => 3,
        ElementRef::Edge(_) => 4,
        ElementRef::Connection(_) => 5,
    }
}

/// Grafts `clipboard` into `target`, recentring it on `paste_offset`.
pub fn paste(
    project: &mut Project,
    clipboard: &Clipboard,
    target: Uid,
    paste_offset: Point,
) -> Result<PasteOutcome> {
    GraphGrafter::new(project, clipboard, target).graft(paste_offset)
}
