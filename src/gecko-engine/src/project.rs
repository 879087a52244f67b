// Copyright 2024 The Gecko Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeMap;

use smallvec::SmallVec;
use tracing::debug;

use crate::common::Result;
use crate::config::EngineConfig;
use crate::datamodel::{
    Automaton, Condition, Contract, Edge, ElementRef, Region, State, Store, System,
    SystemConnection, Variable, Visibility,
};
use crate::geometry::{Geometry, Point};
use crate::uid::{Uid, UidManager};
use crate::validate;
use crate::{invariant_err, model_err};

/// One open project: the element arena, the id allocator shared by the
/// factory and the copy/paste engine, and the canvas geometry of every
/// positionable element.
#[derive(Clone, Debug)]
pub struct Project {
    pub store: Store,
    pub root: Uid,
    pub uids: UidManager,
    pub geometry: BTreeMap<Uid, Geometry>,
    pub config: EngineConfig,
}

impl Project {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let mut uids = UidManager::new();
        let root = uids.alloc();
        let mut project = Project {
            store: Store::new(),
            root,
            uids,
            geometry: BTreeMap::new(),
            config,
        };
        let name = project.default_name(root);
        project.store.systems.insert(root, empty_system(root, name, None));
        project
    }

    pub fn new_uid(&mut self) -> Uid {
        self.uids.alloc()
    }

    /// Probes `<prefix><n>` from `start` upward until the name is unused
    /// anywhere in the project.
    pub fn default_name(&self, start: Uid) -> String {
        probe_name(&self.config.default_name_prefix, start, |name| {
            !self.is_name_unique(name)
        })
    }

    pub fn is_name_unique(&self, name: &str) -> bool {
        !self.store.is_name_used(name)
    }

    fn fresh(&mut self) -> (Uid, String) {
        let uid = self.new_uid();
        let name = self.default_name(uid);
        (uid, name)
    }

    pub fn root_system(&self) -> &System {
        // the root is created with the project and can never be removed
        &self.store.systems[&self.root]
    }

    /// `system` and its parents, innermost first.
    pub fn ancestors(&self, system: Uid) -> SmallVec<[Uid; 8]> {
        let mut out = SmallVec::new();
        let mut current = Some(system);
        while let Some(uid) = current {
            if out.contains(&uid) {
                break;
            }
            out.push(uid);
            current = self.store.systems.get(&uid).and_then(|s| s.parent);
        }
        out
    }

    pub fn system_with_variable(&self, variable: Uid) -> Option<Uid> {
        self.store.system_with_variable(variable)
    }

    pub fn is_ancestor(&self, ancestor: Uid, system: Uid) -> bool {
        ancestor != system && self.store.is_ancestor_or_self(ancestor, system)
    }

    pub fn geometry_of(&self, element: ElementRef) -> Geometry {
        self.geometry
            .get(&element.uid())
            .copied()
            .unwrap_or_default()
    }

    pub fn set_geometry(&mut self, element: ElementRef, geometry: Geometry) {
        self.geometry.insert(element.uid(), geometry);
    }

    // ----- insertion primitives, shared by the factory and the grafter -----

    pub fn insert_system(&mut self, parent: Uid, mut system: System) -> Result<()> {
        validate::validate_name(&system.name)?;
        validate::validate_system_parent(&self.store, parent, system.uid)?;
        system.parent = Some(parent);
        let uid = system.uid;
        self.store.systems.insert(uid, system);
        self.store.get_system_mut(parent)?.children.push(uid);
        Ok(())
    }

    pub fn insert_state(
        &mut self,
        system: Uid,
        state: State,
        contracts: Vec<Contract>,
    ) -> Result<()> {
        validate::validate_name(&state.name)?;
        self.store.get_system(system)?;
        for contract in contracts {
            self.store.contracts.insert(contract.uid, contract);
        }
        let uid = state.uid;
        self.store.states.insert(uid, state);
        self.store.get_system_mut(system)?.automaton.states.push(uid);
        Ok(())
    }

    pub fn insert_edge(&mut self, system: Uid, edge: Edge) -> Result<()> {
        validate::validate_edge(&self.store, system, &edge)?;
        let uid = edge.uid;
        self.store.edges.insert(uid, edge);
        self.store.get_system_mut(system)?.automaton.edges.push(uid);
        Ok(())
    }

    pub fn insert_region(&mut self, system: Uid, region: Region, contract: Contract) -> Result<()> {
        validate::validate_region(&self.store, system, &region.name, &region.states)?;
        let uid = region.uid;
        self.store.contracts.insert(contract.uid, contract);
        self.store.regions.insert(uid, region);
        self.store.get_system_mut(system)?.automaton.regions.push(uid);
        Ok(())
    }

    pub fn insert_variable(&mut self, system: Uid, variable: Variable) -> Result<()> {
        validate::validate_name(&variable.name)?;
        self.store.get_system(system)?;
        let uid = variable.uid;
        self.store.variables.insert(uid, variable);
        self.store.get_system_mut(system)?.variables.push(uid);
        Ok(())
    }

    pub fn insert_connection(&mut self, system: Uid, connection: SystemConnection) -> Result<()> {
        validate::validate_connection(
            &self.store,
            system,
            connection.source,
            connection.destination,
        )?;
        let uid = connection.uid;
        let destination = connection.destination;
        self.store.connections.insert(uid, connection);
        self.store.get_system_mut(system)?.connections.push(uid);
        self.store.get_variable_mut(destination)?.has_incoming_connection = true;
        Ok(())
    }

    // ----- factory -----

    pub fn create_system(&mut self, parent: Uid) -> Result<Uid> {
        self.store.get_system(parent)?;
        let (uid, name) = self.fresh();
        self.insert_system(parent, empty_system(uid, name, Some(parent)))?;
        self.set_geometry(
            ElementRef::System(uid),
            Geometry::new(Point::ZERO, self.config.system_size),
        );
        Ok(uid)
    }

    pub fn create_state(&mut self, system: Uid) -> Result<Uid> {
        self.store.get_system(system)?;
        let (uid, name) = self.fresh();
        let state = State {
            uid,
            name,
            contracts: vec![],
        };
        self.insert_state(system, state, vec![])?;
        self.set_geometry(
            ElementRef::State(uid),
            Geometry::new(Point::ZERO, self.config.state_size),
        );
        Ok(uid)
    }

    fn default_contract(&mut self) -> Contract {
        let (uid, name) = self.fresh();
        Contract {
            uid,
            name,
            pre_condition: Condition::new(&self.config.default_condition),
            post_condition: Condition::new(&self.config.default_condition),
        }
    }

    pub fn create_contract(&mut self, state: Uid) -> Result<Uid> {
        self.store.get_state(state)?;
        let contract = self.default_contract();
        let uid = contract.uid;
        self.store.contracts.insert(uid, contract);
        self.store.get_state_mut(state)?.contracts.push(uid);
        Ok(uid)
    }

    pub fn create_edge(&mut self, system: Uid, source: Uid, destination: Uid) -> Result<Uid> {
        let uid = self.new_uid();
        let edge = Edge {
            uid,
            source,
            destination,
            contract: None,
            kind: self.config.default_edge_kind,
            priority: self.config.default_edge_priority,
        };
        self.insert_edge(system, edge)?;
        self.set_geometry(ElementRef::Edge(uid), Geometry::default());
        Ok(uid)
    }

    pub fn create_region(&mut self, system: Uid) -> Result<Uid> {
        self.store.get_system(system)?;
        let contract = self.default_contract();
        let uid = self.new_uid();
        let name = probe_name(&self.config.default_name_prefix, uid, |name| {
            name == contract.name || !self.is_name_unique(name)
        });
        let region = Region {
            uid,
            name,
            invariant: Condition::new(&self.config.default_condition),
            contract: contract.uid,
            states: vec![],
        };
        self.insert_region(system, region, contract)?;
        self.set_geometry(
            ElementRef::Region(uid),
            Geometry::new(Point::ZERO, self.config.region_size),
        );
        Ok(uid)
    }

    pub fn create_variable(&mut self, system: Uid) -> Result<Uid> {
        self.store.get_system(system)?;
        let (uid, name) = self.fresh();
        let variable = Variable {
            uid,
            name,
            var_type: self.config.default_variable_type.clone(),
            value: String::new(),
            visibility: self.config.default_visibility,
            has_incoming_connection: false,
        };
        self.insert_variable(system, variable)?;
        self.set_geometry(
            ElementRef::Variable(uid),
            Geometry::new(Point::ZERO, self.config.port_size),
        );
        Ok(uid)
    }

    pub fn create_system_connection(
        &mut self,
        system: Uid,
        source: Uid,
        destination: Uid,
    ) -> Result<Uid> {
        let uid = self.new_uid();
        let connection = SystemConnection {
            uid,
            source,
            destination,
        };
        self.insert_connection(system, connection)?;
        self.set_geometry(ElementRef::Connection(uid), Geometry::default());
        Ok(uid)
    }

    // ----- edits -----

    pub fn set_start_state(&mut self, system: Uid, state: Option<Uid>) -> Result<()> {
        let previous = self.store.get_system(system)?.automaton.start_state;
        self.store.get_system_mut(system)?.automaton.start_state = state;
        if let Err(err) = validate::validate_start_state(&self.store, system) {
            self.store.get_system_mut(system)?.automaton.start_state = previous;
            return Err(err);
        }
        Ok(())
    }

    pub fn set_edge_contract(&mut self, edge: Uid, contract: Option<Uid>) -> Result<()> {
        let Some(system) = self.store.system_with_edge(edge) else {
            return model_err!(DoesNotExist, format!("edge {edge} has no automaton"));
        };
        let mut updated = self.store.get_edge(edge)?.clone();
        updated.contract = contract;
        validate::validate_edge(&self.store, system, &updated)?;
        *self.store.get_edge_mut(edge)? = updated;
        Ok(())
    }

    pub fn add_region_state(&mut self, region: Uid, state: Uid) -> Result<()> {
        let Some(system) = self.store.system_with_region(region) else {
            return model_err!(DoesNotExist, format!("region {region} has no automaton"));
        };
        let r = self.store.get_region(region)?;
        if r.states.contains(&state) {
            return Ok(());
        }
        validate::validate_region(&self.store, system, &r.name, &[state])?;
        self.store.get_region_mut(region)?.states.push(state);
        Ok(())
    }

    pub fn set_visibility(&mut self, variable: Uid, visibility: Visibility) -> Result<()> {
        self.store.get_variable_mut(variable)?.visibility = visibility;
        Ok(())
    }

    pub fn set_code(&mut self, system: Uid, code: &str) -> Result<()> {
        self.store.get_system_mut(system)?.code = code.to_string();
        Ok(())
    }

    pub fn rename(&mut self, element: ElementRef, name: &str) -> Result<()> {
        validate::validate_name(name)?;
        if self.store.name_of(element) == Some(name) {
            return Ok(());
        }
        if !self.is_name_unique(name) {
            return invariant_err!(DuplicateName, format!("'{name}' is already in use"));
        }
        let slot = match element {
            ElementRef::System(uid) => &mut self.store.get_system_mut(uid)?.name,
            ElementRef::State(uid) => &mut self.store.get_state_mut(uid)?.name,
            ElementRef::Contract(uid) => &mut self.store.get_contract_mut(uid)?.name,
            ElementRef::Region(uid) => &mut self.store.get_region_mut(uid)?.name,
            ElementRef::Variable(uid) => &mut self.store.get_variable_mut(uid)?.name,
            ElementRef::Edge(_) | ElementRef::Connection(_) => {
                return model_err!(Generic, format!("{element} has no name"));
            }
        };
        *slot = name.to_string();
        Ok(())
    }

    // ----- removal -----

    pub fn remove(&mut self, element: ElementRef) -> Result<()> {
        match element {
            ElementRef::System(uid) => self.remove_system(uid),
            ElementRef::State(uid) => self.remove_state(uid),
            ElementRef::Contract(uid) => self.remove_contract(uid),
            ElementRef::Edge(uid) => self.remove_edge(uid),
            ElementRef::Region(uid) => self.remove_region(uid),
            ElementRef::Variable(uid) => self.remove_variable(uid),
            ElementRef::Connection(uid) => self.remove_connection(uid),
        }
    }

    pub fn remove_connection(&mut self, connection: Uid) -> Result<()> {
        let removed = self.store.get_connection(connection)?.clone();
        if let Some(owner) = self.store.system_with_connection(connection) {
            self.store
                .get_system_mut(owner)?
                .connections
                .retain(|c| *c != connection);
        }
        self.store.connections.remove(&connection);
        self.geometry.remove(&connection);
        let still_connected = self
            .store
            .connections
            .values()
            .any(|c| c.destination == removed.destination);
        if let Ok(destination) = self.store.get_variable_mut(removed.destination) {
            destination.has_incoming_connection = still_connected;
        }
        Ok(())
    }

    pub fn remove_edge(&mut self, edge: Uid) -> Result<()> {
        self.store.get_edge(edge)?;
        if let Some(owner) = self.store.system_with_edge(edge) {
            self.store
                .get_system_mut(owner)?
                .automaton
                .edges
                .retain(|e| *e != edge);
        }
        self.store.edges.remove(&edge);
        self.geometry.remove(&edge);
        Ok(())
    }

    pub fn remove_state(&mut self, state: Uid) -> Result<()> {
        let contracts = self.store.get_state(state)?.contracts.clone();
        let touching: Vec<Uid> = self
            .store
            .edges
            .values()
            .filter(|e| e.source == state || e.destination == state)
            .map(|e| e.uid)
            .collect();
        for edge in touching {
            self.remove_edge(edge)?;
        }
        for region in self.store.regions.values_mut() {
            region.states.retain(|s| *s != state);
        }
        if let Some(owner) = self.store.system_with_state(state) {
            let automaton = &mut self.store.get_system_mut(owner)?.automaton;
            automaton.states.retain(|s| *s != state);
            if automaton.start_state == Some(state) {
                automaton.start_state = None;
            }
        }
        for contract in contracts {
            self.store.contracts.remove(&contract);
        }
        self.store.states.remove(&state);
        self.geometry.remove(&state);
        Ok(())
    }

    pub fn remove_contract(&mut self, contract: Uid) -> Result<()> {
        self.store.get_contract(contract)?;
        match self.store.owner_of(ElementRef::Contract(contract)) {
            Some(ElementRef::Region(region)) => invariant_err!(
                Generic,
                format!("contract {contract} is owned by region {region}")
            ),
            Some(ElementRef::State(state)) => {
                self.store
                    .get_state_mut(state)?
                    .contracts
                    .retain(|c| *c != contract);
                for edge in self.store.edges.values_mut() {
                    if edge.contract == Some(contract) {
                        edge.contract = None;
                    }
                }
                self.store.contracts.remove(&contract);
                Ok(())
            }
            _ => {
                self.store.contracts.remove(&contract);
                Ok(())
            }
        }
    }

    pub fn remove_region(&mut self, region: Uid) -> Result<()> {
        let contract = self.store.get_region(region)?.contract;
        if let Some(owner) = self.store.system_with_region(region) {
            self.store
                .get_system_mut(owner)?
                .automaton
                .regions
                .retain(|r| *r != region);
        }
        self.store.regions.remove(&region);
        self.store.contracts.remove(&contract);
        self.geometry.remove(&region);
        Ok(())
    }

    pub fn remove_variable(&mut self, variable: Uid) -> Result<()> {
        self.store.get_variable(variable)?;
        let touching: Vec<Uid> = self
            .store
            .connections
            .values()
            .filter(|c| c.source == variable || c.destination == variable)
            .map(|c| c.uid)
            .collect();
        for connection in touching {
            self.remove_connection(connection)?;
        }
        if let Some(owner) = self.store.system_with_variable(variable) {
            self.store
                .get_system_mut(owner)?
                .variables
                .retain(|v| *v != variable);
        }
        self.store.variables.remove(&variable);
        self.geometry.remove(&variable);
        Ok(())
    }

    pub fn remove_system(&mut self, system: Uid) -> Result<()> {
        if system == self.root {
            return invariant_err!(CannotRemoveRoot, "the root system is permanent".to_string());
        }
        let parent = self.store.get_system(system)?.parent;

        // children first, so every variable removal also drops the
        // connections reaching into the subtree from outside
        let mut subtree = self.store.subtree(system);
        subtree.reverse();
        for uid in subtree {
            let s = self.store.get_system(uid)?.clone();
            for connection in s.connections {
                if self.store.connections.contains_key(&connection) {
                    self.remove_connection(connection)?;
                }
            }
            for variable in s.variables {
                self.remove_variable(variable)?;
            }
            for region in s.automaton.regions {
                self.remove_region(region)?;
            }
            for state in s.automaton.states {
                self.remove_state(state)?;
            }
            self.store.systems.remove(&uid);
            self.geometry.remove(&uid);
        }

        if let Some(parent) = parent {
            self.store
                .get_system_mut(parent)?
                .children
                .retain(|c| *c != system);
        }
        debug!(system = %system, "removed system subtree");
        Ok(())
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

/// First `<prefix><n>`, `n >= start`, that `is_used` rejects.
pub(crate) fn probe_name(prefix: &str, start: Uid, is_used: impl Fn(&str) -> bool) -> String {
    let mut n = start.get();
    loop {
        let name = format!("{prefix}{n}");
        if !is_used(&name) {
            return name;
        }
        n += 1;
    }
}

pub(crate) fn empty_system(uid: Uid, name: String, parent: Option<Uid>) -> System {
    System {
        uid,
        name,
        code: String::new(),
        parent,
        children: vec![],
        variables: vec![],
        connections: vec![],
        automaton: Automaton::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;

    #[test]
    fn test_new_project_has_named_root() {
        let project = Project::new();
        assert_eq!(project.root, Uid(1));
        assert_eq!(project.root_system().name, "Element_1");
        assert!(project.root_system().parent.is_none());
    }

    #[test]
    fn test_default_name_probes_upward() {
        let mut project = Project::new();
        let state = project.create_state(project.root).unwrap();
        assert_eq!(state, Uid(2));
        project
            .rename(ElementRef::State(state), "Element_3")
            .unwrap();
        // Element_3 is taken, so the next free slot from 3 is Element_4
        assert_eq!(project.default_name(Uid(3)), "Element_4");
        assert_eq!(project.default_name(Uid(2)), "Element_2");
    }

    #[test]
    fn test_rename_rules() {
        let mut project = Project::new();
        let a = project.create_state(project.root).unwrap();
        let b = project.create_state(project.root).unwrap();
        project.rename(ElementRef::State(a), "idle").unwrap();
        let err = project.rename(ElementRef::State(b), "idle").unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateName);
        let err = project.rename(ElementRef::State(b), "").unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyName);
        // renaming to the current name is a no-op
        project.rename(ElementRef::State(a), "idle").unwrap();
    }

    #[test]
    fn test_start_state_must_be_member() {
        let mut project = Project::new();
        let root = project.root;
        let child = project.create_system(root).unwrap();
        let foreign = project.create_state(child).unwrap();
        let own = project.create_state(root).unwrap();

        let err = project.set_start_state(root, Some(foreign)).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStartState);
        assert_eq!(project.root_system().automaton.start_state, None);

        project.set_start_state(root, Some(own)).unwrap();
        assert_eq!(project.root_system().automaton.start_state, Some(own));
    }

    #[test]
    fn test_edge_endpoints_and_contract() {
        let mut project = Project::new();
        let root = project.root;
        let child = project.create_system(root).unwrap();
        let a = project.create_state(root).unwrap();
        let b = project.create_state(root).unwrap();
        let elsewhere = project.create_state(child).unwrap();

        let err = project.create_edge(root, a, elsewhere).unwrap_err();
        assert_eq!(err.code, ErrorCode::StateNotInAutomaton);

        let edge = project.create_edge(root, a, b).unwrap();
        let on_b = project.create_contract(b).unwrap();
        let err = project.set_edge_contract(edge, Some(on_b)).unwrap_err();
        assert_eq!(err.code, ErrorCode::ContractNotOnSource);

        let on_a = project.create_contract(a).unwrap();
        project.set_edge_contract(edge, Some(on_a)).unwrap();
        assert_eq!(project.store.get_edge(edge).unwrap().contract, Some(on_a));
    }

    #[test]
    fn test_remove_connection_resets_flag() {
        let mut project = Project::new();
        let root = project.root;
        let a = project.create_system(root).unwrap();
        let b = project.create_system(root).unwrap();
        let out = project.create_variable(a).unwrap();
        project.set_visibility(out, Visibility::Output).unwrap();
        let input = project.create_variable(b).unwrap();

        let conn = project.create_system_connection(root, out, input).unwrap();
        assert!(project.store.get_variable(input).unwrap().has_incoming_connection);

        // the destination only takes one source at a time
        let other = project.create_variable(a).unwrap();
        project.set_visibility(other, Visibility::Output).unwrap();
        let err = project
            .create_system_connection(root, other, input)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DestinationConnected);

        project.remove_connection(conn).unwrap();
        assert!(!project.store.get_variable(input).unwrap().has_incoming_connection);
        assert!(project.store.get_system(root).unwrap().connections.is_empty());
        project.create_system_connection(root, other, input).unwrap();
    }

    #[test]
    fn test_remove_state_cleans_references() {
        let mut project = Project::new();
        let root = project.root;
        let a = project.create_state(root).unwrap();
        let b = project.create_state(root).unwrap();
        let contract = project.create_contract(a).unwrap();
        let edge = project.create_edge(root, a, b).unwrap();
        let region = project.create_region(root).unwrap();
        project.add_region_state(region, a).unwrap();
        project.add_region_state(region, b).unwrap();
        project.set_start_state(root, Some(a)).unwrap();

        project.remove_state(a).unwrap();
        assert!(project.store.get_edge(edge).is_err());
        assert!(project.store.get_contract(contract).is_err());
        assert_eq!(project.store.get_region(region).unwrap().states, vec![b]);
        assert_eq!(project.root_system().automaton.start_state, None);
        assert_eq!(project.root_system().automaton.states, vec![b]);
    }

    #[test]
    fn test_remove_system_subtree() {
        let mut project = Project::new();
        let root = project.root;
        let child = project.create_system(root).unwrap();
        let grandchild = project.create_system(child).unwrap();
        let port = project.create_variable(grandchild).unwrap();
        let state = project.create_state(child).unwrap();
        let outer = project.create_variable(root).unwrap();
        project.set_visibility(outer, Visibility::Input).unwrap();
        let child_in = project.create_variable(child).unwrap();
        project
            .create_system_connection(root, outer, child_in)
            .unwrap();

        project.remove_system(child).unwrap();
        assert!(project.store.get_system(grandchild).is_err());
        assert!(project.store.get_variable(port).is_err());
        assert!(project.store.get_state(state).is_err());
        assert!(project.store.connections.is_empty());
        assert!(project.root_system().connections.is_empty());
        assert!(project.root_system().children.is_empty());

        let err = project.remove_system(root).unwrap_err();
        assert_eq!(err.code, ErrorCode::CannotRemoveRoot);
    }

    #[test]
    fn test_insert_system_rejects_cycle() {
        let mut project = Project::new();
        let root = project.root;
        let child = project.create_system(root).unwrap();
        let mut again = project.store.get_system(root).unwrap().clone();
        again.name = "loop".to_string();
        let err = project.insert_system(child, again).unwrap_err();
        assert_eq!(err.code, ErrorCode::CyclicSystem);
    }

    #[test]
    fn test_ancestors() {
        let mut project = Project::new();
        let root = project.root;
        let child = project.create_system(root).unwrap();
        let grandchild = project.create_system(child).unwrap();
        assert_eq!(project.ancestors(grandchild).as_slice(), &[grandchild, child, root]);
        assert_eq!(project.ancestors(root).as_slice(), &[root]);
        assert!(project.is_ancestor(root, grandchild));
        assert!(!project.is_ancestor(grandchild, grandchild));
        assert!(!project.is_ancestor(grandchild, root));
    }
}
