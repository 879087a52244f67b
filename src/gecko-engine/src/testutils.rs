// Copyright 2024 The Gecko Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Builder for test projects.
//!
//! Elements are addressed by the names given to the builder; `"root"` is
//! the project's root system.

use std::collections::HashMap;

use crate::datamodel::{ElementRef, Visibility};
use crate::geometry::Geometry;
use crate::project::Project;
use crate::uid::Uid;

pub struct TestProject {
    pub project: Project,
    names: HashMap<String, ElementRef>,
}

impl TestProject {
    pub fn new() -> Self {
        let project = Project::new();
        let mut names = HashMap::new();
        names.insert("root".to_string(), ElementRef::System(project.root));
        Self { project, names }
    }

    fn named(mut self, name: &str, element: ElementRef) -> Self {
        self.project.rename(element, name).unwrap();
        self.names.insert(name.to_string(), element);
        self
    }

    /// A child system of `parent`.
    pub fn system(mut self, parent: &str, name: &str) -> Self {
        let parent = self.uid(parent);
        let uid = self.project.create_system(parent).unwrap();
        self.named(name, ElementRef::System(uid))
    }

    pub fn state(mut self, system: &str, name: &str) -> Self {
        let system = self.uid(system);
        let uid = self.project.create_state(system).unwrap();
        self.named(name, ElementRef::State(uid))
    }

    /// A state placed at `(x, y)` with the default state size.
    pub fn state_at(self, system: &str, name: &str, x: f64, y: f64) -> Self {
        let this = self.state(system, name);
        this.at(name, x, y)
    }

    pub fn contract(mut self, state: &str, name: &str) -> Self {
        let state = self.uid(state);
        let uid = self.project.create_contract(state).unwrap();
        self.named(name, ElementRef::Contract(uid))
    }

    /// An edge is named for lookup only; edges carry no display name.
    pub fn edge(
        mut self,
        system: &str,
        name: &str,
        from: &str,
        to: &str,
        contract: Option<&str>,
    ) -> Self {
        let (system, from, to) = (self.uid(system), self.uid(from), self.uid(to));
        let uid = self.project.create_edge(system, from, to).unwrap();
        if let Some(contract) = contract {
            let contract = self.uid(contract);
            self.project.set_edge_contract(uid, Some(contract)).unwrap();
        }
        self.names.insert(name.to_string(), ElementRef::Edge(uid));
        self
    }

    pub fn region(mut self, system: &str, name: &str, members: &[&str]) -> Self {
        let system = self.uid(system);
        let uid = self.project.create_region(system).unwrap();
        for member in members {
            let member = self.uid(member);
            self.project.add_region_state(uid, member).unwrap();
        }
        self.named(name, ElementRef::Region(uid))
    }

    pub fn variable(mut self, system: &str, name: &str, visibility: Visibility) -> Self {
        let system = self.uid(system);
        let uid = self.project.create_variable(system).unwrap();
        self.project.set_visibility(uid, visibility).unwrap();
        self.named(name, ElementRef::Variable(uid))
    }

    pub fn connection(mut self, system: &str, name: &str, from: &str, to: &str) -> Self {
        let (system, from, to) = (self.uid(system), self.uid(from), self.uid(to));
        let uid = self
            .project
            .create_system_connection(system, from, to)
            .unwrap();
        self.names.insert(name.to_string(), ElementRef::Connection(uid));
        self
    }

    pub fn start(mut self, system: &str, state: &str) -> Self {
        let (system, state) = (self.uid(system), self.uid(state));
        self.project.set_start_state(system, Some(state)).unwrap();
        self
    }

    /// Moves `name` so its top-left corner sits at `(x, y)`.
    pub fn at(mut self, name: &str, x: f64, y: f64) -> Self {
        let element = self.get(name);
        let size = self.project.geometry_of(element).size;
        self.project
            .set_geometry(element, Geometry::at(x, y, size.x, size.y));
        self
    }

    pub fn get(&self, name: &str) -> ElementRef {
        match self.names.get(name) {
            Some(element) => *element,
            None => panic!("no element named {name} in test project"),
        }
    }

    pub fn uid(&self, name: &str) -> Uid {
        self.get(name).uid()
    }

    pub fn refs(&self, names: &[&str]) -> Vec<ElementRef> {
        names.iter().map(|n| self.get(n)).collect()
    }
}

#[test]
fn test_builder_wires_elements() {
    let t = TestProject::new()
        .state("root", "idle")
        .state("root", "busy")
        .contract("idle", "go")
        .edge("root", "start", "idle", "busy", Some("go"))
        .region("root", "safe", &["idle"])
        .start("root", "idle");

    let edge = t.project.store.get_edge(t.uid("start")).unwrap();
    assert_eq!(edge.source, t.uid("idle"));
    assert_eq!(edge.contract, Some(t.uid("go")));
    assert_eq!(
        t.project.store.get_region(t.uid("safe")).unwrap().states,
        vec![t.uid("idle")]
    );
    assert_eq!(
        t.project.root_system().automaton.start_state,
        Some(t.uid("idle"))
    );
    assert_eq!(t.project.store.name_of(t.get("busy")), Some("busy"));
}
