// Copyright 2024 The Gecko Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Property-based tests for copy and paste.

use std::collections::HashSet;

use proptest::prelude::*;

use crate::datamodel::ElementRef;
use crate::geometry::{Point, sized_bounds};
use crate::selection::{self, EditorContext};
use crate::session::Session;
use crate::testutils::TestProject;
use crate::uid::Uid;

fn coordinate() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(0.0),
        (-1000i32..1000).prop_map(|x| x as f64),
        (-100i32..100).prop_map(|x| x as f64 / 4.0),
    ]
}

/// A chain of `n` states `s0 -> s1 -> ... -> s{n-1}` in the root automaton,
/// each placed at its own coordinates.
fn chain(positions: &[(f64, f64)]) -> TestProject {
    let mut t = TestProject::new();
    for (i, (x, y)) in positions.iter().enumerate() {
        t = t.state_at("root", &format!("s{i}"), *x, *y);
    }
    for i in 1..positions.len() {
        t = t.edge("root", &format!("e{i}"), &format!("s{}", i - 1), &format!("s{i}"), None);
    }
    t
}

fn chain_strategy() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((coordinate(), coordinate()), 2..8)
}

fn all_uids(session: &Session) -> HashSet<Uid> {
    let store = &session.project.store;
    store
        .systems
        .keys()
        .chain(store.states.keys())
        .chain(store.contracts.keys())
        .chain(store.edges.keys())
        .chain(store.regions.keys())
        .chain(store.variables.keys())
        .chain(store.connections.keys())
        .copied()
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn worklist_partitions_into_copied_and_dropped(
        positions in chain_strategy(),
        mask in prop::collection::vec(any::<bool>(), 16),
        seed in any::<u64>(),
    ) {
        let t = chain(&positions);
        let n = positions.len();
        let mut selection: Vec<ElementRef> = (0..n)
            .filter(|i| mask[*i])
            .map(|i| t.get(&format!("s{i}")))
            .collect();
        selection.extend((1..n).filter(|i| mask[8 + *i]).map(|i| t.get(&format!("e{i}"))));
        let len = selection.len().max(1);
        selection.rotate_left(seed as usize % len);

        let ctx = EditorContext::automaton(t.project.root);
        let worklist = selection::collect(&t.project.store, &selection, &ctx).unwrap();
        let mut session = Session::new(t.project);
        let clipboard = session.copy(&selection, &ctx).unwrap();

        for element in worklist.iter() {
            let copied = clipboard.original_to_clone.contains_key(element);
            let dropped = clipboard.dropped.contains(element);
            prop_assert!(copied != dropped, "{} copied={} dropped={}", element, copied, dropped);
        }
        for element in clipboard.dropped.iter() {
            prop_assert!(worklist.contains(element));
        }
    }

    #[test]
    fn edges_before_states_resolve_within_edge_count(count in 1usize..10) {
        let positions: Vec<(f64, f64)> =
            (0..=count).map(|i| (i as f64 * 150.0, 0.0)).collect();
        let t = chain(&positions);
        let mut selection: Vec<ElementRef> =
            (1..=count).rev().map(|i| t.get(&format!("e{i}"))).collect();
        selection.extend((0..=count).map(|i| t.get(&format!("s{i}"))));

        let ctx = EditorContext::automaton(t.project.root);
        let mut session = Session::new(t.project);
        let clipboard = session.copy(&selection, &ctx).unwrap();
        prop_assert!(clipboard.dropped.is_empty());
        prop_assert!(clipboard.passes <= count);
        prop_assert_eq!(clipboard.store.edges.len(), count);
    }

    #[test]
    fn ids_are_never_reused(positions in chain_strategy(), rounds in 1usize..4) {
        let t = chain(&positions);
        let selection = t.refs(&["s0", "s1"]);
        let ctx = EditorContext::automaton(t.project.root);
        let mut session = Session::new(t.project);

        let mut seen = all_uids(&session);
        for _ in 0..rounds {
            let high = *seen.iter().max().unwrap();
            let clipboard = session.copy(&selection, &ctx).unwrap();
            let clones: HashSet<Uid> =
                clipboard.original_to_clone.values().map(|c| c.uid()).collect();
            for uid in clones.iter() {
                prop_assert!(*uid > high);
            }
            seen.extend(clones.iter().copied());

            let high = *seen.iter().max().unwrap();
            session.paste(&ctx, Point::ZERO).unwrap();
            for uid in all_uids(&session) {
                prop_assert!(seen.contains(&uid) || uid > high);
                seen.insert(uid);
            }
        }
    }

    #[test]
    fn paste_centres_on_offset(
        positions in chain_strategy(),
        x in coordinate(),
        y in coordinate(),
    ) {
        let t = chain(&positions);
        let selection: Vec<ElementRef> =
            (0..positions.len()).map(|i| t.get(&format!("s{i}"))).collect();
        let ctx = EditorContext::automaton(t.project.root);
        let mut session = Session::new(t.project);
        session.copy(&selection, &ctx).unwrap();

        let offset = Point::new(x, y);
        let outcome = session.paste(&ctx, offset).unwrap();
        let (min_pos, max_pos) = sized_bounds(outcome.geometry.iter().map(|(_, g)| g)).unwrap();
        prop_assert!(min_pos.midpoint(max_pos).approx_eq(offset));
    }
}
