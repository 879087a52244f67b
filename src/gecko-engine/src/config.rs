// Copyright 2024 The Gecko Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use crate::datamodel::{Kind, Visibility};
use crate::geometry::Point;

/// Defaults the model factory applies to freshly created elements.
///
/// Sizes are in canvas units.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Default names are `<prefix><n>`, probed upward until unique.
    pub default_name_prefix: String,
    pub default_variable_type: String,
    pub default_visibility: Visibility,
    /// Initial text of pre-, post- and invariant conditions.
    pub default_condition: String,
    pub default_edge_kind: Kind,
    pub default_edge_priority: u32,

    // Element dimensions
    pub system_size: Point,
    pub state_size: Point,
    pub region_size: Point,
    pub port_size: Point,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_name_prefix: "Element_".to_string(),
            default_variable_type: "int".to_string(),
            default_visibility: Visibility::Input,
            default_condition: "true".to_string(),
            default_edge_kind: Kind::Hit,
            default_edge_priority: 0,
            system_size: Point::new(300.0, 300.0),
            state_size: Point::new(100.0, 100.0),
            region_size: Point::new(200.0, 200.0),
            port_size: Point::new(100.0, 50.0),
        }
    }
}

/// Variable types the editor knows without a user-provided declaration.
pub const BUILTIN_TYPES: &[&str] = &[
    "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16", "uint32", "uint64",
    "float", "double", "short", "long", "bool",
];

pub fn is_builtin_type(ty: &str) -> bool {
    BUILTIN_TYPES.contains(&ty)
}
