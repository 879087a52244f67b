// Copyright 2024 The Gecko Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::ops::{Add, Sub};

use float_cmp::approx_eq;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 2D position/vector in world coordinates.
#[derive(Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl std::fmt::Debug for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn midpoint(self, other: Self) -> Self {
        Self {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }

    pub fn min(self, other: Self) -> Self {
        Self {
            x: self.x.min(other.x),
            y: self.y.min(other.y),
        }
    }

    pub fn max(self, other: Self) -> Self {
        Self {
            x: self.x.max(other.x),
            y: self.y.max(other.y),
        }
    }

    pub fn scale(self, factor: f64) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    pub fn is_zero(self) -> bool {
        approx_eq!(f64, self.x, 0.0) && approx_eq!(f64, self.y, 0.0)
    }

    pub fn approx_eq(self, other: Self) -> bool {
        approx_eq!(f64, self.x, other.x, epsilon = 1e-9)
            && approx_eq!(f64, self.y, other.y, epsilon = 1e-9)
    }
}

impl Add for Point {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl Sub for Point {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

/// Where a positionable element sits on its canvas: top-left corner plus
/// extent.  Connections and edges are routed between their endpoints and
/// carry a zero size.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Geometry {
    pub position: Point,
    pub size: Point,
}

impl Geometry {
    pub fn new(position: Point, size: Point) -> Self {
        Self { position, size }
    }

    pub fn at(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            position: Point::new(x, y),
            size: Point::new(width, height),
        }
    }

    pub fn center(&self) -> Point {
        self.position + self.size.scale(0.5)
    }

    pub fn set_center(&mut self, center: Point) {
        self.position = center - self.size.scale(0.5);
    }

    pub fn far_corner(&self) -> Point {
        self.position + self.size
    }

    pub fn is_sized(&self) -> bool {
        !self.size.is_zero()
    }

    pub fn translated(&self, shift: Point) -> Self {
        Self {
            position: self.position + shift,
            size: self.size,
        }
    }
}

/// Bounding box over every sized geometry, as `(min_pos, max_pos)`.
/// Zero-sized geometries (connections, edges) don't contribute; returns
/// `None` when nothing has an extent.
pub fn sized_bounds<'a>(
    geometries: impl IntoIterator<Item = &'a Geometry>,
) -> Option<(Point, Point)> {
    geometries
        .into_iter()
        .filter(|g| g.is_sized())
        .fold(None, |bounds, g| match bounds {
            None => Some((g.position, g.far_corner())),
            Some((min_pos, max_pos)) => {
                Some((min_pos.min(g.position), max_pos.max(g.far_corner())))
            }
        })
}
