//! Directions, the coordinate frame, and the small vector type shared by the
//! vehicle model, the signal controller, and the arbiter.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{CENTER_X, CENTER_Y};

/// A cardinal approach, named by the direction the vehicle *comes from*.
///
/// `V` is the west approach (see GLOSSARY); `N`/`E`/`S` are the obvious compass
/// directions. Left-hand traffic convention throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    N,
    S,
    E,
    V,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::N, Direction::S, Direction::E, Direction::V];

    /// The opposite approach on the same road (used for the straight-through
    /// no-conflict exemption and for exit-direction derivation).
    pub fn opposite(self) -> Direction {
        match self {
            Direction::N => Direction::S,
            Direction::S => Direction::N,
            Direction::E => Direction::V,
            Direction::V => Direction::E,
        }
    }

    /// Fixed rotation {N→V, V→S, S→E, E→N}: the approach "to the right" of
    /// this one, used by the right-hand-rule priority check and to derive the
    /// exit direction of a right-turning vehicle.
    pub fn right_hand_neighbor(self) -> Direction {
        match self {
            Direction::N => Direction::V,
            Direction::V => Direction::S,
            Direction::S => Direction::E,
            Direction::E => Direction::N,
        }
    }

    /// Inverse of [`Direction::right_hand_neighbor`]: the approach whose
    /// right-hand neighbor is this one. Used to derive the exit direction of
    /// a left-turning vehicle (the turn that does not cross oncoming
    /// traffic).
    pub fn left_hand_neighbor(self) -> Direction {
        match self {
            Direction::V => Direction::N,
            Direction::S => Direction::V,
            Direction::E => Direction::S,
            Direction::N => Direction::E,
        }
    }

    /// Unit travel vector for a vehicle entering from this approach and going
    /// straight: `N` travels south, `S` travels north, `E` travels west, `V`
    /// travels east.
    pub fn travel_unit(self) -> Vec2 {
        match self {
            Direction::N => Vec2::new(0.0, 1.0),
            Direction::S => Vec2::new(0.0, -1.0),
            Direction::E => Vec2::new(-1.0, 0.0),
            Direction::V => Vec2::new(1.0, 0.0),
        }
    }

    /// Axis grouping used by the signal controller: {N,S} vs {E,V}.
    pub fn axis(self) -> Axis {
        match self {
            Direction::N | Direction::S => Axis::A,
            Direction::E | Direction::V => Axis::B,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::N => "N",
            Direction::S => "S",
            Direction::E => "E",
            Direction::V => "V",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    A,
    B,
}

/// A 2-D vector/point in the pixel plane. Kept as a plain `f64` pair rather
/// than pulling in a geometry crate: the arithmetic this model needs is a
/// handful of additions, scalings, and dot products.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Vec2 { x, y }
    }

    pub fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(self, factor: f64) -> Vec2 {
        Vec2::new(self.x * factor, self.y * factor)
    }

    pub fn dot(self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn distance_to(self, other: Vec2) -> f64 {
        self.sub(other).length()
    }

    pub fn heading(self) -> f64 {
        self.y.atan2(self.x)
    }
}

pub fn intersection_center() -> Vec2 {
    Vec2::new(CENTER_X, CENTER_Y)
}

/// Inbound-lane centerline offset for an approach, perpendicular to travel
/// direction, left-hand-traffic convention (inbound lane is to the left of
/// the road centerline as seen looking toward the intersection).
pub fn inbound_lane_offset(direction: Direction) -> Vec2 {
    use crate::constants::LANE_OFFSET;
    match direction {
        Direction::N => Vec2::new(-LANE_OFFSET, 0.0),
        Direction::S => Vec2::new(LANE_OFFSET, 0.0),
        Direction::E => Vec2::new(0.0, -LANE_OFFSET),
        Direction::V => Vec2::new(0.0, LANE_OFFSET),
    }
}

/// Outbound-lane centerline offset for an approach (the lane a vehicle exits
/// along once past the intersection, mirrored from the inbound offset).
pub fn outbound_lane_offset(direction: Direction) -> Vec2 {
    inbound_lane_offset(direction).scale(-1.0)
}

/// Whether the intersection box is entered/exited along direction `dir`'s
/// axis, i.e. whether point `p` is inside the square box.
pub fn in_intersection_box(p: Vec2) -> bool {
    use crate::constants::INTERSECTION_HALF;
    let c = intersection_center();
    (p.x - c.x).abs() <= INTERSECTION_HALF && (p.y - c.y).abs() <= INTERSECTION_HALF
}
