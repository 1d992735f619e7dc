//! Yee grid geometry
//!
//! `E_c` sits half a cell along axis `c` and on integer nodes along the other
//! two axes; `H_c` is the opposite. Axis `a` owns two inverse-spacing tables,
//! one for integer nodes and one for half nodes. They start uniform and the
//! CPML folds its stretching factor into them.

use serde::Deserialize;
use std::fmt;

use crate::error::{FdtdError, Result};

/// Cartesian axis of the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn from_index(index: usize) -> Axis {
        Axis::ALL[index % 3]
    }

    /// Next axis in the cyclic order x → y → z → x
    pub fn next(self) -> Axis {
        Axis::from_index(self.index() + 1)
    }

    /// Previous axis in the cyclic order
    pub fn prev(self) -> Axis {
        Axis::from_index(self.index() + 2)
    }

    /// The axis that is neither `self` nor `other`
    pub fn third(self, other: Axis) -> Axis {
        Axis::from_index(3 - self.index() - other.index())
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Low,
    High,
}

/// One of the six faces of the computational box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Face {
    pub axis: Axis,
    pub side: Side,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::new(Axis::X, Side::Low),
        Face::new(Axis::X, Side::High),
        Face::new(Axis::Y, Side::Low),
        Face::new(Axis::Y, Side::High),
        Face::new(Axis::Z, Side::Low),
        Face::new(Axis::Z, Side::High),
    ];

    pub const fn new(axis: Axis, side: Side) -> Self {
        Self { axis, side }
    }

    /// Position of the face in `[x_lo, x_hi, y_lo, y_hi, z_lo, z_hi]`
    pub fn index(self) -> usize {
        2 * self.axis.index()
            + match self.side {
                Side::Low => 0,
                Side::High => 1,
            }
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.side {
            Side::Low => "low",
            Side::High => "high",
        };
        write!(f, "{}-{} face", self.axis, side)
    }
}

/// Field kind on the Yee lattice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Electric,
    Magnetic,
}

impl FieldKind {
    /// Half-cell offset of component `c` along axis `axis`
    pub fn offset(self, component: usize, axis: usize) -> f64 {
        let half = match self {
            FieldKind::Electric => component == axis,
            FieldKind::Magnetic => component != axis,
        };
        if half {
            0.5
        } else {
            0.0
        }
    }
}

/// Geometry of a uniform Yee grid with per-axis boundary kind
#[derive(Debug, Clone)]
pub struct GridGeometry {
    cells: [usize; 3],
    spacing: [f64; 3],
    periodic: [bool; 3],
    /// Inverse spacing at integer nodes, indexed `[axis][i]`
    pub inv_int: [Vec<f64>; 3],
    /// Inverse spacing at half nodes `i + 1/2`, indexed `[axis][i]`
    pub inv_half: [Vec<f64>; 3],
}

impl GridGeometry {
    pub fn new(cells: [usize; 3], spacing: [f64; 3], periodic: [bool; 3]) -> Result<Self> {
        for a in 0..3 {
            if cells[a] == 0 {
                return Err(FdtdError::InvalidGrid(format!(
                    "axis {} has no cells",
                    Axis::from_index(a)
                )));
            }
            if !(spacing[a].is_finite() && spacing[a] > 0.0) {
                return Err(FdtdError::InvalidGrid(format!(
                    "axis {} has spacing {}",
                    Axis::from_index(a),
                    spacing[a]
                )));
            }
        }

        let table = |a: usize| vec![1.0 / spacing[a]; cells[a]];
        Ok(Self {
            cells,
            spacing,
            periodic,
            inv_int: [table(0), table(1), table(2)],
            inv_half: [table(0), table(1), table(2)],
        })
    }

    pub fn cells(&self) -> [usize; 3] {
        self.cells
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    pub fn periodic(&self) -> [bool; 3] {
        self.periodic
    }

    pub fn is_periodic(&self, axis: usize) -> bool {
        self.periodic[axis]
    }

    pub fn cell_count(&self) -> usize {
        self.cells.iter().product()
    }

    pub fn cell_volume(&self) -> f64 {
        self.spacing.iter().product()
    }

    /// Length of the box along `axis`
    pub fn period(&self, axis: usize) -> f64 {
        self.cells[axis] as f64 * self.spacing[axis]
    }

    /// Largest stable time step, `1 / sqrt(Σ 1/Δa²)` in units where c = 1
    pub fn max_stable_timestep(&self) -> f64 {
        let sum: f64 = self.spacing.iter().map(|d| 1.0 / (d * d)).sum();
        1.0 / sum.sqrt()
    }

    /// Physical coordinate of a node along `axis`
    pub fn position(&self, axis: usize, index: usize, offset: f64) -> f64 {
        (index as f64 + offset) * self.spacing[axis]
    }

    /// True when `E_c` at `idx` lies on a terminated wall and is held at zero
    pub fn is_wall(&self, component: usize, idx: [usize; 3]) -> bool {
        (0..3).any(|a| a != component && !self.periodic[a] && idx[a] == 0)
    }
}
