//! Index regions sampled by sensors

use crate::domain::grid::{Axis, GridGeometry};

/// Half-open box `[lo, hi)` of cell indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorRegion {
    pub lo: [usize; 3],
    pub hi: [usize; 3],
    /// Normal of a plane region
    pub normal: Option<Axis>,
}

impl SensorRegion {
    pub fn volume(lo: [usize; 3], hi: [usize; 3]) -> Self {
        Self {
            lo,
            hi,
            normal: None,
        }
    }

    /// Full plane normal to `axis` at `index`
    pub fn plane(axis: Axis, index: usize, cells: [usize; 3]) -> Self {
        let a = axis.index();
        let mut lo = [0; 3];
        let mut hi = cells;
        lo[a] = index;
        hi[a] = index + 1;
        Self {
            lo,
            hi,
            normal: Some(axis),
        }
    }

    /// Whole grid
    pub fn all(cells: [usize; 3]) -> Self {
        Self::volume([0; 3], cells)
    }

    pub fn extents(&self) -> [usize; 3] {
        [
            self.hi[0].saturating_sub(self.lo[0]),
            self.hi[1].saturating_sub(self.lo[1]),
            self.hi[2].saturating_sub(self.lo[2]),
        ]
    }

    pub fn len(&self) -> usize {
        self.extents().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grid index of the `n`-th cell, z fastest
    #[inline]
    pub fn index_of(&self, n: usize) -> [usize; 3] {
        let [_, ey, ez] = self.extents();
        [
            self.lo[0] + n / (ey * ez),
            self.lo[1] + (n / ez) % ey,
            self.lo[2] + n % ez,
        ]
    }

    /// Same region with `axis` reduced to its first layer
    pub fn collapse(&self, axis: Axis) -> Self {
        let a = axis.index();
        let mut out = *self;
        out.hi[a] = out.lo[a] + 1;
        out.normal = Some(axis);
        out
    }

    /// Reason the region does not fit `grid`, if any
    pub fn check(&self, grid: &GridGeometry) -> Option<String> {
        let cells = grid.cells();
        for a in 0..3 {
            if self.lo[a] >= self.hi[a] {
                return Some(format!("empty along {}", Axis::from_index(a)));
            }
            if self.hi[a] > cells[a] {
                return Some(format!(
                    "extends to {} along {} but the grid has {} cells",
                    self.hi[a],
                    Axis::from_index(a),
                    cells[a]
                ));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_order() {
        let region = SensorRegion::volume([1, 2, 3], [3, 4, 6]);
        assert_eq!(region.len(), 2 * 2 * 3);
        assert_eq!(region.index_of(0), [1, 2, 3]);
        assert_eq!(region.index_of(1), [1, 2, 4]);
        assert_eq!(region.index_of(3), [1, 3, 3]);
        assert_eq!(region.index_of(11), [2, 3, 5]);
    }

    #[test]
    fn test_plane_and_check() {
        let grid = GridGeometry::new([4, 4, 10], [1.0; 3], [true, true, false]).unwrap();
        let plane = SensorRegion::plane(Axis::Z, 5, grid.cells());
        assert_eq!(plane.extents(), [4, 4, 1]);
        assert!(plane.check(&grid).is_none());

        let outside = SensorRegion::plane(Axis::Z, 10, grid.cells());
        assert!(outside.check(&grid).is_some());

        let collapsed = SensorRegion::all(grid.cells()).collapse(Axis::X);
        assert_eq!(collapsed.extents(), [1, 4, 10]);
    }
}
