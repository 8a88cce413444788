/// A half-open box of cell coordinates, `min <= c < max` on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellRegion {
    /// Inclusive lower corner.
    pub min: [usize; 3],
    /// Exclusive upper corner.
    pub max: [usize; 3],
}

impl CellRegion {
    /// Creates a region from its corners.
    #[must_use]
    pub fn new(min: [usize; 3], max: [usize; 3]) -> Self {
        Self { min, max }
    }

    /// The region covering a whole grid of the given dimensions.
    #[must_use]
    pub fn full(dims: [usize; 3]) -> Self {
        Self {
            min: [0; 3],
            max: dims,
        }
    }

    /// Cell counts along each axis.
    #[must_use]
    pub fn dims(&self) -> [usize; 3] {
        std::array::from_fn(|i| self.max[i].saturating_sub(self.min[i]))
    }

    /// Number of cells covered.
    #[must_use]
    pub fn volume(&self) -> usize {
        self.dims().iter().product()
    }

    /// Returns `true` if the region covers no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.volume() == 0
    }

    /// Returns `true` if the cell lies inside the region.
    #[must_use]
    pub fn contains(&self, cell: [usize; 3]) -> bool {
        (0..3).all(|i| cell[i] >= self.min[i] && cell[i] < self.max[i])
    }

    /// Returns `true` if the cell lies on the outermost layer of the region.
    #[must_use]
    pub fn is_on_shell(&self, cell: [usize; 3]) -> bool {
        self.contains(cell) && (0..3).any(|i| cell[i] == self.min[i] || cell[i] + 1 == self.max[i])
    }

    /// Grows the region by `margin` cells on every side, clamped to a grid of
    /// dimensions `bounds`.
    #[must_use]
    pub fn expanded(&self, margin: usize, bounds: [usize; 3]) -> Self {
        Self {
            min: std::array::from_fn(|i| self.min[i].saturating_sub(margin)),
            max: std::array::from_fn(|i| (self.max[i] + margin).min(bounds[i])),
        }
    }

    /// Overlap of two regions, if any.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let region = Self {
            min: std::array::from_fn(|i| self.min[i].max(other.min[i])),
            max: std::array::from_fn(|i| self.max[i].min(other.max[i])),
        };
        (0..3)
            .all(|i| region.min[i] < region.max[i])
            .then_some(region)
    }

    /// Linear index of `cell` inside a buffer laid out over this region
    /// (x fastest).
    #[must_use]
    pub fn local_index(&self, cell: [usize; 3]) -> usize {
        let [w, h, _] = self.dims();
        (cell[0] - self.min[0]) + w * ((cell[1] - self.min[1]) + h * (cell[2] - self.min[2]))
    }

    /// Iterates the cells in buffer order (x fastest, then y, then z).
    pub fn cells(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        (self.min[2]..self.max[2]).flat_map(move |z| {
            (self.min[1]..self.max[1])
                .flat_map(move |y| (self.min[0]..self.max[0]).map(move |x| [x, y, z]))
        })
    }
}
