/// Neighbourhood used for traversal and structuring elements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Connectivity {
    /// Face-adjacent neighbours only (6-connectivity).
    #[default]
    Face,
    /// Face, edge and corner neighbours (26-connectivity).
    Full,
}

const FACE_OFFSETS: [[i64; 3]; 6] = [
    [-1, 0, 0],
    [1, 0, 0],
    [0, -1, 0],
    [0, 1, 0],
    [0, 0, -1],
    [0, 0, 1],
];

const FULL_OFFSETS: [[i64; 3]; 26] = [
    [-1, -1, -1],
    [0, -1, -1],
    [1, -1, -1],
    [-1, 0, -1],
    [0, 0, -1],
    [1, 0, -1],
    [-1, 1, -1],
    [0, 1, -1],
    [1, 1, -1],
    [-1, -1, 0],
    [0, -1, 0],
    [1, -1, 0],
    [-1, 0, 0],
    [1, 0, 0],
    [-1, 1, 0],
    [0, 1, 0],
    [1, 1, 0],
    [-1, -1, 1],
    [0, -1, 1],
    [1, -1, 1],
    [-1, 0, 1],
    [0, 0, 1],
    [1, 0, 1],
    [-1, 1, 1],
    [0, 1, 1],
    [1, 1, 1],
];

impl Connectivity {
    /// Offsets of the immediate neighbours, excluding the cell itself.
    #[must_use]
    pub fn offsets(self) -> &'static [[i64; 3]] {
        match self {
            Self::Face => &FACE_OFFSETS,
            Self::Full => &FULL_OFFSETS,
        }
    }

    /// Offsets of a structuring element of the given radius, including the
    /// origin.
    ///
    /// `Face` yields the L1 ball (a cross at radius 1, an octahedron beyond);
    /// `Full` yields the L∞ ball (a `(2r + 1)³` cube).
    #[must_use]
    pub fn ball_offsets(self, radius: usize) -> Vec<[i64; 3]> {
        let r = i64::try_from(radius).unwrap_or(i64::MAX / 4);
        let mut offsets = Vec::new();
        for dz in -r..=r {
            for dy in -r..=r {
                for dx in -r..=r {
                    let inside = match self {
                        Self::Face => dx.abs() + dy.abs() + dz.abs() <= r,
                        Self::Full => true,
                    };
                    if inside {
                        offsets.push([dx, dy, dz]);
                    }
                }
            }
        }
        offsets
    }
}
