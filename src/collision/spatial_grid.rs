//! Uniform spatial hash used as the broad phase.

use hashbrown::HashMap;
use smallvec::SmallVec;
use thiserror::Error;
use vek::Aabr;

/// Everything that can go wrong when constructing the grid.
#[derive(Debug, Error)]
pub enum SpatialGridError {
    /// Cell size is zero or negative.
    #[error("cell size must be strictly positive, got {0}")]
    InvalidCellSize(f32),
}

/// Spatial hash grid mapping integer cells to the values inserted into them.
///
/// Cells are created on demand; clearing truncates them without deallocating
/// so a grid that is rebuilt every step stops allocating once it has seen its
/// working set.
pub struct SpatialGrid {
    /// Size of a single square cell.
    cell_size: f32,
    /// Values per occupied cell.
    cells: HashMap<(i32, i32), SmallVec<[u32; 8]>>,
    /// Reusable buffer for deduplicating query results.
    scratch: Vec<u32>,
}

impl SpatialGrid {
    /// Construct a new grid with a fixed cell size.
    pub fn new(cell_size: f32) -> Result<Self, SpatialGridError> {
        if cell_size <= 0.0 {
            return Err(SpatialGridError::InvalidCellSize(cell_size));
        }

        let cells = HashMap::new();
        let scratch = Vec::new();

        Ok(Self {
            cell_size,
            cells,
            scratch,
        })
    }

    /// Store a value in every cell the rectangle overlaps.
    pub fn insert(&mut self, aabr: Aabr<f32>, value: u32) {
        let ((min_x, min_y), (max_x, max_y)) = self.cell_range(aabr);

        for cy in min_y..=max_y {
            for cx in min_x..=max_x {
                self.cells.entry((cx, cy)).or_default().push(value);
            }
        }
    }

    /// Invoke the callback once for every unique value in cells the rectangle
    /// overlaps.
    ///
    /// The grid does not check the values' own rectangles again, false
    /// positives within a cell are the caller's problem.
    pub fn query(&mut self, aabr: Aabr<f32>, mut f: impl FnMut(u32)) {
        puffin::profile_function!();

        let ((min_x, min_y), (max_x, max_y)) = self.cell_range(aabr);

        self.scratch.clear();
        for cy in min_y..=max_y {
            for cx in min_x..=max_x {
                if let Some(values) = self.cells.get(&(cx, cy)) {
                    self.scratch.extend_from_slice(values);
                }
            }
        }

        self.scratch.sort_unstable();
        self.scratch.dedup();

        for value in &self.scratch {
            f(*value);
        }
    }

    /// Truncate all cells, keeping their capacity for the next step.
    pub fn clear(&mut self) {
        for values in self.cells.values_mut() {
            values.clear();
        }
        self.scratch.clear();
    }

    /// Inclusive range of cells overlapped by a rectangle.
    fn cell_range(&self, aabr: Aabr<f32>) -> ((i32, i32), (i32, i32)) {
        let min = (
            (aabr.min.x / self.cell_size).floor() as i32,
            (aabr.min.y / self.cell_size).floor() as i32,
        );
        let max = (
            (aabr.max.x / self.cell_size).floor() as i32,
            (aabr.max.y / self.cell_size).floor() as i32,
        );

        (min, max)
    }
}
