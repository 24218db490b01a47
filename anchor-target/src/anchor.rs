//! Anchor shapes and their placement on the output grid.

use crate::common::*;

/// The anchor shape options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorConfigInit {
    /// Base anchor heights in pixels.
    #[serde(default = "default_heights")]
    pub heights: Vec<R64>,
    /// Width to height ratios applied to every base height.
    #[serde(default = "default_ratios")]
    pub width_to_height_ratios: Vec<R64>,
}

impl Default for AnchorConfigInit {
    fn default() -> Self {
        Self {
            heights: default_heights(),
            width_to_height_ratios: default_ratios(),
        }
    }
}

impl AnchorConfigInit {
    pub fn build(self) -> Result<AnchorConfig> {
        let Self {
            heights,
            width_to_height_ratios: ratios,
        } = self;

        ensure!(!heights.is_empty(), "at least one anchor height is required");
        ensure!(!ratios.is_empty(), "at least one anchor ratio is required");
        ensure!(
            heights.iter().all(|&height| height > 0.0),
            "anchor heights must be positive, but get {:?}",
            heights
        );
        ensure!(
            ratios.iter().all(|&ratio| ratio > 0.0),
            "anchor ratios must be positive, but get {:?}",
            ratios
        );

        // shape index = height_index * num_ratios + ratio_index
        let shapes: Vec<_> = iproduct!(&heights, &ratios)
            .map(|(&height, &ratio)| HW::try_positive([height.raw(), (height * ratio).raw()]))
            .collect::<Result<_>>()?;

        Ok(AnchorConfig {
            shapes,
            num_ratios: ratios.len(),
        })
    }
}

/// The validated, ordered list of anchor shapes.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct AnchorConfig {
    #[get = "pub"]
    shapes: Vec<HW<f64>>,
    num_ratios: usize,
}

impl AnchorConfig {
    pub fn num_shapes(&self) -> usize {
        self.shapes.len()
    }

    pub fn shape(&self, index: usize) -> Option<&HW<f64>> {
        self.shapes.get(index)
    }

    /// Index of the shape built from the given height and ratio.
    pub fn shape_index(&self, height_index: usize, ratio_index: usize) -> usize {
        height_index * self.num_ratios + ratio_index
    }
}

/// The input image and output grid sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridGeometryInit {
    /// Input image size in `[height, width]` pixels.
    #[serde(default = "default_input_size")]
    pub input_size: [usize; 2],
    /// Output grid size in `[rows, cols]`.
    #[serde(default = "default_output_size")]
    pub output_size: [usize; 2],
}

impl Default for GridGeometryInit {
    fn default() -> Self {
        Self {
            input_size: default_input_size(),
            output_size: default_output_size(),
        }
    }
}

impl GridGeometryInit {
    pub fn build(self) -> Result<GridGeometry> {
        let Self {
            input_size,
            output_size,
        } = self;
        let input_size =
            HW::try_positive(input_size).context("invalid input image size")?;
        let grid_size = HW::try_positive(output_size).context("invalid output grid size")?;

        // cells are square and derived from the vertical axis
        let cell_size = input_size.h() as f64 / grid_size.h() as f64;
        let cell_w = input_size.w() as f64 / grid_size.w() as f64;
        if !abs_diff_eq!(cell_size, cell_w, epsilon = 1e-6) {
            warn!(
                "grid cells are not square ({} x {}), the height {} is used for both axes",
                cell_size, cell_w, cell_size
            );
        }

        Ok(GridGeometry {
            input_size,
            grid_size,
            cell_size,
        })
    }
}

/// The validated grid geometry.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct GridGeometry {
    #[get = "pub"]
    input_size: HW<usize>,
    #[get = "pub"]
    grid_size: HW<usize>,
    cell_size: f64,
}

impl GridGeometry {
    /// Side length of a grid cell in pixels.
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn rows(&self) -> usize {
        self.grid_size.h()
    }

    pub fn cols(&self) -> usize {
        self.grid_size.w()
    }
}

/// The position of an anchor on the grid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct AnchorIndex {
    pub row: usize,
    pub col: usize,
    pub shape: usize,
}

impl AnchorIndex {
    pub fn new(row: usize, col: usize, shape: usize) -> Self {
        Self { row, col, shape }
    }

    pub fn to_array(&self) -> [usize; 3] {
        [self.row, self.col, self.shape]
    }
}

impl fmt::Display for AnchorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.row, self.col, self.shape)
    }
}

/// Anchor boxes placed at the center of every grid cell.
#[derive(Debug, Clone)]
pub struct AnchorGrid {
    config: AnchorConfig,
    geometry: GridGeometry,
}

impl AnchorGrid {
    pub fn new(config: AnchorConfig, geometry: GridGeometry) -> Self {
        Self { config, geometry }
    }

    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn num_anchors(&self) -> usize {
        self.geometry.rows() * self.geometry.cols() * self.config.num_shapes()
    }

    /// Iterates all anchor positions in row, column, shape order.
    pub fn indices(&self) -> impl Iterator<Item = AnchorIndex> {
        iproduct!(
            0..self.geometry.rows(),
            0..self.geometry.cols(),
            0..self.config.num_shapes()
        )
        .map(|(row, col, shape)| AnchorIndex { row, col, shape })
    }

    /// Position of the anchor in the [AnchorGrid::indices] order.
    pub fn flat_index(&self, index: &AnchorIndex) -> usize {
        let AnchorIndex { row, col, shape } = *index;
        (row * self.geometry.cols() + col) * self.config.num_shapes() + shape
    }

    /// The box of an anchor, or `None` if the index is off the grid.
    pub fn anchor_at(&self, index: &AnchorIndex) -> Option<TLHW<f64>> {
        let AnchorIndex { row, col, shape } = *index;
        if row >= self.geometry.rows() || col >= self.geometry.cols() {
            return None;
        }
        let size = self.config.shape(shape)?;

        let cell_size = self.geometry.cell_size();
        let cy = cell_size * (row as f64 + 0.5);
        let cx = cell_size * (col as f64 + 0.5);
        let anchor = CyCxHW::try_from_cycxhw([cy, cx, size.h(), size.w()]).ok()?;
        Some(anchor.to_tlhw())
    }

    /// All anchors paired with their boxes, in [AnchorGrid::indices] order.
    pub fn boxes(&self) -> Vec<(AnchorIndex, TLHW<f64>)> {
        self.indices()
            .filter_map(|index| Some((index, self.anchor_at(&index)?)))
            .collect()
    }
}

/// Whether the box reaches outside the image on any side.
pub fn is_cross_boundary(rect: &TLHW<f64>, image_size: &HW<usize>) -> bool {
    rect.crosses_boundary(&image_size.cast())
}

fn default_heights() -> Vec<R64> {
    [30.0, 60.0, 100.0, 200.0, 350.0]
        .into_iter()
        .map(r64)
        .collect()
}

fn default_ratios() -> Vec<R64> {
    vec![r64(0.41)]
}

fn default_input_size() -> [usize; 2] {
    [480, 640]
}

fn default_output_size() -> [usize; 2] {
    [30, 40]
}
