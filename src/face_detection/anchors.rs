//! SSD anchor centres for the BlazeFace detection networks.
//!
//! Both networks use fixed-size anchors, so only the centre of each anchor matters. Anchors are laid
//! out layer by layer, row-major, with `boxes_per_cell` identical anchors per feature map cell.

use super::ModelVariant;

/// Centre of one anchor, in normalized [0, 1] input coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub x_center: f32,
    pub y_center: f32,
}

/// One output feature map of the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorLayer {
    /// Anchors per feature map cell
    pub boxes_per_cell: u32,
    /// Feature map is `grid` x `grid` cells
    pub grid: u32,
}

impl AnchorLayer {
    #[must_use]
    pub const fn new(boxes_per_cell: u32, grid: u32) -> Self {
        Self { boxes_per_cell, grid }
    }
}

impl ModelVariant {
    /// Square network input size in pixels
    #[must_use]
    pub const fn input_size(self) -> i32 {
        match self {
            Self::Near => 128,
            Self::FullRange => 192,
        }
    }

    /// Output layer layout of the network
    #[must_use]
    pub const fn anchor_layers(self) -> &'static [AnchorLayer] {
        const NEAR: &[AnchorLayer] = &[AnchorLayer::new(2, 16), AnchorLayer::new(6, 8)];
        const FULL_RANGE: &[AnchorLayer] = &[AnchorLayer::new(1, 48)];
        match self {
            Self::Near => NEAR,
            Self::FullRange => FULL_RANGE,
        }
    }
}

/// Generate the anchors for a set of layers
#[must_use]
#[allow(clippy::cast_precision_loss)] // Grid sizes are tiny
pub fn generate_anchors(layers: &[AnchorLayer]) -> Vec<Anchor> {
    let total: usize = layers
        .iter()
        .map(|l| (l.grid * l.grid * l.boxes_per_cell) as usize)
        .sum();
    let mut anchors = Vec::with_capacity(total);

    for layer in layers {
        let grid = layer.grid as f32;
        for y in 0..layer.grid {
            for x in 0..layer.grid {
                let anchor = Anchor {
                    x_center: (x as f32 + 0.5) / grid,
                    y_center: (y as f32 + 0.5) / grid,
                };
                for _ in 0..layer.boxes_per_cell {
                    anchors.push(anchor);
                }
            }
        }
    }

    anchors
}
