//! Mapping a pixel rectangle onto the tile grid of a level.

/// The part of one tile that lands in a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePatch {
    pub tile_x: u32,
    pub tile_y: u32,

    /// Top-left of the used area, relative to the tile
    pub crop_x: u32,
    pub crop_y: u32,

    /// Size of the used area
    pub width: u32,
    pub height: u32,

    /// Where the area goes, relative to the region
    pub dest_x: u32,
    pub dest_y: u32,
}

/// Tiles needed for a region and where each one is pasted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionPlan {
    pub width: u32,
    pub height: u32,

    /// Patches in row-major tile order
    pub patches: Vec<TilePatch>,
}

impl RegionPlan {
    /// Plan a `size` region at `origin` on a grid of `tile_size` tiles.
    ///
    /// Coordinates are in the level's pixel space. The caller checks the
    /// region against the level bounds; an empty size yields no patches.
    pub fn new(origin: (u64, u64), size: (u32, u32), tile_size: (u32, u32)) -> Self {
        let (x0, y0) = origin;
        let (width, height) = size;
        let tile_w = tile_size.0.max(1) as u64;
        let tile_h = tile_size.1.max(1) as u64;

        let mut patches = Vec::new();
        if width == 0 || height == 0 {
            return RegionPlan {
                width,
                height,
                patches,
            };
        }

        let x1 = x0 + width as u64;
        let y1 = y0 + height as u64;

        for tile_y in (y0 / tile_h)..=((y1 - 1) / tile_h) {
            let tile_top = tile_y * tile_h;
            let top = y0.max(tile_top);
            let bottom = y1.min(tile_top + tile_h);

            for tile_x in (x0 / tile_w)..=((x1 - 1) / tile_w) {
                let tile_left = tile_x * tile_w;
                let left = x0.max(tile_left);
                let right = x1.min(tile_left + tile_w);

                // Every value below is bounded by the tile size or the
                // region size, both u32
                patches.push(TilePatch {
                    tile_x: tile_x as u32,
                    tile_y: tile_y as u32,
                    crop_x: (left - tile_left) as u32,
                    crop_y: (top - tile_top) as u32,
                    width: (right - left) as u32,
                    height: (bottom - top) as u32,
                    dest_x: (left - x0) as u32,
                    dest_y: (top - y0) as u32,
                });
            }
        }

        RegionPlan {
            width,
            height,
            patches,
        }
    }

    /// Number of distinct tiles the region touches.
    pub fn tile_count(&self) -> usize {
        self.patches.len()
    }
}
