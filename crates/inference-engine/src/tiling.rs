//! Tile grid planning
//!
//! An image is divided into a grid of `ceil(w / tile) x ceil(h / tile)`
//! core regions. Each core is grown by `pad` pixels of context on every
//! side, clamped at the image border. After inference only the core part of
//! each output tile is kept, so seams between tiles never see border
//! artifacts of the network.

/// Axis-aligned rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// One tile of the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRegion {
    /// Part of the image this tile is responsible for
    pub core: Rect,
    /// Core plus clamped context, the region fed to the backend
    pub padded: Rect,
}

impl TileRegion {
    /// Offset of the core inside the padded region
    pub fn core_offset(&self) -> (u32, u32) {
        (self.core.x - self.padded.x, self.core.y - self.padded.y)
    }
}

/// Returns true when the image is processed in one pass
pub fn is_single_pass(width: u32, height: u32, tile_size: u32) -> bool {
    tile_size == 0 || (width <= tile_size && height <= tile_size)
}

/// Plans the tile grid for a `width` x `height` image in row-major order
pub fn plan_tiles(width: u32, height: u32, tile_size: u32, pad: u32) -> Vec<TileRegion> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    if is_single_pass(width, height, tile_size) {
        let whole = Rect::new(0, 0, width, height);
        return vec![TileRegion {
            core: whole,
            padded: whole,
        }];
    }

    let tiles_x = (width + tile_size - 1) / tile_size;
    let tiles_y = (height + tile_size - 1) / tile_size;
    let mut tiles = Vec::with_capacity((tiles_x * tiles_y) as usize);

    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_size;
            let y0 = ty * tile_size;
            let x1 = (x0 + tile_size).min(width);
            let y1 = (y0 + tile_size).min(height);

            let px0 = x0.saturating_sub(pad);
            let py0 = y0.saturating_sub(pad);
            let px1 = (x1 + pad).min(width);
            let py1 = (y1 + pad).min(height);

            tiles.push(TileRegion {
                core: Rect::new(x0, y0, x1 - x0, y1 - y0),
                padded: Rect::new(px0, py0, px1 - px0, py1 - py0),
            });
        }
    }

    tiles
}
