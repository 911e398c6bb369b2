//! Dirty-region tracking and merging.
//!
//! The tracker accepts axis-aligned rectangles derived from particle motion
//! and coalesces them into a small set of repaint regions. Nearby rectangles
//! are found through a uniform spatial grid keyed by every cell a rectangle
//! overlaps; a pair merges when the Euclidean gap between their boundaries is
//! small and the merged rectangle still covers its inputs efficiently, which
//! prevents runaway merges from approximating full-screen coverage.
//!
//! When partial repaints stop paying off (too many regions, too much dirty
//! area, or the periodic safety-net interval elapsed) the tracker indicates a
//! full clear instead and [`RegionTracker::drain`] returns nothing.
//!
//! The grid cell size and merge heuristics are tuning parameters carried in
//! [`RegionConfig`], not load-bearing constants.

use glam::Vec2;
use std::collections::HashMap;

/// What motivated a dirty region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Bounding rectangle of a particle's motion between two ticks.
    Motion,
    /// Explicitly requested repaint area.
    Explicit,
}

/// A rectangle of screen area that changed and must be repainted.
///
/// Coordinates live in the origin-centered canvas space, so a canvas of
/// `w x h` spans `[-w/2, w/2] x [-h/2, h/2]`. Bounds always cover the union
/// of all geometry that motivated the region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirtyRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Higher repaints first.
    pub priority: u8,
    /// Tick the region was created or last merged on.
    pub tick: u64,
    pub kind: RegionKind,
}

impl DirtyRegion {
    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Euclidean gap between rectangle boundaries; 0 when overlapping.
    pub fn gap_to(&self, other: &DirtyRegion) -> f32 {
        let dx = (other.x - self.right()).max(self.x - other.right()).max(0.0);
        let dy = (other.y - self.bottom()).max(self.y - other.bottom()).max(0.0);
        (dx * dx + dy * dy).sqrt()
    }

    /// Smallest rectangle covering both inputs.
    pub fn union(&self, other: &DirtyRegion) -> DirtyRegion {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        DirtyRegion {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
            priority: self.priority.max(other.priority),
            tick: self.tick.max(other.tick),
            kind: if self.kind == other.kind {
                self.kind
            } else {
                RegionKind::Explicit
            },
        }
    }
}

/// Tuning parameters for the region tracker.
#[derive(Debug, Clone, Copy)]
pub struct RegionConfig {
    /// Canvas width in logical units (origin-centered).
    pub canvas_width: f32,
    /// Canvas height in logical units (origin-centered).
    pub canvas_height: f32,
    /// Spatial grid cell size in logical units.
    pub cell_size: f32,
    /// Maximum boundary gap for two regions to merge.
    pub merge_threshold: f32,
    /// Regions with width or height below this are discarded.
    pub min_region_size: f32,
    /// Region count above which a full clear is cheaper.
    pub max_regions: usize,
    /// Dirty-area fraction of the canvas above which a full clear is cheaper.
    pub full_clear_ratio: f32,
    /// A merge must retain at least this fraction of combined input area.
    pub area_efficiency: f32,
    /// Force a full clear every this many ticks as a drift safety net.
    pub forced_clear_interval: u64,
    /// Run a transitive merge pass once the region count exceeds this.
    pub optimize_above: usize,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            canvas_width: 800.0,
            canvas_height: 600.0,
            cell_size: 64.0,
            merge_threshold: 16.0,
            min_region_size: 4.0,
            max_regions: 48,
            full_clear_ratio: 0.55,
            area_efficiency: 0.6,
            forced_clear_interval: 600,
            optimize_above: 32,
        }
    }
}

impl RegionConfig {
    /// Config for a given canvas size, other fields default.
    pub fn for_canvas(width: f32, height: f32) -> Self {
        Self {
            canvas_width: width,
            canvas_height: height,
            ..Self::default()
        }
    }
}

/// Accumulates and merges dirty regions between drains.
#[derive(Debug)]
pub struct RegionTracker {
    config: RegionConfig,
    /// Slab of regions; freed slots are reused.
    slots: Vec<Option<DirtyRegion>>,
    free: Vec<usize>,
    live: usize,
    /// Grid cell -> slot indices of regions overlapping that cell.
    grid: HashMap<(i32, i32), Vec<usize>>,
    tick: u64,
    last_full_clear: u64,
}

impl RegionTracker {
    pub fn new(config: RegionConfig) -> Self {
        Self {
            config,
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            grid: HashMap::new(),
            tick: 0,
            last_full_clear: 0,
        }
    }

    /// Current tuning parameters.
    pub fn config(&self) -> &RegionConfig {
        &self.config
    }

    /// Update canvas bounds (viewport resize).
    pub fn set_canvas(&mut self, width: f32, height: f32) {
        self.config.canvas_width = width;
        self.config.canvas_height = height;
    }

    /// Advance the tracker's notion of time; new regions are stamped with
    /// this tick and the forced-clear interval is measured against it.
    pub fn begin_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    /// Number of tracked regions.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Total tracked dirty area.
    pub fn dirty_area(&self) -> f32 {
        self.slots
            .iter()
            .flatten()
            .map(DirtyRegion::area)
            .sum()
    }

    /// Add the bounding rectangle of a particle's motion, padded by its
    /// radius.
    pub fn add_motion(&mut self, prev: Vec2, pos: Vec2, size: f32, priority: u8) {
        let min = prev.min(pos) - Vec2::splat(size);
        let max = prev.max(pos) + Vec2::splat(size);
        self.add_region(
            min.x,
            min.y,
            max.x - min.x,
            max.y - min.y,
            RegionKind::Motion,
            priority,
        );
    }

    /// Add a rectangle, clamping to canvas bounds and discarding degenerate
    /// regions, then merge it with spatially nearby regions.
    pub fn add_region(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        kind: RegionKind,
        priority: u8,
    ) {
        let (half_w, half_h) = (self.config.canvas_width / 2.0, self.config.canvas_height / 2.0);
        let x0 = x.max(-half_w);
        let y0 = y.max(-half_h);
        let x1 = (x + width).min(half_w);
        let y1 = (y + height).min(half_h);

        let region = DirtyRegion {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
            priority,
            tick: self.tick,
            kind,
        };
        if region.width < self.config.min_region_size
            || region.height < self.config.min_region_size
        {
            return;
        }

        self.insert_merged(region);

        if self.live > self.config.optimize_above {
            self.optimize();
        }
    }

    /// Insert a region, repeatedly folding in any mergeable neighbor.
    fn insert_merged(&mut self, mut region: DirtyRegion) {
        loop {
            match self.find_merge_candidate(&region) {
                Some(slot) => {
                    let other = self.remove_slot(slot);
                    region = region.union(&other);
                }
                None => break,
            }
        }
        self.insert_slot(region);
    }

    /// Find one region sharing a grid cell that satisfies the merge rule.
    fn find_merge_candidate(&self, region: &DirtyRegion) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for cell in self.cells_of(region) {
            let Some(indices) = self.grid.get(&cell) else {
                continue;
            };
            for &slot in indices {
                let Some(other) = &self.slots[slot] else {
                    continue;
                };
                let gap = region.gap_to(other);
                if gap > self.config.merge_threshold {
                    continue;
                }
                let merged = region.union(other);
                let combined = region.area() + other.area();
                if combined <= 0.0 || combined / merged.area().max(f32::MIN_POSITIVE)
                    < self.config.area_efficiency
                {
                    continue;
                }
                if best.map_or(true, |(_, g)| gap < g) {
                    best = Some((slot, gap));
                }
            }
        }
        best.map(|(slot, _)| slot)
    }

    /// Transitive merge pass over all tracked regions.
    ///
    /// Rebuilds the tracker by reinserting every region through the normal
    /// merge path; insertion-time merging only sees one neighbor at a time,
    /// so this pass is what closes chains of adjacent rectangles.
    pub fn optimize(&mut self) {
        let regions: Vec<DirtyRegion> = self.slots.iter_mut().filter_map(Option::take).collect();
        self.grid.clear();
        self.slots.clear();
        self.free.clear();
        self.live = 0;
        for region in regions {
            self.insert_merged(region);
        }
    }

    /// Whether repainting everything is cheaper than the tracked regions.
    ///
    /// Pure query: calling it twice without intervening adds returns the same
    /// answer.
    pub fn should_full_clear(&self) -> bool {
        if self.live > self.config.max_regions {
            return true;
        }
        let canvas_area = self.config.canvas_width * self.config.canvas_height;
        if self.dirty_area() > self.config.full_clear_ratio * canvas_area {
            return true;
        }
        self.tick.saturating_sub(self.last_full_clear) >= self.config.forced_clear_interval
    }

    /// Remove and return all regions, sorted by priority descending then
    /// oldest first.
    ///
    /// If a full clear is indicated the list is empty and the caller must
    /// clear the whole surface unconditionally.
    pub fn drain(&mut self) -> Vec<DirtyRegion> {
        let full_clear = self.should_full_clear();
        let mut regions: Vec<DirtyRegion> =
            self.slots.iter_mut().filter_map(Option::take).collect();
        self.grid.clear();
        self.slots.clear();
        self.free.clear();
        self.live = 0;

        if full_clear {
            self.last_full_clear = self.tick;
            return Vec::new();
        }
        regions.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.tick.cmp(&b.tick)));
        regions
    }

    /// Drop all state and backing memory for cleanup.
    pub fn release(&mut self) {
        self.slots = Vec::new();
        self.free = Vec::new();
        self.grid = HashMap::new();
        self.live = 0;
    }

    fn insert_slot(&mut self, region: DirtyRegion) {
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(region);
                slot
            }
            None => {
                self.slots.push(Some(region));
                self.slots.len() - 1
            }
        };
        self.live += 1;
        for cell in self.cells_of(&region) {
            self.grid.entry(cell).or_default().push(slot);
        }
    }

    fn remove_slot(&mut self, slot: usize) -> DirtyRegion {
        let region = self.slots[slot].take().expect("slot occupied");
        for cell in self.cells_of(&region) {
            if let Some(indices) = self.grid.get_mut(&cell) {
                indices.retain(|&i| i != slot);
            }
        }
        self.free.push(slot);
        self.live -= 1;
        region
    }

    /// Grid cells overlapped by a rectangle.
    fn cells_of(&self, region: &DirtyRegion) -> Vec<(i32, i32)> {
        let cell = self.config.cell_size;
        let cx0 = (region.x / cell).floor() as i32;
        let cy0 = (region.y / cell).floor() as i32;
        let cx1 = (region.right() / cell).floor() as i32;
        let cy1 = (region.bottom() / cell).floor() as i32;
        let mut cells = Vec::with_capacity(((cx1 - cx0 + 1) * (cy1 - cy0 + 1)) as usize);
        for cy in cy0..=cy1 {
            for cx in cx0..=cx1 {
                cells.push((cx, cy));
            }
        }
        cells
    }
}
