use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::models::Point;

/// Padding added around a claimed stroke's bounding box, and the gap left
/// between a requested rectangle and its probed alternatives.
const REGION_MARGIN: f32 = 10.0;

/// Opaque drawing-ownership identity. Assigned per peer at connection
/// time; independent of the transport address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(Uuid);

impl OwnerId {
    pub fn new() -> Self {
        OwnerId(Uuid::new_v4())
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        OwnerId::new()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An axis-aligned rectangle on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Area {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Area {
    /// Closed-interval overlap test: disjoint on neither axis.
    pub fn overlaps(&self, other: &Area) -> bool {
        !(self.x + self.width < other.x
            || other.x + other.width < self.x
            || self.y + self.height < other.y
            || other.y + other.height < self.y)
    }

    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    /// Bounding union of two rectangles.
    fn union(&self, other: &Area) -> Area {
        let min_x = self.x.min(other.x);
        let min_y = self.y.min(other.y);
        let max_x = (self.x + self.width).max(other.x + other.width);
        let max_y = (self.y + self.height).max(other.y + other.height);
        Area {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        }
    }

    /// Padded bounding box of a point set. None when the set is empty.
    fn bounding(points: &[Point], margin: f32) -> Option<Area> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Area {
            x: min_x - margin,
            y: min_y - margin,
            width: max_x - min_x + 2.0 * margin,
            height: max_y - min_y + 2.0 * margin,
        })
    }
}

/// A claimed drawing territory.
#[derive(Debug, Clone)]
pub struct Region {
    pub area: Area,
    pub owner: OwnerId,
    pub claimed_at: DateTime<Utc>,
    pub stroke_ids: Vec<String>,
}

/// Local, advisory allocator of non-overlapping drawing territory.
///
/// Consulted before a local draw is accepted; it takes no part in conflict
/// resolution of the replicated operation log. Regions are merged per
/// owner and never released.
#[derive(Debug)]
pub struct SpaceArbiter {
    inner: RwLock<ArbiterState>,
    canvas_width: f32,
    canvas_height: f32,
    /// Privileged identity allowed to draw anywhere, if any.
    host: Option<OwnerId>,
}

#[derive(Debug, Default)]
struct ArbiterState {
    regions: Vec<Region>,
    // owner -> last granted exclusive territory
    allocated: HashMap<OwnerId, Area>,
}

impl SpaceArbiter {
    pub fn new(canvas_width: f32, canvas_height: f32, host: Option<OwnerId>) -> Self {
        SpaceArbiter {
            inner: RwLock::new(ArbiterState::default()),
            canvas_width,
            canvas_height,
            host,
        }
    }

    /// Try to grant `requested` to `owner`. When the rectangle is taken,
    /// probe four candidates translated by the rectangle's own height or
    /// width plus the margin, in the order below, above, right, left, and
    /// grant the first that is free and inside the canvas. None when every
    /// candidate fails; the caller decides whether to reject or queue.
    pub fn allocate_space(&self, owner: OwnerId, requested: Area) -> Option<Area> {
        let mut state = self.inner.write().expect("arbiter lock poisoned");

        let granted = if Self::is_occupied(&state.regions, &requested) {
            let alternative = self.find_alternative(&state.regions, &requested)?;
            alternative
        } else {
            requested
        };

        debug!("allocated {:?} to owner {}", granted, owner);
        state.allocated.insert(owner, granted);
        Some(granted)
    }

    /// Mark the padded bounding box of a finished stroke as occupied,
    /// merging into an overlapping region of the same owner when one
    /// exists.
    pub fn claim_space(&self, stroke_id: &str, owner: OwnerId, points: &[Point]) {
        let Some(area) = Area::bounding(points, REGION_MARGIN) else {
            return;
        };

        let mut state = self.inner.write().expect("arbiter lock poisoned");
        for region in state.regions.iter_mut() {
            if region.owner == owner && region.area.overlaps(&area) {
                region.area = region.area.union(&area);
                region.stroke_ids.push(stroke_id.to_string());
                return;
            }
        }
        state.regions.push(Region {
            area,
            owner,
            claimed_at: Utc::now(),
            stroke_ids: vec![stroke_id.to_string()],
        });
    }

    /// Whether `owner` may draw the given point set: the host identity
    /// always may; anyone else needs a current allocation containing every
    /// point, with no point inside another owner's region.
    pub fn can_draw_in_area(&self, owner: OwnerId, points: &[Point]) -> bool {
        if points.is_empty() {
            return false;
        }
        if self.host == Some(owner) {
            return true;
        }

        let state = self.inner.read().expect("arbiter lock poisoned");
        let Some(allocated) = state.allocated.get(&owner) else {
            return false;
        };
        if !points.iter().all(|p| allocated.contains(p)) {
            return false;
        }
        !points.iter().any(|p| {
            state
                .regions
                .iter()
                .any(|r| r.owner != owner && r.area.contains(p))
        })
    }

    /// Copy of all occupied regions, for diagnostics and visualization.
    pub fn regions(&self) -> Vec<Region> {
        self.inner.read().expect("arbiter lock poisoned").regions.clone()
    }

    fn is_occupied(regions: &[Region], area: &Area) -> bool {
        regions.iter().any(|r| r.area.overlaps(area))
    }

    fn in_bounds(&self, area: &Area) -> bool {
        area.x >= 0.0
            && area.y >= 0.0
            && area.x + area.width <= self.canvas_width
            && area.y + area.height <= self.canvas_height
    }

    fn find_alternative(&self, regions: &[Region], requested: &Area) -> Option<Area> {
        let offsets = [
            (0.0, requested.height + REGION_MARGIN),    // below
            (0.0, -(requested.height + REGION_MARGIN)), // above
            (requested.width + REGION_MARGIN, 0.0),     // right
            (-(requested.width + REGION_MARGIN), 0.0),  // left
        ];
        offsets.iter().find_map(|(dx, dy)| {
            let candidate = Area {
                x: requested.x + dx,
                y: requested.y + dy,
                width: requested.width,
                height: requested.height,
            };
            (!Self::is_occupied(regions, &candidate) && self.in_bounds(&candidate))
                .then_some(candidate)
        })
    }
}
