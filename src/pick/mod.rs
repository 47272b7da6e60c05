//! Color-coded picking.
//!
//! A [`PickTarget`] renders the consolidated scene with the picking program and hands back
//! the single pixel under the pointer. [`PickingEngine`] owns the target, turns pointer
//! coordinates into pixel coordinates, decodes the pixel and resolves it through the
//! lookup table, and keeps the selection the display pass highlights.

pub mod encoding;

use glam::Mat4;

use crate::consolidate::{LookupTable, ObjectInfo};
use encoding::{decode, IndexColor, ObjectIndex, NO_OBJECT};

#[derive(Debug, Clone, thiserror::Error)]
pub enum PickError {
    #[error("pick target allocation failed: {0}")]
    Allocation(String),
    #[error("pick target has a zero-sized extent")]
    ZeroExtent,
    #[error("pick read-back failed: {0}")]
    Readback(String),
}

/// Row layout of a pick target's memory relative to top-down pointer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrder {
    /// Row 0 is the top of the viewport.
    TopDown,
    /// Row 0 is the bottom of the viewport.
    BottomUp,
}

/// Maps a top-down pointer position to a pixel of a `width` x `height` target.
///
/// Returns `None` when the position lies outside the target.
pub fn pixel_coords(
    screen_x: f32,
    screen_y: f32,
    width: u32,
    height: u32,
    order: RowOrder,
) -> Option<(u32, u32)> {
    if !(screen_x >= 0.0 && screen_y >= 0.0) {
        return None;
    }
    let (x, y) = (screen_x.floor() as u32, screen_y.floor() as u32);
    if x >= width || y >= height {
        return None;
    }
    let row = match order {
        RowOrder::TopDown => y,
        RowOrder::BottomUp => height - 1 - y,
    };
    Some((x, row))
}

/// An offscreen target that can draw a scene with the picking program.
pub trait PickTarget {
    type Scene: ?Sized;

    fn extent(&self) -> (u32, u32);

    fn row_order(&self) -> RowOrder;

    /// Clears to black, draws `scene` with `view_proj` and reads back the pixel at
    /// `(x, y)` in target memory coordinates.
    fn render_and_read(
        &mut self,
        scene: &Self::Scene,
        view_proj: Mat4,
        x: u32,
        y: u32,
    ) -> Result<IndexColor, PickError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickHit {
    pub index: ObjectIndex,
    pub info: ObjectInfo,
    pub screen_x: f32,
    pub screen_y: f32,
}

/// Selected object plus a flag telling the host a redraw is due.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionState {
    selected: Option<ObjectIndex>,
    redraw_requested: bool,
}

impl SelectionState {
    pub fn selected(&self) -> Option<ObjectIndex> {
        self.selected
    }

    /// Value for the display shader's `selected_index` uniform; 0 selects nothing.
    pub fn selected_raw(&self) -> u32 {
        self.selected.map_or(NO_OBJECT, ObjectIndex::get)
    }

    pub fn select(&mut self, index: Option<ObjectIndex>) {
        self.selected = index;
        self.redraw_requested = true;
    }

    pub fn clear(&mut self) {
        self.select(None);
    }

    pub fn redraw_requested(&self) -> bool {
        self.redraw_requested
    }

    /// Returns and resets the redraw flag.
    pub fn take_redraw_request(&mut self) -> bool {
        std::mem::take(&mut self.redraw_requested)
    }
}

pub struct PickingEngine<T: PickTarget> {
    target: Option<T>,
    failure: Option<PickError>,
    failure_reported: bool,
    pending: Option<(f32, f32)>,
    last_hit: Option<PickHit>,
    selection: SelectionState,
}

impl<T: PickTarget> PickingEngine<T> {
    /// Wraps the outcome of creating the target. A failed creation is kept and every pick
    /// becomes a miss.
    pub fn new(target: Result<T, PickError>) -> Self {
        let mut engine = Self {
            target: None,
            failure: None,
            failure_reported: false,
            pending: None,
            last_hit: None,
            selection: SelectionState::default(),
        };
        engine.set_target(target);
        engine
    }

    pub fn with_target(target: T) -> Self {
        Self::new(Ok(target))
    }

    /// Replaces the target, e.g. after a viewport resize.
    pub fn set_target(&mut self, target: Result<T, PickError>) {
        match target {
            Ok(target) => {
                self.target = Some(target);
                self.failure = None;
                self.failure_reported = false;
            }
            Err(err) => {
                self.target = None;
                self.failure = Some(err);
            }
        }
    }

    pub fn target(&self) -> Option<&T> {
        self.target.as_ref()
    }

    pub fn target_mut(&mut self) -> Option<&mut T> {
        self.target.as_mut()
    }

    pub fn failure(&self) -> Option<&PickError> {
        self.failure.as_ref()
    }

    /// Queues a pick for the next redraw. Ignored while another pick is pending.
    pub fn request_pick(&mut self, screen_x: f32, screen_y: f32) -> bool {
        if self.pending.is_some() {
            log::debug!("Pick at ({screen_x}, {screen_y}) ignored, one is already pending");
            return false;
        }
        self.pending = Some((screen_x, screen_y));
        true
    }

    pub fn has_pending_pick(&self) -> bool {
        self.pending.is_some()
    }

    /// Runs the pending pick, if any.
    pub fn process_pending(
        &mut self,
        scene: &T::Scene,
        lookup: &LookupTable,
        view_proj: Mat4,
    ) -> Option<PickHit> {
        let (x, y) = self.pending.take()?;
        self.pick(scene, lookup, view_proj, x, y)
    }

    /// Renders the pick pass and resolves the object under `(screen_x, screen_y)`.
    ///
    /// Updates the selection either way: a miss clears it.
    pub fn pick(
        &mut self,
        scene: &T::Scene,
        lookup: &LookupTable,
        view_proj: Mat4,
        screen_x: f32,
        screen_y: f32,
    ) -> Option<PickHit> {
        let hit = self.resolve(scene, lookup, view_proj, screen_x, screen_y);
        self.selection.select(hit.as_ref().map(|hit| hit.index));
        self.last_hit = hit.clone();
        hit
    }

    fn resolve(
        &mut self,
        scene: &T::Scene,
        lookup: &LookupTable,
        view_proj: Mat4,
        screen_x: f32,
        screen_y: f32,
    ) -> Option<PickHit> {
        let Some(target) = self.target.as_mut() else {
            if !self.failure_reported {
                self.failure_reported = true;
                match &self.failure {
                    Some(err) => log::error!("Picking disabled: {err}"),
                    None => log::error!("Picking disabled: no pick target"),
                }
            }
            return None;
        };

        let (width, height) = target.extent();
        let (x, y) = pixel_coords(screen_x, screen_y, width, height, target.row_order())?;
        let color = match target.render_and_read(scene, view_proj, x, y) {
            Ok(color) => color,
            Err(err) => {
                log::warn!("Pick at ({screen_x}, {screen_y}) failed: {err}");
                return None;
            }
        };

        let raw = decode(color);
        if raw == NO_OBJECT {
            return None;
        }
        let Some(info) = lookup.resolve(raw) else {
            log::warn!(
                "Pick decoded index {raw} at ({screen_x}, {screen_y}) with no lookup entry"
            );
            return None;
        };
        log::info!("Picked {} '{}' ({})", info.index, info.name, info.original_id);
        Some(PickHit {
            index: info.index,
            info: info.clone(),
            screen_x,
            screen_y,
        })
    }

    /// Latest pick result. Consumes it.
    pub fn take_hit(&mut self) -> Option<PickHit> {
        self.last_hit.take()
    }

    pub fn selection(&self) -> SelectionState {
        self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionState {
        &mut self.selection
    }

    pub fn take_redraw_request(&mut self) -> bool {
        self.selection.take_redraw_request()
    }
}
