//! On-screen-display overlay configuration.
//!
//! Overlay payloads arrive through frame metadata, already rendered to
//! hardware-readable bitmaps; this module only translates them into the
//! overlay register block.  Two payloads may be supplied independently
//! (base overlay and a secondary layer); they are applied in order and
//! share the eight hardware rectangle slots.

use tracing::warn;

use crate::regs::OsdBlock;

/// Hardware overlay rectangle slots.
pub const OSD_REGION_SLOTS: usize = 8;

/// One overlay rectangle, in 16-pixel units.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct OsdRegion {
    pub lt_x: u32,
    pub lt_y: u32,
    pub rb_x: u32,
    pub rb_y: u32,
    /// Invert the bitmap against the background.
    pub inverse: bool,
    /// Bitmap buffer handle.
    pub buf_fd: i32,
}

/// One overlay payload: a set of rectangles sharing a palette.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct OsdPayload {
    pub regions: Vec<OsdRegion>,
}

/// Serialize up to two overlay payloads into the overlay block.
///
/// Slots fill in payload order; rectangles beyond the hardware limit are
/// dropped with a warning.
pub fn apply(block: &mut OsdBlock, first: Option<&OsdPayload>, second: Option<&OsdPayload>) {
    let mut slot = 0usize;

    for payload in [first, second].into_iter().flatten() {
        for region in &payload.regions {
            if slot >= OSD_REGION_SLOTS {
                warn!(
                    dropped = payload.regions.len(),
                    "overlay rectangles exceed hardware slots"
                );
                return;
            }
            block.enable_mask |= 1 << slot;
            if region.inverse {
                block.inverse_mask |= 1 << slot;
            }
            block.lt_pos[slot] = (region.lt_y << 16) | (region.lt_x & 0xffff);
            block.rb_pos[slot] = (region.rb_y << 16) | (region.rb_x & 0xffff);
            block.addr[slot] = region.buf_fd;
            slot += 1;
        }
    }
}
