//! Region-of-interest descriptor resource.
//!
//! The accelerator reads per-macroblock quality hints from a descriptor
//! buffer: one 16-bit cell per 16x16 macroblock, rows padded to a
//! four-cell stride.  The buffer is allocated lazily on the first frame
//! that carries regions, resized only when the picture geometry changes
//! the required size, and retained across frames whose region list is
//! empty so a later frame can re-enable the feature without reallocating.

use tracing::debug;

use avcenc_core::buffer::{BufferAllocator, HwBuffer};
use avcenc_core::error::Result;
use avcenc_core::types::align_i32;

use crate::regs::BaseBlock;

/// One rectangular region with its quality directive, in pixels.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RoiRegion {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    /// Force intra coding inside the region.
    pub force_intra: bool,
    /// Quality bound class (0..=7) selecting the per-area QP window.
    pub qp_area_idx: u32,
    /// `qp` is an absolute QP rather than a delta.
    pub abs_qp: bool,
    /// Absolute QP (0..=51) or signed QP delta, per `abs_qp`.
    pub qp: i32,
}

/// Region list supplied through frame metadata.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct RoiCfg {
    pub regions: Vec<RoiRegion>,
}

/// Pack one region directive into its 16-bit cell.
fn pack_cell(r: &RoiRegion) -> u16 {
    let qp = if r.abs_qp {
        (r.qp.clamp(0, 51) as u16) & 0x7f
    } else {
        (r.qp.clamp(-51, 51) as u16) & 0x7f
    };
    u16::from(r.force_intra)
        | (((r.qp_area_idx & 0x7) as u16) << 4)
        | (u16::from(r.abs_qp) << 7)
        | (qp << 8)
}

/// Descriptor buffer size for a picture of `mb_w` x `mb_h` macroblocks.
pub fn buf_size(mb_w: i32, mb_h: i32) -> usize {
    (align_i32(mb_w, 4) * align_i32(mb_h, 4)) as usize * 2
}

/// Lazily sized region descriptor buffer.
#[derive(Debug, Default)]
pub struct RoiResource {
    buf: Option<HwBuffer>,
    size: usize,
}

impl RoiResource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one frame's region configuration.
    ///
    /// With a non-empty region list the descriptor buffer is
    /// (re)allocated as needed, serialized, and wired into the base block;
    /// otherwise the feature is disabled and the address cleared, while
    /// the buffer itself is kept for later frames.
    pub fn apply(
        &mut self,
        base: &mut BaseBlock,
        roi: Option<&RoiCfg>,
        mb_w: i32,
        mb_h: i32,
        alloc: &mut dyn BufferAllocator,
    ) -> Result<()> {
        let regions = match roi {
            Some(cfg) if !cfg.regions.is_empty() => &cfg.regions,
            _ => {
                base.roi_en = 0;
                base.roi_addr = 0;
                return Ok(());
            }
        };

        let size = buf_size(mb_w, mb_h);
        if self.buf.is_none() || size != self.size {
            debug!(size, prev = self.size, "region descriptor buffer resized");
            self.buf = Some(alloc.alloc(size)?);
            self.size = size;
        }

        let buf = self.buf.as_mut().unwrap();
        serialize_regions(buf.as_mut_slice(), regions, mb_w, mb_h);

        base.roi_en = 1;
        base.roi_addr = buf.fd();
        Ok(())
    }

    /// Currently allocated descriptor size (0 = never allocated).
    pub fn allocated_size(&self) -> usize {
        self.size
    }

    pub fn is_allocated(&self) -> bool {
        self.buf.is_some()
    }
}

/// Rasterize the region list over the macroblock grid.  Regions apply in
/// list order; later regions overwrite overlapping cells.
fn serialize_regions(bytes: &mut [u8], regions: &[RoiRegion], mb_w: i32, mb_h: i32) {
    let stride = align_i32(mb_w, 4);
    bytes.fill(0);

    for r in regions {
        let cell = pack_cell(r).to_le_bytes();
        let mb_x0 = (r.x / 16).clamp(0, mb_w);
        let mb_y0 = (r.y / 16).clamp(0, mb_h);
        let mb_x1 = ((r.x + r.w + 15) / 16).clamp(0, mb_w);
        let mb_y1 = ((r.y + r.h + 15) / 16).clamp(0, mb_h);

        for my in mb_y0..mb_y1 {
            for mx in mb_x0..mb_x1 {
                let at = ((my * stride + mx) * 2) as usize;
                bytes[at] = cell[0];
                bytes[at + 1] = cell[1];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avcenc_core::buffer::HeapAllocator;
    use bytemuck::Zeroable;

    fn region(x: i32, y: i32, w: i32, h: i32, qp: i32) -> RoiRegion {
        RoiRegion {
            x,
            y,
            w,
            h,
            force_intra: false,
            qp_area_idx: 1,
            abs_qp: true,
            qp,
        }
    }

    #[test]
    fn sizes_round_to_cell_stride() {
        // 120x68 macroblocks -> 120x68 cells at 2 bytes.
        assert_eq!(buf_size(120, 68), 120 * 68 * 2);
        // 30x17 rounds to 32x20.
        assert_eq!(buf_size(30, 17), 32 * 20 * 2);
    }

    #[test]
    fn non_empty_regions_enable_and_serialize() {
        let mut res = RoiResource::new();
        let mut alloc = HeapAllocator::new();
        let mut base = BaseBlock::zeroed();
        let cfg = RoiCfg {
            regions: vec![region(0, 0, 32, 16, 20)],
        };

        res.apply(&mut base, Some(&cfg), 8, 8, &mut alloc).unwrap();
        assert_eq!(base.roi_en, 1);
        assert_ne!(base.roi_addr, 0);
        assert_eq!(res.allocated_size(), buf_size(8, 8));
    }

    #[test]
    fn empty_regions_disable_but_retain_buffer() {
        let mut res = RoiResource::new();
        let mut alloc = HeapAllocator::new();
        let mut base = BaseBlock::zeroed();
        let cfg = RoiCfg {
            regions: vec![region(0, 0, 16, 16, 24)],
        };

        res.apply(&mut base, Some(&cfg), 8, 8, &mut alloc).unwrap();
        let size = res.allocated_size();
        assert!(size > 0);

        res.apply(&mut base, None, 8, 8, &mut alloc).unwrap();
        assert_eq!(base.roi_en, 0);
        assert_eq!(base.roi_addr, 0);
        assert!(res.is_allocated(), "buffer survives empty frames");
        assert_eq!(res.allocated_size(), size);
    }

    #[test]
    fn later_regions_overwrite_earlier_cells() {
        let mut cells = vec![0u8; buf_size(4, 4)];
        let a = region(0, 0, 64, 64, 10);
        let b = region(16, 16, 16, 16, 40);
        serialize_regions(&mut cells, &[a.clone(), b.clone()], 4, 4);

        let cell_at = |mx: usize, my: usize| {
            let at = (my * 4 + mx) * 2;
            u16::from_le_bytes([cells[at], cells[at + 1]])
        };
        assert_eq!(cell_at(0, 0), pack_cell(&a));
        assert_eq!(cell_at(1, 1), pack_cell(&b));
    }

    #[test]
    fn regions_are_clipped_to_the_grid() {
        let mut cells = vec![0u8; buf_size(2, 2)];
        serialize_regions(&mut cells, &[region(-16, -16, 640, 640, 12)], 2, 2);
        // All four cells written, no out-of-bounds access.
        for i in 0..4 {
            let at = ((i / 2) * 4 + (i % 2)) * 2;
            assert_ne!(u16::from_le_bytes([cells[at], cells[at + 1]]), 0);
        }
    }
}
