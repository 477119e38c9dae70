//! Reconstruction/reference buffer pool.
//!
//! The accelerator writes every reconstruction into a pool slot and reads
//! its reference from another; slot geometry depends on the codec
//! parameters, so the pool is resized whenever the session configuration
//! changes.  Two policies protect in-flight references:
//!
//! - the slot count never shrinks; a growth request keeps the larger of
//!   the old and new counts;
//! - a per-slot byte-size change rebuilds the pool outright, every slot
//!   starting out empty (unmaterialized).
//!
//! Slots materialize lazily on first lookup; [`RecnPool::preallocate`]
//! forces all of them early to bound first-frame latency.
//!
//! The pool also owns the oversized-picture line buffer, which exists only
//! while the aligned picture width exceeds the hardware line limit of 4096
//! pixels.

use tracing::debug;

use avcenc_core::buffer::{BufferAllocator, HwBuffer};
use avcenc_core::error::Result;
use avcenc_core::types::align_i32;

use crate::cfg::{PrepCfg, RefCfg};

/// Hardware line-length limit in pixels; wider pictures spill search
/// context into the external line buffer.
const LINE_LIMIT: i32 = 4096;

/// Granularity of the compressed-plane and thumbnail allocations.
const PLANE_ALIGN: i32 = 8192;

/// The two hardware buffers backing one pool slot.
#[derive(Debug)]
pub struct SlotBufs {
    /// Compressed reconstruction plane (header + body).
    pub pixel: HwBuffer,
    /// Downscaled thumbnail plane for coarse search.
    pub thumb: HwBuffer,
}

/// Pool geometry derived from the active configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolGeometry {
    pub pixel_hdr_size: usize,
    pub pixel_bdy_size: usize,
    pub pixel_size: usize,
    pub thumb_size: usize,
    pub slot_count: usize,
}

/// Reconstruction/reference slot pool plus the oversized-picture line
/// buffer.
#[derive(Debug, Default)]
pub struct RecnPool {
    slots: Vec<Option<SlotBufs>>,
    geo: PoolGeometry,
    ext_line_buf: Option<HwBuffer>,
    ext_line_buf_size: usize,
}

impl RecnPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Geometry a `(prep, refs)` pair requires, before the never-shrink
    /// policy is applied to the slot count.
    pub fn required_geometry(prep: &PrepCfg, refs: &RefCfg) -> PoolGeometry {
        let aligned_w = align_i32(prep.width, 64);
        let aligned_h = align_i32(prep.height, 64);
        let pixel_hdr_size = align_i32(aligned_w * aligned_h / 64, PLANE_ALIGN);
        let pixel_bdy_size = aligned_w * aligned_h * 3 / 2;
        let thumb_size = align_i32(aligned_w / 64 * aligned_h / 64 * 256, PLANE_ALIGN);
        let slot_count = 2.max(refs.dpb_size + 1) as usize;

        PoolGeometry {
            pixel_hdr_size: pixel_hdr_size as usize,
            pixel_bdy_size: pixel_bdy_size as usize,
            pixel_size: (pixel_hdr_size + pixel_bdy_size) as usize,
            thumb_size: thumb_size as usize,
            slot_count,
        }
    }

    /// Re-derive pool geometry from the configuration, rebuilding slots and
    /// resizing the line buffer as needed.
    pub fn ensure_capacity(
        &mut self,
        prep: &PrepCfg,
        refs: &RefCfg,
        alloc: &mut dyn BufferAllocator,
    ) -> Result<()> {
        let mut want = Self::required_geometry(prep, refs);

        self.update_ext_line_buf(prep, alloc)?;

        let sizes_changed = want.pixel_hdr_size != self.geo.pixel_hdr_size
            || want.pixel_bdy_size != self.geo.pixel_bdy_size
            || want.pixel_size != self.geo.pixel_size
            || want.thumb_size != self.geo.thumb_size;

        if sizes_changed || want.slot_count > self.geo.slot_count {
            // Never shrink: keep the larger slot count so in-flight
            // reference indices stay valid.
            want.slot_count = want.slot_count.max(self.geo.slot_count);

            debug!(
                pixel_size = want.pixel_size,
                thumb_size = want.thumb_size,
                slots = want.slot_count,
                prev_slots = self.geo.slot_count,
                "reconstruction pool reconfigured"
            );

            self.slots = (0..want.slot_count).map(|_| None).collect();
            self.geo = want;
        }

        Ok(())
    }

    fn update_ext_line_buf(
        &mut self,
        prep: &PrepCfg,
        alloc: &mut dyn BufferAllocator,
    ) -> Result<()> {
        let aligned_w = align_i32(prep.width, 64);

        if aligned_w > LINE_LIMIT {
            let size = align_i32((aligned_w - LINE_LIMIT) / 64 * 30 * 16, 256) as usize;

            if self.ext_line_buf.is_some() && size != self.ext_line_buf_size {
                self.ext_line_buf = None;
            }
            if self.ext_line_buf.is_none() {
                debug!(size, aligned_w, "external line buffer allocated");
                self.ext_line_buf = Some(alloc.alloc(size)?);
            }
            self.ext_line_buf_size = size;
        } else {
            if self.ext_line_buf.is_some() {
                debug!("external line buffer released");
            }
            self.ext_line_buf = None;
            self.ext_line_buf_size = 0;
        }

        Ok(())
    }

    /// Look up a slot by pool index, materializing its buffers on first
    /// use.  Out-of-range indices resolve to `None`; callers skip address
    /// setup for the affected role.
    pub fn get_buf(
        &mut self,
        idx: usize,
        alloc: &mut dyn BufferAllocator,
    ) -> Result<Option<&SlotBufs>> {
        if idx >= self.slots.len() {
            return Ok(None);
        }
        if self.slots[idx].is_none() {
            self.slots[idx] = Some(SlotBufs {
                pixel: alloc.alloc(self.geo.pixel_size)?,
                thumb: alloc.alloc(self.geo.thumb_size)?,
            });
        }
        Ok(self.slots[idx].as_ref())
    }

    /// Materialize every slot eagerly, bounding first-frame latency.
    pub fn preallocate(&mut self, alloc: &mut dyn BufferAllocator) -> Result<()> {
        for idx in 0..self.slots.len() {
            self.get_buf(idx, alloc)?;
        }
        Ok(())
    }

    /// Current pool geometry.
    pub fn geometry(&self) -> PoolGeometry {
        self.geo
    }

    /// Number of slots currently materialized.
    pub fn materialized(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// The external line buffer, when the picture is wide enough to need
    /// one.
    pub fn ext_line_buf(&self) -> Option<&HwBuffer> {
        self.ext_line_buf.as_ref()
    }

    pub fn ext_line_buf_size(&self) -> usize {
        self.ext_line_buf_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avcenc_core::buffer::HeapAllocator;
    use avcenc_core::types::PixelFormat;

    fn prep(w: i32, h: i32) -> PrepCfg {
        PrepCfg::new(w, h, PixelFormat::Nv12)
    }

    // ── Geometry derivation ──────────────────────────────────────────

    #[test]
    fn geometry_1080p() {
        let geo = RecnPool::required_geometry(&prep(1920, 1080), &RefCfg { dpb_size: 0 });
        // 1920x1088 aligned: header 1920*1088/64 = 32640 -> 40960 aligned.
        assert_eq!(geo.pixel_hdr_size, 40960);
        assert_eq!(geo.pixel_bdy_size, 1920 * 1088 * 3 / 2);
        assert_eq!(geo.pixel_size, geo.pixel_hdr_size + geo.pixel_bdy_size);
        // 30*17 thumbnail cells of 256 bytes -> 131072 aligned.
        assert_eq!(geo.thumb_size, 131072);
        assert_eq!(geo.slot_count, 2);
    }

    #[test]
    fn slot_count_tracks_dpb() {
        let geo = RecnPool::required_geometry(&prep(640, 480), &RefCfg { dpb_size: 4 });
        assert_eq!(geo.slot_count, 5);
        let geo = RecnPool::required_geometry(&prep(640, 480), &RefCfg { dpb_size: 1 });
        assert_eq!(geo.slot_count, 2);
    }

    // ── Capacity policy ──────────────────────────────────────────────

    #[test]
    fn slot_count_never_shrinks() {
        let mut pool = RecnPool::new();
        let mut alloc = HeapAllocator::new();

        pool.ensure_capacity(&prep(1280, 720), &RefCfg { dpb_size: 4 }, &mut alloc)
            .unwrap();
        assert_eq!(pool.geometry().slot_count, 5);

        // Smaller topology, same sizes: no reconfiguration at all.
        pool.ensure_capacity(&prep(1280, 720), &RefCfg { dpb_size: 1 }, &mut alloc)
            .unwrap();
        assert_eq!(pool.geometry().slot_count, 5);

        // Geometry change rebuilds, but keeps the larger count.
        pool.ensure_capacity(&prep(1920, 1080), &RefCfg { dpb_size: 1 }, &mut alloc)
            .unwrap();
        assert_eq!(pool.geometry().slot_count, 5);
    }

    #[test]
    fn size_change_rebuilds_slots_empty() {
        let mut pool = RecnPool::new();
        let mut alloc = HeapAllocator::new();

        pool.ensure_capacity(&prep(1280, 720), &RefCfg { dpb_size: 0 }, &mut alloc)
            .unwrap();
        pool.preallocate(&mut alloc).unwrap();
        assert_eq!(pool.materialized(), 2);

        pool.ensure_capacity(&prep(1920, 1080), &RefCfg { dpb_size: 0 }, &mut alloc)
            .unwrap();
        assert_eq!(pool.materialized(), 0, "rebuild starts from empty slots");
        assert_eq!(
            pool.geometry(),
            {
                let mut g = RecnPool::required_geometry(&prep(1920, 1080), &RefCfg { dpb_size: 0 });
                g.slot_count = 2;
                g
            },
            "sizes reflect the most recent geometry"
        );
    }

    #[test]
    fn stable_config_is_a_noop() {
        let mut pool = RecnPool::new();
        let mut alloc = HeapAllocator::new();

        pool.ensure_capacity(&prep(1920, 1080), &RefCfg { dpb_size: 0 }, &mut alloc)
            .unwrap();
        pool.preallocate(&mut alloc).unwrap();
        pool.ensure_capacity(&prep(1920, 1080), &RefCfg { dpb_size: 0 }, &mut alloc)
            .unwrap();
        assert_eq!(pool.materialized(), 2, "unchanged config keeps slots");
    }

    // ── Slot lookup ──────────────────────────────────────────────────

    #[test]
    fn lookup_materializes_lazily() {
        let mut pool = RecnPool::new();
        let mut alloc = HeapAllocator::new();
        pool.ensure_capacity(&prep(640, 480), &RefCfg { dpb_size: 0 }, &mut alloc)
            .unwrap();

        assert_eq!(pool.materialized(), 0);
        let geo = pool.geometry();
        {
            let slot = pool.get_buf(0, &mut alloc).unwrap().unwrap();
            assert_eq!(slot.pixel.len(), geo.pixel_size);
            assert_eq!(slot.thumb.len(), geo.thumb_size);
        }
        assert_eq!(pool.materialized(), 1);
    }

    #[test]
    fn out_of_range_lookup_is_absent() {
        let mut pool = RecnPool::new();
        let mut alloc = HeapAllocator::new();
        pool.ensure_capacity(&prep(640, 480), &RefCfg { dpb_size: 0 }, &mut alloc)
            .unwrap();
        assert!(pool.get_buf(7, &mut alloc).unwrap().is_none());
    }

    // ── External line buffer ─────────────────────────────────────────

    #[test]
    fn no_line_buffer_at_or_below_4096() {
        let mut pool = RecnPool::new();
        let mut alloc = HeapAllocator::new();
        for w in [1920, 3840, 4096] {
            pool.ensure_capacity(&prep(w, 2160), &RefCfg { dpb_size: 0 }, &mut alloc)
                .unwrap();
            assert!(pool.ext_line_buf().is_none(), "width {w}");
            assert_eq!(pool.ext_line_buf_size(), 0);
        }
    }

    #[test]
    fn line_buffer_size_tracks_excess_width() {
        let mut pool = RecnPool::new();
        let mut alloc = HeapAllocator::new();

        pool.ensure_capacity(&prep(4352, 2176), &RefCfg { dpb_size: 0 }, &mut alloc)
            .unwrap();
        // (4352 - 4096) / 64 * 30 * 16 = 1920, already 256-aligned.
        assert_eq!(pool.ext_line_buf_size(), 1920);
        let fd = pool.ext_line_buf().unwrap().fd();

        // Same width: buffer retained.
        pool.ensure_capacity(&prep(4352, 2176), &RefCfg { dpb_size: 0 }, &mut alloc)
            .unwrap();
        assert_eq!(pool.ext_line_buf().unwrap().fd(), fd);

        // Wider picture: reallocated at the new size.
        pool.ensure_capacity(&prep(7680, 4320), &RefCfg { dpb_size: 0 }, &mut alloc)
            .unwrap();
        assert_eq!(pool.ext_line_buf_size(), (7680 - 4096) / 64 * 30 * 16);
        assert_ne!(pool.ext_line_buf().unwrap().fd(), fd);

        // Narrow again: released entirely.
        pool.ensure_capacity(&prep(1920, 1080), &RefCfg { dpb_size: 0 }, &mut alloc)
            .unwrap();
        assert!(pool.ext_line_buf().is_none());
        assert_eq!(pool.ext_line_buf_size(), 0);
    }
}
