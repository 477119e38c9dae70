//! The encode session and per-frame driving.
//!
//! [`AvcEncHal`] owns everything with cross-frame lifetime: the device
//! transport, the allocator, the reconstruction pool, the region
//! resource, the latest syntax descriptors and the working register
//! image.  One frame is driven through
//! `prepare → get_task → gen_regs → start → wait → ret_task`; callers
//! must serialize frames per session.
//!
//! Two environment toggles, `AVCENC_DUMP_BASE_REGS` and
//! `AVCENC_DUMP_TUNE_REGS`, dump the first-block and extended-tuning
//! register words as address/value pairs for offline inspection.  They
//! have no effect on encoding behavior.

use tracing::{debug, error, info};

use avcenc_core::buffer::BufferAllocator;
use avcenc_core::device::{EncDevice, RegBlock};
use avcenc_core::error::{HalError, Result};
use avcenc_core::types::FmtMap;

use crate::cfg::EncCfg;
use crate::osd::OsdPayload;
use crate::pool::RecnPool;
use crate::regs::{self, int, RegisterImage};
use crate::roi::{RoiCfg, RoiResource};
use crate::stats;
use crate::synth;
use crate::syntax::{
    FrameTopology, MarkingQueue, Pps, PrefixInfo, ReorderQueue, SliceHeader, Sps, SyntaxUpdate,
};

// ─── Rate-control task ───────────────────────────────────────────────────

/// Frame status flags from the rate controller.
#[derive(Clone, Copy, Debug, Default)]
pub struct RcFrameStatus {
    /// This pass re-encodes the previous frame; keep its metadata.
    pub reencode: bool,
}

/// Rate-control target (input) and measured result (output).
#[derive(Clone, Copy, Debug, Default)]
pub struct RcTaskInfo {
    /// Target stream size for this frame, in bits.
    pub bit_target: i32,
    /// Target QP.
    pub quality_target: u32,
    /// Lower QP bound.
    pub quality_min: u32,
    /// Upper QP bound.
    pub quality_max: u32,
    /// Realized stream size in bits.
    pub bit_real: i32,
    /// Realized average QP.
    pub quality_real: u32,
    /// Intra-activity metric.
    pub madi: u32,
    /// Prediction-activity metric.
    pub madp: u32,
    /// Intra-coded block share (fixed-point, 256 = whole picture).
    pub iblk4_prop: u32,
}

/// Rate-control exchange for one frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct RcTask {
    pub frm: RcFrameStatus,
    pub info: RcTaskInfo,
}

// ─── Frame task ──────────────────────────────────────────────────────────

/// Per-frame source metadata.
#[derive(Clone, Debug, Default)]
pub struct FrameMeta {
    /// Crop offset of the encoded window inside the source picture.
    pub offset_x: u32,
    pub offset_y: u32,
    /// Payload offset for framebuffer-compressed sources.
    pub fbc_offset: u32,
    /// Region-of-interest configuration for this frame.
    pub roi: Option<RoiCfg>,
    /// Overlay payloads (base and secondary layer).
    pub osd: Option<OsdPayload>,
    pub osd2: Option<OsdPayload>,
}

/// One frame's worth of work handed to the session.
#[derive(Debug, Default)]
pub struct EncTask {
    /// Syntax descriptor updates for this frame, consumed by ingest.
    pub updates: Vec<SyntaxUpdate>,
    /// Source picture buffer handle.
    pub input_fd: i32,
    pub input_meta: FrameMeta,
    /// Output bitstream buffer handle and size.
    pub output_fd: i32,
    pub output_size: usize,
    /// Bytes already in the output buffer (stream headers).
    pub output_used: usize,
    /// Optional motion-info export buffer.
    pub mv_info_fd: Option<i32>,
    pub rc: RcTask,
    /// Hardware-measured stream bytes, accumulated by `wait`.
    pub hw_length: usize,
    /// Total stream bytes including software-written headers.
    pub length: usize,
}

// ─── Session ─────────────────────────────────────────────────────────────

/// One encode session against one accelerator context.
pub struct AvcEncHal {
    cfg: EncCfg,
    dev: Box<dyn EncDevice>,
    alloc: Box<dyn BufferAllocator>,
    frame_cnt: u32,

    pool: RecnPool,
    roi_res: RoiResource,

    // Latest syntax, replaced wholesale by ingest.
    sps: Option<Sps>,
    pps: Option<Pps>,
    slice: Option<SliceHeader>,
    frms: Option<FrameTopology>,
    reorder: ReorderQueue,
    marking: MarkingQueue,
    prefix: Option<PrefixInfo>,

    // Per-frame metadata held across re-encode passes.
    roi_cfg: Option<RoiCfg>,
    osd: Option<OsdPayload>,
    osd2: Option<OsdPayload>,

    regs: RegisterImage,
    rc_feedback: RcTaskInfo,
}

impl AvcEncHal {
    pub fn new(cfg: EncCfg, dev: Box<dyn EncDevice>, alloc: Box<dyn BufferAllocator>) -> Self {
        info!(
            width = cfg.prep.width,
            height = cfg.prep.height,
            format = ?cfg.prep.format,
            "encode session opened"
        );
        Self {
            cfg,
            dev,
            alloc,
            frame_cnt: 0,
            pool: RecnPool::new(),
            roi_res: RoiResource::new(),
            sps: None,
            pps: None,
            slice: None,
            frms: None,
            reorder: ReorderQueue::default(),
            marking: MarkingQueue::default(),
            prefix: None,
            roi_cfg: None,
            osd: None,
            osd2: None,
            regs: RegisterImage::default(),
            rc_feedback: RcTaskInfo::default(),
        }
    }

    /// Finalize geometry ahead of the first frame: size the pool and
    /// materialize every slot so the first frame does not pay the
    /// allocation latency.
    pub fn prepare(&mut self) -> Result<()> {
        let prep = &self.cfg.prep;
        if prep.width <= 0 || prep.height <= 0 {
            return Err(HalError::InvalidConfig(format!(
                "picture geometry {}x{}",
                prep.width, prep.height
            )));
        }
        if prep.rotation > 3 {
            return Err(HalError::InvalidConfig(format!(
                "rotation code {}",
                prep.rotation
            )));
        }

        if self.cfg.prep.dirty {
            self.pool
                .ensure_capacity(&self.cfg.prep, &self.cfg.refs, self.alloc.as_mut())?;
            self.pool.preallocate(self.alloc.as_mut())?;
            self.cfg.prep.dirty = false;
        }
        Ok(())
    }

    /// Ingest this frame's syntax descriptors and metadata.
    pub fn get_task(&mut self, task: &mut EncTask) -> Result<()> {
        let mut cfg_updated = false;

        for update in std::mem::take(&mut task.updates) {
            debug!(kind = update.kind(), "syntax update");
            match update {
                SyntaxUpdate::Cfg(cfg) => {
                    self.cfg = *cfg;
                    cfg_updated = true;
                }
                SyntaxUpdate::Sps(sps) => self.sps = Some(sps),
                SyntaxUpdate::Pps(pps) => self.pps = Some(pps),
                SyntaxUpdate::Slice(slice) => self.slice = Some(slice),
                SyntaxUpdate::Frames(frms) => self.frms = Some(frms),
                SyntaxUpdate::Reorder(reorder) => self.reorder = reorder,
                SyntaxUpdate::Marking(marking) => self.marking = marking,
                SyntaxUpdate::Prefix(prefix) => self.prefix = Some(prefix),
                SyntaxUpdate::Unknown(tag) => {
                    error!(tag, "ignoring unknown syntax descriptor");
                }
            }
        }

        if cfg_updated {
            self.pool
                .ensure_capacity(&self.cfg.prep, &self.cfg.refs, self.alloc.as_mut())?;
        }

        // Re-encode passes keep the previous frame's metadata.
        if !task.rc.frm.reencode {
            self.roi_cfg = task.input_meta.roi.clone();
            self.osd = task.input_meta.osd.clone();
            self.osd2 = task.input_meta.osd2.clone();
        }

        Ok(())
    }

    /// Build the complete register image for this frame.
    ///
    /// A format-mapping failure aborts before the image is touched;
    /// everything else is clamped or defaulted, never fatal.
    pub fn gen_regs(&mut self, task: &EncTask) -> Result<()> {
        let fmt = FmtMap::resolve(self.cfg.prep.format)?;

        let sps = self.sps.clone().ok_or(HalError::MissingSyntax("sps"))?;
        let pps = self.pps.clone().ok_or(HalError::MissingSyntax("pps"))?;
        let slice = self.slice.clone().ok_or(HalError::MissingSyntax("slice"))?;
        let frms = self.frms.ok_or(HalError::MissingSyntax("frames"))?;

        debug!(frame = frms.seq_idx, "generating registers");

        self.regs.clear();

        synth::setup_control(&mut self.regs.ctl);
        synth::setup_prep(&mut self.regs, &self.cfg.prep, &fmt);

        synth::codec::setup_codec(
            &mut self.regs.base,
            &sps,
            &pps,
            &slice,
            &mut self.reorder,
            &mut self.marking,
        );
        synth::rc::setup_rdo_pred(&mut self.regs.base, &mut self.regs.rc_lut, &sps, &pps, &slice);
        synth::rc::setup_rdo_tables(&mut self.regs.rdo);
        synth::rc::setup_rc_base(
            &mut self.regs.base,
            &mut self.regs.rc_lut,
            &sps,
            &slice,
            &self.cfg.hw,
            &task.rc.info,
        );
        synth::addr::setup_io_bufs(&mut self.regs, &self.cfg.prep, &fmt, task);
        self.roi_res.apply(
            &mut self.regs.base,
            self.roi_cfg.as_ref(),
            sps.pic_width_in_mbs,
            sps.pic_height_in_mbs,
            self.alloc.as_mut(),
        )?;
        synth::addr::setup_recn_refr(&mut self.regs, &frms, &mut self.pool, self.alloc.as_mut())?;

        self.regs.base.meiw_addr = task.mv_info_fd.unwrap_or(0);
        self.regs.base.pic_ofst_x = task.input_meta.offset_x;
        self.regs.base.pic_ofst_y = task.input_meta.offset_y;

        synth::addr::setup_split(&mut self.regs.base, &self.cfg.split);
        if self.cfg.prep.width > 1920 {
            synth::addr::setup_forced_split(&mut self.regs.base, self.cfg.prep.width);
        }

        synth::me::setup_me(&mut self.regs.base, &sps, &slice);

        crate::osd::apply(&mut self.regs.osd, self.osd.as_ref(), self.osd2.as_ref());
        synth::rc::setup_tune(&mut self.regs.tune, &mut self.regs.rc_lut, &slice);
        synth::addr::setup_ext_line_buf(&mut self.regs, &self.pool);

        if std::env::var_os("AVCENC_DUMP_BASE_REGS").is_some() {
            dump_block("ctl", RegBlock::Control.offset(), regs::as_words(&self.regs.ctl));
            dump_block("base", RegBlock::Base.offset(), regs::as_words(&self.regs.base));
        }
        if std::env::var_os("AVCENC_DUMP_TUNE_REGS").is_some() {
            dump_block("tune", RegBlock::Tune.offset(), regs::as_words(&self.regs.tune));
        }

        self.frame_cnt += 1;
        Ok(())
    }

    /// Apply the wide-offset registrations, write the configuration
    /// blocks in fixed order and submit.  The first failing call aborts
    /// the frame.
    pub fn start(&mut self, _task: &EncTask) -> Result<()> {
        for off in &self.regs.offsets {
            self.dev.reg_offset(*off).map_err(|e| {
                error!(index = off.index, "offset registration failed: {e}");
                e
            })?;
        }

        for block in RegBlock::WRITE_ORDER {
            let words: &[u32] = match block {
                RegBlock::Control => regs::as_words(&self.regs.ctl),
                RegBlock::Base => regs::as_words(&self.regs.base),
                RegBlock::RcLut => regs::as_words(&self.regs.rc_lut),
                RegBlock::Tune => regs::as_words(&self.regs.tune),
                RegBlock::Rdo => regs::as_words(&self.regs.rdo),
                RegBlock::Osd => regs::as_words(&self.regs.osd),
                RegBlock::Status => unreachable!("status block is read-only"),
            };
            self.dev.reg_write(block, words).map_err(|e| {
                error!(?block, "register write failed: {e}");
                e
            })?;
        }

        self.dev.submit().map_err(|e| {
            error!("submit failed: {e}");
            e
        })
    }

    /// Poll for completion, fetch the status block and accumulate the
    /// measured stream length.
    pub fn wait(&mut self, task: &mut EncTask) -> Result<()> {
        self.dev.poll().map_err(|e| {
            error!("poll failed: {e}");
            e
        })?;

        self.dev
            .reg_read(RegBlock::Status, regs::as_words_mut(&mut self.regs.status))?;

        self.check_hw_status();
        task.hw_length += self.regs.status.bs_len as usize;
        Ok(())
    }

    /// Hardware status error bits are diagnostics, not failures: the
    /// measured length and statistics are still returned.
    fn check_hw_status(&self) {
        let sta = self.regs.status.int_sta;

        if sta & int::FRAME_DONE != 0 {
            debug!("frame done");
        }
        if sta & int::SLICE_DONE != 0 {
            debug!("slice done");
        }
        if sta & int::SAFE_CLEAR_DONE != 0 {
            debug!("safe clear done");
        }
        if sta & int::BS_OVERFLOW != 0 {
            error!("bitstream overflow");
        }
        if sta & int::BUS_WRITE_FULL != 0 {
            error!("bus write full");
        }
        if sta & int::BUS_WRITE_ERR != 0 {
            error!("bus write error");
        }
        if sta & int::BUS_READ_ERR != 0 {
            error!("bus read error");
        }
        if sta & int::WATCHDOG != 0 {
            error!("watchdog timeout");
        }
    }

    /// Decode the statistics into rate-control feedback and hand the
    /// task back.
    pub fn ret_task(&mut self, task: &mut EncTask) -> Result<()> {
        let sps = self.sps.as_ref().ok_or(HalError::MissingSyntax("sps"))?;
        let mbs = (sps.pic_width_in_mbs * sps.pic_height_in_mbs) as u32;

        task.length += task.hw_length;

        let fb = stats::decode(&self.regs.status, task.hw_length, mbs);
        task.rc.info.bit_real = fb.bit_real;
        task.rc.info.quality_real = fb.quality_real;
        task.rc.info.madi = fb.madi;
        task.rc.info.madp = fb.madp;
        task.rc.info.iblk4_prop = fb.iblk4_prop;

        self.rc_feedback.bit_real = fb.bit_real;
        self.rc_feedback.quality_real = fb.quality_real;
        self.rc_feedback.iblk4_prop = fb.iblk4_prop;

        Ok(())
    }

    // ── Introspection ────────────────────────────────────────────────

    /// The working register image (last synthesized frame).
    pub fn regs(&self) -> &RegisterImage {
        &self.regs
    }

    /// The reconstruction/reference pool.
    pub fn pool(&self) -> &RecnPool {
        &self.pool
    }

    /// The region descriptor resource.
    pub fn roi_resource(&self) -> &RoiResource {
        &self.roi_res
    }

    /// Rate-control feedback cached from the last returned frame.
    pub fn cached_feedback(&self) -> &RcTaskInfo {
        &self.rc_feedback
    }

    /// Frames synthesized so far.
    pub fn frame_count(&self) -> u32 {
        self.frame_cnt
    }

    /// Prefix NAL info from the latest ingest, if any.
    pub fn prefix(&self) -> Option<&PrefixInfo> {
        self.prefix.as_ref()
    }
}

fn dump_block(name: &str, base_addr: u32, words: &[u32]) {
    debug!("{name} register dump start");
    for (i, w) in words.iter().enumerate() {
        debug!("{:#06x} {:#010x}", base_addr + (i as u32) * 4, w);
    }
    debug!("{name} register dump done");
}
