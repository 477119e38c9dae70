//! Buffer addressing and slice-split policy.
//!
//! Address fields carry opaque platform handles; offsets that exceed the
//! inline field width (source plane offsets, bitstream bounds, the
//! compressed-header split) go through the wide-offset side channel
//! instead of the register image.

use tracing::warn;

use avcenc_core::buffer::BufferAllocator;
use avcenc_core::error::Result;
use avcenc_core::types::{align_i32, FmtMap, HwFmt};

use crate::cfg::{PrepCfg, SplitCfg, SplitMode};
use crate::pool::RecnPool;
use crate::regs::{
    BaseBlock, RegisterImage, OFF_IDX_BS_START, OFF_IDX_BS_TOP, OFF_IDX_EXT_LINE_BUF,
    OFF_IDX_RECN_HDR, OFF_IDX_REFR_HDR, OFF_IDX_SRC_PLANE1, OFF_IDX_SRC_PLANE2,
};
use crate::syntax::FrameTopology;
use crate::task::EncTask;

/// Source and bitstream addressing.
pub fn setup_io_bufs(regs: &mut RegisterImage, prep: &PrepCfg, fmt: &FmtMap, task: &EncTask) {
    let base = &mut regs.base;

    base.adr_src0 = task.input_fd;
    base.adr_src1 = task.input_fd;
    base.adr_src2 = task.input_fd;

    base.bs_bot_addr = task.output_fd;
    base.bs_rd_addr = task.output_fd;
    base.bs_wr_addr = task.output_fd;
    base.bs_top_addr = task.output_fd;

    let (off0, off1) = plane_offsets(prep, fmt, task);
    regs.push_offset(OFF_IDX_SRC_PLANE1, off0);
    regs.push_offset(OFF_IDX_SRC_PLANE2, off1);
    regs.push_offset(OFF_IDX_BS_TOP, task.output_size as u32);
    regs.push_offset(OFF_IDX_BS_START, task.output_used as u32);
}

/// Chroma plane offsets from the luma base, by source layout.
fn plane_offsets(prep: &PrepCfg, fmt: &FmtMap, task: &EncTask) -> (u32, u32) {
    if prep.fbc {
        return (task.input_meta.fbc_offset, 0);
    }
    let luma = (prep.luma_stride() * prep.vert_stride()) as u32;
    match fmt.hw_fmt {
        HwFmt::Yuv420sp | HwFmt::Yuv422sp => (luma, luma),
        HwFmt::Yuv422p => (luma, luma * 3 / 2),
        HwFmt::Yuv420p => (luma, luma * 5 / 4),
        HwFmt::Bgra8888
        | HwFmt::Bgr888
        | HwFmt::Bgr565
        | HwFmt::Yuyv422
        | HwFmt::Uyvy422 => (0, 0),
    }
}

/// Reconstruction and reference addressing from the pool.
///
/// A slot that cannot be resolved skips address setup for its role; the
/// registers keep their zero baseline.
pub fn setup_recn_refr(
    regs: &mut RegisterImage,
    frms: &FrameTopology,
    pool: &mut RecnPool,
    alloc: &mut dyn BufferAllocator,
) -> Result<()> {
    let hdr_offset = pool.geometry().pixel_hdr_size as u32;

    if let Some(slot) = pool.get_buf(frms.curr_idx, alloc)? {
        regs.base.rfpw_h_addr = slot.pixel.fd();
        regs.base.rfpw_b_addr = slot.pixel.fd();
        regs.base.dspw_addr = slot.thumb.fd();
        regs.push_offset(OFF_IDX_RECN_HDR, hdr_offset);
    } else {
        warn!(idx = frms.curr_idx, "reconstruction slot absent");
    }

    if let Some(slot) = pool.get_buf(frms.refr_idx, alloc)? {
        regs.base.rfpr_h_addr = slot.pixel.fd();
        regs.base.rfpr_b_addr = slot.pixel.fd();
        regs.base.dspr_addr = slot.thumb.fd();
        regs.push_offset(OFF_IDX_REFR_HDR, hdr_offset);
    } else {
        warn!(idx = frms.refr_idx, "reference slot absent");
    }

    Ok(())
}

/// Requested slice-split policy.  Each mode owns a disjoint register
/// pattern; the byte and macroblock arguments never coexist.
pub fn setup_split(base: &mut BaseBlock, split: &SplitCfg) {
    match split.mode {
        SplitMode::None => {
            base.sli_split_en = 0;
            base.sli_split_mode = 0;
            base.sli_split_cpst = 0;
            base.sli_max_num_m1 = 0;
            base.sli_flush = 0;
            base.sli_split_cnum_m1 = 0;
            base.sli_split_bytes = 0;
            base.slen_fifo = 0;
        }
        SplitMode::ByBytes => {
            base.sli_split_en = 1;
            base.sli_split_mode = 0;
            base.sli_split_cpst = 0;
            base.sli_max_num_m1 = 500;
            base.sli_flush = 1;
            base.sli_split_cnum_m1 = 0;
            base.sli_split_bytes = split.arg;
            base.slen_fifo = 0;
        }
        SplitMode::ByMbCount => {
            base.sli_split_en = 1;
            base.sli_split_mode = 1;
            base.sli_split_cpst = 0;
            base.sli_max_num_m1 = 500;
            base.sli_flush = 1;
            base.sli_split_cnum_m1 = split.arg.saturating_sub(1);
            base.sli_split_bytes = 0;
            base.slen_fifo = 0;
        }
    }
}

/// Forced macroblock-row split for pictures wider than the single-slice
/// engine limit.  Overrides whatever the policy selected and disables
/// cross-slice references.
pub fn setup_forced_split(base: &mut BaseBlock, width: i32) {
    let mb_w = align_i32(width, 16) >> 4;

    base.sli_split_en = 1;
    base.sli_split_mode = 1;
    base.sli_split_cpst = 0;
    base.sli_max_num_m1 = 500;
    base.sli_flush = 1;
    base.sli_split_cnum_m1 = (mb_w - 1) as u32;

    base.sli_split_bytes = 0;
    base.slen_fifo = 0;
    base.sli_crs_en = 0;
}

/// Extended line buffer wiring for oversized pictures.
pub fn setup_ext_line_buf(regs: &mut RegisterImage, pool: &RecnPool) {
    match pool.ext_line_buf() {
        Some(buf) => {
            regs.base.ebuft_addr = buf.fd();
            regs.base.ebufb_addr = buf.fd();
            regs.push_offset(OFF_IDX_EXT_LINE_BUF, pool.ext_line_buf_size() as u32);
        }
        None => {
            regs.base.ebuft_addr = 0;
            regs.base.ebufb_addr = 0;
        }
    }
}
