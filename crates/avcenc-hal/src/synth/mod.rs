//! The register set synthesizer.
//!
//! Pure transformation from (syntax, rate-control target, buffer handles)
//! to the per-frame [`RegisterImage`](crate::regs::RegisterImage).  Each
//! sub-synthesis owns a disjoint set of register fields and is
//! independently testable:
//!
//! - this module — hardware-generation control defaults and source
//!   format/geometry
//! - [`codec`] — slice/picture/sequence syntax, reordering and marking
//! - [`rc`] — rate-control budgeting and lookup tables, RDO tuning
//! - [`me`] — motion-search ranges and on-chip cache sizing
//! - [`addr`] — source/bitstream/reconstruction addressing, slice split,
//!   extended line buffer
//!
//! The only side channel is the wide-offset list collected on the image;
//! a format-mapping failure aborts the whole synthesis before any of it
//! reaches the device.

pub mod addr;
pub mod codec;
pub mod me;
pub mod rc;

use avcenc_core::types::{CSC_BT601, FmtMap};

use crate::cfg::PrepCfg;
use crate::regs::{int, CtlBlock, RegisterImage};

/// Static control-plane defaults for this hardware generation.  No
/// dynamic inputs.
pub fn setup_control(ctl: &mut CtlBlock) {
    ctl.cmd = 1;
    ctl.clock_gate_en = 1;
    ctl.auto_reset_en = 0;
    ctl.tmvp_done_en = 1;
    ctl.safe_clear = 0;
    ctl.force_clear = 0;

    // Watchdog stays unarmed; every other cause is enabled and unmasked.
    ctl.int_en = int::FRAME_DONE
        | int::NODE_DONE
        | int::SAFE_CLEAR_DONE
        | int::SLICE_DONE
        | int::BS_OVERFLOW
        | int::BUS_WRITE_FULL
        | int::BUS_WRITE_ERR
        | int::BUS_READ_ERR;
    ctl.int_msk = 0;
    ctl.wdg_vs_load_thd = 0;
    ctl.wdg_rfp_load_thd = 0;

    ctl.cmv_wr_order = 0;
    ctl.dsp_wr_order = 0;
    ctl.rfp_wr_order = 0;
    ctl.mei_wr_endian = 0;
    ctl.bs_wr_endian = 7;
    ctl.lkt_rd_endian = 0;
    ctl.roi_rd_endian = 0;
    ctl.lkt_wr_endian = 0;
    ctl.afbc_burst_size = 1;
    ctl.axi_brsp_cke = 0;
    ctl.dsp_rd_outstanding = 1;
}

/// Source format and picture geometry.
///
/// `fmt` must come from [`FmtMap::resolve`] on the session format; the
/// caller aborts the frame before any device interaction when resolution
/// fails.
pub fn setup_prep(regs: &mut RegisterImage, prep: &PrepCfg, fmt: &FmtMap) {
    use avcenc_core::types::align_i32;

    let base = &mut regs.base;

    base.pic_w8_minus1 = (align_i32(prep.width, 16) / 8 - 1) as u32;
    base.pic_wfill = (prep.width & 0xf) as u32;
    base.pic_h8_minus1 = (align_i32(prep.height, 16) / 8 - 1) as u32;
    base.pic_hfill = (prep.height & 0xf) as u32;

    regs.ctl.src_rd_endian = fmt.src_endian;

    base.src_fmt = fmt.hw_fmt as u32;
    base.alpha_swap = fmt.alpha_swap;
    base.rbuv_swap = fmt.rbuv_swap;
    base.src_range = fmt.src_range;
    base.out_fmt = 1;

    let y_stride = prep.luma_stride();
    let c_stride = if fmt.chroma_stride_is_luma() {
        y_stride
    } else {
        y_stride / 2
    };

    let csc = prep.custom_csc.unwrap_or(CSC_BT601);
    base.csc_wgt = csc.weights;
    base.csc_ofst = csc.offsets;

    base.afbcd_en = u32::from(prep.fbc);
    base.src_stride0 = y_stride as u32;
    base.src_stride1 = c_stride as u32;

    base.src_mirror = u32::from(prep.mirroring);
    base.src_rotation = prep.rotation;
    base.txa_en = 0;

    base.sli_crs_en = 1;

    base.pic_ofst_x = 0;
    base.pic_ofst_y = 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use avcenc_core::types::{CscCoeffs, PixelFormat};
    use bytemuck::Zeroable;

    #[test]
    fn control_defaults_leave_watchdog_off() {
        let mut ctl = CtlBlock::zeroed();
        setup_control(&mut ctl);
        assert_eq!(ctl.int_en & int::WATCHDOG, 0);
        assert_ne!(ctl.int_en & int::FRAME_DONE, 0);
        assert_eq!(ctl.int_msk, 0);
        assert_eq!(ctl.bs_wr_endian, 7);
    }

    #[test]
    fn geometry_fields_for_unaligned_picture() {
        let mut regs = RegisterImage::default();
        let prep = PrepCfg::new(1924, 1082, PixelFormat::Nv12);
        let fmt = FmtMap::resolve(prep.format).unwrap();
        setup_prep(&mut regs, &prep, &fmt);

        // 1924 -> 1936 aligned: 241 8-pel units, fill 4 pixels.
        assert_eq!(regs.base.pic_w8_minus1, 1936 / 8 - 1);
        assert_eq!(regs.base.pic_wfill, 4);
        assert_eq!(regs.base.pic_h8_minus1, 1088 / 8 - 1);
        assert_eq!(regs.base.pic_hfill, 10);
    }

    #[test]
    fn chroma_stride_follows_format() {
        let mut regs = RegisterImage::default();
        let mut prep = PrepCfg::new(1920, 1080, PixelFormat::Nv12);
        prep.hor_stride = 2048;
        let fmt = FmtMap::resolve(prep.format).unwrap();
        setup_prep(&mut regs, &prep, &fmt);
        assert_eq!(regs.base.src_stride1, 2048);

        prep.format = PixelFormat::Yuv420p;
        let fmt = FmtMap::resolve(prep.format).unwrap();
        setup_prep(&mut regs, &prep, &fmt);
        assert_eq!(regs.base.src_stride1, 1024);
    }

    #[test]
    fn custom_csc_overrides_bt601() {
        let mut regs = RegisterImage::default();
        let mut prep = PrepCfg::new(640, 480, PixelFormat::Bgra8888);
        let fmt = FmtMap::resolve(prep.format).unwrap();

        setup_prep(&mut regs, &prep, &fmt);
        assert_eq!(regs.base.csc_wgt, CSC_BT601.weights);

        let custom = CscCoeffs {
            weights: [1, 2, 3, 4, 5, 6, 7, 8, 9],
            offsets: [0, 64, 64],
        };
        prep.custom_csc = Some(custom);
        setup_prep(&mut regs, &prep, &fmt);
        assert_eq!(regs.base.csc_wgt, custom.weights);
        assert_eq!(regs.base.csc_ofst, custom.offsets);
    }
}
