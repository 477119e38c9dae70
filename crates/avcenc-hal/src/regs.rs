//! The per-frame register image.
//!
//! One [`RegisterImage`] is owned by the session and rebuilt from zero at
//! the start of every synthesis, so no field from the previous frame can
//! leak into a field the current frame's synthesis does not touch.  The
//! image is partitioned into the named blocks of
//! [`RegBlock`](avcenc_core::device::RegBlock); each block is a
//! `#[repr(C)]` plain-old-data struct of 32-bit words that the dispatcher
//! writes verbatim at the block's fixed offset.
//!
//! Wide base-address offsets that do not fit the inline address fields are
//! collected in [`RegisterImage::offsets`] and applied by the dispatcher
//! through the out-of-band offset channel before submission.

use bytemuck::{Pod, Zeroable};

use avcenc_core::device::RegOffset;

// ─── Interrupt bits ──────────────────────────────────────────────────────

/// Interrupt cause bits shared by the enable, mask and status words.
pub mod int {
    pub const FRAME_DONE: u32 = 1 << 0;
    pub const NODE_DONE: u32 = 1 << 1;
    pub const SAFE_CLEAR_DONE: u32 = 1 << 2;
    pub const SLICE_DONE: u32 = 1 << 3;
    pub const BS_OVERFLOW: u32 = 1 << 4;
    pub const BUS_WRITE_FULL: u32 = 1 << 5;
    pub const BUS_WRITE_ERR: u32 = 1 << 6;
    pub const BUS_READ_ERR: u32 = 1 << 7;
    pub const WATCHDOG: u32 = 1 << 8;
}

// ─── Wide-offset register indices ────────────────────────────────────────

/// Chroma plane 1 source address.
pub const OFF_IDX_SRC_PLANE1: u32 = 161;
/// Chroma plane 2 source address.
pub const OFF_IDX_SRC_PLANE2: u32 = 162;
/// Reconstruction compressed-header offset.
pub const OFF_IDX_RECN_HDR: u32 = 164;
/// Reference compressed-header offset.
pub const OFF_IDX_REFR_HDR: u32 = 166;
/// Bitstream buffer end (buffer size).
pub const OFF_IDX_BS_TOP: u32 = 172;
/// Bitstream write start (bytes already in the buffer).
pub const OFF_IDX_BS_START: u32 = 175;
/// Extended line buffer end (buffer size).
pub const OFF_IDX_EXT_LINE_BUF: u32 = 183;

// ─── Control block ───────────────────────────────────────────────────────

/// Interrupt, clock and bus-transaction control.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct CtlBlock {
    /// Start command: 1 = encode one frame.
    pub cmd: u32,
    pub clock_gate_en: u32,
    pub auto_reset_en: u32,
    pub tmvp_done_en: u32,
    pub safe_clear: u32,
    pub force_clear: u32,
    /// Interrupt enables ([`int`] bits).
    pub int_en: u32,
    /// Interrupt masks ([`int`] bits).
    pub int_msk: u32,
    pub int_clr: u32,
    pub wdg_vs_load_thd: u32,
    pub wdg_rfp_load_thd: u32,
    // Bus transaction mapping.
    pub cmv_wr_order: u32,
    pub dsp_wr_order: u32,
    pub rfp_wr_order: u32,
    pub src_rd_endian: u32,
    pub mei_wr_endian: u32,
    pub bs_wr_endian: u32,
    pub lkt_rd_endian: u32,
    pub roi_rd_endian: u32,
    pub lkt_wr_endian: u32,
    pub afbc_burst_size: u32,
    pub axi_brsp_cke: u32,
    pub dsp_rd_outstanding: u32,
}

// ─── Base block ──────────────────────────────────────────────────────────

/// Picture geometry, codec syntax, addresses and motion search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct BaseBlock {
    // Geometry.
    pub pic_w8_minus1: u32,
    pub pic_h8_minus1: u32,
    pub pic_wfill: u32,
    pub pic_hfill: u32,
    pub pic_ofst_x: u32,
    pub pic_ofst_y: u32,
    // Source format and color conversion.
    pub src_fmt: u32,
    pub alpha_swap: u32,
    pub rbuv_swap: u32,
    pub src_range: u32,
    pub out_fmt: u32,
    pub csc_wgt: [i32; 9],
    pub csc_ofst: [i32; 3],
    pub afbcd_en: u32,
    pub src_mirror: u32,
    pub src_rotation: u32,
    pub txa_en: u32,
    pub src_stride0: u32,
    pub src_stride1: u32,
    // Picture-level control.
    pub enc_std: u32,
    pub cur_frm_ref: u32,
    pub bs_scp: u32,
    pub pic_qp: u32,
    pub slen_fifo: u32,
    pub roi_en: u32,
    // NAL / parameter-set syntax.
    pub nal_ref_idc: u32,
    pub nal_unit_type: u32,
    pub sps_max_fnum: u32,
    pub sps_drct_8x8: u32,
    pub sps_mpoc_lm4: u32,
    pub pps_etpy_mode: u32,
    pub pps_trns_8x8: u32,
    pub pps_csip_flag: u32,
    pub pps_num_ref0_idx: u32,
    pub pps_num_ref1_idx: u32,
    pub pps_init_qp: u32,
    pub pps_cb_ofst: i32,
    pub pps_cr_ofst: i32,
    pub pps_wght_pred: u32,
    pub pps_dbf_cp_flg: u32,
    // Slice syntax.
    pub sli_type: u32,
    pub sli_pps_id: u32,
    pub sli_drct_smvp: u32,
    pub sli_num_ref_ovrd: u32,
    pub sli_cbc_init_idc: u32,
    pub sli_frm_num: u32,
    pub sli_idr_pid: u32,
    pub sli_poc_lsb: u32,
    pub sli_dis_dblk_idc: u32,
    pub sli_alph_ofst: i32,
    // Reference-list reordering.
    pub ref_list0_rodr: u32,
    pub rodr_pic_idx: u32,
    pub rodr_pic_num: u32,
    // Reference marking.
    pub nopp_flag: u32,
    pub ltrf_flag: u32,
    pub arpm_flag: u32,
    pub mmco4_pre: u32,
    pub mmco_type: [u32; 3],
    pub mmco_param: [u32; 3],
    pub mmco_lt_idx: [u32; 3],
    // Rate control.
    pub rc_en: u32,
    pub aq_en: u32,
    pub aq_mode: u32,
    pub rc_ctu_num: u32,
    pub rc_qp_range: u32,
    pub rc_max_qp: u32,
    pub rc_min_qp: u32,
    pub ctu_target_bits: i32,
    // Intra-prediction cost and RDO switches.
    pub iprd_vthd_y: u32,
    pub iprd_vthd_c: u32,
    pub rdo_rect_size: u32,
    pub rdo_inter_4x4: u32,
    pub rdo_vlc_lmt: u32,
    pub rdo_chrm_spcl: u32,
    pub rdo_mask: u32,
    pub rdo_ccwa_en: u32,
    pub rdo_scl_lst_sel: u32,
    pub rdo_atr_en: u32,
    pub rdo_atf_intra_en: u32,
    // Motion estimation.
    pub cime_srch_h: u32,
    pub cime_srch_v: u32,
    pub rime_srch_h: u32,
    pub rime_srch_v: u32,
    pub dlt_frm_num: u32,
    pub pmv_mdst_h: u32,
    pub pmv_mdst_v: u32,
    pub mv_limit: u32,
    pub pmv_num: u32,
    pub rme_dis: u32,
    pub fme_dis: u32,
    pub lvl4_ovrd_en: u32,
    pub gmv_x: i32,
    pub gmv_y: i32,
    pub cime_linebuf_w: u32,
    pub cime_rama_h: u32,
    pub cime_rama_max: u32,
    // Slice split.
    pub sli_split_en: u32,
    pub sli_split_mode: u32,
    pub sli_split_cpst: u32,
    pub sli_max_num_m1: u32,
    pub sli_flush: u32,
    pub sli_split_cnum_m1: u32,
    pub sli_split_bytes: u32,
    pub sli_crs_en: u32,
    // Addresses (opaque platform handles).
    pub adr_src0: i32,
    pub adr_src1: i32,
    pub adr_src2: i32,
    pub bs_top_addr: i32,
    pub bs_bot_addr: i32,
    pub bs_rd_addr: i32,
    pub bs_wr_addr: i32,
    pub roi_addr: i32,
    pub rfpw_h_addr: i32,
    pub rfpw_b_addr: i32,
    pub dspw_addr: i32,
    pub rfpr_h_addr: i32,
    pub rfpr_b_addr: i32,
    pub dspr_addr: i32,
    pub meiw_addr: i32,
    pub ebuft_addr: i32,
    pub ebufb_addr: i32,
}

// ─── Rate-control lookup block ───────────────────────────────────────────

/// Rate-control lookup tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct RcLutBlock {
    pub chrm_klut_ofst: u32,
    pub klut_wgt: [u32; 24],
    /// QP adjustment per bit-deviation bucket.
    pub qp_adj: [i32; 9],
    /// Bit-deviation bucket thresholds (index 0 negative, rest positive).
    pub bits_thd: [i32; 9],
    pub qpmin_area: [u32; 8],
    pub qpmax_area: [u32; 8],
    pub qpmap_mode: u32,
    pub md_sad_thd: [u32; 3],
    pub madi_thd: [u32; 3],
    pub aq_thrd: [i32; 16],
    pub aq_step: [i32; 16],
    pub madi_mode: u32,
    pub madi_cfg_thd: u32,
}

// ─── Extended tuning block ───────────────────────────────────────────────

/// Lambda tables, intra cost weights and subpel-search tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct TuneBlock {
    pub rdo_lambda: [u32; 52],
    pub iprd_lambda: [u32; 52],
    pub lvl4_intra_cst_thd: [u32; 4],
    pub lvl8_intra_cst_thd: [u32; 4],
    pub lvl8_chrm_intra_cst_thd: [u32; 4],
    pub lvl16_intra_ul_cst_thd: u32,
    pub lvl4_intra_cst_wgt: [u32; 4],
    pub lvl8_intra_cst_wgt: [u32; 4],
    pub lvl8_chrm_intra_cst_wgt: [u32; 4],
    pub lvl16_intra_cst_wgt: [u32; 4],
    pub quant_f_bias_i: u32,
    pub quant_f_bias_p: u32,
    pub atr_thd: [u32; 3],
    pub atr_thd_qp: u32,
    pub atr_wgt16: [u32; 3],
    pub atr_wgt8: [u32; 3],
    pub atr_wgt4: [u32; 3],
    pub cime_sad_mod_sel: u32,
    pub cime_sad_use_big_block: u32,
    pub cime_pmv_set_zero: u32,
    pub cime_pmv_num: u32,
    pub cime_mvd_th: [u32; 3],
    pub cime_multi: [u32; 4],
    pub rime_cime_sad_th: u32,
    pub rime_mvd_th: [u32; 2],
    pub rime_multi: [u32; 3],
    pub fme_cime_sad_pu16_th: u32,
    pub fme_move_lambda: u32,
}

// ─── RDO cost block ──────────────────────────────────────────────────────

/// RDO cost thresholds and weight grids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct RdoBlock {
    pub atf_pskip_en: u32,
    pub intra_cime_thd: [u32; 3],
    pub intra_var_thd: [u32; 8],
    pub intra_atf_wgt: [u32; 12],
    pub skip_cime_thd: [u32; 4],
    pub skip_var_thd: [u32; 8],
    pub skip_atf_wgt: [u32; 13],
}

// ─── Overlay block ───────────────────────────────────────────────────────

/// On-screen-display overlay configuration: up to eight rectangles with
/// per-rect bitmap addresses.  Positions are packed `(y16 << 16) | x16` in
/// 16-pixel units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct OsdBlock {
    pub enable_mask: u32,
    pub inverse_mask: u32,
    pub lt_pos: [u32; 8],
    pub rb_pos: [u32; 8],
    pub addr: [i32; 8],
}

// ─── Status block ────────────────────────────────────────────────────────

/// Read-only post-task status and statistics counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct StatusBlock {
    /// Interrupt status ([`int`] bits).
    pub int_sta: u32,
    /// Encoded stream length in bytes.
    pub bs_len: u32,
    pub sse_l32: u32,
    /// Sum of per-macroblock QP values.
    pub qp_sum: u32,
    /// Sum of mean-absolute-difference activity.
    pub madi_sum: u32,
    /// Number of 16x16 blocks contributing to `madi_sum`.
    pub num_b16: u32,
    /// Number of coarse-search units processed.
    pub num_ctu: u32,
    pub pnum_i4: u32,
    pub pnum_i8: u32,
    pub pnum_i16: u32,
}

// ─── Image ───────────────────────────────────────────────────────────────

/// The complete per-frame register image plus the out-of-band offset list.
#[derive(Clone, Debug, PartialEq)]
pub struct RegisterImage {
    pub ctl: CtlBlock,
    pub base: BaseBlock,
    pub rc_lut: RcLutBlock,
    pub tune: TuneBlock,
    pub rdo: RdoBlock,
    pub osd: OsdBlock,
    pub status: StatusBlock,
    /// Wide-offset registrations collected during synthesis.
    pub offsets: Vec<RegOffset>,
}

impl Default for RegisterImage {
    fn default() -> Self {
        Self {
            ctl: Zeroable::zeroed(),
            base: Zeroable::zeroed(),
            rc_lut: Zeroable::zeroed(),
            tune: Zeroable::zeroed(),
            rdo: Zeroable::zeroed(),
            osd: Zeroable::zeroed(),
            status: Zeroable::zeroed(),
            offsets: Vec::new(),
        }
    }
}

impl RegisterImage {
    /// Reset to the zero baseline at the start of a synthesis pass.
    pub fn clear(&mut self) {
        self.ctl = Zeroable::zeroed();
        self.base = Zeroable::zeroed();
        self.rc_lut = Zeroable::zeroed();
        self.tune = Zeroable::zeroed();
        self.rdo = Zeroable::zeroed();
        self.osd = Zeroable::zeroed();
        self.status = Zeroable::zeroed();
        self.offsets.clear();
    }

    /// Record a wide-offset registration.
    pub fn push_offset(&mut self, index: u32, offset: u32) {
        self.offsets.push(RegOffset { index, offset });
    }
}

/// View a register block as the 32-bit words the dispatcher writes.
pub fn as_words<T: Pod>(block: &T) -> &[u32] {
    bytemuck::cast_slice(bytemuck::bytes_of(block))
}

/// Mutable word view for read-back blocks.
pub fn as_words_mut<T: Pod>(block: &mut T) -> &mut [u32] {
    bytemuck::cast_slice_mut(bytemuck::bytes_of_mut(block))
}
