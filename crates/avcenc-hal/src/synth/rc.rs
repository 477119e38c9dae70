//! Rate-control budgeting, lookup tables and RDO tuning.
//!
//! The per-unit bit budget is kept in a 4-bit fixed-point register; the
//! scaled value is clamped to a safety ceiling so small pictures with
//! large bit targets cannot overflow the field.  The under/over budget
//! thresholds derive from the unscaled per-row target.

use crate::cfg::HwCfg;
use crate::regs::{BaseBlock, RcLutBlock, RdoBlock, TuneBlock};
use crate::syntax::{Pps, SliceHeader, SliceType, Sps, LEVEL_3_0, PROFILE_BASELINE, PROFILE_MAIN};
use crate::tables::{KLUT_TAB_LEN, KLUT_WEIGHT, LAMBDA, LAMBDA_TAB_LEN, LAMBDA_TAB_START};
use crate::task::RcTaskInfo;

/// Scaled per-unit targets at or above this value clamp to
/// [`TARGET_BITS_CLAMP`].
pub const TARGET_BITS_CEILING: i32 = 0x100000;

/// Replacement value for out-of-range per-unit targets.
pub const TARGET_BITS_CLAMP: i32 = 0x50000;

/// Rate-control base: QP bounds, per-unit budget and deviation tables.
pub fn setup_rc_base(
    base: &mut BaseBlock,
    rc_lut: &mut RcLutBlock,
    sps: &Sps,
    slice: &SliceHeader,
    hw: &HwCfg,
    rc: &RcTaskInfo,
) {
    let mb_w = sps.pic_width_in_mbs;
    let mb_h = sps.pic_height_in_mbs;

    let mut mb_target_bits_mul_16 = (rc.bit_target << 4) / (mb_w * mb_h);
    if mb_target_bits_mul_16 >= TARGET_BITS_CEILING {
        mb_target_bits_mul_16 = TARGET_BITS_CLAMP;
    }

    let mb_target_bits = (mb_target_bits_mul_16 * mb_w) >> 4;
    let negative_bits_thd = -(mb_target_bits / 4);
    let positive_bits_thd = mb_target_bits / 4;

    base.pic_qp = rc.quality_target;

    base.rc_en = 1;
    base.aq_en = 1;
    base.aq_mode = 0;
    base.rc_ctu_num = mb_w as u32;

    base.rc_qp_range = if slice.slice_type == SliceType::I {
        hw.qp_delta_row_i
    } else {
        hw.qp_delta_row
    };
    base.rc_max_qp = rc.quality_max;
    base.rc_min_qp = rc.quality_min;

    base.ctu_target_bits = mb_target_bits_mul_16;

    rc_lut.qp_adj = [-1, 0, 0, 0, 0, 0, 0, 0, 1];

    rc_lut.bits_thd[0] = negative_bits_thd;
    for thd in rc_lut.bits_thd[1..].iter_mut() {
        *thd = positive_bits_thd;
    }

    // QP bounds apply uniformly across all region classes.
    rc_lut.qpmin_area = [rc.quality_min; 8];
    rc_lut.qpmax_area = [rc.quality_max; 8];
    rc_lut.qpmap_mode = 1;

    rc_lut.md_sad_thd = [25, 25, 25];
    rc_lut.madi_thd = [25, 25, 25];

    if slice.slice_type == SliceType::I {
        rc_lut.aq_thrd = hw.aq_thrd_i;
        rc_lut.aq_step = hw.aq_step_i;
    } else {
        rc_lut.aq_thrd = hw.aq_thrd_p;
        rc_lut.aq_step = hw.aq_step_p;
    }
}

/// Slice-type-conditioned prediction tuning and profile-derived RDO
/// switches.
pub fn setup_rdo_pred(
    base: &mut BaseBlock,
    rc_lut: &mut RcLutBlock,
    sps: &Sps,
    pps: &Pps,
    slice: &SliceHeader,
) {
    let klut_start = if slice.slice_type == SliceType::I {
        rc_lut.chrm_klut_ofst = 0;
        0
    } else {
        rc_lut.chrm_klut_ofst = 3;
        4
    };
    rc_lut
        .klut_wgt
        .copy_from_slice(&KLUT_WEIGHT[klut_start..klut_start + KLUT_TAB_LEN]);

    base.iprd_vthd_y = 9;
    base.iprd_vthd_c = 63;

    // Baseline at low levels only signals small partitions.
    base.rdo_rect_size = u32::from(
        sps.profile_idc == PROFILE_BASELINE && sps.level_idc <= LEVEL_3_0,
    );
    base.rdo_inter_4x4 = 0;
    base.rdo_vlc_lmt =
        u32::from(sps.profile_idc < PROFILE_MAIN && pps.entropy_coding_mode == 0);
    base.rdo_chrm_spcl = 1;
    base.rdo_mask = 24;
    base.rdo_ccwa_en = 1;
    base.rdo_scl_lst_sel = pps.pic_scaling_matrix_present;
    base.rdo_atr_en = 1;
    base.rdo_atf_intra_en = 1;
}

/// Static RDO cost thresholds and weight grids.
pub fn setup_rdo_tables(rdo: &mut RdoBlock) {
    rdo.atf_pskip_en = 1;

    rdo.intra_cime_thd = [20, 40, 72];
    rdo.intra_var_thd = [25, 64, 25, 64, 70, 100, 70, 100];
    rdo.intra_atf_wgt = [28, 27, 26, 26, 25, 24, 22, 20, 19, 16, 16, 16];

    rdo.skip_cime_thd = [10, 10, 15, 25];
    rdo.skip_var_thd = [25, 40, 25, 40, 70, 100, 70, 100];
    rdo.skip_atf_wgt = [18, 13, 14, 14, 14, 15, 15, 15, 15, 16, 16, 16, 16];
}

/// Extended tuning: lambda tables, intra cost model, subpel search.
pub fn setup_tune(tune: &mut TuneBlock, rc_lut: &mut RcLutBlock, slice: &SliceHeader) {
    tune.rdo_lambda
        .copy_from_slice(&LAMBDA[LAMBDA_TAB_START..LAMBDA_TAB_START + LAMBDA_TAB_LEN]);
    tune.iprd_lambda = [0; 52];

    rc_lut.madi_mode = 0;
    rc_lut.madi_cfg_thd = 25;

    tune.lvl4_intra_cst_thd = [1, 4, 9, 36];
    tune.lvl8_intra_cst_thd = [1, 4, 9, 36];
    tune.lvl8_chrm_intra_cst_thd = [1, 4, 9, 36];
    tune.lvl16_intra_ul_cst_thd = 0;

    tune.lvl8_intra_cst_wgt = [48, 60, 40, 48];
    tune.lvl4_intra_cst_wgt = [48, 60, 40, 48];
    tune.lvl16_intra_cst_wgt = [48, 60, 40, 48];
    tune.lvl8_chrm_intra_cst_wgt = [36, 42, 28, 32];

    tune.quant_f_bias_i = 683;
    tune.quant_f_bias_p = 341;

    if slice.slice_type == SliceType::I {
        tune.atr_thd = [1, 4, 36];
        tune.atr_wgt16 = [16, 16, 16];
        tune.atr_wgt8 = [32, 32, 32];
        tune.atr_wgt4 = [20, 18, 16];
    } else {
        tune.atr_thd = [1, 4, 49];
        tune.atr_wgt16 = [16, 17, 17];
        tune.atr_wgt8 = [31, 31, 31];
        tune.atr_wgt4 = [21, 19, 17];
    }
    tune.atr_thd_qp = 32;

    // Coarse integer search quality.
    tune.cime_sad_mod_sel = 0;
    tune.cime_sad_use_big_block = 1;
    tune.cime_pmv_set_zero = 1;
    tune.cime_pmv_num = 3;
    tune.cime_mvd_th = [32, 80, 128];
    tune.cime_multi = [16, 32, 96, 96];

    // Refinement and fractional search quality.
    tune.rime_cime_sad_th = 50;
    tune.rime_mvd_th = [3, 8];
    tune.rime_multi = [16, 16, 128];
    tune.fme_cime_sad_pu16_th = 30;
    tune.fme_move_lambda = 1;
}
