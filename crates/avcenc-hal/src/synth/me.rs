//! Motion-search ranges and on-chip search-cache sizing.
//!
//! Search extents start from the level-mandated vertical MV range, then
//! shrink to fit the engine window and the picture itself.  From the
//! final extents the coarse-search line buffer width and cache height are
//! derived; the cache-height growth loop is hardware-tuned and its
//! arithmetic must be preserved exactly, including the one-unit special
//! case and the post-loop shrink.

use crate::regs::BaseBlock;
use crate::syntax::{SliceHeader, SliceType, Sps, LEVEL_1_0, LEVEL_1_B};

/// Coarse-search engine window, in pixels.
const CIME_WIN_W: i32 = 176;
const CIME_WIN_H: i32 = 112;

/// On-chip search cache budget, in 64-byte units.
const CIME_CACHE_BUDGET: i32 = 2464;

pub fn setup_me(base: &mut BaseBlock, sps: &Sps, slice: &SliceHeader) {
    let mut cime_blk_w_max: i32 = 44;

    // Levels 1 and 1b mandate a [-64, +63.75] vertical MV range; levels
    // 1.1 through 2 allow [-128, +127.75].
    let mut cime_blk_h_max: i32 = match sps.level_idc {
        LEVEL_1_0 | LEVEL_1_B => 12,
        _ => 28,
    };

    if CIME_WIN_W < cime_blk_w_max * 4 {
        cime_blk_w_max = CIME_WIN_W / 4;
    }
    if CIME_WIN_H < cime_blk_h_max * 4 {
        cime_blk_h_max = CIME_WIN_H / 4;
    }

    // Clamp against the picture itself.
    let mb_w = sps.pic_width_in_mbs;
    let mb_h = sps.pic_height_in_mbs;
    if cime_blk_w_max / 4 * 2 > (mb_w * 2 + 1) / 2 {
        cime_blk_w_max = (mb_w * 2 + 1) / 2 / 2 * 4;
    }
    let aligned_pic_h = avcenc_core::types::align_i32(mb_h * 16, 64);
    if cime_blk_h_max / 4 > aligned_pic_h / 128 * 4 {
        cime_blk_h_max = aligned_pic_h / 128 * 16;
    }

    base.cime_srch_h = (cime_blk_w_max / 4) as u32;
    base.cime_srch_v = (cime_blk_h_max / 4) as u32;
    base.rime_srch_h = 7;
    base.rime_srch_v = 5;
    base.dlt_frm_num = 0;

    if slice.slice_type == SliceType::I {
        base.pmv_mdst_h = 0;
        base.pmv_mdst_v = 0;
    } else {
        base.pmv_mdst_h = 5;
        base.pmv_mdst_v = 5;
    }
    base.mv_limit = if sps.level_idc > 20 {
        2
    } else if sps.level_idc >= 11 {
        1
    } else {
        0
    };
    base.pmv_num = 2;
    base.rme_dis = 0;
    base.fme_dis = 0;
    base.lvl4_ovrd_en = 0;

    calc_cime_cache(base, sps);
}

/// Line-buffer width and cache height for the coarse search.
///
/// Faithful port of the hardware-tuned sizing; do not "simplify" the
/// growth loop, its termination depends on the interplay of the shrinking
/// `ramb_h` term and the cache budget.
fn calc_cime_cache(base: &mut BaseBlock, sps: &Sps) {
    let x_gmv = base.gmv_x;
    let y_gmv = base.gmv_y;
    let srch_w = base.cime_srch_h as i32 * 4;
    let srch_h = base.cime_srch_v as i32 * 4;
    let pic_wd64 = ((sps.pic_width_in_mbs + 1) * 8 + 63) / 64;

    // Line-buffer width: search window extent across the picture, in
    // 64-pixel columns, clipped to picture bounds.
    let mut frm_sta = if x_gmv - srch_w < 0 {
        (x_gmv - srch_w - 15) / 16
    } else {
        (x_gmv - srch_w) / 16
    };
    frm_sta = frm_sta.clamp(0, pic_wd64 - 1);

    let mut frm_end = if x_gmv + srch_w < 0 {
        pic_wd64 - 1 + (x_gmv + srch_w) / 16
    } else {
        pic_wd64 - 1 + (x_gmv + srch_w + 15) / 16
    };
    frm_end = frm_end.clamp(0, pic_wd64 - 1);

    let pic_w = (frm_end - frm_sta + 1) * 64;
    let linebuf_w = (if pic_w != 0 { pic_w } else { 64 }) / 64;
    base.cime_linebuf_w = linebuf_w as u32;

    // Cache height: grow one row unit at a time while the search window
    // is uncovered and the footprint stays under budget.
    let ctu_4_h: i32 = 1;
    let mut cime_cacha_h = ctu_4_h;

    let mut cur_srch_16_w = if x_gmv % 16 - srch_w % 16 < 0 {
        (16 + (x_gmv % 16 - srch_w % 16) % 16 + srch_w * 2 + 15) / 16 + 1
    } else {
        ((x_gmv % 16 - srch_w % 16) % 16 + srch_w * 2 + 15) / 16 + 1
    };
    let cur_srch_4_h = if y_gmv % 4 - srch_h % 4 < 0 {
        (4 + (y_gmv % 4 - srch_h % 4) % 4 + srch_h * 2 + 3) / 4 + ctu_4_h
    } else {
        ((y_gmv % 4 - srch_h % 4) % 4 + srch_h * 2 + 3) / 4 + ctu_4_h
    };
    let cur_srch_max = cur_srch_4_h;

    if linebuf_w < cur_srch_16_w {
        cur_srch_16_w = linebuf_w;
    }

    let mut ramb_h = cur_srch_4_h;
    while cime_cacha_h < cur_srch_max
        && CIME_CACHE_BUDGET
            > (cime_cacha_h - ctu_4_h) * linebuf_w * 4 + ramb_h * 4 * cur_srch_16_w
    {
        cime_cacha_h += ctu_4_h;
        if ramb_h > 2 * ctu_4_h {
            ramb_h -= ctu_4_h;
        } else {
            ramb_h = ctu_4_h;
        }
    }

    if cur_srch_4_h == ctu_4_h {
        cime_cacha_h += ctu_4_h;
        ramb_h = 0;
    }

    if CIME_CACHE_BUDGET < (cime_cacha_h - ctu_4_h) * linebuf_w * 4 + ramb_h * 4 * cur_srch_16_w {
        cime_cacha_h -= ctu_4_h;
    }
    base.cime_rama_h = cime_cacha_h as u32;

    let ram_col_h = (cime_cacha_h - ctu_4_h) / ctu_4_h;
    base.cime_rama_max = (ram_col_h * linebuf_w + cur_srch_16_w) as u32;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::PROFILE_HIGH;
    use bytemuck::Zeroable;

    fn sps(mb_w: i32, mb_h: i32, level_idc: u32) -> Sps {
        Sps {
            profile_idc: PROFILE_HIGH,
            level_idc,
            pic_width_in_mbs: mb_w,
            pic_height_in_mbs: mb_h,
            log2_max_frame_num_minus4: 0,
            log2_max_poc_lsb_minus4: 0,
            direct8x8_inference: 1,
        }
    }

    fn p_slice() -> SliceHeader {
        SliceHeader {
            slice_type: SliceType::P,
            nal_reference_idc: 1,
            nalu_type: 1,
            pic_parameter_set_id: 0,
            frame_num: 1,
            idr_pic_id: 0,
            pic_order_cnt_lsb: 2,
            num_ref_idx_override: 0,
            cabac_init_idc: 0,
            disable_deblocking_filter_idc: 0,
            slice_alpha_c0_offset_div2: 0,
            no_output_of_prior_pics: 0,
            long_term_reference_flag: 0,
        }
    }

    #[test]
    fn search_range_1080p_level40() {
        let mut base = BaseBlock::zeroed();
        setup_me(&mut base, &sps_l40(120, 68), &p_slice());
        assert_eq!(base.cime_srch_h, 11);
        assert_eq!(base.cime_srch_v, 7);
        assert_eq!(base.mv_limit, 2);
        assert_eq!((base.pmv_mdst_h, base.pmv_mdst_v), (5, 5));
    }

    fn sps_l40(mb_w: i32, mb_h: i32) -> Sps {
        sps(mb_w, mb_h, 40)
    }

    #[test]
    fn low_levels_shrink_vertical_range() {
        let mut base = BaseBlock::zeroed();
        setup_me(&mut base, &sps(40, 30, LEVEL_1_0), &p_slice());
        assert_eq!(base.cime_srch_v, 3, "12 quarter-blocks at level 1");
        assert_eq!(base.mv_limit, 0);

        setup_me(&mut base, &sps(40, 30, 11), &p_slice());
        assert_eq!(base.cime_srch_v, 7);
        assert_eq!(base.mv_limit, 1);
    }

    #[test]
    fn tiny_pictures_clamp_both_extents() {
        let mut base = BaseBlock::zeroed();
        // 4x4 macroblocks (64x64 pixels).
        setup_me(&mut base, &sps_l40(4, 4), &p_slice());
        // Width clamp: (4*2+1)/2/2*4 = 8 -> 2 quarter-blocks.
        assert_eq!(base.cime_srch_h, 2);
        // Height clamp: align(64,64)/128*16 = 0.
        assert_eq!(base.cime_srch_v, 0);
    }

    #[test]
    fn cime_cache_1080p_reference_values() {
        // Hand-computed against the sizing arithmetic for a 1920x1080
        // picture with zero global motion: linebuf 16 columns, cache
        // grows to the full 15-unit search height, 231 cache slots.
        let mut base = BaseBlock::zeroed();
        setup_me(&mut base, &sps_l40(120, 68), &p_slice());
        assert_eq!(base.cime_linebuf_w, 16);
        assert_eq!(base.cime_rama_h, 15);
        assert_eq!(base.cime_rama_max, 14 * 16 + 7);
    }

    #[test]
    fn cime_cache_single_unit_special_case() {
        // A one-macroblock-high picture collapses the required search
        // height to one unit; the loop is skipped and one growth step is
        // forced.
        let mut base = BaseBlock::zeroed();
        setup_me(&mut base, &sps_l40(8, 1), &p_slice());
        // srch_v clamped to 0 -> cur_srch_4_h == 1.
        assert_eq!(base.cime_srch_v, 0);
        assert_eq!(base.cime_rama_h, 2);
    }

    #[test]
    fn cime_cache_stays_within_budget_on_wide_pictures() {
        let mut base = BaseBlock::zeroed();
        // 4096-wide picture: 33 line-buffer columns.
        setup_me(&mut base, &sps_l40(256, 160), &p_slice());
        let h = base.cime_rama_h as i32;
        let w = base.cime_linebuf_w as i32;
        // Post-shrink invariant: the chosen footprint fits the budget
        // (ramb_h has collapsed to one unit by then).
        assert!((h - 1) * w * 4 + 4 * 7 <= CIME_CACHE_BUDGET);
    }

    #[test]
    fn synthesis_is_deterministic() {
        let mut a = BaseBlock::zeroed();
        let mut b = BaseBlock::zeroed();
        setup_me(&mut a, &sps_l40(120, 68), &p_slice());
        setup_me(&mut b, &sps_l40(120, 68), &p_slice());
        assert_eq!(a, b);
    }
}
