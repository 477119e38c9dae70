//! Codec syntax: slice/picture/sequence fields, reference-list
//! reordering and reference marking.
//!
//! The reorder and marking queues are consumed through their rewindable
//! cursors, so a repeated synthesis pass over unchanged inputs reads the
//! same instructions again.  The hardware packs at most one reordering
//! instruction and three marking operations per slice; whatever the
//! queues hold beyond that stays unread.

use tracing::error;

use crate::regs::BaseBlock;
use crate::syntax::{MarkingOp, MarkingQueue, Pps, ReorderQueue, SliceHeader, SliceType, Sps};

/// Hardware marking-operation slots per slice.
pub const MMCO_SLOTS: usize = 3;

pub fn setup_codec(
    base: &mut BaseBlock,
    sps: &Sps,
    pps: &Pps,
    slice: &SliceHeader,
    reorder: &mut ReorderQueue,
    marking: &mut MarkingQueue,
) {
    base.enc_std = 0;
    base.cur_frm_ref = u32::from(slice.nal_reference_idc > 0);
    base.bs_scp = 1;

    base.nal_ref_idc = slice.nal_reference_idc;
    base.nal_unit_type = slice.nalu_type;

    base.sps_max_fnum = sps.log2_max_frame_num_minus4;
    base.sps_drct_8x8 = sps.direct8x8_inference;
    base.sps_mpoc_lm4 = sps.log2_max_poc_lsb_minus4;

    base.pps_etpy_mode = pps.entropy_coding_mode;
    base.pps_trns_8x8 = pps.transform_8x8_mode;
    base.pps_csip_flag = pps.constrained_intra_pred;
    base.pps_num_ref0_idx = pps.num_ref_idx_l0_default_active - 1;
    base.pps_num_ref1_idx = pps.num_ref_idx_l1_default_active - 1;
    base.pps_init_qp = pps.pic_init_qp;
    base.pps_cb_ofst = pps.chroma_qp_index_offset;
    base.pps_cr_ofst = pps.second_chroma_qp_index_offset;
    base.pps_wght_pred = pps.weighted_pred;
    base.pps_dbf_cp_flg = pps.deblocking_filter_control;

    base.sli_type = if slice.slice_type == SliceType::I { 2 } else { 0 };
    base.sli_pps_id = slice.pic_parameter_set_id;
    base.sli_drct_smvp = 0;
    base.sli_num_ref_ovrd = slice.num_ref_idx_override;
    base.sli_cbc_init_idc = slice.cabac_init_idc;
    base.sli_frm_num = slice.frame_num;

    base.sli_idr_pid = if slice.slice_type == SliceType::I {
        slice.idr_pic_id
    } else {
        u32::MAX
    };
    base.sli_poc_lsb = slice.pic_order_cnt_lsb;

    base.sli_dis_dblk_idc = slice.disable_deblocking_filter_idc;
    base.sli_alph_ofst = slice.slice_alpha_c0_offset_div2;

    consume_reorder(base, reorder);
    consume_marking(base, slice, marking);
}

/// One reordering instruction at most; absence clears the enable flag.
fn consume_reorder(base: &mut BaseBlock, reorder: &mut ReorderQueue) {
    reorder.rewind();
    match reorder.try_pop() {
        Some(op) => {
            base.ref_list0_rodr = 1;
            base.rodr_pic_idx = op.op;
            match op.op {
                0 | 1 => base.rodr_pic_num = op.abs_diff_pic_num_minus1,
                2 => base.rodr_pic_num = op.long_term_pic_idx,
                other => {
                    error!(op = other, "invalid reordering instruction");
                }
            }
        }
        None => {
            base.ref_list0_rodr = 0;
            base.rodr_pic_idx = 0;
            base.rodr_pic_num = 0;
        }
    }
}

/// Map one marking operation onto its (type, param0, param1) register
/// triple.  Unknown opcodes are coerced to a no-op entry so the queue
/// cursor still advances past them.
fn mmco_args(op: &MarkingOp) -> (u32, u32, u32) {
    match op.op {
        1 => (1, op.difference_of_pic_nums_minus1, 0),
        2 => (2, op.long_term_pic_num, 0),
        3 => (3, op.difference_of_pic_nums_minus1, op.long_term_frame_idx),
        4 => (4, op.max_long_term_frame_idx_plus1, 0),
        5 => (5, 0, 0),
        6 => (6, op.long_term_frame_idx, 0),
        other => {
            error!(op = other, "unsupported marking operation");
            (0, 0, 0)
        }
    }
}

fn consume_marking(base: &mut BaseBlock, slice: &SliceHeader, marking: &mut MarkingQueue) {
    marking.rewind();

    if slice.slice_type == SliceType::I {
        base.nopp_flag = slice.no_output_of_prior_pics;
        base.ltrf_flag = slice.long_term_reference_flag;
        return;
    }

    if marking.is_empty() {
        return;
    }
    base.arpm_flag = 1;

    for slot in 0..MMCO_SLOTS {
        let Some(op) = marking.try_pop() else {
            break;
        };
        let (mmco_type, param0, param1) = mmco_args(&op);
        base.mmco_type[slot] = mmco_type;
        base.mmco_param[slot] = param0;
        base.mmco_lt_idx[slot] = param1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;

    fn sps() -> Sps {
        Sps {
            profile_idc: crate::syntax::PROFILE_HIGH,
            level_idc: 40,
            pic_width_in_mbs: 120,
            pic_height_in_mbs: 68,
            log2_max_frame_num_minus4: 0,
            log2_max_poc_lsb_minus4: 0,
            direct8x8_inference: 1,
        }
    }

    fn pps() -> Pps {
        Pps {
            entropy_coding_mode: 1,
            transform_8x8_mode: 1,
            constrained_intra_pred: 0,
            num_ref_idx_l0_default_active: 1,
            num_ref_idx_l1_default_active: 1,
            pic_init_qp: 26,
            chroma_qp_index_offset: 0,
            second_chroma_qp_index_offset: 0,
            weighted_pred: 0,
            deblocking_filter_control: 1,
            pic_scaling_matrix_present: 0,
        }
    }

    fn slice(slice_type: SliceType) -> SliceHeader {
        SliceHeader {
            slice_type,
            nal_reference_idc: 1,
            nalu_type: if slice_type == SliceType::I { 5 } else { 1 },
            pic_parameter_set_id: 0,
            frame_num: 3,
            idr_pic_id: 7,
            pic_order_cnt_lsb: 6,
            num_ref_idx_override: 0,
            cabac_init_idc: 0,
            disable_deblocking_filter_idc: 0,
            slice_alpha_c0_offset_div2: 0,
            no_output_of_prior_pics: 0,
            long_term_reference_flag: 1,
        }
    }

    fn mmco(op: u32) -> MarkingOp {
        MarkingOp {
            op,
            difference_of_pic_nums_minus1: 11,
            long_term_pic_num: 22,
            long_term_frame_idx: 33,
            max_long_term_frame_idx_plus1: 44,
        }
    }

    #[test]
    fn idr_pid_is_all_ones_for_p_slices() {
        let mut base = BaseBlock::zeroed();
        let mut reorder = ReorderQueue::default();
        let mut marking = MarkingQueue::default();
        setup_codec(
            &mut base,
            &sps(),
            &pps(),
            &slice(SliceType::P),
            &mut reorder,
            &mut marking,
        );
        assert_eq!(base.sli_idr_pid, u32::MAX);
        assert_eq!(base.sli_type, 0);

        setup_codec(
            &mut base,
            &sps(),
            &pps(),
            &slice(SliceType::I),
            &mut reorder,
            &mut marking,
        );
        assert_eq!(base.sli_idr_pid, 7);
        assert_eq!(base.sli_type, 2);
    }

    #[test]
    fn reorder_present_packs_opcode_and_magnitude() {
        let mut base = BaseBlock::zeroed();
        let mut reorder = ReorderQueue::new(vec![crate::syntax::ReorderOp {
            op: 2,
            abs_diff_pic_num_minus1: 5,
            long_term_pic_idx: 9,
        }]);
        consume_reorder(&mut base, &mut reorder);
        assert_eq!(base.ref_list0_rodr, 1);
        assert_eq!(base.rodr_pic_idx, 2);
        assert_eq!(base.rodr_pic_num, 9);
    }

    #[test]
    fn reorder_absent_clears_fields() {
        let mut base = BaseBlock::zeroed();
        base.ref_list0_rodr = 1;
        base.rodr_pic_num = 3;
        consume_reorder(&mut base, &mut ReorderQueue::default());
        assert_eq!(base.ref_list0_rodr, 0);
        assert_eq!(base.rodr_pic_num, 0);
    }

    #[test]
    fn i_slice_sets_only_idr_marking_flags() {
        let mut base = BaseBlock::zeroed();
        let mut marking = MarkingQueue::new(vec![mmco(1)]);
        consume_marking(&mut base, &slice(SliceType::I), &mut marking);
        assert_eq!(base.ltrf_flag, 1);
        assert_eq!(base.arpm_flag, 0);
        assert_eq!(base.mmco_type, [0; 3]);
        assert!(!marking.is_empty(), "I slices leave the queue unread");
    }

    #[test]
    fn marking_queue_maps_opcodes_into_slots() {
        // Opcodes [2, 1] land in slots 0 and 1, slot 2
        // stays zero.
        let mut base = BaseBlock::zeroed();
        let mut marking = MarkingQueue::new(vec![mmco(2), mmco(1)]);
        consume_marking(&mut base, &slice(SliceType::P), &mut marking);

        assert_eq!(base.arpm_flag, 1);
        assert_eq!(base.mmco_type[0], 2);
        assert_eq!(base.mmco_param[0], 22, "long_term_pic_num");
        assert_eq!(base.mmco_type[1], 1);
        assert_eq!(base.mmco_param[1], 11, "difference_of_pic_nums_minus1");
        assert_eq!(base.mmco_type[2], 0);
        assert_eq!(base.mmco_param[2], 0);
        assert!(marking.is_empty());
    }

    #[test]
    fn marking_consumes_at_most_three() {
        let mut base = BaseBlock::zeroed();
        let mut marking = MarkingQueue::new(vec![mmco(1), mmco(2), mmco(6), mmco(4)]);
        consume_marking(&mut base, &slice(SliceType::P), &mut marking);
        assert_eq!(base.mmco_type, [1, 2, 6]);
        assert!(!marking.is_empty(), "fourth entry stays queued");
    }

    #[test]
    fn mmco3_carries_both_params() {
        let (t, p0, p1) = mmco_args(&mmco(3));
        assert_eq!((t, p0, p1), (3, 11, 33));
    }

    #[test]
    fn unknown_opcode_becomes_noop_but_is_consumed() {
        let mut base = BaseBlock::zeroed();
        let mut marking = MarkingQueue::new(vec![mmco(9), mmco(2)]);
        consume_marking(&mut base, &slice(SliceType::P), &mut marking);
        assert_eq!(base.mmco_type[0], 0, "coerced to no-op");
        assert_eq!(base.mmco_type[1], 2, "cursor advanced past the bad entry");
        assert!(marking.is_empty());
    }
}
