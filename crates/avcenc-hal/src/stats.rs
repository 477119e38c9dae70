//! Status register decode into rate-control feedback.
//!
//! The hardware reports raw counters; rate control wants normalized
//! signals.  Block-count divisors are hardware-reported and may be zero
//! on degenerate frames, in which case the affected metric is defined as
//! zero.

use crate::regs::StatusBlock;

/// Decoded rate-control feedback for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RcFeedback {
    /// Realized stream size in bits.
    pub bit_real: i32,
    /// Average macroblock QP.
    pub quality_real: u32,
    /// Intra-activity metric, normalized per 16x16 block.
    pub madi: u32,
    /// Prediction-activity metric, normalized per coarse-search unit.
    pub madp: u32,
    /// Intra-coded block share as a fixed-point fraction of the picture
    /// (256 = whole picture).
    pub iblk4_prop: u32,
}

/// Decode one frame's status block.
///
/// `hw_length` is the measured hardware stream length in bytes (already
/// accumulated across partial runs); `mb_count` the picture size in
/// macroblocks.
pub fn decode(status: &StatusBlock, hw_length: usize, mb_count: u32) -> RcFeedback {
    let madi = if status.num_b16 == 0 {
        0
    } else {
        status.madi_sum / status.num_b16
    };
    let madp = if status.num_ctu == 0 {
        0
    } else {
        status.madi_sum / status.num_ctu
    };

    RcFeedback {
        bit_real: (hw_length * 8) as i32,
        quality_real: status.qp_sum / mb_count,
        madi,
        madp,
        iblk4_prop: (status.pnum_i4 + status.pnum_i8 + status.pnum_i16) * 256 / mb_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;

    #[test]
    fn decodes_basic_signals() {
        let mut st = StatusBlock::zeroed();
        st.bs_len = 1000;
        st.qp_sum = 8160 * 30;
        st.madi_sum = 900;
        st.num_b16 = 300;
        st.num_ctu = 100;
        st.pnum_i4 = 100;
        st.pnum_i8 = 50;
        st.pnum_i16 = 54;

        let fb = decode(&st, st.bs_len as usize, 8160);
        assert_eq!(fb.bit_real, 8000);
        assert_eq!(fb.quality_real, 30);
        assert_eq!(fb.madi, 3);
        assert_eq!(fb.madp, 9);
        assert_eq!(fb.iblk4_prop, (100 + 50 + 54) * 256 / 8160);
    }

    #[test]
    fn zero_block_counts_zero_the_metrics() {
        let mut st = StatusBlock::zeroed();
        st.madi_sum = 500;
        let fb = decode(&st, 0, 8160);
        assert_eq!(fb.madi, 0);
        assert_eq!(fb.madp, 0);
        assert_eq!(fb.bit_real, 0);
    }

    #[test]
    fn whole_picture_intra_is_full_scale() {
        let mut st = StatusBlock::zeroed();
        st.pnum_i16 = 8160;
        let fb = decode(&st, 0, 8160);
        assert_eq!(fb.iblk4_prop, 256);
    }
}
