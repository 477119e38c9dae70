//! Typed syntax descriptors delivered by the upstream encoder.
//!
//! The upstream encoder owns AVC semantics (building SPS/PPS/slice
//! headers, reference decisions); this driver only consumes the results.
//! Each descriptor kind arrives independently, at most once per frame,
//! and replaces its predecessor wholesale; stale descriptors persist
//! until replaced.
//!
//! Reordering and marking instructions come as bounded queues read through
//! an explicit rewindable cursor, so the same queue can be emptiness-
//! checked between pops and re-read on a second synthesis pass.

use serde::{Deserialize, Serialize};

use crate::cfg::EncCfg;

// ─── Profile / level ─────────────────────────────────────────────────────

pub const PROFILE_BASELINE: u32 = 66;
pub const PROFILE_MAIN: u32 = 77;
pub const PROFILE_HIGH: u32 = 100;

pub const LEVEL_1_0: u32 = 10;
pub const LEVEL_1_B: u32 = 9;
pub const LEVEL_1_1: u32 = 11;
pub const LEVEL_2_0: u32 = 20;
pub const LEVEL_3_0: u32 = 30;

// ─── Sequence / picture parameter sets ───────────────────────────────────

/// Sequence parameter set fields the hardware consumes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sps {
    pub profile_idc: u32,
    pub level_idc: u32,
    pub pic_width_in_mbs: i32,
    pub pic_height_in_mbs: i32,
    pub log2_max_frame_num_minus4: u32,
    pub log2_max_poc_lsb_minus4: u32,
    pub direct8x8_inference: u32,
}

/// Picture parameter set fields the hardware consumes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pps {
    pub entropy_coding_mode: u32,
    pub transform_8x8_mode: u32,
    pub constrained_intra_pred: u32,
    pub num_ref_idx_l0_default_active: u32,
    pub num_ref_idx_l1_default_active: u32,
    pub pic_init_qp: u32,
    pub chroma_qp_index_offset: i32,
    pub second_chroma_qp_index_offset: i32,
    pub weighted_pred: u32,
    pub deblocking_filter_control: u32,
    pub pic_scaling_matrix_present: u32,
}

// ─── Slice header ────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliceType {
    I,
    P,
}

/// Slice header fields the hardware consumes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SliceHeader {
    pub slice_type: SliceType,
    pub nal_reference_idc: u32,
    pub nalu_type: u32,
    pub pic_parameter_set_id: u32,
    pub frame_num: u32,
    pub idr_pic_id: u32,
    pub pic_order_cnt_lsb: u32,
    pub num_ref_idx_override: u32,
    pub cabac_init_idc: u32,
    pub disable_deblocking_filter_idc: u32,
    pub slice_alpha_c0_offset_div2: i32,
    /// IDR only: no_output_of_prior_pics_flag.
    pub no_output_of_prior_pics: u32,
    /// IDR only: long_term_reference_flag.
    pub long_term_reference_flag: u32,
}

// ─── Frame topology ──────────────────────────────────────────────────────

/// Which pool slots hold the current reconstruction and its reference.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FrameTopology {
    /// Pool slot receiving this frame's reconstruction.
    pub curr_idx: usize,
    /// Pool slot holding the reference picture.
    pub refr_idx: usize,
    /// Session-wide frame sequence counter.
    pub seq_idx: u32,
}

// ─── Reordering queue ────────────────────────────────────────────────────

/// One reference-list modification instruction.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ReorderOp {
    /// modification_of_pic_nums_idc (0/1 short-term, 2 long-term).
    pub op: u32,
    pub abs_diff_pic_num_minus1: u32,
    pub long_term_pic_idx: u32,
}

/// Bounded reorder queue with an explicit read cursor.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReorderQueue {
    ops: Vec<ReorderOp>,
    #[serde(skip)]
    cursor: usize,
}

impl ReorderQueue {
    pub fn new(ops: Vec<ReorderOp>) -> Self {
        Self { ops, cursor: 0 }
    }

    /// Reset the read cursor to the start of the queue.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Pop the instruction under the cursor, if any.
    pub fn try_pop(&mut self) -> Option<ReorderOp> {
        let op = self.ops.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(op)
    }

    pub fn is_empty(&self) -> bool {
        self.cursor >= self.ops.len()
    }
}

// ─── Marking queue ───────────────────────────────────────────────────────

/// One memory-management control operation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MarkingOp {
    /// memory_management_control_operation (1..=6).
    pub op: u32,
    pub difference_of_pic_nums_minus1: u32,
    pub long_term_pic_num: u32,
    pub long_term_frame_idx: u32,
    pub max_long_term_frame_idx_plus1: u32,
}

/// Bounded marking queue with an explicit read cursor.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MarkingQueue {
    ops: Vec<MarkingOp>,
    #[serde(skip)]
    cursor: usize,
}

impl MarkingQueue {
    pub fn new(ops: Vec<MarkingOp>) -> Self {
        Self { ops, cursor: 0 }
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn try_pop(&mut self) -> Option<MarkingOp> {
        let op = self.ops.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(op)
    }

    pub fn is_empty(&self) -> bool {
        self.cursor >= self.ops.len()
    }
}

// ─── Prefix NAL info ─────────────────────────────────────────────────────

/// Prefix NAL payload for layered streams.  Stored for completeness; this
/// accelerator generation emits the prefix from the software bitstream
/// path, so nothing in the register image consumes it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PrefixInfo {
    pub idr_flag: u32,
    pub priority_id: u32,
    pub temporal_id: u32,
}

// ─── Tagged updates ──────────────────────────────────────────────────────

/// One per-frame syntax update from the upstream encoder.
///
/// `Unknown` carries tags from newer upstream revisions; ingest logs and
/// ignores them without failing the frame.
#[derive(Clone, Debug)]
pub enum SyntaxUpdate {
    Cfg(Box<EncCfg>),
    Sps(Sps),
    Pps(Pps),
    Slice(SliceHeader),
    Frames(FrameTopology),
    Reorder(ReorderQueue),
    Marking(MarkingQueue),
    Prefix(PrefixInfo),
    Unknown(u32),
}

impl SyntaxUpdate {
    /// Short tag name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Cfg(_) => "cfg",
            Self::Sps(_) => "sps",
            Self::Pps(_) => "pps",
            Self::Slice(_) => "slice",
            Self::Frames(_) => "frames",
            Self::Reorder(_) => "reorder",
            Self::Marking(_) => "marking",
            Self::Prefix(_) => "prefix",
            Self::Unknown(_) => "unknown",
        }
    }
}
