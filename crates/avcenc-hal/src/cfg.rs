//! Session configuration.
//!
//! These structs describe everything about a session that is not per-frame
//! syntax: source picture geometry and format, slice-split policy, the
//! hardware tuning knobs the rate-control tables read, and the reference
//! topology the buffer pool is sized from.  All of them serialize, so a
//! session setup can be captured and replayed against the mock device.

use serde::{Deserialize, Serialize};

use avcenc_core::types::{CscCoeffs, PixelFormat};

use crate::tables::{AQ_STEP_I_DEFAULT, AQ_STEP_P_DEFAULT, AQ_THRD_DEFAULT};

/// Source picture preparation: geometry, strides, format, orientation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrepCfg {
    /// Picture width in pixels.
    pub width: i32,
    /// Picture height in pixels.
    pub height: i32,
    /// Luma row stride in bytes (`0` = derive from width).
    pub hor_stride: i32,
    /// Plane vertical stride in rows (`0` = derive from height).
    pub ver_stride: i32,
    /// Source pixel format.
    pub format: PixelFormat,
    /// Source is framebuffer-compressed.
    pub fbc: bool,
    /// Horizontal mirror before encoding.
    pub mirroring: bool,
    /// Rotation code (0/1/2/3 = 0/90/180/270 degrees).
    pub rotation: u32,
    /// Color-conversion coefficients for non-standard sources.
    /// `None` selects the fixed BT.601 set.
    pub custom_csc: Option<CscCoeffs>,
    /// Geometry or format changed since the last `prepare` pass.
    pub dirty: bool,
}

impl PrepCfg {
    pub fn new(width: i32, height: i32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            hor_stride: 0,
            ver_stride: 0,
            format,
            fbc: false,
            mirroring: false,
            rotation: 0,
            custom_csc: None,
            dirty: true,
        }
    }

    /// Effective luma stride in bytes.
    pub fn luma_stride(&self) -> i32 {
        if self.hor_stride != 0 {
            self.hor_stride
        } else {
            self.width
        }
    }

    /// Effective vertical stride in rows.
    pub fn vert_stride(&self) -> i32 {
        if self.ver_stride != 0 {
            self.ver_stride
        } else {
            self.height
        }
    }
}

/// Slice-split policy requested by the caller.
///
/// A forced macroblock-row split overrides this whenever the picture is
/// wider than 1920 pixels; see the synthesizer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitMode {
    /// One slice per picture.
    #[default]
    None,
    /// Split when a slice reaches the configured byte count.
    ByBytes,
    /// Split every configured number of macroblocks.
    ByMbCount,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SplitCfg {
    pub mode: SplitMode,
    /// Byte count or macroblock count, depending on `mode`.
    pub arg: u32,
}

/// Hardware tuning knobs consumed by rate-control synthesis.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HwCfg {
    /// Per-row QP delta allowed on I slices.
    pub qp_delta_row_i: u32,
    /// Per-row QP delta allowed on P slices.
    pub qp_delta_row: u32,
    /// Adaptive-quantization activity thresholds, I slices.
    pub aq_thrd_i: [i32; 16],
    /// Adaptive-quantization activity thresholds, P slices.
    pub aq_thrd_p: [i32; 16],
    /// Adaptive-quantization QP steps, I slices.
    pub aq_step_i: [i32; 16],
    /// Adaptive-quantization QP steps, P slices.
    pub aq_step_p: [i32; 16],
}

impl Default for HwCfg {
    fn default() -> Self {
        Self {
            qp_delta_row_i: 0,
            qp_delta_row: 1,
            aq_thrd_i: AQ_THRD_DEFAULT,
            aq_thrd_p: AQ_THRD_DEFAULT,
            aq_step_i: AQ_STEP_I_DEFAULT,
            aq_step_p: AQ_STEP_P_DEFAULT,
        }
    }
}

/// Reference topology summary: how deep the decoded-picture buffer is.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct RefCfg {
    /// Decoded-picture-buffer size from the active reference structure.
    pub dpb_size: i32,
}

/// Complete session configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncCfg {
    pub prep: PrepCfg,
    pub split: SplitCfg,
    pub hw: HwCfg,
    pub refs: RefCfg,
}

impl EncCfg {
    pub fn new(width: i32, height: i32, format: PixelFormat) -> Self {
        Self {
            prep: PrepCfg::new(width, height, format),
            split: SplitCfg::default(),
            hw: HwCfg::default(),
            refs: RefCfg::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_defaults_to_width() {
        let prep = PrepCfg::new(1920, 1080, PixelFormat::Nv12);
        assert_eq!(prep.luma_stride(), 1920);
        assert_eq!(prep.vert_stride(), 1080);
    }

    #[test]
    fn explicit_strides_win() {
        let mut prep = PrepCfg::new(1920, 1080, PixelFormat::Nv12);
        prep.hor_stride = 2048;
        prep.ver_stride = 1088;
        assert_eq!(prep.luma_stride(), 2048);
        assert_eq!(prep.vert_stride(), 1088);
    }

    #[test]
    fn hw_defaults_carry_the_aq_tables() {
        let hw = HwCfg::default();
        assert_eq!(hw.aq_thrd_i, AQ_THRD_DEFAULT);
        assert_eq!(hw.aq_step_p[0], -8);
        assert_eq!(hw.qp_delta_row, 1);
    }
}
