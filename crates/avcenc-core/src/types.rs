//! Pixel formats and color-conversion contracts.
//!
//! The accelerator consumes a fixed, enumerated set of source formats.
//! Every supported format resolves to a [`FmtMap`] describing the hardware
//! color-format code plus the channel-swap and range bits the front end
//! needs.  Formats outside the enumerated set resolve to an error and the
//! frame is rejected before any hardware interaction.

use serde::{Deserialize, Serialize};

use crate::error::{HalError, Result};

// ─── Pixel format ────────────────────────────────────────────────────────

/// Source picture format accepted by the encode front end.
///
/// Layout notes give the plane arrangement the address synthesizer relies
/// on when deriving chroma offsets from the luma stride.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Semi-planar 4:2:0. Y plane, then interleaved CbCr at half height.
    Nv12,
    /// Semi-planar 4:2:2. Y plane, then interleaved CbCr at full height.
    Nv16,
    /// Planar 4:2:0. Y plane, quarter-size Cb plane, quarter-size Cr plane.
    Yuv420p,
    /// Planar 4:2:2. Y plane, half-size Cb plane, half-size Cr plane.
    Yuv422p,
    /// Packed 4:2:2, Y0 Cb Y1 Cr byte order.
    Yuyv422,
    /// Packed 4:2:2, Cb Y0 Cr Y1 byte order.
    Uyvy422,
    /// Packed 16-bit RGB, 5-6-5.
    Bgr565,
    /// Packed 24-bit RGB.
    Bgr888,
    /// Packed 32-bit RGB with alpha.
    Bgra8888,
    /// Planar 4:4:4. Not representable by this accelerator generation.
    Yuv444p,
    /// Semi-planar 4:4:4. Not representable by this accelerator generation.
    Yuv444sp,
}

/// Hardware color-format codes as latched by the source front end.
///
/// RGB codes sort below the YUV codes; [`FmtMap::is_rgb`] relies on that.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum HwFmt {
    Bgra8888 = 0,
    Bgr888 = 1,
    Bgr565 = 2,
    Yuv422sp = 4,
    Yuv422p = 5,
    Yuv420sp = 6,
    Yuv420p = 7,
    Yuyv422 = 8,
    Uyvy422 = 9,
}

/// Resolved front-end configuration for one source format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FmtMap {
    /// Hardware color-format code.
    pub hw_fmt: HwFmt,
    /// Swap the alpha byte lane (32-bit RGB only).
    pub alpha_swap: u32,
    /// Swap R/B (RGB) or U/V (semi-planar) lanes.
    pub rbuv_swap: u32,
    /// Source sample range: 0 = limited, 1 = full.
    pub src_range: u32,
    /// Read endianness the bus front end should use.
    pub src_endian: u32,
}

impl FmtMap {
    /// Resolve the front-end mapping for `format`.
    ///
    /// Fails with [`HalError::UnsupportedFormat`] when the format has no
    /// hardware mapping; callers must abort the frame without touching the
    /// device.
    pub fn resolve(format: PixelFormat) -> Result<FmtMap> {
        let (hw_fmt, rbuv_swap) = match format {
            PixelFormat::Bgra8888 => (HwFmt::Bgra8888, 1),
            PixelFormat::Bgr888 => (HwFmt::Bgr888, 1),
            PixelFormat::Bgr565 => (HwFmt::Bgr565, 1),
            PixelFormat::Nv16 => (HwFmt::Yuv422sp, 0),
            PixelFormat::Yuv422p => (HwFmt::Yuv422p, 0),
            PixelFormat::Nv12 => (HwFmt::Yuv420sp, 0),
            PixelFormat::Yuv420p => (HwFmt::Yuv420p, 0),
            PixelFormat::Yuyv422 => (HwFmt::Yuyv422, 0),
            PixelFormat::Uyvy422 => (HwFmt::Uyvy422, 0),
            PixelFormat::Yuv444p | PixelFormat::Yuv444sp => {
                return Err(HalError::UnsupportedFormat { format });
            }
        };
        Ok(FmtMap {
            hw_fmt,
            alpha_swap: 0,
            rbuv_swap,
            src_range: 0,
            src_endian: 0,
        })
    }

    /// Whether the resolved format is an RGB layout (color conversion to
    /// YCbCr happens in hardware with the configured coefficient set).
    pub fn is_rgb(&self) -> bool {
        (self.hw_fmt as u32) < HwFmt::Yuv422sp as u32
    }

    /// Whether the chroma plane shares the luma stride (semi-planar 4:2:x).
    pub fn chroma_stride_is_luma(&self) -> bool {
        matches!(self.hw_fmt, HwFmt::Yuv422sp | HwFmt::Yuv420sp)
    }
}

// ─── Color conversion coefficients ───────────────────────────────────────

/// RGB → YCbCr conversion coefficient set for the source front end.
///
/// `weights` is row-major `[b2y g2y r2y, b2u g2u r2u, b2v g2v r2v]`;
/// `offsets` is `[y, u, v]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CscCoeffs {
    pub weights: [i32; 9],
    pub offsets: [i32; 3],
}

/// Fixed BT.601 limited-range coefficients used for all standard formats.
pub const CSC_BT601: CscCoeffs = CscCoeffs {
    weights: [25, 129, 66, 112, -74, -38, -18, -94, 112],
    offsets: [15, 128, 128],
};

// ─── Alignment helpers ───────────────────────────────────────────────────

/// Round `v` up to a multiple of `a` (`a` must be a power of two).
pub const fn align_i32(v: i32, a: i32) -> i32 {
    (v + a - 1) & !(a - 1)
}

/// Round `v` up to a multiple of `a` (`a` must be a power of two).
pub const fn align_usize(v: usize, a: usize) -> usize {
    (v + a - 1) & !(a - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_formats_are_rejected() {
        assert!(matches!(
            FmtMap::resolve(PixelFormat::Yuv444p),
            Err(HalError::UnsupportedFormat { .. })
        ));
        assert!(FmtMap::resolve(PixelFormat::Nv12).is_ok());
    }

    #[test]
    fn rgb_classification_follows_hw_code_order() {
        assert!(FmtMap::resolve(PixelFormat::Bgr565).unwrap().is_rgb());
        assert!(!FmtMap::resolve(PixelFormat::Yuyv422).unwrap().is_rgb());
    }

    #[test]
    fn semi_planar_chroma_stride() {
        assert!(FmtMap::resolve(PixelFormat::Nv12)
            .unwrap()
            .chroma_stride_is_luma());
        assert!(!FmtMap::resolve(PixelFormat::Yuv420p)
            .unwrap()
            .chroma_stride_is_luma());
    }

    #[test]
    fn align_rounds_up() {
        assert_eq!(align_i32(1920, 64), 1920);
        assert_eq!(align_i32(1080, 64), 1088);
        assert_eq!(align_usize(1, 8192), 8192);
    }
}
