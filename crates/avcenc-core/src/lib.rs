//! Shared contracts for the AVC encode-accelerator driver.
//!
//! This crate is the neutral home for everything the hardware layer and its
//! callers must agree on without depending on each other:
//!
//! - [`device`] — the dispatcher boundary: named register blocks at fixed
//!   offsets and the [`EncDevice`](device::EncDevice) write/read/submit/poll
//!   contract.
//! - [`buffer`] — opaque hardware buffer handles and the allocator seam.
//!   Allocation primitives live outside this workspace; only pool *policy*
//!   is implemented here.
//! - [`error`] — the typed error hierarchy with stable integer codes.
//! - [`types`] — pixel formats with documented layout contracts and the
//!   color-conversion coefficient set.
//! - [`mock`] — a recording [`EncDevice`](device::EncDevice) double for
//!   hardware-free tests.

pub mod buffer;
pub mod device;
pub mod error;
pub mod mock;
pub mod types;
