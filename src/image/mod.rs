// SPDX-License-Identifier: MIT OR Apache-2.0

//! The process image (C1/C2/C6): the typed, width-zone-partitioned table
//! set a MODBUS/TCP request reads and writes, plus the default backing
//! store and binding initializer that make every declared address
//! resolve to something.
//!
//! Holding-register addresses `0..8192` split into four zones of
//! decreasing width and increasing element size:
//!
//! | zone     | addresses     | element width | elements |
//! |----------|---------------|----------------|----------|
//! | Z16-out  | `0..=1024`    | 16 bits        | 1025     |
//! | Z16-mem  | `1025..=2047` | 16 bits        | 1023     |
//! | Z32      | `2048..=4095` | 32 bits        | 1024     |
//! | Z64      | `4096..=8191` | 64 bits        | 1024     |
//!
//! Address `1024` is shared on paper between Z16-out and Z16-mem's index
//! `0`; every read/write path resolves it to Z16-out first, so the
//! Z16-mem slot at that index is permanently unreachable. See
//! `DESIGN.md` for why this is kept rather than fixed.

mod binding;
mod registry;
mod store;

pub use binding::Binding;
pub use registry::ProcessImage;
pub use store::DefaultStore;

/// Number of declared coil addresses.
pub const COIL_COUNT: usize = 8192;
/// Number of declared discrete-input addresses.
pub const DISCRETE_COUNT: usize = 8192;
/// Number of declared input-register addresses.
pub const INPUT_REG_COUNT: usize = 1024;
/// Number of declared holding-register addresses (spans all four zones).
pub const HOLDING_COUNT: usize = 8192;

/// Elements in the Z16-out zone (`0..=1024`, inclusive).
pub const Z16_OUT_COUNT: usize = 1025;
/// Elements in the Z16-mem zone (`1024..=2047` by index, `1025..=2047` by
/// address; index `0` is the unreachable shadowed slot).
pub const Z16_MEM_COUNT: usize = 1024;
/// Lowest holding-register address in the Z16-mem zone.
pub const Z16_MEM_BASE: u16 = 1024;
/// Lowest holding-register address in the Z32 zone.
pub const Z32_BASE: u16 = 2048;
/// Highest holding-register address in the Z32 zone.
pub const Z32_MAX: u16 = 4095;
/// 32-bit elements in the Z32 zone.
pub const Z32_ELEMENT_COUNT: usize = 1024;
/// Lowest holding-register address in the Z64 zone.
pub const Z64_BASE: u16 = 4096;
/// Highest holding-register address in the Z64 zone.
pub const Z64_MAX: u16 = 8191;
/// 64-bit elements in the Z64 zone.
pub const Z64_ELEMENT_COUNT: usize = 1024;

/// Construction-time configuration for a [`ProcessImage`] (C9).
///
/// Purely ambient: nothing here changes protocol behavior, only
/// observability of it.
#[derive(Debug, Clone, Default)]
pub struct ProcessImageConfig {
    /// Emit a trace-level log line for lifecycle events (initialization,
    /// and — when the `log` feature is enabled — nothing per-request;
    /// per-request tracing lives on the dispatcher, not here).
    pub trace: bool,
    /// An optional label included in every log line this image emits, so
    /// multiple process images in one process can be told apart.
    pub label: Option<String>,
}
