// SPDX-License-Identifier: MIT OR Apache-2.0

//! A MODBUS/TCP request processor for a PLC runtime's process image.
//!
//! [`Dispatcher`] is the entry point: build one around a
//! [`ProcessImageConfig`], register any PLC-owned variables through
//! [`Dispatcher::image`], call [`ProcessImage::init`] once, then hand
//! every received frame to [`Dispatcher::process`]. Everything else in
//! this crate exists to make that one call correct.

mod diagnostics;
mod error;
mod frame;
mod handlers;
mod image;

pub use diagnostics::{Diagnostics, DiagnosticsSnapshot};
pub use error::{Error, Exception};
pub use frame::{Address, FunctionCode, Quantity, Word};
pub use handlers::Dispatcher;
pub use image::{Binding, DefaultStore, ProcessImage, ProcessImageConfig};
