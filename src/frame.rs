// SPDX-License-Identifier: MIT OR Apache-2.0

//! MBAP header layout and the handful of function codes this core supports.
//!
//! Every multi-byte field on the wire is big-endian; splitting and joining
//! always goes through [`byteorder::BigEndian`], never hand-rolled shifts.

use byteorder::{BigEndian, ByteOrder};

use crate::Exception;

/// A MODBUS address (`0..=65535`).
pub type Address = u16;

/// Number of items requested by a read/write (`0..=65535`).
pub type Quantity = u16;

/// A single 16-bit register value.
pub type Word = u16;

/// Byte offset of the 2-byte transaction id.
pub const OFFSET_TRANSACTION_ID: usize = 0;
/// Byte offset of the 2-byte protocol id.
pub const OFFSET_PROTOCOL_ID: usize = 2;
/// Byte offset of the 2-byte length field.
pub const OFFSET_LENGTH: usize = 4;
/// Byte offset of the unit id.
pub const OFFSET_UNIT_ID: usize = 6;
/// Byte offset of the function code.
pub const OFFSET_FUNCTION: usize = 7;
/// Byte offset where the PDU payload starts.
pub const OFFSET_PDU: usize = 8;

/// Minimum ADU length the dispatcher needs to trust the function code.
pub const MIN_ADU_LEN: usize = 8;
/// Minimum ADU length any supported handler needs to trust its fixed payload.
pub const MIN_REQUEST_LEN: usize = 12;
/// Length of an exception reply.
pub const EXCEPTION_REPLY_LEN: usize = 9;
/// Length of an echoed (Write Single Coil / Write Single Register / Write
/// Multiple Coils / Write Multiple Registers) success reply.
pub const ECHO_REPLY_LEN: usize = 12;

/// Bit set in the function-code byte of an exception reply.
const EXCEPTION_BIT: u8 = 0x80;

/// The eight MODBUS function codes this core dispatches, plus a catch-all
/// for anything else so the dispatcher can still log what it rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCode {
    ReadCoils,
    ReadDiscreteInputs,
    ReadHoldingRegisters,
    ReadInputRegisters,
    WriteSingleCoil,
    WriteSingleRegister,
    WriteMultipleCoils,
    WriteMultipleRegisters,
    /// Anything not in the eight above.
    Custom(u8),
}

impl FunctionCode {
    /// Create a [`FunctionCode`] from its wire value.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        match value {
            0x01 => Self::ReadCoils,
            0x02 => Self::ReadDiscreteInputs,
            0x03 => Self::ReadHoldingRegisters,
            0x04 => Self::ReadInputRegisters,
            0x05 => Self::WriteSingleCoil,
            0x06 => Self::WriteSingleRegister,
            0x0F => Self::WriteMultipleCoils,
            0x10 => Self::WriteMultipleRegisters,
            code => Self::Custom(code),
        }
    }

    /// The wire value of this function code.
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::ReadCoils => 0x01,
            Self::ReadDiscreteInputs => 0x02,
            Self::ReadHoldingRegisters => 0x03,
            Self::ReadInputRegisters => 0x04,
            Self::WriteSingleCoil => 0x05,
            Self::WriteSingleRegister => 0x06,
            Self::WriteMultipleCoils => 0x0F,
            Self::WriteMultipleRegisters => 0x10,
            Self::Custom(code) => code,
        }
    }
}

/// Read a big-endian 16-bit field at `offset`.
#[must_use]
pub fn read_u16(buf: &[u8], offset: usize) -> u16 {
    BigEndian::read_u16(&buf[offset..offset + 2])
}

/// Write a big-endian 16-bit field at `offset`.
pub fn write_u16(buf: &mut [u8], offset: usize, value: u16) {
    BigEndian::write_u16(&mut buf[offset..offset + 2], value);
}

/// Rewrite `buf` in place as an exception reply for `exception`.
///
/// The transaction id, protocol id and unit id (bytes `0..7`) are assumed
/// to already hold the values echoed from the request; only the length
/// field, the function-code high bit and the exception byte are touched.
/// Returns `None` without writing anything if `buf` is too small to hold
/// the 9-byte exception frame — this should never happen given the
/// caller's buffer-capacity contract (see crate docs), but the check
/// keeps this function from ever writing out of bounds.
#[must_use]
pub fn write_exception(buf: &mut [u8], exception: Exception) -> Option<usize> {
    if buf.len() < EXCEPTION_REPLY_LEN {
        return None;
    }
    write_u16(buf, OFFSET_LENGTH, 3);
    buf[OFFSET_FUNCTION] |= EXCEPTION_BIT;
    buf[OFFSET_PDU] = exception.code();
    Some(EXCEPTION_REPLY_LEN)
}

/// Rewrite the length field for a success reply that echoes bytes `0..12`
/// of the request (Write Single Coil, Write Single Register, Write
/// Multiple Coils, Write Multiple Registers). Returns `None` if `buf` is
/// too small to hold the echoed frame.
#[must_use]
pub fn write_echo_reply(buf: &mut [u8]) -> Option<usize> {
    if buf.len() < ECHO_REPLY_LEN {
        return None;
    }
    write_u16(buf, OFFSET_LENGTH, 6);
    Some(ECHO_REPLY_LEN)
}
