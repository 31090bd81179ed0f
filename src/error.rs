// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

/// Errors produced while decoding a frame or accessing the process image.
///
/// These never reach the wire directly; every fallible path in the
/// dispatcher maps an `Error` onto one of the three [`Exception`] codes
/// before writing a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The supplied buffer is too small for the operation being attempted.
    BufferSize,
    /// A function code outside the eight this core supports.
    FnCode(u8),
    /// A request's `byte_count` field disagreed with its declared quantity.
    QuantityBytesMismatch(u16, u8, u16),
    /// A read/write quantity exceeded the function code's protocol limit.
    QuantityOutOfRange(u16),
    /// An address fell outside its table's declared range.
    AddressOutOfRange(u16),
    /// The process-image mutex was poisoned by a panicking holder.
    Poisoned,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BufferSize => write!(f, "buffer too small"),
            Self::FnCode(fn_code) => write!(f, "unsupported function code: 0x{fn_code:0>2X}"),
            Self::QuantityBytesMismatch(quantity, bytes, bytes_expected) => write!(
                f,
                "quantity/byte-count mismatch: quantity={quantity}, byte_count={bytes}, expected={bytes_expected}"
            ),
            Self::QuantityOutOfRange(quantity) => write!(f, "quantity out of range: {quantity}"),
            Self::AddressOutOfRange(addr) => write!(f, "address out of range: {addr}"),
            Self::Poisoned => write!(f, "process image mutex poisoned"),
        }
    }
}

impl std::error::Error for Error {}

/// A server exception as defined by the MODBUS application protocol.
///
/// Only the three codes this core ever emits are represented; the wire
/// value is what actually ends up at offset 8 of an exception reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
}

impl Exception {
    /// The wire value of this exception code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    const fn name(self) -> &'static str {
        match self {
            Self::IllegalFunction => "illegal function",
            Self::IllegalDataAddress => "illegal data address",
            Self::IllegalDataValue => "illegal data value",
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<Error> for Exception {
    /// Map an internal error onto the exception code reported on the wire.
    ///
    /// `AddressOutOfRange` becomes `IllegalDataAddress`; everything else
    /// — malformed framing and the internal `Poisoned` condition alike —
    /// becomes `IllegalDataValue`, since the protocol has no "internal
    /// error" code of its own.
    fn from(err: Error) -> Self {
        match err {
            Error::AddressOutOfRange(_) => Self::IllegalDataAddress,
            Error::BufferSize
            | Error::FnCode(_)
            | Error::QuantityBytesMismatch(..)
            | Error::QuantityOutOfRange(_)
            | Error::Poisoned => Self::IllegalDataValue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_code_values() {
        assert_eq!(Exception::IllegalFunction.code(), 1);
        assert_eq!(Exception::IllegalDataAddress.code(), 2);
        assert_eq!(Exception::IllegalDataValue.code(), 3);
    }

    #[test]
    fn error_maps_to_exception() {
        assert_eq!(
            Exception::from(Error::AddressOutOfRange(9000)),
            Exception::IllegalDataAddress
        );
        assert_eq!(
            Exception::from(Error::BufferSize),
            Exception::IllegalDataValue
        );
        assert_eq!(Exception::from(Error::Poisoned), Exception::IllegalDataValue);
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(
            format!("{}", Exception::IllegalFunction),
            "illegal function"
        );
        assert_eq!(
            format!("{}", Error::AddressOutOfRange(5)),
            "address out of range: 5"
        );
    }
}
