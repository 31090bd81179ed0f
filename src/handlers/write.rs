// SPDX-License-Identifier: MIT OR Apache-2.0

//! Write handlers (C4): Write Single Coil, Write Single Register, Write
//! Multiple Coils, Write Multiple Registers.
//!
//! The two bulk handlers follow the source's deferred-error shape: every
//! element is processed even after one fails, and only once the whole
//! request has been walked does the handler decide between a success
//! echo and an exception. A failure partway through a bulk write still
//! leaves every element before it written — there's no rollback.

use crate::frame::{read_u16, write_echo_reply, OFFSET_PDU};
use crate::{Error, ProcessImage};

#[cfg(test)]
const COIL_ON: u16 = 0xFF00;
#[cfg(test)]
const COIL_OFF: u16 = 0x0000;

pub(crate) fn write_single_coil(
    image: &ProcessImage,
    buf: &mut [u8],
    length: usize,
) -> Result<usize, Error> {
    if length < 12 {
        return Err(Error::BufferSize);
    }
    let addr = read_u16(buf, 8);
    let raw = read_u16(buf, 10);
    // Any nonzero value word is "on"; the wire protocol convention of
    // 0xFF00 for on is a client-side nicety, not something this side
    // validates.
    image.write_coil(addr, raw > 0)?;
    write_echo_reply(buf).ok_or(Error::BufferSize)
}

pub(crate) fn write_single_register(
    image: &ProcessImage,
    buf: &mut [u8],
    length: usize,
) -> Result<usize, Error> {
    if length < 12 {
        return Err(Error::BufferSize);
    }
    let addr = read_u16(buf, 8);
    let value = read_u16(buf, 10);
    image.write_holding(addr, value)?;
    write_echo_reply(buf).ok_or(Error::BufferSize)
}

pub(crate) fn write_multiple_coils(
    image: &ProcessImage,
    buf: &mut [u8],
    length: usize,
) -> Result<usize, Error> {
    if length < 13 {
        return Err(Error::BufferSize);
    }
    let start = read_u16(buf, 8);
    let quantity = read_u16(buf, 10);
    let byte_count = buf[OFFSET_PDU + 4];
    let expected_bytes = (usize::from(quantity) + 7) / 8;
    if quantity == 0 {
        return Err(Error::QuantityOutOfRange(quantity));
    }
    if usize::from(byte_count) != expected_bytes {
        return Err(Error::QuantityBytesMismatch(quantity, byte_count, expected_bytes as u16));
    }
    if length < 13 + expected_bytes {
        return Err(Error::BufferSize);
    }
    let data_offset = OFFSET_PDU + 5;
    let mut first_error = None;
    // Walk every bit position the data block actually holds, including the
    // padding bits past `quantity` in the final byte — the source writes
    // (and range-checks) those too, it doesn't mask them off.
    for bit_pos in 0..expected_bytes * 8 {
        let byte = buf[data_offset + bit_pos / 8];
        let bit = (byte >> (bit_pos % 8)) & 1 == 1;
        let addr = match start.checked_add(bit_pos as u16) {
            Some(addr) => addr,
            None => {
                first_error.get_or_insert(Error::AddressOutOfRange(start));
                continue;
            }
        };
        if let Err(err) = image.write_coil(addr, bit) {
            first_error.get_or_insert(err);
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => write_echo_reply(buf).ok_or(Error::BufferSize),
    }
}

pub(crate) fn write_multiple_registers(
    image: &ProcessImage,
    buf: &mut [u8],
    length: usize,
) -> Result<usize, Error> {
    if length < 13 {
        return Err(Error::BufferSize);
    }
    let start = read_u16(buf, 8);
    let quantity = read_u16(buf, 10);
    let byte_count = buf[OFFSET_PDU + 4];
    let expected_bytes = usize::from(quantity) * 2;
    if quantity == 0 {
        return Err(Error::QuantityOutOfRange(quantity));
    }
    if usize::from(byte_count) != expected_bytes {
        return Err(Error::QuantityBytesMismatch(quantity, byte_count, expected_bytes as u16));
    }
    if length < 13 + expected_bytes {
        return Err(Error::BufferSize);
    }
    let data_offset = OFFSET_PDU + 5;
    let mut first_error = None;
    for i in 0..quantity {
        let value = read_u16(buf, data_offset + usize::from(i) * 2);
        let position = match start.checked_add(i) {
            Some(position) => position,
            None => {
                first_error.get_or_insert(Error::AddressOutOfRange(start));
                continue;
            }
        };
        if let Err(err) = image.write_holding_multi(start, position, value) {
            first_error.get_or_insert(err);
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => write_echo_reply(buf).ok_or(Error::BufferSize),
    }
}
