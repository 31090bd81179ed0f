// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read handlers (C4): Read Coils, Read Discrete Inputs, Read Holding
//! Registers, Read Input Registers.

use crate::frame::{read_u16, write_u16, OFFSET_LENGTH, OFFSET_PDU};
use crate::{Address, Error, ProcessImage, Quantity};

/// Largest quantity whose bit-packed reply still fits the single-byte
/// `byte_count` field (`ceil(quantity / 8) <= 255`).
const MAX_BIT_QUANTITY: Quantity = 2040;
/// Largest quantity whose register reply still fits the single-byte
/// `byte_count` field (`quantity * 2 <= 255`).
const MAX_WORD_QUANTITY: Quantity = 127;

fn bit_byte_count(quantity: Quantity) -> usize {
    (usize::from(quantity) + 7) / 8
}

/// Shared shape for Read Coils / Read Discrete Inputs: a start address, a
/// quantity, and a bit-packed reply.
fn read_bits(
    buf: &mut [u8],
    length: usize,
    read_one: impl Fn(Address) -> Result<bool, Error>,
) -> Result<usize, Error> {
    if length < 12 {
        return Err(Error::BufferSize);
    }
    let start = read_u16(buf, 8);
    let quantity = read_u16(buf, 10);
    if quantity == 0 {
        return Err(Error::QuantityOutOfRange(quantity));
    }
    if quantity > MAX_BIT_QUANTITY {
        return Err(Error::AddressOutOfRange(start.saturating_add(quantity - 1)));
    }
    let byte_count = bit_byte_count(quantity);
    let reply_len = OFFSET_PDU + 1 + byte_count;
    if buf.len() < reply_len {
        return Err(Error::BufferSize);
    }
    for byte in &mut buf[OFFSET_PDU + 1..reply_len] {
        *byte = 0;
    }
    // Pack every bit position the reply's byte count covers, not just the
    // ones the caller asked for: a quantity that isn't a multiple of 8
    // still gets a reply whose trailing padding bits reflect whatever is
    // at those addresses, and an out-of-range padding address still
    // raises the same exception an in-range one would.
    for bit_pos in 0..byte_count * 8 {
        let addr = start
            .checked_add(bit_pos as u16)
            .ok_or(Error::AddressOutOfRange(start))?;
        if read_one(addr)? {
            let byte_index = OFFSET_PDU + 1 + bit_pos / 8;
            buf[byte_index] |= 1 << (bit_pos % 8);
        }
    }
    buf[OFFSET_PDU] = byte_count as u8;
    write_u16(buf, OFFSET_LENGTH, (reply_len - 6) as u16);
    Ok(reply_len)
}

pub(crate) fn read_coils(image: &ProcessImage, buf: &mut [u8], length: usize) -> Result<usize, Error> {
    read_bits(buf, length, |addr| image.read_coil(addr))
}

pub(crate) fn read_discrete_inputs(
    image: &ProcessImage,
    buf: &mut [u8],
    length: usize,
) -> Result<usize, Error> {
    read_bits(buf, length, |addr| image.read_discrete(addr))
}

pub(crate) fn read_holding_registers(
    image: &ProcessImage,
    buf: &mut [u8],
    length: usize,
) -> Result<usize, Error> {
    if length < 12 {
        return Err(Error::BufferSize);
    }
    let start = read_u16(buf, 8);
    let quantity = read_u16(buf, 10);
    if quantity > MAX_WORD_QUANTITY {
        return Err(Error::AddressOutOfRange(start.saturating_add(quantity.saturating_sub(1))));
    }
    let byte_count = usize::from(quantity) * 2;
    let reply_len = OFFSET_PDU + 1 + byte_count;
    if buf.len() < reply_len {
        return Err(Error::BufferSize);
    }
    for i in 0..quantity {
        let addr = start.checked_add(i).ok_or(Error::AddressOutOfRange(start))?;
        let (hi, lo) = image.read_holding_reply_bytes(addr)?;
        let offset = OFFSET_PDU + 1 + usize::from(i) * 2;
        buf[offset] = hi;
        buf[offset + 1] = lo;
    }
    buf[OFFSET_PDU] = byte_count as u8;
    write_u16(buf, OFFSET_LENGTH, (reply_len - 6) as u16);
    Ok(reply_len)
}

pub(crate) fn read_input_registers(
    image: &ProcessImage,
    buf: &mut [u8],
    length: usize,
) -> Result<usize, Error> {
    if length < 12 {
        return Err(Error::BufferSize);
    }
    let start = read_u16(buf, 8);
    let quantity = read_u16(buf, 10);
    if quantity > MAX_WORD_QUANTITY {
        return Err(Error::AddressOutOfRange(start.saturating_add(quantity.saturating_sub(1))));
    }
    let byte_count = usize::from(quantity) * 2;
    let reply_len = OFFSET_PDU + 1 + byte_count;
    if buf.len() < reply_len {
        return Err(Error::BufferSize);
    }
    for i in 0..quantity {
        let addr = start.checked_add(i).ok_or(Error::AddressOutOfRange(start))?;
        let value = image.read_input_reg(addr)?;
        let offset = OFFSET_PDU + 1 + usize::from(i) * 2;
        write_u16(buf, offset, value);
    }
    buf[OFFSET_PDU] = byte_count as u8;
    write_u16(buf, OFFSET_LENGTH, (reply_len - 6) as u16);
    Ok(reply_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProcessImageConfig;

    fn image() -> ProcessImage {
        let image = ProcessImage::new(ProcessImageConfig::default());
        image.init().unwrap();
        image
    }

    fn request(fc: u8, start: u16, quantity: u16) -> [u8; 260] {
        let mut buf = [0u8; 260];
        write_u16(&mut buf, 0, 0x1234);
        buf[7] = fc;
        write_u16(&mut buf, 8, start);
        write_u16(&mut buf, 10, quantity);
        buf
    }

    #[test]
    fn read_coils_packs_bits_little_endian_within_byte() {
        let image = image();
        image.write_coil(0, true).unwrap();
        image.write_coil(2, true).unwrap();
        let mut buf = request(0x01, 0, 8);
        let len = read_coils(&image, &mut buf, 12).unwrap();
        assert_eq!(len, 10);
        assert_eq!(buf[8], 1); // byte count
        assert_eq!(buf[9], 0b0000_0101);
    }

    #[test]
    fn read_coils_rejects_zero_quantity_as_invalid_value() {
        let image = image();
        let mut buf = request(0x01, 0, 0);
        assert_eq!(read_coils(&image, &mut buf, 12), Err(Error::QuantityOutOfRange(0)));
    }

    #[test]
    fn read_coils_rejects_excessive_quantity_as_out_of_range() {
        let image = image();
        let mut buf = request(0x01, 0, 2041);
        assert_eq!(
            read_coils(&image, &mut buf, 12),
            Err(Error::AddressOutOfRange(2040))
        );
    }

    #[test]
    fn read_coils_packs_padding_bits_with_real_values_not_zero() {
        let image = image();
        // Quantity 5 still reports a 1-byte reply; the 3 padding bit
        // positions (addresses 5-7) are packed from real coil state
        // rather than forced to zero.
        image.write_coil(5, true).unwrap();
        let mut buf = request(0x01, 0, 5);
        let len = read_coils(&image, &mut buf, 12).unwrap();
        assert_eq!(len, 10);
        assert_eq!(buf[8], 1);
        assert_eq!(buf[9], 0b0010_0000);
    }

    #[test]
    fn read_coils_out_of_range_padding_bit_is_rejected() {
        let image = image();
        // Quantity 1 at the last valid coil address still packs a full
        // byte of padding, which runs one address past the table.
        let mut buf = request(0x01, 8191, 1);
        assert_eq!(
            read_coils(&image, &mut buf, 12),
            Err(Error::AddressOutOfRange(8192))
        );
    }

    #[test]
    fn read_holding_registers_spans_zones() {
        let image = image();
        image.bind_memory_dword(2048, 0xDEAD_BEEF).unwrap();
        let mut buf = request(0x03, 2048, 2);
        let len = read_holding_registers(&image, &mut buf, 12).unwrap();
        assert_eq!(len, 13);
        assert_eq!(buf[8], 4);
        assert_eq!(&buf[9..13], &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn read_input_registers_defaults_to_zero() {
        let image = image();
        let mut buf = request(0x04, 0, 3);
        let len = read_input_registers(&image, &mut buf, 12).unwrap();
        assert_eq!(len, 14);
        assert_eq!(&buf[9..15], &[0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn read_holding_registers_accepts_zero_quantity() {
        let image = image();
        let mut buf = request(0x03, 0, 0);
        let len = read_holding_registers(&image, &mut buf, 12).unwrap();
        assert_eq!(len, 9);
        assert_eq!(buf[8], 0);
    }

    #[test]
    fn read_input_registers_accepts_zero_quantity() {
        let image = image();
        let mut buf = request(0x04, 0, 0);
        let len = read_input_registers(&image, &mut buf, 12).unwrap();
        assert_eq!(len, 9);
        assert_eq!(buf[8], 0);
    }
}
