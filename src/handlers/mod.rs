// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dispatcher (C5): the single entry point a PLC runtime calls for
//! every MODBUS/TCP request it receives.

mod read;
mod write;

use crate::diagnostics::{Diagnostics, DiagnosticsSnapshot};
use crate::frame::{write_exception, FunctionCode, MIN_ADU_LEN, OFFSET_FUNCTION};
use crate::image::ProcessImage;
use crate::{Error, Exception, ProcessImageConfig};

/// Owns the process image and request counters for one MODBUS/TCP
/// endpoint.
///
/// Register PLC variables through [`Dispatcher::image`] and call
/// [`ProcessImage::init`] once before the first [`Dispatcher::process`]
/// call; after that, `process` is the only entry point the transport
/// layer needs.
pub struct Dispatcher {
    image: ProcessImage,
    diagnostics: Diagnostics,
}

impl Dispatcher {
    /// Build a dispatcher around a fresh, uninitialized process image.
    #[must_use]
    pub fn new(config: ProcessImageConfig) -> Self {
        Self {
            image: ProcessImage::new(config),
            diagnostics: Diagnostics::new(),
        }
    }

    /// The process image backing this dispatcher, for variable
    /// registration and initialization.
    #[must_use]
    pub fn image(&self) -> &ProcessImage {
        &self.image
    }

    /// A snapshot of this dispatcher's request and exception counters.
    #[must_use]
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Process one request in place and return the reply length.
    ///
    /// `buf` is the full request/reply buffer (capacity is assumed to be
    /// at least 260 bytes, per the caller's buffer-capacity contract);
    /// `length` is how many bytes of `buf` actually hold a received
    /// request. A return value of `0` means no reply could be written at
    /// all — this only happens if `buf` itself is too small to hold even
    /// the 9-byte exception frame, which the caller's buffer-capacity
    /// contract rules out in practice.
    ///
    /// A `length` too short to contain a trustworthy function code
    /// (fewer than [`MIN_ADU_LEN`] bytes) still gets a reply: an
    /// `ILLEGAL_FUNCTION` exception, the same as an unrecognized
    /// function code would. This is a deliberate early return — earlier
    /// revisions of this dispatch logic kept evaluating the function
    /// code compare after deciding on the exception, which depended on
    /// `buf[OFFSET_FUNCTION]` holding something meaningful even when it
    /// might not.
    #[must_use]
    pub fn process(&self, buf: &mut [u8], length: usize) -> usize {
        if length < MIN_ADU_LEN {
            let exception = Exception::IllegalFunction;
            self.diagnostics.record_exception(exception);
            return write_exception(buf, exception).unwrap_or(0);
        }
        let function_code = FunctionCode::new(buf[OFFSET_FUNCTION]);
        self.diagnostics.record_request(function_code);
        let trace = self.image.config().trace;
        if trace {
            trace_dispatch(function_code);
        }
        let result = match function_code {
            FunctionCode::ReadCoils => read::read_coils(&self.image, buf, length),
            FunctionCode::ReadDiscreteInputs => read::read_discrete_inputs(&self.image, buf, length),
            FunctionCode::ReadHoldingRegisters => {
                read::read_holding_registers(&self.image, buf, length)
            }
            FunctionCode::ReadInputRegisters => read::read_input_registers(&self.image, buf, length),
            FunctionCode::WriteSingleCoil => write::write_single_coil(&self.image, buf, length),
            FunctionCode::WriteSingleRegister => write::write_single_register(&self.image, buf, length),
            FunctionCode::WriteMultipleCoils => write::write_multiple_coils(&self.image, buf, length),
            FunctionCode::WriteMultipleRegisters => {
                write::write_multiple_registers(&self.image, buf, length)
            }
            FunctionCode::Custom(code) => Err(Error::FnCode(code)),
        };
        match result {
            Ok(reply_len) => reply_len,
            Err(err) => {
                let exception = Exception::from(err);
                self.diagnostics.record_exception(exception);
                warn_exception(&self.image, exception, err);
                write_exception(buf, exception).unwrap_or(0)
            }
        }
    }
}

fn trace_dispatch(fc: FunctionCode) {
    #[cfg(feature = "log")]
    log::trace!("dispatching function code 0x{:02X}", fc.value());
    #[cfg(not(feature = "log"))]
    let _ = fc;
}

fn warn_exception(image: &ProcessImage, exception: Exception, err: Error) {
    #[cfg(feature = "log")]
    {
        if let Some(label) = &image.config().label {
            log::warn!("[{label}] {exception} ({err})");
        } else {
            log::warn!("{exception} ({err})");
        }
    }
    #[cfg(not(feature = "log"))]
    let _ = (image, exception, err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::write_u16;

    fn request(fc: u8, start: u16, quantity: u16) -> [u8; 260] {
        let mut buf = [0u8; 260];
        write_u16(&mut buf, 0, 0xBEEF);
        buf[7] = fc;
        write_u16(&mut buf, 8, start);
        write_u16(&mut buf, 10, quantity);
        buf
    }

    fn ready_dispatcher() -> Dispatcher {
        let dispatcher = Dispatcher::new(ProcessImageConfig::default());
        dispatcher.image().init().unwrap();
        dispatcher
    }

    #[test]
    fn short_buffer_gets_an_illegal_function_reply() {
        let dispatcher = ready_dispatcher();
        let mut buf = [0u8; 260];
        let len = dispatcher.process(&mut buf, 4);
        assert_eq!(len, 9);
        assert_eq!(buf[8], Exception::IllegalFunction.code());
        assert_eq!(
            dispatcher.diagnostics().exceptions_for(Exception::IllegalFunction),
            1
        );
    }

    #[test]
    fn unknown_function_code_replies_with_illegal_function() {
        let dispatcher = ready_dispatcher();
        let mut buf = request(0x42, 0, 1);
        let len = dispatcher.process(&mut buf, 12);
        assert_eq!(len, 9);
        assert_eq!(buf[7], 0x42 | 0x80);
        assert_eq!(buf[8], Exception::IllegalFunction.code());
        assert_eq!(dispatcher.diagnostics().exceptions_for(Exception::IllegalFunction), 1);
    }

    #[test]
    fn read_coils_round_trips_through_the_dispatcher() {
        let dispatcher = ready_dispatcher();
        dispatcher.image().write_coil(0, true).unwrap();
        let mut buf = request(0x01, 0, 1);
        let len = dispatcher.process(&mut buf, 12);
        assert_eq!(len, 10);
        assert_eq!(buf[8], 1);
        assert_eq!(buf[9], 1);
        assert_eq!(dispatcher.diagnostics().requests_for(FunctionCode::ReadCoils), 1);
    }

    #[test]
    fn excessive_quantity_replies_with_illegal_data_address() {
        let dispatcher = ready_dispatcher();
        let mut buf = request(0x01, 0, 3000);
        let len = dispatcher.process(&mut buf, 12);
        assert_eq!(len, 9);
        assert_eq!(buf[8], Exception::IllegalDataAddress.code());
    }
}
