// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lock-free request counters (C8).
//!
//! The dispatcher bumps one counter per dispatched function code and one
//! per exception kind on every call to [`crate::process`]; nothing here
//! ever blocks or affects protocol behavior, so a relaxed ordering is
//! enough — callers only need eventually-consistent totals, not a
//! happens-before relationship with the requests themselves.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{Exception, FunctionCode};

const FN_CODE_SLOTS: usize = 8;
const EXCEPTION_SLOTS: usize = 3;

fn fn_code_slot(fc: FunctionCode) -> Option<usize> {
    Some(match fc {
        FunctionCode::ReadCoils => 0,
        FunctionCode::ReadDiscreteInputs => 1,
        FunctionCode::ReadHoldingRegisters => 2,
        FunctionCode::ReadInputRegisters => 3,
        FunctionCode::WriteSingleCoil => 4,
        FunctionCode::WriteSingleRegister => 5,
        FunctionCode::WriteMultipleCoils => 6,
        FunctionCode::WriteMultipleRegisters => 7,
        FunctionCode::Custom(_) => return None,
    })
}

fn exception_slot(exception: Exception) -> usize {
    match exception {
        Exception::IllegalFunction => 0,
        Exception::IllegalDataAddress => 1,
        Exception::IllegalDataValue => 2,
    }
}

/// Counters the dispatcher maintains across its lifetime.
///
/// Cheap to embed by value; every method takes `&self` since the
/// counters themselves provide the interior mutability.
#[derive(Debug, Default)]
pub struct Diagnostics {
    requests: [AtomicU64; FN_CODE_SLOTS],
    unknown_function: AtomicU64,
    exceptions: [AtomicU64; EXCEPTION_SLOTS],
}

/// A point-in-time snapshot of [`Diagnostics`], safe to hold onto after
/// the counters have moved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiagnosticsSnapshot {
    pub requests: [u64; FN_CODE_SLOTS],
    pub unknown_function: u64,
    pub exceptions: [u64; EXCEPTION_SLOTS],
}

impl Diagnostics {
    /// A fresh, all-zero counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_request(&self, fc: FunctionCode) {
        match fn_code_slot(fc) {
            Some(slot) => {
                self.requests[slot].fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.unknown_function.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub(crate) fn record_exception(&self, exception: Exception) {
        self.exceptions[exception_slot(exception)].fetch_add(1, Ordering::Relaxed);
    }

    /// Read every counter's current value.
    #[must_use]
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let mut requests = [0u64; FN_CODE_SLOTS];
        for (slot, counter) in requests.iter_mut().zip(&self.requests) {
            *slot = counter.load(Ordering::Relaxed);
        }
        let mut exceptions = [0u64; EXCEPTION_SLOTS];
        for (slot, counter) in exceptions.iter_mut().zip(&self.exceptions) {
            *slot = counter.load(Ordering::Relaxed);
        }
        DiagnosticsSnapshot {
            requests,
            unknown_function: self.unknown_function.load(Ordering::Relaxed),
            exceptions,
        }
    }
}

impl DiagnosticsSnapshot {
    /// Count for a specific function code, or the `unknown_function`
    /// bucket for anything this core doesn't dispatch.
    #[must_use]
    pub fn requests_for(&self, fc: FunctionCode) -> u64 {
        match fn_code_slot(fc) {
            Some(slot) => self.requests[slot],
            None => self.unknown_function,
        }
    }

    /// Count for a specific exception kind.
    #[must_use]
    pub fn exceptions_for(&self, exception: Exception) -> u64 {
        self.exceptions[exception_slot(exception)]
    }
}
