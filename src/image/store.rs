// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dense default backing store (C2).
//!
//! Every MODBUS address that no PLC variable ever claims still needs to
//! read and write *something*, so the registry keeps one flat array per
//! table sized to the table's maximum address. These also double as the
//! fallback sink for the wide holding-register zones when an element is
//! unbound (see [`crate::image::registry`]).

use super::{COIL_COUNT, DISCRETE_COUNT, HOLDING_COUNT, INPUT_REG_COUNT};

/// Dense fallback storage, one slot per declared MODBUS address.
pub struct DefaultStore {
    pub(crate) discrete_inputs: Vec<bool>,
    pub(crate) coils: Vec<bool>,
    pub(crate) input_registers: Vec<u16>,
    pub(crate) holding_registers: Vec<u16>,
}

impl DefaultStore {
    pub(crate) fn new() -> Self {
        Self {
            discrete_inputs: vec![false; DISCRETE_COUNT],
            coils: vec![false; COIL_COUNT],
            input_registers: vec![0; INPUT_REG_COUNT],
            holding_registers: vec![0; HOLDING_COUNT],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_store_is_zeroed_and_sized() {
        let store = DefaultStore::new();
        assert_eq!(store.discrete_inputs.len(), DISCRETE_COUNT);
        assert_eq!(store.coils.len(), COIL_COUNT);
        assert_eq!(store.input_registers.len(), INPUT_REG_COUNT);
        assert_eq!(store.holding_registers.len(), HOLDING_COUNT);
        assert!(store.coils.iter().all(|c| !c));
        assert!(store.holding_registers.iter().all(|w| *w == 0));
    }
}
