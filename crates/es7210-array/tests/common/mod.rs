//! Simulated multi-chip I²C bus shared by the integration tests.
//!
//! Each configured address answers with a 256-byte register bank that
//! starts at the ES7210 power-on defaults. Chips can be told to reject
//! writes or reads, and every accepted register write is logged.

#![allow(dead_code, clippy::unwrap_used, clippy::indexing_slicing)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use embedded_hal_async::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use es7210_array::registers::RESET_DEFAULTS;

/// Bus error reported by the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimError(pub ErrorKind);

impl embedded_hal::i2c::Error for SimError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

#[derive(Debug, Default)]
struct SimState {
    banks: HashMap<u8, [u8; 256]>,
    pointers: HashMap<u8, u8>,
    fail_writes: HashSet<u8>,
    fail_reads: HashSet<u8>,
    log: Vec<(u8, u8, u8)>,
}

fn power_on_bank() -> [u8; 256] {
    let mut bank = [0u8; 256];
    for (reg, value) in RESET_DEFAULTS {
        bank[usize::from(reg)] = value;
    }
    bank
}

/// Cloneable handle; clones share the same chips.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBus {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBus {
    /// Bus with one chip at each of `addresses`.
    pub fn new(addresses: &[u8]) -> Self {
        let bus = Self::default();
        {
            let mut state = bus.state.lock().unwrap();
            for &address in addresses {
                state.banks.insert(address, power_on_bank());
            }
        }
        bus
    }

    /// Current value of `reg` on the chip at `address`.
    pub fn reg(&self, address: u8, reg: u8) -> u8 {
        self.state.lock().unwrap().banks[&address][usize::from(reg)]
    }

    /// Poke a register without logging it.
    pub fn set_reg(&self, address: u8, reg: u8, value: u8) {
        self.state.lock().unwrap().banks.get_mut(&address).unwrap()[usize::from(reg)] = value;
    }

    /// Make the chip at `address` NACK every data write.
    pub fn fail_writes(&self, address: u8) {
        self.state.lock().unwrap().fail_writes.insert(address);
    }

    /// Make the chip at `address` NACK every read.
    pub fn fail_reads(&self, address: u8) {
        self.state.lock().unwrap().fail_reads.insert(address);
    }

    /// Clear injected failures on `address`.
    pub fn heal(&self, address: u8) {
        let mut state = self.state.lock().unwrap();
        state.fail_writes.remove(&address);
        state.fail_reads.remove(&address);
    }

    /// Drop the chip's configuration, as a power loss would.
    pub fn power_cycle(&self, address: u8) {
        self.state.lock().unwrap().banks.insert(address, power_on_bank());
    }

    /// Every accepted write, `(address, reg, value)`, in order.
    pub fn writes(&self) -> Vec<(u8, u8, u8)> {
        self.state.lock().unwrap().log.clone()
    }

    /// Accepted writes to `address`, `(reg, value)`.
    pub fn writes_to(&self, address: u8) -> Vec<(u8, u8)> {
        self.writes()
            .into_iter()
            .filter(|(a, _, _)| *a == address)
            .map(|(_, r, v)| (r, v))
            .collect()
    }

    /// Forget the write log.
    pub fn clear_log(&self) {
        self.state.lock().unwrap().log.clear();
    }

    /// Mute bits of REG14 and REG15 on `address`.
    pub fn mute_bits(&self, address: u8) -> (u8, u8) {
        (self.reg(address, 0x14) & 0x03, self.reg(address, 0x15) & 0x03)
    }
}

impl ErrorType for SimulatedBus {
    type Error = SimError;
}

impl I2c for SimulatedBus {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap();
        if !state.banks.contains_key(&address) {
            return Err(SimError(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)));
        }
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    let Some((&reg, data)) = bytes.split_first() else {
                        continue;
                    };
                    if !data.is_empty() && state.fail_writes.contains(&address) {
                        return Err(SimError(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)));
                    }
                    let mut pointer = reg;
                    for &value in data {
                        state.banks.get_mut(&address).unwrap()[usize::from(pointer)] = value;
                        state.log.push((address, pointer, value));
                        pointer = pointer.wrapping_add(1);
                    }
                    state.pointers.insert(address, pointer);
                }
                Operation::Read(buf) => {
                    if state.fail_reads.contains(&address) {
                        return Err(SimError(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)));
                    }
                    let mut pointer = state.pointers.get(&address).copied().unwrap_or(0);
                    for slot in buf.iter_mut() {
                        *slot = state.banks[&address][usize::from(pointer)];
                        pointer = pointer.wrapping_add(1);
                    }
                    state.pointers.insert(address, pointer);
                }
            }
        }
        Ok(())
    }
}
