//! Broadcast register access over every chip of the array.
//!
//! A [`ChipSet`] owns the bus and one [`RegisterPort`] per chip, in
//! channel-group order. Broadcast operations visit every chip in index order
//! and never stop early: a chip that fails is recorded in the returned
//! [`BroadcastError`] and the remaining chips are still written. There is no
//! rollback, so after a partial failure the failed chips may disagree with
//! the others until the next successful write.
//!
//! `update_bits` is a read-modify-write per chip and is not atomic across the
//! set. Callers serialise access (see [`AdcArray`](crate::AdcArray)).
//!
//! Every successful write is recorded in a per-chip register cache so that
//! [`sync_cache`](ChipSet::sync_cache) can replay the configuration after the
//! chips lost it in power-down.

use heapless::Vec;

use crate::bus::RegisterBus;
use crate::error::{BroadcastError, ChipFailure, ConfigurationError};
use crate::registers::{is_volatile, reset_default, REGISTER_COUNT};

/// Largest number of chips one set can hold.
pub const MAX_CHIPS: usize = 8;

/// One chip's register space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterPort {
    address: u8,
}

impl RegisterPort {
    /// Port for the chip answering at 7-bit `address`.
    pub const fn new(address: u8) -> Self {
        Self { address }
    }

    /// 7-bit bus address.
    pub const fn address(&self) -> u8 {
        self.address
    }
}

/// Last value written to each register of one chip.
#[derive(Debug, Clone)]
struct RegisterCache {
    values: [Option<u8>; REGISTER_COUNT],
}

impl RegisterCache {
    const fn new() -> Self {
        Self {
            values: [None; REGISTER_COUNT],
        }
    }

    fn store(&mut self, register: u8, value: u8) {
        if let Some(slot) = self.values.get_mut(usize::from(register)) {
            *slot = Some(value);
        }
    }

    fn get(&self, register: u8) -> Option<u8> {
        self.values.get(usize::from(register)).copied().flatten()
    }

    /// Registers whose cached value differs from the power-on default.
    fn dirty(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        (0..=u8::MAX)
            .zip(self.values.iter())
            .filter_map(|(register, value)| value.map(|v| (register, v)))
            .filter(|&(register, value)| {
                !is_volatile(register) && reset_default(register) != Some(value)
            })
    }
}

/// Ordered set of chips sharing one bus.
pub struct ChipSet<B> {
    bus: B,
    ports: Vec<RegisterPort, MAX_CHIPS>,
    caches: Vec<RegisterCache, MAX_CHIPS>,
}

impl<B: RegisterBus> ChipSet<B> {
    /// Build a set from chip addresses in channel-group order.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::NoChips`], [`ConfigurationError::TooManyChips`]
    /// or [`ConfigurationError::DuplicateAddress`].
    pub fn new(bus: B, addresses: &[u8]) -> Result<Self, ConfigurationError> {
        if addresses.is_empty() {
            return Err(ConfigurationError::NoChips);
        }
        if addresses.len() > MAX_CHIPS {
            return Err(ConfigurationError::TooManyChips(addresses.len(), MAX_CHIPS));
        }
        let mut ports: Vec<RegisterPort, MAX_CHIPS> = Vec::new();
        let mut caches: Vec<RegisterCache, MAX_CHIPS> = Vec::new();
        for &address in addresses {
            if ports.iter().any(|p| p.address() == address) {
                return Err(ConfigurationError::DuplicateAddress(address));
            }
            ports
                .push(RegisterPort::new(address))
                .map_err(|_| ConfigurationError::TooManyChips(addresses.len(), MAX_CHIPS))?;
            caches
                .push(RegisterCache::new())
                .map_err(|_| ConfigurationError::TooManyChips(addresses.len(), MAX_CHIPS))?;
        }
        Ok(Self { bus, ports, caches })
    }

    /// Number of chips.
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// Always `false`: construction rejects empty sets.
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Ports in channel-group order.
    pub fn ports(&self) -> &[RegisterPort] {
        &self.ports
    }

    /// Give the bus back.
    pub fn release(self) -> B {
        self.bus
    }

    /// Value last written to `register` of chip `index` through this set.
    pub fn cached(&self, index: usize, register: u8) -> Option<u8> {
        self.caches.get(index).and_then(|c| c.get(register))
    }

    /// Write `value` to `register` on every chip, in index order.
    pub async fn write(&mut self, register: u8, value: u8) -> Result<(), BroadcastError> {
        let mut failures = BroadcastError::new();
        for index in 0..self.ports.len() {
            if let Err(failure) = self.write_chip(index, register, value).await {
                failures.record(failure);
            }
        }
        failures.into_result()
    }

    /// Replace the `mask` bits of `register` with those of `value`, on every chip.
    pub async fn update_bits(
        &mut self,
        register: u8,
        mask: u8,
        value: u8,
    ) -> Result<(), BroadcastError> {
        let mut failures = BroadcastError::new();
        for index in 0..self.ports.len() {
            if let Err(failure) = self.update_chip(index, register, mask, value).await {
                failures.record(failure);
            }
        }
        failures.into_result()
    }

    /// Write `value` to `register` on chip `index` only.
    pub async fn write_one(
        &mut self,
        index: usize,
        register: u8,
        value: u8,
    ) -> Result<(), BroadcastError> {
        let mut failures = BroadcastError::new();
        if let Err(failure) = self.write_chip(index, register, value).await {
            failures.record(failure);
        }
        failures.into_result()
    }

    /// Read-modify-write `register` on chip `index` only.
    pub async fn update_bits_one(
        &mut self,
        index: usize,
        register: u8,
        mask: u8,
        value: u8,
    ) -> Result<(), BroadcastError> {
        let mut failures = BroadcastError::new();
        if let Err(failure) = self.update_chip(index, register, mask, value).await {
            failures.record(failure);
        }
        failures.into_result()
    }

    /// Read `register` from chip `index`, bypassing the cache.
    pub async fn read_one(&mut self, index: usize, register: u8) -> Result<u8, BroadcastError> {
        let mut failures = BroadcastError::new();
        match self.read_chip(index, register).await {
            Ok(value) => return Ok(value),
            Err(failure) => failures.record(failure),
        }
        Err(failures)
    }

    /// Replay every cached register that differs from its power-on default.
    ///
    /// Returns how many register writes succeeded.
    pub async fn sync_cache(&mut self) -> Result<usize, BroadcastError> {
        let mut failures = BroadcastError::new();
        let mut written: usize = 0;
        for index in 0..self.ports.len() {
            let mut pending: Vec<(u8, u8), REGISTER_COUNT> = Vec::new();
            if let Some(cache) = self.caches.get(index) {
                for entry in cache.dirty() {
                    // Capacity is REGISTER_COUNT; a cache holds at most that many entries.
                    let _ = pending.push(entry);
                }
            }
            for (register, value) in pending {
                match self.write_chip(index, register, value).await {
                    Ok(()) => written = written.saturating_add(1),
                    Err(failure) => failures.record(failure),
                }
            }
        }
        debug!("cache sync replayed {} register writes", written);
        failures.into_result().map(|()| written)
    }

    async fn write_chip(&mut self, index: usize, register: u8, value: u8) -> Result<(), ChipFailure> {
        let address = self.port_address(index, register)?;
        trace!("chip {} ({:#x}): write reg {:#x} = {:#x}", index, address, register, value);
        match self.bus.write_register(address, register, value).await {
            Ok(()) => {
                if let Some(cache) = self.caches.get_mut(index) {
                    cache.store(register, value);
                }
                Ok(())
            }
            Err(error) => {
                warn!(
                    "chip {} ({:#x}): write reg {:#x} failed: {:?}",
                    index, address, register, error
                );
                Err(ChipFailure { index, address, register, error })
            }
        }
    }

    async fn read_chip(&mut self, index: usize, register: u8) -> Result<u8, ChipFailure> {
        let address = self.port_address(index, register)?;
        self.bus.read_register(address, register).await.map_err(|error| {
            warn!(
                "chip {} ({:#x}): read reg {:#x} failed: {:?}",
                index, address, register, error
            );
            ChipFailure { index, address, register, error }
        })
    }

    async fn update_chip(
        &mut self,
        index: usize,
        register: u8,
        mask: u8,
        value: u8,
    ) -> Result<(), ChipFailure> {
        let current = self.read_chip(index, register).await?;
        let updated = (current & !mask) | (value & mask);
        self.write_chip(index, register, updated).await
    }

    // An index outside the set behaves like a chip that never acknowledges.
    fn port_address(&self, index: usize, register: u8) -> Result<u8, ChipFailure> {
        self.ports
            .get(index)
            .map(RegisterPort::address)
            .ok_or(ChipFailure {
                index,
                address: 0,
                register,
                error: crate::error::BusError::NoAcknowledge,
            })
    }
}
