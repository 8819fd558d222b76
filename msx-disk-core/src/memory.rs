//! Memory bus abstraction and the block transfer bridge.
//!
//! Routine handlers never touch RAM directly. They go through a
//! [`MemoryBus`] so the same driver works against a flat test memory or a
//! slotted machine bus.

use log::trace;

/// Byte-addressable view of the emulated machine's memory.
pub trait MemoryBus {
    /// Read one byte.
    fn read(&self, address: u16) -> u8;

    /// Write one byte.
    fn write(&mut self, address: u16, value: u8);
}

impl<T: MemoryBus + ?Sized> MemoryBus for &mut T {
    fn read(&self, address: u16) -> u8 {
        (**self).read(address)
    }

    fn write(&mut self, address: u16, value: u8) {
        (**self).write(address, value)
    }
}

/// Plain 64 KiB RAM with no slot mapping.
#[derive(Clone)]
pub struct FlatMemory {
    bytes: Box<[u8; 0x10000]>,
}

impl Default for FlatMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl FlatMemory {
    pub fn new() -> Self {
        Self {
            bytes: Box::new([0; 0x10000]),
        }
    }

    /// Copy data into memory at a specific address, clipped at the top of RAM.
    pub fn load_at(&mut self, address: u16, data: &[u8]) {
        let start = address as usize;
        let end = (start + data.len()).min(self.bytes.len());
        self.bytes[start..end].copy_from_slice(&data[..end - start]);
    }

    /// Whole address space as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..]
    }

    /// Whole address space as a mutable array, for the CPU core.
    pub fn as_array_mut(&mut self) -> &mut [u8; 0x10000] {
        &mut self.bytes
    }
}

impl MemoryBus for FlatMemory {
    fn read(&self, address: u16) -> u8 {
        self.bytes[address as usize]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.bytes[address as usize] = value;
    }
}

/// Read `len` bytes starting at `address`. Addresses wrap at 64 KiB.
pub fn read_block<B: MemoryBus + ?Sized>(bus: &B, address: u16, len: usize) -> Vec<u8> {
    trace!("read_block {:#06X} len={}", address, len);
    (0..len)
        .map(|i| bus.read(address.wrapping_add(i as u16)))
        .collect()
}

/// Write `bytes` starting at `address`. Addresses wrap at 64 KiB.
pub fn write_block<B: MemoryBus + ?Sized>(bus: &mut B, address: u16, bytes: &[u8]) {
    trace!("write_block {:#06X} len={}", address, bytes.len());
    for (i, &byte) in bytes.iter().enumerate() {
        bus.write(address.wrapping_add(i as u16), byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_transfer() {
        let mut mem = FlatMemory::new();
        write_block(&mut mem, 0xC000, &[1, 2, 3, 4]);
        assert_eq!(read_block(&mem, 0xC000, 4), vec![1, 2, 3, 4]);
        assert_eq!(mem.read(0xC004), 0);
    }

    #[test]
    fn test_block_wraps_at_top_of_memory() {
        let mut mem = FlatMemory::new();
        write_block(&mut mem, 0xFFFE, &[0xAA, 0xBB, 0xCC]);
        assert_eq!(mem.read(0xFFFE), 0xAA);
        assert_eq!(mem.read(0xFFFF), 0xBB);
        assert_eq!(mem.read(0x0000), 0xCC);
        assert_eq!(read_block(&mem, 0xFFFF, 2), vec![0xBB, 0xCC]);
    }

    #[test]
    fn test_load_at_clips() {
        let mut mem = FlatMemory::new();
        mem.load_at(0xFFFF, &[1, 2, 3]);
        assert_eq!(mem.read(0xFFFF), 1);
        assert_eq!(mem.read(0x0000), 0);
    }
}
