//! Register snapshot and sparse register result exchanged with the CPU.

use crate::error::DosError;

/// Carry flag, the DOS kernel's error indicator.
pub const FLAG_C: u8 = 0x01;

/// Zero flag. DRIVES reports a single drive when it is set.
pub const FLAG_Z: u8 = 0x40;

/// CPU state captured when a trapped extension instruction executes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterSnapshot {
    /// Address of the trap instruction.
    pub pc: u16,
    pub sp: u16,
    pub f: u8,
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub de: u16,
    pub hl: u16,
}

impl RegisterSnapshot {
    pub fn carry(&self) -> bool {
        self.f & FLAG_C != 0
    }

    pub fn zero(&self) -> bool {
        self.f & FLAG_Z != 0
    }

    pub fn d(&self) -> u8 {
        (self.de >> 8) as u8
    }

    pub fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }
}

/// Registers a routine wants changed, plus an optional timing hint.
///
/// Absent fields leave the CPU untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterResult {
    pub f: Option<u8>,
    pub a: Option<u8>,
    pub b: Option<u8>,
    pub hl: Option<u16>,
    /// Extra CPU cycles to charge for drive latency.
    pub extra_cycles: Option<u32>,
}

impl RegisterResult {
    /// Result that changes nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Carry cleared, every other flag preserved.
    pub fn success(f: u8) -> Self {
        Self {
            f: Some(f & !FLAG_C),
            ..Self::default()
        }
    }

    /// Carry set and the error code in A.
    pub fn failure(f: u8, error: DosError) -> Self {
        Self {
            f: Some(f | FLAG_C),
            a: Some(error.code()),
            ..Self::default()
        }
    }

    pub fn with_b(mut self, b: u8) -> Self {
        self.b = Some(b);
        self
    }

    pub fn with_hl(mut self, hl: u16) -> Self {
        self.hl = Some(hl);
        self
    }

    pub fn with_extra_cycles(mut self, cycles: u32) -> Self {
        self.extra_cycles = Some(cycles);
        self
    }

    /// True if no register is changed and no cycles are charged.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True if this result reports an error to the kernel.
    pub fn is_error(&self) -> bool {
        self.f.is_some_and(|f| f & FLAG_C != 0)
    }

    /// Apply to a snapshot, producing the state the CPU resumes with.
    pub fn apply(&self, regs: &RegisterSnapshot) -> RegisterSnapshot {
        RegisterSnapshot {
            f: self.f.unwrap_or(regs.f),
            a: self.a.unwrap_or(regs.a),
            b: self.b.unwrap_or(regs.b),
            hl: self.hl.unwrap_or(regs.hl),
            ..*regs
        }
    }
}
