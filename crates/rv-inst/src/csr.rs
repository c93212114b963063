//! Control and status register addresses.

use std::fmt;

/// A CSR address (12 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Csr(pub u16);

impl Csr {
    /// Build a CSR address from an instruction field, keeping the low 12 bits.
    pub const fn from_bits(bits: u32) -> Csr {
        Csr((bits & 0xfff) as u16)
    }

    /// Index into a flat 4096-entry CSR file.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Well-known name for this address, if it has one.
    pub const fn name(self) -> Option<&'static str> {
        match self.0 {
            0x300 => Some("mstatus"),
            0x301 => Some("misa"),
            0x304 => Some("mie"),
            0x305 => Some("mtvec"),
            0x340 => Some("mscratch"),
            0x341 => Some("mepc"),
            0x342 => Some("mcause"),
            0x343 => Some("mtval"),
            0x344 => Some("mip"),
            0xc00 => Some("cycle"),
            0xc01 => Some("time"),
            0xc02 => Some("instret"),
            0xf14 => Some("mhartid"),
            _ => None,
        }
    }
}

impl fmt::Display for Csr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:03x}", self.0),
        }
    }
}
