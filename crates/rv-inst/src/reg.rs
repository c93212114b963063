//! Integer register file names.

use std::fmt;

/// One of the 32 integer registers, named after the RISC-V ABI mnemonics.
///
/// The discriminant is the architectural register number, so `Reg::A0 as
/// usize` indexes a register file directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Reg {
    Zero = 0,
    Ra,
    Sp,
    Gp,
    Tp,
    T0,
    T1,
    T2,
    S0,
    S1,
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
    A7,
    S2,
    S3,
    S4,
    S5,
    S6,
    S7,
    S8,
    S9,
    S10,
    S11,
    T3,
    T4,
    T5,
    T6,
}

impl Reg {
    /// Build a register from a 5-bit instruction field.
    ///
    /// Only the low five bits are honored, so any raw field value maps to
    /// a valid register.
    pub const fn from_bits(bits: u32) -> Reg {
        match bits & 0x1f {
            0 => Reg::Zero,
            1 => Reg::Ra,
            2 => Reg::Sp,
            3 => Reg::Gp,
            4 => Reg::Tp,
            5 => Reg::T0,
            6 => Reg::T1,
            7 => Reg::T2,
            8 => Reg::S0,
            9 => Reg::S1,
            10 => Reg::A0,
            11 => Reg::A1,
            12 => Reg::A2,
            13 => Reg::A3,
            14 => Reg::A4,
            15 => Reg::A5,
            16 => Reg::A6,
            17 => Reg::A7,
            18 => Reg::S2,
            19 => Reg::S3,
            20 => Reg::S4,
            21 => Reg::S5,
            22 => Reg::S6,
            23 => Reg::S7,
            24 => Reg::S8,
            25 => Reg::S9,
            26 => Reg::S10,
            27 => Reg::S11,
            28 => Reg::T3,
            29 => Reg::T4,
            30 => Reg::T5,
            _ => Reg::T6,
        }
    }

    /// Build a register from a compressed three-bit field (maps to x8..x15).
    pub const fn from_bits_c(bits: u32) -> Reg {
        Reg::from_bits(8 + (bits & 0x7))
    }

    /// ABI mnemonic for this register.
    pub const fn name(self) -> &'static str {
        match self {
            Reg::Zero => "zero",
            Reg::Ra => "ra",
            Reg::Sp => "sp",
            Reg::Gp => "gp",
            Reg::Tp => "tp",
            Reg::T0 => "t0",
            Reg::T1 => "t1",
            Reg::T2 => "t2",
            Reg::S0 => "s0",
            Reg::S1 => "s1",
            Reg::A0 => "a0",
            Reg::A1 => "a1",
            Reg::A2 => "a2",
            Reg::A3 => "a3",
            Reg::A4 => "a4",
            Reg::A5 => "a5",
            Reg::A6 => "a6",
            Reg::A7 => "a7",
            Reg::S2 => "s2",
            Reg::S3 => "s3",
            Reg::S4 => "s4",
            Reg::S5 => "s5",
            Reg::S6 => "s6",
            Reg::S7 => "s7",
            Reg::S8 => "s8",
            Reg::S9 => "s9",
            Reg::S10 => "s10",
            Reg::S11 => "s11",
            Reg::T3 => "t3",
            Reg::T4 => "t4",
            Reg::T5 => "t5",
            Reg::T6 => "t6",
        }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_numbers_match_abi() {
        assert_eq!(Reg::Zero as usize, 0);
        assert_eq!(Reg::Sp as usize, 2);
        assert_eq!(Reg::A0 as usize, 10);
        assert_eq!(Reg::A7 as usize, 17);
        assert_eq!(Reg::T6 as usize, 31);
    }

    #[test]
    fn from_bits_masks_high_bits() {
        assert_eq!(Reg::from_bits(10), Reg::A0);
        assert_eq!(Reg::from_bits(32 + 10), Reg::A0);
    }

    #[test]
    fn compressed_fields_select_x8_to_x15() {
        assert_eq!(Reg::from_bits_c(0), Reg::S0);
        assert_eq!(Reg::from_bits_c(7), Reg::A5);
    }

    #[test]
    fn display_uses_abi_names() {
        assert_eq!(Reg::S11.to_string(), "s11");
        assert_eq!(Reg::Zero.to_string(), "zero");
    }
}
