//! Compressed (C extension) decoding, RV32 forms only.
//!
//! Every compressed instruction is a 16-bit alias for a full-width one,
//! so decoding expands straight to [`Op`] variants. Reserved encodings
//! (zero immediates where the ISA demands nonzero, `x0` where it is
//! forbidden, RV64-only forms) return `None`.

use crate::op::Op;
use crate::reg::Reg;

/// Sign-extend the low `bits` bits of `val`.
const fn sext(val: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((val << shift) as i32) >> shift
}

fn bit(raw: u16, n: u32) -> u32 {
    ((raw >> n) & 1) as u32
}

fn bits(raw: u16, hi: u32, lo: u32) -> u32 {
    ((raw >> lo) as u32) & ((1 << (hi - lo + 1)) - 1)
}

/// `c.jal`/`c.j` offset: [11|4|9:8|10|6|7|3:1|5] from inst[12:2].
fn cj_offset(raw: u16) -> i32 {
    let imm = (bit(raw, 12) << 11)
        | (bit(raw, 11) << 4)
        | (bits(raw, 10, 9) << 8)
        | (bit(raw, 8) << 10)
        | (bit(raw, 7) << 6)
        | (bit(raw, 6) << 7)
        | (bits(raw, 5, 3) << 1)
        | (bit(raw, 2) << 5);
    sext(imm, 12)
}

/// `c.beqz`/`c.bnez` offset: [8|4:3|7:6|2:1|5] from inst[12:10] and inst[6:2].
fn cb_offset(raw: u16) -> i32 {
    let imm = (bit(raw, 12) << 8)
        | (bits(raw, 11, 10) << 3)
        | (bits(raw, 6, 5) << 6)
        | (bits(raw, 4, 3) << 1)
        | (bit(raw, 2) << 5);
    sext(imm, 9)
}

/// 6-bit immediate [12|6:2], sign-extended.
fn ci_imm(raw: u16) -> i32 {
    sext((bit(raw, 12) << 5) | bits(raw, 6, 2), 6)
}

pub(crate) fn decode16(raw: u16) -> Option<Op> {
    if raw == 0 {
        // Defined illegal instruction.
        return None;
    }
    match raw & 0b11 {
        0b00 => quadrant0(raw),
        0b01 => quadrant1(raw),
        0b10 => quadrant2(raw),
        _ => unreachable!("full-width encodings are handled by the caller"),
    }
}

fn quadrant0(raw: u16) -> Option<Op> {
    let rd = Reg::from_bits_c(bits(raw, 4, 2));
    let rs1 = Reg::from_bits_c(bits(raw, 9, 7));
    match bits(raw, 15, 13) {
        0b000 => {
            // c.addi4spn: uimm[5:4|9:6|2|3] from inst[12:5].
            let uimm = (bits(raw, 12, 11) << 4)
                | (bits(raw, 10, 7) << 6)
                | (bit(raw, 6) << 2)
                | (bit(raw, 5) << 3);
            if uimm == 0 {
                return None;
            }
            Some(Op::Addi {
                rd,
                rs1: Reg::Sp,
                imm: uimm as i32,
            })
        }
        0b010 => {
            // c.lw: uimm[5:3|2|6].
            let uimm = (bits(raw, 12, 10) << 3) | (bit(raw, 6) << 2) | (bit(raw, 5) << 6);
            Some(Op::Lw {
                rd,
                rs1,
                offset: uimm as i32,
            })
        }
        0b110 => {
            let uimm = (bits(raw, 12, 10) << 3) | (bit(raw, 6) << 2) | (bit(raw, 5) << 6);
            Some(Op::Sw {
                rs1,
                rs2: rd,
                offset: uimm as i32,
            })
        }
        // c.fld/c.fsd/c.flw need the F/D extensions.
        _ => None,
    }
}

fn quadrant1(raw: u16) -> Option<Op> {
    match bits(raw, 15, 13) {
        0b000 => {
            // c.addi; rd=x0, imm=0 is the canonical c.nop.
            let rd = Reg::from_bits(bits(raw, 11, 7));
            Some(Op::Addi {
                rd,
                rs1: rd,
                imm: ci_imm(raw),
            })
        }
        0b001 => Some(Op::Jal {
            rd: Reg::Ra,
            offset: cj_offset(raw),
        }),
        0b010 => Some(Op::Addi {
            rd: Reg::from_bits(bits(raw, 11, 7)),
            rs1: Reg::Zero,
            imm: ci_imm(raw),
        }),
        0b011 => {
            let rd = Reg::from_bits(bits(raw, 11, 7));
            if rd == Reg::Sp {
                // c.addi16sp: nzimm[9|4|6|8:7|5] from inst[12|6|5|4:3|2].
                let imm = (bit(raw, 12) << 9)
                    | (bit(raw, 6) << 4)
                    | (bit(raw, 5) << 6)
                    | (bits(raw, 4, 3) << 7)
                    | (bit(raw, 2) << 5);
                if imm == 0 {
                    return None;
                }
                Some(Op::Addi {
                    rd: Reg::Sp,
                    rs1: Reg::Sp,
                    imm: sext(imm, 10),
                })
            } else {
                // c.lui: nzimm[17|16:12].
                let imm = (bit(raw, 12) << 17) | (bits(raw, 6, 2) << 12);
                if imm == 0 {
                    return None;
                }
                Some(Op::Lui {
                    rd,
                    imm: sext(imm, 18),
                })
            }
        }
        0b100 => {
            let rd = Reg::from_bits_c(bits(raw, 9, 7));
            match bits(raw, 11, 10) {
                0b00 | 0b01 => {
                    // c.srli/c.srai; shamt[5] is reserved on RV32.
                    if bit(raw, 12) != 0 {
                        return None;
                    }
                    let shamt = bits(raw, 6, 2);
                    if bits(raw, 11, 10) == 0b00 {
                        Some(Op::Srli {
                            rd,
                            rs1: rd,
                            shamt,
                        })
                    } else {
                        Some(Op::Srai {
                            rd,
                            rs1: rd,
                            shamt,
                        })
                    }
                }
                0b10 => Some(Op::Andi {
                    rd,
                    rs1: rd,
                    imm: ci_imm(raw),
                }),
                _ => {
                    if bit(raw, 12) != 0 {
                        // c.subw/c.addw are RV64.
                        return None;
                    }
                    let rs2 = Reg::from_bits_c(bits(raw, 4, 2));
                    match bits(raw, 6, 5) {
                        0b00 => Some(Op::Sub { rd, rs1: rd, rs2 }),
                        0b01 => Some(Op::Xor { rd, rs1: rd, rs2 }),
                        0b10 => Some(Op::Or { rd, rs1: rd, rs2 }),
                        _ => Some(Op::And { rd, rs1: rd, rs2 }),
                    }
                }
            }
        }
        0b101 => Some(Op::Jal {
            rd: Reg::Zero,
            offset: cj_offset(raw),
        }),
        0b110 => Some(Op::Beq {
            rs1: Reg::from_bits_c(bits(raw, 9, 7)),
            rs2: Reg::Zero,
            offset: cb_offset(raw),
        }),
        _ => Some(Op::Bne {
            rs1: Reg::from_bits_c(bits(raw, 9, 7)),
            rs2: Reg::Zero,
            offset: cb_offset(raw),
        }),
    }
}

fn quadrant2(raw: u16) -> Option<Op> {
    let rd = Reg::from_bits(bits(raw, 11, 7));
    let rs2 = Reg::from_bits(bits(raw, 6, 2));
    match bits(raw, 15, 13) {
        0b000 => {
            if bit(raw, 12) != 0 {
                // shamt[5] reserved on RV32.
                return None;
            }
            Some(Op::Slli {
                rd,
                rs1: rd,
                shamt: bits(raw, 6, 2),
            })
        }
        0b010 => {
            // c.lwsp: uimm[5|4:2|7:6]; rd=x0 is reserved.
            if rd == Reg::Zero {
                return None;
            }
            let uimm = (bit(raw, 12) << 5) | (bits(raw, 6, 4) << 2) | (bits(raw, 3, 2) << 6);
            Some(Op::Lw {
                rd,
                rs1: Reg::Sp,
                offset: uimm as i32,
            })
        }
        0b100 => match (bit(raw, 12), rd, rs2) {
            (0, Reg::Zero, _) => None,
            (0, rs1, Reg::Zero) => Some(Op::Jalr {
                rd: Reg::Zero,
                rs1,
                offset: 0,
            }),
            (0, rd, rs2) => Some(Op::Add {
                rd,
                rs1: Reg::Zero,
                rs2,
            }),
            (_, Reg::Zero, Reg::Zero) => Some(Op::Ebreak),
            (_, rs1, Reg::Zero) => Some(Op::Jalr {
                rd: Reg::Ra,
                rs1,
                offset: 0,
            }),
            (_, rd, rs2) => Some(Op::Add { rd, rs1: rd, rs2 }),
        },
        0b110 => {
            // c.swsp: uimm[5:2|7:6] from inst[12:7].
            let uimm = (bits(raw, 12, 9) << 2) | (bits(raw, 8, 7) << 6);
            Some(Op::Sw {
                rs1: Reg::Sp,
                rs2,
                offset: uimm as i32,
            })
        }
        _ => None,
    }
}
