//! Instruction decoding.

use crate::csr::Csr;
use crate::op::Op;
use crate::reg::Reg;
use crate::rvc;

/// A decoded instruction together with its encoded length in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub op: Op,
    /// 2 for compressed encodings, 4 otherwise.
    pub len: u32,
}

/// Decode the instruction starting in the low bits of `raw`.
///
/// `raw` is a little-endian 32-bit fetch from the instruction address. If
/// the low two bits are `11` the whole word is consumed; otherwise only
/// the low 16 bits are, as a compressed encoding. Returns `None` for
/// encodings outside RV32IMAC + Zicsr, for wider-than-32-bit encoding
/// groups, and for the defined-illegal all-zero halfword.
pub fn decode(raw: u32) -> Option<Decoded> {
    if raw & 0b11 == 0b11 {
        // Bits [4:2] = 111 marks 48-bit and longer encodings.
        if raw & 0b11100 == 0b11100 {
            return None;
        }
        decode32(raw).map(|op| Decoded { op, len: 4 })
    } else {
        rvc::decode16(raw as u16).map(|op| Decoded { op, len: 2 })
    }
}

const fn rd(raw: u32) -> Reg {
    Reg::from_bits(raw >> 7)
}

const fn rs1(raw: u32) -> Reg {
    Reg::from_bits(raw >> 15)
}

const fn rs2(raw: u32) -> Reg {
    Reg::from_bits(raw >> 20)
}

const fn funct3(raw: u32) -> u32 {
    (raw >> 12) & 0b111
}

const fn funct7(raw: u32) -> u32 {
    raw >> 25
}

/// I-type immediate: bits [31:20], sign-extended.
const fn imm_i(raw: u32) -> i32 {
    (raw as i32) >> 20
}

/// S-type immediate: bits [31:25|11:7], sign-extended.
const fn imm_s(raw: u32) -> i32 {
    (((raw as i32) >> 25) << 5) | (((raw >> 7) & 0x1f) as i32)
}

/// B-type immediate: a signed multiple of two in [-4096, 4094].
const fn imm_b(raw: u32) -> i32 {
    (((raw as i32) >> 31) << 12)
        | ((((raw >> 25) & 0x3f) as i32) << 5)
        | ((((raw >> 8) & 0xf) as i32) << 1)
        | ((((raw >> 7) & 1) as i32) << 11)
}

/// U-type immediate: bits [31:12] already in position.
const fn imm_u(raw: u32) -> i32 {
    (raw & 0xffff_f000) as i32
}

/// J-type immediate: a signed multiple of two in [-1 MiB, 1 MiB).
const fn imm_j(raw: u32) -> i32 {
    (((raw as i32) >> 31) << 20)
        | ((((raw >> 21) & 0x3ff) as i32) << 1)
        | ((((raw >> 20) & 1) as i32) << 11)
        | ((((raw >> 12) & 0xff) as i32) << 12)
}

fn decode32(raw: u32) -> Option<Op> {
    match raw & 0x7f {
        0x37 => Some(Op::Lui {
            rd: rd(raw),
            imm: imm_u(raw),
        }),
        0x17 => Some(Op::Auipc {
            rd: rd(raw),
            imm: imm_u(raw),
        }),
        0x6f => Some(Op::Jal {
            rd: rd(raw),
            offset: imm_j(raw),
        }),
        0x67 if funct3(raw) == 0 => Some(Op::Jalr {
            rd: rd(raw),
            rs1: rs1(raw),
            offset: imm_i(raw),
        }),
        0x63 => decode_branch(raw),
        0x03 => decode_load(raw),
        0x23 => decode_store(raw),
        0x13 => decode_op_imm(raw),
        0x33 => decode_op(raw),
        0x0f => match funct3(raw) {
            0b000 => Some(Op::Fence),
            0b001 => Some(Op::FenceI),
            _ => None,
        },
        0x73 => decode_system(raw),
        0x2f => decode_amo(raw),
        _ => None,
    }
}

fn decode_branch(raw: u32) -> Option<Op> {
    let (rs1, rs2, offset) = (rs1(raw), rs2(raw), imm_b(raw));
    match funct3(raw) {
        0b000 => Some(Op::Beq { rs1, rs2, offset }),
        0b001 => Some(Op::Bne { rs1, rs2, offset }),
        0b100 => Some(Op::Blt { rs1, rs2, offset }),
        0b101 => Some(Op::Bge { rs1, rs2, offset }),
        0b110 => Some(Op::Bltu { rs1, rs2, offset }),
        0b111 => Some(Op::Bgeu { rs1, rs2, offset }),
        _ => None,
    }
}

fn decode_load(raw: u32) -> Option<Op> {
    let (rd, rs1, offset) = (rd(raw), rs1(raw), imm_i(raw));
    match funct3(raw) {
        0b000 => Some(Op::Lb { rd, rs1, offset }),
        0b001 => Some(Op::Lh { rd, rs1, offset }),
        0b010 => Some(Op::Lw { rd, rs1, offset }),
        0b100 => Some(Op::Lbu { rd, rs1, offset }),
        0b101 => Some(Op::Lhu { rd, rs1, offset }),
        _ => None,
    }
}

fn decode_store(raw: u32) -> Option<Op> {
    let (rs1, rs2, offset) = (rs1(raw), rs2(raw), imm_s(raw));
    match funct3(raw) {
        0b000 => Some(Op::Sb { rs1, rs2, offset }),
        0b001 => Some(Op::Sh { rs1, rs2, offset }),
        0b010 => Some(Op::Sw { rs1, rs2, offset }),
        _ => None,
    }
}

fn decode_op_imm(raw: u32) -> Option<Op> {
    let (rd, rs1, imm) = (rd(raw), rs1(raw), imm_i(raw));
    // Shift amounts live in the rs2 field; on RV32 bit 25 must be clear.
    let shamt = (raw >> 20) & 0x1f;
    match funct3(raw) {
        0b000 => Some(Op::Addi { rd, rs1, imm }),
        0b010 => Some(Op::Slti { rd, rs1, imm }),
        0b011 => Some(Op::Sltiu { rd, rs1, imm }),
        0b100 => Some(Op::Xori { rd, rs1, imm }),
        0b110 => Some(Op::Ori { rd, rs1, imm }),
        0b111 => Some(Op::Andi { rd, rs1, imm }),
        0b001 if funct7(raw) == 0 => Some(Op::Slli { rd, rs1, shamt }),
        0b101 if funct7(raw) == 0 => Some(Op::Srli { rd, rs1, shamt }),
        0b101 if funct7(raw) == 0b0100000 => Some(Op::Srai { rd, rs1, shamt }),
        _ => None,
    }
}

fn decode_op(raw: u32) -> Option<Op> {
    let (rd, rs1, rs2) = (rd(raw), rs1(raw), rs2(raw));
    match (funct7(raw), funct3(raw)) {
        (0b0000000, 0b000) => Some(Op::Add { rd, rs1, rs2 }),
        (0b0100000, 0b000) => Some(Op::Sub { rd, rs1, rs2 }),
        (0b0000000, 0b001) => Some(Op::Sll { rd, rs1, rs2 }),
        (0b0000000, 0b010) => Some(Op::Slt { rd, rs1, rs2 }),
        (0b0000000, 0b011) => Some(Op::Sltu { rd, rs1, rs2 }),
        (0b0000000, 0b100) => Some(Op::Xor { rd, rs1, rs2 }),
        (0b0000000, 0b101) => Some(Op::Srl { rd, rs1, rs2 }),
        (0b0100000, 0b101) => Some(Op::Sra { rd, rs1, rs2 }),
        (0b0000000, 0b110) => Some(Op::Or { rd, rs1, rs2 }),
        (0b0000000, 0b111) => Some(Op::And { rd, rs1, rs2 }),
        (0b0000001, 0b000) => Some(Op::Mul { rd, rs1, rs2 }),
        (0b0000001, 0b001) => Some(Op::Mulh { rd, rs1, rs2 }),
        (0b0000001, 0b010) => Some(Op::Mulhsu { rd, rs1, rs2 }),
        (0b0000001, 0b011) => Some(Op::Mulhu { rd, rs1, rs2 }),
        (0b0000001, 0b100) => Some(Op::Div { rd, rs1, rs2 }),
        (0b0000001, 0b101) => Some(Op::Divu { rd, rs1, rs2 }),
        (0b0000001, 0b110) => Some(Op::Rem { rd, rs1, rs2 }),
        (0b0000001, 0b111) => Some(Op::Remu { rd, rs1, rs2 }),
        _ => None,
    }
}

fn decode_system(raw: u32) -> Option<Op> {
    let (rd, rs1) = (rd(raw), rs1(raw));
    let csr = Csr::from_bits(raw >> 20);
    let uimm = (raw >> 15) & 0x1f;
    match funct3(raw) {
        0b000 => match raw >> 20 {
            0x000 => Some(Op::Ecall),
            0x001 => Some(Op::Ebreak),
            0x302 => Some(Op::Mret),
            0x105 => Some(Op::Wfi),
            _ => None,
        },
        0b001 => Some(Op::Csrrw { rd, rs1, csr }),
        0b010 => Some(Op::Csrrs { rd, rs1, csr }),
        0b011 => Some(Op::Csrrc { rd, rs1, csr }),
        0b101 => Some(Op::Csrrwi { rd, uimm, csr }),
        0b110 => Some(Op::Csrrsi { rd, uimm, csr }),
        0b111 => Some(Op::Csrrci { rd, uimm, csr }),
        _ => None,
    }
}

fn decode_amo(raw: u32) -> Option<Op> {
    if funct3(raw) != 0b010 {
        return None;
    }
    let (rd, rs1, rs2) = (rd(raw), rs1(raw), rs2(raw));
    // Bits [26:25] are aq/rl ordering hints; irrelevant to a single hart.
    match raw >> 27 {
        0b00010 if rs2 == Reg::Zero => Some(Op::LrW { rd, rs1 }),
        0b00011 => Some(Op::ScW { rd, rs1, rs2 }),
        0b00001 => Some(Op::AmoswapW { rd, rs1, rs2 }),
        0b00000 => Some(Op::AmoaddW { rd, rs1, rs2 }),
        0b00100 => Some(Op::AmoxorW { rd, rs1, rs2 }),
        0b01100 => Some(Op::AmoandW { rd, rs1, rs2 }),
        0b01000 => Some(Op::AmoorW { rd, rs1, rs2 }),
        0b10000 => Some(Op::AmominW { rd, rs1, rs2 }),
        0b10100 => Some(Op::AmomaxW { rd, rs1, rs2 }),
        0b11000 => Some(Op::AmominuW { rd, rs1, rs2 }),
        0b11100 => Some(Op::AmomaxuW { rd, rs1, rs2 }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(raw: u32) -> Op {
        let d = decode(raw).unwrap();
        assert_eq!(d.len, 4);
        d.op
    }

    #[test]
    fn decodes_addi() {
        // addi ra, zero, 5
        assert_eq!(
            op(0x0050_0093),
            Op::Addi {
                rd: Reg::Ra,
                rs1: Reg::Zero,
                imm: 5
            }
        );
        // addi a0, zero, 42
        assert_eq!(
            op(0x02a0_0513),
            Op::Addi {
                rd: Reg::A0,
                rs1: Reg::Zero,
                imm: 42
            }
        );
    }

    #[test]
    fn decodes_negative_i_immediate() {
        // addi sp, sp, -16
        assert_eq!(
            op(0xff01_0113),
            Op::Addi {
                rd: Reg::Sp,
                rs1: Reg::Sp,
                imm: -16
            }
        );
    }

    #[test]
    fn decodes_r_type() {
        // add gp, ra, sp
        assert_eq!(
            op(0x0020_81b3),
            Op::Add {
                rd: Reg::Gp,
                rs1: Reg::Ra,
                rs2: Reg::Sp
            }
        );
        // sub gp, ra, sp
        assert_eq!(
            op(0x4020_81b3),
            Op::Sub {
                rd: Reg::Gp,
                rs1: Reg::Ra,
                rs2: Reg::Sp
            }
        );
    }

    #[test]
    fn decodes_lui_and_auipc() {
        // lui ra, 0x12345
        assert_eq!(
            op(0x1234_50b7),
            Op::Lui {
                rd: Reg::Ra,
                imm: 0x1234_5000u32 as i32
            }
        );
        // auipc a0, 0x1
        assert_eq!(
            op(0x0000_1517),
            Op::Auipc {
                rd: Reg::A0,
                imm: 0x1000
            }
        );
    }

    #[test]
    fn decodes_loads_and_stores() {
        // lw a0, 8(sp)
        assert_eq!(
            op(0x0081_2503),
            Op::Lw {
                rd: Reg::A0,
                rs1: Reg::Sp,
                offset: 8
            }
        );
        // sw a0, 12(sp)
        assert_eq!(
            op(0x00a1_2623),
            Op::Sw {
                rs1: Reg::Sp,
                rs2: Reg::A0,
                offset: 12
            }
        );
        // sb a0, -1(sp)
        assert_eq!(
            op(0xfea1_0fa3),
            Op::Sb {
                rs1: Reg::Sp,
                rs2: Reg::A0,
                offset: -1
            }
        );
    }

    #[test]
    fn decodes_backward_branch() {
        // bne a0, t1, -4
        assert_eq!(
            op(0xfe65_1ee3),
            Op::Bne {
                rs1: Reg::A0,
                rs2: Reg::T1,
                offset: -4
            }
        );
    }

    #[test]
    fn decodes_jal_and_jalr() {
        // jal zero, 0 (self-loop)
        assert_eq!(
            op(0x0000_006f),
            Op::Jal {
                rd: Reg::Zero,
                offset: 0
            }
        );
        // jalr zero, 0(ra) == ret
        assert_eq!(
            op(0x0000_8067),
            Op::Jalr {
                rd: Reg::Zero,
                rs1: Reg::Ra,
                offset: 0
            }
        );
    }

    #[test]
    fn decodes_system_ops() {
        assert_eq!(op(0x0000_0073), Op::Ecall);
        assert_eq!(op(0x0010_0073), Op::Ebreak);
        assert_eq!(op(0x3020_0073), Op::Mret);
        // csrrs ra, mstatus, zero
        assert_eq!(
            op(0x3000_20f3),
            Op::Csrrs {
                rd: Reg::Ra,
                rs1: Reg::Zero,
                csr: Csr(0x300)
            }
        );
    }

    #[test]
    fn decodes_m_extension() {
        // mul gp, ra, sp
        assert_eq!(
            op(0x0220_81b3),
            Op::Mul {
                rd: Reg::Gp,
                rs1: Reg::Ra,
                rs2: Reg::Sp
            }
        );
        // divu gp, ra, sp
        assert_eq!(
            op(0x0220_d1b3),
            Op::Divu {
                rd: Reg::Gp,
                rs1: Reg::Ra,
                rs2: Reg::Sp
            }
        );
    }

    #[test]
    fn decodes_a_extension() {
        // lr.w a0, (a1) with aq set
        assert_eq!(
            op(0x1405_a52f),
            Op::LrW {
                rd: Reg::A0,
                rs1: Reg::A1
            }
        );
        // sc.w a0, a2, (a1)
        assert_eq!(
            op(0x18c5_a52f),
            Op::ScW {
                rd: Reg::A0,
                rs1: Reg::A1,
                rs2: Reg::A2
            }
        );
        // amoadd.w a0, a2, (a1)
        assert_eq!(
            op(0x00c5_a52f),
            Op::AmoaddW {
                rd: Reg::A0,
                rs1: Reg::A1,
                rs2: Reg::A2
            }
        );
    }

    #[test]
    fn rejects_rv64_shift_immediates() {
        // slli with bit 25 set (shamt 32) is only valid on RV64.
        assert_eq!(decode(0x0201_1093), None);
    }

    #[test]
    fn rejects_unknown_opcodes() {
        assert_eq!(decode(0xffff_ffff), None);
        // 48-bit encoding group.
        assert_eq!(decode(0x0000_003f), None);
    }
}
