//! Decoded instruction forms.

use std::fmt;

use crate::csr::Csr;
use crate::reg::Reg;

/// A decoded RV32IMAC instruction.
///
/// Compressed encodings decode to the variant of their full-width
/// expansion, so this enum is the complete execution surface: an
/// interpreter that handles every variant handles the whole ISA subset.
/// Branch and jump offsets are relative to the address of the
/// instruction itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    // RV32I
    Lui { rd: Reg, imm: i32 },
    Auipc { rd: Reg, imm: i32 },
    Jal { rd: Reg, offset: i32 },
    Jalr { rd: Reg, rs1: Reg, offset: i32 },
    Beq { rs1: Reg, rs2: Reg, offset: i32 },
    Bne { rs1: Reg, rs2: Reg, offset: i32 },
    Blt { rs1: Reg, rs2: Reg, offset: i32 },
    Bge { rs1: Reg, rs2: Reg, offset: i32 },
    Bltu { rs1: Reg, rs2: Reg, offset: i32 },
    Bgeu { rs1: Reg, rs2: Reg, offset: i32 },
    Lb { rd: Reg, rs1: Reg, offset: i32 },
    Lh { rd: Reg, rs1: Reg, offset: i32 },
    Lw { rd: Reg, rs1: Reg, offset: i32 },
    Lbu { rd: Reg, rs1: Reg, offset: i32 },
    Lhu { rd: Reg, rs1: Reg, offset: i32 },
    Sb { rs1: Reg, rs2: Reg, offset: i32 },
    Sh { rs1: Reg, rs2: Reg, offset: i32 },
    Sw { rs1: Reg, rs2: Reg, offset: i32 },
    Addi { rd: Reg, rs1: Reg, imm: i32 },
    Slti { rd: Reg, rs1: Reg, imm: i32 },
    Sltiu { rd: Reg, rs1: Reg, imm: i32 },
    Xori { rd: Reg, rs1: Reg, imm: i32 },
    Ori { rd: Reg, rs1: Reg, imm: i32 },
    Andi { rd: Reg, rs1: Reg, imm: i32 },
    Slli { rd: Reg, rs1: Reg, shamt: u32 },
    Srli { rd: Reg, rs1: Reg, shamt: u32 },
    Srai { rd: Reg, rs1: Reg, shamt: u32 },
    Add { rd: Reg, rs1: Reg, rs2: Reg },
    Sub { rd: Reg, rs1: Reg, rs2: Reg },
    Sll { rd: Reg, rs1: Reg, rs2: Reg },
    Slt { rd: Reg, rs1: Reg, rs2: Reg },
    Sltu { rd: Reg, rs1: Reg, rs2: Reg },
    Xor { rd: Reg, rs1: Reg, rs2: Reg },
    Srl { rd: Reg, rs1: Reg, rs2: Reg },
    Sra { rd: Reg, rs1: Reg, rs2: Reg },
    Or { rd: Reg, rs1: Reg, rs2: Reg },
    And { rd: Reg, rs1: Reg, rs2: Reg },
    Fence,
    FenceI,
    Ecall,
    Ebreak,

    // Zicsr
    Csrrw { rd: Reg, rs1: Reg, csr: Csr },
    Csrrs { rd: Reg, rs1: Reg, csr: Csr },
    Csrrc { rd: Reg, rs1: Reg, csr: Csr },
    Csrrwi { rd: Reg, uimm: u32, csr: Csr },
    Csrrsi { rd: Reg, uimm: u32, csr: Csr },
    Csrrci { rd: Reg, uimm: u32, csr: Csr },

    // M
    Mul { rd: Reg, rs1: Reg, rs2: Reg },
    Mulh { rd: Reg, rs1: Reg, rs2: Reg },
    Mulhsu { rd: Reg, rs1: Reg, rs2: Reg },
    Mulhu { rd: Reg, rs1: Reg, rs2: Reg },
    Div { rd: Reg, rs1: Reg, rs2: Reg },
    Divu { rd: Reg, rs1: Reg, rs2: Reg },
    Rem { rd: Reg, rs1: Reg, rs2: Reg },
    Remu { rd: Reg, rs1: Reg, rs2: Reg },

    // A
    LrW { rd: Reg, rs1: Reg },
    ScW { rd: Reg, rs1: Reg, rs2: Reg },
    AmoswapW { rd: Reg, rs1: Reg, rs2: Reg },
    AmoaddW { rd: Reg, rs1: Reg, rs2: Reg },
    AmoxorW { rd: Reg, rs1: Reg, rs2: Reg },
    AmoandW { rd: Reg, rs1: Reg, rs2: Reg },
    AmoorW { rd: Reg, rs1: Reg, rs2: Reg },
    AmominW { rd: Reg, rs1: Reg, rs2: Reg },
    AmomaxW { rd: Reg, rs1: Reg, rs2: Reg },
    AmominuW { rd: Reg, rs1: Reg, rs2: Reg },
    AmomaxuW { rd: Reg, rs1: Reg, rs2: Reg },

    // Machine-level ops the toolchain emits in startup/trap stubs.
    Mret,
    Wfi,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Op::*;
        match *self {
            Lui { rd, imm } => write!(f, "lui {rd}, 0x{:x}", (imm as u32) >> 12),
            Auipc { rd, imm } => write!(f, "auipc {rd}, 0x{:x}", (imm as u32) >> 12),
            Jal { rd, offset } => write!(f, "jal {rd}, {offset}"),
            Jalr { rd, rs1, offset } => write!(f, "jalr {rd}, {offset}({rs1})"),
            Beq { rs1, rs2, offset } => write!(f, "beq {rs1}, {rs2}, {offset}"),
            Bne { rs1, rs2, offset } => write!(f, "bne {rs1}, {rs2}, {offset}"),
            Blt { rs1, rs2, offset } => write!(f, "blt {rs1}, {rs2}, {offset}"),
            Bge { rs1, rs2, offset } => write!(f, "bge {rs1}, {rs2}, {offset}"),
            Bltu { rs1, rs2, offset } => write!(f, "bltu {rs1}, {rs2}, {offset}"),
            Bgeu { rs1, rs2, offset } => write!(f, "bgeu {rs1}, {rs2}, {offset}"),
            Lb { rd, rs1, offset } => write!(f, "lb {rd}, {offset}({rs1})"),
            Lh { rd, rs1, offset } => write!(f, "lh {rd}, {offset}({rs1})"),
            Lw { rd, rs1, offset } => write!(f, "lw {rd}, {offset}({rs1})"),
            Lbu { rd, rs1, offset } => write!(f, "lbu {rd}, {offset}({rs1})"),
            Lhu { rd, rs1, offset } => write!(f, "lhu {rd}, {offset}({rs1})"),
            Sb { rs1, rs2, offset } => write!(f, "sb {rs2}, {offset}({rs1})"),
            Sh { rs1, rs2, offset } => write!(f, "sh {rs2}, {offset}({rs1})"),
            Sw { rs1, rs2, offset } => write!(f, "sw {rs2}, {offset}({rs1})"),
            Addi { rd, rs1, imm } => write!(f, "addi {rd}, {rs1}, {imm}"),
            Slti { rd, rs1, imm } => write!(f, "slti {rd}, {rs1}, {imm}"),
            Sltiu { rd, rs1, imm } => write!(f, "sltiu {rd}, {rs1}, {imm}"),
            Xori { rd, rs1, imm } => write!(f, "xori {rd}, {rs1}, {imm}"),
            Ori { rd, rs1, imm } => write!(f, "ori {rd}, {rs1}, {imm}"),
            Andi { rd, rs1, imm } => write!(f, "andi {rd}, {rs1}, {imm}"),
            Slli { rd, rs1, shamt } => write!(f, "slli {rd}, {rs1}, {shamt}"),
            Srli { rd, rs1, shamt } => write!(f, "srli {rd}, {rs1}, {shamt}"),
            Srai { rd, rs1, shamt } => write!(f, "srai {rd}, {rs1}, {shamt}"),
            Add { rd, rs1, rs2 } => write!(f, "add {rd}, {rs1}, {rs2}"),
            Sub { rd, rs1, rs2 } => write!(f, "sub {rd}, {rs1}, {rs2}"),
            Sll { rd, rs1, rs2 } => write!(f, "sll {rd}, {rs1}, {rs2}"),
            Slt { rd, rs1, rs2 } => write!(f, "slt {rd}, {rs1}, {rs2}"),
            Sltu { rd, rs1, rs2 } => write!(f, "sltu {rd}, {rs1}, {rs2}"),
            Xor { rd, rs1, rs2 } => write!(f, "xor {rd}, {rs1}, {rs2}"),
            Srl { rd, rs1, rs2 } => write!(f, "srl {rd}, {rs1}, {rs2}"),
            Sra { rd, rs1, rs2 } => write!(f, "sra {rd}, {rs1}, {rs2}"),
            Or { rd, rs1, rs2 } => write!(f, "or {rd}, {rs1}, {rs2}"),
            And { rd, rs1, rs2 } => write!(f, "and {rd}, {rs1}, {rs2}"),
            Fence => f.write_str("fence"),
            FenceI => f.write_str("fence.i"),
            Ecall => f.write_str("ecall"),
            Ebreak => f.write_str("ebreak"),
            Csrrw { rd, rs1, csr } => write!(f, "csrrw {rd}, {csr}, {rs1}"),
            Csrrs { rd, rs1, csr } => write!(f, "csrrs {rd}, {csr}, {rs1}"),
            Csrrc { rd, rs1, csr } => write!(f, "csrrc {rd}, {csr}, {rs1}"),
            Csrrwi { rd, uimm, csr } => write!(f, "csrrwi {rd}, {csr}, {uimm}"),
            Csrrsi { rd, uimm, csr } => write!(f, "csrrsi {rd}, {csr}, {uimm}"),
            Csrrci { rd, uimm, csr } => write!(f, "csrrci {rd}, {csr}, {uimm}"),
            Mul { rd, rs1, rs2 } => write!(f, "mul {rd}, {rs1}, {rs2}"),
            Mulh { rd, rs1, rs2 } => write!(f, "mulh {rd}, {rs1}, {rs2}"),
            Mulhsu { rd, rs1, rs2 } => write!(f, "mulhsu {rd}, {rs1}, {rs2}"),
            Mulhu { rd, rs1, rs2 } => write!(f, "mulhu {rd}, {rs1}, {rs2}"),
            Div { rd, rs1, rs2 } => write!(f, "div {rd}, {rs1}, {rs2}"),
            Divu { rd, rs1, rs2 } => write!(f, "divu {rd}, {rs1}, {rs2}"),
            Rem { rd, rs1, rs2 } => write!(f, "rem {rd}, {rs1}, {rs2}"),
            Remu { rd, rs1, rs2 } => write!(f, "remu {rd}, {rs1}, {rs2}"),
            LrW { rd, rs1 } => write!(f, "lr.w {rd}, ({rs1})"),
            ScW { rd, rs1, rs2 } => write!(f, "sc.w {rd}, {rs2}, ({rs1})"),
            AmoswapW { rd, rs1, rs2 } => write!(f, "amoswap.w {rd}, {rs2}, ({rs1})"),
            AmoaddW { rd, rs1, rs2 } => write!(f, "amoadd.w {rd}, {rs2}, ({rs1})"),
            AmoxorW { rd, rs1, rs2 } => write!(f, "amoxor.w {rd}, {rs2}, ({rs1})"),
            AmoandW { rd, rs1, rs2 } => write!(f, "amoand.w {rd}, {rs2}, ({rs1})"),
            AmoorW { rd, rs1, rs2 } => write!(f, "amoor.w {rd}, {rs2}, ({rs1})"),
            AmominW { rd, rs1, rs2 } => write!(f, "amomin.w {rd}, {rs2}, ({rs1})"),
            AmomaxW { rd, rs1, rs2 } => write!(f, "amomax.w {rd}, {rs2}, ({rs1})"),
            AmominuW { rd, rs1, rs2 } => write!(f, "amominu.w {rd}, {rs2}, ({rs1})"),
            AmomaxuW { rd, rs1, rs2 } => write!(f, "amomaxu.w {rd}, {rs2}, ({rs1})"),
            Mret => f.write_str("mret"),
            Wfi => f.write_str("wfi"),
        }
    }
}
