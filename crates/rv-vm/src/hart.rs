//! Single-hart interpreter for RV32IMAC user code.

use rv_inst::{decode, Op, Reg};

use crate::error::{HartError, MachineError, MemoryAccess, MemoryError};
use crate::machine::{Kernel, StepResult};
use crate::memory::Memory;

/// One RV32 hart: integer registers, pc, a flat CSR file, and the LR/SC
/// reservation.
pub struct Hart {
    regs: [u32; 32],
    csrs: [u32; 4096],
    pub pc: u32,
    /// Instructions retired so far.
    pub inst_count: u64,
    /// Address reserved by the latest `lr.w`, if still live.
    reservation: Option<u32>,
}

impl Hart {
    pub fn new() -> Self {
        Hart {
            regs: [0; 32],
            csrs: [0; 4096],
            pc: 0,
            inst_count: 0,
            reservation: None,
        }
    }

    /// Read a register. `x0` always reads zero.
    #[inline(always)]
    pub const fn get(&self, r: Reg) -> u32 {
        if matches!(r, Reg::Zero) {
            0
        } else {
            self.regs[r as usize]
        }
    }

    /// Write a register. Writes to `x0` are discarded.
    #[inline(always)]
    pub fn set(&mut self, r: Reg, val: u32) {
        if !matches!(r, Reg::Zero) {
            self.regs[r as usize] = val;
        }
    }

    /// All registers with their names, for diagnostics.
    pub fn regs(&self) -> impl Iterator<Item = (Reg, u32)> + '_ {
        (0..32).map(|i| (Reg::from_bits(i), self.regs[i as usize]))
    }

    /// Fetch, decode, and execute one instruction.
    pub fn step<K: Kernel>(
        &mut self,
        mem: &mut Memory,
        kernel: &mut K,
    ) -> Result<StepResult, MachineError<K::Error>> {
        let raw = mem.fetch(self.pc)?;
        let decoded = decode(raw).ok_or(HartError::IllegalInstruction { addr: self.pc, raw })?;
        let mut next_pc = self.pc.wrapping_add(decoded.len);

        use Op::*;
        match decoded.op {
            Lui { rd, imm } => self.set(rd, imm as u32),
            Auipc { rd, imm } => self.set(rd, self.pc.wrapping_add_signed(imm)),
            Jal { rd, offset } => {
                self.set(rd, next_pc);
                next_pc = self.pc.wrapping_add_signed(offset);
            }
            Jalr { rd, rs1, offset } => {
                let target = self.get(rs1).wrapping_add_signed(offset) & !1;
                self.set(rd, next_pc);
                next_pc = target;
            }

            Beq { rs1, rs2, offset } => {
                if self.get(rs1) == self.get(rs2) {
                    next_pc = self.pc.wrapping_add_signed(offset);
                }
            }
            Bne { rs1, rs2, offset } => {
                if self.get(rs1) != self.get(rs2) {
                    next_pc = self.pc.wrapping_add_signed(offset);
                }
            }
            Blt { rs1, rs2, offset } => {
                if (self.get(rs1) as i32) < (self.get(rs2) as i32) {
                    next_pc = self.pc.wrapping_add_signed(offset);
                }
            }
            Bge { rs1, rs2, offset } => {
                if (self.get(rs1) as i32) >= (self.get(rs2) as i32) {
                    next_pc = self.pc.wrapping_add_signed(offset);
                }
            }
            Bltu { rs1, rs2, offset } => {
                if self.get(rs1) < self.get(rs2) {
                    next_pc = self.pc.wrapping_add_signed(offset);
                }
            }
            Bgeu { rs1, rs2, offset } => {
                if self.get(rs1) >= self.get(rs2) {
                    next_pc = self.pc.wrapping_add_signed(offset);
                }
            }

            Lb { rd, rs1, offset } => {
                let addr = self.get(rs1).wrapping_add_signed(offset);
                let val = mem.load::<i8>(addr)?;
                self.set(rd, val as i32 as u32);
            }
            Lh { rd, rs1, offset } => {
                let addr = self.get(rs1).wrapping_add_signed(offset);
                let val = mem.load::<i16>(addr)?;
                self.set(rd, val as i32 as u32);
            }
            Lw { rd, rs1, offset } => {
                let addr = self.get(rs1).wrapping_add_signed(offset);
                let val = mem.load::<u32>(addr)?;
                self.set(rd, val);
            }
            Lbu { rd, rs1, offset } => {
                let addr = self.get(rs1).wrapping_add_signed(offset);
                let val = mem.load::<u8>(addr)?;
                self.set(rd, val as u32);
            }
            Lhu { rd, rs1, offset } => {
                let addr = self.get(rs1).wrapping_add_signed(offset);
                let val = mem.load::<u16>(addr)?;
                self.set(rd, val as u32);
            }
            Sb { rs1, rs2, offset } => {
                let addr = self.get(rs1).wrapping_add_signed(offset);
                mem.store::<u8>(addr, self.get(rs2) as u8)?;
            }
            Sh { rs1, rs2, offset } => {
                let addr = self.get(rs1).wrapping_add_signed(offset);
                mem.store::<u16>(addr, self.get(rs2) as u16)?;
            }
            Sw { rs1, rs2, offset } => {
                let addr = self.get(rs1).wrapping_add_signed(offset);
                mem.store::<u32>(addr, self.get(rs2))?;
            }

            Addi { rd, rs1, imm } => self.set(rd, self.get(rs1).wrapping_add_signed(imm)),
            Slti { rd, rs1, imm } => self.set(rd, ((self.get(rs1) as i32) < imm) as u32),
            Sltiu { rd, rs1, imm } => self.set(rd, (self.get(rs1) < imm as u32) as u32),
            Xori { rd, rs1, imm } => self.set(rd, self.get(rs1) ^ imm as u32),
            Ori { rd, rs1, imm } => self.set(rd, self.get(rs1) | imm as u32),
            Andi { rd, rs1, imm } => self.set(rd, self.get(rs1) & imm as u32),
            Slli { rd, rs1, shamt } => self.set(rd, self.get(rs1) << shamt),
            Srli { rd, rs1, shamt } => self.set(rd, self.get(rs1) >> shamt),
            Srai { rd, rs1, shamt } => self.set(rd, ((self.get(rs1) as i32) >> shamt) as u32),

            Add { rd, rs1, rs2 } => self.set(rd, self.get(rs1).wrapping_add(self.get(rs2))),
            Sub { rd, rs1, rs2 } => self.set(rd, self.get(rs1).wrapping_sub(self.get(rs2))),
            Sll { rd, rs1, rs2 } => self.set(rd, self.get(rs1) << (self.get(rs2) & 0x1f)),
            Slt { rd, rs1, rs2 } => {
                self.set(rd, ((self.get(rs1) as i32) < (self.get(rs2) as i32)) as u32)
            }
            Sltu { rd, rs1, rs2 } => self.set(rd, (self.get(rs1) < self.get(rs2)) as u32),
            Xor { rd, rs1, rs2 } => self.set(rd, self.get(rs1) ^ self.get(rs2)),
            Srl { rd, rs1, rs2 } => self.set(rd, self.get(rs1) >> (self.get(rs2) & 0x1f)),
            Sra { rd, rs1, rs2 } => self.set(
                rd,
                ((self.get(rs1) as i32) >> (self.get(rs2) & 0x1f)) as u32,
            ),
            Or { rd, rs1, rs2 } => self.set(rd, self.get(rs1) | self.get(rs2)),
            And { rd, rs1, rs2 } => self.set(rd, self.get(rs1) & self.get(rs2)),

            // No caches or privilege levels to synchronize.
            Fence | FenceI | Mret | Wfi => {}

            Ecall => match kernel.syscall(self, mem).map_err(MachineError::Kernel)? {
                StepResult::Continue => {}
                res => return Ok(res),
            },
            Ebreak => match kernel.ebreak(self, mem).map_err(MachineError::Kernel)? {
                StepResult::Continue => {}
                res => return Ok(res),
            },

            Csrrw { rd, rs1, csr } => {
                let old = self.csrs[csr.index()];
                self.csrs[csr.index()] = self.get(rs1);
                self.set(rd, old);
            }
            Csrrs { rd, rs1, csr } => {
                let old = self.csrs[csr.index()];
                self.csrs[csr.index()] = old | self.get(rs1);
                self.set(rd, old);
            }
            Csrrc { rd, rs1, csr } => {
                let old = self.csrs[csr.index()];
                self.csrs[csr.index()] = old & !self.get(rs1);
                self.set(rd, old);
            }
            Csrrwi { rd, uimm, csr } => {
                let old = self.csrs[csr.index()];
                self.csrs[csr.index()] = uimm;
                self.set(rd, old);
            }
            Csrrsi { rd, uimm, csr } => {
                let old = self.csrs[csr.index()];
                self.csrs[csr.index()] = old | uimm;
                self.set(rd, old);
            }
            Csrrci { rd, uimm, csr } => {
                let old = self.csrs[csr.index()];
                self.csrs[csr.index()] = old & !uimm;
                self.set(rd, old);
            }

            Mul { rd, rs1, rs2 } => self.set(rd, self.get(rs1).wrapping_mul(self.get(rs2))),
            Mulh { rd, rs1, rs2 } => {
                let prod = (self.get(rs1) as i32 as i64) * (self.get(rs2) as i32 as i64);
                self.set(rd, (prod >> 32) as u32);
            }
            Mulhsu { rd, rs1, rs2 } => {
                let prod = (self.get(rs1) as i32 as i64) * (self.get(rs2) as u64 as i64);
                self.set(rd, (prod >> 32) as u32);
            }
            Mulhu { rd, rs1, rs2 } => {
                let prod = (self.get(rs1) as u64) * (self.get(rs2) as u64);
                self.set(rd, (prod >> 32) as u32);
            }
            Div { rd, rs1, rs2 } => {
                let a = self.get(rs1) as i32;
                let b = self.get(rs2) as i32;
                let q = if b == 0 {
                    // Division by zero yields all ones.
                    u32::MAX
                } else if a == i32::MIN && b == -1 {
                    // Signed overflow yields the dividend.
                    a as u32
                } else {
                    a.wrapping_div(b) as u32
                };
                self.set(rd, q);
            }
            Divu { rd, rs1, rs2 } => {
                let a = self.get(rs1);
                let b = self.get(rs2);
                self.set(rd, if b == 0 { u32::MAX } else { a / b });
            }
            Rem { rd, rs1, rs2 } => {
                let a = self.get(rs1) as i32;
                let b = self.get(rs2) as i32;
                let r = if b == 0 {
                    // Remainder of division by zero is the dividend.
                    a as u32
                } else if a == i32::MIN && b == -1 {
                    0
                } else {
                    a.wrapping_rem(b) as u32
                };
                self.set(rd, r);
            }
            Remu { rd, rs1, rs2 } => {
                let a = self.get(rs1);
                let b = self.get(rs2);
                self.set(rd, if b == 0 { a } else { a % b });
            }

            LrW { rd, rs1 } => {
                let addr = self.get(rs1);
                check_amo_align(addr, MemoryAccess::Load)?;
                let val = mem.load::<u32>(addr)?;
                self.reservation = Some(addr);
                self.set(rd, val);
            }
            ScW { rd, rs1, rs2 } => {
                let addr = self.get(rs1);
                check_amo_align(addr, MemoryAccess::Store)?;
                // The reservation is consumed whether or not the store
                // succeeds.
                if self.reservation.take() == Some(addr) {
                    mem.store::<u32>(addr, self.get(rs2))?;
                    self.set(rd, 0);
                } else {
                    self.set(rd, 1);
                }
            }
            AmoswapW { rd, rs1, rs2 } => self.amo(mem, rd, rs1, rs2, |_, b| b)?,
            AmoaddW { rd, rs1, rs2 } => self.amo(mem, rd, rs1, rs2, u32::wrapping_add)?,
            AmoxorW { rd, rs1, rs2 } => self.amo(mem, rd, rs1, rs2, |a, b| a ^ b)?,
            AmoandW { rd, rs1, rs2 } => self.amo(mem, rd, rs1, rs2, |a, b| a & b)?,
            AmoorW { rd, rs1, rs2 } => self.amo(mem, rd, rs1, rs2, |a, b| a | b)?,
            AmominW { rd, rs1, rs2 } => {
                self.amo(mem, rd, rs1, rs2, |a, b| (a as i32).min(b as i32) as u32)?
            }
            AmomaxW { rd, rs1, rs2 } => {
                self.amo(mem, rd, rs1, rs2, |a, b| (a as i32).max(b as i32) as u32)?
            }
            AmominuW { rd, rs1, rs2 } => self.amo(mem, rd, rs1, rs2, u32::min)?,
            AmomaxuW { rd, rs1, rs2 } => self.amo(mem, rd, rs1, rs2, u32::max)?,
        }

        self.inst_count += 1;
        self.pc = next_pc;
        Ok(StepResult::Continue)
    }

    /// Read-modify-write a word: `rd = mem[rs1]; mem[rs1] = f(rd, rs2)`.
    fn amo(
        &mut self,
        mem: &mut Memory,
        rd: Reg,
        rs1: Reg,
        rs2: Reg,
        f: impl FnOnce(u32, u32) -> u32,
    ) -> Result<(), MemoryError> {
        let addr = self.get(rs1);
        check_amo_align(addr, MemoryAccess::Load)?;
        let old = mem.load::<u32>(addr)?;
        let new = f(old, self.get(rs2));
        mem.store::<u32>(addr, new)?;
        self.set(rd, old);
        Ok(())
    }
}

fn check_amo_align(addr: u32, access: MemoryAccess) -> Result<(), MemoryError> {
    if addr & 3 != 0 {
        Err(MemoryError::MisalignedAtomic { access, addr })
    } else {
        Ok(())
    }
}

impl Default for Hart {
    fn default() -> Self {
        Self::new()
    }
}
