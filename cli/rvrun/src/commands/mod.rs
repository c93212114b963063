//! CLI command implementations.

pub mod disasm;
pub mod run;
pub mod target;

#[cfg(test)]
pub(crate) mod testelf {
    /// Hand-assemble a minimal static ELF32 RISC-V executable holding
    /// `code` at vaddr 0x10000.
    pub(crate) fn static_elf(code: &[u32]) -> Vec<u8> {
        const EHSIZE: u32 = 52;
        const PHSIZE: u32 = 32;
        let code_off = EHSIZE + PHSIZE;
        let code_len = (code.len() * 4) as u32;
        let vaddr: u32 = 0x10000;

        let mut out = Vec::new();
        out.extend_from_slice(&[0x7f, b'E', b'L', b'F', 1, 1, 1, 0]);
        out.extend_from_slice(&[0u8; 8]);
        let u16le = |v: u16, out: &mut Vec<u8>| out.extend_from_slice(&v.to_le_bytes());
        let u32le = |v: u32, out: &mut Vec<u8>| out.extend_from_slice(&v.to_le_bytes());
        u16le(2, &mut out); // ET_EXEC
        u16le(243, &mut out); // EM_RISCV
        u32le(1, &mut out);
        u32le(vaddr, &mut out);
        u32le(EHSIZE, &mut out);
        u32le(0, &mut out);
        u32le(0, &mut out);
        u16le(EHSIZE as u16, &mut out);
        u16le(PHSIZE as u16, &mut out);
        u16le(1, &mut out);
        u16le(40, &mut out);
        u16le(0, &mut out);
        u16le(0, &mut out);
        u32le(1, &mut out); // PT_LOAD
        u32le(code_off, &mut out);
        u32le(vaddr, &mut out);
        u32le(vaddr, &mut out);
        u32le(code_len, &mut out);
        u32le(code_len, &mut out);
        u32le(5, &mut out); // R+X
        u32le(0x1000, &mut out);
        for w in code {
            out.extend_from_slice(&w.to_le_bytes());
        }
        out
    }
}
