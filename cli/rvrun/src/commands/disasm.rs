//! `rvrun disasm` — disassemble the executable segments of an ELF.

use std::path::Path;

use anyhow::{bail, Context, Result};
use goblin::elf::{header, program_header, Elf};

use rv_inst::decode;

pub fn run(program: &Path, count: Option<usize>, start: Option<u32>) -> Result<()> {
    let bytes = std::fs::read(program)
        .with_context(|| format!("reading {}", program.display()))?;
    for line in disassemble(&bytes, count, start)? {
        println!("{line}");
    }
    Ok(())
}

/// One formatted line per decoded instruction, in segment order.
fn disassemble(bytes: &[u8], count: Option<usize>, start: Option<u32>) -> Result<Vec<String>> {
    let elf = Elf::parse(bytes).context("malformed ELF")?;
    if elf.is_64 || elf.header.e_machine != header::EM_RISCV {
        bail!("not a riscv32 executable");
    }

    let mut lines = Vec::new();
    let mut remaining = count.unwrap_or(usize::MAX);
    for ph in &elf.program_headers {
        if ph.p_type != program_header::PT_LOAD || ph.p_flags & program_header::PF_X == 0 {
            continue;
        }
        let vaddr = ph.p_vaddr as u32;
        let file_start = ph.p_offset as usize;
        let seg = file_start
            .checked_add(ph.p_filesz as usize)
            .and_then(|end| bytes.get(file_start..end));
        let Some(seg) = seg else {
            bail!(
                "segment at file offset 0x{:x} extends past the end of the file",
                ph.p_offset
            );
        };

        // Clamp the requested start into this segment.
        let mut off = match start {
            Some(s) if s >= vaddr && s < vaddr + seg.len() as u32 => (s - vaddr) as usize,
            Some(_) => continue,
            None => 0,
        };

        while off + 2 <= seg.len() && remaining > 0 {
            let lo = u16::from_le_bytes([seg[off], seg[off + 1]]) as u32;
            let raw = if lo & 3 == 3 && off + 4 <= seg.len() {
                u32::from_le_bytes([seg[off], seg[off + 1], seg[off + 2], seg[off + 3]])
            } else {
                lo
            };
            let addr = vaddr + off as u32;
            lines.push(match decode(raw) {
                Some(d) if d.len == 2 => format!("{addr:8x}:  {raw:04x}       {}", d.op),
                Some(d) => format!("{addr:8x}:  {raw:08x}   {}", d.op),
                None if lo & 3 == 3 => format!("{addr:8x}:  {raw:08x}   .word 0x{raw:08x}"),
                None => format!("{addr:8x}:  {lo:04x}       .short 0x{lo:04x}"),
            });
            off += if lo & 3 == 3 { 4 } else { 2 };
            remaining -= 1;
        }
    }
    Ok(lines)
}
