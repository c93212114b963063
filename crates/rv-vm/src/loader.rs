//! Static ELF loading and process image setup.
//!
//! Loads the executables a `riscv32imac` cross toolchain produces when
//! the standard library is built from source for the custom target:
//! 32-bit, little-endian, statically linked. Dynamic executables are
//! rejected; there is no interpreter to hand off to.

use goblin::elf::{header, program_header, Elf};
use rand::RngCore;

use crate::error::MemoryError;
use crate::memory::{Memory, PAGE_SIZE};

/// Highest address of the guest stack.
pub const STACK_TOP: u32 = 0x7fff_f000;

/// Default stack mapping size.
pub const STACK_SIZE: u32 = 8 * 1024 * 1024;

/// Where anonymous `mmap` allocations start.
pub const MMAP_BASE: u32 = 0x6000_0000;

/// Errors raised while building the guest process image.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("malformed ELF: {0}")]
    Elf(#[from] goblin::error::Error),

    #[error("not a riscv32 executable (machine 0x{machine:x}, 64-bit: {is_64})")]
    WrongArch { machine: u16, is_64: bool },

    #[error("dynamically linked executables are not supported")]
    NotStatic,

    #[error(
        "segment at file offset 0x{offset:x} ({filesz} bytes) extends past the \
         end of the file ({len} bytes)"
    )]
    TruncatedSegment { offset: u64, filesz: u64, len: usize },

    #[error("executable has no loadable segments")]
    NoSegments,

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Where the loader put things.
#[derive(Debug, Clone, Copy)]
pub struct LoadedImage {
    /// Entry point.
    pub entry: u32,
    /// Initial program break (first free address after the segments).
    pub brk: u32,
    /// Initial stack pointer, 16-byte aligned, pointing at argc.
    pub sp: u32,
}

/// Load `bytes` into `mem` and build the initial stack for `args`/`envs`.
pub fn load(
    mem: &mut Memory,
    bytes: &[u8],
    args: &[String],
    envs: &[String],
) -> Result<LoadedImage, LoaderError> {
    let elf = Elf::parse(bytes)?;

    if elf.is_64 || elf.header.e_machine != header::EM_RISCV {
        return Err(LoaderError::WrongArch {
            machine: elf.header.e_machine,
            is_64: elf.is_64,
        });
    }
    if elf.header.e_type != header::ET_EXEC || elf.interpreter.is_some() {
        return Err(LoaderError::NotStatic);
    }

    let mut brk = 0u32;
    let mut first_load_vaddr = None;
    for ph in &elf.program_headers {
        if ph.p_type != program_header::PT_LOAD || ph.p_memsz == 0 {
            continue;
        }
        let vaddr = ph.p_vaddr as u32;
        let memsz = ph.p_memsz as u32;
        first_load_vaddr.get_or_insert(vaddr);

        mem.map(vaddr, memsz);
        let file_start = ph.p_offset as usize;
        let file_end = file_start
            .checked_add(ph.p_filesz as usize)
            .filter(|&end| end <= bytes.len())
            .ok_or(LoaderError::TruncatedSegment {
                offset: ph.p_offset,
                filesz: ph.p_filesz,
                len: bytes.len(),
            })?;
        mem.write_bytes(vaddr, &bytes[file_start..file_end])?;
        // The p_memsz tail past p_filesz is the BSS; map() zeroed it.

        brk = brk.max(vaddr.wrapping_add(memsz));
        tracing::debug!(
            vaddr = format_args!("0x{vaddr:08x}"),
            memsz,
            filesz = ph.p_filesz,
            "mapped segment"
        );
    }
    let first_load_vaddr = first_load_vaddr.ok_or(LoaderError::NoSegments)?;

    // Round the break up to a page so brk growth starts clean.
    let brk = (brk + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);

    mem.map(STACK_TOP - STACK_SIZE, STACK_SIZE);
    let entry = elf.entry as u32;
    let phdr_addr = first_load_vaddr.wrapping_add(elf.header.e_phoff as u32);
    let sp = build_stack(
        mem,
        args,
        envs,
        &StackAux {
            phdr: phdr_addr,
            phent: elf.header.e_phentsize as u32,
            phnum: elf.header.e_phnum as u32,
            entry,
        },
    )?;

    tracing::info!(
        entry = format_args!("0x{entry:08x}"),
        brk = format_args!("0x{brk:08x}"),
        sp = format_args!("0x{sp:08x}"),
        "loaded static executable"
    );

    Ok(LoadedImage { entry, brk, sp })
}

/// Program-header facts the auxiliary vector reports.
struct StackAux {
    phdr: u32,
    phent: u32,
    phnum: u32,
    entry: u32,
}

mod auxv {
    pub const AT_NULL: u32 = 0;
    pub const AT_PHDR: u32 = 3;
    pub const AT_PHENT: u32 = 4;
    pub const AT_PHNUM: u32 = 5;
    pub const AT_PAGESZ: u32 = 6;
    pub const AT_ENTRY: u32 = 9;
    pub const AT_UID: u32 = 11;
    pub const AT_EUID: u32 = 12;
    pub const AT_GID: u32 = 13;
    pub const AT_EGID: u32 = 14;
    pub const AT_CLKTCK: u32 = 17;
    pub const AT_SECURE: u32 = 23;
    pub const AT_RANDOM: u32 = 25;
}

/// Build the initial stack: strings and the AT_RANDOM seed at the top,
/// then argc / argv / envp / auxv below them, with sp 16-byte aligned
/// and pointing at argc.
fn build_stack(
    mem: &mut Memory,
    args: &[String],
    envs: &[String],
    aux: &StackAux,
) -> Result<u32, MemoryError> {
    let mut top = STACK_TOP;

    let mut push_str = |mem: &mut Memory, s: &str| -> Result<u32, MemoryError> {
        top -= s.len() as u32 + 1;
        mem.write_bytes(top, s.as_bytes())?;
        mem.store::<u8>(top + s.len() as u32, 0)?;
        Ok(top)
    };

    let arg_ptrs: Vec<u32> = args
        .iter()
        .map(|a| push_str(mem, a))
        .collect::<Result<_, _>>()?;
    let env_ptrs: Vec<u32> = envs
        .iter()
        .map(|e| push_str(mem, e))
        .collect::<Result<_, _>>()?;

    let mut seed = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut seed);
    top -= 16;
    let random_ptr = top;
    mem.write_bytes(random_ptr, &seed)?;

    let auxv: &[(u32, u32)] = &[
        (auxv::AT_PHDR, aux.phdr),
        (auxv::AT_PHENT, aux.phent),
        (auxv::AT_PHNUM, aux.phnum),
        (auxv::AT_PAGESZ, PAGE_SIZE),
        (auxv::AT_ENTRY, aux.entry),
        (auxv::AT_UID, 1000),
        (auxv::AT_EUID, 1000),
        (auxv::AT_GID, 1000),
        (auxv::AT_EGID, 1000),
        (auxv::AT_CLKTCK, 100),
        (auxv::AT_SECURE, 0),
        (auxv::AT_RANDOM, random_ptr),
        (auxv::AT_NULL, 0),
    ];

    // argc + argv + NULL + envp + NULL + auxv pairs, in 4-byte words.
    let words = 1 + args.len() + 1 + envs.len() + 1 + auxv.len() * 2;
    let mut sp = (top - (words as u32) * 4) & !15;

    let start = sp;
    let mut put = |mem: &mut Memory, val: u32| -> Result<(), MemoryError> {
        mem.store::<u32>(sp, val)?;
        sp += 4;
        Ok(())
    };

    put(mem, args.len() as u32)?;
    for &p in &arg_ptrs {
        put(mem, p)?;
    }
    put(mem, 0)?;
    for &p in &env_ptrs {
        put(mem, p)?;
    }
    put(mem, 0)?;
    for &(tag, val) in auxv {
        put(mem, tag)?;
        put(mem, val)?;
    }

    Ok(start)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Hand-assemble a minimal ELF32 RISC-V static executable holding
    /// `code` at vaddr 0x10000.
    pub(crate) fn tiny_elf(code: &[u32]) -> Vec<u8> {
        const EHSIZE: u32 = 52;
        const PHSIZE: u32 = 32;
        let code_off = EHSIZE + PHSIZE;
        let code_len: u32 = (code.len() * 4) as u32;
        let vaddr: u32 = 0x10000;

        let mut out = Vec::new();
        // e_ident
        out.extend_from_slice(&[0x7f, b'E', b'L', b'F', 1, 1, 1, 0]);
        out.extend_from_slice(&[0u8; 8]);
        let mut u16le = |v: u16, out: &mut Vec<u8>| out.extend_from_slice(&v.to_le_bytes());
        let mut u32le = |v: u32, out: &mut Vec<u8>| out.extend_from_slice(&v.to_le_bytes());
        u16le(2, &mut out); // e_type = ET_EXEC
        u16le(243, &mut out); // e_machine = EM_RISCV
        u32le(1, &mut out); // e_version
        u32le(vaddr, &mut out); // e_entry
        u32le(EHSIZE, &mut out); // e_phoff
        u32le(0, &mut out); // e_shoff
        u32le(0, &mut out); // e_flags
        u16le(EHSIZE as u16, &mut out);
        u16le(PHSIZE as u16, &mut out);
        u16le(1, &mut out); // e_phnum
        u16le(40, &mut out); // e_shentsize
        u16le(0, &mut out); // e_shnum
        u16le(0, &mut out); // e_shstrndx
        assert_eq!(out.len() as u32, EHSIZE);
        // Program header: PT_LOAD, RX, code at code_off.
        u32le(1, &mut out); // p_type
        u32le(code_off, &mut out); // p_offset
        u32le(vaddr, &mut out); // p_vaddr
        u32le(vaddr, &mut out); // p_paddr
        u32le(code_len, &mut out); // p_filesz
        u32le(code_len + 64, &mut out); // p_memsz (a little BSS)
        u32le(5, &mut out); // p_flags = R+X
        u32le(0x1000, &mut out); // p_align
        for w in code {
            out.extend_from_slice(&w.to_le_bytes());
        }
        out
    }

    #[test]
    fn loads_segments_and_entry() {
        let elf = tiny_elf(&[0x0000_0013, 0x0000_006f]);
        let mut mem = Memory::new();
        let image = load(&mut mem, &elf, &[], &[]).unwrap();
        assert_eq!(image.entry, 0x10000);
        assert_eq!(mem.load::<u32>(0x10000).unwrap(), 0x0000_0013);
        // BSS tail is zero.
        assert_eq!(mem.load::<u32>(0x10008).unwrap(), 0);
        // Break lands on a page boundary past the segment.
        assert_eq!(image.brk % PAGE_SIZE, 0);
        assert!(image.brk >= 0x10008 + 64);
    }

    #[test]
    fn stack_holds_argc_argv_envp() {
        let elf = tiny_elf(&[0x0000_0013]);
        let mut mem = Memory::new();
        let args = vec!["guest".to_string(), "--flag".to_string()];
        let envs = vec!["TERM=dumb".to_string()];
        let image = load(&mut mem, &elf, &args, &envs).unwrap();

        let sp = image.sp;
        assert_eq!(sp % 16, 0);
        assert_eq!(mem.load::<u32>(sp).unwrap(), 2); // argc
        let argv0 = mem.load::<u32>(sp + 4).unwrap();
        let argv1 = mem.load::<u32>(sp + 8).unwrap();
        assert_eq!(mem.load::<u32>(sp + 12).unwrap(), 0); // argv null
        assert_eq!(mem.read_cstr(argv0, 64).unwrap(), b"guest");
        assert_eq!(mem.read_cstr(argv1, 64).unwrap(), b"--flag");
        let envp0 = mem.load::<u32>(sp + 16).unwrap();
        assert_eq!(mem.read_cstr(envp0, 64).unwrap(), b"TERM=dumb");
        assert_eq!(mem.load::<u32>(sp + 20).unwrap(), 0); // envp null
    }

    #[test]
    fn auxv_reports_page_size_and_entry() {
        let elf = tiny_elf(&[0x0000_0013]);
        let mut mem = Memory::new();
        let image = load(&mut mem, &elf, &[], &[]).unwrap();

        // Walk auxv: past argc, argv null, envp null.
        let mut at = image.sp + 4 + 4 + 4;
        let mut pagesz = None;
        let mut entry = None;
        let mut random = None;
        loop {
            let tag = mem.load::<u32>(at).unwrap();
            let val = mem.load::<u32>(at + 4).unwrap();
            match tag {
                auxv::AT_NULL => break,
                auxv::AT_PAGESZ => pagesz = Some(val),
                auxv::AT_ENTRY => entry = Some(val),
                auxv::AT_RANDOM => random = Some(val),
                _ => {}
            }
            at += 8;
        }
        assert_eq!(pagesz, Some(PAGE_SIZE));
        assert_eq!(entry, Some(0x10000));
        let random = random.expect("AT_RANDOM present");
        // The seed must be readable guest memory.
        let mut seed = [0u8; 16];
        mem.read_bytes(random, &mut seed).unwrap();
    }

    #[test]
    fn rejects_truncated_segment_data() {
        let mut elf = tiny_elf(&[0x0000_0013, 0x0000_006f]);
        // Keep the headers intact but cut the tail of the segment data,
        // so p_offset + p_filesz points past the end of the file.
        elf.truncate(elf.len() - 4);
        let mut mem = Memory::new();
        let err = load(&mut mem, &elf, &[], &[]).unwrap_err();
        assert!(matches!(err, LoaderError::TruncatedSegment { .. }));
    }

    #[test]
    fn rejects_overflowing_segment_bounds() {
        let mut elf = tiny_elf(&[0x0000_0013]);
        // p_filesz lives at phdr offset 16 (file offset 52 + 16).
        elf[68..72].copy_from_slice(&u32::MAX.to_le_bytes());
        let mut mem = Memory::new();
        let err = load(&mut mem, &elf, &[], &[]).unwrap_err();
        assert!(matches!(err, LoaderError::TruncatedSegment { .. }));
    }

    #[test]
    fn rejects_wrong_machine() {
        let mut elf = tiny_elf(&[0x0000_0013]);
        // e_machine lives at offset 18.
        elf[18] = 0x3e; // EM_X86_64
        elf[19] = 0;
        let mut mem = Memory::new();
        let err = load(&mut mem, &elf, &[], &[]).unwrap_err();
        assert!(matches!(err, LoaderError::WrongArch { .. }));
    }

    #[test]
    fn rejects_shared_objects() {
        let mut elf = tiny_elf(&[0x0000_0013]);
        // e_type lives at offset 16; ET_DYN = 3.
        elf[16] = 3;
        let mut mem = Memory::new();
        let err = load(&mut mem, &elf, &[], &[]).unwrap_err();
        assert!(matches!(err, LoaderError::NotStatic));
    }
}
