//! `rvrun run` — load and execute a guest program.

use std::path::Path;

use anyhow::{Context, Result};

use rv_vm::{Linux, Machine};

use crate::config::Config;

/// Execute `program` and return its exit code.
pub fn run(program: &Path, args: &[String], cfg: &Config) -> Result<i32> {
    let bytes = std::fs::read(program)
        .with_context(|| format!("reading {}", program.display()))?;

    let exe = program.to_string_lossy();
    let mut argv = vec![exe.to_string()];
    argv.extend_from_slice(args);

    let kernel = Linux::new().strict_syscalls(cfg.run.strict);
    let mut machine = Machine::new(kernel);
    machine
        .boot_elf(&bytes, &exe, &argv, &cfg.run.env)
        .with_context(|| format!("loading {}", program.display()))?;

    let code = machine
        .run()
        .with_context(|| format!("running {}", program.display()))?;
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testelf::static_elf;
    use std::io::Write;

    // exit(7)
    fn exit7_elf() -> Vec<u8> {
        static_elf(&[
            0x0070_0513, // addi a0, zero, 7
            0x05d0_0893, // addi a7, zero, 93
            0x0000_0073, // ecall
        ])
    }

    #[test]
    fn runs_a_guest_to_exit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&exit7_elf()).unwrap();
        let code = run(file.path(), &[], &Config::default()).unwrap();
        assert_eq!(code, 7);
    }

    #[test]
    fn truncated_executable_is_an_error_not_a_panic() {
        let mut elf = exit7_elf();
        elf.truncate(elf.len() - 4);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&elf).unwrap();
        let err = run(file.path(), &[], &Config::default()).unwrap_err();
        assert!(err.to_string().contains("loading"), "{err}");
    }

    #[test]
    fn missing_program_is_an_error() {
        let err = run(Path::new("/nonexistent/guest"), &[], &Config::default()).unwrap_err();
        assert!(err.to_string().contains("reading"));
    }

    #[test]
    fn rejects_non_elf_input() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"#!/bin/sh\n").unwrap();
        let err = run(file.path(), &[], &Config::default()).unwrap_err();
        assert!(err.to_string().contains("loading"));
    }
}
