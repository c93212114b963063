//! riscv32 Linux ABI constants and wire layouts.

/// Syscall numbers from the riscv32 table (the generic 64-bit layout
/// with time64 variants, no legacy numbers).
pub mod nr {
    pub const WRITE: u32 = 64;
    pub const WRITEV: u32 = 66;
    pub const READ: u32 = 63;
    pub const READLINKAT: u32 = 78;
    pub const EXIT: u32 = 93;
    pub const EXIT_GROUP: u32 = 94;
    pub const SET_TID_ADDRESS: u32 = 96;
    pub const SET_ROBUST_LIST: u32 = 99;
    pub const TGKILL: u32 = 131;
    pub const RT_SIGACTION: u32 = 134;
    pub const RT_SIGPROCMASK: u32 = 135;
    pub const GETPID: u32 = 172;
    pub const GETTID: u32 = 178;
    pub const BRK: u32 = 214;
    pub const MUNMAP: u32 = 215;
    pub const MMAP: u32 = 222;
    pub const MPROTECT: u32 = 226;
    pub const RISCV_HWPROBE: u32 = 258;
    pub const PRLIMIT64: u32 = 261;
    pub const GETRANDOM: u32 = 278;
    pub const STATX: u32 = 291;
    pub const CLOCK_GETTIME64: u32 = 403;
    pub const PPOLL: u32 = 414;
    pub const FUTEX: u32 = 422;

    /// Name for diagnostics; unknown numbers print as the number.
    pub fn name(nr: u32) -> Option<&'static str> {
        Some(match nr {
            WRITE => "write",
            WRITEV => "writev",
            READ => "read",
            READLINKAT => "readlinkat",
            EXIT => "exit",
            EXIT_GROUP => "exit_group",
            SET_TID_ADDRESS => "set_tid_address",
            SET_ROBUST_LIST => "set_robust_list",
            TGKILL => "tgkill",
            RT_SIGACTION => "rt_sigaction",
            RT_SIGPROCMASK => "rt_sigprocmask",
            GETPID => "getpid",
            GETTID => "gettid",
            BRK => "brk",
            MUNMAP => "munmap",
            MMAP => "mmap",
            MPROTECT => "mprotect",
            RISCV_HWPROBE => "riscv_hwprobe",
            PRLIMIT64 => "prlimit64",
            GETRANDOM => "getrandom",
            STATX => "statx",
            CLOCK_GETTIME64 => "clock_gettime64",
            PPOLL => "ppoll",
            FUTEX => "futex",
            _ => return None,
        })
    }
}

pub mod errno {
    pub const ENOENT: i32 = 2;
    pub const EBADF: i32 = 9;
    pub const EAGAIN: i32 = 11;
    pub const ENOMEM: i32 = 12;
    pub const ENODEV: i32 = 19;
    pub const EINVAL: i32 = 22;
    pub const ENOSYS: i32 = 38;
}

pub mod mman {
    pub const MAP_SHARED: u32 = 0x01;
    pub const MAP_PRIVATE: u32 = 0x02;
    pub const MAP_FIXED: u32 = 0x10;
    pub const MAP_ANONYMOUS: u32 = 0x20;
    pub const MAP_FIXED_NOREPLACE: u32 = 0x100000;

    pub const PROT_NONE: u32 = 0;
    pub const PROT_READ: u32 = 1;
    pub const PROT_WRITE: u32 = 2;
    pub const PROT_EXEC: u32 = 4;
}

pub mod futex {
    /// Low bits of the op word; FUTEX_PRIVATE_FLAG and the clock flag
    /// are masked off before dispatch.
    pub const CMD_MASK: u32 = 0x7f;
    pub const WAIT: u32 = 0;
    pub const WAKE: u32 = 1;
}

pub mod clock {
    pub const REALTIME: u32 = 0;
    pub const MONOTONIC: u32 = 1;
}

/// Guest `iovec` stride: a base pointer then a length, both words.
pub const IOVEC_SIZE: u32 = 8;

/// Turn an errno into the negative return-register value.
pub const fn err(e: i32) -> u32 {
    (-e) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_returns_are_small_negatives() {
        assert_eq!(err(errno::ENOSYS) as i32, -38);
        assert_eq!(err(errno::EBADF) as i32, -9);
    }

    #[test]
    fn known_syscalls_have_names() {
        assert_eq!(nr::name(nr::WRITE), Some("write"));
        assert_eq!(nr::name(nr::FUTEX), Some("futex"));
        assert_eq!(nr::name(9999), None);
    }
}
