//! Linux user-mode kernel personality.
//!
//! Services the syscalls a statically linked riscv32 Linux binary makes
//! during a normal run: process setup chatter (tid, robust lists, signal
//! masks), memory management (`brk`, anonymous `mmap`), I/O on the
//! standard streams, and process exit. The guest's standard output and
//! error go to pluggable sinks so tests can capture them.

pub mod abi;

use std::io::Write;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rand::RngCore;
use rv_inst::Reg;

use crate::error::MemoryError;
use crate::hart::Hart;
use crate::loader::{LoadedImage, MMAP_BASE, STACK_SIZE, STACK_TOP};
use crate::machine::{Kernel, Machine, StepResult};
use crate::memory::{Memory, PAGE_SIZE};

use abi::{err, errno, mman, nr};

/// Anonymous mappings must stay below the stack.
const MMAP_CEILING: u32 = STACK_TOP - STACK_SIZE;

/// Bound on per-step host buffers when moving guest-sized ranges, so a
/// guest-supplied length cannot drive a giant host allocation.
const COPY_CHUNK: usize = 64 * 1024;

/// Where a guest output stream goes.
pub enum OutputSink {
    /// Inherit the host's stream.
    Stdout,
    Stderr,
    /// Collect into a buffer (tests).
    Capture(Vec<u8>),
}

impl OutputSink {
    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        match self {
            OutputSink::Stdout => std::io::stdout().write_all(data),
            OutputSink::Stderr => std::io::stderr().write_all(data),
            OutputSink::Capture(buf) => {
                buf.extend_from_slice(data);
                Ok(())
            }
        }
    }
}

/// Errors that abort the guest rather than returning an errno.
#[derive(Debug, thiserror::Error)]
pub enum LinuxError {
    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error("host I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported syscall {nr} at 0x{pc:08x}")]
    UnsupportedSyscall { nr: u32, pc: u32 },

    #[error("guest trap (ebreak) at 0x{pc:08x}")]
    Breakpoint { pc: u32 },
}

/// The Linux personality.
pub struct Linux {
    /// Current program break; `initial_brk` is the floor.
    brk: u32,
    initial_brk: u32,
    /// Next address for anonymous mappings without a usable hint.
    mmap_cursor: u32,
    tid_address: u32,
    /// Reported path for /proc/self/exe.
    exe_path: String,
    /// Unknown syscalls become hard errors instead of -ENOSYS.
    strict: bool,
    pub stdout: OutputSink,
    pub stderr: OutputSink,
    start: Instant,
}

const PID: u32 = 1000;
const TID: u32 = 1000;

impl Linux {
    pub fn new() -> Self {
        Linux {
            brk: 0,
            initial_brk: 0,
            mmap_cursor: MMAP_BASE,
            tid_address: 0,
            exe_path: "/guest".into(),
            strict: false,
            stdout: OutputSink::Stdout,
            stderr: OutputSink::Stderr,
            start: Instant::now(),
        }
    }

    /// Fail hard on syscalls outside the implemented set.
    pub fn strict_syscalls(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Capture guest stdout/stderr instead of inheriting the host's.
    pub fn capture_output(mut self) -> Self {
        self.stdout = OutputSink::Capture(Vec::new());
        self.stderr = OutputSink::Capture(Vec::new());
        self
    }

    /// Point `brk` and `/proc/self/exe` at a freshly loaded image.
    pub fn attach(&mut self, image: &LoadedImage, exe_path: &str) {
        self.brk = image.brk;
        self.initial_brk = image.brk;
        self.exe_path = exe_path.into();
    }

    /// Captured stdout bytes, if capture is enabled.
    pub fn captured_stdout(&self) -> Option<&[u8]> {
        match &self.stdout {
            OutputSink::Capture(buf) => Some(buf),
            _ => None,
        }
    }

    fn write_out(&mut self, fd: u32, data: &[u8]) -> Result<u32, LinuxError> {
        match fd {
            1 => self.stdout.write_all(data)?,
            2 => self.stderr.write_all(data)?,
            _ => return Ok(err(errno::EBADF)),
        }
        Ok(data.len() as u32)
    }

    /// Copy `len` guest bytes at `addr` to `fd`, one bounded chunk at a
    /// time. Faults on the guest range propagate as memory errors.
    fn write_guest(
        &mut self,
        mem: &Memory,
        fd: u32,
        addr: u32,
        len: u32,
    ) -> Result<u32, LinuxError> {
        if fd != 1 && fd != 2 {
            return Ok(err(errno::EBADF));
        }
        let mut buf = vec![0u8; COPY_CHUNK.min(len as usize)];
        let mut done = 0u32;
        while done < len {
            let chunk = ((len - done) as usize).min(COPY_CHUNK);
            mem.read_bytes(addr.wrapping_add(done), &mut buf[..chunk])?;
            self.write_out(fd, &buf[..chunk])?;
            done += chunk as u32;
        }
        Ok(len)
    }

    fn sys_writev(
        &mut self,
        mem: &Memory,
        fd: u32,
        iov: u32,
        iovcnt: u32,
    ) -> Result<u32, LinuxError> {
        if iovcnt > 1024 {
            return Ok(err(errno::EINVAL));
        }
        let mut total = 0u64;
        for i in 0..iovcnt {
            let base: u32 = mem.load(iov + i * abi::IOVEC_SIZE)?;
            let len: u32 = mem.load(iov + i * abi::IOVEC_SIZE + 4)?;
            if len == 0 {
                continue;
            }
            let n = self.write_guest(mem, fd, base, len)?;
            if (n as i32) < 0 {
                return Ok(n);
            }
            total += n as u64;
        }
        Ok(total.min(i32::MAX as u64) as u32)
    }

    fn sys_brk(&mut self, mem: &mut Memory, addr: u32) -> u32 {
        if addr == 0 || addr < self.initial_brk {
            return self.brk;
        }
        if addr > self.brk {
            mem.map(self.brk, addr - self.brk);
        }
        // Shrinking keeps the pages; Linux frees them lazily too.
        self.brk = addr;
        self.brk
    }

    fn sys_mmap(
        &mut self,
        mem: &mut Memory,
        addr: u32,
        len: u32,
        _prot: u32,
        flags: u32,
        fd: u32,
    ) -> u32 {
        if len == 0 {
            return err(errno::EINVAL);
        }
        if fd as i32 != -1 {
            // No file-backed mappings without a filesystem.
            return err(errno::ENODEV);
        }
        if flags & mman::MAP_ANONYMOUS == 0 {
            return err(errno::ENODEV);
        }
        let len = (len + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);
        let at = if flags & (mman::MAP_FIXED | mman::MAP_FIXED_NOREPLACE) != 0 || addr != 0 {
            addr & !(PAGE_SIZE - 1)
        } else {
            let at = self.mmap_cursor;
            // The cursor region ends where the stack mapping begins.
            let end = match at.checked_add(len) {
                Some(end) if end <= MMAP_CEILING => end,
                _ => return err(errno::ENOMEM),
            };
            self.mmap_cursor = end;
            at
        };
        mem.map(at, len);
        at
    }

    fn sys_clock_gettime64(&self, mem: &mut Memory, clockid: u32, tp: u32) -> Result<u32, LinuxError> {
        let (sec, nsec) = match clockid {
            abi::clock::REALTIME => {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default();
                (now.as_secs() as i64, now.subsec_nanos() as i64)
            }
            abi::clock::MONOTONIC => {
                let now = self.start.elapsed();
                (now.as_secs() as i64, now.subsec_nanos() as i64)
            }
            _ => return Ok(err(errno::EINVAL)),
        };
        mem.store::<i64>(tp, sec)?;
        mem.store::<i64>(tp + 8, nsec)?;
        Ok(0)
    }

    fn sys_futex(
        &self,
        mem: &Memory,
        uaddr: u32,
        op: u32,
        val: u32,
    ) -> Result<u32, LinuxError> {
        match op & abi::futex::CMD_MASK {
            abi::futex::WAIT => {
                let current: u32 = mem.load(uaddr)?;
                if current != val {
                    Ok(err(errno::EAGAIN))
                } else {
                    // Single hart: nobody can wake us, and the only
                    // correct continuation is to pretend we were woken.
                    Ok(0)
                }
            }
            abi::futex::WAKE => Ok(0),
            _ => Ok(err(errno::ENOSYS)),
        }
    }
}

impl Default for Linux {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel for Linux {
    type Error = LinuxError;

    fn syscall(&mut self, hart: &mut Hart, mem: &mut Memory) -> Result<StepResult, LinuxError> {
        let nr_ = hart.get(Reg::A7);
        let a = [
            hart.get(Reg::A0),
            hart.get(Reg::A1),
            hart.get(Reg::A2),
            hart.get(Reg::A3),
            hart.get(Reg::A4),
            hart.get(Reg::A5),
        ];
        tracing::debug!(
            nr = nr_,
            name = nr::name(nr_).unwrap_or("?"),
            a0 = format_args!("0x{:x}", a[0]),
            a1 = format_args!("0x{:x}", a[1]),
            a2 = format_args!("0x{:x}", a[2]),
            "syscall"
        );

        let ret: u32 = match nr_ {
            nr::WRITE => self.write_guest(mem, a[0], a[1], a[2])?,
            nr::WRITEV => self.sys_writev(mem, a[0], a[1], a[2])?,
            nr::READ => {
                if a[0] == 0 {
                    // A short read is a valid result, so one bounded
                    // chunk per call is enough.
                    let mut buf = vec![0u8; (a[2] as usize).min(COPY_CHUNK)];
                    let n = std::io::Read::read(&mut std::io::stdin(), &mut buf)?;
                    mem.write_bytes(a[1], &buf[..n])?;
                    n as u32
                } else {
                    err(errno::EBADF)
                }
            }
            nr::READLINKAT => {
                let path = mem.read_cstr(a[1], 4096)?;
                if path == b"/proc/self/exe" {
                    let reply = self.exe_path.as_bytes();
                    let n = reply.len().min(a[3] as usize);
                    mem.write_bytes(a[2], &reply[..n])?;
                    n as u32
                } else {
                    err(errno::ENOENT)
                }
            }
            nr::EXIT | nr::EXIT_GROUP => return Ok(StepResult::Exit(a[0] as i32)),
            nr::SET_TID_ADDRESS => {
                self.tid_address = a[0];
                TID
            }
            nr::SET_ROBUST_LIST => 0,
            nr::TGKILL => {
                // The guest is killing itself (abort); report it the way
                // a shell would.
                let sig = a[2] as i32;
                tracing::warn!(sig, "guest raised a fatal signal");
                return Ok(StepResult::Exit(128 + sig));
            }
            nr::RT_SIGACTION | nr::RT_SIGPROCMASK => 0,
            nr::GETPID => PID,
            nr::GETTID => TID,
            nr::BRK => self.sys_brk(mem, a[0]),
            nr::MUNMAP => {
                mem.unmap(a[0], a[1]);
                0
            }
            nr::MMAP => self.sys_mmap(mem, a[0], a[1], a[2], a[3], a[4]),
            nr::MPROTECT => 0,
            nr::RISCV_HWPROBE => {
                // Zero every value: no extensions beyond the base to
                // advertise, no misaligned-access penalty information.
                for i in 0..a[1] {
                    mem.store::<u64>(a[0] + i * 16 + 8, 0)?;
                }
                0
            }
            nr::PRLIMIT64 => {
                if a[3] != 0 {
                    // rlim_cur = rlim_max = RLIM64_INFINITY.
                    mem.store::<u64>(a[3], u64::MAX)?;
                    mem.store::<u64>(a[3] + 8, u64::MAX)?;
                }
                0
            }
            nr::GETRANDOM => {
                let mut buf = vec![0u8; COPY_CHUNK.min(a[1] as usize)];
                let mut done = 0u32;
                while done < a[1] {
                    let chunk = ((a[1] - done) as usize).min(COPY_CHUNK);
                    rand::thread_rng().fill_bytes(&mut buf[..chunk]);
                    mem.write_bytes(a[0].wrapping_add(done), &buf[..chunk])?;
                    done += chunk as u32;
                }
                a[1]
            }
            nr::STATX => {
                // Enough for feature probes: a zeroed statx buffer.
                mem.write_bytes(a[4], &[0u8; 256])?;
                0
            }
            nr::CLOCK_GETTIME64 => self.sys_clock_gettime64(mem, a[0], a[1])?,
            nr::PPOLL => 0,
            nr::FUTEX => self.sys_futex(mem, a[0], a[1], a[2])?,
            _ => {
                if self.strict {
                    return Err(LinuxError::UnsupportedSyscall {
                        nr: nr_,
                        pc: hart.pc,
                    });
                }
                tracing::warn!(nr = nr_, pc = format_args!("0x{:08x}", hart.pc), "unknown syscall");
                err(errno::ENOSYS)
            }
        };

        tracing::trace!(nr = nr_, ret = format_args!("0x{ret:x}"), "sysret");
        hart.set(Reg::A0, ret);
        Ok(StepResult::Continue)
    }

    fn ebreak(&mut self, hart: &mut Hart, _mem: &mut Memory) -> Result<StepResult, LinuxError> {
        Err(LinuxError::Breakpoint { pc: hart.pc })
    }
}

impl Machine<Linux> {
    /// Load a static executable and prime the Linux personality for it.
    pub fn boot_elf(
        &mut self,
        bytes: &[u8],
        exe_path: &str,
        args: &[String],
        envs: &[String],
    ) -> Result<(), crate::error::MachineError<LinuxError>> {
        let image = self.load_elf(bytes, args, envs)?;
        self.kernel.attach(&image, exe_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> Machine<Linux> {
        Machine::new(Linux::new().capture_output())
    }

    /// Place raw words at `addr` and aim the hart at them.
    fn load_words(m: &mut Machine<Linux>, addr: u32, words: &[u32]) {
        m.mem.map(addr, 0x1000);
        for (i, w) in words.iter().enumerate() {
            m.mem.store::<u32>(addr + (i as u32) * 4, *w).unwrap();
        }
        m.hart.pc = addr;
    }

    #[test]
    fn exit_syscall_stops_the_machine() {
        let mut m = machine();
        // addi a0, zero, 42; addi a7, zero, 93; ecall
        load_words(&mut m, 0x1_0000, &[0x02a0_0513, 0x05d0_0893, 0x0000_0073]);
        assert_eq!(m.run().unwrap(), 42);
        assert_eq!(m.hart.inst_count, 2);
    }

    #[test]
    fn write_reaches_the_capture_sink() {
        let mut m = machine();
        m.mem.map(0x2_0000, 0x1000);
        m.mem.write_bytes(0x2_0000, b"hi\n").unwrap();
        // a0=1 (fd), a1=buf, a2=3, a7=64, ecall; then exit 0
        m.hart.set(Reg::A0, 1);
        m.hart.set(Reg::A1, 0x2_0000);
        m.hart.set(Reg::A2, 3);
        load_words(
            &mut m,
            0x1_0000,
            &[0x0400_0893, 0x0000_0073, 0x0000_0513, 0x05d0_0893, 0x0000_0073],
        );
        assert_eq!(m.run().unwrap(), 0);
        assert_eq!(m.kernel.captured_stdout(), Some(&b"hi\n"[..]));
    }

    #[test]
    fn write_to_bad_fd_fails() {
        let mut m = machine();
        let mut hart = Hart::new();
        let mut mem = Memory::new();
        mem.map(0x2_0000, 0x1000);
        hart.set(Reg::A7, nr::WRITE);
        hart.set(Reg::A0, 7);
        hart.set(Reg::A1, 0x2_0000);
        hart.set(Reg::A2, 1);
        m.kernel.syscall(&mut hart, &mut mem).unwrap();
        assert_eq!(hart.get(Reg::A0) as i32, -errno::EBADF);
    }

    #[test]
    fn writev_gathers_segments() {
        let mut m = machine();
        let mut hart = Hart::new();
        let mut mem = Memory::new();
        mem.map(0x2_0000, 0x1000);
        mem.write_bytes(0x2_0000, b"ab").unwrap();
        mem.write_bytes(0x2_0100, b"cde").unwrap();
        // iovec array at 0x2_0200.
        mem.store::<u32>(0x2_0200, 0x2_0000).unwrap();
        mem.store::<u32>(0x2_0204, 2).unwrap();
        mem.store::<u32>(0x2_0208, 0x2_0100).unwrap();
        mem.store::<u32>(0x2_020c, 3).unwrap();
        hart.set(Reg::A7, nr::WRITEV);
        hart.set(Reg::A0, 1);
        hart.set(Reg::A1, 0x2_0200);
        hart.set(Reg::A2, 2);
        m.kernel.syscall(&mut hart, &mut mem).unwrap();
        assert_eq!(hart.get(Reg::A0), 5);
        assert_eq!(m.kernel.captured_stdout(), Some(&b"abcde"[..]));
    }

    #[test]
    fn brk_grows_and_maps_memory() {
        let mut kernel = Linux::new();
        let mut mem = Memory::new();
        kernel.attach(
            &LoadedImage {
                entry: 0,
                brk: 0x0005_0000,
                sp: 0,
            },
            "/guest",
        );
        assert_eq!(kernel.sys_brk(&mut mem, 0), 0x0005_0000);
        assert_eq!(kernel.sys_brk(&mut mem, 0x0005_4000), 0x0005_4000);
        // The new range is usable memory.
        mem.store::<u32>(0x0005_2000, 7).unwrap();
        // Below the initial break: refused, current break returned.
        assert_eq!(kernel.sys_brk(&mut mem, 0x0004_0000), 0x0005_4000);
    }

    #[test]
    fn mmap_anonymous_allocates_fresh_pages() {
        let mut kernel = Linux::new();
        let mut mem = Memory::new();
        let at = kernel.sys_mmap(
            &mut mem,
            0,
            8192,
            mman::PROT_READ | mman::PROT_WRITE,
            mman::MAP_PRIVATE | mman::MAP_ANONYMOUS,
            u32::MAX,
        );
        assert_eq!(at, MMAP_BASE);
        mem.store::<u32>(at + 4096, 1).unwrap();
        // Next allocation does not overlap.
        let at2 = kernel.sys_mmap(
            &mut mem,
            0,
            4096,
            mman::PROT_READ,
            mman::MAP_PRIVATE | mman::MAP_ANONYMOUS,
            u32::MAX,
        );
        assert_eq!(at2, MMAP_BASE + 8192);
    }

    #[test]
    fn mmap_rejects_file_mappings() {
        let mut kernel = Linux::new();
        let mut mem = Memory::new();
        let ret = kernel.sys_mmap(&mut mem, 0, 4096, 0, mman::MAP_PRIVATE, 3);
        assert_eq!(ret as i32, -errno::ENODEV);
    }

    #[test]
    fn huge_write_length_faults_instead_of_allocating() {
        let mut m = machine();
        let mut hart = Hart::new();
        let mut mem = Memory::new();
        mem.map(0x2_0000, 0x1000);
        hart.set(Reg::A7, nr::WRITE);
        hart.set(Reg::A0, 1);
        hart.set(Reg::A1, 0x2_0000);
        hart.set(Reg::A2, u32::MAX);
        let err = m.kernel.syscall(&mut hart, &mut mem).unwrap_err();
        assert!(matches!(err, LinuxError::Memory(_)));
        // The fault hit before anything left the first mapped page.
        assert_eq!(m.kernel.captured_stdout(), Some(&[][..]));
    }

    #[test]
    fn huge_getrandom_length_faults_instead_of_allocating() {
        let mut m = machine();
        let mut hart = Hart::new();
        let mut mem = Memory::new();
        mem.map(0x2_0000, 0x1000);
        hart.set(Reg::A7, nr::GETRANDOM);
        hart.set(Reg::A0, 0x2_0000);
        hart.set(Reg::A1, u32::MAX);
        let err = m.kernel.syscall(&mut hart, &mut mem).unwrap_err();
        assert!(matches!(err, LinuxError::Memory(_)));
    }

    #[test]
    fn mmap_cursor_stops_below_the_stack() {
        let mut kernel = Linux::new();
        let mut mem = Memory::new();
        kernel.mmap_cursor = MMAP_CEILING - PAGE_SIZE;
        let at = kernel.sys_mmap(
            &mut mem,
            0,
            PAGE_SIZE,
            mman::PROT_READ | mman::PROT_WRITE,
            mman::MAP_PRIVATE | mman::MAP_ANONYMOUS,
            u32::MAX,
        );
        assert_eq!(at, MMAP_CEILING - PAGE_SIZE);
        // The region is exhausted; the next request must not reach the
        // stack mapping.
        let full = kernel.sys_mmap(
            &mut mem,
            0,
            PAGE_SIZE,
            mman::PROT_READ | mman::PROT_WRITE,
            mman::MAP_PRIVATE | mman::MAP_ANONYMOUS,
            u32::MAX,
        );
        assert_eq!(full as i32, -errno::ENOMEM);
    }

    #[test]
    fn futex_wait_with_stale_value_fails() {
        let kernel = Linux::new();
        let mut mem = Memory::new();
        mem.map(0x2_0000, 0x1000);
        mem.store::<u32>(0x2_0000, 5).unwrap();
        assert_eq!(
            kernel.sys_futex(&mem, 0x2_0000, abi::futex::WAIT, 4).unwrap() as i32,
            -errno::EAGAIN
        );
        assert_eq!(
            kernel.sys_futex(&mem, 0x2_0000, abi::futex::WAIT, 5).unwrap(),
            0
        );
    }

    #[test]
    fn unknown_syscall_returns_enosys_by_default() {
        let mut m = machine();
        let mut hart = Hart::new();
        let mut mem = Memory::new();
        hart.set(Reg::A7, 9999);
        let res = m.kernel.syscall(&mut hart, &mut mem).unwrap();
        assert_eq!(res, StepResult::Continue);
        assert_eq!(hart.get(Reg::A0) as i32, -errno::ENOSYS);
    }

    #[test]
    fn unknown_syscall_errors_in_strict_mode() {
        let mut kernel = Linux::new().strict_syscalls(true);
        let mut hart = Hart::new();
        let mut mem = Memory::new();
        hart.set(Reg::A7, 9999);
        let err = kernel.syscall(&mut hart, &mut mem).unwrap_err();
        assert!(matches!(err, LinuxError::UnsupportedSyscall { nr: 9999, .. }));
    }

    #[test]
    fn clock_gettime_monotonic_is_monotonic() {
        let kernel = Linux::new();
        let mut mem = Memory::new();
        mem.map(0x2_0000, 0x1000);
        kernel
            .sys_clock_gettime64(&mut mem, abi::clock::MONOTONIC, 0x2_0000)
            .unwrap();
        let s1: i64 = mem.load(0x2_0000).unwrap();
        let n1: i64 = mem.load(0x2_0008).unwrap();
        kernel
            .sys_clock_gettime64(&mut mem, abi::clock::MONOTONIC, 0x2_0010)
            .unwrap();
        let s2: i64 = mem.load(0x2_0010).unwrap();
        let n2: i64 = mem.load(0x2_0018).unwrap();
        assert!((s2, n2) >= (s1, n1));
    }

    #[test]
    fn boots_and_runs_a_tiny_elf() {
        use crate::loader::tests::tiny_elf;

        // addi a0, zero, 7; addi a7, zero, 93; ecall
        let elf = tiny_elf(&[0x0070_0513, 0x05d0_0893, 0x0000_0073]);
        let mut m = machine();
        m.boot_elf(&elf, "/guest", &["guest".into()], &[]).unwrap();
        assert_eq!(m.run().unwrap(), 7);
    }
}
