//! Sparse paged guest memory.
//!
//! The guest sees the full 32-bit address space; backing pages are
//! allocated on `map` and freed on `unmap`. Plain loads and stores may
//! be misaligned and may straddle pages (rv32 Linux hardware allows
//! this), but any byte touching an unmapped page faults.

use crate::error::{MemoryAccess, MemoryError};

/// Page size in bytes. Matches the guest kernel's AT_PAGESZ.
pub const PAGE_SIZE: u32 = 4096;

const PAGE_SHIFT: u32 = 12;
const PAGE_COUNT: usize = 1 << 20;

type Page = [u8; PAGE_SIZE as usize];

/// A guest address space.
pub struct Memory {
    pages: Vec<Option<Box<Page>>>,
}

/// A scalar that can be loaded from / stored to guest memory.
///
/// All guest-visible scalars are little-endian.
pub trait Scalar: Copy {
    const SIZE: usize;
    fn from_le(bytes: &[u8]) -> Self;
    fn to_le(self, out: &mut [u8]);
}

macro_rules! impl_scalar {
    ($($ty:ty),*) => {
        $(impl Scalar for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();

            fn from_le(bytes: &[u8]) -> Self {
                <$ty>::from_le_bytes(bytes.try_into().expect("scalar width"))
            }

            fn to_le(self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_le_bytes());
            }
        })*
    };
}

impl_scalar!(u8, i8, u16, i16, u32, i32, u64, i64);

impl Memory {
    pub fn new() -> Self {
        Memory {
            pages: vec![None; PAGE_COUNT],
        }
    }

    /// Map the pages covering `[addr, addr + len)`, zero-filled.
    ///
    /// Already-mapped pages in the range keep their contents, so
    /// overlapping mappings (brk growth, MAP_FIXED over a hole) are fine.
    pub fn map(&mut self, addr: u32, len: u32) {
        if len == 0 {
            return;
        }
        let first = (addr >> PAGE_SHIFT) as usize;
        let last = ((addr as u64 + len as u64 - 1) >> PAGE_SHIFT) as usize;
        for page in &mut self.pages[first..=last.min(PAGE_COUNT - 1)] {
            if page.is_none() {
                *page = Some(Box::new([0u8; PAGE_SIZE as usize]));
            }
        }
    }

    /// Drop the pages fully covered by `[addr, addr + len)`.
    pub fn unmap(&mut self, addr: u32, len: u32) {
        if len == 0 {
            return;
        }
        let first = (addr >> PAGE_SHIFT) as usize;
        let last = ((addr as u64 + len as u64 - 1) >> PAGE_SHIFT) as usize;
        for page in &mut self.pages[first..=last.min(PAGE_COUNT - 1)] {
            *page = None;
        }
    }

    /// Whether the byte at `addr` has a backing page.
    pub fn is_mapped(&self, addr: u32) -> bool {
        self.pages[(addr >> PAGE_SHIFT) as usize].is_some()
    }

    /// Load a little-endian scalar.
    pub fn load<T: Scalar>(&self, addr: u32) -> Result<T, MemoryError> {
        let mut buf = [0u8; 8];
        self.copy_out(addr, &mut buf[..T::SIZE], MemoryAccess::Load)?;
        Ok(T::from_le(&buf[..T::SIZE]))
    }

    /// Store a little-endian scalar.
    pub fn store<T: Scalar>(&mut self, addr: u32, val: T) -> Result<(), MemoryError> {
        let mut buf = [0u8; 8];
        val.to_le(&mut buf[..T::SIZE]);
        self.copy_in(addr, &buf[..T::SIZE], MemoryAccess::Store)
    }

    /// Read `out.len()` bytes starting at `addr`.
    pub fn read_bytes(&self, addr: u32, out: &mut [u8]) -> Result<(), MemoryError> {
        self.copy_out(addr, out, MemoryAccess::Load)
    }

    /// Write `data` starting at `addr`.
    pub fn write_bytes(&mut self, addr: u32, data: &[u8]) -> Result<(), MemoryError> {
        self.copy_in(addr, data, MemoryAccess::Store)
    }

    /// Read a NUL-terminated guest string of at most `max` bytes
    /// (terminator excluded).
    pub fn read_cstr(&self, addr: u32, max: u32) -> Result<Vec<u8>, MemoryError> {
        let mut out = Vec::new();
        for i in 0..max {
            let byte: u8 = self.load(addr.wrapping_add(i))?;
            if byte == 0 {
                return Ok(out);
            }
            out.push(byte);
        }
        Err(MemoryError::StringOverrun { addr, max })
    }

    /// Fetch the (up to 32-bit) instruction word at `addr`.
    ///
    /// Reads the low halfword first so that a compressed instruction in
    /// the last two bytes of a mapping does not fault on the tail.
    pub fn fetch(&self, addr: u32) -> Result<u32, MemoryError> {
        let mut half = [0u8; 2];
        self.copy_out(addr, &mut half, MemoryAccess::Fetch)?;
        let lo = u16::from_le_bytes(half) as u32;
        if lo & 0b11 != 0b11 {
            return Ok(lo);
        }
        self.copy_out(addr.wrapping_add(2), &mut half, MemoryAccess::Fetch)?;
        Ok(lo | ((u16::from_le_bytes(half) as u32) << 16))
    }

    fn copy_out(&self, addr: u32, out: &mut [u8], access: MemoryAccess) -> Result<(), MemoryError> {
        let mut cur = addr;
        let mut done = 0;
        while done < out.len() {
            let page = self.pages[(cur >> PAGE_SHIFT) as usize]
                .as_deref()
                .ok_or(MemoryError::Unmapped { access, addr: cur })?;
            let off = (cur & (PAGE_SIZE - 1)) as usize;
            let chunk = (out.len() - done).min(PAGE_SIZE as usize - off);
            out[done..done + chunk].copy_from_slice(&page[off..off + chunk]);
            done += chunk;
            cur = cur.wrapping_add(chunk as u32);
        }
        Ok(())
    }

    fn copy_in(&mut self, addr: u32, data: &[u8], access: MemoryAccess) -> Result<(), MemoryError> {
        let mut cur = addr;
        let mut done = 0;
        while done < data.len() {
            let page = self.pages[(cur >> PAGE_SHIFT) as usize]
                .as_deref_mut()
                .ok_or(MemoryError::Unmapped { access, addr: cur })?;
            let off = (cur & (PAGE_SIZE - 1)) as usize;
            let chunk = (data.len() - done).min(PAGE_SIZE as usize - off);
            page[off..off + chunk].copy_from_slice(&data[done..done + chunk]);
            done += chunk;
            cur = cur.wrapping_add(chunk as u32);
        }
        Ok(())
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}
