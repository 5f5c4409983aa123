//! Encodes the jumps that are written over a function's entry point, and writes them into
//! executable memory.

use byteorder::{ByteOrder, LittleEndian};
use once_cell::sync::Lazy;
use region::Protection;
use std::sync::Mutex;

use crate::error::{Error, Result};

/// The width of the addresses that a patch works with. This decides which kind of jump we write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressWidth {
    /// 32-bit addresses. Patched with a 5-byte relative jump.
    Narrow,

    /// 64-bit addresses. Patched with a 12-byte absolute jump through `rax`.
    Wide,
}

impl AddressWidth {
    /// Returns the address width of the current process.
    pub const fn native() -> AddressWidth {
        if cfg!(target_pointer_width = "64") {
            AddressWidth::Wide
        } else {
            AddressWidth::Narrow
        }
    }

    /// The number of bytes in an address of this width.
    pub const fn bytes(self) -> usize {
        match self {
            AddressWidth::Narrow => 4,
            AddressWidth::Wide => 8,
        }
    }

    /// The number of bytes at the source entry point that a patch of this width destroys.
    pub const fn patch_len(self) -> usize {
        match self {
            AddressWidth::Narrow => NARROW_PATCH_LEN,
            AddressWidth::Wide => WIDE_PATCH_LEN,
        }
    }
}

/// An address in the process's code, tagged with the width it was taken at. This is only a view:
/// nothing here keeps the code it points to mapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RawFunctionAddress {
    address: u64,
    width: AddressWidth,
}

impl RawFunctionAddress {
    pub const fn new(address: u64, width: AddressWidth) -> RawFunctionAddress {
        RawFunctionAddress { address, width }
    }

    /// Tags an address from this process with the process's own width.
    pub fn native(address: usize) -> RawFunctionAddress {
        RawFunctionAddress::new(address as u64, AddressWidth::native())
    }

    pub fn address(self) -> u64 {
        self.address
    }

    pub fn width(self) -> AddressWidth {
        self.width
    }
}

// mov rax, imm64
const MOV_RAX_IMM64: [u8; 2] = [0x48, 0xb8];

// jmp rax
const JMP_RAX: [u8; 2] = [0xff, 0xe0];

// jmp rel32
const JMP_REL32: u8 = 0xe9;

const WIDE_PATCH_LEN: usize = 12;
const NARROW_PATCH_LEN: usize = 5;

/// The bytes that redirect one entry point to another.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JumpPatch {
    buf: [u8; WIDE_PATCH_LEN],
    len: usize,
}

impl JumpPatch {
    /// Encodes a jump from `source` to `destination` for the given address width.
    pub fn encode(width: AddressWidth, source: u64, destination: u64) -> JumpPatch {
        let mut buf = [0u8; WIDE_PATCH_LEN];

        match width {
            AddressWidth::Wide => {
                buf[..2].copy_from_slice(&MOV_RAX_IMM64);
                LittleEndian::write_u64(&mut buf[2..10], destination);
                buf[10..12].copy_from_slice(&JMP_RAX);
            }

            AddressWidth::Narrow => {
                buf[0] = JMP_REL32;
                LittleEndian::write_i32(&mut buf[1..5], relative_offset(source, destination));
            }
        }

        JumpPatch {
            buf,
            len: width.patch_len(),
        }
    }

    /// The patch bytes, ready to be written at the source entry point.
    pub fn bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

/// Computes the operand of a `jmp rel32` placed at `source`. The offset is measured from the end of
/// the jump instruction, so its own length is subtracted.
pub fn relative_offset(source: u64, destination: u64) -> i32 {
    (destination as u32)
        .wrapping_sub(source as u32)
        .wrapping_sub(NARROW_PATCH_LEN as u32) as i32
}

/// Something that can overwrite bytes in the process's code.
pub trait CodeWriter {
    /// Writes `bytes` at `address`.
    ///
    /// # Safety
    ///
    /// `address` must point to at least `bytes.len()` bytes of mapped memory, and no thread may be
    /// executing those bytes while they are being written.
    unsafe fn write(&self, address: u64, bytes: &[u8]) -> Result<()>;
}

/// Serialises protection changes so that one write can't restore a page another is still writing.
static PROTECT_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Writes into code pages by making them writable for the duration of the write.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProtectedWriter;

impl CodeWriter for ProtectedWriter {
    unsafe fn write(&self, address: u64, bytes: &[u8]) -> Result<()> {
        if !cfg!(any(target_arch = "x86", target_arch = "x86_64")) {
            return Err(Error::UnsupportedArch);
        }

        let _lock = PROTECT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let target = address as usize as *mut u8;

        // The previous protection is restored when the guard drops.
        let _guard = region::protect_with_handle(
            target as *const u8,
            bytes.len(),
            Protection::READ_WRITE_EXECUTE,
        )?;

        std::ptr::copy_nonoverlapping(bytes.as_ptr(), target, bytes.len());

        Ok(())
    }
}
