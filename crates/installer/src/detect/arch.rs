//! Executable architecture detection from PE headers

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use once_cell::sync::Lazy;
use tracing::trace;

const DOS_MAGIC: &[u8; 2] = b"MZ";
const PE_SIGNATURE: &[u8; 4] = b"PE\0\0";
/// Offset of `e_lfanew` inside the DOS header
const PE_OFFSET_FIELD: u64 = 0x3C;
/// Upper bound for `e_lfanew`; real linkers keep it well under this
const MAX_PE_OFFSET: u32 = 0x1000_0000;

const MACHINE_I386: u16 = 0x014C;
const MACHINE_AMD64: u16 = 0x8664;
const MACHINE_ARM64: u16 = 0xAA64;

/// Detection results keyed by path, shared across install runs
static ARCH_CACHE: Lazy<RwLock<HashMap<PathBuf, ExecutableArch>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Target machine of a Windows executable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutableArch {
    Unknown,
    X86,
    X64,
    Arm64,
}

impl std::fmt::Display for ExecutableArch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutableArch::Unknown => write!(f, "unknown"),
            ExecutableArch::X86 => write!(f, "x86"),
            ExecutableArch::X64 => write!(f, "x64"),
            ExecutableArch::Arm64 => write!(f, "arm64"),
        }
    }
}

/// Read the machine type of a PE file
///
/// Structural problems (truncated file, wrong magic, bad PE signature, offset
/// out of range) and I/O errors all yield [`ExecutableArch::Unknown`].
pub fn detect(path: &Path) -> ExecutableArch {
    let Ok(mut file) = File::open(path) else {
        return ExecutableArch::Unknown;
    };
    read_machine(&mut file).unwrap_or(ExecutableArch::Unknown)
}

/// Like [`detect`], memoized per path
pub fn detect_cached(path: &Path) -> ExecutableArch {
    if let Ok(cache) = ARCH_CACHE.read() {
        if let Some(arch) = cache.get(path) {
            return *arch;
        }
    }

    let arch = detect(path);
    if let Ok(mut cache) = ARCH_CACHE.write() {
        cache.insert(path.to_path_buf(), arch);
    }
    arch
}

/// Tie-break rank for an architecture; lower is better
pub fn penalty(arch: ExecutableArch, is_64bit_host: bool) -> u8 {
    match (arch, is_64bit_host) {
        (ExecutableArch::X64 | ExecutableArch::Arm64, true) => 0,
        (ExecutableArch::X86, true) => 1,
        (ExecutableArch::X86, false) => 0,
        (ExecutableArch::X64 | ExecutableArch::Arm64, false) => 1,
        (ExecutableArch::Unknown, _) => 2,
    }
}

/// Whether the running OS is 64-bit
///
/// A 32-bit build running under WOW64 still reports a 64-bit host.
pub fn is_64bit_host() -> bool {
    if cfg!(target_pointer_width = "64") {
        return true;
    }
    std::env::var_os("PROCESSOR_ARCHITEW6432").is_some()
}

fn read_machine<R: Read + Seek>(reader: &mut R) -> Option<ExecutableArch> {
    let mut magic = [0u8; 2];
    reader.read_exact(&mut magic).ok()?;
    if &magic != DOS_MAGIC {
        return None;
    }

    reader.seek(SeekFrom::Start(PE_OFFSET_FIELD)).ok()?;
    let mut offset = [0u8; 4];
    reader.read_exact(&mut offset).ok()?;
    let pe_offset = u32::from_le_bytes(offset);
    if pe_offset < 0x40 || pe_offset > MAX_PE_OFFSET {
        trace!(pe_offset, "PE header offset out of range");
        return None;
    }

    reader.seek(SeekFrom::Start(pe_offset as u64)).ok()?;
    let mut header = [0u8; 6];
    reader.read_exact(&mut header).ok()?;
    if &header[..4] != PE_SIGNATURE {
        return None;
    }

    let machine = u16::from_le_bytes([header[4], header[5]]);
    Some(match machine {
        MACHINE_I386 => ExecutableArch::X86,
        MACHINE_AMD64 => ExecutableArch::X64,
        MACHINE_ARM64 => ExecutableArch::Arm64,
        _ => ExecutableArch::Unknown,
    })
}

/// Build a minimal PE image for tests
#[cfg(test)]
pub(crate) fn pe_image(machine: u16) -> Vec<u8> {
    let mut data = vec![0u8; 256];
    data[0] = b'M';
    data[1] = b'Z';
    data[0x3C] = 0x80;
    data[0x80..0x84].copy_from_slice(PE_SIGNATURE);
    data[0x84..0x86].copy_from_slice(&machine.to_le_bytes());
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn detect_bytes(data: Vec<u8>) -> ExecutableArch {
        read_machine(&mut Cursor::new(data)).unwrap_or(ExecutableArch::Unknown)
    }

    #[test]
    fn detects_known_machines() {
        assert_eq!(detect_bytes(pe_image(MACHINE_I386)), ExecutableArch::X86);
        assert_eq!(detect_bytes(pe_image(MACHINE_AMD64)), ExecutableArch::X64);
        assert_eq!(detect_bytes(pe_image(MACHINE_ARM64)), ExecutableArch::Arm64);
        assert_eq!(detect_bytes(pe_image(0x01C4)), ExecutableArch::Unknown);
    }

    #[test]
    fn structural_anomalies_are_unknown() {
        assert_eq!(detect_bytes(vec![b'M', b'Z', 0, 0]), ExecutableArch::Unknown);
        assert_eq!(detect_bytes(b"\x7fELF".to_vec()), ExecutableArch::Unknown);

        let mut bad_signature = pe_image(MACHINE_AMD64);
        bad_signature[0x81] = b'X';
        assert_eq!(detect_bytes(bad_signature), ExecutableArch::Unknown);

        let mut out_of_range = pe_image(MACHINE_AMD64);
        out_of_range[0x3C..0x40].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());
        assert_eq!(detect_bytes(out_of_range), ExecutableArch::Unknown);

        let mut past_end = pe_image(MACHINE_AMD64);
        past_end[0x3C] = 0xFE;
        assert_eq!(detect_bytes(past_end), ExecutableArch::Unknown);
    }

    #[test]
    fn detect_reads_files_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("game.exe");
        std::fs::write(&exe, pe_image(MACHINE_AMD64)).unwrap();

        assert_eq!(detect(&exe), ExecutableArch::X64);
        assert_eq!(detect_cached(&exe), ExecutableArch::X64);
        assert_eq!(detect(&dir.path().join("missing.exe")), ExecutableArch::Unknown);
    }

    #[test]
    fn penalty_prefers_native_width() {
        assert!(penalty(ExecutableArch::X64, true) < penalty(ExecutableArch::X86, true));
        assert!(penalty(ExecutableArch::X86, true) < penalty(ExecutableArch::Unknown, true));
        assert_eq!(penalty(ExecutableArch::Arm64, true), penalty(ExecutableArch::X64, true));
        assert!(penalty(ExecutableArch::X86, false) < penalty(ExecutableArch::X64, false));
        assert!(penalty(ExecutableArch::X64, false) < penalty(ExecutableArch::Unknown, false));
    }
}
