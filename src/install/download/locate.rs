//! Executable discovery by content sniffing
//!
//! Release archives ship READMEs, licenses, completions and man pages next to
//! the binary, and file names are not reliable. Each file's leading bytes are
//! classified instead; the first native executable in walk order wins.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Number of leading bytes read from each candidate file
pub const SNIFF_LEN: usize = 261;

/// Native executable formats recognised by the locator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutableKind {
    Elf,
    MachO,
}

impl fmt::Display for ExecutableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutableKind::Elf => f.write_str("ELF"),
            ExecutableKind::MachO => f.write_str("Mach-O"),
        }
    }
}

/// Classifies a file from its leading bytes
pub trait ExecutableClassifier: Send + Sync + fmt::Debug {
    fn classify(&self, header: &[u8]) -> Option<ExecutableKind>;
}

/// Magic-number classifier for ELF and Mach-O (thin and universal) files
#[derive(Debug, Default, Clone, Copy)]
pub struct MagicClassifier;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
/// Smallest ELF header (32-bit) is 52 bytes
const ELF_MIN_LEN: usize = 52;
/// Java class files share the fat Mach-O magic; their version field is far
/// above any realistic architecture count.
const MAX_FAT_ARCHS: u32 = 20;

impl ExecutableClassifier for MagicClassifier {
    fn classify(&self, header: &[u8]) -> Option<ExecutableKind> {
        if header.len() > ELF_MIN_LEN && header.starts_with(&ELF_MAGIC) {
            return Some(ExecutableKind::Elf);
        }

        match header.get(..4)? {
            [0xfe, 0xed, 0xfa, 0xce]
            | [0xfe, 0xed, 0xfa, 0xcf]
            | [0xce, 0xfa, 0xed, 0xfe]
            | [0xcf, 0xfa, 0xed, 0xfe] => Some(ExecutableKind::MachO),
            [0xca, 0xfe, 0xba, 0xbe] => {
                let count = header.get(4..8)?;
                let count = u32::from_be_bytes([count[0], count[1], count[2], count[3]]);
                (1..=MAX_FAT_ARCHS)
                    .contains(&count)
                    .then_some(ExecutableKind::MachO)
            }
            _ => None,
        }
    }
}

/// Walks an extracted tree looking for the release binary
#[derive(Debug, Clone)]
pub struct ExecutableLocator {
    classifier: Arc<dyn ExecutableClassifier>,
}

impl Default for ExecutableLocator {
    fn default() -> Self {
        Self::new(Arc::new(MagicClassifier))
    }
}

impl ExecutableLocator {
    pub fn new(classifier: Arc<dyn ExecutableClassifier>) -> Self {
        Self { classifier }
    }

    /// Depth-first walk of `dir` in file name order, returning the first
    /// regular file classified as a native executable.
    pub fn locate(&self, dir: &Path) -> Result<PathBuf> {
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable path during executable search: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            match self.sniff(entry.path()) {
                Ok(Some(kind)) => {
                    debug!("Found {kind} executable: {}", entry.path().display());
                    return Ok(entry.into_path());
                }
                Ok(None) => {}
                Err(e) => debug!("Could not sniff {}: {e}", entry.path().display()),
            }
        }

        Err(Error::NoExecutableFound)
    }

    fn sniff(&self, path: &Path) -> std::io::Result<Option<ExecutableKind>> {
        let mut header = Vec::with_capacity(SNIFF_LEN);
        File::open(path)?
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut header)?;
        Ok(self.classifier.classify(&header))
    }
}
