//! Test fixtures and environment helpers.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Result;
use tempfile::TempDir;

/// Returns `true` if a `zip` binary is on `PATH` for end-to-end archive tests.
#[must_use]
pub fn zip_available() -> bool {
    program_available("zip", &["-v"])
}

fn program_available(program: &str, args: &[&str]) -> bool {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Temporary photo root laid out the way the service expects:
///
/// ```text
/// <root>/7kna/1.jpg
/// <root>/7kna/2.jpg
/// <root>/7kna/raw/3.cr2
/// <root>/empty/
/// <root>/notes.txt
/// ```
#[derive(Debug)]
pub struct PhotoTree {
    temp: TempDir,
}

impl PhotoTree {
    /// Album directory holding the payload files.
    pub const ALBUM: &'static str = "7kna";
    /// Album directory with no files.
    pub const EMPTY_ALBUM: &'static str = "empty";
    /// Regular file directly under the root.
    pub const LOOSE_FILE: &'static str = "notes.txt";
    /// Primary payload file inside [`Self::ALBUM`].
    pub const PAYLOAD: &'static str = "1.jpg";

    /// Create the tree in a fresh temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or any file cannot be written.
    pub fn new() -> Result<Self> {
        let temp = TempDir::new()?;
        let album = temp.path().join(Self::ALBUM);
        fs::create_dir_all(album.join("raw"))?;
        fs::create_dir_all(temp.path().join(Self::EMPTY_ALBUM))?;
        fs::write(album.join(Self::PAYLOAD), payload(64 * 1024, 7))?;
        fs::write(album.join("2.jpg"), payload(3 * 1024, 11))?;
        fs::write(album.join("raw").join("3.cr2"), payload(10 * 1024, 13))?;
        fs::write(temp.path().join(Self::LOOSE_FILE), b"not an album")?;
        Ok(Self { temp })
    }

    /// Root directory to configure as the photo root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Path of [`Self::ALBUM`].
    #[must_use]
    pub fn album(&self) -> PathBuf {
        self.root().join(Self::ALBUM)
    }

    /// Contents of [`Self::PAYLOAD`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn payload_bytes(&self) -> Result<Vec<u8>> {
        Ok(fs::read(self.album().join(Self::PAYLOAD))?)
    }

    /// Relative paths of every file in [`Self::ALBUM`], sorted.
    #[must_use]
    pub fn album_files() -> Vec<&'static str> {
        vec!["1.jpg", "2.jpg", "raw/3.cr2"]
    }
}

fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|index| {
            let byte = index.to_le_bytes()[0];
            byte.wrapping_mul(seed).wrapping_add(seed)
        })
        .collect()
}
