//! Temp-file prompt transport.
//!
//! Prompts are handed to the external tool through a plain-text file in
//! the platform temp directory, redirected into the tool's stdin. The
//! temp namespace is shared across concurrent invocations, so every file
//! name carries a random 16-hex-character suffix.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A prompt written to a uniquely named temporary file.
///
/// The file is removed when the guard drops, which covers every exit
/// path of an invocation: success, failure, timeout, and cancellation.
pub struct PromptFile {
    path: PathBuf,
}

impl PromptFile {
    /// Writes `prompt` (UTF-8) to a fresh temp file.
    pub fn create(prompt: &str) -> io::Result<Self> {
        let suffix: u64 = rand::random();
        let path = std::env::temp_dir().join(format!("sable-prompt-{:016x}.txt", suffix));
        fs::write(&path, prompt)?;
        Ok(Self { path })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the file for use as a child process stdin.
    pub fn open(&self) -> io::Result<fs::File> {
        fs::File::open(&self.path)
    }
}

impl Drop for PromptFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!("Failed to remove prompt file {:?}: {}", self.path, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_file_created_and_removed() {
        let path = {
            let file = PromptFile::create("hello tool").unwrap();
            assert!(file.path().exists());
            assert_eq!(fs::read_to_string(file.path()).unwrap(), "hello tool");
            file.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_prompt_file_names_are_unique() {
        let a = PromptFile::create("a").unwrap();
        let b = PromptFile::create("b").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_prompt_file_suffix_is_16_hex_chars() {
        let file = PromptFile::create("x").unwrap();
        let name = file.path().file_name().unwrap().to_string_lossy().to_string();
        let suffix = name
            .strip_prefix("sable-prompt-")
            .and_then(|s| s.strip_suffix(".txt"))
            .unwrap();
        assert_eq!(suffix.len(), 16);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
