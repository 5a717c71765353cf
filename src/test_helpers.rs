//! Test utilities for creating temporary files to follow.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct TempFollowFile {
    pub path: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl TempFollowFile {
    /// Create a new empty temporary file
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("tailed.txt");

        File::create(&path)?;

        Ok(Self {
            path,
            _temp_dir: temp_dir,
        })
    }

    /// Create a temporary file holding `count` copies of `line`
    pub fn with_lines(count: usize, line: &str) -> std::io::Result<Self> {
        let temp_file = Self::new()?;
        temp_file.append_lines(count, line)?;
        Ok(temp_file)
    }

    /// Append `count` newline-terminated copies of `line`
    pub fn append_lines(&self, count: usize, line: &str) -> std::io::Result<()> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = BufWriter::new(file);

        for _ in 0..count {
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_empty_file() {
        let temp_file = TempFollowFile::new().unwrap();
        assert!(temp_file.path().exists());

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.is_empty());
    }

    #[test]
    fn test_with_lines() {
        let temp_file = TempFollowFile::with_lines(3, "abc").unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(content, "abc\nabc\nabc\n");
    }

    #[test]
    fn test_append_lines() {
        let temp_file = TempFollowFile::with_lines(1, "first").unwrap();
        temp_file.append_lines(2, "next").unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(content, "first\nnext\nnext\n");
    }
}
