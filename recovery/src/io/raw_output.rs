//! Reading captured model output from a file or stdin.

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Where raw output comes from. `-` means stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSource {
    Stdin,
    File(PathBuf),
}

impl RawSource {
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            RawSource::Stdin
        } else {
            RawSource::File(PathBuf::from(arg))
        }
    }

    /// Read every byte; decoding is left to the parser.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        match self {
            RawSource::Stdin => {
                let mut buf = Vec::new();
                std::io::stdin()
                    .read_to_end(&mut buf)
                    .context("read stdin")?;
                Ok(buf)
            }
            RawSource::File(path) => {
                fs::read(path).with_context(|| format!("read {}", path.display()))
            }
        }
    }

    /// Read and decode as UTF-8, replacing invalid sequences.
    pub fn read_lossy(&self) -> Result<String> {
        let bytes = self.read_bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
