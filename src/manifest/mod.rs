//! File metadata carried at the front of the document body.
//!
//! Layout, little-endian: name length (u16), UTF-8 name, original size (u64),
//! then the file content. The manifest is compressed and sealed together with
//! the content, so an encrypted document does not leak its file name.

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

const NAME_LEN_SIZE: usize = 2;
const SIZE_FIELD_SIZE: usize = 8;

#[derive(Error, Debug, PartialEq)]
pub enum ManifestError {
    #[error("document manifest is truncated")]
    Truncated,
    #[error("file name is not valid UTF-8")]
    BadName,
    #[error("file name of {0} bytes is too long")]
    NameTooLong(usize),
    #[error("manifest declares {declared} bytes but {actual} follow")]
    SizeMismatch { declared: u64, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    pub name: Option<String>,
    pub original_size: u64,
}

impl Manifest {
    pub fn new(name: Option<&str>, original_size: usize) -> Self {
        Self {
            name: name.filter(|n| !n.is_empty()).map(str::to_owned),
            original_size: original_size as u64,
        }
    }

    /// The stored name reduced to its final path component, so a crafted
    /// document cannot point the writer outside the output directory.
    pub fn file_name(&self) -> Option<&str> {
        let name = self.name.as_deref()?;
        Path::new(name).file_name().and_then(|n| n.to_str())
    }

    /// Serialise the manifest followed by `content`.
    pub fn prepend(&self, content: &[u8]) -> Result<Vec<u8>, ManifestError> {
        let name = self.name.as_deref().unwrap_or("").as_bytes();
        let name_len = u16::try_from(name.len()).map_err(|_| ManifestError::NameTooLong(name.len()))?;

        let mut out = Vec::with_capacity(NAME_LEN_SIZE + name.len() + SIZE_FIELD_SIZE + content.len());
        let mut field = [0u8; SIZE_FIELD_SIZE];
        LittleEndian::write_u16(&mut field, name_len);
        out.extend_from_slice(&field[..NAME_LEN_SIZE]);
        out.extend_from_slice(name);
        LittleEndian::write_u64(&mut field, self.original_size);
        out.extend_from_slice(&field);
        out.extend_from_slice(content);
        Ok(out)
    }

    /// Parse the manifest at the front of `body` and return it with the content.
    pub fn split(body: &[u8]) -> Result<(Self, &[u8]), ManifestError> {
        if body.len() < NAME_LEN_SIZE {
            return Err(ManifestError::Truncated);
        }
        let name_len = LittleEndian::read_u16(body) as usize;
        let size_at = NAME_LEN_SIZE + name_len;
        let content_at = size_at + SIZE_FIELD_SIZE;
        if body.len() < content_at {
            return Err(ManifestError::Truncated);
        }

        let name = std::str::from_utf8(&body[NAME_LEN_SIZE..size_at]).map_err(|_| ManifestError::BadName)?;
        let original_size = LittleEndian::read_u64(&body[size_at..content_at]);
        let content = &body[content_at..];
        if original_size != content.len() as u64 {
            return Err(ManifestError::SizeMismatch {
                declared: original_size,
                actual: content.len(),
            });
        }

        let manifest = Self {
            name: (!name.is_empty()).then(|| name.to_owned()),
            original_size,
        };
        Ok((manifest, content))
    }
}
