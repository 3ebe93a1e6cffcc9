use std::io::{self, Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use thiserror::Error;

use crate::frame::Compression;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("zlib stream error: {0}")]
    Zlib(#[from] io::Error),
    #[error("inflated document exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// Deflate `data` into a zlib stream, falling back to `Stored` when that
/// does not make it smaller (already compressed or encrypted input).
pub fn compress(data: &[u8]) -> Result<(Compression, Vec<u8>), CompressError> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), flate2::Compression::best());
    encoder.write_all(data)?;
    let deflated = encoder.finish()?;

    if deflated.len() < data.len() {
        Ok((Compression::Zlib, deflated))
    } else {
        Ok((Compression::Stored, data.to_vec()))
    }
}

/// Undo [`compress`]. Output larger than `limit` bytes is refused.
pub fn decompress(compression: Compression, data: &[u8], limit: usize) -> Result<Vec<u8>, CompressError> {
    match compression {
        Compression::Stored => Ok(data.to_vec()),
        Compression::Zlib => {
            let mut out = Vec::new();
            // One byte past the limit tells "exactly limit" from "too large"
            ZlibDecoder::new(data)
                .take(limit as u64 + 1)
                .read_to_end(&mut out)?;
            if out.len() > limit {
                return Err(CompressError::TooLarge { limit });
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_text_is_deflated() {
        let text = b"paper remembers what disks forget. ".repeat(200);
        let (tag, packed) = compress(&text).unwrap();
        assert_eq!(tag, Compression::Zlib);
        assert!(packed.len() < text.len() / 10);
        assert_eq!(decompress(tag, &packed, usize::MAX - 1).unwrap(), text);
    }

    #[test]
    fn test_random_bytes_are_stored() {
        let mut data = vec![0u8; 4096];
        ChaCha8Rng::seed_from_u64(3).fill_bytes(&mut data);
        let (tag, packed) = compress(&data).unwrap();
        assert_eq!(tag, Compression::Stored);
        assert_eq!(packed, data);
        assert_eq!(decompress(tag, &packed, 4096).unwrap(), data);
    }

    #[test]
    fn test_empty_input() {
        let (tag, packed) = compress(&[]).unwrap();
        assert_eq!(tag, Compression::Stored);
        assert!(decompress(tag, &packed, 0).unwrap().is_empty());
    }

    #[test]
    fn test_inflate_limit() {
        let zeros = vec![0u8; 100_000];
        let (tag, packed) = compress(&zeros).unwrap();
        assert_eq!(tag, Compression::Zlib);
        assert_eq!(decompress(tag, &packed, 100_000).unwrap().len(), 100_000);
        assert!(matches!(
            decompress(tag, &packed, 99_999),
            Err(CompressError::TooLarge { limit: 99_999 })
        ));
    }

    #[test]
    fn test_corrupt_stream() {
        let (_, mut packed) = compress(&b"abcabcabc".repeat(50)).unwrap();
        // Break the zlib header's method field
        packed[0] ^= 0xFF;
        assert!(matches!(
            decompress(Compression::Zlib, &packed, 1 << 20),
            Err(CompressError::Zlib(_))
        ));
    }
}
