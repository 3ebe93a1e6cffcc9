use crc::{Crc, CRC_32_MPEG_2};
use sha2::{Digest, Sha256};

/// CRC-32/MPEG-2 calculator.
const CRC_MPEG2: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// Width of the checksum field in the frame header.
pub const CHECKSUM_SIZE: usize = 4;

/// Compute CRC-32/MPEG-2 over a byte slice.
pub fn crc32_mpeg2(data: &[u8]) -> u32 {
    CRC_MPEG2.checksum(data)
}

/// Compute the frame checksum: header (with the checksum field zeroed) + payload.
pub fn frame_crc32(header: &[u8], checksum_offset: usize, payload: &[u8]) -> u32 {
    let mut digest = CRC_MPEG2.digest();

    digest.update(&header[..checksum_offset]);
    digest.update(&[0u8; CHECKSUM_SIZE]);
    if checksum_offset + CHECKSUM_SIZE < header.len() {
        digest.update(&header[checksum_offset + CHECKSUM_SIZE..]);
    }
    digest.update(payload);

    digest.finalize()
}

/// SHA-256 digest type.
pub type Sha256Digest = [u8; 32];

/// Compute SHA-256 hash of a byte slice.
pub fn sha256(data: &[u8]) -> Sha256Digest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&result);
    digest
}

/// Document identifier carried in every page header: the first eight bytes
/// of the SHA-256 of the full reassembled body, little-endian.
pub fn document_id(body: &[u8]) -> u64 {
    let digest = sha256(body);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(prefix)
}

/// Lowercase hex rendering of a SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    sha256(data).iter().map(|b| format!("{:02x}", b)).collect()
}
