use thiserror::Error;

use crate::grid;

pub const MAGIC: u32 = 0x52505042; // "BPPR"
pub const FRAME_VERSION: u8 = 2;

// Frame header size in bytes
pub const FRAME_HEADER_SIZE: usize = 28;

// Frame flag bits
pub const FLAG_ENCRYPTED: u8 = 0x01;
pub const FLAG_LAST_PAGE: u8 = 0x02;

// Page parameters (A4 at 300 DPI)
pub const DEFAULT_PAGE_WIDTH: u32 = 2480;
pub const DEFAULT_PAGE_HEIGHT: u32 = 3508;
pub const DEFAULT_CELL_SIZE: u32 = 6;
pub const MIN_CELL_SIZE: u32 = 2;

/// White quiet zone kept around the grid on every side, in pixels.
pub const PAGE_MARGIN: u32 = 48;

// Alignment markers: a solid square in each grid corner plus a white separator
pub const MARKER_CELLS: usize = 4;
pub const MARKER_SEPARATOR: usize = 1;
pub const MARKER_FOOTPRINT: usize = MARKER_CELLS + MARKER_SEPARATOR;
pub const MARKER_COUNT: usize = 4;

// Error correction parameters
pub const GF_FIELD_SIZE: usize = 256;
pub const MAX_BLOCK_LEN: usize = GF_FIELD_SIZE - 1;
pub const DEFAULT_BLOCK_LEN: usize = MAX_BLOCK_LEN;
pub const DEFAULT_REDUNDANCY: f64 = 0.15;
pub const DEFAULT_INTERLEAVE_GROUPS: usize = 3;

pub const DEFAULT_MAX_PAGES: usize = 64;

// Sampling parameters
pub const THRESHOLD_WINDOW_CELLS: usize = 3;
pub const LOW_CONFIDENCE: f64 = 0.2;
// Pages with more low-confidence cells than this get a warning
pub const LOW_CONFIDENCE_WARN_RATIO: f64 = 0.05;

// Upper bound on an inflated document, guards against zlib bombs
pub const MAX_INFLATED_SIZE: usize = 1 << 30;

// Written when the pages carry no file name
pub const DEFAULT_OUTPUT_NAME: &str = "bitpaper-output.bin";

// Envelope: 16-byte salt prepended, 16-byte poly1305 tag appended
pub const SALT_SIZE: usize = 16;
pub const AEAD_TAG_SIZE: usize = 16;
pub const ENCRYPTION_OVERHEAD: usize = SALT_SIZE + AEAD_TAG_SIZE;

// Nonce size for XChaCha20-Poly1305
pub const NONCE_SIZE: usize = 24;

// Argon2id parameters
pub const ARGON2_MEM_COST: u32 = 65536; // 64 MiB
pub const ARGON2_TIME_COST: u32 = 3;
pub const ARGON2_PARALLELISM: u32 = 4;
pub const ARGON2_OUTPUT_LEN: usize = 32;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("cell size {0} px is below the minimum of {MIN_CELL_SIZE} px")]
    CellTooSmall(u32),
    #[error("block length {0} must be between 3 and {MAX_BLOCK_LEN}")]
    BlockLength(usize),
    #[error("{parity} parity symbols do not leave room for data in a {block_len}-symbol block")]
    ParityLength { parity: usize, block_len: usize },
    #[error("redundancy {0} must be strictly between 0 and 1")]
    Redundancy(f64),
    #[error("interleave group count must be at least 1")]
    NoGroups,
    #[error("max pages must be between 1 and {}", u16::MAX)]
    MaxPages(usize),
    #[error("a {width}x{height} px page cannot hold a single {block_len}-symbol codeword")]
    PageTooSmall {
        width: u32,
        height: u32,
        block_len: usize,
    },
}

/// Runtime configuration for an encode/decode operation.
///
/// Both sides of a transfer must agree on every field: nothing here is stored
/// on the page itself.
#[derive(Debug, Clone)]
pub struct BitpaperConfig {
    pub page_width: u32,
    pub page_height: u32,
    pub cell_size: u32,
    pub block_len: usize,
    pub redundancy: f64,
    pub interleave_groups: usize,
    pub max_pages: usize,
}

impl Default for BitpaperConfig {
    fn default() -> Self {
        Self {
            page_width: DEFAULT_PAGE_WIDTH,
            page_height: DEFAULT_PAGE_HEIGHT,
            cell_size: DEFAULT_CELL_SIZE,
            block_len: DEFAULT_BLOCK_LEN,
            redundancy: DEFAULT_REDUNDANCY,
            interleave_groups: DEFAULT_INTERLEAVE_GROUPS,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// Geometry and stream sizes of a single page, derived from a config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    pub rows: usize,
    pub cols: usize,
    /// Cells available for data after the corner markers are reserved.
    pub data_cells: usize,
    /// Codeword blocks carried by the page.
    pub blocks: usize,
    /// `blocks * block_len`.
    pub stream_len: usize,
    /// Stream length rounded up to a multiple of the interleave group count.
    pub padded_len: usize,
    /// Payload bytes one page can carry after the frame header.
    pub payload_capacity: usize,
}

impl BitpaperConfig {
    /// Parity symbols per codeword: `block_len * redundancy`, rounded and forced even.
    pub fn parity_len(&self) -> usize {
        let raw = (self.block_len as f64 * self.redundancy).round() as usize;
        let even = raw + raw % 2;
        let max_even = (self.block_len - 1) & !1;
        even.clamp(2, max_even.max(2))
    }

    /// Data symbols per codeword.
    pub fn data_len(&self) -> usize {
        self.block_len - self.parity_len()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cell_size < MIN_CELL_SIZE {
            return Err(ConfigError::CellTooSmall(self.cell_size));
        }
        if !(3..=MAX_BLOCK_LEN).contains(&self.block_len) {
            return Err(ConfigError::BlockLength(self.block_len));
        }
        if !(self.redundancy > 0.0 && self.redundancy < 1.0) {
            return Err(ConfigError::Redundancy(self.redundancy));
        }
        if self.interleave_groups == 0 {
            return Err(ConfigError::NoGroups);
        }
        if self.max_pages == 0 || self.max_pages > u16::MAX as usize {
            return Err(ConfigError::MaxPages(self.max_pages));
        }
        if self.page_layout().blocks == 0 {
            return Err(ConfigError::PageTooSmall {
                width: self.page_width,
                height: self.page_height,
                block_len: self.block_len,
            });
        }
        Ok(())
    }

    /// Compute how many codeword blocks and payload bytes fit on one page.
    pub fn page_layout(&self) -> PageLayout {
        let (rows, cols) = grid::capacity(self.cell_size, self.page_width, self.page_height);
        let data_cells = grid::data_capacity(rows, cols);
        let data_bytes = data_cells / 8;
        let groups = self.interleave_groups.max(1);

        let mut blocks = data_bytes / self.block_len.max(1);
        while blocks > 0 && round_up(blocks * self.block_len, groups) > data_bytes {
            blocks -= 1;
        }

        let stream_len = blocks * self.block_len;
        let payload_capacity = (blocks * self.data_len()).saturating_sub(FRAME_HEADER_SIZE);

        PageLayout {
            rows,
            cols,
            data_cells,
            blocks,
            stream_len,
            padded_len: round_up(stream_len, groups),
            payload_capacity,
        }
    }
}

fn round_up(n: usize, multiple: usize) -> usize {
    n.div_ceil(multiple) * multiple
}
