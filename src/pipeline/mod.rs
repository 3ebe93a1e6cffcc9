pub mod decode;
pub mod encode;
pub mod hook;

use anyhow::Result;
use log::{debug, warn};
use thiserror::Error;

use crate::compress::CompressError;
use crate::config::{self, BitpaperConfig, ConfigError, PageLayout};
use crate::crypto::CryptoError;
use crate::ecc::{Codeword, EccError, EccStats, ReedSolomon};
use crate::frame::{self, FrameError, FrameHeader};
use crate::grid::{self, render, CapacityError, Grid, GridEncoder};
use crate::integrity;
use crate::interleave::Interleaver;
use crate::manifest::ManifestError;
use crate::raster::Raster;
use crate::sampler::{AlignmentError, ErrorEstimate, GridDecoder};
use decode::PageReport;
use hook::PipelineHook;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Ecc(#[from] EccError),
    #[error(transparent)]
    Alignment(#[from] AlignmentError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Compress(#[from] CompressError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("page {index} of a {count}-page document is missing")]
    MissingPage { index: u16, count: u16 },
    #[error("pages do not belong together: {0}")]
    InconsistentPages(String),
    #[error("unsupported compression tag {0}")]
    UnsupportedCompression(u8),
    #[error("payload is password protected but no password was given")]
    PasswordRequired,
    #[error("no pages to decode")]
    NoPages,
}

/// Everything recovered from one page.
#[derive(Debug, Clone)]
pub struct PageDecode {
    pub header: FrameHeader,
    pub payload: Vec<u8>,
    pub ecc: EccStats,
    pub estimate: ErrorEstimate,
}

/// Single-page codec: framed bytes ⇄ grid ⇄ raster for one configuration.
#[derive(Debug, Clone)]
pub struct PageCodec {
    cfg: BitpaperConfig,
    layout: PageLayout,
    rs: ReedSolomon,
    interleaver: Interleaver,
    encoder: GridEncoder,
    decoder: GridDecoder,
}

impl PageCodec {
    pub fn new(cfg: &BitpaperConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            cfg: cfg.clone(),
            layout: cfg.page_layout(),
            rs: ReedSolomon::from_config(cfg)?,
            interleaver: Interleaver::new(cfg.interleave_groups),
            encoder: GridEncoder::new(cfg),
            decoder: GridDecoder::new(cfg),
        })
    }

    pub fn config(&self) -> &BitpaperConfig {
        &self.cfg
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    /// Protect a framed page and lay it out on a grid.
    ///
    /// The page always carries `layout.blocks` codewords; bytes past the frame
    /// are zero so the reader never needs to know the frame length up front.
    pub fn encode_page(&self, framed: &[u8]) -> Result<Grid, PipelineError> {
        let layout = &self.layout;
        let data_capacity = layout.blocks * self.rs.data_len();
        if framed.len() > data_capacity {
            return Err(CapacityError::GridFull {
                bits: self.rs.blocks_for(framed.len()) * self.rs.block_len() * 8,
                capacity: layout.data_cells,
                rows: layout.rows,
                cols: layout.cols,
            }
            .into());
        }

        let mut data = framed.to_vec();
        data.resize(data_capacity, 0);

        let mut stream = Vec::with_capacity(layout.padded_len);
        for codeword in self.rs.encode(&data) {
            stream.extend_from_slice(codeword.symbols());
        }
        stream.resize(layout.padded_len, 0);

        let bits = grid::bytes_to_bits(&self.interleaver.interleave(&stream));
        Ok(self.encoder.encode(&bits, layout.rows, layout.cols)?)
    }

    pub fn render_page(&self, grid: &Grid) -> Raster {
        render::render(grid, self.cfg.page_width, self.cfg.page_height)
    }

    /// Read, correct and validate one captured page.
    pub fn decode_page(&self, raster: &Raster) -> Result<PageDecode, PipelineError> {
        let layout = &self.layout;
        let (bits, estimate) = self.decoder.decode(raster)?;
        if estimate.low_confidence_ratio() > config::LOW_CONFIDENCE_WARN_RATIO {
            warn!(
                "{} of {} cells sampled with low confidence",
                estimate.low_confidence_cells, estimate.sampled_cells
            );
        }

        let bytes = grid::bits_to_bytes(&bits);
        let mut stream = self.interleaver.deinterleave(&bytes[..layout.padded_len]);
        stream.truncate(layout.stream_len);

        let codewords: Vec<Codeword> = stream
            .chunks(self.rs.block_len())
            .map(|c| Codeword::new(c.to_vec()))
            .collect();
        let (data, ecc) = self.rs.decode(&codewords)?;
        let (header, payload) = frame::unframe(&data)?;

        debug!(
            "page {}/{}: {} bytes, {} symbols corrected in {} blocks",
            header.page_index + 1,
            header.page_count,
            payload.len(),
            ecc.corrected_symbols,
            ecc.corrected_blocks
        );

        Ok(PageDecode {
            header,
            payload,
            ecc,
            estimate,
        })
    }
}

/// Result of a full encode → hook → decode roundtrip.
#[derive(Debug, Clone)]
pub struct RoundtripResult {
    /// SHA-256 hex digest of the original payload.
    pub original_hash: String,
    /// SHA-256 hex digest of the decoded payload.
    pub decoded_hash: String,
    /// `true` if the hashes match (lossless round-trip).
    pub matched: bool,
    /// Per-page correction and sampling statistics, in page order.
    pub pages: Vec<PageReport>,
}

/// Run a full encode → render → hook → decode roundtrip in memory.
///
/// The hook sees the rendered pages and returns what the decoder should read,
/// e.g. the same pages passed through a camera simulation.
///
/// # Example
///
/// ```rust,no_run
/// use bitpaper::{roundtrip, BitpaperConfig, NoopHook};
///
/// let result = roundtrip(b"hello paper", None, &BitpaperConfig::default(), &NoopHook).unwrap();
/// assert!(result.matched);
/// ```
pub fn roundtrip<H: PipelineHook>(
    payload: &[u8],
    password: Option<&str>,
    cfg: &BitpaperConfig,
    hook: &H,
) -> Result<RoundtripResult> {
    let original_hash = integrity::sha256_hex(payload);

    let grids = encode::encode_payload(payload, password, cfg)?;
    let pages = encode::render_pages(&grids, cfg);
    let captured = hook.after_encode(pages)?;
    let decoded = decode::decode_pages(&captured, password, cfg)?;

    let decoded_hash = integrity::sha256_hex(&decoded.payload);
    let matched = original_hash == decoded_hash;

    Ok(RoundtripResult {
        original_hash,
        decoded_hash,
        matched,
        pages: decoded.pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::WHITE;

    pub(crate) fn small_config() -> BitpaperConfig {
        BitpaperConfig {
            page_width: 480,
            page_height: 480,
            cell_size: 4,
            block_len: 64,
            redundancy: 0.25,
            ..Default::default()
        }
    }

    #[test]
    fn test_small_layout() {
        let layout = small_config().page_layout();
        assert_eq!((layout.rows, layout.cols), (96, 96));
        assert_eq!(layout.blocks, 17);
        assert_eq!(layout.payload_capacity, 17 * 48 - config::FRAME_HEADER_SIZE);
    }

    #[test]
    fn test_page_roundtrip() {
        let codec = PageCodec::new(&small_config()).unwrap();
        let payload: Vec<u8> = (0..500u32).map(|i| (i * 13 % 251) as u8).collect();
        let framed = frame::frame(&payload, &Default::default()).unwrap();

        let grid = codec.encode_page(&framed).unwrap();
        let page = codec.decode_page(&codec.render_page(&grid)).unwrap();
        assert_eq!(page.payload, payload);
        assert_eq!(page.ecc.corrected_blocks, 0);
        assert_eq!(page.estimate.low_confidence_cells, 0);
    }

    #[test]
    fn test_codec_is_cloneable() {
        let codec = PageCodec::new(&small_config()).unwrap();
        let copy = codec.clone();
        assert_eq!(copy.layout(), codec.layout());
        assert!(format!("{copy:?}").contains("GridEncoder"));
    }

    #[test]
    fn test_page_too_full() {
        let codec = PageCodec::new(&small_config()).unwrap();
        let framed = vec![0u8; 17 * 48 + 1];
        assert!(matches!(
            codec.encode_page(&framed),
            Err(PipelineError::Capacity(CapacityError::GridFull { .. }))
        ));
    }

    #[test]
    fn test_wiped_cell_rows_are_corrected() {
        let cfg = small_config();
        let codec = PageCodec::new(&cfg).unwrap();
        let payload = vec![0x5Au8; 700];
        let grid = codec.encode_page(&frame::frame(&payload, &Default::default()).unwrap()).unwrap();
        let mut raster = codec.render_page(&grid);

        // Paint over half a row of cells in the middle of the grid
        let y0 = config::PAGE_MARGIN + 40 * cfg.cell_size;
        let x0 = config::PAGE_MARGIN + 20 * cfg.cell_size;
        for y in y0..y0 + cfg.cell_size {
            for x in x0..x0 + 48 * cfg.cell_size {
                raster.set(x, y, WHITE);
            }
        }

        let page = codec.decode_page(&raster).unwrap();
        assert_eq!(page.payload, payload);
        assert!(page.ecc.corrected_blocks > 0);
    }

    #[test]
    fn test_blank_page_fails_alignment() {
        let codec = PageCodec::new(&small_config()).unwrap();
        let raster = Raster::new(480, 480, WHITE);
        assert!(matches!(
            codec.decode_page(&raster),
            Err(PipelineError::Alignment(AlignmentError::MarkersNotFound { .. }))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let cfg = BitpaperConfig {
            cell_size: 1,
            ..Default::default()
        };
        assert!(PageCodec::new(&cfg).is_err());
    }

    #[test]
    fn test_roundtrip_noop() {
        let payload = b"The quick brown fox jumps over the lazy dog".repeat(10);
        let result = roundtrip(&payload, None, &small_config(), &hook::NoopHook).unwrap();
        assert!(result.matched, "{} != {}", result.original_hash, result.decoded_hash);
        assert_eq!(result.pages.len(), 1);
    }
}
