use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rayon::prelude::*;

use super::{PageCodec, PipelineError};
use crate::chunker;
use crate::compress;
use crate::config::{self, BitpaperConfig};
use crate::crypto;
use crate::frame::{self, FrameMeta};
use crate::grid::Grid;
use crate::integrity;
use crate::manifest::Manifest;
use crate::raster::Raster;

/// In-memory encode pipeline for an unnamed payload. See [`encode_document`].
pub fn encode_payload(
    payload: &[u8],
    password: Option<&str>,
    cfg: &BitpaperConfig,
) -> Result<Vec<Grid>, PipelineError> {
    encode_document(None, payload, password, cfg)
}

/// In-memory encode pipeline:
/// manifest + payload -> compress -> [encrypt] -> pages -> frames -> ECC -> interleave -> grids.
///
/// Every page header carries the same document id, derived from the body
/// that gets split across the pages.
pub fn encode_document(
    name: Option<&str>,
    payload: &[u8],
    password: Option<&str>,
    cfg: &BitpaperConfig,
) -> Result<Vec<Grid>, PipelineError> {
    let codec = PageCodec::new(cfg)?;
    let layout = codec.layout();

    let packed = Manifest::new(name, payload.len()).prepend(payload)?;
    let (compression, packed) = compress::compress(&packed)?;

    let mut flags = 0u8;
    let body = match password {
        Some(pw) => {
            flags |= config::FLAG_ENCRYPTED;
            crypto::seal(pw.as_bytes(), &packed)?
        }
        None => packed,
    };
    let document_id = integrity::document_id(&body);

    let chunks = chunker::chunk_bytes(&body, layout.payload_capacity, cfg.max_pages)?;
    let page_count = chunks.len() as u16;
    info!(
        "{} byte payload ({} bytes {:?}) on {} page(s) of {}x{} cells, {} codewords each",
        payload.len(),
        body.len(),
        compression,
        page_count,
        layout.rows,
        layout.cols,
        layout.blocks
    );

    chunks
        .par_iter()
        .map(|chunk| {
            let meta = FrameMeta {
                flags: if chunk.is_last { flags | config::FLAG_LAST_PAGE } else { flags },
                compression: compression.id(),
                page_index: chunk.index,
                page_count,
                document_id,
            };
            codec.encode_page(&frame::frame(&chunk.data, &meta)?)
        })
        .collect()
}

/// Rasterise encoded grids onto blank pages.
pub fn render_pages(grids: &[Grid], cfg: &BitpaperConfig) -> Vec<Raster> {
    grids
        .par_iter()
        .map(|grid| crate::grid::render::render(grid, cfg.page_width, cfg.page_height))
        .collect()
}

/// Full encode pipeline: file -> grids -> PNG pages written into `output_dir`.
///
/// Returns the page paths in page order.
pub fn encode_file(
    input_path: &Path,
    output_dir: &Path,
    password: Option<&str>,
    cfg: &BitpaperConfig,
) -> Result<Vec<PathBuf>> {
    info!("reading input file: {}", input_path.display());
    let payload = fs::read(input_path).context("failed to read input file")?;

    let name = input_path.file_name().and_then(|n| n.to_str());
    let grids = encode_document(name, &payload, password, cfg).context("failed to encode payload")?;

    fs::create_dir_all(output_dir).context("failed to create output directory")?;

    let progress = ProgressBar::new(grids.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} pages ({eta})")
            .context("invalid progress template")?
            .progress_chars("##-"),
    );

    let paths: Vec<PathBuf> = (0..grids.len())
        .map(|i| output_dir.join(format!("page-{:03}.png", i + 1)))
        .collect();

    grids
        .par_iter()
        .zip(paths.par_iter())
        .try_for_each(|(grid, path)| -> Result<()> {
            let raster = crate::grid::render::render(grid, cfg.page_width, cfg.page_height);
            raster
                .into_gray_image()
                .save(path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            progress.inc(1);
            Ok(())
        })?;

    progress.finish_with_message("pages written");
    info!("encode complete! {} page(s) in {}", paths.len(), output_dir.display());
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CapacityError;
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn small_config() -> BitpaperConfig {
        BitpaperConfig {
            page_width: 480,
            page_height: 480,
            cell_size: 4,
            block_len: 64,
            redundancy: 0.25,
            ..Default::default()
        }
    }

    // Incompressible, so page counts follow the raw length
    fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
        let mut data = vec![0u8; len];
        ChaCha8Rng::seed_from_u64(seed).fill_bytes(&mut data);
        data
    }

    fn manifest_overhead(name: Option<&str>) -> usize {
        Manifest::new(name, 0).prepend(&[]).unwrap().len()
    }

    #[test]
    fn test_page_count_follows_capacity() {
        let cfg = small_config();
        let fits = cfg.page_layout().payload_capacity - manifest_overhead(None);

        assert_eq!(encode_payload(&[], None, &cfg).unwrap().len(), 1);
        assert_eq!(encode_payload(&random_bytes(fits, 1), None, &cfg).unwrap().len(), 1);
        assert_eq!(encode_payload(&random_bytes(fits + 1, 1), None, &cfg).unwrap().len(), 2);
    }

    #[test]
    fn test_compressible_payload_shrinks() {
        let cfg = small_config();
        let capacity = cfg.page_layout().payload_capacity;
        let text = b"all work and no play makes a dull page. ".repeat(100);
        assert!(text.len() > 4 * capacity);
        assert_eq!(encode_payload(&text, None, &cfg).unwrap().len(), 1);
    }

    #[test]
    fn test_max_pages_enforced() {
        let cfg = BitpaperConfig {
            max_pages: 2,
            ..small_config()
        };
        let capacity = cfg.page_layout().payload_capacity;
        let err = encode_payload(&random_bytes(capacity * 2 + 1, 2), None, &cfg).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Capacity(CapacityError::TooManyPages { needed: 3, max: 2 })
        ));
    }

    #[test]
    fn test_encode_file_writes_pngs() {
        let dir = std::env::temp_dir().join("bitpaper_test_encode_file");
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("input.bin");
        std::fs::write(&input, random_bytes(1000, 3)).unwrap();

        let cfg = small_config();
        let pages = encode_file(&input, &dir.join("pages"), None, &cfg).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].ends_with("page-001.png"));

        let img = image::open(&pages[1]).unwrap().to_luma8();
        assert_eq!(img.dimensions(), (480, 480));

        std::fs::remove_dir_all(&dir).ok();
    }
}
