use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rayon::prelude::*;

use super::{PageCodec, PageDecode, PipelineError};
use crate::compress;
use crate::config::{self, BitpaperConfig};
use crate::crypto;
use crate::ecc::EccStats;
use crate::frame::Compression;
use crate::integrity;
use crate::manifest::Manifest;
use crate::raster::Raster;
use crate::sampler::ErrorEstimate;

/// Per-page decode statistics.
#[derive(Debug, Clone)]
pub struct PageReport {
    pub page_index: u16,
    pub ecc: EccStats,
    pub estimate: ErrorEstimate,
}

/// A reassembled document.
#[derive(Debug, Clone)]
pub struct DecodedDocument {
    /// File name and size recorded at encode time.
    pub manifest: Manifest,
    pub payload: Vec<u8>,
    /// One entry per distinct page, in page order.
    pub pages: Vec<PageReport>,
}

impl DecodedDocument {
    /// ECC statistics summed over all pages.
    pub fn total_ecc(&self) -> EccStats {
        let mut total = EccStats::default();
        for page in &self.pages {
            total.merge(&page.ecc);
        }
        total
    }
}

/// In-memory decode pipeline: rasters -> pages -> reassemble -> [decrypt] -> inflate -> payload.
///
/// Pages may be given in any order. A page captured twice is accepted as long
/// as both captures decode to the same content.
pub fn decode_pages(
    rasters: &[Raster],
    password: Option<&str>,
    cfg: &BitpaperConfig,
) -> Result<DecodedDocument, PipelineError> {
    if rasters.is_empty() {
        return Err(PipelineError::NoPages);
    }
    let codec = PageCodec::new(cfg)?;

    let results: Vec<Result<PageDecode, PipelineError>> =
        rasters.par_iter().map(|r| codec.decode_page(r)).collect();
    let mut pages = Vec::with_capacity(results.len());
    for (i, result) in results.into_iter().enumerate() {
        match result {
            Ok(page) => pages.push(page),
            Err(e) => {
                warn!("capture {} failed to decode: {}", i + 1, e);
                return Err(e);
            }
        }
    }

    assemble(pages, password)
}

/// Order pages, check they form one complete document, and open the payload.
fn assemble(pages: Vec<PageDecode>, password: Option<&str>) -> Result<DecodedDocument, PipelineError> {
    let first = pages.first().ok_or(PipelineError::NoPages)?;
    let count = first.header.page_count;
    let document_id = first.header.document_id;
    let encrypted = first.header.is_encrypted();
    let compression = first.header.compression;

    if count == 0 {
        return Err(PipelineError::InconsistentPages("page count of zero".into()));
    }

    let mut slots: Vec<Option<PageDecode>> = vec![None; count as usize];
    for page in pages {
        let h = &page.header;
        if h.document_id != document_id {
            return Err(PipelineError::InconsistentPages(format!(
                "page {} belongs to document {:016x}, expected {:016x}",
                h.page_index, h.document_id, document_id
            )));
        }
        if h.page_count != count {
            return Err(PipelineError::InconsistentPages(format!(
                "page {} claims {} pages, expected {}",
                h.page_index, h.page_count, count
            )));
        }
        if h.is_encrypted() != encrypted || h.compression != compression {
            return Err(PipelineError::InconsistentPages(format!(
                "page {} has different encryption or compression settings",
                h.page_index
            )));
        }
        if h.page_index >= count {
            return Err(PipelineError::InconsistentPages(format!(
                "page index {} out of range for {} pages",
                h.page_index, count
            )));
        }
        if h.is_last_page() != (h.page_index == count - 1) {
            return Err(PipelineError::InconsistentPages(format!(
                "last-page flag does not match page {} of {}",
                h.page_index, count
            )));
        }

        let index = h.page_index as usize;
        if let Some(existing) = &slots[index] {
            if existing.payload != page.payload {
                return Err(PipelineError::InconsistentPages(format!(
                    "two different captures of page {index}"
                )));
            }
            continue;
        }
        slots[index] = Some(page);
    }

    let mut body = Vec::new();
    let mut reports = Vec::with_capacity(slots.len());
    for (index, slot) in slots.into_iter().enumerate() {
        let page = slot.ok_or(PipelineError::MissingPage {
            index: index as u16,
            count,
        })?;
        body.extend_from_slice(&page.payload);
        reports.push(PageReport {
            page_index: index as u16,
            ecc: page.ecc,
            estimate: page.estimate,
        });
    }

    if integrity::document_id(&body) != document_id {
        return Err(PipelineError::InconsistentPages(format!(
            "reassembled pages do not match document {document_id:016x}"
        )));
    }

    let compression = Compression::from_id(compression).ok_or(PipelineError::UnsupportedCompression(compression))?;

    let body = if encrypted {
        let pw = password.ok_or(PipelineError::PasswordRequired)?;
        crypto::open(pw.as_bytes(), &body)?
    } else {
        body
    };

    let packed = compress::decompress(compression, &body, config::MAX_INFLATED_SIZE)?;
    let (manifest, content) = Manifest::split(&packed)?;

    Ok(DecodedDocument {
        payload: content.to_vec(),
        manifest,
        pages: reports,
    })
}

/// Load any image the `image` crate understands as a grayscale raster.
pub fn load_raster(path: &Path) -> Result<Raster> {
    let img = image::open(path).with_context(|| format!("failed to read image {}", path.display()))?;
    Ok(Raster::from(img.to_luma8()))
}

/// Where a decoded document goes: `output` itself, or, when `output` is an
/// existing directory, the stored file name inside it.
fn output_path(output: &Path, document: &DecodedDocument) -> PathBuf {
    if !output.is_dir() {
        return output.to_path_buf();
    }
    output.join(document.manifest.file_name().unwrap_or(config::DEFAULT_OUTPUT_NAME))
}

/// Full decode pipeline: page images -> payload written under `output`.
///
/// Returns the document and the path it was written to.
pub fn decode_file(
    inputs: &[PathBuf],
    output: &Path,
    password: Option<&str>,
    cfg: &BitpaperConfig,
) -> Result<(DecodedDocument, PathBuf)> {
    info!("loading {} page image(s)", inputs.len());

    let progress = ProgressBar::new(inputs.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.green/black} {pos}/{len} pages ({eta})")
            .context("invalid progress template")?
            .progress_chars("##-"),
    );

    let rasters = inputs
        .par_iter()
        .map(|path| {
            let raster = load_raster(path);
            progress.inc(1);
            raster
        })
        .collect::<Result<Vec<Raster>>>()?;
    progress.finish_with_message("pages loaded");

    let document = decode_pages(&rasters, password, cfg).context("failed to decode pages")?;

    let total = document.total_ecc();
    info!(
        "corrected {} symbols in {}/{} codewords",
        total.corrected_symbols, total.corrected_blocks, total.total_blocks
    );

    let path = output_path(output, &document);
    fs::write(&path, &document.payload).with_context(|| format!("failed to write {}", path.display()))?;
    info!("decode complete! output: {}", path.display());
    Ok((document, path))
}
