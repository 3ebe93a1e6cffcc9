//! Reed-Solomon block error correction over GF(2^8).
//!
//! Systematic RS(n, k) with generator roots α^0 .. α^(r-1). Blocks shorter
//! than 255 symbols are shortened codes: the missing leading symbols are
//! implicit zeros and never appear on paper.
//!
//! Each block is corrected independently (Berlekamp-Massey, Chien search,
//! Forney), so a local defect can only ever cost the blocks it touches.
//! Up to `r / 2` symbol errors per block are always corrected. Beyond that the
//! decoder reports the block as uncorrectable in all but a vanishing fraction
//! of cases; the rare miscorrection is caught by the frame checksum.

pub mod gf256;

use log::debug;
use rayon::prelude::*;
use thiserror::Error;

use crate::config::{self, BitpaperConfig, ConfigError};

#[derive(Error, Debug, PartialEq)]
pub enum EccError {
    #[error("codeword block {0} has more errors than can be corrected")]
    Uncorrectable(usize),
    #[error("codeword block {index} has {got} symbols, expected {expected}")]
    BlockLength {
        index: usize,
        got: usize,
        expected: usize,
    },
}

/// One RS block: `k` data symbols followed by `r` parity symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codeword {
    symbols: Vec<u8>,
}

impl Codeword {
    pub fn new(symbols: Vec<u8>) -> Self {
        Self { symbols }
    }

    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut [u8] {
        &mut self.symbols
    }

    pub fn into_symbols(self) -> Vec<u8> {
        self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Statistics from decoding a run of blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EccStats {
    pub total_blocks: usize,
    /// Blocks that needed at least one correction.
    pub corrected_blocks: usize,
    /// Symbol errors corrected across all blocks.
    pub corrected_symbols: usize,
    /// Most errors found in a single block.
    pub max_block_errors: usize,
}

impl EccStats {
    /// Fold another run's statistics into this one.
    pub fn merge(&mut self, other: &EccStats) {
        self.total_blocks += other.total_blocks;
        self.corrected_blocks += other.corrected_blocks;
        self.corrected_symbols += other.corrected_symbols;
        self.max_block_errors = self.max_block_errors.max(other.max_block_errors);
    }
}

/// A Reed-Solomon code with fixed block and parity lengths.
#[derive(Debug, Clone)]
pub struct ReedSolomon {
    block_len: usize,
    parity_len: usize,
    /// g(x), highest-degree coefficient first.
    generator: Vec<u8>,
}

impl ReedSolomon {
    pub fn new(block_len: usize, parity_len: usize) -> Result<Self, ConfigError> {
        if block_len > config::MAX_BLOCK_LEN || block_len < 3 {
            return Err(ConfigError::BlockLength(block_len));
        }
        if parity_len == 0 || parity_len >= block_len {
            return Err(ConfigError::ParityLength {
                parity: parity_len,
                block_len,
            });
        }

        let mut generator = vec![1u8];
        for i in 0..parity_len {
            generator = gf256::poly_mul(&generator, &[1, gf256::exp(i)]);
        }

        Ok(Self {
            block_len,
            parity_len,
            generator,
        })
    }

    pub fn from_config(cfg: &BitpaperConfig) -> Result<Self, ConfigError> {
        Self::new(cfg.block_len, cfg.parity_len())
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }

    pub fn parity_len(&self) -> usize {
        self.parity_len
    }

    /// Data symbols per block (`k`).
    pub fn data_len(&self) -> usize {
        self.block_len - self.parity_len
    }

    /// Symbol errors per block that are always corrected (`t`).
    pub fn correctable(&self) -> usize {
        self.parity_len / 2
    }

    /// Number of blocks needed for `data_len` bytes.
    pub fn blocks_for(&self, data_len: usize) -> usize {
        data_len.div_ceil(self.data_len())
    }

    /// Split `data` into `k`-byte blocks, zero-padding the last, and append parity.
    pub fn encode(&self, data: &[u8]) -> Vec<Codeword> {
        data.chunks(self.data_len())
            .map(|chunk| {
                let mut block = chunk.to_vec();
                block.resize(self.data_len(), 0);
                self.encode_block(&block)
            })
            .collect()
    }

    fn encode_block(&self, data: &[u8]) -> Codeword {
        let r = self.parity_len;
        let mut shift_reg = vec![0u8; r];

        for &byte in data {
            let feedback = byte ^ shift_reg[0];
            for j in 0..r - 1 {
                shift_reg[j] = shift_reg[j + 1] ^ gf256::mul(feedback, self.generator[j + 1]);
            }
            shift_reg[r - 1] = gf256::mul(feedback, self.generator[r]);
        }

        let mut symbols = Vec::with_capacity(self.block_len);
        symbols.extend_from_slice(data);
        symbols.extend_from_slice(&shift_reg);
        Codeword::new(symbols)
    }

    /// Correct every block and return the concatenated data symbols.
    ///
    /// Blocks are decoded in parallel; the first uncorrectable block in block
    /// order aborts the whole decode.
    pub fn decode(&self, blocks: &[Codeword]) -> Result<(Vec<u8>, EccStats), EccError> {
        let results: Vec<Result<(Vec<u8>, usize), EccError>> = blocks
            .par_iter()
            .enumerate()
            .map(|(index, block)| self.decode_block(index, block.symbols()))
            .collect();

        let mut data = Vec::with_capacity(blocks.len() * self.data_len());
        let mut stats = EccStats::default();
        for result in results {
            let (block_data, errors) = result?;
            data.extend_from_slice(&block_data);
            stats.total_blocks += 1;
            if errors > 0 {
                stats.corrected_blocks += 1;
                stats.corrected_symbols += errors;
                stats.max_block_errors = stats.max_block_errors.max(errors);
            }
        }

        if stats.corrected_blocks > 0 {
            debug!(
                "corrected {} symbols in {}/{} blocks (worst block: {} errors)",
                stats.corrected_symbols,
                stats.corrected_blocks,
                stats.total_blocks,
                stats.max_block_errors
            );
        }
        Ok((data, stats))
    }

    /// Decode one block, returning its data symbols and the number of errors fixed.
    fn decode_block(&self, index: usize, received: &[u8]) -> Result<(Vec<u8>, usize), EccError> {
        let n = self.block_len;
        if received.len() != n {
            return Err(EccError::BlockLength {
                index,
                got: received.len(),
                expected: n,
            });
        }

        let syndromes = self.syndromes(received);
        if syndromes.iter().all(|&s| s == 0) {
            return Ok((received[..self.data_len()].to_vec(), 0));
        }

        let sigma = berlekamp_massey(&syndromes);
        let num_errors = sigma.len() - 1;
        if num_errors == 0 || num_errors > self.correctable() {
            return Err(EccError::Uncorrectable(index));
        }

        let positions = chien_search(&sigma, n).ok_or(EccError::Uncorrectable(index))?;
        let magnitudes = forney(&sigma, &syndromes, &positions);

        let mut corrected = received.to_vec();
        for (&gf_pos, &magnitude) in positions.iter().zip(&magnitudes) {
            if magnitude == 0 {
                return Err(EccError::Uncorrectable(index));
            }
            corrected[n - 1 - gf_pos] ^= magnitude;
        }

        if self.syndromes(&corrected).iter().any(|&s| s != 0) {
            return Err(EccError::Uncorrectable(index));
        }

        corrected.truncate(self.data_len());
        Ok((corrected, num_errors))
    }

    /// S_i = r(α^i) for i in 0..r, with `received[0]` the highest-degree term.
    fn syndromes(&self, received: &[u8]) -> Vec<u8> {
        (0..self.parity_len)
            .map(|i| gf256::poly_eval(received, gf256::exp(i)))
            .collect()
    }
}

/// Berlekamp-Massey. Returns the error locator σ(x), constant term first,
/// trimmed to its degree.
fn berlekamp_massey(syndromes: &[u8]) -> Vec<u8> {
    let n = syndromes.len();

    let mut c = vec![0u8; n + 1];
    c[0] = 1;
    let mut b = vec![0u8; n + 1];
    b[0] = 1;

    let mut ell = 0usize;
    let mut bval = 1u8;
    let mut m = 1usize;

    for r in 0..n {
        let mut delta = syndromes[r];
        for i in 1..=ell {
            delta ^= gf256::mul(c[i], syndromes[r - i]);
        }

        if delta == 0 {
            m += 1;
            continue;
        }

        let factor = gf256::div(delta, bval);
        let prev = if 2 * ell <= r { Some(c.clone()) } else { None };

        for j in 0..(n + 1).saturating_sub(m) {
            c[j + m] ^= gf256::mul(factor, b[j]);
        }

        match prev {
            Some(prev) => {
                ell = r + 1 - ell;
                b = prev;
                bval = delta;
                m = 1;
            }
            None => m += 1,
        }
    }

    c.truncate(ell + 1);
    c
}

/// Chien search over the `n` positions of a (possibly shortened) block.
///
/// Returns the GF positions `p` (error at array index `n - 1 - p`), or `None`
/// if σ does not have exactly `deg σ` roots there.
fn chien_search(sigma: &[u8], n: usize) -> Option<Vec<usize>> {
    let degree = sigma.len() - 1;
    let found: Vec<usize> = (0..n)
        .filter(|&p| gf256::poly_eval_asc(sigma, gf256::exp_neg(p)) == 0)
        .collect();

    (found.len() == degree).then_some(found)
}

/// Forney: e = X · Ω(X⁻¹) / σ'(X⁻¹), with Ω = S·σ mod x^(2t).
fn forney(sigma: &[u8], syndromes: &[u8], positions: &[usize]) -> Vec<u8> {
    let two_t = syndromes.len();

    let mut omega = vec![0u8; two_t];
    for (i, &sc) in sigma.iter().enumerate().take(two_t) {
        for (j, &s) in syndromes.iter().enumerate().take(two_t - i) {
            omega[i + j] ^= gf256::mul(sc, s);
        }
    }

    // Formal derivative: only odd-power terms survive in characteristic 2
    let mut sigma_prime = vec![0u8; sigma.len().saturating_sub(1)];
    for i in (1..sigma.len()).step_by(2) {
        sigma_prime[i - 1] = sigma[i];
    }

    positions
        .iter()
        .map(|&p| {
            let x = gf256::exp(p);
            let x_inv = gf256::exp_neg(p);
            let denom = gf256::poly_eval_asc(&sigma_prime, x_inv);
            if denom == 0 {
                return 0;
            }
            let num = gf256::poly_eval_asc(&omega, x_inv);
            gf256::mul(x, gf256::div(num, denom))
        })
        .collect()
}
