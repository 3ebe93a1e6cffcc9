pub mod camera;
mod chunker;
pub mod compress;
pub mod config;
mod crypto;
pub mod ecc;
pub mod frame;
pub mod grid;
pub mod integrity;
pub mod interleave;
pub mod manifest;
pub mod pipeline;
pub mod raster;
pub mod sampler;

pub use camera::{CameraProfile, Preset};
pub use config::{BitpaperConfig, PageLayout};
pub use crypto::CryptoError;
pub use manifest::Manifest;
pub use pipeline::decode::{decode_file, decode_pages, DecodedDocument, PageReport};
pub use pipeline::encode::{encode_document, encode_file, encode_payload, render_pages};
pub use pipeline::hook::{CameraHook, NoopHook, PipelineHook};
pub use pipeline::{roundtrip, PageCodec, PipelineError, RoundtripResult};
pub use raster::Raster;
