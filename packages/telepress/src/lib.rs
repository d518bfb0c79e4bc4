//! Telepress is a Rust library for lossless and near-lossless compression of the
//! science telemetry produced by spaceborne imaging instruments. Samples are mapped
//! to non-negative residuals through a predictor and entropy coded with a
//! Golomb/Rice variable-length code equipped with two escape protocols for
//! outliers.
//!
//! The software compressor produces bitstreams that are byte-for-byte identical to
//! those of the fixed-function hardware compressor flying next to it, so one
//! configuration record can drive either. Everything operates on caller-provided
//! fixed buffers: the encoding path performs no heap allocation, never grows a
//! buffer, and a stream that outruns its output buffer is an error.
//!
//! # Compression modes
//!
//! Each [`CompressionMode`] picks a predictor and an outlier protocol:
//!
//! - The **differential** modes predict every sample from its predecessor, with an
//!   implicit zero in front of the first one. They need nothing but the input.
//! - The **model** modes predict every sample from a caller-provided model buffer
//!   and can produce the blended model for the next compression, either into a
//!   separate buffer or in place (see [`ModelBuffers`]).
//! - **Raw** copies the input verbatim, converted to big-endian field by field,
//!   for data that must survive uncompressible.
//! - **Stuff** writes the low bits of every value at a fixed width, trading
//!   compression for a hard real-time bound.
//!
//! The **zero** escape variants reserve the codeword of the value 0 as the escape
//! symbol; the **multi** variants use a family of escape symbols that double as the
//! bit-length announcement of the escaped value. Both bound every codeword to one
//! 32-bit bitstream word.
//!
//! # Sample layouts
//!
//! The input buffer holds packed sample records of one of the [`DataType`]
//! layouts: plain imagette pixels, the short/fast/long-cadence flux families with
//! their optional centers of brightness and variances, and the auxiliary
//! offset/background/smearing statistics. Every non-imagette layout starts with an
//! opaque [collection header](COLLECTION_HDR_SIZE) that travels in front of the
//! bitstream unchanged.
//!
//! Each record field has its own Golomb parameter, spillover threshold and
//! declared bit width in the [`CompressionSettings`]; fields that usually behave
//! alike (both center-of-brightness axes, the variance family) share their
//! parameters.
//!
//! # Example
//!
//! ```
//! # fn main() -> Result<(), telepress::CompressError> {
//! use telepress::{
//! 	CompressionMode, CompressionSettings, DataType, FieldParams, ModelBuffers, compress
//! };
//!
//! // Four 16-bit imagette pixels in native byte order
//! let samples: [u16; 4] = [42, 43, 44, 43];
//! let input: Vec<u8> = samples.iter().flat_map(|sample| sample.to_ne_bytes()).collect();
//!
//! let settings = CompressionSettings {
//! 	data_type: DataType::Imagette,
//! 	mode: CompressionMode::DiffZero,
//! 	imagette: FieldParams {
//! 		golomb_par: 4,
//! 		spillover: 16
//! 	},
//! 	..CompressionSettings::default()
//! };
//!
//! // Probe the exact bitstream size, then compress for real
//! let bits = compress(&settings, &input, ModelBuffers::None, None)?;
//! let mut output = vec![0u8; (bits as usize).div_ceil(32) * 4];
//! compress(&settings, &input, ModelBuffers::None, Some(&mut output))?;
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//!
//! This crate uses the [`log`](https://crates.io/crates/log) crate for status and
//! diagnostic messages. Executables can customize the verbosity of this logging,
//! and even compile it out, as explained in the `log` crate documentation.

#![forbid(unsafe_code)]
#![forbid(unsafe_op_in_unsafe_fn)]
#![forbid(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]
#![deny(non_ascii_idents)]
#![deny(clippy::print_stdout)]
#![deny(clippy::unimplemented)]
#![warn(explicit_outlives_requirements)]
#![warn(noop_method_call)]
#![warn(unreachable_pub)]
#![warn(unused_import_braces)]
#![warn(unused_qualifications)]
#![warn(clippy::empty_enum)]
#![warn(clippy::enum_glob_use)]
#![warn(clippy::multiple_inherent_impl)]
#![warn(clippy::use_self)]
#![warn(clippy::used_underscore_binding)]

pub use collection::{COLLECTION_HDR_SIZE, DataType, TryDataTypeFromInt};
pub use encoder::golomb::max_spill;
pub use encoder::{CompressError, ModelBuffers, compress};
pub use settings::{
	CompressionMode, CompressionSettings, FieldParams, MAX_GOLOMB_PAR, MAX_HARDWARE_ROUND,
	MAX_IMAGETTE_GOLOMB_PAR, MAX_MODEL_VALUE, MAX_ROUND, MIN_SPILLOVER, MaxUsedBits,
	TryCompressionModeFromInt
};

/// A text tag that precisely identifies this Telepress build.
pub static TELEPRESS_VERSION_TAG: &str = concat!("Telepress ", env!("TELEPRESS_VERSION"));

mod collection;
mod encoder;
mod settings;
