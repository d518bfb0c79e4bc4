//! Contains the [`compress`] entry point: configuration validation, the per-layout
//! compression loop, and the finalization of the output bitstream.

use log::debug;
use thiserror::Error;
use word_bitpack::{BitPackError, BitWriter, WORD_BITS, WORD_BYTES, words_to_be};

use crate::collection::{
	Background, Collection, DataType, FFx, FFxEfx, FFxEfxNcobEcob, FFxNcob, Imagette, LFx, LFxEfx,
	LFxEfxNcobEcob, LFxNcob, Offset, SFx, SFxEfx, SFxEfxNcobEcob, SFxNcob, Smearing
};
use crate::settings::{CompressionMode, CompressionSettings};

pub(crate) mod field;
pub(crate) mod golomb;
pub(crate) mod model;


/// Represents an error that rejects or aborts a [`compress`] call. No output byte
/// is defined once a call has failed; partial bitstreams must not be consumed.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompressError {
	/// The weight of the prior model exceeds the sixteenths scale of the update
	/// rule.
	#[error("model weight {0} exceeds the maximum of 16")]
	InvalidModelValue(u32),
	/// The lossy rounding parameter is larger than the selected configuration
	/// supports.
	#[error("rounding parameter {round} exceeds the maximum of {max}")]
	InvalidRound {
		/// The rejected rounding parameter.
		round: u32,
		/// The largest rounding parameter this configuration accepts.
		max: u32
	},
	/// A Golomb parameter is zero or beyond the limit of its field.
	#[error("Golomb parameter {golomb_par} of the {field} field is outside [1, {max}]")]
	InvalidGolombPar {
		/// The field whose parameter was rejected.
		field: &'static str,
		/// The rejected parameter.
		golomb_par: u32,
		/// The largest parameter the field accepts.
		max: u32
	},
	/// A spillover threshold leaves no in-range codeword or admits codewords
	/// wider than a bitstream word.
	#[error("spillover threshold {spillover} of the {field} field is outside [{min}, {max}]")]
	InvalidSpillover {
		/// The field whose threshold was rejected.
		field: &'static str,
		/// The rejected threshold.
		spillover: u32,
		/// The smallest accepted threshold.
		min: u32,
		/// The largest threshold the field's Golomb parameter admits.
		max: u32
	},
	/// A declared field width is zero or wider than a bitstream word.
	#[error("declared width {bits} of the {field} field is outside [1, 32]")]
	InvalidMaxBits {
		/// The field whose width was rejected.
		field: &'static str,
		/// The rejected width.
		bits: u32
	},
	/// A model-predicted mode was selected without a model buffer.
	#[error("the {0} mode needs a model buffer")]
	MissingModel(CompressionMode),
	/// A model buffer was supplied to a mode that cannot use one.
	#[error("the {0} mode cannot use a model buffer")]
	UnexpectedModel(CompressionMode),
	/// The input length does not hold the layout's header plus a whole number of
	/// samples.
	#[error("input of {len} bytes does not hold whole {data_type} samples")]
	TruncatedInput {
		/// The declared sample layout.
		data_type: DataType,
		/// The offending input length in bytes.
		len: usize
	},
	/// The model buffer length differs from the input length.
	#[error("model of {model_len} bytes does not match the {input_len} byte input")]
	ModelLengthMismatch {
		/// The input length in bytes.
		input_len: usize,
		/// The model length in bytes.
		model_len: usize
	},
	/// The output buffer cannot hold a raw-mode copy of the input.
	#[error("raw output needs {needed} bytes, but the buffer holds {capacity}")]
	RawBufferTooSmall {
		/// The required capacity in bytes.
		needed: usize,
		/// The supplied capacity in bytes.
		capacity: usize
	},
	/// A data or model value exceeds the declared width of its field. This
	/// signals a contract violation by the producer of the input.
	#[error("{field} value {value} does not fit the declared {bits} bit(s)")]
	ValueOutOfRange {
		/// The field whose value was out of range.
		field: &'static str,
		/// The offending value.
		value: u32,
		/// The declared width of the field.
		bits: u32
	},
	/// The output bitstream could not be packed, most commonly because the
	/// output buffer was exhausted mid-stream.
	#[error("bitstream error: {0}")]
	Bitstream(#[from] BitPackError)
}

impl CompressError {
	/// Returns the negative status code of this error's class, as reported by
	/// the hardware compressor and the flight software interfaces: `-1` for a
	/// rejected configuration, `-2` for an exhausted output buffer, `-3` for an
	/// input value beyond its declared width.
	pub fn code(&self) -> i32 {
		match self {
			Self::ValueOutOfRange { .. } => -3,
			Self::Bitstream(BitPackError::BufferTooSmall { .. }) => -2,
			_ => -1
		}
	}
}

/// The model buffers of a [`compress`] call.
///
/// The model-predicted modes read each sample's predictor from a model buffer and,
/// if an updated-model buffer is present, write the blended model for the next
/// compression into it. Updating in place is the one permitted aliasing and has its
/// own variant; each model value is read before the updated value overwrites it.
#[derive(Debug)]
pub enum ModelBuffers<'a> {
	/// No model at all. The raw, differential and stuff modes take no other
	/// variant.
	None,
	/// A read-only model; no updated model is produced.
	Current(&'a [u8]),
	/// A read-only model with a separate buffer receiving the updated model.
	Split {
		/// The model of this compression.
		current: &'a [u8],
		/// Receives the model for the next compression.
		updated: &'a mut [u8]
	},
	/// One buffer serving as both: the updated model overwrites the current one
	/// sample by sample.
	InPlace(&'a mut [u8])
}

impl ModelBuffers<'_> {
	fn current(&self) -> Option<&[u8]> {
		match self {
			Self::None => None,
			Self::Current(current) => Some(current),
			Self::Split { current, .. } => Some(current),
			Self::InPlace(buf) => Some(buf)
		}
	}

	fn update_target(&mut self) -> Option<&mut [u8]> {
		match self {
			Self::None | Self::Current(_) => None,
			Self::Split { updated, .. } => Some(updated),
			Self::InPlace(buf) => Some(buf)
		}
	}
}

/// Compresses `input` into `output` according to `settings`, returning the length
/// of the produced bitstream in bits, **before** the zero padding that aligns it to
/// a 32-bit word boundary.
///
/// On success the output buffer holds the padded bitstream in wire byte order. On
/// failure the content of the output (and updated-model) buffer is undefined and
/// must not be consumed.
///
/// Passing `None` as `output` runs the identical encoding against a counting
/// writer: nothing is written, and the returned bit length is exactly what a real
/// buffer would need. [`ModelBuffers::Split`] and [`ModelBuffers::InPlace`] still
/// update the model in this probe mode.
pub fn compress(
	settings: &CompressionSettings,
	input: &[u8],
	model: ModelBuffers<'_>,
	output: Option<&mut [u8]>
) -> Result<u32, CompressError> {
	settings.validate()?;

	match settings.data_type {
		DataType::Imagette => run::<Imagette>(settings, input, model, output),
		DataType::SFx => run::<SFx>(settings, input, model, output),
		DataType::SFxEfx => run::<SFxEfx>(settings, input, model, output),
		DataType::SFxNcob => run::<SFxNcob>(settings, input, model, output),
		DataType::SFxEfxNcobEcob => run::<SFxEfxNcobEcob>(settings, input, model, output),
		DataType::FFx => run::<FFx>(settings, input, model, output),
		DataType::FFxEfx => run::<FFxEfx>(settings, input, model, output),
		DataType::FFxNcob => run::<FFxNcob>(settings, input, model, output),
		DataType::FFxEfxNcobEcob => run::<FFxEfxNcobEcob>(settings, input, model, output),
		DataType::LFx => run::<LFx>(settings, input, model, output),
		DataType::LFxEfx => run::<LFxEfx>(settings, input, model, output),
		DataType::LFxNcob => run::<LFxNcob>(settings, input, model, output),
		DataType::LFxEfxNcobEcob => run::<LFxEfxNcobEcob>(settings, input, model, output),
		DataType::Offset => run::<Offset>(settings, input, model, output),
		DataType::Background => run::<Background>(settings, input, model, output),
		DataType::Smearing => run::<Smearing>(settings, input, model, output)
	}
}

fn run<C: Collection>(
	settings: &CompressionSettings,
	input: &[u8],
	mut model: ModelBuffers<'_>,
	mut output: Option<&mut [u8]>
) -> Result<u32, CompressError> {
	debug_assert_eq!(settings.data_type, C::DATA_TYPE);

	let header_len = settings.data_type.header_bytes();
	let truncated = CompressError::TruncatedInput {
		data_type: settings.data_type,
		len: input.len()
	};
	let Some(payload_len) = input.len().checked_sub(header_len) else {
		return Err(truncated);
	};
	if payload_len % C::SAMPLE_BYTES != 0 {
		return Err(truncated);
	}
	let samples = payload_len / C::SAMPLE_BYTES;

	match (&model, settings.mode.is_model()) {
		(ModelBuffers::None, true) => return Err(CompressError::MissingModel(settings.mode)),
		(ModelBuffers::None, false) => {}
		(_, false) => return Err(CompressError::UnexpectedModel(settings.mode)),
		(_, true) => {}
	}
	if let Some(current) = model.current() {
		if current.len() != input.len() {
			return Err(CompressError::ModelLengthMismatch {
				input_len: input.len(),
				model_len: current.len()
			});
		}
	}
	if let ModelBuffers::Split { updated, .. } = &model {
		if updated.len() != input.len() {
			return Err(CompressError::ModelLengthMismatch {
				input_len: input.len(),
				model_len: updated.len()
			});
		}
	}

	debug!(
		"compressing {samples} {} sample(s) in {} mode",
		settings.data_type, settings.mode
	);

	if samples == 0 {
		return Ok(0);
	}

	if settings.mode == CompressionMode::Raw {
		return raw_copy::<C>(input, output, header_len, samples);
	}

	let encoders = C::configure(settings)?;

	// The collection header travels in front of the bitstream unchanged, and an
	// updated model carries it as well
	if let Some(out) = output.as_deref_mut() {
		let capacity = out.len() / WORD_BYTES * WORD_BITS;
		if capacity < header_len * 8 {
			return Err(CompressError::Bitstream(BitPackError::BufferTooSmall {
				requested: header_len * 8,
				capacity
			}));
		}
		out[..header_len].copy_from_slice(&input[..header_len]);
	}
	if header_len > 0 {
		if let Some(updated) = model.update_target() {
			updated[..header_len].copy_from_slice(&input[..header_len]);
		}
	}

	let mut writer = match output {
		Some(out) => BitWriter::new(out),
		None => BitWriter::counting()
	};
	writer.skip(header_len * 8)?;

	let mut previous = C::default();
	for index in 0..samples {
		let offset = header_len + index * C::SAMPLE_BYTES;
		let data = C::load(&input[offset..offset + C::SAMPLE_BYTES]);

		let predictor = match model.current() {
			Some(current) => C::load(&current[offset..offset + C::SAMPLE_BYTES]),
			// With no model, the predictor is the previous sample, or zero in
			// front of the first one
			None if index == 0 => C::default(),
			None => previous
		};

		data.encode(&predictor, &encoders, &mut writer)?;

		if let Some(updated) = model.update_target() {
			let next = data.update(&predictor, settings.model_value, settings.round);
			next.store(&mut updated[offset..offset + C::SAMPLE_BYTES]);
		}

		previous = data;
	}

	let stream_bits = writer.bit_position();
	writer.pad_to_word()?;
	let padded_len = writer.bit_position() / 8;

	// One conversion pass turns the packed payload words into their wire byte
	// order; the header bytes in front of them are already serialized
	if let Some(out) = writer.into_inner() {
		words_to_be(&mut out[header_len..padded_len]);
	}

	Ok(stream_bits as u32)
}

/// Raw mode: a verbatim copy with every field converted to big-endian at its
/// natural width. No entropy coding, no padding, no word conversion pass.
fn raw_copy<C: Collection>(
	input: &[u8],
	output: Option<&mut [u8]>,
	header_len: usize,
	samples: usize
) -> Result<u32, CompressError> {
	let bits = input.len() * 8;

	let Some(out) = output else {
		return Ok(bits as u32);
	};
	if out.len() < input.len() {
		return Err(CompressError::RawBufferTooSmall {
			needed: input.len(),
			capacity: out.len()
		});
	}

	out[..header_len].copy_from_slice(&input[..header_len]);
	for index in 0..samples {
		let offset = header_len + index * C::SAMPLE_BYTES;
		let sample = C::load(&input[offset..offset + C::SAMPLE_BYTES]);
		sample.store_be(&mut out[offset..offset + C::SAMPLE_BYTES]);
	}

	Ok(bits as u32)
}
