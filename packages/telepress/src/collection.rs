//! Contains the sample layouts the compressor understands: the [`DataType`] tag, one
//! record type per layout, and the field tables that bind each record field to its
//! Golomb parameters and declared width.
//!
//! Multi-byte record fields are stored in native byte order in the input and model
//! buffers, packed without padding. Every non-imagette layout is prefixed by an
//! opaque [collection header](COLLECTION_HDR_SIZE) that is carried through to the
//! output verbatim.

use std::error::Error;
use std::fmt::{Display, Formatter};

use strum_macros::FromRepr;
use word_bitpack::BitWriter;

use crate::encoder::CompressError;
use crate::encoder::field::FieldEncoder;
use crate::encoder::model::update_model;
use crate::settings::{CompressionSettings, tag_conversion_impl};

/// The size in bytes of the opaque header in front of every non-imagette input,
/// model and output buffer. Three whole bitstream words, so the entropy-coded
/// payload that follows it is word aligned.
pub const COLLECTION_HDR_SIZE: usize = 12;

/// Identifies the sample layout of an input (and model) buffer.
///
/// The numeric representation of each variant is the layout tag shared with the
/// ground processing tools.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash, FromRepr)]
#[repr(u8)]
pub enum DataType {
	/// Nominal-cadence imagette pixels; the only layout the hardware compressor
	/// accepts, and the only one without a collection header.
	Imagette = 0,
	/// Short-cadence flux.
	SFx = 1,
	/// Short-cadence flux with extended flux.
	SFxEfx = 2,
	/// Short-cadence flux with centers of brightness.
	SFxNcob = 3,
	/// Short-cadence flux with extended flux and both centers of brightness.
	SFxEfxNcobEcob = 4,
	/// Fast-cadence flux.
	FFx = 5,
	/// Fast-cadence flux with extended flux.
	FFxEfx = 6,
	/// Fast-cadence flux with centers of brightness.
	FFxNcob = 7,
	/// Fast-cadence flux with extended flux and both centers of brightness.
	FFxEfxNcobEcob = 8,
	/// Long-cadence flux with its variance.
	LFx = 9,
	/// Long-cadence flux with extended flux and the flux variance.
	LFxEfx = 10,
	/// Long-cadence flux with centers of brightness and all variances.
	LFxNcob = 11,
	/// Long-cadence flux with extended flux, both centers of brightness and all
	/// variances.
	LFxEfxNcobEcob = 12,
	/// Offset calibration samples.
	Offset = 13,
	/// Background calibration samples.
	Background = 14,
	/// Smearing calibration samples.
	Smearing = 15
}

impl DataType {
	/// Returns the fixed size in bytes of one sample of this layout.
	pub fn sample_bytes(self) -> usize {
		match self {
			Self::Imagette => Imagette::SAMPLE_BYTES,
			Self::SFx => SFx::SAMPLE_BYTES,
			Self::SFxEfx => SFxEfx::SAMPLE_BYTES,
			Self::SFxNcob => SFxNcob::SAMPLE_BYTES,
			Self::SFxEfxNcobEcob => SFxEfxNcobEcob::SAMPLE_BYTES,
			Self::FFx => FFx::SAMPLE_BYTES,
			Self::FFxEfx => FFxEfx::SAMPLE_BYTES,
			Self::FFxNcob => FFxNcob::SAMPLE_BYTES,
			Self::FFxEfxNcobEcob => FFxEfxNcobEcob::SAMPLE_BYTES,
			Self::LFx => LFx::SAMPLE_BYTES,
			Self::LFxEfx => LFxEfx::SAMPLE_BYTES,
			Self::LFxNcob => LFxNcob::SAMPLE_BYTES,
			Self::LFxEfxNcobEcob => LFxEfxNcobEcob::SAMPLE_BYTES,
			Self::Offset => Offset::SAMPLE_BYTES,
			Self::Background => Background::SAMPLE_BYTES,
			Self::Smearing => Smearing::SAMPLE_BYTES
		}
	}

	/// Returns the size in bytes of the opaque header in front of the samples:
	/// zero for imagettes, [`COLLECTION_HDR_SIZE`] for everything else.
	pub fn header_bytes(self) -> usize {
		match self {
			Self::Imagette => 0,
			_ => COLLECTION_HDR_SIZE
		}
	}
}

impl Display for DataType {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			Self::Imagette => "imagette",
			Self::SFx => "s-fx",
			Self::SFxEfx => "s-fx-efx",
			Self::SFxNcob => "s-fx-ncob",
			Self::SFxEfxNcobEcob => "s-fx-efx-ncob-ecob",
			Self::FFx => "f-fx",
			Self::FFxEfx => "f-fx-efx",
			Self::FFxNcob => "f-fx-ncob",
			Self::FFxEfxNcobEcob => "f-fx-efx-ncob-ecob",
			Self::LFx => "l-fx",
			Self::LFxEfx => "l-fx-efx",
			Self::LFxNcob => "l-fx-ncob",
			Self::LFxEfxNcobEcob => "l-fx-efx-ncob-ecob",
			Self::Offset => "offset",
			Self::Background => "background",
			Self::Smearing => "smearing"
		})
	}
}

tag_conversion_impl! {
	DataType(u8) => TryDataTypeFromInt
}

/// A fixed-width record field: how it is read from and written back to the byte
/// buffers, and how it widens to the `u32` the entropy coder works on.
pub(crate) trait FieldValue: Copy + Default {
	const BYTES: usize;
	fn load(bytes: &[u8], offset: &mut usize) -> Self;
	fn store(self, bytes: &mut [u8], offset: &mut usize);
	fn store_be(self, bytes: &mut [u8], offset: &mut usize);
	fn widen(self) -> u32;
	fn narrow(value: u32) -> Self;
}

impl FieldValue for u8 {
	const BYTES: usize = 1;

	fn load(bytes: &[u8], offset: &mut usize) -> Self {
		let value = bytes[*offset];
		*offset += 1;
		value
	}

	fn store(self, bytes: &mut [u8], offset: &mut usize) {
		bytes[*offset] = self;
		*offset += 1;
	}

	fn store_be(self, bytes: &mut [u8], offset: &mut usize) {
		self.store(bytes, offset);
	}

	fn widen(self) -> u32 {
		u32::from(self)
	}

	fn narrow(value: u32) -> Self {
		value as u8
	}
}

/// Implements [`FieldValue`] for the multi-byte field types.
macro_rules! field_value_impl {
	($($ty:ty),+) => {$(
		impl FieldValue for $ty {
			const BYTES: usize = size_of::<$ty>();

			fn load(bytes: &[u8], offset: &mut usize) -> Self {
				let mut raw = [0u8; size_of::<$ty>()];
				raw.copy_from_slice(&bytes[*offset..*offset + size_of::<$ty>()]);
				*offset += size_of::<$ty>();
				Self::from_ne_bytes(raw)
			}

			fn store(self, bytes: &mut [u8], offset: &mut usize) {
				bytes[*offset..*offset + size_of::<$ty>()].copy_from_slice(&self.to_ne_bytes());
				*offset += size_of::<$ty>();
			}

			fn store_be(self, bytes: &mut [u8], offset: &mut usize) {
				bytes[*offset..*offset + size_of::<$ty>()].copy_from_slice(&self.to_be_bytes());
				*offset += size_of::<$ty>();
			}

			fn widen(self) -> u32 {
				u32::from(self)
			}

			fn narrow(value: u32) -> Self {
				value as $ty
			}
		}
	)+}
}

field_value_impl!(u16, u32);

/// A sample record of one of the layouts of [`DataType`], together with the field
/// table that drives its compression: per field, in bitstream order, the Golomb
/// parameters it shares and the width entry that bounds it.
pub(crate) trait Collection: Copy + Default {
	/// One bound [`FieldEncoder`] per record field, in bitstream order.
	type Encoders;

	const SAMPLE_BYTES: usize;
	const DATA_TYPE: DataType;

	fn load(bytes: &[u8]) -> Self;
	fn store(&self, bytes: &mut [u8]);
	/// Writes the record with every field converted to big-endian at its natural
	/// width, as raw-mode output demands.
	fn store_be(&self, bytes: &mut [u8]);
	fn configure(settings: &CompressionSettings) -> Result<Self::Encoders, CompressError>;
	fn encode(
		&self,
		predictor: &Self,
		encoders: &Self::Encoders,
		writer: &mut BitWriter<'_>
	) -> Result<(), CompressError>;
	/// Returns the model record for the next compression of this sample position.
	fn update(&self, model: &Self, model_value: u32, round: u32) -> Self;
}

/// Counts the identifiers it is given, for sizing the encoder arrays.
macro_rules! count_fields {
	() => { 0 };
	($head:ident $($tail:ident)*) => { 1 + count_fields!($($tail)*) };
}

/// Defines one sample record and its [`Collection`] implementation from a field
/// table. Each row binds a record field, in bitstream order, to the
/// [`CompressionSettings`] parameter pair it uses and the [`MaxUsedBits`] entry
/// that bounds it; fields naming the same parameter pair share one encoder
/// configuration.
///
/// [`MaxUsedBits`]: crate::settings::MaxUsedBits
macro_rules! define_collection {
	(
		$(#[$meta:meta])*
		$name:ident = $data_type:ident {
			$($field:ident: $ty:ty => ($params:ident, $bits:ident)),+ $(,)?
		}
	) => {
		$(#[$meta])*
		#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
		pub(crate) struct $name {
			$(pub(crate) $field: $ty),+
		}

		impl Collection for $name {
			type Encoders = [FieldEncoder; count_fields!($($field)+)];

			const SAMPLE_BYTES: usize = 0 $(+ <$ty as FieldValue>::BYTES)+;
			const DATA_TYPE: DataType = DataType::$data_type;

			fn load(bytes: &[u8]) -> Self {
				let mut offset = 0;
				$(let $field = <$ty as FieldValue>::load(bytes, &mut offset);)+
				Self { $($field),+ }
			}

			fn store(&self, bytes: &mut [u8]) {
				let mut offset = 0;
				$(self.$field.store(bytes, &mut offset);)+
			}

			fn store_be(&self, bytes: &mut [u8]) {
				let mut offset = 0;
				$(self.$field.store_be(bytes, &mut offset);)+
			}

			fn configure(settings: &CompressionSettings) -> Result<Self::Encoders, CompressError> {
				Ok([$(FieldEncoder::configure(
					settings.$params,
					settings.max_used_bits.$bits,
					stringify!($field),
					settings
				)?),+])
			}

			fn encode(
				&self,
				predictor: &Self,
				encoders: &Self::Encoders,
				writer: &mut BitWriter<'_>
			) -> Result<(), CompressError> {
				let [$($field),+] = encoders;
				$($field.encode(self.$field.widen(), predictor.$field.widen(), writer)?;)+
				Ok(())
			}

			fn update(&self, model: &Self, model_value: u32, round: u32) -> Self {
				Self {
					$($field: <$ty as FieldValue>::narrow(update_model(
						self.$field.widen(),
						model.$field.widen(),
						model_value,
						round
					))),+
				}
			}
		}
	};
}

define_collection! {
	/// A single detector pixel of a nominal-cadence imagette.
	Imagette = Imagette {
		imagette: u16 => (imagette, nc_imagette)
	}
}

define_collection! {
	SFx = SFx {
		exp_flags: u8 => (exp_flags, s_exp_flags),
		fx: u32 => (fx, s_fx)
	}
}

define_collection! {
	SFxEfx = SFxEfx {
		exp_flags: u8 => (exp_flags, s_exp_flags),
		fx: u32 => (fx, s_fx),
		efx: u32 => (efx, s_efx)
	}
}

define_collection! {
	/// Both center-of-brightness axes share one encoder configuration.
	SFxNcob = SFxNcob {
		exp_flags: u8 => (exp_flags, s_exp_flags),
		fx: u32 => (fx, s_fx),
		ncob_x: u32 => (ncob, s_ncob),
		ncob_y: u32 => (ncob, s_ncob)
	}
}

define_collection! {
	SFxEfxNcobEcob = SFxEfxNcobEcob {
		exp_flags: u8 => (exp_flags, s_exp_flags),
		fx: u32 => (fx, s_fx),
		ncob_x: u32 => (ncob, s_ncob),
		ncob_y: u32 => (ncob, s_ncob),
		efx: u32 => (efx, s_efx),
		ecob_x: u32 => (ecob, s_ecob),
		ecob_y: u32 => (ecob, s_ecob)
	}
}

define_collection! {
	/// Fast-cadence samples carry no exposure flags.
	FFx = FFx {
		fx: u32 => (fx, f_fx)
	}
}

define_collection! {
	FFxEfx = FFxEfx {
		fx: u32 => (fx, f_fx),
		efx: u32 => (efx, f_efx)
	}
}

define_collection! {
	FFxNcob = FFxNcob {
		fx: u32 => (fx, f_fx),
		ncob_x: u32 => (ncob, f_ncob),
		ncob_y: u32 => (ncob, f_ncob)
	}
}

define_collection! {
	FFxEfxNcobEcob = FFxEfxNcobEcob {
		fx: u32 => (fx, f_fx),
		ncob_x: u32 => (ncob, f_ncob),
		ncob_y: u32 => (ncob, f_ncob),
		efx: u32 => (efx, f_efx),
		ecob_x: u32 => (ecob, f_ecob),
		ecob_y: u32 => (ecob, f_ecob)
	}
}

define_collection! {
	/// Long-cadence exposure flags accumulate over many exposures and need the
	/// full 32-bit width.
	LFx = LFx {
		exp_flags: u32 => (exp_flags, l_exp_flags),
		fx: u32 => (fx, l_fx),
		fx_variance: u32 => (fx_cob_variance, l_fx_variance)
	}
}

define_collection! {
	LFxEfx = LFxEfx {
		exp_flags: u32 => (exp_flags, l_exp_flags),
		fx: u32 => (fx, l_fx),
		efx: u32 => (efx, l_efx),
		fx_variance: u32 => (fx_cob_variance, l_fx_variance)
	}
}

define_collection! {
	/// The flux and center-of-brightness variances share their Golomb parameters
	/// but are bounded by separate width entries.
	LFxNcob = LFxNcob {
		exp_flags: u32 => (exp_flags, l_exp_flags),
		fx: u32 => (fx, l_fx),
		ncob_x: u32 => (ncob, l_ncob),
		ncob_y: u32 => (ncob, l_ncob),
		fx_variance: u32 => (fx_cob_variance, l_fx_variance),
		cob_x_variance: u32 => (fx_cob_variance, l_cob_variance),
		cob_y_variance: u32 => (fx_cob_variance, l_cob_variance)
	}
}

define_collection! {
	LFxEfxNcobEcob = LFxEfxNcobEcob {
		exp_flags: u32 => (exp_flags, l_exp_flags),
		fx: u32 => (fx, l_fx),
		ncob_x: u32 => (ncob, l_ncob),
		ncob_y: u32 => (ncob, l_ncob),
		efx: u32 => (efx, l_efx),
		ecob_x: u32 => (ecob, l_ecob),
		ecob_y: u32 => (ecob, l_ecob),
		fx_variance: u32 => (fx_cob_variance, l_fx_variance),
		cob_x_variance: u32 => (fx_cob_variance, l_cob_variance),
		cob_y_variance: u32 => (fx_cob_variance, l_cob_variance)
	}
}

define_collection! {
	Offset = Offset {
		mean: u32 => (mean, nc_offset_mean),
		variance: u32 => (variance, nc_offset_variance)
	}
}

define_collection! {
	Background = Background {
		mean: u32 => (mean, nc_background_mean),
		variance: u32 => (variance, nc_background_variance),
		outlier_pixels: u16 => (outlier_pixels, nc_background_outlier_pixels)
	}
}

define_collection! {
	Smearing = Smearing {
		mean: u32 => (mean, smearing_mean),
		variance_mean: u32 => (variance, smearing_variance_mean),
		outlier_pixels: u16 => (outlier_pixels, smearing_outlier_pixels)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn sample_sizes_match_the_packed_record_layouts() {
		let expected = [
			(DataType::Imagette, 2),
			(DataType::SFx, 5),
			(DataType::SFxEfx, 9),
			(DataType::SFxNcob, 13),
			(DataType::SFxEfxNcobEcob, 25),
			(DataType::FFx, 4),
			(DataType::FFxEfx, 8),
			(DataType::FFxNcob, 12),
			(DataType::FFxEfxNcobEcob, 24),
			(DataType::LFx, 12),
			(DataType::LFxEfx, 16),
			(DataType::LFxNcob, 28),
			(DataType::LFxEfxNcobEcob, 40),
			(DataType::Offset, 8),
			(DataType::Background, 10),
			(DataType::Smearing, 10)
		];

		for (data_type, bytes) in expected {
			assert_eq!(data_type.sample_bytes(), bytes, "wrong sample size for {data_type}");
		}
	}

	#[test]
	fn every_data_type_tag_converts_both_ways() {
		for tag in 0..=15u8 {
			let data_type = DataType::try_from(tag).expect("tag is defined");
			assert_eq!(data_type as u8, tag);
		}
		DataType::try_from(16).expect_err("tag 16 is undefined");
	}

	#[test]
	fn records_load_and_store_losslessly() {
		let sample = SFxEfxNcobEcob {
			exp_flags: 0x5A,
			fx: 0x0102_0304,
			ncob_x: 0xAABB_CCDD,
			ncob_y: 1,
			efx: u32::MAX,
			ecob_x: 0,
			ecob_y: 0x8000_0001
		};

		let mut bytes = [0u8; SFxEfxNcobEcob::SAMPLE_BYTES];
		sample.store(&mut bytes);
		assert_eq!(SFxEfxNcobEcob::load(&bytes), sample);
	}

	#[test]
	fn store_be_writes_fields_at_their_natural_widths() {
		let sample = Background {
			mean: 0x0102_0304,
			variance: 0x0A0B_0C0D,
			outlier_pixels: 0x1122
		};

		let mut bytes = [0u8; Background::SAMPLE_BYTES];
		sample.store_be(&mut bytes);
		assert_eq!(
			bytes,
			[0x01, 0x02, 0x03, 0x04, 0x0A, 0x0B, 0x0C, 0x0D, 0x11, 0x22]
		);
	}
}
