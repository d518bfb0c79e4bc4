//! Contains the [`CompressionSettings`] record consumed by a [`compress`](crate::compress)
//! call, together with the parameter limits shared with the hardware compressor.

use std::error::Error;
use std::fmt::{Display, Formatter};

use strum_macros::FromRepr;

use crate::collection::DataType;
use crate::encoder::CompressError;

/// Helper macro that derives a [`TryFrom`] conversion from a raw tag integer to an
/// enum, with a dedicated error type that keeps the rejected tag around for error
/// reporting.
macro_rules! tag_conversion_impl {
	{ $enum_type:ident($repr_type:ty) => $error_type:ident } => {
		#[doc = concat!(
			"The error type for fallible conversions from tag integers to a `",
			stringify!($enum_type),
			"`."
		)]
		#[derive(Debug, Clone, Copy, PartialEq, Eq)]
		pub struct $error_type {
			tag: $repr_type
		}

		impl $error_type {
			/// Returns the tag whose conversion failed.
			pub const fn tag(&self) -> $repr_type {
				self.tag
			}
		}

		impl Display for $error_type {
			fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
				write!(f, "unrecognized {} tag {}", stringify!($enum_type), self.tag)
			}
		}

		impl Error for $error_type {}

		impl TryFrom<$repr_type> for $enum_type {
			type Error = $error_type;

			fn try_from(tag: $repr_type) -> Result<Self, Self::Error> {
				$enum_type::from_repr(tag).ok_or($error_type { tag })
			}
		}
	}
}

pub(crate) use tag_conversion_impl;

/// The weight of the prior model may not exceed this value: the model update rule
/// blends in sixteenths.
pub const MAX_MODEL_VALUE: u32 = 16;
/// The largest lossy rounding parameter the software compressor accepts.
pub const MAX_ROUND: u32 = 3;
/// The largest lossy rounding parameter a configuration may use when it must also be
/// able to drive the hardware compressor.
pub const MAX_HARDWARE_ROUND: u32 = 2;
/// The largest Golomb parameter of the imagette field. The imagette parameter register
/// of the hardware compressor is six bits wide, and the same configuration must be
/// able to drive either compressor.
pub const MAX_IMAGETTE_GOLOMB_PAR: u32 = 63;
/// The largest Golomb parameter of the software-only fields.
pub const MAX_GOLOMB_PAR: u32 = 0xFFFF;
/// The smallest accepted spillover threshold. A threshold of 1 would leave no
/// in-range codeword at all under the zero-escape protocol.
pub const MIN_SPILLOVER: u32 = 2;

/// Selects how sample values are turned into the entropy-coded residuals of the
/// output bitstream.
///
/// The numeric representation of each variant is the mode tag shared with the
/// hardware compressor register map.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash, FromRepr)]
#[repr(u8)]
pub enum CompressionMode {
	/// No entropy coding: the input is copied to the output with each field
	/// converted to big-endian at its natural width.
	Raw = 0,
	/// The per-sample model is the predictor; outliers use the zero-escape
	/// protocol.
	ModelZero = 1,
	/// The previous sample is the predictor (zero for the first sample);
	/// outliers use the zero-escape protocol.
	DiffZero = 2,
	/// The per-sample model is the predictor; outliers use the multi-escape
	/// protocol.
	ModelMulti = 3,
	/// The previous sample is the predictor; outliers use the multi-escape
	/// protocol.
	DiffMulti = 4,
	/// No prediction at all: the low `golomb_par` bits of every value are
	/// written verbatim.
	Stuff = 5
}

impl CompressionMode {
	/// Returns whether this mode reads its predictor from a model buffer.
	pub fn is_model(self) -> bool {
		matches!(self, Self::ModelZero | Self::ModelMulti)
	}

	/// Returns whether this mode predicts each sample from its predecessor.
	pub fn is_diff(self) -> bool {
		matches!(self, Self::DiffZero | Self::DiffMulti)
	}
}

impl Display for CompressionMode {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			Self::Raw => "raw",
			Self::ModelZero => "model-zero",
			Self::DiffZero => "diff-zero",
			Self::ModelMulti => "model-multi",
			Self::DiffMulti => "diff-multi",
			Self::Stuff => "stuff"
		})
	}
}

tag_conversion_impl! {
	CompressionMode(u8) => TryCompressionModeFromInt
}

/// The Golomb parameter and spillover threshold of one bitstream field.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct FieldParams {
	/// The Golomb code parameter. A power of two selects the shift-only Rice
	/// variant. In [`Stuff`](CompressionMode::Stuff) mode this is the verbatim
	/// bit width instead.
	pub golomb_par: u32,
	/// The first residual value that is written escaped instead of directly
	/// entropy coded. Bounded by [`max_spill`](crate::max_spill) of the Golomb
	/// parameter so no codeword can outgrow a 32-bit word.
	pub spillover: u32
}

impl Default for FieldParams {
	fn default() -> Self {
		Self {
			golomb_par: 4,
			spillover: 16
		}
	}
}

/// The declared bit width of every bitstream field, bounding both the data and the
/// model values of that field. A value `v` of a field with width `w` must satisfy
/// `v < 2^w`; violations abort a compression with
/// [`ValueOutOfRange`](CompressError::ValueOutOfRange).
///
/// [`MaxUsedBits::SAFE`] (also the `Default`) declares every field as wide as its
/// storage type, which can never be violated.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct MaxUsedBits {
	/// Width of nominal-cadence imagette pixels.
	pub nc_imagette: u32,
	/// Width of the short-cadence exposure flags.
	pub s_exp_flags: u32,
	/// Width of the short-cadence flux.
	pub s_fx: u32,
	/// Width of the short-cadence extended flux.
	pub s_efx: u32,
	/// Width of the short-cadence centers of brightness.
	pub s_ncob: u32,
	/// Width of the short-cadence extended centers of brightness.
	pub s_ecob: u32,
	/// Width of the fast-cadence flux.
	pub f_fx: u32,
	/// Width of the fast-cadence extended flux.
	pub f_efx: u32,
	/// Width of the fast-cadence centers of brightness.
	pub f_ncob: u32,
	/// Width of the fast-cadence extended centers of brightness.
	pub f_ecob: u32,
	/// Width of the long-cadence exposure flags.
	pub l_exp_flags: u32,
	/// Width of the long-cadence flux.
	pub l_fx: u32,
	/// Width of the long-cadence extended flux.
	pub l_efx: u32,
	/// Width of the long-cadence centers of brightness.
	pub l_ncob: u32,
	/// Width of the long-cadence extended centers of brightness.
	pub l_ecob: u32,
	/// Width of the long-cadence flux variance.
	pub l_fx_variance: u32,
	/// Width of the long-cadence center-of-brightness variances.
	pub l_cob_variance: u32,
	/// Width of the offset mean.
	pub nc_offset_mean: u32,
	/// Width of the offset variance.
	pub nc_offset_variance: u32,
	/// Width of the background mean.
	pub nc_background_mean: u32,
	/// Width of the background variance.
	pub nc_background_variance: u32,
	/// Width of the background outlier pixel count.
	pub nc_background_outlier_pixels: u32,
	/// Width of the smearing mean.
	pub smearing_mean: u32,
	/// Width of the smearing variance mean.
	pub smearing_variance_mean: u32,
	/// Width of the smearing outlier pixel count.
	pub smearing_outlier_pixels: u32
}

impl MaxUsedBits {
	/// The widths of the fields' storage types. No in-range sample can violate
	/// this preset.
	pub const SAFE: Self = Self {
		nc_imagette: 16,
		s_exp_flags: 8,
		s_fx: 32,
		s_efx: 32,
		s_ncob: 32,
		s_ecob: 32,
		f_fx: 32,
		f_efx: 32,
		f_ncob: 32,
		f_ecob: 32,
		l_exp_flags: 32,
		l_fx: 32,
		l_efx: 32,
		l_ncob: 32,
		l_ecob: 32,
		l_fx_variance: 32,
		l_cob_variance: 32,
		nc_offset_mean: 32,
		nc_offset_variance: 32,
		nc_background_mean: 32,
		nc_background_variance: 32,
		nc_background_outlier_pixels: 16,
		smearing_mean: 32,
		smearing_variance_mean: 32,
		smearing_outlier_pixels: 16
	};
}

impl Default for MaxUsedBits {
	fn default() -> Self {
		Self::SAFE
	}
}

/// Everything a [`compress`](crate::compress) call needs to know besides the buffers
/// themselves. All fields are plain data; the record is consumed read-only.
///
/// Fields that do not apply to the selected [`data_type`](Self::data_type) or
/// [`mode`](Self::mode) are ignored: only the parameters of the fields a layout
/// actually encodes are validated and used.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CompressionSettings {
	/// The sample layout of the input (and model) buffer.
	pub data_type: DataType,
	/// How samples are predicted and residuals escaped.
	pub mode: CompressionMode,
	/// The weight of the prior model in the model update rule, in sixteenths.
	/// `16` freezes the model, `0` replaces it with the observed data.
	pub model_value: u32,
	/// Number of low-order bits discarded before encoding (lossy; `0` is
	/// lossless).
	pub round: u32,
	/// Parameters of the imagette pixel field.
	pub imagette: FieldParams,
	/// Parameters of the exposure flag fields.
	pub exp_flags: FieldParams,
	/// Parameters of the flux fields.
	pub fx: FieldParams,
	/// Parameters of the center-of-brightness fields (both axes).
	pub ncob: FieldParams,
	/// Parameters of the extended flux fields.
	pub efx: FieldParams,
	/// Parameters of the extended center-of-brightness fields (both axes).
	pub ecob: FieldParams,
	/// Parameters shared by the flux variance and center-of-brightness variance
	/// fields. The fields keep separate width entries in
	/// [`max_used_bits`](Self::max_used_bits).
	pub fx_cob_variance: FieldParams,
	/// Parameters of the mean fields of the auxiliary science layouts.
	pub mean: FieldParams,
	/// Parameters of the variance fields of the auxiliary science layouts.
	pub variance: FieldParams,
	/// Parameters of the outlier pixel count fields.
	pub outlier_pixels: FieldParams,
	/// The declared bit width of every field.
	pub max_used_bits: MaxUsedBits
}

impl CompressionSettings {
	/// Checks the layout-independent parameters. The per-field Golomb parameters,
	/// spillover thresholds and widths are checked when the selected layout binds
	/// its field encoders, so only the fields a layout uses can reject a
	/// configuration.
	pub(crate) fn validate(&self) -> Result<(), CompressError> {
		if self.model_value > MAX_MODEL_VALUE {
			return Err(CompressError::InvalidModelValue(self.model_value));
		}
		if self.round > MAX_ROUND {
			return Err(CompressError::InvalidRound {
				round: self.round,
				max: MAX_ROUND
			});
		}

		// The imagette layout must stay loadable into the hardware compressor,
		// whose parameter and rounding registers are narrower than the software
		// limits
		if self.data_type == DataType::Imagette
			&& !matches!(self.mode, CompressionMode::Raw | CompressionMode::Stuff)
		{
			if self.imagette.golomb_par > MAX_IMAGETTE_GOLOMB_PAR {
				return Err(CompressError::InvalidGolombPar {
					field: "imagette",
					golomb_par: self.imagette.golomb_par,
					max: MAX_IMAGETTE_GOLOMB_PAR
				});
			}
			if self.round > MAX_HARDWARE_ROUND {
				return Err(CompressError::InvalidRound {
					round: self.round,
					max: MAX_HARDWARE_ROUND
				});
			}
		}

		Ok(())
	}
}

impl Default for CompressionSettings {
	fn default() -> Self {
		Self {
			data_type: DataType::Imagette,
			mode: CompressionMode::DiffZero,
			model_value: 8,
			round: 0,
			imagette: FieldParams::default(),
			exp_flags: FieldParams::default(),
			fx: FieldParams::default(),
			ncob: FieldParams::default(),
			efx: FieldParams::default(),
			ecob: FieldParams::default(),
			fx_cob_variance: FieldParams::default(),
			mean: FieldParams::default(),
			variance: FieldParams::default(),
			outlier_pixels: FieldParams::default(),
			max_used_bits: MaxUsedBits::SAFE
		}
	}
}
