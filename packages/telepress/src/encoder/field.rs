//! The per-field encoder bundle: one [`FieldEncoder`] per bitstream field, holding
//! the selected codeword generator, the escape protocol of the compression mode and
//! the field's bounds.

use log::trace;
use word_bitpack::BitWriter;

use crate::encoder::CompressError;
use crate::encoder::golomb::{GolombCoder, fold, max_spill};
use crate::settings::{
	CompressionMode, CompressionSettings, FieldParams, MAX_GOLOMB_PAR, MIN_SPILLOVER
};

/// How residuals beyond the spillover threshold are represented.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Escape {
	/// The codeword for 0 is reserved as the escape symbol; all regular residuals
	/// shift up by one, and an escaped residual follows as `max_bits` raw bits.
	Zero,
	/// A family of escape symbols starting at the spillover threshold doubles as
	/// the bit-length announcement of the raw residual that follows.
	Multi,
	/// No escapes and no prediction: the low `max_bits` bits of every value are
	/// written verbatim (stuff mode).
	None
}

/// Everything needed to encode the values of one record field, bound once per
/// compression.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldEncoder {
	coder: GolombCoder,
	escape: Escape,
	spillover: u32,
	max_bits: u32,
	round: u32,
	field: &'static str
}

impl FieldEncoder {
	/// Binds the encoder of one field, validating the parameters the selected
	/// mode will use. `field` names the field in rejection errors.
	pub(crate) fn configure(
		params: FieldParams,
		max_bits: u32,
		field: &'static str,
		settings: &CompressionSettings
	) -> Result<Self, CompressError> {
		let escape = match settings.mode {
			CompressionMode::ModelZero | CompressionMode::DiffZero => Escape::Zero,
			CompressionMode::ModelMulti | CompressionMode::DiffMulti => Escape::Multi,
			CompressionMode::Stuff => Escape::None,
			CompressionMode::Raw => unreachable!("raw mode bypasses the field encoders")
		};

		if escape == Escape::None {
			// The Golomb parameter register carries the verbatim width instead
			if params.golomb_par == 0 || params.golomb_par > 32 {
				return Err(CompressError::InvalidGolombPar {
					field,
					golomb_par: params.golomb_par,
					max: 32
				});
			}

			return Ok(Self {
				coder: GolombCoder::Rice { log2_par: 0 },
				escape,
				spillover: 0,
				max_bits: params.golomb_par,
				round: settings.round,
				field
			});
		}

		if params.golomb_par == 0 || params.golomb_par > MAX_GOLOMB_PAR {
			return Err(CompressError::InvalidGolombPar {
				field,
				golomb_par: params.golomb_par,
				max: MAX_GOLOMB_PAR
			});
		}

		let max_spill = max_spill(params.golomb_par);
		if params.spillover < MIN_SPILLOVER || params.spillover > max_spill {
			return Err(CompressError::InvalidSpillover {
				field,
				spillover: params.spillover,
				min: MIN_SPILLOVER,
				max: max_spill
			});
		}

		if max_bits == 0 || max_bits > 32 {
			return Err(CompressError::InvalidMaxBits { field, bits: max_bits });
		}

		Ok(Self {
			coder: GolombCoder::new(params.golomb_par),
			escape,
			spillover: params.spillover,
			max_bits,
			round: settings.round,
			field
		})
	}

	/// Encodes one value of this field against its predictor and appends the
	/// result to the bitstream.
	pub(crate) fn encode(
		&self,
		data: u32,
		predictor: u32,
		writer: &mut BitWriter<'_>
	) -> Result<(), CompressError> {
		if self.escape == Escape::None {
			writer.put_bits(data >> self.round, self.max_bits)?;
			return Ok(());
		}

		self.check_width(data)?;
		self.check_width(predictor)?;

		let difference = (data >> self.round).wrapping_sub(predictor >> self.round);
		let residual = fold(difference, self.max_bits);

		match self.escape {
			Escape::Zero => {
				// Residuals shift up by one so the codeword for 0 can announce
				// an escaped value; the shift applies on the escape path too
				if residual < self.spillover - 1 {
					self.put_codeword(residual + 1, writer)
				} else {
					trace!(
						"{} residual {residual} spills over {}, escaping verbatim",
						self.field, self.spillover
					);
					self.put_codeword(0, writer)?;
					writer.put_bits(residual.wrapping_add(1), self.max_bits)?;
					Ok(())
				}
			}
			Escape::Multi => {
				if residual < self.spillover {
					self.put_codeword(residual, writer)
				} else {
					// The escape symbol announces the smallest even bit count
					// that holds the excess
					let excess = residual - self.spillover;
					let payload_bits = if excess == 0 { 2 } else { (excess.ilog2() / 2 + 1) * 2 };
					trace!(
						"{} residual {residual} spills over {}, escaping with {payload_bits} payload bits",
						self.field, self.spillover
					);
					self.put_codeword(self.spillover + payload_bits / 2 - 1, writer)?;
					writer.put_bits(excess, payload_bits)?;
					Ok(())
				}
			}
			Escape::None => unreachable!()
		}
	}

	fn put_codeword(&self, value: u32, writer: &mut BitWriter<'_>) -> Result<(), CompressError> {
		let (codeword, width) = self.coder.encode(value);
		writer.put_bits(codeword, width)?;
		Ok(())
	}

	fn check_width(&self, value: u32) -> Result<(), CompressError> {
		if self.max_bits < 32 && value >> self.max_bits != 0 {
			return Err(CompressError::ValueOutOfRange {
				field: self.field,
				value,
				bits: self.max_bits
			});
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use word_bitpack::get_bits;

	use super::*;
	use crate::settings::MaxUsedBits;

	fn settings_for(mode: CompressionMode) -> CompressionSettings {
		CompressionSettings {
			mode,
			..CompressionSettings::default()
		}
	}

	fn encoder(mode: CompressionMode, golomb_par: u32, spillover: u32, max_bits: u32) -> FieldEncoder {
		FieldEncoder::configure(
			FieldParams { golomb_par, spillover },
			max_bits,
			"test",
			&settings_for(mode)
		)
		.expect("test parameters are valid")
	}

	#[test]
	fn configure_rejects_incoherent_parameters() {
		let zero_par = FieldEncoder::configure(
			FieldParams {
				golomb_par: 0,
				spillover: 8
			},
			16,
			"test",
			&settings_for(CompressionMode::DiffZero)
		);
		assert!(matches!(zero_par, Err(CompressError::InvalidGolombPar { .. })));

		let wide_spill = FieldEncoder::configure(
			FieldParams {
				golomb_par: 4,
				spillover: max_spill(4) + 1
			},
			16,
			"test",
			&settings_for(CompressionMode::DiffMulti)
		);
		assert!(matches!(wide_spill, Err(CompressError::InvalidSpillover { .. })));

		let no_bits = FieldEncoder::configure(
			FieldParams {
				golomb_par: 4,
				spillover: 8
			},
			0,
			"test",
			&settings_for(CompressionMode::ModelZero)
		);
		assert!(matches!(no_bits, Err(CompressError::InvalidMaxBits { .. })));

		let wide_stuff = FieldEncoder::configure(
			FieldParams {
				golomb_par: 33,
				spillover: 8
			},
			16,
			"test",
			&settings_for(CompressionMode::Stuff)
		);
		assert!(matches!(
			wide_stuff,
			Err(CompressError::InvalidGolombPar { max: 32, .. })
		));
	}

	#[test]
	fn zero_escape_reserves_the_zero_codeword() {
		let encoder = encoder(CompressionMode::DiffZero, 8, 8, 16);
		let mut buf = [0u8; 8];
		let mut writer = BitWriter::new(&mut buf);

		// Residual 3 folds to 6, shifts to 7, which sits right below the
		// spillover: a regular 4-bit Rice codeword
		encoder.encode(3, 0, &mut writer).expect("value is in range");
		assert_eq!(writer.bit_position(), 4);
		// Residual 4 folds to 8, shifts to 9: escape codeword plus 16 raw bits
		encoder.encode(4, 0, &mut writer).expect("value is in range");
		assert_eq!(writer.bit_position(), 4 + 4 + 16);

		drop(writer);
		assert_eq!(get_bits(&buf, 0, 4).unwrap(), 0b0111);
		assert_eq!(get_bits(&buf, 4, 4).unwrap(), 0b0000, "the escape symbol is 0");
		assert_eq!(get_bits(&buf, 8, 16).unwrap(), 9, "the escaped residual keeps the +1 shift");
	}

	#[test]
	fn multi_escape_announces_the_payload_width() {
		// Residual excess over the threshold → expected escape payload width
		let expected = [
			(0u32, 2u32),
			(1, 2),
			(3, 2),
			(4, 4),
			(15, 4),
			(16, 6),
			(63, 6),
			(64, 8),
			(u32::MAX - 2, 32)
		];

		let encoder = encoder(CompressionMode::DiffMulti, 2, 2, 32);
		for (excess, payload_bits) in expected {
			let mut buf = [0u8; 16];
			let mut writer = BitWriter::new(&mut buf);

			// A residual of spillover + excess: data folds to exactly that
			let folded = 2 + excess;
			let data = if folded % 2 == 0 {
				folded / 2
			} else {
				(folded / 2 + 1).wrapping_neg()
			};
			encoder.encode(data, 0, &mut writer).expect("value is in range");

			let escape_symbol = 2 + payload_bits / 2 - 1;
			let (_, symbol_width) = GolombCoder::new(2).encode(escape_symbol);
			assert_eq!(
				writer.bit_position(),
				(symbol_width + payload_bits) as usize,
				"wrong stream length for excess {excess}"
			);
			drop(writer);
			assert_eq!(
				get_bits(&buf, symbol_width as usize, payload_bits).unwrap(),
				excess,
				"wrong payload for excess {excess}"
			);
		}
	}

	#[test]
	fn stuff_mode_writes_the_low_bits_verbatim() {
		let encoder = encoder(CompressionMode::Stuff, 12, 0, 16);
		let mut buf = [0u8; 4];
		let mut writer = BitWriter::new(&mut buf);

		// Values wider than the stuff width are masked, not rejected
		encoder.encode(0xFABC, 0, &mut writer).expect("stuff accepts any value");
		assert_eq!(writer.bit_position(), 12);
		drop(writer);
		assert_eq!(get_bits(&buf, 0, 12).unwrap(), 0xABC);
	}

	#[test]
	fn out_of_range_values_are_rejected_for_data_and_model() {
		let encoder = encoder(CompressionMode::ModelZero, 4, 16, 10);
		let mut writer = BitWriter::counting();

		assert!(matches!(
			encoder.encode(0x0800, 0, &mut writer),
			Err(CompressError::ValueOutOfRange { bits: 10, .. })
		));
		assert!(matches!(
			encoder.encode(0, 0x0400, &mut writer),
			Err(CompressError::ValueOutOfRange { .. })
		));
	}

	#[test]
	fn rounding_is_applied_before_prediction() {
		let mut settings = settings_for(CompressionMode::DiffZero);
		settings.round = 2;
		let encoder = FieldEncoder::configure(
			FieldParams {
				golomb_par: 8,
				spillover: 8
			},
			MaxUsedBits::SAFE.nc_imagette,
			"imagette",
			&settings
		)
		.expect("test parameters are valid");

		let mut buf = [0u8; 4];
		let mut writer = BitWriter::new(&mut buf);
		// 103 >> 2 == 100 >> 2, so the residual is zero: codeword for 1
		encoder.encode(103, 100, &mut writer).expect("value is in range");
		assert_eq!(writer.bit_position(), 4);
		drop(writer);
		assert_eq!(get_bits(&buf, 0, 4).unwrap(), 0b0001);
	}
}
