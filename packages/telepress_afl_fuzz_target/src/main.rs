use telepress::{
	CompressionMode, CompressionSettings, DataType, FieldParams, ModelBuffers, compress, max_spill
};

fn main() {
	afl::fuzz!(|data: &[u8]| {
		// Each fuzz run has to be pretty fast. Just check that no crashes happen:
		// every input must either compress or come back as an error
		let Some((seed, input)) = data.split_first_chunk::<8>() else {
			return;
		};

		let golomb_par = 1 + u32::from(seed[2]) % 63;
		let settings = CompressionSettings {
			mode: CompressionMode::try_from(seed[0] % 6).expect("tag is in range"),
			data_type: DataType::try_from(seed[1] % 16).expect("tag is in range"),
			imagette: FieldParams {
				golomb_par,
				spillover: 2 + u32::from(seed[3]) % (max_spill(golomb_par) - 1)
			},
			round: u32::from(seed[4] % 4),
			model_value: u32::from(seed[5] % 17),
			..CompressionSettings::default()
		};

		let mut output = vec![0u8; input.len() * 40 + 64];
		let model = if settings.mode.is_model() {
			// The input doubles as its own model; the buffer sizes always match
			ModelBuffers::Current(input)
		} else {
			ModelBuffers::None
		};

		compress(&settings, input, model, Some(&mut output)).ok();
	})
}
