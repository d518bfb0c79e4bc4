use std::borrow::Cow;
use std::env;
use std::fs;
use std::process::exit;

use getopts::{Matches, Options, ParsingStyle};
use log::info;

use telepress::{
	CompressionMode, CompressionSettings, DataType, FieldParams, ModelBuffers,
	TELEPRESS_VERSION_TAG, compress
};

fn main() {
	exit(match run() {
		Ok(_) => 0,
		Err(err) => {
			eprintln!("{err}");
			1
		}
	})
}

fn run() -> Result<(), Cow<'static, str>> {
	let mut options = Options::new();

	options
		.optflag(
			"h",
			"help",
			"Prints information about the accepted command line arguments and exits."
		)
		.optflag(
			"",
			"version",
			"Prints version and copyright information, then exits."
		)
		.optflag(
			"q",
			"quiet",
			"When enabled, the program will only print error messages, unless -h is specified."
		)
		.optflagmulti(
			"v",
			"verbose",
			"Increases the verbosity of the messages. Can be repeated several times."
		)
		.optopt(
			"m",
			"mode",
			"The compression mode to use.\n\
			Available modes: raw, model-zero, diff-zero, model-multi, diff-multi, stuff",
			"MODE"
		)
		.optopt(
			"g",
			"golomb-par",
			"The Golomb parameter of the imagette pixels, 1 to 63. A power of two \
			selects the faster Rice coding variant. In stuff mode this is the verbatim \
			bit width instead. The default value is 4.",
			"INTEGER"
		)
		.optopt(
			"s",
			"spill",
			"The spillover threshold: the first folded residual that is written escaped \
			instead of entropy coded. The default value is 16.",
			"INTEGER"
		)
		.optopt(
			"r",
			"round",
			"The number of low-order bits to discard before encoding, 0 to 2 for \
			imagette data. Nonzero values make the compression lossy. The default \
			value is 0.",
			"INTEGER"
		)
		.optopt(
			"",
			"model-value",
			"The weight of the prior model in the model update rule, 0 to 16. \
			The default value is 8.",
			"INTEGER"
		)
		.optopt(
			"",
			"model",
			"The model file for the model-zero and model-multi modes. Must have the \
			same size as the input file.",
			"FILE"
		)
		.optopt(
			"",
			"updated-model",
			"Where to write the updated model produced alongside a model-mode \
			compression, for use as the model of the next compression.",
			"FILE"
		)
		.parsing_style(ParsingStyle::StopAtFirstFree);

	match options.parse(env::args().skip(1)) {
		Ok(matches) => {
			if matches.opt_present("h") {
				print_header();
				println!();
				println!("Usage:");
				print!(
					"    {} [OPTION]... <input file> <output file>",
					env!("CARGO_BIN_NAME")
				);
				println!("{}", options.usage(""));
				println!(
					"The input file is read as packed 16-bit imagette samples in native byte order."
				);
				Ok(())
			} else if matches.opt_present("version") {
				print_header();
				Ok(())
			} else {
				let quiet_mode = matches.opt_present("q");

				stderrlog::new()
					.verbosity(1 + matches.opt_count("v"))
					.quiet(quiet_mode)
					.init()
					.ok();

				compress_file(&matches)
			}
		}
		Err(parse_error) => Err(format!("Command line parse error: {parse_error}").into())
	}
}

fn compress_file(matches: &Matches) -> Result<(), Cow<'static, str>> {
	let (input_path, output_path) = match matches.free.as_slice() {
		[input_path, output_path] => (input_path, output_path),
		_ => return Err("Expected an input file and an output file. Run with -h for help".into())
	};

	let settings = CompressionSettings {
		data_type: DataType::Imagette,
		mode: parse_mode(matches.opt_str("mode").as_deref().unwrap_or("diff-zero"))?,
		round: parse_integer(matches, "round")?.unwrap_or(0),
		model_value: parse_integer(matches, "model-value")?.unwrap_or(8),
		imagette: FieldParams {
			golomb_par: parse_integer(matches, "golomb-par")?.unwrap_or(4),
			spillover: parse_integer(matches, "spill")?.unwrap_or(16)
		},
		..CompressionSettings::default()
	};

	let input = fs::read(input_path)
		.map_err(|err| format!("Could not read the input file {input_path}: {err}"))?;

	let model = match matches.opt_str("model") {
		Some(model_path) => Some(
			fs::read(&model_path)
				.map_err(|err| format!("Could not read the model file {model_path}: {err}"))?
		),
		None => None
	};
	if matches.opt_present("updated-model") && model.is_none() {
		return Err("--updated-model only makes sense together with --model".into());
	}

	// Probe the exact bitstream size first, then pack into a buffer of whole
	// words that is exactly as large as needed
	let probe_model = match &model {
		Some(model) => ModelBuffers::Current(model),
		None => ModelBuffers::None
	};
	let bits = compress(&settings, &input, probe_model, None)
		.map_err(|err| format!("Could not compress {input_path}: {err}"))?;

	let mut output = vec![0u8; (bits as usize).div_ceil(32) * 4];
	let mut updated_model = vec![0u8; model.as_ref().map_or(0, Vec::len)];
	let real_model = match &model {
		Some(model) => {
			if matches.opt_present("updated-model") {
				ModelBuffers::Split {
					current: model,
					updated: &mut updated_model
				}
			} else {
				ModelBuffers::Current(model)
			}
		}
		None => ModelBuffers::None
	};
	compress(&settings, &input, real_model, Some(&mut output))
		.map_err(|err| format!("Could not compress {input_path}: {err}"))?;

	fs::write(output_path, &output)
		.map_err(|err| format!("Could not write the output file {output_path}: {err}"))?;

	if let Some(updated_model_path) = matches.opt_str("updated-model") {
		fs::write(&updated_model_path, &updated_model).map_err(|err| {
			format!("Could not write the updated model file {updated_model_path}: {err}")
		})?;
	}

	info!(
		"{} -> {}: {} samples, {bits} bits ({:.1}% of the input size)",
		input_path,
		output_path,
		input.len() / 2,
		output.len() as f64 / input.len().max(1) as f64 * 100.0
	);

	Ok(())
}

fn parse_mode(mode: &str) -> Result<CompressionMode, Cow<'static, str>> {
	Ok(match mode {
		"raw" => CompressionMode::Raw,
		"model-zero" => CompressionMode::ModelZero,
		"diff-zero" => CompressionMode::DiffZero,
		"model-multi" => CompressionMode::ModelMulti,
		"diff-multi" => CompressionMode::DiffMulti,
		"stuff" => CompressionMode::Stuff,
		_ => return Err(format!("Unknown compression mode: {mode}").into())
	})
}

fn parse_integer(matches: &Matches, option: &str) -> Result<Option<u32>, Cow<'static, str>> {
	matches
		.opt_str(option)
		.map(|value| {
			value
				.parse()
				.map_err(|err| format!("Invalid value for --{option}: {err}").into())
		})
		.transpose()
}

fn print_header() {
	println!("{TELEPRESS_VERSION_TAG}");
	println!("Lossless and near-lossless compression of imaging-instrument telemetry");
}
