fn main() {
	println!("cargo:rerun-if-env-changed=TELEPRESS_VERSION");

	if option_env!("TELEPRESS_VERSION").is_none() {
		println!(
			"cargo:rustc-env=TELEPRESS_VERSION=v{}{}",
			env!("CARGO_PKG_VERSION"),
			option_env!("CARGO_PRIMARY_PACKAGE")
				.map(|_| "-custom")
				.unwrap_or_default()
		);
	}
}
