fn main() {
	std::process::exit(gi_typelib_compiler::cli::run());
}
