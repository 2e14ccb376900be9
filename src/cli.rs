//! The `compile-repository` command line surface (spec.md §6.3-§6.4),
//! grounded in `original_source/girepository/compiler/compiler.c`'s `main`.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser as ClapParser;

use crate::error::Result;

/// Compiles a GObject Introspection `.gir` file into the binary typelib
/// format consumed by language bindings at runtime.
#[derive(Debug, ClapParser)]
#[command(name = "compile-repository", version, about)]
pub struct Cli {
	/// Adds a directory to search for included `.gir` files, before `GI_GIR_PATH`.
	#[arg(long = "includedir", value_name = "DIR")]
	pub include_dirs: Vec<PathBuf>,

	/// Writes the typelib to FILE instead of standard output.
	#[arg(short = 'o', long = "output", value_name = "FILE")]
	pub output: Option<PathBuf>,

	/// Overrides the namespace's shared-library attribute; repeatable, joined with commas.
	#[arg(short = 'l', long = "shared-library", value_name = "FILE")]
	pub shared_library: Vec<String>,

	/// Enables debug-level logging.
	#[arg(long)]
	pub debug: bool,

	/// Enables verbose (info-level) logging.
	#[arg(long)]
	pub verbose: bool,

	/// The `.gir` file to compile.
	pub input: PathBuf,
}

/// `GI_GIR_PATH`: a platform-path-separator-delimited list of extra include
/// directories, searched after `--includedir` (spec.md §6.4).
fn gi_gir_path_dirs() -> Vec<PathBuf> {
	match std::env::var_os("GI_GIR_PATH") {
		Some(value) => std::env::split_paths(&value).collect(),
		None => Vec::new(),
	}
}

fn init_logging(cli: &Cli) {
	let filter = if cli.debug {
		"debug"
	} else if cli.verbose {
		"info"
	} else {
		"warn"
	};
	let _ = tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::new(filter)).with_writer(std::io::stderr).try_init();
}

/// Writes `bytes` to `path.tmp` and renames it over `path` only once the
/// write has fully succeeded, matching `write_out_typelib`'s atomic swap.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
	let tmp_path = path.with_extension(match path.extension() {
		Some(ext) => format!("{}.tmp", ext.to_string_lossy()),
		None => "tmp".to_string(),
	});
	let mut file = std::fs::File::create(&tmp_path)?;
	file.write_all(bytes)?;
	file.sync_all()?;
	drop(file);
	std::fs::rename(&tmp_path, path)?;
	Ok(())
}

/// Runs the CLI end to end, returning the process exit code.
pub fn run() -> i32 {
	let cli = Cli::parse();
	init_logging(&cli);

	let mut include_dirs = cli.include_dirs.clone();
	include_dirs.extend(gi_gir_path_dirs());

	match run_inner(&cli, &include_dirs) {
		Ok(()) => 0,
		Err(err) => {
			eprintln!("compile-repository: {err}");
			1
		}
	}
}

fn run_inner(cli: &Cli, include_dirs: &[PathBuf]) -> Result<()> {
	let mut module = crate::parser::parse_repository(&cli.input, include_dirs)?;

	if !cli.shared_library.is_empty() {
		module.shared_library = Some(cli.shared_library.join(","));
	}

	let bytes = crate::build::build_typelib(&mut module)?;

	match &cli.output {
		Some(path) => write_atomic(path, &bytes),
		None => {
			let mut stdout = std::io::stdout();
			stdout.write_all(&bytes)?;
			stdout.flush()?;
			Ok(())
		}
	}
}
