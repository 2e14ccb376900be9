//! Compiles GObject Introspection (GIR) XML into the binary typelib format
//! consumed by language bindings at runtime (spec §1-§2).
//!
//! The pipeline is: [`parser`] turns a `.gir` document into an in-memory
//! [`ir`] tree held by a [`module::Module`]; [`build`] walks that tree twice
//! (sizing via [`size`], then emitting) and restarts itself whenever
//! [`resolver`] lazily grows the entry list; [`validate`] re-checks the
//! finished bytes before they leave the compiler.

pub mod build;
pub mod cli;
pub mod constant_value;
pub mod error;
pub mod ir;
pub mod module;
pub mod parser;
pub mod phf;
pub mod pool;
pub mod resolver;
pub mod size;
pub mod validate;

use std::path::Path;

use error::Result;
use module::Module;

/// End-to-end compile: parse `path` (and whatever it `<include>`s, searched
/// along `include_dirs`) and emit a finished, validated typelib.
pub fn compile_repository(path: &Path, include_dirs: &[std::path::PathBuf]) -> Result<Vec<u8>> {
	let mut module = parser::parse_repository(path, include_dirs)?;
	build::build_typelib(&mut module)
}

/// Compile an already-built [`Module`], skipping the XML front end entirely.
/// Used by tests that construct IR directly (spec §8 seed scenarios).
pub fn compile_module(module: &mut Module) -> Result<Vec<u8>> {
	build::build_typelib(module)
}
