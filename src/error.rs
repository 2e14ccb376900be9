use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// A location within a parsed GIR document, for diagnostics.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SourceLocation {
	pub file: Option<PathBuf>,
	pub line: usize,
	pub column: usize,
}

impl Display for SourceLocation {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match &self.file {
			Some(file) => write!(f, "{}:{}:{}", file.display(), self.line, self.column),
			None => write!(f, "<input>:{}:{}", self.line, self.column),
		}
	}
}

/// The single error type returned by this crate's fallible entry points.
///
/// Mirrors the taxonomy of the compiler driver: a parse failure, a dangling
/// cross-reference, an internal layout bug, a failed post-build validation,
/// or an I/O failure at the process boundary.
#[derive(Debug)]
pub enum CompileError {
	Parse {
		location: SourceLocation,
		message: String,
	},
	Resolution {
		context: Vec<String>,
		message: String,
	},
	Layout {
		node: String,
		message: String,
	},
	Validation {
		message: String,
	},
	Io(std::io::Error),
}

impl Display for CompileError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			CompileError::Parse { location, message } => {
				write!(f, "{location}: {message}")
			}
			CompileError::Resolution { context, message } => {
				if !context.is_empty() {
					write!(f, "{}: ", context.join("."))?;
				}
				write!(f, "{message}")
			}
			CompileError::Layout { node, message } => {
				write!(f, "internal error while laying out {node}: {message}")
			}
			CompileError::Validation { message } => write!(f, "invalid typelib: {message}"),
			CompileError::Io(err) => write!(f, "{err}"),
		}
	}
}

impl std::error::Error for CompileError {}

impl From<std::io::Error> for CompileError {
	fn from(value: std::io::Error) -> Self {
		CompileError::Io(value)
	}
}

pub type Result<T> = std::result::Result<T, CompileError>;
