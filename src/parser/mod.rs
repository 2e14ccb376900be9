//! The GIR XML front end (spec §4.11 / spec.md §6.2): a `quick-xml`-driven
//! recursive-descent reader over a stack of "current container" frames,
//! grounded in `girparser.c`'s element-handler table but expressed as
//! ordinary recursive functions instead of a `GMarkupParser` callback/state
//! table, since `quick_xml::Reader` hands back a flat event stream rather
//! than nested start/end callbacks.

mod elements;
mod gir_types;

use std::path::{Path, PathBuf};

use fxhash::FxHashMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{CompileError, Result, SourceLocation};
use crate::module::Module;

pub(crate) type Attrs = FxHashMap<String, String>;

/// Parses `path` and recursively resolves every `<include>` it names,
/// searching `include_dirs` in order (mirrors `girparser.c`'s `locate_gir`,
/// minus the system-data-directory fallbacks a standalone compiler has no
/// use for).
pub fn parse_repository(path: &Path, include_dirs: &[PathBuf]) -> Result<Module> {
	let mut cache: FxHashMap<(String, String), Module> = FxHashMap::default();
	parse_file(path, include_dirs, &mut cache)
}

fn parse_file(path: &Path, include_dirs: &[PathBuf], cache: &mut FxHashMap<(String, String), Module>) -> Result<Module> {
	let bytes = std::fs::read(path)?;
	let text = String::from_utf8(bytes).map_err(|e| CompileError::Parse {
		location: SourceLocation { file: Some(path.to_path_buf()), line: 1, column: 1 },
		message: format!("not valid UTF-8: {e}"),
	})?;
	parse_text(&text, Some(path.to_path_buf()), include_dirs, cache)
}

/// `Name-Version.gir` search order: explicit `include_dirs` (which already
/// holds `--includedir` values followed by `GI_GIR_PATH` entries, per
/// `SPEC_FULL.md` §3.8), in the order given.
fn locate_gir(include_dirs: &[PathBuf], name: &str, version: &str) -> Option<PathBuf> {
	let filename = format!("{name}-{version}.gir");
	for dir in include_dirs {
		let candidate = dir.join(&filename);
		if candidate.is_file() {
			return Some(candidate);
		}
	}
	None
}

pub(crate) struct Parser<'a> {
	reader: Reader<&'a [u8]>,
	text: &'a str,
	path: Option<PathBuf>,
	include_dirs: &'a [PathBuf],
	cache: &'a mut FxHashMap<(String, String), Module>,
	/// Names of records/classes/interfaces/unions/enums seen with
	/// `introspectable="0"`, so field types referencing them can degrade to
	/// `gpointer` (spec.md §6.2's closing sentence).
	pub non_introspectable: std::collections::HashSet<String>,
}

impl<'a> Parser<'a> {
	fn location(&self) -> SourceLocation {
		let consumed = self.reader.buffer_position() as usize;
		let mut line = 1usize;
		let mut column = 1usize;
		for ch in self.text[..consumed.min(self.text.len())].chars() {
			if ch == '\n' {
				line += 1;
				column = 1;
			} else {
				column += 1;
			}
		}
		SourceLocation { file: self.path.clone(), line, column }
	}

	fn parse_error(&self, message: impl Into<String>) -> CompileError {
		CompileError::Parse { location: self.location(), message: message.into() }
	}

	fn next_event(&mut self) -> Result<Event<'a>> {
		self.reader.read_event().map_err(|e| self.parse_error(e.to_string()))
	}

	/// Reads and discards everything up to and including the matching end
	/// tag for an already-open element, tracking same-name nesting (the
	/// "passthrough" state of `girparser.c`'s `STATE_PASSTHROUGH`).
	fn skip_element(&mut self, name: &[u8]) -> Result<()> {
		let mut depth = 1u32;
		loop {
			match self.next_event()? {
				Event::Start(e) if e.name().as_ref() == name => depth += 1,
				Event::End(e) if e.name().as_ref() == name => {
					depth -= 1;
					if depth == 0 {
						return Ok(());
					}
				}
				Event::Eof => return Err(self.parse_error(format!("unexpected end of file inside <{}>", String::from_utf8_lossy(name)))),
				_ => {}
			}
		}
	}

	pub(crate) fn attrs_of(&self, e: &BytesStart) -> Result<Attrs> {
		let mut map = Attrs::default();
		for attr in e.attributes() {
			let attr = attr.map_err(|err| self.parse_error(err.to_string()))?;
			let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
			let value = attr.unescape_value().map_err(|err| self.parse_error(err.to_string()))?.into_owned();
			map.insert(key, value);
		}
		Ok(map)
	}
}

pub(crate) fn attr<'h>(attrs: &'h Attrs, key: &str) -> Option<&'h str> {
	attrs.get(key).map(|s| s.as_str())
}

pub(crate) fn attr_bool(attrs: &Attrs, key: &str, default: bool) -> bool {
	match attrs.get(key).map(|s| s.as_str()) {
		Some("1") | Some("true") => true,
		Some("0") | Some("false") => false,
		_ => default,
	}
}

pub(crate) fn attr_owned(attrs: &Attrs, key: &str) -> Option<String> {
	attrs.get(key).cloned()
}

pub(crate) fn is_introspectable(attrs: &Attrs) -> bool {
	attr_bool(attrs, "introspectable", true) && !attrs.contains_key("shadowed-by")
}

fn parse_text(text: &str, path: Option<PathBuf>, include_dirs: &[PathBuf], cache: &mut FxHashMap<(String, String), Module>) -> Result<Module> {
	let mut reader = Reader::from_str(text);
	reader.config_mut().trim_text = true;
	let mut parser = Parser { reader, text, path, include_dirs, cache, non_introspectable: std::collections::HashSet::new() };

	loop {
		match parser.next_event()? {
			Event::Start(e) if e.name().as_ref() == b"repository" => {
				return elements::parse_repository_body(&mut parser);
			}
			Event::Eof => return Err(parser.parse_error("no <repository> element found")),
			_ => {}
		}
	}
}

pub(crate) fn resolve_include(parser: &mut Parser, name: &str, version: &str) -> Result<()> {
	let key = (name.to_owned(), version.to_owned());
	if parser.cache.contains_key(&key) {
		return Ok(());
	}
	let path = locate_gir(parser.include_dirs, name, version)
		.ok_or_else(|| parser.parse_error(format!("could not find GIR file '{name}-{version}.gir'; check --includedir or GI_GIR_PATH")))?;
	// Borrow-split: recursion needs its own cache/include_dirs, which are
	// shared, not the in-progress reader.
	let included = parse_file(&path, parser.include_dirs, parser.cache)?;
	parser.cache.insert(key, included);
	Ok(())
}
