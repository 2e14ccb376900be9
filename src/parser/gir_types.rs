//! Turns a `<type>`/`<array>` element into a `Type` node (spec §3.1, §4.5).
//! Builtin GIR type names map to [`BasicTypeTag`]; `GLib.List`, `GLib.SList`,
//! `GLib.HashTable`, `GLib.Array`/`PtrArray`/`ByteArray` and `GLib.Error` get
//! their dedicated [`TypeShape`] variants; anything else is an
//! `Interface` reference, resolved lazily at build time (spec §4.6).

use quick_xml::events::Event;

use crate::error::Result;
use crate::ir::{ArrayKind, ArrayLength, BasicTypeTag, Node, NodeData, NodeId, NodeKind, TypeData, TypeShape};
use crate::module::Module;
use crate::parser::{attr, attr_owned, Attrs, Parser};

/// Maps a GIR builtin type name to its basic tag, approximating the
/// platform-width aliases (`glong`, `gsize`, ...) onto the nearest 64-bit
/// basic tag — the typelib reader resolves those to a host's actual pointer
/// width at load time, which this offline compiler cannot observe, so it
/// picks the wider of the two rather than guess one.
fn basic_tag(name: &str) -> Option<BasicTypeTag> {
	Some(match name {
		"none" | "void" => BasicTypeTag::Void,
		"gboolean" => BasicTypeTag::Boolean,
		"gint8" => BasicTypeTag::Int8,
		"guint8" | "guchar" => BasicTypeTag::UInt8,
		"gint16" => BasicTypeTag::Int16,
		"guint16" => BasicTypeTag::UInt16,
		"gint" | "gint32" => BasicTypeTag::Int32,
		"guint" | "guint32" | "gunichar" => BasicTypeTag::UInt32,
		"glong" | "gint64" | "gssize" | "goffset" | "time_t" => BasicTypeTag::Int64,
		"gulong" | "guint64" | "gsize" => BasicTypeTag::UInt64,
		"gfloat" => BasicTypeTag::Float,
		"gdouble" | "long double" => BasicTypeTag::Double,
		"GType" => BasicTypeTag::GType,
		"utf8" | "gchar*" => BasicTypeTag::Utf8,
		"filename" => BasicTypeTag::Filename,
		_ => return None,
	})
}

pub(crate) fn push_type(module: &mut Module, pointer: bool, shape: TypeShape) -> NodeId {
	module.push_node(Node::new(NodeKind::Type, None, NodeData::Type(TypeData { pointer, shape })))
}

/// Parses a `<type>` or `<array>` element, given its opening tag's name,
/// whether it was self-closing, and its attributes. Consumes through the
/// matching end tag when it wasn't self-closing.
pub(crate) fn parse_type_element(parser: &mut Parser, module: &mut Module, tag: &[u8], is_empty: bool, attrs: &Attrs) -> Result<NodeId> {
	if tag == b"array" {
		return parse_array(parser, module, is_empty, attrs);
	}

	let raw_name = attr(attrs, "name").unwrap_or("none");
	let pointer = raw_name.ends_with('*') || attr(attrs, "c:type").map(|t| t.ends_with('*')).unwrap_or(false);
	let name = raw_name.trim_end_matches('*');

	match name {
		"GLib.List" => {
			let elem = if is_empty { None } else { parse_optional_nested_type(parser, module, b"type")? };
			return Ok(push_type(module, true, TypeShape::GList(elem)));
		}
		"GLib.SList" => {
			let elem = if is_empty { None } else { parse_optional_nested_type(parser, module, b"type")? };
			return Ok(push_type(module, true, TypeShape::GSList(elem)));
		}
		"GLib.HashTable" => {
			let kv = if is_empty { None } else { parse_key_value_nested_types(parser, module, b"type")? };
			return Ok(push_type(module, true, TypeShape::GHash(kv)));
		}
		"GLib.Error" => {
			if !is_empty {
				parser.skip_element(b"type")?;
			}
			return Ok(push_type(module, true, TypeShape::Error(None)));
		}
		_ => {}
	}

	if !is_empty {
		parser.skip_element(tag)?;
	}
	if let Some(t) = basic_tag(name) {
		return Ok(push_type(module, pointer, TypeShape::Basic(t)));
	}

	let qualified = attr_owned(attrs, "name").unwrap_or_else(|| name.to_owned());
	let resolved = module.resolve_alias(&qualified).to_owned();
	if let Some(t) = basic_tag(&resolved) {
		return Ok(push_type(module, pointer, TypeShape::Basic(t)));
	}
	if parser.non_introspectable.contains(&resolved) {
		return Ok(push_type(module, true, TypeShape::Basic(BasicTypeTag::Void)));
	}
	let effective_pointer = pointer || module.is_pointer_or_disguised(&resolved);
	Ok(push_type(module, effective_pointer, TypeShape::Interface(resolved)))
}

/// Builds a `Type` node straight from a bare type name, for the handful of
/// spots (`<discriminator type="...">`) where GIR gives a type reference as
/// a plain attribute rather than a nested `<type>` element.
pub(crate) fn type_from_name(module: &mut Module, name: &str) -> NodeId {
	if let Some(t) = basic_tag(name) {
		return push_type(module, false, TypeShape::Basic(t));
	}
	push_type(module, true, TypeShape::Interface(name.to_owned()))
}

/// `<array>`: either a GLib container (`name="GLib.PtrArray"` etc.) or a
/// plain C array, with `length`/`fixed-size`/`zero-terminated` attributes.
fn parse_array(parser: &mut Parser, module: &mut Module, is_empty: bool, attrs: &Attrs) -> Result<NodeId> {
	let kind = match attr(attrs, "name") {
		Some("GLib.Array") => ArrayKind::Array,
		Some("GLib.PtrArray") => ArrayKind::PtrArray,
		Some("GLib.ByteArray") => ArrayKind::ByteArray,
		_ => ArrayKind::C,
	};
	let length = if let Some(fixed) = attr(attrs, "fixed-size").and_then(|s| s.parse::<u32>().ok()) {
		ArrayLength::FixedSize(fixed)
	} else if let Some(idx) = attr(attrs, "length").and_then(|s| s.parse::<u16>().ok()) {
		ArrayLength::Param(idx)
	} else {
		ArrayLength::None
	};
	let zero_terminated = crate::parser::attr_bool(attrs, "zero-terminated", matches!(kind, ArrayKind::C));

	if is_empty {
		return Err(parser.parse_error("<array> is missing its element type"));
	}
	let element = parse_required_nested_type(parser, module, b"array")?;
	Ok(push_type(module, true, TypeShape::Array { element, kind, length, zero_terminated }))
}

/// Reads the nested `<type>`/`<array>` children of an already-open container
/// element up to its matching end tag, skipping anything else (e.g. `<doc>`).
fn read_nested_types(parser: &mut Parser, module: &mut Module, outer_tag: &[u8]) -> Result<Vec<NodeId>> {
	let mut found = Vec::new();
	loop {
		match parser.next_event()? {
			Event::Empty(e) => {
				let name = e.name().as_ref().to_vec();
				let attrs = parser.attrs_of(&e)?;
				if name == b"type" || name == b"array" {
					found.push(parse_type_element(parser, module, &name, true, &attrs)?);
				}
			}
			Event::Start(e) => {
				let name = e.name().as_ref().to_vec();
				let attrs = parser.attrs_of(&e)?;
				if name == b"type" || name == b"array" {
					found.push(parse_type_element(parser, module, &name, false, &attrs)?);
				} else {
					parser.skip_element(&name)?;
				}
			}
			Event::End(e) if e.name().as_ref() == outer_tag => break,
			Event::Eof => return Err(parser.parse_error("unexpected end of file while reading a nested type")),
			_ => {}
		}
	}
	Ok(found)
}

pub(crate) fn parse_required_nested_type(parser: &mut Parser, module: &mut Module, outer_tag: &[u8]) -> Result<NodeId> {
	read_nested_types(parser, module, outer_tag)?
		.into_iter()
		.next()
		.ok_or_else(|| parser.parse_error(format!("<{}> is missing its element type", String::from_utf8_lossy(outer_tag))))
}

pub(crate) fn parse_optional_nested_type(parser: &mut Parser, module: &mut Module, outer_tag: &[u8]) -> Result<Option<NodeId>> {
	Ok(read_nested_types(parser, module, outer_tag)?.into_iter().next())
}

fn parse_key_value_nested_types(parser: &mut Parser, module: &mut Module, outer_tag: &[u8]) -> Result<Option<(NodeId, NodeId)>> {
	let children = read_nested_types(parser, module, outer_tag)?;
	if children.len() >= 2 {
		Ok(Some((children[0], children[1])))
	} else {
		Ok(None)
	}
}
