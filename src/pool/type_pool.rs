//! The type pool (spec §4.5): deduplicates non-basic type descriptors by a
//! canonical textual key. Basic types never enter the pool — they are
//! encoded inline in their parent `SimpleTypeBlob`.

use fxhash::FxHashMap;

use crate::ir::{NodeId, TypeShape};
use crate::module::Module;

#[derive(Debug, Default)]
pub struct TypePool {
	offsets: FxHashMap<String, u32>,
}

impl TypePool {
	pub fn new() -> Self {
		TypePool::default()
	}

	pub fn get(&self, key: &str) -> Option<u32> {
		self.offsets.get(key).copied()
	}

	pub fn record(&mut self, key: String, offset: u32) {
		self.offsets.entry(key).or_insert(offset);
	}

	pub fn len(&self) -> usize {
		self.offsets.len()
	}
}

/// Textual canonicalisation of a `Type` node (spec §4.5). The parser already
/// qualifies cross-namespace interface names as `Namespace.Name` at parse
/// time (§4.11), so this does not re-run namespace resolution itself — two
/// interface references canonicalise equal exactly when the parser wrote the
/// same text, which is the dedup guarantee §4.5 and §8 property 3 require.
pub fn serialize_type(module: &Module, id: NodeId) -> String {
	let node = module.node(id);
	let data = match &node.data {
		crate::ir::NodeData::Type(t) => t,
		_ => panic!("serialize_type called on a non-Type node"),
	};
	let mut key = serialize_shape(module, &data.shape);
	if data.pointer {
		key.push('*');
	}
	key
}

fn serialize_shape(module: &Module, shape: &TypeShape) -> String {
	match shape {
		TypeShape::Basic(tag) => tag.canonical_name().to_owned(),
		TypeShape::Array { element, kind, length, zero_terminated } => {
			let elem = serialize_type(module, *element);
			match kind {
				crate::ir::ArrayKind::Array => format!("GArray<{elem}>"),
				crate::ir::ArrayKind::PtrArray => format!("GPtrArray<{elem}>"),
				crate::ir::ArrayKind::ByteArray => "GByteArray".to_owned(),
				crate::ir::ArrayKind::C => {
					let mut qualifiers = Vec::new();
					match length {
						crate::ir::ArrayLength::Param(idx) => qualifiers.push(format!("length={idx}")),
						crate::ir::ArrayLength::FixedSize(size) => qualifiers.push(format!("fixed-size={size}")),
						crate::ir::ArrayLength::None => {}
					}
					if *zero_terminated {
						qualifiers.push("zero-terminated=1".to_owned());
					}
					if qualifiers.is_empty() {
						format!("{elem}[]")
					} else {
						format!("{elem}[{}]", qualifiers.join(","))
					}
				}
			}
		}
		TypeShape::GList(elem) => format!("GList<{}>", elem.map(|e| serialize_type(module, e)).unwrap_or_default()),
		TypeShape::GSList(elem) => format!("GSList<{}>", elem.map(|e| serialize_type(module, e)).unwrap_or_default()),
		TypeShape::GHash(kv) => match kv {
			Some((k, v)) => format!("GHashTable<{},{}>", serialize_type(module, *k), serialize_type(module, *v)),
			None => "GHashTable<>".to_owned(),
		},
		TypeShape::Interface(name) => name.clone(),
		TypeShape::Error(domains) => match domains {
			Some(d) if !d.is_empty() => format!("GError<{}>", d.join(",")),
			_ => "GError".to_owned(),
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ir::{ArrayKind, ArrayLength, BasicTypeTag, Node, NodeKind, TypeData};

	fn push_type(module: &mut Module, pointer: bool, shape: TypeShape) -> NodeId {
		module.push_node(Node::new(NodeKind::Type, None, crate::ir::NodeData::Type(TypeData { pointer, shape })))
	}

	#[test]
	fn basic_types_serialize_to_their_canonical_name() {
		let mut module = Module::new("Test", "1.0", None, None);
		let id = push_type(&mut module, false, TypeShape::Basic(BasicTypeTag::Int32));
		assert_eq!(serialize_type(&module, id), "gint32");
	}

	#[test]
	fn pointer_flag_appends_a_star() {
		let mut module = Module::new("Test", "1.0", None, None);
		let id = push_type(&mut module, true, TypeShape::Interface("Gtk.Widget".into()));
		assert_eq!(serialize_type(&module, id), "Gtk.Widget*");
	}

	#[test]
	fn two_equal_descriptors_canonicalise_to_the_same_key() {
		let mut module = Module::new("Test", "1.0", None, None);
		let a = push_type(&mut module, true, TypeShape::Interface("Gtk.Widget".into()));
		let b = push_type(&mut module, true, TypeShape::Interface("Gtk.Widget".into()));
		assert_eq!(serialize_type(&module, a), serialize_type(&module, b));
	}

	#[test]
	fn c_array_encodes_its_length_qualifier() {
		let mut module = Module::new("Test", "1.0", None, None);
		let elem = push_type(&mut module, false, TypeShape::Basic(BasicTypeTag::UInt8));
		let arr = push_type(&mut module, true, TypeShape::Array { element: elem, kind: ArrayKind::C, length: ArrayLength::FixedSize(16), zero_terminated: false });
		assert_eq!(serialize_type(&module, arr), "guint8[fixed-size=16]");
	}

	#[test]
	fn record_and_get_round_trip_an_offset() {
		let mut pool = TypePool::new();
		assert_eq!(pool.get("Gtk.Widget*"), None);
		pool.record("Gtk.Widget*".to_owned(), 128);
		assert_eq!(pool.get("Gtk.Widget*"), Some(128));
	}

	#[test]
	fn record_keeps_the_first_offset_on_conflict() {
		let mut pool = TypePool::new();
		pool.record("x".to_owned(), 4);
		pool.record("x".to_owned(), 8);
		assert_eq!(pool.get("x"), Some(4));
	}
}
