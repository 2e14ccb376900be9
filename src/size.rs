//! The two-pass size calculator (spec §4.3): `fixed_size` is the primary
//! blob's own width; `full_size` adds the recursive variable tail (strings,
//! children, attributes, extended type blobs) so the builder can pre-size
//! its output buffer once instead of growing on every write.

use crate::build::blobs::*;
use crate::build::writer::align4;
use crate::ir::{NodeData, NodeId, NodeKind, TypeShape};
use crate::module::Module;

pub fn fixed_size(kind: NodeKind) -> u32 {
	(match kind {
		NodeKind::Function => FUNCTION_BLOB_SIZE,
		NodeKind::Callback => CALLBACK_BLOB_SIZE,
		NodeKind::Struct | NodeKind::Boxed => STRUCT_BLOB_SIZE,
		NodeKind::Enum | NodeKind::Flags => ENUM_BLOB_SIZE,
		NodeKind::Object => OBJECT_BLOB_SIZE,
		NodeKind::Interface => INTERFACE_BLOB_SIZE,
		NodeKind::Constant => CONSTANT_BLOB_SIZE,
		NodeKind::Union => UNION_BLOB_SIZE,
		NodeKind::Param => ARG_BLOB_SIZE,
		NodeKind::Type => SIMPLE_TYPE_BLOB_SIZE as u16,
		NodeKind::Property => PROPERTY_BLOB_SIZE,
		NodeKind::Signal => SIGNAL_BLOB_SIZE,
		NodeKind::Value => VALUE_BLOB_SIZE,
		NodeKind::VFunc => VFUNC_BLOB_SIZE,
		NodeKind::Field => FIELD_BLOB_SIZE,
		NodeKind::XRef => 0,
	}) as u32
}

fn string_cost(s: &str) -> u32 {
	align4(s.len() as u32 + 1)
}

fn opt_string_cost(s: &Option<String>) -> u32 {
	s.as_deref().map(string_cost).unwrap_or(0)
}

fn attribute_cost(node: &crate::ir::Node) -> u32 {
	node.attributes
		.iter()
		.map(|(k, v)| ATTRIBUTE_BLOB_SIZE as u32 + string_cost(k) + string_cost(v))
		.sum()
}

/// Extended-type tail cost for a `Type` node, on top of its own
/// `SimpleTypeBlob` (spec §4.3, §4.5).
fn type_tail_cost(module: &Module, shape: &TypeShape) -> u32 {
	match shape {
		TypeShape::Basic(_) => 0,
		TypeShape::Array { element, .. } => ARRAY_TYPE_BLOB_SIZE + full_size(module, *element),
		TypeShape::GList(Some(elem)) | TypeShape::GSList(Some(elem)) => PARAM_TYPE_BLOB_SIZE_1 + full_size(module, *elem),
		TypeShape::GList(None) | TypeShape::GSList(None) => PARAM_TYPE_BLOB_SIZE_1,
		TypeShape::GHash(Some((k, v))) => PARAM_TYPE_BLOB_SIZE_2 + full_size(module, *k) + full_size(module, *v),
		TypeShape::GHash(None) => PARAM_TYPE_BLOB_SIZE_2,
		TypeShape::Interface(name) => INTERFACE_TYPE_BLOB_SIZE + string_cost(name),
		TypeShape::Error(domains) => {
			let n = domains.as_ref().map(|d| d.len()).unwrap_or(0);
			let names: u32 = domains.iter().flatten().map(|d| string_cost(d)).sum();
			error_type_blob_size(n) + names
		}
	}
}

/// Recursive full size of the subtree rooted at `id` (spec §4.3).
pub fn full_size(module: &Module, id: NodeId) -> u32 {
	let node = module.node(id);
	let mut total = fixed_size(node.kind) + opt_string_cost(&node.name) + attribute_cost(node);

	total += match &node.data {
		NodeData::Type(t) => type_tail_cost(module, &t.shape),
		NodeData::Param(p) => {
			opt_string_cost(&node.name) + full_size(module, p.child)
		}
		NodeData::Function(f) | NodeData::Callback(f) => {
			let mut s = SIGNATURE_BLOB_SIZE as u32;
			s += opt_string_cost(&f.symbol);
			s += opt_string_cost(&f.sync_name);
			s += opt_string_cost(&f.async_name);
			s += opt_string_cost(&f.finish_name);
			s += full_size(module, f.result);
			for p in &f.parameters {
				s += full_size(module, *p);
			}
			s
		}
		NodeData::Signal(sig) => {
			let mut s = SIGNATURE_BLOB_SIZE as u32;
			s += full_size(module, sig.result);
			for p in &sig.parameters {
				s += full_size(module, *p);
			}
			s
		}
		NodeData::VFunc(v) => {
			let mut s = SIGNATURE_BLOB_SIZE as u32;
			s += opt_string_cost(&v.invoker);
			s += opt_string_cost(&v.sync_name);
			s += opt_string_cost(&v.async_name);
			s += opt_string_cost(&v.finish_name);
			s += full_size(module, v.result);
			for p in &v.parameters {
				s += full_size(module, *p);
			}
			s
		}
		NodeData::Field(field) => match field.shape {
			crate::ir::FieldShape::Type(child) => full_size(module, child),
			crate::ir::FieldShape::Callback(child) => full_size(module, child),
		},
		NodeData::Property(p) => {
			opt_string_cost(&p.setter) + opt_string_cost(&p.getter) + full_size(module, p.child)
		}
		NodeData::Value(_) => 0,
		NodeData::Constant(c) => {
			let inline = align4(match &module.node(c.child).data {
				NodeData::Type(t) => inline_value_width(&t.shape),
				_ => 0,
			});
			inline + full_size(module, c.child)
		}
		NodeData::Struct(r) | NodeData::Boxed(r) => {
			let mut s = opt_string_cost(&r.gtype_name) + opt_string_cost(&r.gtype_init);
			s += opt_string_cost(&r.copy_func) + opt_string_cost(&r.free_func);
			for m in &r.members {
				s += full_size(module, *m);
			}
			s
		}
		NodeData::Union(u) => {
			let mut s = opt_string_cost(&u.gtype_name) + opt_string_cost(&u.gtype_init);
			s += opt_string_cost(&u.copy_func) + opt_string_cost(&u.free_func);
			for m in &u.members {
				s += full_size(module, *m);
			}
			for d in &u.discriminators {
				s += full_size(module, *d);
			}
			s
		}
		NodeData::Object(i) | NodeData::Interface(i) => {
			let mut s = opt_string_cost(&i.gtype_name) + opt_string_cost(&i.gtype_init);
			s += opt_string_cost(&i.ref_func) + opt_string_cost(&i.unref_func);
			s += opt_string_cost(&i.set_value_func) + opt_string_cost(&i.get_value_func);
			s += opt_string_cost(&i.glib_type_struct) + opt_string_cost(&i.parent);
			s += align4((i.prerequisites.len().max(i.implements.len()) * 2) as u32);
			for m in &i.members {
				s += full_size(module, *m);
			}
			s
		}
		NodeData::Enum(e) => {
			let mut s = opt_string_cost(&e.gtype_name) + opt_string_cost(&e.gtype_init) + opt_string_cost(&e.error_domain);
			for v in &e.values {
				s += full_size(module, *v);
			}
			for m in &e.methods {
				s += full_size(module, *m);
			}
			s
		}
		NodeData::XRef(x) => string_cost(&x.namespace),
	};

	total
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ir::{BasicTypeTag, Node, TypeData};

	fn push_type(module: &mut Module, shape: TypeShape) -> NodeId {
		module.push_node(Node::new(NodeKind::Type, None, NodeData::Type(TypeData { pointer: false, shape })))
	}

	#[test]
	fn fixed_size_matches_the_typelib_blob_table() {
		assert_eq!(fixed_size(NodeKind::Function), FUNCTION_BLOB_SIZE as u32);
		assert_eq!(fixed_size(NodeKind::Object), OBJECT_BLOB_SIZE as u32);
		assert_eq!(fixed_size(NodeKind::XRef), 0);
	}

	#[test]
	fn basic_type_node_has_no_variable_tail() {
		let mut module = Module::new("Test", "1.0", None, None);
		let id = push_type(&mut module, TypeShape::Basic(BasicTypeTag::Int32));
		assert_eq!(full_size(&module, id), fixed_size(NodeKind::Type));
	}

	#[test]
	fn interface_type_node_pays_for_its_name_string() {
		let mut module = Module::new("Test", "1.0", None, None);
		let id = push_type(&mut module, TypeShape::Interface("Gtk.Widget".into()));
		let expected = fixed_size(NodeKind::Type) + INTERFACE_TYPE_BLOB_SIZE + string_cost("Gtk.Widget");
		assert_eq!(full_size(&module, id), expected);
	}

	#[test]
	fn constant_full_size_includes_its_inline_value_and_type_tail() {
		let mut module = Module::new("Test", "1.0", None, None);
		let child = push_type(&mut module, TypeShape::Basic(BasicTypeTag::Int32));
		let constant = module.push_node(Node::new(
			NodeKind::Constant,
			Some("MAX".into()),
			NodeData::Constant(crate::ir::ConstantData { child, value: "1".into(), deprecated: false }),
		));
		let expected = fixed_size(NodeKind::Constant) + string_cost("MAX") + align4(4) + fixed_size(NodeKind::Type);
		assert_eq!(full_size(&module, constant), expected);
	}

	#[test]
	fn attribute_cost_is_counted_per_key_value_pair() {
		let mut module = Module::new("Test", "1.0", None, None);
		let id = push_type(&mut module, TypeShape::Basic(BasicTypeTag::Int32));
		module.node_mut(id).set_attribute("c:type", "gint");
		let expected = fixed_size(NodeKind::Type) + ATTRIBUTE_BLOB_SIZE as u32 + string_cost("c:type") + string_cost("gint");
		assert_eq!(full_size(&module, id), expected);
	}
}

fn inline_value_width(shape: &TypeShape) -> u32 {
	use crate::ir::types::BasicTypeTag::*;
	match shape {
		TypeShape::Basic(tag) => match tag {
			Void => 0,
			Boolean | Int8 | UInt8 => 1,
			Int16 | UInt16 => 2,
			Int32 | UInt32 | Float | GType => 4,
			Int64 | UInt64 | Double => 8,
			Utf8 | Filename => 4,
			Unichar => 4,
		},
		_ => 4,
	}
}
