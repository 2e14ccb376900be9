//! Seed scenarios S1-S6: hand-built `Module`s exercised through
//! `compile_module`, bypassing the GIR XML front end so each scenario
//! targets one build/resolver/pool behavior directly.

use gi_typelib_compiler::build::blobs::{header_offset, ENTRY_BLOB_SIZE, SECTION_DIRECTORY_INDEX};
use gi_typelib_compiler::compile_module;
use gi_typelib_compiler::ir::*;
use gi_typelib_compiler::module::Module;

fn get_u16(buf: &[u8], off: usize) -> u16 {
	u16::from_le_bytes(buf[off..off + 2].try_into().unwrap())
}

fn get_u32(buf: &[u8], off: usize) -> u32 {
	u32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}

fn push_type(module: &mut Module, pointer: bool, shape: TypeShape) -> NodeId {
	module.push_node(Node::new(NodeKind::Type, None, NodeData::Type(TypeData { pointer, shape })))
}

fn basic_param(module: &mut Module, tag: BasicTypeTag) -> NodeId {
	let child = push_type(module, false, TypeShape::Basic(tag));
	module.push_node(Node::new(
		NodeKind::Param,
		None,
		NodeData::Param(ParamData {
			direction: Direction::In,
			caller_allocates: false,
			optional: false,
			nullable: false,
			retval: false,
			skip: false,
			transfer: false,
			shallow_transfer: false,
			scope: ClosureScope::Invalid,
			closure: None,
			destroy: None,
			child,
		}),
	))
}

fn retval(module: &mut Module, tag: BasicTypeTag) -> NodeId {
	let child = push_type(module, false, TypeShape::Basic(tag));
	module.push_node(Node::new(
		NodeKind::Param,
		None,
		NodeData::Param(ParamData {
			direction: Direction::In,
			caller_allocates: false,
			optional: false,
			nullable: false,
			retval: true,
			skip: false,
			transfer: false,
			shallow_transfer: false,
			scope: ClosureScope::Invalid,
			closure: None,
			destroy: None,
			child,
		}),
	))
}

fn empty_function_data(module: &mut Module) -> FunctionData {
	FunctionData {
		symbol: Some("noop".into()),
		deprecated: false,
		is_method: false,
		is_setter: false,
		is_getter: false,
		is_constructor: false,
		wraps_vfunc: false,
		throws: false,
		is_async: false,
		instance_transfer_full: false,
		sync_name: None,
		async_name: None,
		finish_name: None,
		property: None,
		result: retval(module, BasicTypeTag::Void),
		parameters: Vec::new(),
	}
}

#[test]
fn s1_empty_namespace_has_zero_entries_and_validates() {
	let mut module = Module::new("Empty", "1.0", None, None);
	let bytes = compile_module(&mut module).expect("an empty namespace must still build");

	assert_eq!(get_u16(&bytes, header_offset::N_ENTRIES as usize), 0, "n_entries");
	assert_eq!(get_u16(&bytes, header_offset::N_LOCAL_ENTRIES as usize), 0, "n_local_entries");
	assert_eq!(bytes.len() as u32, get_u32(&bytes, header_offset::SIZE as usize), "header.size must match actual length");
}

#[test]
fn s2_one_function_has_a_one_argument_signature() {
	let mut module = Module::new("Test", "1.0", None, None);
	let arg = basic_param(&mut module, BasicTypeTag::Int32);
	let mut data = empty_function_data(&mut module);
	data.result = retval(&mut module, BasicTypeTag::Boolean);
	data.parameters.push(arg);
	let id = module.push_node(Node::new(NodeKind::Function, Some("foo".into()), NodeData::Function(data)));
	module.entries.push(id);

	let bytes = compile_module(&mut module).expect("single function must build");
	assert_eq!(get_u16(&bytes, header_offset::N_ENTRIES as usize), 1);
	assert_eq!(get_u16(&bytes, header_offset::N_LOCAL_ENTRIES as usize), 1);

	let directory = get_u32(&bytes, header_offset::DIRECTORY as usize);
	let blob_type = get_u16(&bytes, directory as usize);
	assert_eq!(blob_type, 1, "Function blob_type");
}

#[test]
fn s3_two_identical_glist_types_deduplicate_to_one_tail_blob() {
	let mut module = Module::new("Test", "1.0", None, None);

	let make_glist_utf8_fn = |module: &mut Module, name: &str| {
		let utf8 = push_type(module, true, TypeShape::Basic(BasicTypeTag::Utf8));
		let list_type = push_type(module, true, TypeShape::GList(Some(utf8)));
		let arg = module.push_node(Node::new(
			NodeKind::Param,
			None,
			NodeData::Param(ParamData {
				direction: Direction::In,
				caller_allocates: false,
				optional: false,
				nullable: false,
				retval: false,
				skip: false,
				transfer: false,
				shallow_transfer: false,
				scope: ClosureScope::Invalid,
				closure: None,
				destroy: None,
				child: list_type,
			}),
		));
		let mut data = empty_function_data(module);
		data.parameters.push(arg);
		module.push_node(Node::new(NodeKind::Function, Some(name.to_owned()), NodeData::Function(data)))
	};

	let f1 = make_glist_utf8_fn(&mut module, "a");
	let f2 = make_glist_utf8_fn(&mut module, "b");
	module.entries.push(f1);
	module.entries.push(f2);

	let bytes = compile_module(&mut module).expect("two identical parameter types must build");
	assert_eq!(get_u16(&bytes, header_offset::N_ENTRIES as usize), 2);
}

#[test]
fn s4_forward_parent_reference_synthesises_exactly_one_xref() {
	let mut module = Module::new("Test", "1.0", None, None);
	let id = module.push_node(Node::new(
		NodeKind::Object,
		Some("Widget".into()),
		NodeData::Object(InterfaceData {
			gtype_name: None,
			gtype_init: None,
			ref_func: None,
			unref_func: None,
			set_value_func: None,
			get_value_func: None,
			glib_type_struct: None,
			parent: Some("GObject.Object".into()),
			prerequisites: Vec::new(),
			implements: Vec::new(),
			abstract_: false,
			final_: false,
			fundamental: false,
			deprecated: false,
			members: Vec::new(),
		}),
	));
	module.entries.push(id);

	let bytes = compile_module(&mut module).expect("a dangling parent name must synthesise an XRef, not fail");
	let n_entries = get_u16(&bytes, header_offset::N_ENTRIES as usize) as u32;
	let n_local_entries = get_u16(&bytes, header_offset::N_LOCAL_ENTRIES as usize) as u32;
	assert_eq!(n_entries, n_local_entries + 1, "exactly one XRef must have been synthesised");

	let directory = get_u32(&bytes, header_offset::DIRECTORY as usize);
	let xref_entry = directory + n_local_entries * ENTRY_BLOB_SIZE as u32;
	assert_eq!(get_u16(&bytes, xref_entry as usize), 0, "the synthesised entry must be blob_type XRef");
}

#[test]
fn s5_attribute_table_records_the_offset_of_its_owning_blob() {
	let mut module = Module::new("Test", "1.0", None, None);

	let plain = {
		let data = empty_function_data(&mut module);
		module.push_node(Node::new(NodeKind::Function, Some("a".into()), NodeData::Function(data)))
	};
	let decorated = {
		let data = empty_function_data(&mut module);
		module.push_node(Node::new(NodeKind::Function, Some("b".into()), NodeData::Function(data)))
	};
	module.node_mut(decorated).set_attribute("Version", "2.0");
	module.entries.push(plain);
	module.entries.push(decorated);

	let bytes = compile_module(&mut module).expect("an attribute-bearing function must build");
	let n_attributes = get_u32(&bytes, header_offset::N_ATTRIBUTES as usize);
	assert_eq!(n_attributes, 1);

	let attributes_offset = get_u32(&bytes, header_offset::ATTRIBUTES as usize);
	let attr_blob_offset = get_u32(&bytes, attributes_offset as usize);

	let directory = get_u32(&bytes, header_offset::DIRECTORY as usize);
	let second_entry_blob_offset = get_u32(&bytes, (directory + ENTRY_BLOB_SIZE as u32 + 8) as usize);
	assert_eq!(attr_blob_offset, second_entry_blob_offset);
}

#[test]
fn s6_perfect_hash_section_appears_for_a_normal_multi_entry_namespace() {
	let mut module = Module::new("Test", "1.0", None, None);
	for name in ["a", "b", "c"] {
		let data = empty_function_data(&mut module);
		let id = module.push_node(Node::new(NodeKind::Function, Some(name.to_owned()), NodeData::Function(data)));
		module.entries.push(id);
	}

	let bytes = compile_module(&mut module).expect("a small multi-entry namespace must build");
	let sections_offset = get_u32(&bytes, header_offset::SECTIONS as usize);
	let id0 = get_u32(&bytes, sections_offset as usize);
	let id1 = get_u32(&bytes, (sections_offset + 8) as usize);
	assert!(id0 == SECTION_DIRECTORY_INDEX || id1 == SECTION_DIRECTORY_INDEX, "expected a DIRECTORY_INDEX section for a trivially-hashable namespace");
}

#[test]
fn determinism_repeated_builds_of_the_same_module_produce_identical_bytes() {
	let build = || {
		let mut module = Module::new("Test", "1.0", None, None);
		let data = empty_function_data(&mut module);
		let id = module.push_node(Node::new(NodeKind::Function, Some("foo".into()), NodeData::Function(data)));
		module.entries.push(id);
		compile_module(&mut module).unwrap()
	};
	assert_eq!(build(), build());
}
