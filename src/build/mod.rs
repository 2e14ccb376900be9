//! The blob builder (spec §4.7) — the heart of the compiler. Walks a
//! module's entries, threading the primary (`offset`) and tail (`offset2`)
//! cursors through a pre-sized [`writer::Buffer`], and restarts from scratch
//! whenever cross-reference resolution grows the entry list (spec §3.5,
//! §4.6).

pub mod blobs;
pub mod context;
pub mod writer;

use fxhash::FxHashMap;

use crate::build::blobs::*;
use crate::build::context::ContextStack;
use crate::build::writer::{align4, Buffer};
use crate::error::Result;
use crate::ir::{ArrayLength, NodeData, NodeId, NodeKind, TypeShape};
use crate::module::Module;
use crate::pool::{type_pool::serialize_type, StringPool, TypePool};
use crate::resolver;
use crate::size::full_size;

/// Offsets assigned to nodes during one build attempt (spec §9: a side
/// table keyed by `NodeId` instead of a mutable field on the node itself).
pub type Offsets = FxHashMap<NodeId, u32>;

struct BuildState {
	buffer: Buffer,
	offset2: u32,
	strings: StringPool,
	types: TypePool,
	offsets: Offsets,
	attr_bearing: Vec<(NodeId, u32)>,
	context: ContextStack,
}

fn blob_type_of(kind: NodeKind) -> u16 {
	match kind {
		NodeKind::XRef => 0,
		NodeKind::Function => 1,
		NodeKind::Callback => 2,
		NodeKind::Struct => 3,
		NodeKind::Boxed => 4,
		NodeKind::Enum => 5,
		NodeKind::Flags => 6,
		NodeKind::Object => 7,
		NodeKind::Interface => 8,
		NodeKind::Constant => 9,
		NodeKind::Union => 10,
		NodeKind::Param => 11,
		NodeKind::Type => 12,
		NodeKind::Property => 13,
		NodeKind::Signal => 14,
		NodeKind::Value => 15,
		NodeKind::VFunc => 16,
		NodeKind::Field => 17,
	}
}

/// Top-level entry point: runs the build loop of spec §4.7/§3.5 to
/// completion, restarting whenever lazy XRef synthesis grows the entry
/// count, and returns the finished, validated typelib bytes.
pub fn build_typelib(module: &mut Module) -> Result<Vec<u8>> {
	let n_local_entries = module.entries.len() as u32;
	loop {
		let n_entries = module.entries.len() as u32;
		let mut state = BuildState::new();
		match state.run(module, n_entries, n_local_entries) {
			Ok(buffer) => return Ok(buffer.into_vec()),
			Err(flow) => match flow {
				FlowResult::Restart => {
					tracing::debug!(attempted_entries = n_entries, now = module.entries.len(), "restarting build: cross-reference resolution grew the entry list");
					continue;
				}
				FlowResult::Error(e) => return Err(e),
			},
		}
	}
}

enum FlowResult {
	Restart,
	Error(crate::error::CompileError),
}

impl From<crate::error::CompileError> for FlowResult {
	fn from(value: crate::error::CompileError) -> Self {
		FlowResult::Error(value)
	}
}

impl BuildState {
	fn new() -> Self {
		BuildState {
			buffer: Buffer::with_capacity(HEADER_SIZE),
			offset2: HEADER_SIZE,
			strings: StringPool::new(),
			types: TypePool::new(),
			offsets: Offsets::default(),
			attr_bearing: Vec::new(),
			context: ContextStack::new(),
		}
	}

	fn run(&mut self, module: &mut Module, n_entries: u32, n_local_entries: u32) -> std::result::Result<Buffer, FlowResult> {
		// Reserve the fixed section table right after the header.
		let sections_offset = HEADER_SIZE;
		self.offset2 = sections_offset + 16;
		self.buffer.ensure(self.offset2, 0);
		self.buffer.put_u32(sections_offset, SECTION_END);
		self.buffer.put_u32(sections_offset + 4, 0);
		self.buffer.put_u32(sections_offset + 8, SECTION_END);
		self.buffer.put_u32(sections_offset + 12, 0);

		let namespace_off = self.strings.intern(&mut self.buffer, &mut self.offset2, &module.name);
		let nsversion_off = self.strings.intern(&mut self.buffer, &mut self.offset2, &module.version);
		let shared_library_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, module.shared_library.as_deref());
		let c_prefix_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, module.c_prefix.as_deref());
		let dependencies_off = if module.dependencies.is_empty() {
			0
		} else {
			let joined = module.dependencies.join("|");
			self.strings.intern(&mut self.buffer, &mut self.offset2, &joined)
		};

		let directory = align4(self.offset2);
		self.offset2 = directory + n_entries * ENTRY_BLOB_SIZE as u32;
		self.buffer.ensure(self.offset2, 0);

		let entries_snapshot: Vec<NodeId> = module.entries[..n_entries as usize].to_vec();
		for (i, &id) in entries_snapshot.iter().enumerate() {
			let dir_off = directory + i as u32 * ENTRY_BLOB_SIZE as u32;
			let (kind, name) = {
				let node = module.node(id);
				(node.kind, node.name.clone())
			};
			let blob_type = blob_type_of(kind);
			let name_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, name.as_deref());
			self.buffer.put_u16(dir_off, blob_type);
			self.buffer.put_u16(dir_off + 2, if (i as u32) < n_local_entries { 1 } else { 0 });
			self.buffer.put_u32(dir_off + 4, name_off);

			if blob_type == 0 {
				let namespace = match &module.node(id).data {
					NodeData::XRef(x) => x.namespace.clone(),
					_ => unreachable!(),
				};
				let ns_off = self.strings.intern(&mut self.buffer, &mut self.offset2, &namespace);
				self.buffer.put_u32(dir_off + 8, ns_off);
				continue;
			}

			let reserved = full_size(module, id);
			let tail_start = align4(self.offset2);
			let entry_offset = tail_start;
			self.offset2 = entry_offset + crate::size::fixed_size(kind);
			self.buffer.ensure(self.offset2, 0);
			self.buffer.put_u32(dir_off + 8, entry_offset);
			self.offsets.insert(id, entry_offset);

			self.context.push_frame(name.clone().unwrap_or_default());
			let emitted = self.emit_node(module, id, entry_offset);
			self.context.pop_frame();
			emitted.map_err(FlowResult::from)?;

			if module.entries.len() as u32 > n_entries {
				return Err(FlowResult::Restart);
			}

			let used = self.offset2 - tail_start;
			if used > reserved {
				return Err(FlowResult::Error(crate::error::CompileError::Layout {
					node: name.unwrap_or_default(),
					message: format!("emission wrote {used} bytes, exceeding its {reserved}-byte reservation"),
				}));
			}
		}

		// Attribute table (spec §4.8).
		self.attr_bearing.sort_by_key(|&(_, offset)| offset);
		let n_attributes: u32 = self
			.attr_bearing
			.iter()
			.map(|&(id, _)| module.node(id).attributes.len() as u32)
			.sum();
		let attributes_offset = align4(self.offset2);
		self.offset2 = attributes_offset + n_attributes * ATTRIBUTE_BLOB_SIZE as u32;
		self.buffer.ensure(self.offset2, 0);
		let mut cursor = attributes_offset;
		for &(id, node_offset) in &self.attr_bearing {
			let node = module.node(id);
			for (key, value) in &node.attributes {
				let key_off = self.strings.intern(&mut self.buffer, &mut self.offset2, key);
				let value_off = self.strings.intern(&mut self.buffer, &mut self.offset2, value);
				self.buffer.put_u32(cursor, node_offset);
				self.buffer.put_u32(cursor + 4, key_off);
				self.buffer.put_u32(cursor + 8, value_off);
				cursor += ATTRIBUTE_BLOB_SIZE as u32;
			}
		}

		// Perfect-hash directory index (spec §4.9); best-effort, skipped on failure.
		let mut phf_builder = crate::phf::PerfectHashBuilder::new();
		for (i, &id) in entries_snapshot.iter().enumerate().take(n_local_entries as usize) {
			if let Some(name) = &module.node(id).name {
				phf_builder.add(name, i as u32);
			}
		}
		if let Some(prepared) = phf_builder.prepare() {
			let section_start = align4(self.offset2);
			self.offset2 = section_start + prepared.required_size();
			self.buffer.ensure(self.offset2, 0);
			prepared.pack(&mut self.buffer, section_start);
			self.buffer.put_u32(sections_offset, SECTION_DIRECTORY_INDEX);
			self.buffer.put_u32(sections_offset + 4, section_start);
		}

		let total_size = self.offset2;
		self.buffer.truncate(total_size);

		self.buffer.put_bytes(0, b"GOBJ\nMETADATA\r\n\x1a");
		self.buffer.put_u8(header_offset::MAJOR_VERSION, 4);
		self.buffer.put_u8(header_offset::MINOR_VERSION, 0);
		self.buffer.put_u16(header_offset::N_ENTRIES, n_entries as u16);
		self.buffer.put_u16(header_offset::N_LOCAL_ENTRIES, n_local_entries as u16);
		self.buffer.put_u32(header_offset::DIRECTORY, directory);
		self.buffer.put_u32(header_offset::N_ATTRIBUTES, n_attributes);
		self.buffer.put_u32(header_offset::ATTRIBUTES, attributes_offset);
		self.buffer.put_u32(header_offset::DEPENDENCIES, dependencies_off);
		self.buffer.put_u32(header_offset::SIZE, total_size);
		self.buffer.put_u32(header_offset::NAMESPACE, namespace_off);
		self.buffer.put_u32(header_offset::NSVERSION, nsversion_off);
		self.buffer.put_u32(header_offset::SHARED_LIBRARY, shared_library_off);
		self.buffer.put_u32(header_offset::C_PREFIX, c_prefix_off);
		self.buffer.put_u16(header_offset::ENTRY_BLOB_SIZE, ENTRY_BLOB_SIZE);
		self.buffer.put_u16(header_offset::FUNCTION_BLOB_SIZE, FUNCTION_BLOB_SIZE);
		self.buffer.put_u16(header_offset::CALLBACK_BLOB_SIZE, CALLBACK_BLOB_SIZE);
		self.buffer.put_u16(header_offset::SIGNAL_BLOB_SIZE, SIGNAL_BLOB_SIZE);
		self.buffer.put_u16(header_offset::VFUNC_BLOB_SIZE, VFUNC_BLOB_SIZE);
		self.buffer.put_u16(header_offset::ARG_BLOB_SIZE, ARG_BLOB_SIZE);
		self.buffer.put_u16(header_offset::PROPERTY_BLOB_SIZE, PROPERTY_BLOB_SIZE);
		self.buffer.put_u16(header_offset::FIELD_BLOB_SIZE, FIELD_BLOB_SIZE);
		self.buffer.put_u16(header_offset::VALUE_BLOB_SIZE, VALUE_BLOB_SIZE);
		self.buffer.put_u16(header_offset::CONSTANT_BLOB_SIZE, CONSTANT_BLOB_SIZE);
		self.buffer.put_u16(header_offset::ERROR_DOMAIN_BLOB_SIZE, ERROR_DOMAIN_BLOB_SIZE);
		self.buffer.put_u16(header_offset::ATTRIBUTE_BLOB_SIZE, ATTRIBUTE_BLOB_SIZE);
		self.buffer.put_u16(header_offset::SIGNATURE_BLOB_SIZE, SIGNATURE_BLOB_SIZE);
		self.buffer.put_u16(header_offset::ENUM_BLOB_SIZE, ENUM_BLOB_SIZE);
		self.buffer.put_u16(header_offset::STRUCT_BLOB_SIZE, STRUCT_BLOB_SIZE);
		self.buffer.put_u16(header_offset::OBJECT_BLOB_SIZE, OBJECT_BLOB_SIZE);
		self.buffer.put_u16(header_offset::INTERFACE_BLOB_SIZE, INTERFACE_BLOB_SIZE);
		self.buffer.put_u16(header_offset::UNION_BLOB_SIZE, UNION_BLOB_SIZE);
		self.buffer.put_u32(header_offset::SECTIONS, sections_offset);

		crate::validate::validate(&self.buffer).map_err(FlowResult::from)?;

		Ok(std::mem::take(&mut self.buffer))
	}

	fn emit_node(&mut self, module: &mut Module, id: NodeId, at: u32) -> Result<()> {
		// Split the borrow: read what we need from the node before recursing,
		// since children emission needs `&mut Module` too.
		let kind = module.node(id).kind;
		match kind {
			NodeKind::Function | NodeKind::Callback => {
				let entries = module.entries.clone();
				self.emit_function(module, id, &entries, at)?
			}
			NodeKind::Struct | NodeKind::Boxed => self.emit_record(module, id, at)?,
			NodeKind::Union => self.emit_union(module, id, at)?,
			NodeKind::Enum | NodeKind::Flags => self.emit_enum(module, id, at)?,
			NodeKind::Object | NodeKind::Interface => self.emit_interface_like(module, id, at)?,
			NodeKind::Constant => self.emit_constant(module, id, at)?,
			other => panic!("{other:?} cannot be a top-level entry"),
		}
		self.attr_bearing.push((id, at));
		Ok(())
	}

	fn emit_type_at(&mut self, module: &mut Module, type_id: NodeId, at: u32) -> Result<()> {
		let shape_is_basic;
		let (pointer, tag) = {
			let data = match &module.node(type_id).data {
				NodeData::Type(t) => t,
				_ => panic!("expected a Type node"),
			};
			shape_is_basic = data.shape.is_basic();
			(data.pointer, if let TypeShape::Basic(tag) = data.shape { Some(tag) } else { None })
		};

		if shape_is_basic {
			let mut word = tag.unwrap().blob_tag() as u32;
			if pointer {
				word |= 1 << 30;
			}
			self.buffer.put_u32(at, word);
		} else {
			let key = serialize_type(module, type_id);
			let ext_off = match self.types.get(&key) {
				Some(off) => off,
				None => {
					let off = self.allocate_extended_type(module, type_id)?;
					self.types.record(key, off);
					off
				}
			};
			let mut word = ext_off | SIMPLE_TYPE_FLAG_OFFSET;
			if pointer {
				word |= 1 << 30;
			}
			self.buffer.put_u32(at, word);
		}
		self.attr_bearing.push((type_id, at));
		Ok(())
	}

	fn allocate_extended_type(&mut self, module: &mut Module, type_id: NodeId) -> Result<u32> {
		let shape = match &module.node(type_id).data {
			NodeData::Type(t) => t.shape.clone(),
			_ => panic!("expected a Type node"),
		};
		match &shape {
			TypeShape::Array { element, kind, length, zero_terminated } => {
				let element = *element;
				let kind = *kind;
				let length = *length;
				let zero_terminated = *zero_terminated;
				let start = align4(self.offset2);
				self.offset2 = start + ARRAY_TYPE_BLOB_SIZE;
				self.buffer.ensure(self.offset2, 0);
				let mut header = match kind {
					crate::ir::ArrayKind::C => 0u32,
					crate::ir::ArrayKind::Array => 1,
					crate::ir::ArrayKind::PtrArray => 2,
					crate::ir::ArrayKind::ByteArray => 3,
				};
				let length_field = match length {
					ArrayLength::Param(idx) => {
						header |= 1 << 3;
						idx as u32
					}
					ArrayLength::FixedSize(size) => {
						header |= 1 << 4;
						size
					}
					ArrayLength::None => 0,
				};
				if zero_terminated {
					header |= 1 << 2;
				}
				self.buffer.put_u32(start, header);
				self.buffer.put_u32(start + 4, length_field);
				self.emit_type_at(module, element, start + 8)?;
				Ok(start)
			}
			TypeShape::GList(elem) | TypeShape::GSList(elem) => {
				let elem = *elem;
				let start = align4(self.offset2);
				self.offset2 = start + PARAM_TYPE_BLOB_SIZE_1;
				self.buffer.ensure(self.offset2, 0);
				self.buffer.put_u32(start, 0);
				if let Some(e) = elem {
					self.emit_type_at(module, e, start + 4)?;
				}
				Ok(start)
			}
			TypeShape::GHash(kv) => {
				let kv = *kv;
				let start = align4(self.offset2);
				self.offset2 = start + PARAM_TYPE_BLOB_SIZE_2;
				self.buffer.ensure(self.offset2, 0);
				self.buffer.put_u32(start, 0);
				if let Some((k, v)) = kv {
					self.emit_type_at(module, k, start + 4)?;
					self.emit_type_at(module, v, start + 8)?;
				}
				Ok(start)
			}
			TypeShape::Interface(name) => {
				let name = name.clone();
				let start = align4(self.offset2);
				self.offset2 = start + INTERFACE_TYPE_BLOB_SIZE;
				self.buffer.ensure(self.offset2, 0);
				self.buffer.put_u32(start, 0);
				let idx = resolver::find_entry(module, &name, self.context.frames())?;
				self.buffer.put_u16(start + 4, idx as u16);
				Ok(start)
			}
			TypeShape::Error(domains) => {
				let domains = domains.clone();
				let n = domains.as_ref().map(|d| d.len()).unwrap_or(0);
				let start = align4(self.offset2);
				self.offset2 = start + error_type_blob_size(n);
				self.buffer.ensure(self.offset2, 0);
				self.buffer.put_u32(start, n as u32);
				if let Some(ds) = &domains {
					for (i, d) in ds.iter().enumerate() {
						let off = self.strings.intern(&mut self.buffer, &mut self.offset2, d);
						self.buffer.put_u32(start + 4 + i as u32 * 4, off);
					}
				}
				Ok(start)
			}
			TypeShape::Basic(_) => unreachable!("basic types never allocate an extended blob"),
		}
	}

	fn emit_param(&mut self, module: &mut Module, id: NodeId, at: u32) -> Result<()> {
		let (name, child, direction, caller_allocates, optional, nullable, retval, skip, transfer, shallow_transfer, scope, closure, destroy);
		{
			let node = module.node(id);
			name = node.name.clone();
			let data = match &node.data {
				NodeData::Param(p) => p,
				_ => panic!("expected a Param node"),
			};
			child = data.child;
			direction = data.direction;
			caller_allocates = data.caller_allocates;
			optional = data.optional;
			nullable = data.nullable;
			retval = data.retval;
			skip = data.skip;
			transfer = data.transfer;
			shallow_transfer = data.shallow_transfer;
			scope = data.scope;
			closure = data.closure;
			destroy = data.destroy;
		}
		let name_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, name.as_deref());
		self.buffer.put_u32(at, name_off);

		let mut flags = match direction {
			crate::ir::Direction::In => 0u32,
			crate::ir::Direction::Out => 1,
			crate::ir::Direction::InOut => 2,
		};
		if caller_allocates {
			flags |= 1 << 2;
		}
		if optional {
			flags |= 1 << 3;
		}
		if nullable {
			flags |= 1 << 4;
		}
		if retval {
			flags |= 1 << 5;
		}
		if skip {
			flags |= 1 << 6;
		}
		if transfer {
			flags |= 1 << 7;
		}
		if shallow_transfer {
			flags |= 1 << 8;
		}
		let scope_bits = match scope {
			crate::ir::ClosureScope::Invalid => 0u32,
			crate::ir::ClosureScope::Call => 1,
			crate::ir::ClosureScope::Async => 2,
			crate::ir::ClosureScope::Notified => 3,
			crate::ir::ClosureScope::Forever => 4,
		};
		flags |= scope_bits << 9;
		self.buffer.put_u32(at + 4, flags);
		self.buffer.put_u16(at + 8, closure.unwrap_or(0xFFFF));
		self.buffer.put_u16(at + 10, destroy.unwrap_or(0xFFFF));
		self.emit_type_at(module, child, at + 12)?;
		self.attr_bearing.push((id, at));
		Ok(())
	}

	/// Allocates a `SignatureBlob` plus trailing `ArgBlob`s in the tail,
	/// writing the result's type into the signature's own return-type slot
	/// and recording the result `Param` as an attribute bearer at the
	/// signature's offset, since it owns no primary blob of its own
	/// (spec §4.7).
	fn emit_signature(&mut self, module: &mut Module, result: NodeId, parameters: &[NodeId], throws: bool) -> Result<u32> {
		let sig_off = align4(self.offset2);
		self.offset2 = sig_off + SIGNATURE_BLOB_SIZE as u32;
		self.offset2 += parameters.len() as u32 * ARG_BLOB_SIZE as u32;
		self.buffer.ensure(self.offset2, 0);
		let args_off = sig_off + SIGNATURE_BLOB_SIZE as u32;

		let result_child = match &module.node(result).data {
			NodeData::Param(p) => p.child,
			_ => panic!("expected the callable's result to be a Param node"),
		};
		self.emit_type_at(module, result_child, sig_off)?;

		let mut flags = 0u16;
		if throws {
			flags |= 1;
		}
		let result_data = match &module.node(result).data {
			NodeData::Param(p) => (p.nullable, p.transfer, p.skip),
			_ => unreachable!(),
		};
		if result_data.0 {
			flags |= 1 << 1;
		}
		if result_data.1 {
			flags |= 1 << 2;
		}
		if result_data.2 {
			flags |= 1 << 3;
		}
		self.buffer.put_u16(sig_off + 4, parameters.len() as u16);
		self.buffer.put_u16(sig_off + 6, flags);

		self.attr_bearing.push((result, sig_off));

		for (i, &p) in parameters.iter().enumerate() {
			let at = args_off + i as u32 * ARG_BLOB_SIZE as u32;
			self.emit_param(module, p, at)?;
		}
		Ok(sig_off)
	}

	fn emit_function(&mut self, module: &mut Module, id: NodeId, siblings: &[NodeId], at: u32) -> Result<()> {
		let (symbol, deprecated, is_method, is_setter, is_getter, is_constructor, wraps_vfunc, throws, is_async, result, parameters, sync_name, async_name, finish_name);
		{
			let data = match &module.node(id).data {
				NodeData::Function(f) | NodeData::Callback(f) => f,
				_ => panic!("expected Function/Callback"),
			};
			symbol = data.symbol.clone();
			deprecated = data.deprecated;
			is_method = data.is_method;
			is_setter = data.is_setter;
			is_getter = data.is_getter;
			is_constructor = data.is_constructor;
			wraps_vfunc = data.wraps_vfunc;
			throws = data.throws;
			is_async = data.is_async;
			result = data.result;
			parameters = data.parameters.clone();
			sync_name = data.sync_name.clone();
			async_name = data.async_name.clone();
			finish_name = data.finish_name.clone();
		}

		let symbol_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, symbol.as_deref());
		let name = module.node(id).name.clone();
		let name_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, name.as_deref());

		let mut flags = 0u32;
		if deprecated {
			flags |= 1;
		}
		if is_method {
			flags |= 1 << 1;
		}
		if is_setter {
			flags |= 1 << 2;
		}
		if is_getter {
			flags |= 1 << 3;
		}
		if is_constructor {
			flags |= 1 << 4;
		}
		if wraps_vfunc {
			flags |= 1 << 5;
		}
		if is_async {
			flags |= 1 << 6;
		}

		self.buffer.put_u32(at, name_off);
		self.buffer.put_u32(at + 4, flags);
		self.buffer.put_u32(at + 8, symbol_off);

		let sig_off = self.emit_signature(module, result, &parameters, throws)?;
		self.buffer.put_u32(at + 12, sig_off);

		let sibling = if is_async { async_name.as_deref().or(finish_name.as_deref()) } else { sync_name.as_deref() };
		let sibling_index = match sibling {
			Some(s) => resolver::index_of_member(module, siblings, s).unwrap_or(ASYNC_SENTINEL),
			None => ASYNC_SENTINEL,
		};
		self.buffer.put_u16(at + 16, sibling_index);
		self.buffer.put_u16(at + 18, 0);
		self.buffer.put_u32(at + 20, 0);
		Ok(())
	}

	fn emit_field(&mut self, module: &mut Module, id: NodeId, at: u32) -> Result<()> {
		let (readable, writable, bits, struct_offset, shape);
		{
			let data = match &module.node(id).data {
				NodeData::Field(f) => f,
				_ => panic!("expected Field"),
			};
			readable = data.readable;
			writable = data.writable;
			bits = data.bits;
			struct_offset = data.struct_offset;
			shape = match data.shape {
				crate::ir::FieldShape::Type(t) => (false, t),
				crate::ir::FieldShape::Callback(c) => (true, c),
			};
		}
		let name = module.node(id).name.clone();
		let name_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, name.as_deref());
		let mut flags = 0u32;
		if readable {
			flags |= 1;
		}
		if writable {
			flags |= 1 << 1;
		}
		if shape.0 {
			flags |= 1 << 2;
		}
		flags |= (bits.unwrap_or(0) as u32) << 8;
		self.buffer.put_u32(at, name_off);
		self.buffer.put_u32(at + 4, flags);
		self.buffer.put_u16(at + 8, struct_offset.map(|o| o as u16).unwrap_or(STRUCT_OFFSET_UNKNOWN));
		if shape.0 {
			let callback_off = align4(self.offset2);
			self.offset2 = callback_off + CALLBACK_BLOB_SIZE as u32;
			self.buffer.ensure(self.offset2, 0);
			self.buffer.put_u32(at + 12, callback_off);
			self.emit_function(module, shape.1, &[], callback_off)?;
			self.attr_bearing.push((shape.1, callback_off));
		} else {
			self.emit_type_at(module, shape.1, at + 12)?;
		}
		Ok(())
	}

	fn emit_property(&mut self, module: &mut Module, id: NodeId, owner_members: &[NodeId], at: u32) -> Result<()> {
		let (readable, writable, construct, construct_only, transfer, shallow_transfer, setter, getter, child);
		{
			let data = match &module.node(id).data {
				NodeData::Property(p) => p,
				_ => panic!("expected Property"),
			};
			readable = data.readable;
			writable = data.writable;
			construct = data.construct;
			construct_only = data.construct_only;
			transfer = data.transfer;
			shallow_transfer = data.shallow_transfer;
			setter = data.setter.clone();
			getter = data.getter.clone();
			child = data.child;
		}
		let name = module.node(id).name.clone();
		let name_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, name.as_deref());
		let mut flags = 0u32;
		if readable {
			flags |= 1;
		}
		if writable {
			flags |= 1 << 1;
		}
		if construct {
			flags |= 1 << 2;
		}
		if construct_only {
			flags |= 1 << 3;
		}
		if transfer {
			flags |= 1 << 4;
		}
		if shallow_transfer {
			flags |= 1 << 5;
		}
		self.buffer.put_u32(at, name_off);
		self.buffer.put_u32(at + 4, flags);
		let setter_idx = setter.as_deref().and_then(|s| resolver::index_of_member(module, owner_members, s)).unwrap_or(ACCESSOR_SENTINEL);
		let getter_idx = getter.as_deref().and_then(|s| resolver::index_of_member(module, owner_members, s)).unwrap_or(ACCESSOR_SENTINEL);
		self.buffer.put_u16(at + 8, setter_idx);
		self.buffer.put_u16(at + 10, getter_idx);
		self.emit_type_at(module, child, at + 12)?;
		Ok(())
	}

	fn emit_value(&mut self, module: &mut Module, id: NodeId, at: u32) -> Result<()> {
		let (value, deprecated);
		{
			let data = match &module.node(id).data {
				NodeData::Value(v) => v,
				_ => panic!("expected Value"),
			};
			value = data.value;
			deprecated = data.deprecated;
		}
		let name = module.node(id).name.clone();
		let name_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, name.as_deref());
		self.buffer.put_u32(at, name_off);
		self.buffer.put_i32(at + 4, value as i32);
		let mut flags = if value >= 0 { 1u32 } else { 0 };
		if deprecated {
			flags |= 1 << 1;
		}
		self.buffer.put_u32(at + 8, flags);
		Ok(())
	}

	fn emit_constant(&mut self, module: &mut Module, id: NodeId, at: u32) -> Result<()> {
		let (child, value_text, deprecated);
		{
			let data = match &module.node(id).data {
				NodeData::Constant(c) => c,
				_ => panic!("expected Constant"),
			};
			child = data.child;
			value_text = data.value.clone();
			deprecated = data.deprecated;
		}
		let name = module.node(id).name.clone();
		let name_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, name.as_deref());
		self.buffer.put_u32(at, name_off);
		self.buffer.put_u32(at + 4, if deprecated { 1 } else { 0 });

		let tag = match &module.node(child).data {
			NodeData::Type(t) => match t.shape {
				TypeShape::Basic(tag) => Some(tag),
				_ => None,
			},
			_ => None,
		};
		self.offset2 = align4(self.offset2);
		let value_offset = self.offset2;
		crate::constant_value::write_value(&mut self.buffer, &mut self.offset2, tag, &value_text);
		self.buffer.put_u32(at + 8, value_offset);
		self.emit_type_at(module, child, at + 12)?;
		Ok(())
	}

	/// `free_func` is tracked on [`crate::ir::RecordData`] (the IR keeps every
	/// field the GIR source carries) but has no slot in the fixed 32-byte
	/// `StructBlob`/`BoxedBlob` this emits — the spec's blob width forces the
	/// same compromise the real format makes, where only `copy_func` survives
	/// into the binary and readers fall back to plain `g_free` otherwise.
	fn emit_record(&mut self, module: &mut Module, id: NodeId, at: u32) -> Result<()> {
		let (gtype_name, gtype_init, alignment, size, copy_func, deprecated, members, flags);
		{
			let data = match &module.node(id).data {
				NodeData::Struct(r) | NodeData::Boxed(r) => r,
				_ => panic!("expected Struct/Boxed"),
			};
			gtype_name = data.gtype_name.clone();
			gtype_init = data.gtype_init.clone();
			alignment = data.alignment;
			size = data.size;
			copy_func = data.copy_func.clone();
			deprecated = data.deprecated;
			members = data.members.clone();
			flags = data.flags;
		}
		let name = module.node(id).name.clone();
		let name_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, name.as_deref());
		let gtype_name_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, gtype_name.as_deref());
		let gtype_init_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, gtype_init.as_deref());

		let (fields, methods): (Vec<NodeId>, Vec<NodeId>) = members.iter().partition(|&&m| module.node(m).kind == NodeKind::Field);

		let mut record_flags = flags.bits() as u32;
		if deprecated {
			record_flags |= 1 << 16;
		}
		self.buffer.put_u32(at, name_off);
		self.buffer.put_u32(at + 4, record_flags);
		self.buffer.put_u32(at + 8, gtype_name_off);
		self.buffer.put_u32(at + 12, gtype_init_off);
		self.buffer.put_u16(at + 16, fields.len() as u16);
		self.buffer.put_u16(at + 18, methods.len() as u16);
		self.buffer.put_u32(at + 20, size);
		self.buffer.put_u32(at + 24, alignment);
		let copy_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, copy_func.as_deref());
		self.buffer.put_u32(at + 28, copy_off);

		for field in &fields {
			let field_off = align4(self.offset2);
			self.offset2 = field_off + FIELD_BLOB_SIZE as u32;
			self.buffer.ensure(self.offset2, 0);
			self.emit_field(module, *field, field_off)?;
			self.attr_bearing.push((*field, field_off));
		}
		for method in &methods {
			let method_off = align4(self.offset2);
			self.offset2 = method_off + FUNCTION_BLOB_SIZE as u32;
			self.buffer.ensure(self.offset2, 0);
			self.emit_function(module, *method, &methods, method_off)?;
			self.attr_bearing.push((*method, method_off));
		}
		Ok(())
	}

	fn emit_union(&mut self, module: &mut Module, id: NodeId, at: u32) -> Result<()> {
		let (gtype_name, gtype_init, alignment, size, copy_func, members, discriminators, discriminator_type, discriminator_offset);
		{
			let data = match &module.node(id).data {
				NodeData::Union(u) => u,
				_ => panic!("expected Union"),
			};
			gtype_name = data.gtype_name.clone();
			gtype_init = data.gtype_init.clone();
			alignment = data.alignment;
			size = data.size;
			copy_func = data.copy_func.clone();
			members = data.members.clone();
			discriminators = data.discriminators.clone();
			discriminator_type = data.discriminator_type;
			discriminator_offset = data.discriminator_offset;
		}
		let name = module.node(id).name.clone();
		let name_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, name.as_deref());
		let gtype_name_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, gtype_name.as_deref());
		let gtype_init_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, gtype_init.as_deref());
		let copy_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, copy_func.as_deref());

		let (fields, methods): (Vec<NodeId>, Vec<NodeId>) = members.iter().partition(|&&m| module.node(m).kind == NodeKind::Field);

		self.buffer.put_u32(at, name_off);
		self.buffer.put_u16(at + 4, fields.len() as u16);
		self.buffer.put_u16(at + 6, !discriminators.is_empty() as u16);
		self.buffer.put_u32(at + 8, gtype_name_off);
		self.buffer.put_u32(at + 12, gtype_init_off);
		self.buffer.put_u32(at + 16, copy_off);
		self.buffer.put_u32(at + 20, size);
		self.buffer.put_u16(at + 24, methods.len() as u16);
		self.buffer.put_u32(at + 28, discriminator_offset);
		self.buffer.put_u32(at + 32, alignment);

		for field in &fields {
			let field_off = align4(self.offset2);
			self.offset2 = field_off + FIELD_BLOB_SIZE as u32;
			self.buffer.ensure(self.offset2, 0);
			self.emit_field(module, *field, field_off)?;
			self.attr_bearing.push((*field, field_off));
		}
		for method in &methods {
			let method_off = align4(self.offset2);
			self.offset2 = method_off + FUNCTION_BLOB_SIZE as u32;
			self.buffer.ensure(self.offset2, 0);
			self.emit_function(module, *method, &methods, method_off)?;
			self.attr_bearing.push((*method, method_off));
		}
		if let Some(disc_ty) = discriminator_type {
			self.emit_type_at(module, disc_ty, at + 36)?;
		}
		for disc in &discriminators {
			let disc_off = align4(self.offset2);
			self.offset2 = disc_off + VALUE_BLOB_SIZE as u32;
			self.buffer.ensure(self.offset2, 0);
			self.emit_value(module, *disc, disc_off)?;
			self.attr_bearing.push((*disc, disc_off));
		}
		Ok(())
	}

	fn emit_enum(&mut self, module: &mut Module, id: NodeId, at: u32) -> Result<()> {
		let (storage_type, gtype_name, gtype_init, error_domain, deprecated, values, methods);
		{
			let data = match &module.node(id).data {
				NodeData::Enum(e) | NodeData::Flags(e) => e,
				_ => panic!("expected Enum/Flags"),
			};
			storage_type = data.storage_type;
			gtype_name = data.gtype_name.clone();
			gtype_init = data.gtype_init.clone();
			error_domain = data.error_domain.clone();
			deprecated = data.deprecated;
			values = data.values.clone();
			methods = data.methods.clone();
		}
		let name = module.node(id).name.clone();
		let name_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, name.as_deref());
		let gtype_name_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, gtype_name.as_deref());
		let gtype_init_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, gtype_init.as_deref());
		let error_domain_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, error_domain.as_deref());

		self.buffer.put_u32(at, name_off);
		let mut flags = (storage_type.blob_tag() as u32) << 1;
		if deprecated {
			flags |= 1;
		}
		self.buffer.put_u32(at + 4, flags);
		self.buffer.put_u32(at + 8, gtype_name_off);
		self.buffer.put_u32(at + 12, gtype_init_off);
		self.buffer.put_u32(at + 16, error_domain_off);
		self.buffer.put_u16(at + 20, values.len() as u16);
		self.buffer.put_u16(at + 22, methods.len() as u16);

		for value in &values {
			let value_off = align4(self.offset2);
			self.offset2 = value_off + VALUE_BLOB_SIZE as u32;
			self.buffer.ensure(self.offset2, 0);
			self.emit_value(module, *value, value_off)?;
			self.attr_bearing.push((*value, value_off));
		}
		for method in &methods {
			let method_off = align4(self.offset2);
			self.offset2 = method_off + FUNCTION_BLOB_SIZE as u32;
			self.buffer.ensure(self.offset2, 0);
			self.emit_function(module, *method, &methods, method_off)?;
			self.attr_bearing.push((*method, method_off));
		}
		Ok(())
	}

	fn emit_interface_like(&mut self, module: &mut Module, id: NodeId, at: u32) -> Result<()> {
		let is_object = module.node(id).kind == NodeKind::Object;
		let (gtype_name, gtype_init, ref_func, unref_func, set_value_func, get_value_func, glib_type_struct, parent, prerequisites, implements, abstract_, final_, fundamental, deprecated, members);
		{
			let data = match &module.node(id).data {
				NodeData::Object(i) | NodeData::Interface(i) => i,
				_ => panic!("expected Object/Interface"),
			};
			gtype_name = data.gtype_name.clone();
			gtype_init = data.gtype_init.clone();
			ref_func = data.ref_func.clone();
			unref_func = data.unref_func.clone();
			set_value_func = data.set_value_func.clone();
			get_value_func = data.get_value_func.clone();
			glib_type_struct = data.glib_type_struct.clone();
			parent = data.parent.clone();
			prerequisites = data.prerequisites.clone();
			implements = data.implements.clone();
			abstract_ = data.abstract_;
			final_ = data.final_;
			fundamental = data.fundamental;
			deprecated = data.deprecated;
			members = data.members.clone();
		}
		let name = module.node(id).name.clone();
		let name_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, name.as_deref());
		let gtype_name_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, gtype_name.as_deref());
		let gtype_init_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, gtype_init.as_deref());
		let ref_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, ref_func.as_deref());
		let unref_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, unref_func.as_deref());
		let set_value_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, set_value_func.as_deref());
		let get_value_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, get_value_func.as_deref());
		let glib_type_struct_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, glib_type_struct.as_deref());

		let parent_idx = match &parent {
			Some(p) => resolver::find_entry(module, p, self.context.frames())?,
			None => 0,
		};

		let mut flags = 0u32;
		if abstract_ {
			flags |= 1;
		}
		if final_ {
			flags |= 1 << 1;
		}
		if fundamental {
			flags |= 1 << 2;
		}
		if deprecated {
			flags |= 1 << 3;
		}

		// Object and Interface share only a 16-byte common prefix: the two
		// blobs differ past that (OBJECT_BLOB_SIZE=60 vs INTERFACE_BLOB_SIZE=40),
		// since interfaces carry no ref/unref/value-transform functions and no
		// fields or constants of their own.
		self.buffer.put_u32(at, name_off);
		self.buffer.put_u32(at + 4, flags);
		self.buffer.put_u32(at + 8, gtype_name_off);
		self.buffer.put_u32(at + 12, gtype_init_off);

		let names = if is_object { &implements } else { &prerequisites };
		let n_interfaces_off = if is_object { at + 38 } else { at + 20 };

		if is_object {
			self.buffer.put_u32(at + 16, ref_off);
			self.buffer.put_u32(at + 20, unref_off);
			self.buffer.put_u32(at + 24, set_value_off);
			self.buffer.put_u32(at + 28, get_value_off);
			self.buffer.put_u32(at + 32, glib_type_struct_off);
			self.buffer.put_u16(at + 36, parent_idx as u16);
		} else {
			self.buffer.put_u32(at + 16, glib_type_struct_off);
		}

		// 16-bit prerequisite/implemented-interface index array, 4-byte aligned.
		let index_array_off = align4(self.offset2);
		self.offset2 = index_array_off + align4(names.len() as u32 * 2);
		self.buffer.ensure(self.offset2, 0);
		for (i, name) in names.iter().enumerate() {
			let idx = resolver::find_entry(module, name, self.context.frames())?;
			self.buffer.put_u16(index_array_off + i as u32 * 2, idx as u16);
		}
		self.buffer.put_u16(n_interfaces_off, names.len() as u16);

		let fields: Vec<NodeId> = members.iter().copied().filter(|&m| is_object && module.node(m).kind == NodeKind::Field).collect();
		let properties: Vec<NodeId> = members.iter().copied().filter(|&m| module.node(m).kind == NodeKind::Property).collect();
		let functions: Vec<NodeId> = members.iter().copied().filter(|&m| matches!(module.node(m).kind, NodeKind::Function | NodeKind::Callback)).collect();
		let signals: Vec<NodeId> = members.iter().copied().filter(|&m| module.node(m).kind == NodeKind::Signal).collect();
		let vfuncs: Vec<NodeId> = members.iter().copied().filter(|&m| module.node(m).kind == NodeKind::VFunc).collect();
		let constants: Vec<NodeId> = members.iter().copied().filter(|&m| is_object && module.node(m).kind == NodeKind::Constant).collect();

		if is_object {
			for field in &fields {
				let off = align4(self.offset2);
				self.offset2 = off + FIELD_BLOB_SIZE as u32;
				self.buffer.ensure(self.offset2, 0);
				self.emit_field(module, *field, off)?;
				self.attr_bearing.push((*field, off));
			}
		}
		for property in &properties {
			let off = align4(self.offset2);
			self.offset2 = off + PROPERTY_BLOB_SIZE as u32;
			self.buffer.ensure(self.offset2, 0);
			self.emit_property(module, *property, &members, off)?;
			self.attr_bearing.push((*property, off));
		}
		for function in &functions {
			let off = align4(self.offset2);
			self.offset2 = off + FUNCTION_BLOB_SIZE as u32;
			self.buffer.ensure(self.offset2, 0);
			self.emit_function(module, *function, &functions, off)?;
			self.attr_bearing.push((*function, off));
		}
		for signal in &signals {
			let off = align4(self.offset2);
			self.offset2 = off + SIGNAL_BLOB_SIZE as u32;
			self.buffer.ensure(self.offset2, 0);
			self.emit_signal(module, *signal, off)?;
			self.attr_bearing.push((*signal, off));
		}
		for vfunc in &vfuncs {
			let off = align4(self.offset2);
			self.offset2 = off + VFUNC_BLOB_SIZE as u32;
			self.buffer.ensure(self.offset2, 0);
			self.emit_vfunc(module, *vfunc, &functions, off)?;
			self.attr_bearing.push((*vfunc, off));
		}
		if is_object {
			for constant in &constants {
				let off = align4(self.offset2);
				self.offset2 = off + CONSTANT_BLOB_SIZE as u32;
				self.buffer.ensure(self.offset2, 0);
				self.emit_constant(module, *constant, off)?;
				self.attr_bearing.push((*constant, off));
			}
		}

		if is_object {
			self.buffer.put_u16(at + 40, fields.len() as u16);
			self.buffer.put_u16(at + 42, properties.len() as u16);
			self.buffer.put_u16(at + 44, functions.len() as u16);
			self.buffer.put_u16(at + 46, signals.len() as u16);
			self.buffer.put_u16(at + 48, vfuncs.len() as u16);
			self.buffer.put_u16(at + 50, constants.len() as u16);
		} else {
			self.buffer.put_u16(at + 24, properties.len() as u16);
			self.buffer.put_u16(at + 26, functions.len() as u16);
			self.buffer.put_u16(at + 28, signals.len() as u16);
			self.buffer.put_u16(at + 30, vfuncs.len() as u16);
		}

		Ok(())
	}

	fn emit_signal(&mut self, module: &mut Module, id: NodeId, at: u32) -> Result<()> {
		let (run_phase, no_recurse, detailed, action, no_hooks, has_class_closure, true_stops_emit, class_closure, result, parameters);
		{
			let data = match &module.node(id).data {
				NodeData::Signal(s) => s,
				_ => panic!("expected Signal"),
			};
			run_phase = data.run_phase;
			no_recurse = data.no_recurse;
			detailed = data.detailed;
			action = data.action;
			no_hooks = data.no_hooks;
			has_class_closure = data.has_class_closure;
			true_stops_emit = data.true_stops_emit;
			class_closure = data.class_closure;
			result = data.result;
			parameters = data.parameters.clone();
		}
		let name = module.node(id).name.clone();
		let name_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, name.as_deref());
		let mut flags = match run_phase {
			crate::ir::RunPhase::First => 0u32,
			crate::ir::RunPhase::Last => 1,
			crate::ir::RunPhase::Cleanup => 2,
		};
		if no_recurse {
			flags |= 1 << 2;
		}
		if detailed {
			flags |= 1 << 3;
		}
		if action {
			flags |= 1 << 4;
		}
		if no_hooks {
			flags |= 1 << 5;
		}
		if has_class_closure {
			flags |= 1 << 6;
		}
		if true_stops_emit {
			flags |= 1 << 7;
		}
		self.buffer.put_u32(at, name_off);
		self.buffer.put_u32(at + 4, flags);
		self.buffer.put_u16(at + 8, class_closure.unwrap_or(ACCESSOR_SENTINEL));
		let sig_off = self.emit_signature(module, result, &parameters, false)?;
		self.buffer.put_u32(at + 12, sig_off);
		Ok(())
	}

	fn emit_vfunc(&mut self, module: &mut Module, id: NodeId, sibling_methods: &[NodeId], at: u32) -> Result<()> {
		let (invoker, must_chain_up, must_be_implemented, must_not_be_implemented, is_class_closure, throws, is_static, struct_offset, result, parameters, is_async, sync_name, async_name, finish_name);
		{
			let data = match &module.node(id).data {
				NodeData::VFunc(v) => v,
				_ => panic!("expected VFunc"),
			};
			invoker = data.invoker.clone();
			must_chain_up = data.must_chain_up;
			must_be_implemented = data.must_be_implemented;
			must_not_be_implemented = data.must_not_be_implemented;
			is_class_closure = data.is_class_closure;
			throws = data.throws;
			is_static = data.is_static;
			struct_offset = data.struct_offset;
			result = data.result;
			parameters = data.parameters.clone();
			is_async = data.is_async;
			sync_name = data.sync_name.clone();
			async_name = data.async_name.clone();
			finish_name = data.finish_name.clone();
		}
		let name = module.node(id).name.clone();
		let name_off = self.strings.intern_opt(&mut self.buffer, &mut self.offset2, name.as_deref());
		let mut flags = 0u32;
		if must_chain_up {
			flags |= 1;
		}
		if must_be_implemented {
			flags |= 1 << 1;
		}
		if must_not_be_implemented {
			flags |= 1 << 2;
		}
		if is_class_closure {
			flags |= 1 << 3;
		}
		if throws {
			flags |= 1 << 4;
		}
		if is_static {
			flags |= 1 << 5;
		}
		self.buffer.put_u32(at, name_off);
		self.buffer.put_u32(at + 4, flags);
		self.buffer.put_u16(at + 8, struct_offset.unwrap_or(STRUCT_OFFSET_UNKNOWN));
		let invoker_idx = invoker.as_deref().and_then(|i| resolver::index_of_member(module, sibling_methods, i)).unwrap_or(ACCESSOR_SENTINEL);
		self.buffer.put_u16(at + 10, invoker_idx);
		let sig_off = self.emit_signature(module, result, &parameters, throws)?;
		self.buffer.put_u32(at + 12, sig_off);

		// Same sync/async sibling-linkage convention as Function (spec §3.1
		// "async linkage like Function", the open question in DESIGN.md).
		let sibling = if is_async { async_name.as_deref().or(finish_name.as_deref()) } else { sync_name.as_deref() };
		let sibling_index = match sibling {
			Some(s) => resolver::index_of_member(module, sibling_methods, s).unwrap_or(ASYNC_SENTINEL),
			None => ASYNC_SENTINEL,
		};
		self.buffer.put_u16(at + 16, sibling_index);
		self.buffer.put_u16(at + 18, 0);
		Ok(())
	}
}
