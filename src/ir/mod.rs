//! The discriminated-union IR node model (spec §3.1, §4.1).
//!
//! Nodes live in a per-[`crate::module::Module`] arena and are referred to by
//! [`NodeId`], not by reference: the build walk needs to mutate a node's
//! assigned offset without holding `&mut` through the whole tree, and a plain
//! index side table (see [`crate::build::Offsets`]) does that without unsafe
//! aliasing.

pub mod callable;
pub mod container;
pub mod misc;
pub mod types;

pub use callable::*;
pub use container::*;
pub use misc::*;
pub use types::*;

/// Index into a [`crate::module::Module`]'s node arena.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
	#[inline]
	pub fn index(self) -> usize {
		self.0 as usize
	}
}

/// The variant tag drawn from spec §3.1; also the primary sort key for
/// member-list insertion order (`compare`, spec §4.1).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum NodeKind {
	Function,
	Callback,
	Struct,
	Boxed,
	Enum,
	Flags,
	Object,
	Interface,
	Constant,
	Union,
	Param,
	Type,
	Property,
	Signal,
	Value,
	VFunc,
	Field,
	XRef,
}

/// A node in the IR tree.
///
/// `name` is `None` only for the synthetic "result" pseudo-nodes created
/// while emitting a callable's return type (spec §4.7): those carry
/// attributes but never own a directory entry or a primary blob.
#[derive(Debug)]
pub struct Node {
	pub kind: NodeKind,
	pub name: Option<String>,
	/// Insertion-ordered; the attribute table writer depends on this order
	/// (spec §4.8 step 3).
	pub attributes: Vec<(String, String)>,
	pub data: NodeData,
}

impl Node {
	pub fn new(kind: NodeKind, name: Option<String>, data: NodeData) -> Self {
		Node { kind, name, attributes: Vec::new(), data }
	}

	pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.attributes.push((key.into(), value.into()));
	}
}

/// Per-variant payload (spec §3.1).
#[derive(Debug)]
pub enum NodeData {
	Function(FunctionData),
	Callback(FunctionData),
	Struct(RecordData),
	Boxed(RecordData),
	Union(UnionData),
	Enum(EnumData),
	Flags(EnumData),
	Object(InterfaceData),
	Interface(InterfaceData),
	Constant(ConstantData),
	Param(ParamData),
	Type(TypeData),
	Property(PropertyData),
	Signal(SignalData),
	Value(ValueData),
	VFunc(VFuncData),
	Field(FieldData),
	XRef(XRefData),
}

/// True for the five variants whose payload carries an ordered `members` list
/// (spec §4.1: `can_have_members`).
pub fn can_have_members(kind: NodeKind) -> bool {
	matches!(kind, NodeKind::Object | NodeKind::Interface | NodeKind::Boxed | NodeKind::Struct | NodeKind::Union)
}

/// Total order `(tag, name)` used to keep member lists sorted (spec §4.1).
pub fn compare(a: &Node, b: &Node) -> std::cmp::Ordering {
	(a.kind, a.name.as_deref().unwrap_or("")).cmp(&(b.kind, b.name.as_deref().unwrap_or("")))
}

/// Inserts `member` into `members`, keeping the list ordered by [`compare`]
/// (spec §4.1). `container_kind` is asserted against [`can_have_members`]
/// since the source treats adding to a non-container as a programming error.
pub fn add_member(container_kind: NodeKind, members: &mut Vec<NodeId>, member: NodeId, nodes: &[Node]) {
	assert!(can_have_members(container_kind), "{container_kind:?} cannot have members");
	let pos = members.partition_point(|&existing| compare(&nodes[existing.index()], &nodes[member.index()]) != std::cmp::Ordering::Greater);
	members.insert(pos, member);
}
