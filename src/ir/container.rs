use crate::ir::NodeId;
use bitflags::bitflags;

bitflags! {
	/// Struct/Boxed/Union layout flags (spec §3.1).
	#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
	pub struct RecordFlags: u8 {
		const DISGUISED      = 1 << 0;
		const OPAQUE         = 1 << 1;
		const POINTER        = 1 << 2;
		const IS_GTYPE_STRUCT = 1 << 3;
		const FOREIGN        = 1 << 4;
	}
}

/// `Struct` / `Boxed` node payload (spec §3.1).
#[derive(Debug)]
pub struct RecordData {
	pub gtype_name: Option<String>,
	pub gtype_init: Option<String>,
	pub alignment: u32,
	pub size: u32,
	pub copy_func: Option<String>,
	pub free_func: Option<String>,
	pub deprecated: bool,
	/// Fields and methods, in declaration order (spec §4.1 `compare`).
	pub members: Vec<NodeId>,
	pub flags: RecordFlags,
}

/// `Union` node payload (spec §3.1).
#[derive(Debug)]
pub struct UnionData {
	pub gtype_name: Option<String>,
	pub gtype_init: Option<String>,
	pub alignment: u32,
	pub size: u32,
	pub copy_func: Option<String>,
	pub free_func: Option<String>,
	pub deprecated: bool,
	pub members: Vec<NodeId>,
	/// One `Constant`-shaped discriminator value per union field, parallel
	/// to the field subset of `members`.
	pub discriminators: Vec<NodeId>,
	pub discriminator_type: Option<NodeId>,
	pub discriminator_offset: u32,
}

/// `Object` / `Interface` node payload (spec §3.1).
#[derive(Debug)]
pub struct InterfaceData {
	pub gtype_name: Option<String>,
	pub gtype_init: Option<String>,
	pub ref_func: Option<String>,
	pub unref_func: Option<String>,
	pub set_value_func: Option<String>,
	pub get_value_func: Option<String>,
	pub glib_type_struct: Option<String>,
	/// `Object` only: the name of the parent class, absent for `GObject` root.
	pub parent: Option<String>,
	/// `Interface` only: names of the GTypes an implementor must already provide.
	pub prerequisites: Vec<String>,
	/// `Object` only: names of interfaces this class implements.
	pub implements: Vec<String>,
	pub abstract_: bool,
	pub final_: bool,
	pub fundamental: bool,
	pub deprecated: bool,
	pub members: Vec<NodeId>,
}
