use crate::ir::types::BasicTypeTag;
use crate::ir::NodeId;

/// `Field` node payload (spec §3.1). A field is either plainly typed or
/// embeds a `Callback` (a C function-pointer member), never both.
#[derive(Debug)]
pub enum FieldShape {
	Type(NodeId),
	Callback(NodeId),
}

#[derive(Debug)]
pub struct FieldData {
	pub readable: bool,
	pub writable: bool,
	/// Bitfield width, if this field is declared `: N` in the source struct.
	pub bits: Option<u8>,
	/// Byte offset within the owning record, or `None` for the unknown
	/// sentinel (`0xFFFF`, spec §6.1).
	pub struct_offset: Option<u32>,
	pub shape: FieldShape,
}

/// `Property` node payload (spec §3.1).
#[derive(Debug)]
pub struct PropertyData {
	pub readable: bool,
	pub writable: bool,
	pub construct: bool,
	pub construct_only: bool,
	pub transfer: bool,
	pub shallow_transfer: bool,
	pub setter: Option<String>,
	pub getter: Option<String>,
	pub deprecated: bool,
	pub child: NodeId,
}

/// `Value` node payload: one enumerator of an `Enum`/`Flags` (spec §3.1).
#[derive(Debug)]
pub struct ValueData {
	pub value: i64,
	pub deprecated: bool,
}

/// `Enum` / `Flags` node payload (spec §3.1).
#[derive(Debug)]
pub struct EnumData {
	pub storage_type: BasicTypeTag,
	pub gtype_name: Option<String>,
	pub gtype_init: Option<String>,
	pub error_domain: Option<String>,
	pub deprecated: bool,
	pub values: Vec<NodeId>,
	pub methods: Vec<NodeId>,
}

/// `Constant` node payload (spec §3.1).
#[derive(Debug)]
pub struct ConstantData {
	pub child: NodeId,
	pub value: String,
	pub deprecated: bool,
}

/// `XRef` node payload: a placeholder standing in for an entry defined in
/// another, possibly not-yet-parsed, namespace (spec §4.6).
#[derive(Debug)]
pub struct XRefData {
	pub namespace: String,
}
