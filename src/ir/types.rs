use crate::ir::NodeId;

/// The basic (inline-encoded) type tags of spec §3.1.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BasicTypeTag {
	Void,
	Boolean,
	Int8,
	UInt8,
	Int16,
	UInt16,
	Int32,
	UInt32,
	Int64,
	UInt64,
	Float,
	Double,
	GType,
	Utf8,
	Filename,
	Unichar,
}

impl BasicTypeTag {
	/// The canonical textual name used both by `serialize_type` (spec §4.5)
	/// and by typelib `SimpleTypeBlob` encoding (spec §6.1).
	pub fn canonical_name(self) -> &'static str {
		match self {
			BasicTypeTag::Void => "void",
			BasicTypeTag::Boolean => "gboolean",
			BasicTypeTag::Int8 => "gint8",
			BasicTypeTag::UInt8 => "guint8",
			BasicTypeTag::Int16 => "gint16",
			BasicTypeTag::UInt16 => "guint16",
			BasicTypeTag::Int32 => "gint32",
			BasicTypeTag::UInt32 => "guint32",
			BasicTypeTag::Int64 => "gint64",
			BasicTypeTag::UInt64 => "guint64",
			BasicTypeTag::Float => "gfloat",
			BasicTypeTag::Double => "gdouble",
			BasicTypeTag::GType => "GType",
			BasicTypeTag::Utf8 => "utf8",
			BasicTypeTag::Filename => "filename",
			BasicTypeTag::Unichar => "unichar",
		}
	}

	/// The raw tag value stored in a `SimpleTypeBlob` (mirrors the
	/// `GITypeTag` enumeration of the runtime reader, spec §6.1).
	pub fn blob_tag(self) -> u8 {
		match self {
			BasicTypeTag::Void => 0,
			BasicTypeTag::Boolean => 1,
			BasicTypeTag::Int8 => 2,
			BasicTypeTag::UInt8 => 3,
			BasicTypeTag::Int16 => 4,
			BasicTypeTag::UInt16 => 5,
			BasicTypeTag::Int32 => 6,
			BasicTypeTag::UInt32 => 7,
			BasicTypeTag::Int64 => 8,
			BasicTypeTag::UInt64 => 9,
			BasicTypeTag::Float => 10,
			BasicTypeTag::Double => 11,
			BasicTypeTag::GType => 12,
			BasicTypeTag::Utf8 => 13,
			BasicTypeTag::Filename => 14,
			BasicTypeTag::Unichar => 15,
		}
	}
}

/// `array-kind` discriminator (spec §3.1's Array payload).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ArrayKind {
	C,
	Array,
	PtrArray,
	ByteArray,
}

/// How a fixed-length C array's length is expressed, if at all.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ArrayLength {
	None,
	/// Index (0-based among sibling parameters) of the parameter carrying
	/// the runtime length.
	Param(u16),
	/// A compile-time-fixed element count.
	FixedSize(u32),
}

/// The composite shape of a `Type` node's payload (spec §3.1, §4.5).
#[derive(Debug, Clone)]
pub enum TypeShape {
	Basic(BasicTypeTag),
	Array {
		element: NodeId,
		kind: ArrayKind,
		length: ArrayLength,
		zero_terminated: bool,
	},
	GList(Option<NodeId>),
	GSList(Option<NodeId>),
	GHash(Option<(NodeId, NodeId)>),
	/// A possibly-namespace-qualified textual reference, e.g. `"Widget"` or
	/// `"Gtk.Widget"`, resolved lazily by the cross-reference resolver
	/// (spec §4.6) during emission.
	Interface(String),
	Error(Option<Vec<String>>),
}

impl TypeShape {
	pub fn is_basic(&self) -> bool {
		matches!(self, TypeShape::Basic(_))
	}
}

#[derive(Debug)]
pub struct TypeData {
	pub pointer: bool,
	pub shape: TypeShape,
}

impl TypeData {
	pub fn basic(tag: BasicTypeTag, pointer: bool) -> Self {
		TypeData { pointer, shape: TypeShape::Basic(tag) }
	}
}
