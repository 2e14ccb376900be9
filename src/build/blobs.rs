//! Exact on-disk blob widths (spec §6.1), plus the tail-only extended type
//! blobs sized per the real GObject Introspection Typelib 1.2 layout that
//! §4.3/§4.5 describe but do not tabulate.

pub const ENTRY_BLOB_SIZE: u16 = 12;
pub const FUNCTION_BLOB_SIZE: u16 = 24;
pub const CALLBACK_BLOB_SIZE: u16 = 12;
pub const SIGNAL_BLOB_SIZE: u16 = 16;
pub const VFUNC_BLOB_SIZE: u16 = 20;
pub const ARG_BLOB_SIZE: u16 = 16;
pub const PROPERTY_BLOB_SIZE: u16 = 16;
pub const FIELD_BLOB_SIZE: u16 = 16;
pub const VALUE_BLOB_SIZE: u16 = 12;
pub const CONSTANT_BLOB_SIZE: u16 = 24;
pub const ERROR_DOMAIN_BLOB_SIZE: u16 = 16;
pub const ATTRIBUTE_BLOB_SIZE: u16 = 12;
pub const SIGNATURE_BLOB_SIZE: u16 = 8;
pub const ENUM_BLOB_SIZE: u16 = 24;
pub const STRUCT_BLOB_SIZE: u16 = 32;
pub const OBJECT_BLOB_SIZE: u16 = 60;
pub const INTERFACE_BLOB_SIZE: u16 = 40;
pub const UNION_BLOB_SIZE: u16 = 40;

pub const HEADER_SIZE: u32 = 116;

/// Byte offsets of fixed-width header fields (spec §6.1 table, in order).
pub mod header_offset {
	pub const MAJOR_VERSION: u32 = 16;
	pub const MINOR_VERSION: u32 = 17;
	pub const N_ENTRIES: u32 = 20;
	pub const N_LOCAL_ENTRIES: u32 = 22;
	pub const DIRECTORY: u32 = 24;
	pub const N_ATTRIBUTES: u32 = 28;
	pub const ATTRIBUTES: u32 = 32;
	pub const DEPENDENCIES: u32 = 36;
	pub const SIZE: u32 = 40;
	pub const NAMESPACE: u32 = 44;
	pub const NSVERSION: u32 = 48;
	pub const SHARED_LIBRARY: u32 = 52;
	pub const C_PREFIX: u32 = 56;
	pub const ENTRY_BLOB_SIZE: u32 = 60;
	pub const FUNCTION_BLOB_SIZE: u32 = 62;
	pub const CALLBACK_BLOB_SIZE: u32 = 64;
	pub const SIGNAL_BLOB_SIZE: u32 = 66;
	pub const VFUNC_BLOB_SIZE: u32 = 68;
	pub const ARG_BLOB_SIZE: u32 = 70;
	pub const PROPERTY_BLOB_SIZE: u32 = 72;
	pub const FIELD_BLOB_SIZE: u32 = 74;
	pub const VALUE_BLOB_SIZE: u32 = 76;
	pub const CONSTANT_BLOB_SIZE: u32 = 78;
	pub const ERROR_DOMAIN_BLOB_SIZE: u32 = 80;
	pub const ATTRIBUTE_BLOB_SIZE: u32 = 82;
	pub const SIGNATURE_BLOB_SIZE: u32 = 84;
	pub const ENUM_BLOB_SIZE: u32 = 86;
	pub const STRUCT_BLOB_SIZE: u32 = 88;
	pub const OBJECT_BLOB_SIZE: u32 = 90;
	pub const INTERFACE_BLOB_SIZE: u32 = 92;
	pub const UNION_BLOB_SIZE: u32 = 94;
	pub const SECTIONS: u32 = 96;
}

/// A `SimpleTypeBlob`: one `u32` that either encodes a basic tag inline or
/// (high bit set) holds a tail offset to an extended type blob.
pub const SIMPLE_TYPE_BLOB_SIZE: u32 = 4;
/// header `u32` + interface directory index `u16` + reserved `u16`.
pub const INTERFACE_TYPE_BLOB_SIZE: u32 = 8;
/// header `u32` + length-or-size `u32` + element `SimpleTypeBlob`.
pub const ARRAY_TYPE_BLOB_SIZE: u32 = 4 + 4 + SIMPLE_TYPE_BLOB_SIZE;
/// header `u32` + one embedded `SimpleTypeBlob` (GList/GSList).
pub const PARAM_TYPE_BLOB_SIZE_1: u32 = 4 + SIMPLE_TYPE_BLOB_SIZE;
/// header `u32` + two embedded `SimpleTypeBlob`s (GHashTable).
pub const PARAM_TYPE_BLOB_SIZE_2: u32 = 4 + SIMPLE_TYPE_BLOB_SIZE * 2;

/// header `u32` (n_domains) for a domain list; each domain name is a `u32`
/// string-pool offset, 4-byte padded (always is, since both fields are
/// 4-byte wide).
pub fn error_type_blob_size(n_domains: usize) -> u32 {
	4 + (n_domains as u32) * 4
}

/// The high bit of a `SimpleTypeBlob`'s first word marking "offset, not tag".
pub const SIMPLE_TYPE_FLAG_OFFSET: u32 = 1 << 31;

pub const ACCESSOR_SENTINEL: u16 = 0x3FF;
pub const ASYNC_SENTINEL: u16 = 0xFFFF;
pub const STRUCT_OFFSET_UNKNOWN: u16 = 0xFFFF;

pub const SECTION_END: u32 = 0;
pub const SECTION_DIRECTORY_INDEX: u32 = 1;
