//! Post-build structural validation (spec §4.10): the last gate before a
//! typelib leaves the compiler. Mirrors the checks `gi_typelib_validate`
//! performs on the runtime side, re-derived here purely from the header and
//! directory this crate just wrote (no separate reader implementation).

use crate::build::blobs::{ENTRY_BLOB_SIZE, HEADER_SIZE};
use crate::build::writer::Buffer;
use crate::error::{CompileError, Result};

const MAGIC: &[u8; 16] = b"GOBJ\nMETADATA\r\n\x1a";

pub fn validate(buffer: &Buffer) -> Result<()> {
	let fail = |message: String| CompileError::Validation { message };

	if buffer.len() < HEADER_SIZE {
		return Err(fail("buffer shorter than the fixed header".into()));
	}
	if &buffer.as_slice()[0..16] != MAGIC {
		return Err(fail("bad magic".into()));
	}
	let major = buffer.as_slice()[16];
	let minor = buffer.as_slice()[17];
	if major != 4 || minor != 0 {
		return Err(fail(format!("unsupported version {major}.{minor}")));
	}

	let n_entries = buffer.get_u16(20) as u32;
	let n_local_entries = buffer.get_u16(22) as u32;
	if n_local_entries > n_entries {
		return Err(fail("n_local_entries exceeds n_entries".into()));
	}

	let directory = buffer.get_u32(24);
	let size = buffer.get_u32(40);
	if size != buffer.len() {
		return Err(fail(format!("header.size {size} does not match actual buffer length {}", buffer.len())));
	}
	if directory % 4 != 0 {
		return Err(fail("directory offset is not 4-byte aligned".into()));
	}

	let dir_end = directory + n_entries * ENTRY_BLOB_SIZE as u32;
	if dir_end > size {
		return Err(fail("directory table runs past end of buffer".into()));
	}

	for i in 0..n_entries {
		let entry = directory + i * ENTRY_BLOB_SIZE as u32;
		let name = buffer.get_u32(entry + 4);
		let offset = buffer.get_u32(entry + 8);
		if name != 0 && name >= size {
			return Err(fail(format!("entry {i}: name offset {name} out of range")));
		}
		if offset != 0 && offset >= size {
			return Err(fail(format!("entry {i}: blob offset {offset} out of range")));
		}
		if i < n_local_entries && offset % 4 != 0 {
			return Err(fail(format!("entry {i}: blob offset {offset} is not 4-byte aligned")));
		}
	}

	let n_attributes = buffer.get_u32(28);
	let attributes = buffer.get_u32(32);
	if attributes % 4 != 0 {
		return Err(fail("attribute table offset is not 4-byte aligned".into()));
	}
	let attr_end = attributes + n_attributes * crate::build::blobs::ATTRIBUTE_BLOB_SIZE as u32;
	if attr_end > size {
		return Err(fail("attribute table runs past end of buffer".into()));
	}
	let mut last_offset = 0u32;
	for i in 0..n_attributes {
		let offset = buffer.get_u32(attributes + i * crate::build::blobs::ATTRIBUTE_BLOB_SIZE as u32);
		if offset < last_offset {
			return Err(fail("attribute table is not sorted by offset".into()));
		}
		last_offset = offset;
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	/// Builds the smallest buffer `validate` accepts: a header with no
	/// entries, no attributes, directory right after the header.
	fn minimal_valid_buffer() -> Buffer {
		let mut buffer = Buffer::with_capacity(HEADER_SIZE);
		buffer.put_bytes(0, MAGIC);
		buffer.put_u8(16, 4);
		buffer.put_u8(17, 0);
		buffer.put_u16(20, 0);
		buffer.put_u16(22, 0);
		buffer.put_u32(24, HEADER_SIZE);
		buffer.put_u32(28, 0);
		buffer.put_u32(32, HEADER_SIZE);
		buffer.put_u32(40, HEADER_SIZE);
		buffer
	}

	#[test]
	fn minimal_buffer_validates() {
		assert!(validate(&minimal_valid_buffer()).is_ok());
	}

	#[test]
	fn buffer_shorter_than_header_is_rejected() {
		let buffer = Buffer::with_capacity(8);
		let err = validate(&buffer).unwrap_err();
		assert!(matches!(err, CompileError::Validation { .. }));
	}

	#[test]
	fn bad_magic_is_rejected() {
		let mut buffer = minimal_valid_buffer();
		buffer.put_u8(0, b'X');
		assert!(validate(&buffer).is_err());
	}

	#[test]
	fn mismatched_header_size_field_is_rejected() {
		let mut buffer = minimal_valid_buffer();
		buffer.put_u32(40, HEADER_SIZE + 4);
		assert!(validate(&buffer).is_err());
	}

	#[test]
	fn unaligned_directory_offset_is_rejected() {
		let mut buffer = minimal_valid_buffer();
		buffer.put_u32(24, HEADER_SIZE + 1);
		assert!(validate(&buffer).is_err());
	}

	#[test]
	fn n_local_entries_exceeding_n_entries_is_rejected() {
		let mut buffer = minimal_valid_buffer();
		buffer.put_u16(20, 1);
		buffer.put_u16(22, 2);
		assert!(validate(&buffer).is_err());
	}
}
