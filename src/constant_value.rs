//! Parses a `Constant` node's textual value into the inline bytes the
//! typelib stores next to its `ConstantBlob` (spec §4.7's `Constant` bullet):
//! `strtoll`/`strtoull`/`strtod`/a boolean keyword/literal string bytes,
//! 4-byte aligned.

use crate::build::writer::{align4, Buffer};
use crate::ir::types::BasicTypeTag;

/// Writes the parsed value at the (already 4-byte-aligned) tail cursor,
/// advances it past the written and padding bytes, and returns the number of
/// bytes written (excluding padding).
pub fn write_value(buffer: &mut Buffer, tail: &mut u32, tag: Option<BasicTypeTag>, text: &str) -> u32 {
	let start = *tail;
	let written = match tag {
		Some(BasicTypeTag::Boolean) => {
			let value = matches!(text, "true" | "1" | "TRUE");
			buffer.put_u8(start, value as u8);
			1
		}
		Some(BasicTypeTag::Int8) => {
			buffer.put_u8(start, text.parse::<i8>().unwrap_or(0) as u8);
			1
		}
		Some(BasicTypeTag::UInt8) => {
			buffer.put_u8(start, text.parse::<u8>().unwrap_or(0));
			1
		}
		Some(BasicTypeTag::Int16) => {
			buffer.put_u16(start, text.parse::<i16>().unwrap_or(0) as u16);
			2
		}
		Some(BasicTypeTag::UInt16) => {
			buffer.put_u16(start, text.parse::<u16>().unwrap_or(0));
			2
		}
		Some(BasicTypeTag::Int32) => {
			buffer.put_i32(start, text.parse::<i64>().unwrap_or(0) as i32);
			4
		}
		Some(BasicTypeTag::UInt32) | Some(BasicTypeTag::GType) => {
			buffer.put_u32(start, text.parse::<u64>().unwrap_or(0) as u32);
			4
		}
		Some(BasicTypeTag::Int64) => {
			buffer.put_i64(start, text.parse::<i64>().unwrap_or(0));
			8
		}
		Some(BasicTypeTag::UInt64) => {
			buffer.put_i64(start, text.parse::<u64>().unwrap_or(0) as i64);
			8
		}
		Some(BasicTypeTag::Float) => {
			buffer.put_f32(start, text.parse::<f32>().unwrap_or(0.0));
			4
		}
		Some(BasicTypeTag::Double) => {
			buffer.put_f64(start, text.parse::<f64>().unwrap_or(0.0));
			8
		}
		_ => {
			// Utf8/Filename/Unichar and anything non-basic: literal bytes + NUL.
			buffer.put_cstr(start, text)
		}
	};
	*tail = align4(start + written);
	written
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn int32_is_written_little_endian_and_tail_stays_aligned() {
		let mut buffer = Buffer::default();
		let mut tail = 0u32;
		let written = write_value(&mut buffer, &mut tail, Some(BasicTypeTag::Int32), "-7");
		assert_eq!(written, 4);
		assert_eq!(buffer.get_u32(0), (-7i32) as u32);
		assert_eq!(tail % 4, 0);
	}

	#[test]
	fn boolean_accepts_common_truthy_spellings() {
		let mut buffer = Buffer::default();
		let mut tail = 0u32;
		write_value(&mut buffer, &mut tail, Some(BasicTypeTag::Boolean), "TRUE");
		assert_eq!(buffer.as_slice()[0], 1);

		let mut tail2 = 4u32;
		write_value(&mut buffer, &mut tail2, Some(BasicTypeTag::Boolean), "nope");
		assert_eq!(buffer.as_slice()[4], 0);
	}

	#[test]
	fn string_value_is_nul_terminated_and_padded_to_four_bytes() {
		let mut buffer = Buffer::default();
		let mut tail = 0u32;
		write_value(&mut buffer, &mut tail, None, "abc");
		assert_eq!(buffer.get_cstr(0), "abc");
		assert_eq!(tail % 4, 0);
		assert!(tail >= 4);
	}

	#[test]
	fn unparseable_numeric_text_falls_back_to_zero_rather_than_panicking() {
		let mut buffer = Buffer::default();
		let mut tail = 0u32;
		write_value(&mut buffer, &mut tail, Some(BasicTypeTag::Double), "not-a-number");
		assert_eq!(buffer.get_u32(0), 0);
		assert_eq!(buffer.get_u32(4), 0);
	}
}
