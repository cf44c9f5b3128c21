//! Tagged fields
//!
//! Flexible versions end each structure with a tag buffer: a varint count,
//! then for each entry a varint tag, a varint size and `size` bytes of
//! payload. This broker defines no tagged fields of its own, so every entry
//! is skipped; unknown tags are expected and never an error.

use tracing::trace;

use crate::error::Result;
use crate::parser::Decoder;

/// Skip a whole tag buffer, returning how many tagged fields were in it.
pub fn skip_tagged_fields(decoder: &mut Decoder<'_>) -> Result<usize> {
    let count = decoder.read_unsigned_varint("tag_buffer_count")? as usize;
    for _ in 0..count {
        let tag = decoder.read_unsigned_varint("tag")?;
        let size = decoder.read_unsigned_varint("tag_size")? as usize;
        decoder.take(size, "tag_data")?;
        trace!("Skipped tagged field {} ({} bytes)", tag, size);
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_empty_tag_buffer() {
        let buf = [0x00, 0xEE];
        let mut decoder = Decoder::new(&buf);
        assert_eq!(skip_tagged_fields(&mut decoder).unwrap(), 0);
        assert_eq!(decoder.position(), 1);
    }

    #[test]
    fn test_unknown_tags_are_skipped() {
        let buf = [
            0x02, // two tagged fields
            0x00, 0x03, 0xAA, 0xBB, 0xCC, // tag 0, 3 bytes
            0x2A, 0x01, 0xDD, // tag 42, 1 byte
            0xEE, // next field
        ];
        let mut decoder = Decoder::new(&buf);
        assert_eq!(skip_tagged_fields(&mut decoder).unwrap(), 2);
        assert_eq!(decoder.read_i8("next").unwrap(), 0xEEu8 as i8);
    }

    #[test]
    fn test_tag_payload_past_end() {
        let buf = [0x01, 0x05, 0x04, 0xAA];
        let mut decoder = Decoder::new(&buf);
        let err = skip_tagged_fields(&mut decoder).unwrap_err();
        assert!(matches!(err, Error::OutOfBounds { field: "tag_data", needed: 4, remaining: 1 }));
    }
}
