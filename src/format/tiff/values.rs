//! TIFF tag value reading.
//!
//! Values either sit inline in the IFD entry or at an offset in the file.
//! Arrays such as TileOffsets are fetched with one range read each.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, IfdEntry, TiffHeader};
use super::tags::{FieldType, TiffTag};

/// Reads tag values through a RangeReader, respecting the file's byte order.
pub struct ValueReader<'a, R: RangeReader> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader> ValueReader<'a, R> {
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// Raw bytes of an entry's value, inline or fetched from its offset.
    pub async fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.is_inline {
            return Ok(Bytes::copy_from_slice(
                &entry.value_offset_bytes[..size as usize],
            ));
        }

        let size = usize::try_from(size).map_err(|_| TiffError::InvalidTagValue {
            tag: tag_name(entry),
            message: format!("value of {} bytes is too large", size),
        })?;
        let offset = entry.value_offset(self.header.byte_order);
        Ok(self.reader.read_exact_at(offset, size).await?)
    }

    /// Single unsigned integer value (Byte, Short, Long or Long8).
    pub async fn read_u64(&self, entry: &IfdEntry) -> Result<u64, TiffError> {
        if let Some(value) = entry.inline_u64(self.header.byte_order) {
            return Ok(value);
        }
        if entry.count != 1 {
            return Err(TiffError::InvalidTagValue {
                tag: tag_name(entry),
                message: format!("expected count 1, got {}", entry.count),
            });
        }
        self.read_u64_array(entry)
            .await?
            .first()
            .copied()
            .ok_or(TiffError::MissingTag(tag_name(entry)))
    }

    /// Array of unsigned integers widened to u64.
    ///
    /// This is how TileOffsets and TileByteCounts are loaded: the whole
    /// array in a single read.
    pub async fn read_u64_array(&self, entry: &IfdEntry) -> Result<Vec<u64>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if !field_type.is_unsigned_integer() {
            return Err(TiffError::InvalidTagValue {
                tag: tag_name(entry),
                message: format!("expected an unsigned integer type, got {:?}", field_type),
            });
        }
        if entry.count == 0 {
            return Ok(Vec::new());
        }

        let bytes = self.read_bytes(entry).await?;
        Ok(decode_u64_array(
            &bytes,
            entry.count as usize,
            field_type,
            self.header.byte_order,
        ))
    }

    /// First value of a Rational entry, such as XResolution.
    pub async fn read_rational(&self, entry: &IfdEntry) -> Result<f64, TiffError> {
        if entry.field_type != Some(FieldType::Rational) || entry.count == 0 {
            return Err(TiffError::InvalidTagValue {
                tag: tag_name(entry),
                message: format!("expected Rational type, got {:?}", entry.field_type),
            });
        }

        let bytes = self.read_bytes(entry).await?;
        let byte_order = self.header.byte_order;
        let numerator = byte_order.read_u32(&bytes[0..4]);
        let denominator = byte_order.read_u32(&bytes[4..8]);
        if denominator == 0 {
            return Err(TiffError::InvalidTagValue {
                tag: tag_name(entry),
                message: "zero denominator".to_string(),
            });
        }
        Ok(numerator as f64 / denominator as f64)
    }

    /// String value with trailing NULs stripped.
    ///
    /// Ascii is the normal type; Byte and Undefined are accepted because
    /// some writers store descriptions that way.
    pub async fn read_string(&self, entry: &IfdEntry) -> Result<String, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if !matches!(
            field_type,
            FieldType::Ascii | FieldType::Byte | FieldType::Undefined
        ) {
            return Err(TiffError::InvalidTagValue {
                tag: tag_name(entry),
                message: format!("expected Ascii type for string, got {:?}", field_type),
            });
        }

        let bytes = self.read_bytes(entry).await?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// String value truncated to at most `max_len` bytes.
    ///
    /// Used by format detection, which only needs the first part of an
    /// ImageDescription that may hold megabytes of XML.
    pub async fn read_string_prefix(
        &self,
        entry: &IfdEntry,
        max_len: usize,
    ) -> Result<String, TiffError> {
        if entry.is_inline || entry.count as usize <= max_len {
            return self.read_string(entry).await;
        }

        let offset = entry.value_offset(self.header.byte_order);
        let bytes = self.reader.read_exact_at(offset, max_len).await?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

/// Decode `count` unsigned integers of `field_type` from `bytes`.
///
/// Stops early if `bytes` is shorter than `count` values.
pub fn decode_u64_array(
    bytes: &[u8],
    count: usize,
    field_type: FieldType,
    byte_order: ByteOrder,
) -> Vec<u64> {
    let width = field_type.size_in_bytes();
    bytes
        .chunks_exact(width)
        .take(count)
        .map(|chunk| match width {
            1 => chunk[0] as u64,
            2 => byte_order.read_u16(chunk) as u64,
            4 => byte_order.read_u32(chunk) as u64,
            _ => byte_order.read_u64(chunk),
        })
        .collect()
}

fn tag_name(entry: &IfdEntry) -> &'static str {
    TiffTag::from_u16(entry.tag_id)
        .map(TiffTag::name)
        .unwrap_or("unknown")
}

// =============================================================================
// Tests
// =============================================================================
