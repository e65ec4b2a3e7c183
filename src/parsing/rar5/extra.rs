//! RAR5 extra area.
//!
//! The extra area is a list of records, each:
//! - vint: size of type + data
//! - vint: type
//! - data
//!
//! What a type means depends on the header that owns the area, so decoding
//! is delegated to an [`ExtraFieldSink`] implemented per header kind.

use crate::cursor::ByteCursor;
use crate::error::{Result, Violation};
use crate::parsing::RecordCursor;

/// Receiver of decoded extra area records.
pub trait ExtraFieldSink {
    /// Handle one record. `payload` covers exactly the record's data, so
    /// reading past it is an overrun. Unknown tags should be ignored.
    fn field(&mut self, tag: u64, payload: &mut RecordCursor<'_>) -> Result<()>;
}

/// The extra area of one header.
#[derive(Debug, Clone, Copy)]
pub struct ExtraFieldTable<'a> {
    area: &'a [u8],
}

impl<'a> ExtraFieldTable<'a> {
    pub fn new(area: &'a [u8]) -> Self {
        Self { area }
    }

    pub fn is_empty(&self) -> bool {
        self.area.is_empty()
    }

    pub fn len(&self) -> usize {
        self.area.len()
    }

    /// Feed every record to `sink`, stopping when fewer than two bytes are
    /// left.
    pub fn decode<K: ExtraFieldSink + ?Sized>(&self, sink: &mut K) -> Result<()> {
        let mut cursor = ByteCursor::over_record(self.area);
        while cursor.remaining().len() >= 2 {
            let size = cursor.read_varint()?;
            let remaining = cursor.remaining().len() as u64;
            if size == 0 || size > remaining {
                return Err(Violation::ExtraFieldOverrun {
                    declared: size,
                    remaining,
                }
                .into());
            }
            let record = cursor.take(size as usize)?;
            let mut payload = ByteCursor::over_record(record);
            let tag = payload.read_varint()?;
            sink.field(tag, &mut payload)?;
        }
        Ok(())
    }
}

/// Read a vint length followed by that many bytes, as UTF-8.
pub(crate) fn read_string(payload: &mut RecordCursor<'_>) -> Result<String> {
    let len = payload.read_varint()?;
    let len = usize::try_from(len).map_err(|_| Violation::FieldOverrun)?;
    Ok(String::from_utf8_lossy(payload.take(len)?).into_owned())
}
