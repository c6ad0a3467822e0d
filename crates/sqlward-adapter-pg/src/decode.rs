//! Row decoding: resolves each column's type and hands the raw payload to
//! the wire decoders.

use crate::wire;
use sqlward_runtime::NativeValue;
use sqlx::postgres::{PgRow, PgTypeInfo, PgTypeKind, PgValueFormat};
use sqlx::{Row, TypeInfo, ValueRef};

pub(crate) fn decode_row(row: &PgRow) -> anyhow::Result<Vec<NativeValue>> {
    (0..row.len()).map(|idx| decode_column(row, idx)).collect()
}

fn decode_column(row: &PgRow, idx: usize) -> anyhow::Result<NativeValue> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(NativeValue::Null);
    }
    match raw.format() {
        PgValueFormat::Text => {
            let text = raw.as_str().map_err(|e| anyhow::anyhow!(e))?;
            Ok(NativeValue::Text(text.to_string()))
        }
        PgValueFormat::Binary => {
            let type_info = raw.type_info().into_owned();
            let bytes = raw.as_bytes().map_err(|e| anyhow::anyhow!(e))?;
            Ok(decode_binary(&type_info, bytes))
        }
    }
}

fn decode_binary(type_info: &PgTypeInfo, bytes: &[u8]) -> NativeValue {
    let decoded = match type_info.kind() {
        PgTypeKind::Domain(base) => return decode_binary(base, bytes),
        PgTypeKind::Array(_) => wire::decode_array(bytes),
        PgTypeKind::Range(subtype) => subtype
            .oid()
            .and_then(|oid| wire::decode_range(oid.0, bytes)),
        _ => type_info.oid().and_then(|oid| wire::decode(oid.0, bytes)),
    };
    decoded.unwrap_or_else(|| {
        tracing::trace!(type_name = type_info.name(), "no binary decoder, using raw payload");
        wire::fallback(bytes)
    })
}
