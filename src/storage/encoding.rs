//! Row codec: a typed row packs into a fixed-width byte slab.
//!
//! Layout: a bit-packed null map of `⌈num_columns/8⌉` bytes, then one fixed
//! slot per column at `offset(i) = null_map_len + Σ_{j<i} columns[j].size`.
//! Numeric scalars are little-endian fixed width, strings are zero-padded.
//! The slab length is what leaf cells store, so every capacity computation
//! in the tree goes through [`cell_value_size`].

use super::column::{Column, ColumnKind, OptionalValue, Value};
use super::row::Row;
use crate::errors::Error;
use bincode::config::{self, Configuration, Fixint};
use bincode::{decode_from_slice, encode_into_slice};

/// Fixed-width little-endian scalars, per the on-disk row layout.
fn codec_config() -> Configuration<config::LittleEndian, Fixint> {
    config::standard().with_fixed_int_encoding()
}

/// Bytes occupied by the null bitmap for a column list.
pub fn null_map_len(columns: &[Column]) -> usize {
    (columns.len() + 7) / 8
}

/// Semantic row size: the sum of the declared column sizes.
pub fn row_size(columns: &[Column]) -> usize {
    columns.iter().map(|c| c.size()).sum()
}

/// Full slab length: null bitmap plus the fixed column slots. This is the
/// leaf cell payload size.
pub fn cell_value_size(columns: &[Column]) -> usize {
    null_map_len(columns) + row_size(columns)
}

/// Packs a row into its slab. Fails with an `Encoding` error when a value's
/// dynamic type does not match the declared column kind.
pub fn encode_row(columns: &[Column], row: &Row) -> Result<Vec<u8>, Error> {
    if row.values.len() != columns.len() {
        return Err(err!(
            Encoding,
            "Row has {} values but the table has {} columns.",
            row.values.len(),
            columns.len()
        ));
    }

    let map_len = null_map_len(columns);
    let mut buf = vec![0u8; cell_value_size(columns)];
    let mut offset = map_len;

    for (idx, (column, value)) in columns.iter().zip(&row.values).enumerate() {
        let size = column.size();
        let slot = &mut buf[offset..offset + size];
        match value.value() {
            None => {
                buf[idx / 8] |= 1 << (idx % 8);
            }
            Some(v) => encode_value(v, column, slot)?,
        }
        offset += size;
    }
    Ok(buf)
}

/// Inverse of [`encode_row`].
pub fn decode_row(columns: &[Column], encoded: &[u8]) -> Result<Row, Error> {
    let expected = cell_value_size(columns);
    if encoded.len() != expected {
        return Err(err!(
            Encoding,
            "Encoded row size mismatch: expected {}, got {}.",
            expected,
            encoded.len()
        ));
    }

    let map_len = null_map_len(columns);
    let mut values = Vec::with_capacity(columns.len());
    let mut offset = map_len;

    for (idx, column) in columns.iter().enumerate() {
        let size = column.size();
        let is_null = encoded[idx / 8] & (1 << (idx % 8)) != 0;
        if is_null {
            values.push(OptionalValue::null());
        } else {
            let slot = &encoded[offset..offset + size];
            values.push(OptionalValue::some(decode_value(column, slot)?));
        }
        offset += size;
    }
    Ok(Row::new(values))
}

fn encode_value(value: &Value, column: &Column, slot: &mut [u8]) -> Result<(), Error> {
    if !value.matches_kind(&column.kind) {
        return Err(err!(
            Encoding,
            "Value {:?} cannot be stored in column '{}' of type {}.",
            value,
            column.name,
            column.kind
        ));
    }
    match value {
        Value::Boolean(v) => encode_scalar(v, column, slot)?,
        Value::Int4(v) => encode_scalar(v, column, slot)?,
        Value::Int8(v) => encode_scalar(v, column, slot)?,
        Value::Real(v) => encode_scalar(v, column, slot)?,
        Value::Double(v) => encode_scalar(v, column, slot)?,
        Value::Timestamp(v) => encode_scalar(v, column, slot)?,
        Value::Varchar(s) | Value::Text(s) => {
            let bytes = s.as_bytes();
            if bytes.len() > slot.len() {
                return Err(err!(
                    Encoding,
                    "String of {} bytes exceeds the {}-byte slot of column '{}'.",
                    bytes.len(),
                    slot.len(),
                    column.name
                ));
            }
            slot[..bytes.len()].copy_from_slice(bytes);
        }
    }
    Ok(())
}

fn encode_scalar<T: bincode::Encode>(
    value: &T,
    column: &Column,
    slot: &mut [u8],
) -> Result<(), Error> {
    encode_into_slice(value, slot, codec_config())
        .map_err(|e| err!(Encoding, "Failed to encode column '{}'. {}", column.name, e))?;
    Ok(())
}

fn decode_value(column: &Column, slot: &[u8]) -> Result<Value, Error> {
    Ok(match &column.kind {
        ColumnKind::Boolean => Value::Boolean(decode_scalar(column, slot)?),
        ColumnKind::Int4 => Value::Int4(decode_scalar(column, slot)?),
        ColumnKind::Int8 => Value::Int8(decode_scalar(column, slot)?),
        ColumnKind::Real => Value::Real(decode_scalar(column, slot)?),
        ColumnKind::Double => Value::Double(decode_scalar(column, slot)?),
        ColumnKind::Timestamp => Value::Timestamp(decode_scalar(column, slot)?),
        // Zero-trim: text containing embedded NUL bytes is unsupported.
        ColumnKind::Varchar(_) | ColumnKind::Text => {
            let trimmed = slot.split(|&b| b == 0).next().unwrap_or(&[]);
            let s = std::str::from_utf8(trimmed)
                .map_err(|e| {
                    err!(Encoding, "Column '{}' holds invalid UTF-8. {}", column.name, e)
                })?
                .to_string();
            match column.kind {
                ColumnKind::Text => Value::Text(s),
                _ => Value::Varchar(s),
            }
        }
    })
}

fn decode_scalar<T: bincode::Decode<()>>(column: &Column, slot: &[u8]) -> Result<T, Error> {
    let (value, _) = decode_from_slice::<T, _>(slot, codec_config())
        .map_err(|e| err!(Encoding, "Failed to decode column '{}'. {}", column.name, e))?;
    Ok(value)
}
