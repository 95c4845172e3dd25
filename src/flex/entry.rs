//! Per-entry encoding: `[prevlen][tag + payload]`.
//!
//! `prevlen` is the back-link described in spec §3.2: the total encoded
//! byte length of the *previous* entry (0 for the first entry in the
//! array), stored at the front of the current entry so that `prev` can
//! jump backward in O(1) without a separate index — the same trick used by
//! Redis's ziplist/listpack encodings, which this module's entry framing is
//! modeled on.
//!
//! The payload itself is a small tagged encoding of [`Value`], compact for
//! the common numeric cases per spec §4.1 ("small signed integers may be
//! fully encoded into the prefix; otherwise a typed fixed-width payload").

use crate::flex::varint::{
    read_uvarint, uvarint_len, write_uvarint, zigzag_decode, zigzag_encode,
};
use crate::value::Value;

const TAG_INT: u8 = 0;
const TAG_UINT: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_DOUBLE: u8 = 3;
const TAG_BYTES: u8 = 4;
const TAG_BOOL_TRUE: u8 = 5;
const TAG_BOOL_FALSE: u8 = 6;
const TAG_REF: u8 = 7;

/// Appends the encoded entry (prevlen + tag + payload) for `value` to `out`,
/// given the byte length of the entry immediately preceding it (0 if this
/// is the first entry). Returns the number of bytes appended.
pub fn encode_entry(out: &mut Vec<u8>, value: &Value, prev_entry_len: usize) -> usize {
    let start = out.len();
    write_uvarint(out, prev_entry_len as u64);
    encode_value(out, value);
    out.len() - start
}

fn encode_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Int(v) => {
            out.push(TAG_INT);
            write_uvarint(out, zigzag_encode(*v));
        }
        Value::UInt(v) => {
            out.push(TAG_UINT);
            write_uvarint(out, *v);
        }
        Value::Float(v) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Value::Double(v) => {
            out.push(TAG_DOUBLE);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Value::Bytes(b) => {
            out.push(TAG_BYTES);
            write_uvarint(out, b.len() as u64);
            out.extend_from_slice(b);
        }
        Value::Bool(true) => out.push(TAG_BOOL_TRUE),
        Value::Bool(false) => out.push(TAG_BOOL_FALSE),
        Value::Ref(id) => {
            out.push(TAG_REF);
            write_uvarint(out, *id);
        }
    }
}

/// Decodes the `prevlen` back-link at `offset`. Returns `(prev_entry_len,
/// bytes_consumed_by_prevlen_field)`.
fn decode_prevlen(buf: &[u8], offset: usize) -> (usize, usize) {
    let (value, consumed) = read_uvarint(buf, offset);
    (value as usize, consumed)
}

/// Decodes the tagged value payload starting at `offset` (which must point
/// just past the `prevlen` field). Returns `(value, bytes_consumed)`.
fn decode_value(buf: &[u8], offset: usize) -> (Value, usize) {
    let tag = buf[offset];
    let body = offset + 1;
    match tag {
        TAG_INT => {
            let (raw, n) = read_uvarint(buf, body);
            (Value::Int(zigzag_decode(raw)), 1 + n)
        }
        TAG_UINT => {
            let (raw, n) = read_uvarint(buf, body);
            (Value::UInt(raw), 1 + n)
        }
        TAG_FLOAT => {
            let bytes: [u8; 4] = buf[body..body + 4].try_into().unwrap();
            (Value::Float(f32::from_le_bytes(bytes)), 1 + 4)
        }
        TAG_DOUBLE => {
            let bytes: [u8; 8] = buf[body..body + 8].try_into().unwrap();
            (Value::Double(f64::from_le_bytes(bytes)), 1 + 8)
        }
        TAG_BYTES => {
            let (len, n) = read_uvarint(buf, body);
            let len = len as usize;
            let start = body + n;
            (
                Value::Bytes(buf[start..start + len].to_vec()),
                1 + n + len,
            )
        }
        TAG_BOOL_TRUE => (Value::Bool(true), 1),
        TAG_BOOL_FALSE => (Value::Bool(false), 1),
        TAG_REF => {
            let (id, n) = read_uvarint(buf, body);
            (Value::Ref(id), 1 + n)
        }
        _ => unreachable!("flex buffer corrupted: unknown value tag {tag}"),
    }
}

/// The encoded payload size, in bytes, of `value` on its own (tag byte plus
/// body), without needing to encode it into a buffer first. Used for the
/// byte-size estimate in `Flex::bytes()`.
pub fn value_payload_len_of(value: &Value) -> usize {
    match value {
        Value::Int(v) => 1 + uvarint_byte_len(zigzag_encode(*v)),
        Value::UInt(v) => 1 + uvarint_byte_len(*v),
        Value::Float(_) => 1 + 4,
        Value::Double(_) => 1 + 8,
        Value::Bytes(b) => 1 + uvarint_byte_len(b.len() as u64) + b.len(),
        Value::Bool(_) => 1,
        Value::Ref(id) => 1 + uvarint_byte_len(*id),
    }
}

fn uvarint_byte_len(mut value: u64) -> usize {
    let mut n = 1;
    value >>= 7;
    while value != 0 {
        n += 1;
        value >>= 7;
    }
    n
}

/// The total encoded size, in bytes, of the value payload at `offset`
/// (just past `prevlen`), without materializing a `Value`.
fn value_payload_len(buf: &[u8], offset: usize) -> usize {
    let tag = buf[offset];
    let body = offset + 1;
    match tag {
        TAG_INT | TAG_UINT | TAG_REF => 1 + uvarint_len(buf, body),
        TAG_FLOAT => 1 + 4,
        TAG_DOUBLE => 1 + 8,
        TAG_BYTES => {
            let (len, n) = read_uvarint(buf, body);
            1 + n + len as usize
        }
        TAG_BOOL_TRUE | TAG_BOOL_FALSE => 1,
        _ => unreachable!("flex buffer corrupted: unknown value tag {tag}"),
    }
}

/// Total size in bytes of the entry at `offset` (the `prevlen` field plus
/// the tagged payload), i.e. how far to advance to reach the next entry.
fn entry_total_len(buf: &[u8], offset: usize) -> usize {
    let prevlen_width = uvarint_len(buf, offset);
    prevlen_width + value_payload_len(buf, offset + prevlen_width)
}

/// Decodes every entry out of a buffer produced by repeated [`encode_entry`]
/// calls, back into an ordered `Vec<Value>`. This is the real consumer of
/// the decode quartet above: [`Flex::from_packed`](crate::flex::Flex::from_packed)
/// uses it to reconstruct a `Flex` from its own `pack()` output, which lets
/// the determinism property (spec §6.3, §8 property 11 — "two fresh arrays
/// built from the same ordered inserts pack to identical bytes") be checked
/// through an actual decode round-trip rather than only through `pack()`
/// byte-equality.
///
/// Also checks, in debug builds, that each entry's `prevlen` back-link
/// matches the actual encoded length of the entry before it — the
/// consistency the back-link exists to let `prev(entry)` rely on.
#[must_use]
pub fn decode_all(buf: &[u8]) -> Vec<Value> {
    let mut out = Vec::new();
    let mut offset = 0;
    let mut prev_len = 0usize;
    while offset < buf.len() {
        let entry_start = offset;
        let (prevlen, prevlen_width) = decode_prevlen(buf, offset);
        debug_assert_eq!(prevlen, prev_len, "back-link does not match preceding entry's length");
        let (value, value_width) = decode_value(buf, offset + prevlen_width);
        out.push(value);
        prev_len = entry_total_len(buf, entry_start);
        offset = entry_start + prevlen_width + value_width;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_variant() {
        let values = vec![
            Value::Int(-42),
            Value::UInt(42),
            Value::Float(1.5),
            Value::Double(-2.25),
            Value::Bytes(b"hello world".to_vec()),
            Value::Bool(true),
            Value::Bool(false),
            Value::Ref(7),
        ];
        for v in values {
            let mut buf = Vec::new();
            let n = encode_entry(&mut buf, &v, 0);
            assert_eq!(n, buf.len());
            let (prevlen, pn) = decode_prevlen(&buf, 0);
            assert_eq!(prevlen, 0);
            let (decoded, vn) = decode_value(&buf, pn);
            assert_eq!(decoded, v);
            assert_eq!(pn + vn, entry_total_len(&buf, 0));
        }
    }

    #[test]
    fn prevlen_round_trips() {
        let mut buf = Vec::new();
        encode_entry(&mut buf, &Value::Int(1), 123);
        let (prevlen, _) = decode_prevlen(&buf, 0);
        assert_eq!(prevlen, 123);
    }

    #[test]
    fn decode_all_reconstructs_a_multi_entry_buffer() {
        let values = vec![
            Value::Int(-1),
            Value::Bytes(b"member".to_vec()),
            Value::Double(2.5),
            Value::Bool(true),
        ];
        let mut buf = Vec::new();
        let mut prev_len = 0usize;
        for v in &values {
            prev_len = encode_entry(&mut buf, v, prev_len);
        }
        assert_eq!(decode_all(&buf), values);
    }
}
