#![allow(unused)]

use crate::{Endian, Reader, Registry, Writer};
use pretty_assertions::{assert_eq, assert_str_eq};
use std::any::Any;
use std::fmt::Write as _;

const BYTES_PER_ROW: usize = 16;
const CONTEXT_ROWS_BEFORE: usize = 6;
const CONTEXT_ROWS_AFTER: usize = 3;

/// One row of a hex dump: offset, bytes in groups of four, printable characters
fn dump_row(out: &mut String, offset: usize, row: &[u8]) {
    let _ = write!(out, "{offset:08X}");

    for index in 0..BYTES_PER_ROW {
        if index % 4 == 0 {
            out.push(' ');
        }

        match row.get(index) {
            Some(byte) => {
                let _ = write!(out, " {byte:02X}");
            }
            None => out.push_str("   "),
        }
    }

    out.push_str("  ");
    out.extend(row.iter().map(|byte| {
        if byte.is_ascii_graphic() || *byte == b' ' {
            *byte as char
        } else {
            '.'
        }
    }));
    out.push('\n');
}

/// Hex dump of the rows around `offset`
fn dump_around(bytes: &[u8], offset: usize) -> String {
    let center = offset / BYTES_PER_ROW;
    let first = center.saturating_sub(CONTEXT_ROWS_BEFORE);
    let last = (center + CONTEXT_ROWS_AFTER).min(bytes.len().saturating_sub(1) / BYTES_PER_ROW);

    let mut out = String::new();
    for row in first..=last {
        let start = row * BYTES_PER_ROW;
        let end = (start + BYTES_PER_ROW).min(bytes.len());
        dump_row(&mut out, start, bytes.get(start..end).unwrap_or_default());
    }

    out
}

/// Compare two message bodies and show a hex dump around the first difference
pub fn assert_bytes_eq(expected: &[u8], actual: &[u8], context: &str) {
    let first_difference = (0..expected.len().max(actual.len()))
        .find(|index| expected.get(*index) != actual.get(*index));

    if let Some(offset) = first_difference {
        eprintln!("{context}: bodies differ at offset {offset}");
        assert_str_eq!(dump_around(expected, offset), dump_around(actual, offset));
    }
}

/// The zvariant encoding of `value` as a D-Bus message body
pub fn zvariant_body<T>(value: &T, endian: Endian) -> Vec<u8>
where
    T: zvariant::Type + serde::Serialize,
{
    let context = zvariant::serialized::Context::new_dbus(endian.into(), 0);
    zvariant::to_bytes(context, value).unwrap().to_vec()
}

/// Marshall `value` and demarshall it again, asserting the body is consumed completely
pub fn round_trip<T: Any>(registry: &Registry, value: &T, endian: Endian) -> T {
    let mut writer = Writer::with_endian(registry, endian);
    writer.append(value).unwrap();
    let (body, _) = writer.finish().unwrap();

    let mut reader = Reader::new(registry, body, endian);
    let read = reader.read::<T>().unwrap();
    assert!(reader.at_end());
    assert_eq!(reader.remaining(), 0);
    read
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn assert_bytes_eq_equal() {
        assert_bytes_eq(&[1, 2, 3], &[1, 2, 3], "test");
        assert_bytes_eq(&[], &[], "test");
        // exactly two rows
        assert_bytes_eq(
            b"a D-Bus body of thirty-two bytes",
            b"a D-Bus body of thirty-two bytes",
            "test",
        );
    }

    #[test]
    #[should_panic]
    fn assert_bytes_eq_different() {
        assert_bytes_eq(&[1, 2, 4], &[1, 2, 3], "test");
    }

    #[test]
    #[should_panic]
    fn assert_bytes_eq_longer() {
        assert_bytes_eq(&[1, 2, 3, 4], &[1, 2, 3], "test");
    }

    #[test]
    #[should_panic]
    fn assert_bytes_eq_shorter() {
        assert_bytes_eq(&[1, 2, 3], &[1, 2, 3, 4], "test");
    }

    #[test]
    fn dump() {
        let dump = dump_around(b"(is)\0\0\0\0", 0);
        assert_eq!(
            dump,
            "00000000  28 69 73 29  00 00 00 00                            (is)....\n"
        );
    }

    #[test]
    fn dump_full_rows() {
        let body = b"a D-Bus body of thirty-two bytes";
        let dump = dump_around(body, 20);
        assert_eq!(dump.lines().count(), 2);
        assert!(dump.lines().last().unwrap().starts_with("00000010 "));
        assert!(dump.ends_with("thirty-two bytes\n"));
    }

    #[test]
    fn round_trip_builtin() {
        let registry = Registry::new();
        assert_eq!(round_trip(&registry, &0x1234u16, Endian::Big), 0x1234);
        assert_eq!(
            round_trip(&registry, &String::from("round trip"), Endian::Little),
            "round trip"
        );
    }
}
