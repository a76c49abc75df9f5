//! Stata `.dta` writer, release 118.
//!
//! Release 118 is an XML-tagged little-endian binary: a `<header>` with
//! release/byteorder/K/N, a `<map>` of fourteen section offsets, fixed-width
//! descriptor blocks per variable, then row-major data records. Text columns
//! are written as fixed-width `str{w}`; every numeric column is written as
//! `double`, with Stata's system-missing bit pattern for nulls.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::Result;
use crate::export::{ColumnValues, OutputColumn};

/// Variable type code for `double`.
const TYPE_DOUBLE: u16 = 65526;
/// Maximum fixed-width string length; longer values are truncated at write.
const MAX_STR_WIDTH: usize = 2045;
/// Bit pattern of the `double` system-missing value (`.`).
const MISSING_DOUBLE: u64 = 0x7FE0_0000_0000_0000;

/// Bytes reserved per variable name (32 UTF-8 chars × 4 bytes + NUL).
const VARNAME_LEN: usize = 129;
/// Bytes reserved per display format.
const FORMAT_LEN: usize = 57;
/// Bytes reserved per variable label (80 UTF-8 chars × 4 bytes + NUL).
const VARLABEL_LEN: usize = 321;
/// Number of offsets in the `<map>` section.
const MAP_ENTRIES: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarType {
    /// Fixed-width string, 1..=2045 bytes.
    Str(u16),
    Double,
}

impl VarType {
    fn code(self) -> u16 {
        match self {
            VarType::Str(width) => width,
            VarType::Double => TYPE_DOUBLE,
        }
    }

    fn format(self) -> String {
        match self {
            VarType::Str(width) => format!("%{width}s"),
            VarType::Double => "%10.0g".to_string(),
        }
    }
}

fn var_type(column: &OutputColumn) -> VarType {
    match &column.values {
        ColumnValues::Str(values) => {
            let width = values
                .iter()
                .map(|v| v.len())
                .max()
                .unwrap_or(0)
                .clamp(1, MAX_STR_WIDTH);
            VarType::Str(width as u16)
        }
        ColumnValues::Num(_) => VarType::Double,
    }
}

/// Encodes the dataset into `.dta` release-118 bytes. Deterministic given a
/// fixed `timestamp`.
pub(crate) fn encode(
    columns: &[OutputColumn],
    rows: usize,
    timestamp: DateTime<Utc>,
) -> Vec<u8> {
    let types: Vec<VarType> = columns.iter().map(var_type).collect();
    let k = columns.len() as u16;

    let mut buf = Vec::new();
    let mut map = [0u64; MAP_ENTRIES];

    // map[0]: start of file
    buf.extend_from_slice(b"<stata_dta>");

    buf.extend_from_slice(b"<header>");
    buf.extend_from_slice(b"<release>118</release>");
    buf.extend_from_slice(b"<byteorder>LSF</byteorder>");
    buf.extend_from_slice(b"<K>");
    buf.extend_from_slice(&k.to_le_bytes());
    buf.extend_from_slice(b"</K>");
    buf.extend_from_slice(b"<N>");
    buf.extend_from_slice(&(rows as u64).to_le_bytes());
    buf.extend_from_slice(b"</N>");
    // Empty dataset label: u16 length prefix of zero
    buf.extend_from_slice(b"<label>");
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(b"</label>");
    // 17-byte "dd Mon yyyy HH:MM" stamp behind a one-byte length
    let stamp = timestamp.format("%d %b %Y %H:%M").to_string();
    buf.extend_from_slice(b"<timestamp>");
    buf.push(stamp.len() as u8);
    buf.extend_from_slice(stamp.as_bytes());
    buf.extend_from_slice(b"</timestamp>");
    buf.extend_from_slice(b"</header>");

    // The map is patched in place once every section offset is known
    map[1] = buf.len() as u64;
    buf.extend_from_slice(b"<map>");
    let map_value_pos = buf.len();
    buf.extend_from_slice(&[0u8; MAP_ENTRIES * 8]);
    buf.extend_from_slice(b"</map>");

    map[2] = buf.len() as u64;
    buf.extend_from_slice(b"<variable_types>");
    for t in &types {
        buf.extend_from_slice(&t.code().to_le_bytes());
    }
    buf.extend_from_slice(b"</variable_types>");

    map[3] = buf.len() as u64;
    buf.extend_from_slice(b"<varnames>");
    for column in columns {
        push_padded(&mut buf, column.name.as_bytes(), VARNAME_LEN);
    }
    buf.extend_from_slice(b"</varnames>");

    // No sort order: K+1 zeroed two-byte entries
    map[4] = buf.len() as u64;
    buf.extend_from_slice(b"<sortlist>");
    buf.extend(std::iter::repeat(0u8).take((k as usize + 1) * 2));
    buf.extend_from_slice(b"</sortlist>");

    map[5] = buf.len() as u64;
    buf.extend_from_slice(b"<formats>");
    for t in &types {
        push_padded(&mut buf, t.format().as_bytes(), FORMAT_LEN);
    }
    buf.extend_from_slice(b"</formats>");

    map[6] = buf.len() as u64;
    buf.extend_from_slice(b"<value_label_names>");
    buf.extend(std::iter::repeat(0u8).take(k as usize * VARNAME_LEN));
    buf.extend_from_slice(b"</value_label_names>");

    map[7] = buf.len() as u64;
    buf.extend_from_slice(b"<variable_labels>");
    buf.extend(std::iter::repeat(0u8).take(k as usize * VARLABEL_LEN));
    buf.extend_from_slice(b"</variable_labels>");

    map[8] = buf.len() as u64;
    buf.extend_from_slice(b"<characteristics>");
    buf.extend_from_slice(b"</characteristics>");

    map[9] = buf.len() as u64;
    buf.extend_from_slice(b"<data>");
    for row in 0..rows {
        for (column, t) in columns.iter().zip(&types) {
            match &column.values {
                // A string column's type code is exactly its width
                ColumnValues::Str(values) => {
                    push_str_cell(&mut buf, &values[row], t.code() as usize);
                }
                ColumnValues::Num(values) => {
                    let bits = match values[row] {
                        Some(v) => v.to_le_bytes(),
                        None => MISSING_DOUBLE.to_le_bytes(),
                    };
                    buf.extend_from_slice(&bits);
                }
            }
        }
    }
    buf.extend_from_slice(b"</data>");

    map[10] = buf.len() as u64;
    buf.extend_from_slice(b"<strls>");
    buf.extend_from_slice(b"</strls>");

    map[11] = buf.len() as u64;
    buf.extend_from_slice(b"<value_labels>");
    buf.extend_from_slice(b"</value_labels>");

    map[12] = buf.len() as u64;
    buf.extend_from_slice(b"</stata_dta>");
    map[13] = buf.len() as u64;

    for (i, offset) in map.iter().enumerate() {
        let at = map_value_pos + i * 8;
        buf[at..at + 8].copy_from_slice(&offset.to_le_bytes());
    }

    buf
}

/// Writes `value` zero-padded to exactly `len` bytes.
fn push_padded(buf: &mut Vec<u8>, value: &[u8], len: usize) {
    let take = value.len().min(len - 1);
    buf.extend_from_slice(&value[..take]);
    buf.extend(std::iter::repeat(0u8).take(len - take));
}

/// Writes one fixed-width string cell, truncated at a char boundary if the
/// value exceeds the column width.
fn push_str_cell(buf: &mut Vec<u8>, value: &str, width: usize) {
    let mut take = value.len().min(width);
    while take > 0 && !value.is_char_boundary(take) {
        take -= 1;
    }
    buf.extend_from_slice(&value.as_bytes()[..take]);
    buf.extend(std::iter::repeat(0u8).take(width - take));
}

/// Encodes and writes the dataset to `path`.
pub fn write_dta(
    columns: &[OutputColumn],
    rows: usize,
    path: &Path,
    timestamp: DateTime<Utc>,
) -> Result<()> {
    let bytes = encode(columns, rows, timestamp);
    debug!(path = %path.display(), bytes = bytes.len(), rows, "Writing Stata output");
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 15, 9, 30, 0).unwrap()
    }

    fn sample_columns() -> Vec<OutputColumn> {
        vec![
            OutputColumn {
                name: "city",
                values: ColumnValues::Str(vec!["austin".to_string(), "dallas".to_string()]),
            },
            OutputColumn {
                name: "median_rent",
                values: ColumnValues::Num(vec![Some(1500.0), None]),
            },
        ]
    }

    fn find(haystack: &[u8], needle: &[u8]) -> usize {
        haystack
            .windows(needle.len())
            .position(|w| w == needle)
            .unwrap()
    }

    fn map_entry(bytes: &[u8], index: usize) -> u64 {
        let map_values = find(bytes, b"<map>") + b"<map>".len();
        let at = map_values + index * 8;
        u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
    }

    #[test]
    fn test_header_literals_and_counts() {
        let bytes = encode(&sample_columns(), 2, fixed_timestamp());

        assert!(bytes.starts_with(b"<stata_dta><header><release>118</release>"));
        assert!(bytes.ends_with(b"</stata_dta>"));

        let k_at = find(&bytes, b"<K>") + 3;
        assert_eq!(u16::from_le_bytes([bytes[k_at], bytes[k_at + 1]]), 2);

        let n_at = find(&bytes, b"<N>") + 3;
        assert_eq!(
            u64::from_le_bytes(bytes[n_at..n_at + 8].try_into().unwrap()),
            2
        );
    }

    #[test]
    fn test_timestamp_is_17_bytes() {
        let bytes = encode(&sample_columns(), 2, fixed_timestamp());
        let at = find(&bytes, b"<timestamp>") + b"<timestamp>".len();
        assert_eq!(bytes[at], 17);
        let stamp = &bytes[at + 1..at + 18];
        assert_eq!(stamp, b"15 Nov 2025 09:30");
    }

    #[test]
    fn test_map_offsets_land_on_section_tags() {
        let bytes = encode(&sample_columns(), 2, fixed_timestamp());

        let expectations: [(usize, &[u8]); 13] = [
            (0, b"<stata_dta>"),
            (1, b"<map>"),
            (2, b"<variable_types>"),
            (3, b"<varnames>"),
            (4, b"<sortlist>"),
            (5, b"<formats>"),
            (6, b"<value_label_names>"),
            (7, b"<variable_labels>"),
            (8, b"<characteristics>"),
            (9, b"<data>"),
            (10, b"<strls>"),
            (11, b"<value_labels>"),
            (12, b"</stata_dta>"),
        ];
        for (index, tag) in expectations {
            let offset = map_entry(&bytes, index) as usize;
            assert!(
                bytes[offset..].starts_with(tag),
                "map[{index}] does not point at {:?}",
                String::from_utf8_lossy(tag)
            );
        }
        assert_eq!(map_entry(&bytes, 13), bytes.len() as u64);
    }

    #[test]
    fn test_variable_types_str_width_and_double() {
        let bytes = encode(&sample_columns(), 2, fixed_timestamp());
        let at = find(&bytes, b"<variable_types>") + b"<variable_types>".len();

        // city: widest value "austin" = 6 bytes
        assert_eq!(u16::from_le_bytes([bytes[at], bytes[at + 1]]), 6);
        assert_eq!(
            u16::from_le_bytes([bytes[at + 2], bytes[at + 3]]),
            TYPE_DOUBLE
        );
    }

    #[test]
    fn test_data_records_pad_strings_and_encode_missing() {
        let bytes = encode(&sample_columns(), 2, fixed_timestamp());
        let data_at = find(&bytes, b"<data>") + b"<data>".len();

        // Row 0: "austin" fills the width exactly, then 1500.0 as LE double
        assert_eq!(&bytes[data_at..data_at + 6], b"austin");
        assert_eq!(
            &bytes[data_at + 6..data_at + 14],
            &1500.0f64.to_le_bytes()
        );

        // Row 1: "dallas", then the system-missing double pattern
        let row1 = data_at + 14;
        assert_eq!(&bytes[row1..row1 + 6], b"dallas");
        assert_eq!(
            &bytes[row1 + 6..row1 + 14],
            &MISSING_DOUBLE.to_le_bytes()
        );
    }

    #[test]
    fn test_short_string_is_zero_padded() {
        let columns = vec![OutputColumn {
            name: "city",
            values: ColumnValues::Str(vec!["ab".to_string(), "wxyz".to_string()]),
        }];
        let bytes = encode(&columns, 2, fixed_timestamp());
        let data_at = find(&bytes, b"<data>") + b"<data>".len();

        assert_eq!(&bytes[data_at..data_at + 4], b"ab\0\0");
        assert_eq!(&bytes[data_at + 4..data_at + 8], b"wxyz");
    }

    #[test]
    fn test_formats_block() {
        let bytes = encode(&sample_columns(), 2, fixed_timestamp());
        let at = find(&bytes, b"<formats>") + b"<formats>".len();

        assert_eq!(&bytes[at..at + 3], b"%6s");
        let second = at + FORMAT_LEN;
        assert_eq!(&bytes[second..second + 6], b"%10.0g");
    }

    #[test]
    fn test_varnames_are_129_byte_slots() {
        let bytes = encode(&sample_columns(), 2, fixed_timestamp());
        let at = find(&bytes, b"<varnames>") + b"<varnames>".len();

        assert_eq!(&bytes[at..at + 4], b"city");
        assert_eq!(bytes[at + 4], 0);
        let second = at + VARNAME_LEN;
        assert_eq!(&bytes[second..second + 11], b"median_rent");
    }

    #[test]
    fn test_empty_string_column_has_width_one() {
        let columns = vec![OutputColumn {
            name: "city",
            values: ColumnValues::Str(vec![String::new()]),
        }];
        let bytes = encode(&columns, 1, fixed_timestamp());
        let at = find(&bytes, b"<variable_types>") + b"<variable_types>".len();
        assert_eq!(u16::from_le_bytes([bytes[at], bytes[at + 1]]), 1);
    }

    #[test]
    fn test_deterministic_for_fixed_timestamp() {
        let a = encode(&sample_columns(), 2, fixed_timestamp());
        let b = encode(&sample_columns(), 2, fixed_timestamp());
        assert_eq!(a, b);
    }
}
