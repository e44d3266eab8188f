//! Canonical hex dump: offset, sixteen hex columns split in two halves, ASCII gutter.

use std::fmt::Write;

const BYTES_PER_ROW: usize = 16;

/// Dump `data` in the canonical `hexdump -C` layout, without the trailing offset line.
///
/// Every row ends in a newline. Empty input yields an empty string.
pub fn dump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(BYTES_PER_ROW) * 79);

    for (row, chunk) in data.chunks(BYTES_PER_ROW).enumerate() {
        let _ = write!(out, "{:08x}  ", row * BYTES_PER_ROW);

        for column in 0..BYTES_PER_ROW {
            match chunk.get(column) {
                Some(byte) => {
                    let _ = write!(out, "{:02x} ", byte);
                }
                None => out.push_str("   "),
            }
            if column == 7 || column == BYTES_PER_ROW - 1 {
                out.push(' ');
            }
        }

        out.push('|');
        out.extend(chunk.iter().map(|&b| printable(b)));
        out.push_str("|\n");
    }

    out
}

fn printable(byte: u8) -> char {
    if (0x20..=0x7e).contains(&byte) {
        byte as char
    } else {
        '.'
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        assert_eq!(dump(&[]), "");
    }

    #[test]
    fn test_int_body() {
        let expected = format!("00000000  00 00 00 2a {}|...*|\n", " ".repeat(38));
        assert_eq!(dump(&[0x00, 0x00, 0x00, 0x2a]), expected);
    }

    #[test]
    fn test_full_row() {
        let data: Vec<u8> = (0x41..0x51).collect();
        assert_eq!(
            dump(&data),
            "00000000  41 42 43 44 45 46 47 48  49 4a 4b 4c 4d 4e 4f 50  |ABCDEFGHIJKLMNOP|\n"
        );
    }

    #[test]
    fn test_second_row_offset_and_padding() {
        let mut data = vec![b'a'; 16];
        data.extend_from_slice(&[0x7f, b' ', 0x0a]);
        let out = dump(&data);
        let rows: Vec<&str> = out.lines().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].ends_with("|aaaaaaaaaaaaaaaa|"));
        assert_eq!(
            rows[1],
            format!("00000010  7f 20 0a {}|. .|", " ".repeat(41))
        );
    }

    #[test]
    fn test_rows_align() {
        let out = dump(&[0u8; 20]);
        let rows: Vec<&str> = out.lines().collect();
        assert_eq!(rows[0].find('|'), rows[1].find('|'));
    }
}
