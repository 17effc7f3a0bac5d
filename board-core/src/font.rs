//! 3×5 Pixel-Font für die Laufschrift
//!
//! Jede Glyphe besteht aus fünf Zeilen à drei Bit (Bit 2 = linke Spalte).
//! Kleinbuchstaben werden als Großbuchstaben dargestellt.

pub const GLYPH_WIDTH: usize = 3;
pub const GLYPH_HEIGHT: usize = 5;
/// Vorschub pro Zeichen (Glyphe + eine Spalte Abstand)
pub const GLYPH_ADVANCE: i16 = 4;

pub type Glyph = [u8; GLYPH_HEIGHT];

// ASCII 0x20 (' ') bis 0x5F ('_')
const ASCII: [Glyph; 64] = [
    [0b000, 0b000, 0b000, 0b000, 0b000], // ' '
    [0b010, 0b010, 0b010, 0b000, 0b010], // !
    [0b101, 0b101, 0b000, 0b000, 0b000], // "
    [0b101, 0b111, 0b101, 0b111, 0b101], // #
    [0b011, 0b110, 0b010, 0b011, 0b110], // $
    [0b101, 0b001, 0b010, 0b100, 0b101], // %
    [0b010, 0b101, 0b010, 0b101, 0b011], // &
    [0b010, 0b010, 0b000, 0b000, 0b000], // '
    [0b001, 0b010, 0b010, 0b010, 0b001], // (
    [0b100, 0b010, 0b010, 0b010, 0b100], // )
    [0b000, 0b101, 0b010, 0b101, 0b000], // *
    [0b000, 0b010, 0b111, 0b010, 0b000], // +
    [0b000, 0b000, 0b000, 0b010, 0b100], // ,
    [0b000, 0b000, 0b111, 0b000, 0b000], // -
    [0b000, 0b000, 0b000, 0b000, 0b010], // .
    [0b001, 0b001, 0b010, 0b100, 0b100], // /
    [0b111, 0b101, 0b101, 0b101, 0b111], // 0
    [0b010, 0b110, 0b010, 0b010, 0b111], // 1
    [0b110, 0b001, 0b010, 0b100, 0b111], // 2
    [0b110, 0b001, 0b010, 0b001, 0b110], // 3
    [0b101, 0b101, 0b111, 0b001, 0b001], // 4
    [0b111, 0b100, 0b110, 0b001, 0b110], // 5
    [0b011, 0b100, 0b111, 0b101, 0b111], // 6
    [0b111, 0b001, 0b010, 0b100, 0b100], // 7
    [0b111, 0b101, 0b111, 0b101, 0b111], // 8
    [0b111, 0b101, 0b111, 0b001, 0b110], // 9
    [0b000, 0b010, 0b000, 0b010, 0b000], // :
    [0b000, 0b010, 0b000, 0b010, 0b100], // ;
    [0b001, 0b010, 0b100, 0b010, 0b001], // <
    [0b000, 0b111, 0b000, 0b111, 0b000], // =
    [0b100, 0b010, 0b001, 0b010, 0b100], // >
    [0b111, 0b001, 0b010, 0b000, 0b010], // ?
    [0b010, 0b101, 0b111, 0b100, 0b011], // @
    [0b010, 0b101, 0b111, 0b101, 0b101], // A
    [0b110, 0b101, 0b110, 0b101, 0b110], // B
    [0b011, 0b100, 0b100, 0b100, 0b011], // C
    [0b110, 0b101, 0b101, 0b101, 0b110], // D
    [0b111, 0b100, 0b111, 0b100, 0b111], // E
    [0b111, 0b100, 0b111, 0b100, 0b100], // F
    [0b011, 0b100, 0b111, 0b101, 0b011], // G
    [0b101, 0b101, 0b111, 0b101, 0b101], // H
    [0b111, 0b010, 0b010, 0b010, 0b111], // I
    [0b001, 0b001, 0b001, 0b101, 0b010], // J
    [0b101, 0b101, 0b110, 0b101, 0b101], // K
    [0b100, 0b100, 0b100, 0b100, 0b111], // L
    [0b101, 0b111, 0b111, 0b101, 0b101], // M
    [0b101, 0b111, 0b111, 0b111, 0b101], // N
    [0b010, 0b101, 0b101, 0b101, 0b010], // O
    [0b110, 0b101, 0b110, 0b100, 0b100], // P
    [0b010, 0b101, 0b101, 0b111, 0b011], // Q
    [0b110, 0b101, 0b111, 0b110, 0b101], // R
    [0b011, 0b100, 0b010, 0b001, 0b110], // S
    [0b111, 0b010, 0b010, 0b010, 0b010], // T
    [0b101, 0b101, 0b101, 0b101, 0b011], // U
    [0b101, 0b101, 0b101, 0b010, 0b010], // V
    [0b101, 0b101, 0b111, 0b111, 0b101], // W
    [0b101, 0b101, 0b010, 0b101, 0b101], // X
    [0b101, 0b101, 0b010, 0b010, 0b010], // Y
    [0b111, 0b001, 0b010, 0b100, 0b111], // Z
    [0b111, 0b100, 0b100, 0b100, 0b111], // [
    [0b100, 0b100, 0b010, 0b001, 0b001], // \
    [0b111, 0b001, 0b001, 0b001, 0b111], // ]
    [0b010, 0b101, 0b000, 0b000, 0b000], // ^
    [0b000, 0b000, 0b000, 0b000, 0b111], // _
];

const UNKNOWN: Glyph = ASCII[('?' as usize) - 0x20];

/// Glyphe für ein Zeichen; unbekannte Zeichen werden als '?' dargestellt
pub fn glyph(c: char) -> Glyph {
    let c = c.to_ascii_uppercase();
    match c {
        ' '..='_' => ASCII[c as usize - 0x20],
        '`' => [0b100, 0b010, 0b000, 0b000, 0b000],
        '{' => [0b011, 0b010, 0b100, 0b010, 0b011],
        '|' => [0b010, 0b010, 0b010, 0b010, 0b010],
        '}' => [0b110, 0b010, 0b001, 0b010, 0b110],
        '~' => [0b000, 0b011, 0b110, 0b000, 0b000],
        'Ä' | 'ä' => [0b101, 0b010, 0b101, 0b111, 0b101],
        'Ö' | 'ö' => [0b101, 0b010, 0b101, 0b101, 0b010],
        'Ü' | 'ü' => [0b101, 0b000, 0b101, 0b101, 0b011],
        'ß' => [0b110, 0b101, 0b110, 0b101, 0b110],
        _ => UNKNOWN,
    }
}

/// Ist die Spalte `col` (0..3) in Zeile `row` gesetzt?
pub fn is_set(glyph: &Glyph, col: usize, row: usize) -> bool {
    glyph[row] & (0b100 >> col) != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_maps_to_uppercase() {
        assert_eq!(glyph('a'), glyph('A'));
        assert_eq!(glyph('z'), glyph('Z'));
    }

    #[test]
    fn test_unknown_falls_back() {
        assert_eq!(glyph('€'), glyph('?'));
    }

    #[test]
    fn test_is_set() {
        let t = glyph('T');
        assert!(is_set(&t, 0, 0));
        assert!(is_set(&t, 2, 0));
        assert!(!is_set(&t, 0, 1));
        assert!(is_set(&t, 1, 4));
    }
}
