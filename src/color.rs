//! ANSI color helpers for tagged output.

/// Palette cycled through by declaration order.
const PALETTE: [&str; 6] = ["31", "33", "36", "34", "32", "35"];

/// Bright blue, used when announcing command lines.
pub const COMMAND: &str = "94";

/// Returns the palette color for the service declared at `index`.
pub fn for_index(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

/// Wraps `text` in the given ANSI color code.
pub fn paint(code: &str, text: &str) -> String {
    format!("\u{1b}[{}m{}\u{1b}[0m", code, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_repeats_after_six() {
        assert_eq!(for_index(1), for_index(7));
        assert_eq!(for_index(0), for_index(12));
        assert_ne!(for_index(0), for_index(1));
    }

    #[test]
    fn paint_wraps_and_resets() {
        assert_eq!(paint("31", "web"), "\u{1b}[31mweb\u{1b}[0m");
    }
}
