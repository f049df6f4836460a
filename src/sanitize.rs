// SQL identifier cleaning for spreadsheet headers and file stems.

/// Prefix applied when a cleaned identifier would start with a digit.
pub const DIGIT_PREFIX: &str = "tbl_";

/// Turn an arbitrary header or file stem into a DuckDB-safe identifier.
///
/// The result only contains `[a-z0-9_]`, never starts with a digit and is
/// stable under re-application. Parentheses are dropped rather than replaced,
/// so `"Age (yrs)"` becomes `"age_yrs"`.
pub fn sanitize_identifier(raw: &str) -> String {
    let mut clean = String::with_capacity(raw.len());
    for c in raw.trim().to_lowercase().chars() {
        match c {
            '(' | ')' => {}
            ' ' | '-' | '/' | '\\' => clean.push('_'),
            c if c.is_ascii_alphanumeric() || c == '_' => clean.push(c),
            _ => clean.push('_'),
        }
    }

    if clean.is_empty() && !raw.is_empty() {
        // Whitespace or parentheses only.
        clean.push('_');
    }

    if clean.starts_with(|c: char| c.is_ascii_digit()) {
        clean.insert_str(0, DIGIT_PREFIX);
    }

    clean
}
