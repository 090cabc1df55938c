//! Whitespace layout pass.

/// Normalize whitespace layout of already stripped text.
///
/// Trailing spaces and tabs are removed from every line, runs of three or
/// more newlines are collapsed to two, and the whole text is trimmed.
pub fn normalize_layout(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0usize;

    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            newlines += 1;
        }
        let line = line.trim_end_matches([' ', '\t']);
        if line.is_empty() {
            continue;
        }
        // Leading blank lines are dropped by the final trim anyway.
        if !out.is_empty() {
            for _ in 0..newlines.min(2) {
                out.push('\n');
            }
        }
        newlines = 0;
        out.push_str(line);
    }

    let end = out.trim_end().len();
    out.truncate(end);
    let start = out.len() - out.trim_start().len();
    out.drain(..start);
    out
}
