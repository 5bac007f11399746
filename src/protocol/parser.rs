//! Command-line parsing
//!
//! A raw control line is stripped of CR/LF and split on the first space into
//! a verb and a parameter. The verb is case-folded by the dispatcher; the
//! parameter keeps its case and any further spaces verbatim.

/// Splits a raw line into `(verb, parameter)`.
///
/// The parameter is empty when the line has no space.
pub fn parse_line(line: &str) -> (&str, &str) {
    let trimmed = line.trim_matches(['\r', '\n']);
    match trimmed.split_once(' ') {
        Some((verb, param)) => (verb, param),
        None => (trimmed, ""),
    }
}
