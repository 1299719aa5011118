//! Byte-buffer primitives shared by the request state machine and the
//! response writer: delimiter search, in-place shift of consumed bytes,
//! and owned-string list bookkeeping.

/// Finds the first occurrence of `delim` in `buf`, left to right.
/// Correctly finds overlapping-prefix matches (e.g. `delim = "aab"`
/// inside `"aaab"`) by re-testing from the next starting byte on a
/// mismatch rather than resuming a partial match (no KMP).
pub fn locate(buf: &[u8], delim: &[u8]) -> Option<usize> {
    if delim.is_empty() || buf.len() < delim.len() {
        return None;
    }
    buf.windows(delim.len()).position(|w| w == delim)
}

/// Moves `buf[k..len]` down to `buf[0..len-k]`. Tolerates `k == len`
/// (the whole filled region is consumed). Panics if `k > len`.
pub fn shift(buf: &mut [u8], k: usize, len: usize) {
    assert!(k <= len, "shift distance exceeds filled length");
    if k == 0 || k == len {
        return;
    }
    buf.copy_within(k..len, 0);
}

/// Advances `cursor` past the next occurrence of `delim`, returning the
/// bytes before it. On no match, `cursor` is left untouched.
pub fn chop<'a>(cursor: &mut &'a [u8], delim: &[u8]) -> Option<&'a [u8]> {
    let start = *cursor;
    match locate(start, delim) {
        Some(pos) => {
            *cursor = &start[pos + delim.len()..];
            Some(&start[..pos])
        }
        None => None,
    }
}

/// Appends an owned copy of `bytes` to `list`.
pub fn string_list_add(list: &mut Vec<String>, bytes: &[u8]) {
    list.push(String::from_utf8_lossy(bytes).into_owned());
}

/// Drops every element of `list`.
pub fn string_list_clear(list: &mut Vec<String>) {
    list.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_finds_delimiter() {
        assert_eq!(locate(b"GET / HTTP/1.1\r\nHost: x", b"\r\n"), Some(14));
    }

    #[test]
    fn locate_returns_none_when_absent() {
        assert_eq!(locate(b"no newline here", b"\r\n"), None);
    }

    #[test]
    fn locate_handles_overlap_prefix() {
        // "aab" inside "aaab" - naive reset-based scan must still find it.
        assert_eq!(locate(b"aaab", b"aab"), Some(1));
    }

    #[test]
    fn shift_moves_tail_to_front() {
        let mut buf = *b"ABCDEF__";
        shift(&mut buf, 3, 6);
        assert_eq!(&buf[..3], b"DEF");
    }

    #[test]
    fn shift_tolerates_full_consume() {
        let mut buf = *b"ABCDEF";
        shift(&mut buf, 6, 6);
        assert_eq!(&buf, b"ABCDEF"); // untouched, nothing to move
    }

    #[test]
    fn chop_splits_on_delimiter() {
        let mut cursor: &[u8] = b"GET /test HTTP/1.1";
        let method = chop(&mut cursor, b" ").unwrap();
        assert_eq!(method, b"GET");
        assert_eq!(cursor, b"/test HTTP/1.1");
    }

    #[test]
    fn chop_restores_cursor_on_miss() {
        let mut cursor: &[u8] = b"no-delimiter-here";
        assert!(chop(&mut cursor, b"\r\n").is_none());
        assert_eq!(cursor, b"no-delimiter-here");
    }

    #[test]
    fn string_list_add_and_clear() {
        let mut list = Vec::new();
        string_list_add(&mut list, b"Host: x");
        assert_eq!(list, vec!["Host: x".to_string()]);
        string_list_clear(&mut list);
        assert!(list.is_empty());
    }
}
