//! The parse cursor (spec §2.1, §4.1): a mutable scanning context over a
//! single source buffer. Primitives are deliberately low-level byte
//! operations rather than a regex scanner, so that splice positions stay
//! exact (spec §9).

/// Byte that can terminate a directive keyword or a `#define`/`#undef`
/// name token: whitespace or end of line.
fn is_token_delimiter(byte: u8) -> bool {
    byte == b' ' || byte == b'\t' || byte == b'\r' || byte == b'\n'
}

/// A mutable scanning context over one source buffer (spec §2.1).
pub(crate) struct Cursor {
    buffer: String,
    pos: usize,
    source_name: String,
}

impl Cursor {
    pub(crate) fn new(source_name: impl Into<String>, text: impl Into<String>) -> Self {
        Cursor {
            buffer: text.into(),
            pos: 0,
            source_name: source_name.into(),
        }
    }

    pub(crate) fn source_name(&self) -> &str {
        &self.source_name
    }

    pub(crate) fn into_buffer(self) -> String {
        self.buffer
    }

    pub(crate) fn buffer(&self) -> &str {
        &self.buffer
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub(crate) fn is_eof(&self) -> bool {
        self.pos >= self.buffer.len()
    }

    /// Byte at the cursor, without consuming it.
    pub(crate) fn peek(&self) -> Option<u8> {
        self.buffer.as_bytes().get(self.pos).copied()
    }

    /// Byte immediately before the cursor, if any.
    pub(crate) fn peek_last(&self) -> Option<u8> {
        if self.pos == 0 {
            None
        } else {
            self.buffer.as_bytes().get(self.pos - 1).copied()
        }
    }

    /// Consume and return the byte at the cursor.
    pub(crate) fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Advance until (and past) the next occurrence of `target`, or to EOF
    /// if never found. Returns whether `target` was found.
    pub(crate) fn seek_to_char(&mut self, target: u8) -> bool {
        let bytes = self.buffer.as_bytes();
        while self.pos < bytes.len() {
            if bytes[self.pos] == target {
                self.pos += 1;
                return true;
            }
            self.pos += 1;
        }
        false
    }

    /// Collect a token starting at the cursor, terminated by whitespace or
    /// EOL (not consumed). Used for directive keywords and `#define`/`#undef`
    /// names (spec §2.1).
    pub(crate) fn collect_token(&mut self) -> String {
        let bytes = self.buffer.as_bytes();
        let start = self.pos;
        while self.pos < bytes.len() && !is_token_delimiter(bytes[self.pos]) {
            self.pos += 1;
        }
        self.buffer[start..self.pos].to_string()
    }

    /// Collect characters up to (not including) the next occurrence of
    /// `needle`, consuming `needle` itself. Returns `None` if `needle` never
    /// occurs before EOF (cursor is left at EOF in that case).
    pub(crate) fn collect_until_string(&mut self, needle: &str) -> Option<String> {
        match self.buffer[self.pos..].find(needle) {
            Some(offset) => {
                let collected = self.buffer[self.pos..self.pos + offset].to_string();
                self.pos += offset + needle.len();
                Some(collected)
            }
            None => {
                self.pos = self.buffer.len();
                None
            }
        }
    }

    /// Collect characters up to (not including) the next occurrence of
    /// `stop` or end of line, whichever comes first. The stop byte, if
    /// found, is consumed; EOL is not.
    pub(crate) fn collect_until_byte_or_eol(&mut self, stop: u8) -> String {
        let bytes = self.buffer.as_bytes();
        let start = self.pos;
        while self.pos < bytes.len() {
            let b = bytes[self.pos];
            if b == stop {
                let collected = self.buffer[start..self.pos].to_string();
                self.pos += 1;
                return collected;
            }
            if b == b'\n' {
                break;
            }
            self.pos += 1;
        }
        self.buffer[start..self.pos].to_string()
    }

    /// Advance past whitespace (space/tab/CR) without crossing a newline.
    pub(crate) fn skip_whitespace_until_eol(&mut self) {
        let bytes = self.buffer.as_bytes();
        while self.pos < bytes.len() && (bytes[self.pos] == b' ' || bytes[self.pos] == b'\t' || bytes[self.pos] == b'\r') {
            self.pos += 1;
        }
    }

    /// Advance the cursor to the end of the current line (the position of
    /// the `\n`, or EOF), without consuming the newline itself.
    pub(crate) fn advance_to_eol(&mut self) {
        let bytes = self.buffer.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    /// Search forward from `from` for the next `#` byte followed
    /// immediately (after optional intervening whitespace) by one of
    /// `keywords`. Returns `(position of '#', matched keyword, position right
    /// after the keyword token)`. This search is intentionally NOT
    /// nesting-aware (spec §4.5, §9): it returns the first match regardless
    /// of any `#if`/`#ifdef`/`#ifndef` encountered along the way.
    pub(crate) fn seek_next_directive(
        &self,
        from: usize,
        keywords: &[&str],
    ) -> Option<(usize, String, usize)> {
        let bytes = self.buffer.as_bytes();
        let mut i = from;
        while i < bytes.len() {
            if bytes[i] == b'#' {
                let hash_pos = i;
                let mut j = i + 1;
                while j < bytes.len() && is_token_delimiter(bytes[j]) && bytes[j] != b'\n' {
                    j += 1;
                }
                let kw_start = j;
                while j < bytes.len() && !is_token_delimiter(bytes[j]) {
                    j += 1;
                }
                let kw = &self.buffer[kw_start..j];
                if keywords.contains(&kw) {
                    return Some((hash_pos, kw.to_string(), j));
                }
                i = j;
                continue;
            }
            i += 1;
        }
        None
    }

    /// Replace `[start, end)` with `replacement` and reset the cursor to
    /// `start + replacement.len()` (spec §2.1's splice-in-place primitive).
    pub(crate) fn splice(&mut self, start: usize, end: usize, replacement: &str) {
        self.buffer.replace_range(start..end, replacement);
        self.pos = start + replacement.len();
    }

    /// 0-origin `(line, column)` of `byte_pos`, computed from the buffer
    /// prefix up to that position (spec §6).
    pub(crate) fn line_col(&self, byte_pos: usize) -> (usize, usize) {
        let prefix = &self.buffer[..byte_pos.min(self.buffer.len())];
        let line = prefix.bytes().filter(|&b| b == b'\n').count();
        let column = match prefix.rfind('\n') {
            Some(last_newline) => prefix[last_newline + 1..].chars().count(),
            None => prefix.chars().count(),
        };
        (line, column)
    }

    /// 1-origin line number of `byte_pos`, used for the `LINE` built-in's
    /// expansion value (spec §4.10).
    pub(crate) fn line_number_1_origin(&self, byte_pos: usize) -> usize {
        self.line_col(byte_pos).0 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_token_stops_at_whitespace() {
        let mut c = Cursor::new("t", "include <foo.h>");
        assert_eq!(c.collect_token(), "include");
        assert_eq!(c.peek(), Some(b' '));
    }

    #[test]
    fn collect_until_string_consumes_needle() {
        let mut c = Cursor::new("t", "FOO__ rest");
        let name = c.collect_until_string("__").unwrap();
        assert_eq!(name, "FOO");
        assert_eq!(&c.buffer()[c.pos()..], " rest");
    }

    #[test]
    fn splice_resets_cursor_after_replacement() {
        let mut c = Cursor::new("t", "#define X\nY");
        c.splice(0, 9, "");
        assert_eq!(c.buffer(), "\nY");
        assert_eq!(c.pos(), 0);
    }

    #[test]
    fn seek_next_directive_ignores_nesting() {
        let c = Cursor::new("t", "body #if X\ninner\n#endif outer\n#endif");
        let (hash_pos, kw, _) = c
            .seek_next_directive(0, &["elif", "else", "endif"])
            .unwrap();
        assert_eq!(kw, "endif");
        assert_eq!(&c.buffer()[hash_pos..hash_pos + 6], "#endif");
        // The match is the *inner* #endif, not the outer one: not nesting-aware.
        assert!(hash_pos < c.buffer().find("outer").unwrap());
    }

    #[test]
    fn line_col_is_zero_origin() {
        let c = Cursor::new("t", "abc\ndef");
        assert_eq!(c.line_col(0), (0, 0));
        assert_eq!(c.line_col(5), (1, 1));
    }
}
