//! Line index for converting between (line, column) positions and byte offsets.
//!
//! Vyper spans count columns in characters, while Rust strings are sliced by
//! byte offsets. This module provides conversion utilities.

/// Line index for a source file.
///
/// Caches line start positions for efficient position conversion.
#[derive(Clone, Debug)]
pub struct LineIndex {
    /// Byte offset of the start of each line (0-indexed).
    line_starts: Vec<usize>,
    /// Original source text.
    source: String,
}

impl LineIndex {
    /// Create a line index from source text.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, c) in source.char_indices() {
            if c == '\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            line_starts,
            source: source.to_string(),
        }
    }

    /// Convert 0-based (line, character column) to byte offset.
    ///
    /// Columns past the end of the line clamp to the line end.
    pub fn offset(&self, line: u32, column: u32) -> Option<usize> {
        let line_start = *self.line_starts.get(line as usize)?;
        let line_text = self.line_text(line)?;
        let byte = line_text
            .char_indices()
            .nth(column as usize)
            .map(|(byte, _)| byte)
            .unwrap_or(line_text.len());
        Some(line_start + byte)
    }

    /// Convert byte offset to 0-based (line, character column).
    pub fn line_col(&self, offset: usize) -> (u32, u32) {
        let offset = offset.min(self.source.len());
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line_start = self.line_starts[line];
        let column = self.source[line_start..offset].chars().count();
        (line as u32, column as u32)
    }

    /// Get the current source text.
    pub fn text(&self) -> &str {
        &self.source
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Get the text of a specific line, without its line terminator.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        let start = *self.line_starts.get(line as usize)?;
        let end = self
            .line_starts
            .get(line as usize + 1)
            .copied()
            .unwrap_or(self.source.len());
        let text = &self.source[start..end];
        Some(text.trim_end_matches('\n').trim_end_matches('\r'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        let index = LineIndex::new("hello");
        assert_eq!(index.offset(0, 0), Some(0));
        assert_eq!(index.offset(0, 5), Some(5));
        assert_eq!(index.line_col(0), (0, 0));
        assert_eq!(index.line_col(5), (0, 5));
    }

    #[test]
    fn test_multiple_lines() {
        let index = LineIndex::new("hello\nworld\n");
        assert_eq!(index.offset(0, 0), Some(0));
        assert_eq!(index.offset(1, 0), Some(6));
        assert_eq!(index.offset(1, 5), Some(11));
        assert_eq!(index.line_col(6), (1, 0));
        assert_eq!(index.line_col(11), (1, 5));
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.line_text(1), Some("world"));
        assert_eq!(index.line_text(3), None);
    }

    #[test]
    fn test_multibyte_columns() {
        // '가' is 3 bytes in UTF-8 but one column
        let index = LineIndex::new("가나다");
        assert_eq!(index.offset(0, 1), Some(3));
        assert_eq!(index.offset(0, 2), Some(6));
        assert_eq!(index.line_col(6), (0, 2));

        let index = LineIndex::new("a😀b");
        assert_eq!(index.offset(0, 2), Some(5));
        assert_eq!(index.line_col(5), (0, 2));
    }

    #[test]
    fn test_column_past_line_end() {
        let index = LineIndex::new("ab\ncd");
        assert_eq!(index.offset(0, 10), Some(2));
        assert_eq!(index.offset(5, 0), None);
    }
}
