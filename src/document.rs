//! Open text documents.

use std::path::{Path, PathBuf};

use derive_more::{Display, Error};
use lsp_types::{Position, Range};
use ropey::{Rope, RopeSlice};
use url::Url;

#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[display("invalid position {line}:{character}")]
    InvalidPosition { line: u32, character: u32 },
}

/// A document as the editor sees it: a URI and its current text.
#[derive(Clone, Debug)]
pub struct Document {
    uri: String,
    text: Rope,
}

impl Document {
    pub fn new(uri: impl Into<String>, source: &str) -> Self {
        Self {
            uri: uri.into(),
            text: Rope::from_str(source),
        }
    }

    /// Document for a file on disk, addressed by its `file://` URI.
    pub fn from_path(path: &Path, source: &str) -> Option<Self> {
        let uri = Url::from_file_path(path).ok()?;
        Some(Self::new(uri.to_string(), source))
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn source(&self) -> String {
        self.text.to_string()
    }

    /// Number of lines, counting a trailing empty line after a final newline.
    pub fn line_count(&self) -> usize {
        self.text.len_lines()
    }

    /// Text of a 0-based line without its line terminator.
    pub fn line(&self, line: u32) -> Option<String> {
        let slice = self.line_slice(line)?;
        Some(slice.to_string())
    }

    pub fn lines(&self) -> Vec<String> {
        (0..self.line_count() as u32)
            .filter_map(|line| self.line(line))
            .collect()
    }

    /// The line under `position` and the cursor as a character index into it.
    pub fn cursor(&self, position: Position) -> Option<(String, usize)> {
        let slice = self.line_slice(position.line)?;
        let utf16 = (position.character as usize).min(slice.len_utf16_cu());
        Some((slice.to_string(), slice.utf16_cu_to_char(utf16)))
    }

    /// Re-measure a range given in characters as UTF-16 code units.
    pub fn utf16_range(&self, range: Range) -> Range {
        Range {
            start: self.utf16_position(range.start),
            end: self.utf16_position(range.end),
        }
    }

    fn utf16_position(&self, position: Position) -> Position {
        let Some(slice) = self.line_slice(position.line) else {
            return position;
        };
        let chars = (position.character as usize).min(slice.len_chars());
        Position {
            line: position.line,
            character: slice.char_to_utf16_cu(chars) as u32,
        }
    }

    /// Replace the whole text.
    pub fn replace(&mut self, source: &str) {
        self.text = Rope::from_str(source);
    }

    /// Apply one content change; a missing range replaces the whole text.
    pub fn apply_change(&mut self, range: Option<Range>, text: &str) -> Result<(), DocumentError> {
        let Some(range) = range else {
            self.replace(text);
            return Ok(());
        };
        let start = self.char_offset(range.start)?;
        let end = self.char_offset(range.end)?;
        let (start, end) = (start.min(end), start.max(end));
        self.text.remove(start..end);
        self.text.insert(start, text);
        Ok(())
    }

    /// Filesystem path for `file://` URIs.
    pub fn path(&self) -> Option<PathBuf> {
        Url::parse(&self.uri).ok()?.to_file_path().ok()
    }

    /// Directories searched for imports: the document's own directory, or
    /// the working directory for documents that do not live on disk.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        let directory = self
            .path()
            .and_then(|path| path.parent().map(|parent| parent.to_path_buf()))
            .or_else(|| std::env::current_dir().ok());
        directory.into_iter().collect()
    }

    fn line_slice(&self, line: u32) -> Option<RopeSlice<'_>> {
        let line = line as usize;
        if line >= self.text.len_lines() {
            return None;
        }
        let slice = self.text.line(line);
        let mut end = slice.len_chars();
        while end > 0 && matches!(slice.char(end - 1), '\n' | '\r') {
            end -= 1;
        }
        Some(slice.slice(..end))
    }

    fn char_offset(&self, position: Position) -> Result<usize, DocumentError> {
        let invalid = DocumentError::InvalidPosition {
            line: position.line,
            character: position.character,
        };
        if position.line as usize == self.text.len_lines() {
            return Ok(self.text.len_chars());
        }
        let slice = self.line_slice(position.line).ok_or(invalid)?;
        let utf16 = (position.character as usize).min(slice.len_utf16_cu());
        Ok(self.text.line_to_char(position.line as usize) + slice.utf16_cu_to_char(utf16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: u32, character: u32) -> Position {
        Position { line, character }
    }

    #[test]
    fn test_lines_strip_terminators() {
        let doc = Document::new("file:///tmp/a.vy", "x: uint256\r\ny: bool\n");
        assert_eq!(doc.lines(), vec!["x: uint256", "y: bool", ""]);
        assert_eq!(doc.line(1).as_deref(), Some("y: bool"));
        assert_eq!(doc.line(5), None);
    }

    #[test]
    fn test_cursor_clamps_column() {
        let doc = Document::new("file:///tmp/a.vy", "abc\ndef");
        assert_eq!(doc.cursor(pos(1, 1)), Some(("def".to_string(), 1)));
        assert_eq!(doc.cursor(pos(0, 40)), Some(("abc".to_string(), 3)));
        assert_eq!(doc.cursor(pos(2, 0)), None);
    }

    #[test]
    fn test_utf16_range_counts_surrogate_pairs() {
        let doc = Document::new("file:///tmp/a.vy", "# 😀 enum\nx\n");
        let range = Range {
            start: pos(0, 4),
            end: pos(0, 8),
        };
        assert_eq!(
            doc.utf16_range(range),
            Range {
                start: pos(0, 5),
                end: pos(0, 9),
            }
        );
        // plain lines and lines past the end are left alone
        let plain = Range {
            start: pos(1, 0),
            end: pos(1, 1),
        };
        assert_eq!(doc.utf16_range(plain), plain);
        let beyond = Range {
            start: pos(9, 2),
            end: pos(9, 3),
        };
        assert_eq!(doc.utf16_range(beyond), beyond);
    }

    #[test]
    fn test_apply_change_ranged() {
        let mut doc = Document::new("file:///tmp/a.vy", "x: uint256\ny: bool\n");
        let range = Range {
            start: pos(1, 3),
            end: pos(1, 7),
        };
        doc.apply_change(Some(range), "address").unwrap();
        assert_eq!(doc.source(), "x: uint256\ny: address\n");

        doc.apply_change(None, "z: int128\n").unwrap();
        assert_eq!(doc.source(), "z: int128\n");
    }

    #[test]
    fn test_apply_change_out_of_range() {
        let mut doc = Document::new("file:///tmp/a.vy", "x\n");
        let range = Range {
            start: pos(7, 0),
            end: pos(7, 1),
        };
        assert_eq!(
            doc.apply_change(Some(range), "y"),
            Err(DocumentError::InvalidPosition {
                line: 7,
                character: 0
            })
        );
    }

    #[test]
    fn test_path_decodes_escapes() {
        let doc = Document::new("file:///home/me/My%20Contracts/Foo.vy", "");
        assert_eq!(doc.path(), Some(PathBuf::from("/home/me/My Contracts/Foo.vy")));
        assert_eq!(Document::new("untitled:Untitled-1", "").path(), None);
    }

    #[test]
    fn test_from_path_escapes_uri() {
        let doc = Document::from_path(Path::new("/tmp/My Contracts/a.vy"), "").unwrap();
        assert_eq!(doc.uri(), "file:///tmp/My%20Contracts/a.vy");

        // a literal `%` survives the trip through the URI
        let path = Path::new("/tmp/a%41/x.vy");
        let doc = Document::from_path(path, "").unwrap();
        assert_eq!(doc.path().as_deref(), Some(path));
        assert_eq!(doc.search_paths(), vec![PathBuf::from("/tmp/a%41")]);

        assert!(Document::from_path(Path::new("relative/x.vy"), "").is_none());
    }

    #[test]
    fn test_search_paths_use_document_directory() {
        let doc = Document::new("file:///projects/token/main.vy", "");
        assert_eq!(doc.search_paths(), vec![PathBuf::from("/projects/token")]);
    }
}
