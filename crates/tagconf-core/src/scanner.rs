//! Tag scanning
//!
//! Finds `${SRC:...}` and `${ENV:...}` tags in a byte buffer:
//! - `${SRC:descriptor}` - replaced by the bytes loaded from `descriptor`
//! - `${ENV:NAME}` - replaced by the value of environment variable `NAME`
//! - `${SRC:data://${ENV:A}:${ENV:B}}` - tags nest inside tag content
//!
//! The scanner owns the buffer and a cursor into it. A [`Tag`] is a view into
//! the buffer at scan time; [`Scanner::splice`] consumes it, so a tag cannot be
//! used again once the buffer has changed.

use std::ops::Range;

use crate::error::{Error, Result};

/// Length of a tag opening: `$`, `{`, three kind bytes, `:`
const OPENING_LEN: usize = 6;

/// The kind of a tag, taken from its three-letter prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `${SRC:...}`
    Source,
    /// `${ENV:...}`
    Env,
}

impl TagKind {
    /// Recognise a kind from its three-letter token
    fn from_token(token: &[u8]) -> Option<Self> {
        match token {
            b"SRC" => Some(TagKind::Source),
            b"ENV" => Some(TagKind::Env),
            _ => None,
        }
    }

    /// The three-letter token for this kind
    pub fn token(&self) -> &'static str {
        match self {
            TagKind::Source => "SRC",
            TagKind::Env => "ENV",
        }
    }
}

/// A tag located in the scanner's buffer
#[derive(Debug, PartialEq, Eq)]
pub struct Tag {
    /// What the tag references
    pub kind: TagKind,
    /// Offset of the `$`
    pub start: usize,
    /// Offset one past the closing `}`
    pub end: usize,
    /// Raw, unexpanded content between the `:` and the closing `}`
    pub content: Range<usize>,
}

/// Cursor-based tag lexer over an owned byte buffer
#[derive(Debug)]
pub struct Scanner {
    data: Vec<u8>,
    pos: usize,
}

impl Scanner {
    /// Create a scanner positioned at the start of `data`
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    /// Current cursor position
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The buffer as it currently stands
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Give the buffer back
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Raw content of a tag
    pub fn content(&self, tag: &Tag) -> &[u8] {
        &self.data[tag.content.clone()]
    }

    /// Find the next tag at or after the cursor
    ///
    /// Returns `Ok(None)` once the end of the buffer is reached, or an
    /// `UnterminatedTag` error if an opening is never closed.
    pub fn next_tag(&mut self) -> Result<Option<Tag>> {
        // An opening needs at least one byte after the ':' to be a tag
        while self.pos + OPENING_LEN < self.data.len() {
            if let Some(kind) = self.opening_at(self.pos) {
                return self.read_tag(kind).map(Some);
            }
            self.pos += 1;
        }
        Ok(None)
    }

    /// Replace the whole tag with `replacement` and continue after it
    ///
    /// The replacement itself is never rescanned.
    pub fn splice(&mut self, tag: Tag, replacement: &[u8]) {
        self.data
            .splice(tag.start..tag.end, replacement.iter().copied());
        self.pos = tag.start + replacement.len();
    }

    /// Check for a `${XXX:` opening with a known kind at `at`
    fn opening_at(&self, at: usize) -> Option<TagKind> {
        let opening = self.data.get(at..at + OPENING_LEN)?;
        if opening[0] != b'$' || opening[1] != b'{' || opening[5] != b':' {
            return None;
        }
        TagKind::from_token(&opening[2..5])
    }

    /// Read a tag whose opening sits at the cursor
    fn read_tag(&mut self, kind: TagKind) -> Result<Tag> {
        let start = self.pos;
        let content_start = start + OPENING_LEN;
        let mut idx = content_start;
        let mut embedded = 0usize;

        loop {
            match self.data.get(idx) {
                None => return Err(Error::unterminated_tag(start)),
                Some(b'}') if embedded == 0 => break,
                Some(b'}') => embedded -= 1,
                Some(b'$') if self.opening_at(idx).is_some() => {
                    embedded += 1;
                    idx += OPENING_LEN;
                    continue;
                }
                Some(_) => {}
            }
            idx += 1;
        }

        self.pos = idx + 1;

        Ok(Tag {
            kind,
            start,
            end: idx + 1,
            content: content_start..idx,
        })
    }
}
