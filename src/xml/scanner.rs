//! Splits buffered XML text into complete markup tokens.
//!
//! The scanner never guesses at a construct cut off by the end of the
//! buffer. It stops in front of it so the caller can keep that tail and
//! retry once more input has arrived.

use memchr::{memchr, memchr3, memmem};

/// A complete piece of markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    /// A start or empty-element tag. `content` is everything between `<`
    /// and `>` (or `/>`): the name followed by attributes.
    Start { content: &'a str, empty: bool },
    /// An end tag.
    End { name: &'a str },
    /// Character data that still needs entity unescaping.
    Text(&'a str),
    /// The contents of a CDATA section, taken literally.
    CData(&'a str),
}

pub(crate) struct Scanner<'a> {
    buf: &'a str,
    pos: usize,
    /// Leading bytes of `buf` already known to hold no `<`.
    checked: usize,
    /// Trailing text bytes searched without finding a `<`.
    tail_checked: usize,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(buf: &'a str) -> Self {
        Self::resume(buf, 0)
    }

    /// Scan `buf` whose first `checked` bytes are text already searched by
    /// an earlier scanner, so that a long text run is not searched again.
    pub(crate) fn resume(buf: &'a str, checked: usize) -> Self {
        Self {
            buf,
            pos: 0,
            checked,
            tail_checked: 0,
        }
    }

    /// Bytes of the buffer consumed by the tokens returned so far.
    pub(crate) fn consumed(&self) -> usize {
        self.pos
    }

    /// Length of the unconsumed tail known to be text without a `<`; zero
    /// when the tail is a cut tag or other markup.
    pub(crate) fn tail_checked(&self) -> usize {
        self.tail_checked
    }

    /// Return the next complete token, or `None` when the rest of the buffer
    /// is an incomplete construct (or empty).
    ///
    /// Comments, processing instructions and declarations are consumed
    /// without producing a token.
    pub(crate) fn next_token(&mut self) -> Result<Option<Token<'a>>, String> {
        loop {
            let rest = &self.buf[self.pos..];
            if rest.is_empty() {
                return Ok(None);
            }

            let bytes = rest.as_bytes();
            if bytes[0] != b'<' {
                // Text is only complete once the next tag begins, since an
                // entity reference may still be cut in half.
                let skip = if self.pos == 0 {
                    self.checked.min(bytes.len())
                } else {
                    0
                };
                let Some(end) = memchr(b'<', &bytes[skip..]).map(|i| skip + i) else {
                    self.tail_checked = bytes.len();
                    return Ok(None);
                };
                self.pos += end;
                return Ok(Some(Token::Text(&rest[..end])));
            }

            if bytes.len() < 2 {
                return Ok(None);
            }

            match bytes[1] {
                b'/' => {
                    let Some(end) = memchr(b'>', bytes) else {
                        return Ok(None);
                    };
                    let name = rest[2..end].trim();
                    if name.is_empty() || !is_name(name) {
                        return Err(format!("malformed end tag </{name}>"));
                    }
                    self.pos += end + 1;
                    return Ok(Some(Token::End { name }));
                }
                b'?' => {
                    let Some(end) = memmem::find(&bytes[2..], b"?>") else {
                        return Ok(None);
                    };
                    self.pos += end + 4;
                }
                b'!' => {
                    if is_cut_prefix(rest, "<!--") || is_cut_prefix(rest, "<![CDATA[") {
                        return Ok(None);
                    }
                    if rest.starts_with("<!--") {
                        let Some(end) = memmem::find(&bytes[4..], b"-->") else {
                            return Ok(None);
                        };
                        self.pos += end + 7;
                    } else if rest.starts_with("<![CDATA[") {
                        let Some(end) = memmem::find(&bytes[9..], b"]]>") else {
                            return Ok(None);
                        };
                        self.pos += end + 12;
                        return Ok(Some(Token::CData(&rest[9..9 + end])));
                    } else {
                        let Some(end) = find_declaration_end(bytes) else {
                            return Ok(None);
                        };
                        self.pos += end + 1;
                    }
                }
                _ => {
                    let Some(end) = find_tag_end(bytes) else {
                        return Ok(None);
                    };
                    let inner = &rest[1..end];
                    let (content, empty) = match inner.strip_suffix('/') {
                        Some(content) => (content, true),
                        None => (inner, false),
                    };
                    let name = tag_name(content);
                    if name.is_empty() || !is_name(name) {
                        return Err(format!("malformed start tag <{inner}>"));
                    }
                    self.pos += end + 1;
                    return Ok(Some(Token::Start { content, empty }));
                }
            }
        }
    }
}

/// The element name at the front of a start tag's content.
pub(crate) fn tag_name(content: &str) -> &str {
    let end = content
        .find(|c: char| c.is_ascii_whitespace())
        .unwrap_or(content.len());
    &content[..end]
}

fn is_name(name: &str) -> bool {
    !name
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '&' | '"' | '\'' | '=' | '/'))
}

/// Whether `rest` is a proper prefix of `pattern`, i.e. the buffer ends
/// before it can tell which construct starts here.
fn is_cut_prefix(rest: &str, pattern: &str) -> bool {
    rest.len() < pattern.len() && pattern.starts_with(rest)
}

/// Position of the `>` closing a tag, skipping quoted attribute values.
fn find_tag_end(bytes: &[u8]) -> Option<usize> {
    let mut pos = 1;
    let mut quote = None;
    while pos < bytes.len() {
        match quote {
            Some(q) => {
                pos += memchr(q, &bytes[pos..])?;
                quote = None;
            }
            None => {
                pos += memchr3(b'>', b'"', b'\'', &bytes[pos..])?;
                match bytes[pos] {
                    b'>' => return Some(pos),
                    q => quote = Some(q),
                }
            }
        }
        pos += 1;
    }
    None
}

/// Position of the `>` closing a `<!DOCTYPE ...>` style declaration,
/// including any bracketed internal subset.
fn find_declaration_end(bytes: &[u8]) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote = None;
    for (pos, &b) in bytes.iter().enumerate().skip(2) {
        match (quote, b) {
            (Some(q), _) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(b),
            (None, b'[') => depth += 1,
            (None, b']') => depth = depth.saturating_sub(1),
            (None, b'>') if depth == 0 => return Some(pos),
            _ => {}
        }
    }
    None
}
