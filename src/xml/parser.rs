//! Persistent parser state fed one chunk at a time.

use std::borrow::Cow;
use std::collections::vec_deque::{self, VecDeque};

use quick_xml::escape::unescape;
use quick_xml::events::BytesStart;

use super::scanner::{tag_name, Scanner, Token};
use super::ParsedElement;
use crate::error::{DumpError, Result};

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// An element whose closing tag has not been seen yet.
#[derive(Debug)]
struct OpenElement {
    /// Qualified name as written, for matching the end tag.
    name: String,
    /// Resolved name in `{uri}local` form.
    tag: String,
    /// Text seen before the first child.
    text: String,
    has_children: bool,
    /// `xmlns` declarations made on this element, `""` for the default.
    namespaces: Vec<(String, String)>,
}

/// A change to the open-element stack, validated but not yet applied.
enum Event {
    Open {
        name: String,
        tag: String,
        namespaces: Vec<(String, String)>,
    },
    Close,
    Text(String),
}

/// Incremental XML parser state.
///
/// Chunks may be split anywhere, including inside a tag or a multi-byte
/// character: the unfinished tail is kept and completed by the next
/// [`feed`](Self::feed). A chunk is applied atomically. If any part of it is
/// invalid, `feed` returns an error and the state is exactly as it was
/// before the call.
///
/// ```
/// use wikistream::xml::ParserState;
///
/// let mut state = ParserState::new();
/// state.feed(b"<outer><a>1</a><b>")?;
/// state.feed(b"2</b></outer>")?;
/// let tags: Vec<_> = state.drain().map(|e| e.tag).collect();
/// assert_eq!(tags, ["a", "b", "outer"]);
/// # Ok::<(), wikistream::DumpError>(())
/// ```
#[derive(Debug, Default)]
pub struct ParserState {
    stack: Vec<OpenElement>,
    /// Input after the last complete token.
    pending: String,
    /// Leading bytes of `pending` already searched for a `<`.
    pending_checked: usize,
    /// Bytes of a UTF-8 sequence cut by the end of the previous chunk.
    carry: Vec<u8>,
    completed: VecDeque<ParsedElement>,
    chunks: usize,
}

impl ParserState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of elements currently open.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Number of chunks fed so far, including rejected ones.
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Feed the next chunk of the document.
    ///
    /// Errors carry the zero-based sequence number of the chunk.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<()> {
        let index = self.chunks;
        self.chunks += 1;

        let (text, carry) = self.decode(chunk, index)?;

        let restore = self.pending.len();
        self.pending.push_str(&text);

        let mut scanner = Scanner::resume(&self.pending, self.pending_checked);
        let events = match self.stage(&mut scanner) {
            Ok(events) => events,
            Err(message) => {
                self.pending.truncate(restore);
                return Err(DumpError::Structure {
                    chunk: index,
                    message,
                });
            }
        };
        let consumed = scanner.consumed();
        self.pending_checked = scanner.tail_checked();

        self.pending.drain(..consumed);
        self.carry = carry;
        for event in events {
            self.apply(event);
        }
        Ok(())
    }

    /// Take the elements completed so far, in the order they closed.
    pub fn drain(&mut self) -> vec_deque::Drain<'_, ParsedElement> {
        self.completed.drain(..)
    }

    /// Decode `chunk` behind any carried partial character.
    ///
    /// Returns the decodable text and the bytes of a character left
    /// incomplete at the end of the chunk.
    fn decode<'c>(&self, chunk: &'c [u8], index: usize) -> Result<(Cow<'c, str>, Vec<u8>)> {
        let bytes: Cow<'c, [u8]> = if self.carry.is_empty() {
            Cow::Borrowed(chunk)
        } else {
            let mut joined = self.carry.clone();
            joined.extend_from_slice(chunk);
            Cow::Owned(joined)
        };

        let valid = match std::str::from_utf8(&bytes) {
            Ok(_) => bytes.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                return Err(DumpError::Decode {
                    chunk: index,
                    offset: e.valid_up_to().saturating_sub(self.carry.len()),
                });
            }
        };
        let carry = bytes[valid..].to_vec();

        let text = match bytes {
            Cow::Borrowed(b) => std::str::from_utf8(&b[..valid]).map(Cow::Borrowed),
            Cow::Owned(mut b) => {
                b.truncate(valid);
                String::from_utf8(b)
                    .map(Cow::Owned)
                    .map_err(|e| e.utf8_error())
            }
        }
        .map_err(|e| DumpError::Decode {
            chunk: index,
            offset: e.valid_up_to(),
        })?;

        Ok((text, carry))
    }

    /// Turn the complete tokens in `scanner` into validated events without
    /// touching the stack.
    fn stage(&self, scanner: &mut Scanner<'_>) -> std::result::Result<Vec<Event>, String> {
        let mut events = Vec::new();
        // Elements opened within this chunk, on top of `stack[..base]`.
        let mut opened: Vec<(String, Vec<(String, String)>)> = Vec::new();
        let mut base = self.stack.len();

        while let Some(token) = scanner.next_token()? {
            match token {
                Token::Start { content, empty } => {
                    let name = tag_name(content);
                    let namespaces = declarations(content, name.len())?;
                    let tag = self.resolve(name, &namespaces, &opened, base)?;
                    events.push(Event::Open {
                        name: name.to_string(),
                        tag,
                        namespaces: namespaces.clone(),
                    });
                    if empty {
                        events.push(Event::Close);
                    } else {
                        opened.push((name.to_string(), namespaces));
                    }
                }
                Token::End { name } => {
                    let expected = match opened.last() {
                        Some((open, _)) => open.as_str(),
                        None if base > 0 => self.stack[base - 1].name.as_str(),
                        None => return Err(format!("unexpected end tag </{name}>")),
                    };
                    if expected != name {
                        return Err(format!(
                            "mismatched tag: expected </{expected}>, found </{name}>"
                        ));
                    }
                    if opened.pop().is_none() {
                        base -= 1;
                    }
                    events.push(Event::Close);
                }
                Token::Text(raw) => {
                    if opened.is_empty() && base == 0 {
                        continue;
                    }
                    let text = unescape(raw).map_err(|e| e.to_string())?;
                    events.push(Event::Text(text.into_owned()));
                }
                Token::CData(text) => {
                    if opened.is_empty() && base == 0 {
                        continue;
                    }
                    events.push(Event::Text(text.to_string()));
                }
            }
        }
        Ok(events)
    }

    /// Resolve a qualified name to `{uri}local` form.
    ///
    /// Declarations are searched innermost first: the element's own, then
    /// those opened in the current chunk, then the committed stack.
    fn resolve(
        &self,
        name: &str,
        own: &[(String, String)],
        opened: &[(String, Vec<(String, String)>)],
        base: usize,
    ) -> std::result::Result<String, String> {
        let (prefix, local) = match name.split_once(':') {
            Some((prefix, local)) => (prefix, local),
            None => ("", name),
        };
        if prefix == "xml" {
            return Ok(format!("{{{XML_NAMESPACE}}}{local}"));
        }

        let scopes = std::iter::once(own)
            .chain(opened.iter().rev().map(|(_, ns)| ns.as_slice()))
            .chain(self.stack[..base].iter().rev().map(|e| e.namespaces.as_slice()));

        let mut uri = None;
        for scope in scopes {
            if let Some((_, found)) = scope.iter().find(|(p, _)| p == prefix) {
                uri = Some(found.as_str());
                break;
            }
        }

        match uri {
            Some(uri) if !uri.is_empty() => Ok(format!("{{{uri}}}{local}")),
            _ if prefix.is_empty() => Ok(name.to_string()),
            _ => Err(format!("unbound namespace prefix {prefix:?} in <{name}>")),
        }
    }

    fn apply(&mut self, event: Event) {
        match event {
            Event::Open {
                name,
                tag,
                namespaces,
            } => {
                if let Some(parent) = self.stack.last_mut() {
                    parent.has_children = true;
                }
                self.stack.push(OpenElement {
                    name,
                    tag,
                    text: String::new(),
                    has_children: false,
                    namespaces,
                });
            }
            Event::Text(text) => {
                if let Some(open) = self.stack.last_mut() {
                    if !open.has_children {
                        open.text.push_str(&text);
                    }
                }
            }
            Event::Close => {
                if let Some(open) = self.stack.pop() {
                    let text = if open.has_children || open.text.is_empty() {
                        None
                    } else {
                        Some(open.text)
                    };
                    self.completed.push_back(ParsedElement { tag: open.tag, text });
                }
            }
        }
    }
}

/// Collect the `xmlns` declarations from a start tag's content.
fn declarations(content: &str, name_len: usize) -> std::result::Result<Vec<(String, String)>, String> {
    let start = BytesStart::from_content(content, name_len);
    let mut namespaces = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = attr.key.as_ref();
        let prefix = if key == b"xmlns" {
            ""
        } else if let Some(prefix) = key.strip_prefix(b"xmlns:") {
            std::str::from_utf8(prefix).map_err(|e| e.to_string())?
        } else {
            continue;
        };
        let value = std::str::from_utf8(&attr.value).map_err(|e| e.to_string())?;
        let uri = unescape(value).map_err(|e| e.to_string())?;
        namespaces.push((prefix.to_string(), uri.into_owned()));
    }
    Ok(namespaces)
}
