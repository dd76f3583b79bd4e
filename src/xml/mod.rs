//! Incremental XML parsing over a stream of byte chunks.
//!
//! The parser keeps only what it needs to finish the elements that are
//! still open: their names, their namespace declarations and the text of
//! leaves. Completed elements are handed out immediately and forgotten, so
//! memory stays bounded by the nesting depth and the size of one leaf,
//! however large the document is.
//!
//! - [`ParserState`]: the persistent state, driven with `feed` and `drain`
//! - [`ElementStream`]: an iterator adapter over a chunk iterator

mod parser;
mod scanner;
mod stream;

pub use parser::ParserState;
pub use stream::ElementStream;

/// A completed element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedElement {
    /// Element name, `{uri}local` when it is in a namespace.
    pub tag: String,
    /// Text of a leaf element. `None` for elements with children and for
    /// empty ones.
    pub text: Option<String>,
}

impl ParsedElement {
    /// The namespace URI of the tag, if any.
    pub fn namespace(&self) -> Option<&str> {
        let rest = self.tag.strip_prefix('{')?;
        rest.split_once('}').map(|(uri, _)| uri)
    }

    /// The tag without its namespace.
    pub fn local_name(&self) -> &str {
        match self.tag.split_once('}') {
            Some((_, local)) if self.tag.starts_with('{') => local,
            _ => &self.tag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_clark_names() {
        let element = ParsedElement {
            tag: "{http://www.mediawiki.org/xml/export-0.11/}page".to_string(),
            text: None,
        };
        assert_eq!(element.namespace(), Some("http://www.mediawiki.org/xml/export-0.11/"));
        assert_eq!(element.local_name(), "page");

        let plain = ParsedElement {
            tag: "page".to_string(),
            text: None,
        };
        assert_eq!(plain.namespace(), None);
        assert_eq!(plain.local_name(), "page");
    }
}
