use std::collections::VecDeque;

use log::{debug, warn};

use super::parser::ParserState;
use super::ParsedElement;
use crate::error::Result;

/// Iterator over the elements of a document delivered in chunks.
///
/// Elements are yielded as soon as their end tag has been fed, children
/// before their parent. A chunk that cannot be decoded or parsed is logged
/// and skipped; parsing continues with the next chunk on the unchanged
/// state. Errors from the chunk source itself are passed through.
pub struct ElementStream<I> {
    chunks: I,
    state: ParserState,
    ready: VecDeque<ParsedElement>,
    skipped: usize,
}

impl<I, B> ElementStream<I>
where
    I: Iterator<Item = Result<B>>,
    B: AsRef<[u8]>,
{
    pub fn new<T>(chunks: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            chunks: chunks.into_iter(),
            state: ParserState::new(),
            ready: VecDeque::new(),
            skipped: 0,
        }
    }

    /// Number of chunks skipped because they failed to parse.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<I, B> Iterator for ElementStream<I>
where
    I: Iterator<Item = Result<B>>,
    B: AsRef<[u8]>,
{
    type Item = Result<ParsedElement>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(element) = self.ready.pop_front() {
                return Some(Ok(element));
            }

            let chunk = match self.chunks.next() {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    if self.state.depth() > 0 {
                        debug!(
                            "input ended with {} unclosed elements",
                            self.state.depth()
                        );
                    }
                    return None;
                }
            };

            match self.state.feed(chunk.as_ref()) {
                Ok(()) => self.ready.extend(self.state.drain()),
                Err(e) => {
                    warn!("{}, skipping chunk", e);
                    self.skipped += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DOC: &str = "<?xml version = \"1.0\"?>\
        <mediawiki xmlns=\"http://www.mediawiki.org/xml/export-0.10/\">\
        <siteinfo><sitename>Wikipedia</sitename></siteinfo>\
        <page><title>Caf\u{e9} &amp; Bar</title><ns>0</ns>\
        <revision><text xml:space=\"preserve\">'''Bold''' [[link]] {{tmpl|a=b}}\n\u{4e2d}\u{6587}</text></revision>\
        </page><!-- between pages --><page><title>Talk:X</title><ns>1</ns>\
        <revision><text><![CDATA[<raw>]]></text></revision></page></mediawiki>";

    fn elements<B: AsRef<[u8]>>(chunks: Vec<B>) -> Vec<(String, Option<String>)> {
        ElementStream::new(chunks.into_iter().map(Ok))
            .map(|e| e.unwrap())
            .map(|e| (e.tag, e.text))
            .collect()
    }

    #[test]
    fn yields_children_before_parents() {
        let got = elements(vec!["<outer><a>1</a><b>2</b></outer>"]);
        assert_eq!(
            got,
            vec![
                ("a".to_string(), Some("1".to_string())),
                ("b".to_string(), Some("2".to_string())),
                ("outer".to_string(), None),
            ]
        );
    }

    #[test]
    fn line_per_chunk() {
        let chunks = vec![
            "<?xml version = \"1.0\"?>",
            "<outer-block>",
            "<sub-block-1>value\n1</sub-block-1>",
            "<sub-block-2>value2</sub-block-2>",
            "</outer-block>",
        ];
        let got = elements(chunks);
        assert_eq!(
            got,
            vec![
                ("sub-block-1".to_string(), Some("value\n1".to_string())),
                ("sub-block-2".to_string(), Some("value2".to_string())),
                ("outer-block".to_string(), None),
            ]
        );
    }

    #[test]
    fn invalid_chunk_is_skipped() {
        let chunks: Vec<&[u8]> = vec![b"<root><a>1</a>", b"<b>\xff\xfe</b>", b"<c>3</c></root>"];
        let mut stream = ElementStream::new(chunks.into_iter().map(Ok));
        let tags: Vec<_> = stream.by_ref().map(|e| e.unwrap().tag).collect();
        assert_eq!(tags, ["a", "c", "root"]);
        assert_eq!(stream.skipped(), 1);
    }

    #[test]
    fn upstream_errors_pass_through() {
        let chunks = vec![
            Ok(b"<r>".to_vec()),
            Err(crate::DumpError::Http("gone".to_string())),
            Ok(b"</r>".to_vec()),
        ];
        let got: Vec<_> = ElementStream::new(chunks).collect();
        assert!(matches!(got[0], Err(crate::DumpError::Http(_))));
        assert_eq!(got[1].as_ref().unwrap().tag, "r");
    }

    #[test]
    fn byte_at_a_time() {
        let whole = elements(vec![DOC]);
        let bytes: Vec<Vec<u8>> = DOC.bytes().map(|b| vec![b]).collect();
        assert_eq!(elements(bytes), whole);
        assert_eq!(whole.len(), 13);
    }

    proptest! {
        #[test]
        fn chunk_boundaries_are_invisible(mut cuts in proptest::collection::vec(0..DOC.len(), 0..24)) {
            cuts.sort_unstable();
            cuts.dedup();

            let bytes = DOC.as_bytes();
            let mut chunks = Vec::new();
            let mut start = 0;
            for cut in cuts {
                chunks.push(&bytes[start..cut]);
                start = cut;
            }
            chunks.push(&bytes[start..]);

            prop_assert_eq!(elements(chunks), elements(vec![DOC]));
        }
    }
}
