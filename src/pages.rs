//! Page extraction from a MediaWiki export element stream.
//!
//! The element stream is flat, so a page's fields arrive as separate leaf
//! elements before the `page` element that contains them. The extractor
//! remembers the fields of the page in progress and forgets them once the
//! page closes.

use crate::error::{DumpError, Result};
use crate::xml::ParsedElement;

/// Namespace URI prefix shared by every MediaWiki export schema version.
pub const MEDIAWIKI_NAMESPACE_PREFIX: &str = "http://www.mediawiki.org/xml/export-";

/// One page of the dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Page id, when the dump carries a numeric one.
    pub id: Option<u64>,
    pub title: String,
    /// Wiki namespace number as written in the dump, `"0"` for articles.
    pub namespace: String,
    /// Wikitext of the first revision in the page.
    pub text: String,
    pub is_redirect: bool,
}

/// Fully qualified tags of the fields a page is built from.
struct Tags {
    page: String,
    title: String,
    ns: String,
    id: String,
    text: String,
    redirect: String,
}

impl Tags {
    /// Derive the tags from the schema namespace of the first element.
    fn from_first(element: &ParsedElement) -> Result<Self> {
        let namespace = element.namespace().unwrap_or_default();
        if !namespace.starts_with(MEDIAWIKI_NAMESPACE_PREFIX) {
            return Err(DumpError::Namespace(namespace.to_string()));
        }
        let qualify = |local: &str| format!("{{{namespace}}}{local}");
        Ok(Self {
            page: qualify("page"),
            title: qualify("title"),
            ns: qualify("ns"),
            id: qualify("id"),
            text: qualify("text"),
            redirect: qualify("redirect"),
        })
    }
}

/// Fields of the page currently being read.
#[derive(Default)]
struct PageFields {
    id: Option<u64>,
    title: Option<String>,
    ns: Option<String>,
    text: Option<String>,
    is_redirect: bool,
}

/// Iterator over the pages of one wiki namespace.
pub struct PageExtractor<I> {
    elements: I,
    namespace: String,
    tags: Option<Tags>,
    fields: PageFields,
    failed: bool,
}

impl<I> PageExtractor<I>
where
    I: Iterator<Item = Result<ParsedElement>>,
{
    /// Extract article pages (namespace `0`).
    pub fn new<T>(elements: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self::with_namespace(elements, "0")
    }

    /// Extract the pages whose `ns` field equals `namespace`.
    pub fn with_namespace<T>(elements: T, namespace: &str) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            elements: elements.into_iter(),
            namespace: namespace.to_string(),
            tags: None,
            fields: PageFields::default(),
            failed: false,
        }
    }
}

impl<I> Iterator for PageExtractor<I>
where
    I: Iterator<Item = Result<ParsedElement>>,
{
    type Item = Result<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.failed {
            let element = match self.elements.next()? {
                Ok(element) => element,
                Err(e) => return Some(Err(e)),
            };

            if self.tags.is_none() {
                match Tags::from_first(&element) {
                    Ok(tags) => self.tags = Some(tags),
                    Err(e) => {
                        self.failed = true;
                        return Some(Err(e));
                    }
                }
            }
            let Some(tags) = &self.tags else {
                continue;
            };

            let fields = &mut self.fields;
            if element.tag == tags.title {
                fields.title.get_or_insert(element.text.unwrap_or_default());
            } else if element.tag == tags.ns {
                fields.ns = element.text;
            } else if element.tag == tags.id {
                // The page id precedes the revision ids.
                if fields.id.is_none() {
                    fields.id = element.text.and_then(|id| id.trim().parse().ok());
                }
            } else if element.tag == tags.text {
                fields.text.get_or_insert(element.text.unwrap_or_default());
            } else if element.tag == tags.redirect {
                fields.is_redirect = true;
            } else if element.tag == tags.page {
                let fields = std::mem::take(&mut self.fields);
                if fields.ns.as_deref().unwrap_or_default() != self.namespace {
                    continue;
                }
                return Some(Ok(Page {
                    id: fields.id,
                    title: fields.title.unwrap_or_default(),
                    namespace: self.namespace.clone(),
                    text: fields.text.unwrap_or_default(),
                    is_redirect: fields.is_redirect,
                }));
            }
        }
        None
    }
}
