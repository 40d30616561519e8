mod direct;
mod drive;

pub use direct::DirectResolver;
pub use drive::{DriveResolver, MIN_CREDENTIAL_LEN};

/// Turns a resource identifier into an ordered list of candidate URLs for the
/// same audio resource, most preferred first.
///
/// Implementations must be pure: no network access, same output for the same
/// input, and at least one entry.
pub trait SourceResolver {
    fn resolve(&self, identifier: &str, credential: Option<&str>) -> Vec<String>;

    /// Link that opens the resource directly at the host, shown when every
    /// candidate has failed.
    fn view_url(&self, _identifier: &str) -> Option<String> {
        None
    }
}

impl<T: SourceResolver + ?Sized> SourceResolver for Box<T> {
    fn resolve(&self, identifier: &str, credential: Option<&str>) -> Vec<String> {
        (**self).resolve(identifier, credential)
    }

    fn view_url(&self, identifier: &str) -> Option<String> {
        (**self).view_url(identifier)
    }
}

/// Resolved candidates plus a cursor. The cursor never leaves the list.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateList {
    urls: Vec<String>,
    index: usize,
}

impl CandidateList {
    /// Returns `None` for an empty list.
    pub fn new(urls: Vec<String>) -> Option<Self> {
        if urls.is_empty() {
            return None;
        }
        Some(Self { urls, index: 0 })
    }

    pub fn current(&self) -> &str {
        &self.urls[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.index + 1 < self.urls.len()
    }

    /// Moves to the next candidate. Returns `false` (and stays put) when the
    /// list is exhausted.
    pub fn advance(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.index += 1;
        true
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }
}
