//! Paging clause and the limit/offset window derived from it.

use serde::Serialize;

use crate::ast::Term;
use crate::error::{RqlError, RqlResult};
use crate::transpiler::CompileOptions;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Page {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    /// Continuation echoed back from a previous result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Term>,
}

/// The concrete slice of rows a compiled query asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Set when the window came from `page(n)`.
    pub page: Option<u64>,
}

impl PageWindow {
    pub fn is_first_page(&self) -> bool {
        self.offset.unwrap_or(0) == 0
    }

    /// Total row count implied by the rows already returned: known only on
    /// a first page that came back short (or had no limit).
    pub fn found_from_page(&self, returned: usize) -> Option<u64> {
        let returned = returned as u64;
        let short = self.limit.is_none_or(|limit| returned < limit);
        (self.is_first_page() && short).then_some(returned)
    }

    /// Terms that fetch the following window, given how many rows this one
    /// returned and (when known) the total number of matching rows.
    pub fn next_terms(&self, returned: usize, found: Option<u64>) -> Vec<Term> {
        let Some(limit) = self.limit else {
            return Vec::new();
        };
        let returned = returned as u64;
        let offset = self.offset.unwrap_or(0);
        if limit == 0 || returned < limit {
            return Vec::new();
        }
        if found.is_some_and(|found| offset.saturating_add(returned) >= found) {
            return Vec::new();
        }
        let next = match self.page {
            Some(page) => page.checked_add(1).map(|p| ("page", p)),
            None => offset.checked_add(limit).map(|o| ("offset", o)),
        };
        match next {
            Some((name, n)) => vec![Term::func(name, [Term::leaf(n.to_string())])],
            None => Vec::new(),
        }
    }
}

fn integer(term: &Term) -> RqlResult<u64> {
    match term.args() {
        [arg] if arg.is_leaf() && arg.quote().is_none() => arg
            .token()
            .parse::<u64>()
            .map_err(|_| RqlError::validation(term, "expected a non-negative integer")),
        _ => Err(RqlError::validation(term, "expected exactly one integer argument")),
    }
}

impl Page {
    /// Apply a `limit`, `offset`, `page`, `pagesize` or `after` term.
    pub fn set(&mut self, term: &Term) -> RqlResult<()> {
        match term.token() {
            "limit" => self.limit = Some(integer(term)?),
            "offset" => self.offset = Some(integer(term)?),
            "page" => {
                let page = integer(term)?;
                if page == 0 {
                    return Err(RqlError::validation(term, "pages are numbered from 1"));
                }
                self.page = Some(page);
            }
            "pagesize" => {
                let size = integer(term)?;
                if size == 0 {
                    return Err(RqlError::validation(term, "page size must be positive"));
                }
                self.page_size = Some(size);
            }
            "after" => {
                if term.args().is_empty() {
                    return Err(RqlError::validation(term, "after needs key values"));
                }
                self.after = Some(term.clone());
            }
            other => {
                return Err(RqlError::internal(format!(
                    "'{}' routed to the page clause",
                    other
                )));
            }
        }
        Ok(())
    }

    /// Resolve limit and offset using the configured defaults.
    pub fn window(&self, options: &CompileOptions) -> RqlResult<PageWindow> {
        let size = self
            .limit
            .or(self.page_size)
            .or(self.page.map(|_| options.page_size))
            .or(options.default_limit);
        let size = match (size, options.max_limit) {
            (Some(size), Some(max)) => Some(size.min(max)),
            (None, Some(max)) => Some(max),
            (size, None) => size,
        };
        let offset = match (self.offset, self.page) {
            (Some(offset), _) => Some(offset),
            (None, Some(page)) => {
                let offset = page
                    .saturating_sub(1)
                    .checked_mul(size.unwrap_or(options.page_size))
                    .ok_or_else(|| {
                        RqlError::validation(
                            Term::func("page", [Term::leaf(page.to_string())]),
                            "page window out of range",
                        )
                    })?;
                Some(offset)
            }
            (None, None) => None,
        };
        Ok(PageWindow {
            limit: size,
            offset: offset.filter(|o| *o > 0),
            page: if self.offset.is_none() { self.page } else { None },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn page(clauses: &[&str]) -> RqlResult<Page> {
        let mut page = Page::default();
        for clause in clauses {
            page.set(&parse(clause)?)?;
        }
        Ok(page)
    }

    #[test]
    fn test_rejects_non_integers() {
        assert!(page(&["limit(abc)"]).is_err());
        assert!(page(&["limit(-1)"]).is_err());
        assert!(page(&["offset('5')"]).is_err());
        assert!(page(&["page(0)"]).is_err());
        assert!(page(&["limit(1,2)"]).is_err());
    }

    #[test]
    fn test_window_from_page() {
        let options = CompileOptions::default();
        let window = page(&["page(3)", "pagesize(20)"]).unwrap().window(&options).unwrap();
        assert_eq!(window.limit, Some(20));
        assert_eq!(window.offset, Some(40));
        assert_eq!(window.page, Some(3));

        let window = page(&["page(2)"]).unwrap().window(&options).unwrap();
        assert_eq!(window.limit, Some(options.page_size));
        assert_eq!(window.offset, Some(options.page_size));
    }

    #[test]
    fn test_found_from_short_first_page() {
        let window = PageWindow {
            limit: Some(10),
            ..Default::default()
        };
        assert_eq!(window.found_from_page(0), Some(0));
        assert_eq!(window.found_from_page(4), Some(4));
        assert_eq!(window.found_from_page(10), None);

        let second = PageWindow {
            limit: Some(10),
            offset: Some(10),
            page: None,
        };
        assert_eq!(second.found_from_page(0), None);
        assert_eq!(PageWindow::default().found_from_page(7), Some(7));
    }

    #[test]
    fn test_window_clamps() {
        let options = CompileOptions {
            default_limit: Some(50),
            max_limit: Some(100),
            ..Default::default()
        };
        assert_eq!(page(&[]).unwrap().window(&options).unwrap().limit, Some(50));
        assert_eq!(page(&["limit(500)"]).unwrap().window(&options).unwrap().limit, Some(100));
    }

    #[test]
    fn test_next_terms() {
        let window = PageWindow {
            limit: Some(10),
            offset: Some(20),
            page: None,
        };
        assert_eq!(window.next_terms(10, None)[0].to_string(), "offset(30)");
        assert!(window.next_terms(9, None).is_empty());
        assert!(window.next_terms(10, Some(30)).is_empty());

        let window = PageWindow {
            limit: Some(10),
            offset: Some(10),
            page: Some(2),
        };
        assert_eq!(window.next_terms(10, Some(100))[0].to_string(), "page(3)");
    }

    #[test]
    fn test_window_out_of_range() {
        let options = CompileOptions::default();
        let err = page(&["page(18446744073709551615)"])
            .unwrap()
            .window(&options)
            .unwrap_err();
        match err {
            RqlError::Validation { message, .. } => assert_eq!(message, "page window out of range"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_next_terms_at_u64_max() {
        let window = PageWindow {
            limit: Some(10),
            offset: Some(u64::MAX - 5),
            page: None,
        };
        assert!(window.next_terms(10, None).is_empty());
        assert!(window.next_terms(10, Some(u64::MAX)).is_empty());

        let window = PageWindow {
            limit: Some(10),
            offset: Some(10),
            page: Some(u64::MAX),
        };
        assert!(window.next_terms(10, None).is_empty());
    }
}
