//! Cursor-paginated connections
//!
//! Builds forward-only connections over fully materialized,
//! deterministically ordered sequences. Cursors are opaque tokens encoding
//! the absolute offset of an item; they stay valid across requests as long
//! as the same scope and filter produce the same ordering.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Page size used when the caller does not ask for one
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Upper bound on the page size a caller may request
pub const MAX_PAGE_SIZE: usize = 100;

const CURSOR_PREFIX: &str = "cursor:";

/// Caller-supplied pagination arguments
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CursorArgs {
    /// Maximum number of items to return
    pub first: Option<usize>,
    /// Cursor of the last item of the previous page
    pub after: Option<String>,
}

/// One item of a connection with its position cursor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge<T> {
    /// Opaque position token
    pub cursor: String,
    /// The item itself
    pub node: T,
}

/// Pagination metadata for a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    /// Whether items exist after this page
    pub has_next_page: bool,
    /// Whether items exist before this page
    pub has_previous_page: bool,
    /// Cursor of the first edge, if any
    pub start_cursor: Option<String>,
    /// Cursor of the last edge, if any
    pub end_cursor: Option<String>,
}

/// An ordered page of items plus pagination metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connection<T> {
    /// The items of this page
    pub edges: Vec<Edge<T>>,
    /// Pagination metadata
    pub page_info: PageInfo,
    /// Size of the full underlying sequence
    pub total_count: usize,
}

/// Encode an absolute offset as an opaque cursor
pub fn encode_cursor(offset: usize) -> String {
    BASE64.encode(format!("{CURSOR_PREFIX}{offset}"))
}

/// Decode a cursor back to its absolute offset
pub fn decode_cursor(cursor: &str) -> Result<usize> {
    let bytes = BASE64
        .decode(cursor)
        .map_err(|_| Error::invalid_cursor(cursor))?;
    let text = String::from_utf8(bytes).map_err(|_| Error::invalid_cursor(cursor))?;
    text.strip_prefix(CURSOR_PREFIX)
        .and_then(|offset| offset.parse().ok())
        .ok_or_else(|| Error::invalid_cursor(cursor))
}

/// Build a connection over an already-ordered sequence.
///
/// A structurally valid cursor pointing past the end of the sequence
/// yields an empty page; only malformed cursors are an error.
pub fn paginate<T>(items: Vec<T>, args: &CursorArgs) -> Result<Connection<T>> {
    let total_count = items.len();
    // An offset at usize::MAX cannot address an item, so the page after it
    // is empty rather than an arithmetic wrap back to the start.
    let start = match &args.after {
        Some(cursor) => decode_cursor(cursor)?.checked_add(1).unwrap_or(usize::MAX),
        None => 0,
    };
    let page_size = args.first.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);

    let edges: Vec<Edge<T>> = items
        .into_iter()
        .enumerate()
        .skip(start)
        .take(page_size)
        .map(|(offset, node)| Edge {
            cursor: encode_cursor(offset),
            node,
        })
        .collect();

    let page_info = PageInfo {
        has_next_page: start + edges.len() < total_count,
        has_previous_page: start > 0,
        start_cursor: edges.first().map(|edge| edge.cursor.clone()),
        end_cursor: edges.last().map(|edge| edge.cursor.clone()),
    };

    Ok(Connection {
        edges,
        page_info,
        total_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cursor_roundtrip() {
        for offset in [0, 1, 7, 10_000] {
            assert_eq!(decode_cursor(&encode_cursor(offset)).unwrap(), offset);
        }
    }

    #[test]
    fn malformed_cursor_is_rejected() {
        for bad in ["not-base64!!", &BASE64.encode("nonsense"), &BASE64.encode("cursor:abc")] {
            let err = decode_cursor(bad).unwrap_err();
            assert!(matches!(err, crate::Error::InvalidCursor(_)));
        }
    }

    #[test]
    fn first_page_defaults() {
        let connection = paginate((0..5).collect(), &CursorArgs::default()).unwrap();
        assert_eq!(connection.edges.len(), 5);
        assert_eq!(connection.total_count, 5);
        assert!(!connection.page_info.has_next_page);
        assert!(!connection.page_info.has_previous_page);
    }

    #[test]
    fn forward_pagination_resumes_after_cursor() {
        let first = paginate(
            (0..10).collect(),
            &CursorArgs {
                first: Some(3),
                after: None,
            },
        )
        .unwrap();
        assert_eq!(
            first.edges.iter().map(|e| e.node).collect::<Vec<i32>>(),
            vec![0, 1, 2]
        );
        assert!(first.page_info.has_next_page);

        let second = paginate(
            (0..10).collect(),
            &CursorArgs {
                first: Some(3),
                after: first.page_info.end_cursor.clone(),
            },
        )
        .unwrap();
        assert_eq!(
            second.edges.iter().map(|e| e.node).collect::<Vec<i32>>(),
            vec![3, 4, 5]
        );
        assert!(second.page_info.has_previous_page);
    }

    #[test]
    fn cursor_past_the_end_yields_empty_page() {
        let connection = paginate(
            vec![1, 2],
            &CursorArgs {
                first: None,
                after: Some(encode_cursor(10)),
            },
        )
        .unwrap();
        assert!(connection.edges.is_empty());
        assert!(!connection.page_info.has_next_page);
        assert_eq!(connection.total_count, 2);
    }

    #[test]
    fn cursor_at_the_maximum_offset_yields_empty_page() {
        let connection = paginate(
            vec![1, 2, 3],
            &CursorArgs {
                first: None,
                after: Some(encode_cursor(usize::MAX)),
            },
        )
        .unwrap();
        assert!(connection.edges.is_empty());
        assert!(!connection.page_info.has_next_page);
        assert_eq!(connection.total_count, 3);
    }

    #[test]
    fn page_size_is_capped() {
        let items: Vec<usize> = (0..(MAX_PAGE_SIZE + 50)).collect();
        let connection = paginate(
            items,
            &CursorArgs {
                first: Some(MAX_PAGE_SIZE + 50),
                after: None,
            },
        )
        .unwrap();
        assert_eq!(connection.edges.len(), MAX_PAGE_SIZE);
        assert!(connection.page_info.has_next_page);
    }
}
