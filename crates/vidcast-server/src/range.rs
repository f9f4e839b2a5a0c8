//! Byte-range planning for media responses.
//!
//! Parsing is deliberately lenient: any `Range` header that does not
//! resolve to a satisfiable `bytes=<start>-<end>` span is treated as if no
//! bounds were given, and the whole resource is served. No request is
//! ever answered with 416.
//!
//! The presence of the header, not whether it parsed, decides between
//! 200 and 206 for `GET`.

use axum::http::{Method, StatusCode};

const BYTES_PREFIX: &str = "bytes=";

/// Bounds as written in a `Range` header, before checking them against
/// the resource size. Both are inclusive offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte requested, if given.
    pub start: Option<u64>,
    /// Last byte requested, if given.
    pub end: Option<u64>,
}

impl ByteRange {
    /// Parse a `Range` header value.
    ///
    /// Returns `None` unless the value is `bytes=` followed by exactly two
    /// `-`-separated parts, each empty or a non-negative integer.
    pub fn parse(header: &str) -> Option<Self> {
        let spec = header.trim().strip_prefix(BYTES_PREFIX)?;
        let mut parts = spec.split('-');
        let start = parse_bound(parts.next()?)?;
        let end = parse_bound(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { start, end })
    }

    /// Check the bounds against a resource of `size` bytes.
    ///
    /// A missing start means 0 and a missing or oversized end means the
    /// last byte. Returns `None` when nothing satisfiable remains.
    pub fn resolve(self, size: u64) -> Option<Span> {
        let last = size.checked_sub(1)?;
        let start = self.start.unwrap_or(0);
        let end = self.end.map_or(last, |end| end.min(last));
        (start <= end).then_some(Span { start, end })
    }
}

// Outer `None` rejects the header; inner `None` is an omitted bound.
fn parse_bound(raw: &str) -> Option<Option<u64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(None);
    }
    raw.parse::<u64>().ok().map(Some)
}

/// An inclusive, satisfiable byte span within a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// First byte.
    pub start: u64,
    /// Last byte.
    pub end: u64,
}

impl Span {
    /// Number of bytes covered.
    pub const fn len(&self) -> u64 {
        self.end.saturating_sub(self.start).saturating_add(1)
    }

    /// Always `false`; a span covers at least one byte.
    pub const fn is_empty(&self) -> bool {
        false
    }
}

/// Everything needed to answer a media request except the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePlan {
    /// Status line.
    pub status: StatusCode,
    /// Value of `Content-Length`.
    pub content_length: u64,
    /// Value of `Content-Range`, when one is sent.
    pub content_range: Option<String>,
    /// Whether to send `Accept-Ranges: bytes`.
    pub accept_ranges: bool,
    /// Offset to start reading from.
    pub offset: u64,
    /// Whether a body follows the headers.
    pub send_body: bool,
}

/// Plan the response for `method` on a resource of `size` bytes.
pub fn plan(method: &Method, size: u64, range_header: Option<&str>) -> ResponsePlan {
    let requested = range_header.is_some();
    let span = range_header
        .and_then(ByteRange::parse)
        .and_then(|range| range.resolve(size));

    let (offset, content_length) = span.map_or((0, size), |span| (span.start, span.len()));

    if *method == Method::HEAD {
        return ResponsePlan {
            status: StatusCode::OK,
            content_length,
            content_range: None,
            accept_ranges: true,
            offset,
            send_body: false,
        };
    }

    let content_range = requested.then(|| content_range(span, size));

    ResponsePlan {
        status: if requested {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        },
        content_length,
        content_range,
        accept_ranges: requested,
        offset,
        send_body: true,
    }
}

fn content_range(span: Option<Span>, size: u64) -> String {
    match span {
        Some(span) => format!("bytes {}-{}/{size}", span.start, span.end),
        None => match size.checked_sub(1) {
            Some(last) => format!("bytes 0-{last}/{size}"),
            None => String::from("bytes */0"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_closed_open_and_suffix_forms() {
        assert_eq!(
            ByteRange::parse("bytes=200-299"),
            Some(ByteRange { start: Some(200), end: Some(299) })
        );
        assert_eq!(
            ByteRange::parse("bytes=900-"),
            Some(ByteRange { start: Some(900), end: None })
        );
        assert_eq!(
            ByteRange::parse("bytes=-10"),
            Some(ByteRange { start: None, end: Some(10) })
        );
        assert_eq!(
            ByteRange::parse("bytes= 5 - 6 "),
            Some(ByteRange { start: Some(5), end: Some(6) })
        );
    }

    #[test]
    fn rejects_malformed_headers() {
        for bad in ["items=0-1", "bytes=a-b", "bytes=1", "bytes=1-2-3", "bytes=0-1,5-6", ""] {
            assert_eq!(ByteRange::parse(bad), None, "{bad}");
        }
    }

    #[test]
    fn closed_range_yields_partial_content() {
        let p = plan(&Method::GET, 1000, Some("bytes=200-299"));
        assert_eq!(p.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(p.content_length, 100);
        assert_eq!(p.content_range.as_deref(), Some("bytes 200-299/1000"));
        assert!(p.accept_ranges);
        assert_eq!(p.offset, 200);
        assert!(p.send_body);
    }

    #[test]
    fn open_range_runs_to_end_of_resource() {
        let p = plan(&Method::GET, 1000, Some("bytes=900-"));
        assert_eq!(p.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(p.content_length, 100);
        assert_eq!(p.content_range.as_deref(), Some("bytes 900-999/1000"));
        assert_eq!(p.offset, 900);
    }

    #[test]
    fn suffix_form_reads_from_zero_through_end() {
        let p = plan(&Method::GET, 1000, Some("bytes=-9"));
        assert_eq!(p.content_length, 10);
        assert_eq!(p.content_range.as_deref(), Some("bytes 0-9/1000"));
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn single_byte_ranges() {
        let p = plan(&Method::GET, 1000, Some("bytes=0-0"));
        assert_eq!(p.content_length, 1);
        assert_eq!(p.content_range.as_deref(), Some("bytes 0-0/1000"));

        let p = plan(&Method::GET, 1000, Some("bytes=999-999"));
        assert_eq!(p.content_length, 1);
        assert_eq!(p.offset, 999);
    }

    #[test]
    fn no_header_serves_everything_with_200() {
        let p = plan(&Method::GET, 1000, None);
        assert_eq!(p.status, StatusCode::OK);
        assert_eq!(p.content_length, 1000);
        assert_eq!(p.content_range, None);
        assert!(!p.accept_ranges);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn malformed_header_still_answers_206_for_whole_resource() {
        let p = plan(&Method::GET, 1000, Some("bytes=oops"));
        assert_eq!(p.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(p.content_length, 1000);
        assert_eq!(p.content_range.as_deref(), Some("bytes 0-999/1000"));
    }

    #[test]
    fn out_of_bounds_is_lenient() {
        let p = plan(&Method::GET, 1000, Some("bytes=500-5000"));
        assert_eq!(p.content_length, 500);
        assert_eq!(p.content_range.as_deref(), Some("bytes 500-999/1000"));

        let p = plan(&Method::GET, 1000, Some("bytes=1000-"));
        assert_eq!(p.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(p.content_length, 1000);
        assert_eq!(p.offset, 0);

        let p = plan(&Method::GET, 1000, Some("bytes=300-200"));
        assert_eq!(p.content_length, 1000);
    }

    #[test]
    fn empty_resource() {
        let p = plan(&Method::GET, 0, Some("bytes=0-"));
        assert_eq!(p.content_length, 0);
        assert_eq!(p.content_range.as_deref(), Some("bytes */0"));
    }

    #[test]
    fn head_reports_get_length_without_body() {
        let p = plan(&Method::HEAD, 1000, None);
        assert_eq!(p.status, StatusCode::OK);
        assert_eq!(p.content_length, 1000);
        assert!(p.accept_ranges);
        assert!(!p.send_body);

        let p = plan(&Method::HEAD, 1000, Some("bytes=200-299"));
        assert_eq!(p.status, StatusCode::OK);
        assert_eq!(p.content_length, 100);
        assert_eq!(p.content_range, None);
    }
}
