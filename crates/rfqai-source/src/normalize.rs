//! Response-shape normalization.
//!
//! The source API returns pages in several shapes depending on plan and
//! version: bare `{rows, next|cursor}`, results-wrapped
//! `{results: [{rows, cursor}]}`, or either of those inside a top-level
//! one-element list. Everything is folded into one canonical [`Page`] here;
//! no other component ever sees a raw response.

use serde_json::Value;

use rfqai_core::{Page, SourceRow, TokenKind};

/// Normalize a raw query response into a canonical page.
///
/// Token-kind detection follows the field the source used: `next` is a
/// pointer-style token (sent back as `startAt`), `cursor` / `nextCursor`
/// are cursor-style. Unrecognized shapes produce an empty page, which the
/// cursor treats as termination.
pub fn normalize_response(raw: &Value) -> Page {
    let body = unwrap_body(raw);

    let rows = body
        .get("rows")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_object().cloned())
                .collect::<Vec<SourceRow>>()
        })
        .unwrap_or_default();

    let (next_token, token_kind) = extract_token(body);

    Page {
        rows,
        next_token,
        token_kind,
    }
}

/// Peel the wrappers: a top-level one-element list, then a `results` list.
fn unwrap_body(raw: &Value) -> &Value {
    let inner = match raw {
        Value::Array(items) => items.first().unwrap_or(raw),
        other => other,
    };
    match inner.get("results").and_then(Value::as_array) {
        Some(results) => results.first().unwrap_or(inner),
        None => inner,
    }
}

fn extract_token(body: &Value) -> (Option<String>, Option<TokenKind>) {
    if let Some(token) = non_empty_str(body.get("next")) {
        return (Some(token), Some(TokenKind::StartAt));
    }
    if let Some(token) = non_empty_str(body.get("cursor")).or_else(|| non_empty_str(body.get("nextCursor"))) {
        return (Some(token), Some(TokenKind::Cursor));
    }
    (None, None)
}

fn non_empty_str(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_rows_with_next_token() {
        let page = normalize_response(&json!({"rows": [{"rowID": "r1"}], "next": "tok-1"}));
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.next_token.as_deref(), Some("tok-1"));
        assert_eq!(page.token_kind, Some(TokenKind::StartAt));
    }

    #[test]
    fn results_wrapped_with_cursor() {
        let page =
            normalize_response(&json!({"results": [{"rows": [{"rowID": "r3"}], "cursor": "cur-1"}]}));
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.next_token.as_deref(), Some("cur-1"));
        assert_eq!(page.token_kind, Some(TokenKind::Cursor));
    }

    #[test]
    fn top_level_list_wrapping_bare_shape() {
        let page = normalize_response(&json!([{"rows": [{"rowID": "r5"}], "cursor": "cur-2"}]));
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.token_kind, Some(TokenKind::Cursor));
    }

    #[test]
    fn top_level_list_wrapping_results_shape() {
        let page = normalize_response(&json!([{"results": [{"rows": [{"rowID": "r6"}]}]}]));
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.next_token, None);
        assert_eq!(page.token_kind, None);
    }

    #[test]
    fn next_cursor_alias_detected_as_cursor() {
        let page = normalize_response(&json!({"rows": [], "nextCursor": "c9"}));
        assert_eq!(page.next_token.as_deref(), Some("c9"));
        assert_eq!(page.token_kind, Some(TokenKind::Cursor));
    }

    #[test]
    fn next_takes_precedence_over_cursor() {
        let page = normalize_response(&json!({"rows": [], "next": "n1", "cursor": "c1"}));
        assert_eq!(page.next_token.as_deref(), Some("n1"));
        assert_eq!(page.token_kind, Some(TokenKind::StartAt));
    }

    #[test]
    fn empty_token_string_is_absent() {
        let page = normalize_response(&json!({"rows": [{"rowID": "r1"}], "next": ""}));
        assert_eq!(page.next_token, None);
        assert_eq!(page.token_kind, None);
    }

    #[test]
    fn unrecognized_shape_yields_empty_page() {
        let page = normalize_response(&json!({"message": "rate limited"}));
        assert!(page.rows.is_empty());
        assert_eq!(page.next_token, None);
    }

    #[test]
    fn non_object_rows_are_dropped() {
        let page = normalize_response(&json!({"rows": [{"rowID": "r1"}, "garbage", 42]}));
        assert_eq!(page.rows.len(), 1);
    }
}
