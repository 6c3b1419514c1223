//! Column maps and lenient field coercion for source rows.
//!
//! The source API returns opaque key→value rows whose column names are
//! deployment-specific. A [`ColumnMap`] translates the engine's logical
//! field names to the source's column names; coercion helpers project the
//! loosely-typed values (everything may arrive as a string) into typed
//! fields without ever panicking.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{SourceRow, TableKey};

/// Accepted aliases for the stable row id, in resolution order.
const ROW_ID_ALIASES: [&str; 4] = ["$rowID", "rowID", "RowID", "id"];

/// Resolve the stable external id of a source row.
///
/// Tries each accepted alias in order; an empty or whitespace-only value
/// counts as absent.
pub fn row_id(row: &SourceRow) -> Option<&str> {
    for key in ROW_ID_ALIASES {
        if let Some(Value::String(s)) = row.get(key) {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed);
            }
        }
    }
    None
}

/// Logical-field → source-column translation for one table.
///
/// Unmapped logical names fall through unchanged, so an identity contract
/// works against a source whose columns already use the logical names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnMap(pub HashMap<String, String>);

impl ColumnMap {
    /// Source column name for a logical field.
    pub fn col<'a>(&'a self, logical: &'a str) -> &'a str {
        self.0.get(logical).map(String::as_str).unwrap_or(logical)
    }

    /// Fetch the raw value for a logical field from a row.
    pub fn get<'a>(&self, row: &'a SourceRow, logical: &str) -> Option<&'a Value> {
        row.get(self.col(logical))
    }
}

/// Contract for one source table: its remote name plus its column map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableContract {
    pub table_name: String,
    #[serde(default)]
    pub columns: ColumnMap,
}

/// Contracts for all four source tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableContracts {
    pub all_rfq: TableContract,
    pub all_products: TableContract,
    pub queries: TableContract,
    pub supplier_shares: TableContract,
}

impl TableContracts {
    /// Identity contracts: remote table names equal the table keys and
    /// columns use the logical names directly.
    pub fn identity() -> Self {
        let make = |key: TableKey| TableContract {
            table_name: key.as_str().to_string(),
            columns: ColumnMap::default(),
        };
        Self {
            all_rfq: make(TableKey::AllRfq),
            all_products: make(TableKey::AllProducts),
            queries: make(TableKey::Queries),
            supplier_shares: make(TableKey::SupplierShares),
        }
    }

    /// Load contracts from a JSON document (see `contracts.example.json`).
    pub fn from_json(doc: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(doc)?)
    }

    pub fn for_table(&self, key: TableKey) -> &TableContract {
        match key {
            TableKey::AllRfq => &self.all_rfq,
            TableKey::AllProducts => &self.all_products,
            TableKey::Queries => &self.queries,
            TableKey::SupplierShares => &self.supplier_shares,
        }
    }
}

// =============================================================================
// COERCIONS
// =============================================================================

/// Coerce a value to text; lists and objects render as compact JSON.
pub fn as_text(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::Null => None,
        Value::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        }
        Value::Array(_) | Value::Object(_) => Some(v?.to_string()),
        other => Some(other.to_string()),
    }
}

/// Coerce a value to a boolean. Accepts true/false, 1/0, yes/no, y/n, on/off
/// (case-insensitive); anything else is None.
pub fn as_bool(v: Option<&Value>) -> Option<bool> {
    match v? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "y" | "on" => Some(true),
            "0" | "false" | "no" | "n" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Coerce a value to f64; numeric strings are parsed, everything else None.
pub fn as_f64(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Coerce a value to a UTC timestamp.
///
/// Tries RFC 3339 first, then the date/datetime layouts the source is known
/// to emit. Unparseable values are None, never an error — a bad date in one
/// column must not fail the row.
pub fn as_timestamp(v: Option<&Value>) -> Option<DateTime<Utc>> {
    let s = match v? {
        Value::String(s) => s.trim(),
        _ => return None,
    };
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    const DATETIME_LAYOUTS: [&str; 3] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
    ];
    for layout in DATETIME_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(naive.and_utc());
        }
    }
    const DATE_LAYOUTS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y"];
    for layout in DATE_LAYOUTS {
        if let Ok(date) = NaiveDate::parse_from_str(s, layout) {
            return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
        }
    }
    None
}

/// Coerce a value to a list of non-empty strings.
///
/// Lists pass through; comma-separated strings are split; object values are
/// collected; a plain scalar becomes a one-element list.
pub fn as_string_list(v: Option<&Value>) -> Vec<String> {
    let Some(v) = v else { return Vec::new() };
    match v {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .filter_map(|x| as_text(Some(x)))
            .collect(),
        Value::Object(map) => map
            .values()
            .filter_map(|x| as_text(Some(x)))
            .collect(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                Vec::new()
            } else if s.contains(',') {
                s.split(',')
                    .map(str::trim)
                    .filter(|x| !x.is_empty())
                    .map(String::from)
                    .collect()
            } else {
                vec![s.to_string()]
            }
        }
        other => vec![other.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> SourceRow {
        value.as_object().expect("object").clone()
    }

    #[test]
    fn row_id_resolves_aliases_in_order() {
        let r = row(json!({"id": "fallback", "rowID": "primary"}));
        assert_eq!(row_id(&r), Some("primary"));

        let r = row(json!({"id": "only-id"}));
        assert_eq!(row_id(&r), Some("only-id"));

        let r = row(json!({"$rowID": "dollar", "rowID": "plain"}));
        assert_eq!(row_id(&r), Some("dollar"));
    }

    #[test]
    fn row_id_treats_blank_as_absent() {
        let r = row(json!({"rowID": "  ", "id": "real"}));
        assert_eq!(row_id(&r), Some("real"));

        let r = row(json!({"Title": "no id here"}));
        assert_eq!(row_id(&r), None);
    }

    #[test]
    fn column_map_falls_through_to_logical_name() {
        let mut map = ColumnMap::default();
        map.0.insert("title".into(), "Name".into());
        assert_eq!(map.col("title"), "Name");
        assert_eq!(map.col("deadline"), "deadline");
    }

    #[test]
    fn bool_coercion_accepts_common_spellings() {
        assert_eq!(as_bool(Some(&json!("Yes"))), Some(true));
        assert_eq!(as_bool(Some(&json!("off"))), Some(false));
        assert_eq!(as_bool(Some(&json!(1))), Some(true));
        assert_eq!(as_bool(Some(&json!(true))), Some(true));
        assert_eq!(as_bool(Some(&json!("maybe"))), None);
        assert_eq!(as_bool(None), None);
    }

    #[test]
    fn f64_coercion_parses_numeric_strings() {
        assert_eq!(as_f64(Some(&json!("12.5"))), Some(12.5));
        assert_eq!(as_f64(Some(&json!(40))), Some(40.0));
        assert_eq!(as_f64(Some(&json!("40 pcs"))), None);
    }

    #[test]
    fn timestamp_coercion_accepts_rfc3339_and_dates() {
        let t = as_timestamp(Some(&json!("2026-01-15T10:30:00Z"))).unwrap();
        assert_eq!(t.to_rfc3339(), "2026-01-15T10:30:00+00:00");

        let t = as_timestamp(Some(&json!("2026-01-15"))).unwrap();
        assert_eq!(t.to_rfc3339(), "2026-01-15T00:00:00+00:00");

        assert_eq!(as_timestamp(Some(&json!("not a date"))), None);
        assert_eq!(as_timestamp(Some(&json!(""))), None);
    }

    #[test]
    fn string_list_coercion_handles_shapes() {
        assert_eq!(
            as_string_list(Some(&json!(["a", " b ", ""]))),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(
            as_string_list(Some(&json!("x, y,z"))),
            vec!["x".to_string(), "y".to_string(), "z".to_string()]
        );
        assert_eq!(as_string_list(Some(&json!("solo"))), vec!["solo".to_string()]);
        assert_eq!(as_string_list(None), Vec::<String>::new());
    }

    #[test]
    fn contracts_round_trip_from_json() {
        let doc = r#"{
            "all_rfq": {"table_name": "ALL_RFQ", "columns": {"title": "Title"}},
            "all_products": {"table_name": "ALL_PRODUCTS"},
            "queries": {"table_name": "QUERIES"},
            "supplier_shares": {"table_name": "SUPPLIER_SHARES"}
        }"#;
        let contracts = TableContracts::from_json(doc).unwrap();
        assert_eq!(contracts.all_rfq.table_name, "ALL_RFQ");
        assert_eq!(contracts.all_rfq.columns.col("title"), "Title");
        assert_eq!(contracts.queries.columns.col("comment"), "comment");
    }
}
