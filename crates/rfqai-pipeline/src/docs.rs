//! Text document assembly from raw RFQ bundles.
//!
//! Rendering is purely a function of the bundle and the column contracts:
//! the brief doc folds the RFQ row and its supplier shares into key/value
//! lines, each product row becomes one card, each thread message one doc.
//! Raw rows are stored in canonical key order, so line order is stable and
//! identical content always produces identical documents.

use serde_json::{Map, Value};

use rfqai_core::{as_text, row_id, ColumnMap, DocKind, RfqBundle, SourceRow, TableContracts, TextDoc};

/// Row-id-ish and hash-ish columns that add noise, not meaning, to derived
/// text. Everything else renders.
const SILENT_COLUMNS: [&str; 4] = ["$rowID", "rowID", "RowID", "id"];

fn render_lines(row: &SourceRow) -> String {
    let mut lines = Vec::new();
    for (key, value) in row {
        if SILENT_COLUMNS.contains(&key.as_str()) {
            continue;
        }
        if let Some(text) = as_text(Some(value)) {
            lines.push(format!("{key}: {text}"));
        }
    }
    lines.join("\n")
}

fn title_for(row: &SourceRow, map: &ColumnMap, logical: &str, fallback: &str) -> String {
    as_text(map.get(row, logical)).unwrap_or_else(|| fallback.to_string())
}

/// Build every in-memory text document for one bundle. File-derived docs
/// are produced separately, once the extraction collaborator has run.
pub fn build_docs(bundle: &RfqBundle, contracts: &TableContracts) -> Vec<TextDoc> {
    let mut docs = Vec::new();

    // Brief: the RFQ row plus a share line per supplier the RFQ went to.
    let mut brief = render_lines(&bundle.rfq_row);
    if !bundle.share_rows.is_empty() {
        let share_map = &contracts.supplier_shares.columns;
        let mut shares = Vec::new();
        for row in &bundle.share_rows {
            if let Some(supplier) = as_text(share_map.get(row, "supplier")) {
                shares.push(supplier);
            }
        }
        if !shares.is_empty() {
            brief.push_str("\nshared_with: ");
            brief.push_str(&shares.join(", "));
        }
    }
    if !brief.trim().is_empty() {
        docs.push(TextDoc {
            doc_kind: DocKind::RfqBrief,
            rfq_id: bundle.rfq_id.clone(),
            product_id: None,
            query_id: None,
            file_id: None,
            title: title_for(
                &bundle.rfq_row,
                &contracts.all_rfq.columns,
                "title",
                &bundle.rfq_id,
            ),
            text: brief,
            meta: Map::new(),
        });
    }

    // One card per product row.
    let product_map = &contracts.all_products.columns;
    for row in &bundle.product_rows {
        let text = render_lines(row);
        if text.trim().is_empty() {
            continue;
        }
        docs.push(TextDoc {
            doc_kind: DocKind::ProductCard,
            rfq_id: bundle.rfq_id.clone(),
            product_id: row_id(row).map(String::from),
            query_id: None,
            file_id: None,
            title: title_for(row, product_map, "name", "product"),
            text,
            meta: Map::new(),
        });
    }

    // One doc per thread message.
    let query_map = &contracts.queries.columns;
    for row in &bundle.query_rows {
        let Some(comment) = as_text(query_map.get(row, "comment")) else {
            continue;
        };
        let author = as_text(query_map.get(row, "author"));
        let text = match &author {
            Some(author) => format!("{author}: {comment}"),
            None => comment,
        };
        docs.push(TextDoc {
            doc_kind: DocKind::ThreadMessage,
            rfq_id: bundle.rfq_id.clone(),
            product_id: None,
            query_id: row_id(row).map(String::from),
            file_id: None,
            title: author.unwrap_or_else(|| "message".to_string()),
            text,
            meta: Map::new(),
        });
    }

    docs
}

/// Wrap extracted file text into a document, carrying the file id and page.
pub fn file_doc(
    rfq_id: &str,
    product_id: Option<&str>,
    query_id: Option<&str>,
    file_id: &str,
    page_num: Option<i32>,
    text: String,
) -> TextDoc {
    let mut meta = Map::new();
    if let Some(page) = page_num {
        meta.insert("page_num".into(), Value::from(page));
    }
    TextDoc {
        doc_kind: DocKind::FileChunk,
        rfq_id: rfq_id.to_string(),
        product_id: product_id.map(String::from),
        query_id: query_id.map(String::from),
        file_id: Some(file_id.to_string()),
        title: file_id.to_string(),
        text,
        meta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> SourceRow {
        value.as_object().expect("object").clone()
    }

    fn bundle() -> RfqBundle {
        RfqBundle {
            rfq_id: "rfq-1".into(),
            rfq_row: row(json!({
                "rowID": "rfq-1",
                "Title": "Aluminium housings",
                "status": "open",
                "notes": ""
            })),
            product_rows: vec![
                row(json!({"rowID": "p1", "name": "Housing A", "quantity": 500})),
                row(json!({"rowID": "p2"})),
            ],
            query_rows: vec![
                row(json!({"rowID": "q1", "author": "buyer", "comment": "Anodized?"})),
                row(json!({"rowID": "q2", "author": "buyer"})),
            ],
            share_rows: vec![row(json!({"rowID": "s1", "supplier": "Acme Metals"}))],
        }
    }

    #[test]
    fn brief_folds_rfq_row_and_shares() {
        let docs = build_docs(&bundle(), &TableContracts::identity());
        let brief = docs
            .iter()
            .find(|d| d.doc_kind == DocKind::RfqBrief)
            .expect("brief doc");

        assert!(brief.text.contains("Title: Aluminium housings"));
        assert!(brief.text.contains("status: open"));
        assert!(brief.text.contains("shared_with: Acme Metals"));
        // Row ids and empty fields never render.
        assert!(!brief.text.contains("rowID"));
        assert!(!brief.text.contains("notes:"));
    }

    #[test]
    fn each_product_with_content_becomes_a_card() {
        let docs = build_docs(&bundle(), &TableContracts::identity());
        let cards: Vec<_> = docs
            .iter()
            .filter(|d| d.doc_kind == DocKind::ProductCard)
            .collect();

        // p2 has no renderable fields and is dropped.
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].product_id.as_deref(), Some("p1"));
        assert_eq!(cards[0].title, "Housing A");
        assert!(cards[0].text.contains("quantity: 500"));
    }

    #[test]
    fn thread_messages_require_a_comment() {
        let docs = build_docs(&bundle(), &TableContracts::identity());
        let messages: Vec<_> = docs
            .iter()
            .filter(|d| d.doc_kind == DocKind::ThreadMessage)
            .collect();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].query_id.as_deref(), Some("q1"));
        assert_eq!(messages[0].text, "buyer: Anodized?");
    }

    #[test]
    fn column_map_translates_logical_names() {
        let doc = r#"{
            "all_rfq": {"table_name": "ALL_RFQ", "columns": {"title": "Title"}},
            "all_products": {"table_name": "ALL_PRODUCTS"},
            "queries": {"table_name": "QUERIES"},
            "supplier_shares": {"table_name": "SUPPLIER_SHARES"}
        }"#;
        let contracts = TableContracts::from_json(doc).unwrap();
        let docs = build_docs(&bundle(), &contracts);
        let brief = docs.iter().find(|d| d.doc_kind == DocKind::RfqBrief).unwrap();
        assert_eq!(brief.title, "Aluminium housings");
    }

    #[test]
    fn file_doc_carries_page_metadata() {
        let d = file_doc("rfq-1", Some("p1"), None, "file-9", Some(3), "page text".into());
        assert_eq!(d.doc_kind, DocKind::FileChunk);
        assert_eq!(d.file_id.as_deref(), Some("file-9"));
        assert_eq!(d.meta["page_num"], 3);
    }
}
