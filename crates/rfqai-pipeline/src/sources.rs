//! File target resolution.
//!
//! An RFQ references files in several places: a folder URL and direct file
//! URLs on the RFQ row, spec links on product rows, and attachments on
//! thread messages. All of them resolve into [`FileTarget`]s for the text
//! extraction collaborator, deduplicated on the full identity tuple so the
//! same URL referenced twice is extracted once.

use std::collections::HashSet;

use rfqai_core::{as_string_list, as_text, row_id, FileTarget, RfqBundle, SourceKind, TableContracts};

/// Resolve every file target for one bundle, first-seen order, deduplicated.
pub fn file_targets(bundle: &RfqBundle, contracts: &TableContracts) -> Vec<FileTarget> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    let mut push = |target: FileTarget| {
        if seen.insert(target.clone()) {
            targets.push(target);
        }
    };

    let rfq_map = &contracts.all_rfq.columns;
    if let Some(url) = as_text(rfq_map.get(&bundle.rfq_row, "folder_url")) {
        push(FileTarget {
            rfq_id: bundle.rfq_id.clone(),
            product_id: None,
            query_id: None,
            source_kind: SourceKind::RfqFolder,
            url,
        });
    }
    for url in as_string_list(rfq_map.get(&bundle.rfq_row, "file_urls")) {
        push(FileTarget {
            rfq_id: bundle.rfq_id.clone(),
            product_id: None,
            query_id: None,
            source_kind: SourceKind::DirectUrl,
            url,
        });
    }

    let product_map = &contracts.all_products.columns;
    for row in &bundle.product_rows {
        let product_id = row_id(row).map(String::from);
        for url in as_string_list(product_map.get(row, "link_urls")) {
            push(FileTarget {
                rfq_id: bundle.rfq_id.clone(),
                product_id: product_id.clone(),
                query_id: None,
                source_kind: SourceKind::ProductLink,
                url,
            });
        }
    }

    let query_map = &contracts.queries.columns;
    for row in &bundle.query_rows {
        let query_id = row_id(row).map(String::from);
        for url in as_string_list(query_map.get(row, "attachment_urls")) {
            push(FileTarget {
                rfq_id: bundle.rfq_id.clone(),
                product_id: None,
                query_id: query_id.clone(),
                source_kind: SourceKind::QueryAttachment,
                url,
            });
        }
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfqai_core::SourceRow;
    use serde_json::json;

    fn row(value: serde_json::Value) -> SourceRow {
        value.as_object().expect("object").clone()
    }

    #[test]
    fn targets_come_from_every_reference_site() {
        let bundle = RfqBundle {
            rfq_id: "rfq-1".into(),
            rfq_row: row(json!({
                "rowID": "rfq-1",
                "folder_url": "https://drive.example/folder",
                "file_urls": "https://cdn.example/a.pdf, https://cdn.example/b.pdf"
            })),
            product_rows: vec![row(json!({
                "rowID": "p1",
                "link_urls": ["https://cdn.example/spec.pdf"]
            }))],
            query_rows: vec![row(json!({
                "rowID": "q1",
                "attachment_urls": "https://cdn.example/photo.jpg"
            }))],
            share_rows: vec![],
        };

        let targets = file_targets(&bundle, &TableContracts::identity());
        assert_eq!(targets.len(), 5);
        assert_eq!(targets[0].source_kind, SourceKind::RfqFolder);
        assert!(targets
            .iter()
            .any(|t| t.source_kind == SourceKind::ProductLink
                && t.product_id.as_deref() == Some("p1")));
        assert!(targets
            .iter()
            .any(|t| t.source_kind == SourceKind::QueryAttachment
                && t.query_id.as_deref() == Some("q1")));
    }

    #[test]
    fn duplicate_references_resolve_once() {
        let bundle = RfqBundle {
            rfq_id: "rfq-1".into(),
            rfq_row: row(json!({
                "rowID": "rfq-1",
                "file_urls": ["https://cdn.example/a.pdf", "https://cdn.example/a.pdf"]
            })),
            ..Default::default()
        };

        let targets = file_targets(&bundle, &TableContracts::identity());
        assert_eq!(targets.len(), 1);
    }

    #[test]
    fn same_url_under_different_children_is_kept() {
        let bundle = RfqBundle {
            rfq_id: "rfq-1".into(),
            rfq_row: row(json!({"rowID": "rfq-1"})),
            product_rows: vec![
                row(json!({"rowID": "p1", "link_urls": "https://cdn.example/shared.pdf"})),
                row(json!({"rowID": "p2", "link_urls": "https://cdn.example/shared.pdf"})),
            ],
            ..Default::default()
        };

        // Different product scope, different target identity.
        let targets = file_targets(&bundle, &TableContracts::identity());
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn bundle_without_references_yields_nothing() {
        let bundle = RfqBundle {
            rfq_id: "rfq-1".into(),
            rfq_row: row(json!({"rowID": "rfq-1", "Title": "no files"})),
            ..Default::default()
        };
        assert!(file_targets(&bundle, &TableContracts::identity()).is_empty());
    }
}
