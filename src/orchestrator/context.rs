//! Side-table load for lot-context enrichment (§3 ContextRow, §4.K). Keyed by
//! `norm`-ed foot-ring number so lookups tolerate the same punctuation/case
//! drift the ranking engine already normalizes away.

use std::collections::HashMap;
use std::path::Path;

use crate::enrich::rank::norm;
use crate::models::domain::ContextRow;

pub type ContextMap = HashMap<String, ContextRow>;

/// Loads the CSV at `path` into a map keyed by normalized ring number. A
/// missing file is not an error — it yields an empty map — per SPEC_FULL.md
/// §3: enrichment is best-effort, never a startup blocker.
pub fn load(path: Option<&str>) -> ContextMap {
    let Some(path) = path else {
        return ContextMap::new();
    };
    if !Path::new(path).exists() {
        tracing::warn!(path, "context CSV not found, proceeding with empty context map");
        return ContextMap::new();
    }

    let mut reader = match csv::Reader::from_path(path) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(path, error = %e, "failed to open context CSV");
            return ContextMap::new();
        }
    };

    let mut map = ContextMap::new();
    for record in reader.deserialize::<ContextRow>() {
        match record {
            Ok(row) => {
                map.insert(norm(&row.ring), row);
            }
            Err(e) => tracing::warn!(path, error = %e, "skipping malformed context CSV row"),
        }
    }
    tracing::info!(path, rows = map.len(), "loaded lot-context table");
    map
}

pub fn lookup<'a>(map: &'a ContextMap, ring: &str) -> Option<&'a ContextRow> {
    map.get(&norm(ring))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_yields_empty_map() {
        assert!(load(Some("/nonexistent/path/context.csv")).is_empty());
    }

    #[test]
    fn no_path_yields_empty_map() {
        assert!(load(None).is_empty());
    }

    #[test]
    fn lookup_normalizes_ring_number() {
        let mut map = ContextMap::new();
        map.insert(
            norm("AB-123"),
            ContextRow {
                ring: "AB-123".to_string(),
                name: "Zhang San".to_string(),
                phone: None,
                note: None,
            },
        );
        assert!(lookup(&map, "ab－123").is_some());
    }

    #[test]
    fn loads_real_csv_file_and_looks_up_by_normalized_ring() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        std::io::Write::write_all(
            &mut file,
            b"ring,name,phone,note\nAB-123,Zhang San,123456,consignor\n",
        )
        .unwrap();

        let map = load(Some(file.path().to_str().unwrap()));
        let row = lookup(&map, "ab－123").expect("row should be found by normalized ring");
        assert_eq!(row.name, "Zhang San");
        assert_eq!(row.phone.as_deref(), Some("123456"));
    }
}
