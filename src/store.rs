// Versioned import store: each successful import is one JSON document in
// the data directory, keyed by upload timestamp plus a random id. The
// "current" dataset is an explicit pointer file set by the user, not an
// implicit scan of filesystem mtimes; when no pointer is set the most
// recently recorded `uploadedAt` wins.
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::types::NormalizedRow;

const CURRENT_POINTER: &str = "current";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportMeta {
    pub id: String,
    pub original_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub row_count: usize,
    /// Rows or vouchers dropped during decode (partial failures).
    #[serde(default)]
    pub skipped: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImportDocument {
    pub meta: ImportMeta,
    pub rows: Vec<NormalizedRow>,
}

pub struct ImportStore {
    dir: PathBuf,
}

impl ImportStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<ImportStore> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(ImportStore {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    /// Persist one import and return its metadata. The id embeds the
    /// upload timestamp for human legibility plus a random suffix so two
    /// uploads in the same second never collide.
    pub fn save(
        &self,
        original_name: &str,
        rows: Vec<NormalizedRow>,
        skipped: usize,
    ) -> Result<ImportMeta> {
        let uploaded_at = Utc::now();
        let id = format!(
            "{}_{}",
            uploaded_at.format("%Y%m%d%H%M%S"),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let meta = ImportMeta {
            id: id.clone(),
            original_name: original_name.to_string(),
            uploaded_at,
            row_count: rows.len(),
            skipped,
        };
        let doc = ImportDocument {
            meta: meta.clone(),
            rows,
        };
        let json = serde_json::to_string_pretty(&doc)?;
        fs::write(self.doc_path(&id), json)?;
        info!(
            "saved import {} ({} rows, {} skipped) from {}",
            id, meta.row_count, skipped, original_name
        );
        Ok(meta)
    }

    /// All import metadata, newest first by recorded upload time.
    pub fn list(&self) -> Result<Vec<ImportMeta>> {
        let mut metas: Vec<ImportMeta> = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let doc: ImportDocument = serde_json::from_str(&fs::read_to_string(&path)?)?;
            metas.push(doc.meta);
        }
        metas.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(metas)
    }

    pub fn load(&self, id: &str) -> Result<ImportDocument> {
        let path = self.doc_path(id);
        if !path.exists() {
            return Err(PipelineError::ImportNotFound { id: id.to_string() });
        }
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.doc_path(id);
        if !path.exists() {
            return Err(PipelineError::ImportNotFound { id: id.to_string() });
        }
        fs::remove_file(path)?;
        // A dangling pointer would resolve to a missing file later.
        if self.current_pointer()?.as_deref() == Some(id) {
            let _ = fs::remove_file(self.dir.join(CURRENT_POINTER));
        }
        Ok(())
    }

    /// Point the store at a specific import. Fails when the id does not
    /// exist so the pointer can never go stale on write.
    pub fn set_current(&self, id: &str) -> Result<()> {
        if !self.doc_path(id).exists() {
            return Err(PipelineError::ImportNotFound { id: id.to_string() });
        }
        fs::write(self.dir.join(CURRENT_POINTER), id)?;
        Ok(())
    }

    /// The current dataset: the explicit pointer when set, otherwise the
    /// newest import by recorded upload time.
    pub fn current(&self) -> Result<ImportDocument> {
        if let Some(id) = self.current_pointer()? {
            return self.load(&id);
        }
        let metas = self.list()?;
        match metas.first() {
            Some(meta) => self.load(&meta.id),
            None => Err(PipelineError::NoCurrentImport),
        }
    }

    fn current_pointer(&self) -> Result<Option<String>> {
        let path = self.dir.join(CURRENT_POINTER);
        if !path.exists() {
            return Ok(None);
        }
        let id = fs::read_to_string(path)?.trim().to_string();
        if id.is_empty() {
            Ok(None)
        } else {
            Ok(Some(id))
        }
    }

    fn doc_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row(party: &str, amount: f64) -> NormalizedRow {
        NormalizedRow {
            date: None,
            party_name: party.to_string(),
            item_name: String::new(),
            item_category: String::new(),
            item_group: String::new(),
            salesman: String::new(),
            city: String::new(),
            qty: 0.0,
            amount,
            target: 0.0,
            achievement: None,
            extras: Default::default(),
        }
    }

    #[test]
    fn save_then_load_round_trips_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImportStore::open(dir.path()).unwrap();
        let meta = store
            .save("sales.xlsx", vec![sample_row("Alpha", 100.0)], 2)
            .unwrap();
        let doc = store.load(&meta.id).unwrap();
        assert_eq!(doc.meta.original_name, "sales.xlsx");
        assert_eq!(doc.meta.skipped, 2);
        assert_eq!(doc.rows.len(), 1);
        assert_eq!(doc.rows[0].party_name, "Alpha");
    }

    #[test]
    fn list_is_newest_first_and_current_follows_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImportStore::open(dir.path()).unwrap();
        let first = store.save("a.xlsx", vec![sample_row("A", 1.0)], 0).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let second = store.save("b.xlsx", vec![sample_row("B", 2.0)], 0).unwrap();

        let metas = store.list().unwrap();
        assert_eq!(metas[0].id, second.id);
        assert_eq!(metas[1].id, first.id);

        // No pointer: newest wins.
        assert_eq!(store.current().unwrap().meta.id, second.id);
        // Explicit pointer overrides recency.
        store.set_current(&first.id).unwrap();
        assert_eq!(store.current().unwrap().meta.id, first.id);
    }

    #[test]
    fn missing_ids_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImportStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.load("nope"),
            Err(PipelineError::ImportNotFound { .. })
        ));
        assert!(store.set_current("nope").is_err());
        assert!(matches!(store.current(), Err(PipelineError::NoCurrentImport)));
    }

    #[test]
    fn delete_clears_a_pointing_current() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImportStore::open(dir.path()).unwrap();
        let meta = store.save("a.xlsx", vec![sample_row("A", 1.0)], 0).unwrap();
        store.set_current(&meta.id).unwrap();
        store.delete(&meta.id).unwrap();
        assert!(matches!(store.current(), Err(PipelineError::NoCurrentImport)));
    }
}
