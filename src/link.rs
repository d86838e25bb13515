//! Points records at their normalized local image.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::{
    catalog::RecordId,
    store::{self, CatalogStore},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Catalog(#[from] store::Error),
    #[error("no wines found in catalog")]
    EmptyCatalog,
    #[error("invalid scan pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Every record got a local image.
    Complete,
    /// No record matched a file; the catalog was left untouched.
    NothingUpdated,
    /// Some records matched, others are still missing an image.
    Incomplete,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkReport {
    pub updated: usize,
    pub missing: usize,
}

impl LinkReport {
    pub fn outcome(&self) -> LinkOutcome {
        if self.updated == 0 {
            LinkOutcome::NothingUpdated
        } else if self.missing > 0 {
            LinkOutcome::Incomplete
        } else {
            LinkOutcome::Complete
        }
    }
}

pub struct Linker {
    pub source_dir: PathBuf,
    pub path_prefix: String,
}

impl Linker {
    /// `wine_{id}_*.jpg` files in the source directory, sorted by name.
    pub fn matches(&self, id: &RecordId) -> Result<Vec<PathBuf>, Error> {
        let pattern = format!(
            "{}/wine_{}_*.jpg",
            glob::Pattern::escape(&self.source_dir.to_string_lossy()),
            glob::Pattern::escape(id.as_str()),
        );
        let mut matches = glob::glob(&pattern)?
            .filter_map(|entry| {
                entry
                    .inspect_err(|e| warn!(%e, "failed to read directory entry"))
                    .ok()
            })
            .filter(|path| path.is_file())
            .collect::<Vec<_>>();
        matches.sort();
        Ok(matches)
    }

    fn local_path(&self, file: &Path) -> Option<String> {
        let name = file.file_name()?.to_str()?;
        let prefix = self.path_prefix.trim_end_matches('/');
        Some(if prefix.is_empty() {
            name.to_owned()
        } else {
            format!("{prefix}/{name}")
        })
    }

    /// Sets `image_local` for every record with a matching file. The catalog
    /// is saved only when at least one record changed.
    pub fn run(&self, store: &impl CatalogStore) -> Result<LinkReport, Error> {
        let mut catalog = store.load()?;
        if catalog.is_empty() {
            return Err(Error::EmptyCatalog);
        }
        info!(
            wines = catalog.wines.len(),
            dir = ?self.source_dir,
            "checking for local images"
        );

        let mut report = LinkReport::default();
        for (position, record) in catalog.wines.iter_mut().enumerate() {
            let id = record.id(position);
            let matches = self.matches(&id)?;
            if matches.len() > 1 {
                warn!(%id, candidates = ?matches, "several local images match, using the first");
            }
            match matches.first().and_then(|file| self.local_path(file)) {
                Some(path) => {
                    info!(%id, %path, "linked");
                    record.set_image_local(path);
                    report.updated += 1;
                }
                None => {
                    warn!(%id, "no local image found, run normalize first");
                    report.missing += 1;
                }
            }
        }

        info!(
            updated = report.updated,
            missing = report.missing,
            "linking complete"
        );
        if report.updated > 0 {
            store.save(&catalog)?;
            info!("catalog updated with image_local paths");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;

    fn linker(dir: &Path) -> Linker {
        Linker {
            source_dir: dir.to_owned(),
            path_prefix: "feniks-data/images".to_owned(),
        }
    }

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn links_first_match_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "wine_7_b.jpg");
        touch(dir.path(), "wine_7_a.jpg");
        touch(dir.path(), "wine_7_c.png");
        touch(dir.path(), "wine_70_a.jpg");
        let store = MemoryStore::new(
            serde_json::from_value(json!({ "wines": [{ "form_number": "7" }] })).unwrap(),
        );

        let report = linker(dir.path()).run(&store).unwrap();
        assert_eq!(report.outcome(), LinkOutcome::Complete);
        assert_eq!(
            store.snapshot().wines[0].image_local(),
            Some("feniks-data/images/wine_7_a.jpg")
        );
        assert_eq!(store.saves(), 1);
    }

    #[test]
    fn missing_records_stay_untouched() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "wine_1_a.jpg");
        let store = MemoryStore::new(
            serde_json::from_value(json!({
                "wines": [{ "form_number": "1" }, { "form_number": "2", "title": "Cava" }]
            }))
            .unwrap(),
        );

        let report = linker(dir.path()).run(&store).unwrap();
        assert_eq!(
            report,
            LinkReport {
                updated: 1,
                missing: 1
            }
        );
        assert_eq!(report.outcome(), LinkOutcome::Incomplete);
        let catalog = store.snapshot();
        assert_eq!(catalog.wines[1].image_local(), None);
        assert_eq!(store.saves(), 1);
    }

    #[test]
    fn nothing_matched_skips_the_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(
            serde_json::from_value(json!({ "wines": [{ "form_number": "1" }] })).unwrap(),
        );
        let report = linker(dir.path()).run(&store).unwrap();
        assert_eq!(report.outcome(), LinkOutcome::NothingUpdated);
        assert_eq!(store.saves(), 0);
    }

    #[test]
    fn positional_id_is_used_without_form_number() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "wine_2_x.jpg");
        let store = MemoryStore::new(
            serde_json::from_value(json!({ "wines": [{ "form_number": "9" }, {}] })).unwrap(),
        );
        linker(dir.path()).run(&store).unwrap();
        assert_eq!(
            store.snapshot().wines[1].image_local(),
            Some("feniks-data/images/wine_2_x.jpg")
        );
    }

    #[test]
    fn glob_characters_in_ids_are_literal() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "wine_1_a.jpg");
        let matches = linker(dir.path()).matches(&"[0-9]".into()).unwrap();
        assert!(matches.is_empty());
    }
}
