//! CSV bridge for the `nl` text of translatable fields.
//!
//! The exported table has one row per wine and is meant for external editing;
//! importing it writes non-empty cells back into the catalog.

use std::{
    io,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::{
    catalog::{Catalog, Lookup, RecordId, TARGET_LANGUAGE, TranslatableField},
    store::{self, CatalogStore},
};

pub const ID_COLUMN: &str = "wine_id";
pub const TITLE_COLUMN: &str = "wine_title";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Catalog(#[from] store::Error),
    #[error("translation table not found ({path:?})")]
    MissingTable { path: PathBuf },
    #[error("translation table has no {column} column")]
    MissingColumn { column: &'static str },
    #[error("failed to parse translation table: {0}")]
    Parse(csv::Error),
    #[error("failed to process translation table ({path:?}): {error}")]
    Csv { error: csv::Error, path: PathBuf },
    #[error("failed to create directory ({path:?}): {error}")]
    CreateDir {
        error: std::io::Error,
        path: PathBuf,
    },
}

/// `wine_id,wine_title,nl_desc,nl_flavour,nl_pair_with,nl_specials`
pub fn header() -> Vec<String> {
    [ID_COLUMN.to_owned(), TITLE_COLUMN.to_owned()]
        .into_iter()
        .chain(TranslatableField::ALL.iter().map(|field| field.column()))
        .collect()
}

/// Writes one row per record, in catalog order. Returns the row count.
pub fn write_table<W: io::Write>(catalog: &Catalog, writer: W) -> Result<usize, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(writer);
    writer.write_record(header())?;
    let mut rows = 0;
    for (id, record) in catalog.ids() {
        let mut row = vec![id.to_string(), record.title().unwrap_or_default().to_owned()];
        row.extend(TranslatableField::ALL.iter().map(|field| {
            record
                .translation(*field, TARGET_LANGUAGE)
                .unwrap_or_default()
                .to_owned()
        }));
        writer.write_record(&row)?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}

/// Non-empty cells of an edited table, grouped by wine id.
///
/// A later row for the same id overrides earlier values field by field.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Updates(IndexMap<RecordId, IndexMap<TranslatableField, String>>);

impl Updates {
    pub fn get(&self, id: &RecordId) -> Option<&IndexMap<TranslatableField, String>> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RecordId, &IndexMap<TranslatableField, String>)> {
        self.0.iter()
    }
}

pub fn read_updates<R: io::Read>(reader: R) -> Result<Updates, Error> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = reader.headers().map_err(Error::Parse)?.clone();
    let position = |column: &str| headers.iter().position(|header| header == column);
    let Some(id_index) = position(ID_COLUMN) else {
        return Err(Error::MissingColumn { column: ID_COLUMN });
    };
    let columns = TranslatableField::ALL
        .iter()
        .filter_map(|field| position(field.column().as_str()).map(|index| (*field, index)))
        .collect::<Vec<_>>();

    let mut updates = Updates::default();
    for row in reader.records() {
        let row = row.map_err(Error::Parse)?;
        let id = RecordId::new(row.get(id_index).unwrap_or_default());
        let fields = updates.0.entry(id).or_default();
        for (field, index) in &columns {
            if let Some(text) = row.get(*index).filter(|text| !text.is_empty()) {
                fields.insert(*field, text.to_owned());
            }
        }
    }
    Ok(updates)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    /// Field values written.
    pub translations: usize,
    /// Records that received at least one value.
    pub records: usize,
}

/// Writes `updates` into the catalog.
///
/// Only fields already present in a record's `translatables` are touched.
/// Every record sharing an id receives the same values.
pub fn apply(catalog: &mut Catalog, updates: &Updates) -> ImportReport {
    let mut report = ImportReport::default();
    for (id, fields) in updates.iter() {
        let lookup = catalog.lookup(id);
        match &lookup {
            Lookup::None => {
                debug!(%id, "wine id not in catalog");
                continue;
            }
            Lookup::One(_) => {}
            Lookup::Many(indices) => {
                warn!(%id, records = indices.len(), "wine id is shared by several records");
            }
        }
        for &index in lookup.indices() {
            let record = &mut catalog.wines[index];
            let mut touched = false;
            for (field, text) in fields {
                if record.set_translation(*field, TARGET_LANGUAGE, text.as_str()) {
                    report.translations += 1;
                    touched = true;
                } else {
                    warn!(%id, %field, "field absent on record, value not imported");
                }
            }
            if touched {
                report.records += 1;
            }
        }
    }
    report
}

/// Exports the catalog's translatable text to `path`.
pub fn export(store: &impl CatalogStore, path: &Path) -> Result<usize, Error> {
    let catalog = store.load()?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|error| Error::CreateDir {
            error,
            path: parent.to_owned(),
        })?;
    }
    let csv_error = |error| Error::Csv {
        error,
        path: path.to_owned(),
    };
    let file = std::fs::File::create(path).map_err(|error| csv_error(error.into()))?;
    let rows = write_table(&catalog, file).map_err(csv_error)?;
    info!(
        rows,
        path = ?path,
        fields = ?TranslatableField::ALL.map(TranslatableField::key),
        "exported translations"
    );
    Ok(rows)
}

/// Imports an edited table from `path` and saves the catalog.
pub fn import(store: &impl CatalogStore, path: &Path) -> Result<ImportReport, Error> {
    if !path.is_file() {
        return Err(Error::MissingTable {
            path: path.to_owned(),
        });
    }
    let mut catalog = store.load()?;
    let csv_error = |error| Error::Csv {
        error,
        path: path.to_owned(),
    };
    let file = std::fs::File::open(path).map_err(|error| csv_error(error.into()))?;
    let updates = read_updates(file)?;
    debug!(ids = updates.len(), "read translation table");
    let report = apply(&mut catalog, &updates);
    store.save(&catalog)?;
    info!(
        translations = report.translations,
        wines = report.records,
        path = ?path,
        "imported translations"
    );
    Ok(report)
}
