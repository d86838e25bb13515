//! In-memory representation of `wines.json`.
//!
//! Records are kept as ordered JSON maps so that keys this crate does not know
//! about survive a load/save cycle untouched.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Language whose text is exchanged with copywriters.
pub const TARGET_LANGUAGE: &str = "nl";

/// The top-level document. Keys other than `wines` are carried in `extra`,
/// and `wines` is written back at the position it was read from.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Catalog {
    pub wines: Vec<Record>,
    pub extra: IndexMap<String, Value>,
    wines_at: usize,
}

impl TryFrom<Map<String, Value>> for Catalog {
    type Error = serde_json::Error;

    fn try_from(document: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut wines = None;
        let mut extra = IndexMap::new();
        let mut wines_at = None;
        for (key, value) in document {
            if key == "wines" {
                wines_at = Some(extra.len());
                wines = Some(serde_json::from_value(value)?);
            } else {
                extra.insert(key, value);
            }
        }
        Ok(Self {
            wines: wines.unwrap_or_default(),
            wines_at: wines_at.unwrap_or(extra.len()),
            extra,
        })
    }
}

impl From<Catalog> for Map<String, Value> {
    fn from(catalog: Catalog) -> Self {
        let Catalog {
            wines,
            extra,
            wines_at,
        } = catalog;
        let wines = Value::Array(
            wines
                .into_iter()
                .map(|record| Value::Object(record.0))
                .collect(),
        );
        let mut wines = Some(wines);
        let mut document = Map::new();
        for (position, (key, value)) in extra.into_iter().enumerate() {
            if position == wines_at
                && let Some(wines) = wines.take()
            {
                document.insert("wines".to_owned(), wines);
            }
            document.insert(key, value);
        }
        if let Some(wines) = wines {
            document.insert("wines".to_owned(), wines);
        }
        document
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

/// Cross-reference key shared by records, image filenames and table rows.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranslatableField {
    Desc,
    Flavour,
    PairWith,
    Specials,
}

impl TranslatableField {
    pub const ALL: [TranslatableField; 4] = [
        TranslatableField::Desc,
        TranslatableField::Flavour,
        TranslatableField::PairWith,
        TranslatableField::Specials,
    ];

    /// Key inside a record's `translatables` object.
    pub fn key(self) -> &'static str {
        match self {
            TranslatableField::Desc => "desc",
            TranslatableField::Flavour => "flavour",
            TranslatableField::PairWith => "pair_with",
            TranslatableField::Specials => "specials",
        }
    }

    /// Column holding this field's text in the translation table.
    pub fn column(self) -> String {
        format!("{TARGET_LANGUAGE}_{}", self.key())
    }
}

impl fmt::Display for TranslatableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Result of looking a [`RecordId`] up in a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    None,
    One(usize),
    Many(Vec<usize>),
}

impl Lookup {
    pub fn indices(&self) -> &[usize] {
        match self {
            Lookup::None => &[],
            Lookup::One(index) => std::slice::from_ref(index),
            Lookup::Many(indices) => indices,
        }
    }
}

impl Record {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// `form_number` as text. Numbers are rendered in decimal.
    pub fn form_number(&self) -> Option<RecordId> {
        match self.0.get("form_number")? {
            Value::String(s) => Some(RecordId::new(s.as_str())),
            Value::Number(n) => Some(RecordId::new(n.to_string())),
            _ => None,
        }
    }

    /// Identifier used for cross-referencing. Falls back to the 1-based
    /// position of the record when `form_number` is absent.
    pub fn id(&self, position: usize) -> RecordId {
        self.form_number()
            .unwrap_or_else(|| RecordId::new((position + 1).to_string()))
    }

    pub fn title(&self) -> Option<&str> {
        self.0.get("title").and_then(Value::as_str)
    }

    /// Remote image URL. Empty strings read as absent.
    pub fn image(&self) -> Option<&str> {
        self.0
            .get("image")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
    }

    pub fn image_local(&self) -> Option<&str> {
        self.0.get("image_local").and_then(Value::as_str)
    }

    pub fn set_image_local(&mut self, path: impl Into<String>) {
        self.0
            .insert("image_local".to_owned(), Value::String(path.into()));
    }

    fn translatable(&self, field: TranslatableField) -> Option<&Map<String, Value>> {
        self.0
            .get("translatables")?
            .as_object()?
            .get(field.key())?
            .as_object()
    }

    pub fn has_translatable(&self, field: TranslatableField) -> bool {
        self.translatable(field).is_some()
    }

    /// Text of `field` in `language`, if both exist.
    pub fn translation(&self, field: TranslatableField, language: &str) -> Option<&str> {
        self.translatable(field)?.get(language)?.as_str()
    }

    /// Overwrites the `language` entry of an existing translatable field.
    ///
    /// Returns `false` without touching the record when the field itself is
    /// absent; fields are never created here.
    pub fn set_translation(
        &mut self,
        field: TranslatableField,
        language: &str,
        text: impl Into<String>,
    ) -> bool {
        let Some(entry) = self
            .0
            .get_mut("translatables")
            .and_then(Value::as_object_mut)
            .and_then(|translatables| translatables.get_mut(field.key()))
            .and_then(Value::as_object_mut)
        else {
            return false;
        };
        entry.insert(language.to_owned(), Value::String(text.into()));
        true
    }
}

impl Catalog {
    pub fn is_empty(&self) -> bool {
        self.wines.is_empty()
    }

    /// Records paired with their cross-reference ids.
    pub fn ids(&self) -> impl Iterator<Item = (RecordId, &Record)> {
        self.wines
            .iter()
            .enumerate()
            .map(|(position, record)| (record.id(position), record))
    }

    pub fn lookup(&self, id: &RecordId) -> Lookup {
        let mut indices = self
            .wines
            .iter()
            .enumerate()
            .filter(|(position, record)| record.id(*position) == *id)
            .map(|(position, _)| position)
            .collect::<Vec<_>>();
        match indices.len() {
            0 => Lookup::None,
            1 => Lookup::One(indices.remove(0)),
            _ => Lookup::Many(indices),
        }
    }
}
