//! Template Model & Store
//!
//! A template couples identity boilerplate with an ordered list of
//! technical rows. The whole collection round-trips through one JSON file
//! on every mutation (load-modify-save); concurrent savers can lose each
//! other's updates. That is the documented contract, not an oversight.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::sanitize::transliterate;

/// Sort key for rows with a missing or non-numeric sequence; sorts after
/// every valid value.
pub const SEQUENCE_SENTINEL: f64 = f64::INFINITY;

/// Boilerplate used when a record carries no commitment text.
pub const DEFAULT_COMMITMENT: &str = "Asagida imzasi bulunan Ozgu OZ Firma Yetkili Makine \
     Muhendisi olup, bu belgede tanimlanan aracin onayli tipe uygunlugunu taahhut eder.";

/// Boilerplate used when a record carries no description text.
pub const DEFAULT_DESCRIPTION: &str = "18.10.2023 Tarihinde duzenlenen : \
     e13*168/2013*01865*00 sayili AB Tip Onayinda tarif edilen tipe tam anlamiyla uygundur.";

/// Boilerplate used when a record carries no place of issue.
pub const DEFAULT_PLACE: &str = "Ankara / Turkiye";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub commitment: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub place: Option<String>,
}

impl Identity {
    pub fn brand(&self) -> &str {
        self.brand.as_deref().unwrap_or("")
    }

    /// Commitment text, defaulted when the field is absent. An explicitly
    /// empty string stays empty (the caller skips the block).
    pub fn commitment_text(&self) -> &str {
        self.commitment.as_deref().unwrap_or(DEFAULT_COMMITMENT)
    }

    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or(DEFAULT_DESCRIPTION)
    }

    pub fn place(&self) -> &str {
        self.place.as_deref().unwrap_or(DEFAULT_PLACE)
    }
}

/// One labeled attribute in the document body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalRow {
    /// Sort order. Kept as raw JSON so hand-edited values, numeric or not,
    /// survive round-trips unchanged; only [`TechnicalRow::sort_key`]
    /// interprets it.
    #[serde(default)]
    pub sequence: Value,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value: String,
}

impl TechnicalRow {
    /// Numeric sort key. Malformed or missing sequences never raise; they
    /// collapse to [`SEQUENCE_SENTINEL`] and sort last.
    pub fn sort_key(&self) -> f64 {
        match &self.sequence {
            Value::Number(n) => n.as_f64().unwrap_or(SEQUENCE_SENTINEL),
            Value::String(s) => parse_sequence(s),
            _ => SEQUENCE_SENTINEL,
        }
    }
}

/// Lenient numeric parse for a sequence value. Accepts a comma as the
/// decimal separator; anything unparseable falls back to the sentinel.
fn parse_sequence(raw: &str) -> f64 {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .unwrap_or(SEQUENCE_SENTINEL)
}

/// Normalize a row code: trim outer whitespace, then strip trailing
/// periods. Empty input and the placeholders `"none"`/`"nan"` (any case)
/// normalize to the empty string.
pub fn normalize_code(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if raw.is_empty() || lower == "none" || lower == "nan" {
        return String::new();
    }
    raw.trim().trim_end_matches('.').to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRecord {
    #[serde(default)]
    pub identity: Identity,
    #[serde(default)]
    pub rows: Vec<TechnicalRow>,
}

impl TemplateRecord {
    /// Rows in sequence order. The sort is stable and total: equal keys and
    /// sentinel rows keep their original relative order.
    pub fn sorted_rows(&self) -> Vec<&TechnicalRow> {
        let mut rows: Vec<&TechnicalRow> = self.rows.iter().collect();
        rows.sort_by(|a, b| a.sort_key().total_cmp(&b.sort_key()));
        rows
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to serialize template collection: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to persist template collection: {0}")]
    Io(#[from] io::Error),
}

/// Flat-file template store: one JSON document mapping template name to
/// record, pretty-printed for human diffing.
pub struct TemplateStore {
    path: PathBuf,
}

impl TemplateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole collection. A missing or unreadable backing file is
    /// an empty collection, never an error.
    pub fn load_all(&self) -> BTreeMap<String, TemplateRecord> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(_) => return BTreeMap::new(),
        };
        match serde_json::from_slice(&bytes) {
            Ok(map) => map,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e,
                    "template collection unreadable, treating as empty");
                BTreeMap::new()
            }
        }
    }

    /// Insert or overwrite one record and persist the whole collection.
    /// Load-modify-save is not isolated; concurrent savers can lose updates.
    pub fn save(&self, name: &str, record: TemplateRecord) -> Result<(), StoreError> {
        let mut all = self.load_all();
        all.insert(name.to_string(), record);
        self.persist(&all)?;
        debug!(name, total = all.len(), "template saved");
        Ok(())
    }

    /// Remove one record. Returns `false` if the name was absent.
    pub fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let mut all = self.load_all();
        if all.remove(name).is_none() {
            return Ok(false);
        }
        self.persist(&all)?;
        debug!(name, "template deleted");
        Ok(true)
    }

    /// Smallest unused `{base}_v{K}` name among the stored templates, with
    /// any existing `_v<N>` suffix stripped from `base` first.
    pub fn next_version_name(&self, base: &str) -> String {
        let names: Vec<String> = self.load_all().keys().cloned().collect();
        next_version_name(base, &names)
    }

    /// Write the collection via a temp file in the same directory, then
    /// rename, so readers never observe a partial document.
    fn persist(&self, all: &BTreeMap<String, TemplateRecord>) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(all)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "templates.json".to_string());
        let tmp = self.path.with_file_name(format!(".{file_name}.tmp"));
        fs::write(&tmp, &body)?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            e
        })?;
        Ok(())
    }
}

/// Compute the next free version name against a list of taken names.
pub fn next_version_name(base: &str, existing: &[String]) -> String {
    static SUFFIX: OnceLock<Regex> = OnceLock::new();
    let suffix = SUFFIX.get_or_init(|| Regex::new(r"_v\d+$").expect("static pattern"));
    let stem = suffix.replace(base, "");
    let mut version = 1u32;
    loop {
        let candidate = format!("{stem}_v{version}");
        if !existing.iter().any(|n| n == &candidate) {
            return candidate;
        }
        version += 1;
    }
}

/// Sanitized, trimmed brand name used to address the brand's logo file.
pub fn logo_brand_key(brand: &str) -> String {
    transliterate(brand).trim().to_string()
}
