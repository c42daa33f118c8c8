//! Batch Packager - One Archive Per Request
//!
//! Renders one document per VIN line and packs them into a single ZIP.
//! Entries follow input order; duplicate VINs produce duplicate-named
//! entries, both retained. An empty VIN list yields a valid empty archive.

use std::io::{Cursor, Write};

use thiserror::Error;
use tracing::info;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::render::{effective_date, DocumentRenderer, RenderError};
use crate::templates::TemplateRecord;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("failed to assemble archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("failed to write archive entry: {0}")]
    Io(#[from] std::io::Error),
}

pub struct BatchPackager<'a> {
    renderer: &'a DocumentRenderer,
}

impl<'a> BatchPackager<'a> {
    pub fn new(renderer: &'a DocumentRenderer) -> Self {
        Self { renderer }
    }

    /// Parse a newline-delimited VIN list: trim each line, drop blanks,
    /// keep input order and duplicates.
    pub fn parse_vin_list(input: &str) -> Vec<String> {
        input
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Render one document per VIN and pack them as `{vin}.pdf` entries.
    /// The effective date is resolved once for the whole batch. PDF
    /// payloads are stored uncompressed.
    pub fn generate(
        &self,
        template: &TemplateRecord,
        vins: &[String],
        date: Option<&str>,
    ) -> Result<Vec<u8>, BatchError> {
        let date = effective_date(date);
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for vin in vins {
            let pdf = self.renderer.render(vin, template, Some(&date))?;
            writer.start_file(format!("{vin}.pdf"), options)?;
            writer.write_all(&pdf)?;
        }
        let cursor = writer.finish()?;
        info!(entries = vins.len(), "archive assembled");
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vin_list_trims_and_drops_blanks() {
        let vins = BatchPackager::parse_vin_list("  VIN1  \n\n VIN2\n   \nVIN3");
        assert_eq!(vins, vec!["VIN1", "VIN2", "VIN3"]);
    }

    #[test]
    fn test_parse_vin_list_keeps_duplicates_in_order() {
        let vins = BatchPackager::parse_vin_list("VIN1\nVIN1\nVIN2");
        assert_eq!(vins, vec!["VIN1", "VIN1", "VIN2"]);
    }

    #[test]
    fn test_parse_vin_list_empty_input() {
        assert!(BatchPackager::parse_vin_list("").is_empty());
        assert!(BatchPackager::parse_vin_list("\n  \n").is_empty());
    }
}
