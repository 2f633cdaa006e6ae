//! Format reference table
//!
//! Maps a raw resource format (`CSV`, `XLSX`, `SHP`...) to a format category
//! and whether that format is open. Resources of the same category are assumed
//! to carry the same data, so a category is covered as soon as one of its
//! resources uses an open format.

use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Category and openness of one format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatType {
    pub category: String,
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatTable {
    entries: HashMap<String, FormatType>,
}

/// Row of an external `format,format_type,open` table
#[derive(Debug, Deserialize)]
struct FormatRow {
    format: String,
    format_type: String,
    #[serde(deserialize_with = "deserialize_open")]
    open: bool,
}

/// `true`/`false`, `yes`/`no` or `1`/`0` in any case; anything else is an error
fn deserialize_open<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let text = String::deserialize(deserializer)?;
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(serde::de::Error::custom(format!(
            "invalid `open` value `{}`, expected true/false, yes/no or 1/0",
            text
        ))),
    }
}

const BUILTIN: &[(&str, &str, bool)] = &[
    ("CSV", "tabular", true),
    ("TSV", "tabular", true),
    ("TXT", "tabular", true),
    ("ODS", "tabular", true),
    ("XLS", "tabular", false),
    ("XLSX", "tabular", false),
    ("XLSM", "tabular", false),
    ("MDB", "tabular", false),
    ("ACCDB", "tabular", false),
    ("JSON", "structured", true),
    ("XML", "structured", true),
    ("RDF", "structured", true),
    ("GEOJSON", "geospatial", true),
    ("KML", "geospatial", true),
    ("KMZ", "geospatial", true),
    ("GML", "geospatial", true),
    ("GPKG", "geospatial", true),
    ("WMS", "geospatial", true),
    ("WFS", "geospatial", true),
    ("SHP", "geospatial", false),
    ("FGDB/GDB", "geospatial", false),
    ("ESRI REST", "geospatial", false),
    ("GEOTIF", "raster", true),
    ("GEOTIFF", "raster", true),
    ("TIFF", "raster", true),
    ("PNG", "image", true),
    ("JPG", "image", true),
    ("GIF", "image", true),
    ("HTML", "document", true),
    ("ODT", "document", true),
    ("PDF", "document", false),
    ("DOC", "document", false),
    ("DOCX", "document", false),
    ("PPTX", "presentation", false),
    ("ZIP", "archive", true),
];

impl Default for FormatTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FormatTable {
    /// The table shipped with the scanner
    pub fn builtin() -> Self {
        BUILTIN
            .iter()
            .map(|(format, category, open)| (*format, *category, *open))
            .collect()
    }

    /// Reads a `format,format_type,open` CSV table
    ///
    /// `open` accepts `true`/`false`, `yes`/`no` and `1`/`0` in any case; any
    /// other value fails the whole table.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut reader = csv::Reader::from_reader(reader);
        let mut table = FormatTable {
            entries: HashMap::new(),
        };
        for row in reader.deserialize::<FormatRow>() {
            let row = row?;
            table.insert(&row.format, &row.format_type, row.open);
        }
        Ok(table)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, csv::Error> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Looks a format up, ignoring case and surrounding whitespace
    pub fn lookup(&self, format: &str) -> Option<&FormatType> {
        self.entries.get(&normalize(format))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, format: &str, category: &str, open: bool) {
        self.entries.insert(
            normalize(format),
            FormatType {
                category: category.trim().to_string(),
                open,
            },
        );
    }
}

impl<'a> FromIterator<(&'a str, &'a str, bool)> for FormatTable {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str, bool)>>(iter: I) -> Self {
        let mut table = FormatTable {
            entries: HashMap::new(),
        };
        for (format, category, open) in iter {
            table.insert(format, category, open);
        }
        table
    }
}

fn normalize(format: &str) -> String {
    format.trim().to_uppercase()
}
