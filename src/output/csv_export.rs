//! CSV export of the inventory tables

use crate::inventory::{DatasetRecord, Inventory, ResourceRecord};
use crate::output::{ExportError, ExportResult};
use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// UTF-8 byte order mark, expected by spreadsheet tools
const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Timestamp embedded in export file names
const FILE_TIMESTAMP: &str = "%Y-%m-%d_%H%M%S";

/// The two exported tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Datasets,
    Resources,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Table::Datasets => write!(f, "datasets"),
            Table::Resources => write!(f, "resources"),
        }
    }
}

impl Table {
    /// `datasets_inventory_2024-06-01_093000.csv`
    pub fn timestamped_file_name(&self, generated_at: NaiveDateTime) -> String {
        format!("{}_inventory_{}.csv", self, generated_at.format(FILE_TIMESTAMP))
    }

    /// `_latest_datasets_inventory.csv`
    pub fn latest_file_name(&self) -> String {
        format!("_latest_{}_inventory.csv", self)
    }
}

/// A row type with a fixed column order
pub trait TableRow: Serialize + DeserializeOwned {
    const TABLE: Table;
    const COLUMNS: &'static [&'static str];
}

impl TableRow for DatasetRecord {
    const TABLE: Table = Table::Datasets;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "title_en",
        "title_fr",
        "published",
        "modified",
        "metadata_created",
        "metadata_modified",
        "num_resources",
        "maintainer_email",
        "maintainer_name",
        "collection",
        "frequency",
        "up_to_date",
        "official_lang",
        "open_formats",
        "spec",
        "registry_link",
        "catalogue_link",
        "on_registry",
        "on_catalogue",
        "harvested",
        "internal",
        "registry_org_name",
        "registry_org_title",
        "catalogue_org_name",
        "catalogue_org_title",
    ];
}

impl TableRow for ResourceRecord {
    const TABLE: Table = Table::Resources;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "title_en",
        "title_fr",
        "created",
        "metadata_modified",
        "format",
        "lang",
        "dataset_id",
        "resource_type",
        "url",
        "url_status",
        "registry_link",
        "catalogue_link",
    ];
}

/// Files written for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub timestamped: PathBuf,
    pub latest: PathBuf,
}

/// Files written for a whole inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryExport {
    pub datasets: ExportPaths,
    pub resources: ExportPaths,
}

/// Writes rows as BOM-prefixed CSV, header first (even with no rows)
pub fn write_table<T: TableRow, W: Write>(writer: W, rows: &[T]) -> ExportResult<()> {
    let mut writer = writer;
    writer.write_all(BOM)?;

    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(T::COLUMNS)?;
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Exports one table to `directory`
///
/// Writes `<table>_inventory_<timestamp>.csv` and overwrites
/// `_latest_<table>_inventory.csv` with the same content. The directory is
/// created if needed.
pub fn export_table<T: TableRow>(
    rows: &[T],
    directory: &Path,
    generated_at: NaiveDateTime,
) -> ExportResult<ExportPaths> {
    fs::create_dir_all(directory).map_err(|source| ExportError::Write {
        path: directory.to_path_buf(),
        source,
    })?;

    let timestamped = directory.join(T::TABLE.timestamped_file_name(generated_at));
    let latest = directory.join(T::TABLE.latest_file_name());

    let file = File::create(&timestamped).map_err(|source| ExportError::Write {
        path: timestamped.clone(),
        source,
    })?;
    write_table(BufWriter::new(file), rows)?;

    fs::copy(&timestamped, &latest).map_err(|source| ExportError::Write {
        path: latest.clone(),
        source,
    })?;

    tracing::info!(
        "Exported {} {} rows to {}",
        rows.len(),
        T::TABLE,
        timestamped.display()
    );
    Ok(ExportPaths { timestamped, latest })
}

/// Exports both tables of an inventory
pub fn export_inventory(
    inventory: &Inventory,
    directory: &Path,
    generated_at: NaiveDateTime,
) -> ExportResult<InventoryExport> {
    Ok(InventoryExport {
        datasets: export_table(&inventory.datasets, directory, generated_at)?,
        resources: export_table(&inventory.resources, directory, generated_at)?,
    })
}

/// Reads back a table written by [`write_table`]
pub fn read_table<T: TableRow>(path: &Path) -> ExportResult<Vec<T>> {
    let bytes = fs::read(path)?;
    let content = bytes.strip_prefix(BOM).unwrap_or(&bytes[..]);

    let mut reader = csv::Reader::from_reader(content);
    let rows = reader.deserialize().collect::<Result<Vec<T>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(9, 30, 0))
            .unwrap()
    }

    fn serialized_header<T: TableRow>(row: &T) -> String {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(row).unwrap();
        let data = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        data.lines().next().unwrap().to_string()
    }

    fn resource() -> ResourceRecord {
        ResourceRecord {
            id: "r1".to_string(),
            title_en: Some("Table, with comma".to_string()),
            title_fr: None,
            created: at(2024, 1, 2),
            metadata_modified: None,
            format: Some("CSV".to_string()),
            lang: "eng/fra".to_string(),
            dataset_id: "ds".to_string(),
            resource_type: Some("dataset".to_string()),
            url: Some("https://example.com/t.csv".to_string()),
            url_status: 200,
            registry_link: None,
            catalogue_link: None,
        }
    }

    #[test]
    fn test_columns_match_field_order() {
        assert_eq!(
            serialized_header(&DatasetRecord::default()),
            DatasetRecord::COLUMNS.join(",")
        );
        assert_eq!(serialized_header(&resource()), ResourceRecord::COLUMNS.join(","));
    }

    #[test]
    fn test_file_names() {
        let generated_at = at(2024, 6, 1);
        assert_eq!(
            Table::Datasets.timestamped_file_name(generated_at),
            "datasets_inventory_2024-06-01_093000.csv"
        );
        assert_eq!(
            Table::Resources.latest_file_name(),
            "_latest_resources_inventory.csv"
        );
    }

    #[test]
    fn test_write_table_starts_with_bom_and_header() {
        let mut buffer = Vec::new();
        write_table::<ResourceRecord, _>(&mut buffer, &[]).unwrap();
        assert!(buffer.starts_with(BOM));
        let text = String::from_utf8(buffer[BOM.len()..].to_vec()).unwrap();
        assert_eq!(text.trim_end(), ResourceRecord::COLUMNS.join(","));
    }

    #[test]
    fn test_export_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("exports");
        let rows = vec![resource()];

        let paths = export_table(&rows, &out, at(2024, 6, 1)).unwrap();
        assert!(paths.timestamped.exists());
        assert!(paths.latest.exists());

        let read: Vec<ResourceRecord> = read_table(&paths.latest).unwrap();
        assert_eq!(read, rows);
    }
}
