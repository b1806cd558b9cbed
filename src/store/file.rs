//! File-backed persistence
//!
//! The whole catalog lives in `<data_dir>/catalog.json`. Every mutation
//! rewrites it through a temporary file, fsyncs it, and renames it into place,
//! so a crash leaves either the old or the new catalog on disk.

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::catalog::Catalog;
use super::errors::{StoreError, StoreResult};
use super::table::TableDescriptor;
use super::{FormRecord, Persistence};
use crate::schema::ResolvedSchema;

const CATALOG_FILE: &str = "catalog.json";
const CATALOG_TEMP_FILE: &str = "catalog.json.tmp";

/// Catalog persisted as JSON under a data directory
#[derive(Debug)]
pub struct FileStore {
    data_dir: PathBuf,
    catalog: Catalog,
    column_budget: Option<usize>,
}

fn io_error(context: String, e: std::io::Error) -> StoreError {
    StoreError::Io(format!("{}: {}", context, e))
}

fn fsync_dir(path: &Path) -> StoreResult<()> {
    let dir = OpenOptions::new()
        .read(true)
        .open(path)
        .map_err(|e| io_error(format!("Failed to open directory {}", path.display()), e))?;
    dir.sync_all()
        .map_err(|e| io_error(format!("fsync directory failed: {}", path.display()), e))
}

impl FileStore {
    /// Create an empty catalog under `data_dir`.
    ///
    /// Fails with `AlreadyExists` when a catalog is already present.
    pub fn init(data_dir: &Path) -> StoreResult<()> {
        fs::create_dir_all(data_dir).map_err(|e| {
            io_error(format!("Failed to create directory {}", data_dir.display()), e)
        })?;
        if data_dir.join(CATALOG_FILE).exists() {
            return Err(StoreError::AlreadyExists(
                data_dir.join(CATALOG_FILE).display().to_string(),
            ));
        }
        let store = Self {
            data_dir: data_dir.to_path_buf(),
            catalog: Catalog::new(),
            column_budget: None,
        };
        store.save()
    }

    /// Open the catalog under `data_dir`, enforcing an optional column budget
    pub fn open(data_dir: &Path, column_budget: Option<usize>) -> StoreResult<Self> {
        let path = data_dir.join(CATALOG_FILE);
        let content = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(format!(
                    "no catalog at {} (run `formtables init` first)",
                    path.display()
                ))
            } else {
                io_error(format!("Failed to read {}", path.display()), e)
            }
        })?;
        let catalog: Catalog = serde_json::from_str(&content)?;

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            catalog,
            column_budget,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn save(&self) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(&self.catalog)?;
        let temp = self.data_dir.join(CATALOG_TEMP_FILE);
        let target = self.data_dir.join(CATALOG_FILE);

        let mut file = File::create(&temp)
            .map_err(|e| io_error(format!("Failed to create {}", temp.display()), e))?;
        file.write_all(&json)
            .map_err(|e| io_error(format!("Failed to write {}", temp.display()), e))?;
        file.sync_all()
            .map_err(|e| io_error(format!("fsync failed for {}", temp.display()), e))?;

        fs::rename(&temp, &target)
            .map_err(|e| io_error(format!("Failed to replace {}", target.display()), e))?;
        fsync_dir(&self.data_dir)
    }

    /// Apply `change` and persist; the in-memory catalog is restored on failure
    fn mutate<F>(&mut self, change: F) -> StoreResult<()>
    where
        F: FnOnce(&mut Catalog) -> StoreResult<()>,
    {
        let before = self.catalog.clone();
        change(&mut self.catalog)?;
        if let Err(e) = self.save() {
            self.catalog = before;
            return Err(e);
        }
        Ok(())
    }
}

impl Persistence for FileStore {
    fn table_names(&self, schema: &str) -> StoreResult<BTreeSet<String>> {
        Ok(self.catalog.table_names(schema))
    }

    fn create_table(&mut self, table: &TableDescriptor) -> StoreResult<()> {
        let budget = self.column_budget;
        self.mutate(|catalog| catalog.create_table(table, budget))
    }

    fn drop_table(&mut self, schema: &str, name: &str) -> StoreResult<()> {
        self.mutate(|catalog| catalog.drop_table(schema, name))
    }

    fn put_form(&mut self, record: &FormRecord) -> StoreResult<()> {
        self.mutate(|catalog| {
            catalog.put_form(record);
            Ok(())
        })
    }

    fn load_form(&self, namespace: &str) -> StoreResult<Option<FormRecord>> {
        Ok(self.catalog.form(namespace).cloned())
    }

    fn delete_form(&mut self, namespace: &str) -> StoreResult<()> {
        self.mutate(|catalog| catalog.delete_form(namespace))
    }

    fn put_definition(&mut self, definition: &ResolvedSchema) -> StoreResult<()> {
        self.mutate(|catalog| {
            catalog.put_definition(definition);
            Ok(())
        })
    }

    fn load_definition(&self, namespace: &str) -> StoreResult<Option<ResolvedSchema>> {
        Ok(self.catalog.definition(namespace).cloned())
    }

    fn delete_definition(&mut self, namespace: &str) -> StoreResult<()> {
        self.mutate(|catalog| catalog.delete_definition(namespace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ElementKey;
    use crate::store::{ColumnDef, ColumnType, TableKind};
    use tempfile::TempDir;

    fn table(name: &str, columns: usize) -> TableDescriptor {
        TableDescriptor {
            schema: "formtables".into(),
            name: name.into(),
            kind: TableKind::TopLevel,
            owner: ElementKey::new("elem+s(00000001)"),
            columns: (0..columns)
                .map(|i| ColumnDef::new(format!("C{}", i), ColumnType::Decimal))
                .collect(),
        }
    }

    #[test]
    fn test_open_without_init_fails() {
        let temp = TempDir::new().unwrap();
        let err = FileStore::open(temp.path(), None).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_init_twice_fails() {
        let temp = TempDir::new().unwrap();
        FileStore::init(temp.path()).unwrap();
        assert!(matches!(
            FileStore::init(temp.path()),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_tables_survive_reopen() {
        let temp = TempDir::new().unwrap();
        FileStore::init(temp.path()).unwrap();

        {
            let mut store = FileStore::open(temp.path(), None).unwrap();
            store.create_table(&table("SURVEY_CORE", 2)).unwrap();
            store
                .put_form(&FormRecord::provisional("survey", 7))
                .unwrap();
        }

        let store = FileStore::open(temp.path(), None).unwrap();
        assert!(store.table_names("formtables").unwrap().contains("SURVEY_CORE"));
        let form = store.load_form("survey").unwrap().unwrap();
        assert_eq!(form.fingerprint, 7);
        assert!(!temp.path().join(CATALOG_TEMP_FILE).exists());
    }

    #[test]
    fn test_rejected_create_leaves_catalog_untouched() {
        let temp = TempDir::new().unwrap();
        FileStore::init(temp.path()).unwrap();

        let mut store = FileStore::open(temp.path(), Some(1)).unwrap();
        let err = store.create_table(&table("WIDE", 2)).unwrap_err();
        assert!(err.is_width_overflow());

        let reopened = FileStore::open(temp.path(), None).unwrap();
        assert!(reopened.table_names("formtables").unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_catalog_reported() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CATALOG_FILE), b"{ not json").unwrap();
        assert!(matches!(
            FileStore::open(temp.path(), None),
            Err(StoreError::Corrupt(_))
        ));
    }
}
