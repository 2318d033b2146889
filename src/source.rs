//! Student data sources.
//!
//! Every source answers one flat query returning all student rows; no
//! filtering or ordering is pushed down to the source.

use csv::ReaderBuilder;
use rusqlite::{Connection, OpenFlags};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::config::SourceSpec;
use crate::error::SheetError;
use crate::roster::StudentRecord;

const STUDENTS_QUERY: &str = "SELECT index_no, name, stream_id, nic FROM students";

pub trait StudentSource {
    /// Fetch every student row.
    fn fetch_students(&self) -> Result<Vec<StudentRecord>, SheetError>;

    /// Human readable description for log messages.
    fn describe(&self) -> String;
}

/// Students table of an SQLite database, opened read-only.
pub struct SqliteSource {
    path: PathBuf,
}

impl SqliteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StudentSource for SqliteSource {
    fn fetch_students(&self) -> Result<Vec<StudentRecord>, SheetError> {
        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| SheetError::DataSource(format!("Failed to open database {:?}: {}", self.path, e)))?;

        let mut stmt = conn.prepare(STUDENTS_QUERY)?;
        let rows = stmt.query_map([], |row| {
            Ok(StudentRecord {
                index_no: row.get(0)?,
                name: row.get(1)?,
                stream_id: row.get(2)?,
                nic: row.get(3)?,
            })
        })?;
        let students = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(students)
    }

    fn describe(&self) -> String {
        format!("SQLite database {:?}", self.path)
    }
}

/// CSV export with the header row `index_no,name,stream_id,nic`.
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StudentSource for CsvSource {
    fn fetch_students(&self) -> Result<Vec<StudentRecord>, SheetError> {
        let file = File::open(&self.path)
            .map_err(|e| SheetError::DataSource(format!("Failed to open {:?}: {}", self.path, e)))?;
        let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

        let mut students = Vec::new();
        for result in rdr.deserialize() {
            let record: StudentRecord = result?;
            students.push(record);
        }
        Ok(students)
    }

    fn describe(&self) -> String {
        format!("CSV file {:?}", self.path)
    }
}

/// Build the source named by the settings. Relative paths resolve against
/// `base_dir`.
pub fn open_source(spec: &SourceSpec, base_dir: &Path) -> Box<dyn StudentSource> {
    match spec {
        SourceSpec::Sqlite { path } => Box::new(SqliteSource::new(base_dir.join(path))),
        SourceSpec::Csv { path } => Box::new(CsvSource::new(base_dir.join(path))),
    }
}
