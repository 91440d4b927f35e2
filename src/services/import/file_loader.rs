//! Upload validation and workbook decoding

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use thiserror::Error;

use crate::defaults::{XLSX_CONTENT_TYPE, XLS_CONTENT_TYPE};

/// Uploaded spreadsheet bytes with the metadata the client declared
#[derive(Debug, Clone, Copy)]
pub struct UploadedFile<'a> {
    pub bytes: &'a [u8],
    pub declared_size: u64,
    pub mime_type: &'a str,
}

/// File-level failures. Fatal for the whole import.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FileError {
    #[error("File is too large ({size} bytes, maximum is {limit} bytes)")]
    TooLarge { size: u64, limit: u64 },

    #[error("Unsupported file type '{0}', upload an .xlsx or .xls spreadsheet")]
    UnsupportedFormat(String),

    #[error("File could not be read as a spreadsheet: {0}")]
    CorruptFile(String),
}

/// Opens the first worksheet of an uploaded workbook
#[derive(Debug, Clone, Copy)]
pub struct FileLoader {
    max_bytes: u64,
}

impl FileLoader {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn load(&self, file: &UploadedFile<'_>) -> Result<Range<Data>, FileError> {
        let size = file.declared_size.max(file.bytes.len() as u64);
        if size > self.max_bytes {
            return Err(FileError::TooLarge { size, limit: self.max_bytes });
        }

        if !is_spreadsheet_mime(file.mime_type) {
            return Err(FileError::UnsupportedFormat(file.mime_type.to_string()));
        }

        let mut workbook = open_workbook_auto_from_rs(Cursor::new(file.bytes))
            .map_err(|e| FileError::CorruptFile(e.to_string()))?;

        match workbook.worksheet_range_at(0) {
            Some(Ok(range)) => Ok(range),
            Some(Err(e)) => Err(FileError::CorruptFile(e.to_string())),
            None => Err(FileError::CorruptFile("workbook has no worksheet".to_string())),
        }
    }
}

fn is_spreadsheet_mime(mime_type: &str) -> bool {
    let mime = mime_type.trim().to_ascii_lowercase();
    mime == XLSX_CONTENT_TYPE || mime == XLS_CONTENT_TYPE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::import::test_support::workbook_bytes;

    fn upload(bytes: &[u8]) -> UploadedFile<'_> {
        UploadedFile {
            bytes,
            declared_size: bytes.len() as u64,
            mime_type: XLSX_CONTENT_TYPE,
        }
    }

    #[test]
    fn test_loads_first_worksheet() {
        let bytes = workbook_bytes(&[&["ID", "Name"], &["", "Siti"]]);
        let range = FileLoader::new(1024 * 1024).load(&upload(&bytes)).unwrap();
        assert_eq!(range.height(), 2);
        assert_eq!(range.get((1, 1)), Some(&Data::String("Siti".to_string())));
    }

    #[test]
    fn test_rejects_oversized_declared_size() {
        let bytes = workbook_bytes(&[&["ID"]]);
        let mut file = upload(&bytes);
        file.declared_size = 11 * 1024 * 1024;

        let err = FileLoader::new(10 * 1024 * 1024).load(&file).unwrap_err();
        assert!(matches!(err, FileError::TooLarge { .. }));
    }

    #[test]
    fn test_actual_length_wins_over_small_declared_size() {
        let bytes = workbook_bytes(&[&["ID"]]);
        let mut file = upload(&bytes);
        file.declared_size = 1;

        let err = FileLoader::new(16).load(&file).unwrap_err();
        assert_eq!(err, FileError::TooLarge { size: bytes.len() as u64, limit: 16 });
    }

    #[test]
    fn test_rejects_csv_mime_type() {
        let bytes = b"name,phone\nSiti,081234567890\n";
        let file = UploadedFile {
            bytes,
            declared_size: bytes.len() as u64,
            mime_type: "text/csv",
        };
        let err = FileLoader::new(1024).load(&file).unwrap_err();
        assert_eq!(err, FileError::UnsupportedFormat("text/csv".to_string()));
    }

    #[test]
    fn test_accepts_legacy_excel_mime_case_insensitive() {
        assert!(is_spreadsheet_mime("Application/VND.ms-excel"));
        assert!(!is_spreadsheet_mime("application/zip"));
    }

    #[test]
    fn test_garbage_bytes_are_corrupt() {
        let bytes = b"definitely not a workbook";
        let err = FileLoader::new(1024).load(&upload(bytes)).unwrap_err();
        assert!(matches!(err, FileError::CorruptFile(_)));
    }
}
