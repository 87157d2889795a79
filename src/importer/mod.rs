// ==========================================
// Paie - import layer
// ==========================================
// File -> grid -> column mapping -> parsed rows -> database
// Supported: .xlsx/.xls/.xlsm (first or named sheet), .csv
// ==========================================

pub mod checksum;
pub mod detectors;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod grid;
pub mod header;
pub mod payroll_importer_impl;
pub mod payroll_importer_trait;
pub mod progress;
pub mod row_parser;
pub mod sign_policy;

pub use error::{ErrorCategory, ImportError, ImportResult, UserMessage};
pub use field_mapper::{ColumnMapper, FieldResolution, MappingPreview, MappingResult, ResolutionStatus};
pub use file_parser::{CsvParser, ExcelParser, FileFormat, FileParser, UniversalFileParser};
pub use grid::{CellValue, Grid, GridRow};
pub use payroll_importer_impl::{CancelHandle, IngestionEngine};
pub use payroll_importer_trait::PayrollImporter;
pub use progress::{ChannelProgress, NoopProgress, ProgressEvent, ProgressReporter, ProgressSink};
pub use row_parser::{parse_rows, ParsedRow, ParsedRows};
pub use sign_policy::SignPolicy;
