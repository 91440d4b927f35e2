pub const DEFAULT_IMPORT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

pub const DEFAULT_IMPORT_BATCH_SIZE: usize = 100;

pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";

pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub const XLS_CONTENT_TYPE: &str = "application/vnd.ms-excel";
