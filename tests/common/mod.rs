#![allow(dead_code)]

use datadash::AppConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Five rows: one exact duplicate, a date column, and a missing value in each other column.
pub const SALES_CSV: &str = "\
date,region,units,price
2024-01-01,north,10,2.5
2024-01-02,south,20,
2024-01-02,south,20,
2024-01-03,,30,3.0
2024-01-04,north,,4.0
";

pub const MULTIPART_BOUNDARY: &str = "datadash-test-boundary";

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// Default configuration storing uploads under `dir/uploads`.
pub fn test_config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.server.upload_dir = dir.join("uploads");
    config
}

/// A multipart/form-data body with one file field.
pub fn multipart_file(field: &str, filename: &str, contents: &str) -> Vec<u8> {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
         Content-Type: text/csv\r\n\r\n{contents}\r\n--{b}--\r\n",
        b = MULTIPART_BOUNDARY,
        field = field,
        filename = filename,
        contents = contents
    )
    .into_bytes()
}

/// A multipart/form-data body with one plain text field.
pub fn multipart_text(field: &str, value: &str) -> Vec<u8> {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}\r\n--{b}--\r\n",
        b = MULTIPART_BOUNDARY,
        field = field,
        value = value
    )
    .into_bytes()
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY)
}
