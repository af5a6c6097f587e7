use std::{fs, path::Path};

use crate::error::{io_err, Result};

pub fn write_file_str(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| io_err(path, e))
}

pub fn read_file_str(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| io_err(path, e))
}
