use crate::error::Error;
use log::debug;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Extracts a downloaded report archive into `target_dir`.
///
/// # Returns
/// Path of the report CSV. When several CSV files are present the first in name order wins.
pub fn extract_csv(archive: &[u8], target_dir: &Path) -> Result<PathBuf, Error> {
    fs::create_dir_all(target_dir)?;
    zip_extract::extract(Cursor::new(archive), target_dir, false)?;

    let mut csv_files: Vec<PathBuf> = fs::read_dir(target_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    csv_files.sort();

    let csv_path = csv_files.into_iter().next().ok_or(Error::NoCsvInArchive)?;
    strip_bom(&csv_path)?;
    debug!("extracted {}", csv_path.display());

    Ok(csv_path)
}

/// The reporting service writes UTF-8 CSV with a byte-order mark, which would
/// otherwise end up in the first header name.
fn strip_bom(path: &Path) -> Result<(), Error> {
    let contents = fs::read(path)?;
    if let Some(stripped) = contents.strip_prefix(UTF8_BOM) {
        fs::write(path, stripped)?;
    }
    Ok(())
}
