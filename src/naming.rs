//! Output file naming.
//!
//! Sheet files and archive entries share one stable convention so exports
//! stay compatible with earlier ones:
//!
//! - sheets: `Part_<n>.<ext>`, `n` 1-based, `ext` `png` for lossless else `jpg`
//! - combined image: `Combined_<unix-millis>.<ext>`
//! - archive: `Collage_<unix-millis>.zip`

use crate::imaging::OutputFormat;

const PART_PREFIX: &str = "Part_";

/// File name of the sheet at 0-based `index`.
pub fn sheet_filename(index: usize, format: OutputFormat) -> String {
    format!("{PART_PREFIX}{}.{}", index + 1, format.extension())
}

pub fn combined_filename(unix_millis: u128, format: OutputFormat) -> String {
    format!("Combined_{unix_millis}.{}", format.extension())
}

pub fn archive_filename(unix_millis: u128) -> String {
    format!("Collage_{unix_millis}.zip")
}

/// Parse `Part_<n>.<ext>` back to its 1-based number.
///
/// - `"Part_3.jpg"` → `Some(3)`
/// - `"Part_12.png"` → `Some(12)`
/// - `"Part_0.png"`, `"Part_x.jpg"`, `"Combined_1.png"` → `None`
pub fn parse_sheet_filename(name: &str) -> Option<usize> {
    let rest = name.strip_prefix(PART_PREFIX)?;
    let (number, ext) = rest.split_once('.')?;
    if !matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg") {
        return None;
    }
    number.parse().ok().filter(|&n| n > 0)
}
