//! Presentation helpers for uploaded images.
//!
//! These only build strings from a record; no image is ever transformed
//! locally.

use crate::models::ImageRecord;
use reqwest::Url;
use std::path::Path;

const UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Width-constrained preview URL using the ImageKit `tr` query parameter.
///
/// Unparsable URLs are returned unchanged.
pub fn sized_url(url: &str, width: u32) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed
                .query_pairs_mut()
                .append_pair("tr", &format!("w-{}", width));
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}

/// File name portion of the record's source, e.g. `shot.png`.
pub fn display_name(record: &ImageRecord) -> String {
    Path::new(&record.source)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| record.source.clone())
}

pub fn markdown(record: &ImageRecord) -> String {
    format!("![{}]({})", display_name(record), record.url)
}

/// 1024-based size with two decimals, e.g. `1.50 KB`.
pub fn human_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

/// One-line summary used by the history listing.
pub fn summary_line(record: &ImageRecord) -> String {
    let mut line = format!(
        "{}  {}  {}  {}",
        record.hash,
        display_name(record),
        human_size(record.size),
        record.url
    );
    if let (Some(w), Some(h)) = (record.width, record.height) {
        line.push_str(&format!("  {}x{}", w, h));
    }
    line
}
