//! Frame catalogue files.
//!
//! Catalogues are JSON objects keyed by source category:
//!
//! ```json
//! {
//!   "monitor":  [{ "lower_bound": 9000.0, "upper_bound": 17500.0, "shift": -6630.0 }],
//!   "detector": [{ "lower_bound": 17000.0, "upper_bound": 26000.0, "shift": -11200.0 }]
//! }
//! ```

use crate::{Error, Result};
use framestitch_core::FrameCatalogue;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Load a frame catalogue from a JSON file.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed, or if it holds
/// no frames at all.
pub fn read_catalogue<P: AsRef<Path>>(path: P) -> Result<FrameCatalogue> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let catalogue: FrameCatalogue = serde_json::from_reader(reader)?;
    check_not_empty(catalogue)
}

/// Parse a frame catalogue from a JSON string.
///
/// # Errors
/// Returns an error if the string cannot be parsed or holds no frames.
pub fn parse_catalogue(json: &str) -> Result<FrameCatalogue> {
    let catalogue: FrameCatalogue = serde_json::from_str(json)?;
    check_not_empty(catalogue)
}

fn check_not_empty(catalogue: FrameCatalogue) -> Result<FrameCatalogue> {
    if catalogue.is_empty() {
        return Err(Error::InvalidFormat(
            "frame catalogue does not define any frames".to_string(),
        ));
    }
    Ok(catalogue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use framestitch_core::SourceCategory;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CATALOGUE: &str = r#"{
        "monitor": [
            { "lower_bound": 0.0, "upper_bound": 50.0, "shift": 0.0 },
            { "lower_bound": 50.0, "upper_bound": 100.0, "shift": 1000.0 }
        ],
        "detector": [
            { "lower_bound": 10.0, "upper_bound": 60.0, "shift": -5.0 }
        ]
    }"#;

    #[test]
    fn test_parse_catalogue() {
        let catalogue = parse_catalogue(CATALOGUE).unwrap();
        let monitor = catalogue.descriptors_for(SourceCategory::Monitor).unwrap();
        assert_eq!(monitor.len(), 2);
        approx::assert_relative_eq!(monitor[1].shift, 1000.0);
        assert!(catalogue.validate().is_empty());
    }

    #[test]
    fn test_read_catalogue_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CATALOGUE.as_bytes()).unwrap();
        let catalogue = read_catalogue(file.path()).unwrap();
        assert_eq!(
            catalogue
                .descriptors_for(SourceCategory::Detector)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_rejects_empty_catalogue() {
        assert!(matches!(
            parse_catalogue(r#"{ "monitor": [] }"#),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_category() {
        let json = r#"{ "chopper": [{ "lower_bound": 0.0, "upper_bound": 1.0, "shift": 0.0 }] }"#;
        assert!(matches!(parse_catalogue(json), Err(Error::Json(_))));
    }
}
