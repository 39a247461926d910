// SPDX-License-Identifier: MIT

//! Loads the Process Identifier's initial signature table from an
//! optional JSON file at startup (§4.2: "a static table, configured
//! out-of-band"). Absence of the file means an empty table, not an error.

use pcguard_core::ProcessSignature;
use std::path::Path;
use tracing::{info, warn};

pub fn load(path: &Path) -> Vec<ProcessSignature> {
    if !path.exists() {
        info!(path = %path.display(), "no process signature file present, starting with an empty table");
        return Vec::new();
    }
    match std::fs::read(path) {
        Ok(bytes) => match serde_json::from_slice::<Vec<ProcessSignature>>(&bytes) {
            Ok(signatures) => {
                info!(path = %path.display(), count = signatures.len(), "loaded process signatures");
                signatures
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed signature file, starting with an empty table");
                Vec::new()
            }
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read signature file, starting with an empty table");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_empty_table() {
        let dir = tempdir().unwrap();
        let signatures = load(&dir.path().join("signatures.json"));
        assert!(signatures.is_empty());
    }

    #[test]
    fn loads_signatures_from_valid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("signatures.json");
        std::fs::write(&path, r#"[{"name":"badapp","path_glob":null,"hash":null}]"#).unwrap();
        let signatures = load(&path);
        assert_eq!(signatures.len(), 1);
        assert_eq!(signatures[0].name, "badapp");
    }

    #[test]
    fn malformed_file_yields_empty_table_rather_than_panicking() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("signatures.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(load(&path).is_empty());
    }
}
