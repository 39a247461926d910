// SPDX-License-Identifier: MIT

//! Process Identifier (§4.2): a stateless matcher over a signature table,
//! with hash equality lazily computed and cached per path+mtime so
//! repeated identification of the same binary doesn't rehash (SPEC_FULL
//! §4.2).

use parking_lot::RwLock;
use pcguard_core::{glob::glob_match_ci, ProcessInfo, ProcessSignature};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::time::SystemTime;

#[derive(Clone)]
struct HashCacheEntry {
    mtime: Option<SystemTime>,
    digest: String,
}

/// Holds a list of [`ProcessSignature`]s and identifies observed
/// processes against them. Reads are lock-free against a consistent
/// snapshot; writes (add/remove) take the write lock.
pub struct ProcessIdentifier {
    signatures: RwLock<Vec<ProcessSignature>>,
    hash_cache: RwLock<HashMap<String, HashCacheEntry>>,
}

impl ProcessIdentifier {
    pub fn new(signatures: Vec<ProcessSignature>) -> Self {
        Self { signatures: RwLock::new(signatures), hash_cache: RwLock::new(HashMap::new()) }
    }

    pub fn add_signature(&self, signature: ProcessSignature) {
        let mut signatures = self.signatures.write();
        signatures.retain(|s| s.name != signature.name);
        signatures.push(signature);
    }

    pub fn remove_signature(&self, name: &str) -> bool {
        let mut signatures = self.signatures.write();
        let before = signatures.len();
        signatures.retain(|s| !s.name.eq_ignore_ascii_case(name));
        signatures.len() != before
    }

    pub fn signatures(&self) -> Vec<ProcessSignature> {
        self.signatures.read().clone()
    }

    /// Returns the first signature matching `process`, using
    /// case-insensitive name equality, glob matching on path, and
    /// optional byte-hash equality.
    pub fn identify(&self, process: &ProcessInfo) -> Option<ProcessSignature> {
        let signatures = self.signatures.read();
        signatures.iter().find(|sig| self.matches(sig, process)).cloned()
    }

    fn matches(&self, sig: &ProcessSignature, process: &ProcessInfo) -> bool {
        if !sig.matches_name(&process.name) {
            return false;
        }
        if let Some(glob) = &sig.path_glob {
            if !glob_match_ci(glob, &process.executable_path) {
                return false;
            }
        }
        if let Some(expected_hash) = &sig.hash {
            match self.hash_of(&process.executable_path) {
                Some(actual) if actual.eq_ignore_ascii_case(expected_hash) => {}
                _ => return false,
            }
        }
        true
    }

    fn hash_of(&self, path: &str) -> Option<String> {
        let mtime = std::fs::metadata(path).ok().and_then(|m| m.modified().ok());

        if let Some(cached) = self.hash_cache.read().get(path) {
            if cached.mtime == mtime {
                return Some(cached.digest.clone());
            }
        }

        let digest = hash_file(Path::new(path))?;
        self.hash_cache
            .write()
            .insert(path.to_string(), HashCacheEntry { mtime, digest: digest.clone() });
        Some(digest)
    }
}

fn hash_file(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Some(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcguard_core::ProcessSignatureBuilder;

    fn process(name: &str, path: &str) -> ProcessInfo {
        ProcessInfo {
            pid: 1,
            name: name.into(),
            executable_path: path.into(),
            parent_pid: None,
            started_at_ms: 0,
        }
    }

    #[test]
    fn matches_on_case_insensitive_name() {
        let id = ProcessIdentifier::new(vec![ProcessSignatureBuilder::default().name("chrome").build()]);
        let matched = id.identify(&process("CHROME", "/usr/bin/chrome"));
        assert!(matched.is_some());
    }

    #[test]
    fn name_wildcard_matches_variants() {
        let id =
            ProcessIdentifier::new(vec![ProcessSignatureBuilder::default().name("chrome*").build()]);
        assert!(id.identify(&process("chromium", "/x")).is_some());
        assert!(id.identify(&process("chrome-sandbox", "/x")).is_some());
        assert!(id.identify(&process("firefox", "/x")).is_none());
    }

    #[test]
    fn path_glob_must_also_match() {
        let id = ProcessIdentifier::new(vec![ProcessSignatureBuilder::default()
            .name("badapp")
            .path_glob("/opt/*/badapp")
            .build()]);
        assert!(id.identify(&process("badapp", "/opt/vendor/badapp")).is_some());
        assert!(id.identify(&process("badapp", "/usr/bin/badapp")).is_none());
    }

    #[test]
    fn add_signature_replaces_existing_by_name() {
        let id = ProcessIdentifier::new(vec![]);
        id.add_signature(ProcessSignatureBuilder::default().name("x").path_glob("/a").build());
        id.add_signature(ProcessSignatureBuilder::default().name("x").path_glob("/b").build());
        assert_eq!(id.signatures().len(), 1);
        assert_eq!(id.signatures()[0].path_glob.as_deref(), Some("/b"));
    }

    #[test]
    fn remove_signature_reports_whether_anything_was_removed() {
        let id = ProcessIdentifier::new(vec![ProcessSignatureBuilder::default().name("x").build()]);
        assert!(id.remove_signature("x"));
        assert!(!id.remove_signature("x"));
    }

    #[test]
    fn hash_mismatch_excludes_match() {
        let id = ProcessIdentifier::new(vec![ProcessSignatureBuilder::default()
            .name("self")
            .hash("0000000000000000000000000000000000000000000000000000000000000000")
            .build()]);
        let exe = std::env::current_exe().unwrap();
        let info = process("self", exe.to_str().unwrap());
        assert!(id.identify(&info).is_none());
    }
}
