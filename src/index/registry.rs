// Per-project file manifest used for incremental change detection

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

/// Current registry schema version
pub const SCHEMA_VERSION: u32 = 2;

/// Manifest entry for one indexed file. `mtime` is in nanoseconds so that
/// same-second rewrites still fall through to the content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub size: u64,
    pub mtime: i64,
    pub hash: String,
}

/// One project's slice of the registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub indexed_at: String,
    pub files: BTreeMap<String, FileRecord>,
}

/// Versioned, multi-project registry persisted as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    pub schema_version: u32,
    pub projects: BTreeMap<String, ProjectEntry>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            projects: BTreeMap::new(),
        }
    }
}

/// Outcome of diffing discovered files against the manifest
#[derive(Debug, Default)]
pub struct FileDelta {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
    /// Files that could not be read or hashed, with the reason
    pub errors: Vec<(String, String)>,
}

impl FileDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// Streaming blake3 of a file's content
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Build a fresh manifest record for a file on disk
pub fn build_file_record(path: &Path) -> Result<FileRecord> {
    let meta = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    Ok(FileRecord {
        size: meta.len(),
        mtime: mtime_nanos(&meta),
        hash: hash_file(path)?,
    })
}

fn mtime_nanos(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

impl Registry {
    /// Load a registry file, migrating old schemas in place.
    ///
    /// A v1 file (flat `root_path` + `files`) is upgraded to v2; anything
    /// unknown or unparseable resets to an empty registry instead of
    /// failing the run.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to read registry {}: {}", path.display(), e);
                return Self::default();
            }
        };
        let value: Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                warn!("Registry {} is not valid JSON ({}), resetting", path.display(), e);
                return Self::default();
            }
        };

        let version = value
            .get("schema_version")
            .and_then(Value::as_u64)
            .unwrap_or(1) as u32;

        match version {
            1 => migrate_v1(&value),
            SCHEMA_VERSION => match serde_json::from_value::<Registry>(value) {
                Ok(reg) => reg,
                Err(e) => {
                    warn!("Invalid v2 registry structure ({}), resetting", e);
                    Self::default()
                }
            },
            other => {
                warn!("Unknown registry schema version {}, resetting", other);
                Self::default()
            }
        }
    }

    /// Write-through save: pretty JSON with stable key order
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write registry {}", path.display()))?;
        Ok(())
    }

    /// The manifest for one project root, empty if never indexed
    pub fn project_files(&self, project_root: &str) -> BTreeMap<String, FileRecord> {
        self.projects
            .get(project_root)
            .map(|p| p.files.clone())
            .unwrap_or_default()
    }

    /// Replace a project's manifest and stamp the index time
    pub fn update_project(&mut self, project_root: &str, files: BTreeMap<String, FileRecord>) {
        self.projects.insert(
            project_root.to_string(),
            ProjectEntry {
                indexed_at: chrono::Utc::now().to_rfc3339(),
                files,
            },
        );
    }

    pub fn remove_project(&mut self, project_root: &str) {
        if self.projects.remove(project_root).is_some() {
            info!("Removed project from registry: {}", project_root);
        }
    }

    /// Diff the discovered file set against a project's manifest.
    ///
    /// Content hash is the authoritative change signal; matching size and
    /// mtime short-circuit the hash. Unreadable files land in
    /// `FileDelta::errors` and never disturb an existing record.
    pub fn diff(&self, project_root: &str, discovered: &[String]) -> FileDelta {
        let known = self.project_files(project_root);
        let mut delta = FileDelta::default();

        for path_str in discovered {
            let path = Path::new(path_str);
            match known.get(path_str) {
                None => delta.added.push(path_str.clone()),
                Some(record) => {
                    let meta = match std::fs::metadata(path) {
                        Ok(m) => m,
                        Err(e) => {
                            delta.errors.push((path_str.clone(), e.to_string()));
                            continue;
                        }
                    };
                    if meta.len() == record.size && mtime_nanos(&meta) == record.mtime {
                        continue;
                    }
                    match hash_file(path) {
                        Ok(hash) if hash == record.hash => {}
                        Ok(_) => delta.modified.push(path_str.clone()),
                        Err(e) => delta.errors.push((path_str.clone(), e.to_string())),
                    }
                }
            }
        }

        for known_path in known.keys() {
            if !discovered.contains(known_path) {
                delta.deleted.push(known_path.clone());
            }
        }

        delta
    }
}

/// Upgrade a v1 registry (single flat project) to the v2 layout.
/// Idempotent: the output is already v2 and will not be migrated again.
fn migrate_v1(value: &Value) -> Registry {
    let root_path = match value.get("root_path").and_then(Value::as_str) {
        Some(root) => root.to_string(),
        None => {
            warn!("Cannot migrate v1 registry: missing root_path");
            return Registry::default();
        }
    };
    let files: BTreeMap<String, FileRecord> = value
        .get("files")
        .cloned()
        .and_then(|f| serde_json::from_value(f).ok())
        .unwrap_or_default();

    info!("Migrating registry from v1 to v2 for project: {}", root_path);
    let mut registry = Registry::default();
    registry.update_project(&root_path, files);
    registry
}
