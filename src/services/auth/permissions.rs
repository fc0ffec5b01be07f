//! Legacy (dotted) <-> hierarchical (project-scoped) permission names,
//! plus the static permission catalog used for introspection.
//!
//! `tooltool.download.public` <-> `project:releng:services/tooltool/api/download/public`

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const PROJECT_SCOPE_PREFIX: &str = "project:releng:services/";

/// One row of the translation table.
///
/// `prefix` is the legacy dotted prefix (`base.tokens.`), `project` the path
/// below `project:releng:services/` it maps to (`tokens/api/`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceMapping {
    pub prefix: String,
    pub project: String,
}

impl NamespaceMapping {
    pub fn new(prefix: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            project: project.into(),
        }
    }

    fn slashed_prefix(&self) -> String {
        self.prefix.replace('.', "/")
    }
}

/// Ordered translation table. The first matching row wins, so overlapping
/// prefixes are resolved by declaration order, not by length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceTranslator {
    table: Vec<NamespaceMapping>,
}

impl Default for NamespaceTranslator {
    fn default() -> Self {
        Self::new(vec![
            NamespaceMapping::new("tooltool.", "tooltool/api/"),
            NamespaceMapping::new("base.tokens.", "tokens/api/"),
            NamespaceMapping::new("mapper.", "mapper/api/"),
        ])
    }
}

impl NamespaceTranslator {
    pub fn new(table: Vec<NamespaceMapping>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &[NamespaceMapping] {
        &self.table
    }

    /// `tooltool.upload.public` -> `project:releng:services/tooltool/api/upload/public`.
    /// Unmapped input is returned unchanged.
    pub fn to_hierarchical(&self, legacy: &str) -> String {
        let slashed = legacy.trim().replace('.', "/");
        for entry in &self.table {
            let prefix = entry.slashed_prefix();
            if let Some(rest) = slashed.strip_prefix(prefix.as_str()) {
                return format!("{PROJECT_SCOPE_PREFIX}{}{rest}", entry.project);
            }
        }
        legacy.to_string()
    }

    /// Inverse of [`Self::to_hierarchical`] for mapped projects.
    pub fn to_legacy(&self, hierarchical: &str) -> String {
        if let Some(path) = hierarchical.strip_prefix(PROJECT_SCOPE_PREFIX) {
            for entry in &self.table {
                if let Some(rest) = path.strip_prefix(entry.project.as_str()) {
                    return format!("{}{rest}", entry.slashed_prefix()).replace('/', ".");
                }
            }
        }
        hierarchical.to_string()
    }
}

/// Read-only `permission name -> doc` map, keyed by legacy names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PermissionCatalog {
    entries: BTreeMap<String, String>,
}

impl Default for PermissionCatalog {
    fn default() -> Self {
        let entries = [
            ("base.tokens.prm.issue", "Issue permanent tokens"),
            ("base.tokens.prm.revoke", "Revoke permanent tokens"),
            ("base.tokens.prm.view", "See permanent tokens"),
            ("base.tokens.tmp.issue", "Issue temporary tokens"),
            ("base.tokens.usr.issue", "Issue user tokens"),
            ("base.tokens.usr.revoke.all", "Revoke any user token"),
            ("base.tokens.usr.revoke.my", "Revoke my user tokens"),
            ("base.tokens.usr.view.all", "See all user tokens"),
            ("base.tokens.usr.view.my", "See my user tokens"),
            (
                "mapper.mapping.insert",
                "Allows new hg-git mappings to be inserted into mapper db (hashes table)",
            ),
            (
                "mapper.project.insert",
                "Allows new projects to be inserted into mapper db (projects table)",
            ),
            (
                "tooltool.download.internal",
                "Download INTERNAL files from tooltool",
            ),
            (
                "tooltool.download.public",
                "Download PUBLIC files from tooltool",
            ),
            (
                "tooltool.manage",
                "Manage tooltool files, including deleting and changing visibility levels",
            ),
            (
                "tooltool.upload.internal",
                "Upload INTERNAL files to tooltool",
            ),
            ("tooltool.upload.public", "Upload PUBLIC files to tooltool"),
        ];
        Self::new(
            entries
                .into_iter()
                .map(|(name, doc)| (name.to_string(), doc.to_string())),
        )
    }
}

impl PermissionCatalog {
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn doc(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
