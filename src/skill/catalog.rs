//! Skill lookup by name in the configured skills directory.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, SkillViewError};
use crate::execution::DefinitionLookup;

use super::parser::SkillParser;
use super::types::{ParsedSkill, SkillDefinition};

const SKILL_EXTENSIONS: [&str; 2] = ["yaml", "yml"];
const NESTED_FILE_STEM: &str = "skill";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Read-on-demand view of a skills directory. Nothing is watched or cached.
#[derive(Debug, Clone)]
pub struct SkillCatalog {
    root: PathBuf,
}

impl SkillCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Skills found as `<name>.yaml` or `<name>/skill.yaml`, sorted by name.
    pub fn list(&self) -> Result<Vec<CatalogEntry>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(2) {
            let entry = entry.map_err(|err| {
                SkillViewError::Io(std::io::Error::other(format!(
                    "walk {}: {err}",
                    self.root.display()
                )))
            })?;
            if !entry.file_type().is_file() || !has_skill_extension(entry.path()) {
                continue;
            }
            let Some(name) = entry_name(entry.path(), entry.depth()) else {
                continue;
            };
            entries.push(CatalogEntry {
                name,
                path: entry.path().to_path_buf(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries.dedup_by(|later, earlier| later.name == earlier.name);
        Ok(entries)
    }

    pub fn resolve_path(&self, name: &str) -> Option<PathBuf> {
        let flat = SKILL_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{name}.{ext}")));
        let nested = SKILL_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(name).join(format!("{NESTED_FILE_STEM}.{ext}")));
        flat.chain(nested).find(|candidate| candidate.is_file())
    }

    pub fn load(&self, name: &str) -> Result<ParsedSkill> {
        let path = self
            .resolve_path(name)
            .ok_or_else(|| SkillViewError::SkillNotFound(name.to_string()))?;
        debug!(target: "skill", skill = name, path = %path.display(), "loading skill definition");
        SkillParser::parse_path(&path)
    }
}

impl DefinitionLookup for SkillCatalog {
    fn definition(&self, skill_name: &str) -> Option<SkillDefinition> {
        match self.load(skill_name) {
            Ok(parsed) => Some(parsed.definition),
            Err(SkillViewError::SkillNotFound(_)) => {
                debug!(target: "skill", skill = skill_name, "no definition in catalog");
                None
            }
            Err(err) => {
                warn!(
                    target: "skill",
                    skill = skill_name,
                    error = %err,
                    "skill definition unusable"
                );
                None
            }
        }
    }
}

fn has_skill_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SKILL_EXTENSIONS.contains(&ext))
}

fn entry_name(path: &Path, depth: usize) -> Option<String> {
    match depth {
        1 => path.file_stem()?.to_str().map(str::to_string),
        2 if path.file_stem()?.to_str()? == NESTED_FILE_STEM => {
            path.parent()?.file_name()?.to_str().map(str::to_string)
        }
        _ => None,
    }
}
