//! Vault layout: where each group keeps its notes, hub pages and index.

use std::path::{Component, Path, PathBuf};

use time::{Date, OffsetDateTime};

use crate::classify::Group;
use crate::{Result, VaultlineError};

/// File name of every note inside its directory.
pub const NOTE_FILE: &str = "README.md";

/// Vault-relative locations for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupConfig {
    /// Tag and front-matter domain.
    pub domain: &'static str,
    pub knowledge_dir: &'static str,
    pub group_index: &'static str,
    pub topic_map: &'static str,
    pub knowledge_index: &'static str,
}

static GROUP_CONFIGS: [GroupConfig; 4] = [
    GroupConfig {
        domain: "agents",
        knowledge_dir: "02_Agents/06_Knowledge",
        group_index: "02_Agents/Agents Index.md",
        topic_map: "01_MOCs/Agents MOC.md",
        knowledge_index: "02_Agents/06_Knowledge/Knowledge Index.md",
    },
    GroupConfig {
        domain: "ai",
        knowledge_dir: "03_AI/06_Knowledge",
        group_index: "03_AI/AI Index.md",
        topic_map: "01_MOCs/AI MOC.md",
        knowledge_index: "03_AI/06_Knowledge/Knowledge Index.md",
    },
    GroupConfig {
        domain: "supercomputing",
        knowledge_dir: "04_Supercomputing/04_Knowledge",
        group_index: "04_Supercomputing/Supercomputing Index.md",
        topic_map: "01_MOCs/Supercomputing MOC.md",
        knowledge_index: "04_Supercomputing/04_Knowledge/Knowledge Index.md",
    },
    GroupConfig {
        domain: "project",
        knowledge_dir: "05_Projects/Knowledge",
        group_index: "05_Projects/Projects Index.md",
        topic_map: "01_MOCs/Home.md",
        knowledge_index: "05_Projects/Knowledge/Knowledge Index.md",
    },
];

impl Group {
    pub fn config(self) -> &'static GroupConfig {
        match self {
            Group::Agents => &GROUP_CONFIGS[0],
            Group::Ai => &GROUP_CONFIGS[1],
            Group::Supercomputing => &GROUP_CONFIGS[2],
            Group::Projects => &GROUP_CONFIGS[3],
        }
    }
}

impl GroupConfig {
    pub fn group_index_link(&self) -> String {
        wiki_link(self.group_index)
    }

    pub fn topic_map_link(&self) -> String {
        wiki_link(self.topic_map)
    }

    pub fn knowledge_index_link(&self) -> String {
        wiki_link(self.knowledge_index)
    }
}

/// `[[path]]` with the `.md` extension dropped.
pub fn wiki_link(path: &str) -> String {
    format!("[[{}]]", path.strip_suffix(".md").unwrap_or(path))
}

/// Current date in UTC.
pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// A vault rooted at a directory on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vault {
    root: PathBuf,
}

impl Vault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn knowledge_dir(&self, group: Group) -> PathBuf {
        self.root.join(group.config().knowledge_dir)
    }

    pub fn index_path(&self, group: Group) -> PathBuf {
        self.root.join(group.config().knowledge_index)
    }

    /// Directory holding the group's knowledge index.
    pub fn index_dir(&self, group: Group) -> PathBuf {
        let index = self.index_path(group);
        index.parent().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone())
    }

    /// Strip the vault root for display; paths outside the vault are
    /// returned unchanged.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }

    /// Link target of a note as written in the group's index, always with
    /// forward slashes.
    pub fn note_link(&self, group: Group, note_path: &Path) -> Result<String> {
        let index_dir = self.index_dir(group);
        let relative = note_path
            .strip_prefix(&index_dir)
            .map_err(|_| VaultlineError::NotePath(note_path.to_path_buf()))?;

        let parts: Vec<String> = relative
            .components()
            .map(|component| match component {
                Component::Normal(part) => Ok(part.to_string_lossy().into_owned()),
                Component::ParentDir => Ok("..".to_string()),
                _ => Err(VaultlineError::NotePath(note_path.to_path_buf())),
            })
            .collect::<Result<_>>()?;
        Ok(parts.join("/"))
    }

    /// First free `<knowledge_dir>/<slug>` directory for a new note.
    pub fn new_note_dir(&self, group: Group, slug: &str) -> PathBuf {
        unique_note_dir(&self.knowledge_dir(group), slug)
    }
}

/// `base/slug`, or `base/slug-2`, `base/slug-3`, ... when taken.
pub fn unique_note_dir(base: &Path, slug: &str) -> PathBuf {
    let candidate = base.join(slug);
    if !candidate.exists() {
        return candidate;
    }

    (2..)
        .map(|n| base.join(format!("{slug}-{n}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(candidate)
}
