//! Keyword-table classification into a topical group and a difficulty level.
//!
//! Scoring sums substring occurrence counts of each category's keywords in
//! the lowercased text. The strictly highest total wins; ties between nonzero
//! scores go to the category listed first; an all-zero score falls back to a
//! fixed default ([`Group::Ai`], [`Level::Intermediate`]).

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::VaultlineError;

/// Topical group a note is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    Agents,
    Ai,
    Supercomputing,
    Projects,
}

impl Group {
    /// Every group, in classification and index-scan order.
    pub const ALL: [Group; 4] = [Group::Agents, Group::Ai, Group::Supercomputing, Group::Projects];

    pub fn as_str(self) -> &'static str {
        match self {
            Group::Agents => "agents",
            Group::Ai => "ai",
            Group::Supercomputing => "supercomputing",
            Group::Projects => "projects",
        }
    }

    /// Heading form used in index titles.
    pub fn display_name(self) -> &'static str {
        match self {
            Group::Agents => "Agents",
            Group::Ai => "Ai",
            Group::Supercomputing => "Supercomputing",
            Group::Projects => "Projects",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Group {
    type Err = VaultlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Group::ALL
            .into_iter()
            .find(|group| group.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| VaultlineError::InvalidGroup(s.to_string()))
    }
}

/// Difficulty / progression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Beginner, Level::Intermediate, Level::Advanced];

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = VaultlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| VaultlineError::InvalidLevel(s.to_string()))
    }
}

pub const GROUP_KEYWORDS: &[(Group, &[&str])] = &[
    (
        Group::Agents,
        &["agent", "multi-agent", "tool use", "function calling", "prompt", "reasoning", "memory", "planning"],
    ),
    (
        Group::Ai,
        &[
            "llm",
            "language model",
            "transformer",
            "fine-tuning",
            "rlhf",
            "dpo",
            "embedding",
            "rag",
            "dataset",
            "inference",
        ],
    ),
    (
        Group::Supercomputing,
        &["hpc", "supercomputing", "cuda", "gpu", "cluster", "distributed", "nccl", "mpi", "slurm", "throughput"],
    ),
    (Group::Projects, &["implementation", "case study", "build", "demo", "project", "repository"]),
];

pub const LEVEL_KEYWORDS: &[(Level, &[&str])] = &[
    (Level::Beginner, &["beginner", "intro", "introduction", "basics", "101", "overview"]),
    (Level::Intermediate, &["practical", "implementation", "applied", "workflow", "guide"]),
    (Level::Advanced, &["advanced", "research", "optimization", "scaling", "benchmark", "sota"]),
];

/// Sum of non-overlapping substring occurrences of every keyword.
pub fn keyword_score(haystack: &str, keywords: &[&str]) -> usize {
    keywords.iter().map(|keyword| haystack.matches(keyword).count()).sum()
}

/// Pick the first category with the strictly highest score, or `fallback`
/// when nothing scores.
fn best_match<T: Copy>(text: &str, table: &[(T, &[&str])], fallback: T) -> T {
    let haystack = text.to_lowercase();
    let mut best = fallback;
    let mut best_score = 0;

    for (category, keywords) in table {
        let score = keyword_score(&haystack, keywords);
        if score > best_score {
            best = *category;
            best_score = score;
        }
    }

    best
}

/// Infer the topical group of a resource.
pub fn classify_group(text: &str) -> Group {
    best_match(text, GROUP_KEYWORDS, Group::Ai)
}

/// Infer the difficulty level of a resource.
pub fn classify_level(text: &str) -> Level {
    best_match(text, LEVEL_KEYWORDS, Level::Intermediate)
}
