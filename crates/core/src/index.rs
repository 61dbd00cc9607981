//! Per-group knowledge index: one checklist line per source URL.
//!
//! ```text
//! - [ ] [Title](slug/README.md) - level: intermediate - source: https://example.com/a - citations: 3
//! ```
//!
//! Lookups and merges go through [`SourceLedger`]. [`FileLedger`] is the
//! plain-file implementation: a linear scan over every group's index file,
//! each read and rewritten whole. At most one line per source URL is kept in
//! a file; merging never deletes an entry for another URL.

use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use time::Date;
use tracing::{debug, info};

use crate::Result;
use crate::classify::Group;
use crate::vault::Vault;

/// Heading of the section that holds entry lines.
pub const ENTRIES_HEADING: &str = "## Entries";

static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^- \[(?P<mark>[ xX])\] \[(?P<title>.+?)\]\((?P<path>.+?)\) - level: (?P<level>[a-z]+) - source: (?P<source>.+?)(?: - citations: (?P<citations>\d+))?$",
    )
    .unwrap()
});

/// One parsed entry line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Checkbox state; set by the reader, never by ingestion.
    pub done: bool,
    pub title: String,
    /// Note path relative to the index file, forward slashes.
    pub note_link: String,
    pub level: String,
    pub source_url: String,
    pub citations: Option<usize>,
}

impl IndexEntry {
    pub fn new(
        title: impl Into<String>, note_link: impl Into<String>, level: impl Into<String>, source_url: impl Into<String>,
    ) -> Self {
        Self {
            done: false,
            title: title.into(),
            note_link: note_link.into(),
            level: level.into(),
            source_url: source_url.into(),
            citations: None,
        }
    }

    pub fn with_citations(mut self, citations: Option<usize>) -> Self {
        self.citations = citations;
        self
    }

    /// Parse a line; surrounding whitespace is ignored.
    pub fn parse(line: &str) -> Option<Self> {
        let caps = ENTRY_RE.captures(line.trim())?;
        Some(Self {
            done: !caps["mark"].trim().is_empty(),
            title: caps["title"].to_string(),
            note_link: caps["path"].to_string(),
            level: caps["level"].to_string(),
            source_url: caps["source"].trim().to_string(),
            citations: caps.name("citations").and_then(|m| m.as_str().parse().ok()),
        })
    }

    pub fn render(&self) -> String {
        let mark = if self.done { "x" } else { " " };
        let mut line = format!(
            "- [{mark}] [{}]({}) - level: {} - source: {}",
            self.title, self.note_link, self.level, self.source_url
        );
        if let Some(count) = self.citations {
            line.push_str(&format!(" - citations: {count}"));
        }
        line
    }
}

/// An entry together with where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedEntry {
    pub group: Group,
    pub entry: IndexEntry,
    /// Absolute path of the note the entry links to.
    pub note_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Storage of index entries keyed by source URL.
pub trait SourceLedger {
    /// First entry across all groups whose source equals `url` byte for byte.
    fn find_by_source(&self, url: &str) -> Result<Option<LocatedEntry>>;

    /// Create the group's index if missing. Returns `true` when created.
    fn ensure_index(&self, group: Group) -> Result<bool>;

    /// Replace the entry for `entry.source_url` in place, or add it.
    fn upsert(&self, group: Group, entry: &IndexEntry) -> Result<UpsertOutcome>;
}

/// [`SourceLedger`] over the markdown index files of a [`Vault`].
#[derive(Debug, Clone)]
pub struct FileLedger {
    vault: Vault,
    today: Date,
}

impl FileLedger {
    pub fn new(vault: Vault, today: Date) -> Self {
        Self { vault, today }
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    /// Every entry in one group's index, in file order.
    pub fn entries(&self, group: Group) -> Result<Vec<IndexEntry>> {
        let path = self.vault.index_path(group);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&path)?;
        Ok(text.lines().filter_map(IndexEntry::parse).collect())
    }

    fn header(&self, group: Group) -> String {
        let config = group.config();
        [
            "---".to_string(),
            format!("created: {}", self.today),
            format!("updated: {}", self.today),
            format!("tags: [{}, knowledge, index]", config.domain),
            format!("domain: {}", config.domain),
            "status: active".to_string(),
            "---".to_string(),
            String::new(),
            format!("# {} Knowledge Index", group.display_name()),
            String::new(),
            format!("- {}", config.group_index_link()),
            format!("- {}", config.topic_map_link()),
            String::new(),
            ENTRIES_HEADING.to_string(),
            String::new(),
        ]
        .join("\n")
    }
}

impl SourceLedger for FileLedger {
    fn find_by_source(&self, url: &str) -> Result<Option<LocatedEntry>> {
        for group in Group::ALL {
            let found = self.entries(group)?.into_iter().find(|entry| entry.source_url == url);
            if let Some(entry) = found {
                debug!(%group, %url, "found existing entry");
                let note_path = self.vault.index_dir(group).join(&entry.note_link);
                return Ok(Some(LocatedEntry { group, entry, note_path }));
            }
        }
        Ok(None)
    }

    fn ensure_index(&self, group: Group) -> Result<bool> {
        let path = self.vault.index_path(group);
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, self.header(group))?;
        info!(path = %path.display(), "created knowledge index");
        Ok(true)
    }

    fn upsert(&self, group: Group, entry: &IndexEntry) -> Result<UpsertOutcome> {
        let path = self.vault.index_path(group);
        let text = fs::read_to_string(&path)?;
        let (mut lines, outcome) = merge_entry(text.lines(), entry);
        set_updated_date(&mut lines, &self.today.to_string());

        let mut output = lines.join("\n");
        output.push('\n');
        fs::write(&path, output)?;
        Ok(outcome)
    }
}

/// Merge `entry` into index lines.
///
/// The first line with the same source is rewritten in place, keeping its
/// checkbox state; later duplicates are dropped. Without a match the entry
/// goes after the last non-blank line of the entries section, which is
/// appended when missing.
pub fn merge_entry<'a>(lines: impl Iterator<Item = &'a str>, entry: &IndexEntry) -> (Vec<String>, UpsertOutcome) {
    let mut merged = Vec::new();
    let mut replaced = false;

    for line in lines {
        match IndexEntry::parse(line) {
            Some(existing) if existing.source_url == entry.source_url => {
                if replaced {
                    debug!(source = %entry.source_url, "dropping duplicate index line");
                    continue;
                }
                let updated = IndexEntry { done: existing.done, ..entry.clone() };
                merged.push(updated.render());
                replaced = true;
            }
            _ => merged.push(line.to_string()),
        }
    }

    if replaced {
        return (merged, UpsertOutcome::Updated);
    }

    match merged.iter().position(|line| line.trim() == ENTRIES_HEADING) {
        Some(heading) => {
            let section_end = merged[heading + 1..]
                .iter()
                .position(|line| line.starts_with("## "))
                .map_or(merged.len(), |offset| heading + 1 + offset);
            let insert_at = merged[heading..section_end]
                .iter()
                .rposition(|line| !line.trim().is_empty())
                .map_or(heading + 1, |offset| heading + offset + 1);
            merged.insert(insert_at, entry.render());
        }
        None => {
            while merged.last().is_some_and(|line| line.trim().is_empty()) {
                merged.pop();
            }
            if !merged.is_empty() {
                merged.push(String::new());
            }
            merged.push(ENTRIES_HEADING.to_string());
            merged.push(String::new());
            merged.push(entry.render());
        }
    }

    (merged, UpsertOutcome::Created)
}

/// Rewrite `updated:` inside the leading front matter, if there is one.
fn set_updated_date(lines: &mut [String], today: &str) {
    if lines.first().map(|line| line.trim()) != Some("---") {
        return;
    }
    for line in lines.iter_mut().skip(1) {
        if line.trim() == "---" {
            break;
        }
        if line.starts_with("updated:") {
            *line = format!("updated: {today}");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;
    use time::Month;

    fn ledger(tmp: &TempDir) -> FileLedger {
        let today = Date::from_calendar_date(2026, Month::March, 14).unwrap();
        FileLedger::new(Vault::new(tmp.path()), today)
    }

    fn entry(url: &str, title: &str) -> IndexEntry {
        IndexEntry::new(title, "some-note/README.md", "intermediate", url)
    }

    #[rstest]
    #[case("- [ ] [Intro](intro/README.md) - level: beginner - source: https://a.example/x", false, None)]
    #[case("- [x] [Intro](intro/README.md) - level: beginner - source: https://a.example/x", true, None)]
    #[case("  - [X] [Intro](intro/README.md) - level: beginner - source: https://a.example/x - citations: 4", true, Some(4))]
    fn test_parse_entry(#[case] line: &str, #[case] done: bool, #[case] citations: Option<usize>) {
        let parsed = IndexEntry::parse(line).unwrap();
        assert_eq!(parsed.title, "Intro");
        assert_eq!(parsed.note_link, "intro/README.md");
        assert_eq!(parsed.level, "beginner");
        assert_eq!(parsed.source_url, "https://a.example/x");
        assert_eq!(parsed.done, done);
        assert_eq!(parsed.citations, citations);
    }

    #[rstest]
    #[case("## Entries")]
    #[case("- [ ] just a todo")]
    #[case("- [ ] [T](p) - level: Expert - source: https://a.example")]
    fn test_parse_rejects_non_entries(#[case] line: &str) {
        assert!(IndexEntry::parse(line).is_none());
    }

    #[test]
    fn test_render_then_parse() {
        let original = entry("https://a.example/x", "Title [draft]").with_citations(Some(3));
        let line = original.render();
        assert!(line.ends_with(" - citations: 3"));
        assert_eq!(IndexEntry::parse(&line).unwrap().source_url, "https://a.example/x");
    }

    #[test]
    fn test_ensure_index_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);

        assert!(ledger.ensure_index(Group::Ai).unwrap());
        let path = ledger.vault().index_path(Group::Ai);
        let first = fs::read_to_string(&path).unwrap();
        assert!(first.contains("# Ai Knowledge Index"));
        assert!(first.contains("tags: [ai, knowledge, index]"));
        assert!(first.contains("- [[01_MOCs/AI MOC]]"));
        assert!(first.trim_end().ends_with(ENTRIES_HEADING));

        fs::write(&path, "custom content\n").unwrap();
        assert!(!ledger.ensure_index(Group::Ai).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "custom content\n");
    }

    #[test]
    fn test_upsert_new_url_adds_one_line() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);
        ledger.ensure_index(Group::Agents).unwrap();
        let path = ledger.vault().index_path(Group::Agents);

        let before = fs::read_to_string(&path).unwrap().lines().count();
        let outcome = ledger.upsert(Group::Agents, &entry("https://v.example", "V")).unwrap();
        let after = fs::read_to_string(&path).unwrap();

        assert_eq!(outcome, UpsertOutcome::Created);
        assert_eq!(after.lines().count(), before + 1);
        assert_eq!(ledger.entries(Group::Agents).unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_existing_url_replaces_in_place() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);
        ledger.ensure_index(Group::Ai).unwrap();
        ledger.upsert(Group::Ai, &entry("https://u.example", "Old")).unwrap();
        ledger.upsert(Group::Ai, &entry("https://w.example", "Other")).unwrap();
        let path = ledger.vault().index_path(Group::Ai);
        let before = fs::read_to_string(&path).unwrap();

        let mut renamed = entry("https://u.example", "New");
        renamed.level = "advanced".into();
        let outcome = ledger.upsert(Group::Ai, &renamed).unwrap();
        let after = fs::read_to_string(&path).unwrap();

        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(after.lines().count(), before.lines().count());
        let position = |text: &str, needle: &str| text.lines().position(|line| line.contains(needle));
        assert_eq!(position(&after, "https://u.example"), position(&before, "https://u.example"));
        let entries = ledger.entries(Group::Ai).unwrap();
        assert_eq!(entries[0].title, "New");
        assert_eq!(entries[0].level, "advanced");
        assert_eq!(entries[1].title, "Other");
    }

    #[test]
    fn test_upsert_preserves_checked_state() {
        let lines = ["## Entries", "- [x] [Old](a/README.md) - level: beginner - source: https://u.example"];
        let (merged, outcome) = merge_entry(lines.into_iter(), &entry("https://u.example", "New"));
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert!(merged[1].starts_with("- [x] [New]"));
    }

    #[test]
    fn test_merge_heals_duplicates() {
        let lines = [
            "## Entries",
            "- [ ] [A](a/README.md) - level: beginner - source: https://u.example",
            "- [ ] [B](b/README.md) - level: beginner - source: https://other.example",
            "- [ ] [A2](a-2/README.md) - level: beginner - source: https://u.example",
        ];
        let (merged, _) = merge_entry(lines.into_iter(), &entry("https://u.example", "A"));
        let matching = merged.iter().filter(|line| line.contains("https://u.example")).count();
        assert_eq!(matching, 1);
        assert_eq!(merged.len(), 3);
        assert!(merged[2].contains("other.example"));
    }

    #[test]
    fn test_merge_creates_missing_section() {
        let lines = ["# Hand-written index", "", "Some notes.", ""];
        let new_entry = entry("https://v.example", "V");
        let (merged, outcome) = merge_entry(lines.into_iter(), &new_entry);
        assert_eq!(outcome, UpsertOutcome::Created);
        assert_eq!(merged[..3], ["# Hand-written index", "", "Some notes."]);
        assert_eq!(merged[3..6], ["", ENTRIES_HEADING, ""]);
        assert_eq!(merged[6], new_entry.render());
    }

    #[test]
    fn test_merge_inserts_before_following_section() {
        let lines = [
            "## Entries",
            "",
            "- [ ] [A](a/README.md) - level: beginner - source: https://a.example",
            "",
            "## Archive",
            "- old stuff",
        ];
        let (merged, _) = merge_entry(lines.into_iter(), &entry("https://v.example", "V"));
        assert!(merged[3].contains("https://v.example"));
        assert_eq!(merged[5], "## Archive");
    }

    #[test]
    fn test_source_match_is_exact() {
        let lines = ["## Entries", "- [ ] [A](a/README.md) - level: beginner - source: https://u.example/"];
        let (merged, outcome) = merge_entry(lines.into_iter(), &entry("https://u.example", "A"));
        assert_eq!(outcome, UpsertOutcome::Created);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_upsert_bumps_updated_date() {
        let tmp = TempDir::new().unwrap();
        let path = Vault::new(tmp.path()).index_path(Group::Ai);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "---\ncreated: 2024-01-01\nupdated: 2024-01-01\n---\n\n## Entries\n").unwrap();

        ledger(&tmp).upsert(Group::Ai, &entry("https://u.example", "U")).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("created: 2024-01-01"));
        assert!(text.contains("updated: 2026-03-14"));
    }

    #[test]
    fn test_find_by_source_scans_all_groups() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);
        ledger.ensure_index(Group::Supercomputing).unwrap();
        let mut filed = IndexEntry::new("Misfiled", "misfiled/README.md", "advanced", "https://u.example");
        filed.done = true;
        ledger.upsert(Group::Supercomputing, &filed).unwrap();

        let found = ledger.find_by_source("https://u.example").unwrap().unwrap();
        assert_eq!(found.group, Group::Supercomputing);
        assert_eq!(found.entry.level, "advanced");
        assert!(found.entry.done);
        assert_eq!(
            found.note_path,
            ledger.vault().knowledge_dir(Group::Supercomputing).join("misfiled/README.md")
        );
        assert!(ledger.find_by_source("https://missing.example").unwrap().is_none());
    }
}
