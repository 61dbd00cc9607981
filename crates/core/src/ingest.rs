//! The ingestion pipeline.
//!
//! One run resolves the primary URL (plus corroborating URLs in dossier
//! mode), decides group, level, title and note location, renders the note
//! and merges the index entry. Everything that can fail validation happens
//! before the first write, so a rejected run leaves the vault untouched.
//!
//! Group and level follow one precedence order: explicit override, then the
//! entry already filed for the same source URL, then fresh classification.

use std::fs;
use std::path::PathBuf;

use time::Date;
use tracing::{debug, info, warn};

use crate::classify::{Group, Level, classify_group, classify_level};
use crate::distill::is_noise;
use crate::fetch::Transport;
use crate::index::{IndexEntry, LocatedEntry, SourceLedger};
use crate::note::{NoteDraft, existing_created_date};
use crate::resolve::{Resolver, SourceRecord, TitleSource, parse_source_url};
use crate::sanitize::{clean_text, slugify};
use crate::vault::{NOTE_FILE, Vault};
use crate::{Result, VaultlineError};

/// Default citation threshold for dossiers.
pub const DEFAULT_MIN_CITATIONS: usize = 3;

/// Single resource or multi-source topic dossier.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Single,
    Dossier {
        topic: String,
        /// Corroborating URLs, in addition to the primary one.
        sources: Vec<String>,
        min_citations: usize,
    },
}

/// Options for one run.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub url: String,
    pub mode: Mode,
    pub group: Option<Group>,
    pub level: Option<Level>,
    pub title: Option<String>,
    /// Report decisions without writing anything.
    pub dry_run: bool,
}

/// Whether the note is new or rewritten where the existing entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteAction {
    Create,
    Update,
}

impl NoteAction {
    pub fn as_str(self) -> &'static str {
        match self {
            NoteAction::Create => "create-new",
            NoteAction::Update => "update-existing",
        }
    }
}

/// Decisions and outcome of a run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub group: Group,
    pub level: Level,
    pub title: String,
    /// Vault-relative note path.
    pub note_path: PathBuf,
    /// Vault-relative index path.
    pub index_path: PathBuf,
    pub action: NoteAction,
    /// Usable sources, dossier mode only.
    pub citations: Option<usize>,
    pub access_limited: bool,
    /// False for dry runs.
    pub written: bool,
    /// Problems downgraded to warnings by a dry run, or tolerated
    /// corroborating-source failures.
    pub warnings: Vec<String>,
}

/// Runs ingestions against one vault.
pub struct Ingestor<T: Transport, L: SourceLedger> {
    resolver: Resolver<T>,
    ledger: L,
    vault: Vault,
    today: Date,
}

impl<T: Transport, L: SourceLedger> Ingestor<T, L> {
    pub fn new(resolver: Resolver<T>, ledger: L, vault: Vault, today: Date) -> Self {
        Self { resolver, ledger, vault, today }
    }

    pub async fn run(&self, options: &IngestOptions) -> Result<IngestReport> {
        let source_url = options.url.trim();
        let url = parse_source_url(source_url)?;

        let dossier = match &options.mode {
            Mode::Single => None,
            Mode::Dossier { topic, sources, min_citations } => {
                let topic = clean_text(topic);
                if topic.is_empty() {
                    return Err(VaultlineError::MissingTopic);
                }
                let extra = corroborating_urls(source_url, sources)?;
                Some((topic, extra, *min_citations))
            }
        };

        let mut warnings = Vec::new();
        let primary = self.resolver.resolve(&url).await;
        if let Some(err) = &primary.fetch_error {
            if primary.abstract_metadata().is_some() {
                warnings.push(format!("could not fetch {source_url}: {err}; using abstract metadata"));
            } else if !options.dry_run {
                return Err(VaultlineError::Fetch { url: source_url.to_string(), source: err.clone() });
            } else {
                warnings.push(format!("could not fetch {source_url}: {err}"));
            }
        }

        let mut sources = vec![primary];
        let mut citations = None;
        if let Some((_, extra, min_citations)) = &dossier {
            for extra_url in extra {
                let record = self.resolver.resolve(extra_url).await;
                if let Some(err) = &record.fetch_error {
                    warnings.push(format!("could not fetch {extra_url}: {err}"));
                }
                sources.push(record);
            }

            let found = sources.iter().filter(|source| source.is_citable()).count();
            info!(found, required = min_citations, "counted citations");
            if found < *min_citations {
                let err = VaultlineError::InsufficientCitations { found, required: *min_citations };
                if !options.dry_run {
                    return Err(err);
                }
                warnings.push(err.to_string());
            }
            citations = Some(found);
        }

        let existing = self.ledger.find_by_source(source_url)?;
        let topic = dossier.as_ref().map(|(topic, _, _)| topic.as_str());

        let classification_text = classification_text(&sources, topic);
        let group = options
            .group
            .or(existing.as_ref().map(|found| found.group))
            .unwrap_or_else(|| classify_group(&classification_text));
        let level = options
            .level
            .or_else(|| existing.as_ref().and_then(|found| found.entry.level.parse().ok()))
            .unwrap_or_else(|| classify_level(&classification_text));
        debug!(%group, %level, existing = existing.is_some(), "resolved placement");

        let title = choose_title(options.title.as_deref(), topic, &sources[0], existing.as_ref());

        let (note_path, action) = match &existing {
            Some(found) if found.group == group => (found.note_path.clone(), NoteAction::Update),
            _ => (self.vault.new_note_dir(group, &slugify(&title)).join(NOTE_FILE), NoteAction::Create),
        };
        let note_link = self.vault.note_link(group, &note_path)?;

        let today = self.today.to_string();
        let created = match fs::read_to_string(&note_path) {
            Ok(text) => existing_created_date(&text).unwrap_or_else(|| today.clone()),
            Err(_) => today.clone(),
        };

        let note = NoteDraft {
            config: group.config(),
            title: &title,
            level,
            source_url,
            topic,
            sources: &sources,
            created: &created,
            today: &today,
        }
        .render();

        let report = IngestReport {
            group,
            level,
            title: title.clone(),
            note_path: self.vault.relative(&note_path).to_path_buf(),
            index_path: self.vault.relative(&self.vault.index_path(group)).to_path_buf(),
            action,
            citations,
            access_limited: sources[0].access_limited,
            written: false,
            warnings,
        };

        if options.dry_run {
            info!(note = %report.note_path.display(), "dry run; nothing written");
            return Ok(report);
        }

        if let Some(note_dir) = note_path.parent() {
            fs::create_dir_all(note_dir)?;
        }
        fs::write(&note_path, note)?;
        self.ledger.ensure_index(group)?;
        let entry = IndexEntry::new(title, note_link, level.as_str(), source_url).with_citations(citations);
        let outcome = self.ledger.upsert(group, &entry)?;
        info!(note = %note_path.display(), ?outcome, "ingested");

        Ok(IngestReport { written: true, ..report })
    }
}

/// Parse corroborating URLs, dropping duplicates of earlier ones and of the
/// primary URL.
fn corroborating_urls(primary: &str, extra: &[String]) -> Result<Vec<url::Url>> {
    let mut seen = vec![primary.to_string()];
    let mut urls = Vec::new();
    for raw in extra {
        let raw = raw.trim();
        if seen.iter().any(|known| known == raw) {
            debug!(url = raw, "skipping duplicate source");
            continue;
        }
        urls.push(parse_source_url(raw)?);
        seen.push(raw.to_string());
    }
    Ok(urls)
}

fn classification_text(sources: &[SourceRecord], topic: Option<&str>) -> String {
    let mut parts: Vec<String> = topic.map(str::to_string).into_iter().collect();
    parts.extend(
        sources
            .iter()
            .filter(|source| source.fetch_error.is_none() || source.secondary.is_some())
            .map(SourceRecord::classification_text),
    );
    if parts.is_empty() {
        parts.extend(sources.iter().map(|source| source.url.clone()));
    }
    parts.join("\n")
}

/// Title precedence: explicit override, topic, extracted title, existing
/// entry title, title derived from the URL.
fn choose_title(
    override_title: Option<&str>, topic: Option<&str>, primary: &SourceRecord, existing: Option<&LocatedEntry>,
) -> String {
    if let Some(title) = override_title.map(clean_text).filter(|title| !title.is_empty()) {
        return title;
    }
    if let Some(topic) = topic {
        return topic.to_string();
    }
    if primary.title_source != TitleSource::Url && !primary.title.is_empty() && !is_noise(&primary.title) {
        return primary.title.clone();
    }
    if let Some(found) = existing {
        warn!(title = %found.entry.title, "no usable page title; keeping the indexed title");
        return found.entry.title.clone();
    }
    primary.title.clone()
}
