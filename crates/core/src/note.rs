//! Knowledge note rendering.
//!
//! A note is YAML-like front matter followed by fixed sections. Section
//! bodies are synthesized from the distinct sentences picked out of every
//! usable source, with fixed fallbacks when there is not enough material.
//! When no source yielded content, the access-limited wording is used
//! instead and any embed metadata is surfaced.

use std::collections::HashSet;

use crate::classify::Level;
use crate::distill::{DEFAULT_PICK_COUNT, choose_summary, extract_content_sentences, is_noise, pick_distinct_sentences};
use crate::resolve::{EmbedMetadata, SourceRecord};
use crate::vault::GroupConfig;

/// Number of headings named in the context section.
const OVERVIEW_HEADINGS: usize = 4;

/// Everything needed to render one note.
#[derive(Debug, Clone)]
pub struct NoteDraft<'a> {
    pub config: &'static GroupConfig,
    pub title: &'a str,
    pub level: Level,
    /// Source URL recorded in the front matter and index.
    pub source_url: &'a str,
    /// Set for topic dossiers.
    pub topic: Option<&'a str>,
    /// Primary source first, then corroborating sources.
    pub sources: &'a [SourceRecord],
    /// Original creation date when the note is being rewritten.
    pub created: &'a str,
    pub today: &'a str,
}

/// Material distilled from the usable sources.
struct Digest<'a> {
    summary: String,
    heading_overview: String,
    selected: Vec<String>,
    access_limited: bool,
    embed: Option<&'a EmbedMetadata>,
}

impl Digest<'_> {
    /// `take` selected sentences starting at `start`, or `fallback`.
    fn synth(&self, start: usize, take: usize, fallback: &str) -> String {
        let chunk: Vec<&str> = self.selected.iter().skip(start).take(take).map(String::as_str).collect();
        if chunk.is_empty() { fallback.to_string() } else { chunk.join(" ") }
    }
}

fn digest(sources: &[SourceRecord]) -> Digest<'_> {
    let usable: Vec<&SourceRecord> = sources.iter().filter(|source| !source.access_limited).collect();
    let access_limited = usable.is_empty();

    let mut seen = HashSet::new();
    let sentences: Vec<String> = usable
        .iter()
        .flat_map(|source| extract_content_sentences(&source.description, &source.paragraphs, &source.list_items))
        .filter(|sentence| seen.insert(sentence.to_lowercase()))
        .collect();

    let description = usable
        .iter()
        .map(|source| source.description.as_str())
        .find(|description| !description.is_empty() && !is_noise(description))
        .unwrap_or_default();

    let headings: Vec<&str> = usable
        .iter()
        .flat_map(|source| source.headings.iter())
        .map(String::as_str)
        .filter(|heading| !is_noise(heading))
        .take(OVERVIEW_HEADINGS)
        .collect();
    let heading_overview = if headings.is_empty() {
        "core concepts and implementation details".to_string()
    } else {
        headings.join(", ")
    };

    Digest {
        summary: choose_summary(description, &sentences, access_limited),
        heading_overview,
        selected: pick_distinct_sentences(&sentences, DEFAULT_PICK_COUNT),
        access_limited,
        embed: sources.iter().find_map(SourceRecord::embed),
    }
}

fn article_for(level: Level) -> &'static str {
    match level.as_str().chars().next() {
        Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
        _ => "a",
    }
}

/// Body sections in note order: abstract, context, approach, findings,
/// critique.
fn analysis_sections(draft: &NoteDraft<'_>, digest: &Digest<'_>) -> [String; 5] {
    if digest.access_limited {
        return access_limited_sections(digest.embed);
    }

    let level = draft.level;
    let subject = if draft.topic.is_some() { "topic dossier" } else { "source" };
    [
        format!(
            "{} This note frames the {subject} as {} {level}-level reference in the `{}` track and records its \
             technical contribution in research-article form for later retrieval and synthesis.",
            digest.summary,
            article_for(level),
            draft.config.domain,
        ),
        format!(
            "The material is organised around {}. {}",
            digest.heading_overview,
            digest.synth(1, 2, "It emphasizes practical trade-offs met in real deployments rather than toy examples."),
        ),
        format!(
            "The material takes a systems-oriented approach: it introduces a constraint, maps design choices to \
             execution behavior, then shows how those choices affect operational outcomes. {}",
            digest.synth(3, 3, "Its structure moves from conceptual framing to implementation-level guidance."),
        ),
        format!(
            "{} {}",
            digest.synth(0, 3, "The source makes concrete technical claims worth validating in follow-up experiments."),
            digest.synth(6, 2, "A recurring theme is the tension between capability and efficiency under constraints."),
        ),
        format!(
            "{} Treat this summary as a research waypoint and validate claims against further sources, benchmarks \
             or experiments before relying on them.",
            digest.synth(
                8,
                2,
                "Headline claims may depend on assumptions that are not visible without deeper benchmarking context.",
            ),
        ),
    ]
}

fn access_limited_sections(embed: Option<&EmbedMetadata>) -> [String; 5] {
    let author = embed.map(|meta| meta.author_name.as_str()).unwrap_or_default();
    let author_url = embed.map(|meta| meta.author_url.as_str()).unwrap_or_default();
    let provider = embed.map(|meta| meta.provider_name.as_str()).filter(|p| !p.is_empty()).unwrap_or("the platform");
    let embed_text = embed.map(|meta| meta.embed_text.as_str()).unwrap_or_default();

    let by_author = if author.is_empty() { String::new() } else { format!(" by {author}") };
    let author_link = if author_url.is_empty() { String::new() } else { format!(" ({author_url})") };

    [
        "This resource is archived as a reference node. Full content extraction failed because the source requires \
         JavaScript or authenticated rendering."
            .to_string(),
        format!(
            "Metadata from {provider} indicates this is a social post{by_author}{author_link}. Keeping the entry \
             makes later manual enrichment straightforward."
        ),
        "Canonical source metadata was captured and the note was linked to its topic hubs. Embed metadata, when \
         available, served as secondary evidence for authorship and post context."
            .to_string(),
        if embed_text.is_empty() {
            "No trustworthy claims were extracted automatically. Add the substance of the source after reading it \
             directly."
                .to_string()
        } else {
            format!("Available fallback metadata: {embed_text}")
        },
        "Dynamic rendering and login walls prevent reproducible extraction. For high-value posts, copy the post body \
         and linked context into this note by hand."
            .to_string(),
    ]
}

/// One bibliography line per source.
fn bibliography_line(source: &SourceRecord) -> String {
    let mut line = format!("- [{}]({})", source.title, source.url);
    if let Some(meta) = source.abstract_metadata()
        && !meta.authors.is_empty()
    {
        line.push_str(&format!(" - {}", meta.authors.join(", ")));
    }
    if source.access_limited {
        line.push_str(" (access-limited)");
    }
    line
}

impl NoteDraft<'_> {
    pub fn render(&self) -> String {
        let digest = digest(self.sources);
        let [abstract_text, context, approach, findings, critique] = analysis_sections(self, &digest);
        let config = self.config;
        let links = format!(
            "{}, {} and {}",
            config.group_index_link(),
            config.topic_map_link(),
            config.knowledge_index_link()
        );

        let mut tags = vec![config.domain, "knowledge", self.level.as_str()];
        if self.topic.is_some() {
            tags.push("dossier");
        }

        let mut lines = vec![
            "---".to_string(),
            format!("created: {}", self.created),
            format!("updated: {}", self.today),
            format!("tags: [{}]", tags.join(", ")),
            format!("domain: {}", config.domain),
            "status: seed".to_string(),
            format!("source_url: \"{}\"", self.source_url),
        ];
        if self.topic.is_some() {
            let citations = self.sources.iter().filter(|source| source.is_citable()).count();
            lines.push(format!("citations: {citations}"));
        }
        lines.extend(["---".to_string(), String::new(), format!("# {}", self.title), String::new()]);

        lines.push("## Source".to_string());
        match self.topic {
            Some(topic) => {
                lines.push(format!("Topic: {topic}"));
                lines.push(String::new());
                lines.push(format!("Primary URL: [{0}]({0})", self.source_url));
            }
            None => lines.push(format!("Original URL: [{0}]({0})", self.source_url)),
        }
        lines.push(String::new());
        lines.push(format!("Captured on {}.", self.today));

        let sections = [
            ("## Abstract", abstract_text),
            ("## Context and Problem Framing", context),
            ("## Technical Approach", approach),
            ("## Main Findings", findings),
            ("## Critical Analysis", critique),
            (
                "## Application",
                format!(
                    "Study this resource alongside {links}. Add implementation notes, disagreements and follow-up \
                     experiments to turn the archive entry into working knowledge."
                ),
            ),
            ("## Graph Connections", format!("Related graph nodes: {links}.")),
        ];
        for (heading, body) in sections {
            lines.extend([String::new(), heading.to_string(), body]);
        }

        lines.push(String::new());
        lines.push("## Bibliography".to_string());
        lines.extend(self.sources.iter().map(bibliography_line));

        lines.extend([
            String::new(),
            "## Research Notes".to_string(),
            "Use this space for deeper synthesis, replication notes, contradictions with other sources and concrete \
             follow-up experiments."
                .to_string(),
        ]);

        let mut note = lines.join("\n");
        note.push('\n');
        note
    }
}

/// `created:` date from an existing note's front matter.
pub fn existing_created_date(note: &str) -> Option<String> {
    let mut lines = note.lines();
    if lines.next()?.trim() != "---" {
        return None;
    }
    lines
        .take_while(|line| line.trim() != "---")
        .find_map(|line| line.strip_prefix("created:"))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
