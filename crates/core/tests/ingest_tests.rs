//! Pipeline integration tests against an in-memory transport and a temporary vault
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tempfile::TempDir;
use time::{Date, Month};
use url::Url;
use vaultline_core::{
    FetchConfig, FetchError, FileLedger, Group, IngestOptions, Ingestor, Level, Mode, NoteAction, Resolver,
    SourceLedger, TlsMode, Transport, Vault, VaultlineError,
};

const OEMBED: &str = "https://oembed.test/oembed";
const ABSTRACTS: &str = "https://abstracts.test/api/query";

fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("../../tests/fixtures/{}", name)).unwrap()
}

fn day(d: u8) -> Date {
    Date::from_calendar_date(2026, Month::March, d).unwrap()
}

/// Answers from a fixed URL table; unknown URLs get a 404.
#[derive(Default)]
struct MapTransport {
    pages: HashMap<String, Result<String, FetchError>>,
}

impl MapTransport {
    fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(body.to_string()));
        self
    }

    fn failing(mut self, url: &str, err: FetchError) -> Self {
        self.pages.insert(url.to_string(), Err(err));
        self
    }

    fn oembed(self, post_url: &str, body: &str) -> Self {
        let endpoint = Url::parse_with_params(OEMBED, &[("url", post_url)]).unwrap();
        self.page(endpoint.as_str(), body)
    }

    fn abstracts(self, identifier: &str, body: &str) -> Self {
        let endpoint = Url::parse_with_params(ABSTRACTS, &[("id_list", identifier)]).unwrap();
        self.page(endpoint.as_str(), body)
    }
}

impl Transport for MapTransport {
    async fn get(&self, url: &str, _tls: TlsMode) -> Result<String, FetchError> {
        self.pages.get(url).cloned().unwrap_or(Err(FetchError::Status { status: 404 }))
    }
}

fn ingestor(vault: &Path, transport: MapTransport, today: Date) -> Ingestor<MapTransport, FileLedger> {
    let config = FetchConfig::builder().oembed_endpoint(OEMBED).abstracts_endpoint(ABSTRACTS).build();
    let vault = Vault::new(vault);
    let ledger = FileLedger::new(vault.clone(), today);
    Ingestor::new(Resolver::new(transport, config), ledger, vault, today)
}

fn single(url: &str) -> IngestOptions {
    IngestOptions { url: url.to_string(), ..Default::default() }
}

fn dossier(url: &str, topic: &str, sources: &[&str], min_citations: usize) -> IngestOptions {
    IngestOptions {
        url: url.to_string(),
        mode: Mode::Dossier {
            topic: topic.to_string(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
            min_citations,
        },
        ..Default::default()
    }
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).unwrap().next().is_none()
}

const ARTICLE_URL: &str = "https://example.com/blog/nccl-tuning";

#[tokio::test]
async fn test_single_run_writes_note_and_index() {
    let tmp = TempDir::new().unwrap();
    let transport = MapTransport::default().page(ARTICLE_URL, &fixture("article.html"));
    let report = ingestor(tmp.path(), transport, day(14)).run(&single(ARTICLE_URL)).await.unwrap();

    assert!(report.written);
    assert_eq!(report.group, Group::Supercomputing);
    assert_eq!(report.level, Level::Advanced);
    assert_eq!(report.action, NoteAction::Create);
    assert_eq!(report.title, "Scaling NCCL All-Reduce on Large GPU Clusters");
    assert_eq!(
        report.note_path,
        Path::new("04_Supercomputing/04_Knowledge/scaling-nccl-all-reduce-on-large-gpu-clusters/README.md")
    );

    let note = fs::read_to_string(tmp.path().join(&report.note_path)).unwrap();
    assert!(note.contains("created: 2026-03-14"));
    assert!(note.contains("source_url: \"https://example.com/blog/nccl-tuning\""));
    assert!(!note.contains("cookies"));

    let index = fs::read_to_string(tmp.path().join(&report.index_path)).unwrap();
    assert!(index.contains(
        "- [ ] [Scaling NCCL All-Reduce on Large GPU Clusters](scaling-nccl-all-reduce-on-large-gpu-clusters/README.md) \
         - level: advanced - source: https://example.com/blog/nccl-tuning"
    ));
}

#[tokio::test]
async fn test_second_run_updates_instead_of_duplicating() {
    let tmp = TempDir::new().unwrap();
    let html = fixture("article.html");

    let first = ingestor(tmp.path(), MapTransport::default().page(ARTICLE_URL, &html), day(14))
        .run(&single(ARTICLE_URL))
        .await
        .unwrap();
    let index_path = tmp.path().join(&first.index_path);
    let lines_after_first = fs::read_to_string(&index_path).unwrap().lines().count();

    let second = ingestor(tmp.path(), MapTransport::default().page(ARTICLE_URL, &html), day(20))
        .run(&single(ARTICLE_URL))
        .await
        .unwrap();

    assert_eq!(second.action, NoteAction::Update);
    assert_eq!(second.note_path, first.note_path);

    let index = fs::read_to_string(&index_path).unwrap();
    assert_eq!(index.lines().count(), lines_after_first);
    assert_eq!(index.matches(ARTICLE_URL).count(), 1);
    assert!(index.contains("updated: 2026-03-20"));

    let note = fs::read_to_string(tmp.path().join(&second.note_path)).unwrap();
    assert!(note.contains("created: 2026-03-14"));
    assert!(note.contains("updated: 2026-03-20"));
}

#[tokio::test]
async fn test_preview_reports_decisions_without_writing() {
    let tmp = TempDir::new().unwrap();
    let url = "https://example.com/x";
    let html = r#"<title>Intro to X</title><meta name="description" content="A short note about X.">"#;
    let mut options = single(url);
    options.dry_run = true;

    let report = ingestor(tmp.path(), MapTransport::default().page(url, html), day(14)).run(&options).await.unwrap();

    assert!(!report.written);
    assert_eq!(report.group, Group::Ai);
    assert_eq!(report.level, Level::Beginner);
    assert_eq!(report.action, NoteAction::Create);
    assert!(report.note_path.starts_with("03_AI/06_Knowledge"));
    assert!(is_empty_dir(tmp.path()));
}

#[tokio::test]
async fn test_preview_defaults_without_keywords() {
    let tmp = TempDir::new().unwrap();
    let url = "https://example.com/x";
    let html = r#"<title>Notes on X</title><meta name="description" content="Some words about X.">"#;
    let mut options = single(url);
    options.dry_run = true;

    let report = ingestor(tmp.path(), MapTransport::default().page(url, html), day(14)).run(&options).await.unwrap();

    assert_eq!((report.group, report.level), (Group::Ai, Level::Intermediate));
    assert!(is_empty_dir(tmp.path()));
}

#[tokio::test]
async fn test_fetch_failure_aborts_real_run_before_writing() {
    let tmp = TempDir::new().unwrap();
    let transport = MapTransport::default().failing(ARTICLE_URL, FetchError::Transient("connection refused".into()));
    let err = ingestor(tmp.path(), transport, day(14)).run(&single(ARTICLE_URL)).await.unwrap_err();

    assert!(err.is_network());
    assert!(is_empty_dir(tmp.path()));
}

#[tokio::test]
async fn test_fetch_failure_is_a_warning_in_preview() {
    let tmp = TempDir::new().unwrap();
    let transport = MapTransport::default().failing(ARTICLE_URL, FetchError::Transient("connection refused".into()));
    let mut options = single(ARTICLE_URL);
    options.dry_run = true;

    let report = ingestor(tmp.path(), transport, day(14)).run(&options).await.unwrap();

    assert_eq!(report.warnings.len(), 1);
    assert!(report.access_limited);
    assert_eq!(report.title, "Nccl Tuning");
    assert!(is_empty_dir(tmp.path()));
}

#[tokio::test]
async fn test_invalid_input_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let run = |options: IngestOptions| {
        let ingestor = ingestor(tmp.path(), MapTransport::default(), day(14));
        async move { ingestor.run(&options).await }
    };

    assert!(matches!(run(single("example.com/article")).await, Err(VaultlineError::InvalidUrl(_))));
    assert!(matches!(
        run(dossier(ARTICLE_URL, "   ", &[], 1)).await,
        Err(VaultlineError::MissingTopic)
    ));
    assert!(is_empty_dir(tmp.path()));
}

#[tokio::test]
async fn test_existing_entry_wins_over_classification() {
    let tmp = TempDir::new().unwrap();
    let vault = Vault::new(tmp.path());
    let ledger = FileLedger::new(vault.clone(), day(1));
    ledger.ensure_index(Group::Agents).unwrap();
    let index_path = vault.index_path(Group::Agents);
    let mut index = fs::read_to_string(&index_path).unwrap();
    index.push_str(&format!("- [x] [Filed Earlier](filed-earlier/README.md) - level: beginner - source: {ARTICLE_URL}\n"));
    fs::write(&index_path, index).unwrap();

    let transport = MapTransport::default().page(ARTICLE_URL, &fixture("article.html"));
    let report = ingestor(tmp.path(), transport, day(14)).run(&single(ARTICLE_URL)).await.unwrap();

    assert_eq!(report.group, Group::Agents);
    assert_eq!(report.level, Level::Beginner);
    assert_eq!(report.action, NoteAction::Update);
    assert_eq!(report.note_path, Path::new("02_Agents/06_Knowledge/filed-earlier/README.md"));

    let entries = ledger.entries(Group::Agents).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].done);
    assert_eq!(entries[0].title, "Scaling NCCL All-Reduce on Large GPU Clusters");
    assert!(!vault.index_path(Group::Supercomputing).exists());
}

#[tokio::test]
async fn test_explicit_override_beats_existing_entry() {
    let tmp = TempDir::new().unwrap();
    let vault = Vault::new(tmp.path());
    let ledger = FileLedger::new(vault.clone(), day(1));
    ledger.ensure_index(Group::Agents).unwrap();
    ledger
        .upsert(
            Group::Agents,
            &vaultline_core::IndexEntry::new("Filed", "filed/README.md", "beginner", ARTICLE_URL),
        )
        .unwrap();

    let transport = MapTransport::default().page(ARTICLE_URL, &fixture("article.html"));
    let mut options = single(ARTICLE_URL);
    options.group = Some(Group::Projects);
    options.level = Some(Level::Intermediate);
    options.title = Some("Channel tuning notes".into());
    let report = ingestor(tmp.path(), transport, day(14)).run(&options).await.unwrap();

    assert_eq!(report.group, Group::Projects);
    assert_eq!(report.level, Level::Intermediate);
    assert_eq!(report.action, NoteAction::Create);
    assert_eq!(report.note_path, Path::new("05_Projects/Knowledge/channel-tuning-notes/README.md"));
    assert_eq!(ledger.entries(Group::Agents).unwrap()[0].title, "Filed");
    assert_eq!(ledger.entries(Group::Projects).unwrap().len(), 1);
}

#[tokio::test]
async fn test_slug_collision_gets_numeric_suffix() {
    let tmp = TempDir::new().unwrap();
    let other = "https://example.com/mirror/nccl-tuning";
    let html = fixture("article.html");
    let transport = || MapTransport::default().page(ARTICLE_URL, &html).page(other, &html);

    let first = ingestor(tmp.path(), transport(), day(14)).run(&single(ARTICLE_URL)).await.unwrap();
    let second = ingestor(tmp.path(), transport(), day(14)).run(&single(other)).await.unwrap();

    assert_ne!(first.note_path, second.note_path);
    assert!(second.note_path.to_string_lossy().contains("scaling-nccl-all-reduce-on-large-gpu-clusters-2"));
}

#[tokio::test]
async fn test_dossier_counts_citations() {
    let tmp = TempDir::new().unwrap();
    let paper = "https://arxiv.org/abs/1706.03762";
    let post = "https://twitter.com/someone/status/1234567890";
    let broken = "https://broken.example/gone";
    let transport = MapTransport::default()
        .page(ARTICLE_URL, &fixture("article.html"))
        .failing(paper, FetchError::Status { status: 403 })
        .abstracts("1706.03762", &fixture("arxiv_feed.xml"))
        .page(post, &fixture("x_blocked.html"))
        .oembed(post, &fixture("oembed.json"))
        .failing(broken, FetchError::Transient("timed out".into()));

    let options = dossier(ARTICLE_URL, "Collective communication", &[paper, post, broken, paper], 3);
    let report = ingestor(tmp.path(), transport, day(14)).run(&options).await.unwrap();

    assert_eq!(report.citations, Some(3));
    assert_eq!(report.title, "Collective communication");
    assert_eq!(report.warnings.len(), 2);

    let note = fs::read_to_string(tmp.path().join(&report.note_path)).unwrap();
    assert!(note.contains("citations: 3"));
    assert!(note.contains("- [Attention Is All You Need](https://arxiv.org/abs/1706.03762) - Ashish Vaswani"));
    assert!(note.contains("- [X Post by someone (1234567890)](https://twitter.com/someone/status/1234567890) (access-limited)"));
    assert!(note.contains("(access-limited)"));

    let index = fs::read_to_string(tmp.path().join(&report.index_path)).unwrap();
    assert!(index.contains(&format!("source: {ARTICLE_URL} - citations: 3")));
}

#[tokio::test]
async fn test_dossier_threshold_is_fatal_unless_previewing() {
    let tmp = TempDir::new().unwrap();
    let broken = "https://broken.example/gone";
    let transport = || {
        MapTransport::default()
            .page(ARTICLE_URL, &fixture("article.html"))
            .failing(broken, FetchError::Status { status: 500 })
    };

    let mut options = dossier(ARTICLE_URL, "Collective communication", &[broken], 3);
    let err = ingestor(tmp.path(), transport(), day(14)).run(&options).await.unwrap_err();
    assert!(matches!(err, VaultlineError::InsufficientCitations { found: 1, required: 3 }));
    assert!(is_empty_dir(tmp.path()));

    options.dry_run = true;
    let report = ingestor(tmp.path(), transport(), day(14)).run(&options).await.unwrap();
    assert_eq!(report.citations, Some(1));
    assert!(report.warnings.iter().any(|w| w.contains("at least 3 required")));
    assert!(is_empty_dir(tmp.path()));
}

#[tokio::test]
async fn test_gated_post_keeps_embed_metadata() {
    let tmp = TempDir::new().unwrap();
    let post = "https://x.com/someone/status/42";
    let transport = MapTransport::default()
        .page(post, &fixture("x_blocked.html"))
        .oembed(post, &fixture("oembed.json"));

    let report = ingestor(tmp.path(), transport, day(14)).run(&single(post)).await.unwrap();
    assert!(report.access_limited);
    assert_eq!(report.title, "X Post by someone (42)");

    let note = fs::read_to_string(tmp.path().join(&report.note_path)).unwrap();
    assert!(note.contains("social post by Some One (https://twitter.com/someone)"));
    assert!(note.contains("New agent planning benchmark is out & the results are surprising."));
}

#[tokio::test]
async fn test_abstract_stands_in_for_unreachable_primary() {
    let tmp = TempDir::new().unwrap();
    let paper = "https://arxiv.org/abs/1706.03762";
    let transport = MapTransport::default()
        .failing(paper, FetchError::Status { status: 403 })
        .abstracts("1706.03762", &fixture("arxiv_feed.xml"));

    let report = ingestor(tmp.path(), transport, day(14)).run(&single(paper)).await.unwrap();
    assert!(report.written);
    assert!(!report.access_limited);
    assert_eq!(report.title, "Attention Is All You Need");
    assert!(report.warnings.iter().any(|w| w.contains("using abstract metadata")));

    let index = fs::read_to_string(tmp.path().join(&report.index_path)).unwrap();
    assert!(index.contains("[Attention Is All You Need](attention-is-all-you-need/README.md)"));
    assert!(index.contains(&format!("source: {paper}")));
}
