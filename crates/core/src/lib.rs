pub mod classify;
pub mod distill;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod index;
pub mod ingest;
pub mod note;
pub mod resolve;
pub mod sanitize;
pub mod vault;

pub use classify::{Group, Level, classify_group, classify_level};
pub use distill::{choose_summary, extract_content_sentences, is_noise, pick_distinct_sentences};
pub use error::{FetchError, Result, VaultlineError};
#[doc(hidden)]
pub use extract::{CaptureTag, PageExtractor};
pub use extract::{PageContent, extract_page};
#[cfg(feature = "fetch")]
pub use fetch::HttpTransport;
pub use fetch::{FetchConfig, FetchConfigBuilder, PinnedTransport, TlsMode, Transport, fetch_file, fetch_stdin};
pub use index::{FileLedger, IndexEntry, LocatedEntry, SourceLedger, UpsertOutcome};
pub use ingest::{DEFAULT_MIN_CITATIONS, IngestOptions, IngestReport, Ingestor, Mode, NoteAction};
pub use note::NoteDraft;
pub use resolve::{
    AbstractMetadata, EmbedMetadata, Resolver, SecondaryMetadata, SourceRecord, TitleSource, derive_title_from_url,
    parse_source_url,
};
pub use sanitize::{clean_text, slugify};
pub use vault::{GroupConfig, Vault, today};
