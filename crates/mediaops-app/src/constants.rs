//! Cross-cutting application constants.

/// NDJSON ledger recording every enrichment record written to disk.
pub const ENRICH_LEDGER_FILE: &str = "caas_enrich_ledger.ndjson";

/// Snapshot prefix for the Brightcove folder listing.
pub const BRIGHTCOVE_SNAPSHOT_PREFIX: &str = "brightcove_by_folder";

/// Snapshot prefix for the per-country YouTube uploads listing.
pub const YOUTUBE_SNAPSHOT_PREFIX: &str = "youtube_by_channel";

/// macOS Finder metadata, ignored by every filesystem walk.
pub const DS_STORE: &str = ".DS_Store";
