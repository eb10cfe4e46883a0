//! Attaching metadata to galleries that have none.

use mangashelf_library::GalleryLibrary;
use serde::Serialize;
use tracing::{info, warn};

use crate::metadata::MetadataClient;

/// Outcome of one enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichReport {
    /// Galleries that received metadata.
    pub updated: usize,
    /// Galleries the service had no match for.
    pub unmatched: usize,
    /// Galleries whose lookup or update failed.
    pub failed: usize,
}

/// Look up metadata for every gallery without it and attach the matches.
///
/// Failures are logged per gallery and never stop the pass.
pub async fn enrich_library(library: &GalleryLibrary, client: &MetadataClient) -> EnrichReport {
    let mut report = EnrichReport::default();
    let missing: Vec<(u64, String)> = library
        .galleries()
        .iter()
        .filter(|gallery| gallery.manga.is_none())
        .map(|gallery| (gallery.id, gallery.name.clone()))
        .collect();

    for (id, name) in missing {
        match client.search(&name).await {
            Ok(Some(manga)) => match library.set_manga(id, manga).await {
                Ok(_) => report.updated += 1,
                Err(err) => {
                    warn!(gallery_id = id, error = %err, "metadata not stored");
                    report.failed += 1;
                }
            },
            Ok(None) => report.unmatched += 1,
            Err(err) => {
                warn!(gallery_id = id, gallery = %name, error = %err, "metadata lookup failed");
                report.failed += 1;
            }
        }
    }
    info!(updated = report.updated, unmatched = report.unmatched, failed = report.failed, "metadata pass finished");
    report
}
