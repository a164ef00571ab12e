use crate::clients::overpass::{self, OverpassClient};
use crate::domain::models::Outcome;
use crate::error::AppResult;
use crate::storage::StoreConnector;
use serde::Serialize;
use tracing::{info, warn};

/// Summary of one ingest pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub fetched: usize,
    pub inserted: usize,
    pub skipped_invalid_target: bool,
}

/// Fetch geospatial features and store their elements in the connector's
/// default target.
pub async fn ingest_features(
    overpass: &OverpassClient,
    store: &StoreConnector,
    query: &str,
) -> AppResult<IngestReport> {
    let features = overpass.fetch_features(query).await?;
    let records = overpass::elements(&features);
    let fetched = records.len();

    if fetched == 0 {
        info!("No features returned, nothing to ingest");
        return Ok(IngestReport::default());
    }

    let report = match store.insert(records, None, None).await? {
        Outcome::Done(true) => IngestReport { fetched, inserted: fetched, skipped_invalid_target: false },
        Outcome::Done(false) => {
            warn!("Store did not acknowledge {} features", fetched);
            IngestReport { fetched, inserted: 0, skipped_invalid_target: false }
        }
        Outcome::InvalidTarget(target) => {
            warn!("Features not stored, target {} does not exist", target);
            IngestReport { fetched, inserted: 0, skipped_invalid_target: true }
        }
    };

    info!("Ingested {}/{} features into {}", report.inserted, report.fetched, store.defaults());
    Ok(report)
}
