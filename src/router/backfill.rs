//! Bulk attribute backfill from the student-records table.

use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::config::MAX_BACKFILL_BATCH;
use crate::error::Result;
use crate::provisioning::BackfillFailure;
use crate::store::BackfillFilter;

/// Overrides of the configured batch.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Params {
    session: Option<String>,
    apptype: Option<String>,
    programme: Option<String>,
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct Response {
    success: bool,
    processed: usize,
    updated: usize,
    failed: usize,
    failures: Vec<BackfillFailure>,
}

pub async fn handler(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<Response>> {
    let defaults = &state.config.backfill;
    let filter = BackfillFilter {
        session: params.session.unwrap_or_else(|| defaults.session.clone()),
        apptype: params.apptype.unwrap_or_else(|| defaults.apptype.clone()),
        limit: params
            .limit
            .unwrap_or(defaults.limit)
            .min(MAX_BACKFILL_BATCH),
    };
    let programme = params
        .programme
        .unwrap_or_else(|| defaults.programme.clone());

    tracing::info!(
        session = %filter.session,
        apptype = %filter.apptype,
        limit = filter.limit,
        "backfill batch started"
    );
    let report = state.provisioning.backfill(&filter, &programme).await?;

    Ok(Json(Response {
        success: true,
        processed: report.processed,
        updated: report.updated,
        failed: report.failed,
        failures: report.failures,
    }))
}
