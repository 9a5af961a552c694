use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::Caller,
        candidate::{CandidatePatch, CandidateSpec},
    },
    common::{CandidateId, Grade},
    db::candidate::{Candidate, CandidateFilter, CandidateUpdate, NewCandidate},
};
use crate::store::Store;

use super::policy::require_judge;

/// All candidates, optionally only those of one grade.
pub async fn list_candidates(store: &Store, grade: Option<Grade>) -> Result<Vec<Candidate>> {
    store.candidates(CandidateFilter { grade }).await
}

pub async fn get_candidate(store: &Store, id: CandidateId) -> Result<Candidate> {
    store
        .candidate(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("candidate {id}")))
}

/// Create a candidate (judges only).
pub async fn create_candidate(
    store: &Store,
    caller: Option<&Caller>,
    spec: CandidateSpec,
) -> Result<Candidate> {
    let judge = require_judge(caller, "create candidates")?;
    let candidate = NewCandidate::try_from(spec)?;
    let candidate = store.insert_candidate(candidate).await?;
    info!(
        "Judge {} created candidate {} ({})",
        judge.id, candidate.id, candidate.name
    );
    Ok(candidate)
}

/// Partially update a candidate (judges only).
pub async fn update_candidate(
    store: &Store,
    caller: Option<&Caller>,
    id: CandidateId,
    patch: CandidatePatch,
) -> Result<Candidate> {
    let judge = require_judge(caller, "update candidates")?;
    let update = CandidateUpdate::try_from(patch)?;
    let candidate = store
        .update_candidate(id, &update)
        .await?
        .ok_or_else(|| Error::not_found(format!("candidate {id}")))?;
    info!("Judge {} updated candidate {id}", judge.id);
    Ok(candidate)
}

/// Delete a candidate (judges only). Returns whether it existed; votes for
/// it are kept and skipped by the tally.
pub async fn delete_candidate(
    store: &Store,
    caller: Option<&Caller>,
    id: CandidateId,
) -> Result<bool> {
    let judge = require_judge(caller, "delete candidates")?;
    let deleted = store.delete_candidate(id).await?;
    if deleted {
        info!("Judge {} deleted candidate {id}", judge.id);
    }
    Ok(deleted)
}
