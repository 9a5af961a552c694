use rocket::{serde::json::Json, Route, State};

use crate::{
    config::Config,
    error::Result,
    model::{
        api::{
            candidate::CandidateDescription,
            results::{CandidateWithVotes, VotingStats},
        },
        common::{CandidateId, Grade},
    },
    poll::{candidates, tally},
    store::Store,
};

pub fn routes() -> Vec<Route> {
    routes![get_candidates, get_candidate, get_results, get_stats]
}

#[get("/candidates?<grade>")]
async fn get_candidates(
    grade: Option<Grade>,
    store: &State<Store>,
) -> Result<Json<Vec<CandidateDescription>>> {
    let candidates = candidates::list_candidates(store, grade).await?;
    Ok(Json(candidates.into_iter().map(Into::into).collect()))
}

#[get("/candidates/<id>")]
async fn get_candidate(
    id: CandidateId,
    store: &State<Store>,
) -> Result<Json<CandidateDescription>> {
    let candidate = candidates::get_candidate(store, id).await?;
    Ok(Json(candidate.into()))
}

#[get("/results")]
async fn get_results(store: &State<Store>) -> Result<Json<Vec<CandidateWithVotes>>> {
    Ok(Json(tally::results(store).await?))
}

#[get("/stats")]
async fn get_stats(store: &State<Store>, config: &State<Config>) -> Result<Json<VotingStats>> {
    Ok(Json(tally::voting_stats(store, config.closing_date()).await?))
}
