use rocket::{
    http::Status,
    response::status::Created,
    serde::json::{Error as JsonError, Json},
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::Caller,
            candidate::{CandidateDescription, CandidatePatch, CandidateSpec},
            reset::ResetSummary,
            user::{UserDescription, UserSpec},
            vote::VoteDescription,
        },
        common::{CandidateId, UserId},
        db::vote::VoteFilter,
    },
    poll::{candidates, policy::require_judge, users, voting},
    store::Store,
};

pub fn routes() -> Vec<Route> {
    routes![
        create_candidate,
        update_candidate,
        delete_candidate,
        create_user,
        get_users,
        get_votes,
        reset_election,
        reset_candidates,
    ]
}

// Routes with a body check the caller before looking at it, so a non-judge
// is always told `Forbidden` whatever they sent.

#[post("/admin/candidates", data = "<spec>", format = "json")]
async fn create_candidate(
    caller: Result<Caller>,
    spec: std::result::Result<Json<CandidateSpec>, JsonError<'_>>,
    store: &State<Store>,
) -> Result<Created<Json<CandidateDescription>>> {
    let caller = Caller::optional(caller)?;
    require_judge(caller.as_ref(), "create candidates")?;
    let spec = spec.map_err(Error::bad_body)?;
    let candidate = candidates::create_candidate(store, caller.as_ref(), spec.0).await?;
    Ok(Created::new(format!("/api/candidates/{}", candidate.id)).body(Json(candidate.into())))
}

#[put("/admin/candidates/<id>", data = "<patch>", format = "json")]
async fn update_candidate(
    caller: Result<Caller>,
    id: CandidateId,
    patch: std::result::Result<Json<CandidatePatch>, JsonError<'_>>,
    store: &State<Store>,
) -> Result<Json<CandidateDescription>> {
    let caller = Caller::optional(caller)?;
    require_judge(caller.as_ref(), "update candidates")?;
    let patch = patch.map_err(Error::bad_body)?;
    let candidate = candidates::update_candidate(store, caller.as_ref(), id, patch.0).await?;
    Ok(Json(candidate.into()))
}

#[delete("/admin/candidates/<id>")]
async fn delete_candidate(
    caller: Result<Caller>,
    id: CandidateId,
    store: &State<Store>,
) -> Result<Status> {
    let caller = Caller::optional(caller)?;
    if candidates::delete_candidate(store, caller.as_ref(), id).await? {
        Ok(Status::NoContent)
    } else {
        Err(Error::not_found(format!("candidate {id}")))
    }
}

#[post("/admin/users", data = "<spec>", format = "json")]
async fn create_user(
    caller: Result<Caller>,
    spec: std::result::Result<Json<UserSpec>, JsonError<'_>>,
    store: &State<Store>,
) -> Result<Created<Json<UserDescription>>> {
    let caller = Caller::optional(caller)?;
    require_judge(caller.as_ref(), "create users")?;
    let spec = spec.map_err(Error::bad_body)?;
    let user = users::create_user(store, caller.as_ref(), spec.0).await?;
    Ok(Created::new(format!("/api/admin/users/{}", user.id)).body(Json(user.into())))
}

#[get("/admin/users")]
async fn get_users(
    caller: Result<Caller>,
    store: &State<Store>,
) -> Result<Json<Vec<UserDescription>>> {
    let caller = Caller::optional(caller)?;
    let users = users::list_users(store, caller.as_ref()).await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

#[get("/admin/votes?<candidate_id>&<voter_id>")]
async fn get_votes(
    caller: Result<Caller>,
    candidate_id: Option<CandidateId>,
    voter_id: Option<UserId>,
    store: &State<Store>,
) -> Result<Json<Vec<VoteDescription>>> {
    let caller = Caller::optional(caller)?;
    let filter = VoteFilter {
        candidate_id,
        voter_id,
    };
    let votes = users::list_votes(store, caller.as_ref(), filter).await?;
    Ok(Json(votes.into_iter().map(Into::into).collect()))
}

#[post("/admin/reset/election")]
async fn reset_election(caller: Result<Caller>, store: &State<Store>) -> Result<Json<ResetSummary>> {
    let caller = Caller::optional(caller)?;
    let removed = voting::reset_election(store, caller.as_ref()).await?;
    Ok(Json(ResetSummary { removed }))
}

#[post("/admin/reset/candidates")]
async fn reset_candidates(
    caller: Result<Caller>,
    store: &State<Store>,
) -> Result<Json<ResetSummary>> {
    let caller = Caller::optional(caller)?;
    let removed = voting::reset_candidates(store, caller.as_ref()).await?;
    Ok(Json(ResetSummary { removed }))
}
