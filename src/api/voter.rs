use rocket::{
    response::status::Created,
    serde::json::{Error as JsonError, Json},
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::api::{
        auth::Caller,
        vote::{VoteDescription, VoteRequest},
    },
    poll::{policy::authenticated, voting},
    store::Store,
};

pub fn routes() -> Vec<Route> {
    routes![cast_vote]
}

#[post("/votes", data = "<request>", format = "json")]
async fn cast_vote(
    caller: Result<Caller>,
    request: std::result::Result<Json<VoteRequest>, JsonError<'_>>,
    store: &State<Store>,
) -> Result<Created<Json<VoteDescription>>> {
    let caller = Caller::optional(caller)?;
    authenticated(caller.as_ref())?;
    let request = request.map_err(Error::bad_body)?;
    let vote = voting::cast_vote(store, caller.as_ref(), request.candidate_id).await?;
    Ok(Created::new(format!("/api/votes/{}", vote.id)).body(Json(vote.into())))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::serde_json,
    };

    use crate::model::{
        api::{
            candidate::CandidateSpec,
            results::{CandidateWithVotes, VotingStats},
        },
        common::CandidateId,
        db::candidate::NewCandidate,
    };

    use super::*;

    async fn insert_candidate(store: &Store) -> CandidateId {
        let candidate: NewCandidate = CandidateSpec::example("Ana", 10).try_into().unwrap();
        store.insert_candidate(candidate).await.unwrap().id
    }

    async fn vote(client: &Client, candidate_id: CandidateId) -> LocalResponse<'_> {
        client
            .post(uri!("/api", cast_vote))
            .header(ContentType::JSON)
            .json(&VoteRequest { candidate_id })
            .dispatch()
            .await
    }

    #[backend_test(student)]
    async fn vote_then_vote_again(client: Client, store: Store) {
        let candidate_id = insert_candidate(&store).await;

        let response = vote(&client, candidate_id).await;
        assert_eq!(Status::Created, response.status());
        let description: VoteDescription = response.into_json().await.unwrap();
        assert_eq!(description.candidate_id, candidate_id);
        assert!(store.user(description.voter_id).await.unwrap().unwrap().has_voted);

        let response = vote(&client, candidate_id).await;
        assert_eq!(Status::Conflict, response.status());
        let body: serde_json::Value = response.into_json().await.unwrap();
        assert!(body["message"].is_string());

        let results: Vec<CandidateWithVotes> = client
            .get("/api/results")
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(results[0].votes, 1);
        assert_eq!(results[0].percentage, 100);
    }

    #[backend_test(student)]
    async fn unknown_candidate(client: Client, store: Store) {
        let response = vote(&client, 42).await;
        assert_eq!(Status::NotFound, response.status());

        // The failed attempt did not use up the student's vote.
        let candidate_id = insert_candidate(&store).await;
        let response = vote(&client, candidate_id).await;
        assert_eq!(Status::Created, response.status());
    }

    #[backend_test(judge)]
    async fn judges_cannot_vote(client: Client, store: Store) {
        let candidate_id = insert_candidate(&store).await;
        let response = vote(&client, candidate_id).await;
        assert_eq!(Status::Forbidden, response.status());

        let stats: VotingStats = client
            .get("/api/stats")
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(stats.total_votes, 0);
    }

    #[backend_test]
    async fn anonymous_cannot_vote(client: Client, store: Store) {
        let candidate_id = insert_candidate(&store).await;
        let response = vote(&client, candidate_id).await;
        assert_eq!(Status::Unauthorized, response.status());

        let response = client
            .post(uri!("/api", cast_vote))
            .header(ContentType::JSON)
            .body("{not json")
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(student)]
    async fn malformed_vote_is_a_bad_request(client: Client, store: Store) {
        let candidate_id = insert_candidate(&store).await;
        for body in ["{not json", "{}", r#"{"candidateId": "ana"}"#] {
            let response = client
                .post(uri!("/api", cast_vote))
                .header(ContentType::JSON)
                .body(body)
                .dispatch()
                .await;
            assert_eq!(Status::BadRequest, response.status());
        }

        // None of the rejected bodies used up the vote.
        let response = vote(&client, candidate_id).await;
        assert_eq!(Status::Created, response.status());
    }
}
