use crate::errors::TxError;
use crate::idempo::{resolve_request_key, IdempoStore};
use crate::model::Begin;
use crate::util::now_ms;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tillbase_storage::DocRef;
use tillbase_types::prelude::{payload_hash, Actor};

/// Outcome handed back to the endpoint: the replay payload plus whether it
/// came from the store or from a live application.
#[derive(Clone, Debug, PartialEq)]
pub struct MutationResult {
    pub request_key: String,
    pub data: Value,
    pub replayed: bool,
}

/// Drives every state-changing endpoint through the same machine:
/// resolve key → begin → {replay | conflict | prior failure | in-flight
/// re-read | apply → persist}.
pub struct MutationExecutor<S: IdempoStore> {
    store: S,
    inflight_ttl_ms: i64,
    inflight_polls: u32,
    inflight_poll_delay: Duration,
}

impl<S: IdempoStore> MutationExecutor<S> {
    pub fn new(store: S) -> Self {
        MutationExecutor {
            store,
            inflight_ttl_ms: 5 * 60_000,
            inflight_polls: 40,
            inflight_poll_delay: Duration::from_millis(25),
        }
    }

    pub fn with_inflight_ttl(mut self, ttl_ms: i64) -> Self {
        self.inflight_ttl_ms = ttl_ms;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// `apply` validates the payload and performs the collaborator
    /// mutation, returning a JSON-serializable summary (the replay payload)
    /// and the created/affected document reference. Any error routes
    /// through `fail()` before propagating so the stored record reflects
    /// reality even on failure.
    pub async fn execute<F, Fut>(
        &self,
        endpoint: &str,
        actor: &Actor,
        client_key: Option<&str>,
        payload: &Value,
        apply: F,
    ) -> Result<MutationResult, TxError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(Value, Option<DocRef>), TxError>>,
    {
        let request_key = resolve_request_key(client_key, actor, payload);
        let request_hash = payload_hash(payload);
        let mut apply_slot = Some(apply);
        let mut polls_left = self.inflight_polls;

        loop {
            let begun = self
                .store
                .begin(
                    &request_key,
                    endpoint,
                    &request_hash,
                    now_ms(),
                    self.inflight_ttl_ms,
                )
                .await?;

            match begun {
                Begin::Replay(stored) => {
                    tracing::debug!(
                        target: "tillbase::tx",
                        endpoint,
                        request_key,
                        "replaying stored mutation outcome"
                    );
                    return Ok(MutationResult {
                        request_key,
                        data: stored,
                        replayed: true,
                    });
                }
                Begin::Conflict => {
                    return Err(TxError::conflicting_key(&request_key, endpoint));
                }
                Begin::PriorFailure(message) => {
                    return Err(TxError::prior_failure(&message));
                }
                Begin::InFlight => {
                    if polls_left == 0 {
                        return Err(TxError::in_flight(&request_key));
                    }
                    polls_left -= 1;
                    tokio::time::sleep(self.inflight_poll_delay).await;
                }
                Begin::Fresh => {
                    let Some(apply) = apply_slot.take() else {
                        return Err(TxError::internal("mutation closure already consumed"));
                    };
                    match apply().await {
                        Ok((summary, reference)) => {
                            self.store
                                .complete(
                                    &request_key,
                                    endpoint,
                                    &request_hash,
                                    summary.clone(),
                                    reference,
                                )
                                .await?;
                            return Ok(MutationResult {
                                request_key,
                                data: summary,
                                replayed: false,
                            });
                        }
                        Err(err) => {
                            self.store
                                .fail(
                                    &request_key,
                                    endpoint,
                                    &request_hash,
                                    &err.0.message_user,
                                )
                                .await?;
                            return Err(err);
                        }
                    }
                }
            }
        }
    }
}
