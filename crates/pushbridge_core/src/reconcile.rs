//! Tickle → history reconciliation.
//!
//! [`SessionContext`] holds everything a connected session needs to turn
//! pushes into state writes: the API, the sink, the resolved identity and the
//! history cursor. It is the only writer of the cursor, and every mutating
//! method takes `&mut self`, so reconciliation passes cannot interleave.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::{HistoryQuery, PushApi};
use crate::cursor::HistoryCursor;
use crate::error::BridgeError;
use crate::identity::EndpointIdentity;
use crate::normalize::{Canonical, Disposition, normalize};
use crate::push::RawPush;
use crate::sink::{
    STATE_FOR_ALL, STATE_MESSAGE, STATE_PAYLOAD, STATE_TITLE, STATE_TYPE, StateSink, StateValue,
};

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileOutcome {
    /// Records returned by the history query.
    pub fetched: usize,
    /// Records written to the sink.
    pub published: usize,
    /// Cursor after the pass.
    pub cursor: HistoryCursor,
}

/// Per-session reconciliation state.
pub struct SessionContext {
    api: Arc<dyn PushApi>,
    sink: Arc<dyn StateSink>,
    identity: EndpointIdentity,
    cursor: HistoryCursor,
    delete_consumed: bool,
}

impl SessionContext {
    /// Create a context for a resolved identity. The cursor starts at zero.
    pub fn new(
        api: Arc<dyn PushApi>,
        sink: Arc<dyn StateSink>,
        identity: EndpointIdentity,
        delete_consumed: bool,
    ) -> Self {
        Self {
            api,
            sink,
            identity,
            cursor: HistoryCursor::ZERO,
            delete_consumed,
        }
    }

    /// Current cursor.
    pub fn cursor(&self) -> HistoryCursor {
        self.cursor
    }

    /// Resolved identity.
    pub fn identity(&self) -> &EndpointIdentity {
        &self.identity
    }

    /// Seed the cursor from the newest push on the account.
    ///
    /// On failure the cursor is reset to zero and the error is returned for
    /// logging; it is never fatal.
    pub async fn seed(&mut self) -> Result<(), BridgeError> {
        match self.api.history(HistoryQuery::latest(1)).await {
            Ok(pushes) => {
                self.cursor.seed(pushes.first());
                if pushes.is_empty() {
                    info!("No push history yet, cursor reset to 0");
                } else {
                    debug!("Seeded history cursor at {}", self.cursor.value());
                }
                Ok(())
            }
            Err(e) => {
                self.cursor.seed(None);
                Err(BridgeError::HistorySeed(e))
            }
        }
    }

    /// Fetch everything modified after the cursor and apply it in order.
    ///
    /// A failed query leaves the cursor unchanged; the next tickle retries.
    pub async fn reconcile(&mut self) -> Result<ReconcileOutcome, BridgeError> {
        let batch = self
            .api
            .history(HistoryQuery::since(self.cursor.value()))
            .await
            .map_err(BridgeError::ReconciliationQuery)?;

        debug!(
            "Reconciling {} pushes modified after {}",
            batch.len(),
            self.cursor.value()
        );

        let mut published = 0;
        for push in &batch {
            if self.handle_push(push).await == Disposition::Publish {
                published += 1;
            }
        }

        self.cursor.advance(&batch);

        Ok(ReconcileOutcome {
            fetched: batch.len(),
            published,
            cursor: self.cursor,
        })
    }

    /// Filter, normalize and publish a single push.
    ///
    /// Shared by reconciliation and inline `push` frames. Never fails: sink
    /// and deletion errors are logged and swallowed.
    pub async fn handle_push(&self, push: &RawPush) -> Disposition {
        if let Some(target) = push.target_device_iden()
            && !self.identity.matches(target)
        {
            debug!(
                "Skipping push {:?} for device {} (mine: {})",
                push.iden(),
                target,
                self.identity
            );
            return Disposition::Ignored;
        }

        let (canonical, disposition) = normalize(push);
        debug!(
            "Push {:?} type={} disposition={:?}",
            push.iden(),
            canonical.push_type,
            disposition
        );

        if disposition != Disposition::Publish {
            return disposition;
        }

        self.publish(push, &canonical).await;

        if !canonical.for_all && self.delete_consumed {
            self.delete_remote(push).await;
        }

        Disposition::Publish
    }

    async fn publish(&self, push: &RawPush, canonical: &Canonical) {
        let writes: [(&str, StateValue); 5] = [
            (STATE_TYPE, push.push_type().map(str::to_string).into()),
            (STATE_TITLE, canonical.topic.clone().into()),
            (STATE_MESSAGE, canonical.message.clone().into()),
            (STATE_PAYLOAD, canonical.payload.clone().into()),
            (STATE_FOR_ALL, canonical.for_all.into()),
        ];

        for (id, value) in writes {
            if let Err(e) = self.sink.set_state(id, value, true).await {
                warn!("{}", e);
            }
        }
    }

    async fn delete_remote(&self, push: &RawPush) {
        let Some(iden) = push.iden() else {
            return;
        };
        if let Err(source) = self.api.delete_push(iden).await {
            let err = BridgeError::RecordDeletion {
                iden: iden.to_string(),
                source,
            };
            warn!("{}", err);
        } else {
            debug!("Deleted consumed push {}", iden);
        }
    }
}
