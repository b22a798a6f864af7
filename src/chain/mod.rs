//! Chain collaborator contracts: log reading, contract accessors, and
//! transaction submission.
//!
//! The RPC node itself is an external dependency; everything the bots
//! need from it goes through the traits below so the pipeline can be
//! driven by fakes in tests. Errors are split into `Transient` (retry
//! the whole window later) and `SubmissionRejected` (on-chain
//! preconditions no longer hold, skip the event) — conflating the two
//! would silently drop retries as duplicates.

pub mod rpc;
pub mod types;

use alloy::primitives::{B256, U256};
use thiserror::Error;
use tracing::warn;

pub use types::{
    AnswerReport, AppealParams, BlockRange, DepositParams, EventFilter, EventKind, EventPayload,
    ItemInfo, ItemStatus, QuestionState, RawEvent,
};

#[derive(Error, Debug)]
pub enum ChainError {
    /// Network-level failure. The caller must not advance its checkpoint.
    #[error("transient chain error: {0}")]
    Transient(String),
    /// The node accepted the request but the chain state refused it
    /// (stale precondition, revert). Authoritative "nothing to do".
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),
    /// The adapter does not serve this event stream.
    #[error("unsupported event kind: {0:?}")]
    Unsupported(EventKind),
}

/// Collapse a rejected call into a per-event skip. A revert is the
/// chain's authoritative "nothing to do" for that one event, whether it
/// came from a view read or a submission; only transient failures may
/// hold the window, so the rest of the batch keeps moving.
pub(crate) fn non_fatal<T>(res: Result<T, ChainError>, context: &str) -> anyhow::Result<Option<T>> {
    match res {
        Ok(value) => Ok(Some(value)),
        Err(ChainError::SubmissionRejected(reason)) => {
            warn!(context, reason, "skipping event");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Read access to one source's event logs.
///
/// Events are returned in ascending block/transaction order; the
/// cross-reference resolver depends on this to pick "most recent" and
/// "second-most-recent" records deterministically.
pub trait LogReader: Send + Sync {
    async fn head(&self) -> Result<u64, ChainError>;

    async fn fetch(
        &self,
        kind: EventKind,
        range: BlockRange,
        filter: Option<EventFilter>,
    ) -> Result<Vec<RawEvent>, ChainError>;
}

/// Accessor reads against a curated registry and its arbitrator.
pub trait RegistryReader: LogReader {
    async fn item(&self, item_id: B256) -> Result<ItemInfo, ChainError>;

    async fn deposit_params(&self) -> Result<DepositParams, ChainError>;

    async fn appeal_params(&self, dispute_id: U256) -> Result<AppealParams, ChainError>;

    /// Zero means "undecided" and is not yet actionable.
    async fn current_ruling(&self, dispute_id: U256) -> Result<U256, ChainError>;

    /// Resolve a dispute ID to the registry item it concerns.
    async fn item_for_dispute(&self, dispute_id: U256) -> Result<Option<B256>, ChainError>;

    /// Resolve an evidence submission to its item via the submitting
    /// transaction's call data.
    async fn item_for_evidence(&self, tx_ref: B256) -> Result<Option<B256>, ChainError>;
}

/// Accessor reads and the one write against the oracle pair.
pub trait OracleReader: LogReader {
    async fn question(&self, question_id: B256) -> Result<QuestionState, ChainError>;

    /// Submit the signed answer report. Fails with `SubmissionRejected`
    /// when the answer has already been settled on-chain.
    async fn submit_answer_report(&self, report: &AnswerReport) -> Result<B256, ChainError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory chain used by the pipeline unit tests.

    use super::*;
    use alloy::primitives::Address;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct StaticChain {
        pub head: u64,
        pub events: Vec<RawEvent>,
        pub items: HashMap<B256, ItemInfo>,
        pub deposit_params: Option<DepositParams>,
        pub appeal_params: Option<AppealParams>,
        pub rulings: HashMap<U256, U256>,
        pub dispute_items: HashMap<U256, B256>,
        pub evidence_items: HashMap<B256, B256>,
        pub questions: HashMap<B256, QuestionState>,
        /// Reports accepted by `submit_answer_report`.
        pub submitted: Mutex<Vec<AnswerReport>>,
        /// When set, every submission is rejected with this reason.
        pub reject_submissions: Option<String>,
        /// When set, `appeal_params` reverts with this reason.
        pub reject_appeal_params: Option<String>,
        /// When set, `question` reverts with this reason.
        pub reject_question: Option<String>,
    }

    fn matches(filter: Option<EventFilter>, payload: &EventPayload) -> bool {
        match (filter, payload) {
            (None, _) => true,
            (
                Some(EventFilter::ByDisputeId(id)),
                EventPayload::DisputeBinding { dispute_id, .. },
            ) => *dispute_id == id,
            (Some(EventFilter::ByDisputeId(id)), EventPayload::AppealPossible { dispute_id, .. }) => {
                *dispute_id == id
            }
            (Some(EventFilter::ByDisputeId(id)), EventPayload::Ruling { dispute_id }) => {
                *dispute_id == id
            }
            (Some(EventFilter::ByQuestionId(id)), EventPayload::NewAnswer { question_id, .. }) => {
                *question_id == id
            }
            _ => false,
        }
    }

    impl LogReader for StaticChain {
        async fn head(&self) -> Result<u64, ChainError> {
            Ok(self.head)
        }

        async fn fetch(
            &self,
            kind: EventKind,
            range: BlockRange,
            filter: Option<EventFilter>,
        ) -> Result<Vec<RawEvent>, ChainError> {
            let to = range.to.unwrap_or(u64::MAX);
            Ok(self
                .events
                .iter()
                .filter(|e| e.kind() == kind)
                .filter(|e| e.block_number >= range.from && e.block_number <= to)
                .filter(|e| matches(filter, &e.payload))
                .cloned()
                .collect())
        }
    }

    impl RegistryReader for StaticChain {
        async fn item(&self, item_id: B256) -> Result<ItemInfo, ChainError> {
            self.items
                .get(&item_id)
                .cloned()
                .ok_or_else(|| ChainError::Transient(format!("unknown item {item_id}")))
        }

        async fn deposit_params(&self) -> Result<DepositParams, ChainError> {
            self.deposit_params
                .clone()
                .ok_or_else(|| ChainError::Transient("no deposit params".into()))
        }

        async fn appeal_params(&self, _dispute_id: U256) -> Result<AppealParams, ChainError> {
            if let Some(reason) = &self.reject_appeal_params {
                return Err(ChainError::SubmissionRejected(reason.clone()));
            }
            self.appeal_params
                .clone()
                .ok_or_else(|| ChainError::Transient("no appeal params".into()))
        }

        async fn current_ruling(&self, dispute_id: U256) -> Result<U256, ChainError> {
            Ok(self.rulings.get(&dispute_id).copied().unwrap_or(U256::ZERO))
        }

        async fn item_for_dispute(&self, dispute_id: U256) -> Result<Option<B256>, ChainError> {
            Ok(self.dispute_items.get(&dispute_id).copied())
        }

        async fn item_for_evidence(&self, tx_ref: B256) -> Result<Option<B256>, ChainError> {
            Ok(self.evidence_items.get(&tx_ref).copied())
        }
    }

    impl OracleReader for StaticChain {
        async fn question(&self, question_id: B256) -> Result<QuestionState, ChainError> {
            if let Some(reason) = &self.reject_question {
                return Err(ChainError::SubmissionRejected(reason.clone()));
            }
            self.questions
                .get(&question_id)
                .cloned()
                .ok_or_else(|| ChainError::Transient(format!("unknown question {question_id}")))
        }

        async fn submit_answer_report(&self, report: &AnswerReport) -> Result<B256, ChainError> {
            if let Some(reason) = &self.reject_submissions {
                return Err(ChainError::SubmissionRejected(reason.clone()));
            }
            self.submitted.lock().unwrap().push(report.clone());
            Ok(B256::with_last_byte(0xaa))
        }
    }

    pub fn event(payload: EventPayload, block_number: u64) -> RawEvent {
        RawEvent {
            payload,
            block_number,
            tx_ref: B256::with_last_byte(block_number as u8),
        }
    }

    pub fn item_info(name: &str, ticker: &str) -> ItemInfo {
        ItemInfo {
            name: name.to_string(),
            ticker: ticker.to_string(),
            address: Address::with_last_byte(0x11),
            symbol_uri: "/ipfs/QmSymbol".to_string(),
            request_count: 1,
        }
    }
}
