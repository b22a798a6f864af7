//! Event records and accessor value types shared by the chain collaborators.

use alloy::primitives::{Address, B256, U256};

/// Block window for a log fetch. `to = None` means "latest".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from: u64,
    pub to: Option<u64>,
}

impl BlockRange {
    /// A bounded poll window `[from, to]`.
    pub fn window(from: u64, to: u64) -> Self {
        Self { from, to: Some(to) }
    }

    /// Full history replay, used by cross-reference resolution.
    pub fn from_genesis() -> Self {
        Self { from: 0, to: None }
    }
}

impl std::fmt::Display for BlockRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to {
            Some(to) => write!(f, "[{}, {}]", self.from, to),
            None => write!(f, "[{}, latest]", self.from),
        }
    }
}

/// The event streams the bots know how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Registry item lifecycle transition.
    StatusChange,
    /// Evidence submitted against a registry item.
    Evidence,
    /// The arbitrator opened an appeal window for a dispute.
    AppealPossible,
    /// The oracle proxy received a ruling for a dispute.
    Ruling,
    /// Mapping event binding a dispute ID to an oracle question ID.
    DisputeBinding,
    /// A new answer was recorded for an oracle question.
    NewAnswer,
}

/// Filter on one indexed event field, used for historical resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    ByDisputeId(U256),
    ByQuestionId(B256),
}

/// Registry item lifecycle status as recorded on-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// Not on the list (rejected, or removed after a clearing request).
    Absent,
    /// Accepted onto the list.
    Registered,
    /// Submitted, awaiting challenge period or dispute resolution.
    RegistrationRequested,
    /// Removal requested, awaiting challenge period or dispute resolution.
    ClearingRequested,
}

impl ItemStatus {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Absent),
            1 => Some(Self::Registered),
            2 => Some(Self::RegistrationRequested),
            3 => Some(Self::ClearingRequested),
            _ => None,
        }
    }
}

/// Decoded event payload. One variant per stream with a fixed schema;
/// logs that fail to decode are dropped at the adapter with a warning
/// rather than surfacing untyped field maps to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    StatusChange {
        item_id: B256,
        status: ItemStatus,
        disputed: bool,
        appealed: bool,
    },
    Evidence {
        uri: String,
    },
    AppealPossible {
        dispute_id: U256,
        arbitrable: Address,
    },
    Ruling {
        dispute_id: U256,
    },
    DisputeBinding {
        dispute_id: U256,
        question_id: B256,
    },
    NewAnswer {
        question_id: B256,
        answer: B256,
        history_hash: B256,
        answerer: Address,
        bond: U256,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::StatusChange { .. } => EventKind::StatusChange,
            Self::Evidence { .. } => EventKind::Evidence,
            Self::AppealPossible { .. } => EventKind::AppealPossible,
            Self::Ruling { .. } => EventKind::Ruling,
            Self::DisputeBinding { .. } => EventKind::DisputeBinding,
            Self::NewAnswer { .. } => EventKind::NewAnswer,
        }
    }
}

/// A record read from a log source. Transient, single-pass scoped.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub payload: EventPayload,
    pub block_number: u64,
    pub tx_ref: B256,
}

impl RawEvent {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

/// Registry item accessor read.
#[derive(Debug, Clone, Default)]
pub struct ItemInfo {
    pub name: String,
    pub ticker: String,
    pub address: Address,
    /// Content address of the item's symbol image (leading `/` is
    /// gateway-relative, see the payload module).
    pub symbol_uri: String,
    /// Number of requests ever made for this item. Distinguishes a
    /// first-time rejection from a removal of a listed item.
    pub request_count: u64,
}

/// Parameters for the winnable-deposit computation.
#[derive(Debug, Clone)]
pub struct DepositParams {
    pub arbitration_cost: U256,
    pub shared_stake_multiplier: U256,
    pub divisor: U256,
    pub requester_base_deposit: U256,
    pub challenger_base_deposit: U256,
}

/// Parameters for the maximum appealable fee computation.
#[derive(Debug, Clone)]
pub struct AppealParams {
    pub appeal_cost: U256,
    pub winner_stake_multiplier: U256,
    pub divisor: U256,
}

/// Current on-chain state of an oracle question.
#[derive(Debug, Clone)]
pub struct QuestionState {
    pub best_answer: B256,
    pub bond: U256,
}

/// The answer-report transaction payload. `history_hash` is the
/// second-to-last answer's hash, or all-zero when only one answer exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerReport {
    pub question_id: B256,
    pub history_hash: B256,
    pub answer: B256,
    pub bond: U256,
    pub answerer: Address,
}
