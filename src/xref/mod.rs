//! Cross-reference resolution between event streams.
//!
//! Some events only carry a correlation ID: a ruling names a dispute,
//! and the dispute→question binding was emitted earlier on a separate
//! stream. Resolution replays that stream from genesis with an indexed
//! filter. A missing binding is not corruption — it may simply become
//! visible in a later block — so it resolves to `None` and the caller
//! skips the event without aborting the batch.

use alloy::primitives::{Address, B256, U256};

use crate::chain::{BlockRange, ChainError, EventFilter, EventKind, EventPayload, LogReader};

/// One recorded answer, in block order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub answer: B256,
    pub answerer: Address,
    pub history_hash: B256,
    pub bond: U256,
}

/// The authoritative tail of an answer history: the last answer's
/// submitter and the hash that preceded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTail {
    pub answerer: Address,
    /// All-zero sentinel when exactly one answer exists. Downstream
    /// transaction construction never receives an absent field.
    pub previous_hash: B256,
}

/// Map a dispute ID to its oracle question via the binding stream.
pub async fn resolve_question_id<R: LogReader>(
    reader: &R,
    dispute_id: U256,
) -> Result<Option<B256>, ChainError> {
    let events = reader
        .fetch(
            EventKind::DisputeBinding,
            BlockRange::from_genesis(),
            Some(EventFilter::ByDisputeId(dispute_id)),
        )
        .await?;
    Ok(events.into_iter().find_map(|e| match e.payload {
        EventPayload::DisputeBinding { question_id, .. } => Some(question_id),
        _ => None,
    }))
}

/// Replay every answer ever recorded for a question, ascending.
pub async fn answer_history<R: LogReader>(
    reader: &R,
    question_id: B256,
) -> Result<Vec<AnswerRecord>, ChainError> {
    let events = reader
        .fetch(
            EventKind::NewAnswer,
            BlockRange::from_genesis(),
            Some(EventFilter::ByQuestionId(question_id)),
        )
        .await?;
    Ok(events
        .into_iter()
        .filter_map(|e| match e.payload {
            EventPayload::NewAnswer {
                answer,
                answerer,
                history_hash,
                bond,
                ..
            } => Some(AnswerRecord {
                answer,
                answerer,
                history_hash,
                bond,
            }),
            _ => None,
        })
        .collect())
}

/// Current answerer = last record; previous hash = second-to-last
/// record's hash, or the zero sentinel. `None` for an empty history.
pub fn history_tail(history: &[AnswerRecord]) -> Option<HistoryTail> {
    let last = history.last()?;
    let previous_hash = if history.len() > 1 {
        history[history.len() - 2].history_hash
    } else {
        B256::ZERO
    };
    Some(HistoryTail {
        answerer: last.answerer,
        previous_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::testing::{event, StaticChain};

    fn answer(n: u8) -> AnswerRecord {
        AnswerRecord {
            answer: B256::with_last_byte(n),
            answerer: Address::with_last_byte(n),
            history_hash: B256::with_last_byte(0x10 + n),
            bond: U256::from(n),
        }
    }

    #[test]
    fn empty_history_has_no_tail() {
        assert_eq!(history_tail(&[]), None);
    }

    #[test]
    fn single_answer_yields_zero_sentinel() {
        let tail = history_tail(&[answer(1)]).unwrap();
        assert_eq!(tail.answerer, Address::with_last_byte(1));
        assert_eq!(tail.previous_hash, B256::ZERO);
    }

    #[test]
    fn previous_hash_is_second_to_last() {
        let tail = history_tail(&[answer(1), answer(2), answer(3)]).unwrap();
        assert_eq!(tail.answerer, Address::with_last_byte(3));
        assert_eq!(tail.previous_hash, B256::with_last_byte(0x12));
    }

    #[tokio::test]
    async fn unresolvable_dispute_is_none_not_error() {
        let chain = StaticChain::default();
        let resolved = resolve_question_id(&chain, U256::from(7)).await.unwrap();
        assert_eq!(resolved, None);
    }

    #[tokio::test]
    async fn binding_resolves_to_question() {
        let question_id = B256::with_last_byte(0x42);
        let chain = StaticChain {
            events: vec![event(
                EventPayload::DisputeBinding {
                    dispute_id: U256::from(7),
                    question_id,
                },
                3,
            )],
            ..Default::default()
        };
        let resolved = resolve_question_id(&chain, U256::from(7)).await.unwrap();
        assert_eq!(resolved, Some(question_id));
        // A different dispute still resolves to nothing.
        let other = resolve_question_id(&chain, U256::from(8)).await.unwrap();
        assert_eq!(other, None);
    }

    #[tokio::test]
    async fn history_replay_preserves_block_order() {
        let question_id = B256::with_last_byte(0x42);
        let mk = |n: u8, block: u64| {
            event(
                EventPayload::NewAnswer {
                    question_id,
                    answer: B256::with_last_byte(n),
                    history_hash: B256::with_last_byte(0x10 + n),
                    answerer: Address::with_last_byte(n),
                    bond: U256::from(n),
                },
                block,
            )
        };
        let chain = StaticChain {
            events: vec![mk(1, 5), mk(2, 9)],
            ..Default::default()
        };
        let history = answer_history(&chain, question_id).await.unwrap();
        assert_eq!(history.len(), 2);
        let tail = history_tail(&history).unwrap();
        assert_eq!(tail.answerer, Address::with_last_byte(2));
        assert_eq!(tail.previous_hash, B256::with_last_byte(0x11));
    }
}
