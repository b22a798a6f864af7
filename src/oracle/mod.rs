//! Oracle watcher: turns arbitrator rulings into on-chain answer
//! reports.
//!
//! A ruling event only names a dispute; the question it settles and the
//! answer history behind it are reconstructed from other streams before
//! the report transaction is built. Redelivered rulings are harmless:
//! the contract rejects a second report for a settled question, which
//! is logged and skipped.

use std::collections::HashSet;

use alloy::primitives::U256;
use tracing::{debug, info, warn};

use crate::chain::{
    non_fatal, AnswerReport, BlockRange, ChainError, EventKind, EventPayload, OracleReader,
};
use crate::supervisor::Watcher;
use crate::xref::{answer_history, history_tail, resolve_question_id};

/// One watched oracle proxy deployment.
#[derive(Debug, Clone)]
pub struct OracleSource {
    /// Checkpoint namespace, unique across all configured sources.
    pub key: String,
    pub backfill: bool,
}

pub struct OracleBot<C> {
    chain: C,
    source: OracleSource,
    /// Disputes already reported in this process. The chain's settled
    /// state is the real deduplication; this just saves the round trip
    /// when a retried window replays a ruling.
    reported: HashSet<U256>,
}

impl<C: OracleReader> OracleBot<C> {
    pub fn new(chain: C, source: OracleSource) -> Self {
        Self {
            chain,
            source,
            reported: HashSet::new(),
        }
    }

    async fn handle_ruling(&mut self, dispute_id: U256) -> anyhow::Result<()> {
        if self.reported.contains(&dispute_id) {
            debug!(dispute = %dispute_id, "already reported, skipping");
            return Ok(());
        }
        let Some(question_id) = resolve_question_id(&self.chain, dispute_id).await? else {
            warn!(dispute = %dispute_id, "no question bound to dispute, skipping");
            return Ok(());
        };

        let Some(question) = non_fatal(self.chain.question(question_id).await, "question read")?
        else {
            return Ok(());
        };
        let history = answer_history(&self.chain, question_id).await?;
        let Some(tail) = history_tail(&history) else {
            warn!(question = %question_id, "ruling on a question with no answers, skipping");
            return Ok(());
        };

        let report = AnswerReport {
            question_id,
            history_hash: tail.previous_hash,
            answer: question.best_answer,
            bond: question.bond,
            answerer: tail.answerer,
        };
        match self.chain.submit_answer_report(&report).await {
            Ok(tx) => {
                info!(question = %question_id, tx = %tx, "answer report submitted");
                self.reported.insert(dispute_id);
                Ok(())
            }
            Err(ChainError::SubmissionRejected(reason)) => {
                warn!(question = %question_id, reason, "report rejected, already settled");
                self.reported.insert(dispute_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl<C: OracleReader> Watcher for OracleBot<C> {
    fn source_key(&self) -> &str {
        &self.source.key
    }

    fn backfill(&self) -> bool {
        self.source.backfill
    }

    async fn head(&self) -> Result<u64, ChainError> {
        self.chain.head().await
    }

    async fn process_window(&mut self, range: BlockRange) -> anyhow::Result<()> {
        let events = self.chain.fetch(EventKind::Ruling, range, None).await?;
        for ev in &events {
            if let EventPayload::Ruling { dispute_id } = ev.payload {
                self.handle_ruling(dispute_id).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::testing::{event, StaticChain};
    use crate::chain::QuestionState;
    use alloy::primitives::{Address, B256};
    use std::collections::HashMap;

    fn source() -> OracleSource {
        OracleSource {
            key: "oracle:mainnet".to_string(),
            backfill: true,
        }
    }

    fn answer_event(question_id: B256, n: u8, block: u64) -> crate::chain::RawEvent {
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
    }

    fn scripted(question_id: B256, dispute_id: U256, answers: u8) -> StaticChain {
        let mut events = vec![
            event(
                EventPayload::DisputeBinding {
                    dispute_id,
                    question_id,
                },
                2,
            ),
            event(EventPayload::Ruling { dispute_id }, 8),
        ];
        for n in 1..=answers {
            events.push(answer_event(question_id, n, 3 + n as u64));
        }
        StaticChain {
            head: 10,
            events,
            questions: HashMap::from([(
                question_id,
                QuestionState {
                    best_answer: B256::with_last_byte(0x42),
                    bond: U256::from(1000),
                },
            )]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn single_answer_reports_zero_sentinel() {
        let question_id = B256::with_last_byte(0x01);
        let dispute_id = U256::from(7);
        let mut bot = OracleBot::new(scripted(question_id, dispute_id, 1), source());

        bot.process_window(BlockRange::window(0, 10)).await.unwrap();

        let submitted = bot.chain.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(
            submitted[0],
            AnswerReport {
                question_id,
                history_hash: B256::ZERO,
                answer: B256::with_last_byte(0x42),
                bond: U256::from(1000),
                answerer: Address::with_last_byte(1),
            }
        );
    }

    #[tokio::test]
    async fn multiple_answers_report_second_to_last_hash() {
        let question_id = B256::with_last_byte(0x01);
        let dispute_id = U256::from(7);
        let mut bot = OracleBot::new(scripted(question_id, dispute_id, 3), source());

        bot.process_window(BlockRange::window(0, 10)).await.unwrap();

        let submitted = bot.chain.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].history_hash, B256::with_last_byte(0x12));
        assert_eq!(submitted[0].answerer, Address::with_last_byte(3));
    }

    #[tokio::test]
    async fn unbound_dispute_is_skipped_not_fatal() {
        let chain = StaticChain {
            head: 10,
            events: vec![event(
                EventPayload::Ruling {
                    dispute_id: U256::from(7),
                },
                8,
            )],
            ..Default::default()
        };
        let mut bot = OracleBot::new(chain, source());

        bot.process_window(BlockRange::window(0, 10)).await.unwrap();
        assert!(bot.chain.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn answerless_question_is_skipped() {
        let question_id = B256::with_last_byte(0x01);
        let dispute_id = U256::from(7);
        let mut bot = OracleBot::new(scripted(question_id, dispute_id, 0), source());

        bot.process_window(BlockRange::window(0, 10)).await.unwrap();
        assert!(bot.chain.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn replayed_ruling_is_reported_once() {
        let question_id = B256::with_last_byte(0x01);
        let dispute_id = U256::from(7);
        let mut bot = OracleBot::new(scripted(question_id, dispute_id, 1), source());

        bot.process_window(BlockRange::window(0, 10)).await.unwrap();
        bot.process_window(BlockRange::window(0, 10)).await.unwrap();

        assert_eq!(bot.chain.submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reverting_question_read_skips_the_ruling() {
        let question_id = B256::with_last_byte(0x01);
        let dispute_id = U256::from(7);
        let mut chain = scripted(question_id, dispute_id, 1);
        chain.reject_question = Some("execution reverted".to_string());
        let mut bot = OracleBot::new(chain, source());

        bot.process_window(BlockRange::window(0, 10)).await.unwrap();
        assert!(bot.chain.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_report_does_not_abort_the_window() {
        let question_id = B256::with_last_byte(0x01);
        let dispute_id = U256::from(7);
        let mut chain = scripted(question_id, dispute_id, 1);
        chain.reject_submissions = Some("already settled".to_string());
        let mut bot = OracleBot::new(chain, source());

        bot.process_window(BlockRange::window(0, 10)).await.unwrap();
        assert!(bot.chain.submitted.lock().unwrap().is_empty());
    }
}
