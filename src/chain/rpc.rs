//! Alloy-backed implementations of the chain collaborator traits.
//!
//! Minimal inline interfaces cover just the events and accessors the
//! bots consume. Logs are decoded per stream into `EventPayload`;
//! records that fail schema validation are dropped with a warning so
//! one malformed log never aborts a batch.

use alloy::consensus::Transaction as _;
use alloy::eips::BlockNumberOrTag;
use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::sol_types::SolEvent;
use tracing::warn;

use crate::chain::types::{
    AnswerReport, AppealParams, BlockRange, DepositParams, EventFilter, EventKind, EventPayload,
    ItemInfo, ItemStatus, QuestionState, RawEvent,
};
use crate::chain::{ChainError, LogReader, OracleReader, RegistryReader};

sol! {
    #[sol(rpc)]
    interface ICuratedRegistry {
        event TokenStatusChange(
            address indexed _requester,
            address indexed _challenger,
            bytes32 indexed _tokenID,
            uint8 _status,
            bool _disputed,
            bool _appealed
        );
        event Evidence(
            address indexed _arbitrator,
            uint256 indexed _evidenceGroupID,
            address indexed _party,
            string _evidence
        );

        function tokens(bytes32 _tokenID)
            external
            view
            returns (
                string memory name,
                string memory ticker,
                address addr,
                string memory symbolMultihash,
                uint8 status,
                uint256 numberOfRequests
            );
        function arbitratorExtraData() external view returns (bytes memory);
        function MULTIPLIER_DIVISOR() external view returns (uint256);
        function sharedStakeMultiplier() external view returns (uint256);
        function winnerStakeMultiplier() external view returns (uint256);
        function requesterBaseDeposit() external view returns (uint256);
        function challengerBaseDeposit() external view returns (uint256);
        function arbitratorDisputeIDToTokenID(address _arbitrator, uint256 _disputeID)
            external
            view
            returns (bytes32);
    }

    #[sol(rpc)]
    interface IArbitrator {
        event AppealPossible(uint256 indexed _disputeID, address indexed _arbitrable);

        function arbitrationCost(bytes calldata _extraData) external view returns (uint256);
        function appealCost(uint256 _disputeID, bytes calldata _extraData)
            external
            view
            returns (uint256);
        function currentRuling(uint256 _disputeID) external view returns (uint256);
    }

    #[sol(rpc)]
    interface IOracle {
        event LogNewAnswer(
            bytes32 answer,
            bytes32 indexed question_id,
            bytes32 history_hash,
            address indexed user,
            uint256 bond,
            uint256 ts,
            bool is_commitment
        );

        function questions(bytes32 _questionID)
            external
            view
            returns (bytes32 bestAnswer, uint256 bond);
    }

    #[sol(rpc)]
    interface IOracleProxy {
        event Ruling(address indexed _arbitrator, uint256 indexed _disputeID, uint256 _ruling);
        event DisputeIDToQuestionID(uint256 indexed _disputeID, bytes32 _questionID);

        function reportAnswer(
            bytes32 _questionID,
            bytes32 _lastHistoryHash,
            bytes32 _lastAnswerOrCommitmentID,
            uint256 _lastBond,
            address _lastAnswerer,
            bool _isCommitment
        ) external;
    }
}

/// Read-only HTTP provider.
pub fn connect_http(rpc_url: &str) -> anyhow::Result<DynProvider> {
    let url = rpc_url.parse()?;
    Ok(ProviderBuilder::new().connect_http(url).erased())
}

/// HTTP provider with a local signer attached, for transaction submission.
pub fn connect_http_with_signer(rpc_url: &str, private_key: &str) -> anyhow::Result<DynProvider> {
    let signer: PrivateKeySigner = private_key.trim().parse()?;
    let wallet = EthereumWallet::from(signer);
    let url = rpc_url.parse()?;
    Ok(ProviderBuilder::new()
        .wallet(wallet)
        .connect_http(url)
        .erased())
}

fn transient<E: std::fmt::Display>(err: E) -> ChainError {
    ChainError::Transient(err.to_string())
}

/// Contract call failures are either node trouble (retry later) or a
/// revert (the chain state refuses the operation). The transports do
/// not expose this distinction structurally, so classify on the error
/// text, same as we do for rate-limit detection elsewhere.
fn classify<E: std::fmt::Display>(err: E) -> ChainError {
    let text = err.to_string();
    if text.contains("revert") || text.contains("Revert") {
        ChainError::SubmissionRejected(text)
    } else {
        ChainError::Transient(text)
    }
}

fn range_filter(base: Filter, range: BlockRange, filter: Option<EventFilter>) -> Filter {
    let mut f = base.from_block(range.from);
    f = match range.to {
        Some(to) => f.to_block(to),
        None => f.to_block(BlockNumberOrTag::Latest),
    };
    if let Some(filter) = filter {
        let topic = match filter {
            EventFilter::ByDisputeId(id) => B256::from(id),
            EventFilter::ByQuestionId(id) => id,
        };
        f = f.topic1(topic);
    }
    f
}

fn raw_event(payload: EventPayload, log: &Log) -> RawEvent {
    RawEvent {
        payload,
        block_number: log.block_number.unwrap_or(0),
        tx_ref: log.transaction_hash.unwrap_or_default(),
    }
}

/// Registry + arbitrator pair.
#[derive(Clone)]
pub struct RegistryRpc {
    provider: DynProvider,
    registry: Address,
    arbitrator: Address,
}

impl RegistryRpc {
    pub fn new(provider: DynProvider, registry: Address, arbitrator: Address) -> Self {
        Self {
            provider,
            registry,
            arbitrator,
        }
    }

    fn decode(&self, kind: EventKind, log: &Log) -> Option<RawEvent> {
        let payload = match kind {
            EventKind::StatusChange => {
                let ev = log
                    .log_decode::<ICuratedRegistry::TokenStatusChange>()
                    .inspect_err(|e| warn!(error = %e, "undecodable status-change log"))
                    .ok()?
                    .inner
                    .data;
                let Some(status) = ItemStatus::from_u8(ev._status) else {
                    warn!(raw = ev._status, item = %ev._tokenID, "unknown item status, skipping");
                    return None;
                };
                EventPayload::StatusChange {
                    item_id: ev._tokenID,
                    status,
                    disputed: ev._disputed,
                    appealed: ev._appealed,
                }
            }
            EventKind::Evidence => {
                let ev = log
                    .log_decode::<ICuratedRegistry::Evidence>()
                    .inspect_err(|e| warn!(error = %e, "undecodable evidence log"))
                    .ok()?
                    .inner
                    .data;
                EventPayload::Evidence { uri: ev._evidence }
            }
            EventKind::AppealPossible => {
                let ev = log
                    .log_decode::<IArbitrator::AppealPossible>()
                    .inspect_err(|e| warn!(error = %e, "undecodable appeal log"))
                    .ok()?
                    .inner
                    .data;
                EventPayload::AppealPossible {
                    dispute_id: ev._disputeID,
                    arbitrable: ev._arbitrable,
                }
            }
            _ => return None,
        };
        Some(raw_event(payload, log))
    }
}

impl LogReader for RegistryRpc {
    async fn head(&self) -> Result<u64, ChainError> {
        self.provider.get_block_number().await.map_err(transient)
    }

    async fn fetch(
        &self,
        kind: EventKind,
        range: BlockRange,
        filter: Option<EventFilter>,
    ) -> Result<Vec<RawEvent>, ChainError> {
        let (address, topic0) = match kind {
            EventKind::StatusChange => (
                self.registry,
                ICuratedRegistry::TokenStatusChange::SIGNATURE_HASH,
            ),
            EventKind::Evidence => (self.registry, ICuratedRegistry::Evidence::SIGNATURE_HASH),
            EventKind::AppealPossible => {
                (self.arbitrator, IArbitrator::AppealPossible::SIGNATURE_HASH)
            }
            other => return Err(ChainError::Unsupported(other)),
        };
        let f = range_filter(
            Filter::new().address(address).event_signature(topic0),
            range,
            filter,
        );
        let logs = self.provider.get_logs(&f).await.map_err(transient)?;
        Ok(logs.iter().filter_map(|log| self.decode(kind, log)).collect())
    }
}

impl RegistryReader for RegistryRpc {
    async fn item(&self, item_id: B256) -> Result<ItemInfo, ChainError> {
        let registry = ICuratedRegistry::new(self.registry, self.provider.clone());
        let item = registry.tokens(item_id).call().await.map_err(classify)?;
        Ok(ItemInfo {
            name: item.name,
            ticker: item.ticker,
            address: item.addr,
            symbol_uri: item.symbolMultihash,
            request_count: u64::try_from(item.numberOfRequests).unwrap_or(u64::MAX),
        })
    }

    async fn deposit_params(&self) -> Result<DepositParams, ChainError> {
        let registry = ICuratedRegistry::new(self.registry, self.provider.clone());
        let arbitrator = IArbitrator::new(self.arbitrator, self.provider.clone());

        let extra_data = registry.arbitratorExtraData().call().await.map_err(classify)?;
        let arbitration_cost = arbitrator
            .arbitrationCost(extra_data)
            .call()
            .await
            .map_err(classify)?;
        let shared_stake_multiplier = registry
            .sharedStakeMultiplier()
            .call()
            .await
            .map_err(classify)?;
        let divisor = registry.MULTIPLIER_DIVISOR().call().await.map_err(classify)?;
        let requester_base_deposit = registry
            .requesterBaseDeposit()
            .call()
            .await
            .map_err(classify)?;
        let challenger_base_deposit = registry
            .challengerBaseDeposit()
            .call()
            .await
            .map_err(classify)?;

        Ok(DepositParams {
            arbitration_cost,
            shared_stake_multiplier,
            divisor,
            requester_base_deposit,
            challenger_base_deposit,
        })
    }

    async fn appeal_params(&self, dispute_id: U256) -> Result<AppealParams, ChainError> {
        let registry = ICuratedRegistry::new(self.registry, self.provider.clone());
        let arbitrator = IArbitrator::new(self.arbitrator, self.provider.clone());

        let extra_data = registry.arbitratorExtraData().call().await.map_err(classify)?;
        let appeal_cost = arbitrator
            .appealCost(dispute_id, extra_data)
            .call()
            .await
            .map_err(classify)?;
        let winner_stake_multiplier = registry
            .winnerStakeMultiplier()
            .call()
            .await
            .map_err(classify)?;
        let divisor = registry.MULTIPLIER_DIVISOR().call().await.map_err(classify)?;

        Ok(AppealParams {
            appeal_cost,
            winner_stake_multiplier,
            divisor,
        })
    }

    async fn current_ruling(&self, dispute_id: U256) -> Result<U256, ChainError> {
        let arbitrator = IArbitrator::new(self.arbitrator, self.provider.clone());
        arbitrator
            .currentRuling(dispute_id)
            .call()
            .await
            .map_err(classify)
    }

    async fn item_for_dispute(&self, dispute_id: U256) -> Result<Option<B256>, ChainError> {
        let registry = ICuratedRegistry::new(self.registry, self.provider.clone());
        let item_id = registry
            .arbitratorDisputeIDToTokenID(self.arbitrator, dispute_id)
            .call()
            .await
            .map_err(classify)?;
        Ok((!item_id.is_zero()).then_some(item_id))
    }

    async fn item_for_evidence(&self, tx_ref: B256) -> Result<Option<B256>, ChainError> {
        let tx = self
            .provider
            .get_transaction_by_hash(tx_ref)
            .await
            .map_err(transient)?;
        // The item ID is the first 32-byte argument of the submitting call.
        Ok(tx.and_then(|tx| {
            let input = tx.input();
            (input.len() >= 36).then(|| B256::from_slice(&input[4..36]))
        }))
    }
}

/// Oracle + arbitration proxy pair. The provider carries the reporter's
/// signer so `submit_answer_report` can send transactions.
#[derive(Clone)]
pub struct OracleRpc {
    provider: DynProvider,
    oracle: Address,
    proxy: Address,
}

impl OracleRpc {
    pub fn new(provider: DynProvider, oracle: Address, proxy: Address) -> Self {
        Self {
            provider,
            oracle,
            proxy,
        }
    }

    fn decode(&self, kind: EventKind, log: &Log) -> Option<RawEvent> {
        let payload = match kind {
            EventKind::Ruling => {
                let ev = log
                    .log_decode::<IOracleProxy::Ruling>()
                    .inspect_err(|e| warn!(error = %e, "undecodable ruling log"))
                    .ok()?
                    .inner
                    .data;
                EventPayload::Ruling {
                    dispute_id: ev._disputeID,
                }
            }
            EventKind::DisputeBinding => {
                let ev = log
                    .log_decode::<IOracleProxy::DisputeIDToQuestionID>()
                    .inspect_err(|e| warn!(error = %e, "undecodable dispute-binding log"))
                    .ok()?
                    .inner
                    .data;
                EventPayload::DisputeBinding {
                    dispute_id: ev._disputeID,
                    question_id: ev._questionID,
                }
            }
            EventKind::NewAnswer => {
                let ev = log
                    .log_decode::<IOracle::LogNewAnswer>()
                    .inspect_err(|e| warn!(error = %e, "undecodable answer log"))
                    .ok()?
                    .inner
                    .data;
                EventPayload::NewAnswer {
                    question_id: ev.question_id,
                    answer: ev.answer,
                    history_hash: ev.history_hash,
                    answerer: ev.user,
                    bond: ev.bond,
                }
            }
            _ => return None,
        };
        Some(raw_event(payload, log))
    }
}

impl LogReader for OracleRpc {
    async fn head(&self) -> Result<u64, ChainError> {
        self.provider.get_block_number().await.map_err(transient)
    }

    async fn fetch(
        &self,
        kind: EventKind,
        range: BlockRange,
        filter: Option<EventFilter>,
    ) -> Result<Vec<RawEvent>, ChainError> {
        let (address, topic0) = match kind {
            EventKind::Ruling => (self.proxy, IOracleProxy::Ruling::SIGNATURE_HASH),
            EventKind::DisputeBinding => (
                self.proxy,
                IOracleProxy::DisputeIDToQuestionID::SIGNATURE_HASH,
            ),
            EventKind::NewAnswer => (self.oracle, IOracle::LogNewAnswer::SIGNATURE_HASH),
            other => return Err(ChainError::Unsupported(other)),
        };
        let f = range_filter(
            Filter::new().address(address).event_signature(topic0),
            range,
            filter,
        );
        let logs = self.provider.get_logs(&f).await.map_err(transient)?;
        Ok(logs.iter().filter_map(|log| self.decode(kind, log)).collect())
    }
}

impl OracleReader for OracleRpc {
    async fn question(&self, question_id: B256) -> Result<QuestionState, ChainError> {
        let oracle = IOracle::new(self.oracle, self.provider.clone());
        let q = oracle.questions(question_id).call().await.map_err(classify)?;
        Ok(QuestionState {
            best_answer: q.bestAnswer,
            bond: q.bond,
        })
    }

    async fn submit_answer_report(&self, report: &AnswerReport) -> Result<B256, ChainError> {
        let proxy = IOracleProxy::new(self.proxy, self.provider.clone());
        let pending = proxy
            .reportAnswer(
                report.question_id,
                report.history_hash,
                report.answer,
                report.bond,
                report.answerer,
                false,
            )
            .send()
            .await
            .map_err(classify)?;
        Ok(*pending.tx_hash())
    }
}
