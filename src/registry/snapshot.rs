//! Entity state reconstruction and monetary math.
//!
//! All amounts are indivisible minimal currency units held in `U256`;
//! division truncates. The only place a decimal rendering appears is
//! `format_amount`, which is display-only and never feeds a transaction.

use alloy::primitives::{Address, B256, U256};

use crate::chain::{AppealParams, DepositParams, ItemInfo, ItemStatus};

/// What a challenger or requester stands to win.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositAmounts {
    pub requester_winnable: U256,
    pub challenger_winnable: U256,
}

/// `shared = arbitration_cost * shared_stake_multiplier / divisor`,
/// then winnable = shared + role base deposit.
pub fn winnable_deposits(params: &DepositParams) -> DepositAmounts {
    let shared = if params.divisor.is_zero() {
        U256::ZERO
    } else {
        params.arbitration_cost * params.shared_stake_multiplier / params.divisor
    };
    DepositAmounts {
        requester_winnable: shared + params.requester_base_deposit,
        challenger_winnable: shared + params.challenger_base_deposit,
    }
}

/// Maximum fee the winner's side can collect from funding an appeal.
pub fn max_appeal_fee(params: &AppealParams) -> U256 {
    if params.divisor.is_zero() {
        return U256::ZERO;
    }
    params.appeal_cost * params.winner_stake_multiplier / params.divisor
}

const WEI_PER_ETH: u64 = 1_000_000_000_000_000_000;

/// Human-readable ETH rendering, truncated (not rounded) to two
/// fractional digits.
pub fn format_amount(wei: U256) -> String {
    let unit = U256::from(WEI_PER_ETH);
    let whole = wei / unit;
    let frac = (wei % unit) * U256::from(100) / unit;
    format!("{whole}.{:02}", frac.to::<u64>())
}

/// Normalized view of a registry item at the moment of a status event.
/// Built fresh per event, consumed immediately by the dispatcher.
#[derive(Debug, Clone)]
pub struct EntitySnapshot {
    pub item_id: B256,
    pub name: String,
    pub ticker: String,
    pub address: Address,
    pub symbol_uri: String,
    pub status: ItemStatus,
    pub disputed: bool,
    pub appealed: bool,
    pub request_count: u64,
    pub deposits: DepositAmounts,
}

impl EntitySnapshot {
    pub fn new(
        item_id: B256,
        info: ItemInfo,
        status: ItemStatus,
        disputed: bool,
        appealed: bool,
        deposits: DepositAmounts,
    ) -> Self {
        Self {
            item_id,
            name: info.name,
            ticker: info.ticker,
            address: info.address,
            symbol_uri: info.symbol_uri,
            status,
            disputed,
            appealed,
            request_count: info.request_count,
            deposits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_deposit_truncates() {
        let params = DepositParams {
            arbitration_cost: U256::from(1000),
            shared_stake_multiplier: U256::from(3),
            divisor: U256::from(4),
            requester_base_deposit: U256::from(10),
            challenger_base_deposit: U256::from(25),
        };
        let deposits = winnable_deposits(&params);
        // 1000 * 3 / 4 = 750
        assert_eq!(deposits.requester_winnable, U256::from(760));
        assert_eq!(deposits.challenger_winnable, U256::from(775));
    }

    #[test]
    fn zero_divisor_does_not_panic() {
        let params = DepositParams {
            arbitration_cost: U256::from(1000),
            shared_stake_multiplier: U256::from(3),
            divisor: U256::ZERO,
            requester_base_deposit: U256::from(10),
            challenger_base_deposit: U256::from(25),
        };
        let deposits = winnable_deposits(&params);
        assert_eq!(deposits.requester_winnable, U256::from(10));
    }

    #[test]
    fn appeal_fee_truncates() {
        let fee = max_appeal_fee(&AppealParams {
            appeal_cost: U256::from(999),
            winner_stake_multiplier: U256::from(2),
            divisor: U256::from(4),
        });
        assert_eq!(fee, U256::from(499));
    }

    #[test]
    fn amount_rendering_truncates_to_two_digits() {
        let one_eth = U256::from(WEI_PER_ETH);
        assert_eq!(format_amount(one_eth), "1.00");
        assert_eq!(format_amount(U256::from(1_239_999_999_999_999_999u64)), "1.23");
        assert_eq!(format_amount(U256::from(50_000_000_000_000_000u64)), "0.05");
        assert_eq!(format_amount(U256::ZERO), "0.00");
    }
}
