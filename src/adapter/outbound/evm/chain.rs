//! Event log and block reads over JSON-RPC.

use alloy_primitives::{Address, B256, I256, U256};
use alloy_provider::{DynProvider, Provider};
use alloy_rpc_types_eth::{BlockNumberOrTag, Filter, Log};
use alloy_sol_types::SolEvent;
use async_trait::async_trait;
use tracing::{debug, warn};

use super::contracts::PerpsV2Market;
use crate::domain::{Account, Event, EventArgs, EventKind};
use crate::error::{ChainError, Result};
use crate::port::{BlockSource, EventSource};

/// Reads one market's logs and block metadata.
#[derive(Clone)]
pub struct EvmChain {
    provider: DynProvider,
    market: Address,
}

impl EvmChain {
    pub fn new(provider: DynProvider, market: Address) -> Self {
        Self { provider, market }
    }
}

#[async_trait]
impl EventSource for EvmChain {
    async fn query_events(
        &self,
        kinds: &[EventKind],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Event>> {
        let topics: Vec<B256> = kinds.iter().map(|k| signature_hash(*k)).collect();
        let filter = Filter::new()
            .address(self.market)
            .event_signature(topics)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| {
                ChainError::Rpc(format!("eth_getLogs {from_block}..={to_block}: {e}"))
            })?;

        Ok(decode_logs(&logs))
    }
}

/// Decode a window of logs in log order.
///
/// Removed logs, unknown topics and logs that fail to decode are skipped.
pub(super) fn decode_logs(logs: &[Log]) -> Vec<Event> {
    let mut events = Vec::with_capacity(logs.len());
    for log in logs {
        if log.removed {
            debug!(block = ?log.block_number, "Skipping removed log");
            continue;
        }
        match decode_log(log) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => warn!(topic = ?log.topic0(), "Log with unexpected topic"),
            Err(e) => warn!(
                block = ?log.block_number,
                log_index = ?log.log_index,
                error = %e,
                "Skipping undecodable log"
            ),
        }
    }
    events.sort_by_key(Event::log_position);
    events
}

#[async_trait]
impl BlockSource for EvmChain {
    async fn head(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| ChainError::Rpc(format!("eth_blockNumber: {e}")).into())
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<u64> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(block_number))
            .await
            .map_err(|e| ChainError::Rpc(format!("eth_getBlockByNumber {block_number}: {e}")))?
            .ok_or(ChainError::BlockNotFound(block_number))?;
        Ok(block.header.timestamp)
    }
}

pub(super) const fn signature_hash(kind: EventKind) -> B256 {
    match kind {
        EventKind::PositionModified => PerpsV2Market::PositionModified::SIGNATURE_HASH,
        EventKind::PositionLiquidated => PerpsV2Market::PositionLiquidated::SIGNATURE_HASH,
        EventKind::FundingRecomputed => PerpsV2Market::FundingRecomputed::SIGNATURE_HASH,
        EventKind::DelayedOrderSubmitted => PerpsV2Market::DelayedOrderSubmitted::SIGNATURE_HASH,
        EventKind::DelayedOrderRemoved => PerpsV2Market::DelayedOrderRemoved::SIGNATURE_HASH,
    }
}

/// Decode a market log. Returns `None` for topics the keepers don't know.
pub(super) fn decode_log(log: &Log) -> Result<Option<Event>> {
    let Some(&topic) = log.topic0() else {
        return Ok(None);
    };
    let block_number = log.block_number.unwrap_or_default();
    let log_index = log.log_index.unwrap_or_default();

    let args = if topic == PerpsV2Market::PositionModified::SIGNATURE_HASH {
        let e = decode::<PerpsV2Market::PositionModified>(log, "PositionModified")?;
        EventArgs::PositionModified {
            id: to_u64(e.id, "PositionModified")?,
            account: account(e.account),
            margin: unsigned(e.margin, "PositionModified")?,
            size: signed(e.size, "PositionModified")?,
            trade_size: signed(e.tradeSize, "PositionModified")?,
            last_price: unsigned(e.lastPrice, "PositionModified")?,
        }
    } else if topic == PerpsV2Market::PositionLiquidated::SIGNATURE_HASH {
        let e = decode::<PerpsV2Market::PositionLiquidated>(log, "PositionLiquidated")?;
        EventArgs::PositionLiquidated {
            id: to_u64(e.id, "PositionLiquidated")?,
            account: account(e.account),
            liquidator: account(e.liquidator),
            size: signed(e.size, "PositionLiquidated")?,
            price: unsigned(e.price, "PositionLiquidated")?,
        }
    } else if topic == PerpsV2Market::FundingRecomputed::SIGNATURE_HASH {
        let e = decode::<PerpsV2Market::FundingRecomputed>(log, "FundingRecomputed")?;
        EventArgs::FundingRecomputed {
            timestamp: to_u64(e.timestamp, "FundingRecomputed")?,
        }
    } else if topic == PerpsV2Market::DelayedOrderSubmitted::SIGNATURE_HASH {
        let e = decode::<PerpsV2Market::DelayedOrderSubmitted>(log, "DelayedOrderSubmitted")?;
        EventArgs::DelayedOrderSubmitted {
            account: account(e.account),
            is_offchain: e.isOffchain,
            size_delta: signed(e.sizeDelta, "DelayedOrderSubmitted")?,
            target_round_id: u128::try_from(e.targetRoundId)
                .map_err(|_| overflow("DelayedOrderSubmitted", e.targetRoundId))?,
            executable_at_time: to_u64(e.executableAtTime, "DelayedOrderSubmitted")?,
        }
    } else if topic == PerpsV2Market::DelayedOrderRemoved::SIGNATURE_HASH {
        let e = decode::<PerpsV2Market::DelayedOrderRemoved>(log, "DelayedOrderRemoved")?;
        EventArgs::DelayedOrderRemoved {
            account: account(e.account),
        }
    } else {
        return Ok(None);
    };

    Ok(Some(Event::new(block_number, log_index, args)))
}

fn decode<E: SolEvent>(log: &Log, event: &'static str) -> Result<E> {
    log.log_decode::<E>()
        .map(|decoded| decoded.inner.data)
        .map_err(|e| {
            ChainError::Decode {
                event,
                reason: e.to_string(),
            }
            .into()
        })
}

fn account(address: Address) -> Account {
    Account::new(address.to_string())
}

fn overflow(event: &'static str, value: impl std::fmt::Display) -> ChainError {
    ChainError::Decode {
        event,
        reason: format!("value {value} out of range"),
    }
}

fn to_u64(value: U256, event: &'static str) -> Result<u64> {
    u64::try_from(value).map_err(|_| overflow(event, value).into())
}

fn unsigned(value: U256, event: &'static str) -> Result<i128> {
    i128::try_from(value).map_err(|_| overflow(event, value).into())
}

fn signed(value: I256, event: &'static str) -> Result<i128> {
    i128::try_from(value).map_err(|_| overflow(event, value).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, FixedBytes};

    const MARKET: Address = address!("0x2B3bb4c683BFc5239B029131EEf3B1d214478d93");
    const TRADER: Address = address!("0x00000000000000000000000000000000000000aa");

    fn rpc_log(data: alloy_primitives::LogData, block: u64, index: u64) -> Log {
        Log {
            inner: alloy_primitives::Log {
                address: MARKET,
                data,
            },
            block_number: Some(block),
            log_index: Some(index),
            ..Log::default()
        }
    }

    #[test]
    fn decodes_position_modified() {
        let unit = U256::from(10u64).pow(U256::from(18u64));
        let event = PerpsV2Market::PositionModified {
            id: U256::from(7u64),
            account: TRADER,
            margin: U256::from(1000u64) * unit,
            size: I256::try_from(-2i64).unwrap() * I256::from_raw(unit),
            tradeSize: I256::try_from(-2i64).unwrap() * I256::from_raw(unit),
            lastPrice: U256::from(1500u64) * unit,
            fundingIndex: U256::from(3u64),
            fee: U256::ZERO,
        };

        let decoded = decode_log(&rpc_log(event.encode_log_data(), 12, 4))
            .unwrap()
            .unwrap();

        assert_eq!(decoded.block_number, 12);
        assert_eq!(decoded.log_index, 4);
        let EventArgs::PositionModified {
            id,
            account,
            size,
            margin,
            ..
        } = decoded.args
        else {
            panic!("wrong variant");
        };
        assert_eq!(id, 7);
        assert_eq!(account, Account::from("0x00000000000000000000000000000000000000aa"));
        assert_eq!(size, -2_000_000_000_000_000_000);
        assert_eq!(margin, 1_000_000_000_000_000_000_000);
    }

    #[test]
    fn decodes_offchain_submission() {
        let event = PerpsV2Market::DelayedOrderSubmitted {
            account: TRADER,
            isOffchain: true,
            sizeDelta: I256::ONE,
            targetRoundId: U256::from(42u64),
            executableAtTime: U256::from(1_700_000_000u64),
            commitDeposit: U256::ZERO,
            keeperDeposit: U256::ZERO,
            trackingCode: FixedBytes::ZERO,
        };

        let decoded = decode_log(&rpc_log(event.encode_log_data(), 1, 0))
            .unwrap()
            .unwrap();

        assert_eq!(decoded.kind(), EventKind::DelayedOrderSubmitted);
        assert!(matches!(
            decoded.args,
            EventArgs::DelayedOrderSubmitted {
                is_offchain: true,
                target_round_id: 42,
                executable_at_time: 1_700_000_000,
                ..
            }
        ));
    }

    #[test]
    fn unknown_topic_is_skipped() {
        let data = alloy_primitives::LogData::new_unchecked(
            vec![B256::repeat_byte(1)],
            Default::default(),
        );
        assert!(decode_log(&rpc_log(data, 1, 0)).unwrap().is_none());
    }

    #[test]
    fn out_of_range_timestamp_is_a_decode_error() {
        let event = PerpsV2Market::FundingRecomputed {
            funding: I256::ZERO,
            fundingRate: I256::ZERO,
            index: U256::ZERO,
            timestamp: U256::MAX,
        };

        let err = decode_log(&rpc_log(event.encode_log_data(), 1, 0)).unwrap_err();
        assert!(err.to_string().contains("FundingRecomputed"));
    }

    #[test]
    fn undecodable_log_does_not_sink_its_window() {
        let funding = |timestamp| PerpsV2Market::FundingRecomputed {
            funding: I256::ZERO,
            fundingRate: I256::ZERO,
            index: U256::ZERO,
            timestamp,
        };
        let mut removed = rpc_log(funding(U256::from(5u64)).encode_log_data(), 3, 0);
        removed.removed = true;
        let logs = vec![
            rpc_log(funding(U256::from(20u64)).encode_log_data(), 2, 1),
            rpc_log(funding(U256::MAX).encode_log_data(), 2, 0),
            removed,
            rpc_log(funding(U256::from(10u64)).encode_log_data(), 1, 0),
        ];

        let events = decode_logs(&logs);

        let positions: Vec<_> = events.iter().map(|e| (e.block_number, e.log_index)).collect();
        assert_eq!(positions, vec![(1, 0), (2, 1)]);
        assert!(matches!(
            events[1].args,
            EventArgs::FundingRecomputed { timestamp: 20 }
        ));
    }

    #[test]
    fn every_kind_has_a_distinct_topic() {
        let kinds = [
            EventKind::PositionModified,
            EventKind::PositionLiquidated,
            EventKind::FundingRecomputed,
            EventKind::DelayedOrderSubmitted,
            EventKind::DelayedOrderRemoved,
        ];
        let topics: std::collections::HashSet<B256> =
            kinds.iter().map(|k| signature_hash(*k)).collect();
        assert_eq!(topics.len(), kinds.len());
    }
}
