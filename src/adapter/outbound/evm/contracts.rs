//! Solidity bindings for the perps market, its settings and the Pyth oracle.
//!
//! Only the events and functions the keepers use are declared. Event
//! signatures must match the deployed market exactly, since logs are filtered
//! and decoded by topic.

use alloy_sol_types::sol;

sol! {
    #[sol(rpc)]
    contract PerpsV2Market {
        event PositionModified(
            uint256 indexed id,
            address indexed account,
            uint256 margin,
            int256 size,
            int256 tradeSize,
            uint256 lastPrice,
            uint256 fundingIndex,
            uint256 fee
        );
        event PositionLiquidated(
            uint256 indexed id,
            address indexed account,
            address indexed liquidator,
            int256 size,
            uint256 price,
            uint256 fee
        );
        event FundingRecomputed(
            int256 funding,
            int256 fundingRate,
            uint256 index,
            uint256 timestamp
        );
        event DelayedOrderSubmitted(
            address indexed account,
            bool isOffchain,
            int256 sizeDelta,
            uint256 targetRoundId,
            uint256 executableAtTime,
            uint256 commitDeposit,
            uint256 keeperDeposit,
            bytes32 trackingCode
        );
        event DelayedOrderRemoved(
            address indexed account,
            bool isOffchain,
            uint256 currentRoundId,
            int256 sizeDelta,
            uint256 targetRoundId,
            uint256 commitDeposit,
            uint256 keeperDeposit,
            bytes32 trackingCode
        );

        function assetPrice() external view returns (uint256 price, bool invalid);
        function canLiquidate(address account) external view returns (bool);
        function liquidationPrice(address account)
            external
            view
            returns (uint256 price, bool invalid);
        function liquidatePosition(address account) external;
        function executeOffchainDelayedOrder(address account, bytes[] priceUpdateData)
            external
            payable;
    }
}

sol! {
    #[sol(rpc)]
    contract PerpsV2MarketSettings {
        function offchainDelayedOrderMinAge(bytes32 marketKey) external view returns (uint256);
        function offchainDelayedOrderMaxAge(bytes32 marketKey) external view returns (uint256);
    }
}

sol! {
    #[sol(rpc)]
    contract IPyth {
        function getUpdateFee(bytes[] updateData) external view returns (uint256 feeAmount);
    }
}
