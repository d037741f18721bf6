//! ABI bindings for the contracts the strategy touches on mainnet.
//!
//! WETH is the base asset, stETH the staking derivative and wstETH its
//! wrapped form. The keeper reads Aave V3, wstETH and Chainlink and encodes
//! Balancer flash loans.

use alloy::sol;

// Aave V3 Pool
sol! {
    /// E-mode category parameters (ltv/threshold/bonus in basis points).
    #[derive(Debug)]
    struct EModeCategory {
        uint16 ltv;
        uint16 liquidationThreshold;
        uint16 liquidationBonus;
        address priceSource;
        string label;
    }

    /// Aave V3 Pool (read side used by the keeper)
    #[sol(rpc)]
    interface IAavePool {
        function getUserEMode(address user) external view returns (uint256);

        function getEModeCategoryData(uint8 id) external view returns (EModeCategory memory);

        function getReserveData(address asset) external view returns (
            uint256 configuration,
            uint128 liquidityIndex,
            uint128 currentLiquidityRate,
            uint128 variableBorrowIndex,
            uint128 currentVariableBorrowRate,
            uint128 currentStableBorrowRate,
            uint40 lastUpdateTimestamp,
            uint16 id,
            address aTokenAddress,
            address stableDebtTokenAddress,
            address variableDebtTokenAddress,
            address interestRateStrategyAddress,
            uint128 accruedToTreasury,
            uint128 unbacked,
            uint128 isolationModeTotalDebt
        );
    }
}

sol! {
    /// Wrapped stETH
    #[sol(rpc)]
    interface IWstETH {
        function stEthPerToken() external view returns (uint256);
        function tokensPerStEth() external view returns (uint256);
    }
}

// Balancer flash loans
sol! {
    #[sol(rpc)]
    interface IBalancerVault {
        function flashLoan(
            address recipient,
            address[] tokens,
            uint256[] amounts,
            bytes userData
        ) external;
    }

    /// Callback the vault invokes on the borrower
    interface IFlashLoanRecipient {
        function receiveFlashLoan(
            address[] tokens,
            uint256[] amounts,
            uint256[] feeAmounts,
            bytes userData
        ) external;
    }
}

sol! {
    /// Chainlink AggregatorV3 (stETH/ETH)
    #[sol(rpc)]
    interface IAggregatorV3 {
        function latestRoundData() external view returns (
            uint80 roundId,
            int256 answer,
            uint256 startedAt,
            uint256 updatedAt,
            uint80 answeredInRound
        );

        function decimals() external view returns (uint8);
    }
}

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
    }
}
