//! Function selector table.

/// Name reported for calldata shorter than a selector.
pub const NATIVE_OR_EMPTY: &str = "native transfer or empty";
/// Name reported for a selector missing from [`SELECTORS`].
pub const UNKNOWN_FUNCTION: &str = "unknown";

pub const DEPOSIT: &str = "0xb6b55f25";
pub const INITIATE_WITHDRAWAL: &str = "0xb51d1d4f";
pub const FINALIZE_WITHDRAWAL: &str = "0xc5b6aa2f";
pub const RESOLVE_SINGLE_BID: &str = "0x6dc4fc4e";
pub const RESOLVE_MULTI_BID: &str = "0x447a709e";
pub const SET_TRANSFEROR: &str = "0xbef0ec74";
pub const TRANSFER_CONTROLLER: &str = "0x007be2fe";
pub const ERC20_TRANSFER: &str = "0xa9059cbb";
pub const ERC20_TRANSFER_FROM: &str = "0x23b872dd";
pub const ERC20_APPROVE: &str = "0x095ea7b3";
pub const WETH_WITHDRAW: &str = "0x2e1a7d4d";

/// Selector → signature, express lane auction functions first.
pub static SELECTORS: &[(&str, &str)] = &[
    // ExpressLaneAuction
    (DEPOSIT, "deposit(uint256)"),
    (INITIATE_WITHDRAWAL, "initiateWithdrawal()"),
    (FINALIZE_WITHDRAWAL, "finalizeWithdrawal()"),
    ("0x6ad72517", "flushBeneficiaryBalance()"),
    (RESOLVE_SINGLE_BID, "resolveSingleBidAuction((address,uint256,bytes))"),
    (RESOLVE_MULTI_BID, "resolveMultiBidAuction((address,uint256,bytes),(address,uint256,bytes))"),
    (SET_TRANSFEROR, "setTransferor((address,uint64))"),
    (TRANSFER_CONTROLLER, "transferExpressLaneController(uint64,address)"),
    ("0xf698da25", "domainSeparator()"),
    ("0x04c584ad", "getBidHash(uint64,address,uint256)"),
    ("0x70a08231", "balanceOf(address)"),
    ("0x5633c337", "balanceOfAtRound(address,uint64)"),
    ("0x02b62938", "withdrawableBalance(address)"),
    ("0x6e8cace5", "withdrawableBalanceAtRound(address,uint64)"),
    ("0x0d253fbe", "resolvedRounds()"),
    ("0xce9c7c0d", "setReservePrice(uint256)"),
    ("0xe4d20c1d", "setMinReservePrice(uint256)"),
    ("0x1c31f710", "setBeneficiary(address)"),
    ("0xfed87be8", "setRoundTimingInfo((int64,uint64,uint64,uint64))"),
    ("0x7b617f94", "roundTimestamps(uint64)"),
    // Common child-chain traffic
    (ERC20_TRANSFER, "transfer(address,uint256)"),
    (ERC20_TRANSFER_FROM, "transferFrom(address,address,uint256)"),
    (ERC20_APPROVE, "approve(address,uint256)"),
    ("0x38ed1739", "swapExactTokensForTokens(uint256,uint256,address[],address,uint256)"),
    ("0x7ff36ab5", "swapExactETHForTokens(uint256,address[],address,uint256)"),
    ("0x18cbafe5", "swapExactTokensForETH(uint256,uint256,address[],address,uint256)"),
    ("0xd0e30db0", "deposit()"),
    (WETH_WITHDRAW, "withdraw(uint256)"),
    ("0xac9650d8", "multicall(bytes[])"),
    ("0x5ae401dc", "multicall(uint256,bytes[])"),
    ("0x12aa3caf", "swap(uint256,uint256,address[],bytes[],address)"),
    ("0xe449022e", "uniswapV3Swap(uint256,uint256,uint256[])"),
    ("0x0502b1c5", "unoswap(address,uint256,uint256,bytes32[])"),
    ("0x6bf6a42d", "checkCallback(uint256,uint256,bytes32)"),
];

/// Auction actions that mark a row as high priority.
pub static AUCTION_SELECTORS: &[&str] = &[RESOLVE_SINGLE_BID, RESOLVE_MULTI_BID, TRANSFER_CONTROLLER];

/// Balance and transferor lifecycle calls.
pub static LIFECYCLE_SELECTORS: &[&str] = &[DEPOSIT, INITIATE_WITHDRAWAL, FINALIZE_WITHDRAWAL, SET_TRANSFEROR];

/// Split calldata into `(selector_hex, function_name)`.
///
/// The selector is `0x` + 8 lower-case hex characters, or `""` when the input
/// is shorter than four bytes.
pub fn decode_selector(calldata: &[u8]) -> (String, &'static str) {
    if calldata.len() < 4 {
        return (String::new(), NATIVE_OR_EMPTY);
    }
    let selector = format!("0x{}", hex::encode(&calldata[..4]));
    let name = function_name(&selector).unwrap_or(UNKNOWN_FUNCTION);
    (selector, name)
}

/// Look up a selector in the table.
pub fn function_name(selector: &str) -> Option<&'static str> {
    SELECTORS
        .iter()
        .find(|(sel, _)| sel.eq_ignore_ascii_case(selector))
        .map(|(_, name)| *name)
}

pub fn is_auction_selector(selector: &str) -> bool {
    AUCTION_SELECTORS.iter().any(|s| s.eq_ignore_ascii_case(selector))
}

pub fn is_lifecycle_selector(selector: &str) -> bool {
    LIFECYCLE_SELECTORS.iter().any(|s| s.eq_ignore_ascii_case(selector))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_calldata() {
        assert_eq!(decode_selector(&[]), (String::new(), NATIVE_OR_EMPTY));
        assert_eq!(decode_selector(&[0xb6, 0xb5, 0x5f]).1, NATIVE_OR_EMPTY);
    }

    #[test]
    fn known_selector() {
        let (sel, name) = decode_selector(&[0xB6, 0xB5, 0x5F, 0x25, 0x00]);
        assert_eq!(sel, "0xb6b55f25");
        assert_eq!(name, "deposit(uint256)");
    }

    #[test]
    fn unknown_selector() {
        let (sel, name) = decode_selector(&[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(sel, "0xdeadbeef");
        assert_eq!(name, UNKNOWN_FUNCTION);
    }

    #[test]
    fn table_has_no_duplicate_selectors() {
        let mut seen = std::collections::HashSet::new();
        for (sel, _) in SELECTORS {
            assert_eq!(sel.len(), 10, "{sel}");
            assert!(seen.insert(*sel), "duplicate selector {sel}");
        }
    }

    #[test]
    fn auction_and_lifecycle_sets() {
        assert!(is_auction_selector("0x6DC4FC4E"));
        assert!(!is_auction_selector(DEPOSIT));
        assert!(is_lifecycle_selector(DEPOSIT));
    }
}
