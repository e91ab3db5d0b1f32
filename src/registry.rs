//! Method Registry (C4): the declarative mapping from a JSON-RPC method name
//! to the handler kind that serves it. Everything not named here is an
//! unknown method and gets a -32601 response before anything else runs.

/// Which of the four local handlers (or the upstream forwarder) a method
/// dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Forwarded verbatim to the upstream node.
    Passthrough,
    /// `personal_newAccount` — generates a key, updates the cache.
    LocalKeygen,
    /// `eth_accounts` — lists addresses the gateway considers local.
    LocalAccount,
    /// `eth_sign`, `eth_sendTransaction`, `eth_signTransaction`.
    LocalSign,
    /// `eth_getBalance` for a cached address; falls through to Passthrough
    /// on a cache miss.
    LocalBalance,
}

/// Methods forwarded untouched to the upstream node, extracted verbatim
/// from the original implementation's passthrough table.
const PASSTHROUGH_METHODS: &[&str] = &[
    "web3_clientVersion",
    "web3_sha3",
    "net_version",
    "net_peerCount",
    "net_listening",
    "eth_protocolVersion",
    "eth_syncing",
    "eth_coinbase",
    "eth_mining",
    "eth_hashrate",
    "eth_gasPrice",
    "eth_blockNumber",
    "eth_getBalance",
    "eth_getStorageAt",
    "eth_getTransactionCount",
    "eth_getBlockTransactionCountByHash",
    "eth_getBlockTransactionCountByNumber",
    "eth_getUncleCountByBlockHash",
    "eth_getUncleCountByBlockNumber",
    "eth_getCode",
    "eth_sendRawTransaction",
    "eth_call",
    "eth_estimateGas",
    "eth_getBlockByHash",
    "eth_getBlockByNumber",
    "eth_getTransactionByHash",
    "eth_getTransactionByBlockHashAndIndex",
    "eth_getTransactionByBlockNumberAndIndex",
    "eth_getTransactionReceipt",
    "eth_getUncleByBlockHashAndIndex",
    "eth_getUncleByBlockNumberAndIndex",
    "eth_newFilter",
    "eth_newBlockFilter",
    "eth_newPendingTransactionFilter",
    "eth_uninstallFilter",
    "eth_getFilterChanges",
    "eth_getFilterLogs",
    "eth_getLogs",
    "eth_getWork",
    "eth_submitWork",
    "eth_submitHashrate",
];

/// `eth_getBalance` is special: it's both a Passthrough method (above) and
/// the LocalBalance method. The dispatcher checks LocalBalance first (cache
/// hit wins), otherwise falls through to the Passthrough entry, matching
/// spec.md §4.4's "falls through to Passthrough" wording for cache misses.
pub fn lookup(method: &str) -> Option<HandlerKind> {
    match method {
        "personal_newAccount" => Some(HandlerKind::LocalKeygen),
        "eth_accounts" => Some(HandlerKind::LocalAccount),
        "eth_sign" | "eth_sendTransaction" | "eth_signTransaction" => Some(HandlerKind::LocalSign),
        "eth_getBalance" => Some(HandlerKind::LocalBalance),
        m if PASSTHROUGH_METHODS.contains(&m) => Some(HandlerKind::Passthrough),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_methods_take_priority_over_unknown() {
        assert_eq!(lookup("personal_newAccount"), Some(HandlerKind::LocalKeygen));
        assert_eq!(lookup("eth_accounts"), Some(HandlerKind::LocalAccount));
        assert_eq!(lookup("eth_sign"), Some(HandlerKind::LocalSign));
        assert_eq!(lookup("eth_sendTransaction"), Some(HandlerKind::LocalSign));
        assert_eq!(lookup("eth_signTransaction"), Some(HandlerKind::LocalSign));
        assert_eq!(lookup("eth_getBalance"), Some(HandlerKind::LocalBalance));
    }

    #[test]
    fn passthrough_methods_are_recognized() {
        assert_eq!(lookup("web3_clientVersion"), Some(HandlerKind::Passthrough));
        assert_eq!(lookup("eth_getLogs"), Some(HandlerKind::Passthrough));
        assert_eq!(lookup("eth_submitHashrate"), Some(HandlerKind::Passthrough));
    }

    #[test]
    fn unknown_method_is_none() {
        assert_eq!(lookup("totally_bogus_method"), None);
    }
}
