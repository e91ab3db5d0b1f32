//! Transaction Executor (C6): holds the Signer handle and the in-memory
//! account cache; performs key generation, transaction assembly/signing/
//! submission, balance queries, hash signing, and the workload generator.

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Signature, TransactionRequest, H256, U256};
use ethers::utils::keccak256;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::signer::Signer;
use crate::upstream::UpstreamClient;

/// One cached account. The handle itself lives inside the `Signer`
/// implementation (the keystore path); the cache here exists so the
/// dispatcher can answer `eth_accounts` and `eth_getBalance` without
/// consulting the Signer.
#[derive(Debug, Clone, Copy)]
pub struct Account {
    pub address: Address,
}

pub struct TransactionExecutor {
    cache: dashmap::DashMap<Address, Account>,
    signer: Arc<dyn Signer>,
    upstream: UpstreamClient,
    passphrase: String,
}

impl TransactionExecutor {
    pub fn new(signer: Arc<dyn Signer>, upstream: UpstreamClient, passphrase: String) -> Self {
        Self {
            cache: dashmap::DashMap::new(),
            signer,
            upstream,
            passphrase,
        }
    }

    /// Addresses the gateway considers local: the account cache, which is
    /// process-lifetime and populated only by `generate_key` within this
    /// process (spec.md §3 Account: "accounts created in prior runs are not
    /// re-cached on startup").
    pub fn cached_accounts(&self) -> Vec<Address> {
        self.cache.iter().map(|e| e.value().address).collect()
    }

    pub fn generate_key(&self) -> Result<Address, GatewayError> {
        let address = self.signer.new_account(&self.passphrase)?;
        self.cache.insert(address, Account { address });
        Ok(address)
    }

    /// Resolves `from` against the cache, falling back to a scan of
    /// `signer.accounts()` for out-of-band-imported keys, per §4.6.3 step 1.
    fn resolve_account(&self, from: Address) -> Result<Account, GatewayError> {
        if let Some(entry) = self.cache.get(&from) {
            return Ok(*entry.value());
        }
        if self.signer.accounts().contains(&from) {
            let account = Account { address: from };
            self.cache.insert(from, account);
            return Ok(account);
        }
        Err(GatewayError::AccountMissing)
    }

    fn build_typed_tx(
        &self,
        account: Account,
        to: Option<Address>,
        value: U256,
        gas_limit: u64,
        gas_price: U256,
        data: Bytes,
        nonce: U256,
    ) -> TypedTransaction {
        let mut req = TransactionRequest::new()
            .from(account.address)
            .value(value)
            .gas(gas_limit)
            .gas_price(gas_price)
            .data(data)
            .nonce(nonce);
        if let Some(to) = to {
            req = req.to(to);
        }
        TypedTransaction::Legacy(req)
    }

    /// §4.6.3 `SendTransaction`.
    pub async fn send_transaction(
        &self,
        from: &str,
        to: &str,
        value: &str,
        gas_limit: &str,
        gas_price: &str,
        data: &str,
    ) -> Result<String, GatewayError> {
        let from_addr = parse_address(from)?;
        let account = self.resolve_account(from_addr)?;

        let nonce = self.upstream.pending_nonce(&format!("{from_addr:#x}")).await?;

        let to_addr = if to.is_empty() { None } else { Some(parse_address(to)?) };
        let value = parse_hex_u256(value)?;
        let gas_price = parse_hex_u256(gas_price)?;
        let gas_limit = parse_hex_u64(gas_limit)?;
        let data_bytes = parse_hex_bytes(data)?;

        let tx = self.build_typed_tx(account, to_addr, value, gas_limit, gas_price, data_bytes, nonce.into());
        let (_sig, raw) = self.signer.sign_tx(account.address, tx, &self.passphrase)?;

        let hash = self.upstream.send_raw_transaction(&format!("0x{}", hex::encode(&raw))).await?;
        Ok(hash)
    }

    /// §4.6.4 `SignTransaction` — assemble and sign, but don't submit.
    pub async fn sign_transaction(
        &self,
        from: &str,
        to: &str,
        value: &str,
        gas_limit: &str,
        gas_price: &str,
        data: &str,
    ) -> Result<String, GatewayError> {
        let from_addr = parse_address(from)?;
        let account = self.resolve_account(from_addr)?;

        let nonce = self.upstream.pending_nonce(&format!("{from_addr:#x}")).await?;

        let to_addr = if to.is_empty() { None } else { Some(parse_address(to)?) };
        let value = parse_hex_u256(value)?;
        let gas_price = parse_hex_u256(gas_price)?;
        let gas_limit = parse_hex_u64(gas_limit)?;
        let data_bytes = parse_hex_bytes(data)?;

        let tx = self.build_typed_tx(account, to_addr, value, gas_limit, gas_price, data_bytes, nonce.into());
        let (_sig, raw) = self.signer.sign_tx(account.address, tx, &self.passphrase)?;
        Ok(format!("0x{}", hex::encode(&raw)))
    }

    /// §4.6.5 `SignHash` (`eth_sign`). Builds the legacy wallet pre-image
    /// literally as specified, without asserting EIP-191 conformance for
    /// non-UTF8 payloads.
    pub fn sign_hash(&self, address: &str, data: &[u8]) -> Result<String, GatewayError> {
        let addr = parse_address(address)?;
        let account = self.resolve_account(addr)?;

        let mut preimage = format!("\x19Ethereum Signed Message:\n{}", data.len()).into_bytes();
        preimage.extend_from_slice(data);
        let hash = H256::from(keccak256(&preimage));

        let sig: Signature = self.signer.sign_hash(account.address, hash, &self.passphrase)?;
        Ok(format!("0x{}", hex::encode(sig.to_vec())))
    }

    /// §4.6.6 `GetBalance`. Cache miss is `AccountMissing`; the dispatcher
    /// is responsible for falling through to raw Passthrough on that error.
    pub async fn get_balance(&self, address: &str) -> Result<U256, GatewayError> {
        let addr = parse_address(address)?;
        if !self.cache.contains_key(&addr) {
            return Err(GatewayError::AccountMissing);
        }
        let balance = self.upstream.balance_at(&format!("{addr:#x}")).await?;
        Ok(U256::from(balance))
    }

    /// §4.6.7 `Workload`. Fire-and-forget: errors are logged, not
    /// propagated, and the loop is not cancelled on server shutdown
    /// (spec.md §5 flags this as intentional).
    pub async fn workload(
        self: Arc<Self>,
        from: String,
        to: String,
        value: String,
        gas_limit: String,
        gas_price: String,
        data: String,
        sleep: std::time::Duration,
        n: usize,
    ) {
        for i in 0..n {
            match self
                .send_transaction(&from, &to, &value, &gas_limit, &gas_price, &data)
                .await
            {
                Ok(hash) => tracing::info!(iteration = i, %hash, "workload transaction submitted"),
                Err(e) => tracing::warn!(iteration = i, error = %e, "workload transaction failed"),
            }
            tokio::time::sleep(sleep).await;
        }
    }

    /// §4.6.8 `NodeSyncProgress`.
    pub async fn node_sync_progress(&self) -> Result<(bool, u64, u64), GatewayError> {
        self.upstream.sync_progress().await
    }
}

fn parse_address(s: &str) -> Result<Address, GatewayError> {
    Address::from_str(s).map_err(|e| GatewayError::BadRequest(format!("invalid address {s}: {e}")))
}

fn parse_hex_u256(s: &str) -> Result<U256, GatewayError> {
    let s = s.trim_start_matches("0x");
    let s = if s.is_empty() { "0" } else { s };
    U256::from_str_radix(s, 16).map_err(|e| GatewayError::BadRequest(format!("invalid hex integer: {e}")))
}

fn parse_hex_u64(s: &str) -> Result<u64, GatewayError> {
    let s = s.trim_start_matches("0x");
    let s = if s.is_empty() { "0" } else { s };
    u64::from_str_radix(s, 16).map_err(|e| GatewayError::BadRequest(format!("invalid hex integer: {e}")))
}

fn parse_hex_bytes(s: &str) -> Result<Bytes, GatewayError> {
    let s = s.trim_start_matches("0x");
    if s.is_empty() {
        return Ok(Bytes::default());
    }
    hex::decode(s)
        .map(Bytes::from)
        .map_err(|e| GatewayError::BadRequest(format!("invalid hex data: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eth_sign_preimage_is_byte_exact() {
        let data = b"hello";
        let mut expected = b"\x19Ethereum Signed Message:\n5".to_vec();
        expected.extend_from_slice(data);
        let mut actual = format!("\x19Ethereum Signed Message:\n{}", data.len()).into_bytes();
        actual.extend_from_slice(data);
        assert_eq!(actual, expected);
    }

    #[test]
    fn parses_hex_integers() {
        assert_eq!(parse_hex_u64("0x5208").unwrap(), 21000);
        assert_eq!(parse_hex_u256("0x1").unwrap(), U256::from(1));
        assert_eq!(parse_hex_bytes("0x").unwrap(), Bytes::default());
    }

    #[test]
    fn rejects_malformed_address() {
        assert!(parse_address("not-an-address").is_err());
    }
}
