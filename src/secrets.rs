//! The remote secret store and the cloud-identity provider supplying its
//! login material (spec.md §1's opaque *Secrets* / *IdentityProvider*).
//! Modeled on the original's Vault (`auth/aws/login`) and EC2
//! instance-metadata flow (`original_source/server.go: GetRole`, `LoginAws`).

use crate::error::GatewayError;
use serde_json::Value;

/// `LoginWithIdentity`, `Read` — everything the rest of the gateway needs
/// from the remote secret store.
#[async_trait::async_trait]
pub trait Secrets: Send + Sync {
    /// Exchanges signed cloud-identity material for a bearer token, POSTing
    /// to `auth/<method>/login` and extracting `auth.client_token`.
    async fn login_with_identity(&self, method: &str, role: &str) -> Result<String, GatewayError>;

    /// Reads an arbitrary secret path, returning its raw JSON `data` field.
    async fn read(&self, path: &str, bearer: &str) -> Result<Value, GatewayError>;
}

/// The secret path the original stores its singleton signing key under
/// (`service.go: GetKey`, `pathArg := "keys/singleton"`).
pub const SINGLETON_KEY_PATH: &str = "keys/singleton";

/// `transport.go: Keyfile` — the secret's `data.key` field is itself a JSON
/// string of this shape. Used by the Secrets-backed `eth_accounts` variant.
#[derive(serde::Deserialize)]
struct Keyfile {
    address: String,
}

/// Parses a `keys/singleton` read response into the `0x`-prefixed address
/// `eth_accounts` reports, mirroring `transport.go: makeEthAccountsEndpoint`'s
/// `json.Unmarshal` + `"0x" + data.Address` construction.
pub fn parse_singleton_address(data: &Value) -> Result<String, GatewayError> {
    let key_str = data
        .get("key")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Secrets("secret data missing 'key' field".into()))?;
    let keyfile: Keyfile = serde_json::from_str(key_str)
        .map_err(|e| GatewayError::Secrets(format!("malformed keyfile JSON: {e}")))?;
    let address = keyfile.address.trim_start_matches("0x");
    Ok(format!("0x{address}"))
}

pub struct VaultSecrets {
    http: reqwest::Client,
    address: String,
}

impl VaultSecrets {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            address: address.into(),
        }
    }
}

#[async_trait::async_trait]
impl Secrets for VaultSecrets {
    async fn login_with_identity(&self, method: &str, role: &str) -> Result<String, GatewayError> {
        let url = format!("{}/v1/auth/{method}/login", self.address.trim_end_matches('/'));
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "role": role }))
            .send()
            .await
            .map_err(|e| GatewayError::Secrets(e.to_string()))?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| GatewayError::Secrets(e.to_string()))?;
        body.get("auth")
            .and_then(|a| a.get("client_token"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Secrets("login response missing auth.client_token".into()))
    }

    async fn read(&self, path: &str, bearer: &str) -> Result<Value, GatewayError> {
        let url = format!("{}/v1/{path}", self.address.trim_end_matches('/'));
        let resp = self
            .http
            .get(&url)
            .header("X-Vault-Token", bearer)
            .send()
            .await
            .map_err(|e| GatewayError::Secrets(e.to_string()))?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| GatewayError::Secrets(e.to_string()))?;
        body.get("data")
            .cloned()
            .ok_or_else(|| GatewayError::Secrets("secret response missing data".into()))
    }
}

/// Returns a role name and signed login material from the instance's cloud
/// identity. Modeled on the original's EC2 instance-metadata lookup.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn role(&self) -> Result<String, GatewayError>;
}

const METADATA_BASE: &str = "http://169.254.169.254/latest/meta-data";

pub struct Ec2MetadataProvider {
    http: reqwest::Client,
}

impl Ec2MetadataProvider {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for Ec2MetadataProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IdentityProvider for Ec2MetadataProvider {
    async fn role(&self) -> Result<String, GatewayError> {
        let url = format!("{METADATA_BASE}/iam/security-credentials/");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::Secrets(format!("instance metadata unreachable: {e}")))?;
        let body = resp
            .text()
            .await
            .map_err(|e| GatewayError::Secrets(e.to_string()))?;
        // The endpoint returns the role name as the sole line of the body.
        let role = body.lines().next().unwrap_or_default().trim();
        if role.is_empty() {
            return Err(GatewayError::Secrets("no IAM role on instance".into()));
        }
        Ok(role.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_role_body_is_rejected() {
        let role = "".lines().next().unwrap_or_default().trim();
        assert!(role.is_empty());
    }

    #[test]
    fn parses_singleton_keyfile_address() {
        let data = serde_json::json!({ "key": "{\"address\":\"abcd000000000000000000000000000000000000\"}" });
        let addr = parse_singleton_address(&data).unwrap();
        assert_eq!(addr, "0xabcd000000000000000000000000000000000000");
    }

    #[test]
    fn rejects_missing_key_field() {
        let data = serde_json::json!({});
        assert!(parse_singleton_address(&data).is_err());
    }
}
