//! User Store (C1): an embedded single-file KV mapping `token → email`.
//! Backed by `sled`, an embedded ordered KV store, playing the role the
//! original's `bbolt` database played — single-file, crash-safe, exclusive
//! on open.

use crate::error::GatewayError;
use base64::Engine;
use rand::RngCore;
use std::io::Write;

pub struct UserStore {
    db: sled::Db,
}

/// 32 random bytes, URL-safe base64 encoded (44 chars incl. padding), per
/// spec.md §3/§8.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE.encode(bytes)
}

impl UserStore {
    /// Opens (creating if absent) the store at `path`. `sled` holds an
    /// exclusive lock on the directory for the process lifetime; a second
    /// process attempting to open the same path fails immediately rather
    /// than blocking indefinitely, which callers treat as "server has it"
    /// and fall through to the Admin IPC channel.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, GatewayError> {
        let db = sled::open(path).map_err(|e| GatewayError::BadRequest(format!("opening user store: {e}")))?;
        Ok(Self { db })
    }

    /// `CreateUser(email) → token`. Fails with `BadRequest` on a blank
    /// email; writes atomically via a single `sled` insert.
    pub fn create_user(&self, email: &str) -> Result<String, GatewayError> {
        if email.trim().is_empty() {
            return Err(GatewayError::BadRequest("empty email".into()));
        }
        let token = generate_token();
        self.db
            .insert(token.as_bytes(), email.as_bytes())
            .map_err(|e| GatewayError::BadRequest(format!("writing user: {e}")))?;
        self.db
            .flush()
            .map_err(|e| GatewayError::BadRequest(format!("flushing user store: {e}")))?;
        Ok(token)
    }

    /// `GetEmail(token) → email | ""`. Missing key returns an empty string,
    /// not an error.
    pub fn get_email(&self, token: &str) -> String {
        self.db
            .get(token.as_bytes())
            .ok()
            .flatten()
            .map(|v| String::from_utf8_lossy(&v).into_owned())
            .unwrap_or_default()
    }

    /// `GetTokenByEmail(email) → token | ""`. Full scan in key order; on
    /// multiple matches, returns the lexicographically smallest token
    /// (`sled` iterates keys in byte order already, so the first match
    /// found is the answer).
    pub fn get_token_by_email(&self, email: &str) -> String {
        for item in self.db.iter() {
            if let Ok((k, v)) = item {
                if v.as_ref() == email.as_bytes() {
                    return String::from_utf8_lossy(&k).into_owned();
                }
            }
        }
        String::new()
    }

    /// `DeleteUserByToken(token)`. Idempotent — deleting a missing key
    /// succeeds silently.
    pub fn delete_user_by_token(&self, token: &str) -> Result<(), GatewayError> {
        self.db
            .remove(token.as_bytes())
            .map_err(|e| GatewayError::BadRequest(format!("deleting user: {e}")))?;
        self.db
            .flush()
            .map_err(|e| GatewayError::BadRequest(format!("flushing user store: {e}")))?;
        Ok(())
    }

    /// `ListUsers(writer)`: streams `email<TAB>token` lines in key order,
    /// column-aligned the way the original's `text/tabwriter` did.
    pub fn list_users(&self, mut writer: impl Write) -> Result<(), GatewayError> {
        let mut rows = Vec::new();
        for item in self.db.iter() {
            if let Ok((k, v)) = item {
                let token = String::from_utf8_lossy(&k).into_owned();
                let email = String::from_utf8_lossy(&v).into_owned();
                rows.push((email, token));
            }
        }
        let width = rows.iter().map(|(email, _)| email.len()).max().unwrap_or(0);
        for (email, token) in rows {
            writeln!(writer, "{email:width$}\t{token}").map_err(|e| {
                GatewayError::BadRequest(format!("writing user list: {e}"))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, UserStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = UserStore::open(dir.path().join("users.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn create_then_get_email_round_trips() {
        let (_dir, store) = open_temp();
        let token = store.create_user("a@b.com").unwrap();
        assert_eq!(store.get_email(&token), "a@b.com");
    }

    #[test]
    fn missing_token_returns_empty_string() {
        let (_dir, store) = open_temp();
        assert_eq!(store.get_email("nonexistent"), "");
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, store) = open_temp();
        let token = store.create_user("a@b.com").unwrap();
        store.delete_user_by_token(&token).unwrap();
        assert_eq!(store.get_email(&token), "");
        // Deleting again must not error.
        store.delete_user_by_token(&token).unwrap();
    }

    #[test]
    fn empty_email_rejected() {
        let (_dir, store) = open_temp();
        assert!(store.create_user("").is_err());
        assert!(store.create_user("   ").is_err());
    }

    #[test]
    fn token_is_44_char_url_safe_base64() {
        let (_dir, store) = open_temp();
        let token = store.create_user("a@b.com").unwrap();
        assert_eq!(token.len(), 44);
        assert!(base64::engine::general_purpose::URL_SAFE
            .decode(&token)
            .is_ok());
    }

    #[test]
    fn get_token_by_email_finds_smallest_on_tie() {
        let (_dir, store) = open_temp();
        // Insert directly so we control both tokens mapping to one email.
        store.db.insert(b"bbbb", b"dup@x.com").unwrap();
        store.db.insert(b"aaaa", b"dup@x.com").unwrap();
        assert_eq!(store.get_token_by_email("dup@x.com"), "aaaa");
    }
}
