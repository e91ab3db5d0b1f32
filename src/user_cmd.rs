//! Shared `user` command logic (`original_source/user.go: runUserCommand`),
//! invoked identically by the CLI `user` subcommand and by the Admin IPC
//! (C2) when the server owns the store.

use std::io::Write;

use crate::cli::UserArgs;
use crate::error::GatewayError;
use crate::user_store::UserStore;

/// `--list` alone prints all users; otherwise `--email` is required;
/// `--delete` removes the user; `--update` rotates the token (delete then
/// create); neither flag is a read-only lookup. Message text and branch
/// ordering follow `user.go:32-84` exactly, since the Admin IPC (C2)
/// replays this stdout back to the CLI verbatim (spec.md §4.2).
pub fn run_user_command(
    store: &UserStore,
    args: &UserArgs,
    mut writer: impl Write,
) -> Result<(), GatewayError> {
    if args.list {
        return store.list_users(writer);
    }

    let email = args
        .email
        .as_deref()
        .ok_or_else(|| GatewayError::BadRequest("--email is required unless --list is given".into()))?;

    if args.delete {
        let token = store.get_token_by_email(email);
        if token.is_empty() {
            writeln!(writer, "user not found").map_err(|e| GatewayError::BadRequest(e.to_string()))?;
        } else {
            store.delete_user_by_token(&token)?;
            writeln!(writer, "{email} deleted").map_err(|e| GatewayError::BadRequest(e.to_string()))?;
        }
        return Ok(());
    }

    if args.update {
        let existing = store.get_token_by_email(email);
        if !existing.is_empty() {
            store.delete_user_by_token(&existing)?;
        }
        let token = store.create_user(email)?;
        writeln!(writer, "{email} {token}").map_err(|e| GatewayError::BadRequest(e.to_string()))?;
        return Ok(());
    }

    // Read-only lookup (`user.go:73-84`): does not create on a miss.
    let token = store.get_token_by_email(email);
    if token.is_empty() {
        writeln!(writer, "{email} not found").map_err(|e| GatewayError::BadRequest(e.to_string()))?;
    } else {
        writeln!(writer, "{email} {token}").map_err(|e| GatewayError::BadRequest(e.to_string()))?;
    }
    Ok(())
}

/// Parses an admin-IPC argv (`["user", "--email", "a@b", "--update"]`-style,
/// minus the leading subcommand name) into `UserArgs`, reusing the same
/// `clap` definition the CLI uses.
pub fn parse_argv(argv: &[String]) -> Result<UserArgs, GatewayError> {
    use clap::Parser;

    #[derive(clap::Parser)]
    #[command(name = "user")]
    struct Wrapper {
        #[command(flatten)]
        args: UserArgs,
    }

    let mut full = vec!["user".to_string()];
    full.extend_from_slice(argv);
    Wrapper::try_parse_from(full)
        .map(|w| w.args)
        .map_err(|e| GatewayError::BadRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user_store::UserStore;

    fn open_temp() -> (tempfile::TempDir, UserStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = UserStore::open(dir.path().join("users.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn read_only_lookup_does_not_create() {
        let (_dir, store) = open_temp();
        let args = UserArgs {
            email: Some("a@b.com".into()),
            ..Default::default()
        };
        let mut out = Vec::new();
        run_user_command(&store, &args, &mut out).unwrap();
        assert!(store.get_token_by_email("a@b.com").is_empty());
        assert_eq!(String::from_utf8(out).unwrap(), "a@b.com not found\n");
    }

    #[test]
    fn read_only_lookup_finds_existing_token() {
        let (_dir, store) = open_temp();
        let token = store.create_user("a@b.com").unwrap();
        let args = UserArgs {
            email: Some("a@b.com".into()),
            ..Default::default()
        };
        let mut out = Vec::new();
        run_user_command(&store, &args, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), format!("a@b.com {token}\n"));
    }

    #[test]
    fn update_rotates_token() {
        let (_dir, store) = open_temp();
        let first = store.create_user("a@b.com").unwrap();
        let args = UserArgs {
            email: Some("a@b.com".into()),
            update: true,
            ..Default::default()
        };
        let mut out = Vec::new();
        run_user_command(&store, &args, &mut out).unwrap();
        let second = store.get_token_by_email("a@b.com");
        assert_ne!(first, second);
        assert_eq!(store.get_email(&first), "");
    }

    #[test]
    fn delete_removes_user() {
        let (_dir, store) = open_temp();
        let token = store.create_user("a@b.com").unwrap();
        let args = UserArgs {
            email: Some("a@b.com".into()),
            delete: true,
            ..Default::default()
        };
        let mut out = Vec::new();
        run_user_command(&store, &args, &mut out).unwrap();
        assert_eq!(store.get_email(&token), "");
        assert_eq!(String::from_utf8(out).unwrap(), "a@b.com deleted\n");
    }

    #[test]
    fn delete_missing_user_reports_not_found() {
        let (_dir, store) = open_temp();
        let args = UserArgs {
            email: Some("a@b.com".into()),
            delete: true,
            ..Default::default()
        };
        let mut out = Vec::new();
        run_user_command(&store, &args, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "user not found\n");
    }

    #[test]
    fn list_without_email_succeeds() {
        let (_dir, store) = open_temp();
        store.create_user("a@b.com").unwrap();
        let args = UserArgs {
            list: true,
            ..Default::default()
        };
        let mut out = Vec::new();
        run_user_command(&store, &args, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("a@b.com"));
    }

    #[test]
    fn missing_email_without_list_errors() {
        let (_dir, store) = open_temp();
        let args = UserArgs::default();
        let mut out = Vec::new();
        assert!(run_user_command(&store, &args, &mut out).is_err());
    }
}
