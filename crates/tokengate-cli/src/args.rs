use anyhow::{bail, Result};

pub const USAGE: &str = "\
Usage: tokengate [COMMAND]

Commands:
  status                     Show whether a valid session exists (default)
  login [USERNAME] [--remember]
                             Sign in; --remember keeps the password in the keychain
  logout [--forget]          Sign out; --forget also drops the remembered password
  refresh                    Exchange the refresh token for a new access token
  profile                    Fetch the full user profile from the backend
  open PATH                  Check whether navigating to PATH is allowed
  help                       Show this message

Environment:
  TOKENGATE_AUTH_URL           Backend base URL (demo backend when unset)
  TOKENGATE_USERNAME           Default login username
  TOKENGATE_PASSWORD           Login password (skips the prompt)
  TOKENGATE_STORE              file | keyring | memory
  TOKENGATE_STORE_PASSPHRASE   Encrypt the file store with this passphrase
  RUST_LOG                     Log filter (default: warn)
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Login {
        username: Option<String>,
        remember: bool,
    },
    Logout {
        forget: bool,
    },
    Refresh,
    Profile,
    Open {
        path: String,
    },
    Help,
}

/// Parse arguments, excluding the program name.
pub fn parse(args: &[String]) -> Result<Command> {
    let Some((command, rest)) = args.split_first() else {
        return Ok(Command::Status);
    };

    let (flags, positional): (Vec<&String>, Vec<&String>) =
        rest.iter().partition(|a| a.starts_with("--"));
    let has_flag = |name: &str| flags.iter().any(|f| f.as_str() == name);

    let allowed_flags: &[&str] = match command.as_str() {
        "login" => &["--remember"],
        "logout" => &["--forget"],
        _ => &[],
    };
    if let Some(unknown) = flags.iter().find(|f| !allowed_flags.contains(&f.as_str())) {
        bail!("Unknown option for {}: {}", command, unknown);
    }

    let command = match command.as_str() {
        "status" => Command::Status,
        "login" => Command::Login {
            username: positional.first().map(|s| s.to_string()),
            remember: has_flag("--remember"),
        },
        "logout" => Command::Logout {
            forget: has_flag("--forget"),
        },
        "refresh" => Command::Refresh,
        "profile" => Command::Profile,
        "open" => match positional.first() {
            Some(path) => Command::Open {
                path: path.to_string(),
            },
            None => bail!("open requires a PATH"),
        },
        "help" | "-h" | "--help" => Command::Help,
        other => bail!("Unknown command: {}", other),
    };
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_arguments_is_status() {
        assert_eq!(parse(&[]).unwrap(), Command::Status);
    }

    #[test]
    fn test_login_with_username_and_remember() {
        assert_eq!(
            parse(&args(&["login", "admin@example.com", "--remember"])).unwrap(),
            Command::Login {
                username: Some("admin@example.com".to_string()),
                remember: true,
            }
        );
        assert_eq!(
            parse(&args(&["login"])).unwrap(),
            Command::Login {
                username: None,
                remember: false,
            }
        );
    }

    #[test]
    fn test_logout_forget() {
        assert_eq!(
            parse(&args(&["logout", "--forget"])).unwrap(),
            Command::Logout { forget: true }
        );
    }

    #[test]
    fn test_open_requires_path() {
        assert_eq!(
            parse(&args(&["open", "/dashboard"])).unwrap(),
            Command::Open {
                path: "/dashboard".to_string()
            }
        );
        assert!(parse(&args(&["open"])).is_err());
    }

    #[test]
    fn test_unknown_command_and_flag() {
        assert!(parse(&args(&["frobnicate"])).is_err());
        assert!(parse(&args(&["refresh", "--remember"])).is_err());
    }

    #[test]
    fn test_help_aliases() {
        for a in ["help", "-h", "--help"] {
            assert_eq!(parse(&args(&[a])).unwrap(), Command::Help);
        }
    }
}
