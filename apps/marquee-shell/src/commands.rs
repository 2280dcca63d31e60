use marquee_core::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { user_id: String, role: Role },
    Logout,
    WhoAmI,
    Roster,
    Toasts,
    /// 1-based position in the toast list.
    Dismiss(usize),
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  login <user-id> [customer|admin|manager]
  logout
  whoami
  roster
  toasts
  dismiss <n>
  help
  quit";

/// Parses one input line. `Ok(None)` for a blank line.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let command = match head.to_ascii_lowercase().as_str() {
        "login" => {
            // An empty id is passed through; the login flow reports it.
            let user_id = words.next().unwrap_or_default().to_string();
            let role = match words.next() {
                Some(text) => text.parse::<Role>().map_err(|e| e.to_string())?,
                None => Role::Customer,
            };
            Command::Login { user_id, role }
        }
        "logout" => Command::Logout,
        "whoami" => Command::WhoAmI,
        "roster" => Command::Roster,
        "toasts" => Command::Toasts,
        "dismiss" => {
            let index = words
                .next()
                .ok_or_else(|| "dismiss needs a toast number".to_string())?
                .parse::<usize>()
                .map_err(|e| format!("bad toast number: {e}"))?;
            if index == 0 {
                return Err("toast numbers start at 1".to_string());
            }
            Command::Dismiss(index)
        }
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command `{other}`")),
    };
    Ok(Some(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_defaults_to_customer() {
        assert_eq!(
            parse_command("login user1").unwrap(),
            Some(Command::Login {
                user_id: "user1".to_string(),
                role: Role::Customer
            })
        );
    }

    #[test]
    fn login_with_role() {
        assert_eq!(
            parse_command("LOGIN user1 Admin").unwrap(),
            Some(Command::Login {
                user_id: "user1".to_string(),
                role: Role::Admin
            })
        );
        assert!(parse_command("login user1 root").is_err());
    }

    #[test]
    fn bare_login_keeps_empty_id() {
        assert_eq!(
            parse_command("login").unwrap(),
            Some(Command::Login {
                user_id: String::new(),
                role: Role::Customer
            })
        );
    }

    #[test]
    fn dismiss_requires_positive_number() {
        assert_eq!(parse_command("dismiss 2").unwrap(), Some(Command::Dismiss(2)));
        assert!(parse_command("dismiss").is_err());
        assert!(parse_command("dismiss 0").is_err());
        assert!(parse_command("dismiss x").is_err());
    }

    #[test]
    fn blank_and_unknown_lines() {
        assert_eq!(parse_command("   ").unwrap(), None);
        assert!(parse_command("dance").is_err());
    }
}
