mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use marquee_bus::{
    AccessLevel, AuthService, BusRegistry, Event, IdentityView, LoginOutcome, LogoutOutcome,
    NotificationCenter, Topic,
};
use marquee_core::error::log_error;
use marquee_core::logging::init_logging;
use marquee_core::{CoreConfig, FileStore, KeyValueStore, MemoryStore, RosterStore, SessionStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::commands::{parse_command, Command, HELP};

const DEFAULT_CONFIG: &str = "marquee.json";

struct Fragments {
    auth: AuthService,
    profile: IdentityView,
    toasts: NotificationCenter,
}

fn shared_backend(config: &CoreConfig) -> Result<Arc<dyn KeyValueStore>> {
    Ok(match &config.storage.root_dir {
        Some(dir) => Arc::new(
            FileStore::new(dir.clone())
                .with_context(|| format!("opening shared store at {}", dir.display()))?,
        ),
        None => Arc::new(MemoryStore::new()),
    })
}

fn print_profile(profile: &IdentityView) {
    let Some(user) = profile.current_user() else {
        println!("You are currently logged out.");
        return;
    };
    println!("Welcome back, {}! Your role is: {}", user.user_id, user.role);
    println!("Permissions: {}", user.permissions);
    match AccessLevel::for_user(&user) {
        AccessLevel::Admin => println!("Admin dashboard available (try `roster`)."),
        AccessLevel::Manager => println!("You have manager privileges for department reports."),
        AccessLevel::Customer => {
            println!("You have customer access to book tickets and view your bookings.")
        }
    }
}

/// Returns `false` when the shell should exit.
fn run_command(fragments: &Fragments, command: Command) -> bool {
    match command {
        Command::Login { user_id, role } => {
            if fragments.profile.is_logged_in() {
                println!("already logged in; logout first");
                return true;
            }
            match fragments.auth.login(&user_id, role) {
                Ok(LoginOutcome::LoggedIn(user)) => {
                    info!(user_id = %user.user_id, "shell login complete")
                }
                Ok(LoginOutcome::Rejected) => {}
                Err(e) => {
                    log_error("login", &e);
                    println!("login failed: {e}");
                }
            }
        }
        Command::Logout => match fragments.auth.logout() {
            Ok(LogoutOutcome::NoSession) => info!("shell logout without session"),
            Ok(LogoutOutcome::LoggedOut(_)) => {}
            Err(e) => {
                log_error("logout", &e);
                println!("logout failed: {e}");
            }
        },
        Command::WhoAmI => print_profile(&fragments.profile),
        Command::Roster => {
            if !fragments.profile.has_permission("manage_users") {
                println!("the active user list needs the manage_users permission");
                return true;
            }
            for user in fragments.profile.active_users() {
                println!(
                    "User: {} | Role: {} | Permissions: {}",
                    user.user_id, user.role, user.permissions
                );
            }
        }
        Command::Toasts => {
            let toasts = fragments.toasts.toasts();
            if toasts.is_empty() {
                println!("no notifications");
            }
            for (index, toast) in toasts.iter().enumerate() {
                println!("{}. [{:?}] {}", index + 1, toast.severity, toast.message);
            }
        }
        Command::Dismiss(index) => match fragments.toasts.toasts().get(index - 1) {
            Some(toast) => {
                fragments.toasts.dismiss(toast.id);
            }
            None => println!("no notification #{index}"),
        },
        Command::Help => println!("{HELP}"),
        Command::Quit => return false,
    }
    true
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = CoreConfig::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    init_logging(&config.logging.filter);
    info!(config = %config_path.display(), "marquee shell starting");

    let bus = BusRegistry::process().bus();
    let session_backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let session = SessionStore::new(session_backend, config.storage.session_key.clone());
    let roster = RosterStore::new(shared_backend(&config)?, config.storage.roster_key.clone());

    let fragments = Fragments {
        toasts: NotificationCenter::attach(&bus, config.notifications.dismiss_after()),
        profile: IdentityView::mount(&bus, &session, &roster),
        auth: AuthService::new(bus.clone(), session, roster),
    };
    let echo = bus.subscribe(Topic::Notification, |event| {
        if let Event::Notification(notice) = event {
            println!("> [{:?}] {}", notice.severity, notice.message);
        }
    });

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        if !run_command(&fragments, command) {
            break;
        }
    }

    echo.unsubscribe();
    fragments.profile.unmount();
    fragments.toasts.detach();
    info!("marquee shell stopped");
    Ok(())
}
