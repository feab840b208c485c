use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};

use docs_auth::auth::{
    Action, ApplyOutcome, HttpAuthApi, LoginOutcome, SqliteTokenStore, TokenLifecycleManager,
};
use docs_auth::config::{Command, Config};
use docs_auth::render::TracingRenderer;
use docs_auth::ui::InMemoryDocsUi;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let (config, command) = Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("docs-auth starting against {}", config.base_url);
    tracing::debug!("Token store: {}", config.store_path.display());

    let api = Arc::new(HttpAuthApi::new(
        &config.base_url,
        config.http_request_timeout,
    )?);
    let store = Arc::new(SqliteTokenStore::open(&config.store_path)?);
    let ui = Arc::new(InMemoryDocsUi::new());
    let manager = TokenLifecycleManager::from_config(
        &config,
        api,
        store,
        ui.clone(),
        Arc::new(TracingRenderer),
    );

    match command.unwrap_or(Command::Watch) {
        Command::Status => {
            let status = manager.check_status().await;
            println!("{}", status);
        }
        Command::Login => {
            report_login(manager.login().await, &ui)?;
        }
        Command::DevToken { term } => {
            report_login(manager.fetch_dev_token(term.into()).await, &ui)?;
        }
        Command::Apply => match manager.apply_if_available().await {
            Some(ApplyOutcome::Applied { .. }) => print_authorization(&ui),
            Some(ApplyOutcome::Aborted { stage, missing }) => {
                anyhow::bail!("Token not applied ({:?}): {} missing", stage, missing)
            }
            None => anyhow::bail!("No token stored, run `docs-auth login` first"),
        },
        Command::Watch => watch(&manager).await,
    }

    Ok(())
}

/// Print the outcome of a login, failing the process if it did not succeed
fn report_login(outcome: LoginOutcome, ui: &InMemoryDocsUi) -> Result<()> {
    match outcome {
        LoginOutcome::Success { route, email } => {
            println!(
                "Logged in via {:?} as {}",
                route,
                email.as_deref().unwrap_or(docs_auth::auth::UNKNOWN_USER)
            );
            print_authorization(ui);
            Ok(())
        }
        LoginOutcome::Failed { message } => anyhow::bail!("Login failed: {}", message),
        LoginOutcome::AlreadyInProgress => anyhow::bail!("Login already in progress"),
    }
}

fn print_authorization(ui: &InMemoryDocsUi) {
    if let Some(value) = ui.authorized_value() {
        println!("Authorization: {}", value);
    }
}

/// Run the lifecycle loop, taking actions from stdin until `quit` or a signal
async fn watch(manager: &TokenLifecycleManager) {
    let (action_tx, action_rx) = mpsc::channel(16);
    let (quit_tx, quit_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut quit_tx = Some(quit_tx);

        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line == "quit" || line == "q" {
                if let Some(tx) = quit_tx.take() {
                    let _ = tx.send(());
                }
                break;
            }
            match parse_action(line) {
                Some(action) => {
                    if action_tx.send(action).await.is_err() {
                        break;
                    }
                }
                None if line.is_empty() => {}
                None => eprintln!("Unknown command: {} (apply, login, dialog, status, quit)", line),
            }
        }
    });

    println!("Commands: apply, login, dialog, status, quit");

    manager
        .run(action_rx, async {
            tokio::select! {
                _ = shutdown_signal() => {},
                _ = quit_rx => {
                    tracing::info!("Quit requested");
                },
            }
        })
        .await;
}

/// Map a stdin command to a lifecycle action
fn parse_action(line: &str) -> Option<Action> {
    match line.to_lowercase().as_str() {
        "apply" | "a" => Some(Action::Apply),
        "login" | "l" => Some(Action::Relogin),
        "dialog" | "d" => Some(Action::DialogOpened),
        "status" | "s" => Some(Action::Refresh),
        _ => None,
    }
}

/// Handle shutdown signal
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, shutting down...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, shutting down...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action() {
        assert_eq!(parse_action("apply"), Some(Action::Apply));
        assert_eq!(parse_action("LOGIN"), Some(Action::Relogin));
        assert_eq!(parse_action("d"), Some(Action::DialogOpened));
        assert_eq!(parse_action("status"), Some(Action::Refresh));
        assert_eq!(parse_action("logout"), None);
    }
}
