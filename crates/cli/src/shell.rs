//! Interactive back-office shell
//!
//! Every line typed counts as activity for the idle timer. Idle warnings and
//! session expiry arrive as session events and are printed between prompts.

use anyhow::Result;
use hotelier_session::{ActivitySignal, BackOffice, Route, SessionEvent};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::commands::print_json;

const HELP: &str = "\
commands:
  rooms | guests | bookings | tariffs | financial | dashboard
  whoami     show the logged-in user
  stay       keep the session alive after an idle warning
  logout     end the session
  quit       leave the shell (the session stays persisted)";

pub async fn run(office: &BackOffice) -> Result<()> {
    let session = office.session();
    let mut events = session.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{HELP}");
    prompt()?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                session.record_activity(ActivitySignal::KeyPress);
                if !handle_line(office, line.trim()).await? {
                    break;
                }
                prompt()?;
            }
            event = events.recv() => match event {
                Ok(SessionEvent::IdleWarning { remaining }) => {
                    println!(
                        "\nYou will be logged out in {}s due to inactivity. Type `stay` to continue or `logout`.",
                        remaining.as_secs()
                    );
                    prompt()?;
                }
                Ok(SessionEvent::SessionExpired { reason }) => {
                    println!("\nSession ended: {reason}");
                }
                Ok(SessionEvent::Redirect(Route::Login)) => {
                    println!("Log in again with `hotelier login`.");
                    break;
                }
                Ok(event) => debug!(?event, "session event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed session events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}

/// Run one shell command; returns `false` to leave the shell
async fn handle_line(office: &BackOffice, line: &str) -> Result<bool> {
    let api = office.api();
    let outcome = match line {
        "" => Ok(()),
        "help" => {
            println!("{HELP}");
            Ok(())
        }
        "quit" | "exit" => return Ok(false),
        "stay" => {
            if !office.session().stay_logged_in() {
                println!("No idle warning pending");
            }
            Ok(())
        }
        "logout" => {
            // The redirect event ends the loop
            office.session().logout();
            Ok(())
        }
        "whoami" => print_json(&office.session().state().current_user),
        "rooms" => api.list_rooms().await.map_err(Into::into).and_then(|rooms| print_json(&rooms)),
        "guests" => api.list_guests().await.map_err(Into::into).and_then(|guests| print_json(&guests)),
        "bookings" => api
            .list_bookings()
            .await
            .map_err(Into::into)
            .and_then(|bookings| print_json(&bookings)),
        "tariffs" => api
            .list_tariffs(None)
            .await
            .map_err(Into::into)
            .and_then(|tariffs| print_json(&tariffs)),
        "financial" => api
            .list_transactions()
            .await
            .map_err(Into::into)
            .and_then(|transactions| print_json(&transactions)),
        "dashboard" => api
            .dashboard_stats()
            .await
            .map_err(Into::into)
            .and_then(|stats| print_json(&stats)),
        other => {
            println!("Unknown command `{other}`; type `help`");
            Ok(())
        }
    };

    // Resource errors are shown and the shell carries on
    if let Err(err) = outcome {
        println!("error: {err:#}");
    }
    Ok(true)
}

fn prompt() -> Result<()> {
    print!("hotelier> ");
    std::io::stdout().flush()?;
    Ok(())
}
