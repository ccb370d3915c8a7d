use anyhow::{Context, Result};

use crate::models::{format_money, EntryKind, Person};
use crate::session::{LedgerSession, Outcome, SessionEvent};

/// Answer `--help` and `--version` before anything is opened.
pub(crate) fn handle_info(args: &[String]) -> bool {
    match args.first().map(String::as_str) {
        Some("--help" | "-h" | "help") => {
            print_usage();
            true
        }
        Some("--version" | "-V" | "version") => {
            println!("tally {}", env!("CARGO_PKG_VERSION"));
            true
        }
        _ => false,
    }
}

pub(crate) async fn as_cli(args: &[String], mut session: LedgerSession) -> Result<()> {
    let Some(command) = args.first() else {
        print_usage();
        return Ok(());
    };
    match command.as_str() {
        "people" | "p" => cli_people(&mut session).await,
        "history" => cli_history(&args[1..], &mut session).await,
        "add" => cli_add(&args[1..], &mut session).await,
        "record" | "r" => cli_record(&args[1..], &mut session).await,
        "delete" => cli_delete(&args[1..], &mut session).await,
        other => {
            print_usage();
            anyhow::bail!("Unknown command: {other}");
        }
    }
}

fn print_usage() {
    println!("Tally - who owes whom, per person");
    println!();
    println!("Usage: tally [options] [command]");
    println!();
    println!("Commands:");
    println!("  (none)                                Launch interactive TUI");
    println!("  people                                List people with their balances");
    println!("  history <name|id>                     List one person's transactions");
    println!("  add <name>                            Add a person");
    println!("  record <name|id> <income|due> <amt>   Record a transaction");
    println!("  delete <name|id>                      Delete a person and their transactions");
    println!();
    println!("Options:");
    println!("  --memory                              Use a throwaway in-memory ledger");
    println!("  --config <path>                       Read settings from this YAML file");
    println!("  --help, -h                            Show this help");
    println!("  --version, -V                         Show version");
}

async fn connect(session: &mut LedgerSession) -> Result<()> {
    session
        .ready()
        .await
        .context("Could not sign in to the ledger")
}

fn lookup(session: &LedgerSession, key: &str) -> Result<Person> {
    session
        .find_person(key)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("No person matches '{key}'"))
}

/// Wait for the mutation just issued and turn a failure into an error.
async fn finish(session: &mut LedgerSession) -> Result<Outcome> {
    let outcome = session.settle().await;
    if outcome.is_failure() {
        anyhow::bail!("{outcome}");
    }
    Ok(outcome)
}

async fn cli_people(session: &mut LedgerSession) -> Result<()> {
    connect(session).await?;
    let people = session.people();
    if people.is_empty() {
        println!("No people");
        return Ok(());
    }

    println!("{:<24} {:>12} {:>12}  Balance", "Name", "Income", "Due");
    println!("{}", "─".repeat(70));
    for person in people {
        println!(
            "{:<24} {:>12} {:>12}  {}",
            person.name,
            format_money(person.income),
            format_money(person.due),
            person.balance_label(),
        );
    }
    Ok(())
}

async fn cli_history(args: &[String], session: &mut LedgerSession) -> Result<()> {
    let Some(key) = args.first() else {
        anyhow::bail!("Usage: tally history <name|id>");
    };
    connect(session).await?;
    let person = lookup(session, key)?;
    session.toggle_history(&person.id)?;

    // The first snapshot of the new subscription carries the full list.
    while !matches!(session.next_event().await, SessionEvent::HistoryUpdated) {}

    println!("{} ({})", person.name, person.balance_label());
    println!("{}", "─".repeat(40));
    let entries = session.history();
    if entries.is_empty() {
        println!("  No transactions");
    }
    for txn in entries {
        println!("  {:<21} {:<8} {}", txn.when_label(), txn.kind, txn.amount_label());
    }
    Ok(())
}

async fn cli_add(args: &[String], session: &mut LedgerSession) -> Result<()> {
    let name = args.join(" ");
    if name.trim().is_empty() {
        anyhow::bail!("Usage: tally add <name>");
    }
    connect(session).await?;
    session.add_person(&name)?;
    if let Outcome::PersonAdded { person_id, name } = finish(session).await? {
        println!("Added {name} ({person_id})");
    }
    Ok(())
}

async fn cli_record(args: &[String], session: &mut LedgerSession) -> Result<()> {
    let [key, kind, amount] = args else {
        anyhow::bail!("Usage: tally record <name|id> <income|due> <amount>");
    };
    let kind = EntryKind::parse(kind)
        .ok_or_else(|| anyhow::anyhow!("Type must be 'income' or 'due', got '{kind}'"))?;
    connect(session).await?;
    let person = lookup(session, key)?;
    session.open_transaction_modal(&person.id, kind)?;
    session.confirm_transaction(amount)?;
    let outcome = finish(session).await?;
    match &outcome {
        Outcome::Recorded { recorded, .. } => {
            println!("{outcome} (transaction {})", recorded.transaction_id);
        }
        _ => println!("{outcome}"),
    }
    Ok(())
}

async fn cli_delete(args: &[String], session: &mut LedgerSession) -> Result<()> {
    let Some(key) = args.first() else {
        anyhow::bail!("Usage: tally delete <name|id>");
    };
    connect(session).await?;
    let person = lookup(session, key)?;
    session.delete_person(&person.id)?;
    let outcome = finish(session).await?;
    println!("{outcome}");
    Ok(())
}
