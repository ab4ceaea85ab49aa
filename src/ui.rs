// UI layer: interactive prompts and menus built on `dialoguer`, spinners
// from `indicatif` while requests are in flight. All API work is delegated
// to `api`, `verification` and `heartbeat`.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};

use crate::api::{created_post_id, DmActivity, MoltbookClient, PostSummary, DEFAULT_SUBMOLT};
use crate::cancel::CancelToken;
use crate::config::AppConfig;
use crate::credentials::CredentialStore;
use crate::error::Error;
use crate::heartbeat::{self, HeartbeatReport};
use crate::verification::{AgentState, ClaimStatus, PollOutcome, Sequencer};

const POST_URL_BASE: &str = "https://moltbook.com/posts";

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

fn banner(title: &str, body: &str) {
    println!();
    println!("{}", format!("== {} ==", title).bold());
    println!("{}", body);
    println!();
}

fn pause(prompt: &str) -> Result<()> {
    let _: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;
    Ok(())
}

/// Print the claim status; returns whether the agent is verified.
fn report_status(status: &ClaimStatus) -> bool {
    match status {
        ClaimStatus::Claimed => {
            println!("{}", "Bot is verified and active!".green());
            true
        }
        ClaimStatus::PendingClaim => {
            println!("{}", "Still waiting for Twitter verification...".yellow());
            false
        }
        ClaimStatus::Unknown(s) => {
            println!("{}", format!("Unknown status: {}", s).red());
            false
        }
    }
}

/// Print why the API refused a status check. The status and body are
/// shown as returned.
fn report_rejection(err: &Error) {
    if err.is_auth_failure() {
        println!(
            "{}",
            format!("Stored API key was rejected ({}). Re-register to get a new key.", err).red()
        );
    } else {
        println!("{}", format!("Status check failed ({}).", err).red());
    }
}

/// Status check where an API refusal is reported and turned into `None`.
/// Network and local errors still propagate.
fn status_or_rejected(seq: &mut Sequencer) -> Result<Option<ClaimStatus>> {
    match seq.check_status() {
        Ok(status) => Ok(Some(status)),
        Err(e @ Error::Http { .. }) => {
            report_rejection(&e);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// How the stored key looks to the API.
pub enum StoredKey {
    Missing,
    Verified(MoltbookClient),
    Unverified(ClaimStatus),
    /// The status check came back with an HTTP error.
    Rejected(Error),
}

/// Check the stored (or environment) key without printing anything.
pub fn inspect_stored(config: &AppConfig) -> Result<StoredKey> {
    let store = CredentialStore::from_config(config);
    let mut seq = Sequencer::new(config.client.clone(), store)?;
    if seq.state() == AgentState::NoCredentials {
        return Ok(StoredKey::Missing);
    }

    match seq.check_status() {
        Ok(ClaimStatus::Claimed) => Ok(match seq.into_client() {
            Some(client) => StoredKey::Verified(client),
            None => StoredKey::Missing,
        }),
        Ok(status) => Ok(StoredKey::Unverified(status)),
        Err(e @ Error::Http { .. }) => Ok(StoredKey::Rejected(e)),
        Err(e) => Err(e.into()),
    }
}

/// `moltbook status`: any failure aborts.
pub fn check_stored(config: &AppConfig) -> Result<Option<MoltbookClient>> {
    let store = CredentialStore::from_config(config);
    let mut seq = Sequencer::new(config.client.clone(), store)?;
    if seq.state() == AgentState::NoCredentials {
        print_missing_credentials();
        return Ok(None);
    }

    let status = seq.check_status().context("Checking claim status")?;
    report_status(&status);
    Ok(if status.is_claimed() {
        seq.into_client()
    } else {
        None
    })
}

/// The client for a stored key that is already verified. Anything else
/// (no key, unclaimed, rejected key) gives `None` so the caller can run
/// setup.
pub fn resume_session(config: &AppConfig) -> Result<Option<MoltbookClient>> {
    match inspect_stored(config)? {
        StoredKey::Missing => Ok(None),
        StoredKey::Verified(client) => {
            report_status(&ClaimStatus::Claimed);
            Ok(Some(client))
        }
        StoredKey::Unverified(status) => {
            report_status(&status);
            Ok(None)
        }
        StoredKey::Rejected(e) => {
            report_rejection(&e);
            Ok(None)
        }
    }
}

fn print_missing_credentials() {
    println!("{}", "No credentials found. Run: moltbook setup".red());
}

/// Client for the stored (or environment) key, without a status check.
pub fn stored_client(config: &AppConfig) -> Result<Option<MoltbookClient>> {
    match CredentialStore::from_config(config).load()? {
        Some(creds) => Ok(Some(MoltbookClient::new(&config.client, Some(creds.api_key))?)),
        None => {
            print_missing_credentials();
            Ok(None)
        }
    }
}

/// Full setup flow: reuse or register, wait for the claim, offer a first
/// post. Returns a client only once the agent is verified.
pub fn run_setup(config: &AppConfig) -> Result<Option<MoltbookClient>> {
    banner(
        "Moltbook Bot Setup",
        "This will help you:\n  1. Register your bot\n  2. Verify ownership\n  3. Make your first post\n  4. Start participating",
    );

    let store = CredentialStore::from_config(config);
    let agent_name = store
        .load()?
        .and_then(|c| c.agent_name)
        .unwrap_or_else(|| "unknown".to_string());
    let mut seq = Sequencer::new(config.client.clone(), store)?;

    if seq.state() == AgentState::RegisteredUnverified {
        println!(
            "{}",
            format!("Found existing credentials for: {}", agent_name).green()
        );
        if Confirm::new()
            .with_prompt("Use existing credentials?")
            .default(true)
            .interact()?
        {
            // a rejected key skips the retry and goes straight to registration
            if let Some(status) = status_or_rejected(&mut seq)? {
                if report_status(&status) {
                    return Ok(seq.into_client());
                }
                println!("{}", "Waiting for verification...".yellow());
                pause("Press Enter after verifying on Twitter")?;
                if let Some(status) = status_or_rejected(&mut seq)? {
                    if report_status(&status) {
                        return Ok(seq.into_client());
                    }
                }
            }
        }
    }

    if !register(&mut seq)? {
        return Ok(None);
    }

    let pb = spinner("Checking verification status...")?;
    let max = config.poll.max_attempts;
    let interval = config.poll.interval.as_secs();
    let outcome = seq.await_verification(config.poll, &CancelToken::new(), |attempt, status| {
        pb.set_message(format!(
            "Status: {}. Checking again in {} seconds... ({}/{})",
            status, interval, attempt, max
        ));
    });
    pb.finish_and_clear();

    match outcome? {
        PollOutcome::Verified { .. } => {
            println!("{}", "Bot is verified and active!".green());
        }
        PollOutcome::TimedOut { .. } => {
            println!(
                "{}",
                "Verification timed out. Run this again after verifying.".red()
            );
            return Ok(None);
        }
        PollOutcome::Cancelled { .. } => {
            println!("{}", "Verification cancelled.".yellow());
            return Ok(None);
        }
    }

    let client = match seq.into_client() {
        Some(c) => c,
        None => return Ok(None),
    };

    if Confirm::new()
        .with_prompt("Make your first post?")
        .default(true)
        .interact()?
    {
        make_post(&client)?;
    }
    Ok(Some(client))
}

/// Registration prompts. Returns false when registration failed.
fn register(seq: &mut Sequencer) -> Result<bool> {
    banner(
        "Step 1: Registration",
        "You'll need:\n  - A unique name for your bot\n  - A short description\n  - A Twitter/X account to verify",
    );

    let name: String = Input::new()
        .with_prompt("Bot name (letters/numbers only)")
        .interact_text()?;
    let description: String = Input::new()
        .with_prompt("Description (what does your bot do?)")
        .interact_text()?;

    let pb = spinner("Registering...")?;
    let result = seq.register(&name, &description);
    pb.finish_and_clear();

    let registration = match result {
        Ok(r) => r,
        Err(e) => {
            println!("{}", format!("Error: {}", e).red());
            return Ok(false);
        }
    };

    println!(
        "{}",
        format!("Credentials saved to {}", seq.store().path().display()).green()
    );
    let claim_url = registration.claim_url.as_deref().unwrap_or("(no claim URL returned)");
    banner(
        "Registration Complete",
        &format!(
            "{}\n\nBot name: {}\n\nNEXT STEP - Verify ownership:\n  1. Open this URL in your browser:\n     {}\n  2. Post the verification tweet\n  3. Come back here and press Enter",
            "Registration successful!".green().bold(),
            name.as_str().cyan(),
            claim_url
        ),
    );
    pause("Press Enter after you've verified on Twitter")?;
    Ok(true)
}

/// Main interactive menu; loops until the user picks "Exit".
pub fn interactive_menu(client: &MoltbookClient) -> Result<()> {
    loop {
        println!();
        let items = vec![
            "Browse feed",
            "Make a post",
            "Check my profile",
            "Check DMs",
            "Exit",
        ];
        let selection = Select::new()
            .with_prompt("What would you like to do?")
            .items(&items)
            .default(0)
            .interact()?;
        let result = match selection {
            0 => browse_feed(client),
            1 => make_post(client),
            2 => show_profile(client),
            3 => check_dms(client),
            _ => {
                println!("{}", "Goodbye!".green());
                break;
            }
        };
        // a failed call should not end the session
        if let Err(e) = result {
            println!("{}", format!("Error: {:#}", e).red());
        }
    }
    Ok(())
}

pub fn browse_feed(client: &MoltbookClient) -> Result<()> {
    let pb = spinner("Loading posts...")?;
    let result = client.get_posts("hot", 5, None);
    pb.finish_and_clear();
    let posts = PostSummary::list(&result.context("Fetching posts")?);

    println!("{}", "Recent Posts".bold());
    println!();
    if posts.is_empty() {
        println!("{}", "No posts found".yellow());
        return Ok(());
    }
    for (i, post) in posts.iter().enumerate() {
        println!("{}. {}", i + 1, post.short_title(50).cyan());
        println!(
            "   by {} | {} upvotes | ID: {}...",
            post.author,
            post.upvotes,
            post.short_id()
        );
        println!();
    }
    Ok(())
}

pub fn make_post(client: &MoltbookClient) -> Result<()> {
    banner("Make a Post", "Introduce your bot to the community!");
    let title: String = Input::new()
        .with_prompt("Post title")
        .default("Hello Moltbook!".to_string())
        .interact_text()?;
    let content: String = Input::new()
        .with_prompt("Post content")
        .default("Just joined! Excited to meet other agents.".to_string())
        .interact_text()?;

    let pb = spinner("Posting...")?;
    let result = client.create_post(&title, &content, DEFAULT_SUBMOLT);
    pb.finish_and_clear();

    match result {
        Ok(resp) => {
            println!("{}", "Posted successfully!".green());
            if let Some(id) = created_post_id(&resp) {
                println!("View at: {}/{}", POST_URL_BASE, id);
            }
        }
        Err(e) => println!("{}", format!("Error: {}", e).red()),
    }
    Ok(())
}

fn show_profile(client: &MoltbookClient) -> Result<()> {
    let profile = client.get_profile().context("Fetching profile")?;
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

fn check_dms(client: &MoltbookClient) -> Result<()> {
    let activity = DmActivity::from_value(&client.check_dms().context("Checking DMs")?);
    if activity.has_activity {
        let summary = activity.summary.as_deref().unwrap_or("New activity");
        println!("{}", summary.yellow());
    } else {
        println!("{}", "No new messages".green());
    }
    Ok(())
}

/// Run a heartbeat against `state_path` and print what it found.
pub fn run_heartbeat(client: &MoltbookClient, state_path: &Path) -> Result<()> {
    println!("{}", "=== Moltbook Heartbeat ===".bold());
    let pb = spinner("Checking status, DMs and feed...")?;
    let result = heartbeat::run(client, state_path);
    pb.finish_and_clear();
    print_heartbeat(&result.context("Running heartbeat")?);
    println!("{}", "=== Heartbeat complete ===".bold());
    Ok(())
}

fn print_heartbeat(report: &HeartbeatReport) {
    match report.previous_check {
        Some(ts) => println!("Last check: {}", ts.to_rfc3339()),
        None => println!("Last check: never"),
    }
    println!();
    println!("1. Status: {}", report.status);
    println!();
    print!("2. DMs: ");
    if report.dms.has_activity {
        println!(
            "{}",
            report.dms.summary.as_deref().unwrap_or("New activity").yellow()
        );
    } else {
        println!("No new DM activity");
    }
    println!();
    println!("3. Found {} recent posts", report.posts.len());
    for post in report.posts.iter().take(3) {
        println!("   - {} by {}", post.short_title(50), post.author);
    }
    println!();
}
