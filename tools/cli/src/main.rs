//! GenPwd CLI - Command line interface for vault files.
//!
//! This tool creates, inspects, audits, and searches encrypted
//! `.gpdb` vault files. Passwords are always read from the terminal,
//! never from arguments.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use zeroize::Zeroizing;

use genpwd_audit::{analyze_password, vault_health, PasswordIssue, StrengthBucket};
use genpwd_crypto::KdfOverrides;
use genpwd_vault::{
    export_to_buffer, import_from_buffer, read_metadata, verify_password, ExportOptions,
    SearchFilter, VaultPayload, VaultRepository,
};

#[derive(Parser)]
#[command(name = "genpwd")]
#[command(about = "GenPwd - Encrypted password vault files")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new empty vault file.
    Create {
        /// Path of the vault file to create.
        #[arg(short, long)]
        path: PathBuf,

        /// Vault display name stored in its metadata.
        #[arg(short, long, default_value = "vault")]
        name: String,

        /// KDF strength: "moderate" or "strong".
        #[arg(short, long, default_value = "strong")]
        strength: String,
    },

    /// Show vault file information without decrypting.
    Info {
        /// Path to the vault file.
        #[arg(short, long)]
        path: PathBuf,
    },

    /// Check a password against a vault file.
    Verify {
        /// Path to the vault file.
        #[arg(short, long)]
        path: PathBuf,
    },

    /// Audit password health of a vault.
    Audit {
        /// Path to the vault file.
        #[arg(short, long)]
        path: PathBuf,
    },

    /// Search entries with the query language (tag:, type:, has:, -exclusion).
    Search {
        /// Path to the vault file.
        #[arg(short, long)]
        path: PathBuf,

        /// Query string, e.g. "tag:work has:totp -old".
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Create {
            path,
            name,
            strength,
        } => cmd_create(&path, &name, &strength).await,

        Commands::Info { path } => cmd_info(&path).await,

        Commands::Verify { path } => cmd_verify(&path).await,

        Commands::Audit { path } => cmd_audit(&path).await,

        Commands::Search { path, query } => cmd_search(&path, &query).await,
    }
}

/// Prompt for a password securely.
fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(Zeroizing::new(password))
}

/// Create a new empty vault file.
async fn cmd_create(path: &PathBuf, name: &str, strength: &str) -> Result<()> {
    if path.exists() {
        anyhow::bail!("Refusing to overwrite existing file: {}", path.display());
    }

    let kdf = match strength {
        // Defaults are the strong profile; moderate halves memory
        "strong" => KdfOverrides::default(),
        "moderate" => KdfOverrides {
            memory_kb: Some(32768),
            iterations: Some(3),
            parallelism: Some(2),
        },
        _ => anyhow::bail!("Invalid strength. Use: moderate or strong"),
    };

    let password = prompt_password("Enter master password: ")?;
    let confirm = prompt_password("Confirm master password: ")?;
    if *password != *confirm {
        anyhow::bail!("Passwords do not match");
    }
    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }

    info!(path = %path.display(), "Creating vault");
    let payload = VaultPayload {
        metadata: serde_json::json!({ "name": name }),
        entries: vec![],
        groups: vec![],
        tags: vec![],
    };
    let options = ExportOptions {
        kdf,
        created_at: None,
    };
    let buffer = export_to_buffer(&payload, &password, &options)?;
    tokio::fs::write(path, &buffer)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Vault created: {}", path.display());
    println!("  Name: {}", name);
    Ok(())
}

/// Show file metadata without decrypting.
async fn cmd_info(path: &PathBuf) -> Result<()> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let meta = read_metadata(&data)?;

    println!("Vault file: {}", path.display());
    println!("  Format:   {} v{}", meta.format, meta.version);
    if let Some(created) = meta.created_at {
        println!("  Created:  {}", created.to_rfc3339());
    }
    if let Some(modified) = meta.modified_at {
        println!("  Modified: {}", modified.to_rfc3339());
    }
    if let Some(kdf) = meta.kdf_algorithm {
        println!(
            "  KDF:      {} ({} iterations)",
            kdf,
            meta.kdf_iterations.unwrap_or(0)
        );
    }
    Ok(())
}

/// Check a password without opening the vault.
async fn cmd_verify(path: &PathBuf) -> Result<()> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let password = prompt_password("Enter master password: ")?;

    if verify_password(&data, &password)? {
        println!("Password is correct");
        Ok(())
    } else {
        anyhow::bail!("Invalid password or corrupted data");
    }
}

async fn open_payload(path: &PathBuf) -> Result<VaultPayload> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let password = prompt_password("Enter master password: ")?;
    let outcome = import_from_buffer(&data, &password)?;

    for problem in &outcome.entry_errors {
        eprintln!("warning: {}", problem);
    }
    Ok(outcome.payload)
}

/// Print the vault health report.
async fn cmd_audit(path: &PathBuf) -> Result<()> {
    let payload = open_payload(path).await?;
    let report = vault_health(&payload.entries, chrono::Utc::now());

    println!("Vault health: {}/100", report.score);
    println!("  Entries:   {}", report.total);
    println!("  Weak:      {}", report.weak);
    println!("  Reused:    {} group(s)", report.reused_groups);
    println!("  Stale:     {}", report.stale);
    println!("  Empty:     {}", report.empty);
    println!("  With 2FA:  {}", report.with_totp);

    let mut flagged = false;
    for entry in &payload.entries {
        let secret = entry.current_secret().map(|s| s.expose()).unwrap_or("");
        if secret.is_empty() {
            continue;
        }
        let analysis = analyze_password(secret);
        if analysis.bucket <= StrengthBucket::Weak {
            if !flagged {
                println!("Weak passwords:");
                flagged = true;
            }
            println!(
                "  {} ({}{})",
                entry.title,
                analysis.bucket.as_str(),
                format_issues(&analysis.issues)
            );
        }
    }
    Ok(())
}

fn format_issues(issues: &[PasswordIssue]) -> String {
    if issues.is_empty() {
        return String::new();
    }
    let names: Vec<&str> = issues
        .iter()
        .map(|issue| match issue {
            PasswordIssue::Empty => "empty",
            PasswordIssue::RepeatedCharacters => "repeated characters",
            PasswordIssue::SequentialRun => "sequential run",
            PasswordIssue::KeyboardPattern => "keyboard pattern",
            PasswordIssue::CommonPassword => "common password",
            PasswordIssue::YearPattern => "year pattern",
        })
        .collect();
    format!(": {}", names.join(", "))
}

/// Search entries with the query language.
async fn cmd_search(path: &PathBuf, query: &str) -> Result<()> {
    let payload = open_payload(path).await?;
    let repo = VaultRepository::restore(payload);

    let results = repo.search_entries(query, &SearchFilter::default());
    if results.is_empty() {
        println!("No entries matched");
        return Ok(());
    }

    for entry in &results {
        let group = entry
            .group_id
            .as_deref()
            .map(|id| repo.group_path(id).unwrap_or_default())
            .filter(|p| !p.is_empty())
            .map(|p| format!(" [{}]", p))
            .unwrap_or_default();
        println!("{}  {}{}", entry.id, entry.title, group);
    }
    println!("{} entr{} matched", results.len(), if results.len() == 1 { "y" } else { "ies" });
    Ok(())
}
