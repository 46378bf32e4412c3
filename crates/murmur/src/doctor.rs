// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `murmur doctor` command implementation.
//!
//! Checks that the database opens and answers, then compares the
//! conversation index against the stored records. With `--repair`, an
//! inconsistent index is rebuilt from the records.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::{Duration, Instant};

use murmur_config::MurmurConfig;
use murmur_conversation::{ConversationRepository, RepositoryOptions};
use murmur_core::{HealthStatus, MurmurError, RecordStore};
use murmur_storage::SqliteStore;

/// Status of a diagnostic check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &'static str, status: CheckStatus, message: String, start: Instant) -> Self {
        Self {
            name,
            status,
            message,
            duration: start.elapsed(),
        }
    }
}

/// Run the `murmur doctor` command.
pub async fn run_doctor(config: &MurmurConfig, repair: bool) -> Result<(), MurmurError> {
    let store = Arc::new(SqliteStore::new(config.storage.clone()));
    let start = Instant::now();
    let mut results = Vec::new();
    match store.initialize().await {
        Ok(()) => {
            results.push(CheckResult::new(
                "Database",
                CheckStatus::Pass,
                format!("opened {}", store.path()),
                start,
            ));
            let repo = ConversationRepository::new(store.clone(), RepositoryOptions::from(config));
            results.extend(run_checks(&repo, repair).await);
            repo.close().await?;
        }
        Err(e) => results.push(CheckResult::new(
            "Database",
            CheckStatus::Fail,
            e.to_string(),
            start,
        )),
    }

    print_results(&results, repair);
    Ok(())
}

/// Health and consistency checks against an open repository.
pub async fn run_checks(repo: &ConversationRepository, repair: bool) -> Vec<CheckResult> {
    let mut results = vec![check_health(repo).await];

    let start = Instant::now();
    let problems = match repo.verify_consistency().await {
        Ok(problems) => problems,
        Err(e) => {
            results.push(CheckResult::new("Index", CheckStatus::Fail, e.to_string(), start));
            return results;
        }
    };
    if problems.is_empty() {
        let count = repo.list_all().await.map(|entries| entries.len()).unwrap_or(0);
        results.push(CheckResult::new(
            "Index",
            CheckStatus::Pass,
            format!("{count} conversation(s), consistent"),
            start,
        ));
        return results;
    }

    for problem in &problems {
        tracing::warn!(%problem, "index inconsistency");
    }
    if !repair {
        results.push(CheckResult::new(
            "Index",
            CheckStatus::Warn,
            format!("{} inconsistency(ies), run with --repair", problems.len()),
            start,
        ));
        return results;
    }

    let rebuilt = match repo.rebuild_index().await {
        Ok(count) => count,
        Err(e) => {
            results.push(CheckResult::new("Index", CheckStatus::Fail, e.to_string(), start));
            return results;
        }
    };
    let remaining = repo.verify_consistency().await.map(|p| p.len());
    results.push(match remaining {
        Ok(0) => CheckResult::new(
            "Index",
            CheckStatus::Pass,
            format!(
                "repaired {} inconsistency(ies), {rebuilt} entries",
                problems.len()
            ),
            start,
        ),
        Ok(n) => CheckResult::new(
            "Index",
            CheckStatus::Fail,
            format!("{n} inconsistency(ies) remain after rebuild"),
            start,
        ),
        Err(e) => CheckResult::new("Index", CheckStatus::Fail, e.to_string(), start),
    });
    results
}

async fn check_health(repo: &ConversationRepository) -> CheckResult {
    let start = Instant::now();
    match repo.health_check().await {
        Ok(HealthStatus::Healthy) => {
            CheckResult::new("Health", CheckStatus::Pass, "healthy".into(), start)
        }
        Ok(HealthStatus::Degraded(reason)) => {
            CheckResult::new("Health", CheckStatus::Warn, reason, start)
        }
        Ok(HealthStatus::Unhealthy(reason)) => {
            CheckResult::new("Health", CheckStatus::Fail, reason, start)
        }
        Err(e) => CheckResult::new("Health", CheckStatus::Fail, e.to_string(), start),
    }
}

fn print_results(results: &[CheckResult], repair: bool) {
    use colored::Colorize;

    let use_color = std::io::stdout().is_terminal();

    println!();
    println!("  murmur doctor");
    println!("  {}", "-".repeat(50));

    let mut issues = 0;
    for result in results {
        let duration_ms = result.duration.as_millis();
        let symbol = match (result.status, use_color) {
            (CheckStatus::Pass, true) => "✓".green().to_string(),
            (CheckStatus::Warn, true) => "!".yellow().to_string(),
            (CheckStatus::Fail, true) => "✗".red().to_string(),
            (CheckStatus::Pass, false) => "[OK]  ".to_string(),
            (CheckStatus::Warn, false) => "[WARN]".to_string(),
            (CheckStatus::Fail, false) => "[FAIL]".to_string(),
        };
        if result.status != CheckStatus::Pass {
            issues += 1;
        }
        println!(
            "    {symbol} {:<12} {} ({duration_ms}ms)",
            result.name, result.message
        );
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
        if !repair {
            println!("  Run with --repair to rebuild the index.");
        }
    }
    println!();
}
