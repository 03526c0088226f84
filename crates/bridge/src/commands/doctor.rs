//! Diagnostics command.

use anyhow::Result;
use bridge_core::Orchestrator;
use bridge_core::readiness::{ReadinessCheck, strip_model_prefix};
use colored::Colorize;

use crate::config::Config;

pub async fn execute(orchestrator: &Orchestrator) -> Result<()> {
    println!("{}", "bridge Doctor".cyan().bold());
    println!("{}", "─".repeat(50));
    println!();

    let mut issues = Vec::new();
    let settings = orchestrator.settings();
    let status = orchestrator.survey().await?;

    // Check internet
    print!("  Internet ({}): ", settings.internet);
    if status.internet_up {
        println!("{}", "✓ reachable".green());
    } else {
        println!("{}", "✗ unreachable".red());
        issues.push("No internet connection - Cloud mode unavailable".to_string());
    }

    // Check credential
    print!("  API key: ");
    if status.config.has_credential() {
        println!("{}", "✓ set".green());
    } else {
        println!("{}", "○ not set (Cloud mode unavailable)".yellow());
    }

    // Check config files
    print!("  Config file: ");
    if orchestrator.store().exists() {
        println!("{}", "✓ exists".green());
    } else {
        println!("{}", "○ not found (created on first run)".yellow());
    }

    print!("  Launcher settings: ");
    if Config::config_path().exists() {
        println!("{}", "✓ exists".green());
    } else {
        println!("{}", "○ not found (using defaults)".yellow());
    }

    // Check local backend
    println!();
    println!("  {}", "Local backend:".cyan());
    print!("    {}: ", settings.backend.binary);
    match which::which(&settings.backend.binary) {
        Ok(_) => println!("{}", "✓ installed".green()),
        Err(_) => {
            println!("{}", "✗ not found".red());
            issues.push(format!("{} is not installed", settings.backend.binary));
        }
    }

    print!("    Server ({}): ", settings.backend.endpoint());
    if status.local_service_up {
        println!("{}", "✓ running".green());
    } else {
        println!("{}", "○ stopped (started on Local launch)".yellow());
    }

    let model = strip_model_prefix(&status.config.local_model);
    print!("    Model {}: ", model);
    let [_, artifact] = settings.backend.dependencies(&status.config.local_model);
    match (&artifact.check, status.local_service_up) {
        (ReadinessCheck::ListContains(list), true) => {
            match orchestrator.runner().capture_stdout(list).await {
                Ok(listing) if listing.contains(model) => println!("{}", "✓ pulled".green()),
                Ok(_) => println!("{}", "○ not pulled (pulled on Local launch)".yellow()),
                Err(e) => println!("{}", format!("✗ {}", e).red()),
            }
        }
        _ => println!("{}", "? unknown (server not running)".dimmed()),
    }

    // Check agent
    println!();
    println!("  {}", "Agent:".cyan());
    print!("    {}: ", settings.agent_binary);
    match orchestrator.resolver().resolve(&settings.agent_binary) {
        Ok(path) => println!("{} {}", "✓".green(), path.display()),
        Err(e) => {
            println!("{}", "✗ not found".red());
            issues.push(e.to_string());
        }
    }

    // Summary
    println!();
    if issues.is_empty() {
        println!("{}", "✓ All checks passed".green().bold());
    } else {
        println!("{}", format!("✗ {} issue(s) found:", issues.len()).red().bold());
        for issue in &issues {
            println!("  • {}", issue);
        }
    }

    Ok(())
}
