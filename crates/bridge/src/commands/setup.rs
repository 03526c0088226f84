//! First-run setup.

use anyhow::Result;
use bridge_core::ConfigStore;
use bridge_core::store::{
    DEFAULT_CLOUD_MODEL, DEFAULT_LOCAL_MODEL, KEY_API_KEY, KEY_CLOUD_MODEL, KEY_LOCAL_MODEL,
};
use colored::Colorize;
use dialoguer::Password;
use dialoguer::theme::ColorfulTheme;

/// Ask for the API key and write defaults when nothing has been saved yet.
///
/// Returns whether setup ran.
pub fn ensure_first_run(store: &mut dyn ConfigStore) -> Result<bool> {
    if store.exists() {
        return Ok(false);
    }
    tracing::info!("No saved configuration, running first-time setup");

    println!();
    println!("{}", "Welcome to Bridge".cyan().bold());
    println!("Let's set up your API key.");

    let key = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Gemini API Key (optional for local use)")
        .allow_empty_password(true)
        .interact()?;

    write_defaults(store, &key)?;
    println!("{}", "✓ Configuration saved".green());
    Ok(true)
}

/// Persist the credential together with the default model ids.
pub fn write_defaults(store: &mut dyn ConfigStore, api_key: &str) -> Result<()> {
    store.set_many(&[
        (KEY_API_KEY, api_key.trim()),
        (KEY_CLOUD_MODEL, DEFAULT_CLOUD_MODEL),
        (KEY_LOCAL_MODEL, DEFAULT_LOCAL_MODEL),
    ])?;
    Ok(())
}
