//! Settings editor for the API key and model ids.

use anyhow::Result;
use bridge_core::store::{KEY_API_KEY, KEY_CLOUD_MODEL, KEY_LOCAL_MODEL};
use bridge_core::{ConfigSnapshot, ConfigStore};
use colored::Colorize;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Password, Select};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingField {
    ApiKey,
    CloudModel,
    LocalModel,
    Back,
}

const FIELDS: [SettingField; 4] = [
    SettingField::ApiKey,
    SettingField::CloudModel,
    SettingField::LocalModel,
    SettingField::Back,
];

const CLOUD_EXAMPLES: &str = "Examples: gemini/gemini-1.5-pro-latest, gemini/gemini-1.5-flash";

const LOCAL_EXAMPLES: &str = "Examples:
 - ollama/qwen2.5-coder:32b (Best)
 - ollama/qwen2.5-coder:14b (Faster)
 - ollama/deepseek-coder-v2";

/// Interactive editor; returns when the user picks "Back".
pub fn execute(store: &mut dyn ConfigStore) -> Result<()> {
    let theme = ColorfulTheme::default();

    loop {
        let snapshot = store.snapshot()?;

        println!();
        println!("{}", "⚙  Bridge Settings".magenta().bold());
        println!("{}", "─".repeat(50));

        let items = setting_items(&snapshot);
        let selection = Select::with_theme(&theme)
            .with_prompt("Select setting to change")
            .items(&items)
            .default(items.len() - 1)
            .interact()?;

        let field = FIELDS.get(selection).copied().unwrap_or(SettingField::Back);
        let value = match field {
            SettingField::ApiKey => Password::with_theme(&theme)
                .with_prompt("Enter new Gemini API Key")
                .allow_empty_password(true)
                .interact()?,
            SettingField::CloudModel => {
                println!("{}", CLOUD_EXAMPLES.dimmed());
                Input::<String>::with_theme(&theme)
                    .with_prompt("Enter Cloud Model ID")
                    .default(snapshot.cloud_model.clone())
                    .interact_text()?
            }
            SettingField::LocalModel => {
                println!("{}", LOCAL_EXAMPLES.dimmed());
                Input::<String>::with_theme(&theme)
                    .with_prompt("Enter Local Model ID")
                    .default(snapshot.local_model.clone())
                    .interact_text()?
            }
            SettingField::Back => return Ok(()),
        };

        if apply(store, field, &value)? {
            println!("{}", "✓ Saved".green());
        }
    }
}

/// Menu rows: label plus current value.
pub fn setting_items(snapshot: &ConfigSnapshot) -> Vec<String> {
    vec![
        format!("1) {:<16} {}", "Gemini API Key", mask_credential(&snapshot.api_key)),
        format!("2) {:<16} {}", "Cloud Model ID", snapshot.cloud_model),
        format!("3) {:<16} {}", "Local Model ID", snapshot.local_model),
        "4) Back to Main Menu".to_string(),
    ]
}

/// Never show the key itself.
pub fn mask_credential(key: &str) -> &'static str {
    if key.trim().is_empty() {
        "Not Set"
    } else {
        "********"
    }
}

/// Write `value` for `field`. Blank input keeps the current value.
///
/// Returns whether anything was written.
pub fn apply(store: &mut dyn ConfigStore, field: SettingField, value: &str) -> Result<bool> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(false);
    }

    let key = match field {
        SettingField::ApiKey => KEY_API_KEY,
        SettingField::CloudModel => KEY_CLOUD_MODEL,
        SettingField::LocalModel => KEY_LOCAL_MODEL,
        SettingField::Back => return Ok(false),
    };
    store.set(key, value)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::MemoryStore;

    #[test]
    fn test_items_mask_the_key() {
        let snapshot = ConfigSnapshot {
            api_key: "super-secret".into(),
            ..ConfigSnapshot::default()
        };
        let items = setting_items(&snapshot);

        assert!(items[0].ends_with("********"));
        assert!(!items.iter().any(|i| i.contains("super-secret")));
        assert!(items[2].ends_with("ollama/qwen2.5-coder:32b"));

        let unset = setting_items(&ConfigSnapshot::default());
        assert!(unset[0].ends_with("Not Set"));
    }

    #[test]
    fn test_blank_key_leaves_store_untouched() {
        let mut store = MemoryStore::with_values(&[(KEY_API_KEY, "old")]);

        assert!(!apply(&mut store, SettingField::ApiKey, "   ").unwrap());
        assert_eq!(store.get(KEY_API_KEY).unwrap().as_deref(), Some("old"));
    }

    #[test]
    fn test_apply_writes_only_the_chosen_key() {
        let mut store = MemoryStore::with_values(&[(KEY_API_KEY, "old")]);

        assert!(apply(&mut store, SettingField::LocalModel, "ollama/deepseek-coder-v2").unwrap());
        assert!(!apply(&mut store, SettingField::Back, "ignored").unwrap());

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.local_model, "ollama/deepseek-coder-v2");
        assert_eq!(snapshot.api_key, "old");
    }
}
