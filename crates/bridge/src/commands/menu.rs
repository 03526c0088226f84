//! Interactive mode menu.
//!
//! Each pass re-probes, renders the status panel and asks for a choice.
//! Launch failures return here; only a missing agent binary ends the loop
//! with an error.

use anyhow::{Context, Result};
use bridge_core::Orchestrator;
use colored::Colorize;
use dialoguer::Select;
use dialoguer::theme::ColorfulTheme;
use tracing::debug;

use crate::commands::{launch, settings, setup};
use crate::ui::{self, MENU_CHOICES, MenuChoice};

pub async fn execute(orchestrator: &mut Orchestrator) -> Result<()> {
    setup::ensure_first_run(orchestrator.store_mut())?;

    let theme = ColorfulTheme::default();
    loop {
        let status = orchestrator
            .survey()
            .await
            .context("Failed to read configuration")?;
        ui::print_status(&status);

        let items = ui::menu_items(&status);
        let selection = Select::with_theme(&theme)
            .with_prompt("Select Mode")
            .items(&items)
            .default(ui::default_index(&status))
            .interact()?;

        let choice = MENU_CHOICES.get(selection).copied().unwrap_or(MenuChoice::Quit);
        debug!("Menu choice: {:?}", choice);
        match choice {
            MenuChoice::Quit => return Ok(()),
            MenuChoice::Settings => settings::execute(orchestrator.store_mut())?,
            MenuChoice::Mode(mode) => {
                if let Err(e) = launch::attempt(orchestrator, mode, &status).await {
                    if launch::is_fatal(&e) {
                        return Err(e);
                    }
                    println!("{}", format!("✗ {:#}", e).red());
                }
            }
        }
    }
}
