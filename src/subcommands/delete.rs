use clap::Args;
use dialoguer::Confirm;

use crate::config::Config;
use crate::fs;
use crate::index::PathIndexStore;
use crate::organizer::{Organizer, Selection};

use super::r#move::print_report;

#[derive(Args)]
pub struct DeleteArgs {
    /// Folders to delete, relative to the library root. `folder||file` deletes a single file.
    #[arg(required(true), num_args(1..))]
    selected: Vec<String>,

    /// If true, only prints out what would be done.
    #[arg(long)]
    dry_run: bool,

    /// Do not ask for confirmation.
    #[arg(long, short)]
    yes: bool,
}

impl DeleteArgs {
    pub fn exec(self, config: &Config) -> anyhow::Result<()> {
        let selections = self
            .selected
            .iter()
            .map(|token| Selection::parse(token))
            .collect::<Vec<_>>();

        if !self.dry_run && !self.yes {
            eprintln!("Deleting the following from {}:", config.library_dir.display());
            for selection in &selections {
                eprintln!("  {selection}");
            }
            if !Confirm::new()
                .with_prompt("Continue?")
                .default(false)
                .interact()?
            {
                return Ok(());
            }
        }

        let store = PathIndexStore::new(&config.index_file);
        let fs = fs::new_instance(self.dry_run);
        let report = Organizer::new(&config.library_dir, &store, &config.id_pattern, fs.as_ref())
            .delete_selected(&selections)?;
        print_report(&report)
    }
}
