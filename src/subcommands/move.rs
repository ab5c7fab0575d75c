use anyhow::bail;
use clap::Args;
use std::path::PathBuf;

use crate::config::Config;
use crate::fs;
use crate::index::PathIndexStore;
use crate::organizer::{BatchReport, Organizer, Selection};

#[derive(Args)]
pub struct MoveArgs {
    /// Destination directory, relative to the library root.
    destination: PathBuf,

    /// Folders to move, relative to the library root. `folder||file` moves the whole folder.
    #[arg(required(true), num_args(1..))]
    selected: Vec<String>,

    /// If true, only prints out what would be done.
    #[arg(long)]
    dry_run: bool,
}

impl MoveArgs {
    pub fn exec(self, config: &Config) -> anyhow::Result<()> {
        let selections = self
            .selected
            .iter()
            .map(|token| Selection::parse(token))
            .collect::<Vec<_>>();
        let store = PathIndexStore::new(&config.index_file);
        let fs = fs::new_instance(self.dry_run);

        let report = Organizer::new(&config.library_dir, &store, &config.id_pattern, fs.as_ref())
            .move_selected(&selections, &self.destination)?;
        print_report(&report)
    }
}

pub(crate) fn print_report(report: &BatchReport) -> anyhow::Result<()> {
    for item in &report.items {
        println!("{item}");
    }
    if report.dry_run && report.index_changed() {
        println!("dry run: index not written");
    }
    match report.failures() {
        0 => Ok(()),
        failures => bail!("{failures} of {} selection(s) failed", report.items.len()),
    }
}
