use clap::Args;
use console::Style;

use crate::config::Config;
use crate::destinations;
use crate::library;
use crate::server::LibraryView;
use crate::util;

#[derive(Args)]
pub struct ScanArgs {
    /// Print the library view as JSON, as served by `GET /`.
    #[arg(long)]
    json: bool,

    /// Print the folders entries can be moved into, grouped by top-level folder.
    #[arg(long)]
    destinations: bool,
}

impl ScanArgs {
    pub fn exec(self, config: &Config) -> anyhow::Result<()> {
        if self.json {
            let view = LibraryView::build(config);
            println!("{}", serde_json::to_string_pretty(&view)?);
            return Ok(());
        }

        let spinner = util::new_progress_spinner();
        let entries = library::scan(&config.library_dir)
            .inspect(|entry| {
                spinner.inc(1);
                spinner.set_message(entry.folder.display().to_string());
            })
            .collect::<Vec<_>>();
        spinner.finish();

        if self.destinations {
            let destinations = destinations::destinations(entries.iter().map(|e| &e.folder));
            for (top, subpaths) in destinations::group(&destinations) {
                println!("{top}");
                for subpath in subpaths {
                    println!("  {subpath}");
                }
            }
            return Ok(());
        }

        let dim = Style::new().dim();
        for entry in &entries {
            println!(
                "{}  {}",
                entry.folder.display(),
                dim.apply_to(&entry.display_name)
            );
        }
        eprintln!(
            "Found {} folder(s) in {}",
            entries.len(),
            config.library_dir.display()
        );
        Ok(())
    }
}
