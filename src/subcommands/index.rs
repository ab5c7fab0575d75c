use clap::Args;

use crate::config::Config;
use crate::index::PathIndexStore;

#[derive(Args)]
pub struct IndexArgs {
    /// Only print the path recorded for this torrent ID.
    id: Option<String>,
}

impl IndexArgs {
    pub fn exec(self, config: &Config) -> anyhow::Result<()> {
        let index = PathIndexStore::new(&config.index_file).load()?;
        match self.id {
            Some(id) => match index.get(&id) {
                Some(path) => println!("{path}"),
                None => anyhow::bail!("{id} is not in {}", config.index_file.display()),
            },
            None => println!("{}", serde_json::to_string_pretty(&index)?),
        }
        Ok(())
    }
}
