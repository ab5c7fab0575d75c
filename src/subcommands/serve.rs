use clap::Args;
use std::net::SocketAddr;

use crate::config::Config;
use crate::server;

#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on; overrides the config file.
    #[arg(long)]
    listen: Option<SocketAddr>,
}

impl ServeArgs {
    pub fn exec(self, mut config: Config) -> anyhow::Result<()> {
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        tokio::runtime::Runtime::new()?.block_on(server::serve(config))
    }
}
