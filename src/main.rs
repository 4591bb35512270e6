use std::process;

use anyhow::{Context, Result};
use authgate::config::ConfigArgs;
use authgate::server::config::ServerConfig;
use authgate::server::factory::ServerFactory;
use clap::Parser;
use log::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct ServerArgs {
    /// Print server configuration data (JSON) and exit.
    #[arg(long)]
    pub print_config: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}

async fn run(args: ServerArgs) -> Result<()> {
    let cfg: ServerConfig = args.config.load("authgate")?;

    if args.print_config {
        let json = serde_json::to_string_pretty(&cfg).context("encode config")?;
        println!("{json}");
        return Ok(());
    }

    cfg.logs.init()?;

    let factory = ServerFactory::new(cfg);
    let srv = factory.build_server().context("build server")?;

    srv.run().await.context("run restful server")?;

    info!("Server exited by user");
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = ServerArgs::parse();
    match run(args).await {
        Ok(()) => {}
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
