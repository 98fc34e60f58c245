use eyre::{Context, Result};
use ragchat::cli::{Command, Session};
use ragchat::config::{Configuration, init_logger, verbose};
use ragchat::storage::new_storage;

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Command::new();
    if cmd.version() {
        cmd.print_version();
        return Ok(());
    }

    let config = cmd.get_config()?;
    Configuration::init(config.clone())?;

    init_logger(&config.log)?;
    verbose!("[+] Logger initialized");
    verbose!("[+] Backend endpoint: {}", config.api.endpoint);

    verbose!("[+] Initializing storage...");
    let store = new_storage(&config.storage)
        .await
        .wrap_err("initializing storage")?;
    verbose!("[+] Storage initialized");

    let mut session = Session::new(config, store);
    if let Err(err) = session.run(cmd.command()).await {
        log::error!("command failed: {:#}", err);
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }

    Ok(())
}
