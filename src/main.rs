use env_logger::{Builder, Env, Target};
use log::error;
use manga_reader::configuration::Settings;
use manga_reader::run::run;
use manga_reader::Cli;
use std::process;

#[tokio::main]
async fn main() {
    // Init logging
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.target(Target::Stdout);
    builder.init();

    // Parse Args
    let cli = Cli::new();

    // Parse Settings
    let settings = match Settings::new(&cli.config_file) {
        Ok(s) => s,
        Err(e) => {
            error!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    // Run
    if let Err(e) = run(cli.command, settings).await {
        error!("Application error: {}", e);
        process::exit(1);
    }
}
