use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use tui_logger::{
    TuiLoggerFile, TuiLoggerLevelOutput, init_logger, set_default_level, set_log_file,
};

use crate::app::App;
use crate::config::MonitorConfig;

pub mod app;
pub mod config;
pub mod event;
pub mod monitor;
pub mod ui;

#[derive(Parser, Debug)]
#[command(about)]
struct Cli {
    /// Directory searched for taskmon.ini / taskmon.xml
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    config_dir: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Monitor processes
    Run,
    /// Print the effective configuration
    Validate,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    match &cli.command {
        Some(Commands::Validate) => {
            let config = MonitorConfig::load(&cli.config_dir);
            println!("{config:#?}");
            Ok(())
        }
        Some(Commands::Run) | None => {
            init_logger(tui_logger::LevelFilter::Debug)?;
            let file_options = TuiLoggerFile::new("taskmon.log")
                .output_level(Some(TuiLoggerLevelOutput::Abbreviated))
                .output_file(false)
                .output_separator(':');
            set_log_file(file_options);
            set_default_level(tui_logger::LevelFilter::Debug);
            info!("Logging started");
            let config = MonitorConfig::load(&cli.config_dir);
            let mut app = App::new(config)?;
            let terminal = ratatui::init();
            let result = app.run(terminal).await;
            ratatui::restore();
            result
        }
    }
}
