use clap::Parser;
use std::path::PathBuf;

/// Scripted playback session against the simulated engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Media locators to play, in order (repeat a locator to exercise engine reuse)
    #[arg(value_name = "URL", default_values_t = [String::from("sim://demo/intro.mp4")])]
    pub urls: Vec<String>,

    /// Loops to play per locator before moving on
    #[arg(short = 'n', long = "loops", value_name = "N", default_value_t = 2)]
    pub loops: u32,

    /// Stop at the end instead of restarting
    #[arg(long = "no-auto-replay")]
    pub no_auto_replay: bool,

    /// Asset cache capacity (overrides config and REELVIEW_CACHE_CAPACITY)
    #[arg(long = "capacity", value_name = "N")]
    pub capacity: Option<usize>,

    /// JSON configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging to file (default: reelview.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,
}
