use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "k8shell-logs")]
#[command(about = "Stream a container's logs from a k8shell backend into the terminal")]
pub struct Cli {
    /// Page URL carrying the container identity, e.g.
    /// http://host:8080/logs?cluster=c1&pod=web-0&container=app&tail=100
    pub page_url: String,

    /// Print lines to stdout instead of taking over the terminal
    #[arg(long)]
    pub no_tui: bool,

    /// Ctrl+<KEY> leaves the viewer
    #[arg(long, value_name = "KEY", default_value_t = 'q')]
    pub detach_key: char,

    /// Capacity of the session event queue
    #[arg(long, default_value_t = 1024)]
    pub buffer_size: usize,

    /// Diagnostic log destination while the terminal is taken over
    #[arg(long, default_value = "/tmp/k8shell-logs.log")]
    pub log_file: PathBuf,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    pub verbose: bool,
}
