use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "secwatch",
    about = "real-time synchronization client for a security-operations dashboard",
    version
)]
pub struct Args {
    /// WebSocket endpoint URL. Falls back to SECWATCH_WS_URL, then to the
    /// local loopback default.
    #[arg(short, long)]
    pub url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Output logs in JSON format
    #[arg(long)]
    pub json_logs: bool,

    /// Enable metrics server
    #[arg(long)]
    pub metrics: bool,

    /// Metrics server port
    #[arg(long, default_value = "9090")]
    pub metrics_port: u16,

    /// Connection handshake timeout in seconds
    #[arg(long, default_value = "10")]
    pub connect_timeout: u64,

    /// Reconnection delay in milliseconds
    #[arg(long, default_value = "3000")]
    pub reconnect_delay_ms: u64,

    /// Maximum number of reconnection attempts (0 for unlimited)
    #[arg(long, default_value = "5")]
    pub max_reconnects: u32,

    /// Disable colored output (useful for piping to files)
    #[arg(long)]
    pub no_color: bool,

    /// Quiet mode - suppress status lines, keep errors
    #[arg(long)]
    pub quiet: bool,
}
