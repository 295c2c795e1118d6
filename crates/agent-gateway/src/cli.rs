use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "agent-gateway", version, about = "Server-authoritative agent session gateway")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the WebSocket gateway (the default when no subcommand is given).
    Serve {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        system_prompt: Option<String>,
    },
}
