// CLI entry point for the Pet Duel matchmaking and relay server.
//
// Pairs clients that send JOIN_LOBBY and relays their MOVEs. It never runs
// battle rules. See `server.rs` for the threading model, `lobby.rs` and
// `relay.rs` for matchmaking and forwarding.
//
// Usage:
//   relay [OPTIONS]
//     --host <HOST>                  Bind address (default: 127.0.0.1)
//     --port <PORT>                  Listen port (default: 9999)
//     --relay-policy <paired|broadcast>
//
// Every option can also be set through its PETDUEL_* environment variable.
// The process runs until killed; the OS tears the sockets down.

use anyhow::Context;
use clap::Parser;
use petduel_relay::logging::init_tracing;
use petduel_relay::{RelayPolicy, ServerConfig, start_server};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "relay", version, about = "Pet Duel matchmaking and relay server")]
struct Args {
    /// Address to bind.
    #[arg(long, env = "PETDUEL_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on (0 picks a free port).
    #[arg(long, env = "PETDUEL_PORT", default_value_t = 9999)]
    port: u16,

    /// Where non-JOIN_LOBBY frames go.
    #[arg(long, env = "PETDUEL_RELAY_POLICY", value_enum, default_value_t = RelayPolicy::Paired)]
    relay_policy: RelayPolicy,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        relay_policy: args.relay_policy,
    };
    let bind = format!("{}:{}", config.host, config.port);

    let (_handle, addr) = start_server(config).with_context(|| format!("failed to bind {bind}"))?;
    info!(%addr, "relay ready, press Ctrl+C to stop");

    loop {
        std::thread::park();
    }
}
