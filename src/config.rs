//! Server configuration
//!
//! Command-line flags for the listener address, the per-turn time
//! budget, and the disconnect policy. Log filtering is controlled
//! separately through the RUST_LOG environment variable.

use std::time::Duration;

use clap::{Parser, ValueEnum};

/// What happens to an active game when a player drops
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DisconnectPolicy {
    /// The remaining player wins immediately
    Forfeit,
    /// The game carries on with the remaining player until a normal
    /// termination condition fires
    Continue,
}

/// Command-line configuration
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct ServerConfig {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 5050)]
    pub port: u16,

    /// Per-turn time budget in seconds (fractional allowed)
    #[arg(long, default_value_t = 5.0, value_parser = parse_timeout)]
    pub turn_timeout: f64,

    /// Disconnect policy for an active game
    #[arg(long, value_enum, default_value_t = DisconnectPolicy::Forfeit)]
    pub on_disconnect: DisconnectPolicy,
}

fn parse_timeout(arg: &str) -> Result<f64, String> {
    let secs: f64 = arg.parse().map_err(|e| format!("{e}"))?;
    if secs.is_finite() && secs > 0.0 {
        Ok(secs)
    } else {
        Err("turn timeout must be a positive number of seconds".to_string())
    }
}

impl ServerConfig {
    /// Socket address string for the TCP listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The per-turn budget as a Duration
    pub fn turn_budget(&self) -> Duration {
        Duration::from_secs_f64(self.turn_timeout)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5050,
            turn_timeout: 5.0,
            on_disconnect: DisconnectPolicy::Forfeit,
        }
    }
}
