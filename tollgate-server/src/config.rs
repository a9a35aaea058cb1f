//! Server configuration and CLI argument parsing
//!
//! All settings are available as command-line arguments and as
//! environment variables with the TOLLGATE_ prefix.
//!
//! # Configuration Priority
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Default values (lowest priority)
//!
//! # Example Usage
//!
//! ```bash
//! # Default tiers (free:100:1, premium:1000:2) on port 8080
//! tollgate
//!
//! # Custom tier table and fail-closed fallback
//! tollgate --tier basic:50:0.5 --tier pro:5000:10 \
//!          --default-tier basic --fallback fail-closed
//!
//! # Using environment variables
//! export TOLLGATE_HTTP_PORT=9090
//! export TOLLGATE_TIERS=free:100:1,premium:1000:2
//! export TOLLGATE_STORE=adaptive
//! tollgate
//! ```

use anyhow::{Result, anyhow};
use clap::Parser;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure for the server
///
/// Built from CLI arguments and environment variables; contains all
/// settings needed to run the server.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP transport configuration
    pub http: HttpConfig,
    /// Rate limiting policy configuration
    pub limits: LimitsConfig,
    /// Bucket store configuration
    pub store: StoreConfig,
    /// Channel buffer size for actor communication
    pub buffer_size: usize,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

/// Rate limiting policy configuration
#[derive(Debug, Clone)]
pub struct LimitsConfig {
    /// Tier table: every tier a request may name
    pub tiers: Vec<TierSpec>,
    /// Tier applied when a request names no (or an unknown) tier
    pub default_tier: String,
    /// How long an untouched bucket survives in the store
    pub idle_ttl: Duration,
    /// What to answer when the store cannot be consulted
    pub fallback: FallbackMode,
    /// Retry-after handed out while degraded in fail-closed mode
    pub fallback_retry_after: Duration,
}

/// One `--tier` argument: `name:capacity:refill_rate`
///
/// The name may not contain `:`; capacity is the maximum token count and
/// refill rate is tokens per second (fractional rates are fine).
#[derive(Debug, Clone, PartialEq)]
pub struct TierSpec {
    pub name: String,
    pub capacity: i64,
    pub refill_rate: f64,
}

impl FromStr for TierSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, ':');
        let (Some(name), Some(capacity), Some(refill_rate)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(anyhow!(
                "invalid tier spec {s:?}: expected name:capacity:refill_rate"
            ));
        };
        if name.is_empty() {
            return Err(anyhow!("invalid tier spec {s:?}: empty tier name"));
        }
        let capacity = capacity
            .parse::<i64>()
            .map_err(|e| anyhow!("invalid capacity in tier spec {s:?}: {e}"))?;
        let refill_rate = refill_rate
            .parse::<f64>()
            .map_err(|e| anyhow!("invalid refill rate in tier spec {s:?}: {e}"))?;
        Ok(TierSpec {
            name: name.to_string(),
            capacity,
            refill_rate,
        })
    }
}

impl fmt::Display for TierSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.name, self.capacity, self.refill_rate)
    }
}

/// What to answer when the state store cannot be consulted
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FallbackMode {
    /// Admit requests, marked degraded
    FailOpen,
    /// Reject requests with a fixed retry-after
    FailClosed,
}

impl FromStr for FallbackMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fail-open" => Ok(FallbackMode::FailOpen),
            "fail-closed" => Ok(FallbackMode::FailClosed),
            _ => Err(anyhow!(
                "Invalid fallback mode: {}. Valid options are: fail-open, fail-closed",
                s
            )),
        }
    }
}

/// Bucket store configuration
///
/// - **Periodic**: sweeps at fixed intervals, predictable memory usage
/// - **Adaptive**: adjusts sweep frequency to load
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Type of store to use
    pub store_type: StoreType,
    /// Initial capacity of the store
    pub capacity: usize,
    // Store-specific parameters
    /// Sweep interval for the periodic store (seconds)
    pub cleanup_interval: u64,
    /// Minimum sweep interval for the adaptive store (seconds)
    pub min_interval: u64,
    /// Maximum sweep interval for the adaptive store (seconds)
    pub max_interval: u64,
    /// Maximum operations before a forced sweep for the adaptive store
    pub max_operations: usize,
}

/// Available store types for bucket state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StoreType {
    /// Fixed interval cleanup
    Periodic,
    /// Dynamic cleanup interval based on load
    Adaptive,
}

impl FromStr for StoreType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "periodic" => Ok(StoreType::Periodic),
            "adaptive" => Ok(StoreType::Adaptive),
            _ => Err(anyhow!(
                "Invalid store type: {}. Valid options are: periodic, adaptive",
                s
            )),
        }
    }
}

/// Command-line arguments for the server
///
/// All arguments can also be set via environment variables with the
/// TOLLGATE_ prefix. CLI arguments take precedence over environment
/// variables.
#[derive(Parser, Debug)]
#[command(
    name = "tollgate",
    about = "Tiered token bucket rate limiting server",
    long_about = "A tiered token bucket rate limiting server with an HTTP/JSON API.\n\nEnvironment variables with TOLLGATE_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Args {
    // HTTP Transport
    #[arg(
        long,
        value_name = "HOST",
        help = "HTTP host",
        default_value = "127.0.0.1",
        env = "TOLLGATE_HTTP_HOST"
    )]
    pub http_host: String,
    #[arg(
        long,
        value_name = "PORT",
        help = "HTTP port",
        default_value_t = 8080,
        env = "TOLLGATE_HTTP_PORT"
    )]
    pub http_port: u16,

    // Rate limiting policy
    #[arg(
        long = "tier",
        value_name = "NAME:CAPACITY:RATE",
        help = "Tier policy: burst capacity and tokens refilled per second (repeatable)",
        default_values_t = default_tiers(),
        env = "TOLLGATE_TIERS",
        value_delimiter = ','
    )]
    pub tiers: Vec<TierSpec>,
    #[arg(
        long,
        value_name = "NAME",
        help = "Tier applied when a request names no (or an unknown) tier",
        default_value = "free",
        env = "TOLLGATE_DEFAULT_TIER"
    )]
    pub default_tier: String,
    #[arg(
        long,
        value_name = "SECS",
        help = "Idle TTL for dormant buckets (seconds)",
        default_value_t = 3600,
        env = "TOLLGATE_IDLE_TTL"
    )]
    pub idle_ttl: u64,
    #[arg(
        long,
        value_name = "MODE",
        help = "Fallback when the store is unavailable: fail-open, fail-closed",
        default_value = "fail-open",
        env = "TOLLGATE_FALLBACK"
    )]
    pub fallback: FallbackMode,
    #[arg(
        long,
        value_name = "SECS",
        help = "Retry-after handed out while degraded in fail-closed mode",
        default_value_t = 1,
        env = "TOLLGATE_FALLBACK_RETRY_AFTER"
    )]
    pub fallback_retry_after: u64,

    // Store Configuration
    #[arg(
        long,
        value_name = "TYPE",
        help = "Store type: periodic, adaptive",
        default_value = "periodic",
        env = "TOLLGATE_STORE"
    )]
    pub store: StoreType,
    #[arg(
        long,
        value_name = "SIZE",
        help = "Initial store capacity",
        default_value_t = 100_000,
        env = "TOLLGATE_STORE_CAPACITY"
    )]
    pub store_capacity: usize,

    // Store-specific options
    #[arg(
        long,
        value_name = "SECS",
        help = "Sweep interval for periodic store (seconds)",
        default_value_t = 300,
        env = "TOLLGATE_STORE_CLEANUP_INTERVAL"
    )]
    pub store_cleanup_interval: u64,
    #[arg(
        long,
        value_name = "SECS",
        help = "Minimum sweep interval for adaptive store (seconds)",
        default_value_t = 5,
        env = "TOLLGATE_STORE_MIN_INTERVAL"
    )]
    pub store_min_interval: u64,
    #[arg(
        long,
        value_name = "SECS",
        help = "Maximum sweep interval for adaptive store (seconds)",
        default_value_t = 300,
        env = "TOLLGATE_STORE_MAX_INTERVAL"
    )]
    pub store_max_interval: u64,
    #[arg(
        long,
        value_name = "N",
        help = "Maximum operations before a forced sweep for adaptive store",
        default_value_t = 1_000_000,
        env = "TOLLGATE_STORE_MAX_OPERATIONS"
    )]
    pub store_max_operations: usize,

    // General options
    #[arg(
        long,
        value_name = "SIZE",
        help = "Channel buffer size",
        default_value_t = 100_000,
        env = "TOLLGATE_BUFFER_SIZE"
    )]
    pub buffer_size: usize,
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "TOLLGATE_LOG_LEVEL"
    )]
    pub log_level: String,

    // Utility options
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

fn default_tiers() -> Vec<TierSpec> {
    vec![
        TierSpec {
            name: "free".to_string(),
            capacity: 100,
            refill_rate: 1.0,
        },
        TierSpec {
            name: "premium".to_string(),
            capacity: 1000,
            refill_rate: 2.0,
        },
    ]
}

impl Config {
    /// Build configuration from environment variables and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if the tier table is empty or inconsistent, or
    /// other configuration values are invalid. Tier *policy* validation
    /// (capacity and refill rate ranges) happens when the registry is
    /// built at startup.
    pub fn from_env_and_args() -> Result<Self> {
        // Clap resolves the precedence: CLI > environment > defaults
        let args = Args::parse();

        // Handle --list-env-vars
        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        let config = Config {
            http: HttpConfig {
                host: args.http_host,
                port: args.http_port,
            },
            limits: LimitsConfig {
                tiers: args.tiers,
                default_tier: args.default_tier,
                idle_ttl: Duration::from_secs(args.idle_ttl),
                fallback: args.fallback,
                fallback_retry_after: Duration::from_secs(args.fallback_retry_after),
            },
            store: StoreConfig {
                store_type: args.store,
                capacity: args.store_capacity,
                cleanup_interval: args.store_cleanup_interval,
                min_interval: args.store_min_interval,
                max_interval: args.store_max_interval,
                max_operations: args.store_max_operations,
            },
            buffer_size: args.buffer_size,
            log_level: args.log_level,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error when the tier table is empty, contains duplicate
    /// names, or does not contain the default tier; or when the idle TTL
    /// is zero.
    pub fn validate(&self) -> Result<()> {
        if self.limits.tiers.is_empty() {
            return Err(anyhow!(
                "At least one tier must be configured.\n\n\
                Example:\n  \
                tollgate --tier free:100:1 --tier premium:1000:2 --default-tier free"
            ));
        }

        let mut seen = HashSet::new();
        for spec in &self.limits.tiers {
            if !seen.insert(spec.name.as_str()) {
                return Err(anyhow!("duplicate tier name: {:?}", spec.name));
            }
        }

        if !seen.contains(self.limits.default_tier.as_str()) {
            return Err(anyhow!(
                "default tier {:?} is not among the configured tiers",
                self.limits.default_tier
            ));
        }

        if self.limits.idle_ttl.is_zero() {
            return Err(anyhow!("idle TTL must be positive"));
        }

        Ok(())
    }

    /// Print all available environment variables and their descriptions
    fn print_env_vars() {
        println!("Tollgate Environment Variables");
        println!("==============================");
        println!();
        println!("All environment variables use the TOLLGATE_ prefix.");
        println!("CLI arguments take precedence over environment variables.");
        println!();

        println!("Transport Configuration:");
        println!("  TOLLGATE_HTTP_HOST=<host>             HTTP host [default: 127.0.0.1]");
        println!("  TOLLGATE_HTTP_PORT=<port>             HTTP port [default: 8080]");
        println!();

        println!("Rate Limiting Policy:");
        println!(
            "  TOLLGATE_TIERS=<spec>,<spec>          Tier table as name:capacity:refill_rate [default: free:100:1,premium:1000:2]"
        );
        println!("  TOLLGATE_DEFAULT_TIER=<name>          Default tier [default: free]");
        println!(
            "  TOLLGATE_IDLE_TTL=<secs>              Idle TTL for dormant buckets [default: 3600]"
        );
        println!(
            "  TOLLGATE_FALLBACK=<mode>              fail-open or fail-closed [default: fail-open]"
        );
        println!(
            "  TOLLGATE_FALLBACK_RETRY_AFTER=<secs>  Degraded-mode retry-after [default: 1]"
        );
        println!();

        println!("Store Configuration:");
        println!(
            "  TOLLGATE_STORE=<type>                 Store type: periodic, adaptive [default: periodic]"
        );
        println!(
            "  TOLLGATE_STORE_CAPACITY=<size>        Initial store capacity [default: 100000]"
        );
        println!();
        println!("  For periodic store:");
        println!(
            "    TOLLGATE_STORE_CLEANUP_INTERVAL=<secs>   Sweep interval in seconds [default: 300]"
        );
        println!();
        println!("  For adaptive store:");
        println!(
            "    TOLLGATE_STORE_MIN_INTERVAL=<secs>       Minimum sweep interval [default: 5]"
        );
        println!(
            "    TOLLGATE_STORE_MAX_INTERVAL=<secs>       Maximum sweep interval [default: 300]"
        );
        println!(
            "    TOLLGATE_STORE_MAX_OPERATIONS=<n>        Max operations before sweep [default: 1000000]"
        );
        println!();

        println!("General Configuration:");
        println!("  TOLLGATE_BUFFER_SIZE=<size>           Channel buffer size [default: 100000]");
        println!(
            "  TOLLGATE_LOG_LEVEL=<level>            Log level: error, warn, info, debug, trace [default: info]"
        );
        println!();

        println!("Examples:");
        println!("  # Custom tier table with a fail-closed fallback");
        println!("  export TOLLGATE_TIERS=basic:50:0.5,pro:5000:10");
        println!("  export TOLLGATE_DEFAULT_TIER=basic");
        println!("  export TOLLGATE_FALLBACK=fail-closed");
        println!();
        println!("  # Run server (CLI args override env vars)");
        println!("  tollgate --http-port 9090");
    }
}
