use anyhow::{Context, bail};
use clap::Parser;
use core::time::Duration;
use std::{collections::HashMap, net::SocketAddr};

/// Runtime configuration for the `consignment-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first), with defaults matching the reference
/// deployment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "consignment-server",
    version,
    about = "A gRPC service for registering and listing consignments"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Per-request deadline enforced by the server, in milliseconds. Requests
    /// that exceed it are dropped and the client receives `CANCELLED`.
    /// `0` disables the deadline.
    ///
    /// Environment variable: `REQUEST_TIMEOUT_MS`
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = 0)]
    pub request_timeout_ms: u64,

    /// Maximum number of concurrent requests served on a single HTTP/2
    /// connection. `0` leaves it unbounded.
    ///
    /// Environment variable: `CONCURRENCY_LIMIT`
    #[arg(long, env = "CONCURRENCY_LIMIT", default_value_t = 0)]
    pub concurrency_limit: usize,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: SocketAddr,
    pub request_timeout: Option<Duration>,
    pub concurrency_limit: Option<usize>,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let server_addr = args
            .server_addr
            .parse()
            .with_context(|| format!("SERVER_ADDR ({}) is not a socket address", args.server_addr))?;

        Ok(Self {
            server_addr,
            request_timeout: (args.request_timeout_ms > 0)
                .then(|| Duration::from_millis(args.request_timeout_ms)),
            concurrency_limit: (args.concurrency_limit > 0).then_some(args.concurrency_limit),
        })
    }
}

/// Command-line flags read by [`MicroService::init`].
///
/// Every flag is optional; anything left unset keeps the value given in code
/// through [`Options`].
///
/// [`MicroService::init`]: crate::server::micro::MicroService::init
/// [`Options`]: crate::server::micro::Options
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "consignment-micro",
    version,
    about = "Managed consignment service registered under a discoverable name"
)]
pub struct MicroArgs {
    /// Logical name the service registers under.
    ///
    /// Environment variable: `MICRO_SERVER_NAME`
    #[arg(long, env = "MICRO_SERVER_NAME")]
    pub server_name: Option<String>,

    /// Version string published alongside the name.
    ///
    /// Environment variable: `MICRO_SERVER_VERSION`
    #[arg(long, env = "MICRO_SERVER_VERSION")]
    pub server_version: Option<String>,

    /// Bind address. A port of `0` lets the OS choose; the bound address is
    /// what gets registered.
    ///
    /// Environment variable: `MICRO_SERVER_ADDRESS`
    #[arg(long, env = "MICRO_SERVER_ADDRESS")]
    pub server_address: Option<String>,

    /// Address published to the registry instead of the bound one, for
    /// wildcard binds that other hosts cannot dial.
    ///
    /// Environment variable: `MICRO_SERVER_ADVERTISE`
    #[arg(long, env = "MICRO_SERVER_ADVERTISE")]
    pub server_advertise: Option<String>,

    /// Node metadata as `key=value`, repeatable or comma separated.
    ///
    /// Environment variable: `MICRO_SERVER_METADATA`
    #[arg(long, env = "MICRO_SERVER_METADATA", value_delimiter = ',')]
    pub server_metadata: Vec<String>,
}

impl MicroArgs {
    /// Parses `server_metadata` entries into a map.
    ///
    /// # Errors
    ///
    /// Fails on entries without `=` or with an empty key.
    pub fn metadata(&self) -> anyhow::Result<HashMap<String, String>> {
        self.server_metadata
            .iter()
            .map(|entry| match entry.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    Ok((key.trim().to_string(), value.trim().to_string()))
                }
                _ => bail!("metadata entry `{entry}` must be `key=value`"),
            })
            .collect()
    }
}
