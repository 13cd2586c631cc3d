use super::{
    error::{MicroError, Result},
    registry::{MemoryRegistry, Node, Registry, ServiceRecord},
};
use crate::server::{config::MicroArgs, shutdown::shutdown_signal};
use clap::Parser;
use std::{
    collections::HashMap,
    ffi::OsString,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::service::RoutesBuilder;
use tonic::transport::Server;
use tonic_health::{ServingStatus, server::HealthReporter};

/// Default bind address: all interfaces, OS-assigned port.
pub const DEFAULT_ADDRESS: &str = "0.0.0.0:0";

static NODE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Identity and wiring of a managed service.
#[derive(Debug, Clone)]
pub struct Options {
    pub name: String,
    pub version: String,
    pub address: String,
    /// Published node address. Falls back to the bound address.
    pub advertise: Option<String>,
    pub metadata: HashMap<String, String>,
    pub registry: Arc<dyn Registry>,
}

impl Options {
    /// Options for `name`/`version` with the default address and a fresh
    /// [`MemoryRegistry`].
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            address: DEFAULT_ADDRESS.to_string(),
            advertise: None,
            metadata: HashMap::new(),
            registry: Arc::new(MemoryRegistry::new()),
        }
    }

    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    #[must_use]
    pub fn with_advertise(mut self, advertise: impl Into<String>) -> Self {
        self.advertise = Some(advertise.into());
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Framework-owned gRPC server that handlers are registered on.
///
/// Holds the route table, the list of served endpoint names and the
/// shutdown token handed to every request context.
pub struct MicroServer {
    pub(super) routes: RoutesBuilder,
    pub(super) endpoints: Vec<String>,
    pub(super) shutdown: CancellationToken,
    health_reporter: HealthReporter,
}

impl MicroServer {
    fn new() -> Self {
        let (health_reporter, health_service) = tonic_health::server::health_reporter();
        let mut routes = RoutesBuilder::default();
        routes.add_service(health_service);

        Self {
            routes,
            endpoints: Vec::new(),
            shutdown: CancellationToken::new(),
            health_reporter,
        }
    }

    /// Fully-qualified names of the gRPC services registered so far.
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }
}

/// A named, versioned service that registers itself for discovery while it
/// runs.
///
/// ```rust,ignore
/// let mut srv = MicroService::new(Options::new("consignment", "latest"));
/// srv.init()?;
/// register_shipping_service_handler(srv.server(), handler);
/// srv.run().await?;
/// ```
pub struct MicroService {
    options: Options,
    server: MicroServer,
}

impl MicroService {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            server: MicroServer::new(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Applies command-line flags and environment overrides to the options.
    /// Exits the process on unparseable flags.
    ///
    /// # Errors
    ///
    /// Fails on malformed metadata entries.
    pub fn init(&mut self) -> anyhow::Result<()> {
        self.apply(MicroArgs::parse())
    }

    /// Like [`Self::init`], parsing `args` instead of the process arguments.
    ///
    /// # Errors
    ///
    /// Fails on unknown flags or malformed metadata entries.
    pub fn init_from<I, T>(&mut self, args: I) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        self.apply(MicroArgs::try_parse_from(args)?)
    }

    /// Overrides options with every flag present in `args`.
    ///
    /// # Errors
    ///
    /// Fails on malformed metadata entries; options are left unchanged.
    pub fn apply(&mut self, args: MicroArgs) -> anyhow::Result<()> {
        self.options.metadata.extend(args.metadata()?);
        if let Some(name) = args.server_name {
            self.options.name = name;
        }
        if let Some(version) = args.server_version {
            self.options.version = version;
        }
        if let Some(address) = args.server_address {
            self.options.address = address;
        }
        if let Some(advertise) = args.server_advertise {
            self.options.advertise = Some(advertise);
        }
        Ok(())
    }

    pub fn server(&mut self) -> &mut MicroServer {
        &mut self.server
    }

    /// Runs until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// See [`Self::run_until`].
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Binds, registers with the registry, serves until `signal` resolves,
    /// then deregisters.
    ///
    /// # Errors
    ///
    /// - [`MicroError::NoHandlers`] if nothing was registered on the server.
    /// - [`MicroError::Bind`] if the address cannot be bound.
    /// - [`MicroError::Registry`] if registration or deregistration fails.
    /// - [`MicroError::Transport`] if the serve loop fails.
    pub async fn run_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Self { options, server } = self;
        let MicroServer {
            routes,
            endpoints,
            shutdown,
            health_reporter,
        } = server;

        if endpoints.is_empty() {
            return Err(MicroError::NoHandlers(options.name));
        }

        let bind_err = |source: std::io::Error| MicroError::Bind {
            address: options.address.clone(),
            source,
        };
        let listener = TcpListener::bind(&options.address).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        let record = ServiceRecord {
            name: options.name.clone(),
            version: options.version.clone(),
            endpoints,
            nodes: vec![Node {
                id: format!(
                    "{}-{}-{}",
                    options.name,
                    std::process::id(),
                    NODE_SEQ.fetch_add(1, Ordering::Relaxed)
                ),
                address: options
                    .advertise
                    .clone()
                    .unwrap_or_else(|| local_addr.to_string()),
                metadata: options.metadata.clone(),
            }],
        };
        options.registry.register(&record)?;

        for endpoint in &record.endpoints {
            health_reporter
                .set_service_status(endpoint, ServingStatus::Serving)
                .await;
        }
        tracing::info!(
            name = %record.name,
            version = %record.version,
            node = %record.nodes[0].id,
            "Starting managed service on {local_addr}"
        );

        let on_shutdown = async {
            signal.await;
            tracing::info!("Shutdown signal received, deregistering {}", record.name);
            for endpoint in &record.endpoints {
                health_reporter
                    .set_service_status(endpoint, ServingStatus::NotServing)
                    .await;
            }
            shutdown.cancel();
        };

        let served = Server::builder()
            .add_routes(routes.routes())
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), on_shutdown)
            .await;
        let deregistered = options.registry.deregister(&record);

        served?;
        deregistered?;
        tracing::info!("Managed service {} stopped", record.name);
        Ok(())
    }
}
