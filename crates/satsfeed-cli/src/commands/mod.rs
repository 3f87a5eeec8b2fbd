mod chart;
mod dca;
mod exchanges;
mod history;
mod price;
mod watch;

use std::sync::Arc;
use std::time::Instant;

use satsfeed_core::{
    Clock, FeedConfig, FeedStatus, FileStore, HttpClient, KeyValueStore, MemoryStore,
    PriceService, ProviderId, ReqwestHttpClient, Served, SystemClock,
};
use serde_json::Value;
use tracing::debug;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::metadata::{Envelope, Metadata};

/// Shared wiring for one CLI invocation.
pub struct Context {
    pub config: FeedConfig,
    pub client: Arc<dyn HttpClient>,
    pub service: PriceService,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let config = apply_flags(FeedConfig::from_env()?, cli);

        let store: Arc<dyn KeyValueStore> = if cli.no_cache {
            Arc::new(MemoryStore::new())
        } else {
            let dir = config.resolve_cache_dir();
            debug!(dir = %dir.display(), "using file cache");
            Arc::new(FileStore::open(dir)?)
        };
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
        let service = config.build_service(Arc::clone(&client), store, clock);

        Ok(Self {
            config,
            client,
            service,
        })
    }
}

fn apply_flags(mut config: FeedConfig, cli: &Cli) -> FeedConfig {
    if let Some(timeout_ms) = cli.timeout_ms {
        config = config.with_timeout_ms(timeout_ms);
    }
    if let Some(retries) = cli.retries {
        config = config.with_retries(retries);
    }
    if let Some(dir) = &cli.cache_dir {
        config = config.with_cache_dir(dir);
    }
    if let Some(url) = &cli.backend_url {
        config = config.with_backend_url(url);
    }
    config
}

#[derive(Debug)]
pub struct CommandResult {
    pub data: Value,
    pub source_chain: Vec<ProviderId>,
    pub source: Option<ProviderId>,
    pub status: Option<FeedStatus>,
    pub stale: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            source_chain: Vec::new(),
            source: None,
            status: None,
            stale: false,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Copies provenance from a service read; per-source failures become errors.
    pub fn with_served<T>(mut self, served: &Served<T>) -> Self {
        self.source_chain = served
            .failures
            .iter()
            .map(|failure| failure.provider)
            .chain(served.source)
            .collect();
        self.source = served.source;
        self.status = Some(served.status);
        self.stale = served.stale;
        self.errors
            .extend(served.failures.iter().map(ToString::to_string));
        self
    }

    pub fn with_status(mut self, status: FeedStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_source_chain(mut self, source_chain: Vec<ProviderId>) -> Self {
        self.source_chain = source_chain;
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors.extend(errors);
        self
    }
}

/// Runs the selected command. `watch` streams its own output and returns `None`.
pub async fn run(cli: &Cli) -> Result<Option<Envelope<Value>>, CliError> {
    let context = Context::from_cli(cli)?;
    let started = Instant::now();

    let command_result = match &cli.command {
        Command::Price => price::run(&context).await?,
        Command::History(args) => history::run(args, &context).await?,
        Command::Chart(args) => chart::run(args, &context).await?,
        Command::Exchanges => exchanges::run(&context).await?,
        Command::Dca(args) => dca::run(args, &context).await?,
        Command::Watch(args) => {
            watch::run(args, &context).await?;
            return Ok(None);
        }
    };

    let CommandResult {
        data,
        source_chain,
        source,
        status,
        stale,
        warnings,
        errors,
    } = command_result;

    let mut meta = Metadata::new(started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64);
    meta.source_chain = source_chain;
    meta.source = source;
    meta.status = status;
    meta.stale = stale;
    for warning in warnings {
        meta.push_warning(warning);
    }

    Ok(Some(Envelope { meta, data, errors }))
}
