use std::{path::PathBuf, sync::Arc};

use {
    anyhow::{Context, Result},
    clap::Parser,
    remoting_config::Config,
    remoting_crud::{Crud, NoHooks, register_crud},
    remoting_gateway::{
        ActionRegistry, Outcome, handler_fn,
        auth::TokenAuth,
        descriptor::ProviderSettings,
        dispatcher::Dispatcher,
        polling::PollingRegistry,
        server::{RemotingState, serve},
    },
    remoting_store::{MemoryRecordStore, StoreAdapter},
    serde_json::json,
    tracing::{info, warn},
    tracing_subscriber::EnvFilter,
};

/// Polling event answering the current server time.
const HEARTBEAT_EVENT: &str = "heartbeat";

/// Serve record stores to rich clients over batched JSON remoting calls.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Config file; defaults to ./remoting.toml, then the user config dir.
    #[arg(long, env = "REMOTING_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind the HTTP server to.
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on.
    #[arg(long)]
    port: Option<u16>,

    /// Re-raise handler failures to the transport as HTTP 500.
    #[arg(long)]
    debug: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut config = remoting_config::load(args.config.as_deref()).context("failed to load config")?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.server.debug |= args.debug;

    let state = build_state(&config)?;
    serve(Arc::new(state), &config.server.bind, config.server.port).await
}

/// Wire every configured model into the registry and assemble the server
/// state.
fn build_state(config: &Config) -> Result<RemotingState> {
    let mut registry = ActionRegistry::new();
    for model in &config.models {
        let record_type = model.record_type()?;
        let seed = model.seed_records()?;
        let seeded = seed.len();
        let store = MemoryRecordStore::with_records(record_type, seed)
            .with_context(|| format!("failed to seed model {}", model.name))?;
        let adapter = StoreAdapter::new(Arc::new(store), model.store_config(&config.store)?);
        let crud = Crud::new(adapter, model.crud.clone(), Arc::new(NoHooks));
        register_crud(&mut registry, model.action_name(), Arc::new(crud));
        info!(model = %model.name, action = %model.action_name(), seeded, "model registered");
    }

    let mut auth = TokenAuth::new();
    for token in &config.auth.tokens {
        auth = auth.with_token(&token.token, token.permissions.iter().cloned());
    }
    if auth.is_empty() {
        warn!("no auth tokens configured, every caller is anonymous");
    }

    let mut polling = PollingRegistry::new();
    polling.register(
        HEARTBEAT_EVENT,
        handler_fn(|_request| async { Outcome::Ok(json!({ "time": chrono::Utc::now().to_rfc3339() })) }),
        false,
        None,
    );

    let provider = &config.provider;
    Ok(RemotingState {
        dispatcher: Dispatcher::new(Arc::new(registry)).with_debug(config.server.debug),
        polling: Arc::new(polling),
        auth: Arc::new(auth),
        provider: ProviderSettings {
            url: provider.url.clone(),
            namespace: provider.namespace.clone(),
            descriptor: provider.descriptor.clone(),
            id: provider.id.clone(),
        },
        debug: config.server.debug,
        version: env!("CARGO_PKG_VERSION").into(),
    })
}
