use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    apibridge_gateway::server::start_gateway,
    apibridge_proxy::{McpProxy, OpenApiSpec, ProxyError},
};

#[derive(Parser)]
#[command(name = "apibridge", about = "apibridge: serve an OpenAPI-backed MCP server over SSE")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bridge server.
    Serve {
        /// OpenAPI document to bridge (overrides the config file).
        #[arg(long)]
        spec: Option<PathBuf>,
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Upstream base URL (overrides the document's servers entry).
        #[arg(long, env = "APIBRIDGE_BASE_URL")]
        base_url: Option<String>,
    },
    /// Validate an OpenAPI document without serving.
    Check {
        spec: PathBuf,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let result = match cli.command {
        Commands::Serve {
            spec,
            bind,
            port,
            base_url,
        } => serve(spec, bind, port, base_url).await,
        Commands::Check { spec } => check(&spec),
    };

    if let Err(e) = result {
        report_fatal(&e);
        std::process::exit(1);
    }
}

async fn serve(
    spec: Option<PathBuf>,
    bind: Option<String>,
    port: Option<u16>,
    base_url: Option<String>,
) -> anyhow::Result<()> {
    let mut config = apibridge_config::discover_and_load();
    if let Some(bind) = bind {
        config.bind = bind;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(base_url) = base_url {
        config.base_url = Some(base_url);
    }

    let spec_path = spec
        .or_else(|| config.spec_path.clone())
        .ok_or_else(|| anyhow::anyhow!("no OpenAPI document: pass --spec or set spec_path in the config file"))?;

    info!(version = env!("CARGO_PKG_VERSION"), spec = %spec_path.display(), "apibridge starting");
    start_gateway(config, &spec_path).await
}

fn check(spec_path: &std::path::Path) -> anyhow::Result<()> {
    let spec = OpenApiSpec::load(spec_path)?;
    spec.validate().map_err(ProxyError::from)?;
    // Building the proxy also verifies a usable base URL exists.
    let proxy = McpProxy::from_spec(&spec, std::env::var("APIBRIDGE_BASE_URL").ok().as_deref())?;
    println!(
        "{}: ok ({} tools, upstream {})",
        spec_path.display(),
        proxy.tools().len(),
        proxy.server_info().name
    );
    Ok(())
}

/// Render a fatal startup error. Validation failures list every problem;
/// anything else prints the error chain.
fn report_fatal(e: &anyhow::Error) {
    if let Some(ProxyError::Validation(v)) = e.downcast_ref::<ProxyError>() {
        eprintln!("invalid OpenAPI document:");
        for problem in &v.problems {
            eprintln!("  - {problem}");
        }
        return;
    }
    eprintln!("error: {e:#}");
}
