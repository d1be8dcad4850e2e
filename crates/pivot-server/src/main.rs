use anyhow::Result;
use clap::{Parser, Subcommand};
use pivot::config::{self, GeneratorKind, ProviderKind, ServeArgs};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pivot")]
#[command(about = "Opposing-viewpoint search, summaries and insights over HTTP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server.
    Serve(ServeArgs),
    /// Report which credentials are configured (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

async fn serve(args: ServeArgs) -> Result<()> {
    let state = Arc::new(config::build_state(&args)?);
    let app = pivot::routes::build_router(state);

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "pivot server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

fn doctor(args: DoctorCmd) -> Result<()> {
    let t0 = std::time::Instant::now();
    let client = pivot_local::http_client()?;

    let mut providers = serde_json::Map::new();
    for kind in ProviderKind::ALL {
        let ok = config::provider_from_env(kind, client.clone()).is_ok();
        providers.insert(kind.as_str().to_string(), serde_json::json!(ok));
    }
    let claude = config::generator_from_env(GeneratorKind::Claude, client.clone(), None).is_ok();
    let openai_compat =
        config::generator_from_env(GeneratorKind::OpenaiCompat, client, None).is_ok();

    let v = serde_json::json!({
        "schema_version": pivot::SCHEMA_VERSION,
        "kind": "doctor",
        "ok": true,
        "name": "pivot",
        "version": env!("CARGO_PKG_VERSION"),
        "elapsed_ms": t0.elapsed().as_millis() as u64,
        "configured": {
            "generators": { "claude": claude, "openai_compat": openai_compat },
            "providers": providers,
        },
    });
    match args.output.to_ascii_lowercase().as_str() {
        "text" => {
            println!("pivot {}", env!("CARGO_PKG_VERSION"));
            println!("claude: {claude}");
            println!("openai_compat: {openai_compat}");
            for kind in ProviderKind::ALL {
                println!("{}: {}", kind.as_str(), v["configured"]["providers"][kind.as_str()]);
            }
        }
        _ => println!("{v}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    config::load_env_file();

    // Logs go to stderr so `doctor`/`version` stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => serve(args).await?,
        Commands::Doctor(args) => doctor(args)?,
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": pivot::SCHEMA_VERSION,
                "kind": "version",
                "ok": true,
                "name": "pivot",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("pivot {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{v}"),
            }
        }
    }
    Ok(())
}
