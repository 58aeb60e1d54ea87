//! qrtist command-line entrypoint

use clap::{Args, Parser, Subcommand};
use qrtist::output::{self, Rendered};
use qrtist::{
    AppState, Compositor, Error, FreemiumGate, QrtistConfig, Registry, Result, Server, encode_png,
    logging,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "qrtist",
    version,
    about = "Artistic QR codes backed by tracked short links"
)]
struct Cli {
    /// Optional configuration file (toml/yaml). Defaults to qrtist.{toml,yaml} in cwd/XDG config.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the SQLite database path
    #[arg(long, global = true, value_name = "PATH")]
    database: Option<PathBuf>,

    /// Output results as formatted JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new short link for a target URL
    Create {
        /// Absolute http(s) URL to redirect to
        url: String,
    },
    /// Resolve a short link, recording a scan
    Resolve {
        /// Short link id
        id: String,
        /// User-agent to record with the scan
        #[arg(long, value_name = "UA")]
        user_agent: Option<String>,
    },
    /// Delete a short link and all of its scans
    Delete {
        /// Short link id
        id: String,
    },
    /// List short links, newest first
    List,
    /// Show scan history for one short link
    Show {
        /// Short link id
        id: String,
    },
    /// Composite a QR code onto a background image
    Render(RenderArgs),
    /// Confirm a pro purchase for this instance
    Upgrade,
    /// Serve the redirect endpoint and JSON API
    Serve {
        /// Override the bind address (e.g. 0.0.0.0:9233)
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Background illustration (PNG, JPEG, ...)
    #[arg(long, value_name = "PATH")]
    background: PathBuf,

    /// Encode the short URL of an existing link
    #[arg(long, value_name = "ID", conflicts_with = "payload", required_unless_present = "payload")]
    id: Option<String>,

    /// Encode arbitrary text instead of a short URL
    #[arg(long, value_name = "TEXT")]
    payload: Option<String>,

    /// Destination PNG file
    #[arg(long, short, value_name = "PATH")]
    output: PathBuf,

    /// Decode the result and fail unless it round-trips
    #[arg(long)]
    verify: bool,

    /// Override the output canvas size in pixels
    #[arg(long, value_name = "PIXELS")]
    size: Option<u32>,
}

struct OutputSink {
    json: bool,
}

impl OutputSink {
    fn emit(&self, rendered: &Rendered) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(&rendered.json)?);
        } else {
            for line in &rendered.human {
                println!("{line}");
            }
        }
        Ok(())
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = QrtistConfig::load(cli.config.as_deref())?;
    if let Some(ref database) = cli.database {
        config.registry.database = database.clone();
    }

    logging::init(&config.logging)?;

    let sink = OutputSink { json: cli.json };

    match cli.command {
        Command::Create { url } => {
            let registry = Registry::open(&config.registry.database)?;
            let link = registry.create_link(&url)?;
            sink.emit(&output::render_created(&link, &config.registry))
        }
        Command::Resolve { id, user_agent } => {
            let registry = Registry::open(&config.registry.database)?;
            let target = registry.resolve_link(&id, user_agent.as_deref())?;
            sink.emit(&Rendered {
                json: json!({ "id": id, "target_url": target }),
                human: vec![target],
            })
        }
        Command::Delete { id } => {
            let registry = Registry::open(&config.registry.database)?;
            if !registry.delete_link(&id)? {
                return Err(Error::NotFound(id));
            }
            sink.emit(&Rendered {
                json: json!({ "id": id, "deleted": true }),
                human: vec![format!("Deleted short link {id}")],
            })
        }
        Command::List => {
            let registry = Registry::open(&config.registry.database)?;
            let status = registry.pro_status()?;
            let gate = FreemiumGate::new(config.registry.visible_limit);
            let listing = gate.apply(registry.list_links()?, &status);
            sink.emit(&output::render_listing(
                &listing,
                status.is_pro(),
                &config.registry,
            ))
        }
        Command::Show { id } => {
            let registry = Registry::open(&config.registry.database)?;
            let detail = registry.get_detail(&id)?;
            sink.emit(&output::render_detail(&detail, &config.registry))
        }
        Command::Render(args) => handle_render(&config, &args, &sink),
        Command::Upgrade => {
            let registry = Registry::open(&config.registry.database)?;
            let status = registry.pro_status()?;
            let changed = registry.confirm_purchase(&status)?;
            let message = if changed {
                "Pro unlocked: full link history is now visible"
            } else {
                "Pro was already active"
            };
            sink.emit(&Rendered {
                json: json!({ "is_pro": true, "changed": changed }),
                human: vec![message.to_string()],
            })
        }
        Command::Serve { bind } => {
            let registry = Arc::new(Registry::open(&config.registry.database)?);
            let status = registry.pro_status()?;
            let addr = bind.unwrap_or_else(|| config.server.socket_address());
            let state = AppState::new(registry, status, &config);
            Server::bind(&addr, state)?.run().await
        }
    }
}

fn handle_render(config: &QrtistConfig, args: &RenderArgs, sink: &OutputSink) -> Result<()> {
    let mut render = config.render_config()?;
    if args.verify {
        render.verify = true;
    }
    if let Some(size) = args.size {
        render.output_size = size;
    }
    let compositor = Compositor::new(render)?;

    let payload = match (&args.id, &args.payload) {
        (Some(id), _) => {
            let registry = Registry::open(&config.registry.database)?;
            let link = registry.get_link(id)?;
            config.registry.short_url(&link.id)
        }
        (None, Some(payload)) => payload.clone(),
        (None, None) => {
            return Err(Error::InvalidInput(
                "either --id or --payload is required".to_string(),
            ));
        }
    };

    let started = Instant::now();
    let background = read_file(&args.background)?;
    let image = compositor.compose_bytes(&background, &payload)?;
    let png = encode_png(&image)?;
    std::fs::write(&args.output, &png)?;
    info!(
        output = %args.output.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Rendered QR image"
    );

    sink.emit(&Rendered {
        json: json!({
            "payload": payload,
            "output": args.output.display().to_string(),
            "size": image.width(),
            "bytes": png.len(),
            "verified": compositor.config().verify,
        }),
        human: vec![
            format!("Wrote {} ({}x{})", args.output.display(), image.width(), image.height()),
            format!("  Payload: {payload}"),
        ],
    })
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to read {}: {e}", path.display()),
        ))
    })
}
