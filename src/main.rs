use clap::{Parser, Subcommand};
use skin_media::attachments::{AttachmentStore, ManifestStore};
use skin_media::config::{self, MediaConfig};
use skin_media::derivatives::{MediaEngine, MediaEvent};
use skin_media::formats::FormatRequest;
use skin_media::imaging::RustBackend;
use skin_media::sizes::{Crop, SizeSpec};
use skin_media::{endpoint, markup, output, pregenerate};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

type Engine = MediaEngine<RustBackend, ManifestStore>;

/// Attachment + size, shared by the lookup commands.
#[derive(clap::Args, Clone)]
struct TargetArgs {
    /// Attachment id
    id: u64,
    /// Preset name (card, hero-m2x), WxH, or "full"
    size: SizeSpec,
    /// Override the preset's crop: true, false, or "left,top"
    #[arg(long)]
    crop: Option<Crop>,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "skin-media")]
#[command(about = "Image derivative resolution and caching for theme media")]
#[command(long_about = "\
Image derivative resolution and caching for theme media

Attachments are listed in an attachments.json manifest inside the upload
directory. Derivatives are generated on first request and stored next to
each other, one file per format:

  uploads/
  ├── attachments.json                     # {\"attachments\": [{\"id\": 42, \"file\": \"2024/05/photo.jpg\"}]}
  ├── 2024/05/photo.jpg                    # Source
  └── skin-sizes/42/2024/05/
      ├── photo-600x400-c.jpg              # original (source format)
      ├── photo-600x400-c.webp             # webp
      └── photo-1920x1080-c.webp

Lookup order: webp → jpeg → png → original. The filename is the cache key;
delete a file (or run purge) to regenerate it.

Run 'skin-media gen-config' to generate a documented skin-media.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the best derivative for a size, generating it if needed
    Resolve {
        #[command(flatten)]
        target: TargetArgs,
        /// best, webp, jpeg, png, or original
        #[arg(long, default_value = "best")]
        format: FormatRequest,
    },
    /// List every available format for a size
    Formats(TargetArgs),
    /// Render <picture> markup for a size and its density variants
    Picture {
        /// Attachment id
        id: u64,
        /// Preset name
        size: String,
        #[arg(long, default_value = "")]
        alt: String,
        /// Value of the sizes attribute
        #[arg(long, default_value = "100vw")]
        sizes: String,
    },
    /// Answer a /media/resize/{id}?size=&format=&crop= request as JSON
    Request {
        /// Request target, e.g. "/media/resize/42?size=card"
        target: String,
        #[arg(long, default_value = "GET")]
        method: String,
    },
    /// Generate derivatives ahead of time (default: every attachment at every preset)
    Pregenerate {
        /// Attachment ids (repeatable)
        #[arg(long = "id")]
        ids: Vec<u64>,
        /// Sizes (repeatable)
        #[arg(long = "size")]
        sizes: Vec<SizeSpec>,
    },
    /// List derivative files of an attachment
    List {
        /// Attachment id
        id: u64,
    },
    /// Map a public upload URL to its file
    Locate { url: String },
    /// Delete every derivative of an attachment
    Purge {
        /// Attachment id
        id: u64,
    },
    /// Delete every derivative of every attachment
    PurgeAll,
    /// Show registered size presets
    Sizes,
    /// Print a stock skin-media.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    run(cli.command, &cli.config)
}

fn run(command: Command, config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Resolve { target, format } => {
            let engine = open_engine(config_path)?;
            let found = engine.get_src_format(target.id, &target.size, format, target.crop);
            let spec = engine.resolve_size(&target.size, target.crop);
            output::print_resolved(
                target.id,
                &target.size.to_string(),
                spec.as_ref(),
                found.as_ref(),
            );
        }
        Command::Formats(target) => {
            let engine = open_engine(config_path)?;
            let formats = engine.get_all_formats(target.id, &target.size, target.crop);
            let spec = engine.resolve_size(&target.size, target.crop);
            output::print_formats(
                target.id,
                &target.size.to_string(),
                spec.as_ref(),
                &formats,
            );
        }
        Command::Picture {
            id,
            size,
            alt,
            sizes,
        } => {
            let engine = open_engine(config_path)?;
            let markup = markup::render_responsive(&engine, id, &size, &alt, &sizes)
                .ok_or_else(|| format!("no derivative for attachment {id} at size {size}"))?;
            println!("{}", markup.into_string());
        }
        Command::Request { target, method } => {
            let engine = open_engine(config_path)?;
            let response = endpoint::handle(&engine, &method, &target);
            println!("{}", response.status);
            println!("{}", serde_json::to_string_pretty(&response.body)?);
        }
        Command::Pregenerate { ids, sizes } => {
            let config = load_config(config_path)?;
            init_thread_pool(&config.processing);
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    if let MediaEvent::DerivativeCreated { .. } = event {
                        for line in output::format_media_event(&event) {
                            println!("{}", line);
                        }
                    }
                }
            });
            let (report, cache_stats) = {
                let engine = build_engine(&config)?.with_events(tx);
                let ids = if ids.is_empty() {
                    engine.store().ids()
                } else {
                    ids
                };
                let sizes = if sizes.is_empty() {
                    pregenerate::registered_sizes(engine.sizes())
                } else {
                    sizes
                };
                (
                    pregenerate::pregenerate(&engine, &ids, &sizes),
                    engine.cache_stats(),
                )
            };
            printer
                .join()
                .map_err(|_| "event printer thread panicked")?;
            output::print_pregenerate_report(&report);
            println!("Cache: {}", cache_stats);
        }
        Command::List { id } => {
            let engine = open_engine(config_path)?;
            let files = engine.list_derivatives(id);
            output::print_derivative_list(id, &files, engine.paths().derivative_root());
        }
        Command::Locate { url } => {
            let engine = open_engine(config_path)?;
            let path = engine.paths().path_for_url(&url);
            output::print_located(&url, path.as_deref());
        }
        Command::Purge { id } => {
            let engine = open_engine(config_path)?;
            engine.delete_attachment_derivatives(id)?;
            for line in output::format_media_event(&MediaEvent::DerivativesPurged {
                attachment_id: id,
            }) {
                println!("{}", line);
            }
        }
        Command::PurgeAll => {
            let engine = open_engine(config_path)?;
            engine.delete_all_derivatives()?;
            println!("Purged {}", engine.paths().derivative_root().display());
        }
        Command::Sizes => {
            let engine = open_engine(config_path)?;
            output::print_sizes(engine.sizes(), engine.native_sizes());
        }
        Command::GenConfig => print!("{}", config::stock_config_toml()),
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<MediaConfig, config::ConfigError> {
    let config = config::load_config(path)?;
    debug!(config = %path.display(), upload_dir = %config.paths.upload_dir, "loaded config");
    Ok(config)
}

fn open_engine(config_path: &Path) -> Result<Engine, Box<dyn std::error::Error>> {
    build_engine(&load_config(config_path)?)
}

/// Engine over the real backend and the configured attachment manifest.
fn build_engine(config: &MediaConfig) -> Result<Engine, Box<dyn std::error::Error>> {
    let upload_dir = Path::new(&config.paths.upload_dir);
    let store = ManifestStore::load(upload_dir, &upload_dir.join(&config.paths.attachments))?;
    debug!(attachments = store.len(), "loaded attachment manifest");
    Ok(MediaEngine::new(RustBackend::new(), store, config))
}

/// `RUST_LOG` wins; otherwise `-v` selects debug and `-q` selects warn.
fn init_tracing(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("skin_media={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
