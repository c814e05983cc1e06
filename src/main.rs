use clap::{Parser, Subcommand};
use lazy_thumbnails::imaging::RustBackend;
use lazy_thumbnails::{config, output, pipeline, runtime};
use std::path::{Path, PathBuf};

/// Config file flag shared by commands that read configuration.
#[derive(clap::Args, Clone)]
struct ConfigArgs {
    /// Config file (default: ./thumbnails.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Per-run overrides of config file values.
#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// Built site directory, processed in place
    dir: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,

    /// Encoder quality (1-100)
    #[arg(long, allow_negative_numbers = true)]
    quality: Option<i64>,

    /// Thumbnail bounding box width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Thumbnail bounding box height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Thumbnail format: auto, png, webp or jpeg
    #[arg(long)]
    format: Option<String>,

    /// Skip images at or below this size in KB
    #[arg(long = "min-size")]
    min_size: Option<u64>,
}

impl BuildArgs {
    /// Flags given on the command line as a config layer.
    fn overrides(&self) -> toml::Value {
        let mut table = toml::map::Map::new();
        if let Some(quality) = self.quality {
            table.insert("quality".into(), toml::Value::Integer(quality));
        }
        if let Some(width) = self.width {
            table.insert("width".into(), toml::Value::Integer(width.into()));
        }
        if let Some(height) = self.height {
            table.insert("height".into(), toml::Value::Integer(height.into()));
        }
        if let Some(format) = &self.format {
            table.insert("format".into(), toml::Value::String(format.to_lowercase()));
        }
        if let Some(min_size) = self.min_size {
            let kb = i64::try_from(min_size).unwrap_or(i64::MAX);
            table.insert("min_size_to_resize".into(), toml::Value::Integer(kb));
        }
        toml::Value::Table(table)
    }
}

#[derive(Parser)]
#[command(name = "lazy-thumbnails")]
#[command(about = "Thumbnail-first image loading for static web builds")]
#[command(long_about = "\
Thumbnail-first image loading for static web builds

Point it at a built site. Every large image gets a small thumbnail next to
it, style sheets and scripts are rewritten to request the thumbnail, and each
page gets a small script that swaps in the original once it has loaded.

  dist/
  ├── index.html                 # + swap controller <script>
  ├── assets/app.js              # \"images/photo.jpg\" → \"images/thumb_photo.jpg\"
  └── images/
      ├── photo.jpg              # original, untouched
      └── thumb_photo.jpg        # generated

Images at or below 30 KB are left alone. Running the build twice is safe.

Run 'lazy-thumbnails gen-config' to generate a documented thumbnails.toml.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate thumbnails and rewrite references in a built site
    Build(BuildArgs),
    /// Print the swap controller script rendered for the current config
    Runtime(ConfigArgs),
    /// Print a stock thumbnails.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Build(args) => {
            let thumbnail_config = resolve_config(&args.config, Some(args.overrides()))?;
            init_thread_pool(&thumbnail_config.processing);

            println!("==> Building {}", args.dir.display());
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_build_event(&event);
                }
            });
            let summary =
                pipeline::build_dir(&args.dir, &thumbnail_config, &RustBackend::new(), Some(tx))?;
            printer.join().map_err(|_| "output thread panicked")?;

            output::print_summary(&summary);
            println!("==> Build complete: {}", args.dir.display());
        }
        Command::Runtime(args) => {
            let thumbnail_config = resolve_config(&args, None)?;
            print!("{}", runtime::render_runtime(&thumbnail_config));
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Stock defaults, then the config file, then command-line overrides.
///
/// An explicitly named config file must exist; the default one is optional.
fn resolve_config(
    args: &ConfigArgs,
    overrides: Option<toml::Value>,
) -> Result<config::ThumbnailConfig, Box<dyn std::error::Error>> {
    let file_layer = match &args.config {
        Some(path) => Some(
            config::load_raw_config(path)?
                .ok_or_else(|| format!("config file not found: {}", path.display()))?,
        ),
        None => config::load_raw_config(Path::new(config::CONFIG_FILENAME))?,
    };
    Ok(config::resolve_config(
        file_layer.into_iter().chain(overrides),
    )?)
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
