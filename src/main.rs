//! CLI entry point for blog-ignite

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "blog-ignite")]
#[command(version)]
#[command(about = "A statically generated blog over a headless content API", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new blog site
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        folder: PathBuf,
    },

    /// Generate static files
    #[command(alias = "g")]
    Generate {
        /// Ignore the page cache and report every page as changed
        #[arg(short, long)]
        force: bool,
    },

    /// Start the blog server
    #[command(alias = "s")]
    Server {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// IP address to bind to
        #[arg(short, long, default_value = "localhost")]
        ip: String,

        /// Skip the initial generation; pages are generated on request
        #[arg(long)]
        lazy: bool,
    },

    /// Clean the public folder and cache
    Clean,

    /// List site information
    List {
        /// Type of content to list (post, route)
        #[arg(default_value = "post")]
        r#type: String,
    },

    /// Save the content repository to a snapshot file
    Snapshot {
        /// Output file (defaults to content.snapshot or snapshot.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "blog_ignite=debug,info"
    } else {
        "blog_ignite=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine base directory
    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Init { folder } => {
            let target_dir = if folder.is_absolute() {
                folder
            } else {
                base_dir.join(folder)
            };
            tracing::info!("Initializing blog in {:?}", target_dir);
            blog_ignite::commands::init::init_site(&target_dir)?;
            println!("Initialized blog in {:?}", target_dir);
        }

        Commands::Generate { force } => {
            let blog = blog_ignite::Blog::new(&base_dir)?;
            tracing::info!("Generating static files...");
            blog_ignite::commands::generate::run_with_options(&blog, force).await?;
            println!("Generated successfully!");
        }

        Commands::Server { port, ip, lazy } => {
            let blog = blog_ignite::Blog::new(&base_dir)?;

            // Generate first; a failed build still leaves on-demand generation
            if !lazy {
                tracing::info!("Generating static files...");
                if let Err(e) = blog_ignite::commands::generate::run(&blog).await {
                    tracing::warn!("Initial generation failed: {:#}", e);
                }
            }

            tracing::info!("Starting server at http://{}:{}", ip, port);
            blog_ignite::server::start(&blog, &ip, port).await?;
        }

        Commands::Clean => {
            let blog = blog_ignite::Blog::new(&base_dir)?;
            tracing::info!("Cleaning public folder...");
            blog_ignite::commands::clean::run(&blog)?;
            println!("Cleaned successfully!");
        }

        Commands::List { r#type } => {
            let blog = blog_ignite::Blog::new(&base_dir)?;
            blog_ignite::commands::list::run(&blog, &r#type).await?;
        }

        Commands::Snapshot { output } => {
            let blog = blog_ignite::Blog::new(&base_dir)?;
            let path = blog_ignite::commands::snapshot::run(&blog, output.as_deref()).await?;
            println!("Saved snapshot to {:?}", path);
        }

        Commands::Version => {
            println!("blog-ignite version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
