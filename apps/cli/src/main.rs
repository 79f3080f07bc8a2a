mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "A static site generator with pluggable themes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Build {
        /// Site root; config, content and output paths resolve against it
        #[arg(long, short, default_value = ".")]
        root: PathBuf,

        /// Config file to use instead of folio.toml / folio.json
        #[arg(long, short)]
        config: Option<PathBuf>,

        #[arg(long)]
        site_title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        base_url: Option<String>,

        #[arg(long)]
        content_dir: Option<String>,

        #[arg(long, short)]
        out_dir: Option<String>,

        #[arg(long, short)]
        theme: Option<String>,
    },
}

fn main() {
    folio_ssg::logging::init_logging();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build {
            root,
            config,
            site_title,
            description,
            base_url,
            content_dir,
            out_dir,
            theme,
        } => commands::build_site(
            &root,
            config.as_deref(),
            folio_ssg::ConfigOverrides {
                site_title,
                description,
                base_url,
                content_dir,
                out_dir,
                theme,
            },
        ),
    };

    if let Err(error) = result {
        log::error!(target: "build", "{error}");
        std::process::exit(1);
    }
}
