//! Courseware CLI - build, translate and smoke-test courses.

mod colors;
mod course;
mod describe;
mod jobs;
mod publish;
mod resources;
mod translate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "courseware")]
#[command(about = "Build, translate and smoke-test courseware notebooks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory that workspace paths are resolved against
    #[arg(short, long, global = true, default_value = ".")]
    workspace: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the build configuration and its notebooks
    Describe {
        /// Path to build-config.json
        config: PathBuf,
    },

    /// Publish the student and solution notebooks of a course
    Publish {
        /// Path to build-config.json
        config: PathBuf,

        /// Publish into this workspace directory instead of the default
        #[arg(short, long)]
        target: Option<String>,

        /// Keep the previously published Version Info
        #[arg(long)]
        testing: bool,

        /// Log every cell while rendering
        #[arg(long)]
        debugging: bool,
    },

    /// Write the English resource bundle used by translators
    Resources {
        /// Path to build-config.json
        config: PathBuf,

        /// Name of the bundle folder (default: english-v<version>)
        #[arg(long)]
        folder: Option<String>,

        /// Workspace directory the bundle folder is created in
        #[arg(long)]
        target: Option<String>,
    },

    /// Publish a translated copy of an already published course
    Translate {
        /// Path to build-config.json
        config: PathBuf,

        /// Resource folder of the translation, e.g. japanese-v1.2.3
        #[arg(short, long)]
        language: String,

        /// Published English distribution
        #[arg(long)]
        source: String,

        /// Where the translated distribution is written
        #[arg(long)]
        target: String,
    },

    /// Print the smoke-test job of every testable notebook as JSON
    Jobs {
        /// Path to build-config.json
        config: PathBuf,

        /// Published distribution the jobs run against
        #[arg(long)]
        test_dir: String,

        /// Test type recorded on every job
        #[arg(long, default_value = "Smoke Test")]
        test_type: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Describe { config } => describe::execute(&cli.workspace, &config)?,

        Commands::Publish {
            config,
            target,
            testing,
            debugging,
        } => {
            publish::execute(&cli.workspace, &config, target.as_deref(), testing, debugging)?;
        }

        Commands::Resources {
            config,
            folder,
            target,
        } => {
            resources::execute(&cli.workspace, &config, folder.as_deref(), target.as_deref())?;
        }

        Commands::Translate {
            config,
            language,
            source,
            target,
        } => {
            translate::execute(&cli.workspace, &config, &language, &source, &target)?;
        }

        Commands::Jobs {
            config,
            test_dir,
            test_type,
        } => {
            jobs::execute(&cli.workspace, &config, &test_dir, &test_type)?;
        }
    }

    Ok(())
}
