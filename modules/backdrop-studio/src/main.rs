//! `backdrop`: replace the background of one photo from the command line.
//!
//! Usage: backdrop edit portrait.jpg --instruction "a sunny beach" --out beach.png

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::Gemini;
use backdrop_common::Config;
use backdrop_studio::{sniff_mime, EditPipeline, Encoder, Phase, Session};

#[derive(Parser)]
#[command(name = "backdrop")]
#[command(about = "Replace the background of a photo with a generative image model")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Edit one image and write the generated PNG
    Edit {
        /// Source photo
        input: PathBuf,

        /// Instruction for the model (defaults to the configured instruction)
        #[arg(short, long)]
        instruction: Option<String>,

        /// Declared MIME type; detected from the file contents when omitted
        #[arg(long)]
        mime: Option<String>,

        /// Where to write the result
        #[arg(short, long, default_value = "enhanced-profile.png")]
        out: PathBuf,
    },

    /// Print the MIME type detected for a file
    Sniff { input: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    let mut filter = EnvFilter::from_default_env();
    for directive in ["backdrop=info", "ai_client=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Sniff { input } => {
            let bytes = Encoder::default().read_file(&input).await?;
            match sniff_mime(&bytes) {
                Some(mime) => println!("{mime}"),
                None => bail!("Could not detect a file type for {}", input.display()),
            }
            Ok(())
        }
        Commands::Edit {
            input,
            instruction,
            mime,
            out,
        } => edit(input, instruction, mime, out).await,
    }
}

async fn edit(
    input: PathBuf,
    instruction: Option<String>,
    mime: Option<String>,
    out: PathBuf,
) -> Result<()> {
    let config = Config::from_env()?;
    config.log_redacted();

    let gemini = Gemini::new(&config.gemini_api_key, &config.gemini_model)
        .with_base_url(&config.gemini_api_base)
        .with_timeout(config.gemini_timeout);
    let session = Session::new(
        EditPipeline::new(Arc::new(gemini)),
        Encoder::new(config.max_upload_bytes),
        instruction.unwrap_or(config.default_instruction),
    );

    match mime {
        Some(mime) => session.select_image_file(&input, &mime).await?,
        None => {
            let bytes = session.encoder().read_file(&input).await?;
            let mime = sniff_mime(&bytes).ok_or_else(|| {
                anyhow!("Could not detect the type of {}; pass --mime", input.display())
            })?;
            session.select_image_bytes(mime, &bytes).await?
        }
    };

    info!(input = %input.display(), "Generating");
    let snapshot = session
        .generate()
        .await
        .map_err(|reason| anyhow!("Nothing to generate: {reason}"))?;

    match (snapshot.phase, snapshot.generated_image) {
        (Phase::Success, Some(image)) => {
            tokio::fs::write(&out, image.decode()?).await?;
            println!("{}", out.display());
            Ok(())
        }
        _ => bail!(
            "{}",
            snapshot
                .error
                .unwrap_or_else(|| "Generation did not finish".to_string())
        ),
    }
}
