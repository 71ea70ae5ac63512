use anyhow::Result;
use clap::{Parser, Subcommand};
use imagedrop::app::App;
use imagedrop::models::{ImageInput, PipelineState, Provenance};
use imagedrop::present;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "imagedrop")]
#[command(about = "Upload images to a CDN once per unique content")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload files, reusing earlier uploads of identical content.
    Upload {
        #[arg(value_name = "FILES")]
        files: Vec<PathBuf>,
        /// Where the files came from (finder, clipboard or form).
        #[arg(long, default_value = "finder")]
        from: Provenance,
    },
    /// List uploaded images, newest first.
    History {
        #[arg(long)]
        json: bool,
    },
    /// Delete an uploaded image remotely and forget it locally.
    Delete { hash: String },
    /// Print the CDN URL of an uploaded image.
    Url {
        hash: String,
        /// Request a resized preview of this width.
        #[arg(long)]
        width: Option<u32>,
    },
    /// Forget all local records without deleting remote files.
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "imagedrop=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    let app = match App::new().await {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    match args.command {
        Command::Upload { files, from } => {
            let inputs = files
                .into_iter()
                .map(|path| ImageInput::file(path, from))
                .collect();
            let states = app.upload(inputs).await;
            if !report(&states) {
                std::process::exit(1);
            }
        }
        Command::History { json } => {
            let records = app.history().list().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No uploads yet");
            } else {
                for record in &records {
                    println!("{}", present::summary_line(record));
                }
            }
        }
        Command::Delete { hash } => match app.delete(&hash).await {
            Ok(record) => info!("Image deleted successfully: {}", record.url),
            Err(e) => {
                error!("Failed to delete image: {}", e);
                std::process::exit(1);
            }
        },
        Command::Url { hash, width } => match app.history().find(&hash).await? {
            Some(record) => match width {
                Some(width) => println!("{}", present::sized_url(&record.url, width)),
                None => println!("{}", record.url),
            },
            None => {
                error!("No uploaded image with hash {}", hash);
                std::process::exit(1);
            }
        },
        Command::Clear => {
            app.history().clear_local().await?;
            info!("Local upload history cleared");
        }
    }

    Ok(())
}

/// Prints each terminal state; returns false if any run failed.
fn report(states: &[PipelineState]) -> bool {
    let mut ok = true;
    for state in states {
        match state {
            PipelineState::Succeeded { cache, image } => {
                let origin = if *cache { "cached" } else { "uploaded" };
                println!("{} ({})", image.url, origin);
                println!("{}", present::markdown(image));
            }
            PipelineState::NoInput => println!("No image selected"),
            PipelineState::Canceled => {
                println!("Canceled");
                ok = false;
            }
            PipelineState::Failed { source, message } => {
                error!("{}: {}", source, message);
                ok = false;
            }
            PipelineState::Initial => {}
        }
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upload_command() {
        let args = CliArgs::try_parse_from(["imagedrop", "upload", "a.png", "b.jpg", "--from", "clipboard"])
            .unwrap();
        match args.command {
            Command::Upload { files, from } => {
                assert_eq!(files.len(), 2);
                assert_eq!(from, Provenance::Clipboard);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_invalid_provenance() {
        assert!(CliArgs::try_parse_from(["imagedrop", "upload", "--from", "desktop"]).is_err());
    }

    #[test]
    fn test_report_flags_failures() {
        assert!(report(&[PipelineState::NoInput]));
        assert!(!report(&[PipelineState::Failed {
            source: "a.png".to_string(),
            message: "boom".to_string(),
        }]));
    }
}
