//! Command-line front end: encode text, decode ids, inspect an encoding.

use std::io::Read;

use anyhow::Context;
use clap::{Parser, Subcommand};

use kerf::{get_encoding, EncodingKind, Tokenizer};

#[derive(Parser)]
#[command(name = "kerf")]
#[command(about = "OpenAI-compatible BPE tokenizer", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode text to token ids
    Encode {
        /// Text to encode; read from stdin when omitted
        text: Option<String>,
        /// Encoding name (cl100k_base, p50k_base, r50k_base, o200k_base)
        #[arg(short, long, default_value = "cl100k_base", conflicts_with = "model")]
        encoding: String,
        /// Resolve the encoding from an OpenAI model name instead
        #[arg(short, long)]
        model: Option<String>,
        /// Treat special-token triggers as ordinary text
        #[arg(long)]
        ordinary: bool,
    },
    /// Decode token ids back to text
    Decode {
        /// Token ids
        #[arg(required = true)]
        ids: Vec<u32>,
        #[arg(short, long, default_value = "cl100k_base")]
        encoding: String,
    },
    /// Show an encoding's vocabulary size, pattern, and special tokens
    Info {
        #[arg(short, long, default_value = "cl100k_base")]
        encoding: String,
    },
}

fn main() -> anyhow::Result<()> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .env()
        .init()?;

    match Cli::parse().command {
        Commands::Encode {
            text,
            encoding,
            model,
            ordinary,
        } => {
            let tokenizer = resolve(&encoding, model.as_deref())?;
            let text = match text {
                Some(text) => text,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("reading stdin")?;
                    buf
                }
            };
            let ids = if ordinary {
                tokenizer.encode_ordinary(&text)?
            } else {
                tokenizer.encode(&text)?
            };
            let rendered: Vec<String> = ids.iter().map(u32::to_string).collect();
            println!("{}", rendered.join(" "));
        }
        Commands::Decode { ids, encoding } => {
            let tokenizer = get_encoding(&encoding)?;
            println!("{}", tokenizer.decode(&ids)?);
        }
        Commands::Info { encoding } => {
            let kind = EncodingKind::from_name(&encoding)?;
            let tokenizer = get_encoding(&encoding)?;
            println!("encoding: {}", kind.name());
            println!("vocab size: {}", tokenizer.vocab_size());
            println!("pattern: {}", tokenizer.pattern());
            let mut specials: Vec<_> = tokenizer.special_tokens().iter().collect();
            specials.sort_by_key(|&(_, &id)| id);
            for (trigger, id) in specials {
                println!("special: {trigger} = {id}");
            }
        }
    }
    Ok(())
}

fn resolve(encoding: &str, model: Option<&str>) -> anyhow::Result<std::sync::Arc<Tokenizer>> {
    match model {
        Some(model) => Ok(kerf::encoding_for_model(model)?),
        None => Ok(get_encoding(encoding)?),
    }
}
