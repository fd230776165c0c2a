use std::{fs::File, path::PathBuf};

use clap::Parser;
use manifest_locator::{Resolver, ResolverConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// JSON file with the resolver configuration.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the `Accept` header for each request.
    #[arg(short, long)]
    accept: bool,

    /// Image references.
    #[arg(required = true)]
    images: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ResolverConfig::from_reader(File::open(path)?)?,
        None => ResolverConfig::default(),
    };

    let resolver = Resolver::from_config(&config)?;

    for image in &args.images {
        match resolver.manifest_request(image) {
            Ok(request) => {
                println!("{image}\t{}", request.url);
                if args.accept {
                    println!("\tAccept: {}", request.accept);
                }
            }

            Err(err) if err.is_unsupported() => println!("{image}\tSKIP {err}"),

            Err(err) => println!("{image}\tERROR {err}"),
        }
    }

    Ok(())
}
