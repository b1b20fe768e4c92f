use clap::Parser;
use tracing_subscriber::EnvFilter;

use agql_store::cli::Args;
use agql_store::config::ConfigFile;
use agql_store::store::GraphStore;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = ConfigFile::load()?;
    let db = config.open_database(args.db)?;
    let mut store = GraphStore::new(db, config.store);
    let output = args.command.run(&mut store, args.format)?;
    println!("{}", output);
    Ok(())
}
