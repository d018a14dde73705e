//! heapdb command line: load text into heap files and dump them back.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use heapdb::access::{DbFile, HeapFileEncoder, Schema, Type};
use heapdb::executor::{ExecutionContext, OpIterator, SeqScan};
use heapdb::{Config, Database};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert comma-separated text into a heap file
    Convert {
        input: PathBuf,
        output: PathBuf,

        /// Field types, e.g. `int,string`
        #[arg(short, long, value_delimiter = ',', required = true)]
        types: Vec<Type>,

        #[arg(short, long, default_value_t = heapdb::config::DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },
    /// Print every tuple of a heap file, one per line
    Print {
        file: PathBuf,

        /// Field types, e.g. `int,string`
        #[arg(short, long, value_delimiter = ',', required = true)]
        types: Vec<Type>,

        #[arg(short, long, default_value_t = heapdb::config::DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match args.command {
        Command::Convert {
            input,
            output,
            types,
            page_size,
        } => {
            let schema = Arc::new(Schema::from_types(types)?);
            let reader = BufReader::new(
                File::open(&input).with_context(|| format!("Failed to open {:?}", input))?,
            );
            let pages = HeapFileEncoder::convert(reader, &output, schema, page_size)
                .with_context(|| format!("Failed to convert {:?}", input))?;
            log::info!("wrote {} pages to {}", pages, output.display());
        }
        Command::Print {
            file,
            types,
            page_size,
        } => {
            if !file.exists() {
                bail!("Heap file does not exist at {:?}", file);
            }
            let db = Database::new(Config::builder().page_size(page_size).build());
            let table = db.open_table(&file, "input", Schema::from_types(types)?)?;
            let txn = db.begin();

            let mut scan = SeqScan::new(ExecutionContext::from(&db), txn.id(), table.id(), "input")?;
            let mut out = BufWriter::new(std::io::stdout().lock());
            scan.open()?;
            while scan.has_next()? {
                writeln!(out, "{}", scan.next()?)?;
            }
            scan.close();
            out.flush()?;
            txn.commit()?;
        }
    }

    Ok(())
}
