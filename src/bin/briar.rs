//! # Briar CLI Entry Point
//!
//! Line-oriented driver for a briar index store. Creates or opens a store
//! file, mounts the index, and accepts commands:
//!
//! ```text
//! INSERT <key> <value>     insert a new pair
//! UPDATE <key> <value>     overwrite an existing value in place
//! LOOKUP <key>             print the value stored for key
//! DELETE <key>             (unimplemented by design)
//! DISPLAY [DOT|SORTED]     dump the tree
//! SANITY                   run the structural invariant check
//! HELP                     command summary
//! QUIT                     detach and exit
//! ```
//!
//! Keys and values are taken as raw bytes and must match the widths the
//! store was created with.
//!
//! ## Usage
//!
//! ```bash
//! # Create a new 1024-block store with 8-byte keys and 16-byte values
//! briar --create ./users.idx --key-size 8 --value-size 16
//!
//! # Reopen it later; geometry is read from the superblock
//! briar ./users.idx
//! ```

use std::path::PathBuf;

use eyre::{bail, ensure, Result, WrapErr};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use briar::btree::probe_geometry;
use briar::{BTreeError, BTreeIndex, BlockStore, DisplayMode, MmapStore};

const DEFAULT_BLOCK_SIZE: usize = 4096;
const DEFAULT_BLOCK_COUNT: u64 = 1024;

struct Options {
    path: PathBuf,
    create: bool,
    key_size: u32,
    value_size: u32,
    block_size: usize,
    block_count: u64,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let options = match parse_args(&args)? {
        Some(options) => options,
        None => return Ok(()),
    };

    let store = if options.create {
        MmapStore::create(&options.path, options.block_size, options.block_count)
            .wrap_err_with(|| format!("failed to create store at {:?}", options.path))?
    } else {
        MmapStore::open(&options.path, options.block_size)
            .wrap_err_with(|| format!("failed to open store at {:?}", options.path))?
    };

    let mut index = BTreeIndex::new(store, options.key_size, options.value_size, false)?;
    index.attach(0, options.create)?;

    println!(
        "briar {} - {} ({} blocks of {} bytes, keys {}B, values {}B)",
        env!("CARGO_PKG_VERSION"),
        options.path.display(),
        index.store().block_count(),
        options.block_size,
        options.key_size,
        options.value_size,
    );
    println!("Type HELP for commands.");

    let mut editor = DefaultEditor::new().wrap_err("failed to initialize line editor")?;
    loop {
        match editor.readline("briar> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line).ok();
                match execute(&mut index, line) {
                    Ok(keep_going) => {
                        if !keep_going {
                            break;
                        }
                    }
                    Err(e) => eprintln!("Error: {:#}", e),
                }
            }
            Err(ReadlineError::Interrupted) => println!("^C"),
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        }
    }

    index.detach()?;
    index.store().sync()?;
    println!("Bye");
    Ok(())
}

fn parse_args(args: &[String]) -> Result<Option<Options>> {
    let mut path = None;
    let mut create = false;
    let mut key_size = None;
    let mut value_size = None;
    let mut block_size = DEFAULT_BLOCK_SIZE;
    let mut block_count = DEFAULT_BLOCK_COUNT;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(None);
            }
            "--version" | "-v" => {
                println!("briar {}", env!("CARGO_PKG_VERSION"));
                return Ok(None);
            }
            "--create" | "-c" => create = true,
            "--key-size" => key_size = Some(take_value(args, &mut i)?.parse()?),
            "--value-size" => value_size = Some(take_value(args, &mut i)?.parse()?),
            "--block-size" => block_size = take_value(args, &mut i)?.parse()?,
            "--blocks" => block_count = take_value(args, &mut i)?.parse()?,
            arg if arg.starts_with('-') => bail!("unknown option: {}", arg),
            p => {
                ensure!(path.is_none(), "multiple store paths given");
                path = Some(PathBuf::from(p));
            }
        }
        i += 1;
    }

    let path = match path {
        Some(p) => p,
        None => {
            print_usage();
            return Ok(None);
        }
    };

    if create {
        let key_size = key_size.ok_or_else(|| eyre::eyre!("--create requires --key-size"))?;
        let value_size = value_size.ok_or_else(|| eyre::eyre!("--create requires --value-size"))?;
        Ok(Some(Options {
            path,
            create,
            key_size,
            value_size,
            block_size,
            block_count,
        }))
    } else {
        let geometry = probe_geometry(&path)?;
        Ok(Some(Options {
            path,
            create,
            key_size: geometry.keysize,
            value_size: geometry.valuesize,
            block_size: geometry.blocksize as usize,
            block_count: 0,
        }))
    }
}

fn take_value<'a>(args: &'a [String], i: &mut usize) -> Result<&'a str> {
    ensure!(*i + 1 < args.len(), "{} needs a value", args[*i]);
    *i += 1;
    Ok(&args[*i])
}

fn execute(index: &mut BTreeIndex<MmapStore>, line: &str) -> Result<bool> {
    let mut parts = line.split_whitespace();
    let verb = parts.next().unwrap_or("").to_ascii_uppercase();
    let rest: Vec<&str> = parts.collect();

    match verb.as_str() {
        "INSERT" => {
            ensure!(rest.len() == 2, "usage: INSERT <key> <value>");
            match index.insert(rest[0].as_bytes(), rest[1].as_bytes()) {
                Ok(()) => println!("OK"),
                Err(e) if e.downcast_ref::<BTreeError>() == Some(&BTreeError::Conflict) => {
                    println!("CONFLICT: key already exists")
                }
                Err(e) => return Err(e),
            }
        }
        "UPDATE" => {
            ensure!(rest.len() == 2, "usage: UPDATE <key> <value>");
            index.update(rest[0].as_bytes(), rest[1].as_bytes())?;
            println!("OK");
        }
        "LOOKUP" => {
            ensure!(rest.len() == 1, "usage: LOOKUP <key>");
            match index.lookup(rest[0].as_bytes()) {
                Ok(value) => println!("{}", String::from_utf8_lossy(value.as_bytes())),
                Err(e) if e.downcast_ref::<BTreeError>() == Some(&BTreeError::NonExistent) => {
                    println!("NONEXISTENT")
                }
                Err(e) => return Err(e),
            }
        }
        "DELETE" => {
            ensure!(rest.len() == 1, "usage: DELETE <key>");
            index.delete(rest[0].as_bytes())?;
        }
        "DISPLAY" => {
            let mode = match rest.first().map(|m| m.to_ascii_uppercase()) {
                None => DisplayMode::Depth,
                Some(m) if m == "DOT" => DisplayMode::Dot,
                Some(m) if m == "SORTED" => DisplayMode::SortedKeyVal,
                Some(m) => bail!("unknown display mode: {}", m),
            };
            let mut out = std::io::stdout().lock();
            index.display(&mut out, mode)?;
        }
        "SANITY" => {
            index.sanity_check()?;
            println!("OK");
        }
        "HELP" => print_help(),
        "QUIT" | "EXIT" => return Ok(false),
        other => bail!("unknown command: {} (try HELP)", other),
    }
    Ok(true)
}

fn print_help() {
    println!("Commands:");
    println!("  INSERT <key> <value>   insert a new pair");
    println!("  UPDATE <key> <value>   overwrite an existing value");
    println!("  LOOKUP <key>           print the value stored for key");
    println!("  DELETE <key>           unimplemented");
    println!("  DISPLAY [DOT|SORTED]   dump the tree");
    println!("  SANITY                 structural invariant check");
    println!("  QUIT                   detach and exit");
}

fn print_usage() {
    println!("briar - disk-resident B-tree index");
    println!();
    println!("USAGE:");
    println!("    briar [OPTIONS] <STORE_PATH>");
    println!();
    println!("OPTIONS:");
    println!("    -c, --create           Format a fresh store at the path");
    println!("        --key-size <N>     Key width in bytes (required with --create)");
    println!("        --value-size <N>   Value width in bytes (required with --create)");
    println!("        --block-size <N>   Block size in bytes (default {})", DEFAULT_BLOCK_SIZE);
    println!("        --blocks <N>       Number of blocks (default {})", DEFAULT_BLOCK_COUNT);
    println!("    -h, --help             Print help");
    println!("    -v, --version          Print version");
}
