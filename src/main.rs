use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use ct_codecs::{Encoder, Hex};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use traceanon::{AnonI64, AnonIpv4, AnonIpv6, AnonKey, AnonMac, AnonOcts, AnonU64, MacAddr};

#[derive(Parser)]
#[command(
    name = "anon",
    version,
    about = "Anonymize identifiers found in network traces"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Prefix-preserving IPv4 address anonymization
    Ipv4(AddrArgs),
    /// Prefix-preserving IPv6 address anonymization
    Ipv6(AddrArgs),
    /// IEEE 802 MAC address anonymization
    Mac(ValueArgs),
    /// int64 anonymization into [LOWER, UPPER]
    Int64(Int64Args),
    /// uint64 anonymization into [LOWER, UPPER]
    Uint64(Uint64Args),
    /// Length- and character-class-preserving octet string anonymization
    Octs(ValueArgs),
    /// Derive and print key material from passphrases
    Key(KeyArgs),
}

#[derive(Args)]
struct AddrArgs {
    /// Derive the key from a passphrase instead of drawing it at random
    #[arg(short = 'p', value_name = "PASSPHRASE")]
    passphrase: Option<String>,
    /// Preserve lexicographic order across the input set (two passes)
    #[arg(short = 'l')]
    lex: bool,
    /// Print timing and trie node statistics on stderr at the end
    #[arg(short = 'c')]
    stats: bool,
    /// Input file, one value per line
    file: PathBuf,
}

#[derive(Args)]
struct ValueArgs {
    /// Derive the key from a passphrase instead of drawing it at random
    #[arg(short = 'p', value_name = "PASSPHRASE")]
    passphrase: Option<String>,
    /// Preserve lexicographic order across the input set (two passes)
    #[arg(short = 'l')]
    lex: bool,
    /// Input file, one value per line
    file: PathBuf,
}

#[derive(Args)]
struct Int64Args {
    /// Lower bound of the pseudonym range (inclusive)
    #[arg(allow_hyphen_values = true)]
    lower: i64,
    /// Upper bound of the pseudonym range (inclusive)
    #[arg(allow_hyphen_values = true)]
    upper: i64,
    #[command(flatten)]
    common: ValueArgs,
}

#[derive(Args)]
struct Uint64Args {
    /// Lower bound of the pseudonym range (inclusive)
    lower: u64,
    /// Upper bound of the pseudonym range (inclusive)
    upper: u64,
    #[command(flatten)]
    common: ValueArgs,
}

#[derive(Args)]
struct KeyArgs {
    /// File with one passphrase per line
    file: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    // usage errors exit with 1, not clap's default of 2
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
            let _ = err.print();
            return code;
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("anon: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Ipv4(args) => cmd_ipv4(args),
        Command::Ipv6(args) => cmd_ipv6(args),
        Command::Mac(args) => cmd_mac(args),
        Command::Int64(args) => cmd_int64(args),
        Command::Uint64(args) => cmd_uint64(args),
        Command::Octs(args) => cmd_octs(args),
        Command::Key(args) => cmd_key(args),
    }
}

fn make_key(passphrase: Option<&str>) -> AnonKey {
    match passphrase {
        Some(passphrase) => AnonKey::from_passphrase(passphrase),
        None => AnonKey::random(),
    }
}

/// Reads the whole input file; lexicographic mode needs a second pass over
/// the same values, so the lines are held in memory rather than rewound.
fn read_lines(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| path.display().to_string())?;
    BufReader::new(file)
        .lines()
        .collect::<io::Result<Vec<_>>>()
        .with_context(|| path.display().to_string())
}

/// Parses one trimmed value per line, skipping blank lines.
fn parse_lines<T: FromStr>(path: &Path) -> Result<Vec<T>>
where
    T::Err: std::fmt::Display,
{
    let mut values = Vec::new();
    for (number, line) in read_lines(path)?.iter().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        values.push(line.parse().map_err(|err| {
            anyhow!("{}: line {}: {} ({line:?})", path.display(), number + 1, err)
        })?);
    }
    Ok(values)
}

fn cmd_ipv4(args: AddrArgs) -> Result<()> {
    let key = make_key(args.passphrase.as_deref());
    let mut engine = AnonIpv4::new(&key);
    let addrs: Vec<Ipv4Addr> = parse_lines(&args.file)?;
    debug!(file = %args.file.display(), count = addrs.len(), lex = args.lex, "anonymizing IPv4 addresses");

    let started = Instant::now();
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if args.lex {
        for addr in &addrs {
            engine.set_used(*addr, AnonIpv4::WIDTH);
        }
        for addr in &addrs {
            writeln!(out, "{}", engine.map_pref_lex(*addr))?;
        }
    } else {
        for addr in &addrs {
            writeln!(out, "{}", engine.map_pref(*addr))?;
        }
    }
    out.flush()?;

    if args.stats {
        print_stats(started, addrs.len(), engine.nodes_count());
    }
    Ok(())
}

fn cmd_ipv6(args: AddrArgs) -> Result<()> {
    let key = make_key(args.passphrase.as_deref());
    let mut engine = AnonIpv6::new(&key);
    let addrs: Vec<Ipv6Addr> = parse_lines(&args.file)?;
    debug!(file = %args.file.display(), count = addrs.len(), lex = args.lex, "anonymizing IPv6 addresses");

    let started = Instant::now();
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if args.lex {
        for addr in &addrs {
            engine.set_used(*addr, AnonIpv6::WIDTH);
        }
        for addr in &addrs {
            writeln!(out, "{}", engine.map_pref_lex(*addr))?;
        }
    } else {
        for addr in &addrs {
            writeln!(out, "{}", engine.map_pref(*addr))?;
        }
    }
    out.flush()?;

    if args.stats {
        print_stats(started, addrs.len(), engine.nodes_count());
    }
    Ok(())
}

fn print_stats(started: Instant, count: usize, nodes: usize) {
    eprintln!(
        "anon: elapsed time in seconds:\t{:.6}",
        started.elapsed().as_secs_f64()
    );
    eprintln!("anon: number of addresses:\t{count}");
    eprintln!("anon: number of tree nodes:\t{nodes}");
}

fn cmd_mac(args: ValueArgs) -> Result<()> {
    let key = make_key(args.passphrase.as_deref());
    let mut engine = AnonMac::new(&key);
    let macs: Vec<MacAddr> = parse_lines(&args.file)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if args.lex {
        for mac in &macs {
            engine.set_used(*mac);
        }
        for mac in &macs {
            writeln!(out, "{}", engine.map_lex(*mac))?;
        }
    } else {
        for mac in &macs {
            writeln!(out, "{}", engine.map(*mac))?;
        }
    }
    out.flush()?;
    Ok(())
}

fn cmd_int64(args: Int64Args) -> Result<()> {
    if args.lower > args.upper {
        return Err(anyhow!("lower bound {} exceeds upper bound {}", args.lower, args.upper));
    }
    let key = make_key(args.common.passphrase.as_deref());
    let mut engine = AnonI64::new(args.lower, args.upper);
    engine.set_key(&key);
    let nums: Vec<i64> = parse_lines(&args.common.file)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if args.common.lex {
        for num in &nums {
            engine.set_used(*num);
        }
        for num in &nums {
            writeln!(out, "{}", engine.map_lex(*num))?;
        }
    } else {
        for num in &nums {
            writeln!(out, "{}", engine.map(*num))?;
        }
    }
    out.flush()?;
    Ok(())
}

fn cmd_uint64(args: Uint64Args) -> Result<()> {
    if args.lower > args.upper {
        return Err(anyhow!("lower bound {} exceeds upper bound {}", args.lower, args.upper));
    }
    let key = make_key(args.common.passphrase.as_deref());
    let mut engine = AnonU64::new(args.lower, args.upper);
    engine.set_key(&key);
    let nums: Vec<u64> = parse_lines(&args.common.file)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if args.common.lex {
        for num in &nums {
            engine.set_used(*num);
        }
        for num in &nums {
            writeln!(out, "{}", engine.map_lex(*num))?;
        }
    } else {
        for num in &nums {
            writeln!(out, "{}", engine.map(*num))?;
        }
    }
    out.flush()?;
    Ok(())
}

fn cmd_octs(args: ValueArgs) -> Result<()> {
    let key = make_key(args.passphrase.as_deref());
    let mut engine = AnonOcts::new();
    engine.set_key(&key);
    // octet strings are taken as raw lines, not trimmed
    let lines = read_lines(&args.file)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if args.lex {
        for line in &lines {
            engine.set_used(line.as_bytes());
        }
        for line in &lines {
            out.write_all(&engine.map_lex(line.as_bytes()))?;
            out.write_all(b"\n")?;
        }
    } else {
        for line in &lines {
            out.write_all(&engine.map(line.as_bytes()))?;
            out.write_all(b"\n")?;
        }
    }
    out.flush()?;
    Ok(())
}

fn cmd_key(args: KeyArgs) -> Result<()> {
    let lines = read_lines(&args.file)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for line in &lines {
        let key = AnonKey::from_passphrase(line);
        let mut material = Vec::with_capacity(AnonKey::KEY_BYTES + AnonKey::PAD_BYTES);
        material.extend_from_slice(key.key());
        material.extend_from_slice(key.pad());
        let hex = Hex::encode_to_string(&material)
            .expect("hex encoding of fixed-size key material cannot fail");
        writeln!(out, "{hex}")?;
    }
    out.flush()?;
    Ok(())
}
