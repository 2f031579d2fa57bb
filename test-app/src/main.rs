// scpilib test application -- CLI tool for exercising the dispatch core
// against a LAN instrument or a scripted mock transport.
//
// Usage:
//   scpilib-test-app --host 192.168.1.50 idn
//   scpilib-test-app --host 192.168.1.50 query "SENS:FREQ:CENT?"
//   scpilib-test-app --host 192.168.1.50 write "INIT:IMM" --opc --timeout-ms 30000
//   scpilib-test-app --host 192.168.1.50 --float-format real32-le trace "TRAC:DATA? TRACE1" --suppress 0
//   scpilib-test-app --host 192.168.1.50 errors
//   scpilib-test-app --host 192.168.1.50 latency --count 200
//   scpilib-test-app --mock trace "FETC:TRAC?"

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use scpilib::protocol::encode_float_block;
use scpilib::{ArgSingleSuppressed, BinFloatFormat, Core, CoreBuilder, DataType, Error};
use scpilib_test_harness::MockTransport;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// scpilib test application -- exercises SCPI dispatch from the command line.
#[derive(Parser)]
#[command(name = "scpilib-test-app", version, about)]
struct Cli {
    /// Instrument host name or IP address.
    /// Required unless --mock is used.
    #[arg(long)]
    host: Option<String>,

    /// Raw-socket SCPI port.
    #[arg(long, default_value_t = scpilib::transport::DEFAULT_SCPI_PORT)]
    port: u16,

    /// Use a scripted mock transport instead of a real instrument.
    #[arg(long)]
    mock: bool,

    /// Query response timeout in milliseconds.
    #[arg(long, default_value_t = 2000)]
    command_timeout_ms: u64,

    /// Check the instrument error queue after every command.
    #[arg(long)]
    status_check: bool,

    /// Element format of binary float blocks.
    #[arg(long, default_value = "real32-le", value_enum)]
    float_format: FloatFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Query the identification string (*IDN?).
    Idn,

    /// Send a query and print the raw response line.
    Query {
        /// Query text, e.g. "SENS:FREQ:CENT?".
        cmd: String,
    },

    /// Send a command without reading a response.
    Write {
        /// Command text, e.g. "INIT:IMM".
        cmd: String,

        /// Wait for operation complete (*OPC?) before returning.
        #[arg(long)]
        opc: bool,

        /// Operation-complete timeout in milliseconds.
        #[arg(long, default_value_t = 10_000)]
        timeout_ms: u64,
    },

    /// Fetch a float trace, ASCII or binary block.
    Trace {
        /// Query text, e.g. "TRAC:DATA? TRACE1".
        cmd: String,

        /// Number of leading status values to drop.
        #[arg(long, default_value_t = 1)]
        suppress: usize,

        /// Print every value instead of a summary.
        #[arg(long)]
        all: bool,
    },

    /// Drain and print the instrument error queue (SYST:ERR?).
    Errors,

    /// Measure query round-trip latency.
    Latency {
        /// Query to repeat.
        #[arg(long, default_value = "*OPC?")]
        cmd: String,

        /// Number of round trips.
        #[arg(long, default_value_t = 100)]
        count: u32,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FloatFormat {
    Real32Le,
    Real32Be,
    Real64Le,
    Real64Be,
}

impl From<FloatFormat> for BinFloatFormat {
    fn from(f: FloatFormat) -> Self {
        match f {
            FloatFormat::Real32Le => BinFloatFormat::Real32Le,
            FloatFormat::Real32Be => BinFloatFormat::Real32Be,
            FloatFormat::Real64Le => BinFloatFormat::Real64Le,
            FloatFormat::Real64Be => BinFloatFormat::Real64Be,
        }
    }
}

// ---------------------------------------------------------------------------
// Mock scripting
// ---------------------------------------------------------------------------

const MOCK_IDN: &[u8] = b"scpilib,MockInstrument,0,0.1\n";

/// Script a mock transport that answers exactly the exchanges `command`
/// will perform.
fn mock_transport(command: &Command, format: BinFloatFormat) -> MockTransport {
    let mut mock = MockTransport::new();
    match command {
        Command::Idn => mock.expect(b"*IDN?\n", MOCK_IDN),
        Command::Query { cmd } => mock.expect(format!("{cmd}\n").as_bytes(), b"0\n"),
        Command::Write { cmd, opc: false, .. } => mock.expect_write(format!("{cmd}\n").as_bytes()),
        Command::Write { cmd, opc: true, .. } => {
            mock.expect(format!("{cmd};*OPC?\n").as_bytes(), b"1\n")
        }
        Command::Trace { cmd, suppress, .. } => {
            let mut values = vec![0.0; *suppress];
            values.extend((0..32).map(|i| -80.0 + 10.0 * (i as f64 / 5.0).sin()));
            let mut response = encode_float_block(&values, format, b'#').to_vec();
            response.push(b'\n');
            mock.expect(format!("{cmd}\n").as_bytes(), &response);
        }
        Command::Errors => {
            mock.expect(b"SYST:ERR?\n", b"-113,\"Undefined header\"\n");
            mock.expect(b"SYST:ERR?\n", b"0,\"No error\"\n");
        }
        Command::Latency { cmd, count } => {
            for _ in 0..*count {
                mock.expect(format!("{cmd}\n").as_bytes(), b"1\n");
            }
        }
    }
    mock
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn connect(cli: &Cli) -> Result<Core> {
    let builder = CoreBuilder::new()
        .command_timeout(Duration::from_millis(cli.command_timeout_ms))
        .status_checking(cli.status_check)
        .bin_float_format(cli.float_format.into());

    if cli.mock {
        if cli.status_check {
            bail!("--status-check is not supported with --mock");
        }
        let mock = mock_transport(&cli.command, cli.float_format.into());
        return Ok(builder.build_with_transport(Box::new(mock))?);
    }

    let Some(host) = cli.host.as_deref() else {
        bail!("--host is required unless --mock is used");
    };
    let addr = format!("{host}:{}", cli.port);
    println!("Connecting to {addr}...");
    builder
        .connect_tcp(&addr)
        .await
        .with_context(|| format!("failed to connect to {addr}"))
}

async fn run_trace(core: &mut Core, cmd: &str, suppress: usize, all: bool) -> Result<()> {
    let suppressed = ArgSingleSuppressed::with_count(DataType::FloatList, suppress);
    let started = Instant::now();
    let values = core
        .query_bin_or_ascii_float_list_suppressed(cmd, &suppressed)
        .await?;
    let elapsed = started.elapsed();

    println!("{} values in {:.1} ms", values.len(), elapsed.as_secs_f64() * 1000.0);
    if all {
        for (i, v) in values.iter().enumerate() {
            println!("{i:>6}  {v}");
        }
    } else if let (Some(min), Some(max)) = (
        values.iter().copied().reduce(f64::min),
        values.iter().copied().reduce(f64::max),
    ) {
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        println!("min {min:.3}  max {max:.3}  mean {mean:.3}");
    }
    Ok(())
}

async fn run_errors(core: &mut Core) -> Result<()> {
    let mut count = 0;
    loop {
        let entry = core.query_str("SYST:ERR?").await?;
        let code = entry.split(',').next().unwrap_or("").trim();
        if matches!(code.parse::<i64>(), Ok(0)) {
            break;
        }
        println!("{entry}");
        count += 1;
        if count >= 100 {
            bail!("error queue did not drain after {count} entries");
        }
    }
    if count == 0 {
        println!("No errors.");
    }
    Ok(())
}

async fn run_latency(core: &mut Core, cmd: &str, count: u32) -> Result<()> {
    if count == 0 {
        bail!("--count must be at least 1");
    }
    let mut samples = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let started = Instant::now();
        core.query_str(cmd).await?;
        samples.push(started.elapsed());
    }
    samples.sort();

    let total: Duration = samples.iter().sum();
    let pct = |p: usize| samples[(samples.len() - 1) * p / 100];
    println!(
        "{count} round trips: mean {:.2} ms  p50 {:.2} ms  p99 {:.2} ms  max {:.2} ms",
        total.as_secs_f64() * 1000.0 / count as f64,
        pct(50).as_secs_f64() * 1000.0,
        pct(99).as_secs_f64() * 1000.0,
        pct(100).as_secs_f64() * 1000.0,
    );
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut core = connect(&cli).await?;

    let result = match &cli.command {
        Command::Idn => core
            .query_str("*IDN?")
            .await
            .map(|idn| println!("{idn}"))
            .map_err(anyhow::Error::from),
        Command::Query { cmd } => core
            .query_str(cmd)
            .await
            .map(|text| println!("{text}"))
            .map_err(anyhow::Error::from),
        Command::Write { cmd, opc, timeout_ms } => {
            let result = if *opc {
                core.write_with_opc(cmd, Some(Duration::from_millis(*timeout_ms)))
                    .await
            } else {
                core.write(cmd).await
            };
            match result {
                Ok(()) => {
                    println!("OK");
                    Ok(())
                }
                Err(Error::OperationTimeout { timeout_ms, .. }) => Err(anyhow::anyhow!(
                    "operation did not complete within {timeout_ms} ms; instrument state is unknown"
                )),
                Err(e) => Err(e.into()),
            }
        }
        Command::Trace { cmd, suppress, all } => run_trace(&mut core, cmd, *suppress, *all).await,
        Command::Errors => run_errors(&mut core).await,
        Command::Latency { cmd, count } => run_latency(&mut core, cmd, *count).await,
    };

    core.close().await?;
    result
}

#[tokio::main]
async fn main() -> Result<()> {
    run(Cli::parse()).await
}
