//! twinkv - Interactive Key-Value Shell
//!
//! Entry point for the shell binary. It picks a storage engine, optionally
//! preloads a dump file and runs a command session over stdin and stdout.

use bytes::{BufMut, BytesMut};
use std::io::IsTerminal;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use twinkv::commands::CommandHandler;
use twinkv::protocol::{Style, Tone};
use twinkv::session::run_session;
use twinkv::storage::{open, EngineKind};

/// Shell configuration
struct Config {
    /// Engine to use; asked interactively when unset
    engine: Option<EngineKind>,
    /// Dump file to upload before the session starts
    load: Option<PathBuf>,
    /// Whether replies are colored
    color: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: None,
            load: None,
            color: std::io::stdout().is_terminal(),
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> anyhow::Result<Self> {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--engine" | "-e" => {
                    let Some(value) = args.get(i + 1) else {
                        anyhow::bail!("--engine requires a value");
                    };
                    config.engine = Some(value.parse()?);
                    i += 2;
                }
                "--load" | "-l" => {
                    let Some(value) = args.get(i + 1) else {
                        anyhow::bail!("--load requires a value");
                    };
                    config.load = Some(PathBuf::from(value));
                    i += 2;
                }
                "--no-color" => {
                    config.color = false;
                    i += 1;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("twinkv version {}", twinkv::VERSION);
                    std::process::exit(0);
                }
                other => {
                    print_help();
                    anyhow::bail!("unknown argument: {other}");
                }
            }
        }

        Ok(config)
    }

    fn style(&self) -> Style {
        if self.color {
            Style::colored()
        } else {
            Style::plain()
        }
    }
}

fn print_help() {
    println!(
        r#"
twinkv - Key-value shell over a hash table or a balanced tree

USAGE:
    twinkv [OPTIONS]

OPTIONS:
    -e, --engine <ENGINE>    hash or tree (asked at startup when omitted)
    -l, --load <FILE>        Upload a dump file before the shell starts
        --no-color           Plain replies without ANSI colors
    -v, --version            Print version information
    -h, --help               Print this help message

COMMANDS:
    SET key last first year city coins [EX seconds]
    GET key | EXISTS key | DEL key | TTL key
    UPDATE key last first year city coins   (- keeps a field)
    RENAME key newkey
    KEYS | SHOWALL | DBSIZE | PING
    FIND last first year city coins         (- or omitted ignores a field)
    UPLOAD file | EXPORT file
    QUIT

LOGGING:
    RUST_LOG=debug twinkv --engine tree     # logs go to stderr
"#
    );
}

/// Prints the storage menu and reads a choice. `None` means exit.
async fn choose_engine<R, W>(
    input: &mut R,
    output: &mut W,
    style: &Style,
) -> anyhow::Result<Option<EngineKind>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut menu = BytesMut::new();
    menu.put_slice(b"\t\t");
    style.write(&mut menu, Tone::Header, "TWINKV");
    menu.put_slice(b"\n\nChoose type of storage:\n");
    menu.put_slice(b"1. Hash table\n2. Self-balancing binary search tree\nq to exit\n");
    output.write_all(&menu).await?;
    output.flush().await?;

    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line).await? == 0 {
            return Ok(None);
        }

        let reply = match line.trim() {
            "" => continue,
            "q" | "Q" => return Ok(None),
            choice => match choice.parse::<EngineKind>() {
                Ok(kind) => {
                    output.write_all(format!("{kind}\n").as_bytes()).await?;
                    output.flush().await?;
                    return Ok(Some(kind));
                }
                Err(e) => format!("{e}\n"),
            },
        };
        output.write_all(reply.as_bytes()).await?;
        output.flush().await?;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args()?;

    // Set up logging; stdout belongs to the shell
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let style = config.style();
    let mut input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();

    let kind = match config.engine {
        Some(kind) => kind,
        None => match choose_engine(&mut input, &mut output, &style).await? {
            Some(kind) => kind,
            None => return Ok(()),
        },
    };
    info!(engine = %kind, "Storage engine selected");

    let mut handler = CommandHandler::new(open(kind));

    if let Some(path) = &config.load {
        let count = handler.store_mut().upload(path);
        info!(path = %path.display(), records = count, "Preloaded dump file");
        output
            .write_all(format!("> {count}\n").as_bytes())
            .await?;
        output.flush().await?;
    }

    // The session reads through the same buffer the menu used
    let stats = run_session(input, output, handler, style).await?;
    info!(
        commands = stats.commands_processed,
        errors = stats.errors,
        "Shell closed"
    );

    Ok(())
}
