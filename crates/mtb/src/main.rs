//! mtb - Telegram-safe Markdown from the command line

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::io::AsyncReadExt;

use mtb_core::{
    config::Config,
    domain::ChatId,
    formatting::{spans, split_for_markup, Dialect, EscapePolicy, TokenizeOptions},
    messaging::{delivery::SafeMessenger, port::MessagingPort, throttled::ThrottledMessenger},
    streaming::StreamingReply,
};

mod console;

use console::ConsoleMessenger;

#[derive(Debug, Parser)]
#[command(name = "mtb")]
#[command(version, about = "Telegram-safe Markdown formatter", long_about = None)]
#[command(after_help = "EXAMPLES:
    mtb format reply.md              Convert generic Markdown to MarkdownV2
    mtb format --escape-only -       Escape stdin, keeping intentional emphasis
    mtb split --limit 1000 reply.md  Show how a long reply is chunked
    mtb stream reply.md              Replay a reply as a streamed message")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert generic Markdown to the Telegram dialect
    Format {
        #[command(flatten)]
        common: CommonArgs,
        /// Only escape; leave Markdown constructs as they are
        #[arg(long)]
        escape_only: bool,
        /// Escape emphasis delimiters too (with --escape-only)
        #[arg(long, requires = "escape_only")]
        no_protect: bool,
    },
    /// Turn Telegram markup back into generic Markdown
    Unformat {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Print the span tokenization as JSON
    Spans {
        #[command(flatten)]
        common: CommonArgs,
        /// Do not recognise single-delimiter emphasis
        #[arg(long)]
        no_emphasis: bool,
        /// Treat the input as already escaped markup
        #[arg(long)]
        escaped: bool,
    },
    /// Split a long reply into message-sized chunks
    Split {
        #[command(flatten)]
        common: CommonArgs,
        /// Per-message budget in characters (default: TELEGRAM_SAFE_LIMIT)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Replay the input as model output streamed into one chat
    Stream {
        #[command(flatten)]
        common: CommonArgs,
        /// Characters per simulated delta
        #[arg(long, default_value_t = 20)]
        chunk_size: usize,
        /// Pause between deltas
        #[arg(long, default_value_t = 50)]
        delay_ms: u64,
        #[arg(long, default_value_t = 1)]
        chat_id: i64,
    },
}

#[derive(Debug, Args)]
struct CommonArgs {
    /// Input file; stdin when absent or "-"
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,
    /// Target dialect: MarkdownV2 or Markdown (default: TELEGRAM_PARSE_MODE)
    #[arg(long)]
    dialect: Option<Dialect>,
}

impl Command {
    fn common(&self) -> &CommonArgs {
        match self {
            Command::Format { common, .. }
            | Command::Unformat { common }
            | Command::Spans { common, .. }
            | Command::Split { common, .. }
            | Command::Stream { common, .. } => common,
        }
    }
}

impl CommonArgs {
    fn policy(&self, cfg: &Config) -> EscapePolicy {
        EscapePolicy::from(self.dialect.unwrap_or(cfg.dialect))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mtb_core::logging::init("mtb")?;

    let cli = Cli::parse();
    let cfg = Config::load()?;
    let common = cli.command.common();
    let input = read_input(common.input.as_ref()).await?;

    match &cli.command {
        Command::Stream {
            chunk_size,
            delay_ms,
            chat_id,
            ..
        } => {
            stream(
                &cfg,
                common.policy(&cfg),
                &input,
                *chunk_size,
                Duration::from_millis(*delay_ms),
                ChatId(*chat_id),
            )
            .await?;
        }
        other => println!("{}", render(&cfg, other, &input)?),
    }

    Ok(())
}

/// Output of the non-interactive commands.
fn render(cfg: &Config, command: &Command, input: &str) -> anyhow::Result<String> {
    let out = match command {
        Command::Format {
            common,
            escape_only,
            no_protect,
        } => {
            let policy = common.policy(cfg);
            if *escape_only {
                policy.escape(input, cfg.protect_formatting && !no_protect)
            } else {
                policy.convert_from_generic_markdown(input)
            }
        }
        Command::Unformat { common } => common.policy(cfg).convert_to_generic_markdown(input),
        Command::Spans {
            common,
            no_emphasis,
            escaped,
        } => {
            let opts = TokenizeOptions {
                emphasis: !no_emphasis,
                escaped: *escaped,
            };
            let tokens = spans::tokenize(input, &common.policy(cfg), opts);
            spans::to_json(&tokens).context("serializing spans")?
        }
        Command::Split { common, limit } => {
            let policy = common.policy(cfg);
            let limit = limit.unwrap_or(cfg.telegram_safe_limit).max(1);
            let chunks = split_for_markup(input, limit, &policy);
            let total = chunks.len();
            chunks
                .iter()
                .enumerate()
                .map(|(i, raw)| {
                    let markup = policy.convert_from_generic_markdown(raw);
                    format!(
                        "--- chunk {}/{total} ({} chars)\n{markup}",
                        i + 1,
                        markup.chars().count()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        Command::Stream { .. } => anyhow::bail!("stream is interactive"),
    };
    Ok(out)
}

async fn stream(
    cfg: &Config,
    policy: EscapePolicy,
    input: &str,
    chunk_size: usize,
    delay: Duration,
    chat_id: ChatId,
) -> anyhow::Result<()> {
    let console: Arc<dyn MessagingPort> = Arc::new(ConsoleMessenger::new(
        std::io::stdout(),
        cfg.telegram_message_limit,
    ));
    let throttled = Arc::new(ThrottledMessenger::new(console, cfg.throttle_config()));
    let api = SafeMessenger::new(throttled, cfg.retry_policy());

    let mut reply = StreamingReply::new(chat_id, cfg.streaming_config(), policy);
    for delta in deltas(input, chunk_size) {
        reply.push(&api, delta).await?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    let messages = reply.finish(&api).await?;
    tracing::info!(
        chat_id = chat_id.0,
        messages = messages.len(),
        "reply delivered"
    );
    Ok(())
}

/// Split `input` into pieces of at most `chunk_size` characters.
fn deltas(input: &str, chunk_size: usize) -> Vec<&str> {
    let chunk_size = chunk_size.max(1);
    let mut out = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        let cut = rest
            .char_indices()
            .nth(chunk_size)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(cut);
        out.push(head);
        rest = tail;
    }
    out
}

async fn read_input(path: Option<&PathBuf>) -> anyhow::Result<String> {
    match path {
        Some(p) if p.as_os_str() != "-" => tokio::fs::read_to_string(p)
            .await
            .with_context(|| format!("reading {}", p.display())),
        _ => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("reading stdin")?;
            Ok(buf)
        }
    }
}
