use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;
use workflow_callback::delivery::{ResultDeliveryClient, parse_max_retries};
use workflow_callback::imaging::{self, DetectedFormat};
use workflow_callback::node::{CallbackInputs, CallbackNode, NodeOptions, OneOrMany};
use workflow_callback::prompt::PromptIdFetcher;
use workflow_callback::text::{self, TimeFormatError};
use workflow_callback::{config, logging, output};

#[derive(Parser)]
#[command(name = "workflow-callback")]
#[command(about = "Deliver workflow results to a callback endpoint")]
#[command(long_about = "\
Deliver workflow results to a callback endpoint

Sends a generated video and its tail-frame image to an HTTP endpoint as a
multipart POST (parts: image, video, promptId), retrying with exponential
backoff. Images whose real format is not JPEG are converted first.

Result codes printed by 'callback':
  0   delivered
  2   invalid input, nothing sent
  -1  delivery failed after all attempts

Settings are read from <config-dir>/config.toml. RUST_LOG overrides the
log level. Run 'workflow-callback gen-config' for a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct CallbackArgs {
    /// Host input document as JSON ('-' reads stdin); flags are ignored when set
    #[arg(long)]
    input: Option<String>,

    /// Endpoint receiving the multipart POST
    #[arg(long, default_value = "")]
    callback_url: String,

    /// Video file (repeat for a batch; only the first is sent)
    #[arg(long)]
    video: Vec<String>,

    /// Tail-frame image (repeat for a batch; only the first is sent)
    #[arg(long)]
    image: Vec<String>,

    /// Prompt id sent as the promptId part
    #[arg(long, default_value = "")]
    prompt_id: String,

    /// Total attempts, overriding config (<= 0 or non-integer means the default)
    #[arg(long, allow_hyphen_values = true)]
    max_retries: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the callback node and print its result tuple as JSON
    Callback(CallbackArgs),
    /// Print the real format of an image file
    Detect {
        /// Image to inspect
        path: PathBuf,
    },
    /// Convert an image to another format
    Convert {
        src: PathBuf,
        dst: PathBuf,
        /// Target format: WEBP, GIF, JPEG (or JPG), PNG, BMP
        #[arg(long)]
        format: String,
    },
    /// Ask the running host which prompt is executing
    PromptId,
    /// Print a stock config.toml with all options documented
    GenConfig,
    /// Time string conversions
    Time {
        #[command(subcommand)]
        command: TimeCommand,
    },
}

#[derive(Subcommand)]
enum TimeCommand {
    /// HH:MM:SS to a second count
    ToSeconds { value: String },
    /// Second count to HH:MM:SS
    FromSeconds { seconds: u64 },
    /// Re-express a zoned timestamp (2024-01-03 12:14:08+00:00) at an hour offset
    Zone {
        value: String,
        /// Target offset in hours, -11..=11
        #[arg(long, allow_hyphen_values = true)]
        offset: i32,
        /// Print only HH:MM
        #[arg(long)]
        hour_minute: bool,
    },
    /// Millisecond Unix timestamp to a UTC date-time
    FromMs {
        #[arg(allow_hyphen_values = true)]
        timestamp_ms: i64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Callback(args) => {
            let config = setup(&cli.config_dir)?;
            let options = node_options(&config, args.max_retries.as_deref());
            let inputs = read_inputs(args)?;
            let client = ResultDeliveryClient::from_config(&config.delivery)?;
            let node = CallbackNode::new(client, options);
            output::print_node_result(&node.commit_result(&inputs));
        }
        Command::Detect { path } => {
            setup(&cli.config_dir)?;
            let format = imaging::detect(&path);
            output::print_detect_output(&path, format);
        }
        Command::Convert { src, dst, format } => {
            setup(&cli.config_dir)?;
            let from = imaging::detect(&src);
            let started = Instant::now();
            imaging::convert_to_named(&src, &dst, &format)?;
            let to: DetectedFormat = format.parse().unwrap_or(DetectedFormat::Unknown);
            output::print_convert_output(&src, &dst, from, to, started.elapsed());
        }
        Command::PromptId => {
            let config = setup(&cli.config_dir)?;
            let fetcher = PromptIdFetcher::from_config(&config.host)?;
            tracing::debug!(
                url = fetcher.queue_url(),
                authenticated = fetcher.has_credentials(),
                "polling host queue"
            );
            let prompt_id = fetcher.fetch().unwrap_or_else(|e| {
                tracing::error!(error = %e, url = fetcher.queue_url(), "failed to fetch prompt id");
                String::new()
            });
            println!("{}", prompt_id);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Time { command } => {
            println!("{}", run_time(command)?);
        }
    }

    Ok(())
}

/// Load `.env` and config, then install logging.
fn setup(config_dir: &Path) -> Result<config::CallbackConfig, config::ConfigError> {
    dotenvy::dotenv().ok();
    let config = config::load_config(config_dir)?;
    logging::init(&config.logging);
    Ok(config)
}

fn run_time(command: TimeCommand) -> Result<String, TimeFormatError> {
    match command {
        TimeCommand::ToSeconds { value } => text::parse_hms(&value).map(|s| s.to_string()),
        TimeCommand::FromSeconds { seconds } => Ok(text::format_hms(seconds)),
        TimeCommand::Zone {
            value,
            offset,
            hour_minute: false,
        } => text::convert_with_timezone(&value, offset),
        TimeCommand::Zone {
            value,
            offset,
            hour_minute: true,
        } => text::convert_hour_minute_with_timezone(&value, offset),
        TimeCommand::FromMs { timestamp_ms } => text::timestamp_ms_to_utc_string(timestamp_ms)
            .ok_or_else(|| TimeFormatError::Malformed(timestamp_ms.to_string())),
    }
}

/// Node options from config, with an optional `--max-retries` override.
fn node_options(config: &config::CallbackConfig, max_retries: Option<&str>) -> NodeOptions {
    let mut options = NodeOptions::from_config(config);
    if let Some(raw) = max_retries {
        options.max_retries = parse_max_retries(raw);
    }
    options
}

/// Build node inputs from `--input` JSON, or from the individual flags.
fn read_inputs(args: CallbackArgs) -> Result<CallbackInputs, Box<dyn std::error::Error>> {
    if let Some(source) = args.input {
        let raw = if source == "-" {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        } else {
            std::fs::read_to_string(&source)?
        };
        return Ok(serde_json::from_str(&raw)?);
    }
    Ok(CallbackInputs {
        callback_url: args.callback_url,
        video: OneOrMany::Many(args.video),
        image: OneOrMany::Many(args.image),
        prompt_id: args.prompt_id,
        ..CallbackInputs::default()
    })
}
