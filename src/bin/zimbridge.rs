use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use log::{LevelFilter, debug, error, info};

use zimbridge::auth::secret_store;
use zimbridge::config::{self, Config, Credentials};
use zimbridge::domain::mail::SyncMode;
use zimbridge::mail::sink::{SinkKind, open_sink};
use zimbridge::pipeline::{self, Outcome};

#[derive(Parser)]
#[command(name = "zimbridge", version)]
#[command(
    about = "Zimbra bridge mail delivery agent",
    long_about = "Logs into the Zimbra webmail with USERNAME and PASSWORD, downloads the \
                  e-mails of a folder and delivers them to an LMTP server (UNIX socket) \
                  or into a Maildir++ directory. Delivered e-mails can be tagged or \
                  trashed in the webmail so they are not fetched again."
)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Command>,

    #[command(flatten)]
    run: RunArgs,

    /// Print debug informations
    #[arg(
        short,
        long,
        global = true,
        env = "ZIMBRIDGE_MDA_VERBOSE",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    verbose: bool,
}

#[derive(Args)]
struct RunArgs {
    /// Your CYU username, probably starting with "e-"
    #[arg(short, long, env = "ZIMBRIDGE_MDA_USERNAME")]
    username: Option<String>,

    /// Your CYU password (falls back to the keyring)
    #[arg(short, long, env = "ZIMBRIDGE_MDA_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Your webmail e-mail address
    #[arg(short, long, env = "ZIMBRIDGE_MDA_ADDRESS")]
    address: Option<String>,

    /// Tag delivered e-mails in the webmail and skip tagged ones next time
    #[arg(short, long, env = "ZIMBRIDGE_MDA_TAG", conflicts_with = "trash")]
    tag: Option<String>,

    /// Move delivered e-mails to the webmail trash
    #[arg(long)]
    trash: bool,

    /// Webmail folder to download
    #[arg(short, long)]
    folder: Option<String>,

    /// How to deliver e-mails
    #[arg(long, value_enum, default_value_t = SinkArg::Auto)]
    sink: SinkArg,

    /// Configuration file (defaults to <config dir>/zimbridge/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// LMTP server socket or Maildir directory
    destination: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Store the webmail password in the keyring (read from stdin)
    SetPassword {
        #[arg(short, long, env = "ZIMBRIDGE_MDA_USERNAME")]
        username: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SinkArg {
    Auto,
    Lmtp,
    Maildir,
}

impl From<SinkArg> for SinkKind {
    fn from(arg: SinkArg) -> Self {
        match arg {
            SinkArg::Auto => SinkKind::Auto,
            SinkArg::Lmtp => SinkKind::Lmtp,
            SinkArg::Maildir => SinkKind::Maildir,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_env("RUST_LOG")
        .target(env_logger::Target::Stdout)
        .init();

    let result = match cli.cmd {
        Some(Command::SetPassword { username }) => set_password(&username),
        None => deliver(cli.run),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn set_password(username: &str) -> Result<()> {
    eprintln!("Paste password (end with Ctrl-D):");
    let mut password = String::new();
    std::io::stdin().read_to_string(&mut password)?;
    let password = password.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        return Err(anyhow!("No password provided"));
    }
    secret_store::save_password(username, password)?;
    println!("Saved password for {username}");
    Ok(())
}

fn deliver(args: RunArgs) -> Result<()> {
    let destination = args
        .destination
        .ok_or_else(|| anyhow!("No LMTP server or maildir provided"))?;
    let username = args
        .username
        .ok_or_else(|| anyhow!("No username provided"))?;
    let password = match args.password {
        Some(p) => p,
        None => secret_store::load_password(&username)?
            .ok_or_else(|| anyhow!("No password provided"))?,
    };
    // TODO: ask Zimbra for the account address instead of requiring it
    let address = args.address.ok_or_else(|| anyhow!("No address provided"))?;

    let mut cfg = Config::new(
        config::parse_base_url(config::DEFAULT_BASE_URL)?,
        Credentials::new(username, password),
        address,
    );
    let file = config::load_file_config(args.config.as_deref())
        .context("Configuration error")?;
    cfg.apply_file(file).context("Configuration error")?;
    if let Some(folder) = args.folder {
        cfg.folder = folder;
    }
    cfg.sync = match (args.tag, args.trash) {
        (Some(tag), _) if !tag.is_empty() => Some(SyncMode::Tag(tag)),
        (_, true) => Some(SyncMode::Trash),
        _ => None,
    };

    debug!(
        "Starting: username={} password={} address={} destination={} base_url={}",
        cfg.credentials.username,
        cfg.credentials.masked_password(),
        cfg.address,
        destination.display(),
        cfg.base_url
    );

    let kind: SinkKind = args.sink.into();
    match pipeline::run(&cfg, || open_sink(kind, &destination))? {
        Outcome::NothingNew => {}
        Outcome::Delivered { ids, marked } => {
            if marked && let Some(mode) = &cfg.sync {
                info!("Delivered {} e-mail(s), applied {mode}", ids.len());
            } else {
                info!("Delivered {} e-mail(s)", ids.len());
            }
        }
    }
    Ok(())
}
