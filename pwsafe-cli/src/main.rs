//! `pwsafe`: inspect and edit Password Safe vaults from the command line.

mod commands;

use std::io::{self, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use eyre::{bail, Result, WrapErr};
use pwsafe_core::{FormatVersion, SecretString};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pwsafe", version, about = "Password Safe vault tool")]
struct Cli {
    /// Vault file.
    #[arg(short, long, env = "PWSAFE_FILE", global = true)]
    file: Option<PathBuf>,

    /// Vault passphrase. Prompted for when absent.
    #[arg(long, env = "PWSAFE_PASSPHRASE", hide_env_values = true, global = true)]
    passphrase: Option<String>,

    /// Read secrets from stdin, one per line, instead of prompting.
    #[arg(long, global = true)]
    stdin: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an empty vault.
    Create {
        /// Format generation.
        #[arg(long = "format", value_enum, default_value_t = VersionArg::V3)]
        format: VersionArg,
        /// Key-stretching iterations (V3 only).
        #[arg(long)]
        iterations: Option<u32>,
    },
    /// Show format details.
    Info,
    /// List entries.
    List,
    /// Show one entry.
    Show {
        /// Entry index as printed by `list`.
        index: usize,
        /// Print the password in clear.
        #[arg(long)]
        reveal: bool,
    },
    /// Add an entry. The entry password is prompted for.
    Add {
        /// Entry title.
        #[arg(long)]
        title: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Dot-separated group path (V2/V3).
        #[arg(long)]
        group: Option<String>,
        /// URL (V3).
        #[arg(long)]
        url: Option<String>,
    },
    /// Remove an entry.
    Remove {
        /// Entry index as printed by `list`.
        index: usize,
    },
    /// Change the vault passphrase.
    Passwd,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum VersionArg {
    V1,
    V2,
    V3,
}

impl From<VersionArg> for FormatVersion {
    fn from(arg: VersionArg) -> Self {
        match arg {
            VersionArg::V1 => Self::V1,
            VersionArg::V2 => Self::V2,
            VersionArg::V3 => Self::V3,
        }
    }
}

/// Where secrets come from: the terminal, or stdin when scripted.
struct Secrets {
    lines: Option<std::vec::IntoIter<String>>,
}

impl Secrets {
    fn new(from_stdin: bool) -> Result<Self> {
        if !from_stdin {
            return Ok(Self { lines: None });
        }
        let mut data = String::new();
        io::stdin()
            .read_to_string(&mut data)
            .wrap_err("failed to read secrets from stdin")?;
        let lines: Vec<String> = data.lines().map(str::to_owned).collect();
        Ok(Self {
            lines: Some(lines.into_iter()),
        })
    }

    fn read(&mut self, prompt: &str) -> Result<SecretString> {
        let text = match self.lines.as_mut() {
            Some(lines) => match lines.next() {
                Some(line) => line,
                None => bail!("stdin ran out of secrets at \"{}\"", prompt.trim()),
            },
            None => rpassword::prompt_password(prompt).wrap_err("failed to read passphrase")?,
        };
        Ok(SecretString::from(text))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(path) = cli.file else {
        bail!("no vault file given; use --file or PWSAFE_FILE");
    };
    let mut secrets = Secrets::new(cli.stdin)?;
    let passphrase = match cli.passphrase {
        Some(text) => SecretString::from(text),
        None => secrets.read("Passphrase: ")?,
    };
    let mut out = io::stdout().lock();

    match cli.command {
        Command::Create { format, iterations } => {
            commands::create(&path, format.into(), iterations, &passphrase, &mut out)
        }
        Command::Info => commands::info(&path, &passphrase, &mut out),
        Command::List => commands::list(&path, &passphrase, &mut out),
        Command::Show { index, reveal } => {
            commands::show(&path, &passphrase, index, reveal, &mut out)
        }
        Command::Add {
            title,
            username,
            notes,
            group,
            url,
        } => {
            let entry = commands::NewEntry {
                title,
                username,
                notes,
                group,
                url,
            };
            let password = secrets.read("Entry password: ")?;
            commands::add(&path, &passphrase, &entry, &password, &mut out)
        }
        Command::Remove { index } => commands::remove(&path, &passphrase, index, &mut out),
        Command::Passwd => {
            let new_passphrase = secrets.read("New passphrase: ")?;
            commands::passwd(&path, &passphrase, &new_passphrase, &mut out)
        }
    }
}
