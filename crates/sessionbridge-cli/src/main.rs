use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::{Parser, Subcommand};
use sessionbridge_api::{CLIENT_INFO_HEADER, Session};
use sessionbridge_cookie::{
    CookieOptions, MAX_CHUNK_SIZE, filter_cookies, join_chunks, parse_cookies,
    serialize_cookie_with_limit,
};
use sessionbridge_core::BridgeConfig;
use sessionbridge_runtime::CLIENT_INFO;

#[derive(Debug, Parser)]
#[command(name = "sessionbridge", about = "Inspect and debug auth session cookies")]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    /// TOML config file; falls back to SUPABASE_URL / SUPABASE_ANON_KEY.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Cookie codec operations
    Cookie {
        #[command(subcommand)]
        command: CookieCommands,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Session cookie inspection (no network)
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
}

#[derive(Debug, Subcommand)]
enum CookieCommands {
    /// Render Set-Cookie directives for a value, chunked as needed
    Serialize {
        #[arg(long)]
        name: String,
        #[arg(long)]
        value: String,
        #[arg(long, default_value_t = MAX_CHUNK_SIZE)]
        chunk_size: usize,
        #[arg(long)]
        max_age: Option<u64>,
    },
    /// Parse a Cookie request header
    Parse { header: String },
    /// Drop directives for a logical cookie from a Set-Cookie list
    Filter {
        #[arg(long)]
        name: String,
        set_cookie: Vec<String>,
    },
    /// Reassemble a (possibly chunked) cookie from a Cookie header
    Join {
        #[arg(long)]
        name: String,
        header: String,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Load and validate the config
    Check,
}

#[derive(Debug, Subcommand)]
enum SessionCommands {
    Inspect {
        #[arg(long)]
        cookie_header: String,
        /// Cookie name; defaults to the configured storage key.
        #[arg(long)]
        name: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Cookie { command } => cmd_cookie(command, cli.json),
        Commands::Config {
            command: ConfigCommands::Check,
        } => {
            let config = load_config(cli.config.as_ref())?;
            let storage_key = config.storage_key();
            let client_info = CLIENT_INFO.header_value();
            pout(
                cli.json,
                serde_json::json!({
                    "url": config.base_url(),
                    "project_ref": config.project_ref(),
                    "storage_key": storage_key,
                    CLIENT_INFO_HEADER: client_info,
                }),
                &format!(
                    "Config OK\n  url: {}\n  storage key: {storage_key}\n  {CLIENT_INFO_HEADER}: {client_info}",
                    config.base_url()
                ),
            )
        }
        Commands::Session {
            command: SessionCommands::Inspect {
                cookie_header,
                name,
            },
        } => {
            let name = match name {
                Some(n) => n,
                None => load_config(cli.config.as_ref())?.storage_key(),
            };
            cmd_session_inspect(&name, &cookie_header, cli.json)
        }
    }
}

fn cmd_cookie(command: CookieCommands, json: bool) -> anyhow::Result<()> {
    match command {
        CookieCommands::Serialize {
            name,
            value,
            chunk_size,
            max_age,
        } => {
            let mut options = CookieOptions::default();
            if max_age.is_some() {
                options.max_age_seconds = max_age;
            }
            let directives = serialize_cookie_with_limit(&name, &value, &options, chunk_size)
                .iter()
                .map(|e| e.to_header_value())
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("cannot render cookie {name}"))?;
            pout(json, serde_json::json!(directives), &directives.join("\n"))
        }
        CookieCommands::Parse { header } => {
            let cookies = parse_cookies(&header);
            let text = cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("\n");
            pout(json, serde_json::json!(cookies), &text)
        }
        CookieCommands::Filter { name, set_cookie } => {
            let kept = filter_cookies(set_cookie, &name);
            pout(json, serde_json::json!(kept), &kept.join("\n"))
        }
        CookieCommands::Join { name, header } => {
            let value = reassemble(&name, &header)?;
            pout(json, serde_json::json!({ "name": name, "value": value }), &value)
        }
    }
}

fn cmd_session_inspect(name: &str, cookie_header: &str, json: bool) -> anyhow::Result<()> {
    let raw = reassemble(name, cookie_header)?;
    let session: Session =
        serde_json::from_str(&raw).with_context(|| format!("cookie {name} is not a session"))?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    let expired = session.is_expired_at(now, 0);
    let expires = session
        .expires_at
        .map_or_else(|| "never".to_string(), |exp| describe_expiry(exp, now));

    pout(
        json,
        serde_json::json!({
            "name": name,
            "user_id": session.user_id(),
            "token_type": session.token_type,
            "expires_at": session.expires_at,
            "expired": expired,
            "has_refresh_token": !session.refresh_token.is_empty(),
        }),
        &format!(
            "Session {name}\n  user: {}\n  expires: {expires}\n  refresh token: {}",
            session.user_id().unwrap_or("(unknown)"),
            if session.refresh_token.is_empty() { "no" } else { "yes" },
        ),
    )
}

fn reassemble(name: &str, cookie_header: &str) -> anyhow::Result<String> {
    let cookies = parse_cookies(cookie_header);
    join_chunks(name, |n| cookies.get(n).cloned())
        .with_context(|| format!("no complete cookie named {name}"))
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<BridgeConfig> {
    let config = match path {
        Some(p) => BridgeConfig::load_from_file(p)?,
        None => BridgeConfig::from_env()?,
    };
    Ok(config)
}

fn describe_expiry(expires_at: u64, now: u64) -> String {
    if expires_at <= now {
        format!("{expires_at} (expired {}s ago)", now - expires_at)
    } else {
        format!("{expires_at} (in {}s)", expires_at - now)
    }
}

fn pout(json_mode: bool, value: serde_json::Value, text: &str) -> anyhow::Result<()> {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{text}");
    }
    Ok(())
}
