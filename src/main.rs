//! termdir - Main entry point.
//!
//! Inspects and edits the host, key and known-hosts directory.
//!
//! Usage: termdir <COMMAND> [ARGS]
//!
//! Commands:
//!   hosts                          List saved hosts
//!   recent                         List the most recently used hosts
//!   search <QUERY>                 Fuzzy-search hosts by alias and hostname
//!   add-host <ALIAS> <HOSTNAME>    Save a host [--port N] [--user U] [--key NAME] [--env NAME=VALUE]
//!   keys                           List saved keys
//!   keygen <NAME>                  Generate a key [--rsa BITS | --ecdsa] [--passphrase P]
//!   known-hosts                    List trusted host keys
//!
//! Options:
//!   --version, -v    Show version
//!   --help, -h       Show this help

use std::env;
use std::process;

use termdir::config::Config;
use termdir::directory::{DirectoryStore, Host, KeyType};
use termdir::keys::{KeyGenerator, KeyRequest};
use termdir::logging;
use tracing::warn;

/// Crate version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "\
Usage: termdir <COMMAND> [ARGS]

Commands:
  hosts                          List saved hosts
  recent                         List the most recently used hosts
  search <QUERY>                 Fuzzy-search hosts by alias and hostname
  add-host <ALIAS> <HOSTNAME>    Save a host [--port N] [--user U] [--key NAME] [--env NAME=VALUE]
  keys                           List saved keys
  keygen <NAME>                  Generate a key [--rsa BITS | --ecdsa] [--passphrase P]
  known-hosts                    List trusted host keys

Options:
  --version, -v    Show version
  --help, -h       Show this help";

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.iter().any(|a| a == "--version" || a == "-v") {
        println!("termdir v{}", VERSION);
        return;
    }
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return;
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Could not read {}: {}", Config::default_config_path().display(), e);
            Config::default()
        }
    };

    if let Err(e) = logging::init(&config.log_config, &config.log_dir()) {
        eprintln!("Logging disabled: {}", e);
    }

    if let Err(message) = run(&config, &args) {
        eprintln!("termdir: {}", message);
        process::exit(1);
    }
}

/// Dispatches one command.
fn run(config: &Config, args: &[String]) -> Result<(), String> {
    let (command, rest) = args
        .split_first()
        .ok_or_else(|| "missing command".to_string())?;
    let mut store = DirectoryStore::open(config);

    match command.as_str() {
        "hosts" => {
            print_hosts(&store, 0..store.hosts().len());
            Ok(())
        }
        "recent" => {
            print_hosts(&store, store.recent_indices());
            Ok(())
        }
        "search" => {
            let query = rest.join(" ");
            print_hosts(&store, store.search(&query));
            Ok(())
        }
        "add-host" => add_host(&mut store, rest),
        "keys" => {
            for key in store.keys() {
                println!(
                    "{}  {:<20} {:<14} {}",
                    key.id,
                    key.name,
                    key.key_type().to_string(),
                    key.fingerprint().unwrap_or_else(|| "-".to_string())
                );
            }
            Ok(())
        }
        "keygen" => keygen(config, &mut store, rest),
        "known-hosts" => {
            for entry in store.known_hosts().entries() {
                println!("{}", entry.to_line());
            }
            Ok(())
        }
        other => Err(format!("unknown command '{}'\n\n{}", other, USAGE)),
    }
}

fn print_hosts(store: &DirectoryStore, indices: impl IntoIterator<Item = usize>) {
    for host in indices.into_iter().filter_map(|i| store.host(i)) {
        let last_used = host
            .last_used
            .map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string());
        let auth = if host.uses_key() {
            format!("key={}", store.ssh_display_name(host))
        } else {
            "password".to_string()
        };
        let env: Vec<&str> = host.environment().map(|(name, _)| name).collect();
        println!(
            "{:<16} {:<32} {:<20} last={}{}",
            host.alias,
            host.summary(),
            auth,
            last_used,
            if env.is_empty() {
                String::new()
            } else {
                format!(" env={}", env.join(","))
            }
        );
    }
}

fn add_host(store: &mut DirectoryStore, args: &[String]) -> Result<(), String> {
    let (positional, options) = split_options(args)?;
    let [alias, hostname] = positional.as_slice() else {
        return Err("add-host needs <ALIAS> <HOSTNAME>".to_string());
    };

    let mut host = store
        .host_by_alias(alias)
        .cloned()
        .unwrap_or_else(|| Host::new(alias.as_str(), hostname.as_str()));
    host.hostname.clone_from(hostname);

    for (name, value) in options {
        match name {
            "--port" => {
                let port = value
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port '{}'", value))?;
                host = host.with_port(port);
            }
            "--user" => host = host.with_username(value),
            "--key" => {
                let key = store
                    .keys()
                    .iter()
                    .find(|k| k.name == value || k.id.to_string() == value)
                    .ok_or_else(|| format!("no key named '{}'", value))?;
                host = host.with_key(key.id);
            }
            "--env" => {
                if !value.contains('=') {
                    return Err(format!("invalid environment assignment '{}'", value));
                }
                host.environment_variables.push(value.to_string());
            }
            other => return Err(format!("unknown option '{}'", other)),
        }
    }

    println!("Saved {}", host.summary());
    store.save_host(host);
    Ok(())
}

fn keygen(config: &Config, store: &mut DirectoryStore, args: &[String]) -> Result<(), String> {
    let (positional, options) = split_options(args)?;
    let [name] = positional.as_slice() else {
        return Err("keygen needs <NAME>".to_string());
    };

    let mut key_type = config.default_key_type;
    let mut passphrase = None;
    for (option, value) in options {
        match option {
            "--rsa" => {
                let bits = value
                    .parse::<u32>()
                    .map_err(|_| format!("invalid RSA size '{}'", value))?;
                key_type = KeyType::Rsa { bits };
            }
            "--ecdsa" => key_type = KeyType::Ecdsa { in_enclave: false },
            "--passphrase" => passphrase = Some(value.to_string()),
            other => return Err(format!("unknown option '{}'", other)),
        }
    }

    // The CLI has no secure element to talk to
    if key_type.is_hardware_backed() {
        eprintln!("No secure element available, generating a software ECDSA key instead");
        warn!("Falling back from {} to a software key", key_type);
        key_type = key_type.software_fallback();
    }

    let mut request = KeyRequest::new(key_type, name.as_str());
    if let Some(passphrase) = passphrase {
        request = request.with_passphrase(passphrase);
    }

    let key = store
        .generate_key(&KeyGenerator::software(), &request)
        .map_err(|e| e.to_string())?;
    println!("{}", key.public_key);
    Ok(())
}

/// Splits arguments into positionals and `--flag value` pairs.
///
/// `--ecdsa` takes no value.
fn split_options(args: &[String]) -> Result<(Vec<&String>, Vec<(&str, &str)>), String> {
    let mut positional = Vec::new();
    let mut options = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if arg == "--ecdsa" {
            options.push((arg.as_str(), ""));
        } else if arg.starts_with("--") {
            let value = iter
                .next()
                .ok_or_else(|| format!("option '{}' needs a value", arg))?;
            options.push((arg.as_str(), value.as_str()));
        } else {
            positional.push(arg);
        }
    }

    Ok((positional, options))
}
