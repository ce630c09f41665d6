use std::{
    env,
    io::{self, Write as _},
};

use clap::Parser;
use cli::{Args, Commands};
use error::{CliError, CliResult, ErrorContext};
use install::{fetch_into, install_apps};
use logging::setup_logging;
use qh_config::config::{config_path, QhConfig};
use qh_dl::http_client::configure_http_client;
use qh_utils::{fs::safe_remove, path::resolve_path};
use script::{prepend_path, setup_apps, PathSet, Script};
use tracing::{debug, info, warn};
use ureq::{
    http::{HeaderMap, HeaderName, HeaderValue},
    Proxy,
};
use utils::{set_color, set_progress};

mod cli;
mod error;
mod install;
mod logging;
mod progress;
mod script;
mod utils;

fn parse_headers(raw: &[String]) -> CliResult<HeaderMap> {
    let mut headers = HeaderMap::new();

    for header in raw {
        let invalid = || CliError::Header(header.clone());
        let (name, value) = header.split_once(':').ok_or_else(invalid)?;
        let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(value.trim()).map_err(|_| invalid())?;
        headers.append(name, value);
    }

    Ok(headers)
}

fn configure_http(args: &Args) -> CliResult<()> {
    let proxy = args
        .proxy
        .as_deref()
        .map(|proxy| {
            Proxy::new(proxy).map_err(|err| {
                CliError::Proxy {
                    proxy: proxy.to_string(),
                    source: Box::new(err),
                }
            })
        })
        .transpose()?;
    let headers = args.header.as_deref().map(parse_headers).transpose()?;
    let user_agent = args.user_agent.clone();

    configure_http_client(|config| {
        if let Some(proxy) = proxy {
            config.proxy = Some(proxy);
        }

        if let Some(user_agent) = user_agent {
            config.user_agent = user_agent;
        }

        if let Some(headers) = headers {
            config.headers.extend(headers);
        }
    });

    Ok(())
}

fn load_config(custom: Option<&str>) -> CliResult<QhConfig> {
    let path = match custom {
        Some(path) => resolve_path(path)?,
        None => config_path(),
    };
    debug!("Using config {}", path.display());

    Ok(QhConfig::load(&path)?)
}

fn print_script(script: &Script) -> CliResult<()> {
    if script.is_empty() {
        return Ok(());
    }

    let mut stdout = io::stdout().lock();
    write!(stdout, "{script}")
        .and_then(|_| stdout.flush())
        .with_context(|| "writing script to stdout".into())
}

fn path_script(dirs: &[String], current_path: Option<&str>) -> CliResult<Script> {
    let mut entries = PathSet::new();
    for dir in dirs {
        entries.add(resolve_path(dir)?.to_string_lossy());
    }

    let mut script = Script::new();
    prepend_path(&mut script, &entries, current_path);
    Ok(script)
}

fn check_config(config: &QhConfig) {
    let problems = config.check();
    if problems.is_empty() {
        info!("All {} apps are in place", config.apps.len());
        return;
    }

    for problem in problems {
        warn!("{problem}");
    }
}

fn handle_cli() -> CliResult<()> {
    let args = Args::parse();

    setup_logging(&args)?;

    if args.no_color {
        set_color(false);
    }

    if args.no_progress {
        set_progress(false);
    }

    configure_http(&args)?;

    let current_path = env::var("PATH").ok();
    let custom_config = args.config.as_deref();

    match &args.command {
        None => print_script(&path_script(&args.dirs, current_path.as_deref())?)?,
        Some(Commands::Path {
            dirs,
        }) => print_script(&path_script(dirs, current_path.as_deref())?)?,
        Some(Commands::Check) => check_config(&load_config(custom_config)?),
        Some(Commands::Add {
            apps,
        }) => {
            let config = load_config(custom_config)?;
            let apps = config.resolve_apps(apps)?;
            print_script(&setup_apps(&config, &apps, current_path.as_deref())?)?;
        }
        Some(Commands::Install {
            apps,
            force,
        }) => {
            let config = load_config(custom_config)?;
            install_apps(&config, apps, *force)?;
        }
        Some(Commands::Fetch {
            url,
            dest,
            force,
        }) => {
            let dest = resolve_path(dest)?;
            if *force {
                safe_remove(&dest)?;
            }
            let label = dest
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| url.clone());
            fetch_into(&label, url, &dest)?;
        }
    }

    progress::stop();
    Ok(())
}

fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if let Err(err) = handle_cli() {
        progress::stop();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers(&[
            "Authorization: Bearer abc".to_string(),
            "X-Trace:1".to_string(),
        ])
        .unwrap();

        assert_eq!(headers["authorization"], "Bearer abc");
        assert_eq!(headers["x-trace"], "1");
    }

    #[test]
    fn test_parse_headers_rejects_garbage() {
        assert!(matches!(
            parse_headers(&["no separator".to_string()]),
            Err(CliError::Header(_))
        ));
        assert!(parse_headers(&["bad name: x".to_string()]).is_err());
    }

    #[test]
    fn test_path_script() {
        let script = path_script(
            &["/opt/a/bin".to_string(), "/opt/a/bin".to_string()],
            Some("/usr/bin"),
        )
        .unwrap();
        assert_eq!(script.to_string(), "export PATH=\"/opt/a/bin:/usr/bin\"\n");
    }

    #[test]
    fn test_load_config_from_custom_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qh.json");
        std::fs::write(&path, r#"{"apps": {"x": "x"}}"#).unwrap();

        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.apps.len(), 1);
        assert_eq!(config.root(), dir.path().to_str());
    }
}
