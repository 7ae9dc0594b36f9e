// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, bail};
use config::Config;
use hearth_client::{GeocodeClient, GisClient, HousingClient};
use hearth_proxy::ProxyContext;
use hearth_store::Store;
use hearth_tui::FinderState;
use runtime::{CliBackend, CliRuntime};
use std::env;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `hearth --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let db_path = config.db_path()?;
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    let store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or HEARTH_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;
    let _removed = store.evict_stale_geometry(config.geometry_ttl())?;

    let timeout = config.upstream_timeout()?;
    let housing = HousingClient::new(config.housing_base_url(), timeout)?;
    let geocoder = GeocodeClient::new(&config.google_api_key(), timeout)?;

    if options.check_only {
        // Config, store, and client construction all succeeded.
        let _gis = GisClient::new(config.gis_query_url(), timeout)?;
        return Ok(());
    }

    match options.command {
        Command::Serve => {
            let gis = GisClient::new(config.gis_query_url(), timeout)?;
            let mut ctx = ProxyContext::new(housing, gis, geocoder, store);
            ctx.geometry_ttl = config.geometry_ttl();
            hearth_proxy::serve(config.bind_addr()?, ctx)
        }
        Command::Tui => {
            let store = Arc::new(Mutex::new(store));
            let (scope, cached) = {
                let guard = store
                    .lock()
                    .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
                let scope = guard.load_scope()?.unwrap_or_else(|| config.default_scope());
                let cached = match runtime::cached_listings(&guard) {
                    Ok(cached) => cached,
                    Err(error) => {
                        eprintln!("ignoring unreadable listings cache: {error:#}");
                        None
                    }
                };
                (scope, cached)
            };

            let backend = CliBackend::new(housing, Arc::clone(&store), options.offline);
            let mut runtime = CliRuntime::new(store);
            let mut state = FinderState::new(scope);
            // Instant first paint from the cache; the fresh fetch replaces
            // it wholesale once it lands.
            if let Some(listings) = cached {
                state.set_listings(listings);
            }
            hearth_tui::run_app(&mut state, &mut runtime, Box::new(backend))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Tui,
    Serve,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    command: Command,
    print_config_path: bool,
    print_db_path: bool,
    print_example: bool,
    check_only: bool,
    offline: bool,
    show_help: bool,
}

fn parse_cli_args(
    mut args: impl Iterator<Item = String>,
    default_config_path: PathBuf,
) -> Result<CliOptions> {
    let mut options = CliOptions {
        config_path: default_config_path,
        command: Command::Tui,
        print_config_path: false,
        print_db_path: false,
        print_example: false,
        check_only: false,
        offline: false,
        show_help: false,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "serve" => options.command = Command::Serve,
            "--config" => {
                let Some(path) = args.next() else {
                    bail!("--config requires a path argument");
                };
                options.config_path = PathBuf::from(path);
            }
            "--print-config-path" => options.print_config_path = true,
            "--print-db-path" => options.print_db_path = true,
            "--print-example-config" => options.print_example = true,
            "--check" => options.check_only = true,
            "--offline" => options.offline = true,
            "--help" | "-h" => options.show_help = true,
            other => bail!("unknown argument {other:?}; run `hearth --help`"),
        }
    }

    if options.offline && options.command == Command::Serve {
        bail!("--offline only applies to the finder, not `hearth serve`");
    }

    Ok(options)
}

fn print_help() {
    println!(
        "hearth -- affordable-housing listing finder\n\n\
         USAGE:\n  hearth [OPTIONS]            run the finder TUI\n  hearth serve [OPTIONS]      run the listing/geocode/boundary proxy\n\n\
         OPTIONS:\n  --config <path>           use a specific config file\n  --print-config-path       print the config file location and exit\n  --print-db-path           print the cache database location and exit\n  --print-example-config    print a config template and exit\n  --check                   validate config and clients, then exit\n  --offline                 finder only: serve cached listings, no network\n  -h, --help                show this help"
    );
}
