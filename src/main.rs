use std::fs::File;
use std::process::ExitCode;

use clap::Parser;
use halnav::core::config::{HalnavConfig, load_config, resolve};
use halnav::{Client, ClientOptions, Data, Error, ErrorCode, FetchResult, RequestOptions, Resource};
use log::{error, info, warn};
use serde_json::Value;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};

#[derive(Parser)]
#[command(name = "halnav", version, about = "Walk a HAL API from its homepage")]
struct Args {
    /// Homepage URL; falls back to HALNAV_ENDPOINT, then the config file
    endpoint: Option<String>,

    /// Relation to follow, in order; repeat to walk further
    #[arg(short, long = "follow", value_name = "REL")]
    follow: Vec<String>,

    /// Parameter for templated links and forms
    #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Always hit the network, even for links already loaded
    #[arg(long)]
    force: bool,

    /// Request timeout in milliseconds
    #[arg(long, value_name = "MS")]
    timeout: Option<u64>,

    /// Also log to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}

fn init_logging(verbose: bool) {
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if let Ok(log_file) = File::create("halnav.log") {
        loggers.push(WriteLogger::new(LevelFilter::Debug, log_config.clone(), log_file));
    }
    if verbose {
        loggers.push(TermLogger::new(
            LevelFilter::Info,
            log_config,
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }
    let _ = CombinedLogger::init(loggers);
}

/// Fetches the homepage, then follows each rel: embedded data first, the
/// first matching action otherwise.
async fn walk(client: &Client, args: &Args) -> Result<FetchResult, Error> {
    let params = if args.params.is_empty() {
        Value::Null
    } else {
        Value::Object(
            args.params
                .iter()
                .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                .collect(),
        )
    };

    let mut current = client.fetch().await?;
    for rel in &args.follow {
        let resource = match &current.data {
            Data::Resource(resource) => resource.clone(),
            Data::Collection(items) if !items.is_empty() => {
                info!("{rel}: following from the first of {} items", items.len());
                items[0].clone()
            }
            _ => return Err(Error::new(ErrorCode::NoActionUrl).with_action(rel)),
        };

        let options = if args.force {
            RequestOptions::new().forced()
        } else {
            RequestOptions::new()
        };

        info!("Following {rel}");
        current = if resource.has_embedded(rel) {
            resource.fetch_embedded(rel, options).await?
        } else {
            resource.first_action(rel, &params).fetch(options).await?
        };
    }
    Ok(current)
}

fn print_resource(resource: &Resource) {
    if let Some(url) = resource.self_link() {
        println!("self: {url}");
    }
    match serde_json::to_string_pretty(resource.props()) {
        Ok(json) => println!("{json}"),
        Err(e) => warn!("Could not render properties: {e}"),
    }

    let actions = resource.list_actions();
    if !actions.links.is_empty() {
        println!("links: {}", actions.links.join(", "));
    }
    if !actions.forms.is_empty() {
        println!("forms: {}", actions.forms.join(", "));
    }
    let embedded = resource.list_embedded();
    if !embedded.is_empty() {
        println!("embedded: {}", embedded.join(", "));
    }
}

fn print_result(result: &FetchResult) {
    match &result.data {
        Data::Resource(resource) => print_resource(resource),
        Data::Collection(items) => {
            for (i, item) in items.iter().enumerate() {
                println!("[{i}]");
                print_resource(item);
            }
        }
        Data::Text(text) => println!("{text}"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    dotenv::dotenv().ok();
    init_logging(args.verbose);

    let config = load_config().unwrap_or_else(|e| {
        warn!("Ignoring config file: {e}");
        HalnavConfig::default()
    });
    let resolved = resolve(&config, args.endpoint.as_deref(), args.timeout);

    let Some(endpoint) = resolved.endpoint else {
        eprintln!("halnav: no endpoint; pass one, set HALNAV_ENDPOINT or add it to ~/.halnav/config.toml");
        return ExitCode::FAILURE;
    };

    info!("halnav {} starting at {endpoint}", Client::VERSION);
    let options = ClientOptions {
        preload_homepage: false,
        ..resolved.options
    };
    let client = Client::new(endpoint, options);

    match walk(&client, &args).await {
        Ok(result) => {
            print_result(&result);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            eprintln!("halnav: {e}");
            ExitCode::FAILURE
        }
    }
}
