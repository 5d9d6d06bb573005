use std::io::Read;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use relay_core::{Gvk, OpError, Outcome, Verb};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "relayctl", version, about = "Relay: run resource operations against a cluster")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Target namespace for namespaced kinds
    #[arg(long = "ns", global = true, env = "AGENT_NAMESPACE")]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Discover served resources (incl. CRDs)
    Discover,
    /// Resolve a group/version/kind key to its plural name and scope
    Resolve {
        /// GVK key, e.g. "v1/ConfigMap" or "argoproj.io/v1alpha1/Workflow"
        gvk: String,
    },
    /// Run create/update/get/delete for a manifest
    Op {
        /// One of create, update, get, delete
        #[arg(value_parser = parse_verb)]
        verb: Verb,
        /// Manifest path (JSON, or YAML by .yaml/.yml extension); "-" reads JSON from stdin
        #[arg(short = 'f', long = "file")]
        file: String,
    },
    /// Cluster registration record
    Registration {
        #[command(subcommand)]
        action: RegistrationCmd,
    },
}

#[derive(Subcommand, Debug)]
enum RegistrationCmd {
    /// Show whether this cluster completed registration
    Status,
    /// Record a confirmed registration (fails if one exists)
    Register {
        #[arg(long = "key")]
        key: String,
        #[arg(long = "cluster-id")]
        cluster_id: String,
    },
}

fn parse_verb(s: &str) -> Result<Verb, OpError> {
    Verb::from_str(s)
}

fn init_tracing() {
    let env = std::env::var("RELAY_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("RELAY_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid RELAY_METRICS_ADDR; expected host:port");
        }
    }
}

fn read_manifest(file: &str) -> Result<String> {
    if file == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("reading manifest from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(file).with_context(|| format!("reading manifest {}", file))
}

fn is_yaml_path(file: &str) -> bool {
    let lower = file.to_ascii_lowercase();
    lower.ends_with(".yaml") || lower.ends_with(".yml")
}

fn print_outcome(outcome: &Outcome, output: Output) -> Result<()> {
    match output {
        Output::Human => match outcome.object() {
            Some(obj) => {
                let ns = obj.namespace().unwrap_or("-");
                println!("{} {} {}/{}", outcome.label(), obj.kind().unwrap_or(""), ns, obj.name());
            }
            None => println!("{}", outcome.label()),
        },
        Output::Json => {
            let v = serde_json::json!({ "outcome": outcome.label(), "object": outcome.object() });
            println!("{}", serde_json::to_string_pretty(&v)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let ns = cli.namespace.clone().unwrap_or_default();

    match cli.command {
        Commands::Discover => {
            info!("discover invoked");
            let resources = relay_kubehub::discover().await?;
            match cli.output {
                Output::Human => {
                    for r in resources {
                        let scope = if r.namespaced { "namespaced" } else { "cluster" };
                        println!("{} • {} • {}", r.gvk_key(), r.plural, scope);
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&resources)?),
            }
        }
        Commands::Resolve { gvk } => {
            let gvk: Gvk = gvk.parse()?;
            let resolver = relay_kubehub::shared_resolver().await?;
            let rt = resolver.resolve(&gvk).await?;
            match cli.output {
                Output::Human => {
                    let scope = if rt.namespaced() { "namespaced" } else { "cluster" };
                    println!("{} • {} • {}", gvk, rt.plural, scope);
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&rt)?),
            }
        }
        Commands::Op { verb, file } => {
            info!(verb = %verb, file = %file, ns = %ns, "op invoked");
            let raw = read_manifest(&file)?;
            let (obj, gvk) = if is_yaml_path(&file) {
                relay_apply::decode_manifest_yaml(&raw)?
            } else {
                relay_apply::decode_manifest(&raw)?
            };
            let engine = relay_apply::default_engine().await?;
            let outcome = engine.perform_object(obj, &gvk, verb, &ns).await?;
            print_outcome(&outcome, cli.output)?;
        }
        Commands::Registration { action } => {
            let store = if ns.is_empty() {
                relay_persist::ConfigMapStore::open_default().await?
            } else {
                relay_persist::ConfigMapStore::open_in(&ns).await?
            };
            match action {
                RegistrationCmd::Status => {
                    let (confirmed, key) = relay_persist::is_cluster_confirmed(&store).await?;
                    match cli.output {
                        Output::Human => println!("confirmed={} cluster_key={}", confirmed, key),
                        Output::Json => println!("{}", serde_json::json!({ "confirmed": confirmed, "cluster_key": key })),
                    }
                }
                RegistrationCmd::Register { key, cluster_id } => {
                    relay_persist::cluster_register(&store, &key, &cluster_id).await?;
                    println!("registered cluster {}", cluster_id);
                }
            }
        }
    }

    Ok(())
}
