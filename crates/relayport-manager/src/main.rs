//! relayport operator binary
//!
//! Drives the lifecycle manager from the command line. Every command prints a
//! JSON envelope (`success`, `message`, `code`, `data`) on stdout and exits
//! non-zero on failure.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use relayport_core::config::load_config;
use relayport_core::tracing_init::init_tracing;

use relayport_manager::engine::DockerEngine;
use relayport_manager::lifecycle::{
    CreateServiceRequest, LifecycleManager, Outcome, ProvisionSettings,
};
use relayport_manager::storage::{ManagerDatabase, NewCustomer, NewNode};

#[derive(Parser, Debug)]
#[command(name = "relayport")]
#[command(version, about = "relayport - proxy service lifecycle manager")]
struct Args {
    /// Path to a JSON settings file.
    #[arg(long, env = "RELAYPORT_CONFIG")]
    config: Option<PathBuf>,

    /// Path to SQLite database file.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Container image for new services.
    #[arg(long)]
    image: Option<String>,

    /// Timeout for each container engine call, in seconds.
    #[arg(long)]
    engine_timeout: Option<u64>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Provisioned proxy services.
    Service {
        #[command(subcommand)]
        action: ServiceCommand,
    },
    /// Upstream relay nodes.
    Node {
        #[command(subcommand)]
        action: NodeCommand,
    },
    /// Customers services can be attributed to.
    Customer {
        #[command(subcommand)]
        action: CustomerCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ServiceCommand {
    /// Provision a container and record the service.
    Create {
        #[arg(long)]
        port: i64,
        #[arg(long)]
        password: String,
        /// Cipher method (defaults to the configured default).
        #[arg(long)]
        method: Option<String>,
        /// Node id to forward to.
        #[arg(long)]
        node: i64,
        /// Customer id to attribute the service to.
        #[arg(long)]
        customer: Option<i64>,
        /// Expiry as a unix timestamp.
        #[arg(long)]
        expires_at: Option<i64>,
    },
    /// Remove a service and its container.
    Delete { id: i64 },
    /// Start a stopped service or stop a running one.
    Toggle { id: i64 },
    /// List services with live container status.
    List,
}

#[derive(Subcommand, Debug)]
enum NodeCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        host: String,
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        port: u16,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    List,
    /// Mark a node active or inactive.
    SetStatus {
        id: i64,
        status: String,
    },
    Rm {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum CustomerCommand {
    Add {
        #[arg(long)]
        name: String,
        /// Messaging handle or other external id.
        #[arg(long)]
        contact: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    List,
    Rm {
        id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing("relayport_manager=info", args.log_json);

    let mut config = load_config(args.config.as_deref())?;
    if let Some(path) = args.db_path {
        config.database_path = Some(path);
    }
    if let Some(image) = args.image {
        config.image = image;
    }
    if let Some(secs) = args.engine_timeout {
        config.engine_timeout_secs = secs;
    }
    let settings = ProvisionSettings::try_from(&config)?;

    let db_path = config.resolved_database_path()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        path = %db_path.display(),
        "Opening manager database"
    );
    let db = ManagerDatabase::open(&db_path).await?;

    let success = match args.command {
        Command::Service { action } => {
            let engine = DockerEngine::connect(config.stop_grace_secs)?;
            let manager = LifecycleManager::new(db, engine, settings);
            run_service(&manager, action).await?
        }
        Command::Node { action } => run_node(&db, action).await?,
        Command::Customer { action } => run_customer(&db, action).await?,
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_service(
    manager: &LifecycleManager<ManagerDatabase, DockerEngine>,
    action: ServiceCommand,
) -> anyhow::Result<bool> {
    match action {
        ServiceCommand::Create {
            port,
            password,
            method,
            node,
            customer,
            expires_at,
        } => {
            let request = CreateServiceRequest {
                port,
                password,
                method,
                node_id: node,
                customer_id: customer,
                expires_at,
            };
            emit(&Outcome::from_result(
                manager.create_service(request).await,
                "Service created",
            ))
        }
        ServiceCommand::Delete { id } => emit(&Outcome::from_result(
            manager.delete_service(id).await,
            "Service deleted",
        )),
        ServiceCommand::Toggle { id } => {
            let result = manager.toggle_service(id).await;
            let message = match &result {
                Ok(toggled) => format!("Service {}", toggled.status),
                Err(_) => String::new(),
            };
            emit(&Outcome::from_result(result, message))
        }
        ServiceCommand::List => emit(&Outcome::from_result(
            manager.list_with_status().await,
            "Services listed",
        )),
    }
}

async fn run_node(db: &ManagerDatabase, action: NodeCommand) -> anyhow::Result<bool> {
    match action {
        NodeCommand::Add {
            name,
            host,
            port,
            username,
            password,
            region,
            notes,
        } => {
            let params = NewNode {
                name: name.trim(),
                host: host.trim(),
                port,
                username: username.as_deref(),
                password: password.as_deref(),
                region: region.as_deref(),
                notes: notes.as_deref(),
            };
            emit(&Outcome::from_store(
                db.create_node(&params).await,
                "Node created",
            ))
        }
        NodeCommand::List => emit(&Outcome::from_store(db.list_nodes().await, "Nodes listed")),
        NodeCommand::SetStatus { id, status } => emit(&Outcome::from_row_change(
            db.update_node_status(id, &status).await,
            "Node",
            id,
            "updated",
        )),
        NodeCommand::Rm { id } => emit(&Outcome::from_row_change(
            db.remove_node(id).await,
            "Node",
            id,
            "removed",
        )),
    }
}

async fn run_customer(db: &ManagerDatabase, action: CustomerCommand) -> anyhow::Result<bool> {
    match action {
        CustomerCommand::Add {
            name,
            contact,
            phone,
            email,
            notes,
        } => {
            let params = NewCustomer {
                name: name.trim(),
                contact_id: contact.as_deref(),
                phone: phone.as_deref(),
                email: email.as_deref(),
                notes: notes.as_deref(),
            };
            emit(&Outcome::from_store(
                db.create_customer(&params).await,
                "Customer created",
            ))
        }
        CustomerCommand::List => emit(&Outcome::from_store(
            db.list_customers().await,
            "Customers listed",
        )),
        CustomerCommand::Rm { id } => emit(&Outcome::from_row_change(
            db.remove_customer(id).await,
            "Customer",
            id,
            "removed",
        )),
    }
}

fn emit<T: Serialize>(outcome: &Outcome<T>) -> anyhow::Result<bool> {
    let json = serde_json::to_string_pretty(outcome)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{json}");
    }
    Ok(outcome.success)
}
