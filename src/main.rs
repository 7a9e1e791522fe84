use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use sheet_export::config::Cli;
use sheet_export::config::Command;
use sheet_export::config::ConnectionConfig;
use sheet_export::config::DriveConfig;
use sheet_export::config::ExportConfig;
use sheet_export::database::query::open_connection;
use sheet_export::database::query::query_table;
use sheet_export::remote::auth::Authenticator;
use sheet_export::remote::auth::TokenStore;
use sheet_export::remote::graph::GraphClient;
use sheet_export::remote::graph::GraphDrive;
use sheet_export::remote::RemoteDrive;
use sheet_export::update_excel_data;
use std::io;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let connection = ConnectionConfig::try_from(&cli.connection)?;
    let authenticator = Authenticator::new(
        connection.credentials.clone(),
        &connection.scopes,
        &connection.redirect_uri,
        TokenStore::new(&connection.token_file),
    )?;

    match &cli.command {
        Command::Login => {
            authenticator
                .generate_token(io::stdin().lock(), io::stdout())
                .context("Login failed")?;
        }
        Command::Folders => {
            let drive = connect(&authenticator, &connection)?;
            println!("Drive: {}", drive.id());
            for folder in drive.list_root_folders().context("List folders failed")? {
                println!("{}", folder.name);
            }
        }
        Command::Export(args) => {
            let export = ExportConfig::try_from(args)?;
            let database = open_connection(export.database.as_deref(), &export.init_sql)?;
            let mut table = query_table(&database, &export.sql).context("Query failed")?;
            info!(columns = table.width(), rows = table.height(), "query finished");

            let drive = connect(&authenticator, &connection)?;
            update_excel_data(&drive, &mut table, &export.remote_path, &export.sheet_name, &export.options)
                .with_context(|| format!("Export to '{}' failed", export.remote_path))?;
        }
    }
    Ok(())
}

fn connect(authenticator: &Authenticator, connection: &ConnectionConfig) -> Result<GraphDrive> {
    let token = authenticator
        .access_token(io::stdin().lock(), io::stdout())
        .context("Authentication failed")?;
    let client = GraphClient::new(&token.access_token)?;
    let drive = match &connection.drive {
        DriveConfig::Sharepoint { host_name, site_path } => GraphDrive::sharepoint(client, host_name, site_path),
        DriveConfig::Onedrive => GraphDrive::onedrive(client),
    }
    .context("Connect to drive failed")?;
    Ok(drive)
}
