//! Command line and environment configuration.
//!
//! Raw arguments are parsed with `clap` and then validated into typed configs
//! before anything touches the network or the database.

use crate::export::ExportOptions;
use crate::helpers::xlsx::validate_sheet_name;
use crate::remote::auth::Credentials;
use crate::remote::auth::NATIVE_REDIRECT_URI;
use crate::spreadsheet::chunk::DEFAULT_CHUNK_SIZE;
use crate::spreadsheet::SpreadsheetError;
use clap::builder::TypedValueParser;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting '{0}'")]
    MissingSetting(&'static str),

    #[error("Either --query or --query-file must be given, not both")]
    AmbiguousQuery,

    #[error("Query is empty")]
    EmptyQuery,

    #[error("Remote path '{0}' must point to an .xlsx file")]
    InvalidRemotePath(String),

    #[error("Read query file '{path}' failed: {source}")]
    QueryFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    SheetName(#[from] SpreadsheetError),
}

/// Where the workbook lives.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DriveType {
    /// Default document library of a SharePoint site
    Sharepoint,
    /// OneDrive of the signed-in user
    Onedrive,
}

#[derive(Parser, Debug)]
#[command(name = "sheet-export")]
#[command(author, version, about = "Export SQL query results into a worksheet of a cloud-hosted Excel workbook")]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a query and write its result into a worksheet
    Export(ExportArgs),

    /// Grant consent and save a fresh token
    Login,

    /// Print the drive id and the folders under the drive root
    Folders,
}

/// Settings shared by every command.
#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Application (client) id of the app registration
    #[arg(long, env = "O365_CLIENT_ID", global = true)]
    pub client_id: Option<String>,

    /// Client secret of the app registration
    #[arg(long, env = "O365_CLIENT_SECRET", global = true, hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Directory tenant used for sign-in
    #[arg(long, env = "O365_TENANT", default_value = "common", global = true)]
    pub tenant: String,

    /// SharePoint host, e.g. contoso.sharepoint.com
    #[arg(long, env = "O365_HOST_NAME", global = true)]
    pub host_name: Option<String>,

    /// Server-relative site path, e.g. /sites/Finance
    #[arg(long, env = "O365_SITE_PATH", global = true)]
    pub site_path: Option<String>,

    #[arg(long, value_enum, default_value = "sharepoint", global = true)]
    pub drive_type: DriveType,

    /// File the OAuth token is persisted to
    #[arg(long, env = "O365_TOKEN_FILE", default_value = "o365_token.txt", global = true)]
    pub token_file: PathBuf,

    /// Requested scopes; helper names basic, onedrive_all and sharepoint_dl are expanded
    #[arg(long = "scope", default_values = ["basic", "onedrive_all", "sharepoint_dl"], global = true)]
    pub scopes: Vec<String>,

    #[arg(long, default_value = NATIVE_REDIRECT_URI, global = true)]
    pub redirect_uri: String,
}

/// Settings of the export command.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// SQL query whose result is exported
    #[arg(long)]
    pub query: Option<String>,

    /// File holding the SQL query
    #[arg(long)]
    pub query_file: Option<PathBuf>,

    /// DuckDB database file; in-memory when omitted
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Statement run before the query, e.g. an ATTACH of an external database (repeatable)
    #[arg(long)]
    pub init_sql: Vec<String>,

    /// Workbook path on the drive, e.g. /Data/Sales/CONTRACTS.xlsx
    #[arg(long)]
    pub remote_path: String,

    /// Target worksheet name
    #[arg(long, default_value = "Sheet1")]
    pub sheet: String,

    /// Rows per range update
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, value_parser = clap::value_parser!(u64).range(1..).map(|size| size as usize))]
    pub chunk_size: usize,

    /// Clear the worksheet in place instead of replacing it with a fresh one
    #[arg(long)]
    pub keep_sheet: bool,

    /// Don't fit column widths after writing
    #[arg(long)]
    pub no_auto_fit: bool,
}

/// Validated connection settings.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    pub credentials: Credentials,
    pub drive: DriveConfig,
    pub token_file: PathBuf,
    pub scopes: Vec<String>,
    pub redirect_uri: String,
}

/// Validated drive location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DriveConfig {
    Sharepoint { host_name: String, site_path: String },
    Onedrive,
}

impl TryFrom<&ConnectionArgs> for ConnectionConfig {
    type Error = ConfigError;

    fn try_from(args: &ConnectionArgs) -> Result<Self, Self::Error> {
        let client_id = non_empty(&args.client_id).ok_or(ConfigError::MissingSetting("client-id"))?;
        let client_secret = non_empty(&args.client_secret).ok_or(ConfigError::MissingSetting("client-secret"))?;
        let drive = match args.drive_type {
            DriveType::Sharepoint => DriveConfig::Sharepoint {
                host_name: non_empty(&args.host_name).ok_or(ConfigError::MissingSetting("host-name"))?,
                site_path: non_empty(&args.site_path).ok_or(ConfigError::MissingSetting("site-path"))?,
            },
            DriveType::Onedrive => DriveConfig::Onedrive,
        };
        Ok(ConnectionConfig {
            credentials: Credentials {
                client_id,
                client_secret,
                tenant: args.tenant.clone(),
            },
            drive,
            token_file: args.token_file.clone(),
            scopes: args.scopes.clone(),
            redirect_uri: args.redirect_uri.clone(),
        })
    }
}

/// Validated export settings.
#[derive(Clone, Debug)]
pub struct ExportConfig {
    pub sql: String,
    pub database: Option<PathBuf>,
    pub init_sql: Vec<String>,
    pub remote_path: String,
    pub sheet_name: String,
    pub options: ExportOptions,
}

impl TryFrom<&ExportArgs> for ExportConfig {
    type Error = ConfigError;

    fn try_from(args: &ExportArgs) -> Result<Self, Self::Error> {
        let sql = match (&args.query, &args.query_file) {
            (Some(query), None) => query.clone(),
            (None, Some(path)) => fs::read_to_string(path).map_err(|source| ConfigError::QueryFile {
                path: path.clone(),
                source,
            })?,
            (Some(_), Some(_)) => return Err(ConfigError::AmbiguousQuery),
            (None, None) => return Err(ConfigError::MissingSetting("query")),
        };
        if sql.trim().is_empty() {
            return Err(ConfigError::EmptyQuery);
        }

        let remote_path = args.remote_path.trim().to_owned();
        if !remote_path.to_ascii_lowercase().ends_with(".xlsx") {
            return Err(ConfigError::InvalidRemotePath(remote_path));
        }
        let remote_path = if remote_path.starts_with('/') { remote_path } else { format!("/{}", remote_path) };
        validate_sheet_name(&args.sheet)?;

        Ok(ExportConfig {
            sql,
            database: args.database.clone(),
            init_sql: args.init_sql.clone(),
            remote_path,
            sheet_name: args.sheet.clone(),
            options: ExportOptions {
                chunk_size: args.chunk_size,
                recreate: !args.keep_sheet,
                auto_fit: !args.no_auto_fit,
            },
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().map(|value| value.trim()).filter(|value| !value.is_empty()).map(str::to_owned)
}
