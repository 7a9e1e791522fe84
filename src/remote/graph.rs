//! Microsoft Graph implementation of the remote drive, workbook and worksheet traits.
//!
//! All calls are blocking and sequential. Workbook calls carry a persistent workbook
//! session so edits are saved to the file as they are made.

use crate::database::table::CellValue;
use crate::remote::DriveItem;
use crate::remote::RemoteDrive;
use crate::remote::RemoteError;
use crate::remote::RemoteWorkbook;
use crate::remote::RemoteWorksheet;
use crate::remote::WorksheetInfo;
use crate::spreadsheet::reference::RangeAddress;
use reqwest::blocking::Client;
use reqwest::blocking::RequestBuilder;
use reqwest::blocking::Response;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use tracing::debug;
use tracing::info;
use url::Url;

/// Base URL of the Graph v1.0 REST API.
pub const GRAPH_ENDPOINT: &str = "https://graph.microsoft.com/v1.0/";

/// Header carrying the workbook session identifier.
const SESSION_HEADER: &str = "workbook-session-id";

/// Error code Graph reports for missing drive items.
const ITEM_NOT_FOUND: &str = "itemNotFound";

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct Collection<T> {
    value: Vec<T>,
}

#[derive(Deserialize)]
struct Identified {
    id: String,
}

#[derive(Deserialize)]
struct GraphItem {
    id: String,
    name: String,
    folder: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct GraphRange {
    address: String,
}

/// Turns an error response body into a [`RemoteError`].
pub(crate) fn parse_error(status: u16, body: &str) -> RemoteError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => RemoteError::Api {
            status,
            code: envelope.error.code,
            message: envelope.error.message,
        },
        Err(_) => RemoteError::Api {
            status,
            code: String::new(),
            message: body.to_owned(),
        },
    }
}

/// Maps Graph's `itemNotFound` answer for `path` onto [`RemoteError::ItemNotFound`].
pub(crate) fn item_error(path: &str, error: RemoteError) -> RemoteError {
    match error {
        RemoteError::Api { code, .. } if code == ITEM_NOT_FOUND => RemoteError::ItemNotFound { path: path.to_owned() },
        other => other,
    }
}

/// Splits a drive path into URL segments addressing the item relative to the drive root,
/// e.g. `/Data/book.xlsx` becomes `root:`, `Data`, `book.xlsx:`.
pub(crate) fn item_path_segments(path: &str) -> Vec<String> {
    let parts: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
    if parts.is_empty() {
        return vec!["root".to_owned()];
    }
    let mut segments = vec!["root:".to_owned()];
    segments.extend(parts.iter().map(|part| part.to_string()));
    if let Some(last) = segments.last_mut() {
        last.push(':');
    }
    segments
}

/// Authenticated Graph HTTP client.
#[derive(Clone)]
pub struct GraphClient {
    http: Client,
    base: Url,
    access_token: String,
    session_id: Option<String>,
}

impl GraphClient {
    pub fn new(access_token: &str) -> Result<Self, RemoteError> {
        Self::with_base(GRAPH_ENDPOINT, access_token)
    }

    /// Creates a client against another base URL, e.g. a national cloud endpoint.
    pub fn with_base(base: &str, access_token: &str) -> Result<Self, RemoteError> {
        Ok(GraphClient {
            http: Client::builder().build()?,
            base: Url::parse(base)?,
            access_token: access_token.to_owned(),
            session_id: None,
        })
    }

    fn with_session(&self, session_id: String) -> Self {
        GraphClient {
            session_id: Some(session_id),
            ..self.clone()
        }
    }

    /// Builds an endpoint URL by appending path segments to the base, percent-encoding each.
    pub(crate) fn endpoint<S: AsRef<str>>(&self, segments: &[S]) -> Result<Url, RemoteError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidEndpoint(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let mut request = request.bearer_auth(&self.access_token);
        if let Some(session_id) = &self.session_id {
            request = request.header(SESSION_HEADER, session_id);
        }
        let response = request.send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(parse_error(status.as_u16(), &body))
    }

    fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, RemoteError> {
        debug!(%url, "GET");
        Ok(self.send(self.http.get(url))?.json()?)
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, url: Url, body: &B) -> Result<T, RemoteError> {
        debug!(%url, "POST");
        Ok(self.send(self.http.post(url).json(body))?.json()?)
    }

    /// Posts a command whose response body carries nothing of interest.
    fn post_command<B: Serialize>(&self, url: Url, body: &B) -> Result<(), RemoteError> {
        debug!(%url, "POST");
        self.send(self.http.post(url).json(body))?;
        Ok(())
    }

    fn patch<B: Serialize>(&self, url: Url, body: &B) -> Result<(), RemoteError> {
        debug!(%url, "PATCH");
        self.send(self.http.patch(url).json(body))?;
        Ok(())
    }

    fn put<T: DeserializeOwned>(&self, url: Url, content: Vec<u8>) -> Result<T, RemoteError> {
        debug!(%url, "PUT");
        let request = self
            .http
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(content);
        Ok(self.send(request)?.json()?)
    }

    fn delete(&self, url: Url) -> Result<(), RemoteError> {
        debug!(%url, "DELETE");
        self.send(self.http.delete(url))?;
        Ok(())
    }
}

/// A document library or OneDrive reached through Graph.
pub struct GraphDrive {
    client: GraphClient,
    drive_id: String,
}

impl GraphDrive {
    /// Resolves the default document library of a SharePoint site, e.g.
    /// host `contoso.sharepoint.com` and site path `/sites/Finance`.
    pub fn sharepoint(client: GraphClient, host_name: &str, site_path: &str) -> Result<Self, RemoteError> {
        let mut segments = vec!["sites".to_owned(), format!("{}:", host_name)];
        segments.extend(site_path.split('/').filter(|part| !part.is_empty()).map(str::to_owned));
        let site: Identified = client.get(client.endpoint(&segments)?)?;
        let drive: Identified = client.get(client.endpoint(&["sites", site.id.as_str(), "drive"])?)?;
        info!(host = host_name, site = site_path, drive = drive.id.as_str(), "sharepoint drive resolved");
        Ok(GraphDrive { client, drive_id: drive.id })
    }

    /// Uses the signed-in user's OneDrive.
    pub fn onedrive(client: GraphClient) -> Result<Self, RemoteError> {
        let drive: Identified = client.get(client.endpoint(&["me", "drive"])?)?;
        info!(drive = drive.id.as_str(), "onedrive resolved");
        Ok(GraphDrive { client, drive_id: drive.id })
    }

    fn item_endpoint(&self, path: &str, tail: &[&str]) -> Result<Url, RemoteError> {
        let mut segments = vec!["drives".to_owned(), self.drive_id.clone()];
        segments.extend(item_path_segments(path));
        segments.extend(tail.iter().map(|segment| segment.to_string()));
        self.client.endpoint(&segments)
    }
}

impl RemoteDrive for GraphDrive {
    type Workbook = GraphWorkbook;

    fn id(&self) -> &str {
        &self.drive_id
    }

    fn get_item_by_path(&self, path: &str) -> Result<DriveItem, RemoteError> {
        let item: GraphItem = self
            .client
            .get(self.item_endpoint(path, &[])?)
            .map_err(|error| item_error(path, error))?;
        Ok(DriveItem { id: item.id, name: item.name })
    }

    fn upload_file(&self, path: &str, content: Vec<u8>) -> Result<DriveItem, RemoteError> {
        let item: GraphItem = self.client.put(self.item_endpoint(path, &["content"])?, content)?;
        info!(path, "file uploaded");
        Ok(DriveItem { id: item.id, name: item.name })
    }

    fn open_workbook(&self, item: &DriveItem) -> Result<GraphWorkbook, RemoteError> {
        let segments = vec![
            "drives".to_owned(),
            self.drive_id.clone(),
            "items".to_owned(),
            item.id.clone(),
            "workbook".to_owned(),
        ];
        let mut session_segments = segments.clone();
        session_segments.push("createSession".to_owned());
        let url = self.client.endpoint(&session_segments)?;
        let session: Identified = self.client.post(url, &json!({ "persistChanges": true }))?;
        debug!(item = item.name.as_str(), "workbook session created");
        Ok(GraphWorkbook {
            client: self.client.with_session(session.id),
            segments,
        })
    }

    fn list_root_folders(&self) -> Result<Vec<DriveItem>, RemoteError> {
        let url = self.client.endpoint(&["drives", self.drive_id.as_str(), "root", "children"])?;
        let children: Collection<GraphItem> = self.client.get(url)?;
        Ok(children
            .value
            .into_iter()
            .filter(|item| item.folder.is_some())
            .map(|item| DriveItem { id: item.id, name: item.name })
            .collect())
    }
}

/// A workbook opened with a persistent session.
pub struct GraphWorkbook {
    client: GraphClient,
    /// Path segments up to and including `workbook`
    segments: Vec<String>,
}

impl GraphWorkbook {
    fn endpoint(&self, tail: &[&str]) -> Result<Url, RemoteError> {
        let mut segments = self.segments.clone();
        segments.extend(tail.iter().map(|segment| segment.to_string()));
        self.client.endpoint(&segments)
    }
}

impl RemoteWorkbook for GraphWorkbook {
    type Worksheet = GraphWorksheet;

    fn list_worksheets(&self) -> Result<Vec<WorksheetInfo>, RemoteError> {
        let worksheets: Collection<WorksheetInfo> = self.client.get(self.endpoint(&["worksheets"])?)?;
        Ok(worksheets.value)
    }

    fn add_worksheet(&self, name: &str) -> Result<WorksheetInfo, RemoteError> {
        self.client.post(self.endpoint(&["worksheets", "add"])?, &json!({ "name": name }))
    }

    fn delete_worksheet(&self, id: &str) -> Result<(), RemoteError> {
        self.client.delete(self.endpoint(&["worksheets", id])?)
    }

    fn rename_worksheet(&self, id: &str, new_name: &str) -> Result<(), RemoteError> {
        self.client.patch(self.endpoint(&["worksheets", id])?, &json!({ "name": new_name }))
    }

    fn worksheet(&self, info: &WorksheetInfo) -> GraphWorksheet {
        let mut segments = self.segments.clone();
        segments.extend(["worksheets".to_owned(), info.id.clone()]);
        GraphWorksheet {
            client: self.client.clone(),
            segments,
            name: info.name.clone(),
        }
    }
}

/// One worksheet of a [`GraphWorkbook`].
pub struct GraphWorksheet {
    client: GraphClient,
    /// Path segments up to and including the worksheet id
    segments: Vec<String>,
    name: String,
}

impl GraphWorksheet {
    fn range_endpoint(&self, address: &RangeAddress, tail: &[&str]) -> Result<Url, RemoteError> {
        let mut segments = self.segments.clone();
        segments.push(format!("range(address='{}')", address));
        segments.extend(tail.iter().map(|segment| segment.to_string()));
        self.client.endpoint(&segments)
    }
}

impl RemoteWorksheet for GraphWorksheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_range(&self, address: &RangeAddress, values: &[Vec<CellValue>]) -> Result<(), RemoteError> {
        self.client.patch(self.range_endpoint(address, &[])?, &json!({ "values": values }))
    }

    fn used_range(&self) -> Result<RangeAddress, RemoteError> {
        let mut segments = self.segments.clone();
        segments.push("usedRange".to_owned());
        let range: GraphRange = self.client.get(self.client.endpoint(&segments)?)?;
        RangeAddress::parse(&range.address).map_err(|error| RemoteError::UnexpectedResponse(error.to_string()))
    }

    fn clear_range(&self, address: &RangeAddress) -> Result<(), RemoteError> {
        self.client.post_command(self.range_endpoint(address, &["clear"])?, &json!({ "applyTo": "Contents" }))
    }

    fn auto_fit_columns(&self, address: &RangeAddress) -> Result<(), RemoteError> {
        self.client.post_command(self.range_endpoint(address, &["format", "autofitColumns"])?, &json!({}))
    }
}
