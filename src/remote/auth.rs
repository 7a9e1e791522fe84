//! OAuth2 authorization-code flow against the Microsoft identity platform, with the
//! token persisted to a JSON file between runs.
//!
//! The first run (no token file) walks the user through consent: it prints the
//! authorization URL and reads back the URL the browser was redirected to. Later
//! runs load the saved token and refresh it once it is about to expire.

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::Serialize;
use std::fs;
use std::io::BufRead;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;
use url::Url;
use uuid::Uuid;

/// Identity platform authority; `{tenant}` is appended as a path segment.
pub const AUTHORITY: &str = "https://login.microsoftonline.com/";

/// Redirect URI registered for native/desktop applications.
pub const NATIVE_REDIRECT_URI: &str = "https://login.microsoftonline.com/common/oauth2/nativeclient";

const GRAPH_SCOPE_PREFIX: &str = "https://graph.microsoft.com/";

/// Tokens are refreshed this long before they actually expire.
const EXPIRY_SKEW_SECONDS: i64 = 60;

/// Errors raised while obtaining or persisting access tokens.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token request failed ({code}): {description}")]
    TokenRequest { code: String, description: String },

    #[error("Authorization was not granted: {0}")]
    ConsentDenied(String),

    #[error("Redirect URL carries no authorization code")]
    MissingCode,

    #[error("Redirect URL state doesn't match the authorization request")]
    StateMismatch,

    #[error("Token has expired and carries no refresh token, run the login command again")]
    MissingRefreshToken,

    #[error("Token file '{path}': {source}")]
    TokenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{0}")]
    TransportError(#[from] reqwest::Error),

    #[error("{0}")]
    UrlError(#[from] url::ParseError),
}

/// Expands scope helper names into Graph permission scopes.
///
/// `offline_access` is always requested so that a refresh token is issued.
pub fn expand_scopes(scopes: &[String]) -> Vec<String> {
    let mut expanded: Vec<String> = Vec::new();
    let mut push = |scope: String| {
        if !expanded.contains(&scope) {
            expanded.push(scope);
        }
    };
    for scope in scopes {
        let permissions: &[&str] = match scope.as_str() {
            "basic" => &["User.Read"],
            "onedrive" => &["Files.Read.All"],
            "onedrive_all" => &["Files.ReadWrite.All"],
            "sharepoint" => &["Sites.Read.All"],
            "sharepoint_dl" => &["Sites.ReadWrite.All"],
            other => {
                push(other.to_owned());
                continue;
            }
        };
        for permission in permissions {
            push(format!("{}{}", GRAPH_SCOPE_PREFIX, permission));
        }
    }
    push("offline_access".to_owned());
    expanded
}

/// An access token together with what is needed to renew it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Returns true once the token is within the refresh skew of its expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECONDS) >= self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    token_type: String,
    #[serde(default)]
    scope: String,
    expires_in: i64,
}

impl TokenResponse {
    fn into_token(self, now: DateTime<Utc>, previous_refresh_token: Option<&str>) -> Token {
        Token {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or_else(|| previous_refresh_token.map(str::to_owned)),
            token_type: self.token_type,
            scope: self.scope,
            expires_at: now + Duration::seconds(self.expires_in),
        }
    }
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
}

/// Reads and writes the token file.
#[derive(Clone, Debug)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TokenStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<Token, AuthError> {
        let content = fs::read_to_string(&self.path).map_err(|source| self.file_error(source))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, token: &Token) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.file_error(source))?;
        }
        let content = serde_json::to_string_pretty(token)?;
        fs::write(&self.path, content).map_err(|source| self.file_error(source))
    }

    fn file_error(&self, source: std::io::Error) -> AuthError {
        AuthError::TokenFile { path: self.path.clone(), source }
    }
}

/// Application registration used to request tokens.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub tenant: String,
}

/// Obtains, refreshes and persists access tokens.
pub struct Authenticator {
    http: Client,
    credentials: Credentials,
    scopes: Vec<String>,
    redirect_uri: String,
    store: TokenStore,
}

impl Authenticator {
    pub fn new(credentials: Credentials, scopes: &[String], redirect_uri: &str, store: TokenStore) -> Result<Self, AuthError> {
        Ok(Authenticator {
            http: Client::builder().build()?,
            credentials,
            scopes: expand_scopes(scopes),
            redirect_uri: redirect_uri.to_owned(),
            store,
        })
    }

    fn endpoint(&self, name: &str) -> Result<Url, AuthError> {
        let mut url = Url::parse(AUTHORITY)?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend([self.credentials.tenant.as_str(), "oauth2", "v2.0", name]);
        Ok(url)
    }

    /// Builds the URL the user opens in a browser to grant consent.
    pub fn authorization_url(&self, state: &str) -> Result<Url, AuthError> {
        let mut url = self.endpoint("authorize")?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_mode", "query")
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", state);
        Ok(url)
    }

    /// Returns a usable token: runs consent when no token is saved yet, refreshes an expired one.
    pub fn access_token<R: BufRead, W: Write>(&self, input: R, output: W) -> Result<Token, AuthError> {
        if !self.store.exists() {
            info!(path = %self.store.path().display(), "no token found, starting consent flow");
            return self.generate_token(input, output);
        }
        let token = self.store.load()?;
        if token.is_expired(Utc::now()) {
            info!("token expired, refreshing");
            return self.refresh(&token);
        }
        info!("token loaded");
        Ok(token)
    }

    /// Runs the interactive consent flow and saves the resulting token.
    pub fn generate_token<R: BufRead, W: Write>(&self, mut input: R, mut output: W) -> Result<Token, AuthError> {
        let state = consent_state();
        let url = self.authorization_url(&state)?;
        writeln!(output, "Visit the following url to give consent:")?;
        writeln!(output, "{}", url)?;
        writeln!(output, "Paste the authenticated url here:")?;
        output.flush()?;

        let mut redirect = String::new();
        input.read_line(&mut redirect)?;
        let code = authorization_code(redirect.trim(), &state)?;

        let token = self.request_token(
            &[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
            ],
            None,
        )?;
        self.store.save(&token)?;
        info!(path = %self.store.path().display(), "authenticated, token saved");
        Ok(token)
    }

    /// Exchanges the refresh token for a new access token and saves it.
    pub fn refresh(&self, token: &Token) -> Result<Token, AuthError> {
        let refresh_token = token.refresh_token.as_deref().ok_or(AuthError::MissingRefreshToken)?;
        let token = self.request_token(
            &[("grant_type", "refresh_token"), ("refresh_token", refresh_token)],
            Some(refresh_token),
        )?;
        self.store.save(&token)?;
        Ok(token)
    }

    fn request_token(&self, grant: &[(&str, &str)], previous_refresh_token: Option<&str>) -> Result<Token, AuthError> {
        let scope = self.scopes.join(" ");
        let mut form = vec![
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("scope", scope.as_str()),
        ];
        form.extend_from_slice(grant);

        let now = Utc::now();
        let response = self.http.post(self.endpoint("token")?).form(&form).send()?;
        if !response.status().is_success() {
            let body = response.text().unwrap_or_default();
            let error = serde_json::from_str::<TokenErrorResponse>(&body).unwrap_or(TokenErrorResponse {
                error: String::new(),
                error_description: body,
            });
            return Err(AuthError::TokenRequest { code: error.error, description: error.error_description });
        }
        let response: TokenResponse = response.json()?;
        Ok(response.into_token(now, previous_refresh_token))
    }
}

/// Unguessable value tying the pasted redirect to this authorization request.
fn consent_state() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Extracts the authorization code from the URL the browser was redirected to.
pub(crate) fn authorization_code(redirect: &str, expected_state: &str) -> Result<String, AuthError> {
    let url = Url::parse(redirect)?;
    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error_description" => error = Some(value.into_owned()),
            "error" if error.is_none() => error = Some(value.into_owned()),
            _ => (),
        }
    }
    if let Some(error) = error {
        return Err(AuthError::ConsentDenied(error));
    }
    if state.as_deref() != Some(expected_state) {
        return Err(AuthError::StateMismatch);
    }
    code.ok_or(AuthError::MissingCode)
}
