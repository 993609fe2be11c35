use std::net::Ipv6Addr;
use std::time::Duration;

use anyhow::Context as _;
use clap::builder::NonEmptyStringValueParser;
use clap::Args;
use digest_auth::AuthContext;
use humantime::format_duration;
use reqwest::{header, Client as HttpClient, Response, StatusCode};
use serde::Deserialize;
use tokio::time;
use tracing::{debug, error, instrument, warn};
use url::{Position, Url};

use crate::stream::Locator;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const JSON_UTF8: &str = "application/json; charset=utf-8";

#[derive(Args)]
#[group(skip)]
pub(crate) struct Config {
    /// Management API host
    #[arg(
        short = 'H',
        long,
        default_value = "localhost",
        value_parser = NonEmptyStringValueParser::new()
    )]
    pub(crate) host: String,

    /// Management API port
    #[arg(
        short = 'P',
        long,
        default_value_t = 8087,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub(crate) port: u16,

    /// Username for digest authentication
    #[arg(short, long, default_value = "nagios")]
    pub(crate) user: String,

    /// Password for digest authentication
    #[arg(short, long, default_value = "nagios", hide_default_value = true)]
    pub(crate) password: String,

    /// Request timeout, in seconds (`3`, `2.5`) or as a duration (`500ms`)
    #[arg(short, long, default_value = "3", value_parser = parse_timeout)]
    pub(crate) timeout: Duration,

    #[command(flatten)]
    pub(crate) stream: Locator,
}

impl Config {
    /// Incoming stream status URL.
    pub(crate) fn url(&self) -> Result<Url, url::ParseError> {
        let mut url = Url::parse("http://localhost/")?;
        let host = match self.host.parse::<Ipv6Addr>() {
            Ok(_) => format!("[{}]", self.host),
            Err(_) => self.host.clone(),
        };
        url.set_host(Some(host.as_str()))?;
        // Only fails for cannot-be-a-base URLs, which `http` never is.
        let _ = url.set_port(Some(self.port));
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.clear().extend(self.stream.path_segments());
        }
        Ok(url)
    }
}

fn parse_timeout(value: &str) -> Result<Duration, String> {
    let timeout = match value.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => {
            Duration::try_from_secs_f64(secs).map_err(|err| err.to_string())?
        }
        Ok(_) => return Err("timeout must be a positive number of seconds".to_string()),
        Err(_) => humantime::parse_duration(value).map_err(|err| err.to_string())?,
    };
    if timeout.is_zero() {
        return Err("timeout must be greater than zero".to_string());
    }
    Ok(timeout)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// Not reachable: DNS, TCP or timeout.
    ConnectionFailure,
    /// Reachable, but answered with a non-2xx status.
    ProtocolFailure,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ProbeError {
    #[error("{reason}")]
    Connection { reason: String },

    #[error("{status} for url: {url}")]
    Protocol { status: StatusCode, url: Url },
}

impl ProbeError {
    pub(crate) fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } => ErrorKind::ConnectionFailure,
            Self::Protocol { .. } => ErrorKind::ProtocolFailure,
        }
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        Self::Connection {
            reason: format!("{:#}", anyhow::Error::from(err)),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct ProbeResult {
    pub(crate) connected: bool,
    pub(crate) error: Option<ProbeError>,
    /// Set when a successful response body could not be decoded. Diagnostic
    /// only, `connected` stays false.
    pub(crate) decode_error: Option<String>,
}

#[derive(Deserialize)]
struct StreamStatus {
    #[serde(rename = "isConnected")]
    is_connected: Option<bool>,
}

pub(crate) struct Client {
    url: Url,
    user: String,
    password: String,
    timeout: Duration,
    http_client: HttpClient,
}

impl Client {
    pub(crate) fn new(config: &Config) -> anyhow::Result<Self> {
        let url = config.url().context("error building stream status URL")?;
        let http_client = HttpClient::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .context("error creating the HTTP client")?;

        Ok(Self {
            url,
            user: config.user.clone(),
            password: config.password.clone(),
            timeout: config.timeout,
            http_client,
        })
    }

    /// Queries the stream status once. Failures are recorded in the result,
    /// never returned.
    #[instrument(skip_all, name = "stream_probe", fields(url = %self.url))]
    pub(crate) async fn probe(&self) -> ProbeResult {
        let outcome = time::timeout(self.timeout, self.fetch())
            .await
            .unwrap_or_else(|_| {
                Err(ProbeError::Connection {
                    reason: format!("no response within {}", format_duration(self.timeout)),
                })
            });

        match outcome {
            Ok(result) => {
                debug!(connected = result.connected);
                result
            }
            Err(err) => {
                error!(kind = ?err.kind(), %err);
                ProbeResult {
                    error: Some(err),
                    ..Default::default()
                }
            }
        }
    }

    async fn fetch(&self) -> Result<ProbeResult, ProbeError> {
        let resp = self.send().await?;

        match resp.json::<StreamStatus>().await {
            Ok(StreamStatus { is_connected }) => Ok(ProbeResult {
                connected: is_connected == Some(true),
                ..Default::default()
            }),
            Err(err) if err.is_decode() => {
                let reason = format!("{:#}", anyhow::Error::from(err));
                warn!(kind = "response body decoding", reason);
                Ok(ProbeResult {
                    decode_error: Some(reason),
                    ..Default::default()
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn send(&self) -> Result<Response, ProbeError> {
        let mut resp = self.get(None).await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            let authorization = self.answer_challenge(&resp)?;
            resp = self.get(Some(authorization)).await?;
        }

        let status = resp.status();
        if !status.is_success() {
            return Err(ProbeError::Protocol {
                status,
                url: self.url.clone(),
            });
        }

        Ok(resp)
    }

    async fn get(&self, authorization: Option<String>) -> Result<Response, ProbeError> {
        let mut request = self
            .http_client
            .get(self.url.clone())
            .header(header::CONTENT_TYPE, JSON_UTF8)
            .header(header::ACCEPT, JSON_UTF8);
        if let Some(authorization) = authorization {
            request = request.header(header::AUTHORIZATION, authorization);
        }

        Ok(request.send().await?)
    }

    fn answer_challenge(&self, resp: &Response) -> Result<String, ProbeError> {
        let unauthorized = || ProbeError::Protocol {
            status: resp.status(),
            url: self.url.clone(),
        };

        let Some(challenge) = resp
            .headers()
            .get_all(header::WWW_AUTHENTICATE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find(|value| is_digest_challenge(value))
        else {
            warn!(kind = "authentication", msg = "no digest challenge offered");
            return Err(unauthorized());
        };
        debug!(challenge);

        let mut prompt = digest_auth::parse(challenge).map_err(|err| {
            warn!(kind = "digest challenge parsing", %err);
            unauthorized()
        })?;
        let context = AuthContext::new(
            self.user.as_str(),
            self.password.as_str(),
            &self.url[Position::BeforePath..],
        );
        let answer = prompt.respond(&context).map_err(|err| {
            warn!(kind = "digest challenge answering", %err);
            unauthorized()
        })?;

        Ok(answer.to_header_string())
    }
}

/// Whether the `WWW-Authenticate` value uses the `Digest` scheme.
fn is_digest_challenge(value: &str) -> bool {
    let value = value.trim_start();
    let (Some(scheme), Some(rest)) = (value.get(..6), value.get(6..)) else {
        return false;
    };
    scheme.eq_ignore_ascii_case("digest") && rest.chars().next().map_or(true, char::is_whitespace)
}
