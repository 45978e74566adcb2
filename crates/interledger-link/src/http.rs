//! ILP-over-HTTP links.
//!
//! Each Prepare is POSTed as the binary packet body to the peer's URL with an
//! `Authorization: Bearer <token>` header; the response body is the peer's
//! Fulfill or Reject. The token is either the shared secret itself (`SIMPLE`)
//! or an HS256-signed JWT (`JWT_HS_256`).

use crate::{Link, LinkError, LinkFactory, LinkSettings, LinkTransport};

use std::convert::TryFrom;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use interledger_packet::{Packet, Prepare};
use interledger_service::{CustomSettings, IlpResult, LinkType, OperatorAddress};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, ClientBuilder,
};
use ring::hmac;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{error, trace};
use url::Url;

pub const HTTP_OUTGOING_URL: &str = "http.outgoing.url";
pub const HTTP_OUTGOING_AUTH_TYPE: &str = "http.outgoing.auth_type";
pub const HTTP_OUTGOING_TOKEN_SUBJECT: &str = "http.outgoing.token_subject";
pub const HTTP_OUTGOING_TOKEN_ISSUER: &str = "http.outgoing.token_issuer";
pub const HTTP_OUTGOING_TOKEN_AUDIENCE: &str = "http.outgoing.token_audience";
pub const HTTP_OUTGOING_SHARED_SECRET: &str = "http.outgoing.shared_secret";
/// Lifetime of a signed token, in seconds.
pub const HTTP_OUTGOING_TOKEN_EXPIRY: &str = "http.outgoing.token_expiry";

const DEFAULT_TOKEN_EXPIRY: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthType {
    /// The shared secret is sent as the bearer token.
    Simple,
    /// A JWT signed with HMAC-SHA256 over the shared secret.
    JwtHs256,
}

impl FromStr for AuthType {
    type Err = LinkError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "SIMPLE" => Ok(AuthType::Simple),
            "JWT_HS_256" => Ok(AuthType::JwtHs256),
            other => Err(LinkError::InvalidSettings(format!(
                "unsupported auth type: {}",
                other
            ))),
        }
    }
}

/// Settings for the outgoing half of an ILP-over-HTTP link.
#[derive(Clone, Debug)]
pub struct OutgoingHttpSettings {
    pub url: Url,
    pub auth_type: AuthType,
    pub token_subject: String,
    pub token_issuer: Option<String>,
    pub token_audience: Option<String>,
    pub shared_secret: SecretString,
    pub token_expiry: Duration,
}

impl TryFrom<&CustomSettings> for OutgoingHttpSettings {
    type Error = LinkError;

    fn try_from(custom: &CustomSettings) -> Result<Self, Self::Error> {
        let required = |key: &str| {
            custom
                .get(key)
                .ok_or_else(|| LinkError::InvalidSettings(format!("missing `{}`", key)))
        };
        let url = Url::parse(required(HTTP_OUTGOING_URL)?)
            .map_err(|err| LinkError::InvalidSettings(format!("bad `{}`: {}", HTTP_OUTGOING_URL, err)))?;
        let auth_type = match custom.get(HTTP_OUTGOING_AUTH_TYPE) {
            Some(auth_type) => AuthType::from_str(auth_type)?,
            None => AuthType::Simple,
        };
        let token_expiry = match custom.get(HTTP_OUTGOING_TOKEN_EXPIRY) {
            Some(seconds) => Duration::from_secs(seconds.parse().map_err(|_| {
                LinkError::InvalidSettings(format!("bad `{}`", HTTP_OUTGOING_TOKEN_EXPIRY))
            })?),
            None => DEFAULT_TOKEN_EXPIRY,
        };
        Ok(OutgoingHttpSettings {
            url,
            auth_type,
            token_subject: custom
                .get(HTTP_OUTGOING_TOKEN_SUBJECT)
                .unwrap_or_default()
                .to_owned(),
            token_issuer: custom.get(HTTP_OUTGOING_TOKEN_ISSUER).map(str::to_owned),
            token_audience: custom.get(HTTP_OUTGOING_TOKEN_AUDIENCE).map(str::to_owned),
            shared_secret: SecretString::new(required(HTTP_OUTGOING_SHARED_SECRET)?.to_owned()),
            token_expiry,
        })
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    sub: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    iss: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aud: Option<&'a str>,
    exp: u64,
}

impl OutgoingHttpSettings {
    /// The bearer token to present on the next request.
    pub fn bearer_token(&self, now: SystemTime) -> Result<String, LinkError> {
        match self.auth_type {
            AuthType::Simple => Ok(self.shared_secret.expose_secret().clone()),
            AuthType::JwtHs256 => {
                let exp = (now + self.token_expiry)
                    .duration_since(UNIX_EPOCH)
                    .map(|elapsed| elapsed.as_secs())
                    .unwrap_or_default();
                let claims = Claims {
                    sub: &self.token_subject,
                    iss: self.token_issuer.as_deref(),
                    aud: self.token_audience.as_deref(),
                    exp,
                };
                sign_hs256(&claims, self.shared_secret.expose_secret().as_bytes())
            }
        }
    }
}

fn sign_hs256<T: Serialize>(claims: &T, secret: &[u8]) -> Result<String, LinkError> {
    let header = base64::encode_config(br#"{"alg":"HS256","typ":"JWT"}"#, base64::URL_SAFE_NO_PAD);
    let claims = serde_json::to_vec(claims)
        .map_err(|err| LinkError::InvalidSettings(format!("unable to encode token: {}", err)))?;
    let signing_input = format!(
        "{}.{}",
        header,
        base64::encode_config(&claims, base64::URL_SAFE_NO_PAD)
    );
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    let signature = hmac::sign(&key, signing_input.as_bytes());
    Ok(format!(
        "{}.{}",
        signing_input,
        base64::encode_config(signature.as_ref(), base64::URL_SAFE_NO_PAD)
    ))
}

pub struct HttpTransport {
    settings: OutgoingHttpSettings,
    client: Client,
}

impl HttpTransport {
    pub fn new(settings: OutgoingHttpSettings, client: Client) -> Self {
        HttpTransport { settings, client }
    }
}

#[async_trait]
impl LinkTransport for HttpTransport {
    async fn do_connect(&self) -> Result<(), LinkError> {
        // Request/response over HTTP needs no session; check we can mint a token
        self.settings.bearer_token(SystemTime::now()).map(|_| ())
    }

    async fn do_disconnect(&self) -> Result<(), LinkError> {
        Ok(())
    }

    async fn send_packet(&self, prepare: Prepare) -> Result<IlpResult, LinkError> {
        let token = self.settings.bearer_token(SystemTime::now())?;
        trace!(
            "Sending outgoing ILP over HTTP packet (URL: {})",
            self.settings.url.as_str()
        );
        let response = self
            .client
            .post(self.settings.url.clone())
            .header("authorization", format!("Bearer {}", token))
            .body(prepare.to_bytes().freeze())
            .send()
            .await
            .map_err(|err| {
                error!("Error sending HTTP request: {:?}", err);
                LinkError::Transport(format!("error sending request: {}", err))
            })?;

        let status = response.status();
        if !status.is_success() {
            error!("HTTP error sending ILP over HTTP packet: {}", status);
            return Err(LinkError::Transport(format!(
                "peer responded with HTTP {}",
                status
            )));
        }

        let body = response.bytes().await.map_err(|err| {
            error!("Error getting HTTP response body: {:?}", err);
            LinkError::Transport(format!("error reading response: {}", err))
        })?;
        match Packet::try_from(&body[..]) {
            Ok(Packet::Fulfill(fulfill)) => Ok(Ok(fulfill)),
            Ok(Packet::Reject(reject)) => Ok(Err(reject)),
            Ok(Packet::Prepare(_)) => Err(LinkError::Transport(
                "peer responded with a Prepare packet".to_owned(),
            )),
            Err(err) => Err(LinkError::Transport(format!(
                "unable to parse response packet: {}",
                err
            ))),
        }
    }
}

#[derive(Clone)]
pub struct HttpLinkFactory {
    client: Client,
}

impl HttpLinkFactory {
    pub fn new(client: Client) -> Self {
        HttpLinkFactory { client }
    }
}

impl Default for HttpLinkFactory {
    fn default() -> Self {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert(
            HeaderName::from_static("content-type"),
            HeaderValue::from_static("application/octet-stream"),
        );
        let client = ClientBuilder::new()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        HttpLinkFactory { client }
    }
}

impl LinkFactory for HttpLinkFactory {
    fn supports(&self, link_type: &LinkType) -> bool {
        link_type.value() == LinkType::ILP_OVER_HTTP
    }

    fn construct_link(
        &self,
        operator_address: OperatorAddress,
        link_settings: LinkSettings,
    ) -> Result<Link, LinkError> {
        if !self.supports(link_settings.link_type()) {
            return Err(LinkError::UnsupportedLinkType(link_settings.link_type().clone()));
        }
        let settings = OutgoingHttpSettings::try_from(link_settings.custom_settings())?;
        let transport = HttpTransport::new(settings, self.client.clone());
        Ok(Link::new(operator_address, link_settings, transport))
    }
}
