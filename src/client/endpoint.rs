//! Immutable description of the node endpoint, derived once from the
//! configured base URL and shared by every request a client issues.

use anyhow::{bail, Context, Result};
use percent_encoding::percent_decode_str;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    scheme: String,
    host: String,
    port: u16,
    base_path: String,
    credentials: Option<Credentials>,
}

impl Endpoint {
    /// Parses `http(s)://[user[:password]@]host[:port][/path]`.
    ///
    /// User info is percent-decoded and split off into [`Credentials`]; it never
    /// reappears in the URLs handed to the transport.
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw.trim()).with_context(|| format!("invalid endpoint url '{raw}'"))?;

        let scheme = url.scheme().to_owned();
        if scheme != "http" && scheme != "https" {
            bail!("endpoint url must start with http:// or https://");
        }

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .context("endpoint url must contain a host")?
            .to_owned();
        let port = url
            .port_or_known_default()
            .context("endpoint url has no usable port")?;

        let credentials = if url.username().is_empty() && url.password().is_none() {
            None
        } else {
            Some(Credentials {
                user: decode_userinfo(url.username())
                    .context("endpoint user is not valid UTF-8")?,
                password: decode_userinfo(url.password().unwrap_or_default())
                    .context("endpoint password is not valid UTF-8")?,
            })
        };

        Ok(Self {
            scheme,
            host,
            port,
            base_path: url.path().trim_end_matches('/').to_owned(),
            credentials,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path component of the base URL without a trailing slash (empty for `/`).
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// `host:port` label used in log lines.
    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// URL of `path` below the base path. `path` must start with `/`; an
    /// empty `path` addresses the base path itself.
    pub fn url_for(&self, path: &str) -> Result<Url> {
        let mut full_path = format!("{}{}", self.base_path, path);
        if full_path.is_empty() {
            full_path.push('/');
        }
        let raw = format!(
            "{}://{}:{}{}",
            self.scheme,
            host_for_url(&self.host),
            self.port,
            full_path
        );
        Url::parse(&raw).with_context(|| format!("failed to build request url '{raw}'"))
    }
}

fn host_for_url(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_owned()
    }
}

/// `Url` keeps user info percent-encoded as written.
fn decode_userinfo(raw: &str) -> Result<String> {
    Ok(percent_decode_str(raw).decode_utf8()?.into_owned())
}
