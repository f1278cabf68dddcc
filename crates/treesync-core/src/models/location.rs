//! Addressable locations in the remote tree

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

use crate::error::{CoreError, CoreResult};
use crate::value::split_path;

/// Suffix the REST and streaming endpoints expect on every resource path
const REST_SUFFIX: &str = ".json";

/// A path into the remote tree: scheme + host + slash-delimited segments.
///
/// Locations are immutable and compare by their normalized string form, so
/// `https://db.example.com/users/` and `https://db.example.com/users.json`
/// are the same location.
#[derive(Debug, Clone)]
pub struct Location {
    /// `scheme://host[:port]`
    origin: String,
    /// Normalized path, always starting with `/`, never ending with one
    /// (except for the root)
    path: String,
    /// Query string carried through to requests (e.g. a namespace selector)
    query: Option<String>,
}

impl Location {
    /// Parse a location from a URL string
    pub fn parse(input: &str) -> CoreResult<Self> {
        let url = Url::parse(input).map_err(|e| CoreError::InvalidLocation(format!("{input}: {e}")))?;
        Self::from_url(&url)
    }

    /// Build a location from an already parsed URL
    pub fn from_url(url: &Url) -> CoreResult<Self> {
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(CoreError::InvalidLocation(format!(
                    "unsupported scheme '{other}' in {url}"
                )))
            }
        }
        let host = url
            .host_str()
            .ok_or_else(|| CoreError::InvalidLocation(format!("missing host in {url}")))?;

        let origin = match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        };

        let raw = url.path();
        let raw = raw.strip_suffix(REST_SUFFIX).unwrap_or(raw);

        Ok(Self {
            origin,
            path: normalize_path(raw),
            query: url.query().filter(|q| !q.is_empty()).map(str::to_string),
        })
    }

    /// Normalized path, e.g. `/users/alice` or `/`
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `scheme://host[:port]`
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Path segments below the root
    pub fn segments(&self) -> Vec<&str> {
        split_path(&self.path)
    }

    /// Last path segment, `None` at the root
    pub fn key(&self) -> Option<&str> {
        self.segments().last().copied()
    }

    /// Whether this is the root of the tree
    pub fn is_root(&self) -> bool {
        self.path == "/"
    }

    /// Location of a descendant, `path` being relative and slash-delimited
    pub fn child(&self, path: &str) -> Self {
        let joined = format!("{}/{}", self.path, path);
        Self {
            origin: self.origin.clone(),
            path: normalize_path(&joined),
            query: self.query.clone(),
        }
    }

    /// Location of the parent node, `None` at the root
    pub fn parent(&self) -> Option<Self> {
        let mut segments = self.segments();
        segments.pop()?;
        Some(Self {
            origin: self.origin.clone(),
            path: normalize_path(&segments.join("/")),
            query: self.query.clone(),
        })
    }

    /// URL of the REST/streaming resource for this location
    pub fn rest_url(&self) -> CoreResult<Url> {
        let resource = if self.is_root() {
            format!("{}/{}", self.origin, REST_SUFFIX)
        } else {
            format!("{}{}{}", self.origin, self.path, REST_SUFFIX)
        };
        let mut url = Url::parse(&resource)
            .map_err(|e| CoreError::InvalidLocation(format!("{resource}: {e}")))?;
        url.set_query(self.query.as_deref());
        Ok(url)
    }
}

fn normalize_path(raw: &str) -> String {
    let segments = split_path(raw);
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.origin, self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.origin == other.origin && self.path == other.path && self.query == other.query
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.origin.hash(state);
        self.path.hash(state);
        self.query.hash(state);
    }
}

impl FromStr for Location {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Location {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
