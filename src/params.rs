use crate::utils::query_variable;
use thiserror::Error;
use url::Url;

pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("missing required parameter `{0}`")]
    MissingField(&'static str),
    #[error("invalid page url `{url}`: {reason}")]
    InvalidPage { url: String, reason: String },
}

/// Identity and options addressing one container's log endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub cluster: String,
    pub namespace: String,
    pub pod: String,
    pub container: String,
    pub tail: Option<String>,
    pub follow: Option<String>,
}

impl SessionParams {
    /// Resolve parameters from a raw query string.
    ///
    /// Fields are read in a fixed order (cluster, namespace, pod, container,
    /// tail, follow). A missing namespace falls back to `default`; a missing
    /// cluster, pod or container rejects the whole set.
    pub fn resolve(query: &str) -> Result<Self, ParamError> {
        let cluster = query_variable(query, "cluster");
        let namespace = query_variable(query, "namespace").unwrap_or(DEFAULT_NAMESPACE);
        let pod = query_variable(query, "pod");
        let container = query_variable(query, "container");
        let tail = query_variable(query, "tail");
        let follow = query_variable(query, "follow");

        tracing::debug!(
            ?cluster,
            namespace,
            ?pod,
            ?container,
            ?tail,
            ?follow,
            "resolved page parameters"
        );

        let cluster = cluster.ok_or(ParamError::MissingField("cluster"))?;
        let pod = pod.ok_or(ParamError::MissingField("pod"))?;
        let container = container.ok_or(ParamError::MissingField("container"))?;

        Ok(Self {
            cluster: cluster.to_string(),
            namespace: namespace.to_string(),
            pod: pod.to_string(),
            container: container.to_string(),
            tail: tail.map(str::to_string),
            follow: follow.map(str::to_string),
        })
    }
}

/// The page the viewer was opened from: its authority and raw query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    host: String,
    query: String,
}

impl PageLocation {
    pub fn parse(page_url: &str) -> Result<Self, ParamError> {
        // Bare `host:port/path` would otherwise parse with `host` as the scheme.
        let with_scheme = if page_url.contains("://") {
            page_url.to_string()
        } else {
            format!("http://{}", page_url)
        };

        let invalid = |reason: String| ParamError::InvalidPage {
            url: page_url.to_string(),
            reason,
        };

        let url = Url::parse(&with_scheme).map_err(|e| invalid(e.to_string()))?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("no host".to_string()))?;

        // Mirrors `location.host`: the port only shows up when it is not the
        // scheme's default.
        let host = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(Self {
            host,
            query: url.query().unwrap_or_default().to_string(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}
