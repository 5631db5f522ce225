//! Stream endpoint URL construction.

use agent_stream_core::RunHandle;
use url::Url;

use crate::TransportError;

/// Transport variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Server-Sent Events: read-only.
    Sse,
    /// WebSocket: bidirectional, carries control frames and signals.
    WebSocket,
}

impl TransportKind {
    /// Last path segment of the run endpoint.
    #[must_use]
    pub const fn path_suffix(self) -> &'static str {
        match self {
            Self::Sse => "stream",
            Self::WebSocket => "ws",
        }
    }
}

/// Build the URL for one connection attempt.
///
/// Appends `runs/{workflow_id}/{run_id}/{stream|ws}` to `base`, switches
/// `http(s)` to `ws(s)` for WebSocket, and adds `since` (only when non-zero)
/// followed by `access_token`.
///
/// # Errors
/// Returns `InvalidEndpoint` if `base` cannot carry a path or scheme change.
pub fn endpoint_url(
    kind: TransportKind,
    base: &Url,
    run: &RunHandle,
    since: u64,
    token: &str,
) -> Result<Url, TransportError> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);

    url.path_segments_mut()
        .map_err(|()| TransportError::InvalidEndpoint(format!("{base} cannot be a base")))?
        .pop_if_empty()
        .extend([
            "runs",
            run.workflow_id.as_str(),
            run.run_id.as_str(),
            kind.path_suffix(),
        ]);

    if kind == TransportKind::WebSocket {
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(TransportError::InvalidEndpoint(format!(
                    "unsupported scheme {other}"
                )));
            }
        };
        url.set_scheme(scheme).map_err(|()| {
            TransportError::InvalidEndpoint(format!("cannot switch {base} to {scheme}"))
        })?;
    }

    {
        let mut query = url.query_pairs_mut();
        if since > 0 {
            query.append_pair("since", &since.to_string());
        }
        query.append_pair("access_token", token);
    }

    Ok(url)
}
