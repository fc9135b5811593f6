use crate::params::SessionParams;

/// Build the log stream endpoint for `params` served from `host`.
///
/// The path always ends in `?`, even with no options, and every value is
/// inserted verbatim. Backends rely on this exact shape.
pub fn logs_url(host: &str, params: &SessionParams) -> String {
    let mut url = format!(
        "ws://{}/ws/{}/{}/{}/{}/logs?",
        host, params.cluster, params.namespace, params.pod, params.container
    );
    if let Some(tail) = &params.tail {
        url.push_str("&tail=");
        url.push_str(tail);
    }
    if let Some(follow) = &params.follow {
        url.push_str("&follow=");
        url.push_str(follow);
    }
    url
}
