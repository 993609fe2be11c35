use clap::Args;

/// Identifies one incoming stream in the management API resource tree.
#[derive(Args, Clone, Debug, PartialEq, Eq)]
#[group(skip)]
pub(crate) struct Locator {
    /// Wowza server name
    #[arg(
        long = "serverName",
        default_value = "_defaultServer_",
        value_parser = parse_segment
    )]
    pub(crate) server_name: String,

    /// Wowza vhost name
    #[arg(
        long = "vhostName",
        default_value = "_defaultVHost_",
        value_parser = parse_segment
    )]
    pub(crate) vhost_name: String,

    /// Wowza instance name
    #[arg(
        long = "instanceName",
        default_value = "_definst_",
        value_parser = parse_segment
    )]
    pub(crate) instance_name: String,

    /// Wowza application name
    #[arg(
        short = 'a',
        long = "app",
        default_value = "live",
        value_parser = parse_segment
    )]
    pub(crate) app_name: String,

    /// Wowza stream name
    #[arg(
        short = 's',
        long = "stream",
        default_value = "live.stream",
        value_parser = parse_segment
    )]
    pub(crate) stream_name: String,
}

/// One locator field maps to exactly one path segment, so dot segments, which
/// URL normalization would drop or resolve, are refused.
fn parse_segment(value: &str) -> Result<String, String> {
    match value {
        "" => Err("value must not be empty".to_string()),
        "." | ".." => Err(format!("`{value}` is not a resource name")),
        _ => Ok(value.to_string()),
    }
}

impl Locator {
    /// Path segments of the incoming stream resource, in API order.
    pub(crate) fn path_segments(&self) -> [&str; 11] {
        [
            "v2",
            "servers",
            &self.server_name,
            "vhosts",
            &self.vhost_name,
            "applications",
            &self.app_name,
            "instances",
            &self.instance_name,
            "incomingstreams",
            &self.stream_name,
        ]
    }
}
