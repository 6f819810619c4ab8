/// Log tags identify the subsystem a message comes from.
///
/// Each tag maps to a `--debug-<key>` command-line flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Hub,
    Connection,
    Producer,
    Collector,
    Webserver,
    /// Records forwarded from third-party crates through the `log` facade
    External,
}

impl LogTag {
    /// Key used by `--debug-<key>` flags
    pub fn to_debug_key(&self) -> &'static str {
        match self {
            LogTag::System => "system",
            LogTag::Config => "config",
            LogTag::Hub => "hub",
            LogTag::Connection => "connection",
            LogTag::Producer => "producer",
            LogTag::Collector => "collector",
            LogTag::Webserver => "webserver",
            LogTag::External => "external",
        }
    }

    /// Uncolored label for log lines
    pub fn to_plain_string(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Hub => "HUB",
            LogTag::Connection => "CONN",
            LogTag::Producer => "PRODUCER",
            LogTag::Collector => "COLLECTOR",
            LogTag::Webserver => "WEBSERVER",
            LogTag::External => "EXTERNAL",
        }
    }
}
