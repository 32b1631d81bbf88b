use std::fmt;

/// Named steps of the poll cycle and the snapshot refresh. Used to tag
/// failures so the log says where in the chain something broke.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    FetchFeed,
    ParseFeed,
    Notify,
    FetchProject,
    ScrapeProject,
    FetchRepository,
    ScrapeRepository,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::FetchFeed => "fetch_feed",
            Stage::ParseFeed => "parse_feed",
            Stage::Notify => "notify",
            Stage::FetchProject => "fetch_project",
            Stage::ScrapeProject => "scrape_project",
            Stage::FetchRepository => "fetch_repository",
            Stage::ScrapeRepository => "scrape_repository",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
pub enum MonitorError {
    /// Network failure or timeout while retrieving a document.
    Fetch {
        url: String,
        reason: String,
        timeout: bool,
    },
    /// Malformed feed or HTML, or a page missing an expected element.
    Parse { what: String, reason: String },
    /// One or more repositories failed during a refresh; the others may have
    /// produced records.
    PartialAggregation { failed: Vec<RepoFailure> },
    /// The chat transport refused an outbound message.
    Send(String),
}

impl MonitorError {
    pub fn fetch(url: impl Into<String>, err: reqwest::Error) -> Self {
        MonitorError::Fetch {
            url: url.into(),
            timeout: err.is_timeout(),
            reason: err.to_string(),
        }
    }

    pub fn parse(what: impl Into<String>, reason: impl Into<String>) -> Self {
        MonitorError::Parse { what: what.into(), reason: reason.into() }
    }

    #[cfg(test)]
    pub fn is_fetch(&self) -> bool {
        matches!(self, MonitorError::Fetch { .. })
    }

    #[cfg(test)]
    pub fn is_parse(&self) -> bool {
        matches!(self, MonitorError::Parse { .. })
    }
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::Fetch { url, reason, timeout: true } => {
                write!(f, "fetch of {url} timed out: {reason}")
            }
            MonitorError::Fetch { url, reason, timeout: false } => {
                write!(f, "fetch of {url} failed: {reason}")
            }
            MonitorError::Parse { what, reason } => write!(f, "cannot parse {what}: {reason}"),
            MonitorError::PartialAggregation { failed } => {
                let names: Vec<&str> = failed.iter().map(|f| f.repository.as_str()).collect();
                write!(f, "{} repositor{} failed: {}", failed.len(), if failed.len() == 1 { "y" } else { "ies" }, names.join(", "))
            }
            MonitorError::Send(reason) => write!(f, "send failed: {reason}"),
        }
    }
}

impl std::error::Error for MonitorError {}

/// One repository that could not be fetched or scraped during a refresh.
#[derive(Debug)]
pub struct RepoFailure {
    pub repository: String,
    pub stage: Stage,
    pub error: MonitorError,
}

/// A stage error as handed to the error-observation sink: which stage, what
/// input it was working on, and the error itself.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub input: String,
    pub error: MonitorError,
}

impl StageFailure {
    pub fn new(stage: Stage, input: impl Into<String>, error: MonitorError) -> Self {
        Self { stage, input: input.into(), error }
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.stage, self.error, self.input)
    }
}
