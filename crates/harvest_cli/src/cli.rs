use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use harvest_engine::{ExportFormat, SortOrder};

pub const DEFAULT_WORKSPACE_URL: &str = "https://app.slack.com/client";
pub const DEFAULT_AUTH_FILE: &str = "slack_auth.json";

#[derive(Debug, Parser)]
#[command(name = "search-harvest")]
#[command(about = "Harvest workspace search results into a text or JSON export")]
#[command(version)]
pub struct Cli {
    /// Search query, typed into the workspace search box as-is.
    pub query: String,

    #[arg(long, default_value = DEFAULT_WORKSPACE_URL, value_parser = parse_workspace_url)]
    pub workspace: String,

    #[arg(short, long, value_enum, default_value_t = FormatArg::Text)]
    pub format: FormatArg,

    /// Defaults to a timestamped file in the current directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_AUTH_FILE)]
    pub auth_file: PathBuf,

    #[arg(short, long)]
    pub verbose: bool,

    /// RON file with timing overrides.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub sort: Option<SortArg>,

    /// Run the browser without a window. Interactive login is not possible then.
    #[arg(long)]
    pub headless: bool,

    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Text,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => ExportFormat::Text,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    Relevance,
    Newest,
    Oldest,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Relevance => SortOrder::Relevance,
            SortArg::Newest => SortOrder::Newest,
            SortArg::Oldest => SortOrder::Oldest,
        }
    }
}

fn parse_workspace_url(raw: &str) -> Result<String, String> {
    let url = url::Url::parse(raw).map_err(|err| format!("invalid workspace URL: {err}"))?;
    match url.scheme() {
        "http" | "https" => Ok(raw.to_string()),
        other => Err(format!("unsupported URL scheme: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_apply_when_only_the_query_is_given() {
        let cli = Cli::try_parse_from(["search-harvest", "from:@alice deploy"]).unwrap();
        assert_eq!(cli.query, "from:@alice deploy");
        assert_eq!(cli.workspace, DEFAULT_WORKSPACE_URL);
        assert_eq!(cli.format, FormatArg::Text);
        assert_eq!(cli.auth_file, PathBuf::from(DEFAULT_AUTH_FILE));
        assert_eq!(cli.output, None);
        assert_eq!(cli.sort, None);
        assert!(!cli.verbose);
        assert!(!cli.headless);
    }

    #[test]
    fn every_option_is_parsed() {
        let cli = Cli::try_parse_from([
            "search-harvest",
            "deploy",
            "--workspace",
            "https://acme.slack.com/client",
            "--format",
            "json",
            "--output",
            "out/export.json",
            "--auth-file",
            "state.json",
            "--verbose",
            "--sort",
            "oldest",
            "--headless",
            "--log-file",
            "run.log",
        ])
        .unwrap();

        assert_eq!(cli.workspace, "https://acme.slack.com/client");
        assert_eq!(ExportFormat::from(cli.format), ExportFormat::Json);
        assert_eq!(cli.output, Some(PathBuf::from("out/export.json")));
        assert_eq!(cli.auth_file, PathBuf::from("state.json"));
        assert_eq!(cli.sort.map(SortOrder::from), Some(SortOrder::Oldest));
        assert_eq!(cli.log_file, Some(PathBuf::from("run.log")));
        assert!(cli.verbose && cli.headless);
    }

    #[test]
    fn malformed_workspace_url_is_rejected() {
        assert!(Cli::try_parse_from(["search-harvest", "q", "--workspace", "not a url"]).is_err());
        assert!(
            Cli::try_parse_from(["search-harvest", "q", "--workspace", "ftp://acme/client"])
                .is_err()
        );
    }

    #[test]
    fn query_is_required() {
        assert!(Cli::try_parse_from(["search-harvest"]).is_err());
    }
}
