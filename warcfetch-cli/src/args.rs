//! Command-line arguments.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// Default WASAPI access point.
pub const DEFAULT_BASE_URI: &str = "https://partner.archive-it.org/wasapi/v1/webdata";

/// Download WARC files from a WASAPI access point.
///
/// Acceptable date/time formats include `2017-01-01`,
/// `2017-01-01T12:34:56Z`, `2017-01` and `2017`.
#[derive(Debug, Parser)]
#[command(name = "warcfetch", version, about, long_about = None)]
pub struct Cli {
    /// Base URI for WASAPI access.
    #[arg(short = 'b', long, value_name = "URI")]
    pub base_uri: Option<String>,

    /// Directory for downloaded files.
    #[arg(short = 'd', long, value_name = "DIR")]
    pub destination: Option<PathBuf>,

    /// Username for API authentication; the password is prompted.
    #[arg(short = 'u', long)]
    pub user: Option<String>,

    /// Print the number of matching files and exit.
    #[arg(short = 'c', long, conflicts_with = "size")]
    pub count: bool,

    /// Print the number and total size of matching files and exit.
    #[arg(short = 's', long)]
    pub size: bool,

    /// Number of simultaneous downloads.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Attempts per file before it is reported failed.
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Completion manifest path (default: <destination>/manifest.jsonl).
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Requested inventory page size.
    #[arg(long, value_name = "N")]
    pub page_size: Option<u32>,

    /// Write log output to this file instead of stderr.
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Log verbosely; -v is info, -vv is debug.
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Collection identifier; repeatable.
    #[arg(long, value_name = "ID")]
    pub collection: Vec<String>,

    /// Exact webdata filename to download.
    #[arg(long, value_name = "NAME")]
    pub filename: Option<String>,

    /// Crawl job identifier.
    #[arg(long, value_name = "ID")]
    pub crawl: Option<String>,

    /// Files captured after this date.
    #[arg(long, value_name = "DATE")]
    pub crawl_time_after: Option<String>,

    /// Files captured before this date.
    #[arg(long, value_name = "DATE")]
    pub crawl_time_before: Option<String>,

    /// Files from crawl jobs started after this date.
    #[arg(long, value_name = "DATE")]
    pub crawl_start_after: Option<String>,

    /// Files from crawl jobs started before this date.
    #[arg(long, value_name = "DATE")]
    pub crawl_start_before: Option<String>,
}

impl Cli {
    /// Build the query filter from the query-parameter flags.
    pub fn to_filter(&self) -> warcfetch::QueryFilter {
        let mut filter = warcfetch::QueryFilter::new();
        for collection in &self.collection {
            filter = filter.with_collection(collection.clone());
        }
        if let Some(v) = &self.crawl {
            filter = filter.with_crawl(v.clone());
        }
        if let Some(v) = &self.filename {
            filter = filter.with_filename(v.clone());
        }
        if let Some(v) = &self.crawl_time_after {
            filter = filter.with_crawl_time_after(v.clone());
        }
        if let Some(v) = &self.crawl_time_before {
            filter = filter.with_crawl_time_before(v.clone());
        }
        if let Some(v) = &self.crawl_start_after {
            filter = filter.with_crawl_start_after(v.clone());
        }
        if let Some(v) = &self.crawl_start_before {
            filter = filter.with_crawl_start_before(v.clone());
        }
        if let Some(v) = self.page_size {
            filter = filter.with_page_size(v);
        }
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_flags_become_filter() {
        let cli = Cli::parse_from([
            "warcfetch",
            "--collection",
            "5425",
            "--collection",
            "7100",
            "--crawl",
            "99",
            "--page-size",
            "250",
        ]);

        let pairs = cli.to_filter().to_query();
        assert!(pairs.contains(&("collection".to_string(), "5425".to_string())));
        assert!(pairs.contains(&("collection".to_string(), "7100".to_string())));
        assert!(pairs.contains(&("crawl".to_string(), "99".to_string())));
        assert!(pairs.contains(&("page_size".to_string(), "250".to_string())));
    }

    #[test]
    fn test_count_and_size_conflict() {
        let parsed = Cli::try_parse_from(["warcfetch", "--count", "--size"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_verbosity_counts() {
        let cli = Cli::parse_from(["warcfetch", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }
}
