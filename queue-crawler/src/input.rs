//! Domain list loading. Grounded on the reference resolver's pattern of
//! wrapping `tokio::fs` calls and mapping their errors into a crate-local
//! error enum rather than propagating `io::Error` directly.

use std::path::{Path, PathBuf};

use dns_types::name::Name;
use dns_crawler::error::CrawlError;

/// Reads one hostname per line from `path`, trimming whitespace and
/// skipping blank lines (a deliberate divergence from the source, which
/// normalizes blank lines into the root domain and lets the crawler treat
/// them as a real crawl target).
pub async fn load_domain_list(path: &Path) -> Result<Vec<Name>, CrawlError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CrawlError::DomainListRead {
            path: PathBuf::from(path),
            source,
        })?;

    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(Name::normalize)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn skips_blank_lines_and_normalizes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "example.com\n\n  Example.NET.  \n").unwrap();

        let names = load_domain_list(file.path()).await.unwrap();
        assert_eq!(
            names,
            vec![Name::normalize("example.com."), Name::normalize("example.net.")]
        );
    }

    #[tokio::test]
    async fn missing_file_is_a_crawl_error() {
        let missing = std::path::Path::new("/nonexistent/queue-crawler-domains.txt");
        assert!(load_domain_list(missing).await.is_err());
    }
}
