mod cli;
mod input;
mod logging;

use std::time::Duration;

use clap::Parser;
use tracing::error;

use dns_crawler::manager::{nsr_block_of, CrawlerConfig, Manager};

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();
    logging::begin_logging();

    let config = CrawlerConfig {
        crawl_group_size: if args.crawl_group_size < 0 {
            None
        } else {
            Some(args.crawl_group_size as usize)
        },
        max_active_resolutions: args.max_active_resolutions,
        query_timeout: Duration::from_secs(args.query_timeout_secs),
        query_retries: args.query_retries,
        rate_limit_per_second: args.rate_limit_per_second,
        resolve_target_a: args.resolve_target_a,
    };

    let hostnames = match input::load_domain_list(&args.domain_list).await {
        Ok(hostnames) => hostnames,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    if hostnames.is_empty() {
        error!("domain list '{}' had no usable hostnames", args.domain_list.display());
        std::process::exit(1);
    }

    let manager = Manager::new(config);
    let outcome = manager.crawl(hostnames).await;

    for report in &outcome.reports {
        let ns_count = nsr_block_of(report).map_or(0, dns_types::nsr::NsrBlock::len);
        println!(
            "{}: code={:?} nameservers={}",
            report.hostname, report.auth_ns.code, ns_count
        );
    }
}
