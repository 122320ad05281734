use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

use crate::commands::{self, CommandReport};
use crate::sync::config::ExistingPolicy;
use crate::sync::giftcodes::GiftCodesOptions;

#[derive(Parser, Debug)]
#[command(
    name = "ssbuy-sync",
    version,
    about = "Sync the gift-code and game catalog sheets into the site's JSON data"
)]
struct Cli {
    /// Print the command report as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Command {
    /// Rebuild gift-codes-data.json from the gift-code sheet
    Giftcodes {
        /// Reconcile and report without writing the JSON file
        #[arg(long)]
        dry_run: bool,
    },
    /// Rebuild games.json from the catalog sheet, looking up links for new games
    Catalog {
        #[arg(long)]
        dry_run: bool,
        /// How rows for games already in games.json are applied
        #[arg(long, value_parser = parse_policy)]
        policy: Option<ExistingPolicy>,
    },
    /// Regenerate sitemap.xml from the static pages and games.json
    Sitemap {
        #[arg(long)]
        dry_run: bool,
    },
    /// Show resolved paths, masked config, and missing inputs
    Status,
}

fn parse_policy(raw: &str) -> std::result::Result<ExistingPolicy, String> {
    ExistingPolicy::parse(raw)
        .ok_or_else(|| format!("unknown policy `{raw}` (refresh-products|description-only)"))
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{}: {}",
        report.command,
        if report.ok { "ok" } else { "issues found" }
    );
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        println!("  issue: {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let report = match &cli.command {
        Command::Giftcodes { dry_run } => {
            commands::giftcodes::run(&GiftCodesOptions { dry_run: *dry_run })?
        }
        Command::Catalog { dry_run, policy } => {
            commands::catalog::run(&commands::catalog::CatalogCommandOptions {
                dry_run: *dry_run,
                policy: *policy,
            })?
        }
        Command::Sitemap { dry_run } => commands::sitemap::run(*dry_run)?,
        Command::Status => commands::status::run()?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        bail!("{} reported {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, parse_policy};
    use crate::sync::config::ExistingPolicy;
    use clap::Parser;

    #[test]
    fn catalog_policy_flag_parses() {
        let cli = Cli::parse_from([
            "ssbuy-sync",
            "catalog",
            "--dry-run",
            "--policy",
            "description-only",
        ]);
        match cli.command {
            Command::Catalog { dry_run, policy } => {
                assert!(dry_run);
                assert_eq!(policy, Some(ExistingPolicy::DescriptionOnly));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn json_flag_is_global() {
        let cli = Cli::parse_from(["ssbuy-sync", "status", "--json"]);
        assert!(cli.json);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(parse_policy("sometimes").is_err());
        assert!(Cli::try_parse_from(["ssbuy-sync", "catalog", "--policy", "x"]).is_err());
    }
}
