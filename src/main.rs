mod api_client;
mod archive;
mod auth;
mod config;
mod data;
mod error;
mod logging;
mod poller;
mod report;
mod runner;
mod warehouse;

use auth::{CachedTokenProvider, OAuthClient, TokenStore};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use config::{AccountConfig, Config};
use error::Error;
use log::{error, info};
use report::ReportType;

#[derive(Parser)]
struct Args {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generates the reports for a date range and loads them into the warehouse
    Fetch {
        #[arg(help = "Date should be in the form YYYY-MM-DD", value_parser = validate_date)]
        start: NaiveDate,

        #[arg(help = "Date should be in the form YYYY-MM-DD", value_parser = validate_date)]
        end: NaiveDate,

        /// Report types to run, all of them when omitted
        #[arg(long = "report", value_enum)]
        reports: Vec<ReportType>,

        #[command(flatten)]
        account: AccountConfig,
    },

    /// Prints the consent page URL used to obtain an authorization code
    AuthUrl,

    /// Exchanges an authorization code for tokens and stores them in the tokens file
    Redeem { code: String },
}

fn validate_date(s: &str) -> Result<NaiveDate, String> {
    let error_message = "Invalid date, expected YYYY-MM-DD";

    let parts = s
        .split("-")
        .map(|part| part.parse::<u16>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| error_message)?;

    match parts.as_slice() {
        &[year, month, day] if month <= 12 && day <= 31 => {
            Ok(
                NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
                    .ok_or(error_message)?,
            )
        }
        _ => Err(error_message.to_string()),
    }
}

async fn run(args: Args) -> Result<(), Error> {
    let config = args.config;

    match args.command {
        Command::Fetch {
            start,
            end,
            reports,
            account,
        } => {
            let reports = if reports.is_empty() {
                ReportType::ALL.to_vec()
            } else {
                reports
            };
            runner::load_reports(config, account, &reports, &start, &end).await
        }
        Command::AuthUrl => {
            println!("{}", auth::authorization_url(&config, &auth::generate_state())?);
            Ok(())
        }
        Command::Redeem { code } => {
            let provider = CachedTokenProvider::new(
                OAuthClient::new(&config),
                TokenStore::new(&config.tokens_file),
                None,
            );
            provider.redeem_code(&code).await?;
            info!("tokens saved to {}", config.tokens_file);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    logging::init(args.config.log_file.as_deref())?;

    info!("Starting automation.");
    if let Err(err) = run(args).await {
        error!("run failed: {}", err);
        std::process::exit(1);
    }
    info!("Finished successfully.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_date() {
        assert_eq!(
            validate_date("2024-02-29"),
            Ok(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert!(validate_date("2023-02-29").is_err());
        assert!(validate_date("2024-13-01").is_err());
        assert!(validate_date("2024/01/01").is_err());
        assert!(validate_date("yesterday").is_err());
    }

    #[test]
    fn test_fetch_defaults_and_report_filter() {
        let args = Args::try_parse_from([
            "msads-report-loader",
            "--client-id",
            "c",
            "fetch",
            "2024-01-01",
            "2024-01-31",
            "--developer-token",
            "d",
            "--customer-id",
            "1",
            "--account-id",
            "2",
            "--report",
            "ad-group",
            "--report",
            "conversion",
        ])
        .unwrap();

        assert_eq!(args.config.poll_interval_secs, 5);
        match args.command {
            Command::Fetch {
                reports, account, ..
            } => {
                assert_eq!(reports, vec![ReportType::AdGroup, ReportType::Conversion]);
                assert_eq!(account.account_id, 2);
                assert_eq!(account.developer_token, "d");
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn test_auth_commands_need_no_account() {
        let args =
            Args::try_parse_from(["msads-report-loader", "--client-id", "c", "auth-url"]).unwrap();
        assert!(matches!(args.command, Command::AuthUrl));

        let args = Args::try_parse_from([
            "msads-report-loader",
            "--client-id",
            "c",
            "redeem",
            "the-code",
        ])
        .unwrap();
        assert!(matches!(args.command, Command::Redeem { code } if code == "the-code"));
    }
}
