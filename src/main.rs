//! moveit CLI - Interact with a MOVEit Transfer server.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use glob::glob;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use moveit_client::models::summarize;
use moveit_client::{ClientConfig, CredentialPayload, DownloadFormat, MoveitClient, Record};

/// CLI tool for interacting with a MOVEit Transfer server.
#[derive(Parser)]
#[command(name = "moveit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Server host (`example.com` targets https://moveit.example.com) or full base URL.
    #[arg(long, env = "MOVEIT_HOST")]
    host: String,

    /// Username for the password grant.
    #[arg(long, env = "MOVEIT_USERNAME")]
    username: Option<String>,

    /// Password for the password grant.
    #[arg(long, env = "MOVEIT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Pre-encoded token request body, sent verbatim (overrides username/password).
    #[arg(long, env = "MOVEIT_CREDENTIALS", hide_env_values = true)]
    credentials: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "MOVEIT_TIMEOUT_SECS")]
    timeout: Option<u64>,

    /// Increase log verbosity (-v, -vv, -vvv). RUST_LOG overrides it.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the access-token bundle as JSON.
    Token,

    /// List all files.
    Files {
        /// Print records as JSON lines.
        #[arg(long)]
        json: bool,
    },

    /// List all folders.
    Folders {
        /// Print records as JSON lines.
        #[arg(long)]
        json: bool,
    },

    /// Download a file and write it out as CSV.
    Download {
        /// File ID to download.
        file: String,

        /// Format of the remote file: csv, tsv (txt) or excel (xlsx).
        #[arg(long, short = 'f', default_value = "csv")]
        format: String,

        /// Sheet to read from an Excel workbook (defaults to the first sheet).
        #[arg(long)]
        sheet: Option<String>,

        /// Write every sheet of an Excel workbook to `<output>/<sheet>.csv`.
        #[arg(long, requires = "output", conflicts_with = "sheet")]
        all_sheets: bool,

        /// Output path (defaults to stdout). A directory when --all-sheets is set.
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Upload files to a folder.
    Upload {
        /// File patterns to upload (supports glob patterns like *.csv, file_{1,2,3}.txt).
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Destination folder ID.
        #[arg(long, short = 't')]
        to: String,

        /// MIME type of the uploaded files (guessed from the extension by default).
        #[arg(long)]
        file_type: Option<String>,

        /// Use chunked transfer encoding regardless of file size.
        #[arg(long)]
        chunked: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_directives(cli.verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "moveit starting");

    let mut config = ClientConfig::new(&cli.host)
        .with_context(|| format!("Invalid host: {}", cli.host))?;
    if let Some(secs) = cli.timeout {
        config = config.request_timeout(Duration::from_secs(secs));
    }

    let client = MoveitClient::with_config(config).context("Failed to build HTTP client")?;

    let payload = match (&cli.credentials, &cli.username, &cli.password) {
        (Some(raw), _, _) => CredentialPayload::raw(raw.clone()),
        (None, Some(username), Some(password)) => CredentialPayload::password(username, password),
        _ => bail!("Provide --credentials, or both --username and --password"),
    };

    let token = client
        .authenticate(&payload)
        .await
        .with_context(|| format!("Failed to authenticate against {}", client.config().base_url()))?;

    match cli.command {
        Commands::Token => {
            println!("{}", serde_json::to_string_pretty(&token)?);
        }

        Commands::Files { json } => {
            let files = client.list_files(&token).await.context("Failed to list files")?;
            print_records(&files, json, "No files found.")?;
        }

        Commands::Folders { json } => {
            let folders = client
                .list_folders(&token)
                .await
                .context("Failed to list folders")?;
            print_records(&folders, json, "No folders found.")?;
        }

        Commands::Download {
            file,
            format,
            sheet,
            all_sheets,
            output,
        } => {
            if all_sheets {
                if !matches!(format.parse::<DownloadFormat>()?, DownloadFormat::Excel { .. }) {
                    bail!("--all-sheets only applies to the excel format");
                }
                // clap enforces `requires = "output"`
                let dir = output.unwrap_or_default();
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create {:?}", dir))?;

                let sheets = client
                    .download_workbook(&token, &file)
                    .await
                    .with_context(|| format!("Failed to download workbook: {}", file))?;

                for (name, table) in &sheets {
                    let path = sheet_output_path(&dir, name);
                    let out = std::fs::File::create(&path)
                        .with_context(|| format!("Failed to create {:?}", path))?;
                    table.write_csv(out)?;
                    eprintln!("Sheet {}: {} rows to {:?}", name, table.row_count(), path);
                }
                return Ok(());
            }

            let format = match (format.parse::<DownloadFormat>()?, sheet) {
                (DownloadFormat::Excel { .. }, sheet) => DownloadFormat::Excel { sheet },
                (_, Some(_)) => bail!("--sheet only applies to the excel format"),
                (format, None) => format,
            };

            let table = client
                .download_file(&token, &file, &format)
                .await
                .with_context(|| format!("Failed to download file: {}", file))?;

            match output {
                Some(path) => {
                    let out = std::fs::File::create(&path)
                        .with_context(|| format!("Failed to create {:?}", path))?;
                    table.write_csv(out)?;
                    eprintln!("Saved {} rows to {:?}", table.row_count(), path);
                }
                None => table.write_csv(io::stdout().lock())?,
            }
        }

        Commands::Upload {
            patterns,
            to,
            file_type,
            chunked,
        } => {
            let uploads = collect_upload_paths(&patterns)?;
            if uploads.is_empty() {
                bail!("Nothing to upload: no pattern matched a file");
            }

            let total = uploads.len();
            println!("{} file(s) -> folder {}", total, to);

            let mut failures = 0;
            for (n, path) in uploads.iter().enumerate() {
                let mime = match &file_type {
                    Some(explicit) => explicit.clone(),
                    None => mime_guess::from_path(path).first_or_octet_stream().to_string(),
                };
                print!("[{}/{}] {} ({}) ... ", n + 1, total, path.display(), mime);

                match client.upload_file(&token, &to, path, &mime, chunked).await {
                    Ok(outcome) => println!("{} {}", outcome.status, outcome.mode),
                    Err(e) => {
                        failures += 1;
                        println!("rejected");
                        eprintln!("  {}", e);
                    }
                }
            }

            if failures > 0 {
                bail!("{} of {} upload(s) failed", failures, total);
            }
            println!("Done.");
        }
    }

    Ok(())
}

fn print_records(records: &[Record], json: bool, empty_message: &str) -> Result<()> {
    if json {
        for record in records {
            println!("{}", serde_json::to_string(record)?);
        }
    } else if records.is_empty() {
        println!("{}", empty_message);
    } else {
        println!("{:<12} {:>10} {}", "ID", "SIZE", "NAME");
        println!("{}", "-".repeat(60));
        for record in records {
            let line = summarize(record);
            let mut fields = line.splitn(3, '\t');
            println!(
                "{:<12} {:>10} {}",
                fields.next().unwrap_or("-"),
                fields.next().unwrap_or("-"),
                fields.next().unwrap_or("-")
            );
        }
    }
    Ok(())
}

/// Default `EnvFilter` directives for a `-v` count.
fn default_log_directives(verbose: u8) -> String {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    format!("moveit={},moveit_client={}", level, level)
}

/// File name for one sheet of a workbook written with `--all-sheets`.
fn sheet_output_path(dir: &Path, sheet: &str) -> PathBuf {
    let stem: String = sheet
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '-' | '_' | ' ') { c } else { '_' })
        .collect();
    dir.join(format!("{}.csv", stem.trim()))
}

/// Resolve upload arguments into a sorted set of regular files.
///
/// Each argument is alternation-expanded, then globbed. An expansion that globs to
/// nothing is still accepted when it names an existing file.
fn collect_upload_paths(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = BTreeSet::new();

    for pattern in patterns.iter().flat_map(|p| expand_alternations(p)) {
        let matched: Vec<PathBuf> = glob(&pattern)
            .with_context(|| format!("Bad upload pattern '{}'", pattern))?
            .flatten()
            .filter(|path| path.is_file())
            .collect();

        if !matched.is_empty() {
            paths.extend(matched);
        } else if Path::new(&pattern).is_file() {
            paths.insert(PathBuf::from(&pattern));
        } else {
            warn!(%pattern, "upload pattern matched no files");
        }
    }

    Ok(paths.into_iter().collect())
}

/// Expand `{a,b}` alternations, left to right, into one pattern per combination.
fn expand_alternations(pattern: &str) -> Vec<String> {
    let mut pending = vec![pattern.to_string()];
    let mut expanded = Vec::new();

    while let Some(candidate) = pending.pop() {
        let group = candidate
            .find('{')
            .and_then(|open| candidate[open..].find('}').map(|len| (open, open + len)));

        match group {
            Some((open, close)) => {
                let (head, tail) = (&candidate[..open], &candidate[close + 1..]);
                // Pushed in reverse so the first alternative is expanded first.
                for choice in candidate[open + 1..close].split(',').rev() {
                    pending.push(format!("{}{}{}", head, choice.trim(), tail));
                }
            }
            None => expanded.push(candidate),
        }
    }

    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_alternations() {
        assert_eq!(
            expand_alternations("report_{1,2,3}.csv"),
            vec!["report_1.csv", "report_2.csv", "report_3.csv"]
        );
        assert_eq!(expand_alternations("report.csv"), vec!["report.csv"]);
        assert_eq!(expand_alternations("*.xlsx"), vec!["*.xlsx"]);
    }

    #[test]
    fn test_expand_alternations_keeps_order_across_groups() {
        assert_eq!(
            expand_alternations("{daily,weekly}_{a,b}.csv"),
            vec!["daily_a.csv", "daily_b.csv", "weekly_a.csv", "weekly_b.csv"]
        );
    }

    #[test]
    fn test_unclosed_alternation_is_literal() {
        assert_eq!(expand_alternations("report_{1,2.csv"), vec!["report_{1,2.csv"]);
    }

    #[test]
    fn test_collect_upload_paths() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.csv", "b.csv", "c.txt", "[1].csv"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let root = dir.path().display().to_string();
        let patterns = vec![
            format!("{}/*.csv", root),
            format!("{}/{{a,c}}.*", root),
            format!("{}/[1].csv", root),
            format!("{}/missing.csv", root),
        ];

        let paths = collect_upload_paths(&patterns).unwrap();
        let names: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["[1].csv", "a.csv", "b.csv", "c.txt"]);
    }

    #[test]
    fn test_bad_upload_pattern_is_an_error() {
        assert!(collect_upload_paths(&["reports/***/x.csv".to_string()]).is_err());
    }

    #[test]
    fn test_default_log_directives() {
        assert_eq!(default_log_directives(0), "moveit=warn,moveit_client=warn");
        assert_eq!(default_log_directives(1), "moveit=info,moveit_client=info");
        assert_eq!(default_log_directives(2), "moveit=debug,moveit_client=debug");
        assert_eq!(default_log_directives(7), "moveit=trace,moveit_client=trace");
        assert!(EnvFilter::try_new(default_log_directives(2)).is_ok());
    }

    #[test]
    fn test_sheet_output_path() {
        let dir = Path::new("out");
        assert_eq!(sheet_output_path(dir, "Summary"), dir.join("Summary.csv"));
        assert_eq!(sheet_output_path(dir, "Q1/Q2 totals"), dir.join("Q1_Q2 totals.csv"));
    }

    #[test]
    fn test_cli_all_sheets_requires_output() {
        let parsed = Cli::try_parse_from([
            "moveit", "--host", "example.com", "download", "77", "-f", "xlsx", "--all-sheets",
        ]);
        assert!(parsed.is_err());

        let cli = Cli::try_parse_from([
            "moveit", "--host", "example.com", "download", "77", "-f", "xlsx", "--all-sheets", "-o",
            "sheets",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Download { all_sheets: true, .. }));
    }

    #[test]
    fn test_cli_parses_upload() {
        let cli = Cli::try_parse_from([
            "moveit", "--host", "example.com", "upload", "a.csv", "--to", "123", "--chunked",
        ])
        .unwrap();

        match cli.command {
            Commands::Upload { patterns, to, chunked, file_type } => {
                assert_eq!(patterns, vec!["a.csv"]);
                assert_eq!(to, "123");
                assert!(chunked);
                assert!(file_type.is_none());
            }
            _ => panic!("expected upload command"),
        }
    }
}
