//! testscope - change-based test selection CLI
//!
//! ## Commands
//!
//! - `select`: compile the impacted tests into a title filter
//! - `changed`: list the canonical changed files
//! - `fetch`: download and extract the relationship artifact
//! - `publish`: upload a recorded relationship directory

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, Level};

use testscope_core::obs::InvocationSpan;
use testscope_core::{
    changed_files, select_tests, CanonicalPath, ConnectorOptions, EndpointOptions, ImpactConfig,
    NoImpactPolicy, ObjectStoreOptions, RelationshipKind, Selection, UploadStatus,
};
use testscope_transport::UploadMethod;

#[derive(Parser)]
#[command(name = "testscope")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Select the tests impacted by a change", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: ./testscope.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the title filter for the tests impacted by the working tree diff
    Select {
        /// Git ref to diff against (default: config base_ref)
        #[arg(long)]
        base: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        output: OutputFormat,

        #[command(flatten)]
        connector: ConnectorArgs,
    },

    /// Print the changed files that take part in impact analysis
    Changed {
        /// Git ref to diff against (default: config base_ref)
        #[arg(long)]
        base: Option<String>,
    },

    /// Download the relationship artifact and print where it was extracted
    Fetch {
        /// Artifact kind (default: config kind)
        #[arg(long)]
        kind: Option<RelationshipKind>,

        #[command(flatten)]
        connector: ConnectorArgs,
    },

    /// Upload a recorded relationship directory
    Publish {
        /// Directory holding relationship files
        dir: PathBuf,

        /// Artifact kind (default: config kind)
        #[arg(long)]
        kind: Option<RelationshipKind>,

        #[command(flatten)]
        connector: ConnectorArgs,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum MethodArg {
    Put,
    Post,
}

impl From<MethodArg> for UploadMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::Put => UploadMethod::Put,
            MethodArg::Post => UploadMethod::Post,
        }
    }
}

/// Where the relationship artifact lives.
#[derive(Args, Debug, Clone)]
struct ConnectorArgs {
    /// HTTP endpoint base URL
    #[arg(long, env = "TESTSCOPE_ENDPOINT", conflicts_with = "bucket")]
    endpoint: Option<String>,

    /// Request header for the HTTP endpoint, as 'Name: value' (repeatable).
    /// Downloads from an endpoint need at least one.
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    headers: Vec<String>,

    /// Upload method for the HTTP endpoint
    #[arg(long, value_enum, default_value = "put")]
    method: MethodArg,

    /// Object storage bucket
    #[arg(long, env = "TESTSCOPE_BUCKET")]
    bucket: Option<String>,

    /// Object storage region (default: AWS_REGION or us-east-1)
    #[arg(long)]
    region: Option<String>,

    /// S3-compatible endpoint URL (default: AWS_ENDPOINT_URL_S3 or AWS)
    #[arg(long = "s3-endpoint")]
    s3_endpoint: Option<String>,

    /// Key prefix inside the bucket
    #[arg(long, env = "TESTSCOPE_PREFIX")]
    prefix: Option<String>,
}

impl ConnectorArgs {
    fn to_options(&self) -> Result<ConnectorOptions> {
        if let Some(url) = &self.endpoint {
            let mut options = EndpointOptions::new(url).with_upload_method(self.method.into());
            for header in &self.headers {
                let (name, value) = parse_header(header)?;
                options = options.with_header(name, value);
            }
            return Ok(options.into());
        }

        if let Some(bucket) = &self.bucket {
            let mut options = ObjectStoreOptions::from_env(bucket);
            if let Some(region) = &self.region {
                options = options.with_region(region);
            }
            if let Some(endpoint) = &self.s3_endpoint {
                options = options.with_endpoint(endpoint);
            }
            if let Some(prefix) = &self.prefix {
                options = options.with_prefix(prefix);
            }
            return Ok(options.into());
        }

        bail!("No artifact location: pass --endpoint or --bucket")
    }
}

fn parse_header(raw: &str) -> Result<(&str, &str)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("Invalid header {raw:?}, expected 'Name: value'"))?;
    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid header {raw:?}, empty name");
    }
    Ok((name, value.trim()))
}

#[derive(Debug, Serialize)]
struct SelectionReport {
    pattern: Option<String>,
    impacted_test_files: Vec<CanonicalPath>,
    impacted_test_names: Vec<String>,
    policy: Option<NoImpactPolicy>,
}

impl From<&Selection> for SelectionReport {
    fn from(selection: &Selection) -> Self {
        match selection {
            Selection::Tests { pattern, impact } => SelectionReport {
                pattern: Some(pattern.as_str().to_string()),
                impacted_test_files: impact.impacted_test_files.iter().cloned().collect(),
                impacted_test_names: impact.impacted_test_names.iter().cloned().collect(),
                policy: None,
            },
            Selection::NoImpact { policy } => SelectionReport {
                pattern: None,
                impacted_test_files: Vec::new(),
                impacted_test_names: Vec::new(),
                policy: Some(*policy),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    testscope_core::init_tracing(cli.json, level);

    let config = ImpactConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Commands::Select {
            base,
            output,
            connector,
        } => cmd_select(&with_overrides(config, base, None), output, &connector).await,
        Commands::Changed { base } => cmd_changed(&with_overrides(config, base, None)),
        Commands::Fetch { kind, connector } => {
            cmd_fetch(&with_overrides(config, None, kind), &connector).await
        }
        Commands::Publish {
            dir,
            kind,
            connector,
        } => cmd_publish(&dir, &with_overrides(config, None, kind), &connector).await,
    }
}

/// Command-line flags take precedence over file and env configuration.
fn with_overrides(
    config: ImpactConfig,
    base: Option<String>,
    kind: Option<RelationshipKind>,
) -> ImpactConfig {
    let config = match base {
        Some(base) => config.with_base_ref(&base),
        None => config,
    };
    match kind {
        Some(kind) => config.with_kind(kind),
        None => config,
    }
}

fn collect_changes(config: &ImpactConfig) -> Result<Vec<String>> {
    changed_files(&config.project_root, &config.base_ref).with_context(|| {
        format!(
            "Failed to diff {:?} against {}",
            config.project_root, config.base_ref
        )
    })
}

async fn cmd_select(
    config: &ImpactConfig,
    output: OutputFormat,
    connector: &ConnectorArgs,
) -> Result<()> {
    let span = InvocationSpan::enter();
    let changed = collect_changes(config)?;
    let options = connector.to_options()?;
    info!(
        invocation_id = span.invocation_id(),
        backend = options.backend_name(),
        changed = changed.len(),
        "Selecting impacted tests"
    );

    let selection = select_tests(&changed, &options, config).await?;
    print!("{}", render_selection(&selection, output)?);
    Ok(())
}

fn render_selection(selection: &Selection, output: OutputFormat) -> Result<String> {
    match output {
        OutputFormat::Json => {
            let report = SelectionReport::from(selection);
            Ok(format!("{}\n", serde_json::to_string_pretty(&report)?))
        }
        OutputFormat::Text => match selection {
            Selection::Tests { pattern, .. } => Ok(format!("{pattern}\n")),
            Selection::NoImpact { policy } => {
                info!(%policy, "No impacted tests");
                Ok(String::new())
            }
        },
    }
}

fn cmd_changed(config: &ImpactConfig) -> Result<()> {
    let changed = collect_changes(config)?;
    for path in config.normalizer().prepare(&changed) {
        println!("{path}");
    }
    Ok(())
}

async fn cmd_fetch(config: &ImpactConfig, connector: &ConnectorArgs) -> Result<()> {
    let kind = &config.kind;
    let connector = connector.to_options()?.into_connector()?;
    match connector.download(kind).await {
        Some(dir) => {
            println!("{}", dir.display());
            Ok(())
        }
        None => bail!("Artifact {} could not be fetched", kind.archive_name()),
    }
}

async fn cmd_publish(dir: &Path, config: &ImpactConfig, connector: &ConnectorArgs) -> Result<()> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let kind = &config.kind;
    let connector = connector.to_options()?.into_connector()?;
    match connector.upload(kind, dir).await {
        UploadStatus::Uploaded { bytes } => {
            println!("Uploaded {} ({bytes} bytes)", kind.archive_name());
            Ok(())
        }
        UploadStatus::Failed(reason) => bail!("Upload of {} failed: {reason}", kind.archive_name()),
    }
}
