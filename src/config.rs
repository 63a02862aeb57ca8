use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::{env, path::PathBuf, str::FromStr, time::Duration};

/// Command-line interface: one subcommand per component.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Relays storage events into compression jobs and runs them"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the storage-event relay HTTP server
    Serve(ServeArgs),
    /// Run one compression job and print its result as JSON
    Compress(CompressArgs),
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Host to bind to (overrides RELAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides RELAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Job Runner API base URL (overrides JOB_RUNNER_URL)
    #[arg(long)]
    pub job_runner_url: Option<String>,

    /// Job to trigger (overrides JOB_RUNNER_DAG_ID)
    #[arg(long)]
    pub dag_id: Option<String>,

    /// Job Runner user (overrides JOB_RUNNER_USERNAME)
    #[arg(long)]
    pub job_runner_username: Option<String>,

    /// Job Runner password (overrides JOB_RUNNER_PASSWORD)
    #[arg(long)]
    pub job_runner_password: Option<String>,

    /// Trigger request timeout in seconds (overrides JOB_RUNNER_TIMEOUT_SECS)
    #[arg(long)]
    pub trigger_timeout_secs: Option<u64>,
}

#[derive(Args, Debug, Default)]
pub struct CompressArgs {
    /// Job configuration as JSON, e.g. '{"object_name": "report.csv"}'
    #[arg(long, conflicts_with = "object_name")]
    pub conf: Option<String>,

    /// Object key to compress (shorthand for --conf)
    #[arg(long)]
    pub object_name: Option<String>,

    /// Also write the JSON result to this file
    #[arg(long)]
    pub result_file: Option<PathBuf>,

    /// `s3` or `local` (overrides STORAGE_BACKEND)
    #[arg(long)]
    pub storage_backend: Option<String>,

    /// S3 endpoint URL (overrides STORAGE_ENDPOINT)
    #[arg(long)]
    pub storage_endpoint: Option<String>,

    /// Root directory for the local backend (overrides STORAGE_LOCAL_ROOT)
    #[arg(long)]
    pub storage_local_root: Option<PathBuf>,

    /// Bucket to read from (overrides SOURCE_BUCKET)
    #[arg(long)]
    pub source_bucket: Option<String>,

    /// Bucket to write to (overrides DEST_BUCKET)
    #[arg(long)]
    pub dest_bucket: Option<String>,

    /// Scratch directory for downloads and archives (overrides SCRATCH_DIR)
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,
}

/// Event relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub job_runner_url: String,
    pub dag_id: String,
    pub job_runner_username: String,
    pub job_runner_password: String,
    pub trigger_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            job_runner_url: "http://airflow-webserver:8080/api/v1".into(),
            dag_id: "minio_file_compressorone".into(),
            job_runner_username: "admin".into(),
            job_runner_password: "admin".into(),
            trigger_timeout: Duration::from_secs(10),
        }
    }
}

impl RelayConfig {
    /// Merge CLI args over environment variables over defaults.
    pub fn from_env_and_args(args: ServeArgs) -> Result<Self> {
        Self::resolve(args, |name| env::var(name))
    }

    pub fn resolve<F>(args: ServeArgs, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let defaults = Self::default();
        let timeout_secs = match args.trigger_timeout_secs {
            Some(secs) => secs,
            None => env_parse(&lookup, "JOB_RUNNER_TIMEOUT_SECS", defaults.trigger_timeout.as_secs())?,
        };
        if timeout_secs == 0 {
            bail!("trigger timeout must be at least one second");
        }

        Ok(Self {
            host: args
                .host
                .unwrap_or(env_or(&lookup, "RELAY_HOST", defaults.host)?),
            port: match args.port {
                Some(port) => port,
                None => env_parse(&lookup, "RELAY_PORT", defaults.port)?,
            },
            job_runner_url: args
                .job_runner_url
                .unwrap_or(env_or(&lookup, "JOB_RUNNER_URL", defaults.job_runner_url)?),
            dag_id: args
                .dag_id
                .unwrap_or(env_or(&lookup, "JOB_RUNNER_DAG_ID", defaults.dag_id)?),
            job_runner_username: args.job_runner_username.unwrap_or(env_or(
                &lookup,
                "JOB_RUNNER_USERNAME",
                defaults.job_runner_username,
            )?),
            job_runner_password: args.job_runner_password.unwrap_or(env_or(
                &lookup,
                "JOB_RUNNER_PASSWORD",
                defaults.job_runner_password,
            )?),
            trigger_timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    Local,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "s3" | "minio" => Ok(Self::S3),
            "local" | "fs" => Ok(Self::Local),
            other => bail!("unknown storage backend `{}` (expected `s3` or `local`)", other),
        }
    }
}

/// Object store connection settings.
#[derive(Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub local_root: PathBuf,
}

// Hand-written so credentials never reach the logs.
impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("backend", &self.backend)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("local_root", &self.local_root)
            .finish()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::S3,
            endpoint: "http://minio:9000".into(),
            region: "us-east-1".into(),
            access_key: "minioadmin".into(),
            secret_key: "minioadmin".into(),
            local_root: PathBuf::from("./data/objects"),
        }
    }
}

/// Compression worker configuration. Buckets are fixed per deployment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub source_bucket: String,
    pub dest_bucket: String,
    pub scratch_dir: PathBuf,
    pub storage: StorageConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            source_bucket: "testing-files".into(),
            dest_bucket: "compressed-files".into(),
            scratch_dir: env::temp_dir().join("object-compressor"),
            storage: StorageConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Merge CLI args over environment variables over defaults.
    pub fn from_env_and_args(args: &CompressArgs) -> Result<Self> {
        Self::resolve(args, |name| env::var(name))
    }

    pub fn resolve<F>(args: &CompressArgs, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let defaults = Self::default();
        let storage_defaults = defaults.storage;

        let backend = match &args.storage_backend {
            Some(value) => value.parse()?,
            None => match lookup("STORAGE_BACKEND") {
                Ok(value) => value
                    .parse()
                    .with_context(|| format!("parsing STORAGE_BACKEND value `{}`", value))?,
                Err(env::VarError::NotPresent) => storage_defaults.backend,
                Err(err) => return Err(err).context("reading STORAGE_BACKEND"),
            },
        };

        let storage = StorageConfig {
            backend,
            endpoint: args.storage_endpoint.clone().unwrap_or(env_or(
                &lookup,
                "STORAGE_ENDPOINT",
                storage_defaults.endpoint,
            )?),
            region: env_or(&lookup, "STORAGE_REGION", storage_defaults.region)?,
            access_key: env_or(&lookup, "STORAGE_ACCESS_KEY", storage_defaults.access_key)?,
            secret_key: env_or(&lookup, "STORAGE_SECRET_KEY", storage_defaults.secret_key)?,
            local_root: args.storage_local_root.clone().unwrap_or(PathBuf::from(env_or(
                &lookup,
                "STORAGE_LOCAL_ROOT",
                storage_defaults.local_root.display().to_string(),
            )?)),
        };

        Ok(Self {
            source_bucket: args.source_bucket.clone().unwrap_or(env_or(
                &lookup,
                "SOURCE_BUCKET",
                defaults.source_bucket,
            )?),
            dest_bucket: args.dest_bucket.clone().unwrap_or(env_or(
                &lookup,
                "DEST_BUCKET",
                defaults.dest_bucket,
            )?),
            scratch_dir: args.scratch_dir.clone().unwrap_or(PathBuf::from(env_or(
                &lookup,
                "SCRATCH_DIR",
                defaults.scratch_dir.display().to_string(),
            )?)),
            storage,
        })
    }
}

fn env_or<F>(lookup: &F, name: &str, default: String) -> Result<String>
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match lookup(name) {
        Ok(value) => Ok(value),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

fn env_parse<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Result<String, env::VarError>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(
        pairs: &[(&str, &str)],
    ) -> impl Fn(&str) -> Result<String, env::VarError> + use<> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned().ok_or(env::VarError::NotPresent)
    }

    #[test]
    fn relay_defaults_without_env() {
        let cfg = RelayConfig::resolve(ServeArgs::default(), lookup_from(&[])).unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:5000");
        assert_eq!(cfg.dag_id, "minio_file_compressorone");
        assert_eq!(cfg.trigger_timeout, Duration::from_secs(10));
    }

    #[test]
    fn cli_overrides_env() {
        let args = ServeArgs {
            port: Some(8081),
            ..ServeArgs::default()
        };
        let cfg = RelayConfig::resolve(
            args,
            lookup_from(&[("RELAY_PORT", "9000"), ("JOB_RUNNER_URL", "http://runner/api/v1")]),
        )
        .unwrap();
        assert_eq!(cfg.port, 8081);
        assert_eq!(cfg.job_runner_url, "http://runner/api/v1");
    }

    #[test]
    fn bad_numeric_env_is_reported() {
        let err = RelayConfig::resolve(ServeArgs::default(), lookup_from(&[("RELAY_PORT", "http")]))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("RELAY_PORT"));

        let err = RelayConfig::resolve(
            ServeArgs::default(),
            lookup_from(&[("JOB_RUNNER_TIMEOUT_SECS", "0")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn worker_reads_buckets_and_backend() {
        let args = CompressArgs {
            dest_bucket: Some("archive".into()),
            ..CompressArgs::default()
        };
        let cfg = WorkerConfig::resolve(
            &args,
            lookup_from(&[
                ("STORAGE_BACKEND", "local"),
                ("SOURCE_BUCKET", "incoming"),
                ("DEST_BUCKET", "ignored"),
                ("SCRATCH_DIR", "/var/tmp/oc"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.storage.backend, StorageBackend::Local);
        assert_eq!(cfg.source_bucket, "incoming");
        assert_eq!(cfg.dest_bucket, "archive");
        assert_eq!(cfg.scratch_dir, PathBuf::from("/var/tmp/oc"));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = WorkerConfig::resolve(
            &CompressArgs::default(),
            lookup_from(&[("STORAGE_BACKEND", "ftp")]),
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("ftp"));
    }

    #[test]
    fn storage_debug_redacts_secret() {
        let rendered = format!("{:?}", StorageConfig::default());
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("secret_key: \"minioadmin\""));
    }
}
