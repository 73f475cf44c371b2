use std::{io, path::PathBuf};

use clap::Parser;
use thiserror::Error;

/// default GWAS Catalog FTP endpoint
pub const DEFAULT_FTP_HOST: &str = "ftp.ebi.ac.uk:21";
/// directory on the EBI server under which accession trees live
pub const DEFAULT_REMOTE_ROOT: &str = "/pub/databases/gwas/summary_statistics";

pub type FetchResult<T> = Result<T, FetchError>;

#[derive(Debug, Error)]
pub enum FetchError {
    /// cannot establish or maintain the FTP session, retries included
    #[error("connection to {host} failed: {reason}")]
    Connection { host: String, reason: String },

    /// remote path does not exist on the server (FTP 550), never retried
    #[error("remote path not found: {path}")]
    NotFound { path: String },

    /// transient server failure (FTP 4xx reply or a dropped connection)
    #[error("transient error for {path}: {reason}")]
    Transient { path: String, reason: String },

    /// permanent server failure (FTP 5xx reply other than 550)
    #[error("server rejected {path}: {reason}")]
    Permanent { path: String, reason: String },

    /// cannot create a local directory or write a local file
    #[error("local i/o error at {path}: {source}")]
    LocalIo { path: PathBuf, source: io::Error },

    /// a transient failure persisted past the attempt bound
    #[error("giving up on {path} after {attempts} attempts: {last}")]
    RetryExhausted {
        path: String,
        attempts: u32,
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// whether the retry policy should attempt this operation again
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Connection { .. } | FetchError::Transient { .. }
        )
    }

    pub fn local_io(path: &std::path::Path, source: io::Error) -> FetchError {
        FetchError::LocalIo {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Config {
    #[clap(
        value_parser,
        required = true,
        help = "GWAS Catalog study accessions to download (e.g. GCST000001)"
    )]
    pub accessions: Vec<String>,

    #[clap(
        short,
        long,
        value_parser,
        value_name = "DIR",
        default_value_t = String::from("."),
        help = "Directory under which accession trees are written"
    )]
    pub output: String,

    #[clap(
        long,
        value_parser,
        default_value_t = String::from(DEFAULT_FTP_HOST),
        help = "FTP host to connect to, as host:port"
    )]
    pub host: String,

    #[clap(
        long,
        value_parser,
        default_value_t = String::from(DEFAULT_REMOTE_ROOT),
        help = "Remote directory containing the accession trees"
    )]
    pub remote_root: String,

    #[clap(
        short = 'm',
        long,
        value_parser,
        default_value_t = 5,
        help = "Maximum attempts per FTP operation (connect, list, download)"
    )]
    pub max_attempts: u32,

    #[clap(
        long,
        value_parser,
        default_value_t = 1000,
        help = "Delay before the first retry in milliseconds, doubled per attempt"
    )]
    pub base_delay_ms: u64,

    #[clap(
        short = 'T',
        long,
        value_parser,
        default_value_t = 10,
        help = "TCP connect timeout in seconds"
    )]
    pub timeout: u8,
}

impl Config {
    pub fn build() -> Result<Config, String> {
        let cfg = Config::parse();
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("invalid max attempts, must be at least 1".to_string());
        }
        if self.accessions.iter().any(|a| a.trim().is_empty()) {
            return Err("accession must not be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_and_transient_errors_are_retryable() {
        let conn = FetchError::Connection {
            host: "ftp.ebi.ac.uk:21".to_string(),
            reason: "timed out".to_string(),
        };
        let transient = FetchError::Transient {
            path: "/pub/databases/gwas/summary_statistics".to_string(),
            reason: "service not available".to_string(),
        };

        assert!(conn.is_transient());
        assert!(transient.is_transient());
    }

    #[test]
    fn test_permanent_errors_are_not_retryable() {
        let not_found = FetchError::NotFound {
            path: "/pub/nope".to_string(),
        };
        let rejected = FetchError::Permanent {
            path: "/pub/denied".to_string(),
            reason: "action not taken".to_string(),
        };
        let io = FetchError::local_io(
            std::path::Path::new("/tmp/out"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!not_found.is_transient());

        let exhausted = FetchError::RetryExhausted {
            path: "/pub/slow".to_string(),
            attempts: 5,
            last: Box::new(not_found),
        };

        assert!(!rejected.is_transient());
        assert!(!io.is_transient());
        assert!(!exhausted.is_transient());
    }

    #[test]
    fn test_validate_rejects_blank_accession() {
        let cfg = Config::parse_from(["gwasget", "GCST000001", " "]);
        assert!(cfg.validate().is_err());

        let cfg = Config::parse_from(["gwasget", "GCST000001", "GCST000002"]);
        assert!(cfg.validate().is_ok());
    }
}
