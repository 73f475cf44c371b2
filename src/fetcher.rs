use std::{
    fs,
    path::Path,
    time::{Duration, Instant},
};

use gwasget::{Config, FetchError, FetchResult};

use crate::{
    ftp::{EntryKind, FtpSession, RemoteEntry},
    retry::RetryPolicy,
};

/// progress and status sink, implemented by pb::ProgressManager
pub trait FetchObserver {
    fn on_file_start(&mut self, _path: &str, _len: u64) {}
    fn on_progress(&mut self, _pos: u64) {}
    fn on_file_end(&mut self, _path: &str) {}
    fn on_message(&mut self, _msg: &str) {}
    fn on_error(&mut self, _err: &FetchError) {}
    fn on_retry(
        &mut self,
        _what: &str,
        _err: &FetchError,
        _attempt: u32,
        _max_attempts: u32,
        _delay: Duration,
    ) {
    }
}

/// the two remote operations the recursive descent needs
pub trait RemoteSource {
    fn list(&mut self, path: &str) -> FetchResult<Vec<RemoteEntry>>;

    fn download(
        &mut self,
        remote: &str,
        dest: &Path,
        ob: &mut dyn FetchObserver,
    ) -> FetchResult<u64>;
}

impl RemoteSource for FtpSession {
    fn list(&mut self, path: &str) -> FetchResult<Vec<RemoteEntry>> {
        FtpSession::list(self, path)
    }

    fn download(
        &mut self,
        remote: &str,
        dest: &Path,
        ob: &mut dyn FetchObserver,
    ) -> FetchResult<u64> {
        FtpSession::download(self, remote, dest, ob)
    }
}

#[derive(Debug, Default)]
pub struct FetchReport {
    pub files: u64,
    pub bytes: u64,
    pub failed_entries: u64,
}

/// process every accession in argument order, returning how many failed entirely
pub fn run<O: FetchObserver>(cfg: &Config, ob: &mut O) -> usize {
    let retry = RetryPolicy::new(cfg.max_attempts, Duration::from_millis(cfg.base_delay_ms));
    let mut failed = 0usize;

    for accession in &cfg.accessions {
        ob.on_message(&format!(
            "Fetching {} from {}{}/{}...",
            accession, cfg.host, cfg.remote_root, accession
        ));
        let started = Instant::now();

        match fetch_accession(cfg, &retry, accession, ob) {
            Ok(report) => {
                let mut summary = format!(
                    "Finished {} in {:.1}s: {} files, {}",
                    accession,
                    started.elapsed().as_secs_f64(),
                    report.files,
                    format_byte_length(report.bytes)
                );
                if report.failed_entries > 0 {
                    summary += &format!(" ({} entries failed)", report.failed_entries);
                }
                ob.on_message(&summary);
            }
            Err(err) => {
                ob.on_error(&err);
                ob.on_message(&format!(
                    "Skipping {} after {:.1}s",
                    accession,
                    started.elapsed().as_secs_f64()
                ));
                failed += 1;
            }
        }
    }

    failed
}

fn fetch_accession<O: FetchObserver>(
    cfg: &Config,
    retry: &RetryPolicy,
    accession: &str,
    ob: &mut O,
) -> FetchResult<FetchReport> {
    let remote_root = format!("{}/{}", cfg.remote_root, accession);
    let local_root = Path::new(&cfg.output).join(accession);
    let timeout = Duration::from_secs(cfg.timeout as u64);

    let mut session = retry
        .run(&cfg.host, ob, |_| FtpSession::connect(&cfg.host, timeout))
        .map_err(|err| FetchError::Connection {
            host: cfg.host.clone(),
            reason: err.to_string(),
        })?;

    // the session must be released whichever way the mirror ends
    let result = fetch_tree(&mut session, retry, &remote_root, &local_root, ob);
    session.close();
    result
}

/// mirror the tree rooted at `remote_root` under `local_root`; an error here
/// means the root itself could not be handled and the accession failed entirely
pub fn fetch_tree<S, O>(
    source: &mut S,
    retry: &RetryPolicy,
    remote_root: &str,
    local_root: &Path,
    ob: &mut O,
) -> FetchResult<FetchReport>
where
    S: RemoteSource + ?Sized,
    O: FetchObserver,
{
    let mut report = FetchReport::default();
    mirror_dir(source, retry, remote_root, local_root, ob, &mut report)?;
    Ok(report)
}

fn mirror_dir<S, O>(
    source: &mut S,
    retry: &RetryPolicy,
    remote: &str,
    local: &Path,
    ob: &mut O,
    report: &mut FetchReport,
) -> FetchResult<()>
where
    S: RemoteSource + ?Sized,
    O: FetchObserver,
{
    fs::create_dir_all(local).map_err(|e| FetchError::local_io(local, e))?;

    let entries = retry.run(remote, ob, |_| source.list(remote))?;

    for entry in entries {
        let remote_child = format!("{}/{}", remote, entry.name);
        let local_child = local.join(&entry.name);

        let result = match entry.kind {
            EntryKind::Dir => {
                mirror_dir(source, retry, &remote_child, &local_child, ob, report)
            }
            EntryKind::File => {
                let size = entry.size;
                retry
                    .run(&remote_child, ob, |ob| {
                        ob.on_file_start(&remote_child, size);
                        source.download(&remote_child, &local_child, ob)
                    })
                    .map(|bytes| {
                        ob.on_file_end(&remote_child);
                        report.files += 1;
                        report.bytes += bytes;
                    })
            }
        };

        // one entry failing must not take its siblings down with it
        if let Err(err) = result {
            ob.on_error(&err);
            report.failed_entries += 1;
        }
    }

    Ok(())
}

pub fn format_byte_length(len: u64) -> String {
    let units = ["B", "kB", "MB", "GB", "TB"];

    let mut value = len as f64;
    let mut unit_index = 0;

    while value >= 1024.0 && unit_index < units.len() - 1 {
        value /= 1024.0;
        unit_index += 1;
    }

    format!("{:.1} {}", value, units[unit_index])
}
