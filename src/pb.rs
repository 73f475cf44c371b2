use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use gwasget::FetchError;

use crate::fetcher::FetchObserver;

pub struct ProgressManager {
    pb: Option<ProgressBar>,
}

impl ProgressManager {
    pub fn new() -> Self {
        Self { pb: None }
    }

    fn clear(&mut self) {
        if let Some(pb) = self.pb.take() {
            pb.finish_and_clear();
        }
    }
}

impl FetchObserver for ProgressManager {
    fn on_file_start(&mut self, path: &str, len: u64) {
        // a retried download restarts its bar from zero
        self.clear();

        let pb = ProgressBar::new(len);
        pb.set_style(ProgressStyle::with_template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
            .unwrap());
        pb.set_message(path.to_string());
        self.pb = Some(pb);
    }

    fn on_progress(&mut self, pos: u64) {
        if let Some(pb) = &self.pb {
            pb.set_position(pos);
        }
    }

    fn on_file_end(&mut self, path: &str) {
        self.clear();
        println!("Saved {}", path);
    }

    fn on_message(&mut self, msg: &str) {
        println!("{}", msg);
    }

    fn on_error(&mut self, err: &FetchError) {
        self.clear();
        eprintln!("error: {}", err);
    }

    fn on_retry(
        &mut self,
        what: &str,
        err: &FetchError,
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
    ) {
        self.clear();
        eprintln!(
            "warning: {} - retrying {} in {:?} (attempt {}/{})",
            err, what, delay, attempt, max_attempts
        );
    }
}
