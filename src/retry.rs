use std::{cmp, thread, time::Duration};

use gwasget::{FetchError, FetchResult};

use crate::fetcher::FetchObserver;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// bounded retry with exponential backoff, shared by connect, list and download
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay,
            max_delay: MAX_RETRY_DELAY,
        }
    }

    /// delay slept before attempt n (n >= 2): base * 2^(n-2), capped
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(2).min(16);
        cmp::min(self.base_delay.saturating_mul(1 << exp), self.max_delay)
    }

    /// run `op` until it succeeds, fails permanently, or the bound is hit;
    /// the attempt counter lives and dies with this call
    pub fn run<T, O, F>(&self, what: &str, ob: &mut O, mut op: F) -> FetchResult<T>
    where
        O: FetchObserver + ?Sized,
        F: FnMut(&mut O) -> FetchResult<T>,
    {
        let mut attempt = 1u32;
        loop {
            match op(ob) {
                Ok(v) => return Ok(v),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) => {
                    if attempt >= self.max_attempts {
                        return Err(FetchError::RetryExhausted {
                            path: what.to_string(),
                            attempts: attempt,
                            last: Box::new(err),
                        });
                    }

                    attempt += 1;
                    let delay = self.delay_before(attempt);
                    ob.on_retry(what, &err, attempt, self.max_attempts, delay);
                    thread::sleep(delay);
                }
            }
        }
    }
}
