use std::process;

use gwasget::Config;

mod fetcher;
mod ftp;
mod pb;
mod retry;

fn main() {
    let cfg = Config::build().unwrap_or_else(|err| {
        eprintln!("Problem parsing arguments: {err}");
        process::exit(2);
    });

    let mut pbm = pb::ProgressManager::new();
    let failed = fetcher::run(&cfg, &mut pbm);
    if failed > 0 {
        process::exit(1);
    }
}
