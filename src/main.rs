//! Probe a regional endpoint in every configured region and print a json report.
//!
//! Exits `1` if any region failed, `2` on bad configuration.

use std::{env, process};

use regionpool::{config::Config,
                 pool::Pool,
                 probe,
                 report::Report,
                 soft::DefaultPolicy};

/// Entry point
fn main() {
  init_logger();

  let config = Config::from_env().unwrap_or_else(|e| {
                                   log::error!("{}", e);
                                   process::exit(2)
                                 });

  log::info!("{:#?}", config);

  let api = probe::Api::new(&config.endpoint, &regionpool::CLIENT);
  let jobs = probe::jobs(&api, &config.regions, DefaultPolicy);

  let pool = Pool::new(jobs, config.concurrency).unwrap_or_else(|e| {
                                                  log::error!("{}", e);
                                                  process::exit(2)
                                                });
  let pool = match config.timeout {
    | Some(timeout) => pool.with_timeout(timeout),
    | None => pool,
  };

  let started_at = chrono::Utc::now();
  let finished = pool.run();
  let report = Report::new(&finished, started_at);

  match serde_json::to_string_pretty(&report) {
    | Ok(json) => println!("{}", json),
    | Err(e) => log::error!("serializing report: {}", e),
  }

  if let Some(errs) = finished.errors() {
    log::error!("{}", errs);
    process::exit(1);
  }
}

fn init_logger() {
  if env::var_os("RUST_LOG").is_none() {
    env::set_var("RUST_LOG", "regionpool=info,regionpool_bin=info");
  }

  pretty_env_logger::init();
}
