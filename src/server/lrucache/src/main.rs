//! The lrucache server binary. Parses the command line, loads the config
//! file, and launches the server threads. The process runs until it
//! receives SIGINT or SIGTERM, then shuts down cleanly.

use backtrace::Backtrace;
use clap::Parser;
use config::LrucacheConfig;
use lrucache::Lrucache;

use std::path::PathBuf;

// sysexits codes for fatal startup failures
const EX_USAGE: i32 = 64;
const EX_OSERR: i32 = 71;

#[derive(Parser)]
#[command(name = "lrucache")]
#[command(version, about = "A memcache-protocol cache server backed by an LRU store")]
struct Args {
    /// Path to the configuration file
    config: Option<PathBuf>,

    /// List all metrics in stats and exit
    #[arg(long)]
    stats: bool,

    /// Print the parsed configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() {
    // custom panic hook to terminate whole process after unwinding
    std::panic::set_hook(Box::new(|s| {
        eprintln!("{}", s);
        eprintln!("{:?}", Backtrace::new());
        std::process::exit(101);
    }));

    let args = Args::parse();

    if args.stats {
        print_stats();
        return;
    }

    let config = match &args.config {
        Some(path) => match LrucacheConfig::load(&path.to_string_lossy()) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("unable to load config file: {}", e);
                std::process::exit(EX_USAGE);
            }
        },
        None => Default::default(),
    };

    if args.print_config {
        config.print();
        return;
    }

    let cache = match Lrucache::new(config) {
        Ok(cache) => cache,
        Err(e) => {
            eprintln!("error launching lrucache: {}", e);
            std::process::exit(EX_OSERR);
        }
    };

    // block until a shutdown signal arrives, then stop the threads
    let (signal_tx, signal_rx) = crossbeam_channel::bounded(1);
    let handler = ctrlc::set_handler(move || {
        let _ = signal_tx.try_send(());
    });

    match handler {
        Ok(()) => {
            let _ = signal_rx.recv();
            cache.shutdown();
        }
        Err(_) => {
            eprintln!("failed to install signal handler");
            cache.wait();
        }
    }
}

/// Print the name and type of every registered metric.
fn print_stats() {
    println!("{:<31} TYPE", "NAME");

    let mut metrics = Vec::new();
    for metric in metriken::metrics().iter() {
        let name = metric.name();
        if name.is_empty() {
            continue;
        }
        match metric.value() {
            Some(metriken::Value::Counter(_)) => {
                metrics.push(format!("{:<31} counter", name));
            }
            Some(metriken::Value::Gauge(_)) => {
                metrics.push(format!("{:<31} gauge", name));
            }
            _ => {}
        }
    }

    metrics.sort();
    for metric in metrics {
        println!("{}", metric);
    }
}
