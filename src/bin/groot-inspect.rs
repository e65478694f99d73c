use std::io::{self, BufWriter, Write};
use std::time::Instant;
use std::{env, process};

use groot_graph::store::{self, StoreFileType};
use groot_graph::{CoverageParams, GraphStore};
use getopts::Options;
use log::LevelFilter;

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    let start_time = Instant::now();

    // Parse arguments.
    let config = Config::new();
    env_logger::Builder::new().filter_level(config.log_level).init();

    // Check the store file before loading it.
    match store::identify_store(&config.store_file) {
        StoreFileType::Version(version) if version == GraphStore::VERSION => {},
        StoreFileType::Version(version) => {
            return Err(format!("Store {} has version {} (expected {})", config.store_file, version, GraphStore::VERSION));
        },
        StoreFileType::Missing => return Err(format!("Store {} does not exist", config.store_file)),
        _ => return Err(format!("{} is not a graph store", config.store_file)),
    }
    let store = GraphStore::open(&config.store_file).map_err(|x| x.to_string())?;

    let mut output = BufWriter::new(io::stdout().lock());
    if let Some(params) = config.coverage.as_ref() {
        // Coverage report.
        let report = store.coverage(params).map_err(|x| x.to_string())?;
        writeln!(output, "graph\tpath\tname\tlength\tcovered\tbreadth\treads").map_err(|x| x.to_string())?;
        for record in report.iter() {
            let reference = &record.reference;
            writeln!(
                output, "{}\t{}\t{}\t{}\t{}\t{:.4}\t{}",
                reference.graph_id, reference.path_id, String::from_utf8_lossy(&reference.name), reference.length,
                record.covered, record.breadth, record.reads
            ).map_err(|x| x.to_string())?;
        }
    } else {
        // Alignment targets.
        let refs = store.refs().map_err(|x| x.to_string())?;
        writeln!(output, "graph\tpath\tname\tlength").map_err(|x| x.to_string())?;
        for reference in refs.iter() {
            writeln!(
                output, "{}\t{}\t{}\t{}",
                reference.graph_id, reference.path_id, String::from_utf8_lossy(&reference.name), reference.length
            ).map_err(|x| x.to_string())?;
        }
    }
    output.flush().map_err(|x| x.to_string())?;

    // Export.
    if let Some(directory) = config.export_dir.as_ref() {
        let summary = store.export(directory).map_err(|x| x.to_string())?;
        eprintln!(
            "Exported {} graphs to {} ({} without reads, {} failures)",
            summary.written, directory, summary.skipped, summary.failures.len()
        );
        for (graph_id, err) in summary.failures.iter() {
            eprintln!("Graph {}: {}", graph_id, err);
        }
    }

    let end_time = Instant::now();
    let seconds = end_time.duration_since(start_time).as_secs_f64();
    eprintln!("Used {:.3} seconds", seconds);

    Ok(())
}

//-----------------------------------------------------------------------------

struct Config {
    pub store_file: String,
    pub coverage: Option<CoverageParams>,
    pub export_dir: Option<String>,
    pub log_level: LevelFilter,
}

impl Config {
    pub fn new() -> Config {
        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        let cutoff_desc = format!("report paths with coverage breadth at least FLOAT (e.g. {})", CoverageParams::CUTOFF);
        opts.optopt("c", "coverage", &cutoff_desc, "FLOAT");
        let reads_desc = format!("minimum reads for a covered node (default: {})", CoverageParams::MIN_READS);
        opts.optopt("r", "min-reads", &reads_desc, "INT");
        opts.optopt("e", "export", "export graphs with reads as GFA files to this directory", "DIR");
        opts.optflagmulti("v", "verbose", "increase verbosity (-v for info, -vv for debug)");
        let matches = match opts.parse(&args[1..]) {
            Ok(m) => m,
            Err(f) => {
                eprintln!("{}", f);
                process::exit(1);
            }
        };

        let header = format!("Usage: {} [options] store.db", program);
        if matches.opt_present("h") {
            eprint!("{}", opts.usage(&header));
            process::exit(0);
        }
        let store_file = if let Some(s) = matches.free.first() {
            s.clone()
        } else {
            eprint!("{}", opts.usage(&header));
            process::exit(1);
        };

        let mut coverage: Option<CoverageParams> = None;
        if let Some(s) = matches.opt_str("c") {
            let mut params = CoverageParams::default();
            params.cutoff = parse_or_exit(&s, "coverage cutoff");
            if let Some(s) = matches.opt_str("r") {
                params.min_reads = parse_or_exit(&s, "minimum reads");
            }
            coverage = Some(params);
        }
        let export_dir = matches.opt_str("e");

        let log_level = match matches.opt_count("v") {
            0 => LevelFilter::Error,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        };

        Config {
            store_file,
            coverage,
            export_dir,
            log_level,
        }
    }
}

fn parse_or_exit<T: std::str::FromStr>(value: &str, what: &str) -> T {
    match value.parse::<T>() {
        Ok(result) => result,
        Err(_) => {
            eprintln!("Invalid {}: {}", what, value);
            process::exit(1);
        }
    }
}

//-----------------------------------------------------------------------------
