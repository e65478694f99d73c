use std::time::Instant;
use std::{env, fs, process};

use groot_graph::{formats, msa, utils};
use groot_graph::{BuildParams, GraphStore, GrootGraph, SequenceGraph, SignatureRegistry, Uniqueness, WindowParams};
use getopts::Options;
use log::LevelFilter;

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    let start_time = Instant::now();

    // Parse arguments.
    let config = Config::new();
    env_logger::Builder::new().filter_level(config.log_level).init();

    // Check if the store already exists.
    if utils::file_exists(&config.store_file) {
        if config.overwrite {
            eprintln!("Overwriting store {}", config.store_file);
            fs::remove_file(&config.store_file).map_err(|x| x.to_string())?;
        } else {
            return Err(format!("Store {} already exists", config.store_file));
        }
    }

    // Build the graphs.
    let mut store = GraphStore::new();
    for (graph_id, input) in config.inputs.iter().enumerate() {
        let description = load_description(input)?;
        let graph = GrootGraph::new(&description, &config.build_params).map_err(|x| format!("{}: {}", input, x))?;
        eprintln!(
            "Graph {} from {}: {} nodes, {} edges, {} paths",
            graph_id, input, graph.node_count(), graph.edge_count(), graph.path_count()
        );
        store.insert(graph_id, graph);
    }

    // Window summary.
    if let Some(params) = config.window_params.as_ref() {
        let mut total = 0;
        for (graph_id, graph) in store.iter() {
            let windows = graph.window_graph(params).map_err(|x| x.to_string())?.count();
            eprintln!("Graph {}: {} windows with unique signatures", graph_id, windows);
            total += windows;
        }
        eprintln!(
            "Total: {} windows (w = {}, k = {}, s = {})",
            total, params.window_size, params.k_size, params.sig_size
        );
    }

    // Write the store.
    store.dump(&config.store_file).map_err(|x| x.to_string())?;
    eprintln!(
        "Wrote {} graphs to {} ({})",
        store.len(), config.store_file, utils::file_size(&config.store_file).unwrap_or_default()
    );

    let end_time = Instant::now();
    let seconds = end_time.duration_since(start_time).as_secs_f64();
    eprintln!("Used {:.3} seconds", seconds);

    Ok(())
}

// GFA files are recognized by the extension; everything else is read as an aligned FASTA file.
fn load_description(filename: &str) -> Result<SequenceGraph, String> {
    let is_gfa = filename.ends_with(".gfa") || filename.ends_with(".gfa.gz");
    let result = if is_gfa {
        formats::load_gfa(filename)
    } else {
        msa::load_msa(filename).and_then(|alignment| alignment.to_graph())
    };
    result.map_err(|x| format!("{}: {}", filename, x))
}

//-----------------------------------------------------------------------------

struct Config {
    pub inputs: Vec<String>,
    pub store_file: String,
    pub overwrite: bool,
    pub build_params: BuildParams,
    pub window_params: Option<WindowParams>,
    pub log_level: LevelFilter,
}

impl Config {
    const STORE_FILE: &'static str = "groot.db";

    pub fn new() -> Config {
        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        opts.optopt("o", "output", "output file name (default: groot.db)", "FILE");
        opts.optflag("", "overwrite", "overwrite the store file if it exists");
        let multiplier_desc = format!("length multiplier for coverage thresholds (default: {})", BuildParams::default().length_multiplier);
        opts.optopt("m", "length-multiplier", &multiplier_desc, "FLOAT");
        let window_desc = format!("report windows of this length (default k = {}, s = {})", WindowParams::K_SIZE, WindowParams::SIG_SIZE);
        opts.optopt("w", "window", &window_desc, "INT");
        opts.optopt("k", "kmer", "k-mer length for the window report", "INT");
        opts.optopt("s", "sketch", "signature size for the window report", "INT");
        opts.optflagmulti("v", "verbose", "increase verbosity (-v for info, -vv for debug)");
        let matches = match opts.parse(&args[1..]) {
            Ok(m) => m,
            Err(f) => {
                eprintln!("{}", f);
                process::exit(1);
            }
        };

        let header = format!("Usage: {} [options] input.gfa|input.msa [...]", program);
        if matches.opt_present("h") {
            eprint!("{}", opts.usage(&header));
            process::exit(0);
        }
        if matches.free.is_empty() {
            eprint!("{}", opts.usage(&header));
            process::exit(1);
        }

        let store_file = matches.opt_str("o").unwrap_or(String::from(Self::STORE_FILE));
        let overwrite = matches.opt_present("overwrite");

        let mut build_params = BuildParams::default();
        if let Some(s) = matches.opt_str("m") {
            build_params.length_multiplier = parse_or_exit(&s, "length multiplier");
        }

        let mut window_params: Option<WindowParams> = None;
        if let Some(s) = matches.opt_str("w") {
            let mut params = WindowParams::new(parse_or_exit(&s, "window length"), WindowParams::K_SIZE, WindowParams::SIG_SIZE);
            if let Some(s) = matches.opt_str("k") {
                params.k_size = parse_or_exit(&s, "k-mer length");
            }
            if let Some(s) = matches.opt_str("s") {
                params.sig_size = parse_or_exit(&s, "signature size");
            }
            // Signatures are unique across all graphs.
            params.uniqueness = Uniqueness::Shared(SignatureRegistry::new());
            if let Err(err) = params.validate() {
                eprintln!("{}", err);
                process::exit(1);
            }
            window_params = Some(params);
        }

        let log_level = match matches.opt_count("v") {
            0 => LevelFilter::Error,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        };

        Config {
            inputs: matches.free.clone(),
            store_file,
            overwrite,
            build_params,
            window_params,
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
