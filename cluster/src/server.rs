use std::path::PathBuf;

use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "replica")]
struct Opt {
    /// Unique replica ID
    #[structopt(short = "i", long = "id")]
    id: usize,

    /// Roster file
    #[structopt(short = "c", long = "config", default_value = "config.json")]
    config: PathBuf,

    /// Directory for learned log snapshots
    #[structopt(short = "d", long = "dump")]
    dump: Option<PathBuf>,

    /// Logging verbosity (-v, -vv, -vvv)
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let opt = Opt::from_args();

    cluster::init_logging(opt.id, opt.verbose)
        .expect("[INTERNAL ERROR]: could not initialize logging");

    let config = match multipaxos::Config::load(&opt.config) {
    | Ok(config) => config,
    | Err(error) => {
        eprintln!("[ERROR]: could not load {}: {}", opt.config.display(), error);
        std::process::exit(1)
    }
    };

    if let Err(error) = config.run(opt.id, opt.dump).await {
        eprintln!("[ERROR]: replica {} stopped: {}", opt.id, error);
        std::process::exit(1)
    }
}
