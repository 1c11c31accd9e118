use std::path::PathBuf;

use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "cluster")]
struct Opt {
    /// Number of crash failures to tolerate
    #[structopt(short = "f", long = "failures", default_value = "1")]
    f: usize,

    /// Replicas will be started by hand
    #[structopt(short = "m", long = "manual")]
    manual: bool,

    /// Replica <ID> never fills slot <SLOT> (repeatable)
    #[structopt(short = "s", long = "skip", number_of_values = 2, value_names = &["ID", "SLOT"])]
    skip: Vec<usize>,

    /// Replica <ID> drops <RATE> percent of what it sends (repeatable)
    #[structopt(short = "p", long = "prob", number_of_values = 2, value_names = &["ID", "RATE"])]
    prob: Vec<usize>,

    /// Every replica drops this percentage of what it sends
    #[structopt(long = "proball")]
    prob_all: Option<u8>,

    /// Where to write the roster
    #[structopt(short = "o", long = "output", default_value = "config.json")]
    output: PathBuf,
}

fn percent(rate: usize) -> u8 {
    std::cmp::min(rate, 100) as u8
}

fn main() {
    let opt = Opt::from_args();

    let mut config = multipaxos::Config::generate(opt.f);

    if opt.manual {
        config = config.with_mode(multipaxos::Mode::Manual);
    }

    if let Some(rate) = opt.prob_all {
        config = config.with_drop_rate_all(rate);
    }

    for pair in opt.skip.chunks(2) {
        config = config.with_skip(pair[0], pair[1]);
    }

    for pair in opt.prob.chunks(2) {
        config = config.with_drop_rate(pair[0], percent(pair[1]));
    }

    match config.save(&opt.output) {
    | Ok(()) => println!(
        "[RESPONSE]: wrote {} replicas to {}",
        config.count(),
        opt.output.display(),
    ),
    | Err(error) => {
        eprintln!("[ERROR]: could not write {}: {}", opt.output.display(), error);
        std::process::exit(1)
    }
    }
}
