use std::path::PathBuf;

use multipaxos::{Snapshot, Storage};
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "inspect")]
struct Opt {
    /// Snapshot files written by `replica --dump`
    #[structopt(required = true)]
    dumps: Vec<PathBuf>,

    /// Also print every learned slot
    #[structopt(short = "s", long = "slots")]
    slots: bool,
}

fn print(snapshot: &Snapshot, slots: bool) {
    println!(
        "replica {}: leader proposal {}, first unchosen {}, {} learned, duplicates {:?}",
        snapshot.id,
        snapshot.leader_proposal,
        snapshot.first_unchosen,
        snapshot.learned.len(),
        snapshot.duplicates,
    );
    if !slots {
        return
    }
    for pvalue in &snapshot.learned {
        let marker = if snapshot.duplicates.contains(&pvalue.slot) { " (duplicate)" } else { "" };
        println!(
            "  [{}] {} client {} request {}: {}{}",
            pvalue.slot,
            pvalue.proposal,
            pvalue.decree.request.client_id,
            pvalue.decree.request.request_no,
            String::from_utf8_lossy(&pvalue.decree.value),
            marker,
        );
    }
}

fn main() {
    let opt = Opt::from_args();
    let mut failed = false;

    for path in &opt.dumps {
        if !path.is_file() {
            eprintln!("[ERROR]: no dump at {}", path.display());
            failed = true;
            continue
        }
        let loaded = Storage::<Snapshot>::new(path).and_then(|mut storage| storage.load());
        match loaded {
        | Ok(Some(snapshot)) => print(&snapshot, opt.slots),
        | Ok(None) => println!("{}: empty", path.display()),
        | Err(error) => {
            eprintln!("[ERROR]: could not read {}: {}", path.display(), error);
            failed = true;
        }
        }
    }

    if failed {
        std::process::exit(1)
    }
}
