#[macro_use]
extern crate log;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use multipaxos::message::{ClientRequest, ClientTimeout, Message};
use multipaxos::{round, Error, ProposalNumber, Socket};
use structopt::StructOpt;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Wait before the first timeout.
const INITIAL_TIMEOUT: Duration = Duration::from_millis(500);

/// Backoff cap.
const MAX_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(StructOpt)]
#[structopt(name = "client")]
struct Opt {
    /// Unique client ID
    #[structopt(short = "i", long = "id")]
    id: u64,

    /// Port to receive replies on
    #[structopt(short = "p", long = "port")]
    port: u16,

    /// Roster file
    #[structopt(short = "c", long = "config", default_value = "config.json")]
    config: PathBuf,

    /// Percentage of outbound datagrams to drop
    #[structopt(long = "drop-rate", default_value = "0")]
    drop_rate: u8,

    /// Logging verbosity (-v, -vv, -vvv)
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: u8,
}

/// Thin client: submits one value at a time and waits until it is chosen.
struct Client {
    id: u64,
    socket: Socket,
    address: SocketAddr,
    replicas: Vec<SocketAddr>,

    /// Proposal number believed to be leading
    believed: ProposalNumber,

    /// Number of the request being submitted
    request_no: u64,
}

impl Client {
    fn request(&self, value: &str) {
        let leader = round::leader_of(self.believed);
        let request = ClientRequest {
            client_id: self.id,
            client: self.address,
            request_no: self.request_no,
            proposal: self.believed,
            value: value.as_bytes().to_vec(),
        };
        match self.replicas.get(leader) {
        | Some(replica) => {
            debug!("sending request {} to replica {}", self.request_no, leader);
            self.socket.send(*replica, &Message::ClientRequest(request));
        }
        | None => warn!(
            "leader {} under {} is not in the roster of {} replicas",
            leader, self.believed, self.replicas.len(),
        ),
        }
    }

    fn time_out(&self) {
        let timeout = Message::ClientTimeout(ClientTimeout {
            client_id: self.id,
            client: self.address,
            request_no: self.request_no,
            proposal: self.believed,
        });
        for replica in &self.replicas {
            self.socket.send(*replica, &timeout);
        }
    }

    /// Returns once `value` is chosen.
    async fn submit(&mut self, value: &str) {
        let mut wait = INITIAL_TIMEOUT;
        self.request(value);
        loop {
            match tokio::time::timeout(wait, self.socket.recv::<Message>()).await {
            | Err(_) => {
                info!("request {} timed out under {} after {:?}", self.request_no, self.believed, wait);
                self.time_out();
                wait = std::cmp::min(wait * 2, MAX_TIMEOUT);
                self.request(value);
            }
            | Ok(Ok((Message::AckClient(ack), _))) if ack.request_no == self.request_no => {
                return
            }
            | Ok(Ok((Message::NewLeaderToClient(redirect), _))) => {
                if redirect.proposal > self.believed {
                    debug!("leader moved from {} to {}", self.believed, redirect.proposal);
                    self.believed = redirect.proposal;
                    self.request(value);
                }
            }
            | Ok(Ok((message, from))) => trace!("ignoring {:?} from {}", message, from),
            | Ok(Err(error)) => warn!("receive failed: {}", error),
            }
        }
    }
}

async fn run(opt: Opt) -> Result<(), Error> {
    let config = multipaxos::Config::load(&opt.config)?;
    let address = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), opt.port);
    let socket = Socket::bind(address)
        .await?
        .with_drop_rate(opt.drop_rate);

    let mut client = Client {
        id: opt.id,
        address: socket.local_addr()?,
        socket,
        replicas: config.addresses()?,
        believed: ProposalNumber::default(),
        request_no: 0,
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let value = line.trim();
        if value.is_empty() {
            continue
        }
        client.submit(value).await;
        println!("[RESPONSE]: request {} chosen: {}", client.request_no, value);
        client.request_no += 1;
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let opt = Opt::from_args();
    cluster::init_logging(format!("client-{}", opt.id), opt.verbose)
        .expect("[INTERNAL ERROR]: could not initialize logging");
    if let Err(error) = run(opt).await {
        eprintln!("[ERROR]: {}", error);
        std::process::exit(1)
    }
}
