use anyhow::anyhow;
use clap::Parser;
use const_format::concatcp;
use rand::Rng;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::fs::File;
use std::ops::{AddAssign, Div};
use std::process::{self, Child, Command, Stdio};
use std::thread;
use std::time::{Duration as StdDuration, Instant};

const LOCAL_PORT: u32 = 8374;
const LOCAL_URL: &str = concatcp!("http://127.0.0.1:", LOCAL_PORT, "/api/v1");

#[rustfmt::skip]
const ROCKET_ENV: &[(&str, &str)] = &[
    ("ROCKET_PORT", concatcp!(LOCAL_PORT)),
    ("ROCKET_STORE", "memory"),
    ("ROCKET_HMAC_SECRET", "dummy"),
];

#[rustfmt::skip]
const OPTIONS: &[&str] = &[
    "Sim",
    "Não",
];

#[derive(Parser)]
struct Args {
    /// Silence local server logging.
    #[arg(short, long)]
    quiet: bool,

    /// Send local server logging to this file; takes precedence over --quiet.
    #[arg(long)]
    logfile: Option<String>,

    /// Connect to a remote server at this URL instead of running a local one.
    /// Include the API prefix, e.g. `http://voting-api:8080/api/v1`.
    #[arg(long)]
    remote: Option<String>,

    /// How many threads to use. Defaults to the number of logical CPUs.
    #[arg(long, default_value_t = num_cpus::get())]
    threads: usize,

    /// How many voters each thread registers and votes with.
    #[arg(long, default_value_t = 100)]
    voters_per_thread: usize,

    /// How long the voting session stays open, in seconds.
    #[arg(long, default_value_t = 60)]
    duration: u32,
}

/// Construct a URL from segments.
macro_rules! url {
    ($($segment:expr),+) => {{
        std::path::PathBuf::from_iter([$($segment),+]).to_str().unwrap()
    }}
}

/// Build the server in release mode.
fn setup_deps() -> anyhow::Result<()> {
    Command::new("cargo")
        .args(["build", "--release", "--bin", "voting-backend"])
        .status()?
        .success()
        .then_some(())
        .ok_or_else(|| anyhow!("server build exited nonzero"))
}

/// Terminate the given child process. This is a SIGTERM on unix and a hard-kill on other
/// platforms.
fn terminate_child(child: &mut Child) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let pid = nix::unistd::Pid::from_raw(child.id() as i32);
        nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM)?;
    }
    #[cfg(not(unix))]
    {
        child.kill()?;
    }
    Ok(())
}

/// Start a local server on an in-memory store and wait until it answers.
fn launch_server(logfile: Stdio) -> anyhow::Result<Child> {
    let mut proc = Command::new("./target/release/voting-backend")
        .envs(ROCKET_ENV.iter().copied())
        .stdout(logfile)
        .spawn()?;

    // Wait for the server to be reachable.
    let client = Client::new();
    loop {
        let resp = client
            .get(url!(LOCAL_URL, "topics"))
            .send()
            .and_then(Response::error_for_status);
        if resp.is_ok() {
            break;
        }

        // Check the server didn't exit.
        if let Some(retcode) = proc.try_wait()? {
            return Err(anyhow!("Server exited prematurely with code {}", retcode));
        }
        thread::sleep(StdDuration::from_millis(100));
    }

    Ok(proc)
}

#[derive(Deserialize)]
struct Created {
    id: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopicResults {
    sessions_count: u64,
    votes_yes_count: u64,
    votes_no_count: u64,
    yes_percentage: u32,
}

/// Create a topic and open a session on it. Returns `(topic_id, session_id)`.
fn setup_session(url: &str, duration: u32) -> anyhow::Result<(u32, u32)> {
    let client = Client::new();

    let topic = json!({
        "title": "Benchmark topic",
        "description": "Load test of concurrent voting",
    });
    let Created { id: topic_id } = client
        .post(url!(url, "topics"))
        .json(&topic)
        .send()
        .and_then(Response::error_for_status)?
        .json()?;

    let session = json!({
        "topicId": topic_id,
        "duration": duration,
    });
    let Created { id: session_id } = client
        .post(url!(url, "sessions"))
        .json(&session)
        .send()
        .and_then(Response::error_for_status)?
        .json()?;

    Ok((topic_id, session_id))
}

/// Generate a random CPF with valid check digits, formatted `ddd.ddd.ddd-dd`.
fn generate_cpf() -> String {
    let mut rng = rand::thread_rng();
    let mut digits: Vec<u32> = (0..9).map(|_| rng.gen_range(0..10)).collect();
    // Repeated digits are never valid; nudge one.
    if digits.iter().all(|&d| d == digits[0]) {
        digits[8] = (digits[8] + 1) % 10;
    }
    for _ in 0..2 {
        let weight = digits.len() as u32 + 1;
        let sum: u32 = digits
            .iter()
            .enumerate()
            .map(|(i, d)| d * (weight - i as u32))
            .sum();
        let check = match sum % 11 {
            r if r < 2 => 0,
            r => 11 - r,
        };
        digits.push(check);
    }
    let d: String = digits.iter().map(|d| d.to_string()).collect();
    format!("{}.{}.{}-{}", &d[0..3], &d[3..6], &d[6..9], &d[9..11])
}

/// Register a voter with a fresh random identifier. A generated identifier can
/// collide with an earlier one; in that case, try another.
fn register_voter(url: &str, client: &Client) -> anyhow::Result<u32> {
    loop {
        let resp = client
            .post(url!(url, "users"))
            .json(&json!({ "cpf": generate_cpf() }))
            .send()?;
        if resp.status() == StatusCode::CONFLICT {
            continue;
        }
        let Created { id } = resp.error_for_status()?.json()?;
        return Ok(id);
    }
}

/// Durations of each part of the voting process, and what happened.
#[derive(Debug, Default)]
struct VoteTimings {
    register: StdDuration,
    vote: StdDuration,
    accepted: u64,
    rejected: u64,
}

impl AddAssign for VoteTimings {
    fn add_assign(&mut self, rhs: Self) {
        self.register += rhs.register;
        self.vote += rhs.vote;
        self.accepted += rhs.accepted;
        self.rejected += rhs.rejected;
    }
}

impl Div<u32> for VoteTimings {
    type Output = Self;

    /// Average the durations; the counts stay totals.
    fn div(self, rhs: u32) -> Self {
        Self {
            register: self.register / rhs,
            vote: self.vote / rhs,
            ..self
        }
    }
}

/// Register one voter and cast a random vote for them.
fn register_and_vote(url: &str, client: &Client, session_id: u32) -> anyhow::Result<VoteTimings> {
    let pre_register = Instant::now();
    let voter_id = register_voter(url, client)?;
    let post_register = Instant::now();

    let option = OPTIONS[rand::thread_rng().gen_range(0..OPTIONS.len())];
    let vote = json!({
        "voteOption": option,
        "userId": voter_id,
        "sessionId": session_id,
    });
    let pre_vote = Instant::now();
    let resp = client.post(url!(url, "votes")).json(&vote).send()?;
    let post_vote = Instant::now();

    let (accepted, rejected) = match resp.status() {
        StatusCode::CREATED => (1, 0),
        // The session closed under us.
        StatusCode::FORBIDDEN => (0, 1),
        status => return Err(anyhow!("vote failed with {status}: {}", resp.text()?)),
    };

    Ok(VoteTimings {
        register: post_register.duration_since(pre_register),
        vote: post_vote.duration_since(pre_vote),
        accepted,
        rejected,
    })
}

/// Run the benchmark. Returns the number of accepted votes.
fn benchmark(
    url: &str,
    session_id: u32,
    num_threads: usize,
    voters_per_thread: usize,
) -> anyhow::Result<u64> {
    let total_voters = num_threads * voters_per_thread;

    let start = Instant::now();
    thread::scope(|s| {
        let mut threads = Vec::with_capacity(num_threads);

        for _ in 0..num_threads {
            let t = s.spawn(move || {
                let client = Client::new();
                let mut timings = VoteTimings::default();

                for _ in 0..voters_per_thread {
                    timings += register_and_vote(url, &client, session_id)?;
                }

                Ok::<_, anyhow::Error>(timings / voters_per_thread as u32)
            });
            threads.push(t);
        }

        let mut timings = VoteTimings::default();
        for t in threads {
            timings += t.join().map_err(|_| anyhow!("thread panicked"))??;
        }
        let total_duration = start.elapsed();

        let avg = timings / num_threads as u32;
        let avg_total_duration = avg.register + avg.vote;

        // Theoretical votes per sec is 1/avg_duration * num_threads.
        let votes_per_sec = num_threads as f64 / avg_total_duration.as_secs_f64();
        // Actual votes per sec is total_votes / total_time.
        let actual_votes_per_sec = total_voters as f64 / total_duration.as_secs_f64();

        println!("register: {:?}", avg.register);
        println!("vote:     {:?}", avg.vote);

        println!("\ntotal: {:?} ({:.2}/s)", avg_total_duration, votes_per_sec);
        println!(
            "actual duration: {} voters in {:?} ({:.2}/s)",
            total_voters, total_duration, actual_votes_per_sec
        );
        println!(
            "accepted: {}, rejected as late: {}",
            avg.accepted, avg.rejected
        );

        Ok(avg.accepted)
    })
}

/// Fetch the result and check it counts exactly the accepted votes.
fn check_result(url: &str, topic_id: u32, accepted: u64) -> anyhow::Result<()> {
    let client = Client::new();
    let results: TopicResults = client
        .get(url!(url, "topics/result", &topic_id.to_string()))
        .send()
        .and_then(Response::error_for_status)?
        .json()?;
    println!("\nresult: {results:?}");

    let counted = results.votes_yes_count + results.votes_no_count;
    if results.sessions_count != 1 || counted != accepted {
        return Err(anyhow!(
            "result counts {counted} votes in {} sessions, expected {accepted} in 1 ({}% yes)",
            results.sessions_count,
            results.yes_percentage
        ));
    }
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let url = args.remote.as_deref().unwrap_or(LOCAL_URL);

    // If we're not connecting remotely, bring up a local server.
    let mut proc: Option<Child> = None;
    if args.remote.is_none() {
        setup_deps()?;
        let logfile = match args.logfile {
            Some(path) => Stdio::from(File::create(path)?),
            None => {
                if args.quiet {
                    Stdio::null()
                } else {
                    Stdio::inherit()
                }
            }
        };
        proc = Some(launch_server(logfile)?);
    }

    // Use a closure to ensure the cleanup below runs.
    let result = (|| {
        let (topic_id, session_id) = setup_session(url, args.duration)?;
        let accepted = benchmark(url, session_id, args.threads, args.voters_per_thread)?;
        check_result(url, topic_id, accepted)
    })();

    // Kill the server.
    if let Some(p) = proc.as_mut() {
        terminate_child(p)?;
        p.wait()?;
    }

    result
}

fn main() {
    if let Err(e) = run() {
        eprintln!("FATAL: {}", e);
        process::exit(1);
    }
}
