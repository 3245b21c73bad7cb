//! distcache-cli - interactive console for a cache node
//!
//! Reads one command per line from stdin, sends it verbatim and prints the
//! reply. `exit` quits.

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use distcache::client::CacheClient;
use distcache::protocol::Command;

#[derive(Parser, Debug)]
#[command(name = "distcache-cli", version, about = "Console client for a distcache node")]
struct Cli {
    /// Server host
    #[arg(default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(default_value_t = 3000)]
    port: u16,
}

const USAGE: &str = "\
Commands:
  SET <key> <value> <ttl_ns>
  GET <key> | DEL <key> | HAS <key>
  KEYS | METRICS
  BATCH <k1>:<v1>,<k2>:<v2> <ttl_ns>
  exit

Note: a leader also replicates other clients' writes to this console, so a
printed line may be a replicated SET/DEL/BATCH rather than the reply.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let addr = format!("{}:{}", cli.host, cli.port);
    let mut client = CacheClient::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {addr}"))?;

    println!("Connected to {addr}");
    println!("{USAGE}");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") {
            break;
        }

        let verb = line.split_whitespace().next().unwrap_or_default();
        if verb.parse::<Command>().is_err() {
            println!("Unknown command: {verb}\n{USAGE}");
            continue;
        }

        let reply = client.request(line).await.context("request failed")?;
        println!("{reply}");
    }

    Ok(())
}
