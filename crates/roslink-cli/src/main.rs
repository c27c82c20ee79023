//! # roslink-cli
//!
//! Command-line client for rosbridge v2 servers: subscribe, publish, call
//! services, and interrogate the bridge's rosapi node.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use roslink::{Client, ClientConfig, RosApi};
use serde_json::Value;

/// rosbridge v2 command-line client.
#[derive(Parser, Debug)]
#[command(name = "roslink", about = "rosbridge v2 command-line client")]
struct Cli {
    /// Bridge websocket URL.
    #[arg(long, global = true, default_value = "ws://127.0.0.1:9090")]
    url: String,

    /// rosauth secret, sent before the command runs.
    #[arg(long, global = true)]
    secret: Option<String>,

    /// File holding the rosauth secret on its first line. A missing or
    /// empty file skips authentication instead of failing.
    #[arg(long, global = true, conflicts_with = "secret")]
    secret_file: Option<PathBuf>,

    /// Log level filter (`RUST_LOG` takes precedence when set).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Subscribe to a topic and print each message as one JSON line.
    Echo {
        /// Topic to subscribe to.
        topic: String,
        /// Message type, e.g. `std_msgs/String`.
        msg_type: String,
        /// Stop after this many messages (0 runs until interrupted).
        #[arg(long, default_value = "0")]
        count: u64,
    },
    /// Advertise a topic and publish one message on it.
    Pub {
        /// Topic to publish on.
        topic: String,
        /// Message type, e.g. `geometry_msgs/Twist`.
        msg_type: String,
        /// Message payload as JSON.
        msg: String,
    },
    /// Call a service and print the reply values.
    Call {
        /// Service to call.
        service: String,
        /// Request payload as JSON.
        #[arg(default_value = "{}")]
        args: String,
    },
    /// List topics known to the bridge.
    Topics,
    /// List services known to the bridge.
    Services,
    /// List nodes known to the bridge.
    Nodes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    roslink_core::logging::init_subscriber(&args.log_level);

    let client = Client::with_config(ClientConfig::new(&args.url))
        .await
        .with_context(|| format!("failed to connect to {}", args.url))?;

    if let Some(secret) = &args.secret {
        client
            .authenticate(secret)
            .await
            .context("authentication failed")?;
    } else if let Some(path) = &args.secret_file {
        let _ = client
            .authenticate_from_file(path)
            .await
            .context("authentication failed")?;
    }

    match args.command {
        Command::Echo {
            topic,
            msg_type,
            count,
        } => echo(&client, &topic, &msg_type, count).await?,
        Command::Pub {
            topic,
            msg_type,
            msg,
        } => publish(&client, &topic, &msg_type, &msg).await?,
        Command::Call { service, args } => call(&client, &service, &args).await?,
        Command::Topics => {
            for name in RosApi::new(client.clone()).topics().await? {
                println!("{name}");
            }
        }
        Command::Services => {
            for name in RosApi::new(client.clone()).services().await? {
                println!("{name}");
            }
        }
        Command::Nodes => {
            for name in RosApi::new(client.clone()).nodes().await? {
                println!("{name}");
            }
        }
    }

    client.close().await;
    Ok(())
}

async fn echo(client: &Client, topic: &str, msg_type: &str, count: u64) -> Result<()> {
    let mut sub = client
        .subscribe(topic, msg_type)
        .await
        .context("subscribe failed")?;
    let mut seen = 0u64;
    loop {
        tokio::select! {
            delivery = sub.next() => {
                let Some(delivery) = delivery else { break };
                println!("{}", delivery.msg);
                seen += 1;
                if count > 0 && seen >= count {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn publish(client: &Client, topic: &str, msg_type: &str, msg: &str) -> Result<()> {
    let payload: Value = serde_json::from_str(msg).context("message payload is not valid JSON")?;
    let publisher = client
        .advertise(topic, msg_type)
        .await
        .context("advertise failed")?;
    publisher.publish(payload).await.context("publish failed")?;
    Ok(())
}

async fn call(client: &Client, service: &str, args: &str) -> Result<()> {
    let payload: Value = serde_json::from_str(args).context("request payload is not valid JSON")?;
    let reply = client
        .call_service(service, payload)
        .await
        .context("service call failed")?;
    if !reply.result {
        anyhow::bail!("service reported failure: {}", reply.values);
    }
    println!("{}", serde_json::to_string_pretty(&reply.values)?);
    Ok(())
}
