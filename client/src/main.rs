use anyhow::Result;
use clap::{Parser, Subcommand};
use client::Client;
use protocol::types::{Filter, NotificationMessage, TopicExpression};
use std::time::Duration;
use url::Url;

/// Command line client for the event service
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
	/// Root url of the server
	#[arg(short, long, default_value = "http://127.0.0.1:8080")]
	server: Url,
	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// List supported dialects and topics
	Topics,
	/// Publish a message
	Publish {
		topic: String,
		/// JSON payload
		#[arg(default_value = "{}")]
		payload: String,
		#[arg(long)]
		producer: Option<String>,
	},
	/// Create a pull point and print every message it receives
	Pull {
		/// Full dialect topic expression
		#[arg(short, long)]
		topic: Option<String>,
		/// Messages per request
		#[arg(short, long, default_value_t = 10)]
		max: i64,
		/// How long each request waits for messages, in seconds
		#[arg(long, default_value_t = 30)]
		wait: u64,
	},
	/// Print the current message of a property topic
	Current { topic: String },
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();
	let client = Client::new(&args.server)?;

	match args.command {
		Command::Topics => {
			let topics = client.get_topics().await?;
			println!("{}", serde_json::to_string_pretty(&topics)?);
		}
		Command::Publish {
			topic,
			payload,
			producer,
		} => {
			let mut message = NotificationMessage::new(topic, serde_json::from_str(&payload)?);
			if let Some(producer) = producer {
				message = message.with_producer(producer);
			}
			client.publish(message).await?;
		}
		Command::Pull { topic, max, wait } => {
			let filter = match topic {
				Some(topic) => Filter::topic(TopicExpression::full(topic)),
				None => Filter::default(),
			};
			let pull_point = client.create_pull_point(filter).await?;
			eprintln!("created {pull_point}");

			let result = pull(&client, pull_point, max, Duration::from_secs(wait)).await;
			client.destroy_pull_point(pull_point).await?;
			result?;
		}
		Command::Current { topic } => {
			let message = client
				.get_current_message(TopicExpression::concrete(topic))
				.await?;
			println!("{}", serde_json::to_string_pretty(&message)?);
		}
	}

	Ok(())
}

async fn pull(
	client: &Client,
	pull_point: protocol::types::PullPointReference,
	max: i64,
	wait: Duration,
) -> Result<()> {
	loop {
		tokio::select! {
			_ = tokio::signal::ctrl_c() => return Ok(()),
			messages = client.get_messages(pull_point, max, Some(wait)) => {
				for message in messages? {
					println!("{}", serde_json::to_string(&message)?);
				}
			}
		}
	}
}
