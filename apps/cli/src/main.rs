use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{self, Write as _};
use std::path::PathBuf;
use tf_core::{
	AutoConfirm, Config, ConfirmGate, EthContractClient, FetchStage, HttpFetcher,
	HttpPinningService, Pipeline, PinningConfig, PublishStage, TransformStage, TreeKind,
	TreeLayout,
};

#[derive(Parser, Debug)]
#[command(
	name = "tokenflip",
	about = "Mirror an NFT collection, flip its images, republish the result"
)]
struct Cli {
	/// Ethereum JSON-RPC endpoint
	#[arg(long, env = "TOKENFLIP_RPC_URL")]
	rpc_url: Option<String>,

	/// Address of the collection contract to mirror
	#[arg(long, env = "TOKENFLIP_CONTRACT")]
	contract: Option<String>,

	/// Gateway base URL for content-addressed locators
	#[arg(long, env = "TOKENFLIP_GATEWAY", default_value = tf_core::DEFAULT_GATEWAY)]
	gateway: String,

	/// Root of the on-disk mirror
	#[arg(long, env = "TOKENFLIP_OUT", default_value = "out")]
	out: PathBuf,

	/// Pinning service API base URL
	#[arg(long, env = "TOKENFLIP_PINNING_URL")]
	pinning_url: Option<String>,

	/// Pinning service JWT; publish is skipped when absent
	#[arg(long, env = "TOKENFLIP_PINNING_JWT", hide_env_values = true)]
	pinning_jwt: Option<String>,

	/// Answer yes to the publish confirmation
	#[arg(long, default_value_t = false)]
	yes: bool,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Mirror originals from the contract's locators
	Fetch,
	/// Flip fetched images into the flipped tree
	Flip,
	/// Upload the flipped tree to the pinning service
	Publish,
	/// Fetch, flip, confirm and publish in one go
	Run,
}

impl Cli {
	fn config(&self) -> Result<Config, tf_core::Error> {
		let pinning = match (self.pinning_url.clone(), self.pinning_jwt.clone()) {
			(Some(api_url), Some(jwt)) => Some(PinningConfig { api_url, jwt }),
			(None, None) => None,
			(Some(_), None) => return Err(tf_core::Error::ConfigMissing("TOKENFLIP_PINNING_JWT")),
			(None, Some(_)) => return Err(tf_core::Error::ConfigMissing("TOKENFLIP_PINNING_URL")),
		};
		Ok(Config {
			rpc_url: self
				.rpc_url
				.clone()
				.ok_or(tf_core::Error::ConfigMissing("TOKENFLIP_RPC_URL"))?,
			contract_address: self
				.contract
				.clone()
				.ok_or(tf_core::Error::ConfigMissing("TOKENFLIP_CONTRACT"))?,
			gateway_url: self.gateway.clone(),
			output_dir: self.out.clone(),
			pinning,
		})
	}
}

/// Gate that asks on the terminal and blocks for an answer.
struct StdinGate;

#[async_trait::async_trait]
impl ConfirmGate for StdinGate {
	async fn confirm(&self, prompt: &str) -> tf_core::Result<bool> {
		let prompt = prompt.to_owned();
		let line = tokio::task::spawn_blocking(move || {
			print!("{prompt} [y/N] ");
			io::stdout().flush()?;
			let mut line = String::new();
			io::stdin().read_line(&mut line)?;
			Ok::<_, io::Error>(line)
		})
		.await?
		.map_err(|e| tf_core::Error::Storage {
			path: PathBuf::from("<stdin>"),
			source: e,
		})?;
		Ok(matches!(line.trim(), "y" | "Y" | "yes"))
	}
}

fn init_tracing() {
	use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

	tracing_subscriber::registry()
		.with(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| EnvFilter::new("tf_core=info,tokenflip=info")),
		)
		.with(fmt::layer().with_target(true))
		.init();
}

#[tokio::main]
async fn main() -> Result<()> {
	init_tracing();
	let cli = Cli::parse();
	let config = cli.config()?;
	tracing::info!(
		contract = %config.contract_address,
		out = %config.output_dir.display(),
		"tokenflip starting"
	);

	let client = reqwest::Client::new();
	let contract = EthContractClient::new(client.clone(), &config.rpc_url, &config.contract_address);
	let fetcher = HttpFetcher::new(client.clone());
	let pinning = config
		.pinning
		.as_ref()
		.map(|p| HttpPinningService::new(client.clone(), &p.api_url, &p.jwt));
	let gate: Box<dyn ConfirmGate> = if cli.yes {
		Box::new(AutoConfirm)
	} else {
		Box::new(StdinGate)
	};
	let layout = TreeLayout::new(config.contract_root());

	match cli.command {
		Commands::Fetch => {
			let collection = tf_core::inspect(&contract).await?;
			let outcome = FetchStage {
				contract: &contract,
				fetcher: &fetcher,
				gateway: &config.gateway_url,
				layout: &layout,
			}
			.run(&collection)
			.await?;
			println!(
				"Fetched {} of {} \"{}\" tokens (watermark {:?}, {} skipped)",
				outcome.fetched,
				collection.size,
				collection.name,
				outcome.watermark,
				outcome.skipped.len()
			);
			for skipped in &outcome.skipped {
				println!("  skipped {}: {}", skipped.id, skipped.reason);
			}
		}
		Commands::Flip => {
			let original = tf_core::sync_tree(&layout, TreeKind::Original).await?;
			let outcome = TransformStage { layout: &layout }.run(original).await?;
			println!(
				"Flipped {} tokens (watermark {:?})",
				outcome.flipped, outcome.watermark
			);
		}
		Commands::Publish => {
			let pinning = pinning
				.as_ref()
				.ok_or(tf_core::Error::ConfigMissing("TOKENFLIP_PINNING_URL"))?;
			let collection = tf_core::inspect(&contract).await?;
			let flipped = tf_core::sync_tree(&layout, TreeKind::Flipped).await?;
			let total = tf_core::next_id(flipped);
			let prompt = format!(
				"publish {total} flipped tokens of \"{}\" to the pinning service?",
				collection.name
			);
			if !gate.confirm(&prompt).await? {
				println!("Publish declined");
				return Ok(());
			}
			let outcome = PublishStage {
				layout: &layout,
				pinning,
			}
			.run(&collection.name)
			.await?;
			println!("Images pinned at   ipfs://{}", outcome.images_hash);
			println!("Metadata pinned at ipfs://{}", outcome.metadata_hash);
		}
		Commands::Run => {
			let outcome = Pipeline {
				config: &config,
				contract: &contract,
				fetcher: &fetcher,
				pinning: pinning.as_ref().map(|p| p as &dyn tf_core::PinningService),
				gate: gate.as_ref(),
			}
			.run()
			.await?;
			println!(
				"\"{}\": fetched {}, flipped {}, {} skipped",
				outcome.collection.name,
				outcome.fetch.fetched,
				outcome.transform.flipped,
				outcome.fetch.skipped.len()
			);
			match outcome.publish {
				Some(publish) => {
					println!("Images pinned at   ipfs://{}", publish.images_hash);
					println!("Metadata pinned at ipfs://{}", publish.metadata_hash);
				}
				None => println!("Publish skipped"),
			}
		}
	}

	Ok(())
}
