use crate::errors::Error;
use cdd_onboarding::{load_config, save_config, CoordinatorConfig};
use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{convert::TryInto, path::PathBuf};
use structopt::StructOpt;

#[derive(Clone, Debug, Serialize, Deserialize, StructOpt)]
#[structopt(
    name = "cdd-onboarding-demo",
    about = "Runs every CDD onboarding scenario against in-memory collaborators."
)]
pub struct DemoArgs {
    /// An optional seed, to feed to the RNG, that can be passed to reproduce a previous run of this CLI.
    /// The seed can be found inside the logs.
    #[structopt(
        long,
        help = "Base64 encoding of an initial seed for the RNG. If not provided, the seed will be chosen at random."
    )]
    pub seed: Option<String>,

    /// JSON file with the coordinator configuration. Missing fields take their defaults.
    #[structopt(
        parse(from_os_str),
        long,
        help = "Path to a JSON coordinator config (call_timeout_ms, fee_allowance)."
    )]
    pub config: Option<PathBuf>,

    #[structopt(
        long,
        default_value = "ACME",
        help = "The scope of the investor uniqueness claim. String of at most 12 characters."
    )]
    pub scope: String,

    #[structopt(
        long,
        default_value = "Demo CDD Provider",
        help = "Name reported in redirects."
    )]
    pub provider_name: String,

    #[structopt(
        long,
        default_value = "https://cdd-provider.example",
        help = "URL reported in redirects."
    )]
    pub provider_url: String,

    /// An optional path to save the coordinator config used for this run. The file can be
    /// passed back with `--config`.
    #[structopt(
        parse(from_os_str),
        long,
        help = "Path to save the coordinator config of this run, in the format read by --config."
    )]
    pub save_config: Option<PathBuf>,
}

pub fn parse_input() -> Result<DemoArgs, Error> {
    info!("Parsing input configuration.");
    let mut args = DemoArgs::from_args();

    let seed = args.seed.clone().unwrap_or_else(gen_seed);
    info!("Seed: {:?}", seed);
    args.seed = Some(seed);

    info!(
        "Parsed the following config from the command line:\n{:#?}",
        args
    );

    Ok(args)
}

/// Loads the coordinator config named by `--config`, or the default one, and saves it if
/// `--save-config` is passed.
pub fn resolve_config(args: &DemoArgs) -> Result<CoordinatorConfig, Error> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => CoordinatorConfig::default(),
    };
    info!("Coordinator config: {:?}", config);

    if let Some(path) = &args.save_config {
        save_config(path, &config)?;
        info!("Saved the coordinator config to {:?}", path);
    }
    Ok(config)
}

/// Helper function to generate a random seed using the thread RNG.
pub fn gen_seed() -> String {
    let mut rng = rand::thread_rng();
    let mut seed = [0u8; 32];
    rng.fill(&mut seed);
    base64::encode(seed)
}

/// Helper function to create an RNG from seed.
pub fn create_rng_from_seed(seed: &str) -> Result<StdRng, Error> {
    let seed: &[u8] = &base64::decode(seed).map_err(|error| Error::SeedDecodeError { error })?;
    let seed = seed
        .try_into()
        .map_err(|_| Error::SeedLengthError { length: seed.len() })?;

    Ok(StdRng::from_seed(seed))
}
