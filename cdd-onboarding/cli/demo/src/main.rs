//! Drives the onboarding coordinator through every scenario against in-memory
//! collaborators and exits with a non-zero status on the first unexpected result.

mod errors;
mod input;

use cdd_onboarding::{
    init_print_recorder, CddAttestation, ConfidentialIdentityPrimitive, IdentityLedger,
    InMemoryLedger, InMemoryRegistry, IssuedIdentity, NewUserOutcome, OnboardingCoordinator,
    PiiRecord, RegistryMatch, Scope, SigningKey,
};
use errors::Error;
use input::{create_rng_from_seed, parse_input, resolve_config, DemoArgs};
use log::{error, info};
use metrics::timing;
use serde::Serialize;
use std::{sync::Arc, time::Instant};

#[tokio::main]
async fn main() {
    env_logger::init();
    info!("Starting the program.");
    init_print_recorder();

    let parse_arg_timer = Instant::now();
    let args = match parse_input() {
        Ok(args) => args,
        Err(error) => {
            error!("Error in parsing the input: {}", error);
            std::process::exit(1);
        }
    };
    timing!("demo.argument_parse", parse_arg_timer, Instant::now());

    let run_timer = Instant::now();
    if let Err(error) = run(args).await {
        error!("Error in running the scenarios: {}", error);
        std::process::exit(1);
    }
    timing!("demo.run", run_timer, Instant::now());
    info!("All scenarios completed as expected.");
}

async fn run(args: DemoArgs) -> Result<(), Error> {
    let config = resolve_config(&args)?;
    let mut rng = create_rng_from_seed(args.seed.as_deref().unwrap_or_default())?;
    let scope = Scope::padded(args.scope.as_bytes())?;

    let primitive = Arc::new(ConfidentialIdentityPrimitive);
    let ledger = Arc::new(InMemoryLedger::new(primitive.clone()));
    let registry = Arc::new(InMemoryRegistry::new(RegistryMatch {
        provider_name: args.provider_name.clone(),
        provider_url: args.provider_url.clone(),
    }));
    let coordinator = OnboardingCoordinator::new(
        ledger.clone(),
        registry.clone(),
        primitive,
        config.clone(),
    );

    let first_key = SigningKey::random(&mut rng);
    let second_key = SigningKey::random(&mut rng);
    let pii = PiiRecord::dummy(&mut rng);

    // A fresh key and an unknown person are issued an identity.
    let scenario = "new user";
    let issued: IssuedIdentity = match coordinator.onboard_new_user(&first_key, &pii).await? {
        NewUserOutcome::Issued(issued) => issued,
        other => return Err(unexpected(scenario, "an issued identity", &other)),
    };
    report(scenario, &issued);

    // The same person with another key is sent back to their provider.
    let scenario = "returning person";
    match coordinator.onboard_new_user(&second_key, &pii).await? {
        NewUserOutcome::Redirect(provider) => report(scenario, &provider),
        other => return Err(unexpected(scenario, "a redirect", &other)),
    }

    let scenario = "existing identity";
    let attestation = coordinator
        .onboard_existing_identity(&first_key, &pii, &issued.unique_id, &issued.identity_id)
        .await?;
    expect_attestation(scenario, &attestation, |attestation| {
        attestation.identity_id == issued.identity_id && attestation.cdd_id == issued.cdd_id
    })?;

    let scenario = "new identity for known person";
    let attestation = coordinator
        .onboard_new_identity_for_known_person(&second_key, &pii, &issued.unique_id)
        .await?;
    expect_attestation(scenario, &attestation, |attestation| {
        attestation.identity_id != issued.identity_id
    })?;

    let scenario = "investor uniqueness";
    let proof = coordinator
        .claim_investor_uniqueness(
            &first_key,
            &issued.identity_id,
            &issued.unique_id,
            &issued.cdd_id,
            &scope,
        )
        .await?;
    report(scenario, &proof);
    let balance = ledger.balance_of(&first_key).await?;
    if balance != config.fee_allowance {
        return Err(unexpected(
            scenario,
            "the configured fee allowance",
            &balance,
        ));
    }

    info!(
        "Ledger holds {} identities, registry holds {} records.",
        ledger.identity_count(),
        registry.record_count()
    );
    Ok(())
}

fn expect_attestation<F>(
    scenario: &'static str,
    attestation: &CddAttestation,
    check: F,
) -> Result<(), Error>
where
    F: FnOnce(&CddAttestation) -> bool,
{
    if !check(attestation) {
        return Err(unexpected(scenario, "a matching attestation", attestation));
    }
    report(scenario, attestation);
    Ok(())
}

fn report<T: Serialize + std::fmt::Debug>(scenario: &str, value: &T) {
    let line = serde_json::to_string(value).unwrap_or_else(|_| format!("{:?}", value));
    info!("scenario {:?}: {}", scenario, line);
}

fn unexpected<T: std::fmt::Debug>(
    scenario: &'static str,
    expected: &'static str,
    found: &T,
) -> Error {
    Error::UnexpectedOutcome {
        scenario,
        expected,
        found: format!("{:?}", found),
    }
}
