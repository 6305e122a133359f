use crate::cli::{Cli, Command};
use chardid_core::application::{AuthoringService, NewDidParams, PreparedOperation, Processor, Resolution, Resolver};
use chardid_core::domain::{KeyType, Patch, PopRegistry, PublicKey, ServiceEndpoint, ThresholdParams, VerificationMethod};
use chardid_core::foundation::{DidError, Result};
use chardid_core::infrastructure::config::{load_config, AppConfig};
use chardid_core::infrastructure::logging::init_logger;
use chardid_core::infrastructure::rpc::CharRpcClient;
use chardid_core::infrastructure::storage::{RocksStore, Store};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub async fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;
    init_logger(config.runtime.log_dir.as_deref(), &config.runtime.log_level);

    match cli.command {
        Command::Sync { follow } => sync(&config, follow).await,
        Command::Resolve { did } => resolve(&config, &did),
        Command::History { did } => history(&config, &did),
        Command::Status => status(&config),
        Command::Create { key_type, threshold, services } => {
            let params = NewDidParams {
                key_type: parse_key_type(&key_type)?,
                threshold: threshold.as_deref().map(parse_threshold).transpose()?,
                verification_methods: vec![],
                services: services.iter().map(|s| parse_service(s)).collect::<Result<_>>()?,
            };
            let authoring = authoring(&config);
            let prepared = authoring.prepare_create(params)?;
            println!("{}", prepared.did);
            submit(&config, &authoring, prepared).await
        }
        Command::Update { did, add_services, remove_services, add_keys, remove_keys } => {
            let mut patches = Vec::new();
            if !add_keys.is_empty() {
                patches.push(Patch::AddKeys(add_keys.iter().map(|s| parse_key_spec(s)).collect::<Result<_>>()?));
            }
            if !remove_keys.is_empty() {
                patches.push(Patch::RemoveKeys(remove_keys));
            }
            if !add_services.is_empty() {
                patches.push(Patch::AddServices(add_services.iter().map(|s| parse_service(s)).collect::<Result<_>>()?));
            }
            if !remove_services.is_empty() {
                patches.push(Patch::RemoveServices(remove_services));
            }
            if patches.is_empty() {
                return Err(DidError::InvalidDocument("update requires at least one patch".to_string()));
            }
            let authoring = authoring(&config);
            let prepared = authoring.prepare_update(&did, patches)?;
            submit(&config, &authoring, prepared).await
        }
        Command::Recover { did, threshold, services, keys } => {
            let mut patches = Vec::new();
            if !keys.is_empty() {
                patches.push(Patch::AddKeys(keys.iter().map(|s| parse_key_spec(s)).collect::<Result<_>>()?));
            }
            if !services.is_empty() {
                patches.push(Patch::AddServices(services.iter().map(|s| parse_service(s)).collect::<Result<_>>()?));
            }
            let authoring = authoring(&config);
            let prepared = authoring.prepare_recover(&did, patches, threshold.as_deref().map(parse_threshold).transpose()?)?;
            submit(&config, &authoring, prepared).await
        }
        Command::Deactivate { did } => {
            let authoring = authoring(&config);
            let prepared = authoring.prepare_deactivate(&did)?;
            submit(&config, &authoring, prepared).await
        }
    }
}

fn build_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(data_dir) = &cli.data_dir {
        config.store.data_dir = data_dir.display().to_string();
    }
    if let Some(keys_dir) = &cli.keys_dir {
        config.authoring.keys_dir = keys_dir.display().to_string();
    }
    if let Some(log_dir) = &cli.log_dir {
        config.runtime.log_dir = Some(log_dir.display().to_string());
    }
    if let Some(level) = &cli.log_level {
        config.runtime.log_level = level.clone();
    }
    Ok(config)
}

fn open_store(config: &AppConfig) -> Result<Arc<dyn Store>> {
    Ok(Arc::new(RocksStore::open_in_dir(&config.store.data_dir)?))
}

fn authoring(config: &AppConfig) -> AuthoringService {
    AuthoringService::new(PathBuf::from(&config.authoring.keys_dir))
}

fn processor(config: &AppConfig, store: Arc<dyn Store>) -> Result<Processor> {
    let client = Arc::new(CharRpcClient::new(&config.node)?);
    let pop = PopRegistry::from_hex_keys(&config.bls.proof_of_possession_keys)?;
    Ok(Processor::new(store, client, pop)
        .with_retry(config.runtime.rpc_retry_attempts, Duration::from_millis(config.runtime.rpc_retry_backoff_ms)))
}

async fn sync(config: &AppConfig, follow: bool) -> Result<()> {
    let store = open_store(config)?;
    let processor = processor(config, store.clone())?;
    if follow {
        processor.run(Duration::from_secs(config.runtime.poll_interval_secs)).await
    } else {
        let progress = processor.sync_available().await?;
        println!(
            "processed={} applied={} invalid={} skipped={} cursor={}",
            progress.processed,
            progress.applied,
            progress.invalid,
            progress.skipped,
            store.last_applied_ballot()?
        );
        Ok(())
    }
}

fn resolve(config: &AppConfig, did: &str) -> Result<()> {
    let resolver = Resolver::new(open_store(config)?);
    match resolver.resolve(did)? {
        Resolution::NotFound => {
            println!("not found");
        }
        Resolution::Active(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Resolution::Deactivated(tombstone) => {
            println!("deactivated at ballot {}", tombstone.deactivated_at_ballot);
            println!("{}", serde_json::to_string_pretty(&tombstone)?);
        }
    }
    Ok(())
}

fn history(config: &AppConfig, did: &str) -> Result<()> {
    let resolver = Resolver::new(open_store(config)?);
    for entry in resolver.history(did)? {
        let op = entry.op_type.map(|t| t.to_string()).unwrap_or_else(|| "?".to_string());
        let mark = if entry.valid { "ok" } else { "invalid" };
        println!("{:>8}  {:<10} {:<8} {}", entry.ballot, op, mark, entry.summary);
    }
    Ok(())
}

fn status(config: &AppConfig) -> Result<()> {
    let resolver = Resolver::new(open_store(config)?);
    let status = resolver.status()?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

/// Submits a prepared payload: find a free slot, publish, poll for the
/// decision, then fold it into the local view. Losing the slot race
/// abandons the pending rotation so the current epoch stays authoritative.
async fn submit(config: &AppConfig, authoring: &AuthoringService, prepared: PreparedOperation) -> Result<()> {
    let store = open_store(config)?;
    let client = CharRpcClient::new(&config.node)?;

    let start = (store.last_applied_ballot()? + 1).max(0) as u64;
    let ballot = client.find_available_ballot(start).await?;
    info!("submitting {} at ballot {}", prepared.did, ballot);
    client.submit_payload(&prepared.payload, true).await?;

    let poll = Duration::from_secs(config.runtime.poll_interval_secs);
    match client.wait_for_confirmation(ballot, &prepared.payload, config.runtime.confirm_attempts, poll).await {
        Ok(()) => {
            authoring.confirm(&prepared.did, ballot as i64)?;
            let processor = processor(config, store)?;
            processor.sync_available().await?;
            println!("confirmed at ballot {}", ballot);
            Ok(())
        }
        Err(err) => {
            warn!("submission not confirmed: {}", err);
            authoring.abandon(&prepared.did)?;
            Err(err)
        }
    }
}

pub fn parse_key_type(value: &str) -> Result<KeyType> {
    match value.to_ascii_lowercase().as_str() {
        "ed25519" => Ok(KeyType::Ed25519),
        "secp256k1" => Ok(KeyType::Secp256k1),
        "p256" | "p-256" => Ok(KeyType::P256),
        "bls" | "bls12381g1" | "bls12-381-g1" => Ok(KeyType::Bls12381G1),
        other => Err(DidError::ParseError(format!("unknown key type: {}", other))),
    }
}

/// "3-of-5" applied to both chains.
pub fn parse_threshold(value: &str) -> Result<ThresholdParams> {
    let (m, n) = value
        .split_once("-of-")
        .ok_or_else(|| DidError::ParseError(format!("threshold must be M-of-N, got {}", value)))?;
    let m: u8 = m.trim().parse().map_err(|_| DidError::ParseError(format!("bad threshold M: {}", m)))?;
    let n: u8 = n.trim().parse().map_err(|_| DidError::ParseError(format!("bad threshold N: {}", n)))?;
    let params = ThresholdParams { update_m: m, update_n: n, recovery_m: m, recovery_n: n };
    params.check()?;
    Ok(params)
}

/// "id,type,endpoint"
pub fn parse_service(value: &str) -> Result<ServiceEndpoint> {
    let parts: Vec<&str> = value.splitn(3, ',').collect();
    if parts.len() != 3 {
        return Err(DidError::ParseError(format!("service must be id,type,endpoint: {}", value)));
    }
    Ok(ServiceEndpoint { id: parts[0].to_string(), service_type: parts[1].to_string(), endpoint: parts[2].to_string() })
}

/// "id,type,hexkey,purposes"
pub fn parse_key_spec(value: &str) -> Result<VerificationMethod> {
    let parts: Vec<&str> = value.splitn(4, ',').collect();
    if parts.len() != 4 {
        return Err(DidError::ParseError(format!("key must be id,type,hexkey,purposes: {}", value)));
    }
    let key_type = parse_key_type(parts[1])?;
    let bytes = hex::decode(parts[2].trim())?;
    let purposes =
        u8::from_str_radix(parts[3].trim().trim_start_matches("0x"), 16).map_err(|_| DidError::ParseError(format!("bad purposes: {}", parts[3])))?;
    Ok(VerificationMethod { id: parts[0].to_string(), key: PublicKey::new(key_type, bytes)?, purposes })
}
