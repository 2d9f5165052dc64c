//! ArtyPacks converter backend entry point

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use artypacks_converter::{
    config::{Args, StorageMode},
    convert::ConversionPipeline,
    db::{MongoClient, ProvenanceStore},
    delivery::{DeliverySink, LocalDiskSink, ObjectStoreSink},
    license::{HttpLicenseGate, LicenseGate},
    server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("artypacks_converter={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  ArtyPacks Converter Backend");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Storage: {:?}", args.storage_mode);
    info!("Min stamp: {}px", args.min_stamp_px);
    info!("Upload cap: {} MB ({} MB unpacked)", args.max_upload_mb, args.max_unpacked_mb);
    info!("Recovery window: {}h (limit {})", args.recovery_window_hours, args.recovery_limit);
    info!("MongoDB: {}", args.mongodb_uri);
    info!("======================================");

    // Connect to MongoDB (optional in dev mode)
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => Some(client),
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, continuing without): {}", e);
                None
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Provenance store over the conversions collection
    let provenance = match mongo {
        Some(ref client) => match ProvenanceStore::new(client).await {
            Ok(store) => Some(store),
            Err(e) => {
                if args.dev_mode {
                    warn!("Provenance store unavailable (dev mode, continuing): {}", e);
                    None
                } else {
                    error!("Provenance store setup failed: {}", e);
                    std::process::exit(1);
                }
            }
        },
        None => None,
    };

    // License gate - required in production, permissive stub has no place
    // here so dev mode without a URL still talks to whatever is configured
    let gate: Arc<dyn LicenseGate> = match (&args.license_api_url, &args.license_service_key) {
        (Some(url), Some(key)) => Arc::new(HttpLicenseGate::new(url, key)),
        _ => {
            // validate() guarantees this only happens in dev mode
            warn!("No license service configured (dev mode) - every conversion will be denied");
            Arc::new(HttpLicenseGate::new("http://localhost:9", "dev-unset"))
        }
    };

    // Delivery sink
    let mut local_sink: Option<Arc<LocalDiskSink>> = None;
    let sink: Arc<dyn DeliverySink> = match args.storage_mode {
        StorageMode::Local => {
            let disk = Arc::new(LocalDiskSink::new(&args.storage_dir, &args.public_base_url));
            info!("Local delivery sink at {} (served at /downloads)", args.storage_dir);
            local_sink = Some(Arc::clone(&disk));
            disk
        }
        StorageMode::Object => {
            let base = args
                .license_api_url
                .clone()
                .expect("validated: object mode requires LICENSE_API_URL");
            let key = args.license_service_key.clone().unwrap_or_default();
            info!("Object-store delivery sink (bucket: {})", args.storage_bucket);
            Arc::new(ObjectStoreSink::new(&base, &args.storage_bucket, &key))
        }
    };

    // Assemble the pipeline with its collaborators injected
    let pipeline = Arc::new(ConversionPipeline::new(
        Arc::clone(&gate),
        sink,
        provenance.clone(),
        &args.brand_prefix,
        args.min_stamp_px,
        args.max_unpacked_bytes(),
    ));

    let state = Arc::new(server::AppState::new(
        args, pipeline, gate, provenance, local_sink,
    ));

    // Run the server
    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
