use std::sync::Arc;

use mailscan::config::{PipelineConfig, StorageBackend};
use mailscan::mail::{Mailer, SmtpMailer};
use mailscan::ocr::{HttpRecognizer, TextRecognizer};
use mailscan::pipeline::{EmailDecomposer, ImageConverter};
use mailscan::server::event_routes;
use mailscan::storage::{MemoryStorage, ObjectStorage, S3Storage};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = PipelineConfig::from_env()?;

    eprintln!("📬 Mailscan v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Listen: http://{}", config.listen_addr);
    eprintln!("   OCR: {}", config.ocr_endpoint);
    eprintln!("   SMTP: {}:{}", config.smtp_host, config.smtp_port);
    eprintln!("   From: {}", config.from_address);
    eprintln!("   Storage: {:?}\n", config.storage_backend);

    // ── Storage ──────────────────────────────────────────────────────────
    let storage: Arc<dyn ObjectStorage> = match config.storage_backend {
        StorageBackend::S3 => Arc::new(S3Storage::new(
            config.storage_region.clone(),
            config.storage_endpoint.clone(),
        )),
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
    };

    // ── Recognition + delivery ───────────────────────────────────────────
    let recognizer: Arc<dyn TextRecognizer> = Arc::new(HttpRecognizer::new(
        config.ocr_endpoint.clone(),
        config.ocr_api_key.clone(),
    ));
    let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::new(
        &config.smtp_host,
        config.smtp_port,
        config.smtp_username.clone(),
        &config.smtp_password,
    )?);

    // ── Pipeline stages ──────────────────────────────────────────────────
    let decomposer = Arc::new(EmailDecomposer::new(Arc::clone(&storage)));
    let converter = Arc::new(ImageConverter::new(
        storage,
        recognizer,
        mailer,
        config.from_address.clone(),
    ));

    let app = event_routes(decomposer, converter);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "Event endpoints started");
    axum::serve(listener, app).await?;

    Ok(())
}
