//! Server module for running Terraform providers
//!
//! Terraform launches the provider binary, reads a single handshake line from
//! its stdout and then talks gRPC to the advertised address. When Terraform
//! passes its own client certificate in `PLUGIN_CLIENT_CERT` the connection is
//! mutually authenticated: the server generates a throwaway certificate,
//! trusts only the client's certificate, and advertises its own certificate
//! in the handshake.

use crate::context::Context;
use crate::error::{Result, TfplugError};
use crate::grpc::{GrpcControllerService, GrpcProviderServer};
use crate::proto::plugin::grpc_controller_server::GrpcControllerServer;
use crate::proto::ProviderServer;
use crate::provider::Provider;
use base64::Engine;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose,
};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Certificate, Identity, Server, ServerTlsConfig};
use tracing::{debug, info, warn};

const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";
const CLIENT_CERT_ENV: &str = "PLUGIN_CLIENT_CERT";
const CORE_PROTOCOL_VERSION: u32 = 1;
const PROTOCOL_VERSION: u32 = 6;

/// Log level for the server
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Level requested through TF_LOG_PROVIDER, falling back to TF_LOG
    pub fn from_env() -> Option<Self> {
        ["TF_LOG_PROVIDER", "TF_LOG"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find_map(|value| Self::parse(&value))
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TRACE" | "JSON" => Some(LogLevel::Trace),
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARN" => Some(LogLevel::Warn),
            "ERROR" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Server configuration for running a Terraform provider
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// PEM certificate served instead of a generated one. Mostly for
    /// debugging with a locally trusted certificate.
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    /// Maximum message size in bytes
    pub max_message_size: usize,
    pub enable_logging: bool,
    /// Used when neither TF_LOG_PROVIDER nor TF_LOG names a level
    pub log_level: LogLevel,
    /// How long in-flight calls may run after Terraform asks for shutdown
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cert_path: None,
            key_path: None,
            max_message_size: 256 << 20, // 256MB
            enable_logging: true,
            log_level: LogLevel::Info,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cert_path(mut self, path: PathBuf) -> Self {
        self.cert_path = Some(path);
        self
    }

    pub fn with_key_path(mut self, path: PathBuf) -> Self {
        self.key_path = Some(path);
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn without_logging(mut self) -> Self {
        self.enable_logging = false;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// TLS settings resolved from the environment and ServerConfig
struct TlsSetup {
    config: ServerTlsConfig,
    /// base64 DER certificate for the handshake line, AutoMTLS only
    handshake_cert: Option<String>,
}

/// Main entry point for running a provider
pub async fn serve<P: Provider + 'static>(provider: P, config: ServerConfig) -> Result<()> {
    if config.enable_logging {
        init_logging(LogLevel::from_env().unwrap_or(config.log_level));
    }

    if std::env::var(MAGIC_COOKIE_KEY).as_deref() != Ok(MAGIC_COOKIE_VALUE) {
        return Err(TfplugError::NotLaunchedByTerraform);
    }

    // another component may have installed a provider already
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let stop = Context::new();
    let shutdown = Context::new();

    let grpc_server = GrpcProviderServer::new(provider, stop.clone()).await;
    let provider_service = ProviderServer::new(grpc_server)
        .max_decoding_message_size(config.max_message_size)
        .max_encoding_message_size(config.max_message_size);
    let controller = GrpcControllerServer::new(GrpcControllerService::new(shutdown.clone()));

    let tls = resolve_tls(&config).await?;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let mut builder = Server::builder();
    let mut handshake = format!("{}|{}|tcp|{}|grpc", CORE_PROTOCOL_VERSION, PROTOCOL_VERSION, addr);
    match tls {
        Some(tls) => {
            builder = builder.tls_config(tls.config)?;
            if let Some(cert) = tls.handshake_cert {
                handshake.push('|');
                handshake.push_str(&cert);
            }
        }
        None => warn!("serving without TLS"),
    }

    println!("{}", handshake);
    std::io::stdout().flush()?;
    info!(%addr, "provider server started");

    tokio::spawn(ignore_interrupts());

    let shutdown_signal = {
        let shutdown = shutdown.clone();
        async move { shutdown.cancelled().await }
    };
    let server = builder
        .add_service(provider_service)
        .add_service(controller)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown_signal);
    tokio::pin!(server);

    let grace = async {
        shutdown.cancelled().await;
        tokio::time::sleep(config.shutdown_timeout).await;
    };

    tokio::select! {
        result = &mut server => {
            result?;
            info!("provider server stopped");
        }
        _ = grace => {
            warn!(timeout = ?config.shutdown_timeout, "graceful shutdown timed out");
        }
    }

    Ok(())
}

/// Convenience function to run a provider with default configuration
pub async fn serve_default<P: Provider + 'static>(provider: P) -> Result<()> {
    serve(provider, ServerConfig::default()).await
}

fn init_logging(level: LogLevel) {
    // stdout carries the handshake, so logs must go to stderr
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::from(level))
        .with_ansi(false)
        .try_init();
}

/// Terraform forwards interrupts itself through StopProvider
async fn ignore_interrupts() {
    while tokio::signal::ctrl_c().await.is_ok() {
        debug!("ignoring interrupt, terraform manages the plugin lifecycle");
    }
}

async fn resolve_tls(config: &ServerConfig) -> Result<Option<TlsSetup>> {
    if let (Some(cert_path), Some(key_path)) = (&config.cert_path, &config.key_path) {
        let cert = tokio::fs::read(cert_path)
            .await
            .map_err(|e| TfplugError::TlsError(format!("Failed to read certificate: {}", e)))?;
        let key = tokio::fs::read(key_path)
            .await
            .map_err(|e| TfplugError::TlsError(format!("Failed to read key: {}", e)))?;

        return Ok(Some(TlsSetup {
            config: ServerTlsConfig::new().identity(Identity::from_pem(cert, key)),
            handshake_cert: None,
        }));
    }

    match std::env::var(CLIENT_CERT_ENV) {
        Ok(client_cert) if !client_cert.trim().is_empty() => {
            let generated = generate_server_cert()?;
            let config = ServerTlsConfig::new()
                .identity(Identity::from_pem(generated.cert_pem, generated.key_pem))
                .client_ca_root(Certificate::from_pem(client_cert));
            Ok(Some(TlsSetup {
                config,
                handshake_cert: Some(generated.cert_der_base64),
            }))
        }
        _ => Ok(None),
    }
}

struct GeneratedCert {
    cert_pem: String,
    key_pem: String,
    cert_der_base64: String,
}

/// Self-signed certificate for a single plugin process; Terraform pins it
/// from the handshake rather than validating a chain
fn generate_server_cert() -> Result<GeneratedCert> {
    let mut params = CertificateParams::new(vec!["localhost".to_string()])?;
    params
        .distinguished_name
        .push(DnType::OrganizationName, "HashiCorp");
    params.distinguished_name.push(DnType::CommonName, "localhost");
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
        KeyUsagePurpose::KeyCertSign,
    ];
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ServerAuth,
        ExtendedKeyUsagePurpose::ClientAuth,
    ];

    let key = KeyPair::generate()?;
    let cert = params.self_signed(&key)?;

    Ok(GeneratedCert {
        cert_pem: cert.pem(),
        key_pem: key.serialize_pem(),
        cert_der_base64: base64::engine::general_purpose::STANDARD_NO_PAD.encode(cert.der()),
    })
}
