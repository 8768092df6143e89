//! Toolstream Ingress gRPC Server
//!
//! Entry point for the publish side of the broker. Wires together the
//! metadata store client, the payload store, the publish coordinator, the
//! TTL sweeper, and the optional JWT auth gate, then serves the
//! IngressService with gRPC reflection and graceful shutdown.
//!
//! Configuration comes from an optional YAML file (`--config path` or
//! `TOOLSTREAM_CONFIG`) overlaid with environment variables; see the
//! toolstream-config crate for the full list.

use std::sync::Arc;

use tokio::sync::oneshot;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::Server;

use toolstream_auth::{AuthInterceptor, JwtValidator};
use toolstream_config::SecretsClient;
use toolstream_ingress::{IngressHandler, PublishCoordinator, TtlSweeper};
use toolstream_metadata::{MetadataStore, RemoteMetadataStore};
use toolstream_proto::toolstream::ingress_service_server::IngressServiceServer;
use toolstream_storage::{ObjectStorage, PayloadStore, S3Config};

const DEFAULT_PORT: u16 = 50051;
// Large payloads travel inline; 1 GiB on both directions.
const MAX_MESSAGE_SIZE: usize = 1024 * 1024 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path_from_args();
    let mut config = toolstream_config::load(config_path.as_deref(), DEFAULT_PORT)?;
    toolstream_config::init_logging(&config.logger)?;

    tracing::info!(port = config.server.port, "starting toolstream ingress");

    let secrets = SecretsClient::new(&config.secrets)?;
    if let Some(secrets) = &secrets {
        tracing::info!("loading secrets");
        toolstream_config::apply_secrets(&mut config, secrets).await?;
    }

    tracing::info!(address = %config.metadata_store.address, "connecting to metadata store");
    let metadata: Arc<dyn MetadataStore> = Arc::new(
        RemoteMetadataStore::connect(
            &config.metadata_store.address,
            &config.metadata_store.user,
            &config.metadata_store.password,
            config.metadata_store.timeout(),
        )
        .await?,
    );
    metadata.ping().await?;
    tracing::info!("metadata store reachable");

    let payloads: Arc<dyn ObjectStorage> = if std::env::var("USE_LOCAL_STORAGE").is_ok() {
        let root = std::env::var("LOCAL_STORAGE_PATH")
            .unwrap_or_else(|_| "./data/storage".to_string());
        tracing::info!(root = %root, "using local payload storage");
        Arc::new(PayloadStore::local(
            std::path::Path::new(&root),
            &config.object_store.bucket_name,
        )?)
    } else {
        tracing::info!(
            endpoint = %config.object_store.endpoint,
            bucket = %config.object_store.bucket_name,
            "connecting to object store"
        );
        Arc::new(PayloadStore::s3(&S3Config {
            endpoint: config.object_store.endpoint.clone(),
            access_key_id: config.object_store.access_key_id.clone(),
            secret_access_key: config.object_store.secret_access_key.clone(),
            use_ssl: config.object_store.use_ssl,
            bucket_name: config.object_store.bucket_name.clone(),
        })?)
    };
    payloads.ensure_bucket().await?;
    tracing::info!("object store bucket ready");

    let coordinator = Arc::new(PublishCoordinator::new(metadata.clone(), payloads.clone()));
    let handler = IngressHandler::new(coordinator);

    let (sweeper_tx, sweeper_rx) = oneshot::channel::<()>();
    let sweeper_handle = if config.ttl.enabled {
        let sweeper = Arc::new(TtlSweeper::new(
            metadata.clone(),
            payloads.clone(),
            config.ttl.clone(),
        ));
        Some(sweeper.start(sweeper_rx))
    } else {
        tracing::info!("ttl sweeper disabled");
        None
    };

    let interceptor = if config.auth.enabled {
        let secrets = secrets
            .as_ref()
            .ok_or("auth requires the secrets store for key material")?;
        let pem = secrets
            .get_key(&config.auth.jwt_secrets_path, "public_key")
            .await?;
        let validator = Arc::new(JwtValidator::from_rsa_pem(
            pem.as_bytes(),
            &config.auth.jwt_issuer,
        )?);
        tracing::info!(
            issuer = %config.auth.jwt_issuer,
            require_auth = config.auth.require_auth,
            "jwt authentication enabled"
        );
        Some(AuthInterceptor::new(validator, config.auth.require_auth))
    } else {
        tracing::info!("jwt authentication disabled");
        None
    };

    let reflection = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(toolstream_proto::FILE_DESCRIPTOR_SET)
        .build()?;

    let addr = format!("0.0.0.0:{}", config.server.port).parse()?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("received shutdown signal, initiating graceful shutdown");
        let _ = sweeper_tx.send(());
        let _ = shutdown_tx.send(());
    });

    let service = IngressServiceServer::new(handler)
        .max_decoding_message_size(MAX_MESSAGE_SIZE)
        .max_encoding_message_size(MAX_MESSAGE_SIZE);

    tracing::info!(%addr, "ingress server listening");

    match interceptor {
        Some(interceptor) => {
            Server::builder()
                .add_service(reflection)
                .add_service(InterceptedService::new(service, interceptor))
                .serve_with_shutdown(addr, async {
                    shutdown_rx.await.ok();
                })
                .await?
        }
        None => {
            Server::builder()
                .add_service(reflection)
                .add_service(service)
                .serve_with_shutdown(addr, async {
                    shutdown_rx.await.ok();
                })
                .await?
        }
    }

    // Let an in-flight sweep finish before dropping the store connection.
    if let Some(handle) = sweeper_handle {
        let _ = handle.await;
    }
    metadata.close().await?;

    tracing::info!("ingress server shut down gracefully");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn config_path_from_args() -> Option<String> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(path.to_string());
        }
    }
    std::env::var("TOOLSTREAM_CONFIG").ok()
}
