use crate::config::{AppConfig, HTTPConfig};
use crate::http::create_app;
use crate::relay::Relay;
use crate::TracingReloadHandle;
use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[cfg(feature = "sentry")]
pub type SentryGuard = Option<sentry::ClientInitGuard>;

#[cfg(not(feature = "sentry"))]
pub type SentryGuard = Option<()>;

pub struct AppHandles {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    _sentry_guard: SentryGuard,
}
impl AppHandles {
    pub async fn new(
        config: AppConfig,
        tracing_reload: TracingReloadHandle,
        _sentry_guard: SentryGuard,
    ) -> Result<AppHandles> {
        let mut tasks = Vec::new();

        // One shared outbound client for both the completion API and the gateway.
        let http_client = config.http_client.build_client()?;
        let relay = Arc::new(Relay::new(&config, http_client));

        let http_handle = Self::start_http_server(
            config.http,
            config.credentials.http_auth_token,
            relay,
            _sentry_guard.is_some(),
            tracing_reload,
        );
        tasks.push(("HTTP Server", http_handle));

        Ok(AppHandles {
            tasks,
            _sentry_guard,
        })
    }

    /// Runs until any task exits or a shutdown signal is received.
    pub async fn run(self) {
        let futures: Vec<_> = self
            .tasks
            .into_iter()
            .map(|(name, handle)| {
                info!("Starting task: {name}");
                Box::pin(async move {
                    match handle.await {
                        Ok(_) => error!("{name} task completed!"),
                        Err(e) => error!("{name} task failed: {e:?}!"),
                    }
                })
            })
            .collect();

        // All handles are boxed, so when dropped they are cancelled.
        tokio::select! {
            (_, _, remaining) = futures::future::select_all(futures) => drop(remaining),
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("Received shutdown signal, stopping"),
                Err(e) => error!("Failed to listen for shutdown signal: {e}"),
            },
        }
    }

    fn start_http_server(
        config: HTTPConfig,
        http_auth_token: Option<String>,
        relay: Arc<Relay>,
        sentry_enabled: bool,
        tracing_reload: TracingReloadHandle,
    ) -> JoinHandle<()> {
        let app = create_app(
            &config,
            http_auth_token,
            relay,
            sentry_enabled,
            tracing_reload,
        );

        tokio::spawn(async move {
            if let Err(e) = Self::serve(config, app).await {
                error!("Server error: {e:?}");
            }
        })
    }

    async fn serve(config: HTTPConfig, app: axum::Router) -> Result<()> {
        let address = config.address;
        match config.tls {
            Some(_tls_config) => {
                #[cfg(any(feature = "tls-rustls", feature = "tls-native"))]
                {
                    info!("Starting HTTPS (secure) server on {address}");

                    #[cfg(feature = "tls-rustls")]
                    {
                        let _ = rustls::crypto::CryptoProvider::install_default(
                            rustls::crypto::aws_lc_rs::default_provider(),
                        );
                        let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                            &_tls_config.certificate_path,
                            &_tls_config.key_path,
                        )
                        .await?;
                        axum_server::bind_rustls(address, tls)
                            .serve(app.into_make_service())
                            .await?;
                    }

                    #[cfg(all(feature = "tls-native", not(feature = "tls-rustls")))]
                    {
                        let tls = axum_server::tls_openssl::OpenSSLConfig::from_pem_file(
                            &_tls_config.certificate_path,
                            &_tls_config.key_path,
                        )?;
                        axum_server::bind_openssl(address, tls)
                            .serve(app.into_make_service())
                            .await?;
                    }

                    Ok(())
                }

                #[cfg(not(any(feature = "tls-rustls", feature = "tls-native")))]
                Err(anyhow::anyhow!(
                    "HTTP Server TLS configuration provided but no TLS features enabled. Compile with a TLS backend feature!"
                ))
            }
            None => {
                info!("Starting HTTP (insecure) server on {address}");
                axum_server::bind(address)
                    .serve(app.into_make_service())
                    .await?;
                Ok(())
            }
        }
    }
}
