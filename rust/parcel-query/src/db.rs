//! Connection pool for the parcel database.

use crate::config::AppConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bb8::{ManageConnection, Pool};
use diesel_async::{AsyncPgConnection, SimpleAsyncConnection};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};
use std::fs::File;
use std::io::BufReader;
use tokio_postgres::{Config as PgConfig, NoTls};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{info, warn};

pub type PgPool = Pool<PgConnectionManager>;

#[derive(Debug, Clone, Default)]
pub struct TlsFiles {
    pub root_cert: Option<String>,
    pub client_cert: Option<String>,
    pub client_key: Option<String>,
}

impl TlsFiles {
    fn from_config(config: &AppConfig) -> Self {
        Self {
            root_cert: config.pg_ssl_root_cert.clone(),
            client_cert: config.pg_ssl_cert.clone(),
            client_key: config.pg_ssl_key.clone(),
        }
    }
}

pub async fn connect_pool(config: &AppConfig) -> Result<PgPool> {
    let manager =
        PgConnectionManager::new(&config.database_url, &TlsFiles::from_config(config))?;
    let pool = Pool::builder()
        .max_size(config.max_pool_size)
        .build(manager)
        .await
        .context("failed to build PostgreSQL connection pool")?;

    // The service still starts when the database is down; each request reports its own failure.
    match pool.get().await {
        Ok(_) => info!("database connectivity check succeeded"),
        Err(err) => warn!(error = ?err, "initial database connectivity check failed"),
    }

    Ok(pool)
}

#[derive(Clone)]
pub struct PgConnectionManager {
    config: PgConfig,
    tls: Option<MakeRustlsConnect>,
}

impl PgConnectionManager {
    fn new(database_url: &str, tls: &TlsFiles) -> Result<Self> {
        let config = database_url
            .parse::<PgConfig>()
            .context("invalid database URL")?;
        let tls = tls
            .root_cert
            .as_deref()
            .map(|root| {
                build_tls_connector(root, tls.client_cert.as_deref(), tls.client_key.as_deref())
            })
            .transpose()?;
        Ok(Self { config, tls })
    }
}

#[async_trait]
impl ManageConnection for PgConnectionManager {
    type Connection = AsyncPgConnection;
    type Error = anyhow::Error;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let conn = match &self.tls {
            None => {
                let (client, connection) = self.config.connect(NoTls).await?;
                AsyncPgConnection::try_from_client_and_connection(client, connection).await
            }
            Some(connector) => {
                let (client, connection) = self.config.connect(connector.clone()).await?;
                AsyncPgConnection::try_from_client_and_connection(client, connection).await
            }
        };
        conn.map_err(|err| anyhow::anyhow!(err))
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.batch_execute("SELECT 1").await?;
        Ok(())
    }

    fn has_broken(&self, _: &mut Self::Connection) -> bool {
        false
    }
}

fn build_tls_connector(
    root_cert: &str,
    client_cert: Option<&str>,
    client_key: Option<&str>,
) -> Result<MakeRustlsConnect> {
    let mut roots = RootCertStore::empty();
    for cert in read_certs(root_cert)? {
        roots
            .add(cert)
            .map_err(|_| anyhow::anyhow!("invalid certificate in {root_cert}"))?;
    }

    let builder = ClientConfig::builder().with_root_certificates(roots);
    let tls_config = match (client_cert, client_key) {
        (None, None) => builder.with_no_client_auth(),
        (Some(cert), Some(key)) => builder
            .with_client_auth_cert(read_certs(cert)?, read_key(key)?)
            .context("failed to build client TLS config")?,
        _ => anyhow::bail!("PGSSLCERT and PGSSLKEY must both be set (or neither)"),
    };

    Ok(MakeRustlsConnect::new(tls_config))
}

fn read_certs(path: &str) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = BufReader::new(
        File::open(path).with_context(|| format!("failed to open certificate file '{path}'"))?,
    );
    let chain = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("failed to parse certificates in '{path}'"))?;

    if chain.is_empty() {
        anyhow::bail!("'{path}' contained no certificates");
    }
    Ok(chain)
}

fn read_key(path: &str) -> Result<PrivateKeyDer<'static>> {
    let mut reader = BufReader::new(
        File::open(path).with_context(|| format!("failed to open key file '{path}'"))?,
    );
    rustls_pemfile::private_key(&mut reader)
        .with_context(|| format!("failed to parse private key in '{path}'"))?
        .with_context(|| format!("'{path}' contained no private keys"))
}
