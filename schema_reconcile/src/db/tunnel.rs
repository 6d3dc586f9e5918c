//! SSH tunnel
//!
//! Opens an SSH session and forwards a loopback listener through
//! `direct-tcpip` channels to the database host, so the MySQL driver can
//! connect to `127.0.0.1:<local port>` as if the server were local.
//! Any host key is accepted.

use async_trait::async_trait;
use russh::client;
use russh_keys::key;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::config::EndpointConfig;
use crate::error::{Error, Result};

/// Session handler that trusts every server key
struct AcceptAnyHostKey;

#[async_trait]
impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}

type SessionHandle = Arc<client::Handle<AcceptAnyHostKey>>;

/// A running tunnel; dropped connections are re-forwarded on demand
pub struct SshTunnel {
    local_addr: SocketAddr,
    session: SessionHandle,
    forwarder: JoinHandle<()>,
}

impl fmt::Debug for SshTunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshTunnel")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

impl SshTunnel {
    /// Authenticate against the SSH host and start forwarding
    pub async fn open(config: &EndpointConfig) -> Result<Self> {
        let host = config
            .ssh_host()
            .ok_or_else(|| Error::ConfigError("ssh mode requires `host`".to_string()))?;
        let user = config
            .ssh_user()
            .ok_or_else(|| Error::ConfigError("ssh mode requires `user`".to_string()))?;
        let port = config.ssh_port();

        let ssh_config = Arc::new(client::Config::default());
        let mut session = client::connect(ssh_config, (host, port), AcceptAnyHostKey)
            .await
            .map_err(|e| Error::ConnectionError(format!("ssh {}:{}: {}", host, port, e)))?;

        let authenticated = if let Some(key_path) = config.private_key_path() {
            let key_pair = russh_keys::load_secret_key(&key_path, None).map_err(|e| {
                Error::ConnectionError(format!(
                    "loading private key {}: {}",
                    key_path.display(),
                    e
                ))
            })?;
            session.authenticate_publickey(user, Arc::new(key_pair)).await
        } else {
            let password = config.ssh_password().unwrap_or_default();
            session.authenticate_password(user, password).await
        }
        .map_err(|e| Error::ConnectionError(format!("ssh authentication: {}", e)))?;

        if !authenticated {
            return Err(Error::ConnectionError(format!(
                "ssh authentication rejected for {}@{}:{}",
                user, host, port
            )));
        }

        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let local_addr = listener.local_addr()?;
        let session = Arc::new(session);

        let forwarder = tokio::spawn(forward(
            listener,
            Arc::clone(&session),
            config.db_host.clone(),
            config.database_port(),
        ));

        tracing::info!(
            ssh_host = host,
            ssh_port = port,
            %local_addr,
            db_host = %config.db_host,
            db_port = config.database_port(),
            "SSH tunnel established"
        );

        Ok(Self {
            local_addr,
            session,
            forwarder,
        })
    }

    /// Loopback address the database driver should connect to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and disconnect the session
    pub async fn close(self) {
        self.forwarder.abort();
        if let Err(e) = self
            .session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
        {
            tracing::debug!(error = %e, "SSH disconnect failed");
        }
    }
}

async fn forward(listener: TcpListener, session: SessionHandle, db_host: String, db_port: u16) {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "SSH tunnel listener failed");
                break;
            }
        };

        let session = Arc::clone(&session);
        let db_host = db_host.clone();
        tokio::spawn(async move {
            if let Err(e) = pipe(socket, peer, &session, &db_host, db_port).await {
                tracing::warn!(error = %e, %peer, "SSH forwarding ended with an error");
            }
        });
    }
}

async fn pipe(
    mut socket: TcpStream,
    peer: SocketAddr,
    session: &client::Handle<AcceptAnyHostKey>,
    db_host: &str,
    db_port: u16,
) -> Result<()> {
    let channel = session
        .channel_open_direct_tcpip(
            db_host,
            u32::from(db_port),
            peer.ip().to_string(),
            u32::from(peer.port()),
        )
        .await
        .map_err(|e| {
            Error::ConnectionError(format!("opening channel to {}:{}: {}", db_host, db_port, e))
        })?;

    let mut stream = Box::pin(channel.into_stream());
    tokio::io::copy_bidirectional(&mut socket, &mut stream).await?;
    Ok(())
}
