//! Source RCON client.
//!
//! Wire format, little endian: `size: i32` (bytes after this field),
//! `id: i32`, `type: i32`, body, then two NUL bytes. One connection is
//! opened per command: authenticate, execute, read one response.

use crate::capabilities::RemoteConsole;
use crate::config_store::ConfigStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use ark_common::config::PathsConfig;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tokio::time;
use tracing::{debug, info, warn};

pub const SERVERDATA_AUTH: i32 = 3;
pub const SERVERDATA_AUTH_RESPONSE: i32 = 2;
pub const SERVERDATA_EXECCOMMAND: i32 = 2;
pub const SERVERDATA_RESPONSE_VALUE: i32 = 0;

/// Largest packet accepted from the server
const MAX_PACKET_SIZE: i32 = 4096 + 10;
const MIN_PACKET_SIZE: i32 = 10;
const RCON_TIMEOUT: Duration = Duration::from_secs(10);

const AUTH_ID: i32 = 1;
const COMMAND_ID: i32 = 2;

#[derive(Debug, Error)]
pub enum RconError {
    #[error("RCON I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid RCON packet size {0}")]
    InvalidSize(i32),

    #[error("RCON packet is missing its terminator")]
    MissingTerminator,

    #[error("RCON authentication failed")]
    AuthFailed,

    #[error("RCON credentials not available")]
    NoCredentials,
}

/// A single RCON packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub kind: i32,
    pub body: String,
}

impl Packet {
    pub fn new(id: i32, kind: i32, body: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let body = self.body.as_bytes();
        let size = (4 + 4 + body.len() + 2) as i32;
        let mut buf = Vec::with_capacity(size as usize + 4);
        buf.extend_from_slice(&size.to_le_bytes());
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.kind.to_le_bytes());
        buf.extend_from_slice(body);
        buf.extend_from_slice(&[0, 0]);
        buf
    }

    /// Read one packet from the stream
    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self, RconError> {
        let size = reader.read_i32_le().await?;
        if !(MIN_PACKET_SIZE..=MAX_PACKET_SIZE).contains(&size) {
            return Err(RconError::InvalidSize(size));
        }

        let mut payload = vec![0u8; size as usize];
        reader.read_exact(&mut payload).await?;

        let id = i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let kind = i32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);
        let body = &payload[8..];
        if !body.ends_with(&[0, 0]) {
            return Err(RconError::MissingTerminator);
        }
        let body = String::from_utf8_lossy(&body[..body.len() - 2]).into_owned();

        Ok(Self { id, kind, body })
    }

    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<(), RconError> {
        writer.write_all(&self.encode()).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Authenticate on an open stream, then run `command`
pub async fn exchange<S>(stream: &mut S, password: &str, command: &str) -> Result<String, RconError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    Packet::new(AUTH_ID, SERVERDATA_AUTH, password)
        .write_to(stream)
        .await?;

    // Servers send an empty RESPONSE_VALUE ahead of the auth response
    loop {
        let reply = Packet::read_from(stream).await?;
        if reply.kind != SERVERDATA_AUTH_RESPONSE {
            continue;
        }
        if reply.id == -1 {
            return Err(RconError::AuthFailed);
        }
        break;
    }

    Packet::new(COMMAND_ID, SERVERDATA_EXECCOMMAND, command)
        .write_to(stream)
        .await?;
    loop {
        let reply = Packet::read_from(stream).await?;
        if reply.kind == SERVERDATA_RESPONSE_VALUE && reply.id == COMMAND_ID {
            return Ok(reply.body);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RconCredentials {
    pub port: u16,
    pub password: String,
}

/// Read `RCONPort` and `ServerAdminPassword` from the `[ServerSettings]`
/// section of GameUserSettings.ini
pub fn parse_rcon_credentials(ini: &str) -> Option<RconCredentials> {
    let mut in_section = false;
    let mut port = None;
    let mut password = None;

    for line in ini.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            in_section = line[1..line.len() - 1].trim().eq_ignore_ascii_case("ServerSettings");
            continue;
        }
        if !in_section {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            k if k.eq_ignore_ascii_case("RCONPort") => port = value.parse::<u16>().ok(),
            k if k.eq_ignore_ascii_case("ServerAdminPassword") => {
                password = Some(value.to_string())
            }
            _ => {}
        }
    }

    match (port, password) {
        (Some(port), Some(password)) if port != 0 && !password.is_empty() => {
            Some(RconCredentials { port, password })
        }
        _ => None,
    }
}

/// RemoteConsole over TCP, credentials cached from the live ini
pub struct RconConsole {
    config: Arc<ConfigStore>,
    credentials: RwLock<Option<RconCredentials>>,
}

impl RconConsole {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self {
            config,
            credentials: RwLock::new(None),
        }
    }

    /// Re-read credentials from the live GameUserSettings.ini
    pub async fn refresh(&self, paths: &PathsConfig) {
        let path = paths.live_game_user_settings();
        let credentials = match tokio::fs::read_to_string(&path).await {
            Ok(text) => parse_rcon_credentials(&text),
            Err(e) => {
                debug!("Could not read {}: {}", path.display(), e);
                None
            }
        };

        match &credentials {
            Some(c) => info!("RCON credentials loaded (port {})", c.port),
            None => warn!("No RCON credentials in {}", path.display()),
        }
        *self.credentials.write().await = credentials;
    }

    async fn run(&self, command: &str) -> Result<String, RconError> {
        let credentials = self
            .credentials
            .read()
            .await
            .clone()
            .ok_or(RconError::NoCredentials)?;
        let host = self.config.snapshot().process.rcon_host.clone();

        let mut stream = TcpStream::connect((host.as_str(), credentials.port)).await?;
        exchange(&mut stream, &credentials.password, command).await
    }
}

#[async_trait]
impl RemoteConsole for RconConsole {
    async fn execute(&self, command: &str) -> Result<String> {
        debug!("RCON: {}", command);
        let response = time::timeout(RCON_TIMEOUT, self.run(command))
            .await
            .context("RCON command timed out")??;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let bytes = Packet::new(7, SERVERDATA_EXECCOMMAND, "saveworld").encode();
        assert_eq!(bytes.len(), 4 + 4 + 4 + 9 + 2);
        assert_eq!(&bytes[0..4], &(19i32).to_le_bytes());
        assert_eq!(&bytes[4..8], &7i32.to_le_bytes());
        assert_eq!(&bytes[8..12], &2i32.to_le_bytes());
        assert_eq!(&bytes[12..21], b"saveworld");
        assert_eq!(&bytes[21..], &[0, 0]);
    }

    #[tokio::test]
    async fn test_read_rejects_bad_size() {
        let bytes = 3i32.to_le_bytes();
        let err = Packet::read_from(&mut &bytes[..]).await.unwrap_err();
        assert!(matches!(err, RconError::InvalidSize(3)));
    }

    #[tokio::test]
    async fn test_exchange_against_fake_server() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        let server_task = tokio::spawn(async move {
            let auth = Packet::read_from(&mut server).await.unwrap();
            assert_eq!(auth.kind, SERVERDATA_AUTH);
            assert_eq!(auth.body, "hunter2");
            Packet::new(auth.id, SERVERDATA_RESPONSE_VALUE, "")
                .write_to(&mut server)
                .await
                .unwrap();
            Packet::new(auth.id, SERVERDATA_AUTH_RESPONSE, "")
                .write_to(&mut server)
                .await
                .unwrap();

            let exec = Packet::read_from(&mut server).await.unwrap();
            assert_eq!(exec.body, "saveworld");
            Packet::new(exec.id, SERVERDATA_RESPONSE_VALUE, "World Saved")
                .write_to(&mut server)
                .await
                .unwrap();
        });

        let response = exchange(&mut client, "hunter2", "saveworld").await.unwrap();
        assert_eq!(response, "World Saved");
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_exchange_auth_failure() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        tokio::spawn(async move {
            let _auth = Packet::read_from(&mut server).await.unwrap();
            Packet::new(-1, SERVERDATA_AUTH_RESPONSE, "")
                .write_to(&mut server)
                .await
                .unwrap();
        });

        let err = exchange(&mut client, "wrong", "saveworld").await.unwrap_err();
        assert!(matches!(err, RconError::AuthFailed));
    }

    #[test]
    fn test_parse_credentials() {
        let ini = "[SessionSettings]\nRCONPort=1\n\n[ServerSettings]\nRCONEnabled=True\nRCONPort=27020\nServerAdminPassword=hunter2\n";
        let creds = parse_rcon_credentials(ini).unwrap();
        assert_eq!(creds.port, 27020);
        assert_eq!(creds.password, "hunter2");
    }

    #[test]
    fn test_parse_credentials_missing_password() {
        let ini = "[ServerSettings]\nRCONPort=27020\n";
        assert!(parse_rcon_credentials(ini).is_none());
    }

    #[test]
    fn test_parse_credentials_wrong_section() {
        let ini = "[Other]\nRCONPort=27020\nServerAdminPassword=x\n";
        assert!(parse_rcon_credentials(ini).is_none());
    }
}
