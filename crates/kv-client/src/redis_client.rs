//! Redis-protocol client backed by the `redis` crate.
//!
//! Data commands go through one multiplexed connection (cluster-aware for
//! [`Topology::Cluster`]). Server-level commands (`SCAN`, `INFO`) and
//! subscriptions open a direct connection to the endpoint they concern.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::cluster::ClusterClientBuilder;
use redis::cluster_async::ClusterConnection;
use redis::{
    Cmd, ConnectionAddr, ConnectionInfo, FromRedisValue, Pipeline, RedisConnectionInfo,
    RedisResult,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::{parse_endpoint, TargetConfig, Topology};
use crate::error::{ClientError, Result};
use crate::subscription::{ReceivedMessage, Subscription};
use crate::traits::{Connector, KvClient, ScanError, ScanOutcome, ServerInfo};

#[derive(Clone)]
enum KvConnection {
    Cluster(ClusterConnection),
    Single(MultiplexedConnection),
}

impl KvConnection {
    async fn query<T: FromRedisValue>(&mut self, cmd: &Cmd) -> RedisResult<T> {
        match self {
            KvConnection::Cluster(con) => cmd.query_async(con).await,
            KvConnection::Single(con) => cmd.query_async(con).await,
        }
    }

    async fn query_pipeline<T: FromRedisValue>(&mut self, pipe: &Pipeline) -> RedisResult<T> {
        match self {
            KvConnection::Cluster(con) => pipe.query_async(con).await,
            KvConnection::Single(con) => pipe.query_async(con).await,
        }
    }
}

/// Client for one Redis-protocol deployment.
pub struct RedisClient {
    config: TargetConfig,
    connection: RwLock<Option<KvConnection>>,
    /// Why the initial connection failed, when fail-fast is off.
    connect_error: Option<String>,
}

impl RedisClient {
    /// Connect to the target.
    ///
    /// With `fail_fast` an unreachable target is an error. Without it the
    /// client is still returned, and every operation fails with
    /// [`ClientError::NotConnected`].
    pub async fn connect(config: TargetConfig) -> Result<Self> {
        if config.endpoints.is_empty() {
            return Err(ClientError::InvalidEndpoint(format!(
                "no endpoints configured for target {}",
                config.name
            )));
        }

        debug!(
            "Connecting to {} ({}) at {}",
            config.name,
            config.topology,
            config.endpoint_list()
        );

        match open_connection(&config).await {
            Ok(connection) => {
                info!("{} {} connected.", config.name, config.topology);
                Ok(Self {
                    config,
                    connection: RwLock::new(Some(connection)),
                    connect_error: None,
                })
            }
            Err(e) if config.fail_fast => Err(e),
            Err(e) => {
                warn!(
                    "Could not connect to {}: {}. Continuing, operations will fail",
                    config.name, e
                );
                Ok(Self {
                    config,
                    connection: RwLock::new(None),
                    connect_error: Some(e.to_string()),
                })
            }
        }
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    fn connection(&self) -> Result<KvConnection> {
        let guard = self.connection.read().unwrap_or_else(|e| e.into_inner());
        guard.clone().ok_or_else(|| ClientError::NotConnected {
            target: self.config.name.clone(),
            reason: self
                .connect_error
                .clone()
                .unwrap_or_else(|| "connection closed".to_string()),
        })
    }

    fn cmd(&self, command: &str) -> Result<Cmd> {
        Ok(redis::cmd(&self.config.command_map.resolve(command)?))
    }

    fn set_cmd(&self, key: &str, value: &str) -> Result<Cmd> {
        let mut cmd = self.cmd("SET")?;
        cmd.arg(key).arg(value);
        Ok(cmd)
    }

    /// Endpoints holding data, each scanned once.
    ///
    /// For a cluster these are the masters reported by `CLUSTER NODES`, so
    /// nodes missing from the seed list are still reached and replicas are
    /// skipped. If discovery fails the configured endpoints are used.
    async fn data_endpoints(&self) -> Vec<String> {
        match self.config.topology {
            Topology::Standalone => self.config.endpoints[..1].to_vec(),
            Topology::Cluster => match self.cluster_masters().await {
                Ok(masters) if !masters.is_empty() => masters,
                Ok(_) => self.config.endpoints.clone(),
                Err(e) => {
                    warn!(
                        "Could not discover cluster nodes of {}, scanning configured endpoints: {}",
                        self.config.name, e
                    );
                    self.config.endpoints.clone()
                }
            },
        }
    }

    async fn cluster_masters(&self) -> Result<Vec<String>> {
        let mut con = self.connection()?;
        let mut cmd = self.cmd("CLUSTER")?;
        cmd.arg("NODES");
        let nodes: String = con.query(&cmd).await?;
        Ok(parse_cluster_masters(&nodes))
    }

    async fn endpoint_connection(&self, endpoint: &str) -> Result<MultiplexedConnection> {
        let client = redis::Client::open(connection_info(&self.config, endpoint)?)?;
        Ok(client.get_multiplexed_async_connection().await?)
    }

    async fn scan_endpoint(
        &self,
        endpoint: &str,
        pattern: &str,
        page_size: usize,
    ) -> Result<Vec<String>> {
        let mut con = self.endpoint_connection(endpoint).await?;
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let mut cmd = self.cmd("SCAN")?;
            cmd.arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(page_size);
            let (next, page): (u64, Vec<String>) = cmd.query_async(&mut con).await?;
            keys.extend(page);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(keys)
    }

    async fn endpoint_version(&self, endpoint: &str) -> Result<Option<String>> {
        let mut con = self.endpoint_connection(endpoint).await?;
        let mut cmd = self.cmd("INFO")?;
        cmd.arg("server");
        let info: String = cmd.query_async(&mut con).await?;
        Ok(parse_version(&info))
    }
}

async fn open_connection(config: &TargetConfig) -> Result<KvConnection> {
    match config.topology {
        Topology::Cluster => {
            let nodes = config
                .endpoints
                .iter()
                .map(|endpoint| connection_info(config, endpoint))
                .collect::<Result<Vec<_>>>()?;

            let mut builder = ClusterClientBuilder::new(nodes);
            if let Some(username) = &config.username {
                builder = builder.username(username.clone());
            }
            if let Some(password) = &config.password {
                builder = builder.password(password.clone());
            }
            let client = builder.build()?;
            Ok(KvConnection::Cluster(client.get_async_connection().await?))
        }
        Topology::Standalone => {
            let client = redis::Client::open(connection_info(config, &config.endpoints[0])?)?;
            Ok(KvConnection::Single(
                client.get_multiplexed_async_connection().await?,
            ))
        }
    }
}

fn connection_info(config: &TargetConfig, endpoint: &str) -> Result<ConnectionInfo> {
    let (host, port) = parse_endpoint(endpoint)?;
    Ok(ConnectionInfo {
        addr: ConnectionAddr::Tcp(host, port),
        redis: RedisConnectionInfo {
            db: 0,
            username: config.username.clone(),
            password: config.password.clone(),
            ..Default::default()
        },
    })
}

/// Addresses of the healthy masters in a `CLUSTER NODES` reply.
///
/// Each line reads `<id> <ip:port@cport[,hostname]> <flags> ...`.
fn parse_cluster_masters(nodes: &str) -> Vec<String> {
    let mut masters: Vec<String> = Vec::new();
    for line in nodes.lines() {
        let mut fields = line.split_whitespace();
        let (Some(_id), Some(address), Some(flags)) = (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };

        let flags: Vec<&str> = flags.split(',').collect();
        if !flags.contains(&"master")
            || flags
                .iter()
                .any(|f| matches!(*f, "fail" | "fail?" | "noaddr" | "handshake"))
        {
            continue;
        }

        let address = address.split('@').next().unwrap_or_default();
        let Some((host, port)) = address.rsplit_once(':') else {
            continue;
        };
        if host.is_empty() || port == "0" {
            continue;
        }
        let endpoint = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{port}")
        } else {
            address.to_string()
        };
        if !masters.contains(&endpoint) {
            masters.push(endpoint);
        }
    }
    masters
}

/// Pull the server version out of an `INFO server` reply.
fn parse_version(info: &str) -> Option<String> {
    info.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.ends_with("_version") && key != "gcc_version").then(|| value.trim().to_string())
    })
}

#[async_trait::async_trait]
impl KvClient for RedisClient {
    fn target(&self) -> &str {
        &self.config.name
    }

    async fn set(&self, key: &str, value: &str, expiry: Option<Duration>) -> Result<()> {
        let mut con = self.connection()?;
        let mut cmd = self.set_cmd(key, value)?;
        if let Some(ttl) = expiry {
            cmd.arg("PX").arg(ttl.as_millis() as u64);
        }
        let _: () = con.query(&cmd).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut con = self.connection()?;
        let mut cmd = self.cmd("GET")?;
        cmd.arg(key);
        Ok(con.query(&cmd).await?)
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        let mut con = self.connection()?;
        let mut cmd = self.cmd("HSET")?;
        cmd.arg(key);
        for (field, value) in fields {
            cmd.arg(field).arg(value);
        }
        let _: () = con.query(&cmd).await?;
        Ok(())
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<()> {
        let mut con = self.connection()?;
        let mut cmd = self.cmd("RPUSH")?;
        cmd.arg(key).arg(value);
        let _: () = con.query(&cmd).await?;
        Ok(())
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut con = self.connection()?;
        let mut cmd = self.cmd("ZADD")?;
        cmd.arg(key).arg(score).arg(member);
        let _: () = con.query(&cmd).await?;
        Ok(())
    }

    async fn batch_set(&self, entries: &[(String, String)]) -> Result<u64> {
        if entries.is_empty() {
            return Ok(0);
        }
        let mut con = self.connection()?;
        let mut pipe = redis::pipe();
        for (key, value) in entries {
            pipe.add_command(self.set_cmd(key, value)?).ignore();
        }
        let _: () = con.query_pipeline(&pipe).await?;
        Ok(entries.len() as u64)
    }

    async fn transaction_set(&self, entries: &[(String, String)]) -> Result<()> {
        let mut con = self.connection()?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            pipe.add_command(self.set_cmd(key, value)?).ignore();
        }
        let _: () = con.query_pipeline(&pipe).await?;
        Ok(())
    }

    async fn scan(&self, pattern: &str, page_size: usize) -> Result<ScanOutcome> {
        let mut outcome = ScanOutcome::default();

        for endpoint in self.data_endpoints().await {
            match self.scan_endpoint(&endpoint, pattern, page_size).await {
                Ok(keys) => outcome.keys.extend(keys),
                Err(e) => outcome.failures.push(ScanError {
                    endpoint,
                    message: e.to_string(),
                }),
            }
        }

        Ok(outcome)
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let mut con = self.connection()?;
        let mut cmd = self.cmd("DEL")?;
        cmd.arg(key);
        let removed: i64 = con.query(&cmd).await?;
        Ok(removed > 0)
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        let mut con = self.connection()?;
        let mut cmd = self.cmd("PUBLISH")?;
        cmd.arg(channel).arg(payload);
        let _: () = con.query(&cmd).await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        // Cluster PUBLISH is broadcast to every node, so any node will do.
        self.connection()?;
        let client = redis::Client::open(connection_info(&self.config, &self.config.endpoints[0])?)?;
        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let channel_name = channel.to_string();

        let task = tokio::spawn(async move {
            {
                let mut stream = pubsub.on_message();
                loop {
                    tokio::select! {
                        _ = &mut shutdown_rx => break,
                        msg = stream.next() => {
                            let Some(msg) = msg else { break };
                            let payload: String = match msg.get_payload() {
                                Ok(payload) => payload,
                                Err(e) => {
                                    warn!("Dropping undecodable message on {}: {}", channel_name, e);
                                    continue;
                                }
                            };
                            let message = ReceivedMessage {
                                channel: msg.get_channel_name().to_string(),
                                payload,
                                received_at: Utc::now(),
                            };
                            if tx.send(message).is_err() {
                                break;
                            }
                        }
                    }
                }
            }
            pubsub.unsubscribe(&channel_name).await?;
            Ok::<(), ClientError>(())
        });

        Ok(Subscription::with_task(channel, rx, shutdown_tx, task))
    }

    async fn server_info(&self) -> Result<Vec<ServerInfo>> {
        if !self.config.allow_admin {
            return Err(ClientError::AdminDisabled(self.config.name.clone()));
        }

        let mut infos = Vec::with_capacity(self.config.endpoints.len());
        for endpoint in &self.config.endpoints {
            let version = match self.endpoint_version(endpoint).await {
                Ok(version) => version,
                Err(e) => {
                    warn!("Failed to query INFO on {}: {}", endpoint, e);
                    None
                }
            };
            infos.push(ServerInfo {
                endpoint: endpoint.clone(),
                version,
            });
        }
        Ok(infos)
    }

    async fn close(&self) {
        let previous = self
            .connection
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if previous.is_some() {
            debug!("Closed connection to {}", self.config.name);
        }
    }
}

/// Opens [`RedisClient`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

#[async_trait::async_trait]
impl Connector for RedisConnector {
    async fn connect(&self, target: &TargetConfig) -> Result<Arc<dyn KvClient>> {
        Ok(Arc::new(RedisClient::connect(target.clone()).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        let info = "# Server\r\ngcc_version:11.2.0\r\nredis_version:7.2.4\r\nredis_mode:cluster\r\n";
        assert_eq!(parse_version(info), Some("7.2.4".to_string()));
        assert_eq!(parse_version("# Server\r\n"), None);
    }

    #[test]
    fn test_parse_cluster_masters() {
        let nodes = "\
07c37dfeb235213a872192d90877d0cd55635b91 127.0.0.1:30004@31004,node-4 slave e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 0 1426238317239 4 connected
67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 127.0.0.1:30002@31002,node-2 master - 0 1426238316232 2 connected 5461-10922
292f8b365bb7edb5e285caf0b7e6ddc7265d2f4f 127.0.0.1:30003@31003 master - 0 1426238318243 3 connected 10923-16383
6ec23923021cf3ffec47632106199cb7f496ce01 127.0.0.1:30005@31005 slave 67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 0 1426238316232 5 connected
e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 127.0.0.1:30001@31001 myself,master - 0 0 1 connected 0-5460
a211e242fc6b22a9427fed61285e85892fa04e08 :0@0 master,noaddr - 1426238317741 1426238316232 0 disconnected
c1b2c3d4e5f60718293a4b5c6d7e8f9012345678 127.0.0.1:30006@31006 master,fail - 1426238317741 1426238316232 6 disconnected
d4e5f60718293a4b5c6d7e8f9012345678c1b2c3 ::1:30007@31007 master - 0 0 7 connected
";
        assert_eq!(
            parse_cluster_masters(nodes),
            vec![
                "127.0.0.1:30002".to_string(),
                "127.0.0.1:30003".to_string(),
                "127.0.0.1:30001".to_string(),
                "[::1]:30007".to_string(),
            ]
        );
        assert!(parse_cluster_masters("").is_empty());
    }

    #[test]
    fn test_connection_info_carries_credentials() {
        let config = TargetConfig::new("Redis", vec!["10.0.0.1:7001".to_string()])
            .with_credentials(Some("bench".to_string()), Some("secret".to_string()));

        let info = connection_info(&config, "10.0.0.1:7001").unwrap();
        assert!(matches!(
            info.addr,
            ConnectionAddr::Tcp(ref host, 7001) if host == "10.0.0.1"
        ));
        assert_eq!(info.redis.username.as_deref(), Some("bench"));
        assert_eq!(info.redis.password.as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn test_connect_without_endpoints_fails() {
        let config = TargetConfig::new("Empty", vec![]);
        assert!(matches!(
            RedisClient::connect(config).await,
            Err(ClientError::InvalidEndpoint(_))
        ));
    }
}
