//! Relational source connection manager (single instance + cluster).
//!
//! Two topologies: `SINGLE` is one fixed endpoint; `RAC` is a multi-address
//! cluster described by an address list with independent load-balance and
//! failover flags. The descriptor is the single source of truth for the
//! address list — `connect` walks it (rotating the starting point when
//! load-balancing, moving to the next address on failure when failover is
//! on), so topology selection stays out of the query logic.
//!
//! Per-table lookups compose `{prefix}_{date}` table names. A missing table
//! is an expected condition in a rolling-window system and yields an empty
//! result, never an error.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, PgConnection, Row};

use crate::config::RelationalConfig;
use crate::error::PipelineError;
use crate::models::RawRow;

/// One `(protocol, host, port)` entry in a cluster address list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAddress {
    pub protocol: String,
    pub host: String,
    pub port: u16,
}

/// Connection topology resolved from configuration.
#[derive(Debug, Clone)]
pub enum Topology {
    Single {
        host: String,
        port: u16,
        service_name: String,
    },
    Rac(ConnectDescriptor),
}

/// Cluster connection descriptor: every address plus the two independent
/// driver flags, sharing one service name.
#[derive(Debug, Clone)]
pub struct ConnectDescriptor {
    pub addresses: Vec<ClusterAddress>,
    pub load_balance: bool,
    pub failover: bool,
    pub service_name: String,
}

impl Topology {
    pub fn from_config(config: &RelationalConfig) -> Self {
        if config.mode.eq_ignore_ascii_case("RAC") {
            let addresses = config
                .rac_hosts
                .iter()
                .filter(|h| !h.trim().is_empty())
                .map(|h| ClusterAddress {
                    protocol: config.protocol.clone(),
                    host: h.trim().to_string(),
                    port: config.rac_port,
                })
                .collect();
            Topology::Rac(ConnectDescriptor {
                addresses,
                load_balance: config.load_balance,
                failover: config.failover,
                service_name: config.service_name.clone(),
            })
        } else {
            Topology::Single {
                host: config.host.clone(),
                port: config.port,
                service_name: config.service_name.clone(),
            }
        }
    }

    pub fn service_name(&self) -> &str {
        match self {
            Topology::Single { service_name, .. } => service_name,
            Topology::Rac(descriptor) => &descriptor.service_name,
        }
    }

    /// Descriptor string used in diagnostics, in the classic
    /// `(DESCRIPTION=...)` form.
    pub fn render(&self) -> String {
        match self {
            Topology::Single {
                host,
                port,
                service_name,
            } => format!(
                "(DESCRIPTION=(ADDRESS=(PROTOCOL=TCP)(HOST={})(PORT={}))(CONNECT_DATA=(SERVICE_NAME={})))",
                host, port, service_name
            ),
            Topology::Rac(descriptor) => descriptor.render(),
        }
    }
}

impl ConnectDescriptor {
    pub fn render(&self) -> String {
        let address_list: String = self
            .addresses
            .iter()
            .map(|a| {
                format!(
                    "(ADDRESS=(PROTOCOL={})(HOST={})(PORT={}))",
                    a.protocol, a.host, a.port
                )
            })
            .collect();

        format!(
            "(DESCRIPTION=(LOAD_BALANCE={})(FAILOVER={})(ADDRESS_LIST={})(CONNECT_DATA=(SERVICE_NAME={})))",
            on_off(self.load_balance),
            on_off(self.failover),
            address_list,
            self.service_name
        )
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

/// Builds connections for the configured topology and runs per-table date
/// lookups. Connections are acquired per operation and released on every
/// exit path.
pub struct RelationalManager {
    config: RelationalConfig,
    topology: Topology,
    // Round-robin start offset across the address list.
    cursor: AtomicUsize,
}

impl RelationalManager {
    pub fn new(config: RelationalConfig) -> Self {
        let topology = Topology::from_config(&config);
        RelationalManager {
            config,
            topology,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Candidate endpoints in connection order for one attempt.
    fn candidate_order(&self) -> Vec<(String, u16)> {
        match &self.topology {
            Topology::Single { host, port, .. } => vec![(host.clone(), *port)],
            Topology::Rac(descriptor) => {
                let n = descriptor.addresses.len();
                if n == 0 {
                    return Vec::new();
                }
                let start = if descriptor.load_balance {
                    self.cursor.fetch_add(1, Ordering::Relaxed) % n
                } else {
                    0
                };
                (0..n)
                    .map(|i| {
                        let a = &descriptor.addresses[(start + i) % n];
                        (a.host.clone(), a.port)
                    })
                    .collect()
            }
        }
    }

    /// Open a connection per the topology: the first candidate, then — when
    /// failover is on — each remaining address in turn.
    pub async fn connect(&self) -> Result<PgConnection, PipelineError> {
        let candidates = self.candidate_order();
        if candidates.is_empty() {
            return Err(PipelineError::Connection(
                "relational address list is empty".to_string(),
            ));
        }

        let failover = match &self.topology {
            Topology::Single { .. } => false,
            Topology::Rac(descriptor) => descriptor.failover,
        };

        let mut last_err = None;
        for (host, port) in &candidates {
            match self.try_connect(host, *port).await {
                Ok(conn) => return Ok(conn),
                Err(err) => {
                    tracing::debug!(%host, port, %err, "relational endpoint unavailable");
                    if !failover {
                        return Err(err);
                    }
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            PipelineError::Connection("no relational endpoint reachable".to_string())
        }))
    }

    async fn try_connect(&self, host: &str, port: u16) -> Result<PgConnection, PipelineError> {
        let options = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(self.topology.service_name())
            .username(&self.config.user)
            .password(&self.config.password);

        let budget = Duration::from_secs(self.config.connect_timeout_secs);
        match tokio::time::timeout(budget, PgConnection::connect_with(&options)).await {
            Err(_) => Err(PipelineError::Timeout(budget)),
            Ok(Err(err)) => Err(PipelineError::connection(err)),
            Ok(Ok(conn)) => Ok(conn),
        }
    }

    /// Fetch every row of `{prefix}_{date}` as field/value pairs in column
    /// order. A missing table, or any relational error, yields `[]`.
    pub async fn fetch_rows_by_date(&self, prefix: &str, date: &str) -> Vec<RawRow> {
        match self.fetch_rows_inner(prefix, date).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::debug!(prefix, date, %err, "treating relational partition as absent");
                Vec::new()
            }
        }
    }

    async fn fetch_rows_inner(
        &self,
        prefix: &str,
        date: &str,
    ) -> Result<Vec<RawRow>, PipelineError> {
        let table = format!("{}_{}", prefix, date);
        let mut conn = self.connect().await?;

        // Column order from the catalog keeps normalized text stable across
        // runs for identical input.
        let columns: Vec<String> = sqlx::query_scalar(
            "SELECT column_name FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1 \
             ORDER BY ordinal_position",
        )
        .bind(&table)
        .fetch_all(&mut conn)
        .await?;

        if columns.is_empty() {
            conn.close().await.ok();
            return Ok(Vec::new());
        }

        let select_list: Vec<String> = columns
            .iter()
            .map(|c| format!("{}::text", quote_ident(c)))
            .collect();
        let sql = format!(
            "SELECT {} FROM {}",
            select_list.join(", "),
            quote_ident(&table)
        );

        let rows = sqlx::query(&sql).fetch_all(&mut conn).await?;
        conn.close().await.ok();

        let out = rows
            .iter()
            .map(|row| RawRow {
                fields: columns
                    .iter()
                    .enumerate()
                    .map(|(i, name)| {
                        let value: Option<String> = row.try_get(i).unwrap_or(None);
                        (name.clone(), value.unwrap_or_default())
                    })
                    .collect(),
            })
            .collect();

        Ok(out)
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rac_config() -> RelationalConfig {
        RelationalConfig {
            enabled: true,
            mode: "RAC".to_string(),
            rac_hosts: vec!["h1".to_string(), "h2".to_string()],
            rac_port: 1521,
            protocol: "TCP".to_string(),
            service_name: "orcl".to_string(),
            load_balance: true,
            failover: true,
            ..RelationalConfig::default()
        }
    }

    #[test]
    fn rac_descriptor_enumerates_addresses_and_flags() {
        let topology = Topology::from_config(&rac_config());
        let rendered = topology.render();

        assert!(rendered.contains("(LOAD_BALANCE=on)"));
        assert!(rendered.contains("(FAILOVER=on)"));
        assert!(rendered.contains("(ADDRESS=(PROTOCOL=TCP)(HOST=h1)(PORT=1521))"));
        assert!(rendered.contains("(ADDRESS=(PROTOCOL=TCP)(HOST=h2)(PORT=1521))"));
        assert!(rendered.contains("(CONNECT_DATA=(SERVICE_NAME=orcl))"));
    }

    #[test]
    fn flags_are_independent() {
        let mut config = rac_config();
        config.load_balance = false;
        let rendered = Topology::from_config(&config).render();
        assert!(rendered.contains("(LOAD_BALANCE=off)"));
        assert!(rendered.contains("(FAILOVER=on)"));
    }

    #[test]
    fn blank_rac_hosts_are_dropped() {
        let mut config = rac_config();
        config.rac_hosts = vec!["h1".to_string(), "  ".to_string(), "h2 ".to_string()];
        match Topology::from_config(&config) {
            Topology::Rac(descriptor) => {
                let hosts: Vec<&str> =
                    descriptor.addresses.iter().map(|a| a.host.as_str()).collect();
                assert_eq!(hosts, vec!["h1", "h2"]);
            }
            Topology::Single { .. } => panic!("expected RAC topology"),
        }
    }

    #[test]
    fn single_descriptor_has_no_cluster_flags() {
        let config = RelationalConfig {
            host: "dbhost".to_string(),
            port: 5432,
            service_name: "telemetry".to_string(),
            ..RelationalConfig::default()
        };
        let rendered = Topology::from_config(&config).render();
        assert!(rendered.contains("(HOST=dbhost)(PORT=5432)"));
        assert!(!rendered.contains("LOAD_BALANCE"));
    }

    #[test]
    fn load_balance_rotates_candidate_order() {
        let manager = RelationalManager::new(rac_config());
        let first = manager.candidate_order();
        let second = manager.candidate_order();
        assert_eq!(first.len(), 2);
        assert_ne!(first[0], second[0]);
        // Both orders still enumerate every address for failover.
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn fixed_order_without_load_balance() {
        let mut config = rac_config();
        config.load_balance = false;
        let manager = RelationalManager::new(config);
        assert_eq!(manager.candidate_order(), manager.candidate_order());
        assert_eq!(manager.candidate_order()[0].0, "h1");
    }
}
