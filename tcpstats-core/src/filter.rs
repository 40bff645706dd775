//! 连接选择
//!
//! 枚举一次快照，再按状态 / PID / 端口筛选。
//! 默认只保留 ESTABLISHED 连接。

use crate::gateway::ConnectionEnumerator;
use crate::{AddressFamily, Connection, Result, TcpState};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// 地址族选择
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyFilter {
    #[default]
    Any,
    Ipv4,
    Ipv6,
}

impl FamilyFilter {
    pub fn includes(&self, family: AddressFamily) -> bool {
        match self {
            FamilyFilter::Any => true,
            FamilyFilter::Ipv4 => family == AddressFamily::Ipv4,
            FamilyFilter::Ipv6 => family == AddressFamily::Ipv6,
        }
    }
}

/// 连接筛选条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionFilter {
    /// `None` 表示不限状态
    pub state: Option<TcpState>,
    pub pid: Option<u32>,
    /// 本地或远端端口任一匹配
    pub port: Option<u16>,
}

impl Default for ConnectionFilter {
    fn default() -> Self {
        Self::established_only()
    }
}

impl ConnectionFilter {
    pub fn established_only() -> Self {
        Self {
            state: Some(TcpState::Established),
            pid: None,
            port: None,
        }
    }

    pub fn all_states() -> Self {
        Self {
            state: None,
            pid: None,
            port: None,
        }
    }

    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    pub fn matches(&self, conn: &Connection) -> bool {
        if let Some(state) = self.state {
            if conn.state != state {
                return false;
            }
        }
        if let Some(pid) = self.pid {
            if conn.pid != pid {
                return false;
            }
        }
        if let Some(port) = self.port {
            if conn.local_port != port && conn.remote_port != port {
                return false;
            }
        }
        true
    }

    /// 保持快照顺序筛选
    pub fn apply(&self, connections: Vec<Connection>) -> Vec<Connection> {
        connections.into_iter().filter(|c| self.matches(c)).collect()
    }
}

/// 按地址族读取连接表快照（IPv4 在前）
///
/// IPv4 表读取失败是致命错误；同时请求两种地址族时，IPv6 表失败
/// 只记录警告并视为空表，仅请求 IPv6 时则向上返回。
pub fn snapshot(
    enumerator: &dyn ConnectionEnumerator,
    family: FamilyFilter,
) -> Result<Vec<Connection>> {
    let mut connections = Vec::new();

    if family.includes(AddressFamily::Ipv4) {
        connections.extend(enumerator.connection_table(AddressFamily::Ipv4)?);
    }

    if family.includes(AddressFamily::Ipv6) {
        match enumerator.connection_table(AddressFamily::Ipv6) {
            Ok(table) => connections.extend(table),
            Err(e) if family == FamilyFilter::Any => warn!("IPv6 连接表不可用，已跳过: {}", e),
            Err(e) => return Err(e),
        }
    }

    Ok(connections)
}
