//! TcpStats Core - TCP连接扩展统计核心库
//!
//! 提供：
//! - TCP连接表快照（IPv4 / IPv6）
//! - 按连接开启并读取 8 类扩展统计（ESTATS）
//! - 哨兵值归一化与单位换算
//! - 报告 / CSV 两种输出形态

pub mod schema;
pub mod gateway;
pub mod normalize;
pub mod present;
pub mod filter;
pub mod config;
pub mod engine;
pub mod platform;

pub use schema::{Category, FieldKind, FieldSpec};
pub use gateway::{CategorySet, ConnectionEnumerator, StatsGateway};
pub use normalize::{CategoryStats, NormalizedRecord, Value};
pub use filter::{ConnectionFilter, FamilyFilter};
pub use config::{OutputFormat, RunConfig};
pub use engine::{run_pass, PassSummary};

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TcpStatsError {
    #[error("无法读取TCP连接表: {0}")]
    Snapshot(String),

    #[error("该连接无法开启统计收集")]
    CollectionUnavailable,

    #[error("读取统计类别 {category} 失败 (状态码 {status})")]
    CategoryFetchFailed { category: Category, status: u32 },

    #[error("平台不支持此操作: {0}")]
    UnsupportedPlatform(String),

    #[error("参数无效: {0}")]
    InvalidParameter(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TcpStatsError>;

/// TCP连接状态（MIB_TCP_STATE 编码 1..12）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TcpState {
    Closed,
    Listen,
    SynSent,
    SynReceived,
    Established,
    FinWait1,
    FinWait2,
    CloseWait,
    Closing,
    LastAck,
    TimeWait,
    DeleteTcb,
    Unknown(u32),
}

impl TcpState {
    pub fn from_mib(code: u32) -> Self {
        match code {
            1 => TcpState::Closed,
            2 => TcpState::Listen,
            3 => TcpState::SynSent,
            4 => TcpState::SynReceived,
            5 => TcpState::Established,
            6 => TcpState::FinWait1,
            7 => TcpState::FinWait2,
            8 => TcpState::CloseWait,
            9 => TcpState::Closing,
            10 => TcpState::LastAck,
            11 => TcpState::TimeWait,
            12 => TcpState::DeleteTcb,
            other => TcpState::Unknown(other),
        }
    }

    pub fn mib_code(&self) -> u32 {
        match self {
            TcpState::Closed => 1,
            TcpState::Listen => 2,
            TcpState::SynSent => 3,
            TcpState::SynReceived => 4,
            TcpState::Established => 5,
            TcpState::FinWait1 => 6,
            TcpState::FinWait2 => 7,
            TcpState::CloseWait => 8,
            TcpState::Closing => 9,
            TcpState::LastAck => 10,
            TcpState::TimeWait => 11,
            TcpState::DeleteTcb => 12,
            TcpState::Unknown(code) => *code,
        }
    }

    /// 按名称解析（忽略大小写，`-` 视同 `_`）
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_uppercase().replace('-', "_");
        let state = match normalized.as_str() {
            "CLOSED" => TcpState::Closed,
            "LISTEN" | "LISTENING" => TcpState::Listen,
            "SYN_SENT" => TcpState::SynSent,
            "SYN_RCVD" | "SYN_RECEIVED" => TcpState::SynReceived,
            "ESTABLISHED" => TcpState::Established,
            "FIN_WAIT1" | "FIN_WAIT_1" => TcpState::FinWait1,
            "FIN_WAIT2" | "FIN_WAIT_2" => TcpState::FinWait2,
            "CLOSE_WAIT" => TcpState::CloseWait,
            "CLOSING" => TcpState::Closing,
            "LAST_ACK" => TcpState::LastAck,
            "TIME_WAIT" => TcpState::TimeWait,
            "DELETE_TCB" => TcpState::DeleteTcb,
            _ => return None,
        };
        Some(state)
    }
}

impl std::fmt::Display for TcpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TcpState::Closed => write!(f, "CLOSED"),
            TcpState::Listen => write!(f, "LISTEN"),
            TcpState::SynSent => write!(f, "SYN_SENT"),
            TcpState::SynReceived => write!(f, "SYN_RCVD"),
            TcpState::Established => write!(f, "ESTABLISHED"),
            TcpState::FinWait1 => write!(f, "FIN_WAIT1"),
            TcpState::FinWait2 => write!(f, "FIN_WAIT2"),
            TcpState::CloseWait => write!(f, "CLOSE_WAIT"),
            TcpState::Closing => write!(f, "CLOSING"),
            TcpState::LastAck => write!(f, "LAST_ACK"),
            TcpState::TimeWait => write!(f, "TIME_WAIT"),
            TcpState::DeleteTcb => write!(f, "DELETE_TCB"),
            TcpState::Unknown(code) => write!(f, "{}", code),
        }
    }
}

/// 地址族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "IPv4"),
            AddressFamily::Ipv6 => write!(f, "IPv6"),
        }
    }
}

/// 单个TCP连接（一次快照内有效）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub local_addr: IpAddr,
    pub local_port: u16,
    pub remote_addr: IpAddr,
    pub remote_port: u16,
    pub state: TcpState,
    pub pid: u32,
    /// IPv6 作用域 ID，重建原生行结构时需要
    pub local_scope_id: u32,
    pub remote_scope_id: u32,
}

impl Connection {
    pub fn family(&self) -> AddressFamily {
        match self.local_addr {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_codes_round_trip_through_mib() {
        for code in 1..=12 {
            assert_eq!(TcpState::from_mib(code).mib_code(), code);
        }
        assert_eq!(TcpState::from_mib(42), TcpState::Unknown(42));
    }

    #[test]
    fn state_names_match_mib_names() {
        assert_eq!(TcpState::Established.to_string(), "ESTABLISHED");
        assert_eq!(TcpState::SynReceived.to_string(), "SYN_RCVD");
        assert_eq!(TcpState::DeleteTcb.to_string(), "DELETE_TCB");
        assert_eq!(TcpState::from_name("time-wait"), Some(TcpState::TimeWait));
        assert_eq!(TcpState::from_name("fin_wait_2"), Some(TcpState::FinWait2));
        assert_eq!(TcpState::from_name("bogus"), None);
    }

    #[test]
    fn family_follows_local_address() {
        let conn = Connection {
            local_addr: "::1".parse().unwrap(),
            local_port: 1,
            remote_addr: "::1".parse().unwrap(),
            remote_port: 2,
            state: TcpState::Established,
            pid: 7,
            local_scope_id: 0,
            remote_scope_id: 0,
        };
        assert_eq!(conn.family(), AddressFamily::Ipv6);
    }
}
