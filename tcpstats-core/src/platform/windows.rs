//! Windows平台实现
//!
//! 使用 IP Helper API：
//! - GetExtendedTcpTable 读取 IPv4 / IPv6 连接表
//! - Set/GetPerTcp(6)ConnectionEStats 开启并读取扩展统计

use super::{ipv4_from_wire, ipv4_to_wire, port_from_wire, port_to_wire};
use crate::gateway::{ConnectionEnumerator, StatsGateway};
use crate::schema::Category;
use crate::{AddressFamily, Connection, Result, TcpState, TcpStatsError};
use std::ffi::c_void;
use std::net::{IpAddr, Ipv6Addr};
use tracing::debug;

use windows::Win32::Foundation::{ERROR_INSUFFICIENT_BUFFER, FALSE, NO_ERROR};
use windows::Win32::NetworkManagement::IpHelper::{
    GetExtendedTcpTable, MIB_TCP6ROW_OWNER_PID, MIB_TCPROW_OWNER_PID, TCP_TABLE_OWNER_PID_ALL,
};
use windows::Win32::Networking::WinSock::{AF_INET, AF_INET6};

/// 连接表在两次调用之间可能增长，最多重试的次数
const TABLE_ATTEMPTS: usize = 4;

/// 检查是否有管理员权限
pub fn is_elevated() -> bool {
    use std::process::Command;
    Command::new("net")
        .args(["session"])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// MIB_TCPROW
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct MibTcpRow {
    state: u32,
    local_addr: u32,
    local_port: u32,
    remote_addr: u32,
    remote_port: u32,
}

/// MIB_TCP6ROW
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct MibTcp6Row {
    state: u32,
    local_addr: [u8; 16],
    local_scope_id: u32,
    local_port: u32,
    remote_addr: [u8; 16],
    remote_scope_id: u32,
    remote_port: u32,
}

#[link(name = "iphlpapi")]
extern "system" {
    fn SetPerTcpConnectionEStats(
        row: *const MibTcpRow,
        estats_type: i32,
        rw: *const u8,
        rw_version: u32,
        rw_size: u32,
        offset: u32,
    ) -> u32;

    fn GetPerTcpConnectionEStats(
        row: *const MibTcpRow,
        estats_type: i32,
        rw: *mut u8,
        rw_version: u32,
        rw_size: u32,
        ros: *mut u8,
        ros_version: u32,
        ros_size: u32,
        rod: *mut u8,
        rod_version: u32,
        rod_size: u32,
    ) -> u32;

    fn SetPerTcp6ConnectionEStats(
        row: *const MibTcp6Row,
        estats_type: i32,
        rw: *const u8,
        rw_version: u32,
        rw_size: u32,
        offset: u32,
    ) -> u32;

    fn GetPerTcp6ConnectionEStats(
        row: *const MibTcp6Row,
        estats_type: i32,
        rw: *mut u8,
        rw_version: u32,
        rw_size: u32,
        ros: *mut u8,
        ros_version: u32,
        ros_size: u32,
        rod: *mut u8,
        rod_version: u32,
        rod_size: u32,
    ) -> u32;
}

/// 原生连接行（按地址族区分）
enum NativeRow {
    V4(MibTcpRow),
    V6(MibTcp6Row),
}

impl NativeRow {
    /// 由连接重建原生行；统计 API 以四元组和状态定位连接
    fn from_connection(conn: &Connection) -> Result<Self> {
        match (conn.local_addr, conn.remote_addr) {
            (IpAddr::V4(local), IpAddr::V4(remote)) => Ok(NativeRow::V4(MibTcpRow {
                state: conn.state.mib_code(),
                local_addr: ipv4_to_wire(local),
                local_port: port_to_wire(conn.local_port),
                remote_addr: ipv4_to_wire(remote),
                remote_port: port_to_wire(conn.remote_port),
            })),
            (IpAddr::V6(local), IpAddr::V6(remote)) => Ok(NativeRow::V6(MibTcp6Row {
                state: conn.state.mib_code(),
                local_addr: local.octets(),
                local_scope_id: conn.local_scope_id,
                local_port: port_to_wire(conn.local_port),
                remote_addr: remote.octets(),
                remote_scope_id: conn.remote_scope_id,
                remote_port: port_to_wire(conn.remote_port),
            })),
            _ => Err(TcpStatsError::InvalidParameter(format!(
                "地址族不一致: {} -> {}",
                conn.local_addr, conn.remote_addr
            ))),
        }
    }
}

/// 连接表枚举器
pub struct IpHelperEnumerator;

impl IpHelperEnumerator {
    pub fn new() -> Self {
        Self
    }

    /// 两段式调用：先取所需大小，再读入；表增长时重试
    fn read_table(&self, family: AddressFamily) -> Result<Vec<u8>> {
        let af = match family {
            AddressFamily::Ipv4 => AF_INET.0 as u32,
            AddressFamily::Ipv6 => AF_INET6.0 as u32,
        };

        let mut size: u32 = 0;
        let status = unsafe {
            GetExtendedTcpTable(None, &mut size, FALSE, af, TCP_TABLE_OWNER_PID_ALL, 0)
        };
        if status != ERROR_INSUFFICIENT_BUFFER.0 && status != NO_ERROR.0 {
            return Err(TcpStatsError::Snapshot(format!("{} 连接表大小查询失败 (状态码 {})", family, status)));
        }

        for _ in 0..TABLE_ATTEMPTS {
            let mut buffer = vec![0u8; size.max(std::mem::size_of::<u32>() as u32) as usize];
            let status = unsafe {
                GetExtendedTcpTable(
                    Some(buffer.as_mut_ptr() as *mut c_void),
                    &mut size,
                    FALSE,
                    af,
                    TCP_TABLE_OWNER_PID_ALL,
                    0,
                )
            };

            if status == NO_ERROR.0 {
                return Ok(buffer);
            }
            if status != ERROR_INSUFFICIENT_BUFFER.0 {
                return Err(TcpStatsError::Snapshot(format!("{} 连接表读取失败 (状态码 {})", family, status)));
            }
            debug!("{} 连接表已增长到 {} 字节，重试", family, size);
        }

        Err(TcpStatsError::Snapshot(format!("{} 连接表持续变化，放弃读取", family)))
    }
}

impl Default for IpHelperEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

/// 表头是一个 DWORD 条目数，其后紧跟定长行
fn read_rows<R: Copy>(buffer: &[u8]) -> Result<Vec<R>> {
    let header = std::mem::size_of::<u32>();
    let count_bytes = buffer
        .get(..header)
        .ok_or_else(|| TcpStatsError::Snapshot("连接表缓冲区过短".into()))?;
    let mut raw = [0u8; 4];
    raw.copy_from_slice(count_bytes);
    let count = u32::from_ne_bytes(raw) as usize;

    let row_size = std::mem::size_of::<R>();
    let required = count
        .checked_mul(row_size)
        .and_then(|n| n.checked_add(header))
        .ok_or_else(|| TcpStatsError::Snapshot("连接表条目数溢出".into()))?;
    if required > buffer.len() {
        return Err(TcpStatsError::Snapshot(format!(
            "连接表被截断: 需要 {} 字节，实际 {} 字节",
            required,
            buffer.len()
        )));
    }

    let rows = (0..count)
        .map(|i| unsafe {
            (buffer.as_ptr().add(header + i * row_size) as *const R).read_unaligned()
        })
        .collect();
    Ok(rows)
}

impl ConnectionEnumerator for IpHelperEnumerator {
    fn connection_table(&self, family: AddressFamily) -> Result<Vec<Connection>> {
        let buffer = self.read_table(family)?;

        let connections: Vec<Connection> = match family {
            AddressFamily::Ipv4 => read_rows::<MIB_TCPROW_OWNER_PID>(&buffer)?
                .into_iter()
                .map(|row| Connection {
                    local_addr: IpAddr::V4(ipv4_from_wire(row.dwLocalAddr)),
                    local_port: port_from_wire(row.dwLocalPort),
                    remote_addr: IpAddr::V4(ipv4_from_wire(row.dwRemoteAddr)),
                    remote_port: port_from_wire(row.dwRemotePort),
                    state: TcpState::from_mib(row.dwState),
                    pid: row.dwOwningPid,
                    local_scope_id: 0,
                    remote_scope_id: 0,
                })
                .collect(),
            AddressFamily::Ipv6 => read_rows::<MIB_TCP6ROW_OWNER_PID>(&buffer)?
                .into_iter()
                .map(|row| Connection {
                    local_addr: IpAddr::V6(Ipv6Addr::from(row.ucLocalAddr)),
                    local_port: port_from_wire(row.dwLocalPort),
                    remote_addr: IpAddr::V6(Ipv6Addr::from(row.ucRemoteAddr)),
                    remote_port: port_from_wire(row.dwRemotePort),
                    state: TcpState::from_mib(row.dwState),
                    pid: row.dwOwningPid,
                    local_scope_id: row.dwLocalScopeId,
                    remote_scope_id: row.dwRemoteScopeId,
                })
                .collect(),
        };

        debug!("{} 连接表: {} 个连接", family, connections.len());
        Ok(connections)
    }
}

/// 扩展统计网关
pub struct EStatsGateway;

impl EStatsGateway {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EStatsGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn check(category: Category, status: u32) -> Result<()> {
    if status == NO_ERROR.0 {
        Ok(())
    } else {
        Err(TcpStatsError::CategoryFetchFailed { category, status })
    }
}

impl StatsGateway for EStatsGateway {
    fn enable_stats(&self, conn: &Connection, category: Category) -> Result<()> {
        let block = category.enable_block();
        let kind = category.estats_type();
        let (rw, rw_size) = (block.as_ptr(), block.len() as u32);
        let status = match NativeRow::from_connection(conn)? {
            NativeRow::V4(row) => unsafe {
                SetPerTcpConnectionEStats(&row, kind, rw, 0, rw_size, 0)
            },
            NativeRow::V6(row) => unsafe {
                SetPerTcp6ConnectionEStats(&row, kind, rw, 0, rw_size, 0)
            },
        };
        check(category, status)
    }

    fn fetch_stats(&self, conn: &Connection, category: Category, buffer: &mut [u8]) -> Result<()> {
        let kind = category.estats_type();
        let rod = buffer.as_mut_ptr();
        let rod_size = buffer.len() as u32;
        let none = std::ptr::null_mut();

        let status = match NativeRow::from_connection(conn)? {
            NativeRow::V4(row) => unsafe {
                GetPerTcpConnectionEStats(&row, kind, none, 0, 0, none, 0, 0, rod, 0, rod_size)
            },
            NativeRow::V6(row) => unsafe {
                GetPerTcp6ConnectionEStats(&row, kind, none, 0, 0, none, 0, 0, rod, 0, rod_size)
            },
        };
        check(category, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn native_row_sizes_match_sdk() {
        assert_eq!(std::mem::size_of::<MibTcpRow>(), 20);
        assert_eq!(std::mem::size_of::<MibTcp6Row>(), 52);
    }

    #[test]
    fn rows_are_read_after_count_header() {
        let mut buffer = 2u32.to_ne_bytes().to_vec();
        buffer.extend(7u32.to_ne_bytes());
        buffer.extend(9u32.to_ne_bytes());
        let rows: Vec<u32> = read_rows(&buffer).unwrap();
        assert_eq!(rows, vec![7, 9]);

        buffer.truncate(8);
        assert!(read_rows::<u32>(&buffer).is_err());
    }

    #[test]
    fn native_row_rebuilds_from_connection() {
        let conn = Connection {
            local_addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            local_port: 443,
            remote_addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            remote_port: 50000,
            state: TcpState::Established,
            pid: 1,
            local_scope_id: 0,
            remote_scope_id: 0,
        };
        let NativeRow::V4(row) = NativeRow::from_connection(&conn).unwrap() else {
            panic!("expected IPv4 row");
        };
        assert_eq!(row.state, 5);
        assert_eq!(port_from_wire(row.local_port), 443);
        assert_eq!(ipv4_from_wire(row.remote_addr), Ipv4Addr::new(10, 0, 0, 2));
    }
}
