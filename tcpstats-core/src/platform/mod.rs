//! 平台抽象层
//!
//! Windows 使用 IP Helper API 枚举连接并读取扩展统计；
//! 其他平台返回"不支持"的实现，流程本身仍可运行。

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(target_os = "windows"))]
pub mod unsupported;

use crate::gateway::{ConnectionEnumerator, StatsGateway};
use std::net::Ipv4Addr;

/// 创建平台特定的连接枚举器
pub fn create_enumerator() -> Box<dyn ConnectionEnumerator> {
    #[cfg(target_os = "windows")]
    {
        Box::new(windows::IpHelperEnumerator::new())
    }

    #[cfg(not(target_os = "windows"))]
    {
        Box::new(unsupported::UnsupportedEnumerator)
    }
}

/// 创建平台特定的统计网关
pub fn create_gateway() -> Box<dyn StatsGateway> {
    #[cfg(target_os = "windows")]
    {
        Box::new(windows::EStatsGateway::new())
    }

    #[cfg(not(target_os = "windows"))]
    {
        Box::new(unsupported::UnsupportedGateway)
    }
}

/// 获取当前平台名称
pub fn platform_name() -> &'static str {
    #[cfg(target_os = "windows")]
    { "Windows" }

    #[cfg(target_os = "macos")]
    { "macOS" }

    #[cfg(target_os = "linux")]
    { "Linux" }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    { "Unknown" }
}

/// 检查是否有管理员权限（开启统计收集需要）
pub fn has_admin_privileges() -> bool {
    #[cfg(target_os = "windows")]
    {
        windows::is_elevated()
    }

    #[cfg(not(target_os = "windows"))]
    { false }
}

// 原生连接行中的端口占用 DWORD 低 16 位，按网络字节序存放；
// IPv4 地址同样按网络字节序存放在 DWORD 中。

#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
pub(crate) fn port_from_wire(dw: u32) -> u16 {
    u16::from_be(dw as u16)
}

#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
pub(crate) fn port_to_wire(port: u16) -> u32 {
    port.to_be() as u32
}

#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
pub(crate) fn ipv4_from_wire(dw: u32) -> Ipv4Addr {
    Ipv4Addr::from(dw.to_ne_bytes())
}

#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
pub(crate) fn ipv4_to_wire(addr: Ipv4Addr) -> u32 {
    u32::from_ne_bytes(addr.octets())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_wire_encoding_is_network_order() {
        let wire = port_to_wire(443);
        assert_eq!((wire as u16).to_ne_bytes(), [0x01, 0xBB]);
        assert_eq!(port_from_wire(wire), 443);
        // 高 16 位不参与
        assert_eq!(port_from_wire(wire | 0xFFFF_0000), 443);
    }

    #[test]
    fn ipv4_wire_encoding_keeps_octet_order() {
        let addr = Ipv4Addr::new(192, 168, 1, 10);
        let wire = ipv4_to_wire(addr);
        assert_eq!(wire.to_ne_bytes(), [192, 168, 1, 10]);
        assert_eq!(ipv4_from_wire(wire), addr);
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn unsupported_platform_reports_errors() {
        use crate::{AddressFamily, TcpStatsError};

        let enumerator = create_enumerator();
        assert!(matches!(
            enumerator.connection_table(AddressFamily::Ipv4),
            Err(TcpStatsError::UnsupportedPlatform(_))
        ));
        assert!(!has_admin_privileges());
    }
}
