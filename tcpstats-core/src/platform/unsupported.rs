//! 非 Windows 平台：扩展统计 API 不存在

use crate::gateway::{ConnectionEnumerator, StatsGateway};
use crate::schema::Category;
use crate::{AddressFamily, Connection, Result, TcpStatsError};

pub struct UnsupportedEnumerator;

impl ConnectionEnumerator for UnsupportedEnumerator {
    fn connection_table(&self, family: AddressFamily) -> Result<Vec<Connection>> {
        Err(TcpStatsError::UnsupportedPlatform(format!(
            "{} 连接表仅在 Windows 上可用 (当前: {})",
            family,
            super::platform_name()
        )))
    }
}

pub struct UnsupportedGateway;

impl StatsGateway for UnsupportedGateway {
    fn enable_stats(&self, _conn: &Connection, category: Category) -> Result<()> {
        Err(TcpStatsError::UnsupportedPlatform(format!("{} 统计需要 Windows", category)))
    }

    fn fetch_stats(
        &self,
        _conn: &Connection,
        category: Category,
        _buffer: &mut [u8],
    ) -> Result<()> {
        Err(TcpStatsError::UnsupportedPlatform(format!("{} 统计需要 Windows", category)))
    }
}
