//! 单次采集流程
//!
//! 枚举 → 筛选 → 逐连接开启 / 读取 / 归一化 → 输出。
//! 单个连接或类别的失败只会让对应数据缺失，不会中断整次运行。

use crate::config::{OutputFormat, RunConfig};
use crate::filter;
use crate::gateway::{self, ConnectionEnumerator, RawPayloads, StatsGateway};
use crate::normalize::{self, NormalizedRecord};
use crate::present::{CsvPresenter, Presenter, ReportPresenter};
use crate::{Connection, Result};
use std::io::Write;
use tracing::{debug, info};

/// 一次运行的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// 快照中的连接数
    pub seen: usize,
    /// 筛选后输出的连接数
    pub selected: usize,
    /// 至少一个类别开启成功的连接数
    pub with_stats: usize,
}

/// 采集单个连接
///
/// 只有在开启收集成功后才会读取；开启全部失败时不做任何读取调用。
pub fn collect(gateway: &dyn StatsGateway, conn: &Connection) -> NormalizedRecord {
    let enabled = gateway::enable_collection(gateway, conn);
    let payloads = if enabled.is_empty() {
        RawPayloads::new()
    } else {
        gateway::fetch_all(gateway, conn)
    };

    let record = normalize::normalize(conn.clone(), enabled, &payloads);
    debug!(
        "{}:{} -> {}:{}: 开启 {} 类，读取 {} 类",
        conn.local_addr,
        conn.local_port,
        conn.remote_addr,
        conn.remote_port,
        enabled.len(),
        record.present_count()
    );
    record
}

/// 逐个连接采集并输出，返回有统计数据的连接数
fn emit<P: Presenter>(
    mut presenter: P,
    gateway: &dyn StatsGateway,
    selected: &[Connection],
) -> Result<usize> {
    let mut with_stats = 0;

    presenter.begin(selected.len())?;
    for conn in selected {
        let record = collect(gateway, conn);
        if record.collection_enabled() {
            with_stats += 1;
        }
        presenter.record(&record)?;
    }
    presenter.finish()?;

    Ok(with_stats)
}

/// 执行一次完整的采集与输出
pub fn run_pass<W: Write>(
    enumerator: &dyn ConnectionEnumerator,
    gateway: &dyn StatsGateway,
    config: &RunConfig,
    out: W,
) -> Result<PassSummary> {
    let selection = config.filter()?;
    let connections = filter::snapshot(enumerator, config.family)?;
    let seen = connections.len();
    let selected = selection.apply(connections);

    let with_stats = match config.format {
        OutputFormat::Report => emit(ReportPresenter::new(out), gateway, &selected)?,
        OutputFormat::Csv => emit(CsvPresenter::new(out), gateway, &selected)?,
    };
    let summary = PassSummary {
        seen,
        selected: selected.len(),
        with_stats,
    };

    info!(
        "采集完成: 快照 {} 个连接，输出 {} 个，其中 {} 个有统计数据",
        summary.seen, summary.selected, summary.with_stats
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Category;
    use crate::{AddressFamily, TcpState, TcpStatsError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OneConnection;

    impl ConnectionEnumerator for OneConnection {
        fn connection_table(&self, family: AddressFamily) -> Result<Vec<Connection>> {
            if family == AddressFamily::Ipv6 {
                return Ok(Vec::new());
            }
            Ok(vec![Connection {
                local_addr: "10.0.0.1".parse().unwrap(),
                local_port: 5000,
                remote_addr: "10.0.0.2".parse().unwrap(),
                remote_port: 80,
                state: TcpState::Established,
                pid: 1,
                local_scope_id: 0,
                remote_scope_id: 0,
            }])
        }
    }

    #[derive(Default)]
    struct DeniedGateway {
        fetches: AtomicUsize,
    }

    impl StatsGateway for DeniedGateway {
        fn enable_stats(&self, _conn: &Connection, category: Category) -> Result<()> {
            Err(TcpStatsError::CategoryFetchFailed { category, status: 5 })
        }

        fn fetch_stats(
            &self,
            _conn: &Connection,
            _category: Category,
            _buffer: &mut [u8],
        ) -> Result<()> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn failed_enablement_skips_fetching() {
        let gw = DeniedGateway::default();
        let conns = OneConnection.connection_table(AddressFamily::Ipv4).unwrap();
        let record = collect(&gw, &conns[0]);
        assert!(!record.collection_enabled());
        assert_eq!(gw.fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn summary_counts_connections_without_stats() {
        let gw = DeniedGateway::default();
        let mut out = Vec::new();
        let summary = run_pass(&OneConnection, &gw, &RunConfig::default(), &mut out).unwrap();
        assert_eq!(summary, PassSummary { seen: 1, selected: 1, with_stats: 0 });
    }

    #[test]
    fn invalid_selection_fails_before_output() {
        let config = RunConfig {
            all_states: true,
            state: Some("LISTEN".to_string()),
            ..RunConfig::default()
        };
        let mut out = Vec::new();
        let result = run_pass(&OneConnection, &DeniedGateway::default(), &config, &mut out);
        assert!(matches!(result, Err(TcpStatsError::InvalidParameter(_))));
        assert!(out.is_empty());
    }
}
