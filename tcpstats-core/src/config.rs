//! 运行配置
//!
//! 可从 JSON 文件加载，命令行参数在其上覆盖

use crate::filter::{ConnectionFilter, FamilyFilter};
use crate::Result;
use crate::TcpState;
use crate::TcpStatsError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 输出形态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Report,
    Csv,
}

/// 单次运行的全部选项
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// 输出形态
    pub format: OutputFormat,

    /// 地址族
    pub family: FamilyFilter,

    /// 不限连接状态
    pub all_states: bool,

    /// 只看某个状态（MIB 名称，如 `TIME_WAIT`）
    pub state: Option<String>,

    /// 进程 ID 过滤
    pub pid: Option<u32>,

    /// 本地或远端端口过滤
    pub port: Option<u16>,

    /// 详细日志
    pub verbose: bool,
}

impl RunConfig {
    /// 从文件加载配置
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| TcpStatsError::Config(format!("无法读取 {}: {}", path.display(), e)))?;
        let config: RunConfig = serde_json::from_str(&content)
            .map_err(|e| TcpStatsError::Config(format!("配置解析失败: {}", e)))?;

        Ok(config)
    }

    /// 检查选项之间的冲突
    pub fn validate(&self) -> Result<()> {
        if self.all_states && self.state.is_some() {
            return Err(TcpStatsError::InvalidParameter(
                "--all 与 --state 不能同时使用".to_string(),
            ));
        }
        self.selected_state()?;
        Ok(())
    }

    fn selected_state(&self) -> Result<Option<TcpState>> {
        match &self.state {
            None => Ok(None),
            Some(name) => TcpState::from_name(name)
                .map(Some)
                .ok_or_else(|| TcpStatsError::InvalidParameter(format!("未知的连接状态: {}", name))),
        }
    }

    /// 转换为连接筛选条件
    pub fn filter(&self) -> Result<ConnectionFilter> {
        self.validate()?;

        let base = match self.selected_state()? {
            Some(state) => ConnectionFilter {
                state: Some(state),
                ..ConnectionFilter::all_states()
            },
            None if self.all_states => ConnectionFilter::all_states(),
            None => ConnectionFilter::established_only(),
        };

        Ok(base.with_pid(self.pid).with_port(self.port))
    }
}
