//! 统计网关与连接枚举抽象
//!
//! 平台实现只负责原生调用；"逐类开启、保留成功项"、"读取前清零缓冲区"
//! 等约定集中在这里，与具体平台无关。

use crate::schema::{Category, CATEGORY_COUNT};
use crate::{AddressFamily, Connection, Result, TcpStatsError};
use tracing::debug;

/// 连接表枚举器 trait
pub trait ConnectionEnumerator: Send + Sync {
    /// 读取指定地址族的当前连接表快照
    fn connection_table(&self, family: AddressFamily) -> Result<Vec<Connection>>;
}

/// 统计网关 trait
///
/// 两个方法都只做一次原生调用，不重试；非成功状态一律映射为错误，
/// 不对状态码做进一步解释。
pub trait StatsGateway: Send + Sync {
    /// 对单个类别开启收集；重复开启视为成功
    fn enable_stats(&self, conn: &Connection, category: Category) -> Result<()>;

    /// 将类别的 ROD 结构读入 `buffer`（长度即结构大小）
    fn fetch_stats(&self, conn: &Connection, category: Category, buffer: &mut [u8]) -> Result<()>;
}

/// 已成功开启的类别集合（位图）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategorySet(u8);

impl CategorySet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Self(u8::MAX >> (8 - CATEGORY_COUNT))
    }

    pub fn insert(&mut self, category: Category) {
        self.0 |= 1 << category.index();
    }

    pub fn contains(&self, category: Category) -> bool {
        self.0 & (1 << category.index()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }
}

/// 一次成功读取得到的原始负载
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    pub category: Category,
    pub bytes: Vec<u8>,
}

/// 按类别索引的原始负载槽
#[derive(Debug, Clone, Default)]
pub struct RawPayloads {
    slots: [Option<Vec<u8>>; CATEGORY_COUNT],
}

impl RawPayloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, payload: RawPayload) {
        self.slots[payload.category.index()] = Some(payload.bytes);
    }

    pub fn get(&self, category: Category) -> Option<&[u8]> {
        self.slots[category.index()].as_deref()
    }
}

/// 对连接的全部 8 个类别尝试开启收集
///
/// 部分成功是正常结果：不同类别可能需要不同权限或内核支持。
/// 返回集合为空时表示该连接统计不可用。
pub fn enable_collection(gateway: &dyn StatsGateway, conn: &Connection) -> CategorySet {
    let mut enabled = CategorySet::empty();

    for category in Category::ALL {
        match gateway.enable_stats(conn, category) {
            Ok(()) => enabled.insert(category),
            Err(e) => debug!(
                "开启 {} 收集失败 {}:{} -> {}:{}: {}",
                category, conn.local_addr, conn.local_port, conn.remote_addr, conn.remote_port, e
            ),
        }
    }

    if enabled.is_empty() {
        debug!(
            "{}:{} -> {}:{}: {}",
            conn.local_addr,
            conn.local_port,
            conn.remote_addr,
            conn.remote_port,
            TcpStatsError::CollectionUnavailable
        );
    }

    enabled
}

/// 读取单个类别
///
/// 缓冲区按注册表布局大小分配并清零后再交给网关，读取失败时整块丢弃，
/// 不会把部分填充的数据当作有效结果返回。
pub fn fetch_category(
    gateway: &dyn StatsGateway,
    conn: &Connection,
    category: Category,
) -> Option<RawPayload> {
    let mut buffer = vec![0u8; category.layout().size()];

    match gateway.fetch_stats(conn, category, &mut buffer) {
        Ok(()) => Some(RawPayload { category, bytes: buffer }),
        Err(e) => {
            debug!(
                "{}:{} -> {}:{}: {}",
                conn.local_addr, conn.local_port, conn.remote_addr, conn.remote_port, e
            );
            None
        }
    }
}

/// 读取全部类别；每个类别独立，互不影响
pub fn fetch_all(gateway: &dyn StatsGateway, conn: &Connection) -> RawPayloads {
    let mut payloads = RawPayloads::new();
    for category in Category::ALL {
        if let Some(payload) = fetch_category(gateway, conn, category) {
            payloads.insert(payload);
        }
    }
    payloads
}
