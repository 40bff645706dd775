//! 统计归一化
//!
//! 原始负载在这里被一次性解码：哨兵值（对应宽度全 1）转换为缺失，
//! 微秒精度时长换算为毫秒。此后的展示层只面对 `Option<Value>`，
//! 不再接触任何原始哨兵。

use crate::gateway::{CategorySet, RawPayloads};
use crate::schema::{Category, FieldKind, FieldSpec, Layout, Source, CATEGORY_COUNT};
use crate::Connection;
use serde::Serialize;

/// 毫秒值，内部以微秒保存，输出固定 3 位小数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FineMillis {
    micros: u64,
}

impl FineMillis {
    pub fn from_micros(micros: u64) -> Self {
        Self { micros }
    }

    pub fn whole_millis(&self) -> u64 {
        self.micros / 1000
    }

    /// 小数部分（千分之一毫秒）
    pub fn fraction(&self) -> u64 {
        self.micros % 1000
    }
}

impl std::fmt::Display for FineMillis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:03}", self.whole_millis(), self.fraction())
    }
}

/// 归一化后的单个字段值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Value {
    Count(u64),
    Millis(FineMillis),
    Flag(bool),
    Shift(u8),
}

/// 成功读取的单个类别；字段顺序与注册表一致
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryStats {
    category: Category,
    values: Vec<Option<Value>>,
}

impl CategoryStats {
    pub fn category(&self) -> Category {
        self.category
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    /// 按 CSV 列名取值
    pub fn get(&self, column: &str) -> Option<Value> {
        self.category
            .fields()
            .zip(self.values.iter())
            .find(|(f, _)| f.column == column)
            .and_then(|(_, v)| *v)
    }
}

/// 单个连接的归一化记录
#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    pub connection: Connection,
    enabled: CategorySet,
    categories: [Option<CategoryStats>; CATEGORY_COUNT],
}

impl NormalizedRecord {
    /// 至少一个类别开启成功
    pub fn collection_enabled(&self) -> bool {
        !self.enabled.is_empty()
    }

    pub fn category(&self, category: Category) -> Option<&CategoryStats> {
        self.categories[category.index()].as_ref()
    }

    /// 按注册表顺序列出存在的类别
    pub fn present(&self) -> impl Iterator<Item = &CategoryStats> {
        self.categories.iter().flatten()
    }

    pub fn present_count(&self) -> usize {
        self.present().count()
    }
}

/// 合并一个连接的全部原始负载
///
/// 未能开启收集时所有类别一律缺失，即便调用方传入了负载。
/// 读取成功的类别总是"存在"，其中的哨兵字段单独标记为缺失。
pub fn normalize(
    connection: Connection,
    enabled: CategorySet,
    payloads: &RawPayloads,
) -> NormalizedRecord {
    let mut categories: [Option<CategoryStats>; CATEGORY_COUNT] = Default::default();

    if !enabled.is_empty() {
        for category in Category::ALL {
            if let Some(bytes) = payloads.get(category) {
                categories[category.index()] = Some(decode_category(category, bytes));
            }
        }
    }

    NormalizedRecord {
        connection,
        enabled,
        categories,
    }
}

fn decode_category(category: Category, bytes: &[u8]) -> CategoryStats {
    let layout = category.layout();
    let values = category
        .fields()
        .map(|field| decode_field(field, &layout, bytes))
        .collect();

    CategoryStats { category, values }
}

fn decode_field(field: &FieldSpec, layout: &Layout, bytes: &[u8]) -> Option<Value> {
    let Source::Wire(slot) = field.source else {
        return None;
    };
    let raw = layout.read(bytes, slot)?;
    if raw == layout.width(slot)?.sentinel() {
        return None;
    }

    let value = match field.kind {
        FieldKind::FineDuration => Value::Millis(FineMillis::from_micros(raw)),
        FieldKind::Flag => Value::Flag(raw != 0),
        FieldKind::ScaleShift => Value::Shift(raw as u8),
        FieldKind::Counter | FieldKind::Bytes | FieldKind::Duration => Value::Count(raw),
    };
    Some(value)
}
