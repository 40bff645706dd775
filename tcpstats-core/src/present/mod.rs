//! 展示层
//!
//! 报告与 CSV 两种形态共用同一份注册表和归一化记录，
//! 只在"缺失如何书写"和"数字如何书写"上不同：
//! - 报告：缺失写作 `N/A`，整数带千位分隔符
//! - CSV：缺失写作空串，数字不分组，小数点固定为 `.`

pub mod csv;
pub mod report;

pub use self::csv::CsvPresenter;
pub use self::report::ReportPresenter;

use crate::normalize::{NormalizedRecord, Value};
use std::io;

/// 报告中的缺失占位符
pub const ABSENT_MARKER: &str = "N/A";

/// 输出形态 trait
///
/// 缺失数据不是错误，实现只会因为底层写入失败而返回错误。
pub trait Presenter {
    /// 在任何记录之前调用一次
    fn begin(&mut self, connection_count: usize) -> io::Result<()>;

    /// 输出一条连接记录
    fn record(&mut self, record: &NormalizedRecord) -> io::Result<()>;

    /// 全部记录输出后调用
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// 千位分组：1234567 -> "1,234,567"
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// 报告文本
pub fn report_text(value: Option<Value>) -> String {
    match value {
        None => ABSENT_MARKER.to_string(),
        Some(Value::Count(n)) => group_thousands(n),
        Some(Value::Millis(ms)) => {
            format!("{}.{:03}", group_thousands(ms.whole_millis()), ms.fraction())
        }
        Some(Value::Flag(flag)) => flag_text(flag).to_string(),
        Some(Value::Shift(shift)) => shift.to_string(),
    }
}

/// CSV 文本
pub fn csv_text(value: Option<Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::Count(n)) => n.to_string(),
        Some(Value::Millis(ms)) => ms.to_string(),
        Some(Value::Flag(flag)) => flag_text(flag).to_string(),
        Some(Value::Shift(shift)) => shift.to_string(),
    }
}

fn flag_text(flag: bool) -> &'static str {
    if flag {
        "1"
    } else {
        "0"
    }
}
