//! 人类可读报告
//!
//! 每个连接一个框线块：标识头之后按注册表顺序输出存在的类别，
//! 缺失类别整节跳过，不输出空标题。

use super::{report_text, Presenter};
use crate::normalize::{CategoryStats, NormalizedRecord};
use crate::schema::{FieldSpec, RowStyle};
use std::io::{self, Write};
use std::net::SocketAddr;

const RULE: &str = "═══════════════════════════════════════════════════════════════════════";
const LABEL_WIDTH: usize = 21;
const UNIT_WIDTH: usize = 8;

pub struct ReportPresenter<W: Write> {
    out: W,
}

impl<W: Write> ReportPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presenter for ReportPresenter<W> {
    fn begin(&mut self, connection_count: usize) -> io::Result<()> {
        writeln!(self.out, "Found {} TCP connections", connection_count)?;
        writeln!(self.out)
    }

    fn record(&mut self, record: &NormalizedRecord) -> io::Result<()> {
        for line in render_record(record) {
            writeln!(self.out, "{}", line)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// 渲染单个连接块（含结尾空行）
pub fn render_record(record: &NormalizedRecord) -> Vec<String> {
    let conn = &record.connection;
    let local = SocketAddr::new(conn.local_addr, conn.local_port);
    let remote = SocketAddr::new(conn.remote_addr, conn.remote_port);

    let mut lines = vec![
        format!("╔{}", RULE),
        format!("║ {} → {} [{}]", local, remote, conn.family()),
        format!("║ State: {:<15} PID: {}", conn.state.to_string(), conn.pid),
        format!("╠{}", RULE),
    ];

    if record.collection_enabled() {
        let mut first = true;
        for stats in record.present() {
            render_category(stats, &mut first, &mut lines);
        }
    } else {
        lines.push("║".to_string());
        lines.push("║ [TCP Statistics NOT Available]".to_string());
        lines.push("║ Run as Administrator to enable statistics collection.".to_string());
        lines.push("║ Use: Right-click Command Prompt → 'Run as administrator'".to_string());
    }

    lines.push(format!("╚{}", RULE));
    lines.push(String::new());
    lines
}

fn render_category(stats: &CategoryStats, first: &mut bool, lines: &mut Vec<String>) {
    let mut values = stats.values().iter().copied();

    for section in stats.category().sections() {
        if !*first {
            lines.push("║".to_string());
        }
        *first = false;
        lines.push(format!("║ {}:", section.title));

        for row in section.rows {
            let cells: Vec<(&FieldSpec, String)> = row
                .fields
                .iter()
                .map(|spec| (spec, report_text(values.next().flatten())))
                .collect();

            match row.style {
                RowStyle::Single(width) => {
                    for (spec, text) in &cells {
                        lines.push(finish_line(format!("║   {}", cell(spec, text, width, false))));
                    }
                }
                RowStyle::Pair(width) => {
                    for chunk in cells.chunks(2) {
                        let body = match chunk {
                            [(a, va), (b, vb)] => format!(
                                "{} {}",
                                cell(a, va, width, true),
                                cell(b, vb, width, false)
                            ),
                            [(a, va)] => cell(a, va, width, false),
                            _ => continue,
                        };
                        lines.push(finish_line(format!("║   {}", body)));
                    }
                }
                RowStyle::Inline(width) => {
                    let body: Vec<String> = cells
                        .iter()
                        .map(|(spec, text)| format!("{}: {:>width$}", spec.label, text))
                        .collect();
                    lines.push(finish_line(format!("║   {}", body.join("  "))));
                }
            }
        }
    }
}

/// `标签:` 左对齐，数值右对齐，单位跟随；`pad_unit` 用于双列左侧
fn cell(spec: &FieldSpec, text: &str, width: usize, pad_unit: bool) -> String {
    let label = format!("{}:", spec.label);
    if pad_unit {
        format!(
            "{:<lw$}{:>w$} {:<uw$}",
            label,
            text,
            spec.unit,
            lw = LABEL_WIDTH,
            w = width,
            uw = UNIT_WIDTH
        )
    } else {
        format!("{:<lw$}{:>w$} {}", label, text, spec.unit, lw = LABEL_WIDTH, w = width)
    }
}

fn finish_line(line: String) -> String {
    line.trim_end().to_string()
}
