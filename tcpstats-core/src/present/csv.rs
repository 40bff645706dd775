//! CSV 输出
//!
//! 每次运行只输出一行表头；每个类别无论是否可用都占用固定列数，
//! 缺失类别以等量空字段补齐，保证所有行与表头列数一致。

use super::{csv_text, Presenter};
use crate::normalize::NormalizedRecord;
use crate::schema::{self, Category};
use std::io::{self, Write};

pub struct CsvPresenter<W: Write> {
    out: W,
    header_written: bool,
}

impl<W: Write> CsvPresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            header_written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_header(&mut self) -> io::Result<()> {
        if !self.header_written {
            writeln!(self.out, "{}", schema::csv_header().join(","))?;
            self.header_written = true;
        }
        Ok(())
    }
}

/// 单条记录的全部列
pub fn csv_fields(record: &NormalizedRecord) -> Vec<String> {
    let conn = &record.connection;
    let mut fields = Vec::with_capacity(schema::column_count());

    fields.push(conn.local_addr.to_string());
    fields.push(conn.local_port.to_string());
    fields.push(conn.remote_addr.to_string());
    fields.push(conn.remote_port.to_string());
    fields.push(conn.state.to_string());
    fields.push(conn.pid.to_string());

    for category in Category::ALL {
        match record.category(category) {
            Some(stats) => fields.extend(stats.values().iter().map(|v| csv_text(*v))),
            None => fields.extend(std::iter::repeat(String::new()).take(category.field_count())),
        }
    }

    fields
}

/// 单条记录的 CSV 行（不含换行）
pub fn csv_row(record: &NormalizedRecord) -> String {
    csv_fields(record).join(",")
}

impl<W: Write> Presenter for CsvPresenter<W> {
    fn begin(&mut self, _connection_count: usize) -> io::Result<()> {
        self.write_header()
    }

    fn record(&mut self, record: &NormalizedRecord) -> io::Result<()> {
        self.write_header()?;
        writeln!(self.out, "{}", csv_row(record))
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{CategorySet, RawPayload, RawPayloads};
    use crate::normalize::normalize;
    use crate::schema::Source;
    use crate::{Connection, TcpState};

    fn conn(remote: &str) -> Connection {
        Connection {
            local_addr: "10.1.1.1".parse().unwrap(),
            local_port: 3389,
            remote_addr: remote.parse().unwrap(),
            remote_port: 60000,
            state: TcpState::Established,
            pid: 1000,
            local_scope_id: 0,
            remote_scope_id: 0,
        }
    }

    fn filled(category: Category, value: u64) -> RawPayload {
        let layout = category.layout();
        let mut bytes = vec![0u8; layout.size()];
        for slot in 0..category.wire().len() {
            layout.write(&mut bytes, slot, value);
        }
        RawPayload { category, bytes }
    }

    #[test]
    fn header_is_written_once() {
        let mut presenter = CsvPresenter::new(Vec::new());
        presenter.begin(2).unwrap();
        let record = normalize(conn("10.1.1.2"), CategorySet::empty(), &RawPayloads::new());
        presenter.record(&record).unwrap();
        presenter.record(&record).unwrap();

        let text = String::from_utf8(presenter.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("LocalIP,LocalPort,"));
        assert!(!lines[1].starts_with("LocalIP"));
    }

    #[test]
    fn header_precedes_rows_even_without_begin() {
        let mut presenter = CsvPresenter::new(Vec::new());
        let record = normalize(conn("10.1.1.2"), CategorySet::empty(), &RawPayloads::new());
        presenter.record(&record).unwrap();

        let text = String::from_utf8(presenter.into_inner()).unwrap();
        assert!(text.starts_with("LocalIP,"));
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn disabled_collection_still_emits_full_width_row() {
        let record = normalize(conn("10.1.1.2"), CategorySet::empty(), &RawPayloads::new());
        let fields = csv_fields(&record);
        assert_eq!(fields.len(), schema::column_count());
        assert_eq!(&fields[..6], &["10.1.1.1", "3389", "10.1.1.2", "60000", "ESTABLISHED", "1000"]);
        assert!(fields[6..].iter().all(String::is_empty));
    }

    #[test]
    fn every_row_has_header_width_regardless_of_availability() {
        let header_width = schema::csv_header().len();
        let mut presenter = CsvPresenter::new(Vec::new());

        let mixes = [
            vec![],
            vec![Category::Data],
            Category::ALL.to_vec(),
            vec![Category::FineRtt, Category::Path],
        ];
        for (i, present) in mixes.into_iter().enumerate() {
            let mut payloads = RawPayloads::new();
            for category in present {
                payloads.insert(filled(category, 3));
            }
            let remote = format!("10.1.1.{}", i + 2);
            let record = normalize(conn(&remote), CategorySet::all(), &payloads);
            presenter.record(&record).unwrap();
        }

        let text = String::from_utf8(presenter.into_inner()).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert_eq!(header.split(',').count(), header_width);
        for line in lines {
            assert_eq!(line.split(',').count(), header_width, "row: {}", line);
        }
    }

    #[test]
    fn sentinels_render_empty_never_as_numbers() {
        let mut payloads = RawPayloads::new();
        payloads.insert(filled(Category::FineRtt, u32::MAX as u64));
        payloads.insert(filled(Category::Data, u64::MAX));
        let record = normalize(conn("10.1.1.2"), CategorySet::all(), &payloads);

        let row = csv_row(&record);
        assert!(!row.contains("4294967295"));
        assert!(!row.contains("4294967.295"));
        assert!(!row.contains("18446744073709551615"));
    }

    #[test]
    fn values_land_in_their_own_columns() {
        let layout = Category::FineRtt.layout();
        let mut bytes = vec![0u8; layout.size()];
        layout.write(&mut bytes, 0, 1500);
        layout.write(&mut bytes, 1, u32::MAX as u64);
        let mut payloads = RawPayloads::new();
        payloads.insert(RawPayload { category: Category::FineRtt, bytes });

        let record = normalize(conn("10.1.1.2"), CategorySet::all(), &payloads);
        let header = schema::csv_header();
        let fields = csv_fields(&record);
        let column = |name: &str| fields[header.iter().position(|h| *h == name).unwrap()].clone();

        assert_eq!(column("FineRttVar"), "1.500");
        assert_eq!(column("FineMaxRtt"), "");
        assert_eq!(column("FineMinRtt"), "0.000");
        assert_eq!(column("CurCwnd"), "");
    }

    #[test]
    fn ipv6_addresses_are_written_bare() {
        let mut c = conn("10.1.1.2");
        c.local_addr = "fe80::1".parse().unwrap();
        c.remote_addr = "2001:db8::2".parse().unwrap();
        let record = normalize(c, CategorySet::empty(), &RawPayloads::new());
        let fields = csv_fields(&record);
        assert_eq!(fields[0], "fe80::1");
        assert_eq!(fields[2], "2001:db8::2");
    }

    #[test]
    fn unreported_columns_stay_empty_in_present_category() {
        let mut payloads = RawPayloads::new();
        payloads.insert(filled(Category::Data, 5));
        let record = normalize(conn("10.1.1.2"), CategorySet::all(), &payloads);
        let fields = csv_fields(&record);

        let data: Vec<_> = Category::Data.fields().zip(&fields[6..26]).collect();
        for (spec, text) in data {
            match spec.source {
                Source::Wire(_) => assert_eq!(text, "5", "{}", spec.column),
                Source::Unreported => assert_eq!(text, "", "{}", spec.column),
            }
        }
    }
}
