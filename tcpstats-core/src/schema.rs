//! 统计类别模式注册表
//!
//! 8 个扩展统计类别的唯一声明处：
//! - 原生只读动态结构（ROD v0）的字段宽度序列，偏移与大小据此按 C 自然对齐推导
//! - 每个输出字段的 CSV 列名、报告标签、语义类型、单位与原生槽位
//! - 报告分节（单列 / 双列 / 行内）；扁平字段顺序由分节展开得到
//!
//! 归一化器与展示层都只通过这里取字段，两种输出的列顺序因此不会漂移。

use serde::{Deserialize, Serialize};

/// 类别数量
pub const CATEGORY_COUNT: usize = 8;

/// 标识列（每行固定的前 6 列）
pub const IDENTITY_COLUMNS: [&str; 6] = [
    "LocalIP",
    "LocalPort",
    "RemoteIP",
    "RemotePort",
    "State",
    "PID",
];

/// 扩展统计类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Data,
    Path,
    SendCongestion,
    SendBuffer,
    Receive,
    ObservedReceive,
    Bandwidth,
    FineRtt,
}

impl Category {
    /// 注册表顺序，即 CSV 列顺序
    pub const ALL: [Category; CATEGORY_COUNT] = [
        Category::Data,
        Category::Path,
        Category::SendCongestion,
        Category::SendBuffer,
        Category::Receive,
        Category::ObservedReceive,
        Category::Bandwidth,
        Category::FineRtt,
    ];

    pub fn index(self) -> usize {
        match self {
            Category::Data => 0,
            Category::Path => 1,
            Category::SendCongestion => 2,
            Category::SendBuffer => 3,
            Category::Receive => 4,
            Category::ObservedReceive => 5,
            Category::Bandwidth => 6,
            Category::FineRtt => 7,
        }
    }

    /// TCP_ESTATS_TYPE 编码
    pub fn estats_type(self) -> i32 {
        match self {
            Category::Data => 1,
            Category::SendCongestion => 2,
            Category::Path => 3,
            Category::SendBuffer => 4,
            Category::Receive => 5,
            Category::ObservedReceive => 6,
            Category::Bandwidth => 7,
            Category::FineRtt => 8,
        }
    }

    /// 开启收集时写入的 RW 结构
    ///
    /// 带宽类别的 RW 结构是两个 TCP_BOOLEAN_OPTIONAL（出站 / 入站），
    /// 其余类别均为单字节 EnableCollection。
    pub fn enable_block(self) -> &'static [u8] {
        match self {
            Category::Bandwidth => &[1, 0, 0, 0, 1, 0, 0, 0],
            _ => &[1],
        }
    }

    /// 原生 ROD v0 结构的字段宽度序列
    pub fn wire(self) -> &'static [Width] {
        use Width::*;
        match self {
            Category::Data => &[
                U64, U64, U64, U64, U64, U64, // DataBytesOut .. SegsIn
                U32, U32, U32, U32, U32, // SoftErrors .. SndMax
                U64, // ThruBytesAcked
                U32, // RcvNxt
                U64, // ThruBytesReceived
            ],
            Category::Path => &[U32; 40],
            Category::SendCongestion => &[
                U32, U32, Ptr, U32, U32, Ptr, U32, U32, Ptr, // SndLim*
                U32, U32, U32, U32, U32, U32, U32, U32, U32,
            ],
            Category::SendBuffer => &[Ptr, Ptr, Ptr, Ptr],
            Category::Receive => &[
                U32, U32, U32, U32, U32, U32, U32, U32, U32, U32, U32,
                Ptr, Ptr, // CurAppRQueue, MaxAppRQueue
                U8,  // WinScaleSent
            ],
            Category::ObservedReceive => &[U32, U32, U32, U8],
            Category::Bandwidth => &[U64, U64, U64, U64, U8, U8],
            Category::FineRtt => &[U32, U32, U32, U32],
        }
    }

    pub fn layout(self) -> Layout {
        Layout::of(self.wire())
    }

    /// 报告分节
    pub fn sections(self) -> &'static [Section] {
        match self {
            Category::Data => DATA_SECTIONS,
            Category::Path => PATH_SECTIONS,
            Category::SendCongestion => SND_CONG_SECTIONS,
            Category::SendBuffer => SEND_BUFF_SECTIONS,
            Category::Receive => REC_SECTIONS,
            Category::ObservedReceive => OBS_REC_SECTIONS,
            Category::Bandwidth => BANDWIDTH_SECTIONS,
            Category::FineRtt => FINE_RTT_SECTIONS,
        }
    }

    /// 扁平字段顺序（CSV 列顺序）
    pub fn fields(self) -> impl Iterator<Item = &'static FieldSpec> {
        self.sections()
            .iter()
            .flat_map(|s| s.rows.iter())
            .flat_map(|r| r.fields.iter())
    }

    pub fn field_count(self) -> usize {
        self.fields().count()
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Data => write!(f, "Data"),
            Category::Path => write!(f, "Path"),
            Category::SendCongestion => write!(f, "SndCong"),
            Category::SendBuffer => write!(f, "SendBuff"),
            Category::Receive => write!(f, "Rec"),
            Category::ObservedReceive => write!(f, "ObsRec"),
            Category::Bandwidth => write!(f, "Bandwidth"),
            Category::FineRtt => write!(f, "FineRtt"),
        }
    }
}

/// 原生字段宽度；哨兵值为该宽度的全 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    U8,
    U32,
    U64,
    /// SIZE_T，随目标指针宽度变化
    Ptr,
}

impl Width {
    pub fn size(self) -> usize {
        match self {
            Width::U8 => 1,
            Width::U32 => 4,
            Width::U64 => 8,
            Width::Ptr => std::mem::size_of::<usize>(),
        }
    }

    pub fn sentinel(self) -> u64 {
        match self {
            Width::U8 => u8::MAX as u64,
            Width::U32 => u32::MAX as u64,
            Width::U64 => u64::MAX,
            Width::Ptr => usize::MAX as u64,
        }
    }
}

/// 按自然对齐推导出的结构布局
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    offsets: Vec<usize>,
    widths: Vec<Width>,
    size: usize,
}

impl Layout {
    pub fn of(wire: &[Width]) -> Self {
        let mut offsets = Vec::with_capacity(wire.len());
        let mut cursor = 0usize;
        let mut max_align = 1usize;

        for width in wire {
            let align = width.size();
            cursor = align_up(cursor, align);
            offsets.push(cursor);
            cursor += width.size();
            max_align = max_align.max(align);
        }

        Self {
            offsets,
            widths: wire.to_vec(),
            size: align_up(cursor, max_align),
        }
    }

    /// 结构总大小（即读取缓冲区大小）
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn offset(&self, slot: usize) -> Option<usize> {
        self.offsets.get(slot).copied()
    }

    pub fn width(&self, slot: usize) -> Option<Width> {
        self.widths.get(slot).copied()
    }

    /// 按本机字节序读出槽位的原始值；越界返回 None
    pub fn read(&self, bytes: &[u8], slot: usize) -> Option<u64> {
        let offset = self.offset(slot)?;
        let width = self.width(slot)?;
        let raw = bytes.get(offset..offset + width.size())?;

        let value = match raw.len() {
            1 => raw[0] as u64,
            4 => u32::from_ne_bytes(raw.try_into().ok()?) as u64,
            8 => u64::from_ne_bytes(raw.try_into().ok()?),
            _ => return None,
        };
        Some(value)
    }

    /// 按本机字节序写入槽位（构造测试负载、替身网关使用）
    pub fn write(&self, bytes: &mut [u8], slot: usize, value: u64) -> bool {
        let (Some(offset), Some(width)) = (self.offset(slot), self.width(slot)) else {
            return false;
        };
        let Some(target) = bytes.get_mut(offset..offset + width.size()) else {
            return false;
        };

        match target.len() {
            1 => target[0] = value as u8,
            4 => target.copy_from_slice(&(value as u32).to_ne_bytes()),
            8 => target.copy_from_slice(&value.to_ne_bytes()),
            _ => return false,
        }
        true
    }
}

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) / align * align
}

/// 字段语义类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// 计数器（包数、次数、序号）
    Counter,
    /// 字节数
    Bytes,
    /// 毫秒时长
    Duration,
    /// 微秒时长，输出时换算为 3 位小数的毫秒
    FineDuration,
    /// 布尔标志
    Flag,
    /// 窗口缩放位移
    ScaleShift,
}

/// 字段在原生结构中的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Wire(usize),
    /// CSV 列在 v0 结构中没有对应字段，恒为缺失
    Unreported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub column: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub unit: &'static str,
    pub source: Source,
}

/// 报告行样式，参数为数值列宽
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStyle {
    Single(usize),
    Pair(usize),
    Inline(usize),
}

#[derive(Debug, Clone, Copy)]
pub struct Row {
    pub style: RowStyle,
    pub fields: &'static [FieldSpec],
}

#[derive(Debug, Clone, Copy)]
pub struct Section {
    pub title: &'static str,
    pub rows: &'static [Row],
}

/// 完整 CSV 表头
pub fn csv_header() -> Vec<&'static str> {
    IDENTITY_COLUMNS
        .iter()
        .copied()
        .chain(Category::ALL.iter().flat_map(|c| c.fields().map(|f| f.column)))
        .collect()
}

/// 每行固定列数
pub fn column_count() -> usize {
    IDENTITY_COLUMNS.len() + Category::ALL.iter().map(|c| c.field_count()).sum::<usize>()
}

const fn wire(
    column: &'static str,
    label: &'static str,
    kind: FieldKind,
    unit: &'static str,
    slot: usize,
) -> FieldSpec {
    FieldSpec {
        column,
        label,
        kind,
        unit,
        source: Source::Wire(slot),
    }
}

const fn unreported(
    column: &'static str,
    label: &'static str,
    kind: FieldKind,
    unit: &'static str,
) -> FieldSpec {
    FieldSpec {
        column,
        label,
        kind,
        unit,
        source: Source::Unreported,
    }
}

const fn single(width: usize, fields: &'static [FieldSpec]) -> Row {
    Row {
        style: RowStyle::Single(width),
        fields,
    }
}

const fn pair(width: usize, fields: &'static [FieldSpec]) -> Row {
    Row {
        style: RowStyle::Pair(width),
        fields,
    }
}

use FieldKind::{Bytes, Counter, Duration, FineDuration, Flag, ScaleShift};

static DATA_SECTIONS: &[Section] = &[
    Section {
        title: "DATA TRANSFER",
        rows: &[
            pair(
                15,
                &[
                    wire("DataBytesOut", "Data Bytes Out", Bytes, "bytes", 0),
                    wire("DataBytesIn", "Data Bytes In", Bytes, "bytes", 2),
                ],
            ),
            pair(
                15,
                &[
                    wire("DataSegsOut", "Data Segs Out", Counter, "pkts", 1),
                    wire("DataSegsIn", "Data Segs In", Counter, "pkts", 3),
                ],
            ),
            pair(
                15,
                &[
                    wire("TotalSegsOut", "Total Segs Out", Counter, "pkts", 4),
                    wire("TotalSegsIn", "Total Segs In", Counter, "pkts", 5),
                ],
            ),
            pair(
                15,
                &[
                    wire("ThruBytesAcked", "Thru Bytes Acked", Bytes, "bytes", 11),
                    wire(
                        "ThruBytesReceived",
                        "Thru Bytes Received",
                        Bytes,
                        "bytes",
                        13,
                    ),
                ],
            ),
        ],
    },
    Section {
        title: "RETRANSMISSIONS",
        rows: &[
            single(
                15,
                &[unreported("SegsRetrans", "Segments Retrans", Counter, "pkts")],
            ),
            single(
                15,
                &[unreported("BytesRetrans", "Bytes Retrans", Bytes, "bytes")],
            ),
            single(
                15,
                &[unreported("FastRetrans", "Fast Retransmits", Counter, "count")],
            ),
            single(
                15,
                &[unreported("TimeoutEpisodes", "Timeout Episodes", Counter, "count")],
            ),
            single(
                15,
                &[unreported("SynRetrans", "SYN Retransmits", Counter, "count")],
            ),
        ],
    },
    Section {
        title: "DUPLICATE ACKS & ERRORS",
        rows: &[
            single(
                15,
                &[unreported("DupAcksIn", "Dup ACKs In", Counter, "pkts")],
            ),
            pair(
                15,
                &[
                    wire("SoftErrors", "Soft Errors", Counter, "count", 6),
                    wire("SoftErrorReason", "Reason", Counter, "", 7),
                ],
            ),
        ],
    },
    Section {
        title: "SEQUENCE NUMBERS",
        rows: &[Row {
            style: RowStyle::Inline(12),
            fields: &[
                wire("SndUna", "SndUna", Counter, "", 8),
                wire("SndNxt", "SndNxt", Counter, "", 9),
                wire("SndMax", "SndMax", Counter, "", 10),
                wire("RcvNxt", "RcvNxt", Counter, "", 12),
            ],
        }],
    },
];

static PATH_SECTIONS: &[Section] = &[
    Section {
        title: "PATH METRICS",
        rows: &[
            pair(
                10,
                &[
                    wire("SampleRtt", "Sample RTT", Duration, "ms", 26),
                    wire("SmoothedRtt", "Smoothed RTT", Duration, "ms", 27),
                ],
            ),
            pair(
                10,
                &[
                    wire("RttVar", "RTT Variance", Duration, "ms", 28),
                    wire("MinRtt", "Min RTT", Duration, "ms", 30),
                ],
            ),
            pair(
                10,
                &[
                    wire("MaxRtt", "Max RTT", Duration, "ms", 29),
                    wire("SumRtt", "Sum RTT", Duration, "ms", 31),
                ],
            ),
            single(10, &[wire("RttCount", "RTT Count", Counter, "samples", 32)]),
        ],
    },
    Section {
        title: "RETRANSMISSION TIMEOUTS (RTO)",
        rows: &[
            pair(
                10,
                &[
                    wire("CurRto", "Current RTO", Duration, "ms", 33),
                    wire("MinRto", "Min RTO", Duration, "ms", 35),
                ],
            ),
            single(10, &[wire("MaxRto", "Max RTO", Duration, "ms", 34)]),
            pair(
                10,
                &[
                    wire("Timeouts", "Timeouts", Counter, "count", 1),
                    wire("SubsequentTimeouts", "Subsequent", Counter, "count", 2),
                ],
            ),
            pair(
                10,
                &[
                    wire("CurTimeoutCount", "Cur Timeout Count", Counter, "count", 3),
                    wire("AbruptTimeouts", "Abrupt Timeouts", Counter, "count", 4),
                ],
            ),
            single(
                10,
                &[wire(
                    "SpuriousRtoDetections",
                    "Spurious RTO Detect",
                    Counter,
                    "count",
                    39,
                )],
            ),
        ],
    },
    Section {
        title: "RETRANSMISSIONS (PATH)",
        rows: &[
            single(
                15,
                &[wire("PathPktsRetrans", "Packets Retrans", Counter, "pkts", 5)],
            ),
            single(
                15,
                &[wire("PathBytesRetrans", "Bytes Retrans", Bytes, "bytes", 6)],
            ),
            single(
                15,
                &[wire("PathFastRetrans", "Fast Retrans", Counter, "count", 0)],
            ),
            single(
                10,
                &[wire("RetranThresh", "Retrans Threshold", Counter, "pkts", 19)],
            ),
        ],
    },
    Section {
        title: "DUPLICATE ACKS & SACKS",
        rows: &[
            single(
                15,
                &[wire("PathDupAcksIn", "Dup ACKs In", Counter, "pkts", 7)],
            ),
            single(
                15,
                &[wire("DupAckEpisodes", "Dup ACK Episodes", Counter, "count", 20)],
            ),
            single(
                15,
                &[wire("SacksRcvd", "SACKs Received", Counter, "pkts", 8)],
            ),
            single(
                15,
                &[wire("SackBlocksRcvd", "SACK Blocks Rcvd", Counter, "blocks", 9)],
            ),
            single(
                15,
                &[wire("DsackDups", "DSACK Duplicates", Counter, "count", 25)],
            ),
        ],
    },
    Section {
        title: "REORDERING",
        rows: &[
            single(
                15,
                &[wire("BytesReordered", "Bytes Reordered", Bytes, "bytes", 21)],
            ),
            pair(
                10,
                &[
                    wire("NonRecovDa", "Non-Recov DA", Counter, "count", 22),
                    wire("NonRecovDaEpisodes", "Episodes", Counter, "count", 23),
                ],
            ),
            single(
                15,
                &[wire("AckAfterFr", "ACK After FR", Counter, "pkts", 24)],
            ),
        ],
    },
    Section {
        title: "CONGESTION SIGNALS",
        rows: &[
            single(
                15,
                &[wire("CongSignals", "Congestion Signals", Counter, "count", 10)],
            ),
            pair(
                10,
                &[
                    wire("EcnSignals", "ECN Signals", Counter, "count", 15),
                    wire("EceRcvd", "ECE Received", Counter, "pkts", 16),
                ],
            ),
            pair(
                10,
                &[
                    wire("PreCongSumCwnd", "Pre-Cong Sum Cwnd", Bytes, "bytes", 11),
                    wire("PreCongSumRtt", "Pre-Cong Sum RTT", Duration, "ms", 12),
                ],
            ),
            pair(
                10,
                &[
                    wire("PostCongSumRtt", "Post-Cong Sum RTT", Duration, "ms", 13),
                    wire("PostCongCountRtt", "Post-Cong Count", Counter, "count", 14),
                ],
            ),
        ],
    },
    Section {
        title: "MAXIMUM SEGMENT SIZE",
        rows: &[
            single(10, &[wire("CurMss", "Current MSS", Bytes, "bytes", 36)]),
            pair(
                10,
                &[
                    wire("MaxMss", "Max MSS", Bytes, "bytes", 37),
                    wire("MinMss", "Min MSS", Bytes, "bytes", 38),
                ],
            ),
        ],
    },
    Section {
        title: "OTHER",
        rows: &[pair(
            10,
            &[
                wire("SendStall", "Send Stall", Counter, "count", 17),
                wire("QuenchRcvd", "Quench Received", Counter, "count", 18),
            ],
        )],
    },
];

static SND_CONG_SECTIONS: &[Section] = &[
    Section {
        title: "CONGESTION CONTROL",
        rows: &[
            single(15, &[wire("CurCwnd", "Current Cwnd", Bytes, "bytes", 12)]),
            single(
                15,
                &[wire("CurSsthresh", "Current Ssthresh", Bytes, "bytes", 15)],
            ),
            single(
                15,
                &[wire("MaxSsCwnd", "Max Slow Start Cwnd", Bytes, "bytes", 13)],
            ),
            single(
                15,
                &[wire("MaxCaCwnd", "Max Cong Avoid Cwnd", Bytes, "bytes", 14)],
            ),
            single(
                15,
                &[wire("MaxSsthresh", "Max Ssthresh", Bytes, "bytes", 16)],
            ),
            single(
                15,
                &[wire("MinSsthresh", "Min Ssthresh", Bytes, "bytes", 17)],
            ),
        ],
    },
    Section {
        title: "CONGESTION PHASES",
        rows: &[
            single(
                10,
                &[wire("SlowStart", "Slow Start Count", Counter, "count", 9)],
            ),
            single(
                10,
                &[wire("CongAvoid", "Cong Avoidance Cnt", Counter, "count", 10)],
            ),
            single(
                10,
                &[wire("OtherReductions", "Other Reductions", Counter, "count", 11)],
            ),
        ],
    },
    Section {
        title: "SEND LIMITING (Receiver Window)",
        rows: &[
            pair(
                10,
                &[
                    wire("SndLimTransRwin", "Trans Limited", Counter, "count", 0),
                    wire("SndLimTimeRwin", "Time Limited", Duration, "ms", 1),
                ],
            ),
            single(
                15,
                &[wire("SndLimBytesRwin", "Bytes Limited", Bytes, "bytes", 2)],
            ),
        ],
    },
    Section {
        title: "SEND LIMITING (Congestion Window)",
        rows: &[
            pair(
                10,
                &[
                    wire("SndLimTransCwnd", "Trans Limited", Counter, "count", 3),
                    wire("SndLimTimeCwnd", "Time Limited", Duration, "ms", 4),
                ],
            ),
            single(
                15,
                &[wire("SndLimBytesCwnd", "Bytes Limited", Bytes, "bytes", 5)],
            ),
        ],
    },
    Section {
        title: "SEND LIMITING (Sender)",
        rows: &[
            pair(
                10,
                &[
                    wire("SndLimTransSnd", "Trans Limited", Counter, "count", 6),
                    wire("SndLimTimeSnd", "Time Limited", Duration, "ms", 7),
                ],
            ),
            single(
                15,
                &[wire("SndLimBytesSnd", "Bytes Limited", Bytes, "bytes", 8)],
            ),
        ],
    },
];

static SEND_BUFF_SECTIONS: &[Section] = &[Section {
    title: "SEND BUFFERS",
    rows: &[
        single(
            15,
            &[wire("CurRetxQueue", "Cur Retrans Queue", Bytes, "bytes", 0)],
        ),
        single(
            15,
            &[wire("MaxRetxQueue", "Max Retrans Queue", Bytes, "bytes", 1)],
        ),
        single(
            15,
            &[wire("CurAppWQueue", "Cur App Write Queue", Bytes, "bytes", 2)],
        ),
        single(
            15,
            &[wire("MaxAppWQueue", "Max App Write Queue", Bytes, "bytes", 3)],
        ),
    ],
}];

static REC_SECTIONS: &[Section] = &[
    Section {
        title: "RECEIVE WINDOWS",
        rows: &[
            single(
                15,
                &[wire("CurRwinSent", "Cur Rwin Sent", Bytes, "bytes", 0)],
            ),
            single(
                15,
                &[wire("MaxRwinSent", "Max Rwin Sent", Bytes, "bytes", 1)],
            ),
            single(
                15,
                &[wire("MinRwinSent", "Min Rwin Sent", Bytes, "bytes", 2)],
            ),
            single(
                15,
                &[unreported("CurRwinRcvd", "Cur Rwin Received", Bytes, "bytes")],
            ),
            single(
                15,
                &[unreported("MaxRwinRcvd", "Max Rwin Received", Bytes, "bytes")],
            ),
            single(
                15,
                &[unreported("MinRwinRcvd", "Min Rwin Received", Bytes, "bytes")],
            ),
            single(15, &[wire("LimRwin", "Limited Rwin", Bytes, "bytes", 3)]),
        ],
    },
    Section {
        title: "WINDOW SCALING",
        rows: &[pair(
            10,
            &[
                wire("WinScaleSent", "Win Scale Sent", ScaleShift, "shift", 13),
                unreported("WinScaleRcvd", "Win Scale Received", ScaleShift, "shift"),
            ],
        )],
    },
    Section {
        title: "DUPLICATE ACKS & ECN",
        rows: &[
            pair(
                10,
                &[
                    wire("RecDupAckEpisodes", "Dup ACK Episodes", Counter, "count", 4),
                    wire("RecDupAcksOut", "Dup ACKs Out", Counter, "pkts", 5),
                ],
            ),
            pair(
                10,
                &[
                    wire("CeRcvd", "CE Received", Counter, "pkts", 6),
                    wire("EcnSent", "ECN Sent", Counter, "pkts", 7),
                ],
            ),
            single(
                10,
                &[wire("EcnNoncesRcvd", "ECN Nonces Received", Counter, "count", 8)],
            ),
        ],
    },
    Section {
        title: "RECEIVE QUEUES",
        rows: &[
            single(
                15,
                &[wire("CurReasmQueue", "Cur Reassembly Q", Bytes, "bytes", 9)],
            ),
            single(
                15,
                &[wire("MaxReasmQueue", "Max Reassembly Q", Bytes, "bytes", 10)],
            ),
            single(
                15,
                &[wire("CurAppRQueue", "Cur App Read Queue", Bytes, "bytes", 11)],
            ),
            single(
                15,
                &[wire("MaxAppRQueue", "Max App Read Queue", Bytes, "bytes", 12)],
            ),
        ],
    },
];

static OBS_REC_SECTIONS: &[Section] = &[Section {
    title: "OBSERVED RECEIVE",
    rows: &[
        pair(
            10,
            &[
                unreported("ObsMinRtt", "Min RTT", Duration, "ms"),
                unreported("ObsBaseRtt", "Base RTT", Duration, "ms"),
            ],
        ),
        single(
            15,
            &[wire("ObsCurRwinRcvd", "Cur Rwin Received", Bytes, "bytes", 0)],
        ),
        single(
            15,
            &[wire("ObsMaxRwinRcvd", "Max Rwin Received", Bytes, "bytes", 1)],
        ),
        single(
            15,
            &[wire("ObsMinRwinRcvd", "Min Rwin Received", Bytes, "bytes", 2)],
        ),
        single(
            10,
            &[wire(
                "ObsWinScaleRcvd",
                "Win Scale Received",
                ScaleShift,
                "shift",
                3,
            )],
        ),
    ],
}];

static BANDWIDTH_SECTIONS: &[Section] = &[Section {
    title: "BANDWIDTH ESTIMATES",
    rows: &[
        single(
            15,
            &[wire("OutboundBandwidth", "Outbound", Counter, "bps", 0)],
        ),
        single(
            15,
            &[wire("InboundBandwidth", "Inbound", Counter, "bps", 1)],
        ),
        single(
            15,
            &[wire(
                "OutboundInstability",
                "Outbound Instability",
                Counter,
                "count",
                2,
            )],
        ),
        single(
            15,
            &[wire(
                "InboundInstability",
                "Inbound Instability",
                Counter,
                "count",
                3,
            )],
        ),
        pair(
            10,
            &[
                wire(
                    "OutboundBandwidthPeaked",
                    "Outbound Peaked",
                    Flag,
                    "flag",
                    4,
                ),
                wire("InboundBandwidthPeaked", "Inbound Peaked", Flag, "flag", 5),
            ],
        ),
    ],
}];

static FINE_RTT_SECTIONS: &[Section] = &[Section {
    title: "FINE-GRAINED RTT (High Resolution)",
    rows: &[
        single(
            10,
            &[wire("FineRttVar", "RTT Variance", FineDuration, "ms", 0)],
        ),
        single(10, &[wire("FineMaxRtt", "Max RTT", FineDuration, "ms", 1)]),
        single(10, &[wire("FineMinRtt", "Min RTT", FineDuration, "ms", 2)]),
        single(10, &[wire("FineSumRtt", "Sum RTT", FineDuration, "ms", 3)]),
    ],
}];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const PUBLISHED_HEADER: &str = "LocalIP,LocalPort,RemoteIP,RemotePort,State,PID,\
        DataBytesOut,DataBytesIn,DataSegsOut,DataSegsIn,TotalSegsOut,TotalSegsIn,\
        ThruBytesAcked,ThruBytesReceived,\
        SegsRetrans,BytesRetrans,FastRetrans,TimeoutEpisodes,SynRetrans,\
        DupAcksIn,SoftErrors,SoftErrorReason,\
        SndUna,SndNxt,SndMax,RcvNxt,\
        SampleRtt,SmoothedRtt,RttVar,MinRtt,MaxRtt,SumRtt,RttCount,\
        CurRto,MinRto,MaxRto,Timeouts,SubsequentTimeouts,CurTimeoutCount,AbruptTimeouts,\
        SpuriousRtoDetections,\
        PathPktsRetrans,PathBytesRetrans,PathFastRetrans,RetranThresh,\
        PathDupAcksIn,DupAckEpisodes,SacksRcvd,SackBlocksRcvd,DsackDups,\
        BytesReordered,NonRecovDa,NonRecovDaEpisodes,AckAfterFr,\
        CongSignals,EcnSignals,EceRcvd,PreCongSumCwnd,PreCongSumRtt,\
        PostCongSumRtt,PostCongCountRtt,\
        CurMss,MaxMss,MinMss,\
        SendStall,QuenchRcvd,\
        CurCwnd,CurSsthresh,MaxSsCwnd,MaxCaCwnd,MaxSsthresh,MinSsthresh,\
        SlowStart,CongAvoid,OtherReductions,\
        SndLimTransRwin,SndLimTimeRwin,SndLimBytesRwin,\
        SndLimTransCwnd,SndLimTimeCwnd,SndLimBytesCwnd,\
        SndLimTransSnd,SndLimTimeSnd,SndLimBytesSnd,\
        CurRetxQueue,MaxRetxQueue,CurAppWQueue,MaxAppWQueue,\
        CurRwinSent,MaxRwinSent,MinRwinSent,CurRwinRcvd,MaxRwinRcvd,MinRwinRcvd,LimRwin,\
        WinScaleSent,WinScaleRcvd,\
        RecDupAckEpisodes,RecDupAcksOut,CeRcvd,EcnSent,EcnNoncesRcvd,\
        CurReasmQueue,MaxReasmQueue,CurAppRQueue,MaxAppRQueue,\
        ObsMinRtt,ObsBaseRtt,ObsCurRwinRcvd,ObsMaxRwinRcvd,ObsMinRwinRcvd,ObsWinScaleRcvd,\
        OutboundBandwidth,InboundBandwidth,OutboundInstability,InboundInstability,\
        OutboundBandwidthPeaked,InboundBandwidthPeaked,\
        FineRttVar,FineMaxRtt,FineMinRtt,FineSumRtt";

    #[test]
    fn header_matches_published_column_contract() {
        assert_eq!(csv_header().join(","), PUBLISHED_HEADER);
        assert_eq!(column_count(), 122);
    }

    #[test]
    fn per_category_column_counts() {
        let counts: Vec<usize> = Category::ALL.iter().map(|c| c.field_count()).collect();
        assert_eq!(counts, vec![20, 40, 18, 4, 18, 6, 6, 4]);
    }

    #[test]
    fn wire_slots_are_used_exactly_once() {
        for category in Category::ALL {
            let slots: Vec<usize> = category
                .fields()
                .filter_map(|f| match f.source {
                    Source::Wire(slot) => Some(slot),
                    Source::Unreported => None,
                })
                .collect();
            let unique: HashSet<usize> = slots.iter().copied().collect();
            assert_eq!(unique.len(), slots.len(), "{} reuses a slot", category);
            assert_eq!(unique.len(), category.wire().len(), "{} leaves a slot unmapped", category);
            assert!(slots.iter().all(|s| *s < category.wire().len()));
        }
    }

    #[test]
    fn layout_follows_natural_alignment() {
        // 6 x u64, 5 x u32, (pad) u64, u32, (pad) u64
        let data = Category::Data.layout();
        assert_eq!(data.offset(6), Some(48));
        assert_eq!(data.offset(11), Some(72));
        assert_eq!(data.offset(13), Some(88));
        assert_eq!(data.size(), 96);

        assert_eq!(Category::Path.layout().size(), 160);
        assert_eq!(Category::FineRtt.layout().size(), 16);
        // 3 x u32 + u8，尾部补齐到 4
        assert_eq!(Category::ObservedReceive.layout().size(), 16);
        // 4 x u64 + 2 x u8，尾部补齐到 8
        assert_eq!(Category::Bandwidth.layout().size(), 40);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn pointer_sized_fields_on_64_bit() {
        assert_eq!(Category::SendBuffer.layout().size(), 32);
        let rec = Category::Receive.layout();
        assert_eq!(rec.offset(11), Some(48));
        assert_eq!(rec.offset(13), Some(64));
        assert_eq!(rec.size(), 72);
    }

    #[test]
    fn read_and_write_respect_width() {
        let layout = Category::Bandwidth.layout();
        let mut buf = vec![0u8; layout.size()];
        assert!(layout.write(&mut buf, 0, 1_000_000));
        assert!(layout.write(&mut buf, 4, 1));
        assert_eq!(layout.read(&buf, 0), Some(1_000_000));
        assert_eq!(layout.read(&buf, 4), Some(1));
        assert_eq!(layout.read(&buf, 5), Some(0));
        assert_eq!(layout.read(&buf, 6), None);
        assert_eq!(layout.read(&buf[..10], 1), None);
    }

    #[test]
    fn sentinel_is_all_bits_for_width() {
        assert_eq!(Width::U8.sentinel(), 0xFF);
        assert_eq!(Width::U32.sentinel(), 0xFFFF_FFFF);
        assert_eq!(Width::U64.sentinel(), u64::MAX);
        assert_eq!(Width::Ptr.sentinel(), usize::MAX as u64);
    }

    #[test]
    fn estats_type_codes_are_distinct() {
        let codes: HashSet<i32> = Category::ALL.iter().map(|c| c.estats_type()).collect();
        assert_eq!(codes.len(), CATEGORY_COUNT);
        assert!(!codes.contains(&0), "SynOpts is not collected");
        assert_eq!(Category::Bandwidth.enable_block().len(), 8);
        assert_eq!(Category::FineRtt.enable_block(), &[1u8]);
    }
}
