use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 初學者譜面編號，只記錄通關狀態
pub const BEGINNER_CHART: i32 = 6;

/// 不適用的分數欄位
pub const NOT_APPLICABLE: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub clear_status: i32,
    pub ex_score: i32,
    pub miss_count: i32,
}

impl ScoreEntry {
    pub fn new(clear_status: i32, ex_score: i32, miss_count: i32) -> Self {
        Self {
            clear_status,
            ex_score,
            miss_count,
        }
    }

    pub fn beginner(clear_status: i32) -> Self {
        Self::new(clear_status, NOT_APPLICABLE, NOT_APPLICABLE)
    }
}

impl fmt::Display for ScoreEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(clear {}, ex {}, miss {})",
            self.clear_status, self.ex_score, self.miss_count
        )
    }
}

/// 歌曲 → 譜面 → 成績
pub type ScoreTable = BTreeMap<i32, BTreeMap<i32, ScoreEntry>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub clear_status: i32,
    pub pgnum: i32,
    pub gnum: i32,
}

/// 課程 → 課程譜面 → 紀錄
pub type CourseTable = BTreeMap<i32, BTreeMap<i32, CourseRecord>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpertPoints {
    pub n_point: i32,
    pub h_point: i32,
    pub a_point: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub ext_id: i32,
    pub sp_dan: i32,
    pub dp_dan: i32,
    pub deller: i32,
    pub ir_data: CourseTable,
    pub secret_course_data: CourseTable,
    pub expert_points: BTreeMap<i32, ExpertPoints>,
}

/// 一次送出的成績，`expected` 用來宣告服務端的已知例外結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub song: i32,
    pub chart: i32,
    pub clear_status: i32,
    pub perfect: i32,
    pub good: i32,
    pub miss: i32,
    pub ghost: Vec<u8>,
    pub expected: Option<ScoreEntry>,
}

impl Submission {
    pub fn ex_score(&self) -> i32 {
        self.perfect * 2 + self.good
    }

    pub fn as_entry(&self) -> ScoreEntry {
        ScoreEntry::new(self.clear_status, self.ex_score(), self.miss)
    }
}

/// 單打 (SP) 與雙打 (DP)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayStyle {
    Single,
    Double,
}

impl PlayStyle {
    pub fn wire_value(self) -> i32 {
        match self {
            PlayStyle::Single => 0,
            PlayStyle::Double => 1,
        }
    }

    /// 該風格在成績表中的 normal/hyper/another 譜面編號
    pub fn charts(self) -> [i32; 3] {
        match self {
            PlayStyle::Single => [0, 1, 2],
            PlayStyle::Double => [3, 4, 5],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourseCategory {
    InternetRanking,
    SecretCourse,
}

impl CourseCategory {
    pub fn wire_value(self) -> i32 {
        match self {
            CourseCategory::InternetRanking => 0,
            CourseCategory::SecretCourse => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSubmission {
    pub course_id: i32,
    pub course_chart: i32,
    pub clear_status: i32,
    pub pgnum: i32,
    pub gnum: i32,
}

impl CourseSubmission {
    pub fn as_record(&self) -> CourseRecord {
        CourseRecord {
            clear_status: self.clear_status,
            pgnum: self.pgnum,
            gnum: self.gnum,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InquiryMode {
    /// 卡片尚未註冊
    Unregistered,
    /// 剛註冊完的卡片
    New,
    /// 既有卡片
    Query,
}

impl fmt::Display for InquiryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InquiryMode::Unregistered => "unregistered",
            InquiryMode::New => "new",
            InquiryMode::Query => "query",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub balance: i32,
}
