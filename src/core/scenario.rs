//! 驗證流程中固定送出的資料。

use crate::domain::model::{CourseSubmission, ExpertPoints, ScoreEntry, Submission};

pub const GHOST_LENGTH: usize = 64;
pub const GHOST_FILL: u8 = 0x01;

/// 段位提升請求所用的段位編號，讀回時兩種風格都應為此值
pub const RAISED_GRADE_ID: i32 = 5;

pub const SHOP_NAMES: [&str; 2] = ["newname1", "newname2"];

pub const RANKER_COURSE_IDS: std::ops::RangeInclusive<i32> = 0..=6;

pub fn ghost() -> Vec<u8> {
    vec![GHOST_FILL; GHOST_LENGTH]
}

fn score(song: i32, chart: i32, clear_status: i32, perfect: i32, good: i32, miss: i32) -> Submission {
    Submission {
        song,
        chart,
        clear_status,
        perfect,
        good,
        miss,
        ghost: ghost(),
        expected: None,
    }
}

/// 兩輪成績，輪與輪之間必須間隔至少一秒
pub fn scoring_rounds() -> Vec<Vec<Submission>> {
    vec![
        vec![
            // 普通成績
            score(1000, 2, 4, 123, 123, 123),
            // 同曲較簡單譜面的好成績
            score(1000, 0, 7, 246, 0, 0),
            // 困難譜面的差成績
            score(1003, 2, 1, 10, 20, 50),
            // 簡單譜面的很差成績
            score(1003, 0, 1, 2, 5, 75),
        ],
        vec![
            // 同譜面更好的成績
            score(1000, 2, 5, 234, 234, 3),
            // 同譜面較差的成績，服務端應保留第一輪的紀錄
            Submission {
                expected: Some(ScoreEntry::new(7, 492, 0)),
                ..score(1000, 0, 4, 123, 123, 35)
            },
        ],
    ]
}

/// 依序存檔的專家課程點數
pub fn expert_point_saves() -> Vec<(i32, ExpertPoints)> {
    vec![
        (
            1,
            ExpertPoints {
                n_point: 0,
                h_point: 500,
                a_point: 0,
            },
        ),
        (
            1,
            ExpertPoints {
                n_point: 0,
                h_point: 1000,
                a_point: 0,
            },
        ),
        (
            2,
            ExpertPoints {
                n_point: 0,
                h_point: 0,
                a_point: 500,
            },
        ),
    ]
}

pub fn cardless_play() -> Submission {
    score(1000, 2, 4, 123, 123, 0)
}

pub fn beginner_play() -> Submission {
    score(1000, 6, 4, 123, 123, 0)
}

pub fn course_entry() -> CourseSubmission {
    CourseSubmission {
        course_id: 2,
        course_chart: 1,
        clear_status: 4,
        pgnum: 1771,
        gnum: 967,
    }
}
