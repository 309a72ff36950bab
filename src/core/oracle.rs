//! 根據本次執行送出的成績歷史，計算服務端應該回傳的結果。

use crate::domain::model::{ExpertPoints, ScoreEntry, Submission, BEGINNER_CHART};
use std::collections::BTreeMap;

/// 成績彙整的預期模型
///
/// 同一 (歌曲, 譜面) 以 ex score 最高的那一筆為準，通關狀態與 miss 數跟著
/// 同一筆紀錄走，不會各自取最大值。若某筆送出宣告了 `expected`，
/// 在那一筆之後的預期值直接改為該宣告值。
#[derive(Debug, Clone, Default)]
pub struct ScoreOracle {
    history: Vec<Submission>,
    beginner: BTreeMap<i32, Vec<i32>>,
}

impl ScoreOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, submission: Submission) {
        self.history.push(submission);
    }

    pub fn record_beginner(&mut self, song: i32, clear_status: i32) {
        self.beginner.entry(song).or_default().push(clear_status);
    }

    pub fn history(&self) -> &[Submission] {
        &self.history
    }

    fn submissions_for(&self, song: i32, chart: i32) -> impl Iterator<Item = &Submission> {
        self.history
            .iter()
            .filter(move |s| s.song == song && s.chart == chart)
    }

    pub fn expected(&self, song: i32, chart: i32) -> Option<ScoreEntry> {
        if chart == BEGINNER_CHART {
            return self.expected_beginner(song);
        }

        let mut best: Option<ScoreEntry> = None;
        for submission in self.submissions_for(song, chart) {
            best = match (submission.expected, best) {
                (Some(declared), _) => Some(declared),
                (None, Some(current)) if submission.ex_score() <= current.ex_score => Some(current),
                (None, _) => Some(submission.as_entry()),
            };
        }
        best
    }

    pub fn expected_beginner(&self, song: i32) -> Option<ScoreEntry> {
        self.beginner
            .get(&song)
            .and_then(|clears| clears.iter().max())
            .map(|clear| ScoreEntry::beginner(*clear))
    }

    /// 所有已送出過的 (歌曲, 譜面) 與預期值
    pub fn expectations(&self) -> BTreeMap<(i32, i32), ScoreEntry> {
        let mut keys: Vec<(i32, i32)> = self.history.iter().map(|s| (s.song, s.chart)).collect();
        keys.extend(self.beginner.keys().map(|song| (*song, BEGINNER_CHART)));

        keys.into_iter()
            .filter_map(|(song, chart)| self.expected(song, chart).map(|e| ((song, chart), e)))
            .collect()
    }

    /// 原始 ex score 最高那一筆送出的 ghost；同分時取較早的一筆
    pub fn best_ghost(&self, song: i32, chart: i32) -> Option<&[u8]> {
        let mut best: Option<&Submission> = None;
        for submission in self.submissions_for(song, chart) {
            if best.map_or(true, |b| submission.ex_score() > b.ex_score()) {
                best = Some(submission);
            }
        }
        best.map(|s| s.ghost.as_slice())
    }
}

/// 專家課程點數：以課程編號為 key 直接覆寫
#[derive(Debug, Clone, Default)]
pub struct ExpertPointLedger {
    courses: BTreeMap<i32, ExpertPoints>,
}

impl ExpertPointLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&mut self, course_id: i32, points: ExpertPoints) {
        self.courses.insert(course_id, points);
    }

    pub fn expected(&self) -> &BTreeMap<i32, ExpertPoints> {
        &self.courses
    }
}
