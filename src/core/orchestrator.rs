//! 驗證流程的狀態機。
//!
//! 每個階段是一個獨立的 async 步驟，完成後回傳下一個階段；任何錯誤都會
//! 直接終止整個執行。所有交換都依序等待完成，不併發也不重試。

use crate::config::VerifierConfig;
use crate::core::oracle::{ExpertPointLedger, ScoreOracle};
use crate::core::requests::{Requests, MUSIC, PC, RANKING, SHOP};
use crate::core::responses;
use crate::core::scenario;
use crate::domain::model::{
    CourseCategory, CourseTable, InquiryMode, PlayStyle, Profile, ScoreTable, SessionInfo,
    Submission, BEGINNER_CHART,
};
use crate::domain::ports::{CardService, FacilityService, Transport};
use crate::protocol::Node;
use crate::utils::error::{Result, VerifyError};
use rand::Rng;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Boot,
    CardResolution,
    CredentialCheck,
    Scoring { round: usize },
    ExpertPoints,
    CardlessPlay,
    ShopName,
    BeginnerScore,
    DanGrade,
    RankingEntry,
    Session,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Boot => write!(f, "boot"),
            Phase::CardResolution => write!(f, "card_resolution"),
            Phase::CredentialCheck => write!(f, "credential_check"),
            Phase::Scoring { round } => write!(f, "scoring_round_{}", round),
            Phase::ExpertPoints => write!(f, "expert_points"),
            Phase::CardlessPlay => write!(f, "cardless_play"),
            Phase::ShopName => write!(f, "shop_name"),
            Phase::BeginnerScore => write!(f, "beginner_score"),
            Phase::DanGrade => write!(f, "dan_grade"),
            Phase::RankingEntry => write!(f, "ranking_entry"),
            Phase::Session => write!(f, "session"),
            Phase::Done => write!(f, "done"),
        }
    }
}

/// 執行過程中累積的狀態
#[derive(Debug, Default)]
pub struct ScenarioContext {
    pub card_id: Option<String>,
    pub lid: Option<String>,
    pub ref_id: Option<String>,
    pub ext_id: Option<i32>,
    pub shop_name: Option<String>,
    pub stored_value_enabled: bool,
    pub new_profile: bool,
    pub oracle: ScoreOracle,
    pub expert_points: ExpertPointLedger,
}

fn missing(phase: Phase, field: &str) -> VerifyError {
    VerifyError::MissingState {
        phase: phase.to_string(),
        field: field.to_string(),
    }
}

impl ScenarioContext {
    pub fn card_id(&self, phase: Phase) -> Result<String> {
        self.card_id.clone().ok_or_else(|| missing(phase, "card_id"))
    }

    pub fn lid(&self, phase: Phase) -> Result<String> {
        self.lid.clone().ok_or_else(|| missing(phase, "lid"))
    }

    pub fn ref_id(&self, phase: Phase) -> Result<String> {
        self.ref_id.clone().ok_or_else(|| missing(phase, "ref_id"))
    }

    pub fn ext_id(&self, phase: Phase) -> Result<i32> {
        self.ext_id.ok_or_else(|| missing(phase, "ext_id"))
    }

    pub fn shop_name(&self, phase: Phase) -> Result<String> {
        self.shop_name.clone().ok_or_else(|| missing(phase, "shop_name"))
    }
}

/// 比對預期值與實際值，不同時以 `ValueMismatch` 終止
pub fn expect_eq<V: PartialEq + fmt::Debug>(
    phase: Phase,
    operation: &str,
    subject: &str,
    expected: V,
    actual: V,
) -> Result<()> {
    if expected == actual {
        return Ok(());
    }
    Err(VerifyError::ValueMismatch {
        phase: phase.to_string(),
        operation: operation.to_string(),
        subject: subject.to_string(),
        expected: format!("{:?}", expected),
        actual: format!("{:?}", actual),
    })
}

#[derive(Debug, Clone)]
pub struct PhaseResult {
    pub phase: String,
    pub duration: Duration,
}

/// 一次完整執行的結果
#[derive(Debug, Clone)]
pub struct RunReport {
    pub execution_id: String,
    pub card_id: String,
    pub new_profile: bool,
    pub phases: Vec<PhaseResult>,
}

impl RunReport {
    pub fn total_duration(&self) -> Duration {
        self.phases.iter().map(|p| p.duration).sum()
    }

    pub fn summary(&self) -> HashMap<String, serde_json::Value> {
        let mut summary = HashMap::new();

        summary.insert("execution_id".to_string(), serde_json::Value::String(self.execution_id.clone()));
        summary.insert("card_id".to_string(), serde_json::Value::String(self.card_id.clone()));
        summary.insert("new_profile".to_string(), serde_json::Value::Bool(self.new_profile));
        summary.insert("total_phases".to_string(), serde_json::Value::Number(self.phases.len().into()));
        summary.insert(
            "total_duration_ms".to_string(),
            serde_json::Value::Number((self.total_duration().as_millis() as u64).into()),
        );

        let phase_names: Vec<serde_json::Value> = self
            .phases
            .iter()
            .map(|p| serde_json::Value::String(p.phase.clone()))
            .collect();
        summary.insert("executed_phases".to_string(), serde_json::Value::Array(phase_names));

        summary
    }
}

pub struct ConformanceOrchestrator<T: Transport, C: CardService, F: FacilityService> {
    transport: T,
    cards: C,
    facility: F,
    config: VerifierConfig,
    requests: Requests,
    rounds: Vec<Vec<Submission>>,
    execution_id: String,
    context: ScenarioContext,
}

impl<T: Transport, C: CardService, F: FacilityService> ConformanceOrchestrator<T, C, F> {
    pub fn new(
        config: VerifierConfig,
        transport: T,
        cards: C,
        facility: F,
        card_id: Option<String>,
    ) -> Self {
        let requests = Requests::new(&config.cabinet);
        Self {
            transport,
            cards,
            facility,
            config,
            requests,
            rounds: scenario::scoring_rounds(),
            execution_id: format!("verify_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S")),
            context: ScenarioContext {
                card_id,
                ..ScenarioContext::default()
            },
        }
    }

    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = execution_id.into();
        self
    }

    /// 替換成績輪次（預設為內建的兩輪）
    pub fn with_scoring_rounds(mut self, rounds: Vec<Vec<Submission>>) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn context(&self) -> &ScenarioContext {
        &self.context
    }

    pub async fn run(&mut self) -> Result<RunReport> {
        tracing::info!("🚀 Starting conformance run: {}", self.execution_id);

        let mut phases = Vec::new();
        let mut phase = Phase::Boot;

        while phase != Phase::Done {
            let start_time = Instant::now();
            tracing::info!("▶️ Phase: {}", phase);

            let next = match self.step(phase).await {
                Ok(next) => next,
                Err(e) => {
                    tracing::error!("❌ Phase {} failed: {}", phase, e);
                    return Err(e);
                }
            };

            let duration = start_time.elapsed();
            tracing::info!("✅ Phase completed: {} (duration: {:?})", phase, duration);
            phases.push(PhaseResult {
                phase: phase.to_string(),
                duration,
            });
            phase = next;
        }

        tracing::info!("🎉 Conformance run {} passed", self.execution_id);

        Ok(RunReport {
            execution_id: self.execution_id.clone(),
            card_id: self.context.card_id.clone().unwrap_or_default(),
            new_profile: self.context.new_profile,
            phases,
        })
    }

    pub async fn step(&mut self, phase: Phase) -> Result<Phase> {
        match phase {
            Phase::Boot => self.boot(phase).await,
            Phase::CardResolution => self.resolve_card(phase).await,
            Phase::CredentialCheck => self.check_credentials(phase).await,
            Phase::Scoring { round } => self.score_round(phase, round).await,
            Phase::ExpertPoints => self.expert_points(phase).await,
            Phase::CardlessPlay => self.cardless_play(phase).await,
            Phase::ShopName => self.shop_name(phase).await,
            Phase::BeginnerScore => self.beginner_score(phase).await,
            Phase::DanGrade => self.dan_grade(phase).await,
            Phase::RankingEntry => self.ranking_entry(phase).await,
            Phase::Session => self.session(phase).await,
            Phase::Done => Ok(Phase::Done),
        }
    }

    async fn exchange(&self, request: Node) -> Result<Node> {
        self.transport.exchange("", request).await
    }

    async fn fetch_profile(&self, ref_id: &str, card_id: &str, lid: &str) -> Result<Profile> {
        let resp = self.exchange(self.requests.pc_get(ref_id, card_id, lid)).await?;
        responses::profile(&resp)
    }

    /// 兩種風格的成績表合併
    async fn fetch_scores(&self, ext_id: i32) -> Result<ScoreTable> {
        let mut table = ScoreTable::new();
        for style in [PlayStyle::Single, PlayStyle::Double] {
            let resp = self.exchange(self.requests.music_get_rank(ext_id, style)).await?;
            responses::merge_score_tables(&mut table, responses::rank_table(&resp, style)?);
        }
        Ok(table)
    }

    async fn boot(&mut self, _phase: Phase) -> Result<Phase> {
        self.facility
            .discover_services(&self.config.scenario.expected_services)
            .await?;
        self.context.stored_value_enabled = self.facility.heartbeat().await?;
        tracing::info!("💳 Stored value enabled: {}", self.context.stored_value_enabled);

        self.facility.package_list().await?;
        self.facility.message_get().await?;
        let lid = self.facility.facility_get().await?;
        self.facility.post_cabinet_event().await?;
        tracing::info!("🏬 Location id: {}", lid);

        let resp = self.exchange(self.requests.shop_get_name(&lid)).await?;
        self.context.shop_name = Some(responses::shop_name(&resp)?);

        let resp = self.exchange(self.requests.pc_common()).await?;
        responses::common_config(&resp)?;

        let resp = self.exchange(self.requests.music_clear_rates()).await?;
        let songs = responses::clear_rates(&resp)?;
        tracing::debug!("📊 Clear rate table has {} songs", songs);

        let resp = self.exchange(self.requests.shop_get_convention(&lid)).await?;
        responses::convention(&resp)?;

        for clid in scenario::RANKER_COURSE_IDS {
            let resp = self.exchange(self.requests.ranking_get_ranker(&lid, clid)).await?;
            responses::acknowledge(&resp, RANKING, "getranker")?;
        }

        let resp = self.exchange(self.requests.shop_sent_info(&lid)).await?;
        responses::acknowledge(&resp, SHOP, "sentinfo")?;

        self.context.lid = Some(lid);
        Ok(Phase::CardResolution)
    }

    async fn resolve_card(&mut self, phase: Phase) -> Result<Phase> {
        if let Some(card_id) = self.context.card_id.clone() {
            tracing::info!("🪪 Using existing card {}", card_id);
            let ref_id = self
                .cards
                .inquire(&card_id, InquiryMode::Query)
                .await?
                .ok_or_else(|| {
                    VerifyError::invalid_response("cardmng.inquire", "query inquiry returned no reference id")
                })?;
            self.context.ref_id = Some(ref_id);
            self.context.new_profile = false;
            return Ok(Phase::CredentialCheck);
        }

        let lid = self.context.lid(phase)?;
        let card_id = self.cards.generate_card_id();
        tracing::info!("🪪 Generated card {}", card_id);

        let unregistered = self.cards.inquire(&card_id, InquiryMode::Unregistered).await?;
        expect_eq(phase, "cardmng.inquire", "reference id of a fresh card", None, unregistered)?;

        let ref_id = self.cards.get_ref_id(&card_id).await?;

        let echoed = self.cards.inquire(&card_id, InquiryMode::New).await?;
        expect_eq(phase, "cardmng.inquire", "reference id", Some(ref_id.clone()), echoed)?;

        let name = self.config.profile.name.clone();
        let resp = self
            .exchange(self.requests.pc_register(&ref_id, &card_id, &lid, &name))
            .await?;
        let ext_id = responses::registered_ext_id(&resp)?;
        tracing::info!("👤 Registered profile {} with extid {}", name, ext_id);

        let profile = self.fetch_profile(&ref_id, &card_id, &lid).await?;
        let op = "IIDX23pc.get";
        expect_eq(phase, op, "extid", ext_id, profile.ext_id)?;
        expect_eq(phase, op, "profile name", name, profile.name)?;
        expect_eq(phase, op, "SP dan grade", -1, profile.sp_dan)?;
        expect_eq(phase, op, "DP dan grade", -1, profile.dp_dan)?;
        expect_eq(phase, op, "deller", 0, profile.deller)?;
        expect_eq(phase, op, "internet ranking data", CourseTable::new(), profile.ir_data)?;
        expect_eq(phase, op, "secret course data", CourseTable::new(), profile.secret_course_data)?;
        expect_eq(phase, op, "expert points", 0, profile.expert_points.len())?;

        let scores = self.fetch_scores(ext_id).await?;
        expect_eq(phase, "IIDX23music.getrank", "score table", ScoreTable::new(), scores)?;

        self.context.card_id = Some(card_id);
        self.context.ref_id = Some(ref_id);
        self.context.ext_id = Some(ext_id);
        self.context.new_profile = true;
        Ok(Phase::CredentialCheck)
    }

    async fn check_credentials(&mut self, phase: Phase) -> Result<Phase> {
        let card_id = self.context.card_id(phase)?;
        let ref_id = self.context.ref_id(phase)?;
        let op = "cardmng.authpass";

        let accepted = self.cards.authenticate(&ref_id, &self.config.profile.pin).await?;
        expect_eq(phase, op, "configured PIN accepted", true, accepted)?;

        let accepted = self
            .cards
            .authenticate(&ref_id, &self.config.profile.wrong_pin)
            .await?;
        expect_eq(phase, op, "wrong PIN accepted", false, accepted)?;

        let echoed = self.cards.inquire(&card_id, InquiryMode::Query).await?;
        expect_eq(phase, "cardmng.inquire", "reference id", Some(ref_id), echoed)?;

        if self.context.new_profile && !self.rounds.is_empty() {
            Ok(Phase::Scoring { round: 1 })
        } else if self.context.new_profile {
            Ok(Phase::ExpertPoints)
        } else {
            Ok(Phase::Session)
        }
    }

    async fn score_round(&mut self, phase: Phase, round: usize) -> Result<Phase> {
        let submissions = self
            .rounds
            .get(round.saturating_sub(1))
            .cloned()
            .ok_or_else(|| missing(phase, "scoring round"))?;
        let card_id = self.context.card_id(phase)?;
        let lid = self.context.lid(phase)?;
        let ext_id = self.context.ext_id(phase)?;

        if round > 1 {
            // 成績時間戳只到秒
            let pause = Duration::from_millis(self.config.scenario.score_pause_ms);
            tracing::debug!("⏳ Waiting {:?} before round {}", pause, round);
            tokio::time::sleep(pause).await;
        }

        for submission in &submissions {
            let resp = self
                .exchange(self.requests.music_register(ext_id, &lid, submission))
                .await?;
            responses::score_submitted(&resp)?;
            self.context.oracle.record(submission.clone());
        }
        tracing::info!("🎵 Submitted {} scores in round {}", submissions.len(), round);

        let resp = self.exchange(self.requests.pc_visit(ext_id, &lid)).await?;
        responses::visit(&resp)?;
        let resp = self
            .exchange(self.requests.pc_save(ext_id, &card_id, &lid, None))
            .await?;
        responses::acknowledge(&resp, PC, "save")?;

        let scores = self.fetch_scores(ext_id).await?;
        for ((song, chart), expected) in self.context.oracle.expectations() {
            let actual = scores.get(&song).and_then(|charts| charts.get(&chart)).copied();
            expect_eq(
                phase,
                "IIDX23music.getrank",
                &format!("score for song {} chart {}", song, chart),
                Some(expected),
                actual,
            )?;
        }

        for submission in &submissions {
            let (song, chart) = (submission.song, submission.chart);
            let resp = self
                .exchange(self.requests.music_appoint(ext_id, song, chart))
                .await?;
            let (ex_score, ghost) = responses::score_proof(&resp)?;

            let op = "IIDX23music.appoint";
            let expected = self
                .context
                .oracle
                .expected(song, chart)
                .map(|entry| entry.ex_score);
            expect_eq(
                phase,
                op,
                &format!("proof ex score for song {} chart {}", song, chart),
                expected,
                Some(ex_score),
            )?;

            let best_ghost = self.context.oracle.best_ghost(song, chart).unwrap_or_default();
            expect_eq(
                phase,
                op,
                &format!("ghost length for song {} chart {}", song, chart),
                best_ghost.len(),
                ghost.len(),
            )?;
            expect_eq(
                phase,
                op,
                &format!("ghost for song {} chart {}", song, chart),
                best_ghost,
                ghost.as_slice(),
            )?;
        }

        if round < self.rounds.len() {
            Ok(Phase::Scoring { round: round + 1 })
        } else {
            Ok(Phase::ExpertPoints)
        }
    }

    async fn expert_points(&mut self, phase: Phase) -> Result<Phase> {
        let card_id = self.context.card_id(phase)?;
        let ref_id = self.context.ref_id(phase)?;
        let lid = self.context.lid(phase)?;
        let ext_id = self.context.ext_id(phase)?;

        for (course_id, points) in scenario::expert_point_saves() {
            let resp = self
                .exchange(self.requests.pc_save(ext_id, &card_id, &lid, Some((course_id, points))))
                .await?;
            responses::acknowledge(&resp, PC, "save")?;
            self.context.expert_points.save(course_id, points);

            let profile = self.fetch_profile(&ref_id, &card_id, &lid).await?;
            expect_eq(
                phase,
                "IIDX23pc.get",
                "expert points",
                self.context.expert_points.expected(),
                &profile.expert_points,
            )?;
        }

        Ok(Phase::CardlessPlay)
    }

    async fn cardless_play(&mut self, _phase: Phase) -> Result<Phase> {
        let resp = self.exchange(self.requests.pc_play_start()).await?;
        responses::acknowledge(&resp, PC, "playstart")?;

        let resp = self
            .exchange(self.requests.music_play(&scenario::cardless_play()))
            .await?;
        responses::cardless_play(&resp)?;

        let resp = self.exchange(self.requests.pc_play_end()).await?;
        responses::acknowledge(&resp, PC, "playend")?;

        Ok(Phase::ShopName)
    }

    async fn shop_name(&mut self, phase: Phase) -> Result<Phase> {
        let lid = self.context.lid(phase)?;

        for name in scenario::SHOP_NAMES {
            let resp = self.exchange(self.requests.shop_save_name(&lid, name)).await?;
            responses::acknowledge(&resp, SHOP, "savename")?;

            let resp = self.exchange(self.requests.shop_get_name(&lid)).await?;
            let actual = responses::shop_name(&resp)?;
            expect_eq(phase, "IIDX23shop.getname", "shop name", name, actual.as_str())?;
            self.context.shop_name = Some(actual);
        }

        Ok(Phase::BeginnerScore)
    }

    async fn beginner_score(&mut self, phase: Phase) -> Result<Phase> {
        let ext_id = self.context.ext_id(phase)?;
        let play = scenario::beginner_play();

        let resp = self
            .exchange(self.requests.music_beginner_register(ext_id, &play))
            .await?;
        responses::acknowledge(&resp, MUSIC, "breg")?;
        self.context.oracle.record_beginner(play.song, play.clear_status);

        let scores = self.fetch_scores(ext_id).await?;
        let actual = scores
            .get(&play.song)
            .and_then(|charts| charts.get(&BEGINNER_CHART))
            .copied();
        expect_eq(
            phase,
            "IIDX23music.getrank",
            &format!("beginner score for song {}", play.song),
            self.context.oracle.expected_beginner(play.song),
            actual,
        )?;

        Ok(Phase::DanGrade)
    }

    async fn dan_grade(&mut self, phase: Phase) -> Result<Phase> {
        let card_id = self.context.card_id(phase)?;
        let ref_id = self.context.ref_id(phase)?;
        let lid = self.context.lid(phase)?;
        let ext_id = self.context.ext_id(phase)?;
        let shop_name = self.context.shop_name(phase)?;

        for style in [PlayStyle::Single, PlayStyle::Double] {
            let resp = self
                .exchange(self.requests.grade_raised(ext_id, &shop_name, style, scenario::RAISED_GRADE_ID))
                .await?;
            responses::grade_raised(&resp)?;
        }

        let profile = self.fetch_profile(&ref_id, &card_id, &lid).await?;
        expect_eq(phase, "IIDX23pc.get", "SP dan grade", scenario::RAISED_GRADE_ID, profile.sp_dan)?;
        expect_eq(phase, "IIDX23pc.get", "DP dan grade", scenario::RAISED_GRADE_ID, profile.dp_dan)?;

        Ok(Phase::RankingEntry)
    }

    async fn ranking_entry(&mut self, phase: Phase) -> Result<Phase> {
        let card_id = self.context.card_id(phase)?;
        let ref_id = self.context.ref_id(phase)?;
        let lid = self.context.lid(phase)?;
        let ext_id = self.context.ext_id(phase)?;
        let shop_name = self.context.shop_name(phase)?;
        let entry = scenario::course_entry();

        for category in [CourseCategory::InternetRanking, CourseCategory::SecretCourse] {
            let resp = self
                .exchange(self.requests.ranking_entry(ext_id, &shop_name, category, &entry))
                .await?;
            responses::ranking_entry(&resp)?;
        }

        let mut expected = CourseTable::new();
        expected
            .entry(entry.course_id)
            .or_default()
            .insert(entry.course_chart, entry.as_record());

        let profile = self.fetch_profile(&ref_id, &card_id, &lid).await?;
        expect_eq(phase, "IIDX23pc.get", "internet ranking data", &expected, &profile.ir_data)?;
        expect_eq(phase, "IIDX23pc.get", "secret course data", &expected, &profile.secret_course_data)?;

        Ok(Phase::Session)
    }

    async fn session(&mut self, phase: Phase) -> Result<Phase> {
        if !self.context.stored_value_enabled {
            tracing::info!("⏭️ Stored value disabled, skipping session checks");
            return Ok(Phase::Done);
        }

        let card_id = self.context.card_id(phase)?;
        let session = self.cards.open_session(&card_id).await?;
        tracing::info!("💰 Session {} opened with balance {}", session.session_id, session.balance);

        let outcome = self.consume(phase, &session).await;
        self.cards.close_session(&session).await?;
        outcome?;

        Ok(Phase::Done)
    }

    async fn consume(&self, phase: Phase, session: &SessionInfo) -> Result<()> {
        if session.balance < 0 {
            return Err(VerifyError::invalid_response(
                "eacoin.checkin",
                format!("session {} reported a negative balance {}", session.session_id, session.balance),
            ));
        }
        if session.balance == 0 {
            tracing::info!("⏭️ Balance is zero, skipping consume");
            return Ok(());
        }

        let amount = rand::rng().random_range(0..=session.balance);
        let balance = self.cards.consume(session, amount).await?;
        tracing::info!("💰 Consumed {}, new balance {}", amount, balance);
        expect_eq(phase, "eacoin.consume", "balance", session.balance - amount, balance)
    }
}
