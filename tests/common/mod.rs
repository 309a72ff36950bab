//! 測試用的記憶體內服務，依照遊戲端預期的回應結構作答。

#![allow(dead_code)]

use async_trait::async_trait;
use copula_verify::config::VerifierConfig;
use copula_verify::core::requests::Requests;
use copula_verify::domain::model::{CourseRecord, CourseTable, ExpertPoints};
use copula_verify::domain::ports::Transport;
use copula_verify::protocol::{Node, Payload, Scalar};
use copula_verify::utils::error::{Result, VerifyError};
use copula_verify::{ConformanceOrchestrator, NodeCardService, NodeFacilityService};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

pub const LID: &str = "US-51";
pub const EXISTING_CARD: &str = "E004000000000001";

/// 可注入的服務端行為差異
#[derive(Debug, Clone)]
pub struct FakeOptions {
    pub stored_value: bool,
    pub balance: i32,
    /// 成績一律以最後一筆覆寫
    pub keep_latest_score: bool,
    /// visit 回應缺少 `@snum`
    pub omit_visit_flag: bool,
    /// 任何 PIN 都通過驗證
    pub accept_any_pin: bool,
    /// appoint 回傳的殘影少一個位元組
    pub corrupt_ghost: bool,
}

impl Default for FakeOptions {
    fn default() -> Self {
        Self {
            stored_value: true,
            balance: 500,
            keep_latest_score: false,
            omit_visit_flag: false,
            accept_any_pin: false,
            corrupt_ghost: false,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredScore {
    clear_status: i32,
    ex_score: i32,
    miss_count: i32,
    ghost: Vec<u8>,
}

#[derive(Debug, Clone)]
struct FakeProfile {
    name: String,
    ext_id: i32,
    sp_dan: i32,
    dp_dan: i32,
    ir_data: CourseTable,
    secret_course_data: CourseTable,
    expert_points: BTreeMap<i32, ExpertPoints>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    /// card id -> (ref id, pin)
    cards: HashMap<String, (String, String)>,
    /// ref id -> profile
    profiles: HashMap<String, FakeProfile>,
    next_ext_id: i32,
    next_ref_id: u64,
    scores: BTreeMap<(i32, i32, i32), StoredScore>,
    beginner: BTreeMap<(i32, i32), i32>,
    shop_name: String,
    balance: i32,
    /// 依序記錄收到的 `模組.方法`
    pub calls: Vec<String>,
}

impl FakeState {
    pub fn count(&self, operation: &str) -> usize {
        self.calls.iter().filter(|c| c.as_str() == operation).count()
    }

    pub fn balance(&self) -> i32 {
        self.balance
    }

    pub fn shop_name(&self) -> &str {
        &self.shop_name
    }
}

pub struct FakeIidxService {
    options: FakeOptions,
    state: Mutex<FakeState>,
}

fn int(node: &Node, key: &str) -> i32 {
    node.attribute(key).and_then(Scalar::as_i32).unwrap_or(0)
}

fn text(node: &Node, key: &str) -> String {
    node.attribute(key).map(Scalar::render).unwrap_or_default()
}

fn child_text(node: &Node, name: &str) -> String {
    node.child(name)
        .and_then(Node::payload)
        .and_then(Payload::as_scalar)
        .map(Scalar::render)
        .unwrap_or_default()
}

fn response(child: Node) -> Node {
    Node::new("response").with_child(child)
}

fn course_rows(name: &str, table: &CourseTable) -> Node {
    let mut parent = Node::new(name);
    for (course_id, charts) in table {
        for (chart, record) in charts {
            parent.add_child(Node::array(
                "e",
                vec![*course_id, *chart, record.clear_status, record.pgnum, record.gnum],
            ));
        }
    }
    parent
}

impl FakeIidxService {
    pub fn new(options: FakeOptions) -> Self {
        let state = FakeState {
            next_ext_id: 12345678,
            shop_name: "default shop".to_string(),
            balance: options.balance,
            ..FakeState::default()
        };
        Self {
            options,
            state: Mutex::new(state),
        }
    }

    /// 預先建立一張已註冊的卡與其玩家資料
    pub fn with_existing_card(self, card_id: &str, pin: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let ref_id = "0123456789ABCDEF".to_string();
            state.cards.insert(card_id.to_string(), (ref_id.clone(), pin.to_string()));
            let ext_id = state.next_ext_id;
            state.next_ext_id += 1;
            state.profiles.insert(
                ref_id,
                FakeProfile {
                    name: "EXISTING".to_string(),
                    ext_id,
                    sp_dan: 3,
                    dp_dan: -1,
                    ir_data: CourseTable::new(),
                    secret_course_data: CourseTable::new(),
                    expert_points: BTreeMap::new(),
                },
            );
        }
        self
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn handle(&self, op: &Node) -> Option<Node> {
        let method = text(op, "method");
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{}.{}", op.name(), method));

        let node = match (op.name(), method.as_str()) {
            ("services", "get") => {
                let mut services = Node::new("services");
                for name in VerifierConfig::default().scenario.expected_services {
                    services.add_child(
                        Node::new("item")
                            .with_attribute("name", name)
                            .with_attribute("url", "http://127.0.0.1:8000/"),
                    );
                }
                services
            }
            ("pcbtracker", "alive") => Node::new("pcbtracker")
                .with_attribute("ecenable", self.options.stored_value as i32)
                .with_attribute("expire", 1200),
            ("package", "list") => Node::new("package").with_attribute("expire", 1200),
            ("message", "get") => Node::new("message").with_attribute("expire", 300),
            ("facility", "get") => Node::new("facility")
                .with_child(
                    Node::new("location")
                        .with_child(Node::value("id", LID))
                        .with_child(Node::value("country", "US"))
                        .with_child(Node::value("region", "."))
                        .with_child(Node::value("name", "Test Arcade"))
                        .with_child(Node::value("type", 0)),
                )
                .with_child(Node::new("line").with_child(Node::value("class", 0)))
                .with_child(Node::new("portfolio"))
                .with_child(Node::new("public").with_child(Node::value("flag", 1)))
                .with_child(
                    Node::new("share")
                        .with_child(Node::new("eacoin").with_child(Node::value("notchamount", 3000))),
                ),
            ("pcbevent", "put") => Node::new("pcbevent"),

            ("cardmng", "inquire") => {
                let card_id = text(op, "cardid");
                match state.cards.get(&card_id) {
                    None => Node::new("cardmng").with_attribute("status", 112),
                    Some((ref_id, _)) => {
                        let binded = state.profiles.contains_key(ref_id);
                        Node::new("cardmng")
                            .with_attribute("refid", ref_id.as_str())
                            .with_attribute("dataid", ref_id.as_str())
                            .with_attribute("binded", binded as i32)
                            .with_attribute("newflag", (!binded) as i32)
                            .with_attribute("ecflag", self.options.stored_value as i32)
                    }
                }
            }
            ("cardmng", "getrefid") => {
                state.next_ref_id += 1;
                let ref_id = format!("{:016X}", 0xA000_0000_0000_0000u64 + state.next_ref_id);
                state
                    .cards
                    .insert(text(op, "cardid"), (ref_id.clone(), text(op, "passwd")));
                Node::new("cardmng")
                    .with_attribute("refid", ref_id.as_str())
                    .with_attribute("dataid", ref_id.as_str())
            }
            ("cardmng", "authpass") => {
                let ref_id = text(op, "refid");
                let pass = text(op, "pass");
                let valid = state
                    .cards
                    .values()
                    .any(|(r, pin)| *r == ref_id && *pin == pass);
                let status = if valid || self.options.accept_any_pin { 0 } else { 116 };
                Node::new("cardmng").with_attribute("status", status)
            }

            ("eacoin", "checkin") => Node::new("eacoin")
                .with_child(Node::value("sequence", 1))
                .with_child(Node::value("balance", state.balance))
                .with_child(Node::value("sessid", "FAKE-SESSION")),
            ("eacoin", "consume") => {
                let payment = child_text(op, "payment").parse::<i32>().unwrap_or(0);
                state.balance -= payment;
                Node::new("eacoin").with_child(Node::value("balance", state.balance))
            }
            ("eacoin", "checkout") => Node::new("eacoin"),

            ("IIDX23shop", "getname") => Node::new("IIDX23shop")
                .with_attribute("opname", state.shop_name.as_str())
                .with_attribute("pid", 51)
                .with_attribute("cls_opt", 0),
            ("IIDX23shop", "savename") => {
                state.shop_name = text(op, "opname");
                Node::new("IIDX23shop")
            }
            ("IIDX23shop", "getconvention") => Node::new("IIDX23shop")
                .with_attribute("music_0", -1)
                .with_attribute("music_1", -1)
                .with_attribute("music_2", -1)
                .with_attribute("music_3", -1)
                .with_attribute("start_time", 0)
                .with_attribute("end_time", 0)
                .with_child(Node::value("valid", 0)),
            ("IIDX23shop", "sentinfo") => Node::new("IIDX23shop"),

            ("IIDX23pc", "common") => {
                let phase = |name: &str, key: &str| Node::new(name).with_attribute(key, 1);
                Node::new("IIDX23pc")
                    .with_child(phase("ir", "beat"))
                    .with_child(phase("newsong_another", "open"))
                    .with_child(phase("boss", "phase"))
                    .with_child(phase("event1_phase", "phase"))
                    .with_child(phase("event2_phase", "phase"))
                    .with_child(phase("extra_boss_event", "phase"))
                    .with_child(phase("bemani_summer2016", "phase"))
                    .with_child(phase("expert", "phase"))
                    .with_child(phase("expert_random_select", "phase"))
            }
            ("IIDX23pc", "visit") => {
                let mut visit = Node::new("IIDX23pc")
                    .with_attribute("aflg", 0)
                    .with_attribute("anum", 0)
                    .with_attribute("pflg", 0)
                    .with_attribute("pnum", 0)
                    .with_attribute("sflg", 0);
                if !self.options.omit_visit_flag {
                    visit.set_attribute("snum", 0);
                }
                visit
            }
            ("IIDX23pc", "reg") => {
                let ext_id = state.next_ext_id;
                state.next_ext_id += 1;
                state.profiles.insert(
                    text(op, "rid"),
                    FakeProfile {
                        name: text(op, "name"),
                        ext_id,
                        sp_dan: -1,
                        dp_dan: -1,
                        ir_data: CourseTable::new(),
                        secret_course_data: CourseTable::new(),
                        expert_points: BTreeMap::new(),
                    },
                );
                Node::new("IIDX23pc")
                    .with_attribute("id", ext_id)
                    .with_attribute("id_str", format!("{}-{}", ext_id / 10000, ext_id % 10000))
            }
            ("IIDX23pc", "get") => {
                let profile = state.profiles.get(&text(op, "rid"))?;
                let mut expert = Node::new("expert_point");
                for (course_id, points) in &profile.expert_points {
                    expert.add_child(
                        Node::new("detail")
                            .with_attribute("course_id", *course_id)
                            .with_attribute("n_point", points.n_point)
                            .with_attribute("h_point", points.h_point)
                            .with_attribute("a_point", points.a_point),
                    );
                }
                Node::new("IIDX23pc")
                    .with_child(
                        Node::new("pcdata")
                            .with_attribute("name", profile.name.as_str())
                            .with_attribute("pid", 51)
                            .with_attribute("id", profile.ext_id)
                            .with_attribute("idstr", profile.ext_id.to_string()),
                    )
                    .with_child(Node::new("deller").with_attribute("deller", 0))
                    .with_child(
                        Node::new("secret")
                            .with_child(Node::array("flg1", vec![-1, -1, -1]))
                            .with_child(Node::array("flg2", vec![-1, -1, -1]))
                            .with_child(Node::array("flg3", vec![-1, -1, -1])),
                    )
                    .with_child(Node::new("achievements").with_child(Node::array("trophy", vec![0; 10])))
                    .with_child(Node::new("skin"))
                    .with_child(
                        Node::new("grade")
                            .with_attribute("sgid", profile.sp_dan)
                            .with_attribute("dgid", profile.dp_dan),
                    )
                    .with_child(course_rows("ir_data", &profile.ir_data))
                    .with_child(course_rows("secret_course_data", &profile.secret_course_data))
                    .with_child(expert)
                    .with_child(Node::new("rlist"))
                    .with_child(Node::new("step"))
                    .with_child(
                        Node::new("favorite")
                            .with_child(Node::new("sp_mlist"))
                            .with_child(Node::new("sp_clist"))
                            .with_child(Node::new("dp_mlist"))
                            .with_child(Node::new("dp_clist")),
                    )
            }
            ("IIDX23pc", "save") => {
                let ext_id = int(op, "iidxid");
                if let Some(points) = op.child("expert_point") {
                    if let Some(profile) = state.profiles.values_mut().find(|p| p.ext_id == ext_id) {
                        profile.expert_points.insert(
                            int(points, "course_id"),
                            ExpertPoints {
                                n_point: int(points, "n_point"),
                                h_point: int(points, "h_point"),
                                a_point: int(points, "a_point"),
                            },
                        );
                    }
                }
                Node::new("IIDX23pc")
            }
            ("IIDX23pc", "playstart") | ("IIDX23pc", "playend") => Node::new("IIDX23pc"),

            ("IIDX23music", "crate") => Node::new("IIDX23music")
                .with_child(
                    Node::array("c", vec![50, 50, 50, 50, 50, 50, 30, 30, 30, 30, 30, 30])
                        .with_attribute("mid", 1000),
                )
                .with_child(
                    Node::array("c", vec![101, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0])
                        .with_attribute("mid", 1003),
                ),
            ("IIDX23music", "getrank") => {
                let ext_id = int(op, "iidxid");
                let style = int(op, "cltype");
                let base = style * 3;
                let mut music = Node::new("IIDX23music")
                    .with_child(Node::new("style").with_attribute("type", style));

                let mut songs: Vec<i32> = state
                    .scores
                    .keys()
                    .filter(|(e, _, chart)| *e == ext_id && (base..base + 3).contains(chart))
                    .map(|(_, song, _)| *song)
                    .collect();
                songs.dedup();
                for song in songs {
                    let mut row = vec![-1, song];
                    let entries: Vec<(i32, i32, i32)> = (base..base + 3)
                        .map(|chart| {
                            state
                                .scores
                                .get(&(ext_id, song, chart))
                                .map(|s| (s.clear_status, s.ex_score, s.miss_count))
                                .unwrap_or((0, 0, -1))
                        })
                        .collect();
                    row.extend(entries.iter().map(|e| e.0));
                    row.extend(entries.iter().map(|e| e.1));
                    row.extend(entries.iter().map(|e| e.2));
                    music.add_child(Node::array("m", row));
                }
                for ((e, song), clear) in &state.beginner {
                    if *e == ext_id {
                        music.add_child(Node::array("b", vec![*song, *clear]));
                    }
                }
                music
            }
            ("IIDX23music", "reg") => {
                let key = (int(op, "iidxid"), int(op, "mid"), int(op, "clid"));
                let submitted = StoredScore {
                    clear_status: int(op, "cflg"),
                    ex_score: int(op, "pgnum") * 2 + int(op, "gnum"),
                    miss_count: int(op, "mnum"),
                    ghost: op
                        .child("ghost")
                        .and_then(Node::payload)
                        .and_then(Payload::as_bytes)
                        .map(<[u8]>::to_vec)
                        .unwrap_or_default(),
                };
                let replace = self.options.keep_latest_score
                    || state
                        .scores
                        .get(&key)
                        .map_or(true, |existing| submitted.ex_score > existing.ex_score);
                if replace {
                    state.scores.insert(key, submitted);
                }
                Node::new("IIDX23music")
                    .with_child(Node::new("shopdata").with_attribute("rank", 1))
                    .with_child(
                        Node::new("ranklist")
                            .with_attribute("total_user_num", 1)
                            .with_child(Node::new("data").with_attribute("rank", 1)),
                    )
            }
            ("IIDX23music", "appoint") => {
                let key = (int(op, "iidxid"), int(op, "mid"), int(op, "clid"));
                let mut music = Node::new("IIDX23music");
                if let Some(score) = state.scores.get(&key) {
                    let mut ghost = score.ghost.clone();
                    if self.options.corrupt_ghost {
                        ghost.pop();
                    }
                    music.add_child(Node::binary("mydata", ghost).with_attribute("score", score.ex_score));
                }
                music
            }
            ("IIDX23music", "play") => Node::new("IIDX23music")
                .with_attribute("clid", int(op, "clid"))
                .with_attribute("crate", 0)
                .with_attribute("frate", 0)
                .with_attribute("mid", int(op, "mid")),
            ("IIDX23music", "breg") => {
                let key = (int(op, "iidxid"), int(op, "mid"));
                let clear = int(op, "cflg");
                let best = state.beginner.entry(key).or_insert(clear);
                *best = (*best).max(clear);
                Node::new("IIDX23music")
            }

            ("IIDX23grade", "raised") => {
                let ext_id = int(op, "iidxid");
                let grade = int(op, "gid");
                let double = int(op, "gtype") == 1;
                if let Some(profile) = state.profiles.values_mut().find(|p| p.ext_id == ext_id) {
                    if double {
                        profile.dp_dan = grade;
                    } else {
                        profile.sp_dan = grade;
                    }
                }
                Node::new("IIDX23grade").with_attribute("pnum", 1)
            }
            ("IIDX23ranking", "getranker") => Node::new("IIDX23ranking"),
            ("IIDX23ranking", "entry") => {
                let ext_id = int(op, "iidxid");
                let record = CourseRecord {
                    clear_status: int(op, "clr"),
                    pgnum: int(op, "pgnum"),
                    gnum: int(op, "gnum"),
                };
                let (course_id, chart) = (int(op, "coid"), int(op, "clid"));
                let secret = int(op, "regist_type") == 1;
                if let Some(profile) = state.profiles.values_mut().find(|p| p.ext_id == ext_id) {
                    let table = if secret {
                        &mut profile.secret_course_data
                    } else {
                        &mut profile.ir_data
                    };
                    table.entry(course_id).or_default().insert(chart, record);
                }
                Node::new("IIDX23ranking")
                    .with_attribute("anum", 1)
                    .with_attribute("jun", 1)
            }
            _ => return None,
        };

        Some(response(node))
    }
}

#[async_trait]
impl Transport for FakeIidxService {
    async fn exchange(&self, endpoint: &str, request: Node) -> Result<Node> {
        let operation = request.children().first().cloned().ok_or_else(|| {
            VerifyError::TransportFailure {
                endpoint: endpoint.to_string(),
                message: "empty call envelope".to_string(),
            }
        })?;

        self.handle(&operation).ok_or_else(|| VerifyError::TransportFailure {
            endpoint: endpoint.to_string(),
            message: format!(
                "unhandled operation {}.{}",
                operation.name(),
                text(&operation, "method")
            ),
        })
    }
}

pub type FakeOrchestrator = ConformanceOrchestrator<
    Arc<FakeIidxService>,
    NodeCardService<Arc<FakeIidxService>>,
    NodeFacilityService<Arc<FakeIidxService>>,
>;

pub fn orchestrator(service: Arc<FakeIidxService>, card_id: Option<&str>) -> FakeOrchestrator {
    let config = VerifierConfig::default();
    let requests = Requests::new(&config.cabinet);
    let cards = NodeCardService::new(service.clone(), requests.clone(), config.profile.pin.clone());
    let facility = NodeFacilityService::new(service.clone(), requests);

    ConformanceOrchestrator::new(config, service, cards, facility, card_id.map(str::to_string))
        .with_execution_id("verify_test")
}
