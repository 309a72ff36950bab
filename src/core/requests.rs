use crate::config::toml_config::CabinetConfig;
use crate::domain::model::{CourseCategory, CourseSubmission, ExpertPoints, PlayStyle, Submission};
use crate::protocol::Node;

pub const SHOP: &str = "IIDX23shop";
pub const PC: &str = "IIDX23pc";
pub const MUSIC: &str = "IIDX23music";
pub const RANKING: &str = "IIDX23ranking";
pub const GRADE: &str = "IIDX23grade";

/// 依機台設定組出各操作的請求樹
///
/// 每個請求都是一個 `call` 信封包住單一操作節點，操作節點帶有 `method` 屬性。
#[derive(Debug, Clone)]
pub struct Requests {
    model: String,
    pcbid: String,
    shop_pid: i32,
}

impl Requests {
    pub fn new(cabinet: &CabinetConfig) -> Self {
        Self {
            model: cabinet.model.clone(),
            pcbid: cabinet.pcbid.clone(),
            shop_pid: cabinet.shop_pid,
        }
    }

    pub fn pcbid(&self) -> &str {
        &self.pcbid
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// 信封節點
    pub fn call(&self, operation: Node) -> Node {
        Node::new("call")
            .with_attribute("model", self.model.as_str())
            .with_attribute("srcid", self.pcbid.as_str())
            .with_attribute("tag", "00000000")
            .with_child(operation)
    }

    fn operation(module: &str, method: &str) -> Node {
        Node::new(module).with_attribute("method", method)
    }

    pub fn shop_get_name(&self, lid: &str) -> Node {
        self.call(Self::operation(SHOP, "getname").with_attribute("lid", lid))
    }

    pub fn shop_save_name(&self, lid: &str, name: &str) -> Node {
        self.call(
            Self::operation(SHOP, "savename")
                .with_attribute("lid", lid)
                .with_attribute("pid", self.shop_pid)
                .with_attribute("cls_opt", 0)
                .with_attribute("ccode", "US")
                .with_attribute("opname", name)
                .with_attribute("rcode", "."),
        )
    }

    pub fn shop_get_convention(&self, lid: &str) -> Node {
        self.call(Self::operation(SHOP, "getconvention").with_attribute("lid", lid))
    }

    pub fn shop_sent_info(&self, lid: &str) -> Node {
        self.call(
            Self::operation(SHOP, "sentinfo")
                .with_attribute("lid", lid)
                .with_attribute("bflg", 1)
                .with_attribute("bnum", 2)
                .with_attribute("ioid", 0)
                .with_attribute("tax_phase", 0),
        )
    }

    pub fn pc_common(&self) -> Node {
        self.call(Self::operation(PC, "common"))
    }

    pub fn pc_visit(&self, ext_id: i32, lid: &str) -> Node {
        self.call(
            Self::operation(PC, "visit")
                .with_attribute("iidxid", ext_id)
                .with_attribute("lid", lid)
                .with_attribute("pid", self.shop_pid),
        )
    }

    pub fn pc_get(&self, ref_id: &str, card_id: &str, lid: &str) -> Node {
        self.call(
            Self::operation(PC, "get")
                .with_attribute("rid", ref_id)
                .with_attribute("did", ref_id)
                .with_attribute("pid", self.shop_pid)
                .with_attribute("lid", lid)
                .with_attribute("cid", card_id)
                .with_attribute("ctype", 1),
        )
    }

    pub fn pc_register(&self, ref_id: &str, card_id: &str, lid: &str, name: &str) -> Node {
        self.call(
            Self::operation(PC, "reg")
                .with_attribute("lid", lid)
                .with_attribute("pid", self.shop_pid)
                .with_attribute("cid", card_id)
                .with_attribute("did", ref_id)
                .with_attribute("rid", ref_id)
                .with_attribute("name", name),
        )
    }

    /// 存檔請求；帶 `expert_point` 時會覆寫該課程的點數
    pub fn pc_save(
        &self,
        ext_id: i32,
        card_id: &str,
        lid: &str,
        expert_point: Option<(i32, ExpertPoints)>,
    ) -> Node {
        let mut save = Self::operation(PC, "save")
            .with_attribute("iidxid", ext_id)
            .with_attribute("lid", lid)
            .with_attribute("cid", card_id)
            .with_attribute("cltype", 0)
            .with_attribute("ctype", 1)
            .with_attribute("bookkeep", 0)
            .with_attribute("mode", 6)
            .with_attribute("pmode", 0)
            .with_attribute("rtype", 0)
            .with_attribute("gpos", 0)
            .with_attribute("sp_opt", 8208)
            .with_attribute("dp_opt", 0)
            .with_attribute("dp_opt2", 0)
            // SP 設定
            .with_attribute("s_achi", 449)
            .with_attribute("s_disp_judge", 1)
            .with_attribute("s_exscore", 0)
            .with_attribute("s_gno", 8)
            .with_attribute("s_gtype", 2)
            .with_attribute("s_hispeed", 5.771802)
            .with_attribute("s_judge", 0)
            .with_attribute("s_judgeAdj", 0)
            .with_attribute("s_largejudge", 0)
            .with_attribute("s_lift", 60)
            .with_attribute("s_notes", 31.484070)
            .with_attribute("s_opstyle", 1)
            .with_attribute("s_pace", 0)
            .with_attribute("s_sdlen", 121)
            .with_attribute("s_sdtype", 1)
            .with_attribute("s_sorttype", 0)
            .with_attribute("s_timing", 1)
            .with_attribute("s_tune", 3)
            // DP 設定
            .with_attribute("d_achi", 4)
            .with_attribute("d_disp_judge", 0)
            .with_attribute("d_exscore", 0)
            .with_attribute("d_gno", 0)
            .with_attribute("d_gtype", 0)
            .with_attribute("d_hispeed", 0.0)
            .with_attribute("d_judge", 0)
            .with_attribute("d_judgeAdj", 0)
            .with_attribute("d_largejudge", 0)
            .with_attribute("d_lift", 60)
            .with_attribute("d_notes", 0.0)
            .with_attribute("d_opstyle", 0)
            .with_attribute("d_pace", 0)
            .with_attribute("d_sdlen", 0)
            .with_attribute("d_sdtype", 0)
            .with_attribute("d_sorttype", 0)
            .with_attribute("d_timing", 0)
            .with_attribute("d_tune", 0)
            .with_child(Node::new("pyramid").with_attribute("point", 290))
            .with_child(Node::new("destiny_catharsis").with_attribute("point", 290))
            .with_child(Node::new("bemani_summer_collabo").with_attribute("point", 290))
            .with_child(Node::new("deller").with_attribute("deller", 150));

        if let Some((course_id, points)) = expert_point {
            save.add_child(
                Node::new("expert_point")
                    .with_attribute("course_id", course_id)
                    .with_attribute("n_point", points.n_point)
                    .with_attribute("h_point", points.h_point)
                    .with_attribute("a_point", points.a_point),
            );
        }

        self.call(save)
    }

    pub fn pc_play_start(&self) -> Node {
        self.call(Self::operation(PC, "playstart").with_attribute("side", 1))
    }

    pub fn pc_play_end(&self) -> Node {
        self.call(
            Self::operation(PC, "playend")
                .with_attribute("cltype", 0)
                .with_attribute("bookkeep", 0)
                .with_attribute("mode", 1),
        )
    }

    pub fn music_clear_rates(&self) -> Node {
        self.call(Self::operation(MUSIC, "crate"))
    }

    pub fn music_get_rank(&self, ext_id: i32, style: PlayStyle) -> Node {
        self.call(
            Self::operation(MUSIC, "getrank")
                .with_attribute("iidxid", ext_id)
                .with_attribute("cltype", style.wire_value()),
        )
    }

    pub fn music_register(&self, ext_id: i32, lid: &str, score: &Submission) -> Node {
        self.call(
            Self::operation(MUSIC, "reg")
                .with_attribute("convid", -1)
                .with_attribute("iidxid", ext_id)
                .with_attribute("pid", self.shop_pid)
                .with_attribute("rankside", 1)
                .with_attribute("mid", score.song)
                .with_attribute("clid", score.chart)
                .with_attribute("cflg", score.clear_status)
                .with_attribute("pgnum", score.perfect)
                .with_attribute("gnum", score.good)
                .with_attribute("mnum", score.miss)
                .with_attribute("is_death", 0)
                .with_attribute("theory", 0)
                .with_attribute("shopconvid", lid)
                .with_attribute("shopflg", 1)
                .with_child(Node::binary("ghost", score.ghost.clone())),
        )
    }

    pub fn music_appoint(&self, ext_id: i32, song: i32, chart: i32) -> Node {
        self.call(
            Self::operation(MUSIC, "appoint")
                .with_attribute("iidxid", ext_id)
                .with_attribute("mid", song)
                .with_attribute("clid", chart)
                .with_attribute("ctype", 0)
                .with_attribute("subtype", ""),
        )
    }

    /// 無卡遊玩的成績，不綁定任何玩家
    pub fn music_play(&self, score: &Submission) -> Node {
        self.call(
            Self::operation(MUSIC, "play")
                .with_attribute("opt", 64)
                .with_attribute("mid", score.song)
                .with_attribute("clid", score.chart)
                .with_attribute("cflg", score.clear_status)
                .with_attribute("pgnum", score.perfect)
                .with_attribute("gnum", score.good)
                .with_attribute("pid", self.shop_pid),
        )
    }

    pub fn music_beginner_register(&self, ext_id: i32, score: &Submission) -> Node {
        self.call(
            Self::operation(MUSIC, "breg")
                .with_attribute("iidxid", ext_id)
                .with_attribute("mid", score.song)
                .with_attribute("cflg", score.clear_status)
                .with_attribute("pgnum", score.perfect)
                .with_attribute("gnum", score.good),
        )
    }

    pub fn ranking_get_ranker(&self, lid: &str, clid: i32) -> Node {
        self.call(
            Self::operation(RANKING, "getranker")
                .with_attribute("lid", lid)
                .with_attribute("clid", clid),
        )
    }

    pub fn ranking_entry(
        &self,
        ext_id: i32,
        shop_name: &str,
        category: CourseCategory,
        entry: &CourseSubmission,
    ) -> Node {
        self.call(
            Self::operation(RANKING, "entry")
                .with_attribute("iidxid", ext_id)
                .with_attribute("opname", shop_name)
                .with_attribute("oppid", self.shop_pid)
                .with_attribute("coid", entry.course_id)
                .with_attribute("clid", entry.course_chart)
                .with_attribute("clr", entry.clear_status)
                .with_attribute("pgnum", entry.pgnum)
                .with_attribute("gnum", entry.gnum)
                .with_attribute("opt", 8208)
                .with_attribute("opt2", 0)
                .with_attribute("cstage", 4)
                .with_attribute("pside", 1)
                .with_attribute("regist_type", category.wire_value()),
        )
    }

    pub fn grade_raised(&self, ext_id: i32, shop_name: &str, style: PlayStyle, grade_id: i32) -> Node {
        self.call(
            Self::operation(GRADE, "raised")
                .with_attribute("iidxid", ext_id)
                .with_attribute("opname", shop_name)
                .with_attribute("oppid", self.shop_pid)
                .with_attribute("gid", grade_id)
                .with_attribute("gtype", style.wire_value())
                .with_attribute("achi", 50)
                .with_attribute("cstage", 4)
                .with_attribute("is_mirror", 0)
                .with_attribute("is_ex", 0)
                .with_attribute("pside", 0),
        )
    }
}
