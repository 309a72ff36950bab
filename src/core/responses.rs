//! 將回應樹轉為領域紀錄。
//!
//! 每個函式先宣告回應必須具備的路徑，缺少任何一條即以
//! `ContractViolation` 中止，不做預設值替換。

use crate::core::requests::{GRADE, MUSIC, PC, RANKING, SHOP};
use crate::domain::model::{
    CourseRecord, CourseTable, ExpertPoints, PlayStyle, Profile, ScoreEntry, ScoreTable,
    BEGINNER_CHART, NOT_APPLICABLE,
};
use crate::protocol::{assert_path, child_value, resolve_path, Node, Payload, Scalar};
use crate::utils::error::{Result, VerifyError};
use std::collections::BTreeMap;

const CLEAR_RATE_COLUMNS: usize = 12;
const CLEAR_RATE_MAX: i32 = 101;
const SCORE_ROW_COLUMNS: usize = 11;
const COURSE_ROW_COLUMNS: usize = 5;

fn op(module: &str, method: &str) -> String {
    format!("{}.{}", module, method)
}

fn contract_error(operation: &str, path: &str, err: VerifyError) -> VerifyError {
    match err {
        VerifyError::PathNotFound { .. } => VerifyError::contract(operation, path),
        other => other,
    }
}

/// 逐一確認必要路徑存在
pub fn require_paths(resp: &Node, operation: &str, paths: &[&str]) -> Result<()> {
    for path in paths {
        assert_path(resp, path).map_err(|e| contract_error(operation, path, e))?;
    }
    Ok(())
}

fn attribute<'a>(resp: &'a Node, operation: &str, path: &str) -> Result<&'a Scalar> {
    let resolved = resolve_path(resp, path).map_err(|e| contract_error(operation, path, e))?;
    resolved.as_attribute().ok_or_else(|| {
        VerifyError::invalid_response(operation, format!("'{}' is not an attribute", path))
    })
}

fn int_attribute(resp: &Node, operation: &str, path: &str) -> Result<i32> {
    let value = attribute(resp, operation, path)?;
    value.as_i32().ok_or_else(|| {
        VerifyError::invalid_response(
            operation,
            format!("'{}' should be an integer but was '{}'", path, value),
        )
    })
}

fn row_values<'a>(row: &'a Node, operation: &str, columns: usize) -> Result<&'a [i32]> {
    let values = row.payload().and_then(Payload::as_ints).ok_or_else(|| {
        VerifyError::invalid_response(
            operation,
            format!("row '{}' does not carry an integer array", row.name()),
        )
    })?;
    if values.len() != columns {
        return Err(VerifyError::invalid_response(
            operation,
            format!(
                "row '{}' has {} values, expected {}",
                row.name(),
                values.len(),
                columns
            ),
        ));
    }
    Ok(values)
}

/// 只需確認操作節點存在的回應
pub fn acknowledge(resp: &Node, module: &str, method: &str) -> Result<()> {
    let path = format!("response/{}", module);
    require_paths(resp, &op(module, method), &[path.as_str()])
}

pub fn shop_name(resp: &Node) -> Result<String> {
    let operation = op(SHOP, "getname");
    require_paths(
        resp,
        &operation,
        &[
            "response/IIDX23shop/@opname",
            "response/IIDX23shop/@pid",
            "response/IIDX23shop/@cls_opt",
        ],
    )?;
    Ok(attribute(resp, &operation, "response/IIDX23shop/@opname")?.render())
}

pub fn common_config(resp: &Node) -> Result<()> {
    require_paths(
        resp,
        &op(PC, "common"),
        &[
            "response/IIDX23pc/ir/@beat",
            "response/IIDX23pc/newsong_another/@open",
            "response/IIDX23pc/boss/@phase",
            "response/IIDX23pc/event1_phase/@phase",
            "response/IIDX23pc/event2_phase/@phase",
            "response/IIDX23pc/extra_boss_event/@phase",
            "response/IIDX23pc/bemani_summer2016/@phase",
            "response/IIDX23pc/expert/@phase",
            "response/IIDX23pc/expert_random_select/@phase",
        ],
    )
}

/// 通關率表：每一列都必須是 12 個 0..=101 的值，回傳列數
pub fn clear_rates(resp: &Node) -> Result<usize> {
    let operation = op(MUSIC, "crate");
    require_paths(resp, &operation, &["response/IIDX23music"])?;

    let music = resp.child(MUSIC).ok_or_else(|| VerifyError::contract(&operation, "response/IIDX23music"))?;
    for row in music.children() {
        if row.name() != "c" {
            return Err(VerifyError::invalid_response(
                &operation,
                format!("unexpected node '{}' in clear rate table", row.name()),
            ));
        }
        let values = row_values(row, &operation, CLEAR_RATE_COLUMNS)?;
        if let Some(bad) = values.iter().find(|v| !(0..=CLEAR_RATE_MAX).contains(*v)) {
            return Err(VerifyError::invalid_response(
                &operation,
                format!("clear rate {} is outside 0..={}", bad, CLEAR_RATE_MAX),
            ));
        }
    }
    Ok(music.children().len())
}

pub fn convention(resp: &Node) -> Result<()> {
    require_paths(
        resp,
        &op(SHOP, "getconvention"),
        &[
            "response/IIDX23shop/valid",
            "response/IIDX23shop/@music_0",
            "response/IIDX23shop/@music_1",
            "response/IIDX23shop/@music_2",
            "response/IIDX23shop/@music_3",
        ],
    )
}

pub fn visit(resp: &Node) -> Result<()> {
    require_paths(
        resp,
        &op(PC, "visit"),
        &[
            "response/IIDX23pc/@aflg",
            "response/IIDX23pc/@anum",
            "response/IIDX23pc/@pflg",
            "response/IIDX23pc/@pnum",
            "response/IIDX23pc/@sflg",
            "response/IIDX23pc/@snum",
        ],
    )
}

pub fn registered_ext_id(resp: &Node) -> Result<i32> {
    let operation = op(PC, "reg");
    require_paths(
        resp,
        &operation,
        &["response/IIDX23pc/@id", "response/IIDX23pc/@id_str"],
    )?;
    int_attribute(resp, &operation, "response/IIDX23pc/@id")
}

fn course_table(resp: &Node, operation: &str, node: &str) -> Result<CourseTable> {
    let mut table = CourseTable::new();
    let Some(parent) = resp.child(&format!("{}/{}", PC, node)) else {
        return Err(VerifyError::contract(operation, &format!("response/{}/{}", PC, node)));
    };
    for row in parent.children_named("e") {
        let values = row_values(row, operation, COURSE_ROW_COLUMNS)?;
        table.entry(values[0]).or_default().insert(
            values[1],
            CourseRecord {
                clear_status: values[2],
                pgnum: values[3],
                gnum: values[4],
            },
        );
    }
    Ok(table)
}

pub fn profile(resp: &Node) -> Result<Profile> {
    let operation = op(PC, "get");
    require_paths(
        resp,
        &operation,
        &[
            "response/IIDX23pc/pcdata/@name",
            "response/IIDX23pc/pcdata/@pid",
            "response/IIDX23pc/pcdata/@id",
            "response/IIDX23pc/pcdata/@idstr",
            "response/IIDX23pc/deller",
            "response/IIDX23pc/secret/flg1",
            "response/IIDX23pc/secret/flg2",
            "response/IIDX23pc/secret/flg3",
            "response/IIDX23pc/achievements/trophy",
            "response/IIDX23pc/skin",
            "response/IIDX23pc/grade",
            "response/IIDX23pc/ir_data",
            "response/IIDX23pc/secret_course_data",
            "response/IIDX23pc/expert_point",
            "response/IIDX23pc/rlist",
            "response/IIDX23pc/step",
            "response/IIDX23pc/favorite/sp_mlist",
            "response/IIDX23pc/favorite/sp_clist",
            "response/IIDX23pc/favorite/dp_mlist",
            "response/IIDX23pc/favorite/dp_clist",
        ],
    )?;

    let Some(expert_point) = resp.child(&format!("{}/expert_point", PC)) else {
        return Err(VerifyError::contract(&operation, "response/IIDX23pc/expert_point"));
    };
    let mut expert_points = BTreeMap::new();
    for detail in expert_point.children_named("detail") {
        let int = |key: &str| {
            detail.attribute(key).and_then(Scalar::as_i32).ok_or_else(|| {
                VerifyError::contract(
                    &operation,
                    &format!("response/IIDX23pc/expert_point/detail/@{}", key),
                )
            })
        };
        expert_points.insert(
            int("course_id")?,
            ExpertPoints {
                n_point: int("n_point")?,
                h_point: int("h_point")?,
                a_point: int("a_point")?,
            },
        );
    }

    Ok(Profile {
        name: attribute(resp, &operation, "response/IIDX23pc/pcdata/@name")?.render(),
        ext_id: int_attribute(resp, &operation, "response/IIDX23pc/pcdata/@id")?,
        sp_dan: int_attribute(resp, &operation, "response/IIDX23pc/grade/@sgid")?,
        dp_dan: int_attribute(resp, &operation, "response/IIDX23pc/grade/@dgid")?,
        deller: int_attribute(resp, &operation, "response/IIDX23pc/deller/@deller")?,
        ir_data: course_table(resp, &operation, "ir_data")?,
        secret_course_data: course_table(resp, &operation, "secret_course_data")?,
        expert_points,
    })
}

/// 單一風格的成績表；`m` 列為 11 個值，`b` 列為初學者譜面
pub fn rank_table(resp: &Node, style: PlayStyle) -> Result<ScoreTable> {
    let operation = op(MUSIC, "getrank");
    require_paths(
        resp,
        &operation,
        &["response/IIDX23music/style", "response/IIDX23music/style/@type"],
    )?;

    let echoed = int_attribute(resp, &operation, "response/IIDX23music/style/@type")?;
    if echoed != style.wire_value() {
        return Err(VerifyError::invalid_response(
            &operation,
            format!(
                "requested clear type {} but response style is {}",
                style.wire_value(),
                echoed
            ),
        ));
    }

    let mut table = ScoreTable::new();
    let music = resp.child(MUSIC).ok_or_else(|| VerifyError::contract(&operation, "response/IIDX23music"))?;
    let [normal, hyper, another] = style.charts();

    for row in music.children() {
        match row.name() {
            "m" => {
                let v = row_values(row, &operation, SCORE_ROW_COLUMNS)?;
                if v[0] != NOT_APPLICABLE {
                    return Err(VerifyError::invalid_response(
                        &operation,
                        format!("got a rival score row (rival index {}) for our own scores", v[0]),
                    ));
                }
                let charts = table.entry(v[1]).or_default();
                charts.insert(normal, ScoreEntry::new(v[2], v[5], v[8]));
                charts.insert(hyper, ScoreEntry::new(v[3], v[6], v[9]));
                charts.insert(another, ScoreEntry::new(v[4], v[7], v[10]));
            }
            "b" => {
                let v = row_values(row, &operation, 2)?;
                table
                    .entry(v[0])
                    .or_default()
                    .insert(BEGINNER_CHART, ScoreEntry::beginner(v[1]));
            }
            _ => {}
        }
    }

    Ok(table)
}

pub fn merge_score_tables(into: &mut ScoreTable, from: ScoreTable) {
    for (song, charts) in from {
        into.entry(song).or_default().extend(charts);
    }
}

pub fn score_submitted(resp: &Node) -> Result<()> {
    require_paths(
        resp,
        &op(MUSIC, "reg"),
        &[
            "response/IIDX23music/shopdata/@rank",
            "response/IIDX23music/ranklist/data",
        ],
    )
}

/// 回傳 (ex score, ghost)
pub fn score_proof(resp: &Node) -> Result<(i32, Vec<u8>)> {
    let operation = op(MUSIC, "appoint");
    require_paths(resp, &operation, &["response/IIDX23music/mydata/@score"])?;

    let score = int_attribute(resp, &operation, "response/IIDX23music/mydata/@score")?;
    let payload = child_value(resp, "response/IIDX23music/mydata")
        .map_err(|e| contract_error(&operation, "response/IIDX23music/mydata", e))?;
    let ghost = payload.as_bytes().ok_or_else(|| {
        VerifyError::invalid_response(&operation, "mydata payload is not a binary blob")
    })?;

    Ok((score, ghost.to_vec()))
}

pub fn cardless_play(resp: &Node) -> Result<()> {
    require_paths(
        resp,
        &op(MUSIC, "play"),
        &[
            "response/IIDX23music/@clid",
            "response/IIDX23music/@crate",
            "response/IIDX23music/@frate",
            "response/IIDX23music/@mid",
        ],
    )
}

pub fn grade_raised(resp: &Node) -> Result<()> {
    require_paths(resp, &op(GRADE, "raised"), &["response/IIDX23grade/@pnum"])
}

pub fn ranking_entry(resp: &Node) -> Result<()> {
    require_paths(
        resp,
        &op(RANKING, "entry"),
        &["response/IIDX23ranking/@anum", "response/IIDX23ranking/@jun"],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(child: Node) -> Node {
        Node::new("response").with_child(child)
    }

    fn profile_node() -> Node {
        profile_node_with(
            Node::new("expert_point").with_child(
                Node::new("detail")
                    .with_attribute("course_id", "1")
                    .with_attribute("n_point", "0")
                    .with_attribute("h_point", "500")
                    .with_attribute("a_point", "0"),
            ),
        )
    }

    fn profile_node_with(expert_point: Node) -> Node {
        Node::new(PC)
            .with_child(
                Node::new("pcdata")
                    .with_attribute("name", "TEST")
                    .with_attribute("pid", "51")
                    .with_attribute("id", "12345678")
                    .with_attribute("idstr", "1234-5678"),
            )
            .with_child(Node::new("deller").with_attribute("deller", "0"))
            .with_child(
                Node::new("secret")
                    .with_child(Node::new("flg1"))
                    .with_child(Node::new("flg2"))
                    .with_child(Node::new("flg3")),
            )
            .with_child(Node::new("achievements").with_child(Node::new("trophy")))
            .with_child(Node::new("skin"))
            .with_child(Node::new("grade").with_attribute("sgid", "-1").with_attribute("dgid", "5"))
            .with_child(Node::new("ir_data").with_child(Node::array("e", vec![2, 1, 4, 1771, 967])))
            .with_child(Node::new("secret_course_data"))
            .with_child(expert_point)
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

    #[test]
    fn test_profile_extraction() {
        let profile = profile(&response(profile_node())).unwrap();

        assert_eq!(profile.name, "TEST");
        assert_eq!(profile.ext_id, 12345678);
        assert_eq!(profile.sp_dan, -1);
        assert_eq!(profile.dp_dan, 5);
        assert_eq!(profile.deller, 0);
        assert_eq!(
            profile.ir_data[&2][&1],
            CourseRecord {
                clear_status: 4,
                pgnum: 1771,
                gnum: 967
            }
        );
        assert!(profile.secret_course_data.is_empty());
        assert_eq!(profile.expert_points[&1].h_point, 500);
    }

    #[test]
    fn test_profile_missing_required_node_is_contract_violation() {
        let node = response(Node::new(PC).with_child(Node::new("pcdata")));
        match profile(&node) {
            Err(VerifyError::ContractViolation { operation, path }) => {
                assert_eq!(operation, "IIDX23pc.get");
                assert_eq!(path, "response/IIDX23pc/pcdata/@name");
            }
            other => panic!("expected contract violation, got {:?}", other),
        }
    }

    #[test]
    fn test_expert_point_detail_without_points_is_contract_violation() {
        let expert_point = Node::new("expert_point").with_child(
            Node::new("detail")
                .with_attribute("course_id", "3")
                .with_attribute("n_point", "100"),
        );
        match profile(&response(profile_node_with(expert_point))) {
            Err(VerifyError::ContractViolation { operation, path }) => {
                assert_eq!(operation, "IIDX23pc.get");
                assert_eq!(path, "response/IIDX23pc/expert_point/detail/@h_point");
            }
            other => panic!("expected contract violation, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_expert_point_yields_no_courses() {
        let profile = profile(&response(profile_node_with(Node::new("expert_point")))).unwrap();
        assert!(profile.expert_points.is_empty());
    }

    #[test]
    fn test_rank_table_maps_rows_to_charts() {
        let resp = response(
            Node::new(MUSIC)
                .with_child(Node::new("style").with_attribute("type", "1"))
                .with_child(Node::array("m", vec![-1, 1000, 4, 0, 0, 369, 0, 0, 5, -1, -1]))
                .with_child(Node::array("b", vec![1000, 4])),
        );

        let table = rank_table(&resp, PlayStyle::Double).unwrap();
        assert_eq!(table[&1000][&3], ScoreEntry::new(4, 369, 5));
        assert_eq!(table[&1000][&4], ScoreEntry::new(0, 0, -1));
        assert_eq!(table[&1000][&6], ScoreEntry::new(4, -1, -1));
        assert!(!table[&1000].contains_key(&0));
    }

    #[test]
    fn test_rank_table_rejects_wrong_style_echo() {
        let resp = response(Node::new(MUSIC).with_child(Node::new("style").with_attribute("type", "0")));
        assert!(matches!(
            rank_table(&resp, PlayStyle::Double),
            Err(VerifyError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_rank_table_rejects_rival_rows() {
        let resp = response(
            Node::new(MUSIC)
                .with_child(Node::new("style").with_attribute("type", "0"))
                .with_child(Node::array("m", vec![0, 1000, 4, 0, 0, 369, 0, 0, 5, -1, -1])),
        );
        assert!(rank_table(&resp, PlayStyle::Single).is_err());
    }

    #[test]
    fn test_clear_rates_bounds() {
        let good = response(
            Node::new(MUSIC)
                .with_child(Node::array("c", vec![0, 101, 50, 0, 0, 0, 0, 0, 0, 0, 0, 0]))
                .with_child(Node::array("c", vec![1; 12])),
        );
        assert_eq!(clear_rates(&good).unwrap(), 2);

        let out_of_range = response(Node::new(MUSIC).with_child(Node::array("c", vec![102; 12])));
        assert!(clear_rates(&out_of_range).is_err());

        let short_row = response(Node::new(MUSIC).with_child(Node::array("c", vec![1; 11])));
        assert!(clear_rates(&short_row).is_err());

        let wrong_node = response(Node::new(MUSIC).with_child(Node::new("d")));
        assert!(clear_rates(&wrong_node).is_err());
    }

    #[test]
    fn test_score_proof_returns_score_and_ghost() {
        let resp = response(
            Node::new(MUSIC).with_child(
                Node::binary("mydata", vec![1; 64]).with_attribute("score", "492"),
            ),
        );
        let (score, ghost) = score_proof(&resp).unwrap();
        assert_eq!(score, 492);
        assert_eq!(ghost, vec![1; 64]);
    }

    #[test]
    fn test_shop_name_requires_all_attributes() {
        let missing_pid = response(
            Node::new(SHOP)
                .with_attribute("opname", "newname1")
                .with_attribute("cls_opt", "0"),
        );
        assert!(matches!(
            shop_name(&missing_pid),
            Err(VerifyError::ContractViolation { .. })
        ));

        let complete = response(
            Node::new(SHOP)
                .with_attribute("opname", "newname1")
                .with_attribute("pid", "51")
                .with_attribute("cls_opt", "0"),
        );
        assert_eq!(shop_name(&complete).unwrap(), "newname1");
    }

    #[test]
    fn test_merge_score_tables_keeps_both_styles() {
        let mut into = ScoreTable::new();
        into.entry(1000).or_default().insert(0, ScoreEntry::new(7, 492, 0));
        let mut from = ScoreTable::new();
        from.entry(1000).or_default().insert(3, ScoreEntry::new(0, 0, -1));
        from.entry(1003).or_default().insert(4, ScoreEntry::new(1, 40, 50));

        merge_score_tables(&mut into, from);
        assert_eq!(into[&1000].len(), 2);
        assert_eq!(into[&1003][&4], ScoreEntry::new(1, 40, 50));
    }
}
