use crate::core::requests::Requests;
use crate::core::responses::require_paths;
use crate::domain::model::{InquiryMode, SessionInfo};
use crate::domain::ports::{CardService, FacilityService, Transport};
use crate::protocol::{child_value, resolve_path, Node, Scalar};
use crate::utils::error::{Result, VerifyError};
use async_trait::async_trait;
use rand::Rng;

/// cardmng 回應狀態碼
const CARD_OK: i32 = 0;
const CARD_NEW: i32 = 112;
const CARD_BAD_PIN: i32 = 116;

const REF_ID_LENGTH: usize = 16;

fn int_attribute(resp: &Node, operation: &str, path: &str) -> Result<i32> {
    require_paths(resp, operation, &[path])?;
    resolve_path(resp, path)?
        .as_attribute()
        .and_then(Scalar::as_i32)
        .ok_or_else(|| VerifyError::invalid_response(operation, format!("'{}' is not an integer", path)))
}

fn text_attribute(resp: &Node, operation: &str, path: &str) -> Result<String> {
    require_paths(resp, operation, &[path])?;
    resolve_path(resp, path)?
        .as_attribute()
        .map(Scalar::render)
        .ok_or_else(|| VerifyError::invalid_response(operation, format!("'{}' is not an attribute", path)))
}

/// pcbevent 的時間欄位為 32 位元秒數
fn wire_timestamp(seconds: i64) -> Result<i32> {
    i32::try_from(seconds).map_err(|_| {
        VerifyError::invalid_response(
            "pcbevent.put",
            format!("timestamp {} does not fit the 32-bit time field", seconds),
        )
    })
}

fn scalar_value(resp: &Node, operation: &str, path: &str) -> Result<Scalar> {
    require_paths(resp, operation, &[path])?;
    child_value(resp, path)?
        .as_scalar()
        .cloned()
        .ok_or_else(|| VerifyError::invalid_response(operation, format!("'{}' has no scalar value", path)))
}

/// 透過 cardmng / eacoin 節點實作的卡片服務
pub struct NodeCardService<T: Transport> {
    transport: T,
    requests: Requests,
    pin: String,
}

impl<T: Transport> NodeCardService<T> {
    pub fn new(transport: T, requests: Requests, pin: impl Into<String>) -> Self {
        Self {
            transport,
            requests,
            pin: pin.into(),
        }
    }

    async fn send(&self, operation: Node) -> Result<Node> {
        self.transport.exchange("", self.requests.call(operation)).await
    }
}

#[async_trait]
impl<T: Transport> CardService for NodeCardService<T> {
    fn generate_card_id(&self) -> String {
        let mut rng = rand::rng();
        let suffix: String = (0..12)
            .map(|_| format!("{:X}", rng.random_range(0..16u8)))
            .collect();
        format!("E004{}", suffix)
    }

    async fn inquire(&self, card_id: &str, mode: InquiryMode) -> Result<Option<String>> {
        let operation = "cardmng.inquire";
        let resp = self
            .send(
                Node::new("cardmng")
                    .with_attribute("method", "inquire")
                    .with_attribute("cardid", card_id)
                    .with_attribute("cardtype", 1)
                    .with_attribute("update", 1),
            )
            .await?;

        if mode == InquiryMode::Unregistered {
            let status = int_attribute(&resp, operation, "response/cardmng/@status")?;
            if status != CARD_NEW {
                return Err(VerifyError::invalid_response(
                    operation,
                    format!("card {} should be unregistered but status was {}", card_id, status),
                ));
            }
            return Ok(None);
        }

        let ref_id = text_attribute(&resp, operation, "response/cardmng/@refid")?;
        let binded = int_attribute(&resp, operation, "response/cardmng/@binded")?;
        let newflag = int_attribute(&resp, operation, "response/cardmng/@newflag")?;
        int_attribute(&resp, operation, "response/cardmng/@ecflag")?;

        let (expected_binded, expected_newflag) = match mode {
            InquiryMode::New => (0, 1),
            _ => (1, 0),
        };
        if binded != expected_binded || newflag != expected_newflag {
            return Err(VerifyError::invalid_response(
                operation,
                format!(
                    "{} inquiry returned binded={} newflag={}, expected binded={} newflag={}",
                    mode, binded, newflag, expected_binded, expected_newflag
                ),
            ));
        }

        Ok(Some(ref_id))
    }

    async fn get_ref_id(&self, card_id: &str) -> Result<String> {
        let operation = "cardmng.getrefid";
        let resp = self
            .send(
                Node::new("cardmng")
                    .with_attribute("method", "getrefid")
                    .with_attribute("cardid", card_id)
                    .with_attribute("cardtype", 1)
                    .with_attribute("newflag", 0)
                    .with_attribute("passwd", self.pin.as_str()),
            )
            .await?;

        let ref_id = text_attribute(&resp, operation, "response/cardmng/@refid")?;
        if ref_id.len() != REF_ID_LENGTH {
            return Err(VerifyError::invalid_response(
                operation,
                format!("reference id '{}' is not {} characters", ref_id, REF_ID_LENGTH),
            ));
        }
        Ok(ref_id)
    }

    async fn authenticate(&self, ref_id: &str, pin: &str) -> Result<bool> {
        let operation = "cardmng.authpass";
        let resp = self
            .send(
                Node::new("cardmng")
                    .with_attribute("method", "authpass")
                    .with_attribute("refid", ref_id)
                    .with_attribute("pass", pin),
            )
            .await?;

        match int_attribute(&resp, operation, "response/cardmng/@status")? {
            CARD_OK => Ok(true),
            CARD_BAD_PIN => Ok(false),
            other => Err(VerifyError::invalid_response(
                operation,
                format!("unexpected authentication status {}", other),
            )),
        }
    }

    async fn open_session(&self, card_id: &str) -> Result<SessionInfo> {
        let operation = "eacoin.checkin";
        let resp = self
            .send(
                Node::new("eacoin")
                    .with_attribute("method", "checkin")
                    .with_child(Node::value("cardtype", 1))
                    .with_child(Node::value("cardid", card_id))
                    .with_child(Node::value("passwd", self.pin.as_str()))
                    .with_child(Node::value("vendor", 1)),
            )
            .await?;

        require_paths(&resp, operation, &["response/eacoin/sequence"])?;
        let session_id = scalar_value(&resp, operation, "response/eacoin/sessid")?.render();
        let balance = scalar_value(&resp, operation, "response/eacoin/balance")?
            .as_i32()
            .ok_or_else(|| VerifyError::invalid_response(operation, "balance is not an integer"))?;

        Ok(SessionInfo {
            session_id,
            balance,
        })
    }

    async fn consume(&self, session: &SessionInfo, amount: i32) -> Result<i32> {
        let operation = "eacoin.consume";
        let resp = self
            .send(
                Node::new("eacoin")
                    .with_attribute("method", "consume")
                    .with_child(Node::value("sessid", session.session_id.as_str()))
                    .with_child(Node::value("sequence_no", 1))
                    .with_child(Node::value("payment", amount))
                    .with_child(Node::value("service", 0))
                    .with_child(Node::value("itemtype", 0))
                    .with_child(Node::value("detail", "/eacoin/start_pt1")),
            )
            .await?;

        scalar_value(&resp, operation, "response/eacoin/balance")?
            .as_i32()
            .ok_or_else(|| VerifyError::invalid_response(operation, "balance is not an integer"))
    }

    async fn close_session(&self, session: &SessionInfo) -> Result<()> {
        let resp = self
            .send(
                Node::new("eacoin")
                    .with_attribute("method", "checkout")
                    .with_child(Node::value("sessid", session.session_id.as_str())),
            )
            .await?;
        require_paths(&resp, "eacoin.checkout", &["response/eacoin"])
    }
}

/// 開機流程用的設施服務
pub struct NodeFacilityService<T: Transport> {
    transport: T,
    requests: Requests,
}

impl<T: Transport> NodeFacilityService<T> {
    pub fn new(transport: T, requests: Requests) -> Self {
        Self {
            transport,
            requests,
        }
    }

    async fn send(&self, operation: Node) -> Result<Node> {
        self.transport.exchange("", self.requests.call(operation)).await
    }
}

#[async_trait]
impl<T: Transport> FacilityService for NodeFacilityService<T> {
    async fn discover_services(&self, expected: &[String]) -> Result<()> {
        let operation = "services.get";
        let resp = self
            .send(
                Node::new("services")
                    .with_attribute("method", "get")
                    .with_attribute("model", self.requests.model())
                    .with_child(Node::new("info").with_child(Node::value("AVS2", "2.16.1"))),
            )
            .await?;

        require_paths(&resp, operation, &["response/services"])?;
        let advertised: Vec<String> = resp
            .child("services")
            .map(|services| {
                services
                    .children_named("item")
                    .filter_map(|item| item.attribute("name").map(Scalar::render))
                    .collect()
            })
            .unwrap_or_default();

        if let Some(missing) = expected.iter().find(|name| !advertised.contains(name)) {
            return Err(VerifyError::invalid_response(
                operation,
                format!("service '{}' is not advertised", missing),
            ));
        }
        Ok(())
    }

    async fn heartbeat(&self) -> Result<bool> {
        let operation = "pcbtracker.alive";
        let resp = self
            .send(
                Node::new("pcbtracker")
                    .with_attribute("method", "alive")
                    .with_attribute("accountid", self.requests.pcbid())
                    .with_attribute("ecflag", 1)
                    .with_attribute("hardid", "0100DEADBEEF")
                    .with_attribute("softid", "00010203040506070809"),
            )
            .await?;

        Ok(int_attribute(&resp, operation, "response/pcbtracker/@ecenable")? != 0)
    }

    async fn package_list(&self) -> Result<()> {
        let resp = self
            .send(
                Node::new("package")
                    .with_attribute("method", "list")
                    .with_attribute("pkgtype", "all"),
            )
            .await?;
        require_paths(&resp, "package.list", &["response/package"])
    }

    async fn message_get(&self) -> Result<()> {
        let resp = self
            .send(
                Node::new("message")
                    .with_attribute("method", "get")
                    .with_attribute("model", self.requests.model()),
            )
            .await?;
        require_paths(&resp, "message.get", &["response/message"])
    }

    async fn facility_get(&self) -> Result<String> {
        let operation = "facility.get";
        let resp = self
            .send(Node::new("facility").with_attribute("method", "get"))
            .await?;

        require_paths(
            &resp,
            operation,
            &[
                "response/facility/location/id",
                "response/facility/location/country",
                "response/facility/location/name",
                "response/facility/line",
                "response/facility/portfolio",
                "response/facility/public",
                "response/facility/share",
            ],
        )?;
        Ok(scalar_value(&resp, operation, "response/facility/location/id")?.render())
    }

    async fn post_cabinet_event(&self) -> Result<()> {
        let now = wire_timestamp(chrono::Utc::now().timestamp())?;
        let resp = self
            .send(
                Node::new("pcbevent")
                    .with_attribute("method", "put")
                    .with_child(Node::value("time", now))
                    .with_child(Node::value("seq", 0))
                    .with_child(
                        Node::new("item")
                            .with_child(Node::value("name", "boot"))
                            .with_child(Node::value("value", 1))
                            .with_child(Node::value("time", now)),
                    ),
            )
            .await?;
        require_paths(&resp, "pcbevent.put", &["response/pcbevent"])
    }
}
