use crate::domain::model::{InquiryMode, SessionInfo};
use crate::protocol::Node;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// 將請求樹送往服務並取回回應樹
#[async_trait]
pub trait Transport: Send + Sync {
    async fn exchange(&self, endpoint: &str, request: Node) -> Result<Node>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn exchange(&self, endpoint: &str, request: Node) -> Result<Node> {
        (**self).exchange(endpoint, request).await
    }
}

/// 卡片、PIN 與儲值工作階段
#[async_trait]
pub trait CardService: Send + Sync {
    fn generate_card_id(&self) -> String;

    /// `Unregistered` 模式下預期沒有 reference id
    async fn inquire(&self, card_id: &str, mode: InquiryMode) -> Result<Option<String>>;

    async fn get_ref_id(&self, card_id: &str) -> Result<String>;

    async fn authenticate(&self, ref_id: &str, pin: &str) -> Result<bool>;

    async fn open_session(&self, card_id: &str) -> Result<SessionInfo>;

    /// 回傳扣款後的餘額
    async fn consume(&self, session: &SessionInfo, amount: i32) -> Result<i32>;

    async fn close_session(&self, session: &SessionInfo) -> Result<()>;
}

/// 開機流程會用到的設施與服務探索
#[async_trait]
pub trait FacilityService: Send + Sync {
    async fn discover_services(&self, expected: &[String]) -> Result<()>;

    /// 回傳此機台是否啟用儲值功能
    async fn heartbeat(&self) -> Result<bool>;

    async fn package_list(&self) -> Result<()>;

    async fn message_get(&self) -> Result<()>;

    /// 回傳店舖 location id
    async fn facility_get(&self) -> Result<String>;

    async fn post_cabinet_event(&self) -> Result<()>;
}
