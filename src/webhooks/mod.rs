//! Inbound payment notifications.
//!
//! The gateway reports payment activity in three wire shapes: the legacy IPN
//! query (`?topic=payment&id=123`), the newer webhook query
//! (`?type=payment&data.id=123`) and a JSON body
//! (`{"type": "payment", "data": {"id": 123}}`). [`normalize`] folds all of
//! them into a single [`Notification`]; the reconciler never sees raw input.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use utoipa::IntoParams;

/// Resource kinds the reconciler acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationTopic {
    Payment,
    MerchantOrder,
}

impl NotificationTopic {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "payment" => Some(Self::Payment),
            "merchant_order" => Some(Self::MerchantOrder),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::MerchantOrder => "merchant_order",
        }
    }
}

impl fmt::Display for NotificationTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub topic: NotificationTopic,
    pub resource_id: String,
}

/// Query parameters of both IPN generations.
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WebhookQuery {
    /// Legacy topic (`payment`, `merchant_order`)
    pub topic: Option<String>,
    /// Newer topic parameter
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Legacy resource id
    pub id: Option<String>,
    /// Newer resource id
    #[serde(rename = "data.id")]
    pub data_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookBody {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    data: Option<WebhookBodyData>,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookBodyData {
    #[serde(default)]
    id: Option<Value>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Ids arrive as JSON strings or numbers depending on the notification version.
fn body_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(Some(s)),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Merges query and body field by field: `topic` before `type`, `id` before
/// `data.id`, and the body only fills what the query left empty. Returns
/// `None` for unsupported topics or when no id can be found.
pub fn normalize(query: &WebhookQuery, body: &[u8]) -> Option<Notification> {
    let mut topic = non_empty(query.topic.as_deref()).or_else(|| non_empty(query.kind.as_deref()));
    let mut resource_id =
        non_empty(query.id.as_deref()).or_else(|| non_empty(query.data_id.as_deref()));

    if (topic.is_none() || resource_id.is_none()) && !body.is_empty() {
        if let Ok(parsed) = serde_json::from_slice::<WebhookBody>(body) {
            if topic.is_none() {
                topic = non_empty(parsed.kind.as_deref());
            }
            if resource_id.is_none() {
                resource_id = parsed.data.and_then(|d| d.id).as_ref().and_then(body_id);
            }
        }
    }

    Some(Notification {
        topic: NotificationTopic::parse(&topic?)?,
        resource_id: resource_id?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn query(topic: Option<&str>, kind: Option<&str>, id: Option<&str>, data_id: Option<&str>) -> WebhookQuery {
        WebhookQuery {
            topic: topic.map(str::to_string),
            kind: kind.map(str::to_string),
            id: id.map(str::to_string),
            data_id: data_id.map(str::to_string),
        }
    }

    #[test]
    fn legacy_query_shape() {
        let n = normalize(&query(Some("payment"), None, Some("123"), None), b"").unwrap();
        assert_eq!(n.topic, NotificationTopic::Payment);
        assert_eq!(n.resource_id, "123");
    }

    #[test]
    fn newer_query_shape() {
        let n = normalize(&query(None, Some("merchant_order"), None, Some("77")), b"").unwrap();
        assert_eq!(n.topic, NotificationTopic::MerchantOrder);
        assert_eq!(n.resource_id, "77");
    }

    #[rstest]
    #[case(br#"{"type":"payment","data":{"id":"123"}}"#.as_slice())]
    #[case(br#"{"type":"payment","data":{"id":123}}"#.as_slice())]
    #[case(br#"{"action":"payment.updated","type":"payment","data":{"id":123},"live_mode":true}"#.as_slice())]
    fn json_body_shape(#[case] body: &[u8]) {
        let n = normalize(&WebhookQuery::default(), body).unwrap();
        assert_eq!(n.topic, NotificationTopic::Payment);
        assert_eq!(n.resource_id, "123");
    }

    #[test]
    fn query_fields_take_precedence_and_body_fills_gaps() {
        let body = br#"{"type":"merchant_order","data":{"id":"from-body"}}"#;
        let n = normalize(&query(Some("payment"), None, None, None), body).unwrap();
        assert_eq!(n.topic, NotificationTopic::Payment);
        assert_eq!(n.resource_id, "from-body");

        let n = normalize(&query(Some("payment"), Some("merchant_order"), Some("1"), Some("2")), body)
            .unwrap();
        assert_eq!(n.topic, NotificationTopic::Payment);
        assert_eq!(n.resource_id, "1");
    }

    #[rstest]
    #[case(query(Some("chargebacks"), None, Some("1"), None), b"".as_slice())]
    #[case(query(Some("payment"), None, None, None), b"".as_slice())]
    #[case(query(Some("payment"), None, Some("  "), None), b"".as_slice())]
    #[case(WebhookQuery::default(), b"not json".as_slice())]
    #[case(WebhookQuery::default(), br#"{"type":"payment","data":{}}"#.as_slice())]
    #[case(WebhookQuery::default(), br#"{"type":"payment","data":{"id":null}}"#.as_slice())]
    fn incomplete_or_unsupported_is_dropped(#[case] q: WebhookQuery, #[case] body: &[u8]) {
        assert!(normalize(&q, body).is_none());
    }
}
