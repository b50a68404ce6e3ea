use serde::Serialize;

use crate::rate_limiter::{RateLimitSettings, RateStatus};
use crate::service::{ClickReceipt, ClickTotals};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickAcceptedResponse {
    pub success: bool,
    pub total_clicks: i64,
    pub message: String,
}

impl From<ClickReceipt> for ClickAcceptedResponse {
    fn from(receipt: ClickReceipt) -> Self {
        Self {
            success: true,
            total_clicks: receipt.total_clicks,
            message: "Click queued successfully".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickTotalsResponse {
    pub total_clicks: i64,
    pub queued_clicks: u64,
}

impl From<ClickTotals> for ClickTotalsResponse {
    fn from(totals: ClickTotals) -> Self {
        Self {
            total_clicks: totals.total,
            queued_clicks: totals.queued,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatusResponse {
    pub requests: u64,
    pub time_remaining: u64,
    pub ip: String,
}

impl RateLimitStatusResponse {
    pub fn new(status: RateStatus, ip: impl Into<String>) -> Self {
        Self {
            requests: status.count,
            time_remaining: status.remaining_secs,
            ip: ip.into(),
        }
    }
}

/// Body of a 429 response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitedResponse {
    pub error: String,
    pub message: String,
    pub time_remaining: u64,
}

impl RateLimitedResponse {
    pub fn new(settings: &RateLimitSettings, retry_after_secs: u64) -> Self {
        Self {
            error: "Rate limit exceeded".to_string(),
            message: format!(
                "Maximum {} clicks per {} seconds allowed",
                settings.max_requests,
                settings.window.as_secs()
            ),
            time_remaining: retry_after_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_names_are_camel_case() {
        let accepted = ClickAcceptedResponse::from(ClickReceipt {
            queued: 1,
            total_clicks: 41,
        });
        assert_eq!(
            serde_json::to_value(&accepted).unwrap(),
            json!({ "success": true, "totalClicks": 41, "message": "Click queued successfully" })
        );

        let totals = ClickTotalsResponse::from(ClickTotals { total: 7, queued: 2 });
        assert_eq!(
            serde_json::to_value(&totals).unwrap(),
            json!({ "totalClicks": 7, "queuedClicks": 2 })
        );
    }

    #[test]
    fn test_rate_limited_message_reflects_settings() {
        let body = RateLimitedResponse::new(&RateLimitSettings::default(), 4);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "error": "Rate limit exceeded",
                "message": "Maximum 10 clicks per 10 seconds allowed",
                "timeRemaining": 4
            })
        );
    }
}
