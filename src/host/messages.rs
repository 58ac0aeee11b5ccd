use serde::{Deserialize, Serialize};

use crate::{
    notify::SurfaceMessage,
    storage::entities::{DailySummary, Settings},
    utils::domain::Domain,
};

use super::{TabId, WindowId};

/// Messages the extension sends to the host.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboundMessage {
    #[serde(rename_all = "camelCase")]
    TabActivated {
        tab_id: TabId,
        window_id: Option<WindowId>,
        url: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    TabUpdated { tab_id: TabId, url: String },
    #[serde(rename_all = "camelCase")]
    TabRemoved { tab_id: TabId },
    /// `tabId` and `url` describe the active tab of the newly focused window, when the extension
    /// knows it.
    #[serde(rename_all = "camelCase")]
    WindowFocusChanged {
        window_id: Option<WindowId>,
        tab_id: Option<TabId>,
        url: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    GetTime {
        request_id: Option<u64>,
        domain: String,
    },
    #[serde(rename_all = "camelCase")]
    GetSummary { request_id: Option<u64> },
    SaveSettings { settings: Settings },
}

/// Messages the host sends to the extension.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundMessage {
    #[serde(rename_all = "camelCase")]
    UpdateTime {
        #[serde(skip_serializing_if = "Option::is_none")]
        tab_id: Option<TabId>,
        domain: Domain,
        time: u64,
    },
    SettingsChanged { settings: Settings },
    #[serde(rename_all = "camelCase")]
    Time {
        request_id: Option<u64>,
        domain: Domain,
        time: u64,
        settings: Settings,
    },
    #[serde(rename_all = "camelCase")]
    Summary {
        request_id: Option<u64>,
        #[serde(flatten)]
        summary: DailySummary,
    },
}

impl From<SurfaceMessage> for OutboundMessage {
    fn from(value: SurfaceMessage) -> Self {
        match value {
            SurfaceMessage::UpdateTime(update) => OutboundMessage::UpdateTime {
                tab_id: update.tab_id,
                domain: update.domain,
                time: update.total,
            },
            SurfaceMessage::SettingsChanged(settings) => {
                OutboundMessage::SettingsChanged { settings }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::json;

    use crate::{
        host::{TabId, WindowId},
        notify::{SurfaceMessage, TimeUpdate},
        storage::entities::Settings,
    };

    use super::{InboundMessage, OutboundMessage};

    #[test]
    fn test_inbound_messages() -> Result<()> {
        let activated: InboundMessage = serde_json::from_value(json!({
            "type": "TAB_ACTIVATED", "tabId": 4, "windowId": 1, "url": "https://a.com/"
        }))?;
        assert_eq!(
            activated,
            InboundMessage::TabActivated {
                tab_id: TabId(4),
                window_id: Some(WindowId(1)),
                url: Some("https://a.com/".into())
            }
        );

        let focus: InboundMessage =
            serde_json::from_value(json!({ "type": "WINDOW_FOCUS_CHANGED", "windowId": -1 }))?;
        assert_eq!(
            focus,
            InboundMessage::WindowFocusChanged {
                window_id: Some(WindowId(-1)),
                tab_id: None,
                url: None,
            }
        );

        let focus: InboundMessage = serde_json::from_value(json!({
            "type": "WINDOW_FOCUS_CHANGED", "windowId": 2, "tabId": 8, "url": "https://b.com/"
        }))?;
        assert_eq!(
            focus,
            InboundMessage::WindowFocusChanged {
                window_id: Some(WindowId(2)),
                tab_id: Some(TabId(8)),
                url: Some("https://b.com/".into()),
            }
        );

        let get_time: InboundMessage =
            serde_json::from_value(json!({ "type": "GET_TIME", "domain": "a.com" }))?;
        assert_eq!(
            get_time,
            InboundMessage::GetTime {
                request_id: None,
                domain: "a.com".into()
            }
        );

        let settings: InboundMessage = serde_json::from_value(json!({
            "type": "SAVE_SETTINGS", "settings": { "showOverlay": true, "timezone": "UTC" }
        }))?;
        assert_eq!(
            settings,
            InboundMessage::SaveSettings {
                settings: Settings {
                    show_overlay: true,
                    timezone: "UTC".into()
                }
            }
        );
        Ok(())
    }

    #[test]
    fn test_unknown_inbound_message_is_an_error() {
        assert!(serde_json::from_value::<InboundMessage>(json!({ "type": "DANCE" })).is_err());
    }

    #[test]
    fn test_update_time_wire_format() -> Result<()> {
        let message: OutboundMessage = SurfaceMessage::UpdateTime(TimeUpdate {
            tab_id: Some(TabId(3)),
            domain: "a.com".into(),
            total: 1500,
        })
        .into();

        assert_eq!(
            serde_json::to_value(&message)?,
            json!({ "type": "UPDATE_TIME", "tabId": 3, "domain": "a.com", "time": 1500 })
        );
        Ok(())
    }
}
