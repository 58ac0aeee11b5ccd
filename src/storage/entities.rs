use std::{cmp::Reverse, collections::HashMap};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::utils::{
    domain::Domain,
    percentage::{millis_percentage, Percentage},
};

const TIME_DATA_KEY: &str = "timeData";
const LAST_RESET_DATE_KEY: &str = "lastResetDate";
const SETTINGS_KEY: &str = "settings";

/// Time spent on each domain during one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyAccounting {
    pub per_domain_millis: HashMap<Domain, u64>,
    /// Day the totals belong to, `YYYY-MM-DD` in the configured timezone.
    pub reset_date: String,
}

impl DailyAccounting {
    pub fn empty(reset_date: String) -> Self {
        Self {
            per_domain_millis: HashMap::new(),
            reset_date,
        }
    }

    pub fn time_for(&self, domain: &str) -> u64 {
        self.per_domain_millis.get(domain).copied().unwrap_or(0)
    }

    /// Adds `millis` to the domain's total and returns the new total.
    pub fn add(&mut self, domain: Domain, millis: u64) -> u64 {
        let total = self.per_domain_millis.entry(domain).or_insert(0);
        *total = total.saturating_add(millis);
        *total
    }

    /// Today's totals ordered from the most used domain to the least used one.
    pub fn summary(&self) -> DailySummary {
        let mut entries = self
            .per_domain_millis
            .iter()
            .filter(|(_, time)| **time > 0)
            .map(|(domain, time)| (domain.clone(), *time))
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| (Reverse(a.1), &a.0).cmp(&(Reverse(b.1), &b.0)));

        let total = entries.iter().map(|(_, time)| *time).sum::<u64>();

        DailySummary {
            date: self.reset_date.clone(),
            total,
            entries: entries
                .into_iter()
                .map(|(domain, time)| DomainShare {
                    percent: millis_percentage(time, total),
                    domain,
                    time,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub date: String,
    pub total: u64,
    pub entries: Vec<DomainShare>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainShare {
    pub domain: Domain,
    pub time: u64,
    pub percent: Percentage,
}

/// User preferences shared with display surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, alias = "showHeader")]
    pub show_overlay: bool,
    #[serde(default = "system_timezone")]
    pub timezone: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_overlay: false,
            timezone: system_timezone(),
        }
    }
}

/// IANA name of the timezone the system is configured with.
pub fn system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|e| {
        warn!("Couldn't resolve system timezone, using UTC: {e}");
        "UTC".into()
    })
}

/// The persisted document. Kept as a loose json object so that keys written by other versions
/// survive a rewrite, and a single malformed key doesn't make the rest unreadable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDocument {
    fields: Map<String, Value>,
}

impl StateDocument {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(Self {
            fields: serde_json::from_slice(bytes)?,
        })
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.fields)?)
    }

    pub fn time_data(&self) -> HashMap<Domain, u64> {
        let Some(value) = self.fields.get(TIME_DATA_KEY) else {
            return HashMap::new();
        };
        let Some(entries) = value.as_object() else {
            warn!("Ignoring {TIME_DATA_KEY} that is not an object: {value}");
            return HashMap::new();
        };
        entries
            .iter()
            .filter_map(|(domain, time)| {
                let millis = time
                    .as_u64()
                    .or_else(|| time.as_f64().filter(|v| *v >= 0.).map(|v| v as u64));
                if millis.is_none() {
                    warn!("Ignoring illegal time {time} for {domain}");
                }
                millis.map(|millis| (Domain::from(domain.as_str()), millis))
            })
            .collect()
    }

    pub fn last_reset_date(&self) -> Option<&str> {
        self.fields.get(LAST_RESET_DATE_KEY).and_then(Value::as_str)
    }

    pub fn settings(&self) -> Option<Settings> {
        let value = self.fields.get(SETTINGS_KEY)?;
        match Settings::deserialize(value) {
            Ok(settings) => Some(settings),
            Err(e) => {
                warn!("Ignoring illegal settings {value}: {e}");
                None
            }
        }
    }

    /// Replaces the accounting keys, leaves everything else untouched.
    pub fn set_accounting(&mut self, accounting: &DailyAccounting) {
        let time_data = accounting
            .per_domain_millis
            .iter()
            .map(|(domain, time)| (domain.to_string(), Value::from(*time)))
            .collect::<Map<_, _>>();
        self.fields
            .insert(TIME_DATA_KEY.into(), Value::Object(time_data));
        self.fields.insert(
            LAST_RESET_DATE_KEY.into(),
            Value::from(accounting.reset_date.as_str()),
        );
    }

    /// Replaces the settings key, leaves everything else untouched.
    pub fn set_settings(&mut self, settings: &Settings) -> Result<()> {
        self.fields
            .insert(SETTINGS_KEY.into(), serde_json::to_value(settings)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::json;

    use super::{DailyAccounting, Settings, StateDocument};

    #[test]
    fn test_document_reads_legacy_and_loose_values() -> Result<()> {
        let raw = json!({
            "timeData": { "a.com": 1500, "b.com": 20.0, "broken.com": "soon", "neg.com": -4 },
            "lastResetDate": "2018-07-04",
            "settings": { "showHeader": true, "timezone": "Europe/Kyiv" },
            "somethingNew": [1, 2, 3],
        });
        let document = StateDocument::from_slice(&serde_json::to_vec(&raw)?)?;

        let time_data = document.time_data();
        assert_eq!(time_data.len(), 2);
        assert_eq!(time_data["a.com"], 1500);
        assert_eq!(time_data["b.com"], 20);
        assert_eq!(document.last_reset_date(), Some("2018-07-04"));
        assert_eq!(
            document.settings(),
            Some(Settings {
                show_overlay: true,
                timezone: "Europe/Kyiv".into()
            })
        );
        Ok(())
    }

    #[test]
    fn test_document_illegal_settings_are_ignored() -> Result<()> {
        let document = StateDocument::from_slice(br#"{"settings": "yes"}"#)?;
        assert_eq!(document.settings(), None);
        assert!(document.time_data().is_empty());
        Ok(())
    }

    #[test]
    fn test_document_empty_file() -> Result<()> {
        assert_eq!(StateDocument::from_slice(b"")?, StateDocument::default());
        assert_eq!(StateDocument::from_slice(b" \n")?, StateDocument::default());
        Ok(())
    }

    #[test]
    fn test_document_keeps_unknown_keys() -> Result<()> {
        let mut document = StateDocument::from_slice(br#"{"somethingNew": 42}"#)?;
        let mut accounting = DailyAccounting::empty("2018-07-04".into());
        accounting.add("a.com".into(), 10);
        document.set_accounting(&accounting);

        let value: serde_json::Value = serde_json::from_slice(&document.to_vec()?)?;
        assert_eq!(value["somethingNew"], 42);
        assert_eq!(value["timeData"]["a.com"], 10);
        assert_eq!(value["lastResetDate"], "2018-07-04");
        Ok(())
    }

    #[test]
    fn test_summary_ordering() {
        let mut accounting = DailyAccounting::empty("2018-07-04".into());
        accounting.add("b.com".into(), 1000);
        accounting.add("a.com".into(), 3000);
        accounting.add("c.com".into(), 1000);
        accounting.add("zero.com".into(), 0);

        let summary = accounting.summary();

        assert_eq!(summary.total, 5000);
        let order = summary
            .entries
            .iter()
            .map(|v| (&*v.domain, v.time, *v.percent))
            .collect::<Vec<_>>();
        assert_eq!(
            order,
            vec![("a.com", 3000, 60.), ("b.com", 1000, 20.), ("c.com", 1000, 20.)]
        );
    }
}
