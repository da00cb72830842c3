use chrono::{DateTime, Utc};

/// Row filter shared by reporting, alerting and export queries.
/// `from` is inclusive, `to` is exclusive.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub area: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl EntryFilter {
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            area: None,
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn in_area(mut self, area: Option<String>) -> Self {
        self.area = area.filter(|a| !a.trim().is_empty());
        self
    }
}
