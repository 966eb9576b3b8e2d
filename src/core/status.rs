use serde::{Deserialize, Serialize};

/// Aggregate health counters reported by `show service database ...`.
///
/// When `database_unreachable` is set the counters were never queried and are
/// all zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseStatus {
    pub raw_outputs: Vec<String>,
    pub count_above_100m: u64,
    pub count_above_500m: u64,
    pub count_above_1b: u64,
    pub count_above_1_5b: u64,
    pub count_above_2b: u64,
    pub database_unreachable: bool,
}

impl DatabaseStatus {
    pub fn unreachable(raw: impl Into<String>) -> Self {
        Self {
            raw_outputs: vec![raw.into()],
            database_unreachable: true,
            ..Self::default()
        }
    }

    /// True when any of the billion-and-above thresholds is non-zero.
    pub fn has_wraparound_pressure(&self) -> bool {
        self.count_above_1b > 0 || self.count_above_1_5b > 0 || self.count_above_2b > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRunState {
    pub app_server: String,
    pub app_server_wrapper: String,
    pub database: String,
}

impl ServiceRunState {
    pub fn entries(&self) -> [(&'static str, &str); 3] {
        [
            ("JBoss Application Server", self.app_server.as_str()),
            (
                "JBoss Application Server Wrapper",
                self.app_server_wrapper.as_str(),
            ),
            ("PostgreSQL", self.database.as_str()),
        ]
    }

    pub fn all_contain(&self, word: &str) -> bool {
        self.entries().iter().all(|(_, state)| state.contains(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraparound_pressure_ignores_sub_billion_counts() {
        let status = DatabaseStatus {
            count_above_100m: 10,
            count_above_500m: 10,
            ..DatabaseStatus::default()
        };
        assert!(!status.has_wraparound_pressure());

        let status = DatabaseStatus {
            count_above_1_5b: 1,
            ..DatabaseStatus::default()
        };
        assert!(status.has_wraparound_pressure());
    }

    #[test]
    fn offline_is_not_mistaken_for_online() {
        let state = ServiceRunState {
            app_server: "offline".to_string(),
            app_server_wrapper: "offline".to_string(),
            database: "offline".to_string(),
        };
        assert!(state.all_contain("offline"));
        assert!(!state.all_contain("online"));
    }
}
