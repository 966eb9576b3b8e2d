use serde::Serialize;

/// Literal command vocabulary of the appliance shell.
///
/// Built once at startup and handed to every component by reference. The
/// strings are sent byte-for-byte, control characters included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSet {
    pub db_status: String,
    pub db_transaction_status: String,
    pub enter_cli: String,
    pub exit_cli: String,
    pub service_listing: String,
    pub start_db: String,
    pub start_app_server: String,
    pub stop_db: String,
    pub stop_app_server: String,
    pub elevate: String,
    pub switch_db_user: String,
    pub end_of_input: String,
    pub quit_db_shell: String,
    pub vacuum_interactive: String,
    pub vacuum_single_user: String,
    pub data_dir: String,
    pub db_shell_user: String,
    pub targets: Vec<String>,
    pub unreachable_marker: String,
    pub stale_lock_marker: String,
}

impl Default for CommandSet {
    fn default() -> Self {
        Self {
            db_status: "show service database status".to_string(),
            db_transaction_status: "show service database transaction-id status".to_string(),
            enter_cli: "svcli".to_string(),
            exit_cli: "exit".to_string(),
            service_listing: "show system services".to_string(),
            start_db: "start service database".to_string(),
            start_app_server: "start service application-server".to_string(),
            stop_db: "stop service database".to_string(),
            stop_app_server: "stop service application-server".to_string(),
            elevate: "sudo su -".to_string(),
            switch_db_user: "su - pgsql".to_string(),
            end_of_input: "\x04".to_string(),
            quit_db_shell: "\\q".to_string(),
            vacuum_interactive: "vacuum analyze;".to_string(),
            vacuum_single_user: "vacuum analyze".to_string(),
            data_dir: "/usr/local/pgsql/data".to_string(),
            db_shell_user: "svadmin".to_string(),
            targets: vec!["sv_stat".to_string(), "sv_sub".to_string()],
            unreachable_marker: "Unable to connect to database".to_string(),
            stale_lock_marker: "\"postmaster.pid\" already exists".to_string(),
        }
    }
}

impl CommandSet {
    /// `psql <target> svadmin`
    pub fn interactive_shell(&self, target: &str) -> String {
        format!("psql {target} {}", self.db_shell_user)
    }

    /// `postgres --single -D /usr/local/pgsql/data <target>`
    pub fn single_user_engine(&self, target: &str) -> String {
        format!("postgres --single -D {} {target}", self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_match_appliance_vocabulary() {
        let c = CommandSet::default();
        assert_eq!(c.end_of_input.as_bytes(), &[0x04]);
        assert_eq!(c.quit_db_shell.as_bytes(), b"\\q");
        assert_eq!(c.interactive_shell("sv_stat"), "psql sv_stat svadmin");
        assert_eq!(
            c.single_user_engine("sv_sub"),
            "postgres --single -D /usr/local/pgsql/data sv_sub"
        );
        assert_eq!(c.targets, vec!["sv_stat", "sv_sub"]);
    }
}
