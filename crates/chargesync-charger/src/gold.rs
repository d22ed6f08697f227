//! [`GoldCharger`]: charges through the `gcharge`/`grefund` programs

use std::path::{Path, PathBuf};

use chargesync_core::config::ChargerConfig;
use chargesync_core::{ChargeOutcome, Charger, UsageRecord};

use crate::command::run_logged;
use crate::env::ChargerEnv;

/// Arguments charging `record`.
///
/// `-J <id> -u <user> [-p <project>] -m <machine> [-P <processors>]
/// -N <nodes> -t <seconds> -e <end time>`
pub fn charge_args(record: &UsageRecord) -> Vec<String> {
    let mut args = vec![
        "-J".to_string(),
        record.record_id.to_string(),
        "-u".to_string(),
        record.local_user.clone(),
    ];
    if let Some(project) = &record.project_name {
        args.extend(["-p".to_string(), project.clone()]);
    }
    args.extend(["-m".to_string(), record.machine_name.clone()]);
    if !record.processors.is_empty() {
        args.extend(["-P".to_string(), record.processors.clone()]);
    }
    args.extend([
        "-N".to_string(),
        record.node_count.clone(),
        "-t".to_string(),
        record.charge_amount.clone(),
        "-e".to_string(),
        record.end_time.clone(),
    ]);
    args
}

/// Arguments refunding the charge for `record_id`
pub fn refund_args(record_id: u64) -> Vec<String> {
    vec!["-J".to_string(), record_id.to_string()]
}

/// [`Charger`] running the accounting tool's programs.
#[derive(Debug, Clone)]
pub struct GoldCharger {
    env: ChargerEnv,
    charge_command: String,
    refund_command: String,
    log_file: PathBuf,
    username: Option<String>,
}

impl GoldCharger {
    pub fn new(
        env: ChargerEnv,
        charge_command: impl Into<String>,
        refund_command: impl Into<String>,
        log_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            env,
            charge_command: charge_command.into(),
            refund_command: refund_command.into(),
            log_file: log_file.into(),
            username: None,
        }
    }

    /// Switch to `username` in [`Charger::prepare`].
    pub fn with_user(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn from_config(config: &ChargerConfig) -> chargesync_core::Result<Self> {
        let env = ChargerEnv::new(&config.home)?;
        let charger = Self::new(
            env,
            &config.charge_command,
            &config.refund_command,
            &config.log_file,
        );
        Ok(match &config.username {
            Some(user) => charger.with_user(user),
            None => charger,
        })
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    fn invoke(&self, program: &str, args: &[String]) -> chargesync_core::Result<ChargeOutcome> {
        let status = run_logged(program, args, self.env.vars(), &self.log_file)?;
        if status.success() {
            Ok(ChargeOutcome::Succeeded)
        } else {
            Ok(ChargeOutcome::failed(format!("{program} exited with {status}")))
        }
    }
}

impl Charger for GoldCharger {
    fn prepare(&mut self) -> chargesync_core::Result<()> {
        #[cfg(unix)]
        if let Some(user) = &self.username {
            crate::privileges::drop_privileges(user)?;
        }
        Ok(())
    }

    fn charge(&mut self, record: &UsageRecord) -> chargesync_core::Result<ChargeOutcome> {
        self.invoke(&self.charge_command, &charge_args(record))
    }

    fn refund(&mut self, record_id: u64) -> chargesync_core::Result<ChargeOutcome> {
        self.invoke(&self.refund_command, &refund_args(record_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chargesync_core::RawUsageRecord;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn charge_args_follow_gcharge_order() {
        let record = UsageRecord::from(RawUsageRecord {
            record_id: 42,
            local_user: Some("alice".into()),
            project_name: Some("physics".into()),
            machine_name: Some("cluster-a".into()),
            processors: Some("8".into()),
            node_count: Some("2".into()),
            wall_duration: Some("3600".into()),
            end_time: Some("2026-03-01".into()),
            ..Default::default()
        });

        assert_eq!(
            charge_args(&record),
            [
                "-J", "42", "-u", "alice", "-p", "physics", "-m", "cluster-a", "-P", "8", "-N",
                "2", "-t", "3600", "-e", "2026-03-01"
            ]
        );
    }

    #[rstest]
    #[case::absent(None, None)]
    #[case::blank(Some("  "), None)]
    #[case::trimmed(Some(" physics "), Some("physics"))]
    fn project_flag_only_for_named_projects(
        #[case] project: Option<&str>,
        #[case] expected: Option<&str>,
    ) {
        let record = UsageRecord::from(RawUsageRecord {
            record_id: 1,
            project_name: project.map(str::to_string),
            ..Default::default()
        });

        let args = charge_args(&record);
        let flag = args.iter().position(|a| a == "-p");
        assert_eq!(flag.map(|i| args[i + 1].as_str()), expected);
    }

    #[test]
    fn refunds_name_the_record() {
        assert_eq!(refund_args(7), ["-J", "7"]);
    }
}
