//! Typed views over the YAML payloads returned by the `stats` and `list-tubes`
//! families of commands.
//!
//! The connection returns those payloads as raw bytes; decode them here only
//! when the fields are needed.
use serde::de::DeserializeOwned;
use serde::Deserialize;

pub use super::states::JobState;
use crate::error::Result;

/// Decodes a YAML payload, e.g. `from_yaml::<TubeStats>(&raw)` or
/// `from_yaml::<Vec<String>>(&raw)` for a tube list.
pub fn from_yaml<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    Ok(serde_yaml::from_slice(data)?)
}

/// Reply to `stats-job <id>`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct JobStats {
    /// job ID
    pub id: u64,
    /// tube containing job
    pub tube: String,
    /// job state
    pub state: JobState,
    /// priority set by last put/release/bury
    pub pri: u32,
    /// time in seconds since creation
    pub age: u64,
    /// seconds remaining until ready
    pub delay: u64,
    /// allowed processing time in seconds
    pub ttr: u64,
    /// time until job returns to ready queue
    pub time_left: u64,
    /// earliest binlog file containing job
    #[serde(default)]
    pub file: u64,
    /// number of times job reserved
    pub reserves: u64,
    /// number of times job timed out
    pub timeouts: u64,
    /// number of times job released
    pub releases: u64,
    /// number of times job buried
    pub buries: u64,
    /// number of times job kicked
    pub kicks: u64,
}

/// Reply to `stats-tube <tube>`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct TubeStats {
    pub name: String,
    /// number of jobs in ready state with priority < 1024
    pub current_jobs_urgent: u64,
    pub current_jobs_ready: u64,
    pub current_jobs_reserved: u64,
    pub current_jobs_delayed: u64,
    pub current_jobs_buried: u64,
    /// total jobs created in this tube
    pub total_jobs: u64,
    /// number of clients that have `use`d this tube
    pub current_using: u64,
    /// number of clients waiting on a `reserve` that watch this tube
    pub current_waiting: u64,
    pub current_watching: u64,
    /// number of seconds the tube has been paused for
    pub pause: u64,
    pub cmd_delete: u64,
    pub cmd_pause_tube: u64,
    /// seconds remaining until the tube is un-paused
    pub pause_time_left: u64,
}

/// Reply to `stats`. Fields vary between server versions, so any missing from
/// the payload are left at their defaults.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServerStats {
    pub current_jobs_urgent: u64,
    pub current_jobs_ready: u64,
    pub current_jobs_reserved: u64,
    pub current_jobs_delayed: u64,
    pub current_jobs_buried: u64,

    pub cmd_put: u64,
    pub cmd_peek: u64,
    pub cmd_reserve: u64,
    pub cmd_reserve_with_timeout: u64,
    pub cmd_delete: u64,
    pub cmd_release: u64,
    pub cmd_bury: u64,
    pub cmd_kick: u64,
    pub cmd_touch: u64,
    pub cmd_stats: u64,

    /// cumulative count of times a job has timed out
    pub job_timeouts: u64,
    /// cumulative count of jobs created
    pub total_jobs: u64,
    /// maximum number of bytes in a job
    pub max_job_size: u64,
    pub current_tubes: u64,
    pub current_connections: u64,
    pub current_producers: u64,
    pub current_workers: u64,
    pub current_waiting: u64,
    pub total_connections: u64,
    pub pid: u32,
    /// version string of the server
    pub version: String,
    /// cumulative user CPU time in seconds
    pub rusage_utime: f64,
    /// cumulative system CPU time in seconds
    pub rusage_stime: f64,
    /// seconds since the server started
    pub uptime: u64,
    pub draining: bool,
    /// random ID generated each time the server starts
    pub id: String,
    pub hostname: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_stats() {
        let raw = b"---\nid: 12\ntube: \"testtube\"\nstate: buried\npri: 5\n\
                    age: 3\ndelay: 0\nttr: 30\ntime-left: 0\nfile: 0\n\
                    reserves: 1\ntimeouts: 0\nreleases: 0\nburies: 1\nkicks: 0\n";
        let stats: JobStats = from_yaml(raw).unwrap();

        assert_eq!(stats.id, 12);
        assert_eq!(stats.tube, "testtube");
        assert_eq!(stats.state, JobState::Buried);
        assert_eq!(stats.pri, 5);
        assert_eq!(stats.buries, 1);
    }

    #[test]
    fn test_tube_stats() {
        let raw = b"---\nname: default\ncurrent-jobs-urgent: 0\n\
                    current-jobs-ready: 2\ncurrent-jobs-reserved: 1\n\
                    current-jobs-delayed: 3\ncurrent-jobs-buried: 1\n\
                    total-jobs: 9\ncurrent-using: 1\ncurrent-waiting: 0\n\
                    current-watching: 1\npause: 0\ncmd-delete: 2\n\
                    cmd-pause-tube: 0\npause-time-left: 0\n";
        let stats: TubeStats = from_yaml(raw).unwrap();

        assert_eq!(stats.name, "default");
        assert_eq!(stats.current_jobs_ready, 2);
        assert_eq!(stats.current_jobs_delayed, 3);
        assert_eq!(stats.total_jobs, 9);
    }

    #[test]
    fn test_server_stats_partial() {
        let raw = b"---\ncurrent-jobs-ready: 4\nversion: \"1.13\"\n\
                    rusage-utime: 0.013542\ndraining: false\n\
                    binlog-max-size: 10485760\n";
        let stats: ServerStats = from_yaml(raw).unwrap();

        assert_eq!(stats.current_jobs_ready, 4);
        assert_eq!(stats.version, "1.13");
        assert!(stats.rusage_utime > 0.0);
        assert_eq!(stats.total_jobs, 0);
    }

    #[test]
    fn test_tube_list() {
        let tubes: Vec<String> =
            from_yaml(b"---\n- default\n- testtube\n").unwrap();
        assert_eq!(tubes, ["default", "testtube"]);

        assert!(from_yaml::<Vec<String>>(b"---\nnot: a list\n").is_err());
    }
}
