//! Session operations: one method per protocol command.
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::ToSocketAddrs;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::parser::parse_response;
use crate::transport::Transport;
use crate::types::job::Job;
use crate::types::protocol::{
    check_tube_name, wire_secs, BeanstalkCommand, BeanstalkResponse,
};
use crate::types::serialisable::BeanstalkSerialisable;
use crate::util::bytes_to_human_str;

/// A connection to a beanstalkd server.
///
/// Each method sends one command and waits for its complete response, so a
/// connection has at most one request in flight. Methods take `&mut self`;
/// running several workers concurrently needs one connection per worker.
///
/// If a method's future is dropped before completing, the connection's
/// framing is unknown and it should be discarded.
pub struct Connection {
    transport: Transport,
}

impl Connection {
    /// Connects to a server at `addr`, e.g. `"127.0.0.1:11300"`.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        Ok(Self {
            transport: Transport::connect(addr).await?,
        })
    }

    /// The address of the server this connection was opened to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.transport.peer_addr()
    }

    /// Sends one command and parses the status line it gets back.
    async fn request(
        &mut self,
        cmd: &BeanstalkCommand<'_>,
    ) -> Result<BeanstalkResponse> {
        let wire = cmd.serialise_beanstalk();

        // Job data can be large and binary: log only the command line.
        let line_len = wire
            .windows(2)
            .position(|w| w == b"\r\n")
            .unwrap_or(wire.len());
        trace!(cmd = bytes_to_human_str(&wire[..line_len]), "sending");

        self.transport.send_all(&wire).await?;

        let line = self.transport.read_line().await?;

        parse_response(&line)
    }

    /// Sends a command whose only success reply is `expected`.
    async fn request_exact(
        &mut self,
        cmd: &BeanstalkCommand<'_>,
        expected: BeanstalkResponse,
    ) -> Result<()> {
        match self.request(cmd).await? {
            resp if resp == expected => Ok(()),
            resp => Err(resp.into_error()),
        }
    }

    /// Sends a command replied to with `RESERVED` or `FOUND` and a job body.
    async fn request_job(&mut self, cmd: &BeanstalkCommand<'_>) -> Result<Job> {
        use BeanstalkResponse::*;

        match self.request(cmd).await? {
            Reserved { id, n_bytes } | Found { id, n_bytes } => {
                let body = self.transport.read_body(n_bytes).await?;
                Ok(Job::new(id, body))
            },
            resp => Err(resp.into_error()),
        }
    }

    /// Sends a command replied to with `OK <n_bytes>` and a YAML body, which
    /// is returned as-is.
    async fn request_yaml(
        &mut self,
        cmd: &BeanstalkCommand<'_>,
    ) -> Result<Bytes> {
        match self.request(cmd).await? {
            BeanstalkResponse::OkBytes { n_bytes } => {
                self.transport.read_body(n_bytes).await
            },
            resp => Err(resp.into_error()),
        }
    }

    /// Adds `tube` to the watch list, returning the number of tubes watched.
    pub async fn watch(&mut self, tube: &str) -> Result<u32> {
        check_tube_name(tube)?;

        match self.request(&BeanstalkCommand::Watch { tube }).await? {
            BeanstalkResponse::Watching { count } => Ok(count),
            resp => Err(resp.into_error()),
        }
    }

    /// Removes `tube` from the watch list, returning the number of tubes still
    /// watched. Ignoring the last watched tube fails with
    /// [`Error::NotIgnored`].
    pub async fn ignore(&mut self, tube: &str) -> Result<u32> {
        check_tube_name(tube)?;

        match self.request(&BeanstalkCommand::Ignore { tube }).await? {
            BeanstalkResponse::Watching { count } => Ok(count),
            BeanstalkResponse::NotIgnored => Err(Error::NotIgnored),
            resp => Err(resp.into_error()),
        }
    }

    /// Sets the tube that subsequent `put`s go into. Until this is called, the
    /// server uses the tube named `default`.
    pub async fn use_tube(&mut self, tube: &str) -> Result<()> {
        check_tube_name(tube)?;

        match self.request(&BeanstalkCommand::Use { tube }).await? {
            BeanstalkResponse::Using { tube: actual } if actual == tube => {
                Ok(())
            },
            BeanstalkResponse::Using { tube: actual } => {
                Err(Error::UsingMismatch {
                    expected: tube.to_owned(),
                    actual,
                })
            },
            resp => Err(resp.into_error()),
        }
    }

    /// Puts a job into the currently used tube, returning its ID.
    ///
    /// * `pri`: jobs with smaller values are reserved first; 0 is the most
    ///   urgent.
    /// * `delay`: time the job spends in the delayed state before becoming
    ///   ready.
    /// * `ttr`: time a worker has to finish the job once reserved before the
    ///   server releases it. The server raises a TTR of 0 to 1 second.
    ///
    /// Durations are sent as whole seconds. If the server creates the job but
    /// buries it straight away, this fails with [`Error::JobBuried`] carrying
    /// the new job's ID.
    pub async fn put(
        &mut self,
        data: &[u8],
        pri: u32,
        delay: Duration,
        ttr: Duration,
    ) -> Result<u64> {
        let cmd = BeanstalkCommand::Put {
            pri,
            delay: wire_secs(delay),
            ttr: wire_secs(ttr),
            data,
        };

        self.request_put(&cmd).await
    }

    /// As [`Connection::put`], but for servers supporting `put-unique`, which
    /// don't create a duplicate of an existing job with the same body.
    pub async fn put_unique(
        &mut self,
        data: &[u8],
        pri: u32,
        delay: Duration,
        ttr: Duration,
    ) -> Result<u64> {
        let cmd = BeanstalkCommand::PutUnique {
            pri,
            delay: wire_secs(delay),
            ttr: wire_secs(ttr),
            data,
        };

        self.request_put(&cmd).await
    }

    async fn request_put(&mut self, cmd: &BeanstalkCommand<'_>) -> Result<u64> {
        match self.request(cmd).await? {
            BeanstalkResponse::Inserted { id } => Ok(id),
            BeanstalkResponse::BuriedId { id } => Err(Error::JobBuried { id }),
            resp => Err(resp.into_error()),
        }
    }

    /// Reserves a job from any watched tube, waiting as long as it takes for
    /// one to become ready.
    ///
    /// Fails with [`ServerError::DeadlineSoon`](crate::ServerError) if a job
    /// already reserved by this connection is about to exceed its TTR.
    pub async fn reserve(&mut self) -> Result<Job> {
        self.request_job(&BeanstalkCommand::Reserve).await
    }

    /// As [`Connection::reserve`], but if no job becomes ready within
    /// `timeout` (in whole seconds), fails with
    /// [`ServerError::TimedOut`](crate::ServerError); see
    /// [`Error::is_timed_out`]. A zero timeout polls without waiting.
    pub async fn reserve_with_timeout(
        &mut self,
        timeout: Duration,
    ) -> Result<Job> {
        let cmd = BeanstalkCommand::ReserveWithTimeout {
            timeout: wire_secs(timeout),
        };

        self.request_job(&cmd).await
    }

    /// Reserves a specific job, if it exists and isn't already reserved.
    pub async fn reserve_job(&mut self, id: u64) -> Result<Job> {
        self.request_job(&BeanstalkCommand::ReserveJob { id }).await
    }

    pub async fn delete(&mut self, id: u64) -> Result<()> {
        let cmd = BeanstalkCommand::Delete { id };
        self.request_exact(&cmd, BeanstalkResponse::Deleted).await
    }

    /// Returns a job reserved by this connection to the ready queue, or to the
    /// delayed state for `delay`, with a new priority.
    pub async fn release(
        &mut self,
        id: u64,
        pri: u32,
        delay: Duration,
    ) -> Result<()> {
        let cmd = BeanstalkCommand::Release {
            id,
            pri,
            delay: wire_secs(delay),
        };
        self.request_exact(&cmd, BeanstalkResponse::Released).await
    }

    /// Buries a job reserved by this connection. It won't be reserved again
    /// until kicked.
    pub async fn bury(&mut self, id: u64, pri: u32) -> Result<()> {
        let cmd = BeanstalkCommand::Bury { id, pri };
        self.request_exact(&cmd, BeanstalkResponse::Buried).await
    }

    /// Asks for more time to work on a reserved job, restarting its TTR.
    pub async fn touch(&mut self, id: u64) -> Result<()> {
        let cmd = BeanstalkCommand::Touch { id };
        self.request_exact(&cmd, BeanstalkResponse::Touched).await
    }

    /// Moves up to `bound` jobs in the currently used tube back to ready,
    /// returning how many were moved. Buried jobs are kicked if there are any;
    /// otherwise delayed jobs are.
    pub async fn kick(&mut self, bound: u64) -> Result<u64> {
        match self.request(&BeanstalkCommand::Kick { bound }).await? {
            BeanstalkResponse::KickedCount { count } => Ok(count),
            resp => Err(resp.into_error()),
        }
    }

    /// Moves one buried or delayed job back to ready.
    pub async fn kick_job(&mut self, id: u64) -> Result<()> {
        let cmd = BeanstalkCommand::KickJob { id };
        self.request_exact(&cmd, BeanstalkResponse::Kicked).await
    }

    /// Returns a job by ID regardless of its state, without reserving it.
    pub async fn peek(&mut self, id: u64) -> Result<Job> {
        self.request_job(&BeanstalkCommand::Peek { id }).await
    }

    /// Returns the next ready job in the currently used tube.
    pub async fn peek_ready(&mut self) -> Result<Job> {
        self.request_job(&BeanstalkCommand::PeekReady).await
    }

    /// Returns the delayed job with the shortest delay left in the currently
    /// used tube.
    pub async fn peek_delayed(&mut self) -> Result<Job> {
        self.request_job(&BeanstalkCommand::PeekDelayed).await
    }

    /// Returns the next job to be kicked in the currently used tube.
    pub async fn peek_buried(&mut self) -> Result<Job> {
        self.request_job(&BeanstalkCommand::PeekBuried).await
    }

    /// Server statistics as raw YAML; decode with
    /// [`stats::from_yaml`](crate::stats::from_yaml) into
    /// [`ServerStats`](crate::stats::ServerStats) if needed.
    pub async fn stats(&mut self) -> Result<Bytes> {
        self.request_yaml(&BeanstalkCommand::StatsServer).await
    }

    /// Statistics for one tube as raw YAML.
    pub async fn stats_tube(&mut self, tube: &str) -> Result<Bytes> {
        check_tube_name(tube)?;
        self.request_yaml(&BeanstalkCommand::StatsTube { tube }).await
    }

    /// Statistics for one job as raw YAML.
    pub async fn stats_job(&mut self, id: u64) -> Result<Bytes> {
        self.request_yaml(&BeanstalkCommand::StatsJob { id }).await
    }

    /// All existing tubes as a raw YAML list.
    pub async fn list_tubes(&mut self) -> Result<Bytes> {
        self.request_yaml(&BeanstalkCommand::ListTubes).await
    }

    /// The tubes this connection watches as a raw YAML list.
    pub async fn list_tubes_watched(&mut self) -> Result<Bytes> {
        self.request_yaml(&BeanstalkCommand::ListTubesWatched).await
    }

    /// The tube this connection is currently using.
    pub async fn list_tube_used(&mut self) -> Result<String> {
        match self.request(&BeanstalkCommand::ListTubeUsed).await? {
            BeanstalkResponse::Using { tube } => Ok(tube),
            resp => Err(resp.into_error()),
        }
    }

    /// Stops jobs in `tube` from being reserved for `delay`.
    pub async fn pause_tube(
        &mut self,
        tube: &str,
        delay: Duration,
    ) -> Result<()> {
        check_tube_name(tube)?;

        let cmd = BeanstalkCommand::PauseTube {
            tube,
            delay: wire_secs(delay),
        };
        self.request_exact(&cmd, BeanstalkResponse::Paused).await
    }

    /// Asks the server to close the connection, then closes it regardless of
    /// whether the request could be sent.
    pub async fn quit(mut self) {
        let wire = BeanstalkCommand::Quit.serialise_beanstalk();

        if let Err(error) = self.transport.send_all(&wire).await {
            debug!(%error, "failed to send quit");
        }

        self.transport.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use crate::error::ServerError;

    /// Starts a server accepting one connection that, for each step, expects
    /// exactly the given request bytes and then sends the given reply. Once
    /// the script runs out it returns everything else the client sends until
    /// the connection closes.
    async fn mock_server(
        script: Vec<(Vec<u8>, Vec<u8>)>,
    ) -> (SocketAddr, JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();

            for (request, reply) in script {
                let mut got = vec![0; request.len()];
                conn.read_exact(&mut got).await.unwrap();
                assert_eq!(
                    bytes_to_human_str(&got),
                    bytes_to_human_str(&request)
                );
                conn.write_all(&reply).await.unwrap();
            }

            let mut rest = Vec::new();
            conn.read_to_end(&mut rest).await.unwrap();
            rest
        });

        (addr, handle)
    }

    fn step(request: &[u8], reply: &[u8]) -> (Vec<u8>, Vec<u8>) {
        (request.to_vec(), reply.to_vec())
    }

    #[tokio::test]
    async fn test_job_lifecycle() {
        let (addr, server) = mock_server(vec![
            step(b"use testtube\r\n", b"USING testtube\r\n"),
            step(b"put 0 0 30 7\r\ntestjob\r\n", b"INSERTED 5\r\n"),
            step(b"watch testtube\r\n", b"WATCHING 2\r\n"),
            step(b"reserve\r\n", b"RESERVED 5 7\r\ntestjob\r\n"),
            step(b"delete 5\r\n", b"DELETED\r\n"),
            step(b"reserve-with-timeout 1\r\n", b"TIMED_OUT\r\n"),
        ])
        .await;

        let mut conn = Connection::connect(addr).await.unwrap();
        assert_eq!(conn.peer_addr(), addr);

        conn.use_tube("testtube").await.unwrap();
        let id = conn
            .put(b"testjob", 0, Duration::ZERO, Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(id, 5);

        assert_eq!(conn.watch("testtube").await.unwrap(), 2);

        let job = conn.reserve().await.unwrap();
        assert_eq!(job.id(), 5);
        assert_eq!(job.body(), b"testjob");

        conn.delete(job.id()).await.unwrap();

        let err = conn
            .reserve_with_timeout(Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_timed_out());
        assert!(!err.is_fatal());

        conn.quit().await;
        assert_eq!(server.await.unwrap(), b"quit\r\n");
    }

    #[tokio::test]
    async fn test_body_with_crlf_preserved() {
        let body: &[u8] = b"line one\r\nline two\r\n\r\n";
        let (addr, server) = mock_server(vec![
            step(
                &[&b"put 1 0 60 22\r\n"[..], body, &b"\r\n"[..]].concat(),
                b"INSERTED 9\r\n",
            ),
            step(
                b"reserve\r\n",
                &[&b"RESERVED 9 22\r\n"[..], body, &b"\r\n"[..]].concat(),
            ),
        ])
        .await;

        let mut conn = Connection::connect(addr).await.unwrap();
        conn.put(body, 1, Duration::ZERO, Duration::from_secs(60))
            .await
            .unwrap();

        let job = conn.reserve().await.unwrap();
        assert_eq!(job.id(), 9);
        assert_eq!(job.body(), body);

        conn.quit().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_large_body() {
        let body: Vec<u8> = (0..70_000u32).map(|i| (i % 251) as u8).collect();
        let header = format!("put 0 0 1 {}\r\n", body.len());
        let (addr, server) = mock_server(vec![step(
            &[header.as_bytes(), &body[..], &b"\r\n"[..]].concat(),
            b"INSERTED 1\r\n",
        )])
        .await;

        let mut conn = Connection::connect(addr).await.unwrap();
        let id = conn
            .put(&body, 0, Duration::ZERO, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(id, 1);

        conn.quit().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_put_buried_reports_id() {
        let (addr, server) = mock_server(vec![
            step(b"put 0 0 0 1\r\nx\r\n", b"BURIED 77\r\n"),
            step(b"put 0 0 0 1\r\nx\r\n", b"JOB_TOO_BIG\r\n"),
            step(b"put 0 0 0 1\r\nx\r\n", b"DRAINING\r\n"),
        ])
        .await;

        let mut conn = Connection::connect(addr).await.unwrap();
        let zero = Duration::ZERO;

        assert!(matches!(
            conn.put(b"x", 0, zero, zero).await,
            Err(Error::JobBuried { id: 77 })
        ));
        assert!(matches!(
            conn.put(b"x", 0, zero, zero).await,
            Err(Error::Server(ServerError::JobTooBig))
        ));
        assert!(matches!(
            conn.put(b"x", 0, zero, zero).await,
            Err(Error::Server(ServerError::Draining))
        ));

        conn.quit().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_put_unique() {
        let (addr, server) = mock_server(vec![step(
            b"put-unique 3 10 60 2\r\nhi\r\n",
            b"INSERTED 12\r\n",
        )])
        .await;

        let mut conn = Connection::connect(addr).await.unwrap();
        let id = conn
            .put_unique(
                b"hi",
                3,
                Duration::from_millis(10_900),
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        assert_eq!(id, 12);

        conn.quit().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_job_commands() {
        let (addr, server) = mock_server(vec![
            step(b"release 3 10 0\r\n", b"RELEASED\r\n"),
            step(b"release 3 10 5\r\n", b"BURIED\r\n"),
            step(b"bury 3 20\r\n", b"BURIED\r\n"),
            step(b"touch 3\r\n", b"TOUCHED\r\n"),
            step(b"touch 4\r\n", b"NOT_FOUND\r\n"),
            step(b"delete 4\r\n", b"NOT_FOUND\r\n"),
            step(b"delete 3\r\n", b"TOUCHED\r\n"),
            step(b"delete 3\r\n", b"BURIED 3\r\n"),
            step(b"reserve\r\n", b"DEADLINE_SOON\r\n"),
        ])
        .await;

        let mut conn = Connection::connect(addr).await.unwrap();

        conn.release(3, 10, Duration::ZERO).await.unwrap();
        assert!(matches!(
            conn.release(3, 10, Duration::from_secs(5)).await,
            Err(Error::Server(ServerError::Buried))
        ));
        conn.bury(3, 20).await.unwrap();
        conn.touch(3).await.unwrap();
        assert!(conn.touch(4).await.unwrap_err().is_not_found());
        assert!(conn.delete(4).await.unwrap_err().is_not_found());

        match conn.delete(3).await {
            Err(Error::Unrecognised(text)) => assert_eq!(text, "TOUCHED"),
            other => panic!("unexpected {other:?}"),
        }
        // An ID'd BURIED only answers a put.
        match conn.delete(3).await {
            Err(Error::Unrecognised(text)) => assert_eq!(text, "BURIED 3"),
            other => panic!("unexpected {other:?}"),
        }

        assert!(matches!(
            conn.reserve().await,
            Err(Error::Server(ServerError::DeadlineSoon))
        ));

        conn.quit().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_kick() {
        let (addr, server) = mock_server(vec![
            step(b"kick 10\r\n", b"KICKED 1\r\n"),
            step(b"kick-job 8\r\n", b"KICKED\r\n"),
            step(b"kick-job 9\r\n", b"NOT_FOUND\r\n"),
            step(b"kick 1\r\n", b"KICKED\r\n"),
        ])
        .await;

        let mut conn = Connection::connect(addr).await.unwrap();

        assert_eq!(conn.kick(10).await.unwrap(), 1);
        conn.kick_job(8).await.unwrap();
        assert!(conn.kick_job(9).await.unwrap_err().is_not_found());
        // A bare KICKED is the kick-job reply, not a count.
        assert!(matches!(conn.kick(1).await, Err(Error::Unrecognised(_))));

        conn.quit().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_watch_ignore_use() {
        let (addr, server) = mock_server(vec![
            step(b"watch a\r\n", b"WATCHING 2\r\n"),
            step(b"ignore a\r\n", b"WATCHING 1\r\n"),
            step(b"ignore default\r\n", b"NOT_IGNORED\r\n"),
            step(b"watch b\r\n", b"NOT_IGNORED\r\n"),
            step(b"use b\r\n", b"USING c\r\n"),
            step(b"list-tube-used\r\n", b"USING c\r\n"),
        ])
        .await;

        let mut conn = Connection::connect(addr).await.unwrap();

        assert_eq!(conn.watch("a").await.unwrap(), 2);
        assert_eq!(conn.ignore("a").await.unwrap(), 1);
        assert!(matches!(
            conn.ignore("default").await,
            Err(Error::NotIgnored)
        ));
        // NOT_IGNORED only answers an ignore.
        assert!(matches!(
            conn.watch("b").await,
            Err(Error::Unrecognised(_))
        ));
        match conn.use_tube("b").await {
            Err(Error::UsingMismatch { expected, actual }) => {
                assert_eq!(expected, "b");
                assert_eq!(actual, "c");
            },
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(conn.list_tube_used().await.unwrap(), "c");

        conn.quit().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_tube_name_sends_nothing() {
        let (addr, server) = mock_server(vec![]).await;

        let mut conn = Connection::connect(addr).await.unwrap();
        let long = "t".repeat(201);

        assert!(matches!(
            conn.use_tube(&long).await,
            Err(Error::TubeNameTooLong { len: 201 })
        ));
        assert!(matches!(
            conn.watch(&long).await,
            Err(Error::TubeNameTooLong { len: 201 })
        ));
        assert!(matches!(
            conn.ignore("bad name").await,
            Err(Error::InvalidTubeName(_))
        ));
        assert!(matches!(
            conn.stats_tube("-x").await,
            Err(Error::InvalidTubeName(_))
        ));

        conn.quit().await;
        assert_eq!(server.await.unwrap(), b"quit\r\n");
    }

    #[tokio::test]
    async fn test_peek() {
        let (addr, server) = mock_server(vec![
            step(b"peek 4\r\n", b"FOUND 4 3\r\nabc\r\n"),
            step(b"peek-ready\r\n", b"FOUND 5 0\r\n\r\n"),
            step(b"peek-delayed\r\n", b"NOT_FOUND\r\n"),
            step(b"peek-buried\r\n", b"FOUND 6 1\r\nz\r\n"),
            step(b"reserve-job 6\r\n", b"RESERVED 6 1\r\nz\r\n"),
        ])
        .await;

        let mut conn = Connection::connect(addr).await.unwrap();

        let job = conn.peek(4).await.unwrap();
        assert_eq!((job.id(), job.body()), (4, &b"abc"[..]));
        let job = conn.peek_ready().await.unwrap();
        assert_eq!((job.id(), job.body()), (5, &b""[..]));
        assert!(conn.peek_delayed().await.unwrap_err().is_not_found());
        assert_eq!(conn.peek_buried().await.unwrap().id(), 6);
        assert_eq!(conn.reserve_job(6).await.unwrap().into_body(), "z");

        conn.quit().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_stats_and_lists() {
        let (addr, server) = mock_server(vec![
            step(b"stats\r\n", b"OK 26\r\n---\ncurrent-jobs-ready: 1\n\r\n"),
            step(b"stats-tube t\r\n", b"NOT_FOUND\r\n"),
            step(b"stats-job 1\r\n", b"OK 3\r\n---\r\n"),
            step(b"list-tubes\r\n", b"OK 14\r\n---\n- default\n\r\n"),
            step(b"list-tubes-watched\r\n", b"OK 4\r\n---\nXX"),
        ])
        .await;

        let mut conn = Connection::connect(addr).await.unwrap();

        let raw = conn.stats().await.unwrap();
        let stats: crate::stats::ServerStats =
            crate::stats::from_yaml(&raw).unwrap();
        assert_eq!(stats.current_jobs_ready, 1);

        assert!(conn.stats_tube("t").await.unwrap_err().is_not_found());
        assert_eq!(conn.stats_job(1).await.unwrap(), "---");

        let tubes: Vec<String> =
            crate::stats::from_yaml(&conn.list_tubes().await.unwrap()).unwrap();
        assert_eq!(tubes, ["default"]);

        // The body isn't followed by CRLF.
        let err = conn.list_tubes_watched().await.unwrap_err();
        assert!(matches!(err, Error::BodyFraming { declared: 4 }));
        assert!(err.is_fatal());

        conn.quit().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_pause_tube() {
        let (addr, server) = mock_server(vec![
            step(b"pause-tube t 30\r\n", b"PAUSED\r\n"),
            step(b"pause-tube u 0\r\n", b"NOT_FOUND\r\n"),
        ])
        .await;

        let mut conn = Connection::connect(addr).await.unwrap();

        conn.pause_tube("t", Duration::from_secs(30)).await.unwrap();
        assert!(conn
            .pause_tube("u", Duration::ZERO)
            .await
            .unwrap_err()
            .is_not_found());

        conn.quit().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_and_closed() {
        let (addr, server) = mock_server(vec![step(
            b"reserve\r\n",
            b"RESERVED 1\r\n",
        )])
        .await;

        let mut conn = Connection::connect(addr).await.unwrap();

        let err = conn.reserve().await.unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
        assert!(err.is_fatal());

        conn.quit().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_server_hangs_up() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            let mut got = [0; 9];
            conn.read_exact(&mut got).await.unwrap();
        });

        let mut conn = Connection::connect(addr).await.unwrap();
        let err = conn.reserve().await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_fatal());

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_huge_body_length_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            let mut got = [0; 9];
            conn.read_exact(&mut got).await.unwrap();
            conn.write_all(b"RESERVED 1 18446744073709551600\r\n")
                .await
                .unwrap();
        });

        let mut conn = Connection::connect(addr).await.unwrap();
        let err = conn.reserve().await.unwrap_err();
        assert!(err.is_fatal(), "{err:?}");

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_quit_after_failed_large_put() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            drop(listener.accept().await.unwrap());
        });

        let mut conn = Connection::connect(addr).await.unwrap();
        server.await.unwrap();

        let body = vec![b'x'; 2000];
        let err = conn
            .put(&body, 0, Duration::ZERO, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(err.is_fatal(), "{err:?}");

        conn.quit().await;
    }

    #[tokio::test]
    async fn test_overlong_status_line() {
        let (addr, server) =
            mock_server(vec![step(b"reserve\r\n", &[b'x'; 300])]).await;

        let mut conn = Connection::connect(addr).await.unwrap();
        assert!(matches!(conn.reserve().await, Err(Error::Malformed(_))));

        conn.quit().await;
        assert_eq!(server.await.unwrap(), b"quit\r\n");
    }
}
