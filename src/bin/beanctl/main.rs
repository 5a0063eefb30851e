mod args;

use std::io::{self, Read, Write};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use enchanted_client::{Connection, Job};
use tokio::{select, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};

use crate::args::{Args, Command};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let mut args = Args::parse();

    // Logging goes to stderr, keeping stdout for command output.
    if args.debug {
        tracing_subscriber::fmt()
            .with_max_level(Level::TRACE)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .json()
            .with_writer(io::stderr)
            .init();
    }

    // Read a job body from stdin before taking over ctrl-c, which would
    // otherwise be unable to interrupt the blocking read.
    let mut put_body = None;
    if let Command::Put { data, .. } = &mut args.command {
        match job_body(data.take(), io::stdin().lock()) {
            Ok(body) => put_body = Some(body),
            Err(error) => {
                error!(%error, "failed to read job body from stdin");
                return ExitCode::FAILURE;
            },
        }
    }

    // A blocking reserve can wait forever: ctrl-c abandons the command.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(error) = signal::ctrl_c().await {
                warn!(%error, "something strange with ctrl-c handling!");
            };
            cancel.cancel();
        });
    }

    let mut conn = match Connection::connect(&args.addr).await {
        Ok(conn) => conn,
        Err(error) => {
            error!(%error, addr = %args.addr, "failed to connect");
            return ExitCode::FAILURE;
        },
    };

    let res = select! {
        res = run(&mut conn, args.command, put_body) => res,
        _ = cancel.cancelled() => {
            info!("cancelled");
            return ExitCode::from(130);
        },
    };

    conn.quit().await;

    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(error = %format!("{error:#}"), "command failed");
            ExitCode::FAILURE
        },
    }
}

async fn run(
    conn: &mut Connection,
    command: Command,
    put_body: Option<Vec<u8>>,
) -> Result<()> {
    let mut out = io::stdout().lock();

    match command {
        Command::Put {
            tube,
            pri,
            delay,
            ttr,
            ..
        } => {
            let data = put_body.unwrap_or_default();

            conn.use_tube(&tube).await.context("use")?;
            let id = conn
                .put(
                    &data,
                    pri,
                    Duration::from_secs(delay),
                    Duration::from_secs(ttr),
                )
                .await
                .context("put")?;
            writeln!(out, "{id}")?;
        },
        Command::Reserve {
            tube,
            timeout,
            delete,
        } => {
            if tube != "default" {
                conn.watch(&tube).await.context("watch")?;
                conn.ignore("default").await.context("ignore")?;
            }

            let job = match timeout {
                Some(secs) => {
                    conn.reserve_with_timeout(Duration::from_secs(secs)).await
                },
                None => conn.reserve().await,
            }
            .context("reserve")?;

            print_job(&mut out, &job)?;

            if delete {
                conn.delete(job.id()).await.context("delete")?;
            }
        },
        Command::Delete { id } => conn.delete(id).await.context("delete")?,
        Command::Bury { id, pri } => {
            conn.reserve_job(id).await.context("reserve-job")?;
            conn.bury(id, pri).await.context("bury")?;
        },
        Command::Kick { bound, tube } => {
            conn.use_tube(&tube).await.context("use")?;
            let count = conn.kick(bound).await.context("kick")?;
            writeln!(out, "{count}")?;
        },
        Command::KickJob { id } => {
            conn.kick_job(id).await.context("kick-job")?
        },
        Command::Peek { id } => {
            let job = conn.peek(id).await.context("peek")?;
            print_job(&mut out, &job)?;
        },
        Command::Stats => {
            out.write_all(&conn.stats().await.context("stats")?)?
        },
        Command::StatsTube { tube } => out.write_all(
            &conn.stats_tube(&tube).await.context("stats-tube")?,
        )?,
        Command::StatsJob { id } => {
            out.write_all(&conn.stats_job(id).await.context("stats-job")?)?
        },
        Command::ListTubes => {
            out.write_all(&conn.list_tubes().await.context("list-tubes")?)?
        },
        Command::PauseTube { tube, delay } => conn
            .pause_tube(&tube, Duration::from_secs(delay))
            .await
            .context("pause-tube")?,
    }

    out.flush()?;

    Ok(())
}

fn print_job(out: &mut impl Write, job: &Job) -> Result<()> {
    writeln!(out, "{}", job.id())?;
    out.write_all(job.body())?;
    writeln!(out)?;
    Ok(())
}

/// A `put` body: the argument if one was given, else all of `stdin`.
fn job_body(data: Option<String>, mut stdin: impl Read) -> io::Result<Vec<u8>> {
    match data {
        Some(data) => Ok(data.into_bytes()),
        None => {
            let mut buf = Vec::new();
            stdin.read_to_end(&mut buf)?;
            Ok(buf)
        },
    }
}
