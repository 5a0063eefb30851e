use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(about, long_about = None, version)]
pub(crate) struct Args {
    /// Address of the beanstalkd server.
    #[arg(short, long, default_value = "127.0.0.1:11300")]
    pub(crate) addr: String,
    /// Enables human-friendly logging.
    #[arg(short, long, default_value_t)]
    pub(crate) debug: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Puts a job, printing its ID.
    Put {
        /// Job body; read from stdin if omitted.
        data: Option<String>,
        #[arg(short, long, default_value = "default")]
        tube: String,
        #[arg(short, long, default_value_t = 1024)]
        pri: u32,
        /// Delay in seconds.
        #[arg(long, default_value_t = 0)]
        delay: u64,
        /// Time to run in seconds.
        #[arg(long, default_value_t = 60)]
        ttr: u64,
    },
    /// Reserves a job, printing its ID and body.
    Reserve {
        #[arg(short, long, default_value = "default")]
        tube: String,
        /// Gives up after this many seconds.
        #[arg(long)]
        timeout: Option<u64>,
        /// Deletes the job once printed.
        #[arg(long, default_value_t)]
        delete: bool,
    },
    Delete {
        id: u64,
    },
    /// Reserves a job by ID and buries it.
    Bury {
        id: u64,
        #[arg(short, long, default_value_t = 1024)]
        pri: u32,
    },
    /// Kicks up to `bound` buried or delayed jobs in a tube.
    Kick {
        bound: u64,
        #[arg(short, long, default_value = "default")]
        tube: String,
    },
    KickJob {
        id: u64,
    },
    /// Prints a job by ID without reserving it.
    Peek {
        id: u64,
    },
    Stats,
    StatsTube {
        tube: String,
    },
    StatsJob {
        id: u64,
    },
    ListTubes,
    /// Stops jobs in a tube from being reserved for a number of seconds.
    PauseTube {
        tube: String,
        delay: u64,
    },
}
