use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};

use crate::sync::CheckInPayload;

#[derive(Parser)]
#[command(name = "kiosk-sync")]
#[command(about = "Offline-resilient check-in queue for campground kiosks")]
#[command(long_about = "kiosk-sync - offline check-in queue for campground kiosks

Check-ins captured while the kiosk has no connectivity are stored in a local
queue and delivered to the reservation service once it is reachable again.
Retries use exponential backoff and an idempotency key per action, so a guest
is never checked in twice.

QUICK START:
  kiosk-sync enqueue -c pine-lake -r R-1042     Queue a check-in
  kiosk-sync status                             Queue counts
  kiosk-sync flush                              Deliver due actions now
  kiosk-sync conflicts                          Actions needing a decision

OUTPUT FORMATS:
  --output pretty    Human-readable colored output (default)
  --output json      Machine-readable JSON for scripting

For more information on a specific command, run:
  kiosk-sync <command> --help")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Output format for command results
    ///
    /// Use 'pretty' for human-readable colored output, or 'json' for
    /// machine-readable output. Defaults to `general.default_output` from the
    /// config file.
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    /// Data directory holding config.yaml and the queue database
    #[arg(long, global = true, env = "KIOSK_SYNC_HOME", value_name = "DIR")]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for command results.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable colored output.
    #[default]
    Pretty,
    /// Machine-readable JSON output.
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show queue status
    ///
    /// Displays pending, due, and conflicted action counts, the age of the
    /// oldest queued action, and when the next retry is scheduled.
    #[command(alias = "s")]
    Status,

    /// List queued actions
    ///
    /// # Examples
    ///
    ///   kiosk-sync list                 Every queued action
    ///   kiosk-sync list --conflicts     Only actions awaiting a decision
    ///   kiosk-sync list -o json         Raw queue items
    #[command(alias = "ls")]
    List {
        /// Only show conflicted actions
        #[arg(long)]
        conflicts: bool,
    },

    /// Queue a check-in for delivery
    ///
    /// The action is persisted immediately and delivered on the next flush.
    ///
    /// # Examples
    ///
    ///   kiosk-sync enqueue -c pine-lake -r R-1042
    ///   kiosk-sync enqueue -c pine-lake -r R-1042 --add-on firewood --add-on-total 1200
    #[command(alias = "q")]
    Enqueue(EnqueueArgs),

    /// Deliver due actions now
    ///
    /// Runs one flush pass against the configured remote. Actions still in
    /// backoff or in conflict are left alone.
    Flush {
        /// Treat connectivity as down (the pass is skipped)
        #[arg(long)]
        offline: bool,
    },

    /// List actions awaiting an operator decision
    Conflicts,

    /// Re-arm a conflicted action and flush
    ///
    /// The action keeps its idempotency key, so a retry can never apply the
    /// check-in twice.
    Retry {
        /// Queue item ID
        id: String,
    },

    /// Permanently drop a conflicted action
    Discard {
        /// Queue item ID
        id: String,

        /// Skip confirmation
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Run the trigger monitor
    ///
    /// Reads newline-delimited signals from stdin (`online`, `offline`,
    /// `tick`, or a worker message such as {"type":"SYNC_QUEUES"}) and
    /// flushes on reconnect, on worker request, and on a periodic timer.
    /// Stops at end of input or on Ctrl-C.
    Watch,

    /// Remove every queued action
    Clear {
        /// Skip confirmation
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Generate shell completions
    ///
    /// # Examples
    ///
    ///   kiosk-sync completions bash > /usr/local/etc/bash_completion.d/kiosk-sync
    ///   kiosk-sync completions zsh > ~/.zsh/completions/_kiosk-sync
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for queueing a check-in.
#[derive(Args, Debug)]
pub struct EnqueueArgs {
    /// Campground ID
    #[arg(long, short = 'c')]
    pub campground: String,

    /// Reservation ID
    #[arg(long, short = 'r')]
    pub reservation: String,

    /// Add-on ID (repeatable)
    #[arg(long = "add-on", value_name = "ID")]
    pub add_ons: Vec<String>,

    /// Add-on total in cents
    #[arg(long, default_value = "0", value_name = "CENTS")]
    pub add_on_total: i64,

    /// Payment reference from the terminal
    #[arg(long, value_name = "REF")]
    pub payment_ref: Option<String>,

    /// Guest name, for display only
    #[arg(long)]
    pub guest: Option<String>,
}

impl From<EnqueueArgs> for CheckInPayload {
    fn from(args: EnqueueArgs) -> Self {
        Self {
            campground_id: args.campground,
            reservation_id: args.reservation,
            add_on_ids: args.add_ons,
            add_on_total_cents: args.add_on_total,
            payment_reference: args.payment_ref,
            guest_name: args.guest,
        }
    }
}
