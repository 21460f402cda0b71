use clap::{Parser, Subcommand};

/// This is a scoring and tabulation program for three-way proximity polls.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The file containing the description of the poll in JSON format.
    /// If not provided, the default poll (Salary, People, Work) is used.
    #[clap(short, long, value_parser, global = true)]
    pub config: Option<String>,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Evaluates a point of the canvas: raw scores, normalized scores and verdict.
    Score {
        #[clap(value_parser, allow_hyphen_values = true)]
        x: f64,
        #[clap(value_parser, allow_hyphen_values = true)]
        y: f64,
    },

    /// Records a submission in a store, from a point or from a submit request.
    Submit {
        /// (file path) The store in JSON lines format. It is created if it does not exist.
        #[clap(short, long, value_parser)]
        store: String,

        /// (string) The identifier of the participant. Required with --x and --y.
        #[clap(long, value_parser)]
        user_id: Option<String>,

        /// (string, optional) The country of the participant. If missing, the participant is
        /// counted under 'Unknown'.
        #[clap(long, value_parser)]
        country: Option<String>,

        #[clap(long, value_parser, allow_hyphen_values = true)]
        x: Option<f64>,

        #[clap(long, value_parser, allow_hyphen_values = true)]
        y: Option<f64>,

        /// (file path or '-') A submit request in JSON format, as sent to the submission endpoint.
        /// Overrides --user-id, --country, --x and --y.
        #[clap(short, long, value_parser)]
        request: Option<String>,
    },

    /// Tabulates the submissions by country and globally.
    Results {
        /// (file path) The submissions to tabulate.
        #[clap(short, long, value_parser)]
        input: String,

        /// (default jsonl) The type of the input: jsonl, csv or xlsx.
        #[clap(long, value_parser)]
        input_type: Option<String>,

        /// (file path, 'stdout' or empty) If specified, the results will be written in JSON format
        /// to the given location. By default, they are printed on the standard output.
        #[clap(short, long, value_parser)]
        out: Option<String>,

        /// (file path) A reference file containing the expected results in JSON format. If
        /// provided, proxpoll will check that the tabulated output matches the reference.
        #[clap(short, long, value_parser)]
        reference: Option<String>,

        /// If passed as an argument, only the per-country list returned by the results endpoint
        /// is written.
        #[clap(long, takes_value = false)]
        api: bool,
    },

    /// Writes a deterministic sample of accepted submissions to a store.
    Generate {
        /// (default 100) The number of submissions.
        #[clap(short = 'n', long, value_parser, default_value_t = 100)]
        count: usize,

        /// (default proxpoll) The seed of the pseudo-random draws.
        #[clap(long, value_parser, default_value = "proxpoll")]
        seed: String,

        /// (file path) The store to write. An existing file is overwritten.
        #[clap(short, long, value_parser)]
        out: String,
    },
}
