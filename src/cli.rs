use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "frameseek")]
#[command(author, version, about = "Frame-accurate seeking for video files")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decide whether native seeking can be trusted on a file
    Analyze {
        /// Media file to analyze
        #[arg(required = true)]
        file: PathBuf,

        /// Video stream index (defaults to the best video stream)
        #[arg(short, long)]
        track: Option<u32>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scan a file and persist its frame index
    Index {
        /// Media file to index
        #[arg(required = true)]
        file: PathBuf,

        /// Video stream index (defaults to the best video stream)
        #[arg(short, long)]
        track: Option<u32>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Seek to a frame and describe the frames read from there
    Seek {
        /// Media file to seek in
        #[arg(required = true)]
        file: PathBuf,

        /// 1-based frame number
        #[arg(required = true)]
        frame: u32,

        /// Video stream index (defaults to the best video stream)
        #[arg(short, long)]
        track: Option<u32>,

        /// Frames to read after the seek
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the contents of a frame index file
    InspectIndex {
        /// Index file (.fsidx)
        #[arg(required = true)]
        file: PathBuf,

        /// Number of entries to list
        #[arg(long, default_value = "10")]
        rows: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a reliability record file
    InspectRecord {
        /// Record file (.fsrel)
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run seeks against a synthetic stream and check where they land
    Simulate {
        /// Frames in the stream
        #[arg(long, default_value = "1000")]
        frames: u32,

        /// Timestamp step pattern, repeated cyclically
        #[arg(long, value_delimiter = ',', default_value = "1000", allow_hyphen_values = true)]
        steps: Vec<i64>,

        /// Keyframe distance
        #[arg(long, default_value = "12")]
        gop: u32,

        /// Frames native seeks land late by
        #[arg(long, default_value = "0")]
        lag: u32,

        /// Stream without timestamps
        #[arg(long)]
        no_timestamps: bool,

        /// Build a frame index before seeking
        #[arg(long)]
        index: bool,

        /// Frames to seek to (comma separated)
        #[arg(long, value_delimiter = ',')]
        targets: Vec<u32>,

        /// Persist indexes and records in this directory
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Probe a media file with ffprobe and display stream information
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Video stream index (defaults to the first video stream)
        #[arg(short, long)]
        track: Option<u32>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that external tools are available
    CheckTools,

    /// Display version information
    Version,
}
